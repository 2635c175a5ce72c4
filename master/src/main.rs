use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use common::config;
use glob::glob;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use master::{build_router, monitor, AppState, Scheduler, SchedulerConfig, MONITOR_SWEEP_INTERVAL};

#[derive(Parser, Debug)]
#[command(name = "master")]
#[command(about = "Coordinador MapReduce: reparte tareas map/reduce a los workers")]
struct Args {
    /// Archivos de entrada (una tarea map por archivo)
    #[arg(value_name = "ARCHIVO")]
    files: Vec<String>,

    /// Patrón de archivos de entrada, ej: "/data/input/pg-*.txt"
    #[arg(long)]
    input_glob: Option<String>,

    /// Cantidad de tareas reduce (N)
    #[arg(long, default_value_t = config::reduce_count(),
          value_parser = clap::value_parser!(u32).range(1..))]
    reduce_count: u32,

    /// Dirección donde escucha el servidor RPC
    #[arg(long, default_value_t = config::listen_addr())]
    listen: String,

    /// Segundos sin reporte antes de re-asignar una tarea
    #[arg(long, default_value_t = config::lease_timeout().as_secs())]
    lease_timeout_secs: u64,

    /// Directorio donde los workers publican mr-out-<p>
    #[arg(long, default_value_t = config::output_dir())]
    output_dir: String,

    /// Segundos que el master sigue vivo después de Done() respondiendo Terminate
    #[arg(long, default_value_t = config::done_linger().as_secs())]
    linger_secs: u64,
}

fn collect_splits(args: &Args) -> Result<Vec<String>> {
    let mut splits = args.files.clone();

    if let Some(pattern) = &args.input_glob {
        let entries =
            glob(pattern).with_context(|| format!("patrón input_glob inválido: {pattern}"))?;
        for entry in entries {
            match entry {
                Ok(path) if path.is_file() => splits.push(path.to_string_lossy().to_string()),
                Ok(_) => {}
                Err(e) => warn!("no se pudo leer {}: {}", e.path().display(), e),
            }
        }
    }

    if splits.is_empty() {
        bail!("no hay archivos de entrada (pasar ARCHIVO... o --input-glob)");
    }
    Ok(splits)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("master=debug,tower_http=info")),
        )
        .init();

    let args = Args::parse();
    let splits = collect_splits(&args)?;

    let scheduler = Scheduler::new(
        splits,
        args.reduce_count,
        SchedulerConfig {
            lease_timeout: Duration::from_secs(args.lease_timeout_secs),
        },
    );
    let state = AppState::new(scheduler, &args.output_dir);

    // router HTTP
    let app = build_router(state.clone());

    let listener = TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("no se pudo escuchar en {}", args.listen))?;
    info!("master escuchando en {}", listener.local_addr()?);

    // el servidor se apaga cuando el monitor ve el job terminado (o ctrl-c)
    let linger = Duration::from_secs(args.linger_secs);
    let shutdown = async move {
        tokio::select! {
            _ = monitor::monitor_job(state, MONITOR_SWEEP_INTERVAL, linger) => {}
            _ = tokio::signal::ctrl_c() => warn!("ctrl-c recibido, apagando master"),
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("error en el servidor HTTP")?;

    info!("master terminado");
    Ok(())
}
