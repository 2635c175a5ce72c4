use std::{path::PathBuf, time::Duration};

use anyhow::{anyhow, Result};
use clap::Parser;
use common::{app, config};
use tracing::info;
use tracing_subscriber::EnvFilter;

use worker::WorkerConfig;

#[derive(Parser, Debug)]
#[command(name = "worker")]
#[command(about = "Worker MapReduce: pide tareas al master hasta que le dicen que termine")]
struct Args {
    /// URL base del master
    #[arg(long, default_value_t = config::master_base_url())]
    master_url: String,

    /// Aplicación map/reduce a ejecutar (wordcount, indexer)
    #[arg(long, default_value_t = config::app_name())]
    app: String,

    /// Milisegundos de espera cuando el master responde Wait
    #[arg(long, default_value_t = config::poll_backoff().as_millis() as u64)]
    poll_backoff_ms: u64,

    /// Directorio de los intermedios mr-int-<map>-<p>.jsonl
    #[arg(long, default_value_t = config::intermediate_dir())]
    intermediate_dir: String,

    /// Directorio de las salidas mr-out-<p>
    #[arg(long, default_value_t = config::output_dir())]
    output_dir: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("worker=debug,reqwest=info")),
        )
        .init();

    let args = Args::parse();

    let app = app::lookup(&args.app).ok_or_else(|| {
        anyhow!(
            "aplicación desconocida '{}' (disponibles: {})",
            args.app,
            app::available().join(", ")
        )
    })?;

    // Nombre de host (solo para info)
    let hostname = hostname::get()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    info!("worker en host {}", hostname);

    let config = WorkerConfig {
        master_url: args.master_url,
        app,
        poll_backoff: Duration::from_millis(args.poll_backoff_ms),
        intermediate_dir: PathBuf::from(args.intermediate_dir),
        output_dir: PathBuf::from(args.output_dir),
    };

    let summary = worker::run(config).await?;
    info!(
        "resumen: map ok={} fail={}, reduce ok={} fail={}, waits={}",
        summary.maps_succeeded,
        summary.maps_failed,
        summary.reduces_succeeded,
        summary.reduces_failed,
        summary.waits
    );
    Ok(())
}
