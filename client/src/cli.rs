use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use common::{config, JobProgress, JobResults, TaskSnapshot};
use reqwest::Client;
use tokio::time::sleep;

#[derive(Parser)]
#[command(name = "client")]
#[command(about = "CLI simple para consultar al master MapReduce")]
struct Cli {
    /// URL base del master
    #[arg(long, global = true, default_value_t = config::master_base_url())]
    master_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Progreso del job (fases y tareas completadas)
    Status,
    /// Lista todas las tareas map y reduce con su estado
    Tasks,
    /// Lista los archivos de salida mr-out-<p>
    Results,
    /// Espera hasta que el job termine
    Wait {
        /// Intervalo entre consultas
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,

        /// Tiempo máximo de espera (sin límite si se omite)
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}

/// Porcentaje de tareas completadas (map + reduce).
fn progress_percent(job: &JobProgress) -> Option<f64> {
    let total = job.total_tasks();
    if total == 0 {
        None
    } else {
        Some(job.completed_tasks() as f64 / total as f64 * 100.0)
    }
}

fn print_progress(job: &JobProgress) {
    println!("Job:");
    println!("  terminado: {}", job.done);
    println!(
        "  map   : {}/{} (fase completa: {})",
        job.completed_map_tasks, job.total_map_tasks, job.map_phase_done
    );
    println!(
        "  reduce: {}/{} (fase completa: {})",
        job.completed_reduce_tasks, job.total_reduce_tasks, job.reduce_phase_done
    );
    match progress_percent(job) {
        Some(pct) => println!("  progreso: {:.1}%", pct),
        None => println!("  progreso: (sin tareas)"),
    }
    println!("  iniciado: {}", job.started_at);
    if let Some(ref done) = job.finished_at {
        println!("  finalizado: {}", done);
    }
}

fn print_tasks(tasks: &[TaskSnapshot]) {
    if tasks.is_empty() {
        println!("No hay tareas registradas.");
        return;
    }
    for t in tasks {
        print!("{:<6} {:>4}  {:<11}", t.kind, t.task_id, format!("{:?}", t.status));
        if let Some(age) = t.lease_age_secs {
            print!("  lease={}s", age);
        }
        if let Some(ref split) = t.input_split {
            print!("  {}", split);
        }
        println!();
    }
}

async fn fetch_progress(client: &Client, base_url: &str) -> Result<JobProgress> {
    let url = format!("{}/api/v1/job", base_url);
    let resp = client.get(&url).send().await?.error_for_status()?;
    Ok(resp.json().await?)
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let client = Client::new();
    let base_url = cli.master_url.trim_end_matches('/').to_string();

    match cli.command {
        Commands::Status => {
            let job = fetch_progress(&client, &base_url).await?;
            print_progress(&job);
        }

        Commands::Tasks => {
            let url = format!("{}/api/v1/tasks", base_url);
            let resp = client.get(&url).send().await?;
            if resp.status().is_success() {
                let tasks: Vec<TaskSnapshot> = resp.json().await?;
                print_tasks(&tasks);
            } else {
                println!("Error consultando /api/v1/tasks (status {})", resp.status());
            }
        }

        Commands::Results => {
            let url = format!("{}/api/v1/job/results", base_url);
            let resp = client.get(&url).send().await?;

            if resp.status().is_success() {
                let results: JobResults = resp.json().await?;
                println!("Resultados:");
                println!("  directorio de salida: {}", results.output_dir);
                if results.files.is_empty() {
                    println!("  (sin archivos de salida)");
                } else {
                    println!("  archivos:");
                    for f in results.files {
                        println!("    - {}", f);
                    }
                }
            } else {
                println!("Error consultando resultados (status {})", resp.status());
            }
        }

        Commands::Wait {
            interval_ms,
            timeout_secs,
        } => {
            let started = Instant::now();
            let deadline = timeout_secs.map(Duration::from_secs);
            loop {
                let job = fetch_progress(&client, &base_url).await?;
                if job.done {
                    print_progress(&job);
                    break;
                }
                if let Some(limit) = deadline {
                    if started.elapsed() >= limit {
                        bail!(
                            "el job no terminó en {}s ({}/{} tareas)",
                            limit.as_secs(),
                            job.completed_tasks(),
                            job.total_tasks()
                        );
                    }
                }
                sleep(Duration::from_millis(interval_ms)).await;
            }
        }
    }

    Ok(())
}
