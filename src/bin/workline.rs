//! workline CLI: runs synthetic workloads through the queues.

use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::oneshot;
use workline::config::Config;
use workline::telemetry::{TelemetryConfig, init_telemetry};
use workline::{CollectingWorkingQueue, Collected, QueueStats, run_local, sequence};

#[derive(Parser)]
#[command(name = "workline", about = "Bounded-concurrency job queue playground")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run many timer jobs through a collecting queue
    Burst {
        /// Number of jobs
        #[arg(long, default_value_t = 20)]
        jobs: u64,
        /// Concurrency limit (defaults to WORKLINE_CONCURRENCY)
        #[arg(long)]
        concurrency: Option<usize>,
        /// Upper bound for each job's simulated latency
        #[arg(long, default_value_t = 200)]
        max_delay_ms: u64,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run a sequence of delays and concurrent sections
    Pipeline {
        /// Number of steps
        #[arg(long, default_value_t = 3)]
        steps: usize,
        /// Jobs per concurrent section
        #[arg(long, default_value_t = 4)]
        fan_out: usize,
        /// Delay before each section, and latency of each section job
        #[arg(long, default_value_t = 100)]
        delay_ms: u64,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "workline".to_string(),
        default_filter: config.log_level.clone(),
    })?;

    match cli.command {
        Command::Burst {
            jobs,
            concurrency,
            max_delay_ms,
            json,
        } => {
            let concurrency = concurrency.unwrap_or(config.default_concurrency);
            run_local(cmd_burst(jobs, concurrency, max_delay_ms, json)).await
        }
        Command::Pipeline {
            steps,
            fan_out,
            delay_ms,
        } => run_local(cmd_pipeline(steps, fan_out, delay_ms)).await,
    }
}

/// Deterministic spread of latencies over `0..=max`.
fn latency(i: u64, max: u64) -> Duration {
    Duration::from_millis((i.wrapping_mul(7919) ^ 0x5bd1) % (max + 1))
}

async fn cmd_burst(
    jobs: u64,
    concurrency: usize,
    max_delay_ms: u64,
    json: bool,
) -> anyhow::Result<()> {
    let queue: CollectingWorkingQueue<u64, String> = CollectingWorkingQueue::new(concurrency);

    for i in 0..jobs {
        let delay = latency(i, max_delay_ms);
        queue.perform_async(move |done| async move {
            tokio::time::sleep(delay).await;
            done.ok(delay.as_millis() as u64);
        });
    }

    let (tx, rx) = oneshot::channel::<(Vec<Collected<u64, String>>, QueueStats)>();
    let observer = queue.clone();
    queue.on_done(move |results| {
        let mut sorted = results.to_vec();
        sorted.sort_by_key(|r| r.id);
        let _ = tx.send((sorted, observer.stats()));
    });
    queue.done_adding_jobs();

    let (results, stats) = rx.await?;

    if json {
        let report = serde_json::json!({ "stats": stats, "results": results });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{:<6}  {:>10}", "JOB", "LATENCY_MS");
    println!("{}", "-".repeat(18));
    for r in &results {
        let latency = r
            .value
            .map(|ms| ms.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:<6}  {:>10}", r.id, latency);
    }
    println!(
        "\n{} job(s), concurrency {}, peak in flight {}",
        stats.completed, stats.concurrency, stats.peak_active
    );
    Ok(())
}

async fn cmd_pipeline(steps: usize, fan_out: usize, delay_ms: u64) -> anyhow::Result<()> {
    let delay = Duration::from_millis(delay_ms);
    let seq = sequence();

    for step in 0..steps {
        seq.wait(delay);
        seq.then_concurrently(fan_out, move |section, close| {
            for job in 0..fan_out {
                section.perform_async(move |done| async move {
                    tokio::time::sleep(delay).await;
                    println!("  step {step}: job {job} done");
                    done.finish();
                });
            }
            close.finish();
        })?;
        seq.then(move |done| {
            println!("step {step} complete");
            done.finish();
        })?;
    }

    let (tx, rx) = oneshot::channel();
    seq.on_done(move || {
        let _ = tx.send(());
    });
    seq.done_adding_jobs();
    rx.await?;

    println!("pipeline finished");
    Ok(())
}
