use crate::output;
use crate::runtime::Runtime;
use crate::ux_error;
use anyhow::Result;
use clap::Args;
use pipeline::WorkerPool;
use std::sync::Arc;
use std::time::Duration;

#[derive(Args)]
pub struct WorkerArgs {
    #[arg(long, help = "Worker pool size (overrides queue.workers)")]
    pub workers: Option<usize>,

    #[arg(long, help = "Do not run the reminder sweeper in this process")]
    pub no_reminders: bool,
}

pub async fn run(args: WorkerArgs, runtime: Runtime) -> Result<()> {
    let sweep_reminders = runtime.config.reminders.enabled && !args.no_reminders;
    if runtime.queue.is_none() && !sweep_reminders {
        return Err(ux_error::queue_required("worker").into());
    }
    let shutdown = runtime.supervisor.shutdown_token();

    let workers = match &runtime.queue {
        Some(queue) => {
            let recovered = queue.recover_in_flight().await?;
            if recovered > 0 {
                output::info(&format!("Recovered {recovered} in-flight job(s)"));
            }
            let size = args.workers.unwrap_or(runtime.config.queue.workers);
            let pool = Arc::new(WorkerPool::new(
                queue.clone(),
                runtime.coordinator.clone(),
                runtime.retry_policy(),
                size,
                Duration::from_millis(runtime.config.queue.poll_timeout_ms),
            ));
            output::info(&format!("Draining queue '{}' with {size} worker(s)", runtime.config.queue.queue_name));
            Some(pool.start(shutdown.clone()))
        }
        None => {
            output::warn("In-process mode: no queue to drain, sweeping reminders only");
            None
        }
    };

    if sweep_reminders {
        let sweeper = runtime.reminder_sweeper();
        let token = shutdown.clone();
        runtime
            .supervisor
            .spawn("reminder_sweeper", async move { sweeper.run(token).await })?;
    }

    tokio::signal::ctrl_c().await?;
    output::info("Shutting down, waiting for running jobs");

    let report = runtime.shutdown().await;
    let workers_done = match workers {
        Some(handle) => handle.wait_for(runtime.grace_period()).await,
        None => true,
    };
    if report.drained && workers_done {
        output::success("Stopped cleanly");
    } else {
        output::warn(&format!(
            "Grace period elapsed with {} task(s) still running",
            report.remaining
        ));
    }
    Ok(())
}
