use std::sync::Arc;

use cfg::{Cfg, Implementation};
use clap::Parser;
use fifo::Fifo;
use heap::Heap;
use store::{
    Direction, Job, Queue,
    test::stress::{StressTestConfig, run_stress_test},
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub mod cfg;

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = Cfg::parse();
    tracing::info!("Running configuration:\n{cfg:#?}");

    let res = match cfg.implementation {
        Implementation::Fifo => run(Fifo::new(Job::key_of), &cfg),
        Implementation::Heap => run(Heap::with_ord(Job::key_of, Direction::Max), &cfg),
    };
    if let Err(e) = res {
        tracing::error!("Error: {e:?}");
        std::process::exit(1);
    }
}

fn run<Q: Queue<Job> + 'static>(queue: Q, cfg: &Cfg) -> anyhow::Result<()> {
    let total_jobs = cfg.validate()?;
    tracing::info!(total_jobs, "configuration is valid");

    let config = StressTestConfig {
        num_producers: cfg.producer_num,
        num_jobs: cfg.job_num,
        num_consumers: cfg.consumer_num,
        key_space: cfg.key_space,
        payload_size_range: (0, cfg.max_payload),
        priority_range: (cfg.min_priority, cfg.max_priority),
        run_duration_seconds: cfg.run_duration_seconds,
    };
    let results = run_stress_test(Arc::new(queue), config);
    results.print_summary();

    if results.total_errors > 0 {
        anyhow::bail!("{} operations failed during the run", results.total_errors);
    }
    Ok(())
}
