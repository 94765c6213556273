use hdrhistogram::Histogram;
use rand::{Rng, rngs::ThreadRng};
use std::collections::HashSet;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use std::thread;
use std::time::{Duration, Instant};

use crate::{Job, Queue};

#[derive(Debug, Clone, Copy)]
pub struct StressTestConfig {
    pub num_producers: usize,
    pub num_jobs: usize,
    pub num_consumers: usize,
    /// Number of distinct job keys producers draw from. Smaller key spaces
    /// coalesce more versions per key.
    pub key_space: usize,
    pub payload_size_range: (usize, usize),
    pub priority_range: (u64, u64),
    pub run_duration_seconds: u64,
}

impl StressTestConfig {
    /// Creates a randomized [Job] within the pre-configured ranges using the passed randomizer `rng`.
    fn randomized_job(&self, rng: &mut ThreadRng) -> Job {
        let payload_size = rng.random_range(self.payload_size_range.0..=self.payload_size_range.1);
        let priority = rng.random_range(self.priority_range.0..=self.priority_range.1);
        let key = format!("job-{}", rng.random_range(0..self.key_space.max(1)));

        Job::now(
            &key,
            priority,
            (0..payload_size).map(|_| rng.random::<u8>()).collect(),
        )
    }
}

struct Latencies(Mutex<Histogram<u64>>);

impl Latencies {
    fn new() -> Self {
        Self(Mutex::new(
            Histogram::new_with_max(60_000_000, 3).expect("Initializing the histogram should work"),
        ))
    }

    fn record(&self, latency_us: u64) {
        if let Ok(mut hist) = self.0.lock() {
            let lat = latency_us.min(hist.high());
            if let Err(e) = hist.record(lat) {
                tracing::warn!("dropping latency sample {lat}: {e}");
            }
        }
    }

    fn percentiles(&self, percentiles: &[f64]) -> Vec<(f64, u64)> {
        let Ok(hist) = self.0.lock() else {
            return vec![];
        };
        if hist.is_empty() {
            return vec![];
        }
        percentiles
            .iter()
            .map(|&p| (p, hist.value_at_quantile(p / 100.0)))
            .collect()
    }

    fn mean_and_max(&self) -> (f64, u64) {
        self.0
            .lock()
            .map(|h| (h.mean(), h.max()))
            .unwrap_or_default()
    }
}

/// Runs producers adding random jobs and consumers blocking on `queue`
/// until every producer finished (or the run time cap is hit). The queue is
/// closed afterwards, so consumers drain what is left and exit.
pub fn run_stress_test<Q: Queue<Job> + 'static>(queue: Arc<Q>, config: StressTestConfig) -> TestResults {
    tracing::info!(
        producers = config.num_producers,
        jobs = config.num_jobs,
        consumers = config.num_consumers,
        key_space = config.key_space,
        "starting stress test"
    );
    let start_time = Instant::now();
    let test_end_time = start_time + Duration::from_secs(config.run_duration_seconds);

    // -- Metrics
    let submitted_count = Arc::new(AtomicUsize::new(0));
    let delivered_count = Arc::new(AtomicUsize::new(0));
    let error_count = Arc::new(AtomicUsize::new(0));
    let latencies = Arc::new(Latencies::new());
    let submitted_keys = Arc::new(Mutex::new(HashSet::new()));
    let delivered_keys = Arc::new(Mutex::new(HashSet::new()));

    // region:    --- Producer
    let mut producer_handles = vec![];

    for producer_id in 1..=config.num_producers {
        let cloned_queue = Arc::clone(&queue);
        let cloned_submitted_count = Arc::clone(&submitted_count);
        let cloned_error_count = Arc::clone(&error_count);
        let cloned_submitted_keys = Arc::clone(&submitted_keys);

        let handle = thread::spawn(move || {
            let mut rng = rand::rng();
            let mut local_submitted = 0;

            while Instant::now() < test_end_time && local_submitted < config.num_jobs {
                let job = config.randomized_job(&mut rng);
                let key = job.key.clone();

                // --> Submit
                if let Err(e) = cloned_queue.add(job) {
                    tracing::warn!(producer_id, "could not submit job: {e}");
                    cloned_error_count.fetch_add(1, Ordering::Relaxed);
                    break;
                }
                local_submitted += 1;
                cloned_submitted_count.fetch_add(1, Ordering::Relaxed);
                if let Ok(mut keys) = cloned_submitted_keys.lock() {
                    keys.insert(key);
                }

                // Small delay
                thread::sleep(Duration::from_micros(rng.random_range(1..100)));
            }

            tracing::debug!(producer_id, submitted = local_submitted, "producer completed");
        });

        producer_handles.push(handle);
    }

    // endregion: --- Producer

    // region:    --- Consumer threads
    let mut consumer_handles = vec![];

    for consumer_id in 1..=config.num_consumers {
        let cloned_queue = Arc::clone(&queue);
        let cloned_delivered_count = Arc::clone(&delivered_count);
        let cloned_error_count = Arc::clone(&error_count);
        let cloned_latencies = Arc::clone(&latencies);
        let cloned_delivered_keys = Arc::clone(&delivered_keys);

        let consumer_handle = thread::spawn(move || {
            let mut total_delivered = 0;
            loop {
                match cloned_queue.dequeue() {
                    Ok(job) => {
                        cloned_latencies.record(job.age_us());
                        total_delivered += 1;
                        cloned_delivered_count.fetch_add(1, Ordering::Relaxed);
                        if let Ok(mut keys) = cloned_delivered_keys.lock() {
                            keys.insert(job.key);
                        }
                    }
                    Err(e) if e.is_closed() => break,
                    Err(e) => {
                        tracing::warn!(consumer_id, "dequeue failed: {e}");
                        cloned_error_count.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
            tracing::debug!(consumer_id, delivered = total_delivered, "consumer completed");
        });
        consumer_handles.push(consumer_handle);
    }

    // endregion: --- Consumer threads

    for handle in producer_handles {
        handle.join().expect("Producer thread panicked");
    }
    tracing::info!("producers done, closing queue");
    queue.close();
    for handle in consumer_handles {
        handle.join().expect("Consumer thread panicked");
    }

    let test_duration = start_time.elapsed();
    let total_submitted = submitted_count.load(Ordering::Relaxed);
    let total_delivered = delivered_count.load(Ordering::Relaxed);
    let (mean_latency_us, max_latency_us) = latencies.mean_and_max();
    let distinct_keys =
        |keys: &Mutex<HashSet<String>>| keys.lock().map(|k| k.len()).unwrap_or_default();

    TestResults {
        test_duration,
        total_submitted,
        total_delivered,
        total_errors: error_count.load(Ordering::Relaxed),
        distinct_keys_submitted: distinct_keys(&submitted_keys),
        distinct_keys_delivered: distinct_keys(&delivered_keys),
        jobs_per_second: total_delivered as f64 / test_duration.as_secs_f64().max(f64::EPSILON),
        mean_latency_us,
        max_latency_us,
        latency_percentiles: latencies.percentiles(&[50.0, 90.0, 99.0, 99.9]),
    }
}

#[derive(Debug)]
pub struct TestResults {
    pub test_duration: Duration,
    pub total_submitted: usize,
    pub total_delivered: usize,
    pub total_errors: usize,
    /// Keys that got at least one version submitted.
    pub distinct_keys_submitted: usize,
    /// Keys that got at least one version delivered. Once the queue is
    /// drained this matches `distinct_keys_submitted`.
    pub distinct_keys_delivered: usize,
    pub jobs_per_second: f64,
    pub mean_latency_us: f64,
    pub max_latency_us: u64,
    pub latency_percentiles: Vec<(f64, u64)>,
}

impl TestResults {
    /// Submitted versions that were folded into a newer pending version of
    /// the same key instead of being delivered on their own.
    pub fn coalesced(&self) -> usize {
        self.total_submitted.saturating_sub(self.total_delivered)
    }

    pub fn print_summary(&self) {
        use num_format::{Locale, SystemLocale, ToFormattedString};

        let fmt = |n: u64| match SystemLocale::default() {
            Ok(locale) => n.to_formatted_string(&locale),
            Err(_) => n.to_formatted_string(&Locale::en),
        };

        println!("\n{:=^75}", " Stress Test Results ");
        println!("Test duration: {:?}", self.test_duration);
        println!("Jobs submitted: {}", fmt(self.total_submitted as u64));
        println!("Jobs delivered: {}", fmt(self.total_delivered as u64));
        println!("Versions coalesced: {}", fmt(self.coalesced() as u64));
        println!(
            "Distinct keys: {} submitted, {} delivered",
            fmt(self.distinct_keys_submitted as u64),
            fmt(self.distinct_keys_delivered as u64)
        );
        println!("Errors: {}", fmt(self.total_errors as u64));
        println!("Delivered per second: {:.2}", self.jobs_per_second);
        println!(
            "Latency: avg {} μs, max {} μs.",
            fmt(self.mean_latency_us as u64),
            fmt(self.max_latency_us)
        );

        if !self.latency_percentiles.is_empty() {
            print!("Percentiles: ");
            for (p, latency) in &self.latency_percentiles {
                print!("P{:.1}: {} μs, ", p, fmt(*latency));
            }
            println!();
        }
    }
}
