use std::{
    cmp::Ordering,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// A keyed unit of work. Several versions of the same job may be submitted;
/// the queues only keep the most recent one per [`Job::key`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub key: String,
    pub priority: u64,
    /// Microseconds since the unix epoch at which the job was created.
    pub enqueued_at_us: u64,
    pub payload: Vec<u8>,
}

impl Job {
    /// Priority is determined using the following criteria:
    /// - Higher priority values come first.
    /// - On equal priority, an earlier enqueue time comes first.
    fn priority(&self, other: &Self) -> Ordering {
        if self.priority != other.priority {
            return self.priority.cmp(&other.priority);
        }
        other.enqueued_at_us.cmp(&self.enqueued_at_us)
    }

    pub fn new(key: &str, priority: u64, enqueued_at_us: u64, payload: Vec<u8>) -> Self {
        Self {
            key: key.to_string(),
            priority,
            enqueued_at_us,
            payload,
        }
    }

    pub fn without_load(key: &str, priority: u64, enqueued_at_us: u64) -> Self {
        Self::new(key, priority, enqueued_at_us, vec![])
    }

    /// Creates a job stamped with the current time.
    pub fn now(key: &str, priority: u64, payload: Vec<u8>) -> Self {
        Self::new(key, priority, now_us(), payload)
    }

    /// Key function for stores of jobs.
    pub fn key_of(job: &Job) -> anyhow::Result<String> {
        if job.key.is_empty() {
            anyhow::bail!("job has an empty key");
        }
        Ok(job.key.clone())
    }

    /// Time elapsed since the job was created, in microseconds.
    pub fn age_us(&self) -> u64 {
        now_us().saturating_sub(self.enqueued_at_us)
    }
}

pub(crate) fn now_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(saturating_micros)
        .unwrap_or_default()
}

fn saturating_micros(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}

// region:    --- Implementation of ordering traits to support sorting by priority

impl PartialOrd for Job {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Job {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority(other)
    }
}

// endregion: --- Implementation of ordering traits to support sorting by priority
