#[derive(Debug, Clone, clap::Parser)]
pub struct Cfg {
    /// The queue implementation to test.
    pub implementation: Implementation,
    /// Number of producers that will add jobs to the queue.
    #[arg(short, long)]
    pub producer_num: usize,
    /// Number of jobs each producer will add to the queue during the test.
    #[arg(short, long)]
    pub job_num: usize,
    /// Number of consumers that will pop jobs from the queue.
    #[arg(short, long, default_value_t = 1)]
    pub consumer_num: usize,
    /// Number of distinct job keys. Versions of a pending key are coalesced.
    #[arg(short, long, default_value_t = 1_000)]
    pub key_space: usize,
    /// Lowest job priority.
    #[arg(long, default_value_t = 1)]
    pub min_priority: u64,
    /// Highest job priority.
    #[arg(long, default_value_t = 1_000)]
    pub max_priority: u64,
    /// Largest job payload in bytes.
    #[arg(long, default_value_t = 1_024)]
    pub max_payload: usize,
    // Hard cap on the test's execution time
    #[arg(long, default_value_t = 10)]
    pub run_duration_seconds: u64,
}

impl Cfg {
    /// Checks the ranges and returns the number of jobs all producers submit
    /// together.
    pub fn validate(&self) -> anyhow::Result<usize> {
        if self.min_priority > self.max_priority {
            anyhow::bail!(
                "min priority {} exceeds max priority {}",
                self.min_priority,
                self.max_priority
            );
        }
        if self.key_space == 0 {
            anyhow::bail!("key space must hold at least one key");
        }
        self.job_num
            .checked_mul(self.producer_num)
            .ok_or_else(|| anyhow::anyhow!("Overflow while calculating the total job count"))
    }
}

#[derive(Debug, Clone, strum::EnumString, clap::ValueEnum)]
pub enum Implementation {
    /// Insertion-ordered queue.
    #[strum(ascii_case_insensitive)]
    Fifo,
    /// Priority-ordered queue, highest priority first.
    #[strum(ascii_case_insensitive)]
    Heap,
}
