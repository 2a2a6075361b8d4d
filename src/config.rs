/// Pipeline configuration
///
/// All knobs are fixed at startup; `validate` rejects bad combinations
/// before any thread spawns so the hot path never re-checks them.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("queue capacity must be a power of two, got {0}")]
    QueueCapacityNotPowerOfTwo(usize),

    #[error("queue capacity must be nonzero")]
    QueueCapacityZero,

    #[error("{name} must be nonzero")]
    ZeroParameter { name: &'static str },

    #[error("producer and consumer must be pinned to distinct CPUs (both {0})")]
    SharedCpu(u32),
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Multicast group the feed arrives on.
    pub transport_group: String,
    pub port: u16,
    pub producer_cpu: u32,
    pub consumer_cpu: u32,
    /// SPSC queue slots; power of two.
    pub queue_capacity: usize,
    /// Duplicate-filter window, in most-recent observations.
    pub dup_window: u32,
    /// Out-of-order buffer capacity.
    pub reorder_cap: u32,
    /// Largest recoverable gap; beyond this the feed goes stale.
    pub max_gap: u64,
    pub gap_timeout_ns: u64,
    pub max_retries: u8,
    pub maintenance_interval_ns: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            transport_group: "233.54.12.1".to_string(),
            port: 15_000,
            producer_cpu: 0,
            consumer_cpu: 1,
            queue_capacity: 65_536,
            dup_window: 10_000,
            reorder_cap: 1_000,
            max_gap: 1_000,
            gap_timeout_ns: 1_000_000_000,
            max_retries: 3,
            maintenance_interval_ns: 100_000_000,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::QueueCapacityZero);
        }
        if !self.queue_capacity.is_power_of_two() {
            return Err(ConfigError::QueueCapacityNotPowerOfTwo(self.queue_capacity));
        }
        if self.dup_window == 0 {
            return Err(ConfigError::ZeroParameter { name: "dup_window" });
        }
        if self.reorder_cap == 0 {
            return Err(ConfigError::ZeroParameter { name: "reorder_cap" });
        }
        if self.max_gap == 0 {
            return Err(ConfigError::ZeroParameter { name: "max_gap" });
        }
        if self.maintenance_interval_ns == 0 {
            return Err(ConfigError::ZeroParameter {
                name: "maintenance_interval_ns",
            });
        }
        if self.producer_cpu == self.consumer_cpu {
            return Err(ConfigError::SharedCpu(self.producer_cpu));
        }
        Ok(())
    }
}
