use crate::error::{Error, Result};
use crate::partition::Strategy;

/// Host thread count ceiling accepted by `validate`.
const MAX_THREADS: usize = 1024;

#[derive(Debug, Clone)]
pub struct Config {
    /// Fraction of the task domain processed on the host. Anything outside
    /// `[0, 1]` (NaN included) selects dynamic partitioning.
    pub alpha: f64,
    pub num_threads: Option<usize>,

    /// Accelerator compute units (work-groups). Zero disables the device.
    pub work_groups: usize,
    pub work_items: usize,

    pub warmup: usize,
    pub reps: usize,

    /// Host and accelerator address the same result storage, so no copy-back
    /// merge is needed.
    pub unified_memory: bool,

    pub pin_workers: bool,
    pub stack_size: Option<usize>,
    pub thread_name_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            alpha: 0.2,
            num_threads: None,
            work_groups: 32,
            work_items: 16,
            warmup: 5,
            reps: 50,
            unified_memory: false,
            pin_workers: false,
            stack_size: Some(2 * 1024 * 1024),
            thread_name_prefix: "coexec-host".to_string(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.num_threads {
            if n == 0 {
                return Err(Error::config("num_threads must be > 0"));
            }
            if n > MAX_THREADS {
                return Err(Error::config(format!(
                    "num_threads too large (max {})",
                    MAX_THREADS
                )));
            }
        }

        if self.work_items == 0 {
            return Err(Error::config("work_items must be > 0"));
        }

        if self.reps == 0 {
            return Err(Error::config("reps must be > 0"));
        }

        // With no device, a static split must keep every task on the host.
        if self.work_groups == 0 && self.strategy() == Strategy::Static && self.alpha < 1.0 {
            return Err(Error::config(format!(
                "accelerator disabled (work_groups = 0) but alpha = {} leaves tasks to it",
                self.alpha
            )));
        }

        Ok(())
    }

    pub fn host_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(num_cpus::get)
    }

    pub fn strategy(&self) -> Strategy {
        Strategy::from_alpha(self.alpha)
    }

    pub fn total_iterations(&self) -> usize {
        self.warmup + self.reps
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn alpha(mut self, alpha: f64) -> Self {
        self.config.alpha = alpha;
        self
    }

    /// Selects dynamic partitioning by moving `alpha` out of `[0, 1]`.
    pub fn dynamic(mut self) -> Self {
        self.config.alpha = -1.0;
        self
    }

    pub fn num_threads(mut self, n: usize) -> Self {
        self.config.num_threads = Some(n);
        self
    }

    pub fn work_groups(mut self, n: usize) -> Self {
        self.config.work_groups = n;
        self
    }

    pub fn work_items(mut self, n: usize) -> Self {
        self.config.work_items = n;
        self
    }

    pub fn warmup(mut self, n: usize) -> Self {
        self.config.warmup = n;
        self
    }

    pub fn reps(mut self, n: usize) -> Self {
        self.config.reps = n;
        self
    }

    pub fn unified_memory(mut self, unified: bool) -> Self {
        self.config.unified_memory = unified;
        self
    }

    pub fn pin_workers(mut self, pin: bool) -> Self {
        self.config.pin_workers = pin;
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
        assert_eq!(Config::default().strategy(), Strategy::Static);
    }

    #[test]
    fn test_rejects_zero_threads() {
        let err = Config::builder().num_threads(0).build().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_too_many_threads() {
        assert!(Config::builder().num_threads(4096).build().is_err());
    }

    #[test]
    fn test_rejects_zero_reps_and_items() {
        assert!(Config::builder().reps(0).build().is_err());
        assert!(Config::builder().work_items(0).build().is_err());
    }

    #[test]
    fn test_no_device_requires_full_host_share() {
        assert!(Config::builder().work_groups(0).alpha(0.5).build().is_err());
        assert!(Config::builder().work_groups(0).alpha(1.0).build().is_ok());
        // dynamic lets the host drain everything
        assert!(Config::builder().work_groups(0).dynamic().build().is_ok());
    }

    #[test]
    fn test_dynamic_builder() {
        let config = Config::builder().dynamic().build().unwrap();
        assert_eq!(config.strategy(), Strategy::Dynamic);
    }

    #[test]
    fn test_total_iterations() {
        let config = Config::builder().warmup(3).reps(7).build().unwrap();
        assert_eq!(config.total_iterations(), 10);
    }
}
