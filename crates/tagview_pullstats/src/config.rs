use std::time::Duration;

use serde::Deserialize;

use crate::worker::FlushConfig;

/// `pull_statistics` section of the configuration file.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PullStatisticsConfig {
    pub enabled: bool,
    pub flush_interval_seconds: u64,
    pub batch_size: usize,
    pub scan_count: usize,
}

impl Default for PullStatisticsConfig {
    fn default() -> Self {
        let flush = FlushConfig::default();
        Self {
            enabled: true,
            flush_interval_seconds: flush.flush_interval.as_secs(),
            batch_size: flush.batch_size,
            scan_count: flush.scan_count,
        }
    }
}

impl PullStatisticsConfig {
    pub fn flush_config(&self) -> FlushConfig {
        FlushConfig {
            // a zero period would make the flush interval panic
            flush_interval: Duration::from_secs(self.flush_interval_seconds.max(1)),
            batch_size: self.batch_size,
            scan_count: self.scan_count.max(1),
        }
    }
}

#[cfg(test)]
mod test {
    use rstest::*;

    use super::*;

    #[rstest]
    fn defaults() {
        let config: PullStatisticsConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, PullStatisticsConfig::default());
        assert!(config.enabled);
        assert_eq!(config.flush_config(), FlushConfig::default());
    }

    #[rstest]
    fn partial_override() {
        let config: PullStatisticsConfig =
            serde_yaml::from_str("flush_interval_seconds: 0\nbatch_size: 50\n").unwrap();
        let flush = config.flush_config();
        assert_eq!(flush.flush_interval, Duration::from_secs(1));
        assert_eq!(flush.batch_size, 50);
        assert_eq!(flush.scan_count, 100);
    }
}
