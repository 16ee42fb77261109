use clap::Args;
use shmheap::SegmentConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Where to find the segment. Flags override the `SHMHEAP_*` environment.
#[derive(Debug, Clone, Args)]
pub struct CtlConfig {
    /// Path prefix of the segment's backing files.
    #[arg(long, global = true, env = "SHMHEAP_PREFIX")]
    pub prefix: Option<PathBuf>,

    /// Name of the segment's POSIX semaphore, with a leading slash.
    #[arg(long, global = true, env = "SHMHEAP_LOCK_NAME")]
    pub lock_name: Option<String>,

    /// Wait up to this many seconds for the segment to be initialised.
    #[arg(long, global = true, value_name = "SECS")]
    pub wait: Option<u64>,

    #[arg(long, global = true, default_value_t = 200, value_name = "MS")]
    pub poll_interval_ms: u64,
}

impl CtlConfig {
    pub fn segment(&self) -> SegmentConfig {
        let defaults = SegmentConfig::from_env();
        match (&self.prefix, &self.lock_name) {
            (None, None) => defaults,
            (prefix, lock_name) => {
                let prefix = prefix
                    .clone()
                    .unwrap_or_else(|| strip_suffix(&defaults.ctl_path));
                let lock_name = lock_name.clone().unwrap_or(defaults.lock_name);
                SegmentConfig {
                    cluster_size: defaults.cluster_size,
                    ..SegmentConfig::with_prefix(prefix, lock_name)
                }
            }
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait.map(Duration::from_secs)
    }
}

fn strip_suffix(ctl_path: &std::path::Path) -> PathBuf {
    let raw = ctl_path.to_string_lossy();
    PathBuf::from(
        raw.strip_suffix(shmheap::paths::CTL_SUFFIX)
            .unwrap_or(&raw)
            .to_string(),
    )
}
