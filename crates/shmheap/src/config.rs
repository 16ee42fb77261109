use crate::paths;
use std::env;
use std::path::{Path, PathBuf};

/// Where a segment's backing artifacts live.
///
/// All processes sharing a heap must use equal configs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentConfig {
    pub ctl_path: PathBuf,
    pub headers_path: PathBuf,
    pub blocks_path: PathBuf,
    pub lock_name: String,
    /// Byte capacity per cluster used by `initialise` with a uniform layout.
    pub cluster_size: u32,
}

impl SegmentConfig {
    pub fn with_prefix(prefix: impl AsRef<Path>, lock_name: impl Into<String>) -> Self {
        let prefix = prefix.as_ref().as_os_str().to_string_lossy().into_owned();
        Self {
            ctl_path: PathBuf::from(format!("{prefix}{}", paths::CTL_SUFFIX)),
            headers_path: PathBuf::from(format!("{prefix}{}", paths::HEADERS_SUFFIX)),
            blocks_path: PathBuf::from(format!("{prefix}{}", paths::BLOCKS_SUFFIX)),
            lock_name: lock_name.into(),
            cluster_size: paths::DEFAULT_CLUSTER_SIZE,
        }
    }

    pub fn from_env() -> Self {
        let prefix = env::var("SHMHEAP_PREFIX").unwrap_or_else(|_| paths::DEFAULT_PREFIX.to_string());

        let lock_name =
            env::var("SHMHEAP_LOCK_NAME").unwrap_or_else(|_| paths::DEFAULT_LOCK_NAME.to_string());

        let cluster_size = env::var("SHMHEAP_CLUSTER_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(paths::DEFAULT_CLUSTER_SIZE);

        Self {
            cluster_size,
            ..Self::with_prefix(prefix, lock_name)
        }
    }

    pub fn artifacts(&self) -> [&Path; 3] {
        [&self.ctl_path, &self.headers_path, &self.blocks_path]
    }
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self::with_prefix(paths::DEFAULT_PREFIX, paths::DEFAULT_LOCK_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_prefix_derives_three_paths() {
        let config = SegmentConfig::with_prefix("/tmp/heap", "/heap_lock");
        assert_eq!(config.ctl_path, PathBuf::from("/tmp/heap_ctl"));
        assert_eq!(config.headers_path, PathBuf::from("/tmp/heap_headers"));
        assert_eq!(config.blocks_path, PathBuf::from("/tmp/heap_blocks"));
        assert_eq!(config.lock_name, "/heap_lock");
        assert_eq!(config.cluster_size, paths::DEFAULT_CLUSTER_SIZE);
    }

    #[test]
    fn test_default_uses_shared_memory_prefix() {
        let config = SegmentConfig::default();
        assert!(config.ctl_path.starts_with("/dev/shm"));
        assert_eq!(config.lock_name, paths::DEFAULT_LOCK_NAME);
    }
}
