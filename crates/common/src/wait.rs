use anyhow::bail;
use std::time::{Duration, Instant};

/// Poll `connect` until it succeeds or `timeout` elapses.
///
/// Used by processes that start before the coordinator has initialised the
/// segment. A `timeout` of `None` waits forever.
pub fn wait_for_resource<F, T, E>(
    mut connect: F,
    poll_interval: Duration,
    timeout: Option<Duration>,
    resource_name: &str,
) -> anyhow::Result<T>
where
    F: FnMut() -> Result<T, E>,
    E: std::fmt::Display,
{
    let started = Instant::now();
    loop {
        match connect() {
            Ok(resource) => {
                tracing::info!(resource = resource_name, "Resource available");
                return Ok(resource);
            }
            Err(e) => {
                if timeout.is_some_and(|t| started.elapsed() >= t) {
                    bail!("timed out waiting for {resource_name}: {e}");
                }
                tracing::debug!(resource = resource_name, error = %e, "Waiting for resource");
                std::thread::sleep(poll_interval);
            }
        }
    }
}
