//! Deferred device resolutions and the bounded worker pool that runs them.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::bounded;
use tracing::{debug, warn};

use super::DeviceDescriptionProvider;
use crate::errors::ResolveError;
use crate::model::Device;

/// An unstarted resolution of one discovered location.
///
/// Nothing touches the network until [`PendingResolve::resolve`] is called.
#[derive(Clone)]
pub struct PendingResolve {
    location: String,
    provider: Arc<dyn DeviceDescriptionProvider>,
}

impl PendingResolve {
    pub fn new(location: impl Into<String>, provider: Arc<dyn DeviceDescriptionProvider>) -> Self {
        Self {
            location: location.into(),
            provider,
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Fetches and parses the device and its services
    pub fn resolve(self) -> Result<Device, ResolveError> {
        self.provider.resolve_device(&self.location)
    }
}

impl std::fmt::Debug for PendingResolve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingResolve")
            .field("location", &self.location)
            .finish()
    }
}

/// Outcome of one resolution run by [`resolve_concurrently`]
#[derive(Debug)]
pub struct ResolvedDevice {
    pub location: String,
    pub result: Result<Device, ResolveError>,
}

/// Runs the pending resolutions on at most `workers` threads.
///
/// The feeder blocks on a channel bounded to `workers`, so discovery is only
/// pulled as fast as devices get resolved. `on_resolved` runs on the calling
/// thread, in completion order. Returns once every resolution has finished.
pub fn resolve_concurrently<I, F>(pending: I, workers: usize, mut on_resolved: F)
where
    I: Iterator<Item = PendingResolve> + Send,
    F: FnMut(ResolvedDevice),
{
    let workers = workers.max(1);
    let (job_tx, job_rx) = bounded::<PendingResolve>(workers);
    let (result_tx, result_rx) = bounded::<ResolvedDevice>(workers);

    thread::scope(|scope| {
        scope.spawn(move || {
            for job in pending {
                if job_tx.send(job).is_err() {
                    break;
                }
            }
            // job_tx dropped here: workers drain and exit
        });

        for id in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                for job in job_rx.iter() {
                    let location = job.location().to_string();
                    debug!("🔎 worker {} resolving {}", id, location);
                    let result = job.resolve();
                    if let Err(e) = &result {
                        warn!("❌ Failed to resolve {}: {}", location, e);
                    }
                    if result_tx.send(ResolvedDevice { location, result }).is_err() {
                        break;
                    }
                }
            });
        }
        drop(job_rx);
        drop(result_tx);

        for resolved in result_rx.iter() {
            on_resolved(resolved);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FetchError;
    use crate::transport::TransportError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingProvider {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl DeviceDescriptionProvider for CountingProvider {
        fn resolve_device(&self, location: &str) -> Result<Device, ResolveError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if location.ends_with("bad.xml") {
                return Err(FetchError::Transport(TransportError::new(
                    location,
                    std::io::Error::from(std::io::ErrorKind::TimedOut),
                ))
                .into());
            }
            Ok(Device::new(location, "urn:x:device:Y:1", "Y"))
        }
    }

    #[test]
    fn pool_is_bounded_and_failures_are_isolated() {
        let provider = Arc::new(CountingProvider {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let dyn_provider: Arc<dyn DeviceDescriptionProvider> = provider.clone();

        let pending: Vec<PendingResolve> = (0..8)
            .map(|i| {
                let file = if i == 3 { "bad.xml" } else { "desc.xml" };
                PendingResolve::new(format!("http://10.0.0.{}/{}", i, file), dyn_provider.clone())
            })
            .collect();

        let mut results = Vec::new();
        resolve_concurrently(pending.into_iter(), 2, |r| results.push(r));

        assert_eq!(results.len(), 8);
        assert_eq!(results.iter().filter(|r| r.result.is_err()).count(), 1);
        assert!(provider.peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn zero_workers_still_resolves() {
        let provider: Arc<dyn DeviceDescriptionProvider> = Arc::new(CountingProvider {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let pending = vec![PendingResolve::new("http://10.0.0.1/desc.xml", provider)];

        let mut count = 0;
        resolve_concurrently(pending.into_iter(), 0, |_| count += 1);
        assert_eq!(count, 1);
    }
}
