use std::io;
use std::sync::Arc;

use hcupnp::ssdp::{SSDP_ALL, SearchResponses, SsdpClient, SsdpHeaders, SsdpTransport};
use tracing::{debug, info, trace};

use super::manager::LocationRegistry;
use super::pending::PendingResolve;
use super::DeviceDescriptionProvider;

/// SSDP records -> one [`PendingResolve`] per distinct location.
pub struct DiscoveryPipeline<T: SsdpTransport> {
    client: SsdpClient<T>,
    provider: Arc<dyn DeviceDescriptionProvider>,
    search_target: String,
    mx: u32,
}

impl<T: SsdpTransport> DiscoveryPipeline<T> {
    /// Pipeline searching `ssdp:all` with MX 1
    pub fn new(client: SsdpClient<T>, provider: Arc<dyn DeviceDescriptionProvider>) -> Self {
        Self {
            client,
            provider,
            search_target: SSDP_ALL.to_string(),
            mx: 1,
        }
    }

    pub fn with_search_target(mut self, search_target: impl Into<String>) -> Self {
        self.search_target = search_target.into();
        self
    }

    pub fn with_mx(mut self, mx: u32) -> Self {
        self.mx = mx;
        self
    }

    pub fn client(&self) -> &SsdpClient<T> {
        &self.client
    }

    /// Starts one discovery session: sends the M-SEARCH and returns the
    /// deduplicated, lazily produced resolutions.
    pub fn discover_all(&self) -> io::Result<DiscoverySession<SearchResponses<'_, T>>> {
        let records = self.client.discover(&self.search_target, self.mx)?;
        Ok(DiscoverySession::new(records, self.provider.clone()))
    }
}

/// One session of a [`DiscoveryPipeline`]; owns the seen-location set.
pub struct DiscoverySession<I>
where
    I: Iterator<Item = SsdpHeaders>,
{
    records: I,
    provider: Arc<dyn DeviceDescriptionProvider>,
    registry: LocationRegistry,
}

impl<I> DiscoverySession<I>
where
    I: Iterator<Item = SsdpHeaders>,
{
    pub fn new(records: I, provider: Arc<dyn DeviceDescriptionProvider>) -> Self {
        Self {
            records,
            provider,
            registry: LocationRegistry::new(),
        }
    }

    /// Number of distinct locations handed out so far
    pub fn seen(&self) -> usize {
        self.registry.len()
    }
}

impl<I> Iterator for DiscoverySession<I>
where
    I: Iterator<Item = SsdpHeaders>,
{
    type Item = PendingResolve;

    fn next(&mut self) -> Option<PendingResolve> {
        for record in self.records.by_ref() {
            let Some(location) = record.location() else {
                trace!(
                    "SSDP record without LOCATION from {:?}, skipping",
                    record.from()
                );
                continue;
            };

            if self.registry.first_sighting(location) {
                info!(
                    "🆕 New device at {} (ST={})",
                    location,
                    record.search_target().unwrap_or("-")
                );
                return Some(PendingResolve::new(location, self.provider.clone()));
            }
            debug!("Already seen {}, ignoring", location);
        }
        None
    }
}
