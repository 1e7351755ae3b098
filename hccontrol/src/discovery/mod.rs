use crate::errors::ResolveError;
use crate::model::Device;

pub mod manager;
pub mod pending;
pub mod upnp_discovery;

pub use manager::LocationRegistry;
pub use pending::{PendingResolve, ResolvedDevice, resolve_concurrently};
pub use upnp_discovery::{DiscoveryPipeline, DiscoverySession};

/// Construit un [`Device`] complet à partir de l’URL de description
/// annoncée par SSDP.
///
/// L’implémentation HTTP fait un GET sur `location`, parse la description
/// puis chaque SCPD référencé.
pub trait DeviceDescriptionProvider: Send + Sync {
    fn resolve_device(&self, location: &str) -> Result<Device, ResolveError>;
}
