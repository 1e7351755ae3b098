//! Point de contrôle UPnP HomeCtl : découverte SSDP, résolution des
//! descriptions de devices et appels d'actions SOAP.

pub mod discovery;
pub mod errors;
pub mod model;
pub mod provider;
pub mod scpd;
pub mod soap_client;
pub mod transport;

use std::time::Duration;

pub use discovery::{
    DeviceDescriptionProvider, DiscoveryPipeline, DiscoverySession, LocationRegistry,
    PendingResolve, ResolvedDevice, resolve_concurrently,
};
pub use errors::{
    DescriptionParseError, DirectionParseError, FetchError, InvocationError, ResolveError,
};
pub use model::{
    Action, AllowedRange, Argument, Device, Direction, Service, ServiceEndpoint, ServiceFailure,
    StateVariable,
};
pub use provider::HttpXmlDescriptionProvider;
pub use scpd::parse_scpd;
pub use soap_client::{ActionInvoker, ActionOutput, SoapRequest, decode_action_response};
pub use transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, TransportError, UreqTransport};

pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);
