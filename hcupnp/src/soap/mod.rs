//! # Module SOAP - Simple Object Access Protocol
//!
//! Enveloppes SOAP côté control point : construction des requêtes d'action,
//! décodage des réponses `<Action>Response` et des SOAP Faults UPnP.
//!
//! ## Architecture
//!
//! - [`build_soap_request`] : enveloppe d'appel d'une action
//! - [`parse_soap_envelope`] / [`extract_action_response`] : décodage d'une réponse
//! - [`SoapFault`] : erreur SOAP, avec le détail `UPnPError` éventuel
//!
//! ## Example
//!
//! ```
//! use hcupnp::soap::{build_soap_response, extract_action_response, parse_soap_envelope};
//!
//! let xml = build_soap_response(
//!     "urn:schemas-upnp-org:service:WANIPConnection:1",
//!     "GetExternalIPAddress",
//!     vec![("NewExternalIPAddress".to_string(), "203.0.113.5".to_string())],
//! )
//! .unwrap();
//!
//! let envelope = parse_soap_envelope(xml.as_bytes()).unwrap();
//! let values = extract_action_response(&envelope, "GetExternalIPAddress").unwrap();
//! assert_eq!(values.get("NewExternalIPAddress").map(String::as_str), Some("203.0.113.5"));
//! ```

mod builder;
mod envelope;
mod fault;
mod parser;

pub use builder::{build_soap_request, build_soap_response};
pub use envelope::{SoapBody, SoapEnvelope};
pub use fault::{SoapFault, UpnpError, build_soap_fault};
pub use parser::{
    SoapAction, SoapParseError, extract_action_response, normalize_soap_xml, parse_soap_action,
    parse_soap_envelope,
};

/// Namespace de l'enveloppe SOAP 1.1
pub const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// Style d'encodage exigé par UPnP
pub const SOAP_ENCODING_STYLE: &str = "http://schemas.xmlsoap.org/soap/encoding/";

/// Namespace du détail `UPnPError` d'un fault
pub const UPNP_CONTROL_NS: &str = "urn:schemas-upnp-org:control-1-0";

/// Content-Type des requêtes de contrôle
pub const SOAP_CONTENT_TYPE: &str = r#"text/xml; charset="utf-8""#;

/// Valeur de l'en-tête `SOAPAction` : `"urn:service#Action"`
pub fn soap_action_header(service_type: &str, action: &str) -> String {
    format!(r#""{}#{}""#, service_type, action)
}
