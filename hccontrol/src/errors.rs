use hcupnp::soap::{SoapFault, SoapParseError};
use thiserror::Error;

use crate::transport::TransportError;

/// Failure to retrieve a description document.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("GET {url} returned HTTP status {status}")]
    Status { url: String, status: u16 },
}

/// An argument direction other than `in` or `out`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid argument direction '{0}'")]
pub struct DirectionParseError(pub String);

/// A description document that cannot be turned into the object model.
#[derive(Error, Debug)]
pub enum DescriptionParseError {
    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("XML parsing error: {0}")]
    XmlTree(#[from] xmltree::ParseError),
    #[error("Missing required element: {0}")]
    MissingElement(&'static str),
    #[error("Argument {argument} of action {action} has invalid direction '{direction}'")]
    InvalidDirection {
        action: String,
        argument: String,
        direction: String,
    },
    #[error("Argument {argument} of action {action} references undeclared state variable {variable}")]
    UndeclaredStateVariable {
        action: String,
        argument: String,
        variable: String,
    },
}

/// Why a device (or one of its services) could not be resolved.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),
    #[error("Description error: {0}")]
    Parse(#[from] DescriptionParseError),
}

/// Failure of one action call. Never retried.
#[derive(Error, Debug)]
pub enum InvocationError {
    #[error("Invalid control URL {0}")]
    InvalidControlUrl(String),
    #[error("Failed to build SOAP request for {action}: {source}")]
    Envelope {
        action: String,
        #[source]
        source: xmltree::Error,
    },
    #[error("Soap Error: Upnp action call {action}: {source}")]
    Transport {
        action: String,
        #[source]
        source: TransportError,
    },
    #[error("{action} failed with HTTP status {status}{}", fault_suffix(.fault))]
    Status {
        action: String,
        status: u16,
        fault: Option<SoapFault>,
    },
    #[error("{action} returned a SOAP fault: {fault}")]
    Fault { action: String, fault: SoapFault },
    #[error("{action} returned a malformed reply: {source}")]
    MalformedReply {
        action: String,
        #[source]
        source: SoapParseError,
    },
    #[error("Missing {0}Response element in SOAP body")]
    MissingResponse(String),
}

fn fault_suffix(fault: &Option<SoapFault>) -> String {
    match fault {
        Some(fault) => format!(" ({})", fault),
        None => String::new(),
    }
}

impl InvocationError {
    /// The SOAP fault sent by the device, if any
    pub fn fault(&self) -> Option<&SoapFault> {
        match self {
            InvocationError::Status { fault, .. } => fault.as_ref(),
            InvocationError::Fault { fault, .. } => Some(fault),
            _ => None,
        }
    }
}
