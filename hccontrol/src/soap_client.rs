use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use hcupnp::soap::{
    SOAP_CONTENT_TYPE, SoapFault, SoapParseError, build_soap_request, extract_action_response,
    normalize_soap_xml, parse_soap_envelope, soap_action_header,
};
use tracing::{debug, info, warn};
use url::Url;

use crate::errors::InvocationError;
use crate::model::Action;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, UreqTransport};

/// Output arguments of a successful call, by name
pub type ActionOutput = HashMap<String, String>;

/// A control request ready to be POSTed.
#[derive(Debug, Clone)]
pub struct SoapRequest {
    pub control_url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
    /// Declared inputs the caller did not supply
    pub missing: Vec<String>,
}

impl SoapRequest {
    /// Builds the request for `action` from caller-supplied name/value pairs.
    ///
    /// Only declared input arguments are sent, in declaration order. Unknown
    /// names are ignored. Missing inputs are logged, listed in
    /// [`SoapRequest::missing`], and the request is still built.
    pub fn for_action<I, K, V>(action: &Action, args: I) -> Result<Self, InvocationError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let supplied: HashMap<String, String> = args
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
            .collect();

        let in_args = action.in_args();
        let declared: HashSet<&str> = in_args.iter().copied().collect();
        for name in supplied.keys() {
            if !declared.contains(name.as_str()) {
                debug!("Ignoring argument {} not accepted by {}", name, action.name());
            }
        }

        let mut pairs: Vec<(&str, &str)> = Vec::with_capacity(in_args.len());
        let mut missing: Vec<&str> = Vec::new();
        for &name in &in_args {
            match supplied.get(name) {
                Some(value) => pairs.push((name, value.as_str())),
                None => missing.push(name),
            }
        }
        if !missing.is_empty() {
            warn!(
                "Insufficient arguments for {}: missing {}",
                action.name(),
                missing.join(", ")
            );
        }

        let service = action.service();
        let body = build_soap_request(&service.service_type, action.name(), &pairs).map_err(
            |source| InvocationError::Envelope {
                action: action.name().to_string(),
                source,
            },
        )?;

        let host = host_header(&service.control_url)?;
        let headers = vec![
            ("Host".to_string(), host),
            ("Content-Length".to_string(), body.len().to_string()),
            ("Content-Type".to_string(), SOAP_CONTENT_TYPE.to_string()),
            (
                "SOAPAction".to_string(),
                soap_action_header(&service.service_type, action.name()),
            ),
        ];

        Ok(Self {
            control_url: service.control_url.clone(),
            headers,
            body,
            missing: missing.into_iter().map(str::to_string).collect(),
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn into_http_request(self) -> HttpRequest {
        HttpRequest::post(self.control_url, self.headers, self.body.into_bytes())
    }
}

/// `host[:port]` of the control URL, port only when written explicitly
fn host_header(control_url: &str) -> Result<String, InvocationError> {
    let url =
        Url::parse(control_url).map_err(|_| InvocationError::InvalidControlUrl(control_url.to_string()))?;
    let host = url
        .host_str()
        .ok_or_else(|| InvocationError::InvalidControlUrl(control_url.to_string()))?;
    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Decodes the reply to `action`.
///
/// Non-2xx replies become [`InvocationError::Status`], with the SOAP fault
/// when the body carries one.
pub fn decode_action_response(
    action: &str,
    response: &HttpResponse,
) -> Result<ActionOutput, InvocationError> {
    let xml = normalize_soap_xml(&response.text());

    if !response.is_success() {
        let fault = parse_soap_envelope(xml.as_bytes())
            .ok()
            .and_then(|envelope| SoapFault::from_envelope(&envelope));
        return Err(InvocationError::Status {
            action: action.to_string(),
            status: response.status,
            fault,
        });
    }

    let envelope =
        parse_soap_envelope(xml.as_bytes()).map_err(|source| InvocationError::MalformedReply {
            action: action.to_string(),
            source,
        })?;

    if let Some(fault) = SoapFault::from_envelope(&envelope) {
        return Err(InvocationError::Fault {
            action: action.to_string(),
            fault,
        });
    }

    extract_action_response(&envelope, action).map_err(|e| match e {
        SoapParseError::MissingResponse(_) => InvocationError::MissingResponse(action.to_string()),
        source => InvocationError::MalformedReply {
            action: action.to_string(),
            source,
        },
    })
}

/// Calls actions of resolved services.
///
/// Every call is one POST, never retried.
pub struct ActionInvoker {
    transport: Arc<dyn HttpTransport>,
}

impl ActionInvoker {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Invoker over [`UreqTransport`] with the given HTTP timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(Arc::new(UreqTransport::new(timeout)))
    }

    pub fn invoke<I, K, V>(&self, action: &Action, args: I) -> Result<ActionOutput, InvocationError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let request = SoapRequest::for_action(action, args)?;
        debug!(
            "📤 {} -> {}\n<details>\n\n```xml\n{}\n```\n</details>\n",
            action.name(),
            request.control_url,
            request.body
        );

        let response = self
            .transport
            .request(request.into_http_request())
            .map_err(|source| InvocationError::Transport {
                action: action.name().to_string(),
                source,
            })?;

        let output = decode_action_response(action.name(), &response)?;
        info!(
            "✅ {} returned {} value(s)",
            action.name(),
            output.len()
        );
        Ok(output)
    }
}
