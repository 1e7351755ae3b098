use std::sync::Arc;
use std::time::Duration;

use quick_xml::{Error as XmlError, Reader, escape::resolve_predefined_entity, events::Event};
use tracing::{debug, info, warn};

use crate::discovery::DeviceDescriptionProvider;
use crate::errors::{DescriptionParseError, FetchError, ResolveError};
use crate::model::{Device, Service, ServiceEndpoint, ServiceFailure};
use crate::scpd::parse_scpd;
use crate::transport::{HttpRequest, HttpTransport, UreqTransport};

/// One `<service>` entry of a device description, paths as written.
#[derive(Debug, Default, Clone)]
struct ParsedService {
    service_type: Option<String>,
    service_id: Option<String>,
    scpd_url: Option<String>,
    control_url: Option<String>,
    event_sub_url: Option<String>,
}

impl ParsedService {
    fn into_endpoint(self, base: &str) -> Result<ServiceEndpoint, DescriptionParseError> {
        let service_type = self
            .service_type
            .ok_or(DescriptionParseError::MissingElement("serviceType"))?;
        let service_id = self
            .service_id
            .ok_or(DescriptionParseError::MissingElement("serviceId"))?;
        let scpd_url = self
            .scpd_url
            .ok_or(DescriptionParseError::MissingElement("SCPDURL"))?;
        let control_url = self
            .control_url
            .ok_or(DescriptionParseError::MissingElement("controlURL"))?;
        let event_sub_url = self
            .event_sub_url
            .ok_or(DescriptionParseError::MissingElement("eventSubURL"))?;

        Ok(ServiceEndpoint {
            service_type,
            service_id,
            scpd_url: join_url(base, &scpd_url),
            control_url: join_url(base, &control_url),
            event_sub_url: join_url(base, &event_sub_url),
        })
    }
}

/// Parsed root description document.
#[derive(Debug, Default)]
struct ParsedDeviceDescription {
    udn: Option<String>,
    device_type: Option<String>,
    friendly_name: Option<String>,
    manufacturer: Option<String>,
    model_name: Option<String>,
    services: Vec<ParsedService>,
}

impl ParsedDeviceDescription {
    fn require_fields(self) -> Result<Self, DescriptionParseError> {
        if self.device_type.is_none() {
            return Err(DescriptionParseError::MissingElement("deviceType"));
        }
        if self.friendly_name.is_none() {
            return Err(DescriptionParseError::MissingElement("friendlyName"));
        }
        Ok(self)
    }
}

/// HTTP-based XML description provider (UPnP device description.xml + SCPDs)
pub struct HttpXmlDescriptionProvider {
    transport: Arc<dyn HttpTransport>,
}

impl HttpXmlDescriptionProvider {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Provider over [`UreqTransport`] with the given HTTP timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(Arc::new(UreqTransport::new(timeout)))
    }

    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        debug!("Fetching description at {}", url);
        let response = self.transport.request(HttpRequest::get(url))?;
        if !response.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status,
            });
        }
        Ok(response.body)
    }

    fn resolve_service(&self, base: &str, parsed: ParsedService) -> Result<Service, ResolveError> {
        let endpoint = Arc::new(parsed.into_endpoint(base)?);
        let scpd = self.fetch(&endpoint.scpd_url)?;
        Ok(parse_scpd(&scpd, endpoint)?)
    }
}

impl DeviceDescriptionProvider for HttpXmlDescriptionProvider {
    fn resolve_device(&self, location: &str) -> Result<Device, ResolveError> {
        let body = self.fetch(location)?;
        debug!("Parsing description XML at {}", location);
        let parsed = parse_device_description(&body)?.require_fields()?;

        let base = base_url(location);
        let mut services = Vec::new();
        let mut failures = Vec::new();

        for entry in parsed.services {
            let service_type = entry.service_type.clone();
            let scpd_url = entry.scpd_url.as_deref().map(|p| join_url(&base, p));

            match self.resolve_service(&base, entry) {
                Ok(service) => services.push(service),
                Err(error) => {
                    warn!(
                        "❌ Skipping service {} of {}: {}",
                        service_type.as_deref().unwrap_or("<unknown>"),
                        location,
                        error
                    );
                    failures.push(ServiceFailure {
                        service_type,
                        scpd_url,
                        error,
                    });
                }
            }
        }

        let device = Device::new(
            location,
            parsed.device_type.unwrap_or_default(),
            parsed.friendly_name.unwrap_or_default(),
        )
        .with_identity(parsed.udn, parsed.manufacturer, parsed.model_name)
        .with_services(services, failures);

        info!(
            "✅ Resolved {} ({} services, {} unavailable)",
            device,
            device.services().len(),
            device.service_failures().len()
        );
        Ok(device)
    }
}

/// Streams a root description document.
///
/// Identity fields are the first ones found directly under a `<device>`
/// element, in document order (the root device comes before its embedded
/// devices). Services are collected at any depth.
fn parse_device_description(xml: &[u8]) -> Result<ParsedDeviceDescription, DescriptionParseError> {
    let mut reader = Reader::from_reader(xml);

    let mut buf = Vec::new();
    let mut parsed = ParsedDeviceDescription::default();
    let mut stack: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut current_service: Option<ParsedService> = None;

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if name == "service" {
                    current_service = Some(ParsedService::default());
                }
                stack.push(name);
                text.clear();
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if name == "service" {
                    parsed.services.push(ParsedService::default());
                }
                text.clear();
            }
            Event::Text(e) => {
                text.push_str(&e.decode().map_err(XmlError::Encoding)?);
            }
            Event::CData(e) => {
                text.push_str(&e.decode().map_err(XmlError::Encoding)?);
            }
            Event::GeneralRef(e) => {
                if let Some(ch) = e.resolve_char_ref()? {
                    text.push(ch);
                } else {
                    let entity = e.decode().map_err(XmlError::Encoding)?;
                    match resolve_predefined_entity(&entity) {
                        Some(resolved) => text.push_str(resolved),
                        None => {
                            text.push('&');
                            text.push_str(&entity);
                            text.push(';');
                        }
                    }
                }
            }
            Event::End(_) => {
                let Some(name) = stack.pop() else {
                    continue;
                };
                let value = text.trim().to_string();
                text.clear();

                if name == "service" {
                    if let Some(service) = current_service.take() {
                        parsed.services.push(service);
                    }
                    continue;
                }
                if value.is_empty() {
                    continue;
                }

                match stack.last().map(String::as_str) {
                    Some("device") => {
                        let slot = match name.as_str() {
                            "deviceType" => &mut parsed.device_type,
                            "friendlyName" => &mut parsed.friendly_name,
                            "UDN" => &mut parsed.udn,
                            "manufacturer" => &mut parsed.manufacturer,
                            "modelName" => &mut parsed.model_name,
                            _ => continue,
                        };
                        if slot.is_none() {
                            *slot = Some(value);
                        }
                    }
                    Some("service") => {
                        if let Some(service) = current_service.as_mut() {
                            match name.as_str() {
                                "serviceType" => service.service_type = Some(value),
                                "serviceId" => service.service_id = Some(value),
                                "SCPDURL" => service.scpd_url = Some(value),
                                "controlURL" => service.control_url = Some(value),
                                "eventSubURL" => service.event_sub_url = Some(value),
                                _ => {}
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(parsed)
}

/// Directory of a device location: every path segment but the last,
/// without the trailing `/`.
///
/// A location with no path after the authority is its own base.
pub(crate) fn base_url(location: &str) -> String {
    let location = location
        .split(['?', '#'])
        .next()
        .unwrap_or(location);

    let path_start = match location.find("://") {
        Some(idx) => idx + 3,
        None => 0,
    };

    match location[path_start..].rfind('/') {
        Some(idx) => location[..path_start + idx].to_string(),
        None => location.to_string(),
    }
}

/// Appends a path from a description document to a base from [`base_url`].
///
/// Absolute `http(s)` URLs are kept as they are.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}
