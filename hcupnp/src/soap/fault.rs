//! SOAP Faults pour UPnP

use std::fmt;

use xmltree::{Element, EmitterConfig, XMLNode};

use super::{SOAP_ENVELOPE_NS, SoapEnvelope, UPNP_CONTROL_NS};

/// Erreur SOAP (Fault)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapFault {
    /// Code d'erreur (ex: "s:Client")
    pub fault_code: String,

    /// Description de l'erreur
    pub fault_string: String,

    /// Détails UPnP optionnels
    pub upnp_error: Option<UpnpError>,
}

/// Erreur UPnP spécifique
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpnpError {
    /// Code d'erreur UPnP (ex: "401", "714")
    pub error_code: String,

    pub error_description: String,
}

impl SoapFault {
    /// Reads the `Fault` element of an envelope body, if there is one.
    pub fn from_envelope(envelope: &SoapEnvelope) -> Option<Self> {
        let fault = envelope.body.child("Fault")?;

        let upnp_error = fault
            .get_child("detail")
            .and_then(|detail| detail.get_child("UPnPError"))
            .map(|err| UpnpError {
                error_code: child_text(err, "errorCode"),
                error_description: child_text(err, "errorDescription"),
            });

        Some(Self {
            fault_code: child_text(fault, "faultcode"),
            fault_string: child_text(fault, "faultstring"),
            upnp_error,
        })
    }

    /// UPnP error code, when the device sent one
    pub fn upnp_code(&self) -> Option<u32> {
        self.upnp_error
            .as_ref()
            .and_then(|e| e.error_code.trim().parse().ok())
    }
}

impl fmt::Display for SoapFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.upnp_error {
            Some(err) => write!(
                f,
                "UPnP error {}: {} ({})",
                err.error_code, err.error_description, self.fault_string
            ),
            None => write!(f, "{}: {}", self.fault_code, self.fault_string),
        }
    }
}

fn child_text(parent: &Element, name: &str) -> String {
    parent
        .get_child(name)
        .and_then(|c| c.get_text())
        .map(|t| t.trim().to_string())
        .unwrap_or_default()
}

fn text_element(name: &str, text: &str) -> Element {
    let mut elem = Element::new(name);
    elem.children.push(XMLNode::Text(text.to_string()));
    elem
}

/// Construit un SOAP Fault XML
///
/// # Arguments
///
/// * `fault_code` - Code du fault (ex: "s:Client")
/// * `fault_string` - Message d'erreur
/// * `upnp_error_code` - Code d'erreur UPnP optionnel (ex: "401")
/// * `upnp_error_desc` - Description d'erreur UPnP optionnelle
pub fn build_soap_fault(
    fault_code: &str,
    fault_string: &str,
    upnp_error_code: Option<&str>,
    upnp_error_desc: Option<&str>,
) -> Result<String, xmltree::Error> {
    let mut fault = Element::new("s:Fault");
    fault
        .children
        .push(XMLNode::Element(text_element("faultcode", fault_code)));
    fault
        .children
        .push(XMLNode::Element(text_element("faultstring", fault_string)));

    // detail (si erreur UPnP)
    if let (Some(code), Some(desc)) = (upnp_error_code, upnp_error_desc) {
        let mut upnp_error = Element::new("UPnPError");
        upnp_error
            .attributes
            .insert("xmlns".to_string(), UPNP_CONTROL_NS.to_string());
        upnp_error
            .children
            .push(XMLNode::Element(text_element("errorCode", code)));
        upnp_error
            .children
            .push(XMLNode::Element(text_element("errorDescription", desc)));

        let mut detail = Element::new("detail");
        detail.children.push(XMLNode::Element(upnp_error));
        fault.children.push(XMLNode::Element(detail));
    }

    let mut body = Element::new("s:Body");
    body.children.push(XMLNode::Element(fault));

    let mut envelope = Element::new("s:Envelope");
    envelope
        .attributes
        .insert("xmlns:s".to_string(), SOAP_ENVELOPE_NS.to_string());
    envelope.children.push(XMLNode::Element(body));

    let mut buf = Vec::new();
    let config = EmitterConfig::new()
        .perform_indent(true)
        .indent_string("  ");
    envelope.write_with_config(&mut buf, config)?;

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soap::parse_soap_envelope;

    #[test]
    fn test_build_simple_fault() {
        let xml = build_soap_fault("s:Client", "Invalid Action", None, None).unwrap();

        assert!(xml.contains("<s:Fault>"));
        assert!(xml.contains("<faultcode>s:Client</faultcode>"));
        assert!(xml.contains("<faultstring>Invalid Action</faultstring>"));
        assert!(!xml.contains("UPnPError"));
    }

    #[test]
    fn fault_round_trips_through_the_parser() {
        let xml = build_soap_fault(
            "s:Client",
            "UPnPError",
            Some("714"),
            Some("NoSuchEntryInArray"),
        )
        .unwrap();

        let envelope = parse_soap_envelope(xml.as_bytes()).unwrap();
        let fault = SoapFault::from_envelope(&envelope).unwrap();

        assert_eq!(fault.fault_code, "s:Client");
        assert_eq!(fault.upnp_code(), Some(714));
        assert_eq!(
            fault.to_string(),
            "UPnP error 714: NoSuchEntryInArray (UPnPError)"
        );
    }

    #[test]
    fn regular_response_has_no_fault() {
        let xml = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><u:StopResponse xmlns:u="urn:x"/></s:Body></s:Envelope>"#;
        let envelope = parse_soap_envelope(xml.as_bytes()).unwrap();
        assert!(SoapFault::from_envelope(&envelope).is_none());
    }
}
