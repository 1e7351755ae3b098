//! Parser SOAP : enveloppes, actions et réponses UPnP

use super::{SoapBody, SoapEnvelope};
use std::collections::HashMap;
use xmltree::Element;

/// Action UPnP extraite d'une enveloppe SOAP
#[derive(Debug, Clone)]
pub struct SoapAction {
    /// Nom de l'action (ex: "GetExternalIPAddress")
    pub name: String,

    /// Namespace de l'action (ex: "urn:schemas-upnp-org:service:WANIPConnection:1")
    pub namespace: Option<String>,

    /// Arguments de l'action, dans l'ordre du document
    pub args: Vec<(String, String)>,
}

impl SoapAction {
    pub fn arg(&self, name: &str) -> Option<&str> {
        self.args
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Erreur de parsing SOAP
#[derive(Debug, thiserror::Error)]
pub enum SoapParseError {
    #[error("XML parse error: {0}")]
    XmlError(#[from] xmltree::ParseError),

    #[error("Missing SOAP Envelope")]
    MissingEnvelope,

    #[error("Missing SOAP Body")]
    MissingBody,

    #[error("No action found in SOAP Body")]
    NoAction,

    #[error("Missing {0} element in SOAP Body")]
    MissingResponse(String),
}

/// Collapse the formatting noise devices put around their replies.
///
/// Whitespace runs between a `>` and the next `<` are removed, and line
/// breaks inside tags become spaces. Text content is left untouched.
pub fn normalize_soap_xml(xml: &str) -> String {
    let mut out = String::with_capacity(xml.len());
    let mut chars = xml.chars().peekable();
    let mut in_tag = false;

    while let Some(c) = chars.next() {
        match c {
            '<' => {
                in_tag = true;
                out.push(c);
            }
            '>' => {
                in_tag = false;
                out.push(c);

                let mut pending = String::new();
                while let Some(&next) = chars.peek() {
                    if next.is_whitespace() {
                        pending.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                // keep the run only when text follows
                if !pending.is_empty() && chars.peek().is_some_and(|&n| n != '<') {
                    out.push_str(&pending);
                }
            }
            '\r' | '\n' if in_tag => out.push(' '),
            _ => out.push(c),
        }
    }

    out
}

/// Parse une action SOAP à partir de bytes XML.
///
/// Décode une enveloppe de requête telle que [`build_soap_request`](super::build_soap_request)
/// la produit ; sert à vérifier ce qu'un control point envoie.
pub fn parse_soap_action(xml: &[u8]) -> Result<SoapAction, SoapParseError> {
    let envelope = parse_soap_envelope(xml)?;
    extract_action_from_body(&envelope.body)
}

/// Parse une enveloppe SOAP complète
pub fn parse_soap_envelope(xml: &[u8]) -> Result<SoapEnvelope, SoapParseError> {
    let root = Element::parse(xml)?;

    if root.name != "Envelope" {
        return Err(SoapParseError::MissingEnvelope);
    }

    let body_elem = root
        .children
        .iter()
        .filter_map(|n| n.as_element())
        .find(|e| e.name == "Body")
        .ok_or(SoapParseError::MissingBody)?;

    let body = SoapBody {
        content: body_elem.clone(),
    };

    Ok(SoapEnvelope { body })
}

/// Extrait les valeurs de retour de `<{action}Response>`.
///
/// Each immediate child element becomes one entry; an element without text
/// maps to an empty string.
pub fn extract_action_response(
    envelope: &SoapEnvelope,
    action: &str,
) -> Result<HashMap<String, String>, SoapParseError> {
    let response_name = format!("{}Response", action);
    let response = envelope
        .body
        .child(&response_name)
        .ok_or(SoapParseError::MissingResponse(response_name))?;

    Ok(child_values(response).collect())
}

/// Extrait l'action UPnP du corps SOAP
fn extract_action_from_body(body: &SoapBody) -> Result<SoapAction, SoapParseError> {
    // Format: <u:ActionName xmlns:u="service-urn">...</u:ActionName>
    let action_elem = body.first_element().ok_or(SoapParseError::NoAction)?;

    Ok(SoapAction {
        name: action_elem.name.clone(),
        namespace: action_elem.namespace.clone(),
        args: child_values(action_elem).collect(),
    })
}

fn child_values(parent: &Element) -> impl Iterator<Item = (String, String)> + '_ {
    parent.children.iter().filter_map(|n| n.as_element()).map(|elem| {
        (
            elem.name.clone(),
            elem.get_text().map(|t| t.into_owned()).unwrap_or_default(),
        )
    })
}
