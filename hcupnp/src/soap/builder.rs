//! Construction d'enveloppes SOAP

use xmltree::{Element, EmitterConfig, XMLNode};

use super::{SOAP_ENCODING_STYLE, SOAP_ENVELOPE_NS};

fn build_soap_envelope_with_body(
    body_child: Element,
    indent: bool,
) -> Result<String, xmltree::Error> {
    // Body
    let mut body = Element::new("s:Body");
    body.children.push(XMLNode::Element(body_child));

    // Envelope
    let mut envelope = Element::new("s:Envelope");
    envelope
        .attributes
        .insert("xmlns:s".to_string(), SOAP_ENVELOPE_NS.to_string());
    envelope
        .attributes
        .insert("s:encodingStyle".to_string(), SOAP_ENCODING_STYLE.to_string());
    envelope.children.push(XMLNode::Element(body));

    let mut buf = Vec::new();
    let config = EmitterConfig::new()
        .write_document_declaration(true)
        .perform_indent(indent)
        .indent_string("  ");
    envelope.write_with_config(&mut buf, config)?;

    // l'émetteur n'écrit que de l'UTF-8
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn action_element<'a, I>(service_urn: &str, element_name: &str, values: I) -> Element
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut elem = Element::new(&format!("u:{}", element_name));
    elem.attributes
        .insert("xmlns:u".to_string(), service_urn.to_string());

    for (name, value) in values {
        let mut child = Element::new(name);
        if !value.is_empty() {
            child.children.push(XMLNode::Text(value.to_string()));
        }
        elem.children.push(XMLNode::Element(child));
    }

    elem
}

/// Construit l'enveloppe d'appel d'une action UPnP
///
/// # Arguments
///
/// * `service_urn` - URN du service (ex: "urn:schemas-upnp-org:service:WANIPConnection:1")
/// * `action` - Nom de l'action (ex: "GetExternalIPAddress")
/// * `args` - Arguments d'entrée, dans l'ordre d'émission
///
/// The envelope is written without indentation: some devices treat
/// whitespace text nodes as argument values.
pub fn build_soap_request(
    service_urn: &str,
    action: &str,
    args: &[(&str, &str)],
) -> Result<String, xmltree::Error> {
    let request_elem = action_element(service_urn, action, args.iter().copied());
    build_soap_envelope_with_body(request_elem, false)
}

/// Construit une réponse SOAP UPnP (`<u:ActionResponse>`)
///
/// # Arguments
///
/// * `service_urn` - URN du service
/// * `action` - Nom de l'action (ex: "GetExternalIPAddress")
/// * `values` - Valeurs de retour
pub fn build_soap_response(
    service_urn: &str,
    action: &str,
    values: Vec<(String, String)>,
) -> Result<String, xmltree::Error> {
    let response_name = format!("{}Response", action);
    let response_elem = action_element(
        service_urn,
        &response_name,
        values.iter().map(|(k, v)| (k.as_str(), v.as_str())),
    );
    build_soap_envelope_with_body(response_elem, true)
}
