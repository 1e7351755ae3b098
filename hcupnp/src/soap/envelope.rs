//! Structures de l'enveloppe SOAP

use xmltree::Element;

/// Enveloppe SOAP reçue. Un éventuel `<s:Header>` est ignoré.
#[derive(Debug, Clone)]
pub struct SoapEnvelope {
    /// Corps SOAP contenant l'action, la réponse ou le fault
    pub body: SoapBody,
}

/// Corps SOAP
#[derive(Debug, Clone)]
pub struct SoapBody {
    pub content: Element,
}

impl SoapBody {
    /// Direct child element of the body with the given local name
    pub fn child(&self, local_name: &str) -> Option<&Element> {
        self.content
            .children
            .iter()
            .filter_map(|n| n.as_element())
            .find(|e| e.name == local_name)
    }

    /// First element child of the body (the action, response or fault)
    pub fn first_element(&self) -> Option<&Element> {
        self.content.children.iter().find_map(|n| n.as_element())
    }
}
