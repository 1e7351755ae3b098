//! Parsing of service description documents (SCPD).

use std::sync::Arc;

use tracing::debug;
use xmltree::Element;

use crate::errors::DescriptionParseError;
use crate::model::{Action, AllowedRange, Argument, Direction, Service, ServiceEndpoint, StateVariable};

/// Builds the [`Service`] described by an SCPD document.
///
/// State variables are read first; every action argument must then name one
/// of them in `relatedStateVariable`.
pub fn parse_scpd(
    xml: &[u8],
    endpoint: Arc<ServiceEndpoint>,
) -> Result<Service, DescriptionParseError> {
    let root = Element::parse(xml)?;

    let mut state_variables: Vec<Arc<StateVariable>> = Vec::new();
    for var in descendants(&root, "stateVariable") {
        let variable = Arc::new(parse_state_variable(var)?);
        match state_variables.iter_mut().find(|v| v.name() == variable.name()) {
            Some(existing) => *existing = variable,
            None => state_variables.push(variable),
        }
    }

    let mut actions: Vec<Action> = Vec::new();
    for elem in descendants(&root, "action") {
        let action = parse_action(elem, &state_variables, endpoint.clone())?;
        match actions.iter_mut().find(|a| a.name() == action.name()) {
            Some(existing) => *existing = action,
            None => actions.push(action),
        }
    }

    debug!(
        "Parsed SCPD for {}: {} state variables, {} actions",
        endpoint.service_type,
        state_variables.len(),
        actions.len()
    );

    Ok(Service::new(endpoint, state_variables, actions))
}

fn parse_state_variable(elem: &Element) -> Result<StateVariable, DescriptionParseError> {
    let name = required_text(elem, "name", "stateVariable/name")?;
    let data_type = required_text(elem, "dataType", "stateVariable/dataType")?;

    // UDA: sendEvents defaults to "yes"
    let send_events = elem
        .attributes
        .get("sendEvents")
        .map(|v| !v.trim().eq_ignore_ascii_case("no"))
        .unwrap_or(true);

    let mut variable = StateVariable::new(name, send_events, data_type);

    if let Some(default) = child_text(elem, "defaultValue") {
        variable = variable.with_default_value(default);
    }

    if let Some(list) = elem.get_child("allowedValueList") {
        let values = list
            .children
            .iter()
            .filter_map(|n| n.as_element())
            .filter(|e| e.name == "allowedValue")
            .filter_map(|e| e.get_text().map(|t| t.trim().to_string()))
            .collect();
        variable = variable.with_allowed_values(values);
    }

    if let Some(range) = elem.get_child("allowedValueRange") {
        variable = variable.with_allowed_range(AllowedRange {
            minimum: child_text(range, "minimum"),
            maximum: child_text(range, "maximum"),
            step: child_text(range, "step"),
        });
    }

    Ok(variable)
}

fn parse_action(
    elem: &Element,
    state_variables: &[Arc<StateVariable>],
    endpoint: Arc<ServiceEndpoint>,
) -> Result<Action, DescriptionParseError> {
    let name = required_text(elem, "name", "action/name")?;
    let mut action = Action::new(name.clone(), endpoint);

    for arg in descendants(elem, "argument") {
        let arg_name = required_text(arg, "name", "argument/name")?;
        let direction_text = required_text(arg, "direction", "argument/direction")?;
        let variable_name =
            required_text(arg, "relatedStateVariable", "argument/relatedStateVariable")?;

        let direction: Direction =
            direction_text
                .parse()
                .map_err(|_| DescriptionParseError::InvalidDirection {
                    action: name.clone(),
                    argument: arg_name.clone(),
                    direction: direction_text.clone(),
                })?;

        let variable = state_variables
            .iter()
            .find(|v| v.name() == variable_name)
            .cloned()
            .ok_or_else(|| DescriptionParseError::UndeclaredStateVariable {
                action: name.clone(),
                argument: arg_name.clone(),
                variable: variable_name.clone(),
            })?;

        action.add_argument(Argument::new(arg_name, direction, variable));
    }

    Ok(action)
}

/// All elements named `name` below `root`, in document order.
fn descendants<'a>(root: &'a Element, name: &str) -> Vec<&'a Element> {
    let mut found = Vec::new();
    collect_descendants(root, name, &mut found);
    found
}

fn collect_descendants<'a>(elem: &'a Element, name: &str, found: &mut Vec<&'a Element>) {
    for child in elem.children.iter().filter_map(|n| n.as_element()) {
        if child.name == name {
            found.push(child);
        } else {
            collect_descendants(child, name, found);
        }
    }
}

fn child_text(elem: &Element, name: &str) -> Option<String> {
    elem.get_child(name)
        .and_then(|c| c.get_text())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn required_text(
    elem: &Element,
    name: &str,
    what: &'static str,
) -> Result<String, DescriptionParseError> {
    child_text(elem, name).ok_or(DescriptionParseError::MissingElement(what))
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS_SCPD: &str = r#"<?xml version="1.0"?>
<scpd xmlns="urn:schemas-upnp-org:service-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <actionList>
    <action>
      <name>GetStatus</name>
      <argumentList>
        <argument>
          <name>CurrentStatus</name>
          <direction>out</direction>
          <relatedStateVariable>Status</relatedStateVariable>
        </argument>
      </argumentList>
    </action>
    <action>
      <name>SetTarget</name>
      <argumentList>
        <argument>
          <name>NewTargetValue</name>
          <direction>in</direction>
          <relatedStateVariable>Target</relatedStateVariable>
        </argument>
      </argumentList>
    </action>
  </actionList>
  <serviceStateTable>
    <stateVariable sendEvents="yes">
      <name>Status</name>
      <dataType>string</dataType>
    </stateVariable>
    <stateVariable sendEvents="no">
      <name>Target</name>
      <dataType>boolean</dataType>
      <defaultValue>0</defaultValue>
    </stateVariable>
    <stateVariable>
      <name>Mode</name>
      <dataType>string</dataType>
      <allowedValueList>
        <allowedValue>Normal</allowedValue>
        <allowedValue>Eco</allowedValue>
      </allowedValueList>
    </stateVariable>
    <stateVariable sendEvents="no">
      <name>Level</name>
      <dataType>ui2</dataType>
      <allowedValueRange><minimum>0</minimum><maximum>100</maximum><step>1</step></allowedValueRange>
    </stateVariable>
  </serviceStateTable>
</scpd>"#;

    fn endpoint() -> Arc<ServiceEndpoint> {
        Arc::new(ServiceEndpoint {
            service_type: "urn:schemas-upnp-org:service:SwitchPower:1".to_string(),
            service_id: "urn:upnp-org:serviceId:SwitchPower".to_string(),
            scpd_url: "http://10.0.0.5:1900/scpd.xml".to_string(),
            control_url: "http://10.0.0.5:1900/control".to_string(),
            event_sub_url: "http://10.0.0.5:1900/event".to_string(),
        })
    }

    #[test]
    fn get_status_has_only_an_output() {
        let service = parse_scpd(STATUS_SCPD.as_bytes(), endpoint()).unwrap();
        let action = service.action("GetStatus").unwrap();

        assert!(action.in_args().is_empty());
        assert_eq!(action.out_args(), vec!["CurrentStatus"]);
        assert_eq!(
            action
                .argument("CurrentStatus")
                .unwrap()
                .state_variable()
                .data_type(),
            "string"
        );
        assert_eq!(action.service().control_url, "http://10.0.0.5:1900/control");
    }

    #[test]
    fn state_variables_carry_their_declarations() {
        let service = parse_scpd(STATUS_SCPD.as_bytes(), endpoint()).unwrap();

        assert_eq!(service.action_names(), vec!["GetStatus", "SetTarget"]);
        assert!(service.state_variable("Status").unwrap().send_events());

        let target = service.state_variable("Target").unwrap();
        assert!(!target.send_events());
        assert_eq!(target.default_value(), Some("0"));

        // sendEvents absent -> yes
        let mode = service.state_variable("Mode").unwrap();
        assert!(mode.send_events());
        assert_eq!(mode.allowed_values(), ["Normal", "Eco"]);

        let range = service.state_variable("Level").unwrap().allowed_range().unwrap();
        assert_eq!(range.maximum.as_deref(), Some("100"));
        assert_eq!(range.step.as_deref(), Some("1"));
    }

    #[test]
    fn undeclared_state_variable_is_rejected() {
        let xml = r#"<scpd><actionList><action><name>Get</name><argumentList>
            <argument><name>Out</name><direction>out</direction><relatedStateVariable>Nope</relatedStateVariable></argument>
            </argumentList></action></actionList><serviceStateTable/></scpd>"#;

        match parse_scpd(xml.as_bytes(), endpoint()) {
            Err(DescriptionParseError::UndeclaredStateVariable {
                action, variable, ..
            }) => {
                assert_eq!(action, "Get");
                assert_eq!(variable, "Nope");
            }
            other => panic!("unexpected result: {:?}", other.map(|s| s.action_names().len())),
        }
    }

    #[test]
    fn missing_data_type_and_bad_direction_fail_fast() {
        let xml = r#"<scpd><serviceStateTable><stateVariable><name>X</name></stateVariable></serviceStateTable></scpd>"#;
        assert!(matches!(
            parse_scpd(xml.as_bytes(), endpoint()),
            Err(DescriptionParseError::MissingElement("stateVariable/dataType"))
        ));

        let xml = r#"<scpd><actionList><action><name>A</name><argumentList>
            <argument><name>Arg</name><direction>sideways</direction><relatedStateVariable>X</relatedStateVariable></argument>
            </argumentList></action></actionList>
            <serviceStateTable><stateVariable><name>X</name><dataType>string</dataType></stateVariable></serviceStateTable></scpd>"#;
        assert!(matches!(
            parse_scpd(xml.as_bytes(), endpoint()),
            Err(DescriptionParseError::InvalidDirection { .. })
        ));
    }

    #[test]
    fn repeated_names_replace_the_earlier_declaration_in_place() {
        let xml = r#"<scpd>
  <actionList>
    <action><name>Get</name><argumentList>
      <argument><name>A</name><direction>out</direction><relatedStateVariable>X</relatedStateVariable></argument>
    </argumentList></action>
    <action><name>Set</name></action>
    <action><name>Get</name><argumentList>
      <argument><name>B</name><direction>out</direction><relatedStateVariable>Y</relatedStateVariable></argument>
    </argumentList></action>
  </actionList>
  <serviceStateTable>
    <stateVariable><name>X</name><dataType>string</dataType></stateVariable>
    <stateVariable><name>Y</name><dataType>ui4</dataType></stateVariable>
    <stateVariable sendEvents="no"><name>X</name><dataType>boolean</dataType></stateVariable>
  </serviceStateTable>
</scpd>"#;
        let service = parse_scpd(xml.as_bytes(), endpoint()).unwrap();

        assert_eq!(service.action_names(), vec!["Get", "Set"]);
        assert_eq!(service.action("Get").unwrap().out_args(), vec!["B"]);

        assert_eq!(service.state_variables().len(), 2);
        assert_eq!(service.state_variables()[0].name(), "X");
        let x = service.state_variable("X").unwrap();
        assert_eq!(x.data_type(), "boolean");
        assert!(!x.send_events());
    }

    #[test]
    fn malformed_xml_is_a_parse_error() {
        assert!(matches!(
            parse_scpd(b"<scpd><actionList>", endpoint()),
            Err(DescriptionParseError::XmlTree(_))
        ));
    }
}
