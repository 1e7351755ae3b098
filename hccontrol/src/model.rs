//! Object model of a resolved device: services, state variables, actions
//! and their directional arguments.
//!
//! Everything here is immutable once built by the resolver; the accessors
//! have no network or parsing side effects.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::errors::{DirectionParseError, ResolveError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Supplied by the caller
    In,
    /// Returned by the device
    Out,
}

impl FromStr for Direction {
    type Err = DirectionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in" => Ok(Direction::In),
            "out" => Ok(Direction::Out),
            _ => Err(DirectionParseError(s.to_string())),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::In => "in",
            Direction::Out => "out",
        })
    }
}

/// `allowedValueRange` of a state variable, values kept as declared
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowedRange {
    pub minimum: Option<String>,
    pub maximum: Option<String>,
    pub step: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateVariable {
    name: String,
    send_events: bool,
    data_type: String,
    default_value: Option<String>,
    allowed_values: Vec<String>,
    allowed_range: Option<AllowedRange>,
}

impl StateVariable {
    pub fn new(name: impl Into<String>, send_events: bool, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            send_events,
            data_type: data_type.into(),
            default_value: None,
            allowed_values: Vec::new(),
            allowed_range: None,
        }
    }

    pub fn with_default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_allowed_values(mut self, values: Vec<String>) -> Self {
        self.allowed_values = values;
        self
    }

    pub fn with_allowed_range(mut self, range: AllowedRange) -> Self {
        self.allowed_range = Some(range);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn send_events(&self) -> bool {
        self.send_events
    }

    /// Declared UPnP data type (`string`, `ui4`, `boolean`…)
    pub fn data_type(&self) -> &str {
        &self.data_type
    }

    pub fn default_value(&self) -> Option<&str> {
        self.default_value.as_deref()
    }

    pub fn allowed_values(&self) -> &[String] {
        &self.allowed_values
    }

    pub fn allowed_range(&self) -> Option<&AllowedRange> {
        self.allowed_range.as_ref()
    }
}

#[derive(Debug, Clone)]
pub struct Argument {
    name: String,
    direction: Direction,
    state_variable: Arc<StateVariable>,
}

impl Argument {
    pub fn new(name: impl Into<String>, direction: Direction, state_variable: Arc<StateVariable>) -> Self {
        Self {
            name: name.into(),
            direction,
            state_variable,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_in(&self) -> bool {
        self.direction == Direction::In
    }

    pub fn is_out(&self) -> bool {
        self.direction == Direction::Out
    }

    pub fn state_variable(&self) -> &StateVariable {
        &self.state_variable
    }
}

/// Identity and endpoints of a service, shared by the service and its actions.
///
/// URLs are absolute: directory of the device location + path from the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    pub service_type: String,
    pub service_id: String,
    pub scpd_url: String,
    pub control_url: String,
    pub event_sub_url: String,
}

#[derive(Debug, Clone)]
pub struct Action {
    name: String,
    arguments: Vec<Argument>,
    service: Arc<ServiceEndpoint>,
}

impl Action {
    pub fn new(name: impl Into<String>, service: Arc<ServiceEndpoint>) -> Self {
        Self {
            name: name.into(),
            arguments: Vec::new(),
            service,
        }
    }

    /// Adds an argument; a later argument with the same name replaces the
    /// earlier one in place.
    pub fn add_argument(&mut self, argument: Argument) {
        match self.arguments.iter_mut().find(|a| a.name == argument.name) {
            Some(existing) => *existing = argument,
            None => self.arguments.push(argument),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Endpoint of the owning service
    pub fn service(&self) -> &ServiceEndpoint {
        &self.service
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    pub fn argument(&self, name: &str) -> Option<&Argument> {
        self.arguments.iter().find(|a| a.name == name)
    }

    /// Names of the input arguments, in declaration order
    pub fn in_args(&self) -> Vec<&str> {
        self.names_with(Direction::In)
    }

    /// Names of the output arguments, in declaration order
    pub fn out_args(&self) -> Vec<&str> {
        self.names_with(Direction::Out)
    }

    fn names_with(&self, direction: Direction) -> Vec<&str> {
        self.arguments
            .iter()
            .filter(|a| a.direction == direction)
            .map(|a| a.name.as_str())
            .collect()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} in:({}) out:({})",
            self.name,
            self.in_args().join(", "),
            self.out_args().join(", ")
        )
    }
}

#[derive(Debug, Clone)]
pub struct Service {
    endpoint: Arc<ServiceEndpoint>,
    state_variables: Vec<Arc<StateVariable>>,
    actions: Vec<Action>,
}

impl Service {
    pub fn new(
        endpoint: Arc<ServiceEndpoint>,
        state_variables: Vec<Arc<StateVariable>>,
        actions: Vec<Action>,
    ) -> Self {
        Self {
            endpoint,
            state_variables,
            actions,
        }
    }

    pub fn endpoint(&self) -> &ServiceEndpoint {
        &self.endpoint
    }

    pub fn service_type(&self) -> &str {
        &self.endpoint.service_type
    }

    pub fn service_id(&self) -> &str {
        &self.endpoint.service_id
    }

    pub fn scpd_url(&self) -> &str {
        &self.endpoint.scpd_url
    }

    pub fn control_url(&self) -> &str {
        &self.endpoint.control_url
    }

    pub fn event_sub_url(&self) -> &str {
        &self.endpoint.event_sub_url
    }

    pub fn state_variables(&self) -> &[Arc<StateVariable>] {
        &self.state_variables
    }

    pub fn state_variable(&self, name: &str) -> Option<&StateVariable> {
        self.state_variables
            .iter()
            .find(|v| v.name() == name)
            .map(Arc::as_ref)
    }

    /// Actions in document order
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.name == name)
    }

    pub fn action_names(&self) -> Vec<&str> {
        self.actions.iter().map(|a| a.name.as_str()).collect()
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.service_type(), self.control_url())
    }
}

/// A service listed by the device whose description could not be resolved.
#[derive(Debug)]
pub struct ServiceFailure {
    pub service_type: Option<String>,
    pub scpd_url: Option<String>,
    pub error: ResolveError,
}

#[derive(Debug)]
pub struct Device {
    location: String,
    device_type: String,
    friendly_name: String,
    udn: Option<String>,
    manufacturer: Option<String>,
    model_name: Option<String>,
    services: Vec<Service>,
    failures: Vec<ServiceFailure>,
}

impl Device {
    pub fn new(
        location: impl Into<String>,
        device_type: impl Into<String>,
        friendly_name: impl Into<String>,
    ) -> Self {
        Self {
            location: location.into(),
            device_type: device_type.into(),
            friendly_name: friendly_name.into(),
            udn: None,
            manufacturer: None,
            model_name: None,
            services: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn with_identity(
        mut self,
        udn: Option<String>,
        manufacturer: Option<String>,
        model_name: Option<String>,
    ) -> Self {
        self.udn = udn;
        self.manufacturer = manufacturer;
        self.model_name = model_name;
        self
    }

    pub fn with_services(mut self, services: Vec<Service>, failures: Vec<ServiceFailure>) -> Self {
        self.services = services;
        self.failures = failures;
        self
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn device_type(&self) -> &str {
        &self.device_type
    }

    pub fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    pub fn udn(&self) -> Option<&str> {
        self.udn.as_deref()
    }

    pub fn manufacturer(&self) -> Option<&str> {
        self.manufacturer.as_deref()
    }

    pub fn model_name(&self) -> Option<&str> {
        self.model_name.as_deref()
    }

    /// Resolved services, in document order
    pub fn services(&self) -> &[Service] {
        &self.services
    }

    /// Services that were listed but could not be resolved
    pub fn service_failures(&self) -> &[ServiceFailure] {
        &self.failures
    }

    /// First service whose type is exactly `service_type`
    pub fn find_service(&self, service_type: &str) -> Option<&Service> {
        self.services
            .iter()
            .find(|s| s.service_type() == service_type)
    }

    /// Device / service / action tree, one line per node
    pub fn describe(&self) -> String {
        let mut out = format!("Device: {} ({})\n", self.friendly_name, self.device_type);
        for service in &self.services {
            out.push_str(&format!(" + Service: {}\n", service.service_type()));
            for action in service.actions() {
                out.push_str(&format!(" | + Action: {}\n", action));
            }
        }
        for failure in &self.failures {
            out.push_str(&format!(
                " ! Service: {} unavailable: {}\n",
                failure.service_type.as_deref().unwrap_or("<unknown>"),
                failure.error
            ));
        }
        out
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] at {}",
            self.friendly_name, self.device_type, self.location
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(service_type: &str) -> Arc<ServiceEndpoint> {
        Arc::new(ServiceEndpoint {
            service_type: service_type.to_string(),
            service_id: "urn:upnp-org:serviceId:X".to_string(),
            scpd_url: "http://10.0.0.5/scpd.xml".to_string(),
            control_url: "http://10.0.0.5/control".to_string(),
            event_sub_url: "http://10.0.0.5/event".to_string(),
        })
    }

    #[test]
    fn direction_parses_case_insensitively() {
        assert_eq!("IN".parse::<Direction>(), Ok(Direction::In));
        assert_eq!(" out ".parse::<Direction>(), Ok(Direction::Out));
        assert_eq!(
            "inout".parse::<Direction>(),
            Err(DirectionParseError("inout".to_string()))
        );
    }

    #[test]
    fn in_and_out_args_keep_declaration_order() {
        let var = Arc::new(StateVariable::new("A_ARG_TYPE_String", false, "string"));
        let mut action = Action::new("SetThing", endpoint("urn:schemas:service:A:1"));
        action.add_argument(Argument::new("Second", Direction::In, var.clone()));
        action.add_argument(Argument::new("Result", Direction::Out, var.clone()));
        action.add_argument(Argument::new("First", Direction::In, var.clone()));

        assert_eq!(action.in_args(), vec!["Second", "First"]);
        assert_eq!(action.out_args(), vec!["Result"]);
        assert_eq!(action.to_string(), "SetThing in:(Second, First) out:(Result)");
    }

    #[test]
    fn duplicate_argument_name_replaces_in_place() {
        let var = Arc::new(StateVariable::new("V", true, "ui4"));
        let mut action = Action::new("X", endpoint("urn:schemas:service:A:1"));
        action.add_argument(Argument::new("Arg", Direction::In, var.clone()));
        action.add_argument(Argument::new("Arg", Direction::Out, var));

        assert_eq!(action.arguments().len(), 1);
        assert!(action.in_args().is_empty());
        assert_eq!(action.argument("Arg").map(Argument::direction), Some(Direction::Out));
    }

    #[test]
    fn find_service_matches_type_exactly() {
        let device = Device::new("http://10.0.0.5/desc.xml", "urn:schemas:device:X:1", "Box")
            .with_services(
                vec![
                    Service::new(endpoint("urn:schemas:service:A:1"), Vec::new(), Vec::new()),
                    Service::new(endpoint("urn:schemas:service:B:1"), Vec::new(), Vec::new()),
                ],
                Vec::new(),
            );

        assert_eq!(
            device
                .find_service("urn:schemas:service:B:1")
                .map(Service::service_type),
            Some("urn:schemas:service:B:1")
        );
        assert!(device.find_service("urn:schemas:service:C:1").is_none());
        assert!(device.find_service("urn:schemas:service:A").is_none());
    }
}
