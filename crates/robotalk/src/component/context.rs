//! Injection manifests and the context handed to component factories.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use super::error::ComponentError;
use super::instance::{downcast_instance, Instance};
use crate::hub::EndpointRef;

/// What a dependency must provide to satisfy a requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Any live instance
    Any,
    /// Instance must expose start/stop control
    Lifecycle,
    /// Instance must expose named endpoints
    Endpoints,
    /// Instance must be exactly this concrete type
    Concrete {
        type_id: TypeId,
        type_name: &'static str,
    },
}

impl Capability {
    /// Require a concrete instance type
    pub fn of<T: Instance>() -> Self {
        Capability::Concrete {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Check whether a live instance satisfies this capability
    pub fn is_satisfied_by(&self, instance: &dyn Instance) -> bool {
        match self {
            Capability::Any => true,
            Capability::Lifecycle => instance.lifecycle().is_some(),
            Capability::Endpoints => !instance.endpoints().is_empty(),
            Capability::Concrete { type_id, .. } => instance.as_any().type_id() == *type_id,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Any => write!(f, "any instance"),
            Capability::Lifecycle => write!(f, "lifecycle"),
            Capability::Endpoints => write!(f, "endpoints"),
            Capability::Concrete { type_name, .. } => write!(f, "{}", type_name),
        }
    }
}

/// Whether a requirement is satisfied by another node or by a hub endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequirementKind {
    /// Declared under `inject`, resolved to another node's instance
    Component,
    /// Declared under `connect`, resolved to an external endpoint
    Endpoint,
}

/// A single named dependency declared by a component type
#[derive(Debug, Clone)]
pub struct Requirement {
    pub name: String,
    pub kind: RequirementKind,
    pub capability: Capability,
    pub optional: bool,
}

impl Requirement {
    /// A required injection of any live instance
    pub fn component(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: RequirementKind::Component,
            capability: Capability::Any,
            optional: false,
        }
    }

    /// A required injection of a concrete instance type
    pub fn component_of<T: Instance>(name: impl Into<String>) -> Self {
        Self::component(name).with_capability(Capability::of::<T>())
    }

    /// A required external endpoint connection
    pub fn endpoint(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: RequirementKind::Endpoint,
            capability: Capability::Any,
            optional: false,
        }
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capability = capability;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// The full set of dependencies a component type declares
#[derive(Debug, Clone, Default)]
pub struct InjectionManifest {
    requirements: Vec<Requirement>,
}

impl InjectionManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }
}

/// Resolved dependencies of a node, looked up by name.
#[derive(Clone, Default)]
pub struct Injections {
    components: IndexMap<String, Arc<dyn Instance>>,
    endpoints: IndexMap<String, Arc<dyn EndpointRef>>,
}

impl Injections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_component(&mut self, name: impl Into<String>, instance: Arc<dyn Instance>) {
        self.components.insert(name.into(), instance);
    }

    pub fn insert_endpoint(&mut self, name: impl Into<String>, endpoint: Arc<dyn EndpointRef>) {
        self.endpoints.insert(name.into(), endpoint);
    }

    /// Live instance injected under `name`
    pub fn instance(&self, name: &str) -> Result<Arc<dyn Instance>, ComponentError> {
        self.components
            .get(name)
            .cloned()
            .ok_or_else(|| ComponentError::MissingInjection(name.to_string()))
    }

    /// Live instance injected under `name`, downcast to its concrete type
    pub fn get<T: Instance>(&self, name: &str) -> Result<Arc<T>, ComponentError> {
        let instance = self.instance(name)?;
        downcast_instance::<T>(&instance).ok_or_else(|| ComponentError::TypeMismatch {
            name: name.to_string(),
            expected: std::any::type_name::<T>().to_string(),
        })
    }

    /// Endpoint handle connected under `name`
    pub fn endpoint(&self, name: &str) -> Result<Arc<dyn EndpointRef>, ComponentError> {
        self.endpoints
            .get(name)
            .cloned()
            .ok_or_else(|| ComponentError::MissingConnection(name.to_string()))
    }

    pub fn component_names(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    pub fn endpoint_names(&self) -> impl Iterator<Item = &str> {
        self.endpoints.keys().map(String::as_str)
    }
}

impl fmt::Debug for Injections {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injections")
            .field("components", &self.components.keys().collect::<Vec<_>>())
            .field("endpoints", &self.endpoints.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Everything a factory gets to build one instance.
#[derive(Debug)]
pub struct ComponentContext<'a> {
    /// Full identity of the node (`group/child`)
    pub id: &'a str,
    /// Local name within the parent
    pub local_id: &'a str,
    /// Declared type name
    pub type_name: &'a str,
    /// Opaque configuration blob from the document
    pub config: &'a serde_json::Value,
    /// Resolved dependencies
    pub injections: &'a Injections,
}

impl ComponentContext<'_> {
    /// Map the configuration blob onto a typed config struct.
    ///
    /// A missing `config` section maps like an empty object so that
    /// `#[serde(default)]` fields work without a document entry.
    pub fn config_as<T: DeserializeOwned>(&self) -> Result<T, ComponentError> {
        let value = if self.config.is_null() {
            serde_json::Value::Object(Default::default())
        } else {
            self.config.clone()
        };
        serde_json::from_value(value)
            .map_err(|e| ComponentError::Config(format!("{}: {}", self.id, e)))
    }
}
