//! Component type registry.
//!
//! A [`ComponentType`] couples a unique name with a factory and an
//! [`InjectionManifest`]. Types live in a [`TypeRegistry`] that the engine
//! consults through the [`TypeResolver`] trait. The process-wide registry
//! returned by [`TypeRegistry::global`] is meant for the outermost
//! composition boundary only (the CLI); engines and tests take an explicit
//! registry.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, LazyLock, RwLock};

use super::context::{ComponentContext, InjectionManifest, Requirement};
use super::error::ComponentError;
use super::instance::Instance;

/// A named factory of component instances.
pub trait ComponentType: Send + Sync {
    /// Unique registered name
    fn name(&self) -> &str;

    /// Human-readable description; the first line is the summary
    fn description(&self) -> &str {
        ""
    }

    /// Named dependencies this type needs
    fn manifest(&self) -> InjectionManifest {
        InjectionManifest::default()
    }

    /// Build a live instance for a resolved node
    fn create(&self, ctx: &ComponentContext<'_>) -> Result<Arc<dyn Instance>, ComponentError>;
}

type FactoryFn =
    dyn Fn(&ComponentContext<'_>) -> Result<Arc<dyn Instance>, ComponentError> + Send + Sync;

/// A [`ComponentType`] built from a closure.
///
/// ```rust,ignore
/// let led = TypeDef::new("led", |ctx| Ok(Arc::new(Led::new(ctx.config_as()?)) as _))
///     .describe("LED on a GPIO pin")
///     .require(Requirement::component_of::<Board>("board"));
/// registry.register(led);
/// ```
pub struct TypeDef {
    name: String,
    description: String,
    manifest: InjectionManifest,
    factory: Box<FactoryFn>,
}

impl TypeDef {
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&ComponentContext<'_>) -> Result<Arc<dyn Instance>, ComponentError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            description: String::new(),
            manifest: InjectionManifest::default(),
            factory: Box::new(factory),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn require(mut self, requirement: Requirement) -> Self {
        self.manifest = self.manifest.with(requirement);
        self
    }
}

impl ComponentType for TypeDef {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn manifest(&self) -> InjectionManifest {
        self.manifest.clone()
    }

    fn create(&self, ctx: &ComponentContext<'_>) -> Result<Arc<dyn Instance>, ComponentError> {
        (self.factory)(ctx)
    }
}

impl fmt::Debug for TypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDef")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("manifest", &self.manifest)
            .finish()
    }
}

/// Resolves a type name to its registered type.
pub trait TypeResolver: Send + Sync {
    fn resolve_type(&self, name: &str) -> Result<Arc<dyn ComponentType>, RegistryError>;
}

/// Registry of named component types.
#[derive(Default)]
pub struct TypeRegistry {
    types: RwLock<BTreeMap<String, Arc<dyn ComponentType>>>,
}

static GLOBAL_REGISTRY: LazyLock<Arc<TypeRegistry>> =
    LazyLock::new(|| Arc::new(TypeRegistry::new()));

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry
    pub fn global() -> Arc<TypeRegistry> {
        GLOBAL_REGISTRY.clone()
    }

    /// Register a type; a later registration under the same name wins
    pub fn register(&self, component_type: impl ComponentType + 'static) {
        self.register_arc(Arc::new(component_type));
    }

    pub fn register_arc(&self, component_type: Arc<dyn ComponentType>) {
        let name = component_type.name().to_string();
        let mut types = self.types.write().unwrap_or_else(|e| e.into_inner());
        if types.insert(name.clone(), component_type).is_some() {
            log::warn!("Component type '{}' re-registered, replacing previous", name);
        } else {
            log::debug!("Registered component type '{}'", name);
        }
    }

    /// All registered types, sorted by name
    pub fn registered_types(&self) -> Vec<Arc<dyn ComponentType>> {
        self.types
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TypeResolver for TypeRegistry {
    fn resolve_type(&self, name: &str) -> Result<Arc<dyn ComponentType>, RegistryError> {
        self.types
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownType(name.to_string()))
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .types
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        f.debug_struct("TypeRegistry").field("types", &names).finish()
    }
}

/// Format registered types as an aligned `name  summary` listing.
///
/// Continuation lines of multi-line descriptions are indented under the
/// summary column.
pub fn format_type_listing(types: &[Arc<dyn ComponentType>]) -> String {
    let width = types.iter().map(|t| t.name().len()).max().unwrap_or(0);
    let mut out = String::new();
    for t in types {
        let mut lines = t.description().lines();
        let summary = lines.next().unwrap_or("");
        out.push_str(&format!("{:width$} {}", t.name(), summary, width = width));
        out.push('\n');
        for line in lines {
            out.push_str(&format!("{:width$} {}", "", line, width = width));
            out.push('\n');
        }
    }
    out
}

/// Errors that can occur when resolving component types
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown component type '{0}'")]
    UnknownType(String),
}
