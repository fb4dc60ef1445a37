//! Component contract: types, instances and their injected dependencies

mod context;
mod error;
mod instance;
mod registry;

pub use context::{
    Capability, ComponentContext, InjectionManifest, Injections, Requirement, RequirementKind,
};
pub use error::ComponentError;
pub use instance::{downcast_instance, AsAny, Instance, Lifecycle};
pub use registry::{
    format_type_listing, ComponentType, RegistryError, TypeDef, TypeRegistry, TypeResolver,
};
