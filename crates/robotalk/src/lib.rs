//! Robotalk component engine
//!
//! Builds a running system out of a hierarchical component specification.
//!
//! # Overview
//!
//! The engine allows you to:
//! - Declare components, their types and configuration in YAML or JSON
//! - Wire components together with path-like injection references
//! - Connect to endpoints exposed through a pub/sub hub
//! - Start everything in dependency order, in waves
//! - Tear everything down in exact reverse order
//!
//! # Example Specification
//!
//! ```yaml
//! name: robot
//! version: "1.0"
//!
//! components:
//!   board:
//!     type: firmata
//!     config:
//!       port: /dev/ttyACM0
//!
//!   panel:
//!     components:
//!       led:
//!         type: led
//!         inject:
//!           board: ../board
//!         config:
//!           pin: 13
//!
//!   recorder:
//!     type: shell
//!     connect:
//!       state: robot/panel/led/on
//!     config:
//!       command: "record --out /tmp/led.log"
//! ```
//!
//! # Embedding
//!
//! ```rust,ignore
//! let registry = Arc::new(TypeRegistry::new());
//! builtin::register_builtins(&registry);
//! registry.register(TypeDef::new("led", |ctx| Ok(Arc::new(Led::new(ctx)?) as _)));
//!
//! let mut engine = Engine::from_spec(&SpecFile::from_file("robot.yaml")?, registry, EngineConfig::default());
//! engine.connect(&LocalHub::new()).await?;
//! // ...
//! engine.disconnect().await?;
//! ```

pub mod builtin;
pub mod cli;
pub mod component;
pub mod config;
pub mod hub;
pub mod runtime;

pub use cli::RunArgs;
pub use component::{
    format_type_listing, Capability, ComponentContext, ComponentError, ComponentType,
    InjectionManifest, Injections, Instance, Lifecycle, RegistryError, Requirement, TypeDef,
    TypeRegistry, TypeResolver,
};
pub use config::{ComponentConfig, SpecFile, SpecFileError};
pub use hub::{Connector, Endpoint, EndpointRef, HubError, LocalHub, Message};
pub use runtime::{
    AggregateError, DependencyGraph, Engine, EngineConfig, EngineError, InitOrder, InitPlan,
    NodeId, SpecTree, WavePolicy,
};
