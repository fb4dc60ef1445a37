//! Test helpers for engine integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use robotalk::component::{downcast_instance, Capability};
use robotalk::{
    ComponentContext, ComponentError, Endpoint, EndpointRef, Engine, EngineConfig, Instance,
    Lifecycle, Requirement, SpecFile, TypeDef, TypeRegistry,
};
use serde::Deserialize;
use std::sync::{Arc, Mutex};

/// Shared, ordered record of everything the test components did
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Events with the given prefix, prefix stripped
    pub fn with_prefix(&self, prefix: &str) -> Vec<String> {
        self.events()
            .iter()
            .filter_map(|e| e.strip_prefix(prefix))
            .map(str::to_string)
            .collect()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub fail_create: bool,
    pub fail_start: bool,
    pub fail_stop: bool,
    /// Data points to expose
    pub data_points: Vec<String>,
    /// Reactors to expose; received payloads are logged
    pub reactors: Vec<String>,
}

/// A component that records its lifecycle into an [`EventLog`]
pub struct Probe {
    pub id: String,
    pub injected: Vec<String>,
    pub connected: Vec<(String, Arc<dyn EndpointRef>)>,
    config: ProbeConfig,
    endpoints: Vec<Endpoint>,
    log: EventLog,
}

impl Probe {
    fn create(ctx: &ComponentContext<'_>, log: &EventLog) -> Result<Self, ComponentError> {
        let config: ProbeConfig = ctx.config_as()?;
        log.push(format!("create:{}", ctx.id));
        if config.fail_create {
            return Err(ComponentError::Runtime("refusing to be created".into()));
        }

        let mut endpoints: Vec<Endpoint> =
            config.data_points.iter().map(Endpoint::data_point).collect();
        for name in &config.reactors {
            let log = log.clone();
            let id = ctx.id.to_string();
            endpoints.push(Endpoint::reactor(name.clone(), move |msg| {
                log.push(format!("msg:{}/{}:{}", id, msg.path, msg.payload));
                Ok(())
            }));
        }

        Ok(Self {
            id: ctx.id.to_string(),
            injected: ctx.injections.component_names().map(str::to_string).collect(),
            connected: ctx
                .injections
                .endpoint_names()
                .filter_map(|name| {
                    let endpoint = ctx.injections.endpoint(name).ok()?;
                    Some((name.to_string(), endpoint))
                })
                .collect(),
            config,
            endpoints,
            log: log.clone(),
        })
    }

    pub fn endpoint(&self, name: &str) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.name() == name)
    }
}

impl Instance for Probe {
    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        Some(self)
    }

    fn endpoints(&self) -> Vec<Endpoint> {
        self.endpoints.clone()
    }
}

#[async_trait]
impl Lifecycle for Probe {
    async fn start(&self) -> Result<(), ComponentError> {
        if self.config.fail_start {
            self.log.push(format!("start-failed:{}", self.id));
            return Err(ComponentError::Runtime("refusing to start".into()));
        }
        self.log.push(format!("start:{}", self.id));
        Ok(())
    }

    async fn stop(&self) -> Result<(), ComponentError> {
        self.log.push(format!("stop:{}", self.id));
        if self.config.fail_stop {
            return Err(ComponentError::Runtime("refusing to stop".into()));
        }
        Ok(())
    }
}

/// A component with no lifecycle
pub struct Passive {
    pub id: String,
}

impl Instance for Passive {}

fn probe_type(name: &str, log: &EventLog) -> TypeDef {
    let log = log.clone();
    TypeDef::new(name, move |ctx| {
        Ok(Arc::new(Probe::create(ctx, &log)?) as Arc<dyn Instance>)
    })
    .describe("Records lifecycle events")
}

/// Registry with the test types:
///
/// * `T`, `U`: probes with no requirements
/// * `passive`: no lifecycle
/// * `needs`: probe requiring a `dep` injection with a lifecycle
/// * `listener`: probe requiring a `source` connection
/// * `typed`: probe requiring a `probe` injection that is a [`Probe`]
/// * `optional`: probe with an optional `maybe` injection
pub fn registry(log: &EventLog) -> Arc<TypeRegistry> {
    let registry = TypeRegistry::new();
    registry.register(probe_type("T", log));
    registry.register(probe_type("U", log));
    registry.register(
        probe_type("needs", log).require(
            Requirement::component("dep").with_capability(Capability::Lifecycle),
        ),
    );
    registry.register(probe_type("listener", log).require(Requirement::endpoint("source")));
    registry.register(probe_type("typed", log).require(Requirement::component_of::<Probe>("probe")));
    registry.register(
        probe_type("optional", log).require(Requirement::component("maybe").optional()),
    );

    let passive_log = log.clone();
    registry.register(TypeDef::new("passive", move |ctx| {
        passive_log.push(format!("create:{}", ctx.id));
        Ok(Arc::new(Passive {
            id: ctx.id.to_string(),
        }) as Arc<dyn Instance>)
    }));
    Arc::new(registry)
}

/// Engine over a YAML document with the test registry
pub fn engine(yaml: &str, log: &EventLog) -> Engine {
    engine_with(yaml, log, EngineConfig::default())
}

pub fn engine_with(yaml: &str, log: &EventLog, config: EngineConfig) -> Engine {
    let spec = SpecFile::from_yaml(yaml).expect("valid test document");
    Engine::from_spec(&spec, registry(log), config)
}

/// Identities of the nodes in each wave
pub fn waves(engine: &Engine) -> Vec<Vec<String>> {
    let tree = engine.tree();
    engine
        .init_order()
        .expect("engine is resolved")
        .waves()
        .iter()
        .map(|wave| wave.iter().map(|id| tree.id_of(*id).to_string()).collect())
        .collect()
}

/// Downcast a live instance to a [`Probe`]
pub fn probe(engine: &Engine, id: &str) -> Arc<Probe> {
    let instance = engine.instance(id).expect("instance exists");
    downcast_instance::<Probe>(&instance).expect("instance is a probe")
}
