//! Built-in component types.
//!
//! * `cmd` runs an external program.
//! * `shell` runs a command line through a shell.
//!
//! Both expose a `status` data point that reports `running` with the pid
//! after start and `stopped` with the exit code after stop.

mod cmd;
mod process;
mod shell;

pub use cmd::CmdConfig;
pub use process::{
    ManagedProcess, ProcessConfig, ProcessError, ProcessStatus, DEFAULT_STOP_TIMEOUT,
};
pub use shell::ShellConfig;

use async_trait::async_trait;
use serde_json::json;

use crate::component::{ComponentError, Instance, Lifecycle, TypeRegistry};
use crate::hub::Endpoint;

/// Name of the data point every process instance exposes
pub const STATUS_ENDPOINT: &str = "status";

/// Register `cmd` and `shell` into `registry`
pub fn register_builtins(registry: &TypeRegistry) {
    registry.register(cmd::component_type());
    registry.register(shell::component_type());
}

fn default_stop_timeout_ms() -> u64 {
    DEFAULT_STOP_TIMEOUT.as_millis() as u64
}

/// Live instance of a built-in type: one child process
pub struct ProcessInstance {
    process: ManagedProcess,
    status: Endpoint,
}

impl ProcessInstance {
    fn new(config: ProcessConfig) -> Self {
        Self {
            process: ManagedProcess::new(config),
            status: Endpoint::data_point(STATUS_ENDPOINT),
        }
    }

    pub fn process(&self) -> &ManagedProcess {
        &self.process
    }
}

impl Instance for ProcessInstance {
    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        Some(self)
    }

    fn endpoints(&self) -> Vec<Endpoint> {
        vec![self.status.clone()]
    }
}

#[async_trait]
impl Lifecycle for ProcessInstance {
    async fn start(&self) -> Result<(), ComponentError> {
        let pid = self.process.start().await?;
        self.status.update(json!({ "state": "running", "pid": pid }));
        Ok(())
    }

    async fn stop(&self) -> Result<(), ComponentError> {
        let code = self.process.stop().await?;
        self.status.update(json!({ "state": "stopped", "code": code }));
        Ok(())
    }
}
