use indexmap::IndexMap;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::{default_stop_timeout_ms, ProcessConfig, ProcessInstance};
use crate::component::{ComponentContext, ComponentError, Instance, TypeDef};

const DEFAULT_SHELL: [&str; 2] = ["/bin/sh", "-c"];

/// `shell` configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ShellConfig {
    /// Command line passed to the shell as its last argument
    #[serde(default)]
    pub command: String,
    /// Shell program and its leading arguments
    #[serde(default)]
    pub shell: Vec<String>,
    #[serde(default)]
    pub workdir: Option<PathBuf>,
    #[serde(default)]
    pub env: IndexMap<String, String>,
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
}

impl ShellConfig {
    fn into_process(self, name: &str) -> Result<ProcessConfig, ComponentError> {
        if self.command.is_empty() {
            return Err(ComponentError::Config(format!("{}: command is required", name)));
        }
        let mut shell = if self.shell.is_empty() {
            DEFAULT_SHELL.iter().map(|s| s.to_string()).collect()
        } else {
            self.shell
        };
        let executable = shell.remove(0);
        shell.push(self.command);

        Ok(ProcessConfig {
            name: name.to_string(),
            executable,
            args: shell,
            env: self.env,
            working_dir: self.workdir,
            stop_timeout: Duration::from_millis(self.stop_timeout_ms),
        })
    }
}

fn create(ctx: &ComponentContext<'_>) -> Result<Arc<dyn Instance>, ComponentError> {
    let config: ShellConfig = ctx.config_as()?;
    Ok(Arc::new(ProcessInstance::new(config.into_process(ctx.id)?)))
}

pub(super) fn component_type() -> TypeDef {
    TypeDef::new("shell", create).describe(
        "[BuiltIn] Execute shell command\n\
         config: command, shell (default /bin/sh -c), workdir, env, stop_timeout_ms",
    )
}
