use indexmap::IndexMap;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::{default_stop_timeout_ms, ProcessConfig, ProcessInstance};
use crate::component::{ComponentContext, ComponentError, Instance, TypeDef};

/// `cmd` configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CmdConfig {
    /// Program to execute
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub workdir: Option<PathBuf>,
    #[serde(default)]
    pub env: IndexMap<String, String>,
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
}

impl CmdConfig {
    fn into_process(self, name: &str) -> Result<ProcessConfig, ComponentError> {
        if self.command.is_empty() {
            return Err(ComponentError::Config(format!("{}: command is required", name)));
        }
        Ok(ProcessConfig {
            name: name.to_string(),
            executable: self.command,
            args: self.args,
            env: self.env,
            working_dir: self.workdir,
            stop_timeout: Duration::from_millis(self.stop_timeout_ms),
        })
    }
}

fn create(ctx: &ComponentContext<'_>) -> Result<Arc<dyn Instance>, ComponentError> {
    let config: CmdConfig = ctx.config_as()?;
    Ok(Arc::new(ProcessInstance::new(config.into_process(ctx.id)?)))
}

pub(super) fn component_type() -> TypeDef {
    TypeDef::new("cmd", create).describe(
        "[BuiltIn] Execute external program\n\
         config: command, args, workdir, env, stop_timeout_ms",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Injections;
    use serde_json::json;

    fn context<'a>(config: &'a serde_json::Value, injections: &'a Injections) -> ComponentContext<'a> {
        ComponentContext {
            id: "tools/ls",
            local_id: "ls",
            type_name: "cmd",
            config,
            injections,
        }
    }

    #[test]
    fn test_process_config() {
        let config: CmdConfig = serde_json::from_value(json!({
            "command": "ls",
            "args": ["-l"],
            "env": { "LC_ALL": "C" },
        }))
        .unwrap();
        let process = config.into_process("tools/ls").unwrap();
        assert_eq!(process.name, "tools/ls");
        assert_eq!(process.executable, "ls");
        assert_eq!(process.args, vec!["-l"]);
        assert_eq!(process.env["LC_ALL"], "C");
        assert_eq!(process.stop_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_command_required() {
        let config = json!({ "args": ["-l"] });
        let injections = Injections::new();
        let err = create(&context(&config, &injections)).err().unwrap();
        assert!(err.to_string().contains("tools/ls: command is required"));
    }
}
