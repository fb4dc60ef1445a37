//! Command-line interface for robotalk

use argh::FromArgs;

use crate::runtime::{EngineConfig, WavePolicy};

/// Resolve a component tree and run it until interrupted
#[derive(FromArgs, Debug)]
pub struct RunArgs {
    /// path to the specification file (YAML or JSON)
    #[argh(positional)]
    pub spec: Option<String>,

    /// show the initialization plan without instantiating anything
    #[argh(switch)]
    pub dry_run: bool,

    /// validate the specification file and exit
    #[argh(switch)]
    pub validate: bool,

    /// list registered component types and exit
    #[argh(switch)]
    pub list_types: bool,

    /// print version and exit
    #[argh(switch)]
    pub version: bool,

    /// wave grouping policy (level, cascade)
    #[argh(option, default = "WavePolicy::Level")]
    pub waves: WavePolicy,

    /// name to publish the tree under (default: document name)
    #[argh(option)]
    pub root: Option<String>,

    /// log level (error, warn, info, debug, trace)
    #[argh(option, short = 'l', default = "String::from(\"info\")", from_str_fn(parse_log_level))]
    pub log_level: String,
}

/// Parse and normalize a log level
fn parse_log_level(s: &str) -> Result<String, String> {
    match s.to_lowercase().as_str() {
        level @ ("error" | "warn" | "info" | "debug" | "trace") => Ok(level.to_string()),
        _ => Err(format!(
            "Invalid log level '{}'. Expected one of error, warn, info, debug, trace",
            s
        )),
    }
}

impl RunArgs {
    /// Engine configuration from the command line
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            wave_policy: self.waves,
            root_name: self.root.clone(),
        }
    }
}
