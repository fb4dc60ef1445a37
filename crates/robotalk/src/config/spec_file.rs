//! Component specification document schema definitions

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Path separator used in component identities and references
pub const PATH_SEPARATOR: char = '/';

/// Reference segment that climbs one level up the tree
pub const PARENT_SEGMENT: &str = "..";

/// Root specification document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpecFile {
    /// Name of the component tree (used as the root of published paths)
    #[serde(default)]
    pub name: String,

    /// Document version
    #[serde(default)]
    pub version: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Author of the document
    #[serde(default)]
    pub author: String,

    /// Top-level components (ordered map for deterministic processing)
    #[serde(default)]
    pub components: IndexMap<String, ComponentConfig>,
}

/// A single component entry in the document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentConfig {
    /// Registered type name; empty for a pure grouping node
    #[serde(default, rename = "type")]
    pub type_name: String,

    /// Injected dependencies: name -> reference to another component
    #[serde(default)]
    pub inject: IndexMap<String, String>,

    /// External connections: name -> hub endpoint path
    #[serde(default)]
    pub connect: IndexMap<String, String>,

    /// Opaque configuration handed to the component factory
    #[serde(default)]
    pub config: serde_json::Value,

    /// Nested child components
    #[serde(default)]
    pub components: IndexMap<String, ComponentConfig>,
}

impl ComponentConfig {
    /// Create a grouping node with no type
    pub fn group() -> Self {
        Self::default()
    }

    /// Create a node of the given type
    pub fn typed(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Self::default()
        }
    }

    /// Add an injection
    pub fn with_inject(mut self, name: impl Into<String>, reference: impl Into<String>) -> Self {
        self.inject.insert(name.into(), reference.into());
        self
    }

    /// Add an external connection
    pub fn with_connect(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.connect.insert(name.into(), path.into());
        self
    }

    /// Replace the configuration blob
    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }

    /// Add a child component
    pub fn with_child(mut self, name: impl Into<String>, child: ComponentConfig) -> Self {
        self.components.insert(name.into(), child);
        self
    }
}

impl SpecFile {
    /// Create an empty document with a name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a top-level component
    pub fn with_component(mut self, name: impl Into<String>, component: ComponentConfig) -> Self {
        self.components.insert(name.into(), component);
        self
    }

    /// Load a document from a YAML or JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SpecFileError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| SpecFileError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_str(&content)
    }

    /// Parse a document, picking JSON when the content starts with `{`
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, SpecFileError> {
        if content.trim_start().starts_with('{') {
            Self::from_json(content)
        } else {
            Self::from_yaml(content)
        }
    }

    /// Parse a document from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self, SpecFileError> {
        let spec: SpecFile = serde_yaml::from_str(content)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Parse a document from a JSON string
    pub fn from_json(content: &str) -> Result<Self, SpecFileError> {
        let spec: SpecFile = serde_json::from_str(content)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Validate component names across the whole tree
    pub fn validate(&self) -> Result<(), SpecFileError> {
        validate_children("", &self.components)
    }

    /// Total number of components in the tree
    pub fn component_count(&self) -> usize {
        fn count(children: &IndexMap<String, ComponentConfig>) -> usize {
            children
                .values()
                .map(|child| 1 + count(&child.components))
                .sum()
        }
        count(&self.components)
    }

    /// All distinct type names used in the tree, sorted
    pub fn type_names(&self) -> Vec<String> {
        fn collect(children: &IndexMap<String, ComponentConfig>, out: &mut Vec<String>) {
            for child in children.values() {
                if !child.type_name.is_empty() {
                    out.push(child.type_name.clone());
                }
                collect(&child.components, out);
            }
        }
        let mut names = Vec::new();
        collect(&self.components, &mut names);
        names.sort();
        names.dedup();
        names
    }
}

fn validate_children(
    prefix: &str,
    children: &IndexMap<String, ComponentConfig>,
) -> Result<(), SpecFileError> {
    for (name, child) in children {
        if name.is_empty() || name == PARENT_SEGMENT || name.contains(PATH_SEPARATOR) {
            return Err(SpecFileError::Validation(format!(
                "invalid component name '{}' under '{}'",
                name,
                if prefix.is_empty() { "/" } else { prefix }
            )));
        }
        let id = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}{}{}", prefix, PATH_SEPARATOR, name)
        };
        validate_children(&id, &child.components)?;
    }
    Ok(())
}

/// Errors that can occur when loading a specification document
#[derive(Debug, thiserror::Error)]
pub enum SpecFileError {
    #[error("Failed to read spec file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML spec: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON spec: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}
