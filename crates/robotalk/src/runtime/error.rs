//! Engine errors and their per-phase aggregation

use std::fmt;

use crate::component::{ComponentError, RegistryError};
use crate::hub::HubError;

/// A single failure attributed to a node (or to the tree as a whole)
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{node}: unresolved injection '{name}' -> '{reference}'")]
    UnresolvedReference {
        node: String,
        name: String,
        reference: String,
    },

    #[error("{node}: unresolved connection '{name}' -> '{path}'")]
    UnresolvedEndpoint {
        node: String,
        name: String,
        path: String,
    },

    #[error("{node}: cyclic injection")]
    CyclicDependency { node: String },

    #[error("{node}: type unresolved: {source}")]
    UnknownType {
        node: String,
        #[source]
        source: RegistryError,
    },

    #[error("{node}: {kind} '{name}' required by type '{type_name}' is not declared")]
    MissingInjection {
        node: String,
        type_name: String,
        kind: &'static str,
        name: String,
    },

    #[error("{node}: instantiation failed: {source}")]
    InstantiationFailure {
        node: String,
        #[source]
        source: ComponentError,
    },

    #[error("{node}: start failed: {source}")]
    StartFailure {
        node: String,
        #[source]
        source: ComponentError,
    },

    #[error("{node}: stop failed: {source}")]
    StopFailure {
        node: String,
        #[source]
        source: ComponentError,
    },

    #[error("publish failed: {0}")]
    Publish(#[source] HubError),

    #[error("unpublish failed: {0}")]
    Unpublish(#[source] HubError),

    #[error("component tree has not been resolved")]
    NotResolved,

    #[error("engine is connected; disconnect before resolving again")]
    Connected,
}

impl EngineError {
    /// Full identity of the node the error refers to, if any
    pub fn node(&self) -> Option<&str> {
        match self {
            EngineError::UnresolvedReference { node, .. }
            | EngineError::UnresolvedEndpoint { node, .. }
            | EngineError::CyclicDependency { node }
            | EngineError::UnknownType { node, .. }
            | EngineError::MissingInjection { node, .. }
            | EngineError::InstantiationFailure { node, .. }
            | EngineError::StartFailure { node, .. }
            | EngineError::StopFailure { node, .. } => Some(node),
            EngineError::Publish(_)
            | EngineError::Unpublish(_)
            | EngineError::NotResolved
            | EngineError::Connected => None,
        }
    }

    /// Whether this error belongs to the resolve phase
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            EngineError::UnresolvedReference { .. }
                | EngineError::UnresolvedEndpoint { .. }
                | EngineError::CyclicDependency { .. }
                | EngineError::UnknownType { .. }
                | EngineError::MissingInjection { .. }
        )
    }
}

/// All errors collected during one phase, reported together
#[derive(Debug, Default)]
pub struct AggregateError {
    errors: Vec<EngineError>,
}

impl AggregateError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: EngineError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[EngineError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<EngineError> {
        self.errors
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EngineError> {
        self.errors.iter()
    }

    /// Identities of every node that has at least one error
    pub fn nodes(&self) -> Vec<&str> {
        let mut nodes: Vec<&str> = self.errors.iter().filter_map(EngineError::node).collect();
        nodes.dedup();
        nodes
    }

    /// `Ok(())` when nothing was collected
    pub fn into_result(self) -> Result<(), AggregateError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<EngineError> for AggregateError {
    fn from(error: EngineError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl Extend<EngineError> for AggregateError {
    fn extend<T: IntoIterator<Item = EngineError>>(&mut self, iter: T) {
        self.errors.extend(iter);
    }
}

impl<'a> IntoIterator for &'a AggregateError {
    type Item = &'a EngineError;
    type IntoIter = std::slice::Iter<'a, EngineError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.as_slice() {
            [] => write!(f, "no errors"),
            [single] => write!(f, "{}", single),
            errors => {
                write!(f, "{} errors:", errors.len())?;
                for error in errors {
                    write!(f, "\n  {}", error)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for AggregateError {}
