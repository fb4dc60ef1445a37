//! Component tree resolution and lifecycle orchestration

pub mod dependency;
pub mod engine;
pub mod error;
mod resolver;
pub mod tree;

pub use dependency::*;
pub use engine::*;
pub use error::*;
pub use tree::*;
