//! Specification document parsing and validation

mod spec_file;

pub use spec_file::*;
