//! Naming generators.

pub mod filename;
