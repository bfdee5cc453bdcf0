//! Core business logic modules.

pub mod actions;
pub mod catalog;
pub mod classifier;
pub mod discovery;
pub mod fallback;
pub mod jobs;
pub mod locks;
pub mod matcher;
pub mod pipeline;
pub mod quality;
pub mod quarantine;
pub mod renamer;
pub mod scanner;
pub mod watcher;
