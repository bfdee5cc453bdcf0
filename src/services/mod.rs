//! External metadata services.

pub mod provider;
pub mod tmdb;
pub mod tvmaze;

pub use provider::{call_with_timeout, MetadataProvider, Providers};
