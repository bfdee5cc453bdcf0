//! Media Ingest Library
//!
//! File ingestion for a personal media library: classify new video files,
//! match them to tracked shows and movies, arbitrate quality, and move them
//! into place safely, with pending review and quarantine for the rest.

pub mod cli;
pub mod core;
pub mod error;
pub mod generators;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

pub use error::{Error, Result};
