//! Data models shared across the pipeline.

pub mod action;
pub mod activity;
pub mod catalog;
pub mod config;
pub mod job;
pub mod media;
pub mod quarantine;
