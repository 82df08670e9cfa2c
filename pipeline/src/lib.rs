//! Geoportal layer pipeline - imports uploaded geodata into PostGIS and
//! publishes it through GeoServer.
//!
//! This library provides the pipeline core, its worker pool and the admin API.

pub mod admin;
pub mod catalog;
pub mod config;
pub mod entity;
pub mod error;
pub mod jobs;
pub mod loader;
pub mod metadata;
pub mod resolver;
pub mod spatial;
pub mod tasks;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;
