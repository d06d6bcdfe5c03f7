//! # Rosters Library
//!
//! Roster ingestion and artifact reconciliation: spreadsheet header
//! detection and row validation, batch/record persistence, tenant
//! isolation, and the HTTP surface over those operations.

pub mod audit;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod headers;
pub mod models;
pub mod pipelines;
pub mod repositories;
pub mod rows;
pub mod server;
pub mod state;
pub mod storage;
pub mod telemetry;
pub mod tenancy;
pub use migration;
