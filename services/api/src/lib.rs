//! services/api/src/lib.rs
//!
//! Library root for the API service, exposing the modules the binaries wire
//! together.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
