//! Database models for the Launchpad Control Plane.
//!
//! This module contains SQLx-compatible model definitions
//! for all database tables.

pub mod project;

pub use project::*;
