//! Database queries for the Launchpad Control Plane.

pub mod project;
