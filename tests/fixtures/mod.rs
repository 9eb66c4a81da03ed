//! Test fixtures for tour-planner.
//!
//! Provides real Paris locations and in-memory doubles for the travel-time
//! and route geometry services.

#![allow(dead_code)]

pub mod paris_sites;
pub mod services;

pub use paris_sites::*;
pub use services::*;
