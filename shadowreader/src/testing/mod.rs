//! Testing utilities for reader integrations.
//!
//! This module provides:
//! - `ScriptedSite`, an in-memory site adapter with failure injection
//! - `RecordingDisplay`, a display callback that keeps what it was shown

mod mocks;

pub use mocks::{RecordingDisplay, ScriptedSite};
