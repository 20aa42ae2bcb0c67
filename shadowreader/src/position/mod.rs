//! Resumable reading positions.
//!
//! This module provides:
//! - `BookIdentity`, the persistence key of a book
//! - `PositionRecord`, the tagged resume point with legacy decoding
//! - `PositionStore` over a host `SettingsStore`

mod record;
mod store;

pub use record::{BookIdentity, PositionRecord};
pub use store::{JsonFileSettingsStore, MemorySettingsStore, PositionStore, SettingsStore};
