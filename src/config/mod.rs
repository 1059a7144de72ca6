//! Settings for the reconciler daemon itself.
//!
//! # Data Flow
//! ```text
//! settings file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → schema.rs types (all fields defaulted)
//!     → handed to wiring in main.rs
//! ```
//!
//! # Design Decisions
//! - Settings are immutable once loaded
//! - All fields have defaults so a minimal file works
//! - These are process settings; routing entities live in the store, not
//!   here

pub mod loader;
pub mod schema;

pub use loader::load_settings;
pub use schema::{DirectorSettings, EngineSettings, ReloadSettings};
