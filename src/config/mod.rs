//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → DispatcherConfig (validated, immutable)
//!     → handed to the orchestrator at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require constructing a new
//!   orchestrator
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{DispatcherConfig, OrchestratorConfig};
pub use validation::{validate_config, ValidationError};
