//! Core types for compiling AuthPolicy documents into sidecar proxy configuration.
//!
//! This crate holds everything that needs no I/O:
//!
//! - [`policy`]: the AuthPolicy document model and auto-login defaults
//! - [`matcher`]: path/method matchers compiled into Lua pattern tables
//! - [`encoding`]: form-encoding of login and sign-out query parameters
//! - [`lua`]: Lua literal helpers shared by the above
//! - [`error`]: the [`CompileError`] raised by every compilation stage

pub mod encoding;
pub mod error;
pub mod lua;
pub mod matcher;
pub mod policy;

pub use error::CompileError;
pub use matcher::{CompiledRule, PatternTable, validate_matchers, validate_path};
pub use policy::{AuthPolicy, AutoLoginConfig, RequestMatcher};

/// Result type for compilation stages.
pub type Result<T> = std::result::Result<T, CompileError>;
