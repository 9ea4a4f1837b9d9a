//! Compiles AuthPolicy documents into Istio EnvoyFilter resources.
//!
//! The pipeline is linear:
//!
//! ```text
//! AuthPolicy ─► IdentityResolver ─► NetworkTarget ─► assemble ─► FilterRenderer ─► DocumentSerializer
//! ```
//!
//! [`compiler::PolicyCompiler`] drives the first four steps; serialization is
//! left to the caller so nothing is written until the whole document exists.

pub mod assembler;
pub mod compiler;
pub mod model;
pub mod render;
pub mod script;
pub mod serialize;

pub use assembler::{BundleInputs, CompiledPolicy, assemble, validate_policy};
pub use compiler::PolicyCompiler;
pub use model::EnvoyFilter;
pub use render::FilterRenderer;
pub use script::ScriptParams;
pub use serialize::{DocumentSerializer, JsonSerializer, YamlSerializer, serializer_for};
