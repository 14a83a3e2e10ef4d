//! Data model for parsed chat sessions and usage tallies.
//!
//! - [`session`]: [`ParsedSession`], [`ChatTurn`] and the per-turn pieces
//! - [`context`]: the fixed-shape [`ContextReferenceUsage`] counter record
//! - [`usage`]: model/editor/mode/tool tallies and the per-file [`SessionSummary`]

pub mod context;
pub mod session;
pub mod usage;

pub use context::*;
pub use session::*;
pub use usage::*;
