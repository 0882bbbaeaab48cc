//! Data models for the project library.
//!
//! Input documents use the camelCase shape of the import format; persisted
//! aggregates use the same casing so the frontend can consume both.

mod document;
mod enrollment;
mod import;
mod lookup;
mod project;

pub use document::*;
pub use enrollment::*;
pub use import::*;
pub use lookup::*;
pub use project::*;
