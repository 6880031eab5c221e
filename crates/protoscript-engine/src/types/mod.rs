//! Type model
//!
//! Structural types shared by the analyzer, the IR, and the C backend.
//! Subtyping between named types needs the prototype graph and lives in
//! `checker::registry`.

pub mod ty;

pub use ty::{GenericKind, PrimitiveType, Type, TypeParseError};
