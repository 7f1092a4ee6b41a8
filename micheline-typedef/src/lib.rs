//! Structural type engine for Micheline
//!
//! This crate provides:
//! - Typedef derivation from annotated type trees
//! - Structural comparison and reverse type inference
//! - Conformance checks of untyped values
//! - Entrypoint discovery and interface matching
//! - The big-map diff codec
//! - Marshaling of JSON host values into trees

pub mod algebra;
pub mod bigmap;
pub mod conform;
pub mod entrypoints;
pub mod errors;
pub mod infer;
pub mod interfaces;
pub mod marshal;
pub mod typedef;

#[cfg(test)]
pub(crate) mod test_utils;

pub use bigmap::{
    BigmapAction, BigmapEvent, decode_events, detect_bigmaps, encode_events, events_from_json,
    events_to_json,
};
pub use entrypoints::{Entrypoint, EntrypointOptions, Entrypoints, discover_entrypoints};
pub use errors::{BigmapError, MarshalError, TypeMismatch, TypedefError};
pub use infer::build_type;
pub use interfaces::{Interface, InterfaceSpec};
pub use typedef::{TypeKind, Typedef, build_typedef};
