//! Shared types for the Micheline type engine
//!
//! This crate contains the primitives used across the workspace:
//! - The `Prim` expression tree and the `OpCode` table
//! - Canonical binary and JSON codecs
//! - Address, key, signature, chain id and expression hash encodings
//! - Error types

pub mod address;
pub mod binary;
pub mod error;
pub mod json;
pub mod opcode;
pub mod prim;

pub use address::*;
pub use binary::*;
pub use error::*;
pub use opcode::*;
pub use prim::*;
