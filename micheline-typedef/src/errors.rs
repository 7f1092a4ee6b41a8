use std::fmt;

use micheline_types::{AddressError, DecodeError, OpCode};
use miette::Diagnostic;
use thiserror::Error;

/// Malformed type tree handed to the deriver.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum TypedefError {
    #[error("`{op}` expects {expected} arguments, found {found}")]
    #[diagnostic(code(micheline::typedef::arity))]
    Arity {
        op: OpCode,
        expected: usize,
        found: usize,
    },

    #[error("{found} is not a type")]
    #[diagnostic(
        code(micheline::typedef::not_a_type),
        help("type trees are built from type primitives such as `pair`, `or` or `nat`")
    )]
    NotAType { found: String },
}

/// A value that does not have the expected type. This is an ordinary
/// negative answer of the conformance check, not a failure of the engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("expected {expected} at path {}, found {value}", PathDisplay(.path))]
pub struct TypeMismatch {
    pub value: String,
    pub expected: String,
    pub path: Vec<usize>,
    help: Option<String>,
}

impl TypeMismatch {
    pub fn new(value: impl Into<String>, expected: impl Into<String>, path: &[usize]) -> Self {
        Self {
            value: value.into(),
            expected: expected.into(),
            path: path.to_vec(),
            help: None,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl Diagnostic for TypeMismatch {
    fn code(&self) -> Option<Box<dyn fmt::Display + '_>> {
        Some(Box::new("micheline::conform::mismatch"))
    }

    fn help(&self) -> Option<Box<dyn fmt::Display + '_>> {
        self.help
            .as_ref()
            .map(|help| Box::new(help.as_str()) as Box<dyn fmt::Display>)
    }
}

struct PathDisplay<'a>(&'a [usize]);

impl fmt::Display for PathDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("/")?;
        for (index, step) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str("/")?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

/// Failure to read or write big-map diff records.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum BigmapError {
    #[error("truncated big-map record at offset {0}")]
    #[diagnostic(code(micheline::bigmap::truncated))]
    Truncated(usize),

    #[error("unknown big-map action 0x{action:02x} at offset {offset}")]
    #[diagnostic(code(micheline::bigmap::action))]
    UnknownAction { action: u8, offset: usize },

    #[error("malformed {action} payload: expected a pair, found {found}")]
    #[diagnostic(code(micheline::bigmap::payload))]
    Payload { action: &'static str, found: String },

    #[error("big-map id {0} does not fit in 32 bits")]
    #[diagnostic(code(micheline::bigmap::id))]
    IdOutOfRange(String),

    #[error("key hash must be 32 bytes, found {0}")]
    #[diagnostic(code(micheline::bigmap::key_hash))]
    KeyHash(usize),

    #[error("invalid big-map event JSON: {0}")]
    #[diagnostic(code(micheline::bigmap::json))]
    Json(String),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Typedef(#[from] TypedefError),
}

/// Failure to marshal a host value into a tree.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum MarshalError {
    #[error("missing value for `{field}`")]
    #[diagnostic(code(micheline::marshal::missing))]
    Missing { field: String },

    #[error("`{field}` expects {expected}, found {found}")]
    #[diagnostic(code(micheline::marshal::shape))]
    Shape {
        field: String,
        expected: &'static str,
        found: String,
    },

    #[error("`{field}` holds an invalid {kind}: {reason}")]
    #[diagnostic(code(micheline::marshal::scalar))]
    Scalar {
        field: String,
        kind: String,
        reason: String,
    },

    #[error("`{field}` has type {kind}, which cannot be built from a host value")]
    #[diagnostic(code(micheline::marshal::unsupported))]
    Unsupported { field: String, kind: String },

    #[error("no branch of union `{field}` matches the given keys")]
    #[diagnostic(
        code(micheline::marshal::branch),
        help("pass an object whose single key names the chosen branch")
    )]
    NoBranch { field: String },
}
