//! Error types for the Micheline primitives

use miette::Diagnostic;
use thiserror::Error;

/// Failure to read a tree from its binary or JSON form.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected end of input at offset {0}")]
    #[diagnostic(code(micheline::decode::truncated))]
    Truncated(usize),

    #[error("unknown node tag 0x{tag:02x} at offset {offset}")]
    #[diagnostic(code(micheline::decode::tag))]
    UnknownTag { tag: u8, offset: usize },

    #[error("unknown opcode 0x{0:02x}")]
    #[diagnostic(code(micheline::decode::opcode))]
    UnknownOpCode(u8),

    #[error("unknown primitive `{0}`")]
    #[diagnostic(code(micheline::decode::primitive))]
    UnknownPrimitive(String),

    #[error("invalid utf-8 in string literal at offset {0}")]
    #[diagnostic(code(micheline::decode::utf8))]
    InvalidUtf8(usize),

    #[error("expression nested too deeply at offset {offset}")]
    #[diagnostic(code(micheline::decode::depth))]
    TooDeep { offset: usize },

    #[error("{0} trailing bytes after expression")]
    #[diagnostic(code(micheline::decode::trailing))]
    TrailingBytes(usize),

    #[error("missing 0x05 pack prefix")]
    #[diagnostic(code(micheline::decode::pack_prefix))]
    MissingPackPrefix,

    #[error("invalid JSON expression: {0}")]
    #[diagnostic(code(micheline::decode::json))]
    InvalidJson(String),
}

/// Failure to parse or decode an account identifier, key, signature or hash.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid base58check string `{0}`")]
    #[diagnostic(code(micheline::address::base58))]
    Base58(String),

    #[error("unknown prefix in `{0}`")]
    #[diagnostic(code(micheline::address::prefix))]
    UnknownPrefix(String),

    #[error("expected {expected} bytes, found {found}")]
    #[diagnostic(code(micheline::address::length))]
    Length { expected: usize, found: usize },

    #[error("unknown binary tag 0x{0:02x}")]
    #[diagnostic(code(micheline::address::tag))]
    UnknownTag(u8),

    #[error("`{0}` is not an implicit account")]
    #[diagnostic(code(micheline::address::not_implicit))]
    NotImplicit(String),

    #[error("invalid entrypoint suffix `{0}`")]
    #[diagnostic(code(micheline::address::entrypoint))]
    Entrypoint(String),
}
