//! Reverse type inference: guesses a type tree for an untyped value.
//!
//! The result is a plausible type, not a principal one. Literals are
//! ambiguous (a string may be an address or a plain string, an empty
//! sequence may be any collection) and the unseen arm of an `or` is assumed
//! to mirror the seen one, so callers should compare inferred types with
//! [`Typedef::similar`] rather than [`Typedef::equal`].

use chrono::DateTime;
use micheline_types::{Address, AddressKind, Node, OpCode, Prim, Signature, split_entrypoint};

use crate::{errors::TypedefError, typedef::Typedef};

fn ty(op: OpCode) -> Prim {
    Prim::nullary(op)
}

fn address_type(address: &Address) -> Prim {
    if address.kind == AddressKind::Bls12_381 {
        ty(OpCode::tx_rollup_l2_address)
    } else {
        ty(OpCode::address)
    }
}

fn string_type(text: &str) -> Prim {
    if DateTime::parse_from_rfc3339(text).is_ok() {
        return ty(OpCode::timestamp);
    }
    let (address, _) = split_entrypoint(text);
    if let Ok(address) = address.parse::<Address>() {
        return address_type(&address);
    }
    if text.parse::<Signature>().is_ok() {
        return ty(OpCode::signature);
    }
    ty(OpCode::string)
}

fn bytes_type(bytes: &[u8]) -> Prim {
    match Address::from_bytes(bytes) {
        Ok(address) => address_type(&address),
        Err(_) => ty(OpCode::bytes),
    }
}

fn sequence_type(value: &Prim, items: &[Prim]) -> Prim {
    if value.looks_like_code() {
        return ty(OpCode::lambda);
    }
    if value.looks_like_map() {
        let first = &items[0];
        return Prim::binary(
            OpCode::map,
            build_type(&first.args()[0]),
            build_type(&first.args()[1]),
        );
    }
    if value.looks_like_set() {
        return Prim::unary(OpCode::set, build_type(&items[0]));
    }
    match items {
        [] => ty(OpCode::list),
        [item] => Prim::unary(OpCode::list, build_type(item)),
        _ => Prim::new(OpCode::pair, items.iter().map(build_type).collect()),
    }
}

fn application_type(op: OpCode, args: &[Prim]) -> Prim {
    if op.is_instruction() || op == OpCode::Lambda_rec {
        return ty(OpCode::lambda);
    }
    match (op, args) {
        (OpCode::True | OpCode::False, []) => ty(OpCode::bool),
        (OpCode::Unit, []) => ty(OpCode::unit),
        (OpCode::None, []) => ty(OpCode::option),
        (op, []) if op.is_type() => ty(op),
        (OpCode::Some, [inner]) => Prim::unary(OpCode::option, build_type(inner)),
        (OpCode::Left | OpCode::Right, [inner]) => {
            let arm = build_type(inner);
            Prim::binary(OpCode::or, arm.clone(), arm)
        }
        (OpCode::ticket, [inner]) => Prim::unary(OpCode::ticket, build_type(inner)),
        (OpCode::Elt, [key, value]) => {
            Prim::binary(OpCode::map, build_type(key), build_type(value))
        }
        (OpCode::Pair, args) if args.len() >= 2 => {
            Prim::new(OpCode::pair, args.iter().map(build_type).collect())
        }
        (_, [left, right]) => Prim::binary(OpCode::pair, build_type(left), build_type(right)),
        _ => ty(OpCode::never),
    }
}

/// Guess the type tree of `value`. Shapes no value can have, such as a
/// `Some` without argument, yield `never`.
pub fn build_type(value: &Prim) -> Prim {
    match &value.node {
        Node::Int(_) => ty(OpCode::int),
        Node::String(text) => string_type(text),
        Node::Bytes(bytes) => bytes_type(bytes),
        Node::Seq(items) => sequence_type(value, items),
        Node::App(op, args) => application_type(*op, args),
    }
}

impl Typedef {
    /// Typedef of the type inferred for `value`.
    pub fn infer(value: &Prim, name: &str) -> Result<Typedef, TypedefError> {
        Typedef::derive(&build_type(value), name)
    }
}
