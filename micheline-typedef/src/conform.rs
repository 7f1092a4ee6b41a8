//! Conformance of untyped values to a typedef.

use std::borrow::Cow;

use micheline_types::{Node, OpCode, Prim};
use tracing::trace;

use crate::{errors::TypeMismatch, typedef::{TypeKind, Typedef}};

impl Typedef {
    /// Whether `value` can be read as a value of this type.
    pub fn implements_type(&self, value: &Prim) -> bool {
        self.check_value(value).is_ok()
    }

    /// Like [`Typedef::implements_type`], reporting the first mismatch.
    pub fn check_value(&self, value: &Prim) -> Result<(), TypeMismatch> {
        check(self, value).inspect_err(|mismatch| trace!(%mismatch, "value does not conform"))
    }
}

fn mismatch(ty: &Typedef, value: &Prim) -> TypeMismatch {
    TypeMismatch::new(value.describe(), ty.to_string(), &ty.path)
}

fn check(ty: &Typedef, value: &Prim) -> Result<(), TypeMismatch> {
    if ty.optional {
        return match (&value.node, value.args().len()) {
            (Node::App(OpCode::Some, _), 1) | (Node::App(OpCode::None, _), 0) => Ok(()),
            _ => Err(
                mismatch(ty, value).with_help("optional values are written `Some x` or `None`")
            ),
        };
    }
    match ty.kind {
        TypeKind::Struct => {
            for arg in &ty.args {
                let field = comb_field(value, arg.relative_path(ty))
                    .ok_or_else(|| mismatch(arg, value))?;
                check(arg, &field)?;
            }
            Ok(())
        }
        TypeKind::Union => {
            let (branch, payload) = select_branch(ty, value).ok_or_else(|| {
                mismatch(ty, value).with_help("union values are nested `Left` and `Right` wrappers")
            })?;
            check(branch, payload)
        }
        TypeKind::Op(op) | TypeKind::Sapling { op, .. } => check_op(ty, op, value),
    }
}

fn is_comb(value: &Prim) -> bool {
    match &value.node {
        Node::App(OpCode::Pair, args) => args.len() >= 2,
        Node::Seq(items) => items.len() >= 2,
        _ => false,
    }
}

/// Child of a right comb value (`Pair`, variadic `Pair` or a sequence)
/// reached through a typedef path.
pub(crate) fn comb_field<'a>(value: &'a Prim, path: &[usize]) -> Option<Cow<'a, Prim>> {
    let Some((&first, rest)) = path.split_first() else {
        return Some(Cow::Borrowed(value));
    };
    if !is_comb(value) {
        return None;
    }
    match value.comb_arg(first)? {
        Cow::Borrowed(child) => comb_field(child, rest),
        Cow::Owned(child) => comb_field(&child, rest).map(|field| Cow::Owned(field.into_owned())),
    }
}

/// Branch of `union` addressed by the `Left`/`Right` wrappers of `value`,
/// together with the wrapped payload.
pub(crate) fn select_branch<'t, 'v>(
    union: &'t Typedef,
    value: &'v Prim,
) -> Option<(&'t Typedef, &'v Prim)> {
    let mut steps = Vec::new();
    let mut current = value;
    loop {
        let step = match (&current.node, current.args().len()) {
            (Node::App(OpCode::Left, _), 1) => 0,
            (Node::App(OpCode::Right, _), 1) => 1,
            _ => return None,
        };
        steps.push(step);
        current = &current.args()[0];
        let found = union
            .args
            .iter()
            .find(|arg| arg.relative_path(union) == steps.as_slice());
        if let Some(branch) = found {
            return Some((branch, current));
        }
    }
}

fn accepts_literal(op: OpCode, node: &Node) -> bool {
    use OpCode::*;
    match node {
        Node::Int(_) => matches!(
            op,
            int | nat | mutez | timestamp | big_map | sapling_state | bls12_381_fr
        ),
        Node::String(_) => matches!(
            op,
            string
                | address
                | key
                | key_hash
                | timestamp
                | signature
                | chain_id
                | contract
                | tx_rollup_l2_address
        ),
        Node::Bytes(_) => matches!(
            op,
            bytes
                | address
                | key
                | key_hash
                | signature
                | chain_id
                | contract
                | tx_rollup_l2_address
                | bls12_381_g1
                | bls12_381_g2
                | bls12_381_fr
                | sapling_transaction
                | chest
                | chest_key
        ),
        Node::Seq(_) | Node::App(..) => false,
    }
}

fn check_op(ty: &Typedef, op: OpCode, value: &Prim) -> Result<(), TypeMismatch> {
    match (&value.node, op) {
        (Node::Seq(items), OpCode::list | OpCode::set) => match ty.args.first() {
            Some(item_type) => items.iter().try_for_each(|item| check(item_type, item)),
            None => Ok(()),
        },
        (Node::Seq(items), OpCode::map | OpCode::big_map) => {
            for item in items {
                let [key, val] = item.args() else {
                    return Err(mismatch(ty, item));
                };
                if !item.is(OpCode::Elt) {
                    return Err(
                        mismatch(ty, item).with_help("map entries are written `Elt key value`")
                    );
                }
                if let [key_type, value_type] = ty.args.as_slice() {
                    check(key_type, key)?;
                    check(value_type, val)?;
                }
            }
            Ok(())
        }
        (Node::Seq(_), OpCode::lambda | OpCode::sapling_state) => Ok(()),
        (Node::App(OpCode::Lambda_rec, _), OpCode::lambda) => Ok(()),
        (Node::App(OpCode::True | OpCode::False, args), OpCode::bool) if args.is_empty() => Ok(()),
        (Node::App(OpCode::Unit, args), OpCode::unit) if args.is_empty() => Ok(()),
        (Node::App(OpCode::Some, args), OpCode::option) if args.len() == 1 => Ok(()),
        (Node::App(OpCode::None, args), OpCode::option) if args.is_empty() => Ok(()),
        (Node::App(OpCode::Pair, args), OpCode::ticket) if args.len() >= 2 => Ok(()),
        (node, op) if accepts_literal(op, node) => Ok(()),
        _ => Err(mismatch(ty, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty(op: OpCode) -> Prim {
        Prim::nullary(op)
    }

    fn derive(prim: &Prim) -> Typedef {
        Typedef::derive(prim, "x").unwrap()
    }

    #[test]
    fn structs_accept_any_comb_layout() {
        let typedef = derive(&Prim::new(
            OpCode::pair,
            vec![ty(OpCode::nat), ty(OpCode::string), ty(OpCode::bool)],
        ));
        let comb = Prim::binary(
            OpCode::Pair,
            Prim::int(1),
            Prim::binary(OpCode::Pair, Prim::string("a"), ty(OpCode::True)),
        );
        let variadic = Prim::new(
            OpCode::Pair,
            vec![Prim::int(1), Prim::string("a"), ty(OpCode::True)],
        );
        let sequence = Prim::seq(vec![Prim::int(1), Prim::string("a"), ty(OpCode::True)]);
        for value in [&comb, &variadic, &sequence] {
            assert_eq!(typedef.check_value(value), Ok(()), "{value}");
        }
        let wrong = Prim::new(OpCode::Pair, vec![Prim::int(1), Prim::int(2), ty(OpCode::True)]);
        let err = typedef.check_value(&wrong).unwrap_err();
        assert_eq!(err.path, vec![1, 0]);
        assert_eq!(err.expected, "string");
        assert!(!typedef.implements_type(&Prim::unary(OpCode::Some, Prim::int(1))));
    }

    #[test]
    fn unions_follow_branch_paths() {
        // or (or nat string) (or unit (or bytes int))
        let typedef = derive(&Prim::binary(
            OpCode::or,
            Prim::binary(OpCode::or, ty(OpCode::nat), ty(OpCode::string)),
            Prim::binary(
                OpCode::or,
                ty(OpCode::unit),
                Prim::binary(OpCode::or, ty(OpCode::bytes), ty(OpCode::int)),
            ),
        ));
        assert_eq!(typedef.args.len(), 5);
        let wrap = |steps: &[OpCode], payload: Prim| {
            steps.iter().rev().fold(payload, |inner, step| Prim::unary(*step, inner))
        };
        use OpCode::{Left, Right};
        assert!(typedef.implements_type(&wrap(&[Left, Left], Prim::int(1))));
        assert!(typedef.implements_type(&wrap(&[Left, Right], Prim::string("a"))));
        assert!(typedef.implements_type(&wrap(&[Right, Left], ty(OpCode::Unit))));
        assert!(typedef.implements_type(&wrap(&[Right, Right, Left], Prim::bytes(vec![1]))));
        assert!(typedef.implements_type(&wrap(&[Right, Right, Right], Prim::int(-1))));
        assert!(!typedef.implements_type(&wrap(&[Left, Left], Prim::string("a"))));
        assert!(!typedef.implements_type(&wrap(&[Left], Prim::int(1))));
        assert!(!typedef.implements_type(&Prim::int(1)));
    }

    #[test]
    fn optionals_only_check_the_wrapper() {
        let typedef = derive(&Prim::unary(OpCode::option, ty(OpCode::nat)));
        assert!(typedef.implements_type(&ty(OpCode::None)));
        assert!(typedef.implements_type(&Prim::unary(OpCode::Some, Prim::string("not checked"))));
        let err = typedef.check_value(&Prim::int(1)).unwrap_err();
        assert!(err.to_string().starts_with("expected option<nat> at path /"), "{err}");
    }

    #[test]
    fn collections() {
        let map = derive(&Prim::binary(OpCode::map, ty(OpCode::string), ty(OpCode::nat)));
        let entries = Prim::seq(vec![Prim::binary(OpCode::Elt, Prim::string("a"), Prim::int(1))]);
        assert!(map.implements_type(&entries));
        assert!(map.implements_type(&Prim::seq(vec![])));
        let pairs = Prim::binary(OpCode::Pair, Prim::string("a"), Prim::int(1));
        assert!(!map.implements_type(&Prim::seq(vec![pairs])));
        let int_keys = Prim::binary(OpCode::Elt, Prim::int(1), Prim::int(1));
        assert!(!map.implements_type(&Prim::seq(vec![int_keys])));

        let big_map = derive(&Prim::binary(OpCode::big_map, ty(OpCode::string), ty(OpCode::nat)));
        assert!(big_map.implements_type(&Prim::int(42)));
        assert!(big_map.implements_type(&entries));

        let list = derive(&Prim::unary(OpCode::list, ty(OpCode::bool)));
        assert!(list.implements_type(&Prim::seq(vec![ty(OpCode::True), ty(OpCode::False)])));
        assert!(!list.implements_type(&Prim::seq(vec![ty(OpCode::Unit)])));

        let lambda = derive(&Prim::binary(OpCode::lambda, ty(OpCode::unit), ty(OpCode::unit)));
        assert!(lambda.implements_type(&Prim::seq(vec![ty(OpCode::DROP), ty(OpCode::UNIT)])));
        assert!(!lambda.implements_type(&Prim::int(0)));
    }

    #[test]
    fn scalar_literals() {
        let cases = [
            (OpCode::nat, Prim::int(1), true),
            (OpCode::timestamp, Prim::int(0), true),
            (OpCode::timestamp, Prim::string("2024-01-01T00:00:00Z"), true),
            (OpCode::address, Prim::bytes(vec![0; 22]), true),
            (OpCode::chest, Prim::bytes(vec![1]), true),
            (OpCode::string, Prim::int(1), false),
            (OpCode::nat, Prim::string("1"), false),
            (OpCode::unit, ty(OpCode::Unit), true),
            (OpCode::bool, ty(OpCode::Unit), false),
            (OpCode::operation, Prim::bytes(vec![1]), false),
        ];
        for (op, value, expected) in cases {
            assert_eq!(derive(&ty(op)).implements_type(&value), expected, "{op} vs {value}");
        }
    }
}
