//! Well-known contract interfaces and matching them against entrypoints.

use std::{collections::HashMap, fmt, str::FromStr};

use micheline_types::{OpCode, Prim};
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::{
    entrypoints::{Entrypoint, Entrypoints},
    errors::TypedefError,
    typedef::{Typedef, build_typedef},
};

/// A standard set of entrypoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "&'static str")]
pub enum Interface {
    /// Account manager contract (`do`, `default`).
    Manager,
    /// Delegation management.
    SetDelegate,
    /// FA1 token.
    Tzip5,
    /// FA1.2 token.
    Tzip7,
    /// FA2 multi-asset token.
    Tzip12,
}

/// One entrypoint of an interface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterfaceSpec {
    pub name: &'static str,
    pub prim: Prim,
}

impl InterfaceSpec {
    /// Unfolded typedef of the spec entrypoint, named after it.
    pub fn typedef(&self) -> Result<Typedef, TypedefError> {
        let mut root = build_typedef(&self.prim, self.name, &[])?;
        root.name = self.name.to_string();
        Ok(root.unfold())
    }

    fn accepts(&self, entrypoint: &Entrypoint, strict: bool) -> bool {
        let Ok(expected) = self.typedef() else {
            return false;
        };
        let actual = entrypoint.signature().unfold();
        if strict {
            actual.strict_equal(&expected)
        } else {
            actual.equal(&expected)
        }
    }
}

impl Interface {
    pub const ALL: [Interface; 5] = [
        Interface::Manager,
        Interface::SetDelegate,
        Interface::Tzip5,
        Interface::Tzip7,
        Interface::Tzip12,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Interface::Manager => "MANAGER",
            Interface::SetDelegate => "SET_DELEGATE",
            Interface::Tzip5 => "TZIP-005",
            Interface::Tzip7 => "TZIP-007",
            Interface::Tzip12 => "TZIP-012",
        }
    }

    pub fn specs(self) -> &'static [InterfaceSpec] {
        INTERFACES.get(&self).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn typedefs(self) -> Result<Vec<Typedef>, TypedefError> {
        self.specs().iter().map(InterfaceSpec::typedef).collect()
    }

    /// Every spec entrypoint exists under its name with an equal type.
    pub fn matches(self, entrypoints: &Entrypoints) -> bool {
        self.matches_with(entrypoints, false)
    }

    /// Like [`Interface::matches`], also comparing field names.
    pub fn matches_strict(self, entrypoints: &Entrypoints) -> bool {
        self.matches_with(entrypoints, true)
    }

    /// Whether `entrypoint` is one of this interface's entrypoints.
    pub fn contains(self, entrypoint: &Entrypoint) -> bool {
        self.specs()
            .iter()
            .any(|spec| spec.name == entrypoint.name && spec.accepts(entrypoint, false))
    }

    fn matches_with(self, entrypoints: &Entrypoints, strict: bool) -> bool {
        self.specs().iter().all(|spec| {
            entrypoints
                .get(spec.name)
                .is_some_and(|entrypoint| spec.accepts(entrypoint, strict))
        })
    }
}

impl Entrypoints {
    /// Well-known interfaces these entrypoints satisfy.
    pub fn interfaces(&self) -> Vec<Interface> {
        Interface::ALL
            .into_iter()
            .filter(|interface| interface.matches(self))
            .collect()
    }
}

impl From<Interface> for &'static str {
    fn from(interface: Interface) -> Self {
        interface.name()
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Interface {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Interface::ALL
            .into_iter()
            .find(|interface| interface.name().eq_ignore_ascii_case(text))
            .ok_or_else(|| format!("unknown interface `{text}`"))
    }
}

fn ty(op: OpCode) -> Prim {
    Prim::nullary(op)
}

fn pair(left: Prim, right: Prim) -> Prim {
    Prim::binary(OpCode::pair, left, right)
}

fn unary(op: OpCode, arg: Prim) -> Prim {
    Prim::unary(op, arg)
}

fn spec(name: &'static str, prim: Prim) -> InterfaceSpec {
    InterfaceSpec { name, prim }
}

fn callback_nat() -> Prim {
    unary(OpCode::contract, ty(OpCode::nat))
}

fn fa1_specs() -> Vec<InterfaceSpec> {
    vec![
        spec(
            "transfer",
            pair(
                ty(OpCode::address).with_anno(":from"),
                pair(ty(OpCode::address).with_anno(":to"), ty(OpCode::nat).with_anno(":value")),
            ),
        ),
        spec("getBalance", pair(ty(OpCode::address).with_anno(":owner"), callback_nat())),
        spec("getTotalSupply", pair(ty(OpCode::unit), callback_nat())),
    ]
}

fn fa2_operator(name: &str) -> Prim {
    pair(
        ty(OpCode::address).with_anno("%owner"),
        pair(ty(OpCode::address).with_anno("%operator"), ty(OpCode::nat).with_anno("%token_id")),
    )
    .with_anno(name)
}

fn balance_request() -> Prim {
    pair(ty(OpCode::address).with_anno("%owner"), ty(OpCode::nat).with_anno("%token_id"))
}

fn lambda_operations() -> Prim {
    Prim::binary(OpCode::lambda, ty(OpCode::unit), unary(OpCode::list, ty(OpCode::operation)))
}

static INTERFACES: Lazy<HashMap<Interface, Vec<InterfaceSpec>>> = Lazy::new(|| {
    let manager = vec![
        spec("do", lambda_operations()),
        spec("default", ty(OpCode::unit)),
    ];

    let set_delegate = vec![
        spec("set_delegate", unary(OpCode::option, ty(OpCode::key_hash))),
        spec("remove_delegate", ty(OpCode::unit)),
    ];

    let mut fa12 = fa1_specs();
    fa12.push(spec(
        "approve",
        pair(
            ty(OpCode::address).with_anno(":spender"),
            ty(OpCode::nat).with_anno(":value"),
        ),
    ));
    fa12.push(spec(
        "getAllowance",
        pair(
            pair(
                ty(OpCode::address).with_anno(":owner"),
                ty(OpCode::address).with_anno(":spender"),
            ),
            callback_nat(),
        ),
    ));

    let fa2 = vec![
        spec(
            "transfer",
            unary(
                OpCode::list,
                pair(
                    ty(OpCode::address).with_anno("%from_"),
                    unary(
                        OpCode::list,
                        pair(
                            ty(OpCode::address).with_anno("%to_"),
                            pair(
                                ty(OpCode::nat).with_anno("%token_id"),
                                ty(OpCode::nat).with_anno("%amount"),
                            ),
                        ),
                    )
                    .with_anno("%txs"),
                ),
            ),
        ),
        spec(
            "balance_of",
            pair(
                unary(OpCode::list, balance_request()).with_anno("%requests"),
                unary(
                    OpCode::contract,
                    unary(
                        OpCode::list,
                        pair(
                            balance_request().with_anno("%request"),
                            ty(OpCode::nat).with_anno("%balance"),
                        ),
                    ),
                )
                .with_anno("%callback"),
            ),
        ),
        spec(
            "update_operators",
            unary(
                OpCode::list,
                Prim::binary(
                    OpCode::or,
                    fa2_operator("%add_operator"),
                    fa2_operator("%remove_operator"),
                ),
            ),
        ),
    ];

    HashMap::from([
        (Interface::Manager, manager),
        (Interface::SetDelegate, set_delegate),
        (Interface::Tzip5, fa1_specs()),
        (Interface::Tzip7, fa12),
        (Interface::Tzip12, fa2),
    ])
});
