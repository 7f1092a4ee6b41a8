//! Typedef derivation: turns an annotated type tree into a named,
//! comb-flattened structural description.

use std::{fmt, str::FromStr};

use micheline_types::{OpCode, Prim};
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::errors::TypedefError;

/// What a [`Typedef`] node describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum TypeKind {
    /// Flattened comb of `pair`s.
    Struct,
    /// Flattened nest of `or`s.
    Union,
    /// Any other type primitive.
    Op(OpCode),
    /// Sapling state or transaction with its memo size.
    Sapling { op: OpCode, memo_size: u64 },
}

impl TypeKind {
    pub fn op(self) -> Option<OpCode> {
        match self {
            TypeKind::Op(op) | TypeKind::Sapling { op, .. } => Some(op),
            TypeKind::Struct | TypeKind::Union => None,
        }
    }

    pub fn is(self, op: OpCode) -> bool {
        self.op() == Some(op)
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKind::Struct => f.write_str("struct"),
            TypeKind::Union => f.write_str("union"),
            TypeKind::Op(op) => f.write_str(op.as_str()),
            TypeKind::Sapling { op, memo_size } => write!(f, "{op}({memo_size})"),
        }
    }
}

impl FromStr for TypeKind {
    type Err = TypedefError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let not_a_type = || TypedefError::NotAType {
            found: format!("`{text}`"),
        };
        match text {
            "struct" => return Ok(TypeKind::Struct),
            "union" => return Ok(TypeKind::Union),
            _ => {}
        }
        if let Some((name, rest)) = text.split_once('(') {
            let op: OpCode = name.parse().map_err(|_| not_a_type())?;
            let memo_size = rest
                .strip_suffix(')')
                .and_then(|memo| memo.parse().ok())
                .ok_or_else(not_a_type)?;
            return Ok(TypeKind::Sapling { op, memo_size });
        }
        match text.parse::<OpCode>() {
            Ok(op) if op.is_type() => Ok(TypeKind::Op(op)),
            _ => Err(not_a_type()),
        }
    }
}

impl From<TypeKind> for String {
    fn from(kind: TypeKind) -> Self {
        kind.to_string()
    }
}

impl TryFrom<String> for TypeKind {
    type Error = TypedefError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        text.parse()
    }
}

/// Structural description of a type tree.
///
/// `path` is the sequence of child indices leading to this node in the type
/// tree it was derived from, with variadic pairs read as right combs and
/// `option` wrappers not counted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Typedef {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TypeKind,
    #[serde(default, skip_serializing_if = "is_false")]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Typedef>,
    #[serde(default)]
    pub path: Vec<usize>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Whether a name is a placeholder rather than a user-given label:
/// empty, positional, or generated (`@`-prefixed).
pub fn is_anonymous_name(name: &str) -> bool {
    name.is_empty() || name.starts_with('@') || name.bytes().all(|b| b.is_ascii_digit())
}

impl Typedef {
    /// Derive the typedef of a type tree. A `parameter` or `storage` section
    /// is unwrapped first.
    pub fn derive(prim: &Prim, name: &str) -> Result<Typedef, TypedefError> {
        match prim.opcode() {
            Some(OpCode::parameter | OpCode::storage) if prim.args().len() == 1 => {
                build_typedef(&prim.args()[0], name, &[])
            }
            _ => build_typedef(prim, name, &[]),
        }
    }

    pub fn is_struct(&self) -> bool {
        self.kind == TypeKind::Struct
    }

    pub fn is_union(&self) -> bool {
        self.kind == TypeKind::Union
    }

    pub fn is_anonymous(&self) -> bool {
        is_anonymous_name(&self.name)
    }

    /// Direct child by name.
    pub fn child(&self, name: &str) -> Option<&Typedef> {
        self.args.iter().find(|arg| arg.name == name)
    }

    /// Path of `self` relative to `parent`, when `self` lies under it.
    pub fn relative_path<'a>(&'a self, parent: &Typedef) -> &'a [usize] {
        self.path.get(parent.path.len()..).unwrap_or_default()
    }

    fn fmt_type(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.optional {
            f.write_str("option<")?;
        }
        match self.kind {
            TypeKind::Struct | TypeKind::Union => {
                write!(f, "{} {{ ", self.kind)?;
                for (index, arg) in self.args.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: ", arg.name)?;
                    arg.fmt_type(f)?;
                }
                f.write_str(" }")?;
            }
            kind => {
                write!(f, "{kind}")?;
                if !self.args.is_empty() {
                    f.write_str("<")?;
                    for (index, arg) in self.args.iter().enumerate() {
                        if index > 0 {
                            f.write_str(", ")?;
                        }
                        arg.fmt_type(f)?;
                    }
                    f.write_str(">")?;
                }
            }
        }
        if self.optional {
            f.write_str(">")?;
        }
        Ok(())
    }
}

/// Compact one-line rendering, e.g. `struct { from: address, to: option<nat> }`.
impl fmt::Display for Typedef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_type(f)
    }
}

fn child_path(path: &[usize], index: usize) -> Vec<usize> {
    let mut child = path.to_vec();
    child.push(index);
    child
}

fn expect_arity(op: OpCode, args: &[Prim], expected: usize) -> Result<(), TypedefError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(TypedefError::Arity {
            op,
            expected,
            found: args.len(),
        })
    }
}

/// Derive the typedef of `prim`, named after its field or type annotation
/// or `fallback`, located at `path`.
pub fn build_typedef(prim: &Prim, fallback: &str, path: &[usize]) -> Result<Typedef, TypedefError> {
    let not_a_type = || TypedefError::NotAType {
        found: prim.describe(),
    };
    let op = prim.opcode().filter(|op| op.is_type()).ok_or_else(not_a_type)?;
    let args = prim.args();
    let name = prim.label().unwrap_or(fallback).to_string();
    trace!(%op, %name, ?path, "deriving typedef");

    let leaf = |kind: TypeKind, children: Vec<Typedef>| Typedef {
        name: name.clone(),
        kind,
        optional: false,
        args: children,
        path: path.to_vec(),
    };

    let typedef = match op {
        OpCode::pair => derive_struct(prim, name.clone(), path)?,
        OpCode::or => {
            let mut branches = Vec::new();
            collect_branches(prim, path, true, &mut branches)?;
            leaf(TypeKind::Union, branches)
        }
        OpCode::option => match args {
            [] => leaf(TypeKind::Op(op), Vec::new()),
            [inner] => {
                let mut typedef = build_typedef(inner, &name, path)?;
                if prim.label().is_some() {
                    typedef.name = name.clone();
                }
                typedef.optional = true;
                typedef.path = path.to_vec();
                typedef
            }
            _ => return Err(TypedefError::Arity { op, expected: 1, found: args.len() }),
        },
        OpCode::list | OpCode::set => match args {
            [] => leaf(TypeKind::Op(op), Vec::new()),
            [item] => {
                let item = build_typedef(item, "@item", &child_path(path, 0))?;
                leaf(TypeKind::Op(op), vec![item])
            }
            _ => return Err(TypedefError::Arity { op, expected: 1, found: args.len() }),
        },
        OpCode::map | OpCode::big_map => {
            expect_arity(op, args, 2)?;
            leaf(
                TypeKind::Op(op),
                vec![
                    build_typedef(&args[0], "@key", &child_path(path, 0))?,
                    build_typedef(&args[1], "@value", &child_path(path, 1))?,
                ],
            )
        }
        OpCode::lambda => match args {
            [] => leaf(TypeKind::Op(op), Vec::new()),
            [param, ret] => leaf(
                TypeKind::Op(op),
                vec![
                    build_typedef(param, "@param", &child_path(path, 0))?,
                    build_typedef(ret, "@return", &child_path(path, 1))?,
                ],
            ),
            _ => return Err(TypedefError::Arity { op, expected: 2, found: args.len() }),
        },
        OpCode::contract => {
            expect_arity(op, args, 1)?;
            let children = args
                .iter()
                .enumerate()
                .map(|(index, arg)| {
                    build_typedef(arg, &index.to_string(), &child_path(path, index))
                })
                .collect::<Result<_, _>>()?;
            leaf(TypeKind::Op(op), children)
        }
        OpCode::ticket => {
            expect_arity(op, args, 1)?;
            leaf(TypeKind::Op(op), vec![build_typedef(&args[0], "@value", &child_path(path, 0))?])
        }
        OpCode::sapling_state
        | OpCode::sapling_transaction
        | OpCode::sapling_transaction_deprecated => {
            let memo = match args {
                [memo] => memo.as_int().and_then(ToPrimitive::to_u64),
                _ => None,
            };
            match memo {
                Some(memo_size) => leaf(TypeKind::Sapling { op, memo_size }, Vec::new()),
                None => leaf(TypeKind::Op(op), Vec::new()),
            }
        }
        _ => {
            expect_arity(op, args, 0)?;
            leaf(TypeKind::Op(op), Vec::new())
        }
    };
    Ok(typedef)
}

fn derive_struct(prim: &Prim, name: String, path: &[usize]) -> Result<Typedef, TypedefError> {
    let mut fields = Vec::new();
    flatten_comb(&prim.comb_normalized(), path, &mut fields)?;
    for (index, field) in fields.iter_mut().enumerate() {
        if field.name.is_empty() {
            field.name = index.to_string();
        }
    }
    Ok(Typedef {
        name,
        kind: TypeKind::Struct,
        optional: false,
        args: fields,
        path: path.to_vec(),
    })
}

fn flatten_comb(pair: &Prim, path: &[usize], out: &mut Vec<Typedef>) -> Result<(), TypedefError> {
    let args = pair.args();
    expect_arity(OpCode::pair, args, 2)?;
    out.push(build_typedef(&args[0], "", &child_path(path, 0))?);

    let right = &args[1];
    let right_path = child_path(path, 1);
    if right.is(OpCode::pair) && !right.has_annots() && !right.was_packed {
        flatten_comb(&right.comb_normalized(), &right_path, out)
    } else {
        out.push(build_typedef(right, "", &right_path)?);
        Ok(())
    }
}

fn collect_branches(
    or: &Prim,
    path: &[usize],
    top: bool,
    out: &mut Vec<Typedef>,
) -> Result<(), TypedefError> {
    let args = or.args();
    expect_arity(OpCode::or, args, 2)?;
    for (index, branch) in args.iter().enumerate() {
        let branch_path = child_path(path, index);
        if branch.is(OpCode::or) {
            collect_branches(branch, &branch_path, false, out)?;
        } else {
            let fallback = if top && index == 0 { "@or_0" } else { "@or_1" };
            out.push(build_typedef(branch, fallback, &branch_path)?);
        }
    }
    Ok(())
}
