//! Marshaling host values (JSON) into Micheline trees guided by a typedef.
//!
//! Scalars are written either in their readable form (base58 addresses,
//! RFC3339 timestamps) or, when `optimized` is set, in their compact binary
//! form (tagged bytes, seconds since the epoch).

use std::cmp::Ordering;

use chrono::{DateTime, SecondsFormat};
use micheline_types::{
    Address, AddressKind, ChainId, Key, OpCode, Prim, Signature, split_entrypoint,
};
use num_bigint::BigInt;
use num_traits::Signed;
use serde_json::Value;

use crate::{
    errors::MarshalError,
    typedef::{TypeKind, Typedef},
};

static NULL: Value = Value::Null;

impl Typedef {
    /// Build the tree of `value` for this type.
    pub fn marshal(&self, value: &Value, optimized: bool) -> Result<Prim, MarshalError> {
        Marshaler { optimized }.marshal(self, value)
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "a boolean".to_string(),
        Value::Number(number) => format!("the number {number}"),
        Value::String(_) => "a string".to_string(),
        Value::Array(items) => format!("an array of {}", items.len()),
        Value::Object(_) => "an object".to_string(),
    }
}

fn shape(ty: &Typedef, expected: &'static str, found: &Value) -> MarshalError {
    MarshalError::Shape {
        field: ty.name.clone(),
        expected,
        found: describe(found),
    }
}

fn invalid(ty: &Typedef, reason: impl Into<String>) -> MarshalError {
    MarshalError::Scalar {
        field: ty.name.clone(),
        kind: ty.kind.to_string(),
        reason: reason.into(),
    }
}

fn unsupported(ty: &Typedef) -> MarshalError {
    MarshalError::Unsupported {
        field: ty.name.clone(),
        kind: ty.kind.to_string(),
    }
}

/// `{"name": x}` handed to a non-struct type named `name` stands for `x`.
fn unwrap_own_name<'a>(ty: &Typedef, value: &'a Value) -> &'a Value {
    let Value::Object(map) = value else {
        return value;
    };
    if ty.is_struct() || (ty.is_union() && ty.child(&ty.name).is_some()) {
        return value;
    }
    match map.get(&ty.name) {
        Some(inner) if map.len() == 1 => inner,
        _ => value,
    }
}

/// Assemble a right comb from fields and their relative paths.
fn assemble(fields: Vec<(Vec<usize>, Prim)>, depth: usize) -> Option<Prim> {
    if let [(path, _)] = fields.as_slice() {
        if path.len() == depth {
            return fields.into_iter().next().map(|(_, prim)| prim);
        }
    }
    let (left, right): (Vec<_>, Vec<_>) = fields
        .into_iter()
        .partition(|(path, _)| path.get(depth) == Some(&0));
    if left.is_empty() || right.is_empty() {
        return None;
    }
    Some(Prim::binary(OpCode::Pair, assemble(left, depth + 1)?, assemble(right, depth + 1)?))
}

struct Marshaler {
    optimized: bool,
}

impl Marshaler {
    fn marshal(&self, ty: &Typedef, value: &Value) -> Result<Prim, MarshalError> {
        let value = unwrap_own_name(ty, value);
        if ty.optional {
            return match value {
                Value::Null => Ok(Prim::nullary(OpCode::None)),
                value => Ok(Prim::unary(OpCode::Some, self.marshal_required(ty, value)?)),
            };
        }
        self.marshal_required(ty, value)
    }

    fn marshal_required(&self, ty: &Typedef, value: &Value) -> Result<Prim, MarshalError> {
        match ty.kind {
            TypeKind::Struct => self.marshal_struct(ty, value),
            TypeKind::Union => self.marshal_union(ty, value),
            TypeKind::Op(op) | TypeKind::Sapling { op, .. } => self.marshal_op(ty, op, value),
        }
    }

    fn marshal_struct(&self, ty: &Typedef, value: &Value) -> Result<Prim, MarshalError> {
        let mut fields = Vec::with_capacity(ty.args.len());
        for (index, arg) in ty.args.iter().enumerate() {
            let missing = || MarshalError::Missing {
                field: arg.name.clone(),
            };
            let field = match value {
                Value::Object(map) => match map.get(&arg.name) {
                    Some(field) => field,
                    None if arg.optional => &NULL,
                    None if arg.is_struct() && arg.is_anonymous() => value,
                    None => return Err(missing()),
                },
                Value::Array(items) => items.get(index).ok_or_else(missing)?,
                other => return Err(shape(ty, "an object or an array", other)),
            };
            fields.push((arg.relative_path(ty).to_vec(), self.marshal(arg, field)?));
        }
        assemble(fields, 0).ok_or_else(|| unsupported(ty))
    }

    fn marshal_union(&self, ty: &Typedef, value: &Value) -> Result<Prim, MarshalError> {
        let Value::Object(map) = value else {
            return Err(shape(ty, "an object keyed by the chosen branch", value));
        };
        let no_branch = || MarshalError::NoBranch {
            field: ty.name.clone(),
        };
        if map.len() != 1 {
            return Err(no_branch());
        }
        let (branch, inner) = ty
            .args
            .iter()
            .find_map(|branch| map.get(&branch.name).map(|inner| (branch, inner)))
            .ok_or_else(no_branch)?;
        let payload = self.marshal(branch, inner)?;
        Ok(branch.relative_path(ty).iter().rev().fold(payload, |inner, step| {
            let wrapper = if *step == 0 { OpCode::Left } else { OpCode::Right };
            Prim::unary(wrapper, inner)
        }))
    }

    fn element<'t>(&self, ty: &'t Typedef, index: usize) -> Result<&'t Typedef, MarshalError> {
        ty.args.get(index).ok_or_else(|| unsupported(ty))
    }

    fn marshal_entries(&self, ty: &Typedef, value: &Value) -> Result<Prim, MarshalError> {
        let (key_type, value_type) = (self.element(ty, 0)?, self.element(ty, 1)?);
        let entry = |key: Prim, val: &Value| -> Result<Prim, MarshalError> {
            Ok(Prim::binary(OpCode::Elt, key, self.marshal(value_type, val)?))
        };
        let mut entries: Vec<Prim> = match value {
            Value::Object(map) => map
                .iter()
                .map(|(key, val)| entry(self.marshal(key_type, &Value::String(key.clone()))?, val))
                .collect::<Result<_, _>>()?,
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::Object(pair) => {
                        let key = pair.get("key").ok_or_else(|| MarshalError::Missing {
                            field: format!("{}.key", ty.name),
                        })?;
                        let val = pair.get("value").unwrap_or(&NULL);
                        entry(self.marshal(key_type, key)?, val)
                    }
                    other => Err(shape(ty, "an array of {key, value} objects", other)),
                })
                .collect::<Result<_, _>>()?,
            other => {
                return Err(shape(ty, "an object or an array of {key, value} objects", other));
            }
        };
        entries.sort_by(|a, b| match (a.arg(0), b.arg(0)) {
            (Some(a), Some(b)) => ordering(a, b),
            _ => Ordering::Equal,
        });
        Ok(Prim::seq(entries))
    }

    fn marshal_op(&self, ty: &Typedef, op: OpCode, value: &Value) -> Result<Prim, MarshalError> {
        match op {
            OpCode::list | OpCode::set => {
                let item_type = self.element(ty, 0)?;
                let Value::Array(items) = value else {
                    return Err(shape(ty, "an array", value));
                };
                let mut items: Vec<Prim> = items
                    .iter()
                    .map(|item| self.marshal(item_type, item))
                    .collect::<Result<_, _>>()?;
                if op == OpCode::set {
                    items.sort_by(|a, b| ordering(a, b));
                }
                Ok(Prim::seq(items))
            }
            OpCode::big_map if value.is_number() => integer(ty, value, false),
            OpCode::map | OpCode::big_map => self.marshal_entries(ty, value),
            OpCode::lambda => Prim::try_from(value).map_err(|err| invalid(ty, err.to_string())),
            OpCode::option => match value {
                Value::Null => Ok(Prim::nullary(OpCode::None)),
                _ => Err(unsupported(ty)),
            },
            OpCode::int | OpCode::nat | OpCode::mutez => integer(ty, value, op != OpCode::int),
            OpCode::sapling_state => match value {
                Value::Array(items) if items.is_empty() => Ok(Prim::seq(Vec::new())),
                _ => integer(ty, value, false),
            },
            OpCode::string => match value {
                Value::String(text) => Ok(Prim::string(text.clone())),
                other => Err(shape(ty, "a string", other)),
            },
            OpCode::bool => match value {
                Value::Bool(flag) => Ok(boolean(*flag)),
                Value::String(text) if text == "true" || text == "false" => {
                    Ok(boolean(text == "true"))
                }
                other => Err(shape(ty, "a boolean", other)),
            },
            OpCode::unit => Ok(Prim::nullary(OpCode::Unit)),
            OpCode::timestamp => self.timestamp(ty, value),
            OpCode::address | OpCode::contract => self.address(ty, value),
            OpCode::tx_rollup_l2_address => {
                let address: Address = parse(ty, value)?;
                if address.kind != AddressKind::Bls12_381 {
                    return Err(invalid(ty, "expected a tz4 address"));
                }
                Ok(self.pick(address.hash.to_vec(), address.to_string()))
            }
            OpCode::key_hash => {
                let address: Address = parse(ty, value)?;
                let bytes = address.key_hash_bytes().map_err(|err| invalid(ty, err.to_string()))?;
                Ok(self.pick(bytes.to_vec(), address.to_string()))
            }
            OpCode::key => {
                let key: Key = parse(ty, value)?;
                Ok(self.pick(key.to_bytes(), key.to_string()))
            }
            OpCode::signature => {
                let signature: Signature = parse(ty, value)?;
                Ok(self.pick(signature.to_bytes(), signature.to_string()))
            }
            OpCode::chain_id => {
                let chain: ChainId = parse(ty, value)?;
                Ok(self.pick(chain.0.to_vec(), chain.to_string()))
            }
            OpCode::bytes
            | OpCode::bls12_381_g1
            | OpCode::bls12_381_g2
            | OpCode::bls12_381_fr
            | OpCode::chest
            | OpCode::chest_key
            | OpCode::sapling_transaction
            | OpCode::sapling_transaction_deprecated => {
                let text = text(ty, value)?;
                let digits = text.strip_prefix("0x").unwrap_or(text);
                hex::decode(digits)
                    .map(Prim::bytes)
                    .map_err(|err| invalid(ty, err.to_string()))
            }
            _ => Err(unsupported(ty)),
        }
    }

    /// Compact bytes when optimizing, readable text otherwise.
    fn pick(&self, bytes: Vec<u8>, text: String) -> Prim {
        if self.optimized {
            Prim::bytes(bytes)
        } else {
            Prim::string(text)
        }
    }

    fn timestamp(&self, ty: &Typedef, value: &Value) -> Result<Prim, MarshalError> {
        let seconds = match value {
            Value::Number(number) => number
                .to_string()
                .parse::<BigInt>()
                .map_err(|err| invalid(ty, err.to_string()))?,
            Value::String(text) => match DateTime::parse_from_rfc3339(text) {
                Ok(time) => BigInt::from(time.timestamp()),
                Err(err) => text
                    .parse::<BigInt>()
                    .map_err(|_| invalid(ty, err.to_string()))?,
            },
            other => return Err(shape(ty, "a number or an RFC3339 string", other)),
        };
        if self.optimized {
            return Ok(Prim::int(seconds));
        }
        let time = i64::try_from(&seconds)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or_else(|| invalid(ty, "out of range"))?;
        Ok(Prim::string(time.to_rfc3339_opts(SecondsFormat::Secs, true)))
    }

    fn address(&self, ty: &Typedef, value: &Value) -> Result<Prim, MarshalError> {
        let (address, entrypoint) = split_entrypoint(text(ty, value)?);
        let address = address
            .parse::<Address>()
            .map_err(|err| invalid(ty, err.to_string()))?;
        if let Some(entrypoint) = entrypoint {
            if entrypoint.is_empty() || entrypoint.len() > 31 {
                return Err(invalid(ty, format!("invalid entrypoint `{entrypoint}`")));
            }
        }
        let mut bytes = address.to_bytes().to_vec();
        let mut text = address.to_string();
        if let Some(entrypoint) = entrypoint {
            bytes.extend_from_slice(entrypoint.as_bytes());
            text = format!("{text}%{entrypoint}");
        }
        Ok(self.pick(bytes, text))
    }
}

/// Michelson order of two marshaled keys; incomparable keys keep their
/// input order.
fn ordering(a: &Prim, b: &Prim) -> Ordering {
    a.compare_values(b).unwrap_or(Ordering::Equal)
}

fn boolean(flag: bool) -> Prim {
    Prim::nullary(if flag { OpCode::True } else { OpCode::False })
}

fn text<'a>(ty: &Typedef, value: &'a Value) -> Result<&'a str, MarshalError> {
    value.as_str().ok_or_else(|| shape(ty, "a string", value))
}

fn parse<T>(ty: &Typedef, value: &Value) -> Result<T, MarshalError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    text(ty, value)?.parse().map_err(|err: T::Err| invalid(ty, err.to_string()))
}

fn integer(ty: &Typedef, value: &Value, natural: bool) -> Result<Prim, MarshalError> {
    let number = match value {
        Value::Number(number) => number.to_string().parse::<BigInt>().ok(),
        Value::String(text) => text.parse::<BigInt>().ok(),
        other => return Err(shape(ty, "an integer", other)),
    }
    .ok_or_else(|| invalid(ty, format!("`{value}` is not an integer")))?;
    if natural && number.is_negative() {
        return Err(invalid(ty, format!("{number} is negative")));
    }
    Ok(Prim::int(number))
}
