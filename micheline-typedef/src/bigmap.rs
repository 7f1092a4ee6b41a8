//! Big-map diff records: the binary stream codec, the JSON event form, and
//! detection of big-map ids in a storage value.
//!
//! A binary record is a big-endian `i32` big-map id, one action byte and a
//! canonical binary tree:
//!
//! | action     | payload                                       |
//! |------------|-----------------------------------------------|
//! | update (0) | `Pair (Pair key (bytes key_hash)) value`      |
//! | remove (1) | `Pair (Pair key (bytes key_hash)) None`       |
//! | copy (2)   | `Pair source_id destination_id`               |
//! | alloc (3)  | `Pair key_type value_type`                    |

use std::collections::BTreeMap;

use micheline_types::{DecodeError, ExprHash, Node, OpCode, Prim};
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};
use tracing::debug;

use crate::{
    conform::{comb_field, select_branch},
    errors::BigmapError,
    typedef::{TypeKind, Typedef},
};

const ACTION_UPDATE: u8 = 0;
const ACTION_REMOVE: u8 = 1;
const ACTION_COPY: u8 = 2;
const ACTION_ALLOC: u8 = 3;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "RawEvent", try_from = "RawEvent")]
pub struct BigmapEvent {
    pub id: i64,
    pub action: BigmapAction,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BigmapAction {
    Update { key_hash: ExprHash, key: Prim, value: Prim },
    Remove { key_hash: ExprHash, key: Prim },
    Alloc { key_type: Prim, value_type: Prim },
    Copy { source_id: i64, dest_id: i64 },
}

impl BigmapAction {
    pub fn code(&self) -> u8 {
        match self {
            BigmapAction::Update { .. } => ACTION_UPDATE,
            BigmapAction::Remove { .. } => ACTION_REMOVE,
            BigmapAction::Copy { .. } => ACTION_COPY,
            BigmapAction::Alloc { .. } => ACTION_ALLOC,
        }
    }

    pub fn name(&self) -> &'static str {
        action_name(self.code())
    }

    fn payload(&self) -> Prim {
        let entry = |key: &Prim, key_hash: &ExprHash| {
            Prim::binary(OpCode::Pair, key.clone(), Prim::bytes(key_hash.0.to_vec()))
        };
        match self {
            BigmapAction::Update { key_hash, key, value } => {
                Prim::binary(OpCode::Pair, entry(key, key_hash), value.clone())
            }
            BigmapAction::Remove { key_hash, key } => {
                Prim::binary(OpCode::Pair, entry(key, key_hash), Prim::nullary(OpCode::None))
            }
            BigmapAction::Copy { source_id, dest_id } => {
                Prim::binary(OpCode::Pair, Prim::int(*source_id), Prim::int(*dest_id))
            }
            BigmapAction::Alloc { key_type, value_type } => {
                Prim::binary(OpCode::Pair, key_type.clone(), value_type.clone())
            }
        }
    }
}

fn action_name(code: u8) -> &'static str {
    match code {
        ACTION_UPDATE => "update",
        ACTION_REMOVE => "remove",
        ACTION_COPY => "copy",
        _ => "alloc",
    }
}

fn to_id(value: i64) -> Result<i32, BigmapError> {
    i32::try_from(value).map_err(|_| BigmapError::IdOutOfRange(value.to_string()))
}

fn int_id(value: &BigInt) -> Result<i64, BigmapError> {
    value
        .to_i32()
        .map(i64::from)
        .ok_or_else(|| BigmapError::IdOutOfRange(value.to_string()))
}

impl BigmapEvent {
    pub fn new(id: i64, action: BigmapAction) -> Self {
        Self { id, action }
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) -> Result<(), BigmapError> {
        let id = to_id(self.id)?;
        if let BigmapAction::Copy { source_id, dest_id } = self.action {
            to_id(source_id)?;
            to_id(dest_id)?;
        }
        buf.extend_from_slice(&id.to_be_bytes());
        buf.push(self.action.code());
        self.action.payload().encode_into(buf);
        Ok(())
    }
}

/// Serialize records back to back.
pub fn encode_events(events: &[BigmapEvent]) -> Result<Vec<u8>, BigmapError> {
    let mut buf = Vec::new();
    for event in events {
        event.encode_into(&mut buf)?;
    }
    Ok(buf)
}

/// Read records until the input is exhausted.
pub fn decode_events(bytes: &[u8]) -> Result<Vec<BigmapEvent>, BigmapError> {
    let mut events = Vec::new();
    let mut offset = 0;
    while offset < bytes.len() {
        let header = bytes
            .get(offset..offset + 5)
            .ok_or(BigmapError::Truncated(offset))?;
        let id = i64::from(i32::from_be_bytes([header[0], header[1], header[2], header[3]]));
        let code = header[4];
        if code > ACTION_ALLOC {
            return Err(BigmapError::UnknownAction {
                action: code,
                offset: offset + 4,
            });
        }

        let (payload, used) = Prim::decode_prefix(&bytes[offset + 5..]).map_err(|err| match err {
            DecodeError::Truncated(_) => BigmapError::Truncated(offset),
            other => other.into(),
        })?;
        let action = decode_action(code, payload)?;
        debug!(id, action = action.name(), offset, "decoded big-map record");
        events.push(BigmapEvent { id, action });
        offset += 5 + used;
    }
    Ok(events)
}

fn split_pair(prim: Prim, action: &'static str) -> Result<(Prim, Prim), BigmapError> {
    let found = prim.describe();
    match prim.node {
        Node::App(_, args) if args.len() == 2 => {
            let mut args = args.into_iter();
            match (args.next(), args.next()) {
                (Some(left), Some(right)) => Ok((left, right)),
                _ => Err(BigmapError::Payload { action, found }),
            }
        }
        _ => Err(BigmapError::Payload { action, found }),
    }
}

fn split_entry(entry: Prim, action: &'static str) -> Result<(Prim, ExprHash), BigmapError> {
    let (key, hash) = split_pair(entry, action)?;
    match hash.as_bytes() {
        Some(bytes) if bytes.len() == 32 => Ok((key, ExprHash::from_bytes(bytes)?)),
        Some(bytes) => Err(BigmapError::KeyHash(bytes.len())),
        None => Err(BigmapError::Payload {
            action,
            found: hash.describe(),
        }),
    }
}

fn decode_action(code: u8, payload: Prim) -> Result<BigmapAction, BigmapError> {
    let name = action_name(code);
    let (left, right) = split_pair(payload, name)?;
    let action = match code {
        ACTION_UPDATE => {
            let (key, key_hash) = split_entry(left, name)?;
            BigmapAction::Update {
                key_hash,
                key,
                value: right,
            }
        }
        ACTION_REMOVE => {
            if !right.is(OpCode::None) || !right.args().is_empty() {
                return Err(BigmapError::Payload {
                    action: name,
                    found: right.describe(),
                });
            }
            let (key, key_hash) = split_entry(left, name)?;
            BigmapAction::Remove { key_hash, key }
        }
        ACTION_COPY => BigmapAction::Copy {
            source_id: copy_id(&left, name)?,
            dest_id: copy_id(&right, name)?,
        },
        _ => BigmapAction::Alloc {
            key_type: left,
            value_type: right,
        },
    };
    Ok(action)
}

fn copy_id(prim: &Prim, action: &'static str) -> Result<i64, BigmapError> {
    let id = prim.as_int().ok_or_else(|| BigmapError::Payload {
        action,
        found: prim.describe(),
    })?;
    int_id(id)
}

/// Big-map id in JSON: written as a decimal string, read from a string or
/// a number.
#[derive(Clone, Copy, Debug)]
struct Id(i64);

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(i64),
        }
        match Repr::deserialize(deserializer)? {
            Repr::Number(id) => Ok(Id(id)),
            Repr::Text(text) => text
                .parse()
                .map(Id)
                .map_err(|_| D::Error::custom(format!("invalid big-map id `{text}`"))),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct RawEvent {
    action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    big_map: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key_hash: Option<ExprHash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<Prim>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<Prim>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key_type: Option<Prim>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value_type: Option<Prim>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source_big_map: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    destination_big_map: Option<Id>,
}

impl RawEvent {
    fn empty(action: &str, id: i64) -> Self {
        RawEvent {
            action: action.to_string(),
            big_map: Some(Id(id)),
            key_hash: None,
            key: None,
            value: None,
            key_type: None,
            value_type: None,
            source_big_map: None,
            destination_big_map: None,
        }
    }
}

impl From<BigmapEvent> for RawEvent {
    fn from(event: BigmapEvent) -> Self {
        let mut raw = RawEvent::empty(event.action.name(), event.id);
        match event.action {
            BigmapAction::Update { key_hash, key, value } => {
                raw.key_hash = Some(key_hash);
                raw.key = Some(key);
                raw.value = Some(value);
            }
            BigmapAction::Remove { key_hash, key } => {
                raw.key_hash = Some(key_hash);
                raw.key = Some(key);
            }
            BigmapAction::Alloc { key_type, value_type } => {
                raw.key_type = Some(key_type);
                raw.value_type = Some(value_type);
            }
            BigmapAction::Copy { source_id, dest_id } => {
                raw.source_big_map = Some(Id(source_id));
                raw.destination_big_map = Some(Id(dest_id));
            }
        }
        raw
    }
}

impl TryFrom<RawEvent> for BigmapEvent {
    type Error = BigmapError;

    fn try_from(raw: RawEvent) -> Result<Self, Self::Error> {
        let missing = |field: &str| {
            BigmapError::Json(format!("`{}` event without `{field}`", raw.action))
        };
        let action = match raw.action.as_str() {
            "update" | "remove" => {
                let key_hash = raw.key_hash.ok_or_else(|| missing("key_hash"))?;
                let key = raw.key.clone().ok_or_else(|| missing("key"))?;
                match raw.value.clone() {
                    Some(value) if raw.action == "update" => {
                        BigmapAction::Update { key_hash, key, value }
                    }
                    _ => BigmapAction::Remove { key_hash, key },
                }
            }
            "alloc" => BigmapAction::Alloc {
                key_type: raw.key_type.clone().ok_or_else(|| missing("key_type"))?,
                value_type: raw.value_type.clone().ok_or_else(|| missing("value_type"))?,
            },
            "copy" => BigmapAction::Copy {
                source_id: raw.source_big_map.ok_or_else(|| missing("source_big_map"))?.0,
                dest_id: raw.destination_big_map.ok_or_else(|| missing("destination_big_map"))?.0,
            },
            other => return Err(BigmapError::Json(format!("unknown action `{other}`"))),
        };
        let id = match (&action, raw.big_map) {
            (_, Some(Id(id))) => id,
            (BigmapAction::Copy { dest_id, .. }, None) => *dest_id,
            (_, None) => return Err(missing("big_map")),
        };
        Ok(BigmapEvent { id, action })
    }
}

/// Read a JSON array of big-map events.
pub fn events_from_json(text: &str) -> Result<Vec<BigmapEvent>, BigmapError> {
    serde_json::from_str(text).map_err(|err| BigmapError::Json(err.to_string()))
}

/// Write big-map events as a JSON array.
pub fn events_to_json(events: &[BigmapEvent]) -> Result<String, BigmapError> {
    serde_json::to_string(events).map_err(|err| BigmapError::Json(err.to_string()))
}

/// Find the id of every big map in a storage value, keyed by the big map's
/// name in the storage type. Repeated names get a `_1`, `_2`, … suffix.
pub fn detect_bigmaps(
    storage_type: &Prim,
    storage: &Prim,
) -> Result<BTreeMap<String, i64>, BigmapError> {
    let typedef = Typedef::derive(storage_type, "storage")?;
    let mut found = BTreeMap::new();
    collect_bigmaps(&typedef, storage, &mut found)?;
    debug!(count = found.len(), "detected big maps");
    Ok(found)
}

fn collect_bigmaps(
    ty: &Typedef,
    value: &Prim,
    found: &mut BTreeMap<String, i64>,
) -> Result<(), BigmapError> {
    let value = if ty.optional {
        match value.args() {
            [inner] if value.is(OpCode::Some) => inner,
            _ => return Ok(()),
        }
    } else {
        value
    };
    match ty.kind {
        TypeKind::Struct => {
            for arg in &ty.args {
                if let Some(field) = comb_field(value, arg.relative_path(ty)) {
                    collect_bigmaps(arg, &field, found)?;
                }
            }
        }
        TypeKind::Union => {
            if let Some((branch, payload)) = select_branch(ty, value) {
                collect_bigmaps(branch, payload, found)?;
            }
        }
        TypeKind::Op(OpCode::big_map) => {
            if let Some(id) = value.as_int() {
                let mut name = ty.name.clone();
                let mut suffix = 0;
                while found.contains_key(&name) {
                    suffix += 1;
                    name = format!("{}_{suffix}", ty.name);
                }
                found.insert(name, int_id(id)?);
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use indoc::formatdoc;

    use super::*;
    use crate::test_utils::init_test_logging;

    fn ty(op: OpCode) -> Prim {
        Prim::nullary(op)
    }

    fn hash(byte: u8) -> ExprHash {
        ExprHash([byte; 32])
    }

    #[test]
    fn alloc_record() {
        let event = BigmapEvent::new(
            -1,
            BigmapAction::Alloc {
                key_type: ty(OpCode::nat),
                value_type: ty(OpCode::string),
            },
        );
        let bytes = encode_events(std::slice::from_ref(&event)).unwrap();
        assert_eq!(hex::encode(&bytes), "ffffffff03070703620368");
        assert_eq!(decode_events(&bytes).unwrap(), vec![event]);
    }

    #[test]
    fn streams_preserve_order() {
        init_test_logging();
        let events = vec![
            BigmapEvent::new(
                7,
                BigmapAction::Alloc {
                    key_type: ty(OpCode::string),
                    value_type: ty(OpCode::nat),
                },
            ),
            BigmapEvent::new(
                7,
                BigmapAction::Update {
                    key_hash: hash(1),
                    key: Prim::string("alice"),
                    value: Prim::int(100),
                },
            ),
            BigmapEvent::new(
                7,
                BigmapAction::Remove {
                    key_hash: hash(2),
                    key: Prim::string("bob"),
                },
            ),
            BigmapEvent::new(8, BigmapAction::Copy { source_id: 7, dest_id: 8 }),
        ];
        let bytes = encode_events(&events).unwrap();
        assert_eq!(decode_events(&bytes).unwrap(), events);
        assert_eq!(decode_events(&[]).unwrap(), vec![]);
    }

    #[test]
    fn rejects_malformed_records() {
        let good = hex::decode("ffffffff03070703620368").unwrap();
        assert_eq!(decode_events(&good[..3]), Err(BigmapError::Truncated(0)));
        assert_eq!(decode_events(&good[..8]), Err(BigmapError::Truncated(0)));

        let mut bad_action = good.clone();
        bad_action[4] = 9;
        assert_eq!(
            decode_events(&bad_action),
            Err(BigmapError::UnknownAction { action: 9, offset: 4 })
        );

        // alloc with a bare `nat` payload
        let unary = hex::decode("000000010303 62".replace(' ', "")).unwrap();
        assert!(matches!(decode_events(&unary), Err(BigmapError::Payload { action: "alloc", .. })));

        let short_hash = BigmapAction::Update {
            key_hash: hash(0),
            key: Prim::int(1),
            value: Prim::int(2),
        };
        let mut payload = short_hash.payload();
        if let Node::App(_, args) = &mut payload.node {
            if let Node::App(_, entry) = &mut args[0].node {
                entry[1] = Prim::bytes(vec![0; 4]);
            }
        }
        let mut bytes = vec![0, 0, 0, 1, ACTION_UPDATE];
        payload.encode_into(&mut bytes);
        assert_eq!(decode_events(&bytes), Err(BigmapError::KeyHash(4)));

        let too_big = BigmapEvent::new(1 << 40, BigmapAction::Copy { source_id: 1, dest_id: 2 });
        assert!(matches!(encode_events(&[too_big]), Err(BigmapError::IdOutOfRange(_))));

        let remove = BigmapAction::Remove {
            key_hash: hash(1),
            key: Prim::int(1),
        };
        let mut payload = remove.payload();
        if let Node::App(_, args) = &mut payload.node {
            args[1] = Prim::int(7);
        }
        let mut bytes = vec![0, 0, 0, 1, ACTION_REMOVE];
        payload.encode_into(&mut bytes);
        assert!(matches!(
            decode_events(&bytes),
            Err(BigmapError::Payload { action: "remove", .. })
        ));
    }

    #[test]
    fn failed_encode_leaves_the_buffer_untouched() {
        let mut buf = vec![0xaa];
        let bad_copy = BigmapEvent::new(
            3,
            BigmapAction::Copy {
                source_id: i64::MAX,
                dest_id: 3,
            },
        );
        assert!(matches!(bad_copy.encode_into(&mut buf), Err(BigmapError::IdOutOfRange(_))));
        assert_eq!(buf, [0xaa]);

        let bad_id = BigmapEvent::new(i64::MIN, BigmapAction::Copy { source_id: 1, dest_id: 2 });
        assert!(bad_id.encode_into(&mut buf).is_err());
        assert_eq!(buf, [0xaa]);
    }

    #[test]
    fn deeply_nested_payload_is_an_error() {
        let mut bytes = vec![0, 0, 0, 0, ACTION_ALLOC, 0x07, OpCode::Pair.tag()];
        for _ in 0..200_000 {
            bytes.extend_from_slice(&[0x05, OpCode::Some.tag()]);
        }
        bytes.extend_from_slice(&[0x03, OpCode::Unit.tag(), 0x03, OpCode::unit.tag()]);
        assert!(matches!(
            decode_events(&bytes),
            Err(BigmapError::Decode(DecodeError::TooDeep { .. }))
        ));
    }

    #[test]
    fn json_events() {
        let events = vec![
            BigmapEvent::new(
                5,
                BigmapAction::Update {
                    key_hash: hash(3),
                    key: Prim::int(1),
                    value: Prim::string("x"),
                },
            ),
            BigmapEvent::new(6, BigmapAction::Copy { source_id: 5, dest_id: 6 }),
        ];
        let json = events_to_json(&events).unwrap();
        assert!(json.contains(r#""action":"update","big_map":"5","key_hash":"expr"#), "{json}");
        assert!(json.contains(r#""source_big_map":"5","destination_big_map":"6""#), "{json}");
        assert_eq!(events_from_json(&json).unwrap(), events);
    }

    #[test]
    fn json_update_without_value_is_remove() {
        let json = formatdoc!(
            r#"
                [
                  {{
                    "action": "update", "big_map": 4, "key_hash": "{hash}",
                    "key": {{ "int": "1" }}
                  }},
                  {{
                    "action": "update", "big_map": "4", "key_hash": "{hash}",
                    "key": {{ "int": "2" }}, "value": null
                  }},
                  {{
                    "action": "alloc", "big_map": "-3",
                    "key_type": {{ "prim": "nat" }}, "value_type": {{ "prim": "unit" }}
                  }}
                ]
            "#,
            hash = hash(9)
        );
        let events = events_from_json(&json).unwrap();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0].action, BigmapAction::Remove { .. }));
        assert!(matches!(events[1].action, BigmapAction::Remove { .. }));
        assert_eq!(events[2].id, -3);

        assert!(matches!(
            events_from_json(r#"[{"action": "evict", "big_map": "1"}]"#),
            Err(BigmapError::Json(_))
        ));
        assert!(matches!(
            events_from_json(r#"[{"action": "alloc", "big_map": "1"}]"#),
            Err(BigmapError::Json(_))
        ));
    }
}
