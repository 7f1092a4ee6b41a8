//! Micheline JSON: `{"int": "1"}`, `{"string": "a"}`, `{"bytes": "cafe"}`,
//! arrays for sequences and `{"prim", "args", "annots"}` objects for
//! applications, with empty `args` and `annots` omitted.

use num_bigint::BigInt;
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::Error as _,
    ser::SerializeMap,
};
use serde_json::Value;

use crate::{
    error::DecodeError,
    opcode::OpCode,
    prim::{Node, Prim},
};

impl Serialize for Prim {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match &self.node {
            Node::Int(value) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("int", &value.to_string())?;
                map.end()
            }
            Node::String(value) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("string", value)?;
                map.end()
            }
            Node::Bytes(value) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("bytes", &hex::encode(value))?;
                map.end()
            }
            Node::Seq(items) => serializer.collect_seq(items),
            Node::App(op, args) => {
                let len = 1 + usize::from(!args.is_empty()) + usize::from(self.has_annots());
                let mut map = serializer.serialize_map(Some(len))?;
                map.serialize_entry("prim", op.as_str())?;
                if !args.is_empty() {
                    map.serialize_entry("args", args)?;
                }
                if self.has_annots() {
                    map.serialize_entry("annots", &self.annots)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Prim {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Prim::try_from(&value).map_err(D::Error::custom)
    }
}

impl TryFrom<&Value> for Prim {
    type Error = DecodeError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let invalid = |why: &str| DecodeError::InvalidJson(format!("{why} in {value}"));
        match value {
            Value::Array(items) => Ok(Prim::seq(
                items.iter().map(Prim::try_from).collect::<Result<_, _>>()?,
            )),
            Value::Object(map) => {
                if let Some(int) = map.get("int") {
                    let text = match int {
                        Value::String(text) => text.clone(),
                        Value::Number(number) => number.to_string(),
                        _ => return Err(invalid("non-numeric `int`")),
                    };
                    let parsed = text
                        .parse::<BigInt>()
                        .map_err(|_| invalid("non-numeric `int`"))?;
                    return Ok(Prim::int(parsed));
                }
                if let Some(string) = map.get("string") {
                    let text = string.as_str().ok_or_else(|| invalid("non-text `string`"))?;
                    return Ok(Prim::string(text));
                }
                if let Some(bytes) = map.get("bytes") {
                    let text = bytes.as_str().ok_or_else(|| invalid("non-text `bytes`"))?;
                    let raw = hex::decode(text).map_err(|_| invalid("non-hex `bytes`"))?;
                    return Ok(Prim::bytes(raw));
                }
                let name = map
                    .get("prim")
                    .and_then(Value::as_str)
                    .ok_or_else(|| invalid("missing `prim`"))?;
                let op: OpCode = name.parse()?;
                let args = match map.get("args") {
                    None | Some(Value::Null) => Vec::new(),
                    Some(Value::Array(args)) => {
                        args.iter().map(Prim::try_from).collect::<Result<_, _>>()?
                    }
                    Some(_) => return Err(invalid("non-array `args`")),
                };
                let annots = match map.get("annots") {
                    None | Some(Value::Null) => Vec::new(),
                    Some(Value::Array(annots)) => annots
                        .iter()
                        .map(|anno| anno.as_str().map(str::to_string))
                        .collect::<Option<Vec<_>>>()
                        .ok_or_else(|| invalid("non-text annotation"))?,
                    Some(_) => return Err(invalid("non-array `annots`")),
                };
                Ok(Prim::new(op, args).with_annots(annots))
            }
            _ => Err(invalid("unexpected JSON value")),
        }
    }
}

impl Prim {
    /// Parse a Micheline JSON document.
    pub fn from_json(text: &str) -> Result<Prim, DecodeError> {
        let value: Value =
            serde_json::from_str(text).map_err(|err| DecodeError::InvalidJson(err.to_string()))?;
        Prim::try_from(&value)
    }

    /// Compact Micheline JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn reads_annotated_types() {
        let prim = Prim::from_json(indoc! {r#"
            {
              "prim": "pair",
              "args": [
                { "prim": "address", "annots": [":from"] },
                { "prim": "nat", "annots": ["%value"] }
              ],
              "annots": ["%transfer"]
            }
        "#})
        .unwrap();
        assert!(prim.is(OpCode::pair));
        assert_eq!(prim.field_anno(), Some("transfer"));
        assert_eq!(prim.args()[1].field_anno(), Some("value"));
    }

    #[test]
    fn writes_canonical_shape() {
        let prim = Prim::seq(vec![
            Prim::int(-7),
            Prim::string("x"),
            Prim::bytes(vec![0x01, 0xff]),
            Prim::unary(OpCode::Some, Prim::nullary(OpCode::Unit)).with_anno("%opt"),
        ]);
        assert_eq!(
            prim.to_json(),
            concat!(
                r#"[{"int":"-7"},{"string":"x"},{"bytes":"01ff"},"#,
                r#"{"prim":"Some","args":[{"prim":"Unit"}],"annots":["%opt"]}]"#,
            )
        );
        assert_eq!(Prim::from_json(&prim.to_json()).unwrap(), prim);
    }

    #[test]
    fn accepts_numeric_ints() {
        assert_eq!(Prim::from_json(r#"{"int": 12}"#).unwrap(), Prim::int(12));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            Prim::from_json(r#"{"prim": "Pear"}"#),
            Err(DecodeError::UnknownPrimitive(name)) if name == "Pear"
        ));
        assert!(matches!(Prim::from_json(r#"{"bytes": "xyz"}"#), Err(DecodeError::InvalidJson(_))));
        assert!(matches!(Prim::from_json("42"), Err(DecodeError::InvalidJson(_))));
    }
}
