//! Base58check identifiers: account addresses, public keys, signatures,
//! chain ids and expression hashes, in their text and tagged binary forms.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};

use crate::error::AddressError;

const HASH_LEN: usize = 20;

fn decode_check(text: &str) -> Result<Vec<u8>, AddressError> {
    bs58::decode(text)
        .with_check(None)
        .into_vec()
        .map_err(|_| AddressError::Base58(text.to_string()))
}

fn encode_check(prefix: &[u8], payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(prefix.len() + payload.len());
    data.extend_from_slice(prefix);
    data.extend_from_slice(payload);
    bs58::encode(data).with_check().into_string()
}

/// Strip a known binary prefix and check the remaining length.
fn payload<'a>(decoded: &'a [u8], prefix: &[u8], len: usize) -> Option<&'a [u8]> {
    decoded
        .strip_prefix(prefix)
        .filter(|rest| rest.len() == len)
}

fn expect_len(bytes: &[u8], expected: usize) -> Result<(), AddressError> {
    if bytes.len() == expected {
        Ok(())
    } else {
        Err(AddressError::Length {
            expected,
            found: bytes.len(),
        })
    }
}

/// Split `KT1…%entrypoint` into the address and its entrypoint.
pub fn split_entrypoint(text: &str) -> (&str, Option<&str>) {
    match text.split_once('%') {
        Some((address, entrypoint)) => (address, Some(entrypoint)),
        None => (text, None),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AddressKind {
    /// `tz1`
    Ed25519,
    /// `tz2`
    Secp256k1,
    /// `tz3`
    P256,
    /// `tz4`, also the layer-2 rollup account format.
    Bls12_381,
    /// `KT1`
    Contract,
    /// `sr1`
    SmartRollup,
}

impl AddressKind {
    const ALL: [AddressKind; 6] = [
        AddressKind::Ed25519,
        AddressKind::Secp256k1,
        AddressKind::P256,
        AddressKind::Bls12_381,
        AddressKind::Contract,
        AddressKind::SmartRollup,
    ];

    fn base58_prefix(self) -> &'static [u8] {
        match self {
            AddressKind::Ed25519 => &[6, 161, 159],
            AddressKind::Secp256k1 => &[6, 161, 161],
            AddressKind::P256 => &[6, 161, 164],
            AddressKind::Bls12_381 => &[6, 161, 166],
            AddressKind::Contract => &[2, 90, 121],
            AddressKind::SmartRollup => &[6, 124, 117],
        }
    }

    /// Tag of an implicit account inside the 21-byte key-hash encoding.
    fn implicit_tag(self) -> Option<u8> {
        match self {
            AddressKind::Ed25519 => Some(0),
            AddressKind::Secp256k1 => Some(1),
            AddressKind::P256 => Some(2),
            AddressKind::Bls12_381 => Some(3),
            _ => None,
        }
    }

    fn from_implicit_tag(tag: u8) -> Result<Self, AddressError> {
        AddressKind::ALL
            .into_iter()
            .find(|kind| kind.implicit_tag() == Some(tag))
            .ok_or(AddressError::UnknownTag(tag))
    }

    pub fn is_implicit(self) -> bool {
        self.implicit_tag().is_some()
    }
}

/// An account or contract address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Address {
    pub kind: AddressKind,
    pub hash: [u8; HASH_LEN],
}

impl Address {
    /// Decode the 22-byte binary form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AddressError> {
        expect_len(bytes, 22)?;
        let mut hash = [0u8; HASH_LEN];
        match bytes[0] {
            0x00 => {
                let kind = AddressKind::from_implicit_tag(bytes[1])?;
                hash.copy_from_slice(&bytes[2..]);
                Ok(Address { kind, hash })
            }
            tag @ (0x01 | 0x03) => {
                if bytes[21] != 0 {
                    return Err(AddressError::UnknownTag(bytes[21]));
                }
                hash.copy_from_slice(&bytes[1..21]);
                let kind = if tag == 0x01 {
                    AddressKind::Contract
                } else {
                    AddressKind::SmartRollup
                };
                Ok(Address { kind, hash })
            }
            tag => Err(AddressError::UnknownTag(tag)),
        }
    }

    pub fn to_bytes(&self) -> [u8; 22] {
        let mut out = [0u8; 22];
        match self.kind.implicit_tag() {
            Some(tag) => {
                out[1] = tag;
                out[2..].copy_from_slice(&self.hash);
            }
            None => {
                out[0] = if self.kind == AddressKind::Contract { 0x01 } else { 0x03 };
                out[1..21].copy_from_slice(&self.hash);
            }
        }
        out
    }

    /// Decode the 21-byte tagged key-hash form of an implicit account.
    pub fn from_key_hash_bytes(bytes: &[u8]) -> Result<Self, AddressError> {
        expect_len(bytes, 21)?;
        let kind = AddressKind::from_implicit_tag(bytes[0])?;
        let mut hash = [0u8; HASH_LEN];
        hash.copy_from_slice(&bytes[1..]);
        Ok(Address { kind, hash })
    }

    pub fn key_hash_bytes(&self) -> Result<[u8; 21], AddressError> {
        let tag = self
            .kind
            .implicit_tag()
            .ok_or_else(|| AddressError::NotImplicit(self.to_string()))?;
        let mut out = [0u8; 21];
        out[0] = tag;
        out[1..].copy_from_slice(&self.hash);
        Ok(out)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let decoded = decode_check(text)?;
        AddressKind::ALL
            .into_iter()
            .find_map(|kind| {
                payload(&decoded, kind.base58_prefix(), HASH_LEN).map(|hash| {
                    let mut out = [0u8; HASH_LEN];
                    out.copy_from_slice(hash);
                    Address { kind, hash: out }
                })
            })
            .ok_or_else(|| AddressError::UnknownPrefix(text.to_string()))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_check(self.kind.base58_prefix(), &self.hash))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyKind {
    Ed25519,
    Secp256k1,
    P256,
    Bls12_381,
}

impl KeyKind {
    const ALL: [KeyKind; 4] = [
        KeyKind::Ed25519,
        KeyKind::Secp256k1,
        KeyKind::P256,
        KeyKind::Bls12_381,
    ];

    fn base58_prefix(self) -> &'static [u8] {
        match self {
            KeyKind::Ed25519 => &[13, 15, 37, 217],
            KeyKind::Secp256k1 => &[3, 254, 226, 86],
            KeyKind::P256 => &[3, 178, 139, 127],
            KeyKind::Bls12_381 => &[6, 149, 135, 204],
        }
    }

    fn len(self) -> usize {
        match self {
            KeyKind::Ed25519 => 32,
            KeyKind::Secp256k1 | KeyKind::P256 => 33,
            KeyKind::Bls12_381 => 48,
        }
    }
}

/// A public key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Key {
    pub kind: KeyKind,
    pub data: Vec<u8>,
}

impl Key {
    /// Decode the tagged binary form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AddressError> {
        let (&tag, data) = bytes.split_first().ok_or(AddressError::Length {
            expected: 33,
            found: 0,
        })?;
        let kind = KeyKind::ALL
            .get(usize::from(tag))
            .copied()
            .ok_or(AddressError::UnknownTag(tag))?;
        expect_len(data, kind.len())?;
        Ok(Key {
            kind,
            data: data.to_vec(),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let tag = KeyKind::ALL
            .iter()
            .position(|kind| *kind == self.kind)
            .unwrap_or_default() as u8;
        let mut out = vec![tag];
        out.extend_from_slice(&self.data);
        out
    }
}

impl FromStr for Key {
    type Err = AddressError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let decoded = decode_check(text)?;
        KeyKind::ALL
            .into_iter()
            .find_map(|kind| {
                payload(&decoded, kind.base58_prefix(), kind.len()).map(|data| Key {
                    kind,
                    data: data.to_vec(),
                })
            })
            .ok_or_else(|| AddressError::UnknownPrefix(text.to_string()))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_check(self.kind.base58_prefix(), &self.data))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SignatureKind {
    /// `sig`, curve agnostic.
    Generic,
    Ed25519,
    Secp256k1,
    P256,
    Bls12_381,
}

impl SignatureKind {
    const ALL: [SignatureKind; 5] = [
        SignatureKind::Ed25519,
        SignatureKind::Secp256k1,
        SignatureKind::P256,
        SignatureKind::Bls12_381,
        SignatureKind::Generic,
    ];

    fn base58_prefix(self) -> &'static [u8] {
        match self {
            SignatureKind::Generic => &[4, 130, 43],
            SignatureKind::Ed25519 => &[9, 245, 205, 134, 18],
            SignatureKind::Secp256k1 => &[13, 115, 101, 19, 63],
            SignatureKind::P256 => &[54, 240, 44, 52],
            SignatureKind::Bls12_381 => &[40, 171, 64, 207],
        }
    }

    fn len(self) -> usize {
        match self {
            SignatureKind::Bls12_381 => 96,
            _ => 64,
        }
    }
}

/// A signature. The binary form is the raw signature without a tag.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    pub kind: SignatureKind,
    pub data: Vec<u8>,
}

impl Signature {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AddressError> {
        let kind = match bytes.len() {
            64 => SignatureKind::Generic,
            96 => SignatureKind::Bls12_381,
            found => return Err(AddressError::Length { expected: 64, found }),
        };
        Ok(Signature {
            kind,
            data: bytes.to_vec(),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.data.clone()
    }
}

impl FromStr for Signature {
    type Err = AddressError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let decoded = decode_check(text)?;
        SignatureKind::ALL
            .into_iter()
            .find_map(|kind| {
                payload(&decoded, kind.base58_prefix(), kind.len()).map(|data| Signature {
                    kind,
                    data: data.to_vec(),
                })
            })
            .ok_or_else(|| AddressError::UnknownPrefix(text.to_string()))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_check(self.kind.base58_prefix(), &self.data))
    }
}

const CHAIN_ID_PREFIX: &[u8] = &[87, 82, 0];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChainId(pub [u8; 4]);

impl ChainId {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AddressError> {
        expect_len(bytes, 4)?;
        Ok(ChainId([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

impl FromStr for ChainId {
    type Err = AddressError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let decoded = decode_check(text)?;
        payload(&decoded, CHAIN_ID_PREFIX, 4)
            .ok_or_else(|| AddressError::UnknownPrefix(text.to_string()))
            .and_then(ChainId::from_bytes)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_check(CHAIN_ID_PREFIX, &self.0))
    }
}

const EXPR_PREFIX: &[u8] = &[13, 44, 64, 27];

/// `expr…` hash of a packed expression, used as big-map key hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct ExprHash(pub [u8; 32]);

impl ExprHash {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AddressError> {
        expect_len(bytes, 32)?;
        let mut out = [0u8; 32];
        out.copy_from_slice(bytes);
        Ok(ExprHash(out))
    }
}

impl FromStr for ExprHash {
    type Err = AddressError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let decoded = decode_check(text)?;
        payload(&decoded, EXPR_PREFIX, 32)
            .ok_or_else(|| AddressError::UnknownPrefix(text.to_string()))
            .and_then(ExprHash::from_bytes)
    }
}

impl fmt::Display for ExprHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_check(EXPR_PREFIX, &self.0))
    }
}

impl Serialize for ExprHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ExprHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(D::Error::custom)
    }
}
