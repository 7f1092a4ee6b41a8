//! Canonical binary encoding of Micheline expressions.
//!
//! Every node starts with a one byte tag. Integers use the signed zarith
//! encoding, strings, bytes and sequences carry a 4-byte big-endian length,
//! and primitive applications pick a compact tag depending on their argument
//! count and whether annotations are present.

use num_bigint::{BigInt, BigUint};
use num_traits::{Signed, Zero};

use crate::{
    error::DecodeError,
    opcode::OpCode,
    prim::{Node, Prim},
};

const TAG_INT: u8 = 0x00;
const TAG_STRING: u8 = 0x01;
const TAG_SEQ: u8 = 0x02;
const TAG_PRIM0: u8 = 0x03;
const TAG_PRIM0_ANNOTS: u8 = 0x04;
const TAG_PRIM1: u8 = 0x05;
const TAG_PRIM1_ANNOTS: u8 = 0x06;
const TAG_PRIM2: u8 = 0x07;
const TAG_PRIM2_ANNOTS: u8 = 0x08;
const TAG_PRIM_N: u8 = 0x09;
const TAG_BYTES: u8 = 0x0A;

/// Prefix of `PACK`ed data.
pub const PACK_PREFIX: u8 = 0x05;

impl Prim {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf);
        buf
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        match &self.node {
            Node::Int(value) => {
                buf.push(TAG_INT);
                write_zarith(buf, value);
            }
            Node::String(value) => {
                buf.push(TAG_STRING);
                write_sized(buf, value.as_bytes());
            }
            Node::Bytes(value) => {
                buf.push(TAG_BYTES);
                write_sized(buf, value);
            }
            Node::Seq(items) => {
                buf.push(TAG_SEQ);
                let mut inner = Vec::new();
                for item in items {
                    item.encode_into(&mut inner);
                }
                write_sized(buf, &inner);
            }
            Node::App(op, args) => {
                let annotated = self.has_annots();
                let tag = match (args.len(), annotated) {
                    (0, false) => TAG_PRIM0,
                    (0, true) => TAG_PRIM0_ANNOTS,
                    (1, false) => TAG_PRIM1,
                    (1, true) => TAG_PRIM1_ANNOTS,
                    (2, false) => TAG_PRIM2,
                    (2, true) => TAG_PRIM2_ANNOTS,
                    _ => TAG_PRIM_N,
                };
                buf.push(tag);
                buf.push(op.tag());
                if tag == TAG_PRIM_N {
                    let mut inner = Vec::new();
                    for arg in args {
                        arg.encode_into(&mut inner);
                    }
                    write_sized(buf, &inner);
                    write_sized(buf, self.annots.join(" ").as_bytes());
                } else {
                    for arg in args {
                        arg.encode_into(buf);
                    }
                    if annotated {
                        write_sized(buf, self.annots.join(" ").as_bytes());
                    }
                }
            }
        }
    }

    /// Decode exactly one expression spanning the whole input.
    pub fn decode(bytes: &[u8]) -> Result<Prim, DecodeError> {
        let (prim, read) = Prim::decode_prefix(bytes)?;
        if read != bytes.len() {
            return Err(DecodeError::TrailingBytes(bytes.len() - read));
        }
        Ok(prim)
    }

    /// Decode one expression from the start of `bytes`, returning it along
    /// with the number of bytes consumed.
    pub fn decode_prefix(bytes: &[u8]) -> Result<(Prim, usize), DecodeError> {
        let mut reader = Reader {
            buf: bytes,
            pos: 0,
            depth: 0,
        };
        let prim = reader.prim()?;
        Ok((prim, reader.pos))
    }

    /// `PACK` serialization: the pack prefix followed by the binary form.
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = vec![PACK_PREFIX];
        self.encode_into(&mut buf);
        buf
    }

    /// Inverse of [`Prim::pack`]. Pairs in the result are flagged
    /// `was_packed`.
    pub fn unpack(bytes: &[u8]) -> Result<Prim, DecodeError> {
        match bytes.split_first() {
            Some((&PACK_PREFIX, rest)) => {
                let mut prim = Prim::decode(rest)?;
                mark_packed(&mut prim);
                Ok(prim)
            }
            _ => Err(DecodeError::MissingPackPrefix),
        }
    }
}

fn mark_packed(prim: &mut Prim) {
    if prim.is(OpCode::Pair) || prim.is(OpCode::pair) {
        prim.was_packed = true;
    }
    match &mut prim.node {
        Node::Seq(children) | Node::App(_, children) => children.iter_mut().for_each(mark_packed),
        _ => {}
    }
}

fn write_sized(buf: &mut Vec<u8>, data: &[u8]) {
    buf.extend_from_slice(&(data.len() as u32).to_be_bytes());
    buf.extend_from_slice(data);
}

fn low_bits(value: &BigUint, mask: u8) -> u8 {
    value.iter_u32_digits().next().unwrap_or(0) as u8 & mask
}

/// Signed zarith: 6 payload bits and a sign bit in the first byte, 7 payload
/// bits in every following byte, high bit set while more bytes follow.
pub fn write_zarith(buf: &mut Vec<u8>, value: &BigInt) {
    let mut rest = value.magnitude().clone();
    let mut byte = low_bits(&rest, 0x3f);
    rest >>= 6usize;
    if value.is_negative() {
        byte |= 0x40;
    }
    if !rest.is_zero() {
        byte |= 0x80;
    }
    buf.push(byte);
    while !rest.is_zero() {
        let mut byte = low_bits(&rest, 0x7f);
        rest >>= 7usize;
        if !rest.is_zero() {
            byte |= 0x80;
        }
        buf.push(byte);
    }
}

/// Nesting limit for decoded expressions.
pub const MAX_DEPTH: usize = 1_000;

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or(DecodeError::Truncated(self.pos))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn sized(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = self.take(4)?;
        let len = u32::from_be_bytes([len[0], len[1], len[2], len[3]]) as usize;
        self.take(len)
    }

    fn zarith(&mut self) -> Result<BigInt, DecodeError> {
        let first = self.u8()?;
        let mut magnitude = BigUint::from(first & 0x3f);
        let mut shift = 6usize;
        let mut byte = first;
        while byte & 0x80 != 0 {
            byte = self.u8()?;
            magnitude |= BigUint::from(byte & 0x7f) << shift;
            shift += 7;
        }
        let value = BigInt::from(magnitude);
        Ok(if first & 0x40 != 0 { -value } else { value })
    }

    fn string(&mut self) -> Result<String, DecodeError> {
        let start = self.pos;
        let raw = self.sized()?;
        String::from_utf8(raw.to_vec()).map_err(|_| DecodeError::InvalidUtf8(start))
    }

    fn annots(&mut self) -> Result<Vec<String>, DecodeError> {
        Ok(self
            .string()?
            .split(' ')
            .filter(|anno| !anno.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn opcode(&mut self) -> Result<OpCode, DecodeError> {
        OpCode::try_from(self.u8()?)
    }

    fn prims_until_end(&self, bytes: &'a [u8], offset: usize) -> Result<Vec<Prim>, DecodeError> {
        let mut inner = Reader {
            buf: bytes,
            pos: 0,
            depth: self.depth,
        };
        let mut items = Vec::new();
        while inner.pos < bytes.len() {
            items.push(inner.prim().map_err(|err| shift_offset(err, offset))?);
        }
        Ok(items)
    }

    fn prim(&mut self) -> Result<Prim, DecodeError> {
        let offset = self.pos;
        if self.depth >= MAX_DEPTH {
            return Err(DecodeError::TooDeep { offset });
        }
        self.depth += 1;
        let prim = self.node(offset);
        self.depth -= 1;
        prim
    }

    fn node(&mut self, offset: usize) -> Result<Prim, DecodeError> {
        let tag = self.u8()?;
        let prim = match tag {
            TAG_INT => Prim::int(self.zarith()?),
            TAG_STRING => Prim::string(self.string()?),
            TAG_BYTES => Prim::bytes(self.sized()?.to_vec()),
            TAG_SEQ => {
                let start = self.pos + 4;
                let body = self.sized()?;
                Prim::seq(self.prims_until_end(body, start)?)
            }
            TAG_PRIM0..=TAG_PRIM2_ANNOTS => {
                let op = self.opcode()?;
                let arity = usize::from((tag - TAG_PRIM0) / 2);
                let mut args = Vec::with_capacity(arity);
                for _ in 0..arity {
                    args.push(self.prim()?);
                }
                let prim = Prim::new(op, args);
                if (tag - TAG_PRIM0) % 2 == 1 {
                    prim.with_annots(self.annots()?)
                } else {
                    prim
                }
            }
            TAG_PRIM_N => {
                let op = self.opcode()?;
                let start = self.pos + 4;
                let body = self.sized()?;
                let args = self.prims_until_end(body, start)?;
                Prim::new(op, args).with_annots(self.annots()?)
            }
            tag => return Err(DecodeError::UnknownTag { tag, offset }),
        };
        Ok(prim)
    }
}

fn shift_offset(err: DecodeError, by: usize) -> DecodeError {
    match err {
        DecodeError::Truncated(at) => DecodeError::Truncated(at + by),
        DecodeError::InvalidUtf8(at) => DecodeError::InvalidUtf8(at + by),
        DecodeError::UnknownTag { tag, offset } => DecodeError::UnknownTag {
            tag,
            offset: offset + by,
        },
        DecodeError::TooDeep { offset } => DecodeError::TooDeep { offset: offset + by },
        other => other,
    }
}
