//! Binary encoding of a [`SessionItems`] collection.
//!
//! Note: the on-wire format is versioned, but it is still considered an implementation detail and
//! may evolve. Decoding is the left inverse of encoding for every collection this crate produces,
//! and preserves the exact variant of every [`Value`].

use time::{OffsetDateTime, UtcOffset};

use crate::{
    error::DecodeError,
    item::{SessionItems, Value},
};

const VERSION: u8 = 1;
/// Collections may nest at most this many levels below the top level, exclusive.
pub const MAX_DEPTH: usize = 32;
const MAX_VARINT_BYTES: usize = 10;

const TAG_NULL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_FLOAT: u8 = 3;
const TAG_STRING: u8 = 4;
const TAG_DATETIME: u8 = 5;
const TAG_BYTES: u8 = 6;
const TAG_MAP: u8 = 7;

/// Encode a collection into bytes.
pub fn encode(items: &SessionItems) -> Vec<u8> {
    let mut out = vec![VERSION];
    write_items(&mut out, items);
    out
}

/// Decode bytes produced by [`encode`]. Empty input is an empty collection.
pub fn decode(bytes: &[u8]) -> Result<SessionItems, DecodeError> {
    if bytes.is_empty() {
        return Ok(SessionItems::new());
    }

    let mut reader = Reader { bytes, pos: 0 };
    let version = reader.u8()?;
    if version != VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }

    let items = reader.items(0)?;
    match reader.remaining() {
        0 => Ok(items),
        n => Err(DecodeError::TrailingBytes(n)),
    }
}

/// Whether `items` nests deeper than [`decode`] accepts.
pub fn exceeds_max_depth(items: &SessionItems) -> bool {
    nests_too_deep(items, 0)
}

fn nests_too_deep(items: &SessionItems, depth: usize) -> bool {
    if depth >= MAX_DEPTH {
        return true;
    }
    items.iter().any(|(_, value)| match value {
        Value::Map(nested) => nests_too_deep(nested, depth + 1),
        _ => false,
    })
}

fn write_items(out: &mut Vec<u8>, items: &SessionItems) {
    write_varint(out, items.len() as u64);
    for (key, value) in items.iter() {
        write_bytes(out, key.as_bytes());
        write_value(out, value);
    }
}

fn write_value(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => out.push(TAG_NULL),
        Value::Bool(b) => {
            out.push(TAG_BOOL);
            out.push(u8::from(*b));
        }
        Value::Int(n) => {
            out.push(TAG_INT);
            write_varint(out, zigzag(*n));
        }
        Value::Float(f) => {
            out.push(TAG_FLOAT);
            out.extend_from_slice(&f.to_bits().to_le_bytes());
        }
        Value::String(s) => {
            out.push(TAG_STRING);
            write_bytes(out, s.as_bytes());
        }
        Value::DateTime(dt) => {
            out.push(TAG_DATETIME);
            out.extend_from_slice(&dt.unix_timestamp_nanos().to_le_bytes());
            write_varint(out, zigzag(dt.offset().whole_seconds().into()));
        }
        Value::Bytes(bytes) => {
            out.push(TAG_BYTES);
            write_bytes(out, bytes);
        }
        Value::Map(items) => {
            out.push(TAG_MAP);
            write_items(out, items);
        }
    }
}

fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    write_varint(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

fn write_varint(out: &mut Vec<u8>, mut n: u64) {
    while n >= 0x80 {
        out.push((n as u8) | 0x80);
        n >>= 7;
    }
    out.push(n as u8);
}

fn zigzag(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

fn unzigzag(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining() {
            return Err(DecodeError::Truncated);
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn varint(&mut self) -> Result<u64, DecodeError> {
        let mut n: u64 = 0;
        for i in 0..MAX_VARINT_BYTES {
            let byte = self.u8()?;
            let bits = u64::from(byte & 0x7f);
            let shift = 7 * i as u32;
            if shift == 63 && bits > 1 {
                return Err(DecodeError::LengthOverflow);
            }
            n |= bits << shift;
            if byte & 0x80 == 0 {
                return Ok(n);
            }
        }
        Err(DecodeError::LengthOverflow)
    }

    fn len(&mut self) -> Result<usize, DecodeError> {
        let n = usize::try_from(self.varint()?).map_err(|_| DecodeError::LengthOverflow)?;
        if n > self.remaining() {
            return Err(DecodeError::Truncated);
        }
        Ok(n)
    }

    fn bytes(&mut self) -> Result<&'a [u8], DecodeError> {
        let n = self.len()?;
        self.take(n)
    }

    fn string(&mut self) -> Result<String, DecodeError> {
        let bytes = self.bytes()?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidUtf8)
    }

    fn items(&mut self, depth: usize) -> Result<SessionItems, DecodeError> {
        if depth >= MAX_DEPTH {
            return Err(DecodeError::TooDeep);
        }

        // Every entry is at least two bytes, so `len` bounding the count by the remaining input
        // keeps a hostile count from driving the loop.
        let count = self.len()?;
        let mut items = SessionItems::new();
        for _ in 0..count {
            let key = self.string()?;
            if items.contains_key(&key) {
                return Err(DecodeError::DuplicateKey);
            }
            let value = self.value(depth)?;
            items.push_unchecked(key, value);
        }
        Ok(items)
    }

    fn value(&mut self, depth: usize) -> Result<Value, DecodeError> {
        let value = match self.u8()? {
            TAG_NULL => Value::Null,
            TAG_BOOL => match self.u8()? {
                0 => Value::Bool(false),
                1 => Value::Bool(true),
                b => return Err(DecodeError::InvalidBool(b)),
            },
            TAG_INT => Value::Int(unzigzag(self.varint()?)),
            TAG_FLOAT => Value::Float(f64::from_bits(u64::from_le_bytes(self.array()?))),
            TAG_STRING => Value::String(self.string()?),
            TAG_DATETIME => {
                let nanos = i128::from_le_bytes(self.array()?);
                let offset = i32::try_from(unzigzag(self.varint()?))
                    .map_err(|_| DecodeError::InvalidDateTime)?;
                let offset = UtcOffset::from_whole_seconds(offset)
                    .map_err(|_| DecodeError::InvalidDateTime)?;
                let dt = OffsetDateTime::from_unix_timestamp_nanos(nanos)
                    .map_err(|_| DecodeError::InvalidDateTime)?
                    .checked_to_offset(offset)
                    .ok_or(DecodeError::InvalidDateTime)?;
                Value::DateTime(dt)
            }
            TAG_BYTES => Value::Bytes(self.bytes()?.to_vec()),
            TAG_MAP => Value::Map(self.items(depth + 1)?),
            tag => return Err(DecodeError::UnknownTag(tag)),
        };
        Ok(value)
    }
}
