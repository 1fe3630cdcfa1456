//! Decoder for PHP `serialize()` payloads
//!
//! The panel answers `api=serialize` requests with PHP's native format:
//!
//! ```text
//! a:2:{s:4:"name";s:5:"hello";i:0;b:1;}
//! ```
//!
//! Values decode into [`PhpValue`], whose arrays keep PHP's insertion order.
//! String lengths are byte counts, so decoding works on raw bytes and only
//! converts to UTF-8 (lossily) once a string has been sliced out.

use std::fmt;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::errors::FleetError;

/// Array key: PHP arrays are keyed by integers or strings
#[derive(Debug, Clone, PartialEq)]
pub enum PhpKey {
    Int(i64),
    Str(String),
}

impl PhpKey {
    /// Whether this key names `name` (integer keys compare by their decimal form)
    pub fn matches(&self, name: &str) -> bool {
        match self {
            PhpKey::Str(s) => s == name,
            PhpKey::Int(i) => name.parse::<i64>().map(|n| n == *i).unwrap_or(false),
        }
    }
}

impl fmt::Display for PhpKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhpKey::Int(i) => write!(f, "{}", i),
            PhpKey::Str(s) => f.write_str(s),
        }
    }
}

/// A decoded PHP value
#[derive(Debug, Clone, PartialEq)]
pub enum PhpValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<(PhpKey, PhpValue)>),
    Object {
        class: String,
        fields: Vec<(PhpKey, PhpValue)>,
    },
}

impl PhpValue {
    /// Key/value entries of an array or object
    pub fn entries(&self) -> Option<&[(PhpKey, PhpValue)]> {
        match self {
            PhpValue::Array(entries) => Some(entries),
            PhpValue::Object { fields, .. } => Some(fields),
            _ => None,
        }
    }

    /// Look up an entry by key
    pub fn get(&self, key: &str) -> Option<&PhpValue> {
        self.entries()?
            .iter()
            .find(|(k, _)| k.matches(key))
            .map(|(_, v)| v)
    }

    /// Scalar rendered as text; `None` for null, arrays and objects
    pub fn as_text(&self) -> Option<String> {
        match self {
            PhpValue::Str(s) => Some(s.clone()),
            PhpValue::Int(i) => Some(i.to_string()),
            PhpValue::Float(f) => Some(f.to_string()),
            PhpValue::Bool(b) => Some(if *b { "1" } else { "" }.to_string()),
            _ => None,
        }
    }

    /// PHP truthiness
    pub fn is_truthy(&self) -> bool {
        match self {
            PhpValue::Null => false,
            PhpValue::Bool(b) => *b,
            PhpValue::Int(i) => *i != 0,
            PhpValue::Float(f) => *f != 0.0,
            PhpValue::Str(s) => !(s.is_empty() || s == "0"),
            PhpValue::Array(entries) => !entries.is_empty(),
            PhpValue::Object { .. } => true,
        }
    }

    /// Text of entry `key`, or `default` when missing or not a scalar
    pub fn text_or(&self, key: &str, default: &str) -> String {
        self.get(key)
            .and_then(PhpValue::as_text)
            .unwrap_or_else(|| default.to_string())
    }

    /// Truthiness of entry `key`; missing entries are false
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).map(PhpValue::is_truthy).unwrap_or(false)
    }
}

impl Serialize for PhpValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            PhpValue::Null => serializer.serialize_unit(),
            PhpValue::Bool(b) => serializer.serialize_bool(*b),
            PhpValue::Int(i) => serializer.serialize_i64(*i),
            PhpValue::Float(f) => serializer.serialize_f64(*f),
            PhpValue::Str(s) => serializer.serialize_str(s),
            PhpValue::Array(entries) if is_list(entries) => {
                let mut seq = serializer.serialize_seq(Some(entries.len()))?;
                for (_, value) in entries {
                    seq.serialize_element(value)?;
                }
                seq.end()
            }
            PhpValue::Array(entries) | PhpValue::Object { fields: entries, .. } => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(&key.to_string(), value)?;
                }
                map.end()
            }
        }
    }
}

/// An array whose keys are exactly 0..n serializes as a JSON list
fn is_list(entries: &[(PhpKey, PhpValue)]) -> bool {
    !entries.is_empty()
        && entries
            .iter()
            .enumerate()
            .all(|(i, (k, _))| *k == PhpKey::Int(i as i64))
}

impl PhpValue {
    /// String-keyed array, in the given order
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, PhpValue)>) -> Self {
        PhpValue::Array(
            entries
                .into_iter()
                .map(|(k, v)| (PhpKey::Str(k.into()), v))
                .collect(),
        )
    }

    /// String value
    pub fn text(s: impl Into<String>) -> Self {
        PhpValue::Str(s.into())
    }
}

/// Encode a value in PHP `serialize()` format
pub fn to_bytes(value: &PhpValue) -> Vec<u8> {
    let mut out = Vec::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut Vec<u8>, value: &PhpValue) {
    match value {
        PhpValue::Null => out.extend_from_slice(b"N;"),
        PhpValue::Bool(b) => out.extend_from_slice(if *b { b"b:1;" } else { b"b:0;" }),
        PhpValue::Int(i) => out.extend_from_slice(format!("i:{};", i).as_bytes()),
        PhpValue::Float(f) => {
            let token = if f.is_nan() {
                "NAN".to_string()
            } else if f.is_infinite() {
                if *f > 0.0 { "INF" } else { "-INF" }.to_string()
            } else {
                f.to_string()
            };
            out.extend_from_slice(format!("d:{};", token).as_bytes());
        }
        PhpValue::Str(s) => write_str(out, s),
        PhpValue::Array(entries) => {
            out.extend_from_slice(format!("a:{}:", entries.len()).as_bytes());
            write_entries(out, entries);
        }
        PhpValue::Object { class, fields } => {
            out.extend_from_slice(format!("O:{}:\"{}\":{}:", class.len(), class, fields.len()).as_bytes());
            write_entries(out, fields);
        }
    }
}

fn write_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(format!("s:{}:\"", s.len()).as_bytes());
    out.extend_from_slice(s.as_bytes());
    out.extend_from_slice(b"\";");
}

fn write_entries(out: &mut Vec<u8>, entries: &[(PhpKey, PhpValue)]) {
    out.push(b'{');
    for (key, value) in entries {
        match key {
            PhpKey::Int(i) => out.extend_from_slice(format!("i:{};", i).as_bytes()),
            PhpKey::Str(s) => write_str(out, s),
        }
        write_value(out, value);
    }
    out.push(b'}');
}

/// Deepest array/object nesting accepted from the panel
pub const MAX_DEPTH: usize = 128;

/// Decode a complete payload; trailing bytes other than whitespace are an error
pub fn from_bytes(input: &[u8]) -> Result<PhpValue, FleetError> {
    let mut parser = Parser {
        input,
        pos: 0,
        depth: 0,
    };
    let value = parser.value()?;
    while parser.pos < input.len() && input[parser.pos].is_ascii_whitespace() {
        parser.pos += 1;
    }
    if parser.pos != input.len() {
        return Err(parser.error("trailing data after value"));
    }
    Ok(value)
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, msg: &str) -> FleetError {
        FleetError::MalformedResponse(format!("serialized payload, byte {}: {}", self.pos, msg))
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn expect(&mut self, byte: u8) -> Result<(), FleetError> {
        match self.peek() {
            Some(b) if b == byte => {
                self.pos += 1;
                Ok(())
            }
            Some(b) => Err(self.error(&format!(
                "expected '{}', found '{}'",
                byte as char, b as char
            ))),
            None => Err(self.error(&format!("expected '{}', found end of input", byte as char))),
        }
    }

    /// Bytes up to (not including) `delim`, consuming the delimiter
    fn until(&mut self, delim: u8) -> Result<&'a str, FleetError> {
        let input = self.input;
        let start = self.pos;
        let len = input[start..]
            .iter()
            .position(|b| *b == delim)
            .ok_or_else(|| self.error(&format!("missing '{}'", delim as char)))?;
        self.pos = start + len + 1;
        std::str::from_utf8(&input[start..start + len])
            .map_err(|_| self.error("non-ASCII token"))
    }

    fn integer(&mut self, delim: u8) -> Result<i64, FleetError> {
        let token = self.until(delim)?;
        token
            .parse()
            .map_err(|_| self.error(&format!("invalid integer '{}'", token)))
    }

    fn length(&mut self, delim: u8) -> Result<usize, FleetError> {
        let n = self.integer(delim)?;
        usize::try_from(n).map_err(|_| self.error("negative length"))
    }

    fn quoted(&mut self, len: usize) -> Result<String, FleetError> {
        self.expect(b'"')?;
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.input.len())
            .ok_or_else(|| self.error("string runs past end of input"))?;
        let text = String::from_utf8_lossy(&self.input[self.pos..end]).into_owned();
        self.pos = end;
        self.expect(b'"')?;
        Ok(text)
    }

    fn value(&mut self) -> Result<PhpValue, FleetError> {
        let tag = self
            .peek()
            .ok_or_else(|| self.error("unexpected end of input"))?;
        self.pos += 1;

        match tag {
            b'N' => {
                self.expect(b';')?;
                Ok(PhpValue::Null)
            }
            b'b' => {
                self.expect(b':')?;
                match self.integer(b';')? {
                    0 => Ok(PhpValue::Bool(false)),
                    1 => Ok(PhpValue::Bool(true)),
                    _ => Err(self.error("boolean must be 0 or 1")),
                }
            }
            b'i' => {
                self.expect(b':')?;
                Ok(PhpValue::Int(self.integer(b';')?))
            }
            b'd' => {
                self.expect(b':')?;
                let token = self.until(b';')?;
                let f = match token {
                    "INF" => f64::INFINITY,
                    "-INF" => f64::NEG_INFINITY,
                    "NAN" => f64::NAN,
                    other => other
                        .parse()
                        .map_err(|_| self.error(&format!("invalid float '{}'", other)))?,
                };
                Ok(PhpValue::Float(f))
            }
            b's' => {
                self.expect(b':')?;
                let len = self.length(b':')?;
                let text = self.quoted(len)?;
                self.expect(b';')?;
                Ok(PhpValue::Str(text))
            }
            b'a' => {
                self.expect(b':')?;
                let count = self.length(b':')?;
                Ok(PhpValue::Array(self.entries(count)?))
            }
            b'O' => {
                self.expect(b':')?;
                let len = self.length(b':')?;
                let class = self.quoted(len)?;
                self.expect(b':')?;
                let count = self.length(b':')?;
                let fields = self.entries(count)?;
                Ok(PhpValue::Object { class, fields })
            }
            other => Err(self.error(&format!("unsupported type tag '{}'", other as char))),
        }
    }

    fn entries(&mut self, count: usize) -> Result<Vec<(PhpKey, PhpValue)>, FleetError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        self.depth += 1;
        let entries = self.entries_body(count)?;
        self.depth -= 1;
        Ok(entries)
    }

    fn entries_body(&mut self, count: usize) -> Result<Vec<(PhpKey, PhpValue)>, FleetError> {
        self.expect(b'{')?;
        let mut entries: Vec<(PhpKey, PhpValue)> = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let key = match self.value()? {
                PhpValue::Int(i) => PhpKey::Int(i),
                PhpValue::Str(s) => PhpKey::Str(s),
                _ => return Err(self.error("array key must be an integer or string")),
            };
            let value = self.value()?;
            // Later duplicates overwrite earlier ones in place, as PHP does.
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => entries.push((key, value)),
            }
        }
        self.expect(b'}')?;
        Ok(entries)
    }
}
