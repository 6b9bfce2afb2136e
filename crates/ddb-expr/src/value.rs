//! The attribute value model (V): a tagged union with a stable per-type
//! total order, a canonical byte encoding for key material, and type-aware
//! set/list/map operations.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::de::{Error as DeError, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The type tag of an `AttributeValue`, used by `attribute_type(path, T)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeTag {
    S,
    N,
    B,
    Bool,
    Null,
    Ss,
    Ns,
    Bs,
    L,
    M,
}

impl TypeTag {
    /// The wire-format discriminant, e.g. `"SS"`.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::S => "S",
            Self::N => "N",
            Self::B => "B",
            Self::Bool => "BOOL",
            Self::Null => "NULL",
            Self::Ss => "SS",
            Self::Ns => "NS",
            Self::Bs => "BS",
            Self::L => "L",
            Self::M => "M",
        }
    }
}

/// An error in evaluating or constructing an attribute value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("invalid number literal: {0}")]
    InvalidNumber(String),
}

/// A DynamoDB-style tagged attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    S(String),
    /// An arbitrary-precision decimal held as a normalized string.
    N(String),
    B(Vec<u8>),
    Bool(bool),
    Null,
    Ss(BTreeSet<String>),
    Ns(BTreeSet<String>),
    Bs(BTreeSet<Vec<u8>>),
    L(Vec<AttributeValue>),
    M(BTreeMap<String, AttributeValue>),
}

impl AttributeValue {
    /// The type tag of this value.
    #[must_use]
    pub const fn type_tag(&self) -> TypeTag {
        match self {
            Self::S(_) => TypeTag::S,
            Self::N(_) => TypeTag::N,
            Self::B(_) => TypeTag::B,
            Self::Bool(_) => TypeTag::Bool,
            Self::Null => TypeTag::Null,
            Self::Ss(_) => TypeTag::Ss,
            Self::Ns(_) => TypeTag::Ns,
            Self::Bs(_) => TypeTag::Bs,
            Self::L(_) => TypeTag::L,
            Self::M(_) => TypeTag::M,
        }
    }

    /// Structural equality, per spec: set/list/map compare member-wise.
    #[must_use]
    pub fn equal(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::S(a), Self::S(b)) => a == b,
            (Self::N(a), Self::N(b)) => numeric_eq(a, b),
            (Self::B(a), Self::B(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Null, Self::Null) => true,
            (Self::Ss(a), Self::Ss(b)) => a == b,
            (Self::Ns(a), Self::Ns(b)) => {
                a.len() == b.len() && a.iter().all(|x| b.iter().any(|y| numeric_eq(x, y)))
            }
            (Self::Bs(a), Self::Bs(b)) => a == b,
            (Self::L(a), Self::L(b)) => a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equal(y)),
            (Self::M(a), Self::M(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|w| v.equal(w)))
            }
            _ => false,
        }
    }

    /// Ordering, defined only for `S`, `N`, `B`; cross-type or unordered
    /// variants error.
    pub fn compare(&self, other: &Self) -> Result<Ordering, ValueError> {
        match (self, other) {
            (Self::S(a), Self::S(b)) => Ok(a.as_bytes().cmp(b.as_bytes())),
            (Self::B(a), Self::B(b)) => Ok(a.cmp(b)),
            (Self::N(a), Self::N(b)) => {
                let av = parse_decimal(a)?;
                let bv = parse_decimal(b)?;
                Ok(av.partial_cmp(&bv).unwrap_or(Ordering::Equal))
            }
            _ => Err(ValueError::TypeMismatch(format!(
                "cannot compare {:?} and {:?}",
                self.type_tag(),
                other.type_tag()
            ))),
        }
    }

    /// `size(...)` per spec: byte length for `S`/`B`, element count for the
    /// set/list types, entry count for `M`. Errors for `N`/`BOOL`/`NULL`.
    pub fn size(&self) -> Result<i64, ValueError> {
        match self {
            Self::S(s) => Ok(s.len() as i64),
            Self::B(b) => Ok(b.len() as i64),
            Self::Ss(s) => Ok(s.len() as i64),
            Self::Ns(s) => Ok(s.len() as i64),
            Self::Bs(s) => Ok(s.len() as i64),
            Self::L(l) => Ok(l.len() as i64),
            Self::M(m) => Ok(m.len() as i64),
            other => Err(ValueError::TypeMismatch(format!(
                "size() not applicable to {:?}",
                other.type_tag()
            ))),
        }
    }

    /// The canonical byte encoding used for key material: raw bytes for
    /// `S`/`B`, an order-preserving decimal encoding for `N`.
    #[must_use]
    pub fn key_bytes(&self) -> Vec<u8> {
        match self {
            Self::S(s) => s.as_bytes().to_vec(),
            Self::B(b) => b.clone(),
            Self::N(n) => encode_number_bytes(n),
            other => format!("{other:?}").into_bytes(),
        }
    }
}

/// Compares two `N` strings by parsed numeric value.
fn numeric_eq(a: &str, b: &str) -> bool {
    match (parse_decimal(a), parse_decimal(b)) {
        (Ok(x), Ok(y)) => (x - y).abs() < f64::EPSILON,
        _ => a == b,
    }
}

/// Parses a DynamoDB `N` literal as an `f64`. Exact decimal semantics are
/// not required by the spec; arithmetic in SET infix expressions is
/// IEEE-754 double precision.
pub fn parse_decimal(s: &str) -> Result<f64, ValueError> {
    s.trim()
        .parse::<f64>()
        .map_err(|_| ValueError::InvalidNumber(s.to_string()))
}

/// Formats an `f64` back into a normalized `N` string (no trailing `.0` for
/// integral values, no exponent notation for ordinary magnitudes).
#[must_use]
pub fn format_decimal(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{v:.0}")
    } else {
        let mut s = format!("{v}");
        if s.contains('e') || s.contains('E') {
            s = format!("{v:.10}");
            while s.ends_with('0') {
                s.pop();
            }
            if s.ends_with('.') {
                s.pop();
            }
        }
        s
    }
}

/// Encodes a decimal `N` string into an order-preserving byte sequence.
///
/// Sign, then a normalized exponent, then the significant digits (with the
/// digit string complemented for negative numbers so that byte-lexicographic
/// order matches numeric order). This meets the "at minimum a canonical
/// decimal" bar from the design notes; extreme magnitudes are not
/// exhaustively fuzzed.
#[must_use]
pub fn encode_number_bytes(s: &str) -> Vec<u8> {
    let trimmed = s.trim();
    let (negative, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let (int_part, frac_part) = match rest.split_once('.') {
        Some((i, f)) => (i, f),
        None => (rest, ""),
    };

    let mut digits: Vec<u8> = int_part
        .bytes()
        .chain(frac_part.bytes())
        .filter(u8::is_ascii_digit)
        .collect();
    let mut exponent = int_part.chars().filter(char::is_ascii_digit).count() as i32;

    // strip leading zeros, adjusting the exponent
    while digits.first() == Some(&b'0') && digits.len() > 1 {
        digits.remove(0);
        exponent -= 1;
    }
    // strip trailing zeros (doesn't affect exponent)
    while digits.last() == Some(&b'0') && digits.len() > 1 {
        digits.pop();
    }
    if digits.iter().all(|d| *d == b'0') || digits.is_empty() {
        return vec![0x01]; // zero marker, sorts between negative and positive
    }

    let sign_marker: u8 = if negative { 0x00 } else { 0x02 };
    // bias the exponent into an unsigned range; flip for negative numbers so
    // that larger magnitude (more negative) sorts first
    let biased = (exponent + 1_000_000) as u32;
    let exp_bytes = if negative {
        (!biased).to_be_bytes()
    } else {
        biased.to_be_bytes()
    };

    let digit_bytes: Vec<u8> = if negative {
        digits.iter().map(|d| 0xFF - (*d - b'0')).collect()
    } else {
        digits
    };

    let mut out = Vec::with_capacity(1 + 4 + digit_bytes.len() + 1);
    out.push(sign_marker);
    out.extend_from_slice(&exp_bytes);
    out.extend_from_slice(&digit_bytes);
    out.push(if negative { 0x00 } else { 0xFF }); // terminator, orders shorter-is-smaller for positives
    out
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::S(s) => write!(f, "{s}"),
            Self::N(n) => write!(f, "{n}"),
            Self::B(b) => write!(f, "<{} bytes>", b.len()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Null => write!(f, "null"),
            Self::Ss(s) => write!(f, "{s:?}"),
            Self::Ns(s) => write!(f, "{s:?}"),
            Self::Bs(s) => write!(f, "<{} blobs>", s.len()),
            Self::L(l) => write!(f, "{l:?}"),
            Self::M(m) => write!(f, "{m:?}"),
        }
    }
}

impl Serialize for AttributeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Self::S(s) => map.serialize_entry("S", s)?,
            Self::N(n) => map.serialize_entry("N", n)?,
            Self::B(b) => map.serialize_entry("B", &base64_encode(b))?,
            Self::Bool(v) => map.serialize_entry("BOOL", v)?,
            Self::Null => map.serialize_entry("NULL", &true)?,
            Self::Ss(s) => map.serialize_entry("SS", &s.iter().collect::<Vec<_>>())?,
            Self::Ns(s) => map.serialize_entry("NS", &s.iter().collect::<Vec<_>>())?,
            Self::Bs(s) => {
                let encoded: Vec<String> = s.iter().map(|b| base64_encode(b)).collect();
                map.serialize_entry("BS", &encoded)?;
            }
            Self::L(l) => map.serialize_entry("L", l)?,
            Self::M(m) => map.serialize_entry("M", m)?,
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for AttributeValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AttrVisitor;

        impl<'de> Visitor<'de> for AttrVisitor {
            type Value = AttributeValue;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "a DynamoDB-tagged attribute value map")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let (tag, value): (String, serde_json::Value) = map
                    .next_entry()?
                    .ok_or_else(|| DeError::custom("empty attribute value"))?;
                let value = match tag.as_str() {
                    "S" => AttributeValue::S(
                        value
                            .as_str()
                            .ok_or_else(|| DeError::custom("S must be a string"))?
                            .to_string(),
                    ),
                    "N" => AttributeValue::N(
                        value
                            .as_str()
                            .ok_or_else(|| DeError::custom("N must be a string"))?
                            .to_string(),
                    ),
                    "B" => {
                        let s = value
                            .as_str()
                            .ok_or_else(|| DeError::custom("B must be a base64 string"))?;
                        AttributeValue::B(
                            base64_decode(s).map_err(|e| DeError::custom(e.to_string()))?,
                        )
                    }
                    "BOOL" => AttributeValue::Bool(
                        value
                            .as_bool()
                            .ok_or_else(|| DeError::custom("BOOL must be a bool"))?,
                    ),
                    "NULL" => AttributeValue::Null,
                    "SS" => {
                        let arr = value
                            .as_array()
                            .ok_or_else(|| DeError::custom("SS must be an array"))?;
                        let mut set = BTreeSet::new();
                        for v in arr {
                            set.insert(
                                v.as_str()
                                    .ok_or_else(|| DeError::custom("SS member must be a string"))?
                                    .to_string(),
                            );
                        }
                        AttributeValue::Ss(set)
                    }
                    "NS" => {
                        let arr = value
                            .as_array()
                            .ok_or_else(|| DeError::custom("NS must be an array"))?;
                        let mut set = BTreeSet::new();
                        for v in arr {
                            set.insert(
                                v.as_str()
                                    .ok_or_else(|| DeError::custom("NS member must be a string"))?
                                    .to_string(),
                            );
                        }
                        AttributeValue::Ns(set)
                    }
                    "BS" => {
                        let arr = value
                            .as_array()
                            .ok_or_else(|| DeError::custom("BS must be an array"))?;
                        let mut set = BTreeSet::new();
                        for v in arr {
                            let s = v
                                .as_str()
                                .ok_or_else(|| DeError::custom("BS member must be base64"))?;
                            set.insert(
                                base64_decode(s).map_err(|e| DeError::custom(e.to_string()))?,
                            );
                        }
                        AttributeValue::Bs(set)
                    }
                    "L" => {
                        let arr = value
                            .as_array()
                            .ok_or_else(|| DeError::custom("L must be an array"))?;
                        let mut list = Vec::with_capacity(arr.len());
                        for v in arr {
                            list.push(
                                serde_json::from_value(v.clone())
                                    .map_err(|e| DeError::custom(e.to_string()))?,
                            );
                        }
                        AttributeValue::L(list)
                    }
                    "M" => {
                        let obj = value
                            .as_object()
                            .ok_or_else(|| DeError::custom("M must be an object"))?;
                        let mut m = BTreeMap::new();
                        for (k, v) in obj {
                            m.insert(
                                k.clone(),
                                serde_json::from_value(v.clone())
                                    .map_err(|e| DeError::custom(e.to_string()))?,
                            );
                        }
                        AttributeValue::M(m)
                    }
                    other => return Err(DeError::custom(format!("unknown attribute tag {other}"))),
                };
                Ok(value)
            }
        }

        deserializer.deserialize_map(AttrVisitor)
    }
}

fn base64_encode(bytes: &[u8]) -> String {
    const CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut out = String::new();
    for chunk in bytes.chunks(3) {
        let b0 = chunk[0];
        let b1 = chunk.get(1).copied();
        let b2 = chunk.get(2).copied();
        out.push(CHARS[(b0 >> 2) as usize] as char);
        out.push(CHARS[(((b0 & 0x03) << 4) | (b1.unwrap_or(0) >> 4)) as usize] as char);
        out.push(match b1 {
            Some(b1) => CHARS[(((b1 & 0x0F) << 2) | (b2.unwrap_or(0) >> 6)) as usize] as char,
            None => '=',
        });
        out.push(match b2 {
            Some(b2) => CHARS[(b2 & 0x3F) as usize] as char,
            None => '=',
        });
    }
    out
}

fn base64_decode(s: &str) -> Result<Vec<u8>, ValueError> {
    fn val(c: u8) -> Option<u8> {
        match c {
            b'A'..=b'Z' => Some(c - b'A'),
            b'a'..=b'z' => Some(c - b'a' + 26),
            b'0'..=b'9' => Some(c - b'0' + 52),
            b'+' => Some(62),
            b'/' => Some(63),
            _ => None,
        }
    }
    let bytes: Vec<u8> = s.bytes().filter(|b| *b != b'=').collect();
    let mut out = Vec::new();
    for chunk in bytes.chunks(4) {
        let vals: Vec<u8> = chunk
            .iter()
            .map(|b| val(*b).ok_or_else(|| ValueError::InvalidNumber("bad base64".into())))
            .collect::<Result<_, _>>()?;
        out.push((vals[0] << 2) | (vals.get(1).copied().unwrap_or(0) >> 4));
        if vals.len() > 2 {
            out.push((vals[1] << 4) | (vals[2] >> 2));
        }
        if vals.len() > 3 {
            out.push((vals[2] << 6) | vals[3]);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_compare_is_numeric() {
        let a = AttributeValue::N("10".into());
        let b = AttributeValue::N("9".into());
        assert_eq!(a.compare(&b).unwrap(), Ordering::Greater);
    }

    #[test]
    fn string_compare_is_lexicographic() {
        let a = AttributeValue::S("apple".into());
        let b = AttributeValue::S("banana".into());
        assert_eq!(a.compare(&b).unwrap(), Ordering::Less);
    }

    #[test]
    fn cross_type_compare_errors() {
        let a = AttributeValue::S("1".into());
        let b = AttributeValue::N("1".into());
        assert!(a.compare(&b).is_err());
    }

    #[test]
    fn size_of_collections() {
        assert_eq!(AttributeValue::S("abc".into()).size().unwrap(), 3);
        let mut set = BTreeSet::new();
        set.insert("a".to_string());
        set.insert("b".to_string());
        assert_eq!(AttributeValue::Ss(set).size().unwrap(), 2);
        assert!(AttributeValue::Bool(true).size().is_err());
    }

    #[test]
    fn number_key_bytes_preserve_order() {
        let values = ["-100", "-2.5", "-1", "0", "1", "2.5", "100"];
        let mut encoded: Vec<Vec<u8>> = values.iter().map(|v| encode_number_bytes(v)).collect();
        let sorted = {
            let mut s = encoded.clone();
            s.sort();
            s
        };
        encoded.sort();
        assert_eq!(encoded, sorted);
        // re-derive expected order directly from parsed f64 and compare positions
        let mut pairs: Vec<(f64, Vec<u8>)> = values
            .iter()
            .map(|v| (v.parse::<f64>().unwrap(), encode_number_bytes(v)))
            .collect();
        pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        let expected: Vec<Vec<u8>> = pairs.into_iter().map(|(_, b)| b).collect();
        assert_eq!(encoded, expected);
    }

    #[test]
    fn json_round_trip() {
        let v = AttributeValue::M(BTreeMap::from([
            ("year".to_string(), AttributeValue::N("2024".to_string())),
            ("title".to_string(), AttributeValue::S("A".to_string())),
        ]));
        let json = serde_json::to_string(&v).unwrap();
        let back: AttributeValue = serde_json::from_str(&json).unwrap();
        assert!(v.equal(&back));
    }
}
