//! JavaScript value representation
//!
//! `JsValue` is the tagged value stored in registers, properties and
//! constants. Heap objects are referenced through `ObjectRef` handles owned
//! by the `gc::Heap`.

use std::fmt;
use std::rc::Rc;

use crate::gc::ObjectRef;

/// Trait for types that have cheap (O(1), reference-counted) clones.
///
/// Makes it explicit at call sites when a clone only bumps a reference
/// count, as opposed to copying data.
pub trait CheapClone: Clone {
    fn cheap_clone(&self) -> Self {
        self.clone()
    }
}

impl<T: ?Sized> CheapClone for Rc<T> {}

/// A JavaScript value
///
/// Numbers that are exact 32-bit integers (other than negative zero) are
/// always stored as `Int`. Use [`JsValue::number`] to build numeric values
/// so the invariant holds.
#[derive(Clone, Default)]
pub enum JsValue {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Int(i32),
    Number(f64),
    String(JsString),
    Object(ObjectRef),
}

impl CheapClone for JsValue {}

impl JsValue {
    /// Build a normalized numeric value
    #[inline]
    pub fn number(n: f64) -> JsValue {
        let i = n as i32;
        if i as f64 == n && !(n == 0.0 && n.is_sign_negative()) {
            JsValue::Int(i)
        } else {
            JsValue::Number(n)
        }
    }

    pub fn string(s: impl Into<JsString>) -> JsValue {
        JsValue::String(s.into())
    }

    /// Check if this value is null or undefined
    pub fn is_null_or_undefined(&self) -> bool {
        matches!(self, JsValue::Null | JsValue::Undefined)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, JsValue::Undefined)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, JsValue::Int(_) | JsValue::Number(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, JsValue::String(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, JsValue::Object(_))
    }

    pub fn as_object(&self) -> Option<ObjectRef> {
        match self {
            JsValue::Object(obj) => Some(*obj),
            _ => None,
        }
    }

    /// Numeric payload, if this is a number
    #[inline]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            JsValue::Int(i) => Some(*i as f64),
            JsValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Convert to boolean (ToBoolean)
    pub fn to_boolean(&self) -> bool {
        match self {
            JsValue::Undefined | JsValue::Null => false,
            JsValue::Boolean(b) => *b,
            JsValue::Int(i) => *i != 0,
            JsValue::Number(n) => *n != 0.0 && !n.is_nan(),
            JsValue::String(s) => !s.is_empty(),
            JsValue::Object(_) => true,
        }
    }

    /// ToNumber for primitives. Objects need ToPrimitive first, which lives in
    /// the interpreter.
    pub fn primitive_to_number(&self) -> f64 {
        match self {
            JsValue::Undefined => f64::NAN,
            JsValue::Null => 0.0,
            JsValue::Boolean(true) => 1.0,
            JsValue::Boolean(false) => 0.0,
            JsValue::Int(i) => *i as f64,
            JsValue::Number(n) => *n,
            JsValue::String(s) => string_to_number(s.as_str()),
            JsValue::Object(_) => f64::NAN,
        }
    }

    /// ToString for primitives
    pub fn primitive_to_string(&self) -> JsString {
        match self {
            JsValue::Undefined => JsString::from("undefined"),
            JsValue::Null => JsString::from("null"),
            JsValue::Boolean(true) => JsString::from("true"),
            JsValue::Boolean(false) => JsString::from("false"),
            JsValue::Int(i) => JsString::from(i.to_string()),
            JsValue::Number(n) => JsString::from(number_to_string(*n)),
            JsValue::String(s) => s.cheap_clone(),
            JsValue::Object(_) => JsString::from("[object Object]"),
        }
    }

    /// Strict equality (===)
    pub fn strict_equals(&self, other: &JsValue) -> bool {
        match (self, other) {
            (JsValue::Undefined, JsValue::Undefined) => true,
            (JsValue::Null, JsValue::Null) => true,
            (JsValue::Boolean(a), JsValue::Boolean(b)) => a == b,
            (JsValue::Int(a), JsValue::Int(b)) => a == b,
            (JsValue::String(a), JsValue::String(b)) => a == b,
            (JsValue::Object(a), JsValue::Object(b)) => a == b,
            (a, b) => match (a.as_number(), b.as_number()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }
}

/// Structural equality used by hosts and tests.
///
/// Numbers compare by value across the `Int`/`Number` representations and
/// `NaN` equals `NaN`, so results can be compared without caring about the
/// internal encoding.
impl PartialEq for JsValue {
    fn eq(&self, other: &Self) -> bool {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a == b || (a.is_nan() && b.is_nan()),
            _ => self.strict_equals(other),
        }
    }
}

impl fmt::Debug for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsValue::Undefined => write!(f, "undefined"),
            JsValue::Null => write!(f, "null"),
            JsValue::Boolean(b) => write!(f, "{}", b),
            JsValue::Int(i) => write!(f, "{}", i),
            JsValue::Number(n) => write!(f, "{}", number_to_string(*n)),
            JsValue::String(s) => write!(f, "\"{}\"", s.as_str()),
            JsValue::Object(obj) => write!(f, "[object #{}]", obj.index()),
        }
    }
}

impl fmt::Display for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsValue::Object(_) => write!(f, "[object Object]"),
            other => write!(f, "{}", other.primitive_to_string()),
        }
    }
}

impl From<bool> for JsValue {
    fn from(b: bool) -> Self {
        JsValue::Boolean(b)
    }
}

impl From<f64> for JsValue {
    fn from(n: f64) -> Self {
        JsValue::number(n)
    }
}

impl From<i32> for JsValue {
    fn from(n: i32) -> Self {
        JsValue::Int(n)
    }
}

impl From<&str> for JsValue {
    fn from(s: &str) -> Self {
        JsValue::String(JsString::from(s))
    }
}

impl From<String> for JsValue {
    fn from(s: String) -> Self {
        JsValue::String(JsString::from(s))
    }
}

impl From<JsString> for JsValue {
    fn from(s: JsString) -> Self {
        JsValue::String(s)
    }
}

impl From<ObjectRef> for JsValue {
    fn from(obj: ObjectRef) -> Self {
        JsValue::Object(obj)
    }
}

/// Immutable, cheaply clonable string
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JsString(Rc<str>);

impl CheapClone for JsString {}

impl JsString {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Length in UTF-16 code units, which is what script `length` reports
    pub fn utf16_len(&self) -> usize {
        if self.0.is_ascii() {
            self.0.len()
        } else {
            self.0.encode_utf16().count()
        }
    }

    /// UTF-16 code unit at `index`
    pub fn code_unit_at(&self, index: usize) -> Option<u16> {
        if self.0.is_ascii() {
            self.0.as_bytes().get(index).map(|b| u16::from(*b))
        } else {
            self.0.encode_utf16().nth(index)
        }
    }

    /// UTF-16 code units of the string
    pub fn to_utf16(&self) -> Vec<u16> {
        self.0.encode_utf16().collect()
    }

    /// Build a string from UTF-16 code units, replacing lone surrogates
    pub fn from_utf16(units: &[u16]) -> JsString {
        JsString::from(String::from_utf16_lossy(units))
    }

    /// Substring by UTF-16 code unit range, clamped to the string length
    pub fn substring(&self, start: usize, end: usize) -> JsString {
        if self.0.is_ascii() {
            let end = end.min(self.0.len());
            let start = start.min(end);
            return JsString::from(self.0.get(start..end).unwrap_or(""));
        }
        let units = self.to_utf16();
        let end = end.min(units.len());
        let start = start.min(end);
        JsString::from_utf16(units.get(start..end).unwrap_or(&[]))
    }

    /// Single-unit string at `index`
    pub fn char_at(&self, index: usize) -> Option<JsString> {
        self.code_unit_at(index)
            .map(|unit| JsString::from_utf16(&[unit]))
    }

    pub fn concat(&self, other: &JsString) -> JsString {
        let mut s = String::with_capacity(self.0.len() + other.0.len());
        s.push_str(&self.0);
        s.push_str(&other.0);
        JsString::from(s)
    }
}

impl AsRef<str> for JsString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for JsString {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for JsString {
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for JsString {
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

impl From<&str> for JsString {
    fn from(s: &str) -> Self {
        JsString(s.into())
    }
}

impl From<String> for JsString {
    fn from(s: String) -> Self {
        JsString(s.into())
    }
}

impl fmt::Debug for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0)
    }
}

impl fmt::Display for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Property key: array indices are kept numeric so element storage can be
/// used directly
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum PropertyKey {
    String(JsString),
    Index(u32),
}

impl PropertyKey {
    /// Key for a primitive value. Objects must be converted with ToString by
    /// the caller first.
    pub fn from_primitive(value: &JsValue) -> Self {
        match value {
            JsValue::Int(i) if *i >= 0 => PropertyKey::Index(*i as u32),
            JsValue::Number(n) => {
                let idx = *n as u32;
                if idx as f64 == *n && idx != u32::MAX {
                    PropertyKey::Index(idx)
                } else {
                    PropertyKey::String(value.primitive_to_string())
                }
            }
            JsValue::String(s) => PropertyKey::from(s.cheap_clone()),
            other => PropertyKey::String(other.primitive_to_string()),
        }
    }

    #[inline]
    pub fn eq_str(&self, s: &str) -> bool {
        match self {
            PropertyKey::String(js_str) => js_str.as_str() == s,
            PropertyKey::Index(_) => false,
        }
    }

    pub fn as_index(&self) -> Option<u32> {
        match self {
            PropertyKey::Index(i) => Some(*i),
            PropertyKey::String(_) => None,
        }
    }

    pub fn to_js_string(&self) -> JsString {
        match self {
            PropertyKey::String(s) => s.cheap_clone(),
            PropertyKey::Index(i) => JsString::from(i.to_string()),
        }
    }

    pub fn to_value(&self) -> JsValue {
        JsValue::String(self.to_js_string())
    }
}

fn canonical_index(s: &str) -> Option<u32> {
    let first = s.bytes().next()?;
    if !first.is_ascii_digit() || (first == b'0' && s.len() > 1) {
        return None;
    }
    match s.parse::<u32>() {
        Ok(idx) if idx != u32::MAX => Some(idx),
        _ => None,
    }
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        match canonical_index(s) {
            Some(idx) => PropertyKey::Index(idx),
            None => PropertyKey::String(JsString::from(s)),
        }
    }
}

impl From<JsString> for PropertyKey {
    fn from(s: JsString) -> Self {
        match canonical_index(s.as_str()) {
            Some(idx) => PropertyKey::Index(idx),
            None => PropertyKey::String(s),
        }
    }
}

impl From<u32> for PropertyKey {
    fn from(idx: u32) -> Self {
        PropertyKey::Index(idx)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::String(s) => write!(f, "{}", s),
            PropertyKey::Index(i) => write!(f, "{}", i),
        }
    }
}

/// Number::toString for radix 10, following the ECMAScript formatting rules
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n < 0.0 {
        return format!("-{}", number_to_string(-n));
    }

    // Shortest round-trip digits and decimal exponent
    let formatted = format!("{:e}", n);
    let (mantissa, exponent) = formatted.split_once('e').unwrap_or((&formatted, "0"));
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let k = digits.len() as i32;
    let point = exponent + 1;

    if k <= point && point <= 21 {
        let mut s = digits;
        s.extend(std::iter::repeat_n('0', (point - k) as usize));
        s
    } else if 0 < point && point <= 21 {
        let (int_part, frac_part) = digits.split_at(point as usize);
        format!("{}.{}", int_part, frac_part)
    } else if -6 < point && point <= 0 {
        let zeros: String = std::iter::repeat_n('0', (-point) as usize).collect();
        format!("0.{}{}", zeros, digits)
    } else {
        let sign = if point - 1 < 0 { '-' } else { '+' };
        let mut chars = digits.chars();
        let first = chars.next().unwrap_or('0');
        let rest: String = chars.collect();
        if rest.is_empty() {
            format!("{}e{}{}", first, sign, (point - 1).abs())
        } else {
            format!("{}.{}e{}{}", first, rest, sign, (point - 1).abs())
        }
    }
}

pub(crate) fn is_js_whitespace(c: char) -> bool {
    matches!(
        c,
        ' ' | '\t' | '\n' | '\r' | '\u{000B}' | '\u{000C}' | '\u{00A0}' | '\u{FEFF}'
            | '\u{2028}' | '\u{2029}'
    ) || c.is_whitespace()
}

/// ToNumber applied to a string
pub fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim_matches(is_js_whitespace);
    if trimmed.is_empty() {
        return 0.0;
    }
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return f64::NAN;
        }
        return hex
            .chars()
            .filter_map(|c| c.to_digit(16))
            .fold(0.0, |acc, d| acc * 16.0 + d as f64);
    }
    let unsigned = trimmed
        .strip_prefix('+')
        .or_else(|| trimmed.strip_prefix('-'))
        .unwrap_or(trimmed);
    if unsigned == "Infinity" {
        return if trimmed.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }
    // Rust's float parser accepts "inf"/"nan" spellings that JS does not
    if !unsigned
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
    {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// ToInt32
pub fn to_int32(n: f64) -> i32 {
    to_uint32(n) as i32
}

/// ToUint32
pub fn to_uint32(n: f64) -> u32 {
    if !n.is_finite() || n == 0.0 {
        return 0;
    }
    let modulo = n.trunc().rem_euclid(4_294_967_296.0);
    modulo as u32
}
