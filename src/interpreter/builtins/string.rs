//! String constructor and String.prototype
//!
//! Indices are UTF-16 code units, like the `length` property.

use super::regexp::{as_regexp, exec_raw, is_global, match_all, match_at, match_result};
use super::{arg, install_constructor, this_primitive};
use crate::error::JsError;
use crate::interpreter::Interpreter;
use crate::object::{ExoticObject, JsObject};
use crate::value::{CheapClone, JsString, JsValue};

pub fn init_string(interp: &mut Interpreter) {
    let proto = interp.realm.string_prototype;

    interp.register_method(proto, "toString", string_value_of, 0);
    interp.register_method(proto, "valueOf", string_value_of, 0);
    interp.register_method(proto, "charAt", string_char_at, 1);
    interp.register_method(proto, "charCodeAt", string_char_code_at, 1);
    interp.register_method(proto, "concat", string_concat, 1);
    interp.register_method(proto, "indexOf", string_index_of, 1);
    interp.register_method(proto, "lastIndexOf", string_last_index_of, 1);
    interp.register_method(proto, "substring", string_substring, 2);
    interp.register_method(proto, "substr", string_substr, 2);
    interp.register_method(proto, "slice", string_slice, 2);
    interp.register_method(proto, "toUpperCase", string_to_upper_case, 0);
    interp.register_method(proto, "toLowerCase", string_to_lower_case, 0);
    interp.register_method(proto, "toLocaleUpperCase", string_to_upper_case, 0);
    interp.register_method(proto, "toLocaleLowerCase", string_to_lower_case, 0);
    interp.register_method(proto, "split", string_split, 2);
    interp.register_method(proto, "replace", string_replace, 2);
    interp.register_method(proto, "match", string_match, 1);

    let constructor =
        install_constructor(interp, "String", string_constructor_fn, string_construct_fn, 1, proto);
    interp.register_method(constructor, "fromCharCode", string_from_char_code, 1);
}

/// The receiver as a string; `null` and `undefined` are rejected
fn this_string(interp: &mut Interpreter, this: &JsValue) -> Result<JsString, JsError> {
    if this.is_null_or_undefined() {
        return Err(JsError::type_error(
            "String.prototype method called on null or undefined",
        ));
    }
    interp.to_string(this)
}

/// `ToInteger`, with NaN mapped to `default`
fn integer_arg(interp: &mut Interpreter, value: &JsValue, default: f64) -> Result<f64, JsError> {
    if value.is_undefined() {
        return Ok(default);
    }
    let n = interp.to_number(value)?;
    Ok(if n.is_nan() { 0.0 } else { n.trunc() })
}

fn clamp_index(n: f64, length: usize) -> usize {
    n.clamp(0.0, length as f64) as usize
}

/// First occurrence of `needle` in `haystack` at or after `from`
fn find_units(haystack: &[u16], needle: &[u16], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return (from <= haystack.len()).then_some(from);
    }
    haystack
        .windows(needle.len())
        .enumerate()
        .skip(from)
        .find(|(_, window)| *window == needle)
        .map(|(i, _)| i)
}

// ═══════════════════════════════════════════════════════════════════════════
// Constructor
// ═══════════════════════════════════════════════════════════════════════════

/// `String(value)` converts
pub fn string_constructor_fn(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    match args.first() {
        Some(value) => Ok(JsValue::String(interp.to_string(value)?)),
        None => Ok(JsValue::String(JsString::from(""))),
    }
}

/// `new String(value)` wraps
pub fn string_construct_fn(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let value = match args.first() {
        Some(value) => interp.to_string(value)?,
        None => JsString::from(""),
    };
    let proto = interp.realm.string_prototype;
    Ok(JsValue::Object(interp.alloc(JsObject::new(
        Some(proto),
        ExoticObject::String(value),
    ))))
}

pub fn string_from_char_code(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let mut units = Vec::with_capacity(args.len());
    for value in args {
        units.push(interp.to_uint32(value)? as u16);
    }
    Ok(JsValue::String(JsString::from_utf16(&units)))
}

// ═══════════════════════════════════════════════════════════════════════════
// Prototype methods
// ═══════════════════════════════════════════════════════════════════════════

pub fn string_value_of(
    interp: &mut Interpreter,
    this: JsValue,
    _args: &[JsValue],
) -> Result<JsValue, JsError> {
    this_primitive(interp, &this, "String")
}

pub fn string_char_at(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this)?;
    let pos = integer_arg(interp, &arg(args, 0), 0.0)?;
    let ch = if pos < 0.0 { None } else { s.char_at(pos as usize) };
    Ok(JsValue::String(ch.unwrap_or_else(|| JsString::from(""))))
}

pub fn string_char_code_at(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this)?;
    let pos = integer_arg(interp, &arg(args, 0), 0.0)?;
    let unit = if pos < 0.0 { None } else { s.code_unit_at(pos as usize) };
    Ok(unit.map_or(JsValue::Number(f64::NAN), |u| JsValue::Int(i32::from(u))))
}

pub fn string_concat(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let mut s = this_string(interp, &this)?.to_string();
    for value in args {
        s.push_str(interp.to_string(value)?.as_str());
    }
    Ok(JsValue::String(JsString::from(s)))
}

pub fn string_index_of(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this)?.to_utf16();
    let needle = interp.to_string(&arg(args, 0))?.to_utf16();
    let from = clamp_index(integer_arg(interp, &arg(args, 1), 0.0)?, s.len());
    Ok(find_units(&s, &needle, from).map_or(JsValue::Int(-1), |i| JsValue::number(i as f64)))
}

pub fn string_last_index_of(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this)?.to_utf16();
    let needle = interp.to_string(&arg(args, 0))?.to_utf16();
    let position = match arg(args, 1) {
        JsValue::Undefined => f64::INFINITY,
        other => {
            let n = interp.to_number(&other)?;
            if n.is_nan() { f64::INFINITY } else { n.trunc() }
        }
    };
    let Some(max_start) = s.len().checked_sub(needle.len()) else {
        return Ok(JsValue::Int(-1));
    };
    let start = clamp_index(position, max_start);
    let found = (0..=start)
        .rev()
        .find(|&i| s.get(i..i + needle.len()) == Some(needle.as_slice()));
    Ok(found.map_or(JsValue::Int(-1), |i| JsValue::number(i as f64)))
}

pub fn string_substring(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this)?;
    let length = s.utf16_len();
    let start = clamp_index(integer_arg(interp, &arg(args, 0), 0.0)?, length);
    let end = clamp_index(integer_arg(interp, &arg(args, 1), length as f64)?, length);
    let (start, end) = if start > end { (end, start) } else { (start, end) };
    Ok(JsValue::String(s.substring(start, end)))
}

pub fn string_substr(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this)?;
    let length = s.utf16_len() as f64;
    let start = integer_arg(interp, &arg(args, 0), 0.0)?;
    let start = if start < 0.0 { (length + start).max(0.0) } else { start.min(length) };
    let count = integer_arg(interp, &arg(args, 1), f64::INFINITY)?;
    let count = count.clamp(0.0, length - start);
    let start = start as usize;
    Ok(JsValue::String(s.substring(start, start + count as usize)))
}

pub fn string_slice(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this)?;
    let length = s.utf16_len() as f64;
    let relative = |n: f64| if n < 0.0 { (length + n).max(0.0) } else { n.min(length) };
    let start = relative(integer_arg(interp, &arg(args, 0), 0.0)?);
    let end = relative(integer_arg(interp, &arg(args, 1), length)?);
    if start >= end {
        return Ok(JsValue::String(JsString::from("")));
    }
    Ok(JsValue::String(s.substring(start as usize, end as usize)))
}

pub fn string_to_upper_case(
    interp: &mut Interpreter,
    this: JsValue,
    _args: &[JsValue],
) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this)?;
    Ok(JsValue::String(JsString::from(s.as_str().to_uppercase())))
}

pub fn string_to_lower_case(
    interp: &mut Interpreter,
    this: JsValue,
    _args: &[JsValue],
) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this)?;
    Ok(JsValue::String(JsString::from(s.as_str().to_lowercase())))
}

/// `split(separator, limit)` with string or RegExp separators
pub fn string_split(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this)?;
    let limit = match arg(args, 1) {
        JsValue::Undefined => u32::MAX,
        other => interp.to_uint32(&other)?,
    } as usize;
    let separator = arg(args, 0);

    let mut parts: Vec<JsValue> = Vec::new();
    if separator.is_undefined() {
        parts.push(JsValue::String(s));
    } else if let Some(regexp) = as_regexp(interp, &separator) {
        let length = s.utf16_len();
        if length == 0 {
            if match_at(interp, regexp, &s, 0)?.is_none() {
                parts.push(JsValue::String(s));
            }
        } else {
            let mut last = 0;
            for found in match_all(interp, regexp, &s)? {
                if found.end == found.start && (found.start == 0 || found.start >= length) {
                    continue;
                }
                parts.push(JsValue::String(s.substring(last, found.start)));
                parts.extend(found.captures.into_iter().skip(1));
                last = found.end;
            }
            parts.push(JsValue::String(s.substring(last, length)));
        }
    } else {
        let units = s.to_utf16();
        let separator = interp.to_string(&separator)?.to_utf16();
        if separator.is_empty() {
            parts.extend(units.iter().map(|u| JsValue::String(JsString::from_utf16(&[*u]))));
        } else {
            let mut last = 0;
            while let Some(found) = find_units(&units, &separator, last) {
                let piece = units.get(last..found).unwrap_or(&[]);
                parts.push(JsValue::String(JsString::from_utf16(piece)));
                last = found + separator.len();
            }
            parts.push(JsValue::String(JsString::from_utf16(units.get(last..).unwrap_or(&[]))));
        }
    }
    parts.truncate(limit);
    Ok(JsValue::Object(interp.create_array(parts)))
}

/// Expand `$$`, `$&` and `$n` in a replacement string
fn expand_replacement(replacement: &str, captures: &[JsValue]) -> String {
    let mut out = String::with_capacity(replacement.len());
    let mut chars = replacement.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('$') => {
                chars.next();
                out.push('$');
            }
            Some('&') => {
                chars.next();
                if let Some(JsValue::String(s)) = captures.first() {
                    out.push_str(s.as_str());
                }
            }
            Some(d) if d.is_ascii_digit() => {
                chars.next();
                let mut group = d.to_digit(10).unwrap_or(0) as usize;
                if let Some(&d2) = chars.peek() {
                    if let Some(two) = d2.to_digit(10).map(|v| group * 10 + v as usize) {
                        if two < captures.len() {
                            chars.next();
                            group = two;
                        }
                    }
                }
                match captures.get(group) {
                    Some(JsValue::String(s)) if group > 0 => out.push_str(s.as_str()),
                    Some(_) if group > 0 => {}
                    _ => {
                        out.push('$');
                        out.push(d);
                    }
                }
            }
            _ => out.push('$'),
        }
    }
    out
}

/// `replace(pattern, replacement)`; a global RegExp replaces every match
pub fn string_replace(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this)?;
    let pattern = arg(args, 0);
    let replacement = arg(args, 1);
    let replacer = interp.is_callable(&replacement).then(|| replacement.cheap_clone());
    let replacement_text = match &replacer {
        Some(_) => JsString::from(""),
        None => interp.to_string(&replacement)?,
    };

    let matches = if let Some(regexp) = as_regexp(interp, &pattern) {
        if is_global(interp, regexp)? {
            interp.put_property(regexp, "lastIndex".into(), JsValue::Int(0))?;
            match_all(interp, regexp, &s)?
        } else {
            exec_raw(interp, regexp, &s)?.into_iter().collect()
        }
    } else {
        let needle = interp.to_string(&pattern)?;
        let units = s.to_utf16();
        find_units(&units, &needle.to_utf16(), 0)
            .map(|start| super::regexp::RegExpMatch {
                start,
                end: start + needle.utf16_len(),
                captures: vec![JsValue::String(needle.cheap_clone())],
            })
            .into_iter()
            .collect()
    };

    let length = s.utf16_len();
    let mut out = String::new();
    let mut last = 0;
    for found in matches {
        out.push_str(s.substring(last, found.start).as_str());
        let piece = match &replacer {
            Some(function) => {
                let mut call_args = found.captures.clone();
                call_args.push(JsValue::number(found.start as f64));
                call_args.push(JsValue::String(s.cheap_clone()));
                let result = interp.call_function(function, JsValue::Undefined, &call_args)?;
                interp.to_string(&result)?.to_string()
            }
            None => expand_replacement(replacement_text.as_str(), &found.captures),
        };
        out.push_str(&piece);
        last = found.end;
    }
    out.push_str(s.substring(last, length).as_str());
    Ok(JsValue::String(JsString::from(out)))
}

/// `match(regexp)`: `exec` for a plain RegExp, every matched string for a
/// global one
pub fn string_match(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this)?;
    let pattern = arg(args, 0);
    let regexp = match as_regexp(interp, &pattern) {
        Some(regexp) => regexp,
        None => {
            let source = match pattern {
                JsValue::Undefined => JsString::from(""),
                other => interp.to_string(&other)?,
            };
            super::regexp::create_regexp(interp, &source, &JsString::from(""))?
        }
    };
    if !is_global(interp, regexp)? {
        return match exec_raw(interp, regexp, &s)? {
            Some(found) => match_result(interp, found, &s),
            None => Ok(JsValue::Null),
        };
    }
    interp.put_property(regexp, "lastIndex".into(), JsValue::Int(0))?;
    let matched: Vec<JsValue> = match_all(interp, regexp, &s)?
        .into_iter()
        .filter_map(|found| found.captures.into_iter().next())
        .collect();
    if matched.is_empty() {
        return Ok(JsValue::Null);
    }
    Ok(JsValue::Object(interp.create_array(matched)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replacement_patterns() {
        let captures = vec![JsValue::from("ab"), JsValue::from("a"), JsValue::Undefined];
        assert_eq!(expand_replacement("[$&]", &captures), "[ab]");
        assert_eq!(expand_replacement("$1-$2-$$", &captures), "a--$");
        assert_eq!(expand_replacement("$9", &captures), "$9");
    }

    #[test]
    fn unit_search_handles_empty_needles() {
        let hay: Vec<u16> = "abcabc".encode_utf16().collect();
        let needle: Vec<u16> = "bc".encode_utf16().collect();
        assert_eq!(find_units(&hay, &needle, 0), Some(1));
        assert_eq!(find_units(&hay, &needle, 2), Some(4));
        assert_eq!(find_units(&hay, &[], 6), Some(6));
        assert_eq!(find_units(&hay, &[], 7), None);
    }
}
