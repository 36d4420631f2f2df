//! RegExp constructor and RegExp.prototype
//!
//! Matching is done by `fancy-regex` behind the `regex` feature. Match
//! positions are reported to script in UTF-16 code units.

use super::{arg, install_constructor};
use crate::error::JsError;
use crate::gc::ObjectRef;
use crate::interpreter::Interpreter;
use crate::object::{ExoticObject, JsObject, PropertyAttributes, RegExpData};
use crate::value::{CheapClone, JsString, JsValue, PropertyKey};

pub fn init_regexp(interp: &mut Interpreter) {
    let proto = interp.realm.regexp_prototype;

    interp.register_method(proto, "exec", regexp_exec, 1);
    interp.register_method(proto, "test", regexp_test, 1);
    interp.register_method(proto, "toString", regexp_to_string, 0);

    install_constructor(interp, "RegExp", regexp_constructor_fn, regexp_constructor_fn, 2, proto);
}

/// One successful match, in UTF-16 offsets
#[derive(Debug, Clone)]
pub struct RegExpMatch {
    pub start: usize,
    pub end: usize,
    /// Group 0 is the whole match; unmatched groups are `undefined`
    pub captures: Vec<JsValue>,
}

struct Flags {
    global: bool,
    ignore_case: bool,
    multiline: bool,
}

fn parse_flags(flags: &str) -> Result<Flags, JsError> {
    let mut parsed = Flags {
        global: false,
        ignore_case: false,
        multiline: false,
    };
    for c in flags.chars() {
        let slot = match c {
            'g' => &mut parsed.global,
            'i' => &mut parsed.ignore_case,
            'm' => &mut parsed.multiline,
            _ => return Err(invalid_flags(flags)),
        };
        if *slot {
            return Err(invalid_flags(flags));
        }
        *slot = true;
    }
    Ok(parsed)
}

fn invalid_flags(flags: &str) -> JsError {
    JsError::syntax_error(format!("Invalid regular expression flags '{}'", flags), 0, 0)
}

/// Allocate a RegExp object for a literal or a constructor call
pub fn create_regexp(
    interp: &mut Interpreter,
    pattern: &JsString,
    flags: &JsString,
) -> Result<ObjectRef, JsError> {
    let parsed = parse_flags(flags.as_str())?;

    #[cfg(feature = "regex")]
    let regex = compile(pattern.as_str(), &parsed)?;
    #[cfg(not(feature = "regex"))]
    return Err(JsError::syntax_error(
        format!("Regular expressions are not supported: /{}/", pattern),
        0,
        0,
    ));

    #[cfg(feature = "regex")]
    {
        let proto = interp.realm.regexp_prototype;
        let mut object = JsObject::new(
            Some(proto),
            ExoticObject::RegExp(Box::new(RegExpData {
                source: pattern.cheap_clone(),
                global: parsed.global,
                ignore_case: parsed.ignore_case,
                multiline: parsed.multiline,
                regex,
            })),
        );
        let frozen = PropertyAttributes::FROZEN;
        object.define(PropertyKey::from("source"), JsValue::String(pattern.cheap_clone()), frozen);
        object.define(PropertyKey::from("global"), JsValue::Boolean(parsed.global), frozen);
        object.define(
            PropertyKey::from("ignoreCase"),
            JsValue::Boolean(parsed.ignore_case),
            frozen,
        );
        object.define(PropertyKey::from("multiline"), JsValue::Boolean(parsed.multiline), frozen);
        object.define(
            PropertyKey::from("lastIndex"),
            JsValue::Int(0),
            PropertyAttributes::DONT_ENUM.union(PropertyAttributes::DONT_DELETE),
        );
        Ok(interp.alloc(object))
    }
}

#[cfg(feature = "regex")]
fn compile(pattern: &str, flags: &Flags) -> Result<fancy_regex::Regex, JsError> {
    let mut prefix = String::new();
    if flags.ignore_case {
        prefix.push('i');
    }
    if flags.multiline {
        prefix.push('m');
    }
    let translated = translate_pattern(pattern);
    let source = if prefix.is_empty() {
        translated
    } else {
        format!("(?{}){}", prefix, translated)
    };
    fancy_regex::Regex::new(&source).map_err(|e| {
        JsError::syntax_error(format!("Invalid regular expression: /{}/: {}", pattern, e), 0, 0)
    })
}

/// Rewrite the places where ES character classes differ from the Rust
/// syntax: a `[` inside a class is literal, and `[^]` matches anything.
#[cfg(feature = "regex")]
fn translate_pattern(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut chars = pattern.chars().peekable();
    let mut in_class = false;
    let mut class_start = false;
    while let Some(c) = chars.next() {
        if c == '\\' {
            out.push(c);
            if let Some(next) = chars.next() {
                out.push(next);
            }
            class_start = false;
            continue;
        }
        if !in_class {
            if c == '[' {
                if chars.peek() == Some(&'^') {
                    chars.next();
                    if chars.peek() == Some(&']') {
                        chars.next();
                        out.push_str("[\\s\\S]");
                        continue;
                    }
                    out.push_str("[^");
                } else if chars.peek() == Some(&']') {
                    // `[]` never matches
                    chars.next();
                    out.push_str("(?!)");
                    continue;
                } else {
                    out.push('[');
                }
                in_class = true;
                class_start = true;
                continue;
            }
            out.push(c);
            continue;
        }
        match c {
            ']' if !class_start => {
                in_class = false;
                out.push(c);
            }
            '[' => out.push_str("\\["),
            _ => out.push(c),
        }
        class_start = false;
    }
    out
}

/// The RegExp object behind `value`, if it is one
pub(crate) fn as_regexp(interp: &Interpreter, value: &JsValue) -> Option<ObjectRef> {
    let obj = value.as_object()?;
    match interp.heap.get(obj).ok()?.exotic {
        ExoticObject::RegExp(_) => Some(obj),
        _ => None,
    }
}

pub(crate) fn is_global(interp: &Interpreter, regexp: ObjectRef) -> Result<bool, JsError> {
    match &interp.heap.get(regexp)?.exotic {
        ExoticObject::RegExp(data) => Ok(data.global),
        _ => Err(not_a_regexp()),
    }
}

fn not_a_regexp() -> JsError {
    JsError::type_error("RegExp method called on incompatible receiver")
}

/// Byte offset of UTF-16 offset `unit` in `text`
fn byte_offset(text: &str, unit: usize) -> Option<usize> {
    let mut units = 0;
    for (byte, c) in text.char_indices() {
        if units >= unit {
            return Some(byte);
        }
        units += c.len_utf16();
    }
    (units >= unit).then_some(text.len())
}

fn unit_offset(text: &str, byte: usize) -> usize {
    text.get(..byte).map_or(0, |prefix| prefix.encode_utf16().count())
}

/// Search `text` from UTF-16 offset `start`, ignoring `lastIndex`
#[cfg(feature = "regex")]
pub(crate) fn match_at(
    interp: &Interpreter,
    regexp: ObjectRef,
    text: &JsString,
    start: usize,
) -> Result<Option<RegExpMatch>, JsError> {
    let ExoticObject::RegExp(data) = &interp.heap.get(regexp)?.exotic else {
        return Err(not_a_regexp());
    };
    let text = text.as_str();
    let Some(position) = byte_offset(text, start) else {
        return Ok(None);
    };
    let captures = data
        .regex
        .captures_from_pos(text, position)
        .map_err(|e| JsError::range_error(format!("RegExp match failed: {}", e)))?;
    let Some(captures) = captures else {
        return Ok(None);
    };
    let Some(whole) = captures.get(0) else {
        return Ok(None);
    };
    let groups = captures
        .iter()
        .map(|group| group.map_or(JsValue::Undefined, |m| JsValue::from(m.as_str())))
        .collect();
    Ok(Some(RegExpMatch {
        start: unit_offset(text, whole.start()),
        end: unit_offset(text, whole.end()),
        captures: groups,
    }))
}

#[cfg(not(feature = "regex"))]
pub(crate) fn match_at(
    _interp: &Interpreter,
    _regexp: ObjectRef,
    _text: &JsString,
    _start: usize,
) -> Result<Option<RegExpMatch>, JsError> {
    Err(not_a_regexp())
}

/// Every match of `regexp` in `text`, advancing past empty matches
pub(crate) fn match_all(
    interp: &Interpreter,
    regexp: ObjectRef,
    text: &JsString,
) -> Result<Vec<RegExpMatch>, JsError> {
    let mut matches = Vec::new();
    let mut position = 0;
    let length = text.utf16_len();
    while position <= length {
        let Some(found) = match_at(interp, regexp, text, position)? else {
            break;
        };
        position = if found.end == found.start { found.end + 1 } else { found.end };
        matches.push(found);
    }
    Ok(matches)
}

fn last_index(interp: &mut Interpreter, regexp: ObjectRef) -> Result<usize, JsError> {
    let value = interp.get_property(regexp, &PropertyKey::from("lastIndex"))?;
    let n = interp.to_number(&value)?;
    Ok(if n.is_nan() || n < 0.0 { 0 } else { n as usize })
}

fn set_last_index(
    interp: &mut Interpreter,
    regexp: ObjectRef,
    index: usize,
) -> Result<(), JsError> {
    interp.put_property(regexp, PropertyKey::from("lastIndex"), JsValue::number(index as f64))
}

/// `exec` without building the result array
pub(crate) fn exec_raw(
    interp: &mut Interpreter,
    regexp: ObjectRef,
    text: &JsString,
) -> Result<Option<RegExpMatch>, JsError> {
    let global = is_global(interp, regexp)?;
    let start = if global { last_index(interp, regexp)? } else { 0 };
    if start > text.utf16_len() {
        set_last_index(interp, regexp, 0)?;
        return Ok(None);
    }
    let found = match_at(interp, regexp, text, start)?;
    if global {
        set_last_index(interp, regexp, found.as_ref().map_or(0, |m| m.end))?;
    }
    Ok(found)
}

/// Result array of `exec`/`match`: the groups plus `index` and `input`
pub(crate) fn match_result(
    interp: &mut Interpreter,
    found: RegExpMatch,
    input: &JsString,
) -> Result<JsValue, JsError> {
    let array = interp.create_array(found.captures);
    interp.define_property(
        array,
        "index",
        JsValue::number(found.start as f64),
        PropertyAttributes::NONE,
    )?;
    interp.define_property(
        array,
        "input",
        JsValue::String(input.cheap_clone()),
        PropertyAttributes::NONE,
    )?;
    Ok(JsValue::Object(array))
}

// ═══════════════════════════════════════════════════════════════════════════
// Constructor and prototype methods
// ═══════════════════════════════════════════════════════════════════════════

pub fn regexp_constructor_fn(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let pattern = arg(args, 0);
    let flags = arg(args, 1);
    if let Some(existing) = as_regexp(interp, &pattern) {
        if !flags.is_undefined() {
            return Err(JsError::type_error(
                "Cannot supply flags when constructing one RegExp from another",
            ));
        }
        let (source, flags) = match &interp.heap.get(existing)?.exotic {
            ExoticObject::RegExp(data) => (data.source.cheap_clone(), flag_string(data)),
            _ => return Err(not_a_regexp()),
        };
        return Ok(JsValue::Object(create_regexp(interp, &source, &JsString::from(flags))?));
    }
    let pattern = match pattern {
        JsValue::Undefined => JsString::from(""),
        other => interp.to_string(&other)?,
    };
    let flags = match flags {
        JsValue::Undefined => JsString::from(""),
        other => interp.to_string(&other)?,
    };
    Ok(JsValue::Object(create_regexp(interp, &pattern, &flags)?))
}

fn flag_string(data: &RegExpData) -> String {
    let mut flags = String::new();
    if data.global {
        flags.push('g');
    }
    if data.ignore_case {
        flags.push('i');
    }
    if data.multiline {
        flags.push('m');
    }
    flags
}

pub fn regexp_exec(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let regexp = as_regexp(interp, &this).ok_or_else(not_a_regexp)?;
    let text = interp.to_string(&arg(args, 0))?;
    match exec_raw(interp, regexp, &text)? {
        Some(found) => match_result(interp, found, &text),
        None => Ok(JsValue::Null),
    }
}

pub fn regexp_test(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let regexp = as_regexp(interp, &this).ok_or_else(not_a_regexp)?;
    let text = interp.to_string(&arg(args, 0))?;
    Ok(JsValue::Boolean(exec_raw(interp, regexp, &text)?.is_some()))
}

pub fn regexp_to_string(
    interp: &mut Interpreter,
    this: JsValue,
    _args: &[JsValue],
) -> Result<JsValue, JsError> {
    let regexp = as_regexp(interp, &this).ok_or_else(not_a_regexp)?;
    let text = match &interp.heap.get(regexp)?.exotic {
        ExoticObject::RegExp(data) => format!("/{}/{}", data.source, flag_string(data)),
        _ => return Err(not_a_regexp()),
    };
    Ok(JsValue::String(JsString::from(text)))
}
