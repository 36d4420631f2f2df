//! Array constructor and Array.prototype
//!
//! The methods are generic over array-like receivers: they read and write
//! through `[[Get]]`/`[[Put]]` and the `length` property, so they also work
//! on `arguments` objects and plain objects with a length.

use std::cmp::Ordering;

use super::{arg, install_constructor};
use crate::error::JsError;
use crate::gc::ObjectRef;
use crate::interpreter::Interpreter;
use crate::object::array_length_from;
use crate::value::{CheapClone, JsString, JsValue, PropertyKey};

pub fn init_array(interp: &mut Interpreter) {
    let proto = interp.realm.array_prototype;

    // Mutating methods
    interp.register_method(proto, "push", array_push, 1);
    interp.register_method(proto, "pop", array_pop, 0);
    interp.register_method(proto, "shift", array_shift, 0);
    interp.register_method(proto, "unshift", array_unshift, 1);
    interp.register_method(proto, "splice", array_splice, 2);
    interp.register_method(proto, "reverse", array_reverse, 0);
    interp.register_method(proto, "sort", array_sort, 1);

    // Accessor methods
    interp.register_method(proto, "concat", array_concat, 1);
    interp.register_method(proto, "slice", array_slice, 2);
    interp.register_method(proto, "join", array_join, 1);
    interp.register_method(proto, "toString", array_to_string, 0);
    interp.register_method(proto, "indexOf", array_index_of, 1);

    let constructor =
        install_constructor(interp, "Array", array_constructor_fn, array_constructor_fn, 1, proto);
    interp.register_method(constructor, "isArray", array_is_array, 1);
}

// ═══════════════════════════════════════════════════════════════════════════
// Element access helpers
// ═══════════════════════════════════════════════════════════════════════════

fn get_index(interp: &mut Interpreter, obj: ObjectRef, index: u32) -> Result<JsValue, JsError> {
    interp.get_property(obj, &PropertyKey::Index(index))
}

fn set_index(
    interp: &mut Interpreter,
    obj: ObjectRef,
    index: u32,
    value: JsValue,
) -> Result<(), JsError> {
    interp.put_property(obj, PropertyKey::Index(index), value)
}

fn set_length(interp: &mut Interpreter, obj: ObjectRef, length: u32) -> Result<(), JsError> {
    interp.put_property(obj, PropertyKey::from("length"), JsValue::number(f64::from(length)))
}

fn read_elements(interp: &mut Interpreter, obj: ObjectRef) -> Result<Vec<JsValue>, JsError> {
    let length = interp.length_of(obj)?;
    let mut values = Vec::with_capacity(length as usize);
    for index in 0..length {
        values.push(get_index(interp, obj, index)?);
    }
    Ok(values)
}

/// Replace the elements of `obj` with `values`
fn write_elements(
    interp: &mut Interpreter,
    obj: ObjectRef,
    values: Vec<JsValue>,
) -> Result<(), JsError> {
    let length = u32::try_from(values.len())
        .map_err(|_| JsError::range_error("Invalid array length"))?;
    for (index, value) in (0..length).zip(values) {
        set_index(interp, obj, index, value)?;
    }
    set_length(interp, obj, length)
}

/// `ToInteger` clamped into `0..=length`, counting negative values from
/// the end
fn relative_index(
    interp: &mut Interpreter,
    value: &JsValue,
    length: u32,
    default: u32,
) -> Result<u32, JsError> {
    if value.is_undefined() {
        return Ok(default);
    }
    let n = interp.to_number(value)?;
    let n = if n.is_nan() { 0.0 } else { n.trunc() };
    let length = f64::from(length);
    let index = if n < 0.0 { (length + n).max(0.0) } else { n.min(length) };
    Ok(index as u32)
}

fn to_u32_length(len: usize) -> Result<u32, JsError> {
    u32::try_from(len).map_err(|_| JsError::range_error("Invalid array length"))
}

// ═══════════════════════════════════════════════════════════════════════════
// Constructor
// ═══════════════════════════════════════════════════════════════════════════

/// `Array(len)` or `Array(a, b, ...)`, with or without `new`
pub fn array_constructor_fn(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    if let [length @ (JsValue::Int(_) | JsValue::Number(_))] = args {
        let length = array_length_from(length)?;
        let array = interp.create_array(Vec::new());
        set_length(interp, array, length)?;
        return Ok(JsValue::Object(array));
    }
    Ok(JsValue::Object(interp.create_array(args.to_vec())))
}

pub fn array_is_array(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let is_array = match arg(args, 0) {
        JsValue::Object(obj) => interp.heap.get(obj)?.is_array(),
        _ => false,
    };
    Ok(JsValue::Boolean(is_array))
}

// ═══════════════════════════════════════════════════════════════════════════
// Mutating methods
// ═══════════════════════════════════════════════════════════════════════════

pub fn array_push(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let obj = interp.to_object(&this)?;
    let mut length = interp.length_of(obj)?;
    for value in args {
        set_index(interp, obj, length, value.cheap_clone())?;
        length = length
            .checked_add(1)
            .ok_or_else(|| JsError::range_error("Invalid array length"))?;
    }
    set_length(interp, obj, length)?;
    Ok(JsValue::number(f64::from(length)))
}

pub fn array_pop(
    interp: &mut Interpreter,
    this: JsValue,
    _args: &[JsValue],
) -> Result<JsValue, JsError> {
    let obj = interp.to_object(&this)?;
    let length = interp.length_of(obj)?;
    let Some(last) = length.checked_sub(1) else {
        set_length(interp, obj, 0)?;
        return Ok(JsValue::Undefined);
    };
    let value = get_index(interp, obj, last)?;
    interp.delete_property(obj, &PropertyKey::Index(last))?;
    set_length(interp, obj, last)?;
    Ok(value)
}

pub fn array_shift(
    interp: &mut Interpreter,
    this: JsValue,
    _args: &[JsValue],
) -> Result<JsValue, JsError> {
    let obj = interp.to_object(&this)?;
    let mut values = read_elements(interp, obj)?;
    if values.is_empty() {
        set_length(interp, obj, 0)?;
        return Ok(JsValue::Undefined);
    }
    let first = values.remove(0);
    let length = to_u32_length(values.len())?;
    interp.delete_property(obj, &PropertyKey::Index(length))?;
    write_elements(interp, obj, values)?;
    Ok(first)
}

pub fn array_unshift(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let obj = interp.to_object(&this)?;
    let existing = read_elements(interp, obj)?;
    let mut values = Vec::with_capacity(args.len() + existing.len());
    values.extend(args.iter().map(CheapClone::cheap_clone));
    values.extend(existing);
    let length = to_u32_length(values.len())?;
    write_elements(interp, obj, values)?;
    Ok(JsValue::number(f64::from(length)))
}

/// `splice(start, deleteCount, ...items)` returns the removed elements
pub fn array_splice(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let obj = interp.to_object(&this)?;
    let mut values = read_elements(interp, obj)?;
    let length = to_u32_length(values.len())?;
    let start = relative_index(interp, &arg(args, 0), length, 0)?;
    let delete_count = match args.get(1) {
        None if args.is_empty() => 0,
        None => length - start,
        Some(count) => {
            let n = interp.to_number(count)?;
            let n = if n.is_nan() { 0.0 } else { n.trunc() };
            n.clamp(0.0, f64::from(length - start)) as u32
        }
    };
    let items = args.get(2..).unwrap_or(&[]).iter().map(CheapClone::cheap_clone);
    let start = start as usize;
    let end = start + delete_count as usize;
    let removed: Vec<JsValue> = values.splice(start..end, items).collect();

    let new_length = to_u32_length(values.len())?;
    for index in new_length..length {
        interp.delete_property(obj, &PropertyKey::Index(index))?;
    }
    write_elements(interp, obj, values)?;
    Ok(JsValue::Object(interp.create_array(removed)))
}

pub fn array_reverse(
    interp: &mut Interpreter,
    this: JsValue,
    _args: &[JsValue],
) -> Result<JsValue, JsError> {
    let obj = interp.to_object(&this)?;
    let mut values = read_elements(interp, obj)?;
    values.reverse();
    write_elements(interp, obj, values)?;
    Ok(JsValue::Object(obj))
}

/// Stable sort; `undefined` sorts last and the comparator may throw
pub fn array_sort(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let obj = interp.to_object(&this)?;
    let comparator = arg(args, 0);
    let comparator = if comparator.is_undefined() {
        None
    } else if interp.is_callable(&comparator) {
        Some(comparator)
    } else {
        return Err(JsError::type_error("The comparison function must be a function"));
    };
    let values = read_elements(interp, obj)?;
    let sorted = merge_sort(interp, values, comparator.as_ref())?;
    write_elements(interp, obj, sorted)?;
    Ok(JsValue::Object(obj))
}

fn compare_elements(
    interp: &mut Interpreter,
    a: &JsValue,
    b: &JsValue,
    comparator: Option<&JsValue>,
) -> Result<Ordering, JsError> {
    match (a.is_undefined(), b.is_undefined()) {
        (true, true) => return Ok(Ordering::Equal),
        (true, false) => return Ok(Ordering::Greater),
        (false, true) => return Ok(Ordering::Less),
        (false, false) => {}
    }
    if let Some(comparator) = comparator {
        let result = interp.call_function(
            comparator,
            JsValue::Undefined,
            &[a.cheap_clone(), b.cheap_clone()],
        )?;
        let n = interp.to_number(&result)?;
        return Ok(if n < 0.0 {
            Ordering::Less
        } else if n > 0.0 {
            Ordering::Greater
        } else {
            Ordering::Equal
        });
    }
    let a = interp.to_string(a)?;
    let b = interp.to_string(b)?;
    Ok(a.as_str().encode_utf16().cmp(b.as_str().encode_utf16()))
}

fn merge_sort(
    interp: &mut Interpreter,
    values: Vec<JsValue>,
    comparator: Option<&JsValue>,
) -> Result<Vec<JsValue>, JsError> {
    if values.len() <= 1 {
        return Ok(values);
    }
    let mut left = values;
    let right = left.split_off(left.len() / 2);
    let left = merge_sort(interp, left, comparator)?;
    let right = merge_sort(interp, right, comparator)?;

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    while let (Some(a), Some(b)) = (left.peek(), right.peek()) {
        let take_right = compare_elements(interp, a, b, comparator)? == Ordering::Greater;
        let next = if take_right { right.next() } else { left.next() };
        merged.extend(next);
    }
    merged.extend(left);
    merged.extend(right);
    Ok(merged)
}

// ═══════════════════════════════════════════════════════════════════════════
// Accessor methods
// ═══════════════════════════════════════════════════════════════════════════

pub fn array_concat(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let obj = interp.to_object(&this)?;
    let mut values = Vec::new();
    let items = std::iter::once(JsValue::Object(obj))
        .chain(args.iter().map(CheapClone::cheap_clone));
    for item in items {
        match item {
            JsValue::Object(o) if interp.heap.get(o)?.is_array() => {
                values.extend(read_elements(interp, o)?);
            }
            other => values.push(other),
        }
    }
    Ok(JsValue::Object(interp.create_array(values)))
}

pub fn array_slice(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let obj = interp.to_object(&this)?;
    let length = interp.length_of(obj)?;
    let start = relative_index(interp, &arg(args, 0), length, 0)?;
    let end = relative_index(interp, &arg(args, 1), length, length)?;
    let mut values = Vec::new();
    for index in start..end {
        values.push(get_index(interp, obj, index)?);
    }
    Ok(JsValue::Object(interp.create_array(values)))
}

pub fn array_join(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let obj = interp.to_object(&this)?;
    let separator = match arg(args, 0) {
        JsValue::Undefined => JsString::from(","),
        other => interp.to_string(&other)?,
    };
    let length = interp.length_of(obj)?;
    let mut out = String::new();
    for index in 0..length {
        if index > 0 {
            out.push_str(separator.as_str());
        }
        let element = get_index(interp, obj, index)?;
        if !element.is_null_or_undefined() {
            out.push_str(interp.to_string(&element)?.as_str());
        }
    }
    Ok(JsValue::String(JsString::from(out)))
}

pub fn array_to_string(
    interp: &mut Interpreter,
    this: JsValue,
    _args: &[JsValue],
) -> Result<JsValue, JsError> {
    array_join(interp, this, &[])
}

pub fn array_index_of(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let obj = interp.to_object(&this)?;
    let search = arg(args, 0);
    let length = interp.length_of(obj)?;
    let start = relative_index(interp, &arg(args, 1), length, 0)?;
    for index in start..length {
        if !interp.has_property(obj, &PropertyKey::Index(index))? {
            continue;
        }
        if get_index(interp, obj, index)?.strict_equals(&search) {
            return Ok(JsValue::number(f64::from(index)));
        }
    }
    Ok(JsValue::Int(-1))
}
