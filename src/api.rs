//! Conversions between script values and `serde_json` values, plus small
//! helpers for hosts that poke at objects from Rust.
//!
//! # Example
//!
//! ```
//! use regjs::{Runtime, api};
//! use serde_json::json;
//!
//! let mut runtime = Runtime::new();
//! let value = api::from_json(runtime.interpreter_mut(), &json!({"items": [3, 1, 2]}));
//! runtime.interpreter_mut().set_global("config", value).unwrap();
//! let sorted = runtime.eval("config.items.sort().join('-')").unwrap();
//! assert_eq!(sorted.to_string(), "1-2-3");
//! ```

use crate::error::JsError;
use crate::gc::ObjectRef;
use crate::interpreter::Interpreter;
use crate::object::{ExoticObject, PropertyAttributes};
use crate::value::{JsString, JsValue, PropertyKey};

// ═══════════════════════════════════════════════════════════════════════════════
// JSON → JsValue
// ═══════════════════════════════════════════════════════════════════════════════

/// Build a script value from JSON. Objects and arrays are allocated on the
/// interpreter's heap; collection never runs while this builds them.
pub fn from_json(interp: &mut Interpreter, json: &serde_json::Value) -> JsValue {
    match json {
        serde_json::Value::Null => JsValue::Null,
        serde_json::Value::Bool(b) => JsValue::Boolean(*b),
        serde_json::Value::Number(n) => match n.as_i64().and_then(|i| i32::try_from(i).ok()) {
            Some(i) => JsValue::Int(i),
            None => JsValue::number(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => JsValue::String(JsString::from(s.as_str())),
        serde_json::Value::Array(items) => {
            let elements = items.iter().map(|item| from_json(interp, item)).collect();
            JsValue::Object(interp.create_array(elements))
        }
        serde_json::Value::Object(map) => {
            let obj = interp.create_object();
            for (key, value) in map {
                let value = from_json(interp, value);
                let key = PropertyKey::from(interp.intern(key));
                if let Ok(object) = interp.object_mut(obj) {
                    object.define(key, value, PropertyAttributes::NONE);
                }
            }
            JsValue::Object(obj)
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// JsValue → JSON
// ═══════════════════════════════════════════════════════════════════════════════

/// Serialize a script value the way `JSON.stringify` would see it:
/// `undefined`, functions and non-finite numbers become `null`, objects
/// contribute their enumerable properties.
pub fn to_json(interp: &mut Interpreter, value: &JsValue) -> Result<serde_json::Value, JsError> {
    let mut visiting = Vec::new();
    to_json_inner(interp, value, &mut visiting)
}

fn to_json_inner(
    interp: &mut Interpreter,
    value: &JsValue,
    visiting: &mut Vec<ObjectRef>,
) -> Result<serde_json::Value, JsError> {
    Ok(match value {
        JsValue::Undefined | JsValue::Null => serde_json::Value::Null,
        JsValue::Boolean(b) => serde_json::Value::Bool(*b),
        JsValue::Int(i) => serde_json::Value::from(*i),
        JsValue::Number(n) => number_to_json(*n),
        JsValue::String(s) => serde_json::Value::String(s.to_string()),
        JsValue::Object(obj) => {
            if visiting.contains(obj) {
                return Err(JsError::type_error("Converting circular structure to JSON"));
            }
            visiting.push(*obj);
            let result = object_to_json(interp, *obj, visiting);
            visiting.pop();
            result?
        }
    })
}

fn number_to_json(n: f64) -> serde_json::Value {
    if !n.is_finite() {
        return serde_json::Value::Null;
    }
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

fn object_to_json(
    interp: &mut Interpreter,
    obj: ObjectRef,
    visiting: &mut Vec<ObjectRef>,
) -> Result<serde_json::Value, JsError> {
    let is_array = match &interp.object(obj)?.exotic {
        ExoticObject::Function(_) => return Ok(serde_json::Value::Null),
        ExoticObject::Boolean(b) => return Ok(serde_json::Value::Bool(*b)),
        ExoticObject::Number(n) => return Ok(number_to_json(*n)),
        ExoticObject::String(s) => return Ok(serde_json::Value::String(s.to_string())),
        ExoticObject::Array(_) => true,
        _ => false,
    };
    if is_array {
        let length = interp.length_of(obj)?;
        let mut items = Vec::with_capacity(length as usize);
        for index in 0..length {
            let element = interp.get_property(obj, &PropertyKey::Index(index))?;
            items.push(to_json_inner(interp, &element, visiting)?);
        }
        return Ok(serde_json::Value::Array(items));
    }

    let mut map = serde_json::Map::new();
    for name in interp.enumerable_names(obj)? {
        let value = interp.get_property(obj, &PropertyKey::from(name.clone()))?;
        if value.is_undefined() || interp.is_callable(&value) {
            continue;
        }
        map.insert(name.to_string(), to_json_inner(interp, &value, visiting)?);
    }
    Ok(serde_json::Value::Object(map))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Object helpers
// ═══════════════════════════════════════════════════════════════════════════════

pub fn get_property(
    interp: &mut Interpreter,
    obj: &JsValue,
    name: &str,
) -> Result<JsValue, JsError> {
    interp.get_value_property(obj, &PropertyKey::from(name))
}

pub fn set_property(
    interp: &mut Interpreter,
    obj: &JsValue,
    name: &str,
    value: JsValue,
) -> Result<(), JsError> {
    let key = PropertyKey::from(interp.intern(name));
    interp.put_value_property(obj, key, value)
}

/// `obj[name](...args)` with `obj` as `this`
pub fn call_method(
    interp: &mut Interpreter,
    obj: &JsValue,
    name: &str,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let method = get_property(interp, obj, name)?;
    if !interp.is_callable(&method) {
        return Err(JsError::type_error(format!(
            "{}.{} is not a function",
            interp.describe_value(obj),
            name
        )));
    }
    interp.call_function(&method, obj.clone(), args)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_survives_a_trip_through_the_heap() {
        let mut interp = Interpreter::new();
        let input = json!({"name": "a", "list": [1, 2.5, null, true], "nested": {"x": -3}});
        let value = from_json(&mut interp, &input);
        assert_eq!(to_json(&mut interp, &value).unwrap(), input);
    }

    #[test]
    fn non_json_values_become_null() {
        let mut interp = Interpreter::new();
        assert_eq!(to_json(&mut interp, &JsValue::Undefined).unwrap(), json!(null));
        assert_eq!(to_json(&mut interp, &JsValue::Number(f64::NAN)).unwrap(), json!(null));
        let value = interp.eval("({f: function () {}, u: undefined, n: 1})", None).unwrap();
        assert_eq!(to_json(&mut interp, &value).unwrap(), json!({"n": 1}));
    }

    #[test]
    fn cycles_are_rejected() {
        let mut interp = Interpreter::new();
        let value = interp.eval("var o = {}; o.self = o; o", None).unwrap();
        let err = to_json(&mut interp, &value).unwrap_err();
        assert!(err.to_string().contains("circular"));
    }

    #[test]
    fn methods_are_called_with_receiver() {
        let mut interp = Interpreter::new();
        let list = from_json(&mut interp, &json!([3, 1, 2]));
        call_method(&mut interp, &list, "sort", &[]).unwrap();
        let joined = call_method(&mut interp, &list, "join", &[JsValue::from("-")]).unwrap();
        assert_eq!(joined.to_string(), "1-2-3");
    }
}
