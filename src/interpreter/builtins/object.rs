//! Object constructor and Object.prototype

use super::{arg, install_constructor};
use crate::error::JsError;
use crate::interpreter::Interpreter;
use crate::value::{JsString, JsValue};

pub fn init_object(interp: &mut Interpreter) {
    let proto = interp.realm.object_prototype;

    interp.register_method(proto, "toString", object_to_string, 0);
    interp.register_method(proto, "toLocaleString", object_to_string, 0);
    interp.register_method(proto, "valueOf", object_value_of, 0);
    interp.register_method(proto, "hasOwnProperty", object_has_own_property, 1);
    interp.register_method(proto, "isPrototypeOf", object_is_prototype_of, 1);
    interp.register_method(proto, "propertyIsEnumerable", object_property_is_enumerable, 1);

    install_constructor(interp, "Object", object_constructor_fn, object_constructor_fn, 1, proto);
}

/// `Object(value)` and `new Object(value)`
pub fn object_constructor_fn(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let value = arg(args, 0);
    if value.is_null_or_undefined() {
        return Ok(JsValue::Object(interp.create_object()));
    }
    Ok(JsValue::Object(interp.to_object(&value)?))
}

pub fn object_to_string(
    interp: &mut Interpreter,
    this: JsValue,
    _args: &[JsValue],
) -> Result<JsValue, JsError> {
    let class = match &this {
        JsValue::Undefined => "Undefined",
        JsValue::Null => "Null",
        other => {
            let obj = interp.to_object(other)?;
            interp.heap.get(obj)?.class_name()
        }
    };
    Ok(JsValue::String(JsString::from(format!("[object {}]", class))))
}

pub fn object_value_of(
    interp: &mut Interpreter,
    this: JsValue,
    _args: &[JsValue],
) -> Result<JsValue, JsError> {
    Ok(JsValue::Object(interp.to_object(&this)?))
}

pub fn object_has_own_property(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let key = interp.to_property_key(&arg(args, 0))?;
    let obj = interp.to_object(&this)?;
    Ok(JsValue::Boolean(interp.has_own_property(obj, &key)?))
}

pub fn object_is_prototype_of(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let JsValue::Object(mut current) = arg(args, 0) else {
        return Ok(JsValue::Boolean(false));
    };
    let proto = interp.to_object(&this)?;
    while let Some(next) = interp.heap.get(current)?.prototype {
        if next == proto {
            return Ok(JsValue::Boolean(true));
        }
        current = next;
    }
    Ok(JsValue::Boolean(false))
}

pub fn object_property_is_enumerable(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let key = interp.to_property_key(&arg(args, 0))?;
    let obj = interp.to_object(&this)?;
    if obj == interp.realm.global_object
        && interp.realm.global_symbols.get(key.to_js_string().as_str()).is_some()
    {
        return Ok(JsValue::Boolean(true));
    }
    let enumerable = interp
        .heap
        .get(obj)?
        .get_own_property(&key)
        .is_some_and(|(_, attributes)| attributes.enumerable());
    Ok(JsValue::Boolean(enumerable))
}
