//! Boolean constructor and Boolean.prototype

use super::{install_constructor, this_primitive};
use crate::error::JsError;
use crate::interpreter::Interpreter;
use crate::object::{ExoticObject, JsObject};
use crate::value::{JsString, JsValue};

pub fn init_boolean(interp: &mut Interpreter) {
    let proto = interp.realm.boolean_prototype;

    interp.register_method(proto, "toString", boolean_to_string, 0);
    interp.register_method(proto, "valueOf", boolean_value_of, 0);

    install_constructor(
        interp,
        "Boolean",
        boolean_constructor_fn,
        boolean_construct_fn,
        1,
        proto,
    );
}

pub fn boolean_constructor_fn(
    _interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    Ok(JsValue::Boolean(
        args.first().is_some_and(JsValue::to_boolean),
    ))
}

pub fn boolean_construct_fn(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let value = args.first().is_some_and(JsValue::to_boolean);
    let proto = interp.realm.boolean_prototype;
    Ok(JsValue::Object(interp.alloc(JsObject::new(
        Some(proto),
        ExoticObject::Boolean(value),
    ))))
}

pub fn boolean_to_string(
    interp: &mut Interpreter,
    this: JsValue,
    _args: &[JsValue],
) -> Result<JsValue, JsError> {
    let value = this_primitive(interp, &this, "Boolean")?;
    let text = if value.to_boolean() { "true" } else { "false" };
    Ok(JsValue::String(JsString::from(text)))
}

pub fn boolean_value_of(
    interp: &mut Interpreter,
    this: JsValue,
    _args: &[JsValue],
) -> Result<JsValue, JsError> {
    this_primitive(interp, &this, "Boolean")
}
