//! Built-in objects of the global environment

pub mod array;
pub mod boolean;
pub mod error;
pub mod function;
pub mod global;
pub mod math;
pub mod number;
pub mod object;
pub mod regexp;
pub mod string;

use crate::error::JsError;
use crate::gc::ObjectRef;
use crate::interpreter::Interpreter;
use crate::object::{ExoticObject, NativeFn, PropertyAttributes};
use crate::value::{CheapClone, JsValue};

/// Populate the realm. Runs once, before any code is compiled, so every
/// built-in global is a plain property of the global object.
pub(crate) fn init(interp: &mut Interpreter) {
    object::init_object(interp);
    function::init_function(interp);
    array::init_array(interp);
    string::init_string(interp);
    number::init_number(interp);
    boolean::init_boolean(interp);
    error::init_error(interp);
    regexp::init_regexp(interp);
    math::init_math(interp);
    global::init_global(interp);
}

/// Argument `index`, `undefined` when missing
#[inline]
pub(crate) fn arg(args: &[JsValue], index: usize) -> JsValue {
    args.get(index).map(CheapClone::cheap_clone).unwrap_or_default()
}

/// Create a global constructor wired to `prototype`
pub(crate) fn install_constructor(
    interp: &mut Interpreter,
    name: &str,
    call: NativeFn,
    construct: NativeFn,
    arity: u32,
    prototype: ObjectRef,
) -> ObjectRef {
    let constructor = interp.create_native_function(name, call, Some(construct), arity);
    interp.register_value(
        constructor,
        "prototype",
        JsValue::Object(prototype),
        PropertyAttributes::FROZEN,
    );
    interp.register_value(
        prototype,
        "constructor",
        JsValue::Object(constructor),
        PropertyAttributes::DONT_ENUM,
    );
    let global = interp.global_object();
    interp.register_value(
        global,
        name,
        JsValue::Object(constructor),
        PropertyAttributes::DONT_ENUM,
    );
    constructor
}

/// The primitive inside a wrapper object (or the primitive itself) for
/// `valueOf`-style methods that only accept their own kind
pub(crate) fn this_primitive(
    interp: &Interpreter,
    this: &JsValue,
    class: &str,
) -> Result<JsValue, JsError> {
    let wrong_receiver = || {
        JsError::type_error(format!(
            "{}.prototype method called on incompatible receiver",
            class
        ))
    };
    match this {
        JsValue::Object(obj) => match (&interp.heap.get(*obj)?.exotic, class) {
            (ExoticObject::Boolean(b), "Boolean") => Ok(JsValue::Boolean(*b)),
            (ExoticObject::Number(n), "Number") => Ok(JsValue::number(*n)),
            (ExoticObject::String(s), "String") => Ok(JsValue::String(s.cheap_clone())),
            _ => Err(wrong_receiver()),
        },
        JsValue::Boolean(_) if class == "Boolean" => Ok(this.cheap_clone()),
        JsValue::Int(_) | JsValue::Number(_) if class == "Number" => Ok(this.cheap_clone()),
        JsValue::String(_) if class == "String" => Ok(this.cheap_clone()),
        _ => Err(wrong_receiver()),
    }
}
