//! Error and the native error constructors

use super::install_constructor;
use crate::error::JsError;
use crate::gc::ObjectRef;
use crate::interpreter::Interpreter;
use crate::object::{JsObject, NativeFn, PropertyAttributes};
use crate::value::{JsString, JsValue, PropertyKey};

pub fn init_error(interp: &mut Interpreter) {
    let base = interp.realm.error_prototype;
    init_error_prototype(interp, base, "Error");
    interp.register_method(base, "toString", error_to_string, 0);
    install_constructor(interp, "Error", error_constructor, error_constructor, 1, base);

    let natives: [(&'static str, NativeFn); 5] = [
        ("TypeError", type_error_constructor),
        ("ReferenceError", reference_error_constructor),
        ("RangeError", range_error_constructor),
        ("SyntaxError", syntax_error_constructor),
        ("EvalError", eval_error_constructor),
    ];
    for (name, constructor) in natives {
        let proto = interp.alloc(JsObject::ordinary(Some(base)));
        init_error_prototype(interp, proto, name);
        interp.realm.native_error_prototypes.insert(name, proto);
        install_constructor(interp, name, constructor, constructor, 1, proto);
    }
}

fn init_error_prototype(interp: &mut Interpreter, proto: ObjectRef, name: &str) {
    let name_value = JsValue::String(interp.intern(name));
    interp.register_value(proto, "name", name_value, PropertyAttributes::DONT_ENUM);
    interp.register_value(
        proto,
        "message",
        JsValue::String(JsString::from("")),
        PropertyAttributes::DONT_ENUM,
    );
}

/// `Error(message)` and `new Error(message)` behave the same
fn construct_named(
    interp: &mut Interpreter,
    name: &str,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let message = match args.first() {
        None | Some(JsValue::Undefined) => String::new(),
        Some(value) => interp.to_string(value)?.to_string(),
    };
    Ok(JsValue::Object(interp.create_error(name, &message)))
}

macro_rules! error_constructors {
    ($($fn_name:ident => $name:literal),* $(,)?) => {
        $(
            pub fn $fn_name(
                interp: &mut Interpreter,
                _this: JsValue,
                args: &[JsValue],
            ) -> Result<JsValue, JsError> {
                construct_named(interp, $name, args)
            }
        )*
    };
}

error_constructors! {
    error_constructor => "Error",
    type_error_constructor => "TypeError",
    reference_error_constructor => "ReferenceError",
    range_error_constructor => "RangeError",
    syntax_error_constructor => "SyntaxError",
    eval_error_constructor => "EvalError",
}

/// `name: message`, or just the name when the message is empty
pub fn error_to_string(
    interp: &mut Interpreter,
    this: JsValue,
    _args: &[JsValue],
) -> Result<JsValue, JsError> {
    let obj = this
        .as_object()
        .ok_or_else(|| JsError::type_error("Error.prototype.toString called on a non-object"))?;
    let name = match interp.get_property(obj, &PropertyKey::from("name"))? {
        JsValue::Undefined => JsString::from("Error"),
        value => interp.to_string(&value)?,
    };
    let message = match interp.get_property(obj, &PropertyKey::from("message"))? {
        JsValue::Undefined => JsString::from(""),
        value => interp.to_string(&value)?,
    };
    let text = if message.is_empty() {
        name
    } else if name.is_empty() {
        message
    } else {
        JsString::from(format!("{}: {}", name, message))
    };
    Ok(JsValue::String(text))
}
