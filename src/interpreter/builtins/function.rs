//! Function constructor and Function.prototype

use super::{arg, install_constructor};
use crate::error::JsError;
use crate::interpreter::Interpreter;
use crate::object::{ExoticObject, FunctionKind};
use crate::value::{JsString, JsValue, PropertyKey};

pub fn init_function(interp: &mut Interpreter) {
    let proto = interp.realm.function_prototype;

    interp.register_method(proto, "call", function_call, 1);
    interp.register_method(proto, "apply", function_apply, 2);
    interp.register_method(proto, "toString", function_to_string, 0);

    install_constructor(
        interp,
        "Function",
        function_constructor_fn,
        function_constructor_fn,
        1,
        proto,
    );
}

/// `Function(p1, ..., body)` compiles a global function expression
pub fn function_constructor_fn(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let (body, params) = match args.split_last() {
        Some((body, params)) => (interp.to_string(body)?, params),
        None => (JsString::from(""), args),
    };
    let mut names = Vec::with_capacity(params.len());
    for param in params {
        names.push(interp.to_string(param)?.to_string());
    }
    let source = format!("(function anonymous({}) {{\n{}\n}})", names.join(","), body);
    interp.eval(&source, None)
}

/// `f.call(thisArg, ...args)`
pub fn function_call(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let rest = args.get(1..).unwrap_or(&[]);
    interp.call_function(&this, arg(args, 0), rest)
}

/// `f.apply(thisArg, argArray)`
pub fn function_apply(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let call_args = match arg(args, 1) {
        JsValue::Undefined | JsValue::Null => Vec::new(),
        JsValue::Object(list) => {
            let length = interp.length_of(list)?;
            let mut values = Vec::with_capacity(length as usize);
            for index in 0..length {
                values.push(interp.get_property(list, &PropertyKey::Index(index))?);
            }
            values
        }
        _ => {
            return Err(JsError::type_error(
                "second argument to Function.prototype.apply must be an array",
            ));
        }
    };
    interp.call_function(&this, arg(args, 0), &call_args)
}

pub fn function_to_string(
    interp: &mut Interpreter,
    this: JsValue,
    _args: &[JsValue],
) -> Result<JsValue, JsError> {
    let not_a_function =
        || JsError::type_error("Function.prototype.toString called on a non-function");
    let obj = this.as_object().ok_or_else(not_a_function)?;
    let text = match &interp.heap.get(obj)?.exotic {
        ExoticObject::Function(FunctionKind::Script { code, .. }) => code.source_text().to_string(),
        ExoticObject::Function(FunctionKind::Native { name, .. }) => {
            format!("function {}() {{\n    [native code]\n}}", name)
        }
        _ => return Err(not_a_function()),
    };
    Ok(JsValue::String(JsString::from(text)))
}
