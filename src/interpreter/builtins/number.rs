//! Number constructor and Number.prototype

use super::{install_constructor, this_primitive};
use crate::error::JsError;
use crate::interpreter::Interpreter;
use crate::interpreter::operations::number_to_radix_string;
use crate::object::{ExoticObject, JsObject, PropertyAttributes};
use crate::value::{JsString, JsValue, number_to_string};

pub fn init_number(interp: &mut Interpreter) {
    let proto = interp.realm.number_prototype;

    interp.register_method(proto, "toString", number_to_string_method, 1);
    interp.register_method(proto, "toLocaleString", number_to_locale_string, 0);
    interp.register_method(proto, "valueOf", number_value_of, 0);
    interp.register_method(proto, "toFixed", number_to_fixed, 1);

    let constructor = install_constructor(
        interp,
        "Number",
        number_constructor_fn,
        number_construct_fn,
        1,
        proto,
    );

    for (name, value) in [
        ("MAX_VALUE", f64::MAX),
        ("MIN_VALUE", f64::from_bits(1)),
        ("NaN", f64::NAN),
        ("POSITIVE_INFINITY", f64::INFINITY),
        ("NEGATIVE_INFINITY", f64::NEG_INFINITY),
    ] {
        interp.register_value(
            constructor,
            name,
            JsValue::Number(value),
            PropertyAttributes::FROZEN,
        );
    }
}

fn argument_number(interp: &mut Interpreter, args: &[JsValue]) -> Result<f64, JsError> {
    match args.first() {
        Some(value) => interp.to_number(value),
        None => Ok(0.0),
    }
}

/// `Number(value)` converts
pub fn number_constructor_fn(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    Ok(JsValue::number(argument_number(interp, args)?))
}

/// `new Number(value)` wraps
pub fn number_construct_fn(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let value = argument_number(interp, args)?;
    let proto = interp.realm.number_prototype;
    Ok(JsValue::Object(interp.alloc(JsObject::new(
        Some(proto),
        ExoticObject::Number(value),
    ))))
}

fn this_number(interp: &Interpreter, this: &JsValue) -> Result<f64, JsError> {
    let value = this_primitive(interp, this, "Number")?;
    Ok(value.primitive_to_number())
}

pub fn number_value_of(
    interp: &mut Interpreter,
    this: JsValue,
    _args: &[JsValue],
) -> Result<JsValue, JsError> {
    Ok(JsValue::number(this_number(interp, &this)?))
}

/// `toString(radix)`, radix 2 through 36
pub fn number_to_string_method(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let n = this_number(interp, &this)?;
    let radix = match args.first() {
        None | Some(JsValue::Undefined) => 10.0,
        Some(value) => interp.to_number(value)?.trunc(),
    };
    if !(2.0..=36.0).contains(&radix) {
        return Err(JsError::range_error(
            "toString() radix must be between 2 and 36",
        ));
    }
    Ok(JsValue::String(JsString::from(number_to_radix_string(
        n,
        radix as u32,
    ))))
}

pub fn number_to_locale_string(
    interp: &mut Interpreter,
    this: JsValue,
    _args: &[JsValue],
) -> Result<JsValue, JsError> {
    let n = this_number(interp, &this)?;
    Ok(JsValue::String(JsString::from(number_to_string(n))))
}

/// `toFixed(digits)`, digits 0 through 20
pub fn number_to_fixed(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let n = this_number(interp, &this)?;
    let digits = match args.first() {
        Some(value) => interp.to_number(value)?.trunc(),
        None => 0.0,
    };
    let digits = if digits.is_nan() { 0.0 } else { digits };
    if !(0.0..=20.0).contains(&digits) {
        return Err(JsError::range_error(
            "toFixed() digits argument must be between 0 and 20",
        ));
    }
    if !n.is_finite() || n.abs() >= 1e21 {
        return Ok(JsValue::String(JsString::from(number_to_string(n))));
    }
    Ok(JsValue::String(JsString::from(fixed_notation(n, digits as usize))))
}

/// Fixed-point text of `n` with ties rounded away from zero.
///
/// Works on the exact decimal expansion of the double (at most 1074
/// fractional digits) so that `2.5` and `0.125` round up where the
/// formatter would pick the even neighbour.
pub(crate) fn fixed_notation(n: f64, digits: usize) -> String {
    let exact = format!("{:.1074}", n.abs());
    let (integer, fraction) = exact.split_once('.').unwrap_or((exact.as_str(), ""));
    let kept = fraction.get(..digits).unwrap_or(fraction);
    let round_up = fraction
        .get(digits..)
        .and_then(|rest| rest.bytes().next())
        .is_some_and(|first| first >= b'5');

    let mut decimal: Vec<u8> = integer.bytes().chain(kept.bytes()).collect();
    if round_up {
        let mut carry = true;
        for digit in decimal.iter_mut().rev() {
            if *digit == b'9' {
                *digit = b'0';
            } else {
                *digit += 1;
                carry = false;
                break;
            }
        }
        if carry {
            decimal.insert(0, b'1');
        }
    }

    let split = decimal.len().saturating_sub(digits);
    let mut out = String::with_capacity(decimal.len() + 2);
    if n < 0.0 {
        out.push('-');
    }
    out.extend(decimal.iter().take(split).map(|&b| char::from(b)));
    if digits > 0 {
        out.push('.');
        out.extend(decimal.iter().skip(split).map(|&b| char::from(b)));
    }
    out
}
