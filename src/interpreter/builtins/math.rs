//! The Math object

use std::cell::Cell;

use super::arg;
use crate::error::JsError;
use crate::interpreter::Interpreter;
use crate::object::{JsObject, PropertyAttributes};
use crate::value::JsValue;

pub fn init_math(interp: &mut Interpreter) {
    let proto = interp.realm.object_prototype;
    let math = interp.alloc(JsObject::ordinary(Some(proto)));

    // Constants
    for (name, value) in [
        ("E", std::f64::consts::E),
        ("LN10", std::f64::consts::LN_10),
        ("LN2", std::f64::consts::LN_2),
        ("LOG2E", std::f64::consts::LOG2_E),
        ("LOG10E", std::f64::consts::LOG10_E),
        ("PI", std::f64::consts::PI),
        ("SQRT1_2", std::f64::consts::FRAC_1_SQRT_2),
        ("SQRT2", std::f64::consts::SQRT_2),
    ] {
        interp.register_value(math, name, JsValue::Number(value), PropertyAttributes::FROZEN);
    }

    interp.register_method(math, "abs", math_abs, 1);
    interp.register_method(math, "floor", math_floor, 1);
    interp.register_method(math, "ceil", math_ceil, 1);
    interp.register_method(math, "round", math_round, 1);
    interp.register_method(math, "min", math_min, 2);
    interp.register_method(math, "max", math_max, 2);
    interp.register_method(math, "pow", math_pow, 2);
    interp.register_method(math, "sqrt", math_sqrt, 1);
    interp.register_method(math, "log", math_log, 1);
    interp.register_method(math, "exp", math_exp, 1);
    interp.register_method(math, "sin", math_sin, 1);
    interp.register_method(math, "cos", math_cos, 1);
    interp.register_method(math, "tan", math_tan, 1);
    interp.register_method(math, "asin", math_asin, 1);
    interp.register_method(math, "acos", math_acos, 1);
    interp.register_method(math, "atan", math_atan, 1);
    interp.register_method(math, "atan2", math_atan2, 2);
    interp.register_method(math, "random", math_random, 0);

    let global = interp.global_object();
    interp.register_value(global, "Math", JsValue::Object(math), PropertyAttributes::DONT_ENUM);
}

fn number_arg(interp: &mut Interpreter, args: &[JsValue], index: usize) -> Result<f64, JsError> {
    match args.get(index) {
        Some(value) => interp.to_number(value),
        None => Ok(f64::NAN),
    }
}

macro_rules! unary_math {
    ($($name:ident => $op:expr),* $(,)?) => {
        $(
            pub fn $name(
                interp: &mut Interpreter,
                _this: JsValue,
                args: &[JsValue],
            ) -> Result<JsValue, JsError> {
                let n = number_arg(interp, args, 0)?;
                let op: fn(f64) -> f64 = $op;
                Ok(JsValue::number(op(n)))
            }
        )*
    };
}

unary_math! {
    math_abs => f64::abs,
    math_floor => f64::floor,
    math_ceil => f64::ceil,
    math_sqrt => f64::sqrt,
    math_log => f64::ln,
    math_exp => f64::exp,
    math_sin => f64::sin,
    math_cos => f64::cos,
    math_tan => f64::tan,
    math_asin => f64::asin,
    math_acos => f64::acos,
    math_atan => f64::atan,
}

/// Halves round towards +Infinity; -0.5..-0 gives -0
pub fn math_round(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let n = number_arg(interp, args, 0)?;
    if !n.is_finite() || n == n.trunc() {
        return Ok(JsValue::number(n));
    }
    if (-0.5..0.0).contains(&n) {
        return Ok(JsValue::Number(-0.0));
    }
    Ok(JsValue::number((n + 0.5).floor()))
}

pub fn math_min(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let mut result = f64::INFINITY;
    for value in args {
        let n = interp.to_number(value)?;
        if n.is_nan() {
            result = f64::NAN;
        } else if !result.is_nan() && (n < result || (n == 0.0 && n.is_sign_negative())) {
            result = n;
        }
    }
    Ok(JsValue::number(result))
}

pub fn math_max(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let mut result = f64::NEG_INFINITY;
    for value in args {
        let n = interp.to_number(value)?;
        if n.is_nan() {
            result = f64::NAN;
        } else if !result.is_nan()
            && (n > result || (n == 0.0 && result == 0.0 && n.is_sign_positive()))
        {
            result = n;
        }
    }
    Ok(JsValue::number(result))
}

pub fn math_pow(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let base = number_arg(interp, args, 0)?;
    let exponent = number_arg(interp, args, 1)?;
    // 1 ** NaN and (-1) ** Infinity are NaN, unlike powf
    if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
        return Ok(JsValue::Number(f64::NAN));
    }
    Ok(JsValue::number(base.powf(exponent)))
}

pub fn math_atan2(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let y = number_arg(interp, args, 0)?;
    let x = interp.to_number(&arg(args, 1))?;
    Ok(JsValue::number(y.atan2(x)))
}

thread_local! {
    static RANDOM_STATE: Cell<u64> = Cell::new(seed());
}

fn seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos() as u64);
    nanos | 1
}

/// xorshift64*, uniform in `[0, 1)`
pub fn math_random(
    _interp: &mut Interpreter,
    _this: JsValue,
    _args: &[JsValue],
) -> Result<JsValue, JsError> {
    let bits = RANDOM_STATE.with(|state| {
        let mut x = state.get();
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        state.set(x);
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    });
    Ok(JsValue::Number((bits >> 11) as f64 / (1u64 << 53) as f64))
}
