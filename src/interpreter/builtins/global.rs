//! Global functions and value properties (eval, parseInt, parseFloat, isNaN, isFinite)

use super::arg;
use crate::error::JsError;
use crate::interpreter::{Interpreter, ScopeChain};
use crate::object::PropertyAttributes;
use crate::value::{JsValue, is_js_whitespace};

pub fn init_global(interp: &mut Interpreter) {
    let global = interp.global_object();

    let eval = interp.create_native_function("eval", global_eval, None, 1);
    interp.register_value(global, "eval", JsValue::Object(eval), PropertyAttributes::DONT_ENUM);
    interp.realm.eval_function = Some(eval);

    interp.register_method(global, "parseInt", global_parse_int, 2);
    interp.register_method(global, "parseFloat", global_parse_float, 1);
    interp.register_method(global, "isNaN", global_is_nan, 1);
    interp.register_method(global, "isFinite", global_is_finite, 1);

    let constant = PropertyAttributes::DONT_ENUM.union(PropertyAttributes::DONT_DELETE);
    interp.register_value(global, "NaN", JsValue::Number(f64::NAN), constant);
    interp.register_value(global, "Infinity", JsValue::Number(f64::INFINITY), constant);
    interp.register_value(global, "undefined", JsValue::Undefined, constant);
}

/// Indirect eval: string arguments run as global code with the global
/// object as `this`. Direct calls never get here; `CallEval` handles them.
pub fn global_eval(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    match arg(args, 0) {
        JsValue::String(text) => {
            let global = interp.global_object();
            interp.execute_eval(&text, ScopeChain::single(global), JsValue::Object(global))
        }
        other => Ok(other),
    }
}

pub fn global_parse_int(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let string = interp.to_string(&arg(args, 0))?;
    let radix = match args.get(1) {
        Some(value) => interp.to_int32(value)?,
        None => 0,
    };
    Ok(JsValue::number(parse_int(string.as_str(), radix)))
}

pub(crate) fn parse_int(text: &str, radix: i32) -> f64 {
    let s = text.trim_start_matches(is_js_whitespace);
    let (negative, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };

    let hex_digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"));
    let (radix, s) = match (radix, hex_digits) {
        (0 | 16, Some(rest)) => (16, rest),
        (0, None) => (10, s),
        (r, _) if (2..=36).contains(&r) => (r as u32, s),
        _ => return f64::NAN,
    };

    let mut result = 0.0f64;
    let mut found_digit = false;
    for c in s.chars() {
        let Some(digit) = c.to_digit(radix) else {
            break;
        };
        found_digit = true;
        result = result * f64::from(radix) + f64::from(digit);
    }
    if !found_digit {
        return f64::NAN;
    }
    if negative { -result } else { result }
}

pub fn global_parse_float(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let string = interp.to_string(&arg(args, 0))?;
    Ok(JsValue::number(parse_float(string.as_str())))
}

/// Longest prefix that is a decimal literal
pub(crate) fn parse_float(text: &str) -> f64 {
    let s = text.trim_start_matches(is_js_whitespace);
    let unsigned = s.strip_prefix(['+', '-']).unwrap_or(s);
    if unsigned.starts_with("Infinity") {
        return if s.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    let bytes = s.as_bytes();
    let mut end = s.len() - unsigned.len();
    let mut digits = 0usize;
    let mut seen_dot = false;
    while let Some(&b) = bytes.get(end) {
        match b {
            b'0'..=b'9' => digits += 1,
            b'.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end += 1;
    }
    if digits == 0 {
        return f64::NAN;
    }

    // An exponent only counts when at least one digit follows it
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_start = exp_end;
        while matches!(bytes.get(exp_end), Some(b'0'..=b'9')) {
            exp_end += 1;
        }
        if exp_end > exp_start {
            end = exp_end;
        }
    }

    s.get(..end)
        .and_then(|prefix| prefix.parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

pub fn global_is_nan(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let n = interp.to_number(&arg(args, 0))?;
    Ok(JsValue::Boolean(n.is_nan()))
}

pub fn global_is_finite(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let n = interp.to_number(&arg(args, 0))?;
    Ok(JsValue::Boolean(n.is_finite()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_int_prefixes() {
        assert_eq!(parse_int("  42px", 0), 42.0);
        assert_eq!(parse_int("0x1F", 0), 31.0);
        assert_eq!(parse_int("-0x10", 16), -16.0);
        assert_eq!(parse_int("101", 2), 5.0);
        assert!(parse_int("z", 10).is_nan());
        assert!(parse_int("1", 37).is_nan());
    }

    #[test]
    fn parse_float_prefixes() {
        assert_eq!(parse_float("3.25abc"), 3.25);
        assert_eq!(parse_float("  -.5"), -0.5);
        assert_eq!(parse_float("1e3x"), 1000.0);
        assert_eq!(parse_float("2e"), 2.0);
        assert_eq!(parse_float("-Infinityx"), f64::NEG_INFINITY);
        assert!(parse_float(".").is_nan());
        assert!(parse_float("abc").is_nan());
    }
}
