//! Abstract numeric conversions.
//!
//! The integer coercions used by array lengths and typed array element
//! codecs, plus `Number::toString` formatting used to turn numeric keys
//! into property names.

use crate::error::{VmError, VmResult};
use crate::value::Value;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

const TWO_POW_32: f64 = 4_294_967_296.0;

/// ToIntegerOrInfinity
pub fn to_integer_or_infinity(n: f64) -> f64 {
    if n.is_nan() || n == 0.0 {
        return 0.0;
    }
    n.trunc()
}

/// ToLength
pub fn to_length(n: f64) -> u64 {
    let n = to_integer_or_infinity(n);
    if n <= 0.0 {
        0
    } else {
        n.min(9_007_199_254_740_991.0) as u64
    }
}

/// ToUint32
pub fn to_uint32(n: f64) -> u32 {
    if !n.is_finite() || n == 0.0 {
        return 0;
    }
    n.trunc().rem_euclid(TWO_POW_32) as u32
}

/// ToInt32
pub fn to_int32(n: f64) -> i32 {
    to_uint32(n) as i32
}

/// ToUint16
pub fn to_uint16(n: f64) -> u16 {
    to_uint32(n) as u16
}

/// ToInt16
pub fn to_int16(n: f64) -> i16 {
    to_uint32(n) as u16 as i16
}

/// ToUint8
pub fn to_uint8(n: f64) -> u8 {
    to_uint32(n) as u8
}

/// ToInt8
pub fn to_int8(n: f64) -> i8 {
    to_uint32(n) as u8 as i8
}

/// ToUint8Clamp: clamp to 0..=255, ties round to even
pub fn to_uint8_clamp(n: f64) -> u8 {
    if n.is_nan() || n <= 0.0 {
        return 0;
    }
    if n >= 255.0 {
        return 255;
    }
    n.round_ties_even() as u8
}

/// BigInt modulo 2^64, as two's complement `i64`
pub fn to_bigint64(value: &BigInt) -> i64 {
    to_biguint64(value) as i64
}

/// BigInt modulo 2^64
pub fn to_biguint64(value: &BigInt) -> u64 {
    let modulus = BigInt::from(1u128 << 64);
    let wrapped = ((value % &modulus) + &modulus) % &modulus;
    wrapped.to_u64().unwrap_or(0)
}

/// StringToNumber
pub fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}');
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    let radix = match trimmed.get(..2) {
        Some("0x" | "0X") => 16,
        Some("0o" | "0O") => 8,
        Some("0b" | "0B") => 2,
        _ => 10,
    };
    if radix != 10 {
        let digits = &trimmed[2..];
        if digits.is_empty() {
            return f64::NAN;
        }
        return digits.chars().try_fold(0.0f64, |acc, c| {
            c.to_digit(radix).map(|d| acc * radix as f64 + d as f64)
        })
        .unwrap_or(f64::NAN);
    }
    if !trimmed
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'))
    {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// ToNumber for primitives. Objects need a context and are rejected here.
pub fn to_number_primitive(value: &Value) -> VmResult<f64> {
    match value {
        Value::Undefined => Ok(f64::NAN),
        Value::Null => Ok(0.0),
        Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Int32(n) => Ok(*n as f64),
        Value::Number(n) => Ok(*n),
        Value::String(s) => Ok(string_to_number(s.as_str())),
        Value::Symbol(_) => Err(VmError::type_error(
            "Cannot convert a Symbol value to a number",
        )),
        Value::BigInt(_) => Err(VmError::type_error(
            "Cannot convert a BigInt value to a number",
        )),
        Value::Object(_) | Value::Foreign(_) => Err(VmError::type_error(
            "Cannot convert object to primitive value",
        )),
    }
}

/// ToBigInt for primitives
pub fn to_bigint_primitive(value: &Value) -> VmResult<BigInt> {
    match value {
        Value::BigInt(b) => Ok((**b).clone()),
        Value::Boolean(b) => Ok(BigInt::from(*b as u8)),
        Value::String(s) => {
            let trimmed = s.as_str().trim();
            if trimmed.is_empty() {
                return Ok(BigInt::from(0));
            }
            trimmed.parse::<BigInt>().map_err(|_| {
                VmError::exception(Value::string(&format!(
                    "SyntaxError: Cannot convert {trimmed} to a BigInt"
                )))
            })
        }
        Value::Int32(_) | Value::Number(_) => Err(VmError::type_error(
            "Cannot convert a Number value to a BigInt",
        )),
        Value::Undefined | Value::Null => Err(VmError::type_error(format!(
            "Cannot convert {:?} to a BigInt",
            value
        ))),
        Value::Symbol(_) => Err(VmError::type_error(
            "Cannot convert a Symbol value to a BigInt",
        )),
        Value::Object(_) | Value::Foreign(_) => Err(VmError::type_error(
            "Cannot convert object to primitive value",
        )),
    }
}

/// Number::toString(10)
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n < 0.0 {
        return format!("-{}", number_to_string(-n));
    }
    if n.fract() == 0.0 && n < 9_007_199_254_740_992.0 {
        let mut buf = itoa::Buffer::new();
        return buf.format(n as u64).to_string();
    }

    let mut buf = ryu::Buffer::new();
    let shortest = buf.format_finite(n);
    let (mantissa, exponent) = match shortest.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (shortest, 0),
    };
    let point = mantissa.find('.').unwrap_or(mantissa.len()) as i32;
    let mut digits: Vec<u8> = mantissa.bytes().filter(|b| *b != b'.').collect();
    let leading = digits.iter().take_while(|b| **b == b'0').count();
    digits.drain(..leading);
    while digits.last() == Some(&b'0') {
        digits.pop();
    }
    let k = digits.len() as i32;
    let n_pos = point - leading as i32 + exponent;
    let digits = String::from_utf8(digits).unwrap_or_default();

    if k <= n_pos && n_pos <= 21 {
        format!("{}{}", digits, "0".repeat((n_pos - k) as usize))
    } else if 0 < n_pos && n_pos <= 21 {
        let (int, frac) = digits.split_at(n_pos as usize);
        format!("{int}.{frac}")
    } else if -6 < n_pos && n_pos <= 0 {
        format!("0.{}{}", "0".repeat((-n_pos) as usize), digits)
    } else {
        let e = n_pos - 1;
        let sign = if e < 0 { '-' } else { '+' };
        if k == 1 {
            format!("{digits}e{sign}{}", e.abs())
        } else {
            let (first, rest) = digits.split_at(1);
            format!("{first}.{rest}e{sign}{}", e.abs())
        }
    }
}

/// CanonicalNumericIndexString: the numeric value of `s` when `s` is the
/// canonical string form of that number (`"-0"` included).
pub fn canonical_numeric_index_string(s: &str) -> Option<f64> {
    if s == "-0" {
        return Some(-0.0);
    }
    let n = string_to_number(s);
    if number_to_string(n) == s {
        Some(n)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_int32() {
        assert_eq!(to_int32(f64::NAN), 0);
        assert_eq!(to_int32(f64::INFINITY), 0);
        assert_eq!(to_int32(3.14), 3);
        assert_eq!(to_int32(-3.14), -3);
        assert_eq!(to_int32(2147483648.0), -2147483648);
        assert_eq!(to_int32(4294967295.0), -1);
    }

    #[test]
    fn test_to_uint32() {
        assert_eq!(to_uint32(f64::NAN), 0);
        assert_eq!(to_uint32(-1.0), 4294967295);
        assert_eq!(to_uint32(4294967296.0), 0);
        assert_eq!(to_uint32(1e20), 1661992960);
    }

    #[test]
    fn test_small_integer_wrapping() {
        assert_eq!(to_uint8(256.0), 0);
        assert_eq!(to_int8(255.0), -1);
        assert_eq!(to_int16(32768.0), -32768);
        assert_eq!(to_uint16(-1.0), 65535);
    }

    #[test]
    fn test_uint8_clamp_ties_to_even() {
        assert_eq!(to_uint8_clamp(-5.0), 0);
        assert_eq!(to_uint8_clamp(300.0), 255);
        assert_eq!(to_uint8_clamp(0.5), 0);
        assert_eq!(to_uint8_clamp(1.5), 2);
        assert_eq!(to_uint8_clamp(2.5), 2);
        assert_eq!(to_uint8_clamp(254.5), 254);
        assert_eq!(to_uint8_clamp(f64::NAN), 0);
    }

    #[test]
    fn test_bigint_wrapping() {
        assert_eq!(to_bigint64(&BigInt::from(-1)), -1);
        assert_eq!(to_biguint64(&BigInt::from(-1)), u64::MAX);
        assert_eq!(to_bigint64(&(BigInt::from(1u128 << 63))), i64::MIN);
    }

    #[test]
    fn test_string_to_number() {
        assert_eq!(string_to_number("  42 "), 42.0);
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("0x1F"), 31.0);
        assert_eq!(string_to_number("1e3"), 1000.0);
        assert_eq!(string_to_number("-Infinity"), f64::NEG_INFINITY);
        assert!(string_to_number("inf").is_nan());
        assert!(string_to_number("12px").is_nan());
    }

    #[test]
    fn test_number_to_string() {
        assert_eq!(number_to_string(0.0), "0");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(1.5), "1.5");
        assert_eq!(number_to_string(-42.0), "-42");
        assert_eq!(number_to_string(0.1), "0.1");
        assert_eq!(number_to_string(1e21), "1e+21");
        assert_eq!(number_to_string(1e-7), "1e-7");
        assert_eq!(number_to_string(0.000001), "0.000001");
        assert_eq!(number_to_string(123456789012345680000.0), "123456789012345680000");
        assert_eq!(number_to_string(4294967295.0), "4294967295");
        assert_eq!(number_to_string(1.5e-10), "1.5e-10");
    }

    #[test]
    fn test_canonical_numeric_index_string() {
        assert_eq!(canonical_numeric_index_string("1"), Some(1.0));
        assert_eq!(canonical_numeric_index_string("1.5"), Some(1.5));
        assert!(
            canonical_numeric_index_string("-0")
                .unwrap()
                .is_sign_negative()
        );
        assert!(canonical_numeric_index_string("NaN").unwrap().is_nan());
        assert_eq!(canonical_numeric_index_string("01"), None);
        assert_eq!(canonical_numeric_index_string("1.0"), None);
        assert_eq!(canonical_numeric_index_string("foo"), None);
    }
}
