use std::cmp::Ordering;
use std::collections::HashMap;

use crate::evaluator::{EvalError, EvalResult};
use crate::grammar::Number;
use crate::source::Position;
use crate::types::{Primitive, PrimitiveFunc, Value};

fn arity_error(name: &str, expected: usize, actual: usize, pos: Position) -> EvalError {
    EvalError::InvalidArguments(
        format!(
            "Primitive '{}' expects exactly {} arguments, got {}",
            name, expected, actual
        ),
        pos,
    )
}

fn operand_error(name: &str, args: &[&Value], pos: Position) -> EvalError {
    let types: Vec<&str> = args.iter().map(|v| v.type_name()).collect();
    EvalError::InvalidArguments(
        format!(
            "unsupported operand type(s) for {}: {}",
            name,
            types.join(", ")
        ),
        pos,
    )
}

fn unary(args: Vec<Value>, pos: Position, name: &str) -> EvalResult<Value> {
    let actual = args.len();
    let mut args = args.into_iter();
    match (args.next(), args.next()) {
        (Some(value), None) => Ok(value),
        _ => Err(arity_error(name, 1, actual, pos)),
    }
}

fn binary(args: Vec<Value>, pos: Position, name: &str) -> EvalResult<(Value, Value)> {
    let actual = args.len();
    let mut args = args.into_iter();
    match (args.next(), args.next(), args.next()) {
        (Some(left), Some(right), None) => Ok((left, right)),
        _ => Err(arity_error(name, 2, actual, pos)),
    }
}

fn binary_numbers(args: Vec<Value>, pos: Position, name: &str) -> EvalResult<(Number, Number)> {
    let (left, right) = binary(args, pos, name)?;
    match (left.as_number(), right.as_number()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(operand_error(name, &[&left, &right], pos)),
    }
}

// Integer operands stay integers when `int_op` succeeds, otherwise the
// float operation decides the result.
fn arithmetic(
    args: Vec<Value>,
    pos: Position,
    name: &str,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> EvalResult {
    match binary_numbers(args, pos, name)? {
        (Number::Int(a), Number::Int(b)) => int_op(a, b).map(Value::int).ok_or_else(|| {
            EvalError::InvalidArguments(format!("integer overflow in '{}'", name), pos)
        }),
        (a, b) => Ok(Value::float(float_op(a.as_f64(), b.as_f64()))),
    }
}

fn zero_division(name: &str, divisor: Number, pos: Position) -> EvalResult<()> {
    if divisor.is_zero() {
        Err(EvalError::InvalidArguments(
            format!("division by zero in '{}'", name),
            pos,
        ))
    } else {
        Ok(())
    }
}

pub fn prim_add(args: Vec<Value>, pos: Position) -> EvalResult {
    if let [Value::Tuple(a), Value::Tuple(b)] = args.as_slice() {
        return Ok(Value::Tuple(a.iter().chain(b).cloned().collect()));
    }
    arithmetic(args, pos, "+", i64::checked_add, |a, b| a + b)
}

pub fn prim_sub(args: Vec<Value>, pos: Position) -> EvalResult {
    arithmetic(args, pos, "-", i64::checked_sub, |a, b| a - b)
}

pub fn prim_mul(args: Vec<Value>, pos: Position) -> EvalResult {
    arithmetic(args, pos, "*", i64::checked_mul, |a, b| a * b)
}

pub fn prim_pow(args: Vec<Value>, pos: Position) -> EvalResult {
    match binary_numbers(args, pos, "**")? {
        (Number::Int(base), Number::Int(exp)) if exp >= 0 => u32::try_from(exp)
            .ok()
            .and_then(|exp| base.checked_pow(exp))
            .map(Value::int)
            .ok_or_else(|| {
                EvalError::InvalidArguments("integer overflow in '**'".to_string(), pos)
            }),
        (base, exp) => Ok(Value::float(base.as_f64().powf(exp.as_f64()))),
    }
}

/// True division, always a float.
pub fn prim_div(args: Vec<Value>, pos: Position) -> EvalResult {
    let (a, b) = binary_numbers(args, pos, "/")?;
    zero_division("/", b, pos)?;
    Ok(Value::float(a.as_f64() / b.as_f64()))
}

/// Division rounding towards negative infinity.
pub fn prim_floor_div(args: Vec<Value>, pos: Position) -> EvalResult {
    let (a, b) = binary_numbers(args, pos, "//")?;
    zero_division("//", b, pos)?;
    match (a, b) {
        (Number::Int(a), Number::Int(b)) => {
            let quotient = a.checked_div(b).ok_or_else(|| {
                EvalError::InvalidArguments("integer overflow in '//'".to_string(), pos)
            })?;
            if a % b != 0 && (a < 0) != (b < 0) {
                Ok(Value::int(quotient - 1))
            } else {
                Ok(Value::int(quotient))
            }
        }
        (a, b) => Ok(Value::float((a.as_f64() / b.as_f64()).floor())),
    }
}

/// Remainder taking the sign of the divisor.
pub fn prim_mod(args: Vec<Value>, pos: Position) -> EvalResult {
    let (a, b) = binary_numbers(args, pos, "%")?;
    zero_division("%", b, pos)?;
    match (a, b) {
        (Number::Int(a), Number::Int(b)) => {
            let r = a.checked_rem(b).unwrap_or(0);
            Ok(Value::int(if r != 0 && (r < 0) != (b < 0) { r + b } else { r }))
        }
        (a, b) => {
            let (a, b) = (a.as_f64(), b.as_f64());
            let r = a % b;
            Ok(Value::float(if r != 0.0 && (r < 0.0) != (b < 0.0) { r + b } else { r }))
        }
    }
}

fn bitwise(args: Vec<Value>, pos: Position, name: &str, op: fn(i64, i64) -> i64) -> EvalResult {
    let (left, right) = binary(args, pos, name)?;
    match (&left, &right) {
        (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(op(i64::from(*a), i64::from(*b)) != 0)),
        _ => match (left.as_number(), right.as_number()) {
            (Some(Number::Int(a)), Some(Number::Int(b))) => Ok(Value::int(op(a, b))),
            _ => Err(operand_error(name, &[&left, &right], pos)),
        },
    }
}

pub fn prim_bit_and(args: Vec<Value>, pos: Position) -> EvalResult {
    bitwise(args, pos, "&", |a, b| a & b)
}

pub fn prim_bit_xor(args: Vec<Value>, pos: Position) -> EvalResult {
    bitwise(args, pos, "^", |a, b| a ^ b)
}

pub fn prim_bit_or(args: Vec<Value>, pos: Position) -> EvalResult {
    bitwise(args, pos, "|", |a, b| a | b)
}

pub fn prim_invert(args: Vec<Value>, pos: Position) -> EvalResult {
    let value = unary(args, pos, "~")?;
    match value.as_number() {
        Some(Number::Int(n)) => Ok(Value::int(!n)),
        _ => Err(operand_error("~", &[&value], pos)),
    }
}

fn compare_numbers(a: Number, b: Number) -> Option<Ordering> {
    match (a, b) {
        (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
        (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
    }
}

fn ordering(
    args: Vec<Value>,
    pos: Position,
    name: &str,
    accept: fn(Ordering) -> bool,
) -> EvalResult {
    let (a, b) = binary_numbers(args, pos, name)?;
    // NaN compares false against everything
    Ok(Value::Bool(compare_numbers(a, b).is_some_and(accept)))
}

pub fn prim_equals(args: Vec<Value>, pos: Position) -> EvalResult {
    let (left, right) = binary(args, pos, "==")?;
    Ok(Value::Bool(left == right))
}

pub fn prim_not_equals(args: Vec<Value>, pos: Position) -> EvalResult {
    let (left, right) = binary(args, pos, "!=")?;
    Ok(Value::Bool(left != right))
}

pub fn prim_less_than(args: Vec<Value>, pos: Position) -> EvalResult {
    ordering(args, pos, "<", Ordering::is_lt)
}

pub fn prim_less_than_or_equals(args: Vec<Value>, pos: Position) -> EvalResult {
    ordering(args, pos, "<=", Ordering::is_le)
}

pub fn prim_greater_than(args: Vec<Value>, pos: Position) -> EvalResult {
    ordering(args, pos, ">", Ordering::is_gt)
}

pub fn prim_greater_than_or_equals(args: Vec<Value>, pos: Position) -> EvalResult {
    ordering(args, pos, ">=", Ordering::is_ge)
}

/// Returns the left operand if it is truthy, otherwise the right one.
pub fn prim_or(args: Vec<Value>, pos: Position) -> EvalResult {
    let (left, right) = binary(args, pos, "or")?;
    Ok(if left.is_truthy() { left } else { right })
}

/// Returns the left operand if it is falsy, otherwise the right one.
pub fn prim_and(args: Vec<Value>, pos: Position) -> EvalResult {
    let (left, right) = binary(args, pos, "and")?;
    Ok(if left.is_truthy() { right } else { left })
}

pub fn prim_xor(args: Vec<Value>, pos: Position) -> EvalResult {
    let (left, right) = binary(args, pos, "xor")?;
    Ok(Value::Bool(left.is_truthy() ^ right.is_truthy()))
}

pub fn prim_not(args: Vec<Value>, pos: Position) -> EvalResult {
    let value = unary(args, pos, "not")?;
    Ok(Value::Bool(!value.is_truthy()))
}

// Picks the first value whose ordering against the current best is `wanted`.
fn extreme(args: Vec<Value>, pos: Position, name: &str, wanted: Ordering) -> EvalResult {
    let values = match <[Value; 1]>::try_from(args) {
        Ok([Value::Tuple(items)]) => items,
        Ok([single]) => vec![single],
        Err(args) => args,
    };
    let mut values = values.into_iter();
    let Some(mut best) = values.next() else {
        return Err(EvalError::InvalidArguments(
            format!("{}() arg is an empty sequence", name),
            pos,
        ));
    };
    for value in values {
        let (Some(a), Some(b)) = (value.as_number(), best.as_number()) else {
            return Err(operand_error(name, &[&value, &best], pos));
        };
        if compare_numbers(a, b) == Some(wanted) {
            best = value;
        }
    }
    Ok(best)
}

pub fn prim_max(args: Vec<Value>, pos: Position) -> EvalResult {
    extreme(args, pos, "max", Ordering::Greater)
}

pub fn prim_min(args: Vec<Value>, pos: Position) -> EvalResult {
    extreme(args, pos, "min", Ordering::Less)
}

/// Writes the arguments to stdout separated by spaces.
pub fn prim_print(args: Vec<Value>, _pos: Position) -> EvalResult {
    let line: Vec<String> = args.iter().map(Value::to_string).collect();
    println!("{}", line.join(" "));
    Ok(Value::Nil)
}

pub fn prim_tuple(args: Vec<Value>, _pos: Position) -> EvalResult {
    Ok(Value::Tuple(args))
}

const STANDARD: [(&str, PrimitiveFunc); 25] = [
    ("+", prim_add),
    ("-", prim_sub),
    ("*", prim_mul),
    ("**", prim_pow),
    ("/", prim_div),
    ("//", prim_floor_div),
    ("%", prim_mod),
    ("&", prim_bit_and),
    ("^", prim_bit_xor),
    ("|", prim_bit_or),
    ("~", prim_invert),
    ("==", prim_equals),
    ("!=", prim_not_equals),
    ("<", prim_less_than),
    ("<=", prim_less_than_or_equals),
    (">", prim_greater_than),
    (">=", prim_greater_than_or_equals),
    ("or", prim_or),
    ("and", prim_and),
    ("xor", prim_xor),
    ("not", prim_not),
    ("max", prim_max),
    ("min", prim_min),
    ("print", prim_print),
    ("tuple", prim_tuple),
];

/// The operator table a host normally seeds the global environment with.
pub fn standard_builtins() -> HashMap<String, Value> {
    STANDARD
        .iter()
        .map(|(name, func)| {
            (
                name.to_string(),
                Value::Primitive(Primitive::new(*name, *func)),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(func: PrimitiveFunc, args: Vec<Value>) -> EvalResult {
        func(args, Position::default())
    }

    fn assert_invalid(result: EvalResult) {
        assert!(
            matches!(result, Err(EvalError::InvalidArguments(..))),
            "expected invalid arguments, got {:?}",
            result
        );
    }

    #[test]
    fn test_standard_table_is_complete() {
        let builtins = standard_builtins();
        for name in [
            "+", "-", "*", "**", "/", "//", "%", "&", "^", "|", "~", "==", "!=", "<", "<=", ">",
            ">=", "or", "and", "xor", "not", "max", "min", "print", "tuple",
        ] {
            assert!(builtins.contains_key(name), "missing primitive '{}'", name);
        }
    }

    #[test]
    fn test_arithmetic_promotion() {
        assert_eq!(call(prim_add, vec![Value::int(1), Value::int(2)]), Ok(Value::int(3)));
        assert!(matches!(
            call(prim_add, vec![Value::int(1), Value::float(0.5)]),
            Ok(Value::Number(Number::Float(f))) if f == 1.5
        ));
        assert_eq!(call(prim_mul, vec![Value::Bool(true), Value::int(7)]), Ok(Value::int(7)));
        assert_invalid(call(prim_add, vec![Value::int(i64::MAX), Value::int(1)]));
        assert_invalid(call(prim_sub, vec![Value::int(1), Value::Nil]));
        assert_invalid(call(prim_sub, vec![Value::int(1)]));
    }

    #[test]
    fn test_tuple_concatenation() {
        let a = Value::Tuple(vec![Value::int(1)]);
        let b = Value::Tuple(vec![Value::int(2)]);
        assert_eq!(
            call(prim_add, vec![a, b]),
            Ok(Value::Tuple(vec![Value::int(1), Value::int(2)]))
        );
    }

    #[test]
    fn test_division() {
        assert!(matches!(
            call(prim_div, vec![Value::int(7), Value::int(2)]),
            Ok(Value::Number(Number::Float(f))) if f == 3.5
        ));
        assert_eq!(call(prim_floor_div, vec![Value::int(7), Value::int(2)]), Ok(Value::int(3)));
        assert_eq!(call(prim_floor_div, vec![Value::int(-7), Value::int(2)]), Ok(Value::int(-4)));
        assert_eq!(call(prim_mod, vec![Value::int(-7), Value::int(3)]), Ok(Value::int(2)));
        assert_eq!(call(prim_mod, vec![Value::int(7), Value::int(-3)]), Ok(Value::int(-2)));
        assert_eq!(call(prim_mod, vec![Value::float(5.5), Value::int(2)]), Ok(Value::float(1.5)));
        assert_invalid(call(prim_div, vec![Value::int(1), Value::int(0)]));
        assert_invalid(call(prim_floor_div, vec![Value::int(1), Value::float(0.0)]));
        assert_invalid(call(prim_mod, vec![Value::int(1), Value::int(0)]));
    }

    #[test]
    fn test_power() {
        assert_eq!(call(prim_pow, vec![Value::int(2), Value::int(10)]), Ok(Value::int(1024)));
        assert_eq!(call(prim_pow, vec![Value::int(2), Value::int(-1)]), Ok(Value::float(0.5)));
        assert_eq!(
            call(prim_pow, vec![Value::float(9.0), Value::float(0.5)]),
            Ok(Value::float(3.0))
        );
    }

    #[test]
    fn test_bitwise() {
        assert_eq!(call(prim_bit_and, vec![Value::int(6), Value::int(3)]), Ok(Value::int(2)));
        assert_eq!(call(prim_bit_or, vec![Value::int(6), Value::int(3)]), Ok(Value::int(7)));
        assert_eq!(call(prim_bit_xor, vec![Value::int(6), Value::int(3)]), Ok(Value::int(5)));
        assert_eq!(call(prim_invert, vec![Value::int(5)]), Ok(Value::int(-6)));
        assert_eq!(
            call(prim_bit_and, vec![Value::Bool(true), Value::Bool(false)]),
            Ok(Value::Bool(false))
        );
        assert_invalid(call(prim_bit_or, vec![Value::float(1.0), Value::int(1)]));
    }

    #[test]
    fn test_comparison() {
        let yes = Ok(Value::Bool(true));
        assert_eq!(call(prim_less_than, vec![Value::int(1), Value::float(1.5)]), yes);
        assert_eq!(
            call(prim_greater_than_or_equals, vec![Value::int(2), Value::int(2)]),
            yes
        );
        assert_eq!(call(prim_equals, vec![Value::int(2), Value::float(2.0)]), yes);
        assert_eq!(call(prim_not_equals, vec![Value::int(2), Value::Nil]), Ok(Value::Bool(true)));
        assert_eq!(
            call(prim_less_than, vec![Value::float(f64::NAN), Value::int(1)]),
            Ok(Value::Bool(false))
        );
    }

    #[test]
    fn test_logic_returns_operands() {
        assert_eq!(call(prim_or, vec![Value::int(0), Value::int(4)]), Ok(Value::int(4)));
        assert_eq!(call(prim_or, vec![Value::int(3), Value::int(4)]), Ok(Value::int(3)));
        assert_eq!(call(prim_and, vec![Value::int(0), Value::int(4)]), Ok(Value::int(0)));
        assert_eq!(call(prim_xor, vec![Value::int(1), Value::int(4)]), Ok(Value::Bool(false)));
        assert_eq!(call(prim_not, vec![Value::Nil]), Ok(Value::Bool(true)));
    }

    #[test]
    fn test_max_min() {
        assert_eq!(
            call(prim_max, vec![Value::int(1), Value::float(3.5), Value::int(2)]),
            Ok(Value::float(3.5))
        );
        assert_eq!(
            call(prim_min, vec![Value::Tuple(vec![Value::int(4), Value::int(-1)])]),
            Ok(Value::int(-1))
        );
        // The first of equal values wins
        assert!(matches!(
            call(prim_max, vec![Value::int(2), Value::float(2.0)]),
            Ok(Value::Number(Number::Int(2)))
        ));
        assert_invalid(call(prim_max, vec![]));
        assert_invalid(call(prim_min, vec![Value::int(1), Value::Nil]));
    }

    #[test]
    fn test_tuple_and_print() {
        assert_eq!(
            call(prim_tuple, vec![Value::int(1), Value::Nil]),
            Ok(Value::Tuple(vec![Value::int(1), Value::Nil]))
        );
        assert_eq!(call(prim_print, vec![Value::int(1)]), Ok(Value::Nil));
    }
}
