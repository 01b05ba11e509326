use super::*;
use crate::ast::Pipe;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

/// Operator symbol → host method name. Dispatch retries a missed
/// operator lookup under this alias before giving up.
pub fn op_method_name(op: &str) -> Option<&'static str> {
    Some(match op {
        "+" => "op_Addition",
        "-" => "op_Subtraction",
        "/" => "op_Division",
        "*" => "op_Multiply",
        "%" => "op_Modulus",
        "==" => "op_Equality",
        "!=" => "op_Inequality",
        ">" => "op_GreaterThan",
        ">=" => "op_GreaterThanOrEqual",
        "<" => "op_LessThan",
        "<=" => "op_LessThanOrEqual",
        "-@" => "op_UnaryNegation",
        "+@" => "op_UnaryPlus",
        "<<" => "op_LeftShift",
        ">>" => "op_RightShift",
        "^" => "op_ExclusiveOr",
        "~" => "op_OnesComplement",
        "&" => "op_BitwiseAnd",
        "|" => "op_BitwiseOr",
        "**" => "Power",
        "<=>" => "Compare",
        "=~" => "Match",
        _ => return None,
    })
}

fn to_i64(value: &Value) -> Result<i64, RuntimeError> {
    match value {
        Value::Int(i) => Ok(*i),
        Value::BigInt(i) => i.to_i64().ok_or_else(|| {
            RuntimeError::with_kind("integer too large for bitwise operation", ErrorKind::TypeError)
        }),
        Value::Num(n) => Ok(*n as i64),
        Value::Bool(b) => Ok(*b as i64),
        Value::Str(s) => s.parse::<i64>().map_err(|_| {
            RuntimeError::with_kind(format!("cannot coerce '{s}' to integer"), ErrorKind::TypeError)
        }),
        other => Err(RuntimeError::with_kind(
            format!("cannot coerce {} to integer", other.type_name()),
            ErrorKind::TypeError,
        )),
    }
}

fn to_f64(value: &Value) -> Result<f64, RuntimeError> {
    match value {
        Value::Int(i) => Ok(*i as f64),
        Value::BigInt(i) => Ok(i.to_f64().unwrap_or(f64::INFINITY)),
        Value::Num(n) => Ok(*n),
        Value::Bool(b) => Ok(*b as i64 as f64),
        Value::Str(s) => s.parse::<f64>().map_err(|_| {
            RuntimeError::with_kind(format!("cannot coerce '{s}' to number"), ErrorKind::TypeError)
        }),
        other => Err(RuntimeError::with_kind(
            format!("cannot coerce {} to number", other.type_name()),
            ErrorKind::TypeError,
        )),
    }
}

fn is_numeric(value: &Value) -> bool {
    matches!(value, Value::Int(_) | Value::BigInt(_) | Value::Num(_))
}

/// Integer arithmetic on the numeric tower: i64 fast path, BigInt on
/// overflow or when either side already is one.
fn int_arith(op: &str, lhs: &Value, rhs: &Value) -> Option<Value> {
    let as_big = |v: &Value| -> Option<BigInt> {
        match v {
            Value::Int(i) => Some(BigInt::from(*i)),
            Value::BigInt(i) => Some(i.clone()),
            _ => None,
        }
    };
    if let (Value::Int(a), Value::Int(b)) = (lhs, rhs) {
        let checked = match op {
            "+" => a.checked_add(*b),
            "-" => a.checked_sub(*b),
            "*" => a.checked_mul(*b),
            "/" if *b != 0 && a % b == 0 => a.checked_div(*b),
            "/" => return Some(Value::Num(*a as f64 / *b as f64)),
            _ => return None,
        };
        if let Some(v) = checked {
            return Some(Value::Int(v));
        }
    }
    let (a, b) = (as_big(lhs)?, as_big(rhs)?);
    let result = match op {
        "+" => a + b,
        "-" => a - b,
        "*" => a * b,
        "/" => {
            if num_traits::Zero::is_zero(&b) {
                return Some(Value::Num(f64::INFINITY));
            }
            return Some(Value::Num(a.to_f64()? / b.to_f64()?));
        }
        _ => return None,
    };
    Some(match result.to_i64() {
        Some(small) => Value::Int(small),
        None => Value::BigInt(result),
    })
}

impl Interpreter {
    /// True when the boxed class chain for a host type carries a user
    /// overload under any of these names. Gates the box-and-dispatch path
    /// for operators on host values.
    fn boxed_class_has_user_method(&mut self, type_name: &str, names: &[&str]) -> bool {
        let mut cur = Some(self.boxed_class_for(type_name));
        while let Some(id) = cur {
            let class = self.class(id);
            for name in names {
                if let Some(table) = class.instance_methods.get(*name) {
                    if table.functions.iter().any(|f| !f.is_native()) {
                        return true;
                    }
                }
            }
            cur = class.parent;
        }
        false
    }

    /// Binary operator dispatch: a user method on the receiver (raw name,
    /// then operator alias) wins; host values consult their boxed class
    /// for user overloads; otherwise the native coercion rules apply.
    pub(crate) fn eval_binary_op(
        &mut self,
        op: &str,
        lhs: &Value,
        rhs: &Value,
        scope: ScopeId,
    ) -> Result<Value, RuntimeError> {
        let rhs_arg = [CallArg::positional(rhs.clone())];
        match lhs {
            Value::Instance(_) | Value::Class(_) => {
                if let Some(v) =
                    self.invoke_member(lhs, op, &rhs_arg, scope, false, None, Pipe::None)?
                {
                    return Ok(v);
                }
            }
            other => {
                let mut names = vec![op];
                if let Some(alias) = op_method_name(op) {
                    names.push(alias);
                }
                if self.boxed_class_has_user_method(other.type_name(), &names) {
                    let boxed = self.box_value(other.clone(), Some(scope))?;
                    if let Some(v) =
                        self.invoke_member(&boxed, op, &rhs_arg, scope, false, None, Pipe::None)?
                    {
                        return Ok(v);
                    }
                }
            }
        }
        self.native_binary(op, lhs, rhs)
    }

    /// The coercion fallback: boolean operators coerce both sides to
    /// boolean, bitwise/shift/modulus to integer, power to floating
    /// point; everything else promotes the looser side.
    fn native_binary(&mut self, op: &str, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
        match op {
            "&&" => return Ok(Value::Bool(lhs.truthy() && rhs.truthy())),
            "||" => return Ok(Value::Bool(lhs.truthy() || rhs.truthy())),
            "&" | "|" | "^" | "<<" | ">>" | "%" => {
                let (a, b) = (to_i64(lhs)?, to_i64(rhs)?);
                let v = match op {
                    "&" => a & b,
                    "|" => a | b,
                    "^" => a ^ b,
                    "<<" => a.wrapping_shl(b as u32),
                    ">>" => a.wrapping_shr(b as u32),
                    "%" => {
                        if b == 0 {
                            return Err(RuntimeError::with_kind(
                                "modulus by zero",
                                ErrorKind::TypeError,
                            ));
                        }
                        a % b
                    }
                    _ => unreachable!(),
                };
                return Ok(Value::Int(v));
            }
            "**" => {
                let v = to_f64(lhs)?.powf(to_f64(rhs)?);
                return Ok(Value::Num(v));
            }
            "==" => return Ok(Value::Bool(lhs == rhs)),
            "!=" => return Ok(Value::Bool(lhs != rhs)),
            _ => {}
        }
        match op {
            "+" | "-" | "*" | "/" => {
                if let (Value::Str(a), b) = (lhs, rhs) {
                    if op == "+" {
                        return Ok(Value::str(format!("{a}{b}")));
                    }
                }
                if let (Value::Array(a), Value::Array(b)) = (lhs, rhs) {
                    if op == "+" {
                        let mut items = a.borrow().clone();
                        items.extend(b.borrow().iter().cloned());
                        return Ok(Value::array(items));
                    }
                }
                if !matches!(lhs, Value::Num(_)) && !matches!(rhs, Value::Num(_)) {
                    if let Some(v) = int_arith(op, lhs, rhs) {
                        return Ok(v);
                    }
                }
                let (a, b) = (to_f64(lhs)?, to_f64(rhs)?);
                let v = match op {
                    "+" => a + b,
                    "-" => a - b,
                    "*" => a * b,
                    "/" => a / b,
                    _ => unreachable!(),
                };
                Ok(Value::Num(v))
            }
            "<" | "<=" | ">" | ">=" => {
                if let (Value::Str(a), Value::Str(b)) = (lhs, rhs) {
                    let v = match op {
                        "<" => a < b,
                        "<=" => a <= b,
                        ">" => a > b,
                        _ => a >= b,
                    };
                    return Ok(Value::Bool(v));
                }
                let (a, b) = (to_f64(lhs)?, to_f64(rhs)?);
                let v = match op {
                    "<" => a < b,
                    "<=" => a <= b,
                    ">" => a > b,
                    _ => a >= b,
                };
                Ok(Value::Bool(v))
            }
            "<=>" => {
                let ord = if let (Value::Str(a), Value::Str(b)) = (lhs, rhs) {
                    a.cmp(b) as i64
                } else {
                    let (a, b) = (to_f64(lhs)?, to_f64(rhs)?);
                    if a < b {
                        -1
                    } else if a > b {
                        1
                    } else {
                        0
                    }
                };
                Ok(Value::Int(ord.signum()))
            }
            "=~" => Ok(Value::Nil),
            _ => Err(RuntimeError::with_kind(
                format!("unknown binary operator '{op}'"),
                ErrorKind::TypeError,
            )),
        }
    }

    /// Unary operator dispatch: a user method on the receiver (under the
    /// `-@`/`+@` spelling) wins; host values consult their boxed class
    /// for user overloads; otherwise the native rules apply.
    pub(crate) fn eval_unary_op(
        &mut self,
        op: &str,
        value: &Value,
        scope: ScopeId,
    ) -> Result<Value, RuntimeError> {
        let name = match op {
            "-" => "-@",
            "+" => "+@",
            other => other,
        };
        match value {
            Value::Instance(_) => {
                if let Some(v) =
                    self.invoke_member(value, name, &[], scope, false, None, Pipe::None)?
                {
                    return Ok(v);
                }
            }
            other => {
                let mut names = vec![name];
                if let Some(alias) = op_method_name(name) {
                    names.push(alias);
                }
                if self.boxed_class_has_user_method(other.type_name(), &names) {
                    let boxed = self.box_value(other.clone(), Some(scope))?;
                    if let Some(v) =
                        self.invoke_member(&boxed, name, &[], scope, false, None, Pipe::None)?
                    {
                        return Ok(v);
                    }
                }
            }
        }
        match op {
            "!" => Ok(Value::Bool(!value.truthy())),
            "-" | "-@" => match value {
                Value::Int(i) => Ok(Value::Int(-i)),
                Value::BigInt(i) => Ok(Value::BigInt(-i.clone())),
                Value::Num(n) => Ok(Value::Num(-n)),
                other => Ok(Value::Num(-to_f64(other)?)),
            },
            "+" | "+@" => {
                if is_numeric(value) {
                    Ok(value.clone())
                } else {
                    Ok(Value::Num(to_f64(value)?))
                }
            }
            "~" => Ok(Value::Int(!to_i64(value)?)),
            other => Err(RuntimeError::with_kind(
                format!("unknown unary operator '{other}'"),
                ErrorKind::TypeError,
            )),
        }
    }

    /// Index read. Out-of-range array reads and absent dictionary keys
    /// are nil, matching the soft-miss contract.
    pub(crate) fn index_get(
        &mut self,
        container: &Value,
        index: &Value,
        scope: ScopeId,
    ) -> Result<Value, RuntimeError> {
        match container {
            Value::Array(items) => {
                let idx = to_i64(index)?;
                let items = items.borrow();
                if idx < 0 || idx as usize >= items.len() {
                    return Ok(Value::Nil);
                }
                Ok(items[idx as usize].clone())
            }
            Value::Dict(map) => Ok(map
                .borrow()
                .get(&index.dict_key())
                .cloned()
                .unwrap_or(Value::Nil)),
            Value::Str(s) => {
                let idx = to_i64(index)?;
                if idx < 0 {
                    return Ok(Value::Nil);
                }
                Ok(s.chars()
                    .nth(idx as usize)
                    .map(|c| Value::str(c.to_string()))
                    .unwrap_or(Value::Nil))
            }
            Value::Instance(_) => {
                let args = [CallArg::positional(index.clone())];
                Ok(self
                    .invoke_member(container, "[]", &args, scope, false, None, Pipe::None)?
                    .unwrap_or(Value::Nil))
            }
            _ => Ok(Value::Nil),
        }
    }

    /// Index write, updating the container in place. Arrays grow with
    /// nil padding when written past the end.
    pub(crate) fn index_set(
        &mut self,
        container: &Value,
        index: &Value,
        value: Value,
        scope: ScopeId,
    ) -> Result<Value, RuntimeError> {
        match container {
            Value::Array(items) => {
                let idx = to_i64(index)?;
                if idx < 0 {
                    return Err(RuntimeError::with_kind(
                        "negative array index in assignment",
                        ErrorKind::TypeError,
                    ));
                }
                let mut items = items.borrow_mut();
                let idx = idx as usize;
                while items.len() <= idx {
                    items.push(Value::Nil);
                }
                items[idx] = value.clone();
                Ok(value)
            }
            Value::Dict(map) => {
                map.borrow_mut().insert(index.dict_key(), value.clone());
                Ok(value)
            }
            Value::Instance(_) => {
                let args = [
                    CallArg::positional(index.clone()),
                    CallArg::positional(value.clone()),
                ];
                self.invoke_member(container, "[]=", &args, scope, false, None, Pipe::None)?;
                Ok(value)
            }
            other => Err(RuntimeError::with_kind(
                format!("cannot index-assign into {}", other.type_name()),
                ErrorKind::TypeError,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_alias_table() {
        assert_eq!(op_method_name("+"), Some("op_Addition"));
        assert_eq!(op_method_name("<=>"), Some("Compare"));
        assert_eq!(op_method_name("=~"), Some("Match"));
        assert_eq!(op_method_name("#"), None);
    }

    #[test]
    fn int_overflow_promotes_to_bigint() {
        let v = int_arith("*", &Value::Int(i64::MAX), &Value::Int(2)).unwrap();
        assert!(matches!(v, Value::BigInt(_)));
    }

    #[test]
    fn bitwise_coerces_to_integer() {
        let mut interp = Interpreter::new();
        let s = interp.new_scope(None);
        let v = interp
            .eval_binary_op("&", &Value::Num(6.9), &Value::Int(3), s)
            .unwrap();
        assert_eq!(v, Value::Int(2));
        let v = interp
            .eval_binary_op("%", &Value::str("7"), &Value::Int(4), s)
            .unwrap();
        assert_eq!(v, Value::Int(3));
    }

    #[test]
    fn power_coerces_to_float() {
        let mut interp = Interpreter::new();
        let s = interp.new_scope(None);
        let v = interp
            .eval_binary_op("**", &Value::Int(2), &Value::Int(10), s)
            .unwrap();
        assert_eq!(v, Value::Num(1024.0));
    }

    #[test]
    fn boolean_operators_coerce_both_sides() {
        let mut interp = Interpreter::new();
        let s = interp.new_scope(None);
        let v = interp
            .eval_binary_op("&&", &Value::Int(1), &Value::str("x"), s)
            .unwrap();
        assert_eq!(v, Value::Bool(true));
        let v = interp
            .eval_binary_op("||", &Value::Int(0), &Value::Nil, s)
            .unwrap();
        assert_eq!(v, Value::Bool(false));
    }

    #[test]
    fn spaceship_returns_sign() {
        let mut interp = Interpreter::new();
        let s = interp.new_scope(None);
        let v = interp
            .eval_binary_op("<=>", &Value::Int(3), &Value::Int(9), s)
            .unwrap();
        assert_eq!(v, Value::Int(-1));
    }
}
