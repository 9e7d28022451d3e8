//! Element-wise operators with scalar broadcasting

use super::{Array, Complex, DType, Scalar, Value};
use crate::error::ValueError;
use std::borrow::Cow;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    fn is_bitwise(self) -> bool {
        matches!(self, BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Invert,
    Not,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Pos => "+",
            UnaryOp::Invert => "~",
            UnaryOp::Not => "not ",
        }
    }
}

enum Operand<'a> {
    Scalar(Scalar),
    Array(Cow<'a, Array>),
}

impl Operand<'_> {
    fn dtype(&self) -> DType {
        match self {
            Operand::Scalar(s) => s.dtype(),
            Operand::Array(a) => a.dtype(),
        }
    }

    fn at(&self, index: usize) -> Option<Scalar> {
        match self {
            Operand::Scalar(s) => Some(s.clone()),
            Operand::Array(a) => a.get(index),
        }
    }

    fn len(&self) -> Option<usize> {
        match self {
            Operand::Scalar(_) => None,
            Operand::Array(a) => Some(a.len()),
        }
    }
}

fn operand(value: &Value) -> Result<Operand<'_>, ValueError> {
    match value {
        Value::Scalar(s) => Ok(Operand::Scalar(s.clone())),
        Value::Array(a) => Ok(Operand::Array(Cow::Borrowed(a.as_ref()))),
        Value::Sequence(_) => Ok(Operand::Array(Cow::Owned(Array::from_value(value)?))),
        other => Err(ValueError::Type(format!(
            "unsupported operand of kind {}",
            other.kind()
        ))),
    }
}

/// Apply `op` element-wise, broadcasting scalars against arrays
pub fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, ValueError> {
    let (a, b) = (operand(lhs)?, operand(rhs)?);
    let len = match (a.len(), b.len()) {
        (None, None) => {
            let (Operand::Scalar(x), Operand::Scalar(y)) = (&a, &b) else {
                return Err(ValueError::Type("scalar operands expected".to_string()));
            };
            return Ok(Value::Scalar(scalar_binary(op, x, y)?));
        }
        (Some(n), None) | (None, Some(n)) => n,
        (Some(n), Some(m)) if n == m => n,
        (Some(n), Some(m)) => return Err(ValueError::Shape { left: n, right: m }),
    };
    let dtype = result_dtype(op, a.dtype(), b.dtype())?;
    let mut items = Vec::with_capacity(len);
    for i in 0..len {
        match (a.at(i), b.at(i)) {
            (Some(x), Some(y)) => items.push(scalar_binary(op, &x, &y)?),
            _ => return Err(ValueError::Shape { left: len, right: i }),
        }
    }
    Ok(Value::array(Array::from_scalars(Some(dtype), items)?))
}

/// Apply a unary operator; `not` is only defined for scalars
pub fn unary(op: UnaryOp, value: &Value) -> Result<Value, ValueError> {
    match operand(value)? {
        Operand::Scalar(s) => Ok(Value::Scalar(scalar_unary(op, &s)?)),
        Operand::Array(a) => {
            if op == UnaryOp::Not {
                return Err(ValueError::Type(
                    "the truth value of an array is ambiguous".to_string(),
                ));
            }
            let dtype = match (op, a.dtype()) {
                (UnaryOp::Neg | UnaryOp::Pos, DType::Bool) => DType::Int,
                (_, d) => d,
            };
            let items = a
                .scalars()
                .map(|s| scalar_unary(op, &s))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::array(Array::from_scalars(Some(dtype), items)?))
        }
    }
}

/// Truthiness of a value in `and` / `or` / `not` position
pub fn truthy(value: &Value) -> Result<bool, ValueError> {
    match value {
        Value::None => Ok(false),
        Value::Scalar(s) => Ok(s.is_truthy()),
        Value::Sequence(items) => Ok(!items.is_empty()),
        Value::Array(a) if a.len() == 1 => Ok(a.get(0).map(|s| s.is_truthy()).unwrap_or(false)),
        Value::Array(_) => Err(ValueError::Type(
            "the truth value of an array with more than one element is ambiguous".to_string(),
        )),
        _ => Ok(true),
    }
}

fn result_dtype(op: BinaryOp, a: DType, b: DType) -> Result<DType, ValueError> {
    if op.is_comparison() {
        return Ok(DType::Bool);
    }
    let mismatch = || {
        ValueError::Type(format!(
            "unsupported operand types for {}: {} and {}",
            op.symbol(),
            a,
            b
        ))
    };
    if op.is_bitwise() {
        return match (a, b) {
            (DType::Bool, DType::Bool) => Ok(DType::Bool),
            (DType::Bool | DType::Int, DType::Bool | DType::Int) => Ok(DType::Int),
            _ => Err(mismatch()),
        };
    }
    let common = a.promote(b).ok_or_else(mismatch)?;
    match (common, op) {
        (DType::Str, BinaryOp::Add) => Ok(DType::Str),
        (DType::Str, _) => Err(mismatch()),
        (DType::Bool | DType::Int, BinaryOp::Div) => Ok(DType::Float),
        (DType::Bool, _) => Ok(DType::Int),
        (d, _) => Ok(d),
    }
}

fn scalar_binary(op: BinaryOp, a: &Scalar, b: &Scalar) -> Result<Scalar, ValueError> {
    if op.is_comparison() {
        return compare(op, a, b).map(Scalar::Bool);
    }
    let mismatch = || {
        ValueError::Type(format!(
            "unsupported operand types for {}: {} and {}",
            op.symbol(),
            a.dtype(),
            b.dtype()
        ))
    };
    if op.is_bitwise() {
        return match (a, b) {
            (Scalar::Bool(x), Scalar::Bool(y)) => Ok(Scalar::Bool(match op {
                BinaryOp::BitAnd => *x & *y,
                BinaryOp::BitOr => *x | *y,
                _ => *x ^ *y,
            })),
            (Scalar::Bool(_) | Scalar::Int(_), Scalar::Bool(_) | Scalar::Int(_)) => {
                let (x, y) = (a.as_i64()?, b.as_i64()?);
                Ok(Scalar::Int(match op {
                    BinaryOp::BitAnd => x & y,
                    BinaryOp::BitOr => x | y,
                    _ => x ^ y,
                }))
            }
            _ => Err(mismatch()),
        };
    }
    let common = a.dtype().promote(b.dtype()).ok_or_else(mismatch)?;
    match common {
        DType::Str => match (a, b, op) {
            (Scalar::Str(x), Scalar::Str(y), BinaryOp::Add) => Ok(Scalar::Str(format!("{}{}", x, y))),
            _ => Err(mismatch()),
        },
        DType::Bool | DType::Int => int_arith(op, a.as_i64()?, b.as_i64()?),
        DType::Float => float_arith(op, a.as_f64()?, b.as_f64()?).map(Scalar::Float),
        DType::Complex => complex_arith(op, to_complex(a)?, to_complex(b)?).map(Scalar::Complex),
    }
}

fn int_arith(op: BinaryOp, a: i64, b: i64) -> Result<Scalar, ValueError> {
    Ok(match op {
        BinaryOp::Add => Scalar::Int(a.wrapping_add(b)),
        BinaryOp::Sub => Scalar::Int(a.wrapping_sub(b)),
        BinaryOp::Mul => Scalar::Int(a.wrapping_mul(b)),
        BinaryOp::Div => Scalar::Float(a as f64 / b as f64),
        BinaryOp::FloorDiv => {
            if b == 0 {
                return Err(ValueError::ZeroDivision);
            }
            let q = a.wrapping_div(b);
            if a.wrapping_rem(b) != 0 && ((a < 0) != (b < 0)) {
                Scalar::Int(q - 1)
            } else {
                Scalar::Int(q)
            }
        }
        BinaryOp::Mod => {
            if b == 0 {
                return Err(ValueError::ZeroDivision);
            }
            let r = a.wrapping_rem(b);
            if r != 0 && ((r < 0) != (b < 0)) {
                Scalar::Int(r + b)
            } else {
                Scalar::Int(r)
            }
        }
        BinaryOp::Pow => {
            let exp = u32::try_from(b).map_err(|_| {
                ValueError::Type("integers to negative integer powers are not allowed".to_string())
            })?;
            Scalar::Int(a.wrapping_pow(exp))
        }
        other => {
            return Err(ValueError::Type(format!(
                "operator {} is not arithmetic",
                other.symbol()
            )))
        }
    })
}

fn float_arith(op: BinaryOp, a: f64, b: f64) -> Result<f64, ValueError> {
    Ok(match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::FloorDiv => (a / b).floor(),
        BinaryOp::Mod => {
            let r = a % b;
            if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
                r + b
            } else {
                r
            }
        }
        BinaryOp::Pow => a.powf(b),
        other => {
            return Err(ValueError::Type(format!(
                "operator {} is not arithmetic",
                other.symbol()
            )))
        }
    })
}

fn to_complex(s: &Scalar) -> Result<Complex, ValueError> {
    match s.coerce(DType::Complex)? {
        Scalar::Complex(c) => Ok(c),
        other => Err(ValueError::Type(format!("expected a complex number, got {}", other))),
    }
}

fn complex_arith(op: BinaryOp, a: Complex, b: Complex) -> Result<Complex, ValueError> {
    Ok(match op {
        BinaryOp::Add => Complex::new(a.re + b.re, a.im + b.im),
        BinaryOp::Sub => Complex::new(a.re - b.re, a.im - b.im),
        BinaryOp::Mul => Complex::new(a.re * b.re - a.im * b.im, a.re * b.im + a.im * b.re),
        BinaryOp::Div => {
            let denom = b.re * b.re + b.im * b.im;
            Complex::new(
                (a.re * b.re + a.im * b.im) / denom,
                (a.im * b.re - a.re * b.im) / denom,
            )
        }
        other => {
            return Err(ValueError::Type(format!(
                "operator {} is not supported for complex numbers",
                other.symbol()
            )))
        }
    })
}

fn compare(op: BinaryOp, a: &Scalar, b: &Scalar) -> Result<bool, ValueError> {
    let ordering = match (a, b) {
        (Scalar::Str(x), Scalar::Str(y)) => Some(x.cmp(y)),
        (Scalar::Str(_), _) | (_, Scalar::Str(_)) => {
            return match op {
                BinaryOp::Eq => Ok(false),
                BinaryOp::Ne => Ok(true),
                _ => Err(ValueError::Type(format!(
                    "'{}' not supported between {} and {}",
                    op.symbol(),
                    a.dtype(),
                    b.dtype()
                ))),
            }
        }
        (Scalar::Complex(_), _) | (_, Scalar::Complex(_)) => {
            let equal = to_complex(a)? == to_complex(b)?;
            return match op {
                BinaryOp::Eq => Ok(equal),
                BinaryOp::Ne => Ok(!equal),
                _ => Err(ValueError::Type(
                    "complex numbers are not ordered".to_string(),
                )),
            };
        }
        (Scalar::Int(_) | Scalar::Bool(_), Scalar::Int(_) | Scalar::Bool(_)) => {
            Some(a.as_i64()?.cmp(&b.as_i64()?))
        }
        _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
    };
    Ok(match ordering {
        // NaN compares unequal to everything
        None => op == BinaryOp::Ne,
        Some(ord) => match op {
            BinaryOp::Eq => ord == Ordering::Equal,
            BinaryOp::Ne => ord != Ordering::Equal,
            BinaryOp::Lt => ord == Ordering::Less,
            BinaryOp::Le => ord != Ordering::Greater,
            BinaryOp::Gt => ord == Ordering::Greater,
            _ => ord != Ordering::Less,
        },
    })
}

fn scalar_unary(op: UnaryOp, s: &Scalar) -> Result<Scalar, ValueError> {
    let unsupported = || {
        ValueError::Type(format!(
            "bad operand type for unary {}: {}",
            op.symbol().trim(),
            s.dtype()
        ))
    };
    match op {
        UnaryOp::Not => Ok(Scalar::Bool(!s.is_truthy())),
        UnaryOp::Neg => match s {
            Scalar::Bool(b) => Ok(Scalar::Int(-(*b as i64))),
            Scalar::Int(i) => Ok(Scalar::Int(i.wrapping_neg())),
            Scalar::Float(x) => Ok(Scalar::Float(-x)),
            Scalar::Complex(c) => Ok(Scalar::Complex(Complex::new(-c.re, -c.im))),
            Scalar::Str(_) => Err(unsupported()),
        },
        UnaryOp::Pos => match s {
            Scalar::Bool(b) => Ok(Scalar::Int(*b as i64)),
            Scalar::Str(_) => Err(unsupported()),
            other => Ok(other.clone()),
        },
        UnaryOp::Invert => match s {
            Scalar::Bool(b) => Ok(Scalar::Bool(!b)),
            Scalar::Int(i) => Ok(Scalar::Int(!i)),
            _ => Err(unsupported()),
        },
    }
}
