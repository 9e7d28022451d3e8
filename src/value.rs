//! Values stored in contexts
//!
//! A value is either a one-dimensional homogeneous [`Array`] or an opaque
//! non-array value (scalar, sequence literal, builtin function or module,
//! nested context). Arrays are shared through `Arc` so that reading a name
//! twice yields the same array by identity.

pub mod array;
pub mod ops;

pub use array::Array;
pub use ops::{BinaryOp, UnaryOp};

use crate::block::builtins::{Builtin, Module};
use crate::context::ContextRef;
use crate::error::ValueError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Element type of an array or scalar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Bool,
    Int,
    Float,
    Complex,
    Str,
}

impl DType {
    fn rank(self) -> Option<u8> {
        match self {
            DType::Bool => Some(0),
            DType::Int => Some(1),
            DType::Float => Some(2),
            DType::Complex => Some(3),
            DType::Str => None,
        }
    }

    /// Common dtype of two operands; `None` when a string meets a number
    pub fn promote(self, other: DType) -> Option<DType> {
        if self == other {
            return Some(self);
        }
        match (self.rank(), other.rank()) {
            (Some(a), Some(b)) => Some(if a >= b { self } else { other }),
            _ => None,
        }
    }

    pub fn is_numeric(self) -> bool {
        self != DType::Str
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::Bool => "bool",
            DType::Int => "int",
            DType::Float => "float",
            DType::Complex => "complex",
            DType::Str => "str",
        };
        f.write_str(name)
    }
}

/// Complex number with f64 parts
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    pub fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }
}

impl fmt::Display for Complex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.im < 0.0 {
            write!(f, "({}-{}j)", self.re, -self.im)
        } else {
            write!(f, "({}+{}j)", self.re, self.im)
        }
    }
}

/// A single element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Complex(Complex),
    Str(String),
}

impl Scalar {
    pub fn dtype(&self) -> DType {
        match self {
            Scalar::Bool(_) => DType::Bool,
            Scalar::Int(_) => DType::Int,
            Scalar::Float(_) => DType::Float,
            Scalar::Complex(_) => DType::Complex,
            Scalar::Str(_) => DType::Str,
        }
    }

    /// Default fill for a dtype: NaN, 0, "", false, 0j
    pub fn default_for(dtype: DType) -> Scalar {
        match dtype {
            DType::Bool => Scalar::Bool(false),
            DType::Int => Scalar::Int(0),
            DType::Float => Scalar::Float(f64::NAN),
            DType::Complex => Scalar::Complex(Complex::default()),
            DType::Str => Scalar::Str(String::new()),
        }
    }

    /// Convert to `dtype`, failing when information would be lost
    pub fn coerce(&self, dtype: DType) -> Result<Scalar, ValueError> {
        let narrowing = || ValueError::Narrowing {
            value: self.to_string(),
            target: dtype.to_string(),
        };
        match (self, dtype) {
            (s, d) if s.dtype() == d => Ok(s.clone()),
            (Scalar::Bool(b), DType::Int) => Ok(Scalar::Int(*b as i64)),
            (Scalar::Bool(b), DType::Float) => Ok(Scalar::Float(if *b { 1.0 } else { 0.0 })),
            (Scalar::Bool(b), DType::Complex) => {
                Ok(Scalar::Complex(Complex::new(if *b { 1.0 } else { 0.0 }, 0.0)))
            }
            (Scalar::Int(i), DType::Bool) => match i {
                0 => Ok(Scalar::Bool(false)),
                1 => Ok(Scalar::Bool(true)),
                _ => Err(narrowing()),
            },
            (Scalar::Int(i), DType::Float) => Ok(Scalar::Float(*i as f64)),
            (Scalar::Int(i), DType::Complex) => Ok(Scalar::Complex(Complex::new(*i as f64, 0.0))),
            (Scalar::Float(x), DType::Bool) => {
                if *x == 0.0 {
                    Ok(Scalar::Bool(false))
                } else if *x == 1.0 {
                    Ok(Scalar::Bool(true))
                } else {
                    Err(narrowing())
                }
            }
            (Scalar::Float(x), DType::Int) => {
                if x.is_finite() && x.fract() == 0.0 && x.abs() < 9.2e18 {
                    Ok(Scalar::Int(*x as i64))
                } else {
                    Err(narrowing())
                }
            }
            (Scalar::Float(x), DType::Complex) => Ok(Scalar::Complex(Complex::new(*x, 0.0))),
            (Scalar::Complex(c), d) if d != DType::Str => {
                if c.im == 0.0 {
                    Scalar::Float(c.re).coerce(d).map_err(|_| narrowing())
                } else {
                    Err(narrowing())
                }
            }
            _ => Err(ValueError::Type(format!(
                "cannot convert {} value {} to {}",
                self.dtype(),
                self,
                dtype
            ))),
        }
    }

    pub fn as_f64(&self) -> Result<f64, ValueError> {
        match self {
            Scalar::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Scalar::Int(i) => Ok(*i as f64),
            Scalar::Float(x) => Ok(*x),
            other => Err(ValueError::Type(format!(
                "expected a real number, got {}",
                other.dtype()
            ))),
        }
    }

    pub fn as_i64(&self) -> Result<i64, ValueError> {
        match self.coerce(DType::Int)? {
            Scalar::Int(i) => Ok(i),
            other => Err(ValueError::Type(format!("expected an integer, got {}", other))),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Scalar::Bool(b) => *b,
            Scalar::Int(i) => *i != 0,
            Scalar::Float(x) => *x != 0.0,
            Scalar::Complex(c) => c.re != 0.0 || c.im != 0.0,
            Scalar::Str(s) => !s.is_empty(),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(true) => f.write_str("True"),
            Scalar::Bool(false) => f.write_str("False"),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) if x.is_nan() => f.write_str("nan"),
            Scalar::Float(x) if x.fract() == 0.0 && x.is_finite() => write!(f, "{:.1}", x),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Complex(c) => write!(f, "{}", c),
            Scalar::Str(s) => write!(f, "'{}'", s),
        }
    }
}

/// A value bound to a name
#[derive(Clone)]
pub enum Value {
    None,
    Scalar(Scalar),
    Array(Arc<Array>),
    Sequence(Vec<Value>),
    Function(&'static Builtin),
    Module(&'static Module),
    Context(ContextRef),
}

impl Value {
    pub fn array(array: Array) -> Self {
        Value::Array(Arc::new(array))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_context(&self) -> Option<&ContextRef> {
        match self {
            Value::Context(c) => Some(c),
            _ => None,
        }
    }

    /// Dtype of an array or scalar value
    pub fn dtype(&self) -> Option<DType> {
        match self {
            Value::Array(a) => Some(a.dtype()),
            Value::Scalar(s) => Some(s.dtype()),
            _ => None,
        }
    }

    /// Identity for arrays, equality for everything else
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b),
            _ => self == other,
        }
    }

    /// Short kind name used in diagnostics and snapshot reports
    pub fn kind(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Scalar(_) => "scalar",
            Value::Array(_) => "array",
            Value::Sequence(_) => "sequence",
            Value::Function(_) => "function",
            Value::Module(_) => "module",
            Value::Context(_) => "context",
        }
    }

    /// Materialize array-like values (arrays, sequences of scalars, scalars)
    pub fn to_array(&self) -> Result<Array, ValueError> {
        Array::from_value(self)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Scalar(a), Value::Scalar(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b) || a == b,
            (Value::Sequence(a), Value::Sequence(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.name == b.name,
            (Value::Module(a), Value::Module(b)) => a.name == b.name,
            (Value::Context(a), Value::Context(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Context(c) => write!(f, "Context({:?})", c.names()),
            other => write!(f, "{}", other),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Scalar(s) => write!(f, "{}", s),
            Value::Array(a) => write!(f, "{}", a),
            Value::Sequence(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Value::Function(b) => write!(f, "<function {}>", b.name),
            Value::Module(m) => write!(f, "<module {}>", m.name),
            Value::Context(c) => write!(f, "<context with {} names>", c.names().len()),
        }
    }
}

impl From<Scalar> for Value {
    fn from(scalar: Scalar) -> Self {
        Value::Scalar(scalar)
    }
}

impl From<Array> for Value {
    fn from(array: Array) -> Self {
        Value::array(array)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Scalar(Scalar::Bool(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Scalar(Scalar::Int(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Scalar(Scalar::Float(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Scalar(Scalar::Str(v.to_string()))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Scalar(Scalar::Str(v))
    }
}

impl From<Vec<bool>> for Value {
    fn from(v: Vec<bool>) -> Self {
        Value::array(Array::Bool(v))
    }
}

impl From<Vec<i64>> for Value {
    fn from(v: Vec<i64>) -> Self {
        Value::array(Array::Int(v))
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::array(Array::Float(v))
    }
}

impl From<Vec<&str>> for Value {
    fn from(v: Vec<&str>) -> Self {
        Value::array(Array::Str(v.into_iter().map(String::from).collect()))
    }
}
