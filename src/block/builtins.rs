//! Builtin functions available to blocks
//!
//! The `numpy` module carries the small elementwise and reduction library
//! blocks rely on. Its members are also reachable as bare global names.

use crate::error::ValueError;
use crate::value::ops::{binary, unary};
use crate::value::{Array, BinaryOp, DType, Scalar, UnaryOp, Value};

pub type BuiltinFn = fn(&[Value]) -> Result<Value, ValueError>;

pub struct Builtin {
    pub name: &'static str,
    pub call: BuiltinFn,
}

pub struct Module {
    pub name: &'static str,
    pub members: &'static [Builtin],
}

impl Module {
    pub fn member(&'static self, name: &str) -> Option<&'static Builtin> {
        self.members.iter().find(|b| b.name == name)
    }
}

macro_rules! builtin {
    ($name:literal, $call:expr) => {
        Builtin {
            name: $name,
            call: $call,
        }
    };
}

static NUMPY_MEMBERS: &[Builtin] = &[
    builtin!("array", array),
    builtin!("asarray", array),
    builtin!("arange", arange),
    builtin!("zeros", zeros),
    builtin!("ones", ones),
    builtin!("linspace", linspace),
    builtin!("add", |a| binary_call(BinaryOp::Add, a)),
    builtin!("subtract", |a| binary_call(BinaryOp::Sub, a)),
    builtin!("multiply", |a| binary_call(BinaryOp::Mul, a)),
    builtin!("mul", |a| binary_call(BinaryOp::Mul, a)),
    builtin!("divide", |a| binary_call(BinaryOp::Div, a)),
    builtin!("power", |a| binary_call(BinaryOp::Pow, a)),
    builtin!("negative", |a| unary(UnaryOp::Neg, arg(a, 0)?)),
    builtin!("absolute", absolute),
    builtin!("abs", absolute),
    builtin!("sqrt", |a| map_float(arg(a, 0)?, f64::sqrt)),
    builtin!("exp", |a| map_float(arg(a, 0)?, f64::exp)),
    builtin!("log", |a| map_float(arg(a, 0)?, f64::ln)),
    builtin!("sin", |a| map_float(arg(a, 0)?, f64::sin)),
    builtin!("cos", |a| map_float(arg(a, 0)?, f64::cos)),
    builtin!("isfinite", |a| map_bool(arg(a, 0)?, false)),
    builtin!("isnan", |a| map_bool(arg(a, 0)?, true)),
    builtin!("logical_and", |a| logical(a, |x, y| x && y)),
    builtin!("logical_or", |a| logical(a, |x, y| x || y)),
    builtin!("logical_not", logical_not),
    builtin!("where", where_),
    builtin!("sum", sum),
    builtin!("mean", mean),
    builtin!("min", |a| extreme(a, false)),
    builtin!("max", |a| extreme(a, true)),
    builtin!("argsort", argsort),
    builtin!("len", len),
];

pub static NUMPY: Module = Module {
    name: "numpy",
    members: NUMPY_MEMBERS,
};

static MODULES: &[&Module] = &[&NUMPY];

pub fn module(name: &str) -> Option<&'static Module> {
    MODULES.iter().copied().find(|m| m.name == name)
}

/// Value a bare global name resolves to when no context binds it
pub fn lookup_global(name: &str) -> Option<Value> {
    if let Some(m) = module(name) {
        return Some(Value::Module(m));
    }
    NUMPY.member(name).map(Value::Function)
}

pub fn is_global(name: &str) -> bool {
    module(name).is_some() || NUMPY.member(name).is_some()
}

fn arg(args: &[Value], index: usize) -> Result<&Value, ValueError> {
    args.get(index).ok_or_else(|| {
        ValueError::Type(format!(
            "expected at least {} argument(s), got {}",
            index + 1,
            args.len()
        ))
    })
}

fn scalar_arg(args: &[Value], index: usize) -> Result<&Scalar, ValueError> {
    arg(args, index)?
        .as_scalar()
        .ok_or_else(|| ValueError::Type(format!("argument {} must be a scalar", index + 1)))
}

fn count_arg(args: &[Value], index: usize) -> Result<usize, ValueError> {
    let n = scalar_arg(args, index)?.as_i64()?;
    usize::try_from(n).map_err(|_| ValueError::Type(format!("negative count {}", n)))
}

fn array(args: &[Value]) -> Result<Value, ValueError> {
    let value = arg(args, 0)?;
    if let Value::Array(_) = value {
        return Ok(value.clone());
    }
    Ok(Value::array(Array::from_value(value)?))
}

fn arange(args: &[Value]) -> Result<Value, ValueError> {
    let bounds: Vec<&Scalar> = (0..args.len().min(3))
        .map(|i| scalar_arg(args, i))
        .collect::<Result<_, _>>()?;
    if bounds.is_empty() {
        return Err(ValueError::Type("arange() needs a stop value".to_string()));
    }
    if bounds.iter().all(|s| matches!(s, Scalar::Int(_) | Scalar::Bool(_))) {
        let ints: Vec<i64> = bounds
            .iter()
            .map(|s| s.as_i64())
            .collect::<Result<_, _>>()?;
        let (start, stop, step) = match ints.as_slice() {
            [stop] => (0, *stop, 1),
            [start, stop] => (*start, *stop, 1),
            [start, stop, step, ..] => (*start, *stop, *step),
            [] => (0, 0, 1),
        };
        if step == 0 {
            return Err(ValueError::ZeroDivision);
        }
        let mut out = Vec::new();
        let mut current = start;
        while (step > 0 && current < stop) || (step < 0 && current > stop) {
            out.push(current);
            current += step;
        }
        return Ok(Value::from(out));
    }
    let floats: Vec<f64> = bounds
        .iter()
        .map(|s| s.as_f64())
        .collect::<Result<_, _>>()?;
    let (start, stop, step) = match floats.as_slice() {
        [stop] => (0.0, *stop, 1.0),
        [start, stop] => (*start, *stop, 1.0),
        [start, stop, step, ..] => (*start, *stop, *step),
        [] => (0.0, 0.0, 1.0),
    };
    if step == 0.0 {
        return Err(ValueError::ZeroDivision);
    }
    let count = ((stop - start) / step).ceil().max(0.0) as usize;
    Ok(Value::from(
        (0..count)
            .map(|i| start + step * i as f64)
            .collect::<Vec<f64>>(),
    ))
}

fn zeros(args: &[Value]) -> Result<Value, ValueError> {
    Ok(Value::from(vec![0.0; count_arg(args, 0)?]))
}

fn ones(args: &[Value]) -> Result<Value, ValueError> {
    Ok(Value::from(vec![1.0; count_arg(args, 0)?]))
}

fn linspace(args: &[Value]) -> Result<Value, ValueError> {
    let start = scalar_arg(args, 0)?.as_f64()?;
    let stop = scalar_arg(args, 1)?.as_f64()?;
    let num = if args.len() > 2 {
        count_arg(args, 2)?
    } else {
        50
    };
    let values = match num {
        0 => Vec::new(),
        1 => vec![start],
        n => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    };
    Ok(Value::from(values))
}

fn binary_call(op: BinaryOp, args: &[Value]) -> Result<Value, ValueError> {
    binary(op, arg(args, 0)?, arg(args, 1)?)
}

fn absolute(args: &[Value]) -> Result<Value, ValueError> {
    fn abs(s: Scalar) -> Result<Scalar, ValueError> {
        match s {
            Scalar::Bool(b) => Ok(Scalar::Bool(b)),
            Scalar::Int(i) => Ok(Scalar::Int(i.wrapping_abs())),
            Scalar::Float(x) => Ok(Scalar::Float(x.abs())),
            Scalar::Complex(c) => Ok(Scalar::Float(c.re.hypot(c.im))),
            Scalar::Str(_) => Err(ValueError::Type("abs() of a string".to_string())),
        }
    }
    match arg(args, 0)? {
        Value::Scalar(s) => Ok(Value::Scalar(abs(s.clone())?)),
        other => {
            let items = other
                .to_array()?
                .scalars()
                .map(abs)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::array(Array::from_scalars(None, items)?))
        }
    }
}

fn map_float(value: &Value, f: fn(f64) -> f64) -> Result<Value, ValueError> {
    match value {
        Value::Scalar(s) => Ok(Value::from(f(s.as_f64()?))),
        other => {
            let values = other.to_array()?.to_f64()?;
            Ok(Value::from(values.into_iter().map(f).collect::<Vec<f64>>()))
        }
    }
}

/// `isfinite` or, with `nan`, `isnan`
fn map_bool(value: &Value, nan: bool) -> Result<Value, ValueError> {
    let test = |s: &Scalar| match s {
        Scalar::Float(x) if nan => x.is_nan(),
        Scalar::Float(x) => x.is_finite(),
        Scalar::Complex(c) if nan => c.re.is_nan() || c.im.is_nan(),
        Scalar::Complex(c) => c.re.is_finite() && c.im.is_finite(),
        _ => !nan,
    };
    match value {
        Value::Scalar(s) => Ok(Value::from(test(s))),
        other => Ok(Value::from(
            other.to_array()?.scalars().map(|s| test(&s)).collect::<Vec<bool>>(),
        )),
    }
}

fn truth(value: &Value) -> Result<Result<bool, Vec<bool>>, ValueError> {
    match value {
        Value::Scalar(s) => Ok(Ok(s.is_truthy())),
        other => Ok(Err(other.to_array()?.to_mask())),
    }
}

fn logical(args: &[Value], f: fn(bool, bool) -> bool) -> Result<Value, ValueError> {
    match (truth(arg(args, 0)?)?, truth(arg(args, 1)?)?) {
        (Ok(a), Ok(b)) => Ok(Value::from(f(a, b))),
        (Ok(a), Err(b)) => Ok(Value::from(b.into_iter().map(|y| f(a, y)).collect::<Vec<_>>())),
        (Err(a), Ok(b)) => Ok(Value::from(a.into_iter().map(|x| f(x, b)).collect::<Vec<_>>())),
        (Err(a), Err(b)) => {
            if a.len() != b.len() {
                return Err(ValueError::Shape {
                    left: a.len(),
                    right: b.len(),
                });
            }
            Ok(Value::from(
                a.into_iter()
                    .zip(b)
                    .map(|(x, y)| f(x, y))
                    .collect::<Vec<_>>(),
            ))
        }
    }
}

fn logical_not(args: &[Value]) -> Result<Value, ValueError> {
    match truth(arg(args, 0)?)? {
        Ok(b) => Ok(Value::from(!b)),
        Err(mask) => Ok(Value::from(mask.into_iter().map(|b| !b).collect::<Vec<_>>())),
    }
}

fn where_(args: &[Value]) -> Result<Value, ValueError> {
    let cond = match truth(arg(args, 0)?)? {
        Ok(b) => {
            let chosen = if b { arg(args, 1)? } else { arg(args, 2)? };
            return Ok(chosen.clone());
        }
        Err(mask) => mask,
    };
    let pick = |value: &Value| -> Result<Vec<Scalar>, ValueError> {
        match value {
            Value::Scalar(s) => Ok(vec![s.clone(); cond.len()]),
            other => {
                let array = other.to_array()?;
                if array.len() != cond.len() {
                    return Err(ValueError::Shape {
                        left: cond.len(),
                        right: array.len(),
                    });
                }
                Ok(array.scalars().collect())
            }
        }
    };
    let (yes, no) = (pick(arg(args, 1)?)?, pick(arg(args, 2)?)?);
    let items = cond
        .iter()
        .zip(yes.into_iter().zip(no))
        .map(|(c, (y, n))| if *c { y } else { n })
        .collect();
    Ok(Value::array(Array::from_scalars(None, items)?))
}

fn sum(args: &[Value]) -> Result<Value, ValueError> {
    let array = arg(args, 0)?.to_array()?;
    match array.dtype() {
        DType::Bool | DType::Int => {
            let mut total: i64 = 0;
            for s in array.scalars() {
                total = total.wrapping_add(s.as_i64()?);
            }
            Ok(Value::from(total))
        }
        _ => Ok(Value::from(array.to_f64()?.iter().sum::<f64>())),
    }
}

fn mean(args: &[Value]) -> Result<Value, ValueError> {
    let values = arg(args, 0)?.to_array()?.to_f64()?;
    if values.is_empty() {
        return Ok(Value::from(f64::NAN));
    }
    Ok(Value::from(values.iter().sum::<f64>() / values.len() as f64))
}

fn extreme(args: &[Value], largest: bool) -> Result<Value, ValueError> {
    let array = arg(args, 0)?.to_array()?;
    let order = array.argsort(largest)?;
    order
        .first()
        .and_then(|&i| array.get(i))
        .map(Value::Scalar)
        .ok_or_else(|| ValueError::Type("zero-size array has no minimum or maximum".to_string()))
}

fn argsort(args: &[Value]) -> Result<Value, ValueError> {
    let order = arg(args, 0)?.to_array()?.argsort(false)?;
    Ok(Value::from(order.into_iter().map(|i| i as i64).collect::<Vec<i64>>()))
}

fn len(args: &[Value]) -> Result<Value, ValueError> {
    let n = match arg(args, 0)? {
        Value::Array(a) => a.len(),
        Value::Sequence(items) => items.len(),
        Value::Scalar(Scalar::Str(s)) => s.chars().count(),
        Value::Context(c) => c.len(),
        other => return Err(ValueError::Type(format!("a {} has no length", other.kind()))),
    };
    Ok(Value::from(n as i64))
}
