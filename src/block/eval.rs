//! Statement executor with a mask stack
//!
//! The executor evaluates a block against a context that serves as both
//! globals and locals. While masks are pushed, assignments land only on the
//! masked positions of the underlying arrays; reads stay unrestricted.

use super::ast::{BoolOp, Expr, Stmt, POP_MASK, PUSH_MASK};
use super::builtins;
use crate::context::Context;
use crate::error::{BlockError, ContextError, ValueError};
use crate::scatter::assign_through;
use crate::value::array::mask_indices;
use crate::value::ops::{binary, truthy, unary};
use crate::value::{Array, BinaryOp, Scalar, UnaryOp, Value};
use tracing::{debug, warn};

pub struct Executor<'c> {
    context: &'c dyn Context,
    /// Effective masks; each entry is already intersected with the one below
    masks: Vec<Vec<bool>>,
}

impl<'c> Executor<'c> {
    pub fn new(context: &'c dyn Context) -> Self {
        Self {
            context,
            masks: Vec::new(),
        }
    }

    pub fn mask_depth(&self) -> usize {
        self.masks.len()
    }

    pub fn run(&mut self, statements: &[Stmt]) -> Result<(), BlockError> {
        for stmt in statements {
            self.exec(stmt)?;
        }
        if !self.masks.is_empty() {
            warn!(
                depth = self.masks.len(),
                "block finished with masks still pushed"
            );
        }
        Ok(())
    }

    pub fn exec(&mut self, stmt: &Stmt) -> Result<(), BlockError> {
        match stmt {
            Stmt::Import { module, alias } => {
                let m = builtins::module(module)
                    .ok_or_else(|| BlockError::Import(module.clone()))?;
                self.assign(alias.as_deref().unwrap_or(module), Value::Module(m))
            }
            Stmt::ImportFrom { module, names } => {
                let m = builtins::module(module)
                    .ok_or_else(|| BlockError::Import(module.clone()))?;
                for (name, alias) in names {
                    let f = m
                        .member(name)
                        .ok_or_else(|| BlockError::Import(format!("{}.{}", module, name)))?;
                    self.assign(alias.as_deref().unwrap_or(name), Value::Function(f))?;
                }
                Ok(())
            }
            Stmt::Assign { target, value } => {
                let value = self.eval(value)?;
                self.assign(target, value)
            }
            Stmt::Expr(expr) => self.eval(expr).map(|_| ()),
        }
    }

    fn assign(&mut self, name: &str, value: Value) -> Result<(), BlockError> {
        let value = match self.masks.last() {
            Some(mask) => assign_through(self.context, name, value, &mask_indices(mask))?,
            None => value,
        };
        self.context.set(name, value)?;
        Ok(())
    }

    fn lookup(&self, name: &str) -> Result<Value, BlockError> {
        if self.context.contains(name) {
            return Ok(self.context.get(name)?);
        }
        builtins::lookup_global(name).ok_or_else(|| BlockError::UnknownName(name.to_string()))
    }

    pub fn eval(&mut self, expr: &Expr) -> Result<Value, BlockError> {
        match expr {
            Expr::None => Ok(Value::None),
            Expr::Constant(scalar) => Ok(Value::Scalar(scalar.clone())),
            Expr::Name(name) => self.lookup(name),
            Expr::Tuple(items) | Expr::List(items) => Ok(Value::Sequence(
                items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<Result<_, _>>()?,
            )),
            Expr::Attribute { value, attr } => {
                let base = self.eval(value)?;
                attribute(&base, attr)
            }
            Expr::Call { func, args } => self.call(func, args),
            Expr::Subscript { value, index } => {
                let base = self.eval(value)?;
                let index = self.eval(index)?;
                Ok(subscript(&base, &index)?)
            }
            Expr::Unary { op, operand } => {
                let operand = self.eval(operand)?;
                if *op == UnaryOp::Not {
                    return Ok(Value::from(!truthy(&operand)?));
                }
                Ok(unary(*op, &operand)?)
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                Ok(binary(*op, &left, &right)?)
            }
            Expr::Compare { left, rest } => {
                let mut lhs = self.eval(left)?;
                let mut result: Option<Value> = None;
                for (op, expr) in rest {
                    let rhs = self.eval(expr)?;
                    let step = binary(*op, &lhs, &rhs)?;
                    let combined = match result {
                        None => step,
                        Some(previous) => binary(BinaryOp::BitAnd, &previous, &step)?,
                    };
                    if matches!(combined, Value::Scalar(Scalar::Bool(false))) {
                        return Ok(combined);
                    }
                    result = Some(combined);
                    lhs = rhs;
                }
                Ok(result.unwrap_or(lhs))
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left)?;
                let left_true = truthy(&left)?;
                match (op, left_true) {
                    (BoolOp::And, false) | (BoolOp::Or, true) => Ok(left),
                    _ => self.eval(right),
                }
            }
        }
    }

    fn call(&mut self, func: &Expr, args: &[Expr]) -> Result<Value, BlockError> {
        if let Expr::Name(name) = func {
            if (name == PUSH_MASK || name == POP_MASK) && !self.context.contains(name) {
                return self.intrinsic(name, args);
            }
        }
        let callee = self.eval(func)?;
        let args: Vec<Value> = args
            .iter()
            .map(|arg| self.eval(arg))
            .collect::<Result<_, _>>()?;
        match callee {
            Value::Function(builtin) => (builtin.call)(&args).map_err(|err| BlockError::Call {
                function: builtin.name.to_string(),
                message: err.to_string(),
            }),
            other => Err(BlockError::Value(ValueError::Type(format!(
                "a {} is not callable",
                other.kind()
            )))),
        }
    }

    fn intrinsic(&mut self, name: &str, args: &[Expr]) -> Result<Value, BlockError> {
        if name == POP_MASK {
            if !args.is_empty() {
                return Err(BlockError::Call {
                    function: POP_MASK.to_string(),
                    message: "takes no arguments".to_string(),
                });
            }
            self.masks.pop().ok_or(BlockError::MaskUnderflow)?;
            debug!(depth = self.masks.len(), "popped mask");
            return Ok(Value::None);
        }

        let [arg] = args else {
            return Err(BlockError::Call {
                function: PUSH_MASK.to_string(),
                message: format!("takes exactly one argument, got {}", args.len()),
            });
        };
        let value = self.eval(arg)?;
        let mask = match &value {
            Value::Array(array) => array.to_mask(),
            Value::Sequence(_) => value.to_array()?.to_mask(),
            other => {
                return Err(ContextError::InvalidValue {
                    name: PUSH_MASK.to_string(),
                    reason: format!("mask must be an array, got a {}", other.kind()),
                }
                .into())
            }
        };
        let expected = self.context.len();
        if mask.len() != expected {
            return Err(ContextError::InvalidMask {
                expected,
                found: mask.len(),
            }
            .into());
        }
        let effective = match self.masks.last() {
            Some(current) => current.iter().zip(&mask).map(|(a, b)| *a && *b).collect(),
            None => mask,
        };
        self.masks.push(effective);
        debug!(depth = self.masks.len(), "pushed mask");
        Ok(Value::None)
    }
}

fn attribute(base: &Value, attr: &str) -> Result<Value, BlockError> {
    match base {
        Value::Module(m) => m
            .member(attr)
            .map(Value::Function)
            .ok_or_else(|| BlockError::UnknownName(format!("{}.{}", m.name, attr))),
        Value::Context(context) => Ok(context.get_dotted(attr)?),
        other => Err(BlockError::Value(ValueError::Type(format!(
            "a {} has no attribute '{}'",
            other.kind(),
            attr
        )))),
    }
}

fn resolve_index(index: i64, len: usize) -> Result<usize, ValueError> {
    let resolved = if index < 0 {
        index + len as i64
    } else {
        index
    };
    if resolved < 0 || resolved as usize >= len {
        return Err(ValueError::Type(format!(
            "index {} is out of bounds for length {}",
            index, len
        )));
    }
    Ok(resolved as usize)
}

/// `base[index]` for integer, boolean-mask and integer-array indices
fn subscript(base: &Value, index: &Value) -> Result<Value, ValueError> {
    match (base, index) {
        (Value::Context(context), Value::Scalar(Scalar::Str(name))) => context
            .get_dotted(name)
            .map_err(|err| ValueError::Type(err.to_string())),
        (Value::Sequence(items), Value::Scalar(s)) => {
            let i = resolve_index(s.as_i64()?, items.len())?;
            Ok(items[i].clone())
        }
        (Value::Sequence(_), _) => subscript(&Value::array(base.to_array()?), index),
        (Value::Array(array), Value::Scalar(Scalar::Bool(_))) => Err(ValueError::Type(format!(
            "cannot index a {}-element array with a boolean scalar",
            array.len()
        ))),
        (Value::Array(array), Value::Scalar(s)) => {
            let i = resolve_index(s.as_i64()?, array.len())?;
            array
                .get(i)
                .map(Value::Scalar)
                .ok_or(ValueError::Shape {
                    left: array.len(),
                    right: i,
                })
        }
        (Value::Array(array), Value::Array(_) | Value::Sequence(_)) => {
            let index = index.to_array()?;
            let positions = match &index {
                Array::Bool(mask) => {
                    if mask.len() != array.len() {
                        return Err(ValueError::Shape {
                            left: array.len(),
                            right: mask.len(),
                        });
                    }
                    mask_indices(mask)
                }
                Array::Int(ints) => ints
                    .iter()
                    .map(|&i| resolve_index(i, array.len()))
                    .collect::<Result<_, _>>()?,
                other => {
                    return Err(ValueError::Type(format!(
                        "arrays are indexed by bool or int arrays, not {}",
                        other.dtype()
                    )))
                }
            };
            Ok(Value::array(array.gather(&positions)))
        }
        (other, _) => Err(ValueError::Type(format!(
            "a {} is not subscriptable",
            other.kind()
        ))),
    }
}
