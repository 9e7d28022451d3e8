//! Syntax tree of the block language

use crate::value::{BinaryOp, Scalar, UnaryOp};
use std::fmt;

pub const PUSH_MASK: &str = "push_mask";
pub const POP_MASK: &str = "pop_mask";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

impl BoolOp {
    pub fn keyword(self) -> &'static str {
        match self {
            BoolOp::And => "and",
            BoolOp::Or => "or",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    None,
    Constant(Scalar),
    Name(String),
    Tuple(Vec<Expr>),
    List(Vec<Expr>),
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
    },
    Subscript {
        value: Box<Expr>,
        index: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `a < b <= c`
    Compare {
        left: Box<Expr>,
        rest: Vec<(BinaryOp, Expr)>,
    },
    Logical {
        op: BoolOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    /// Names loaded by this expression, in evaluation order
    pub fn collect_names(&self, out: &mut Vec<String>) {
        match self {
            Expr::None | Expr::Constant(_) => {}
            Expr::Name(name) => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            Expr::Tuple(items) | Expr::List(items) => {
                items.iter().for_each(|item| item.collect_names(out))
            }
            Expr::Attribute { value, .. } => value.collect_names(out),
            Expr::Call { func, args } => {
                func.collect_names(out);
                args.iter().for_each(|arg| arg.collect_names(out));
            }
            Expr::Subscript { value, index } => {
                value.collect_names(out);
                index.collect_names(out);
            }
            Expr::Unary { operand, .. } => operand.collect_names(out),
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                left.collect_names(out);
                right.collect_names(out);
            }
            Expr::Compare { left, rest } => {
                left.collect_names(out);
                rest.iter().for_each(|(_, expr)| expr.collect_names(out));
            }
        }
    }

    pub fn names(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_names(&mut out);
        out
    }

    fn is_compound(&self) -> bool {
        matches!(
            self,
            Expr::Unary { .. } | Expr::Binary { .. } | Expr::Compare { .. } | Expr::Logical { .. }
        )
    }
}

/// Which mask intrinsic a statement calls, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskCall {
    Push,
    Pop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `import module [as alias]`
    Import {
        module: String,
        alias: Option<String>,
    },
    /// `from module import name [as alias], ...`
    ImportFrom {
        module: String,
        names: Vec<(String, Option<String>)>,
    },
    Assign {
        target: String,
        value: Expr,
    },
    Expr(Expr),
}

impl Stmt {
    /// Names read by the statement
    pub fn reads(&self) -> Vec<String> {
        match self {
            Stmt::Assign { value, .. } | Stmt::Expr(value) => value.names(),
            Stmt::Import { .. } | Stmt::ImportFrom { .. } => Vec::new(),
        }
    }

    /// Names bound by the statement
    pub fn writes(&self) -> Vec<String> {
        match self {
            Stmt::Import { module, alias } => vec![alias.clone().unwrap_or_else(|| module.clone())],
            Stmt::ImportFrom { names, .. } => names
                .iter()
                .map(|(name, alias)| alias.clone().unwrap_or_else(|| name.clone()))
                .collect(),
            Stmt::Assign { target, .. } => vec![target.clone()],
            Stmt::Expr(_) => Vec::new(),
        }
    }

    pub fn mask_call(&self) -> Option<MaskCall> {
        let Stmt::Expr(Expr::Call { func, .. }) = self else {
            return None;
        };
        match func.as_ref() {
            Expr::Name(name) if name == PUSH_MASK => Some(MaskCall::Push),
            Expr::Name(name) if name == POP_MASK => Some(MaskCall::Pop),
            _ => None,
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

struct Operand<'a>(&'a Expr);

impl fmt::Display for Operand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_compound() {
            write!(f, "({})", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::None => f.write_str("None"),
            Expr::Constant(scalar) => write!(f, "{}", scalar),
            Expr::Name(name) => f.write_str(name),
            Expr::Tuple(items) => {
                f.write_str("(")?;
                write_joined(f, items)?;
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Expr::List(items) => {
                f.write_str("[")?;
                write_joined(f, items)?;
                f.write_str("]")
            }
            Expr::Attribute { value, attr } => write!(f, "{}.{}", Operand(value), attr),
            Expr::Call { func, args } => {
                write!(f, "{}(", Operand(func))?;
                write_joined(f, args)?;
                f.write_str(")")
            }
            Expr::Subscript { value, index } => write!(f, "{}[{}]", Operand(value), index),
            Expr::Unary { op, operand } => write!(f, "{}{}", op.symbol(), Operand(operand)),
            Expr::Binary { op, left, right } => {
                write!(f, "{} {} {}", Operand(left), op.symbol(), Operand(right))
            }
            Expr::Compare { left, rest } => {
                write!(f, "{}", Operand(left))?;
                for (op, expr) in rest {
                    write!(f, " {} {}", op.symbol(), Operand(expr))?;
                }
                Ok(())
            }
            Expr::Logical { op, left, right } => {
                write!(f, "{} {} {}", Operand(left), op.keyword(), Operand(right))
            }
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Import { module, alias } => {
                write!(f, "import {}", module)?;
                if let Some(alias) = alias {
                    write!(f, " as {}", alias)?;
                }
                Ok(())
            }
            Stmt::ImportFrom { module, names } => {
                write!(f, "from {} import ", module)?;
                for (i, (name, alias)) in names.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(name)?;
                    if let Some(alias) = alias {
                        write!(f, " as {}", alias)?;
                    }
                }
                Ok(())
            }
            Stmt::Assign { target, value } => write!(f, "{} = {}", target, value),
            Stmt::Expr(expr) => write!(f, "{}", expr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(n: &str) -> Expr {
        Expr::Name(n.to_string())
    }

    #[test]
    fn reads_and_writes() {
        let stmt = Stmt::Assign {
            target: "c".to_string(),
            value: Expr::Call {
                func: Box::new(name("add")),
                args: vec![name("a"), name("b"), name("a")],
            },
        };
        assert_eq!(stmt.reads(), vec!["add", "a", "b"]);
        assert_eq!(stmt.writes(), vec!["c"]);

        let import = Stmt::ImportFrom {
            module: "numpy".to_string(),
            names: vec![("array".to_string(), None), ("sqrt".to_string(), Some("root".to_string()))],
        };
        assert_eq!(import.writes(), vec!["array", "root"]);
        assert!(import.reads().is_empty());
    }

    #[test]
    fn mask_calls_are_recognised() {
        let push = Stmt::Expr(Expr::Call {
            func: Box::new(name(PUSH_MASK)),
            args: vec![name("m")],
        });
        let pop = Stmt::Expr(Expr::Call {
            func: Box::new(name(POP_MASK)),
            args: vec![],
        });
        assert_eq!(push.mask_call(), Some(MaskCall::Push));
        assert_eq!(pop.mask_call(), Some(MaskCall::Pop));
        assert_eq!(Stmt::Expr(name("x")).mask_call(), None);
    }

    #[test]
    fn nested_operators_are_parenthesised() {
        let expr = Expr::Binary {
            op: BinaryOp::Mul,
            left: Box::new(Expr::Binary {
                op: BinaryOp::Add,
                left: Box::new(name("a")),
                right: Box::new(name("b")),
            }),
            right: Box::new(Expr::Constant(Scalar::Int(2))),
        };
        assert_eq!(expr.to_string(), "(a + b) * 2");
        assert_eq!(Expr::Tuple(vec![name("a")]).to_string(), "(a,)");
    }
}
