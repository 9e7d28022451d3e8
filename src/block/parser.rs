//! Recursive-descent parser for the block language
//!
//! Precedence, loosest first: `or`, `and`, `not`, comparisons, `|`, `^`,
//! `&`, `+ -`, `* / // %`, unary `- + ~`, `**`, then calls, attributes and
//! subscripts.

use super::ast::{BoolOp, Expr, Stmt};
use super::lexer::{tokenize, Tok, Token};
use crate::error::BlockError;
use crate::value::{BinaryOp, Scalar, UnaryOp};

const RESERVED: &[&str] = &[
    "import", "from", "as", "and", "or", "not", "True", "False", "None", "if", "else", "elif",
    "for", "while", "def", "class", "return", "lambda", "in", "is", "with", "del", "pass",
    "yield", "global", "nonlocal", "try", "except", "finally", "raise", "assert", "break",
    "continue",
];

struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    fn peek(&self) -> &Tok {
        self.tokens
            .get(self.current)
            .map(|t| &t.tok)
            .unwrap_or(&Tok::End)
    }

    fn peek_next(&self) -> &Tok {
        self.tokens
            .get(self.current + 1)
            .map(|t| &t.tok)
            .unwrap_or(&Tok::End)
    }

    fn advance(&mut self) -> Tok {
        let tok = self.peek().clone();
        if self.current < self.tokens.len() {
            self.current += 1;
        }
        tok
    }

    fn error(&self, message: impl Into<String>) -> BlockError {
        let (line, column) = self
            .tokens
            .get(self.current)
            .or_else(|| self.tokens.last())
            .map(|t| (t.line, t.column))
            .unwrap_or((1, 1));
        BlockError::Parse {
            line,
            column,
            message: message.into(),
        }
    }

    fn expect(&mut self, tok: Tok, what: &str) -> Result<(), BlockError> {
        if *self.peek() == tok {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected {}", what)))
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Tok::Name(n) if n == keyword)
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.is_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// A name that is not a keyword
    fn identifier(&mut self) -> Result<String, BlockError> {
        match self.peek().clone() {
            Tok::Name(name) if !RESERVED.contains(&name.as_str()) => {
                self.advance();
                Ok(name)
            }
            Tok::Name(name) => Err(self.error(format!("'{}' is not supported here", name))),
            _ => Err(self.error("expected a name")),
        }
    }

    /// `a.b.c` as used by imports
    fn dotted_name(&mut self) -> Result<String, BlockError> {
        let mut name = self.identifier()?;
        while *self.peek() == Tok::Dot {
            self.advance();
            name.push('.');
            name.push_str(&self.identifier()?);
        }
        Ok(name)
    }

    fn alias(&mut self) -> Result<Option<String>, BlockError> {
        if self.eat_keyword("as") {
            Ok(Some(self.identifier()?))
        } else {
            Ok(None)
        }
    }

    fn program(&mut self) -> Result<Vec<Stmt>, BlockError> {
        let mut statements = Vec::new();
        loop {
            while matches!(self.peek(), Tok::Newline | Tok::Semi) {
                self.advance();
            }
            if *self.peek() == Tok::End {
                break;
            }
            statements.push(self.statement()?);
            match self.peek() {
                Tok::Newline | Tok::Semi | Tok::End => {}
                _ => return Err(self.error("expected end of statement")),
            }
        }
        Ok(statements)
    }

    fn statement(&mut self) -> Result<Stmt, BlockError> {
        if self.eat_keyword("import") {
            let module = self.dotted_name()?;
            let alias = self.alias()?;
            return Ok(Stmt::Import { module, alias });
        }
        if self.eat_keyword("from") {
            let module = self.dotted_name()?;
            if !self.eat_keyword("import") {
                return Err(self.error("expected 'import'"));
            }
            let parenthesised = *self.peek() == Tok::LParen;
            if parenthesised {
                self.advance();
            }
            let mut names = Vec::new();
            loop {
                let name = self.identifier()?;
                let alias = self.alias()?;
                names.push((name, alias));
                if *self.peek() != Tok::Comma {
                    break;
                }
                self.advance();
                if parenthesised && *self.peek() == Tok::RParen {
                    break;
                }
            }
            if parenthesised {
                self.expect(Tok::RParen, "')'")?;
            }
            return Ok(Stmt::ImportFrom { module, names });
        }
        if matches!(self.peek(), Tok::Name(_)) && *self.peek_next() == Tok::Assign {
            let target = self.identifier()?;
            self.advance();
            let value = self.expression_list()?;
            return Ok(Stmt::Assign { target, value });
        }
        if let Tok::Name(name) = self.peek() {
            if RESERVED.contains(&name.as_str())
                && !matches!(name.as_str(), "not" | "True" | "False" | "None")
            {
                return Err(self.error(format!("'{}' statements are not supported", name)));
            }
        }
        Ok(Stmt::Expr(self.expression_list()?))
    }

    /// `a, b` becomes a tuple
    fn expression_list(&mut self) -> Result<Expr, BlockError> {
        let first = self.expression()?;
        if *self.peek() != Tok::Comma {
            return Ok(first);
        }
        let mut items = vec![first];
        while *self.peek() == Tok::Comma {
            self.advance();
            if matches!(
                self.peek(),
                Tok::Newline | Tok::Semi | Tok::End | Tok::RParen | Tok::RBracket
            ) {
                break;
            }
            items.push(self.expression()?);
        }
        Ok(Expr::Tuple(items))
    }

    fn expression(&mut self) -> Result<Expr, BlockError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, BlockError> {
        let mut left = self.and_expr()?;
        while self.eat_keyword("or") {
            let right = self.and_expr()?;
            left = Expr::Logical {
                op: BoolOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, BlockError> {
        let mut left = self.not_expr()?;
        while self.eat_keyword("and") {
            let right = self.not_expr()?;
            left = Expr::Logical {
                op: BoolOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr, BlockError> {
        if self.eat_keyword("not") {
            let operand = self.not_expr()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, BlockError> {
        let left = self.bit_or()?;
        let mut rest = Vec::new();
        loop {
            let op = match self.peek() {
                Tok::EqEq => BinaryOp::Eq,
                Tok::NotEq => BinaryOp::Ne,
                Tok::Lt => BinaryOp::Lt,
                Tok::Le => BinaryOp::Le,
                Tok::Gt => BinaryOp::Gt,
                Tok::Ge => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            rest.push((op, self.bit_or()?));
        }
        if rest.is_empty() {
            Ok(left)
        } else {
            Ok(Expr::Compare {
                left: Box::new(left),
                rest,
            })
        }
    }

    fn binary_level(
        &mut self,
        operators: &[(Tok, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr, BlockError>,
    ) -> Result<Expr, BlockError> {
        let mut left = next(self)?;
        loop {
            let Some(op) = operators
                .iter()
                .find(|(tok, _)| tok == self.peek())
                .map(|(_, op)| *op)
            else {
                break;
            };
            self.advance();
            let right = next(self)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn bit_or(&mut self) -> Result<Expr, BlockError> {
        self.binary_level(&[(Tok::Pipe, BinaryOp::BitOr)], Self::bit_xor)
    }

    fn bit_xor(&mut self) -> Result<Expr, BlockError> {
        self.binary_level(&[(Tok::Caret, BinaryOp::BitXor)], Self::bit_and)
    }

    fn bit_and(&mut self) -> Result<Expr, BlockError> {
        self.binary_level(&[(Tok::Amp, BinaryOp::BitAnd)], Self::arith)
    }

    fn arith(&mut self) -> Result<Expr, BlockError> {
        self.binary_level(
            &[(Tok::Plus, BinaryOp::Add), (Tok::Minus, BinaryOp::Sub)],
            Self::term,
        )
    }

    fn term(&mut self) -> Result<Expr, BlockError> {
        self.binary_level(
            &[
                (Tok::Star, BinaryOp::Mul),
                (Tok::Slash, BinaryOp::Div),
                (Tok::DoubleSlash, BinaryOp::FloorDiv),
                (Tok::Percent, BinaryOp::Mod),
            ],
            Self::unary,
        )
    }

    fn unary(&mut self) -> Result<Expr, BlockError> {
        let op = match self.peek() {
            Tok::Minus => UnaryOp::Neg,
            Tok::Plus => UnaryOp::Pos,
            Tok::Tilde => UnaryOp::Invert,
            _ => return self.power(),
        };
        self.advance();
        let operand = self.unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    /// `**` binds tighter than a unary operator on its left, and is right-associative
    fn power(&mut self) -> Result<Expr, BlockError> {
        let base = self.primary()?;
        if *self.peek() != Tok::DoubleStar {
            return Ok(base);
        }
        self.advance();
        let exponent = self.unary()?;
        Ok(Expr::Binary {
            op: BinaryOp::Pow,
            left: Box::new(base),
            right: Box::new(exponent),
        })
    }

    fn primary(&mut self) -> Result<Expr, BlockError> {
        let mut expr = self.atom()?;
        loop {
            match self.peek() {
                Tok::Dot => {
                    self.advance();
                    let attr = self.identifier()?;
                    expr = Expr::Attribute {
                        value: Box::new(expr),
                        attr,
                    };
                }
                Tok::LParen => {
                    self.advance();
                    let args = self.items(Tok::RParen)?;
                    expr = Expr::Call {
                        func: Box::new(expr),
                        args,
                    };
                }
                Tok::LBracket => {
                    self.advance();
                    let index = self.expression_list()?;
                    self.expect(Tok::RBracket, "']'")?;
                    expr = Expr::Subscript {
                        value: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    /// Comma-separated expressions up to `close`, which is consumed
    fn items(&mut self, close: Tok) -> Result<Vec<Expr>, BlockError> {
        let mut items = Vec::new();
        while *self.peek() != close {
            items.push(self.expression()?);
            if *self.peek() == Tok::Comma {
                self.advance();
            } else if *self.peek() != close {
                return Err(self.error("expected ',' or closing bracket"));
            }
        }
        self.advance();
        Ok(items)
    }

    fn atom(&mut self) -> Result<Expr, BlockError> {
        match self.peek().clone() {
            Tok::Int(i) => {
                self.advance();
                Ok(Expr::Constant(Scalar::Int(i)))
            }
            Tok::Float(x) => {
                self.advance();
                Ok(Expr::Constant(Scalar::Float(x)))
            }
            Tok::Str(s) => {
                self.advance();
                let mut text = s;
                // adjacent literals concatenate
                while let Tok::Str(more) = self.peek().clone() {
                    self.advance();
                    text.push_str(&more);
                }
                Ok(Expr::Constant(Scalar::Str(text)))
            }
            Tok::Name(name) => match name.as_str() {
                "True" => {
                    self.advance();
                    Ok(Expr::Constant(Scalar::Bool(true)))
                }
                "False" => {
                    self.advance();
                    Ok(Expr::Constant(Scalar::Bool(false)))
                }
                "None" => {
                    self.advance();
                    Ok(Expr::None)
                }
                _ => Ok(Expr::Name(self.identifier()?)),
            },
            Tok::LParen => {
                self.advance();
                if *self.peek() == Tok::RParen {
                    self.advance();
                    return Ok(Expr::Tuple(Vec::new()));
                }
                let first = self.expression()?;
                if *self.peek() == Tok::RParen {
                    self.advance();
                    return Ok(first);
                }
                self.expect(Tok::Comma, "',' or ')'")?;
                let mut items = vec![first];
                items.extend(self.items(Tok::RParen)?);
                Ok(Expr::Tuple(items))
            }
            Tok::LBracket => {
                self.advance();
                Ok(Expr::List(self.items(Tok::RBracket)?))
            }
            Tok::End | Tok::Newline => Err(self.error("unexpected end of input")),
            other => Err(self.error(format!("unexpected token {:?}", other))),
        }
    }
}

pub fn parse_program(source: &str) -> Result<Vec<Stmt>, BlockError> {
    Parser {
        tokens: tokenize(source)?,
        current: 0,
    }
    .program()
}

/// Parse a single expression, rejecting anything after it
pub fn parse_expression(source: &str) -> Result<Expr, BlockError> {
    let mut parser = Parser {
        tokens: tokenize(source)?,
        current: 0,
    };
    while *parser.peek() == Tok::Newline {
        parser.advance();
    }
    let expr = parser.expression_list()?;
    while *parser.peek() == Tok::Newline {
        parser.advance();
    }
    if *parser.peek() != Tok::End {
        return Err(parser.error("unexpected tokens after expression"));
    }
    Ok(expr)
}
