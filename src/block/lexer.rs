//! Tokenizer for the block language

use crate::error::BlockError;

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),
    Newline,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Semi,
    Assign,
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    NotEq,
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub line: usize,
    pub column: usize,
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    depth: usize,
    tokens: Vec<Token>,
}

impl Lexer {
    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, line: usize, column: usize, message: impl Into<String>) -> BlockError {
        BlockError::Parse {
            line,
            column,
            message: message.into(),
        }
    }

    fn push(&mut self, tok: Tok, line: usize, column: usize) {
        self.tokens.push(Token { tok, line, column });
    }

    /// Consume `width` characters and emit `tok`
    fn emit(&mut self, tok: Tok, width: usize) {
        let (line, column) = (self.line, self.column);
        for _ in 0..width {
            self.bump();
        }
        self.push(tok, line, column);
    }

    fn number(&mut self) -> Result<(), BlockError> {
        let (line, column) = (self.line, self.column);
        let start = self.pos;
        let mut is_float = false;
        while let Some(c) = self.peek(0) {
            if c.is_ascii_digit() || c == '_' {
                self.bump();
            } else if c == '.' && !is_float {
                is_float = true;
                self.bump();
            } else if (c == 'e' || c == 'E')
                && self
                    .peek(1)
                    .map(|n| n.is_ascii_digit() || n == '+' || n == '-')
                    .unwrap_or(false)
            {
                is_float = true;
                self.bump();
                if matches!(self.peek(0), Some('+') | Some('-')) {
                    self.bump();
                }
            } else {
                break;
            }
        }
        let text: String = self.chars[start..self.pos]
            .iter()
            .filter(|c| **c != '_')
            .collect();
        let tok = if is_float {
            text.parse::<f64>()
                .map(Tok::Float)
                .map_err(|_| self.error(line, column, format!("invalid number: {}", text)))?
        } else {
            text.parse::<i64>()
                .map(Tok::Int)
                .map_err(|_| self.error(line, column, format!("invalid integer: {}", text)))?
        };
        self.push(tok, line, column);
        Ok(())
    }

    fn string(&mut self, quote: char) -> Result<(), BlockError> {
        let (line, column) = (self.line, self.column);
        self.bump();
        let mut text = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(self.error(line, column, "unterminated string literal"))
                }
                Some(c) if c == quote => break,
                Some('\\') => match self.bump() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('r') => text.push('\r'),
                    Some('0') => text.push('\0'),
                    Some(c) => text.push(c),
                    None => return Err(self.error(line, column, "unterminated string literal")),
                },
                Some(c) => text.push(c),
            }
        }
        self.push(Tok::Str(text), line, column);
        Ok(())
    }

    fn name(&mut self) {
        let (line, column) = (self.line, self.column);
        let start = self.pos;
        while let Some(c) = self.peek(0) {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let name: String = self.chars[start..self.pos].iter().collect();
        self.push(Tok::Name(name), line, column);
    }

    fn run(mut self) -> Result<Vec<Token>, BlockError> {
        while let Some(c) = self.peek(0) {
            let next = self.peek(1);
            match c {
                ' ' | '\t' | '\r' => {
                    self.bump();
                }
                '\\' if next == Some('\n') => {
                    self.bump();
                    self.bump();
                }
                '#' => {
                    while !matches!(self.peek(0), None | Some('\n')) {
                        self.bump();
                    }
                }
                '\n' => {
                    if self.depth == 0 {
                        self.emit(Tok::Newline, 1);
                    } else {
                        self.bump();
                    }
                }
                '(' | '[' => {
                    self.depth += 1;
                    self.emit(if c == '(' { Tok::LParen } else { Tok::LBracket }, 1);
                }
                ')' | ']' => {
                    if self.depth == 0 {
                        return Err(self.error(self.line, self.column, format!("unmatched '{}'", c)));
                    }
                    self.depth -= 1;
                    self.emit(if c == ')' { Tok::RParen } else { Tok::RBracket }, 1);
                }
                ',' => self.emit(Tok::Comma, 1),
                ';' => self.emit(Tok::Semi, 1),
                '+' => self.emit(Tok::Plus, 1),
                '-' => self.emit(Tok::Minus, 1),
                '*' if next == Some('*') => self.emit(Tok::DoubleStar, 2),
                '*' => self.emit(Tok::Star, 1),
                '/' if next == Some('/') => self.emit(Tok::DoubleSlash, 2),
                '/' => self.emit(Tok::Slash, 1),
                '%' => self.emit(Tok::Percent, 1),
                '&' => self.emit(Tok::Amp, 1),
                '|' => self.emit(Tok::Pipe, 1),
                '^' => self.emit(Tok::Caret, 1),
                '~' => self.emit(Tok::Tilde, 1),
                '<' if next == Some('=') => self.emit(Tok::Le, 2),
                '<' => self.emit(Tok::Lt, 1),
                '>' if next == Some('=') => self.emit(Tok::Ge, 2),
                '>' => self.emit(Tok::Gt, 1),
                '=' if next == Some('=') => self.emit(Tok::EqEq, 2),
                '=' => self.emit(Tok::Assign, 1),
                '!' if next == Some('=') => self.emit(Tok::NotEq, 2),
                '\'' | '"' => self.string(c)?,
                '.' if next.map(|n| n.is_ascii_digit()).unwrap_or(false) => self.number()?,
                '.' => self.emit(Tok::Dot, 1),
                c if c.is_ascii_digit() => self.number()?,
                c if c.is_ascii_alphabetic() || c == '_' => self.name(),
                other => {
                    return Err(self.error(
                        self.line,
                        self.column,
                        format!("unexpected character '{}'", other),
                    ))
                }
            }
        }
        if self.depth > 0 {
            return Err(self.error(self.line, self.column, "unclosed bracket at end of input"));
        }
        let (line, column) = (self.line, self.column);
        self.push(Tok::Newline, line, column);
        self.push(Tok::End, line, column);
        Ok(self.tokens)
    }
}

/// Split `source` into tokens; newlines inside brackets are dropped
pub fn tokenize(source: &str) -> Result<Vec<Token>, BlockError> {
    Lexer {
        chars: source.chars().collect(),
        pos: 0,
        line: 1,
        column: 1,
        depth: 0,
        tokens: Vec::new(),
    }
    .run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Tok> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.tok)
            .collect()
    }

    #[test]
    fn operators_and_literals() {
        assert_eq!(
            kinds("x = a ** 2 // 3.5 <= 'hi'"),
            vec![
                Tok::Name("x".to_string()),
                Tok::Assign,
                Tok::Name("a".to_string()),
                Tok::DoubleStar,
                Tok::Int(2),
                Tok::DoubleSlash,
                Tok::Float(3.5),
                Tok::Le,
                Tok::Str("hi".to_string()),
                Tok::Newline,
                Tok::End,
            ]
        );
    }

    #[test]
    fn newlines_inside_brackets_are_ignored() {
        let toks = kinds("f(1,\n 2)\ny");
        let newlines = toks.iter().filter(|t| **t == Tok::Newline).count();
        assert_eq!(newlines, 2);
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("# note\nx # trailing"),
            vec![
                Tok::Newline,
                Tok::Name("x".to_string()),
                Tok::Newline,
                Tok::End
            ]
        );
    }

    #[test]
    fn exponent_and_leading_dot_numbers() {
        assert_eq!(kinds("1e3")[0], Tok::Float(1000.0));
        assert_eq!(kinds(".5")[0], Tok::Float(0.5));
        assert_eq!(kinds("1_000")[0], Tok::Int(1000));
    }

    #[test]
    fn errors_carry_position() {
        match tokenize("x = 1\ny = $") {
            Err(BlockError::Parse { line, column, .. }) => {
                assert_eq!((line, column), (2, 5));
            }
            other => panic!("expected parse error, got {:?}", other),
        }
        assert!(tokenize("'open").is_err());
        assert!(tokenize("f(1").is_err());
        assert!(tokenize(")").is_err());
    }
}
