// bdbg - Binary Image Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Textual expression syntax.
//!
//! Recursive descent over a small C-like grammar. `[ptr]:n` is a sized
//! memory read (`[esp+8]:4`); without the suffix the deref takes the
//! parser's default width. Numbers are decimal or `0x` hex, identifiers
//! are taken as register names and resolved later.

use eyre::{bail, Result};

use super::{BinOp, Expr, UnOp};

/// Deref width used when `[..]` carries no `:n` suffix.
pub const DEFAULT_DEREF_SIZE: u8 = 8;

/// Parse `input` with the default deref width of [`DEFAULT_DEREF_SIZE`].
pub fn parse_expr(input: &str) -> Result<Expr> {
    parse_expr_with_deref(input, DEFAULT_DEREF_SIZE)
}

/// Parse `input`, defaulting unsized derefs to `deref_size` bytes
/// (a frontend passes the target's pointer width here).
pub fn parse_expr_with_deref(input: &str, deref_size: u8) -> Result<Expr> {
    let mut parser = Parser { tokens: tokenize(input)?, pos: 0, deref_size };
    let expr = parser.or_expr()?;
    if parser.pos != parser.tokens.len() {
        bail!("trailing input after expression: {:?}", parser.tokens[parser.pos]);
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Int(u64),
    Ident(String),
    Op(char),
    Shl,
    Shr,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Colon,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '0'..='9' => {
                let mut text = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_alphanumeric() {
                        text.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = if let Some(hex) = text.strip_prefix("0x").or(text.strip_prefix("0X"))
                {
                    u64::from_str_radix(hex, 16)
                } else {
                    text.parse()
                };
                match value {
                    Ok(v) => tokens.push(Token::Int(v)),
                    Err(_) => bail!("bad integer literal {text:?}"),
                }
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let mut name = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' {
                        name.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(name));
            }
            '+' | '-' | '*' | '/' | '%' | '&' | '|' | '^' | '~' => {
                chars.next();
                tokens.push(Token::Op(c));
            }
            '<' | '>' => {
                chars.next();
                if chars.next() != Some(c) {
                    bail!("expected {c}{c}");
                }
                tokens.push(if c == '<' { Token::Shl } else { Token::Shr });
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '[' => {
                chars.next();
                tokens.push(Token::LBracket);
            }
            ']' => {
                chars.next();
                tokens.push(Token::RBracket);
            }
            ':' => {
                chars.next();
                tokens.push(Token::Colon);
            }
            _ => bail!("unexpected character {c:?}"),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    deref_size: u8,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> Result<()> {
        if self.eat(&token) {
            Ok(())
        } else {
            bail!("expected {token:?}, found {:?}", self.peek())
        }
    }

    // Precedence ladder, loosest first: | then ^ then & then shifts then
    // additive then multiplicative then unary.

    fn or_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.xor_expr()?;
        while self.eat(&Token::Op('|')) {
            lhs = Expr::Bin(BinOp::Or, Box::new(lhs), Box::new(self.xor_expr()?));
        }
        Ok(lhs)
    }

    fn xor_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.and_expr()?;
        while self.eat(&Token::Op('^')) {
            lhs = Expr::Bin(BinOp::Xor, Box::new(lhs), Box::new(self.and_expr()?));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.shift_expr()?;
        while self.eat(&Token::Op('&')) {
            lhs = Expr::Bin(BinOp::And, Box::new(lhs), Box::new(self.shift_expr()?));
        }
        Ok(lhs)
    }

    fn shift_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.add_expr()?;
        loop {
            let op = if self.eat(&Token::Shl) {
                BinOp::Shl
            } else if self.eat(&Token::Shr) {
                BinOp::Shr
            } else {
                return Ok(lhs);
            };
            lhs = Expr::Bin(op, Box::new(lhs), Box::new(self.add_expr()?));
        }
    }

    fn add_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.mul_expr()?;
        loop {
            let op = if self.eat(&Token::Op('+')) {
                BinOp::Add
            } else if self.eat(&Token::Op('-')) {
                BinOp::Sub
            } else {
                return Ok(lhs);
            };
            lhs = Expr::Bin(op, Box::new(lhs), Box::new(self.mul_expr()?));
        }
    }

    fn mul_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.unary()?;
        loop {
            let op = if self.eat(&Token::Op('*')) {
                BinOp::Mul
            } else if self.eat(&Token::Op('/')) {
                BinOp::Div
            } else if self.eat(&Token::Op('%')) {
                BinOp::Rem
            } else {
                return Ok(lhs);
            };
            lhs = Expr::Bin(op, Box::new(lhs), Box::new(self.unary()?));
        }
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.eat(&Token::Op('-')) {
            return Ok(Expr::Un(UnOp::Neg, Box::new(self.unary()?)));
        }
        if self.eat(&Token::Op('~')) {
            return Ok(Expr::Un(UnOp::Not, Box::new(self.unary()?)));
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<Expr> {
        match self.peek().cloned() {
            Some(Token::Int(v)) => {
                self.pos += 1;
                Ok(Expr::Int(v))
            }
            Some(Token::Ident(name)) => {
                self.pos += 1;
                Ok(Expr::Reg(name))
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.or_expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::LBracket) => {
                self.pos += 1;
                let ptr = self.or_expr()?;
                self.expect(Token::RBracket)?;
                let size = if self.eat(&Token::Colon) {
                    match self.peek() {
                        Some(&Token::Int(n @ (1 | 2 | 4 | 8))) => {
                            self.pos += 1;
                            n as u8
                        }
                        other => bail!("deref size must be 1, 2, 4 or 8, found {other:?}"),
                    }
                } else {
                    self.deref_size
                };
                Ok(Expr::Mem { ptr: Box::new(ptr), size })
            }
            other => bail!("expected an expression, found {other:?}"),
        }
    }
}
