// SPDX-FileCopyrightText: 2026 Tocsin Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recursive-descent parser.
//!
//! Precedence, loosest first: `||`/`or`, `&&`/`and`, `==` `!=`,
//! `<` `<=` `>` `>=`, `+` `-`, `*` `/` `%`, prefix `!`/`not`/`-`,
//! postfix `[i]` and `.Field`.

use crate::ast::{BinaryOp, Expr, ExprKind, Span, UnaryOp};
use crate::error::ExpressionError;
use crate::lexer::{Token, TokenKind, tokenize};

/// Deepest nesting accepted before the parser gives up.
const MAX_DEPTH: usize = 64;

/// Longest token stream accepted. Every node consumes at least one token, so
/// this also bounds the size of the tree.
const MAX_TOKENS: usize = 4096;

/// Tallest tree accepted. Checking and evaluation recurse once per level.
const MAX_HEIGHT: usize = 256;

/// Parse a complete expression.
pub fn parse(src: &str) -> Result<Expr, ExpressionError> {
    let tokens = tokenize(src)?;
    if tokens.len() > MAX_TOKENS {
        return Err(ExpressionError::syntax(
            format!("expression longer than {MAX_TOKENS} tokens"),
            tokens[MAX_TOKENS].span(),
        ));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.expression()?;
    let trailing = parser.peek();
    if trailing.kind != TokenKind::Eof {
        return Err(ExpressionError::syntax(
            "unexpected input after expression",
            trailing.span(),
        ));
    }
    if height(&expr) > MAX_HEIGHT {
        return Err(ExpressionError::syntax(
            format!("expression nested deeper than {MAX_HEIGHT} levels"),
            expr.span,
        ));
    }
    Ok(expr)
}

/// Height of the tree, walked with an explicit stack.
fn height(root: &Expr) -> usize {
    let mut tallest = 0;
    let mut stack = vec![(root, 1)];
    while let Some((expr, level)) = stack.pop() {
        tallest = tallest.max(level);
        let below = level + 1;
        match &expr.kind {
            ExprKind::Int(_)
            | ExprKind::Str(_)
            | ExprKind::Bool(_)
            | ExprKind::Ident(_)
            | ExprKind::Current => {}
            ExprKind::Unary { operand, .. } => stack.push((operand.as_ref(), below)),
            ExprKind::Binary { lhs, rhs, .. } => {
                stack.push((lhs.as_ref(), below));
                stack.push((rhs.as_ref(), below));
            }
            ExprKind::Call { args, .. } => stack.extend(args.iter().map(|arg| (arg, below))),
            ExprKind::Index { target, index } => {
                stack.push((target.as_ref(), below));
                stack.push((index.as_ref(), below));
            }
            ExprKind::Field { target, .. } => stack.push((target.as_ref(), below)),
            ExprKind::Predicate(body) => stack.push((body.as_ref(), below)),
        }
    }
    tallest
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // tokenize always ends with Eof and advance never passes it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<Token, ExpressionError> {
        if &self.peek().kind == kind {
            Ok(self.advance())
        } else {
            let found = self.peek();
            Err(ExpressionError::syntax(
                format!("expected {what}, found {}", describe(&found.kind)),
                found.span(),
            ))
        }
    }

    fn expression(&mut self) -> Result<Expr, ExpressionError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExpressionError::syntax(
                "expression nested too deeply",
                self.peek().span(),
            ));
        }
        let expr = self.or();
        self.depth -= 1;
        expr
    }

    fn binary_level(
        &mut self,
        next: fn(&mut Self) -> Result<Expr, ExpressionError>,
        ops: &[(TokenKind, BinaryOp)],
    ) -> Result<Expr, ExpressionError> {
        let mut lhs = next(self)?;
        'outer: loop {
            for (kind, op) in ops {
                if self.eat(kind) {
                    let rhs = next(self)?;
                    let span = lhs.span.to(rhs.span);
                    lhs = Expr {
                        kind: ExprKind::Binary {
                            op: *op,
                            lhs: Box::new(lhs),
                            rhs: Box::new(rhs),
                        },
                        span,
                    };
                    continue 'outer;
                }
            }
            return Ok(lhs);
        }
    }

    fn or(&mut self) -> Result<Expr, ExpressionError> {
        self.binary_level(Self::and, &[(TokenKind::Or, BinaryOp::Or)])
    }

    fn and(&mut self) -> Result<Expr, ExpressionError> {
        self.binary_level(Self::equality, &[(TokenKind::And, BinaryOp::And)])
    }

    fn equality(&mut self) -> Result<Expr, ExpressionError> {
        self.binary_level(
            Self::comparison,
            &[
                (TokenKind::EqEq, BinaryOp::Eq),
                (TokenKind::NotEq, BinaryOp::NotEq),
            ],
        )
    }

    fn comparison(&mut self) -> Result<Expr, ExpressionError> {
        self.binary_level(
            Self::additive,
            &[
                (TokenKind::Le, BinaryOp::Le),
                (TokenKind::Lt, BinaryOp::Lt),
                (TokenKind::Ge, BinaryOp::Ge),
                (TokenKind::Gt, BinaryOp::Gt),
            ],
        )
    }

    fn additive(&mut self) -> Result<Expr, ExpressionError> {
        self.binary_level(
            Self::multiplicative,
            &[
                (TokenKind::Plus, BinaryOp::Add),
                (TokenKind::Minus, BinaryOp::Sub),
            ],
        )
    }

    fn multiplicative(&mut self) -> Result<Expr, ExpressionError> {
        self.binary_level(
            Self::unary,
            &[
                (TokenKind::Star, BinaryOp::Mul),
                (TokenKind::Slash, BinaryOp::Div),
                (TokenKind::Percent, BinaryOp::Rem),
            ],
        )
    }

    fn unary(&mut self) -> Result<Expr, ExpressionError> {
        let op = match self.peek().kind {
            TokenKind::Not => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            _ => return self.postfix(),
        };
        let start = self.advance().start;
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExpressionError::syntax(
                "expression nested too deeply",
                self.peek().span(),
            ));
        }
        let operand = self.unary();
        self.depth -= 1;
        let operand = operand?;
        Ok(Expr {
            span: Span::new(start, operand.span.end),
            kind: ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
        })
    }

    fn postfix(&mut self) -> Result<Expr, ExpressionError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&TokenKind::LBracket) {
                let index = self.expression()?;
                let close = self.expect(&TokenKind::RBracket, "`]`")?;
                expr = Expr {
                    span: Span::new(expr.span.start, close.start + close.len),
                    kind: ExprKind::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    },
                };
            } else if self.eat(&TokenKind::Dot) {
                let token = self.advance();
                let TokenKind::Ident(name) = token.kind else {
                    return Err(ExpressionError::syntax(
                        format!("expected field name, found {}", describe(&token.kind)),
                        token.span(),
                    ));
                };
                let name_span = Span::new(token.start, token.start + token.len);
                expr = Expr {
                    span: expr.span.to(name_span),
                    kind: ExprKind::Field {
                        target: Box::new(expr),
                        name,
                        name_span,
                    },
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ExpressionError> {
        let token = self.advance();
        let token_span = token.span();
        let span = Span::new(token.start, token.start + token.len);
        let kind = match token.kind {
            TokenKind::Int(v) => ExprKind::Int(v),
            TokenKind::Str(s) => ExprKind::Str(s),
            TokenKind::True => ExprKind::Bool(true),
            TokenKind::False => ExprKind::Bool(false),
            TokenKind::Hash => ExprKind::Current,
            TokenKind::Ident(name) if self.peek().kind == TokenKind::LParen => {
                self.advance();
                let args = self.arguments()?;
                let close = self.expect(&TokenKind::RParen, "`)`")?;
                return Ok(Expr {
                    span: Span::new(span.start, close.start + close.len),
                    kind: ExprKind::Call {
                        name,
                        name_span: span,
                        args,
                    },
                });
            }
            TokenKind::Ident(name) => ExprKind::Ident(name),
            TokenKind::LParen => {
                let inner = self.expression()?;
                let close = self.expect(&TokenKind::RParen, "`)`")?;
                return Ok(Expr {
                    span: Span::new(span.start, close.start + close.len),
                    ..inner
                });
            }
            TokenKind::LBrace => {
                let body = self.expression()?;
                let close = self.expect(&TokenKind::RBrace, "`}`")?;
                return Ok(Expr {
                    span: Span::new(span.start, close.start + close.len),
                    kind: ExprKind::Predicate(Box::new(body)),
                });
            }
            other => {
                return Err(ExpressionError::syntax(
                    format!("expected expression, found {}", describe(&other)),
                    token_span,
                ));
            }
        };
        Ok(Expr { kind, span })
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, ExpressionError> {
        let mut args = Vec::new();
        if self.peek().kind == TokenKind::RParen {
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            if !self.eat(&TokenKind::Comma) {
                return Ok(args);
            }
        }
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Int(v) => format!("integer `{v}`"),
        TokenKind::Str(_) => "string".to_string(),
        TokenKind::Ident(name) => format!("`{name}`"),
        TokenKind::Eof => "end of input".to_string(),
        other => format!("`{}`", symbol(other)),
    }
}

fn symbol(kind: &TokenKind) -> &'static str {
    match kind {
        TokenKind::True => "true",
        TokenKind::False => "false",
        TokenKind::LParen => "(",
        TokenKind::RParen => ")",
        TokenKind::LBracket => "[",
        TokenKind::RBracket => "]",
        TokenKind::LBrace => "{",
        TokenKind::RBrace => "}",
        TokenKind::Comma => ",",
        TokenKind::Dot => ".",
        TokenKind::Hash => "#",
        TokenKind::Plus => "+",
        TokenKind::Minus => "-",
        TokenKind::Star => "*",
        TokenKind::Slash => "/",
        TokenKind::Percent => "%",
        TokenKind::EqEq => "==",
        TokenKind::NotEq => "!=",
        TokenKind::Lt => "<",
        TokenKind::Le => "<=",
        TokenKind::Gt => ">",
        TokenKind::Ge => ">=",
        TokenKind::And => "&&",
        TokenKind::Or => "||",
        TokenKind::Not => "!",
        TokenKind::Int(_) | TokenKind::Str(_) | TokenKind::Ident(_) | TokenKind::Eof => "token",
    }
}
