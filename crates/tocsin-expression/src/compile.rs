// SPDX-FileCopyrightText: 2026 Tocsin Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Static checking: resolves every name against the capability set and
//! lowers the syntax tree into a typed program.

use chrono::DateTime;
use tocsin_core::SchedulerCode;

use crate::ast::{BinaryOp, Expr, ExprKind, Span, UnaryOp};
use crate::env::{
    Builtin, Quantifier, SnapshotField, TimeBound, Type, Window, lookup_constant,
};
use crate::error::ExpressionError;
use crate::parser::parse;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompareOp {
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// Typed, name-resolved expression tree.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Int(i64),
    Bool(bool),
    Str(String),
    Code(SchedulerCode),
    Current,
    Not(Box<Node>),
    Neg(Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Compare {
        op: CompareOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Arith {
        op: ArithOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Window {
        window: Window,
        position: Box<Node>,
        filters: Vec<Node>,
    },
    UseCode(Box<Node>),
    UseTime {
        bound: TimeBound,
        value: Box<Node>,
    },
    Len(Box<Node>),
    Quantify {
        quantifier: Quantifier,
        list: Box<Node>,
        predicate: Box<Node>,
    },
    Index {
        list: Box<Node>,
        index: Box<Node>,
    },
    Field {
        target: Box<Node>,
        field: SnapshotField,
    },
}

/// A checked expression, ready to evaluate any number of times.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    source: String,
    pub(crate) root: Node,
    ty: Type,
}

impl Program {
    /// The expression text this program was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Static type of the result.
    pub fn result_type(&self) -> Type {
        self.ty
    }
}

/// Parse and check `source`.
pub fn compile(source: &str) -> Result<Program, ExpressionError> {
    let expr = parse(source)?;
    let (root, ty) = Checker { in_predicate: false }.check(&expr)?;
    Ok(Program {
        source: source.to_string(),
        root,
        ty,
    })
}

/// Like [`compile`], but also requires a boolean result.
pub fn compile_rule(source: &str) -> Result<Program, ExpressionError> {
    let program = compile(source)?;
    if program.ty != Type::Bool {
        return Err(ExpressionError::type_error(
            format!("rule must evaluate to bool, found {}", program.ty),
            (0, source.len()),
        ));
    }
    Ok(program)
}

/// Parse an RFC 3339 timestamp into Unix milliseconds.
pub(crate) fn parse_time(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.timestamp_millis())
}

#[derive(Clone, Copy)]
struct Checker {
    in_predicate: bool,
}

impl Checker {
    fn check(self, expr: &Expr) -> Result<(Node, Type), ExpressionError> {
        match &expr.kind {
            ExprKind::Int(v) => Ok((Node::Int(*v), Type::Int)),
            ExprKind::Bool(b) => Ok((Node::Bool(*b), Type::Bool)),
            ExprKind::Str(s) => Ok((Node::Str(s.clone()), Type::Str)),
            ExprKind::Ident(name) => self.ident(name, expr.span),
            ExprKind::Current => {
                if self.in_predicate {
                    Ok((Node::Current, Type::Snapshot))
                } else {
                    Err(ExpressionError::type_error(
                        "`#` is only available inside a predicate",
                        expr.span,
                    ))
                }
            }
            ExprKind::Unary { op, operand } => self.unary(*op, operand),
            ExprKind::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs, expr.span),
            ExprKind::Call {
                name,
                name_span,
                args,
            } => self.call(name, *name_span, args, expr.span),
            ExprKind::Index { target, index } => {
                let list = self.expect(target, Type::List)?;
                let index = self.expect(index, Type::Int)?;
                Ok((
                    Node::Index {
                        list: Box::new(list),
                        index: Box::new(index),
                    },
                    Type::Snapshot,
                ))
            }
            ExprKind::Field {
                target,
                name,
                name_span,
            } => {
                let target = self.expect(target, Type::Snapshot)?;
                let field = SnapshotField::lookup(name).ok_or_else(|| {
                    ExpressionError::type_error(
                        format!(
                            "snapshot has no field `{name}` (Code, Timestamp, Duration, Error, SchedulerId)"
                        ),
                        *name_span,
                    )
                })?;
                Ok((
                    Node::Field {
                        target: Box::new(target),
                        field,
                    },
                    field.field_type(),
                ))
            }
            ExprKind::Predicate(_) => Err(ExpressionError::type_error(
                "a predicate is only allowed as the second argument of all, any, none or count",
                expr.span,
            )),
        }
    }

    /// Check `expr` and require type `want`.
    fn expect(self, expr: &Expr, want: Type) -> Result<Node, ExpressionError> {
        let (node, ty) = self.check(expr)?;
        if ty == want {
            Ok(node)
        } else {
            Err(ExpressionError::type_error(
                format!("expected {want}, found {ty}"),
                expr.span,
            ))
        }
    }

    fn ident(self, name: &str, span: Span) -> Result<(Node, Type), ExpressionError> {
        if let Some(code) = lookup_constant(name) {
            return Ok((Node::Code(code), Type::Code));
        }
        if let Some(builtin) = Builtin::lookup(name) {
            return Err(ExpressionError::type_error(
                format!("`{name}` is a function: {}", builtin.signature()),
                span,
            ));
        }
        Err(ExpressionError::UnknownName {
            name: name.to_string(),
            span: span.into(),
        })
    }

    fn unary(self, op: UnaryOp, operand: &Expr) -> Result<(Node, Type), ExpressionError> {
        match op {
            UnaryOp::Not => {
                let node = self.expect(operand, Type::Bool)?;
                Ok((Node::Not(Box::new(node)), Type::Bool))
            }
            UnaryOp::Neg => {
                let node = self.expect(operand, Type::Int)?;
                Ok((Node::Neg(Box::new(node)), Type::Int))
            }
        }
    }

    fn binary(
        self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        span: Span,
    ) -> Result<(Node, Type), ExpressionError> {
        let compare = |op| -> Result<(Node, Type), ExpressionError> {
            let (l, lt) = self.check(lhs)?;
            let (r, rt) = self.check(rhs)?;
            Ok((
                Node::Compare {
                    op,
                    lhs: Box::new(l),
                    rhs: Box::new(r),
                },
                check_comparable(op, lt, rt, span)?,
            ))
        };
        let arith = |op| -> Result<(Node, Type), ExpressionError> {
            let l = self.expect(lhs, Type::Int)?;
            let r = self.expect(rhs, Type::Int)?;
            Ok((
                Node::Arith {
                    op,
                    lhs: Box::new(l),
                    rhs: Box::new(r),
                },
                Type::Int,
            ))
        };

        match op {
            BinaryOp::And | BinaryOp::Or => {
                let l = Box::new(self.expect(lhs, Type::Bool)?);
                let r = Box::new(self.expect(rhs, Type::Bool)?);
                let node = if op == BinaryOp::And {
                    Node::And(l, r)
                } else {
                    Node::Or(l, r)
                };
                Ok((node, Type::Bool))
            }
            BinaryOp::Eq => compare(CompareOp::Eq),
            BinaryOp::NotEq => compare(CompareOp::NotEq),
            BinaryOp::Lt => compare(CompareOp::Lt),
            BinaryOp::Le => compare(CompareOp::Le),
            BinaryOp::Gt => compare(CompareOp::Gt),
            BinaryOp::Ge => compare(CompareOp::Ge),
            BinaryOp::Add => arith(ArithOp::Add),
            BinaryOp::Sub => arith(ArithOp::Sub),
            BinaryOp::Mul => arith(ArithOp::Mul),
            BinaryOp::Div => arith(ArithOp::Div),
            BinaryOp::Rem => arith(ArithOp::Rem),
        }
    }

    fn call(
        self,
        name: &str,
        name_span: Span,
        args: &[Expr],
        span: Span,
    ) -> Result<(Node, Type), ExpressionError> {
        let Some(builtin) = Builtin::lookup(name) else {
            return Err(ExpressionError::UnknownName {
                name: name.to_string(),
                span: name_span.into(),
            });
        };
        let arity = |ok: bool| {
            if ok {
                Ok(())
            } else {
                Err(ExpressionError::type_error(
                    format!("wrong number of arguments, expected {}", builtin.signature()),
                    span,
                ))
            }
        };

        match builtin {
            Builtin::Window(window) => {
                arity(!args.is_empty())?;
                let position = self.expect(&args[0], Type::Int)?;
                let filters = args[1..]
                    .iter()
                    .map(|arg| self.expect(arg, Type::Filter))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((
                    Node::Window {
                        window,
                        position: Box::new(position),
                        filters,
                    },
                    Type::List,
                ))
            }
            Builtin::UseCode => {
                arity(args.len() == 1)?;
                let code = self.expect(&args[0], Type::Code)?;
                Ok((Node::UseCode(Box::new(code)), Type::Filter))
            }
            Builtin::UseTime(bound) => {
                arity(args.len() == 1)?;
                let value = self.expect(&args[0], Type::Str)?;
                if let Node::Str(literal) = &value {
                    if parse_time(literal).is_none() {
                        return Err(ExpressionError::type_error(
                            format!("`{literal}` is not an RFC 3339 timestamp"),
                            args[0].span,
                        ));
                    }
                }
                Ok((
                    Node::UseTime {
                        bound,
                        value: Box::new(value),
                    },
                    Type::Filter,
                ))
            }
            Builtin::Len => {
                arity(args.len() == 1)?;
                let list = self.expect(&args[0], Type::List)?;
                Ok((Node::Len(Box::new(list)), Type::Int))
            }
            Builtin::Quantifier(quantifier) => {
                arity(args.len() == 2)?;
                let list = self.expect(&args[0], Type::List)?;
                let ExprKind::Predicate(body) = &args[1].kind else {
                    return Err(ExpressionError::type_error(
                        format!("expected a `{{...}}` predicate: {}", builtin.signature()),
                        args[1].span,
                    ));
                };
                let predicate = Checker { in_predicate: true }.expect(body, Type::Bool)?;
                Ok((
                    Node::Quantify {
                        quantifier,
                        list: Box::new(list),
                        predicate: Box::new(predicate),
                    },
                    quantifier.result_type(),
                ))
            }
        }
    }
}

fn check_comparable(op: CompareOp, lt: Type, rt: Type, span: Span) -> Result<Type, ExpressionError> {
    let ordering = !matches!(op, CompareOp::Eq | CompareOp::NotEq);
    let ok = if ordering {
        lt == Type::Int && rt == Type::Int
    } else {
        lt == rt && matches!(lt, Type::Int | Type::Bool | Type::Str | Type::Code)
    };
    if ok {
        Ok(Type::Bool)
    } else {
        Err(ExpressionError::type_error(
            format!("cannot compare {lt} with {rt}"),
            span,
        ))
    }
}
