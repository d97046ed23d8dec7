// SPDX-FileCopyrightText: 2026 Tocsin Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Asynchronous evaluation of compiled programs against a snapshot source.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use tracing::{debug, warn};

use tocsin_config::model::EvaluatorConfig;
use tocsin_core::types::SchedulerSnapshot;
use tocsin_core::{SchedulerCode, SnapshotSource};

use crate::compile::{ArithOp, CompareOp, Node, Program, compile, compile_rule, parse_time};
use crate::env::{Quantifier, SnapshotField, SnapshotFilter, TimeBound, Window, window_query};
use crate::error::ExpressionError;

/// Result of an evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Str(String),
    Code(SchedulerCode),
    Snapshot(SchedulerSnapshot),
    List(Vec<SchedulerSnapshot>),
    Filter(SnapshotFilter),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v:?}"),
            Value::Code(code) => write!(f, "{code}"),
            Value::Snapshot(s) => write!(f, "{}@{}:{}", s.scheduler_id, s.timestamp, s.code),
            Value::List(items) => write!(f, "[{} snapshots]", items.len()),
            Value::Filter(filter) => write!(f, "{filter:?}"),
        }
    }
}

/// Evaluates rule programs for any scheduler against one snapshot source.
#[derive(Clone)]
pub struct Evaluator {
    source: Arc<dyn SnapshotSource>,
    max_window: u32,
    timeout: Duration,
}

impl fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evaluator")
            .field("max_window", &self.max_window)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Evaluator {
    /// An evaluator with the default window limit and deadline.
    pub fn new(source: Arc<dyn SnapshotSource>) -> Self {
        Self::from_config(source, &EvaluatorConfig::default())
    }

    pub fn from_config(source: Arc<dyn SnapshotSource>, config: &EvaluatorConfig) -> Self {
        Self {
            source,
            max_window: config.max_window,
            timeout: config.evaluation_timeout(),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_window(mut self, max_window: u32) -> Self {
        self.max_window = max_window;
        self
    }

    /// Run `program` in the environment of `scheduler_id`.
    ///
    /// A failed snapshot query aborts the evaluation with
    /// [`ExpressionError::Store`]; it is never reported as an empty window.
    pub async fn evaluate(
        &self,
        scheduler_id: &str,
        program: &Program,
    ) -> Result<Value, ExpressionError> {
        let scope = Scope {
            source: self.source.as_ref(),
            scheduler_id,
            max_window: self.max_window,
        };
        let result = match tokio::time::timeout(self.timeout, scope.eval(&program.root, None)).await {
            Ok(result) => result,
            Err(_) => Err(ExpressionError::Timeout {
                duration: self.timeout,
            }),
        };
        match &result {
            Ok(value) => debug!(scheduler_id, expression = program.source(), %value, "expression evaluated"),
            Err(e) => warn!(scheduler_id, expression = program.source(), error = %e, "expression evaluation failed"),
        }
        result
    }

    /// Compile and run `source` in one step.
    pub async fn evaluate_str(
        &self,
        scheduler_id: &str,
        source: &str,
    ) -> Result<Value, ExpressionError> {
        let program = compile(source)?;
        self.evaluate(scheduler_id, &program).await
    }

    /// Run a boolean rule program.
    pub async fn evaluate_rule(
        &self,
        scheduler_id: &str,
        program: &Program,
    ) -> Result<bool, ExpressionError> {
        match self.evaluate(scheduler_id, program).await? {
            Value::Bool(b) => Ok(b),
            other => Err(ExpressionError::runtime(format!(
                "rule produced {other} instead of a boolean"
            ))),
        }
    }

    /// Compile `source` as a rule and run it.
    pub async fn evaluate_rule_str(
        &self,
        scheduler_id: &str,
        source: &str,
    ) -> Result<bool, ExpressionError> {
        let program = compile_rule(source)?;
        self.evaluate_rule(scheduler_id, &program).await
    }
}

/// Per-evaluation environment bound to one scheduler.
struct Scope<'a> {
    source: &'a dyn SnapshotSource,
    scheduler_id: &'a str,
    max_window: u32,
}

impl Scope<'_> {
    fn eval<'s>(
        &'s self,
        node: &'s Node,
        current: Option<&'s SchedulerSnapshot>,
    ) -> BoxFuture<'s, Result<Value, ExpressionError>> {
        async move {
            let value = match node {
                Node::Int(v) => Value::Int(*v),
                Node::Bool(b) => Value::Bool(*b),
                Node::Str(s) => Value::Str(s.clone()),
                Node::Code(code) => Value::Code(*code),
                Node::Current => match current {
                    Some(snapshot) => Value::Snapshot(snapshot.clone()),
                    None => return Err(ExpressionError::runtime("`#` used outside a predicate")),
                },
                Node::Not(inner) => Value::Bool(!self.bool(inner, current).await?),
                Node::Neg(inner) => {
                    let v = self.int(inner, current).await?;
                    Value::Int(
                        v.checked_neg()
                            .ok_or_else(|| ExpressionError::runtime("integer overflow"))?,
                    )
                }
                Node::And(lhs, rhs) => {
                    Value::Bool(self.bool(lhs, current).await? && self.bool(rhs, current).await?)
                }
                Node::Or(lhs, rhs) => {
                    Value::Bool(self.bool(lhs, current).await? || self.bool(rhs, current).await?)
                }
                Node::Compare { op, lhs, rhs } => {
                    let l = self.eval(lhs, current).await?;
                    let r = self.eval(rhs, current).await?;
                    Value::Bool(compare(*op, &l, &r)?)
                }
                Node::Arith { op, lhs, rhs } => {
                    let l = self.int(lhs, current).await?;
                    let r = self.int(rhs, current).await?;
                    Value::Int(arith(*op, l, r)?)
                }
                Node::Window {
                    window,
                    position,
                    filters,
                } => {
                    let position = self.int(position, current).await?;
                    let mut resolved = Vec::with_capacity(filters.len());
                    for filter in filters {
                        match self.eval(filter, current).await? {
                            Value::Filter(f) => resolved.push(f),
                            other => return Err(unexpected("filter", &other)),
                        }
                    }
                    Value::List(self.window(*window, position, &resolved).await?)
                }
                Node::UseCode(code) => match self.eval(code, current).await? {
                    Value::Code(code) => Value::Filter(SnapshotFilter::Code(code)),
                    other => return Err(unexpected("code", &other)),
                },
                Node::UseTime { bound, value } => {
                    let text = match self.eval(value, current).await? {
                        Value::Str(text) => text,
                        other => return Err(unexpected("string", &other)),
                    };
                    let ms = parse_time(&text).ok_or_else(|| {
                        ExpressionError::runtime(format!("`{text}` is not an RFC 3339 timestamp"))
                    })?;
                    Value::Filter(match bound {
                        TimeBound::From => SnapshotFilter::TimeFrom(ms),
                        TimeBound::To => SnapshotFilter::TimeTo(ms),
                    })
                }
                Node::Len(list) => {
                    let items = self.list(list, current).await?;
                    Value::Int(i64::try_from(items.len()).unwrap_or(i64::MAX))
                }
                Node::Quantify {
                    quantifier,
                    list,
                    predicate,
                } => {
                    let items = self.list(list, current).await?;
                    self.quantify(*quantifier, &items, predicate).await?
                }
                Node::Index { list, index } => {
                    let items = self.list(list, current).await?;
                    let i = self.int(index, current).await?;
                    let snapshot = usize::try_from(i)
                        .ok()
                        .and_then(|i| items.into_iter().nth(i))
                        .ok_or_else(|| {
                            ExpressionError::runtime(format!("index {i} out of range"))
                        })?;
                    Value::Snapshot(snapshot)
                }
                Node::Field { target, field } => {
                    let snapshot = match self.eval(target, current).await? {
                        Value::Snapshot(s) => s,
                        other => return Err(unexpected("snapshot", &other)),
                    };
                    read_field(snapshot, *field)
                }
            };
            Ok(value)
        }
        .boxed()
    }

    async fn bool(
        &self,
        node: &Node,
        current: Option<&SchedulerSnapshot>,
    ) -> Result<bool, ExpressionError> {
        match self.eval(node, current).await? {
            Value::Bool(b) => Ok(b),
            other => Err(unexpected("bool", &other)),
        }
    }

    async fn int(
        &self,
        node: &Node,
        current: Option<&SchedulerSnapshot>,
    ) -> Result<i64, ExpressionError> {
        match self.eval(node, current).await? {
            Value::Int(v) => Ok(v),
            other => Err(unexpected("int", &other)),
        }
    }

    async fn list(
        &self,
        node: &Node,
        current: Option<&SchedulerSnapshot>,
    ) -> Result<Vec<SchedulerSnapshot>, ExpressionError> {
        match self.eval(node, current).await? {
            Value::List(items) => Ok(items),
            other => Err(unexpected("list", &other)),
        }
    }

    async fn quantify(
        &self,
        quantifier: Quantifier,
        items: &[SchedulerSnapshot],
        predicate: &Node,
    ) -> Result<Value, ExpressionError> {
        let mut matched: i64 = 0;
        for item in items {
            let hit = match self.eval(predicate, Some(item)).await? {
                Value::Bool(b) => b,
                other => return Err(unexpected("bool", &other)),
            };
            match (quantifier, hit) {
                (Quantifier::All, false) => return Ok(Value::Bool(false)),
                (Quantifier::Any, true) => return Ok(Value::Bool(true)),
                (Quantifier::None, true) => return Ok(Value::Bool(false)),
                (Quantifier::Count, true) => matched += 1,
                _ => {}
            }
        }
        Ok(match quantifier {
            Quantifier::All | Quantifier::None => Value::Bool(true),
            Quantifier::Any => Value::Bool(false),
            Quantifier::Count => Value::Int(matched),
        })
    }

    async fn window(
        &self,
        window: Window,
        position: i64,
        filters: &[SnapshotFilter],
    ) -> Result<Vec<SchedulerSnapshot>, ExpressionError> {
        let position = match window {
            Window::Last | Window::First => u32::try_from(position)
                .ok()
                .filter(|n| (1..=self.max_window).contains(n))
                .ok_or_else(|| {
                    ExpressionError::runtime(format!(
                        "{}({position}): window size must be between 1 and {}",
                        window.name(),
                        self.max_window
                    ))
                })?,
            Window::Index => u32::try_from(position)
                .ok()
                .filter(|i| *i < u32::MAX)
                .ok_or_else(|| {
                    ExpressionError::runtime(format!("index({position}): index must not be negative"))
                })?,
        };

        let query = window_query(self.scheduler_id, window, position, filters);
        debug!(
            scheduler_id = self.scheduler_id,
            op = window.name(),
            position,
            filters = filters.len(),
            "fetching snapshot window"
        );
        let page = self
            .source
            .get_snapshots(&query)
            .await
            .map_err(|source| ExpressionError::Store {
                operation: window.name(),
                source,
            })?;
        Ok(page.items)
    }
}

/// Called on defensive paths that the checker already rules out.
fn unexpected(want: &str, found: &Value) -> ExpressionError {
    ExpressionError::runtime(format!("expected {want}, found {found}"))
}

fn compare(op: CompareOp, lhs: &Value, rhs: &Value) -> Result<bool, ExpressionError> {
    if let (Value::Int(l), Value::Int(r)) = (lhs, rhs) {
        return Ok(match op {
            CompareOp::Eq => l == r,
            CompareOp::NotEq => l != r,
            CompareOp::Lt => l < r,
            CompareOp::Le => l <= r,
            CompareOp::Gt => l > r,
            CompareOp::Ge => l >= r,
        });
    }
    let equal = match (lhs, rhs) {
        (Value::Bool(l), Value::Bool(r)) => l == r,
        (Value::Str(l), Value::Str(r)) => l == r,
        (Value::Code(l), Value::Code(r)) => l == r,
        _ => {
            return Err(ExpressionError::runtime(format!(
                "cannot compare {lhs} with {rhs}"
            )));
        }
    };
    match op {
        CompareOp::Eq => Ok(equal),
        CompareOp::NotEq => Ok(!equal),
        _ => Err(ExpressionError::runtime(format!(
            "cannot order {lhs} and {rhs}"
        ))),
    }
}

fn arith(op: ArithOp, l: i64, r: i64) -> Result<i64, ExpressionError> {
    let result = match op {
        ArithOp::Add => l.checked_add(r),
        ArithOp::Sub => l.checked_sub(r),
        ArithOp::Mul => l.checked_mul(r),
        ArithOp::Div | ArithOp::Rem if r == 0 => {
            return Err(ExpressionError::runtime("division by zero"));
        }
        ArithOp::Div => l.checked_div(r),
        ArithOp::Rem => l.checked_rem(r),
    };
    result.ok_or_else(|| ExpressionError::runtime("integer overflow"))
}

fn read_field(snapshot: SchedulerSnapshot, field: SnapshotField) -> Value {
    match field {
        SnapshotField::Code => Value::Code(snapshot.code),
        SnapshotField::Timestamp => Value::Int(snapshot.timestamp),
        SnapshotField::Duration => Value::Int(snapshot.duration_ms),
        SnapshotField::Error => Value::Str(snapshot.error_message.unwrap_or_default()),
        SnapshotField::SchedulerId => Value::Str(snapshot.scheduler_id),
    }
}
