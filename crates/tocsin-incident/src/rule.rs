// SPDX-FileCopyrightText: 2026 Tocsin Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rule definitions.

use serde::{Deserialize, Serialize};
use tocsin_core::TocsinError;
use tocsin_expression::{Program, compile_rule};

/// A boolean expression watched over one scheduler's snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub rule_id: String,
    pub scheduler_id: String,
    pub expression: String,
    /// Close incidents outright once the rule stops firing, instead of
    /// parking them in `CAN_BE_CLOSED` for a human.
    #[serde(default)]
    pub auto_close: bool,
}

impl Rule {
    pub fn new(
        rule_id: impl Into<String>,
        scheduler_id: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            scheduler_id: scheduler_id.into(),
            expression: expression.into(),
            auto_close: false,
        }
    }

    #[must_use]
    pub fn with_auto_close(mut self, auto_close: bool) -> Self {
        self.auto_close = auto_close;
        self
    }

    /// Validate identifiers and type-check the expression as a rule.
    pub fn compile(self) -> Result<CompiledRule, TocsinError> {
        if self.rule_id.is_empty() {
            return Err(TocsinError::InvalidRequest("rule id must not be empty".into()));
        }
        if self.scheduler_id.is_empty() {
            return Err(TocsinError::InvalidRequest(
                "scheduler id must not be empty".into(),
            ));
        }
        let program = compile_rule(&self.expression)?;
        Ok(CompiledRule {
            rule: self,
            program,
        })
    }
}

/// A rule whose expression has passed the static checks.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    rule: Rule,
    program: Program,
}

impl CompiledRule {
    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn rule_id(&self) -> &str {
        &self.rule.rule_id
    }

    pub fn scheduler_id(&self) -> &str {
        &self.rule.scheduler_id
    }

    pub fn auto_close(&self) -> bool {
        self.rule.auto_close
    }

    pub fn program(&self) -> &Program {
        &self.program
    }
}
