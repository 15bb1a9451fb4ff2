//! Predicate engine for declarative request guards.
//!
//! # Responsibilities
//! - Parse the two guard grammars (containment and comparison)
//! - Evaluate predicates against a string-keyed multimap
//! - Contain evaluation failures: a panicking predicate never aborts
//!   the request pipeline
//!
//! # Grammars
//! - Containment: `name` requires presence, `!name` requires absence
//! - Comparison: `name=value` requires at least one equal value;
//!   `name!=value` requires that no value equals `value`, which also
//!   holds when `name` is entirely absent
//!
//! # Design Decisions
//! - Only `=` and `!=` are wired; `>`, `<`, `>=`, `<=` are recognized by
//!   the grammar but rejected at parse time so configuration typos fail
//!   before `start`, not at request time

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

use regex::Regex;
use thiserror::Error;

use crate::http::params::ParamMap;

const CONTAINMENT_GRAMMAR: &str = r"^\s*([!]?)([^\s=><!]+)\s*$";
const COMPARISON_GRAMMAR: &str = r"^\s*([^\s!><=]+)\s*([><!]?=|>|<)(.*)$";

fn containment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(CONTAINMENT_GRAMMAR).expect("containment grammar"))
}

fn comparison_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(COMPARISON_GRAMMAR).expect("comparison grammar"))
}

/// Failure to turn a guard expression into a predicate.
#[derive(Debug, Error)]
pub enum PredicateParseError {
    #[error("guard expression {0:?} matches neither grammar")]
    InvalidExpression(String),

    #[error("operator {operator:?} in {expression:?} is not supported (only = and !=)")]
    UnsupportedOperator {
        expression: String,
        operator: String,
    },
}

enum Test {
    /// Key has at least one value.
    Present,
    /// At least one value equals the operand.
    ValueEquals(String),
    /// Caller-supplied evaluation function.
    Custom(Arc<dyn Fn(&ParamMap) -> bool + Send + Sync>),
}

impl fmt::Debug for Test {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Test::Present => write!(f, "Present"),
            Test::ValueEquals(v) => write!(f, "ValueEquals({v:?})"),
            Test::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// An immutable boolean guard over query parameters or headers.
#[derive(Debug, Clone)]
pub struct Predicate {
    name: String,
    negated: bool,
    test: Arc<Test>,
}

impl Predicate {
    /// Parse a guard expression using the containment grammar first,
    /// then the comparison grammar.
    pub fn parse(expression: &str) -> Result<Self, PredicateParseError> {
        if let Some(caps) = containment_re().captures(expression) {
            return Ok(Self {
                name: caps[2].to_string(),
                negated: &caps[1] == "!",
                test: Arc::new(Test::Present),
            });
        }

        if let Some(caps) = comparison_re().captures(expression) {
            let operator = &caps[2];
            return match operator {
                "=" | "!=" => Ok(Self {
                    name: caps[1].to_string(),
                    negated: operator == "!=",
                    test: Arc::new(Test::ValueEquals(caps[3].to_string())),
                }),
                _ => Err(PredicateParseError::UnsupportedOperator {
                    expression: expression.to_string(),
                    operator: operator.to_string(),
                }),
            };
        }

        Err(PredicateParseError::InvalidExpression(
            expression.to_string(),
        ))
    }

    /// Build a predicate from a caller-supplied evaluation function.
    pub fn custom(
        name: impl Into<String>,
        test: impl Fn(&ParamMap) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            negated: false,
            test: Arc::new(Test::Custom(Arc::new(test))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn negated(&self) -> bool {
        self.negated
    }

    /// Evaluate against a multimap.
    ///
    /// A panic inside the test is caught, logged, and treated as
    /// non-matching; predicate evaluation never unwinds into the matcher.
    pub fn test(&self, values: &ParamMap) -> bool {
        let outcome = catch_unwind(AssertUnwindSafe(|| self.raw_test(values)));
        match outcome {
            Ok(matched) => {
                if self.negated {
                    !matched
                } else {
                    matched
                }
            }
            Err(_) => {
                tracing::warn!(
                    predicate = %self.name,
                    input_keys = values.len(),
                    "Predicate evaluation panicked; treating as non-matching"
                );
                false
            }
        }
    }

    fn raw_test(&self, values: &ParamMap) -> bool {
        match self.test.as_ref() {
            Test::Present => values.contains(&self.name),
            Test::ValueEquals(operand) => values
                .get_all(&self.name)
                .iter()
                .any(|value| value == operand),
            Test::Custom(f) => f(values),
        }
    }
}

// Display shows the canonical guard name for log lines.
impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "!{}", self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}
