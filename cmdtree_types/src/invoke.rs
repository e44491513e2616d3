//! Per-invocation argument storage and the invocation error union.
//!
//! An [`Invocation`] is allocated fresh for each dispatch and never shared
//! across invocations; no locking is needed on this path.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::hooks::ExecutionSource;
use crate::value::{ArgValue, ValueKind};

/// Default status for handlers whose work carries no status of its own.
pub const SUCCESS: i32 = 1;

/// Errors raised on the execution path.
///
/// Kept as an explicit union end to end; nothing is wrapped in or unwrapped
/// from panics. Compile-time problems are diagnostics instead and never
/// appear here.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InvokeError {
    /// A handler asked for an argument the dispatcher never supplied.
    /// Internal error: the compiler checked the name against the declared
    /// scope, so this indicates a dispatcher bug.
    #[error("required argument '{0}' was absent at invocation")]
    MissingArgument(String),

    /// An argument value had the wrong kind and no mapped value matched.
    #[error("argument '{name}': expected {expected}, found {found}")]
    ArgumentType {
        name: String,
        expected: ValueKind,
        found: ValueKind,
    },

    /// A chain hop was declared on the host descriptor but held no value
    /// at execution time.
    #[error("member '{0}' has no value")]
    AbsentMember(String),

    /// A host instance disagreed with its descriptor about a member's type.
    #[error("member '{name}': expected {expected}")]
    MemberMismatch {
        name: String,
        expected: &'static str,
    },

    /// The handler itself reported a failure.
    #[error("{0}")]
    Failed(String),
}

/// One argument's values for a single invocation: the parsed value plus any
/// mapped values produced by the transforms visible at the executing node.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentValue {
    pub parsed: ArgValue,
    pub mapped: Vec<ArgValue>,
}

impl ArgumentValue {
    pub fn new(parsed: ArgValue) -> Self {
        Self {
            parsed,
            mapped: Vec::new(),
        }
    }

    /// The value a parameter of the given kind should receive: the most
    /// recently mapped value of that kind, else the parsed value.
    pub fn preferred(&self, kind: ValueKind) -> &ArgValue {
        self.mapped
            .iter()
            .rev()
            .find(|v| v.kind() == kind)
            .unwrap_or(&self.parsed)
    }
}

/// Everything a handler sees for one dispatch: the execution source and the
/// parsed-and-possibly-mapped argument values keyed by name.
pub struct Invocation {
    source: Arc<dyn ExecutionSource>,
    args: HashMap<String, ArgumentValue>,
}

impl Invocation {
    pub fn new(source: Arc<dyn ExecutionSource>, args: HashMap<String, ArgumentValue>) -> Self {
        Self { source, args }
    }

    pub fn source(&self) -> &dyn ExecutionSource {
        self.source.as_ref()
    }

    /// Fetch a required parameter by its declared argument name. Prefers a
    /// mapped value of the declared kind, falls back to the parsed value if
    /// its kind matches.
    pub fn required(&self, name: &str, kind: ValueKind) -> Result<&ArgValue, InvokeError> {
        let arg = self
            .args
            .get(name)
            .ok_or_else(|| InvokeError::MissingArgument(name.to_string()))?;
        let value = arg.preferred(kind);
        if value.kind() != kind {
            return Err(InvokeError::ArgumentType {
                name: name.to_string(),
                expected: kind,
                found: value.kind(),
            });
        }
        Ok(value)
    }

    /// Fetch an optional parameter; absent names yield `None`, a present
    /// value of the wrong kind is still an error.
    pub fn optional(&self, name: &str, kind: ValueKind) -> Result<Option<&ArgValue>, InvokeError> {
        match self.args.get(name) {
            None => Ok(None),
            Some(arg) => {
                let value = arg.preferred(kind);
                if value.kind() != kind {
                    return Err(InvokeError::ArgumentType {
                        name: name.to_string(),
                        expected: kind,
                        found: value.kind(),
                    });
                }
                Ok(Some(value))
            }
        }
    }

    /// Raw access to an argument's storage, parsed and mapped values both.
    pub fn get(&self, name: &str) -> Option<&ArgumentValue> {
        self.args.get(name)
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}
