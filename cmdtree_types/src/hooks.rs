//! Hook traits implemented by host capabilities.
//!
//! The compiler binds trait objects of these types into the dispatch tree;
//! the dispatcher invokes them. All hooks are `Send + Sync` so a compiled
//! tree can be dispatched from many threads concurrently.

use async_trait::async_trait;

use crate::invoke::{Invocation, InvokeError};
use crate::value::{ArgParseError, ArgValue, ValueKind};

/// The party a command is executed for (player, console, RPC peer, ...).
///
/// Supplied by the dispatcher per invocation. Requirements and permission
/// checks run against this.
pub trait ExecutionSource: Send + Sync {
    /// Display name of the source, used in messages.
    fn name(&self) -> &str;

    /// Whether the source holds the given permission node.
    fn has_permission(&self, node: &str) -> bool;
}

/// Parses one raw input token into a typed [`ArgValue`].
///
/// Instances are produced by registry factories from the option map of an
/// `argument(...)` declaration and stored on the argument's dispatch node.
pub trait ArgumentParser: Send + Sync {
    /// Registry name of the type this parser implements ("int", "word", ...).
    fn type_name(&self) -> &str;

    /// Kind of value this parser produces.
    fn kind(&self) -> ValueKind;

    fn parse(&self, input: &str) -> Result<ArgValue, ArgParseError>;
}

/// An execution handler bound to a node's `executes` clause.
pub trait CommandExecutor: Send + Sync {
    /// Runs the handler. Returns a numeric status; use [`crate::SUCCESS`]
    /// when there is nothing to report.
    fn execute(&self, invocation: &Invocation) -> Result<i32, InvokeError>;
}

/// A predicate bound to a node's `requires` clause.
pub trait Requirement: Send + Sync {
    fn test(&self, source: &dyn ExecutionSource) -> bool;
}

/// Produces completion candidates for an argument node.
///
/// Invoked by the host asynchronously; implementations must not block.
#[async_trait]
pub trait SuggestionSource: Send + Sync {
    async fn suggest(&self, source: &dyn ExecutionSource, partial: &str) -> Vec<String>;
}

/// Transforms one argument's parsed value before handler invocation.
pub trait ValueMapper: Send + Sync {
    fn map(&self, value: ArgValue, source: &dyn ExecutionSource)
        -> Result<ArgValue, InvokeError>;
}

// =============================================================================
// CLOSURE ADAPTERS
// =============================================================================

/// [`CommandExecutor`] from a closure.
pub struct FnExecutor<F>(pub F);

impl<F> CommandExecutor for FnExecutor<F>
where
    F: Fn(&Invocation) -> Result<i32, InvokeError> + Send + Sync,
{
    fn execute(&self, invocation: &Invocation) -> Result<i32, InvokeError> {
        (self.0)(invocation)
    }
}

/// [`Requirement`] from a closure.
pub struct FnRequirement<F>(pub F);

impl<F> Requirement for FnRequirement<F>
where
    F: Fn(&dyn ExecutionSource) -> bool + Send + Sync,
{
    fn test(&self, source: &dyn ExecutionSource) -> bool {
        (self.0)(source)
    }
}

/// [`ValueMapper`] from a closure.
pub struct FnMapper<F>(pub F);

impl<F> ValueMapper for FnMapper<F>
where
    F: Fn(ArgValue, &dyn ExecutionSource) -> Result<ArgValue, InvokeError> + Send + Sync,
{
    fn map(
        &self,
        value: ArgValue,
        source: &dyn ExecutionSource,
    ) -> Result<ArgValue, InvokeError> {
        (self.0)(value, source)
    }
}
