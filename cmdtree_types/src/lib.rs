//! cmdtree_types: execution-boundary types for the cmdtree compiler
//!
//! This crate contains the contract between the compiler and the external
//! dispatcher, with no compiler internals:
//! - Argument values and value kinds ([`ArgValue`], [`ValueKind`])
//! - Hook traits implemented by host capabilities ([`CommandExecutor`],
//!   [`Requirement`], [`SuggestionSource`], [`ValueMapper`],
//!   [`ArgumentParser`])
//! - The execution source abstraction ([`ExecutionSource`])
//! - Per-invocation argument storage ([`ArgumentValue`], [`Invocation`])
//! - The invocation error union ([`InvokeError`])
//!
//! The compiler binds these hooks into the dispatch tree; the dispatcher
//! calls them with live input. Nothing here performs I/O.

pub mod hooks;
pub mod invoke;
pub mod value;

pub use hooks::{
    ArgumentParser, CommandExecutor, ExecutionSource, FnExecutor, FnMapper, FnRequirement,
    Requirement, SuggestionSource, ValueMapper,
};
pub use invoke::{ArgumentValue, Invocation, InvokeError, SUCCESS};
pub use value::{ArgParseError, ArgValue, ValueKind};
