//! cmdtree: compiler for a command-tree declaration DSL
//!
//! Turns a textual command declaration into an immutable dispatch tree of
//! literal/argument nodes carrying bound callables: requirement checks,
//! execution handlers, suggestion providers, and argument-value mappers.
//! References in the source resolve either against a table of named
//! variables (`@name`) or against a host capability table via dotted
//! member chains.
//!
//! ## Pipeline
//!
//! ```text
//! Source → Lexer → Tokens → Parser → AST
//!                                     ↓
//!        Compiler(AST, CompileContext, TypeRegistry, HostObject)
//!                                     ↓
//!              Dispatch tree + accumulated diagnostics
//! ```
//!
//! Every stage appends to one diagnostic sink and keeps going; a compile
//! call fails once, at the end, with every collected problem. The produced
//! tree is consumed by an external dispatcher; execution-boundary types
//! live in the `cmdtree_types` crate.
//!
//! ```
//! use std::sync::Arc;
//! use cmdtree::{compile_source, CapabilityTable, CompileContext, MemberShape, default_registry};
//! use cmdtree_types::{FnExecutor, Invocation, SUCCESS};
//!
//! let host = CapabilityTable::builder("Demo")
//!     .executor(
//!         "greet",
//!         MemberShape::Method,
//!         vec![],
//!         Arc::new(FnExecutor(|_inv: &Invocation| Ok(SUCCESS))),
//!     )
//!     .build();
//! let ctx = CompileContext::new().with_host(host);
//! let tree = compile_source(
//!     "name = 'hello'\nliteral('world') = greet()",
//!     &ctx,
//!     default_registry(),
//! )
//! .unwrap();
//! assert!(tree.find_child("world").unwrap().is_executable());
//! ```

pub mod ast;
pub mod chain;
pub mod compiler;
pub mod context;
pub mod diagnostics;
pub mod host;
pub mod invoke;
pub mod lexer;
pub mod parser;
pub mod registry;
pub mod tree;

// Re-export commonly used types
pub use ast::CommandDecl;
pub use compiler::{compile, compile_source};
pub use context::{CompileContext, MapperTable, Variable};
pub use diagnostics::{CompileError, Diagnostic, Diagnostics, Severity, Span};
pub use host::{
    CapabilityTable, CapabilityTableBuilder, HostObject, MemberDecl, MemberShape, MemberType,
    MemberValue, ParamDecl, TypeDescriptor,
};
pub use invoke::ExecBinding;
pub use parser::parse;
pub use registry::{default_registry, TypeOptions, TypeRegistry};
pub use tree::{CommandNode, Description, NodeKind};
