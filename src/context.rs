//! The environment a compile call runs in.
//!
//! [`CompileContext`] carries the compile-wide, read-only inputs: the
//! variable table consulted for `@name` references, the host object, and
//! the default-permission template. [`Scope`] is the per-branch state
//! (visible argument names and the mapper table); it is passed by value and
//! cloned where subtrees branch, so additions in one subtree are never
//! observed by a sibling. The diagnostic sink is the only shared mutable
//! state of a compile call and lives outside both.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use cmdtree_types::{
    ArgumentParser, CommandExecutor, Requirement, SuggestionSource, ValueMapper,
};

use crate::host::HostObject;

/// A value bound to a `@name` reference. Every consultation type-checks the
/// binding against the position it is used in.
#[derive(Clone)]
pub enum Variable {
    Str(String),
    Bool(bool),
    Parser(Arc<dyn ArgumentParser>),
    Executor(Arc<dyn CommandExecutor>),
    Requirement(Arc<dyn Requirement>),
    Suggestions(Arc<dyn SuggestionSource>),
    Mapper(Arc<dyn ValueMapper>),
}

impl Variable {
    /// How the bound value reads in a mismatch diagnostic.
    pub fn type_name(&self) -> &'static str {
        match self {
            Variable::Str(_) => "a string",
            Variable::Bool(_) => "a boolean",
            Variable::Parser(_) => "an argument parser",
            Variable::Executor(_) => "an executor",
            Variable::Requirement(_) => "a requirement",
            Variable::Suggestions(_) => "a suggestion provider",
            Variable::Mapper(_) => "a mapper",
        }
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variable::Str(s) => write!(f, "Str({:?})", s),
            Variable::Bool(b) => write!(f, "Bool({})", b),
            other => f.write_str(other.type_name()),
        }
    }
}

/// Read-only inputs of one compile call.
#[derive(Default)]
pub struct CompileContext {
    variables: HashMap<String, Variable>,
    host: Option<Arc<dyn HostObject>>,
    permission_template: Option<String>,
}

impl CompileContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: Variable) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    pub fn with_host(mut self, host: Arc<dyn HostObject>) -> Self {
        self.host = Some(host);
        self
    }

    /// Template applied when the declaration carries no `permission`
    /// clause; `{command}` is replaced with the command name.
    pub fn with_permission_template(mut self, template: impl Into<String>) -> Self {
        self.permission_template = Some(template.into());
        self
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn host(&self) -> Option<&Arc<dyn HostObject>> {
        self.host.as_ref()
    }

    pub fn permission_template(&self) -> Option<&str> {
        self.permission_template.as_deref()
    }
}

/// Per-argument-name mapper lists, keyed by argument name.
pub type MapperTable = HashMap<String, Vec<Arc<dyn ValueMapper>>>;

/// Per-branch compile state. Cloning at each branch point is what keeps
/// sibling subtrees from observing each other's mappers.
#[derive(Clone, Default)]
pub(crate) struct Scope {
    /// Argument names visible here: pushed entering an argument node,
    /// gone when the branch's clone is dropped.
    pub args: Vec<String>,
    pub mappers: MapperTable,
}

impl Scope {
    pub fn is_visible(&self, name: &str) -> bool {
        self.args.iter().any(|a| a == name)
    }

    /// The innermost enclosing argument's name, the default target of an
    /// unnamed `map_result`.
    pub fn innermost(&self) -> Option<&str> {
        self.args.last().map(String::as_str)
    }

    pub fn add_mapper(&mut self, arg: &str, mapper: Arc<dyn ValueMapper>) {
        self.mappers.entry(arg.to_string()).or_default().push(mapper);
    }
}
