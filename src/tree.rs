//! The dispatch tree produced by compilation.
//!
//! Immutable once the compile call returns; all bound callables are `Arc`
//! trait objects, so one tree can serve concurrent read-only dispatch from
//! many threads. The external dispatcher matches live input against node
//! names and argument parsers, checks requirements, and invokes handlers
//! through [`ExecBinding`].

use std::fmt::Write;
use std::sync::Arc;

use async_trait::async_trait;

use cmdtree_types::{ArgumentParser, ExecutionSource, Requirement, SuggestionSource};

use crate::invoke::ExecBinding;

/// Compiled root description.
#[derive(Debug, Clone, PartialEq)]
pub enum Description {
    Text(String),
    Translated(String),
    Lines(Vec<String>),
}

/// One node of the dispatch tree.
pub struct CommandNode {
    pub name: String,
    pub kind: NodeKind,
    pub requirement: Option<Arc<dyn Requirement>>,
    pub suggestions: Option<Arc<dyn SuggestionSource>>,
    pub executes: Option<ExecBinding>,
    pub children: Vec<CommandNode>,
}

pub enum NodeKind {
    Root {
        aliases: Vec<String>,
        description: Option<Description>,
    },
    Literal,
    Argument {
        parser: Arc<dyn ArgumentParser>,
    },
}

impl CommandNode {
    pub fn is_executable(&self) -> bool {
        self.executes.is_some()
    }

    /// Whether the node's requirement admits the source. Nodes without a
    /// requirement admit everyone.
    pub fn allowed(&self, source: &dyn ExecutionSource) -> bool {
        match &self.requirement {
            Some(requirement) => requirement.test(source),
            None => true,
        }
    }

    /// Child lookup by declared name, in declaration order. Aliases live
    /// on the root node only and are the dispatcher's concern.
    pub fn find_child(&self, name: &str) -> Option<&CommandNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// The argument parser, for argument nodes.
    pub fn parser(&self) -> Option<&Arc<dyn ArgumentParser>> {
        match &self.kind {
            NodeKind::Argument { parser } => Some(parser),
            _ => None,
        }
    }

    /// Completion candidates for this node.
    pub async fn suggest(&self, source: &dyn ExecutionSource, partial: &str) -> Vec<String> {
        match &self.suggestions {
            Some(provider) => provider.suggest(source, partial).await,
            None => Vec::new(),
        }
    }

    /// Indented structural rendering, for logs and tooling.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        self.render_outline(&mut out, 0);
        out
    }

    fn render_outline(&self, out: &mut String, depth: usize) {
        let pad = "  ".repeat(depth);
        let label = match &self.kind {
            NodeKind::Root { aliases, .. } => {
                if aliases.is_empty() {
                    format!("command '{}'", self.name)
                } else {
                    format!("command '{}' (aliases: {})", self.name, aliases.join(", "))
                }
            }
            NodeKind::Literal => format!("literal '{}'", self.name),
            NodeKind::Argument { parser } => {
                format!("argument '{}': {}", self.name, parser.type_name())
            }
        };
        let mut flags = Vec::new();
        if self.requirement.is_some() {
            flags.push("requires");
        }
        if self.executes.is_some() {
            flags.push("executes");
        }
        if self.suggestions.is_some() {
            flags.push("suggests");
        }
        if flags.is_empty() {
            let _ = writeln!(out, "{}{}", pad, label);
        } else {
            let _ = writeln!(out, "{}{} [{}]", pad, label, flags.join(", "));
        }
        for child in &self.children {
            child.render_outline(out, depth + 1);
        }
    }
}

// =============================================================================
// SIMPLE HOOKS
// =============================================================================

/// Permission-node check against the execution source.
pub struct PermissionRequirement {
    node: String,
}

impl PermissionRequirement {
    pub fn new(node: impl Into<String>) -> Self {
        Self { node: node.into() }
    }

    pub fn node(&self) -> &str {
        &self.node
    }
}

impl Requirement for PermissionRequirement {
    fn test(&self, source: &dyn ExecutionSource) -> bool {
        source.has_permission(&self.node)
    }
}

/// Constant requirement, from `requires = true` / `requires = false`.
pub struct ConstRequirement(pub bool);

impl Requirement for ConstRequirement {
    fn test(&self, _source: &dyn ExecutionSource) -> bool {
        self.0
    }
}

/// Fixed suggestion set, filtered by the partial input.
pub struct StaticSuggestions {
    entries: Vec<String>,
}

impl StaticSuggestions {
    pub fn new(entries: Vec<String>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl SuggestionSource for StaticSuggestions {
    async fn suggest(&self, _source: &dyn ExecutionSource, partial: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.starts_with(partial))
            .cloned()
            .collect()
    }
}
