//! The compiling pass: AST to dispatch tree with bound callables.
//!
//! One exhaustive walk over the declaration. Every resolution failure is
//! reported into the shared diagnostic sink with the node's span, and a
//! benign placeholder is substituted so the rest of the tree still
//! compiles; the compile call as a whole fails iff the sink holds any
//! error when the walk is done. Placeholders therefore never escape a
//! successful compile.

use std::sync::Arc;

use tracing::debug;

use cmdtree_types::{
    ArgParseError, ArgValue, ArgumentParser, CommandExecutor, Invocation, InvokeError, Requirement,
    SuggestionSource, ValueKind, ValueMapper, SUCCESS,
};

use crate::ast::*;
use crate::chain::{
    self, ChainConstraint, ChainExecutor, ChainMapper, ChainRequirement, ChainSuggestions,
    ResolvedChain, TerminalExpect,
};
use crate::context::{CompileContext, Scope, Variable};
use crate::diagnostics::{CompileError, Diagnostics, Span};
use crate::host::HostObject;
use crate::invoke::ExecBinding;
use crate::parser;
use crate::registry::TypeRegistry;
use crate::tree::{CommandNode, ConstRequirement, Description, NodeKind, PermissionRequirement, StaticSuggestions};

/// Compile source text end to end: lex, parse, compile. All diagnostics
/// from every stage arrive in one [`CompileError`].
pub fn compile_source(
    source: &str,
    ctx: &CompileContext,
    registry: &TypeRegistry,
) -> Result<CommandNode, CompileError> {
    let mut diags = Diagnostics::new();
    let decl = parser::parse(source, &mut diags);
    let tree = decl.as_ref().map(|d| run(d, ctx, registry, &mut diags));
    finish(tree, diags)
}

/// Compile an already-parsed declaration.
pub fn compile(
    decl: &CommandDecl,
    ctx: &CompileContext,
    registry: &TypeRegistry,
) -> Result<CommandNode, CompileError> {
    let mut diags = Diagnostics::new();
    let tree = run(decl, ctx, registry, &mut diags);
    finish(Some(tree), diags)
}

fn finish(tree: Option<CommandNode>, diags: Diagnostics) -> Result<CommandNode, CompileError> {
    match tree {
        Some(tree) if !diags.has_errors() => Ok(tree),
        _ => Err(CompileError(diags.into_vec())),
    }
}

fn run(
    decl: &CommandDecl,
    ctx: &CompileContext,
    registry: &TypeRegistry,
    diags: &mut Diagnostics,
) -> CommandNode {
    let mut pass = Pass {
        ctx,
        registry,
        diags,
        command_name: String::new(),
    };
    pass.command(decl)
}

struct Pass<'a, 'd> {
    ctx: &'a CompileContext,
    registry: &'a TypeRegistry,
    diags: &'d mut Diagnostics,
    command_name: String,
}

impl Pass<'_, '_> {
    fn command(&mut self, decl: &CommandDecl) -> CommandNode {
        self.command_name = self.compile_name(&decl.name);

        let aliases: Vec<String> = decl
            .aliases
            .iter()
            .map(|alias| self.compile_name(alias))
            .collect();

        let permission = match &decl.permission {
            Some(name) => {
                let node = self.compile_name(name);
                Some(self.substitute(&node))
            }
            None => self
                .ctx
                .permission_template()
                .map(|template| template.replace("{command}", &self.command_name)),
        };

        let description = decl
            .description
            .as_ref()
            .and_then(|spec| self.compile_description(spec));

        let scope = Scope::default();
        let children: Vec<CommandNode> = decl
            .nodes
            .iter()
            .map(|node| self.compile_node(node, scope.clone()))
            .collect();

        debug!(
            command = %self.command_name,
            children = children.len(),
            diagnostics = self.diags.len(),
            "compiled command declaration"
        );

        CommandNode {
            name: self.command_name.clone(),
            kind: NodeKind::Root {
                aliases,
                description,
            },
            requirement: permission.map(|node| {
                Arc::new(PermissionRequirement::new(node)) as Arc<dyn Requirement>
            }),
            suggestions: None,
            executes: None,
            children,
        }
    }

    fn compile_node(&mut self, decl: &NodeDecl, mut scope: Scope) -> CommandNode {
        let name = self.compile_name(decl.name());
        let kind = match decl {
            NodeDecl::Literal(_) => NodeKind::Literal,
            NodeDecl::Argument(arg) => {
                let parser = self.compile_type_ref(&arg.type_ref);
                // The argument's own name is visible to everything below.
                scope.args.push(name.clone());
                NodeKind::Argument { parser }
            }
        };

        let mut requirement = None;
        let mut suggestions = None;
        let mut executes = None;
        let mut children = Vec::new();

        // Body items in declaration order: a map_result extends the scope
        // for the items after it, and each child branches on a clone.
        for item in &decl.body().items {
            match item {
                BodyItem::Requires(spec) => requirement = Some(self.compile_requires(spec)),
                BodyItem::Suggests(spec) => suggestions = Some(self.compile_suggests(spec)),
                BodyItem::Executes(spec) => {
                    let handler = self.compile_exec(spec, &scope);
                    executes = Some(ExecBinding::new(handler, scope.mappers.clone()));
                }
                BodyItem::MapResult(spec) => self.compile_map(spec, &mut scope),
                BodyItem::Child(child) => {
                    children.push(self.compile_node(child, scope.clone()))
                }
            }
        }

        CommandNode {
            name,
            kind,
            requirement,
            suggestions,
            executes,
            children,
        }
    }

    // =========================================================================
    // CLAUSES
    // =========================================================================

    fn compile_name(&mut self, name: &Name) -> String {
        match &name.kind {
            NameKind::Literal(text) | NameKind::Raw(text) => text.clone(),
            NameKind::Variable(var) => match self.ctx.variable(var) {
                Some(Variable::Str(text)) => text.clone(),
                Some(other) => {
                    self.diags.error(
                        format!(
                            "variable '@{}' is bound to {}, expected a string",
                            var,
                            other.type_name()
                        ),
                        name.span,
                    );
                    var.clone()
                }
                None => {
                    self.unknown_variable(var, name.span);
                    var.clone()
                }
            },
        }
    }

    fn compile_description(&mut self, spec: &DescriptionSpec) -> Option<Description> {
        match &spec.kind {
            DescriptionKind::Text(text) => Some(Description::Text(text.clone())),
            DescriptionKind::Translated(key) => Some(Description::Translated(key.clone())),
            DescriptionKind::Lines(lines) => Some(Description::Lines(lines.clone())),
            DescriptionKind::Variable(var) => match self.ctx.variable(var) {
                Some(Variable::Str(text)) => Some(Description::Text(text.clone())),
                Some(other) => {
                    self.diags.error(
                        format!(
                            "variable '@{}' is bound to {}, expected a string",
                            var,
                            other.type_name()
                        ),
                        spec.span,
                    );
                    None
                }
                None => {
                    self.unknown_variable(var, spec.span);
                    None
                }
            },
        }
    }

    fn compile_type_ref(&mut self, type_ref: &TypeRef) -> Arc<dyn ArgumentParser> {
        match &type_ref.kind {
            TypeRefKind::Named { name, options } => {
                match self.registry.lookup(name, options) {
                    Ok(parser) => parser,
                    Err(message) => {
                        self.diags.error(message, type_ref.span);
                        placeholder_parser()
                    }
                }
            }
            TypeRefKind::Variable(var) => match self.ctx.variable(var) {
                Some(Variable::Parser(parser)) => parser.clone(),
                Some(other) => {
                    self.diags.error(
                        format!(
                            "variable '@{}' is bound to {}, expected an argument parser",
                            var,
                            other.type_name()
                        ),
                        type_ref.span,
                    );
                    placeholder_parser()
                }
                None => {
                    self.unknown_variable(var, type_ref.span);
                    placeholder_parser()
                }
            },
        }
    }

    fn compile_requires(&mut self, spec: &RequireSpec) -> Arc<dyn Requirement> {
        match &spec.kind {
            RequireKind::Permission(name) => {
                let node = self.compile_name(name);
                Arc::new(PermissionRequirement::new(self.substitute(&node)))
            }
            RequireKind::Constant(value) => Arc::new(ConstRequirement(*value)),
            RequireKind::Variable(var) => match self.ctx.variable(var) {
                Some(Variable::Requirement(requirement)) => requirement.clone(),
                Some(Variable::Bool(value)) => Arc::new(ConstRequirement(*value)),
                Some(other) => {
                    self.diags.error(
                        format!(
                            "variable '@{}' is bound to {}, expected a requirement",
                            var,
                            other.type_name()
                        ),
                        spec.span,
                    );
                    Arc::new(ConstRequirement(true))
                }
                None => {
                    self.unknown_variable(var, spec.span);
                    Arc::new(ConstRequirement(true))
                }
            },
            RequireKind::Chain(spec_chain) => {
                match self.resolve_chain(spec_chain, ChainConstraint::terminal(TerminalExpect::Requirement))
                {
                    Some((host, resolved)) => Arc::new(ChainRequirement::new(host, resolved)),
                    None => Arc::new(ConstRequirement(true)),
                }
            }
        }
    }

    fn compile_suggests(&mut self, spec: &SuggestSpec) -> Arc<dyn SuggestionSource> {
        match &spec.kind {
            SuggestKind::Strings(entries) => Arc::new(StaticSuggestions::new(entries.clone())),
            SuggestKind::Variable(var) => match self.ctx.variable(var) {
                Some(Variable::Suggestions(provider)) => provider.clone(),
                Some(other) => {
                    self.diags.error(
                        format!(
                            "variable '@{}' is bound to {}, expected a suggestion provider",
                            var,
                            other.type_name()
                        ),
                        spec.span,
                    );
                    Arc::new(StaticSuggestions::new(Vec::new()))
                }
                None => {
                    self.unknown_variable(var, spec.span);
                    Arc::new(StaticSuggestions::new(Vec::new()))
                }
            },
            SuggestKind::Chain(spec_chain) => {
                match self.resolve_chain(spec_chain, ChainConstraint::terminal(TerminalExpect::Suggestions))
                {
                    Some((host, resolved)) => Arc::new(ChainSuggestions::new(host, resolved)),
                    None => Arc::new(StaticSuggestions::new(Vec::new())),
                }
            }
        }
    }

    fn compile_exec(&mut self, spec: &ExecSpec, scope: &Scope) -> Arc<dyn CommandExecutor> {
        match &spec.kind {
            ExecKind::Variable(var) => match self.ctx.variable(var) {
                Some(Variable::Executor(handler)) => handler.clone(),
                Some(other) => {
                    self.diags.error(
                        format!(
                            "variable '@{}' is bound to {}, expected an executor",
                            var,
                            other.type_name()
                        ),
                        spec.span,
                    );
                    noop_executor()
                }
                None => {
                    self.unknown_variable(var, spec.span);
                    noop_executor()
                }
            },
            ExecKind::Chain(spec_chain) => {
                match self.resolve_chain(spec_chain, ChainConstraint::terminal(TerminalExpect::Executor))
                {
                    Some((host, resolved)) => {
                        // Required handler parameters must name arguments
                        // visible on this path.
                        for param in &resolved.params {
                            if !param.optional && !scope.is_visible(&param.name) {
                                self.diags.error(
                                    format!(
                                        "executor '{}' expects argument '{}', which is not visible here",
                                        resolved.path(),
                                        param.name
                                    ),
                                    spec_chain.span,
                                );
                            }
                        }
                        Arc::new(ChainExecutor::new(host, resolved))
                    }
                    None => noop_executor(),
                }
            }
        }
    }

    fn compile_map(&mut self, spec: &MapSpec, scope: &mut Scope) {
        let target = match &spec.target {
            Some(name) => {
                let target = self.compile_name(name);
                if !scope.is_visible(&target) {
                    self.diags.error(
                        format!("argument '{}' is not visible here", target),
                        name.span,
                    );
                    return;
                }
                target
            }
            None => match scope.innermost() {
                Some(name) => name.to_string(),
                None => {
                    self.diags.error(
                        "map_result outside an argument requires an explicit argument name",
                        spec.span,
                    );
                    return;
                }
            },
        };

        let mapper: Option<Arc<dyn ValueMapper>> = match &spec.kind {
            MapKind::Chain(spec_chain) => self
                .resolve_chain(spec_chain, ChainConstraint::terminal(TerminalExpect::Mapper))
                .map(|(host, resolved)| {
                    Arc::new(ChainMapper::new(host, resolved)) as Arc<dyn ValueMapper>
                }),
            MapKind::ResultChain(spec_chain) => self
                .resolve_chain(spec_chain, ChainConstraint::method(TerminalExpect::Mapper))
                .map(|(host, resolved)| {
                    Arc::new(ChainMapper::new(host, resolved)) as Arc<dyn ValueMapper>
                }),
            MapKind::Variable(var) => match self.ctx.variable(var) {
                Some(Variable::Mapper(mapper)) => Some(mapper.clone()),
                Some(other) => {
                    self.diags.error(
                        format!(
                            "variable '@{}' is bound to {}, expected a mapper",
                            var,
                            other.type_name()
                        ),
                        spec.span,
                    );
                    None
                }
                None => {
                    self.unknown_variable(var, spec.span);
                    None
                }
            },
        };

        if let Some(mapper) = mapper {
            scope.add_mapper(&target, mapper);
        }
    }

    // =========================================================================
    // SUPPORT
    // =========================================================================

    fn resolve_chain(
        &mut self,
        spec_chain: &Chain,
        constraint: ChainConstraint,
    ) -> Option<(Arc<dyn HostObject>, ResolvedChain)> {
        let Some(host) = self.ctx.host() else {
            self.diags.error(
                format!(
                    "no host object supplied; cannot resolve '{}'",
                    spec_chain.path()
                ),
                spec_chain.span,
            );
            return None;
        };
        match chain::resolve(host.descriptor(), spec_chain, constraint) {
            Ok(resolved) => Some((host.clone(), resolved)),
            Err(message) => {
                self.diags.error(message, spec_chain.span);
                None
            }
        }
    }

    fn substitute(&self, text: &str) -> String {
        text.replace("{command}", &self.command_name)
    }

    fn unknown_variable(&mut self, var: &str, span: Span) {
        self.diags
            .error(format!("unknown variable '@{}'", var), span);
    }
}

// =============================================================================
// PLACEHOLDERS
// =============================================================================

/// Parser substituted when an argument type fails to resolve. Never part
/// of a successful compile.
struct UnresolvedParser;

impl ArgumentParser for UnresolvedParser {
    fn type_name(&self) -> &str {
        "unresolved"
    }

    fn kind(&self) -> ValueKind {
        ValueKind::Str
    }

    fn parse(&self, input: &str) -> Result<ArgValue, ArgParseError> {
        Ok(ArgValue::Str(input.to_string()))
    }
}

fn placeholder_parser() -> Arc<dyn ArgumentParser> {
    Arc::new(UnresolvedParser)
}

struct NoopExecutor;

impl CommandExecutor for NoopExecutor {
    fn execute(&self, _invocation: &Invocation) -> Result<i32, InvokeError> {
        Ok(SUCCESS)
    }
}

fn noop_executor() -> Arc<dyn CommandExecutor> {
    Arc::new(NoopExecutor)
}
