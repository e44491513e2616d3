//! Member-chain resolution and execution-time walking.
//!
//! A chain like `checks.admin.is_allowed()` is resolved once, at compile
//! time, against the host's [`TypeDescriptor`]: every non-terminal hop must
//! be an object-typed accessor, call-marked hops must be method-shaped, and
//! the terminal hop must satisfy the call site's constraint. The first
//! failure wins and becomes a diagnostic.
//!
//! At execution time the resolved hop list is walked on the live host
//! instance. A declared member whose slot is empty at that moment raises an
//! [`InvokeError`], deliberately distinct from any compile-time resolution
//! diagnostic for the same chain.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use cmdtree_types::{
    ArgValue, CommandExecutor, ExecutionSource, Invocation, InvokeError, Requirement,
    SuggestionSource, ValueMapper,
};

use crate::ast::Chain;
use crate::host::{HostObject, MemberShape, MemberType, MemberValue, ParamDecl, TypeDescriptor};

// =============================================================================
// RESOLUTION
// =============================================================================

/// What a call site accepts for a chain's terminal hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalExpect {
    Executor,
    Requirement,
    Suggestions,
    Mapper,
}

impl TerminalExpect {
    fn describe(&self) -> &'static str {
        match self {
            TerminalExpect::Executor => "an executor",
            TerminalExpect::Requirement => "a requirement",
            TerminalExpect::Suggestions => "a suggestion provider",
            TerminalExpect::Mapper => "a mapper",
        }
    }

    fn matches(&self, ty: &MemberType) -> bool {
        matches!(
            (self, ty),
            (TerminalExpect::Executor, MemberType::Executor(_))
                | (TerminalExpect::Requirement, MemberType::Requirement)
                | (TerminalExpect::Suggestions, MemberType::Suggestions)
                | (TerminalExpect::Mapper, MemberType::Mapper)
        )
    }
}

/// Per-call-site constraint on the terminal hop.
#[derive(Debug, Clone, Copy)]
pub struct ChainConstraint {
    pub terminal: TerminalExpect,
    /// The terminal must be method-shaped (the `result.` mapper form).
    pub method_terminal: bool,
}

impl ChainConstraint {
    pub fn terminal(expect: TerminalExpect) -> Self {
        Self {
            terminal: expect,
            method_terminal: false,
        }
    }

    pub fn method(expect: TerminalExpect) -> Self {
        Self {
            terminal: expect,
            method_terminal: true,
        }
    }
}

/// A chain validated against a descriptor, ready to be walked at execution
/// time. Built once, reused at every invocation.
#[derive(Debug, Clone)]
pub struct ResolvedChain {
    hops: Vec<String>,
    path: String,
    /// Declared parameters of an executor terminal; empty otherwise.
    pub params: Vec<ParamDecl>,
}

impl ResolvedChain {
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Resolve `chain` against `root`, hop by hop, left to right. Returns the
/// first failure as a message; the caller owns the position.
pub fn resolve(
    root: &TypeDescriptor,
    chain: &Chain,
    constraint: ChainConstraint,
) -> Result<ResolvedChain, String> {
    if chain.hops.is_empty() {
        return Err("empty member chain".to_string());
    }
    let mut descriptor = root;
    let mut params = Vec::new();
    let last = chain.hops.len() - 1;

    for (index, hop) in chain.hops.iter().enumerate() {
        let decl = descriptor.member(&hop.name).ok_or_else(|| {
            format!(
                "'{}' has no member named '{}'",
                descriptor.name(),
                hop.name
            )
        })?;

        if hop.call && decl.shape == MemberShape::Field {
            return Err(format!(
                "'{}' on '{}' is a field, not a method",
                hop.name,
                descriptor.name()
            ));
        }

        if index < last {
            match &decl.ty {
                MemberType::Object(next) => descriptor = next,
                other => {
                    return Err(format!(
                        "'{}' on '{}' is {}; the chain cannot continue through it",
                        hop.name,
                        descriptor.name(),
                        other.describe()
                    ));
                }
            }
        } else {
            if constraint.method_terminal && decl.shape != MemberShape::Method {
                return Err(format!(
                    "'{}' on '{}' must be a method here",
                    hop.name,
                    descriptor.name()
                ));
            }
            if !constraint.terminal.matches(&decl.ty) {
                return Err(format!(
                    "'{}' resolves to {}, expected {}",
                    chain.path(),
                    decl.ty.describe(),
                    constraint.terminal.describe()
                ));
            }
            if let MemberType::Executor(declared) = &decl.ty {
                params = declared.clone();
            }
        }
    }

    Ok(ResolvedChain {
        hops: chain.hops.iter().map(|h| h.name.clone()).collect(),
        path: chain.path(),
        params,
    })
}

// =============================================================================
// EXECUTION-TIME WALK
// =============================================================================

/// Walk the resolved hop list on a live host instance and return the
/// terminal handle.
fn walk(host: &Arc<dyn HostObject>, hops: &[String]) -> Result<MemberValue, InvokeError> {
    let mut current: Arc<dyn HostObject> = host.clone();
    let last = hops.len() - 1;
    for (index, hop) in hops.iter().enumerate() {
        let value = current
            .member(hop)
            .ok_or_else(|| InvokeError::AbsentMember(hop.clone()))?;
        if index == last {
            return Ok(value);
        }
        match value {
            MemberValue::Object(next) => current = next,
            _ => {
                return Err(InvokeError::MemberMismatch {
                    name: hop.clone(),
                    expected: "an object",
                });
            }
        }
    }
    unreachable!("chains always have at least one hop")
}

/// Executor bound through a member chain.
pub struct ChainExecutor {
    host: Arc<dyn HostObject>,
    chain: ResolvedChain,
}

impl ChainExecutor {
    pub(crate) fn new(host: Arc<dyn HostObject>, chain: ResolvedChain) -> Self {
        Self { host, chain }
    }
}

impl CommandExecutor for ChainExecutor {
    fn execute(&self, invocation: &Invocation) -> Result<i32, InvokeError> {
        let terminal = walk(&self.host, &self.chain.hops)?;
        let handler = match terminal {
            MemberValue::Executor(handler) => handler,
            _ => {
                return Err(InvokeError::MemberMismatch {
                    name: self.chain.path.clone(),
                    expected: "an executor",
                })
            }
        };
        // Declared required parameters must be present before the handler
        // runs; a miss here is a dispatcher bug, not user input.
        for param in &self.chain.params {
            if !param.optional && invocation.get(&param.name).is_none() {
                return Err(InvokeError::MissingArgument(param.name.clone()));
            }
        }
        handler.execute(invocation)
    }
}

/// Requirement bound through a member chain. A walk failure at test time
/// denies and logs; requirements have no error channel.
pub struct ChainRequirement {
    host: Arc<dyn HostObject>,
    chain: ResolvedChain,
}

impl ChainRequirement {
    pub(crate) fn new(host: Arc<dyn HostObject>, chain: ResolvedChain) -> Self {
        Self { host, chain }
    }
}

impl Requirement for ChainRequirement {
    fn test(&self, source: &dyn ExecutionSource) -> bool {
        match walk(&self.host, &self.chain.hops) {
            Ok(MemberValue::Requirement(req)) => req.test(source),
            Ok(other) => {
                warn!(
                    chain = %self.chain.path,
                    found = other.describe(),
                    "requirement chain resolved to the wrong member kind; denying"
                );
                false
            }
            Err(err) => {
                warn!(chain = %self.chain.path, %err, "requirement chain walk failed; denying");
                false
            }
        }
    }
}

/// Suggestion source bound through a member chain. A walk failure yields
/// no suggestions; completion is best-effort.
pub struct ChainSuggestions {
    host: Arc<dyn HostObject>,
    chain: ResolvedChain,
}

impl ChainSuggestions {
    pub(crate) fn new(host: Arc<dyn HostObject>, chain: ResolvedChain) -> Self {
        Self { host, chain }
    }
}

#[async_trait]
impl SuggestionSource for ChainSuggestions {
    async fn suggest(&self, source: &dyn ExecutionSource, partial: &str) -> Vec<String> {
        match walk(&self.host, &self.chain.hops) {
            Ok(MemberValue::Suggestions(provider)) => provider.suggest(source, partial).await,
            Ok(other) => {
                warn!(
                    chain = %self.chain.path,
                    found = other.describe(),
                    "suggestion chain resolved to the wrong member kind"
                );
                Vec::new()
            }
            Err(err) => {
                warn!(chain = %self.chain.path, %err, "suggestion chain walk failed");
                Vec::new()
            }
        }
    }
}

/// Mapper bound through a member chain.
pub struct ChainMapper {
    host: Arc<dyn HostObject>,
    chain: ResolvedChain,
}

impl ChainMapper {
    pub(crate) fn new(host: Arc<dyn HostObject>, chain: ResolvedChain) -> Self {
        Self { host, chain }
    }
}

impl ValueMapper for ChainMapper {
    fn map(
        &self,
        value: ArgValue,
        source: &dyn ExecutionSource,
    ) -> Result<ArgValue, InvokeError> {
        match walk(&self.host, &self.chain.hops)? {
            MemberValue::Mapper(mapper) => mapper.map(value, source),
            _ => Err(InvokeError::MemberMismatch {
                name: self.chain.path.clone(),
                expected: "a mapper",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ChainHop;
    use crate::diagnostics::Span;
    use crate::host::{CapabilityTable, MemberShape};
    use cmdtree_types::{FnRequirement, ValueKind};

    fn chain(hops: &[(&str, bool)]) -> Chain {
        Chain {
            hops: hops
                .iter()
                .map(|(name, call)| ChainHop {
                    name: name.to_string(),
                    call: *call,
                    span: Span::default(),
                })
                .collect(),
            span: Span::default(),
        }
    }

    fn sample_host() -> Arc<CapabilityTable> {
        let checks = CapabilityTable::builder("Checks")
            .requirement(
                "is_admin",
                MemberShape::Method,
                Arc::new(FnRequirement(|_: &dyn ExecutionSource| true)),
            )
            .build();
        CapabilityTable::builder("Host")
            .object("checks", MemberShape::Field, checks)
            .build()
    }

    #[test]
    fn test_resolve_walks_objects_to_terminal() {
        let host = sample_host();
        let resolved = resolve(
            host.descriptor(),
            &chain(&[("checks", false), ("is_admin", true)]),
            ChainConstraint::terminal(TerminalExpect::Requirement),
        )
        .unwrap();
        assert_eq!(resolved.path(), "checks.is_admin()");
    }

    #[test]
    fn test_resolve_unknown_member() {
        let host = sample_host();
        let err = resolve(
            host.descriptor(),
            &chain(&[("checks", false), ("missing", false)]),
            ChainConstraint::terminal(TerminalExpect::Requirement),
        )
        .unwrap_err();
        assert_eq!(err, "'Checks' has no member named 'missing'");
    }

    #[test]
    fn test_resolve_call_mark_on_field() {
        let host = sample_host();
        let err = resolve(
            host.descriptor(),
            &chain(&[("checks", true)]),
            ChainConstraint::terminal(TerminalExpect::Requirement),
        )
        .unwrap_err();
        assert!(err.contains("is a field, not a method"));
    }

    #[test]
    fn test_resolve_terminal_kind_mismatch() {
        let host = sample_host();
        let err = resolve(
            host.descriptor(),
            &chain(&[("checks", false), ("is_admin", true)]),
            ChainConstraint::terminal(TerminalExpect::Executor),
        )
        .unwrap_err();
        assert!(err.contains("expected an executor"));
    }

    #[test]
    fn test_resolve_cannot_continue_through_terminal_kind() {
        let host = sample_host();
        let err = resolve(
            host.descriptor(),
            &chain(&[("checks", false), ("is_admin", false), ("deeper", false)]),
            ChainConstraint::terminal(TerminalExpect::Requirement),
        )
        .unwrap_err();
        assert!(err.contains("cannot continue"));
    }

    #[test]
    fn test_method_terminal_constraint() {
        let mappers = CapabilityTable::builder("Mappers")
            .mapper(
                "as_field",
                MemberShape::Field,
                Arc::new(cmdtree_types::FnMapper(
                    |v: ArgValue, _: &dyn ExecutionSource| Ok(v),
                )),
            )
            .build();
        let host = CapabilityTable::builder("Host")
            .object("mappers", MemberShape::Field, mappers)
            .build();
        let err = resolve(
            host.descriptor(),
            &chain(&[("mappers", false), ("as_field", false)]),
            ChainConstraint::method(TerminalExpect::Mapper),
        )
        .unwrap_err();
        assert!(err.contains("must be a method"));
    }

    #[test]
    fn test_walk_absent_member_is_invoke_error() {
        let checks_descriptor = {
            let checks = CapabilityTable::builder("Checks")
                .requirement(
                    "is_admin",
                    MemberShape::Method,
                    Arc::new(FnRequirement(|_: &dyn ExecutionSource| true)),
                )
                .build();
            checks.descriptor().clone()
        };
        // Declared but empty slot: compiles, fails when walked.
        let host = CapabilityTable::builder("Host")
            .vacant(
                "checks",
                MemberShape::Field,
                MemberType::Object(Arc::new(checks_descriptor)),
            )
            .build();
        let spec = chain(&[("checks", false), ("is_admin", true)]);
        let resolved = resolve(
            host.descriptor(),
            &spec,
            ChainConstraint::terminal(TerminalExpect::Requirement),
        )
        .unwrap();

        let host_obj: Arc<dyn HostObject> = host;
        let err = walk(&host_obj, &resolved.hops).unwrap_err();
        assert_eq!(err, InvokeError::AbsentMember("checks".into()));
    }

    #[test]
    fn test_executor_param_decls_surface() {
        let host = CapabilityTable::builder("Host")
            .executor(
                "run",
                MemberShape::Method,
                vec![ParamDecl::required("x", ValueKind::Int)],
                Arc::new(cmdtree_types::FnExecutor(
                    |_: &Invocation| Ok(cmdtree_types::SUCCESS),
                )),
            )
            .build();
        let resolved = resolve(
            host.descriptor(),
            &chain(&[("run", true)]),
            ChainConstraint::terminal(TerminalExpect::Executor),
        )
        .unwrap();
        assert_eq!(resolved.params.len(), 1);
        assert_eq!(resolved.params[0].name, "x");
    }
}
