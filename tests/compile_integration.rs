//! Compile-pipeline integration tests.
//!
//! Source text in, dispatch tree and diagnostics out, driven through the
//! public API only: render/reparse round-trips, structural mirroring,
//! scope visibility, mapper isolation, and multi-error aggregation.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use cmdtree::{
    compile_source, default_registry, parse, CapabilityTable, CompileContext, Diagnostics,
    MemberShape, NodeKind, ParamDecl, Variable,
};
use cmdtree_types::{
    ArgValue, ExecutionSource, FnExecutor, FnMapper, FnRequirement, Invocation, ValueKind, SUCCESS,
};

struct Console;

impl ExecutionSource for Console {
    fn name(&self) -> &str {
        "console"
    }

    fn has_permission(&self, _node: &str) -> bool {
        true
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
    let lookups = CapabilityTable::builder("Lookups")
        .mapper(
            "double",
            MemberShape::Field,
            Arc::new(FnMapper(|v: ArgValue, _: &dyn ExecutionSource| {
                Ok(ArgValue::Int(v.as_int().unwrap_or(0) * 2))
            })),
        )
        .build();
    CapabilityTable::builder("Host")
        .object("checks", MemberShape::Field, checks)
        .object("lookups", MemberShape::Field, lookups)
        .executor(
            "run",
            MemberShape::Method,
            vec![ParamDecl::required("x", ValueKind::Int)],
            Arc::new(FnExecutor(|inv: &Invocation| {
                inv.required("x", ValueKind::Int).map(|_| SUCCESS)
            })),
        )
        .executor(
            "ping",
            MemberShape::Method,
            vec![],
            Arc::new(FnExecutor(|_: &Invocation| Ok(SUCCESS))),
        )
        .build()
}

fn ctx() -> CompileContext {
    CompileContext::new().with_host(sample_host())
}

#[test]
fn render_and_reparse_reach_a_fixpoint() {
    let source = r#"
        name = 'scale'
        permission = 'cmd.scale'
        aliases = 'resize' | 'sz'
        description = 'Scales things up and down'
        literal('up') {
            requires = checks.is_admin
            argument('amount', int(min=1, max=10)) {
                suggests = ['1', '5', '10']
                map_result = lookups.double
                executes = run()
            }
        }
        literal('ping') = ping()
    "#;
    let mut diags = Diagnostics::new();
    let decl = parse(source, &mut diags).expect("declaration");
    assert!(!diags.has_errors(), "source must parse cleanly");

    let rendered = decl.to_dsl_string();
    let mut diags = Diagnostics::new();
    let reparsed = parse(&rendered, &mut diags).expect("rendered declaration");
    assert!(!diags.has_errors(), "rendered text must reparse cleanly");
    assert_eq!(rendered, reparsed.to_dsl_string());
}

#[test]
fn compiled_tree_mirrors_declared_structure() {
    let source = r#"
        name = 'scale'
        literal('up') {
            argument('x', int(min=1, max=10)) {
                executes = run()
            }
        }
        literal('down') {
            argument('x', int) {
                executes = run()
            }
        }
    "#;
    let tree = compile_source(source, &ctx(), default_registry()).unwrap();
    assert_eq!(tree.name, "scale");
    assert_eq!(tree.children.len(), 2);
    assert_eq!(tree.children[0].name, "up");
    assert_eq!(tree.children[1].name, "down");
    for limb in &tree.children {
        assert!(matches!(limb.kind, NodeKind::Literal));
        assert_eq!(limb.children.len(), 1);
        let x = &limb.children[0];
        assert_eq!(x.name, "x");
        assert!(matches!(x.kind, NodeKind::Argument { .. }));
        assert!(x.is_executable());
    }
}

#[test]
fn executor_arguments_resolve_inside_their_subtree_only() {
    // 'run' wants argument 'x'; inside the subtree of 'x' it is visible.
    let inside = r#"
        name = 't'
        argument('x', int) { executes = run() }
    "#;
    assert!(compile_source(inside, &ctx(), default_registry()).is_ok());

    let outside = r#"
        name = 't'
        literal('go') { executes = run() }
    "#;
    let err = compile_source(outside, &ctx(), default_registry()).unwrap_err();
    assert!(err.diagnostics()[0].message.contains("not visible here"));
}

#[test]
fn mapper_targets_resolve_inside_their_subtree_only() {
    let inside = r#"
        name = 't'
        argument('x', int) {
            map_result('x') = lookups.double
            executes = run()
        }
    "#;
    assert!(compile_source(inside, &ctx(), default_registry()).is_ok());

    // 'after' is a sibling of 'x', not a descendant.
    let outside = r#"
        name = 't'
        argument('x', int) { executes = run() }
        literal('after') {
            map_result('x') = lookups.double
            executes = ping()
        }
    "#;
    let err = compile_source(outside, &ctx(), default_registry()).unwrap_err();
    assert!(err
        .diagnostics()
        .iter()
        .any(|d| d.message.contains("argument 'x' is not visible here")));
}

#[test]
fn sibling_subtrees_keep_independent_mapper_lists() {
    let source = r#"
        name = 't'
        argument('x', int) {
            literal('a') {
                map_result('x') = lookups.double
                executes = run()
            }
            literal('b') {
                executes = run()
            }
        }
    "#;
    let tree = compile_source(source, &ctx(), default_registry()).unwrap();
    let x = &tree.children[0];
    let a = x.find_child("a").unwrap();
    let b = x.find_child("b").unwrap();
    let a_mappers = a.executes.as_ref().unwrap().mappers();
    let b_mappers = b.executes.as_ref().unwrap().mappers();
    assert_eq!(a_mappers.get("x").map(Vec::len), Some(1));
    assert!(b_mappers.get("x").is_none());
}

#[test]
fn independent_failures_produce_one_diagnostic_each() {
    let source = r#"
        name = 't'
        literal('a') { executes = missing_one() }
        literal('b') { executes = missing_two() }
        literal('c') { requires = checks.absent }
    "#;
    let err = compile_source(source, &ctx(), default_registry()).unwrap_err();
    assert_eq!(err.diagnostics().len(), 3);
}

#[test]
fn diagnostics_render_with_line_and_caret() {
    let source = "name = 'bad\nliteral('x') = ping()";
    let err = compile_source(source, &ctx(), default_registry()).unwrap_err();
    let rendered = err.render(source);
    assert!(rendered.contains("1:8: error: unterminated string"));
    assert!(rendered.contains("1 | name = 'bad"));
    assert!(rendered.contains('^'));
}

#[test]
fn variables_bind_by_position_type() {
    let ctx = CompileContext::new()
        .with_host(sample_host())
        .with_variable("cmd", Variable::Str("warp".into()))
        .with_variable(
            "handler",
            Variable::Executor(Arc::new(FnExecutor(|_: &Invocation| Ok(SUCCESS)))),
        )
        .with_variable("gate", Variable::Bool(false));
    let source = r#"
        name = @cmd
        literal('go') {
            requires = @gate
            executes = @handler
        }
    "#;
    let tree = compile_source(source, &ctx, default_registry()).unwrap();
    assert_eq!(tree.name, "warp");
    let go = tree.find_child("go").unwrap();
    assert!(go.is_executable());
    assert!(!go.allowed(&Console));
}
