//! AST for the command-tree DSL.
//!
//! A closed set of node kinds, one per grammar construct, rooted at one
//! [`CommandDecl`]. Every node carries its source span for diagnostics.
//! Passes over the tree (the compiling pass, the source renderer here) are
//! exhaustive matches over these sum types, so adding a construct is a
//! compile error until every pass handles it.
//!
//! `to_dsl_string()` renders a declaration back to source; reparsing the
//! rendered text yields a structurally equivalent tree.

use serde::{Deserialize, Serialize};

use crate::diagnostics::Span;
use crate::lexer::{Token, TokenKind};

// =============================================================================
// NODES
// =============================================================================

/// One whole command declaration: root clauses plus the node block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDecl {
    pub name: Name,
    pub permission: Option<Name>,
    pub aliases: Vec<Name>,
    pub description: Option<DescriptionSpec>,
    pub nodes: Vec<NodeDecl>,
    pub span: Span,
}

/// A dispatch-tree node declaration. Child order is significant; it is the
/// sibling/priority order of the compiled tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeDecl {
    Literal(LiteralDecl),
    Argument(ArgumentDecl),
}

impl NodeDecl {
    pub fn name(&self) -> &Name {
        match self {
            NodeDecl::Literal(l) => &l.name,
            NodeDecl::Argument(a) => &a.name,
        }
    }

    pub fn body(&self) -> &NodeBody {
        match self {
            NodeDecl::Literal(l) => &l.body,
            NodeDecl::Argument(a) => &a.body,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            NodeDecl::Literal(l) => l.span,
            NodeDecl::Argument(a) => a.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiteralDecl {
    pub name: Name,
    pub body: NodeBody,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentDecl {
    pub name: Name,
    pub type_ref: TypeRef,
    pub body: NodeBody,
    pub span: Span,
}

/// Inner clauses and children of a node, in declaration order.
///
/// Order matters for `map_result`: a mapper is visible only to items
/// declared after it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeBody {
    pub items: Vec<BodyItem>,
}

impl NodeBody {
    pub fn executes(&self) -> Option<&ExecSpec> {
        self.items.iter().find_map(|item| match item {
            BodyItem::Executes(e) => Some(e),
            _ => None,
        })
    }

    pub fn requires(&self) -> Option<&RequireSpec> {
        self.items.iter().find_map(|item| match item {
            BodyItem::Requires(r) => Some(r),
            _ => None,
        })
    }

    pub fn children(&self) -> impl Iterator<Item = &NodeDecl> {
        self.items.iter().filter_map(|item| match item {
            BodyItem::Child(node) => Some(node),
            _ => None,
        })
    }

    /// True when the body is exactly one `executes` clause, the form the
    /// `= handler` shorthand produces.
    pub fn is_executes_shorthand(&self) -> bool {
        matches!(self.items.as_slice(), [BodyItem::Executes(_)])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BodyItem {
    Requires(RequireSpec),
    Suggests(SuggestSpec),
    Executes(ExecSpec),
    MapResult(MapSpec),
    Child(NodeDecl),
}

// =============================================================================
// CLAUSE PAYLOADS
// =============================================================================

/// A name position: quoted literal, `@variable`, or a bare identifier
/// passed through unresolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Name {
    pub kind: NameKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NameKind {
    Literal(String),
    Variable(String),
    Raw(String),
}

/// An argument type reference: a registry type name with options, or a
/// variable bound to a ready-made parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeRef {
    pub kind: TypeRefKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeRefKind {
    Named {
        name: String,
        options: Vec<(String, Token)>,
    },
    Variable(String),
}

/// A dotted member chain; hops marked `call` were written with `()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chain {
    pub hops: Vec<ChainHop>,
    pub span: Span,
}

impl Chain {
    /// The chain as written, for messages.
    pub fn path(&self) -> String {
        self.hops
            .iter()
            .map(|hop| {
                if hop.call {
                    format!("{}()", hop.name)
                } else {
                    hop.name.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainHop {
    pub name: String,
    pub call: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequireSpec {
    pub kind: RequireKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RequireKind {
    Permission(Name),
    Chain(Chain),
    Variable(String),
    Constant(bool),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestSpec {
    pub kind: SuggestKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SuggestKind {
    Strings(Vec<String>),
    Chain(Chain),
    Variable(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecSpec {
    pub kind: ExecKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecKind {
    Chain(Chain),
    Variable(String),
}

/// An argument-value transform. `target` names the argument it applies to;
/// absent, it applies to the innermost enclosing argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapSpec {
    pub target: Option<Name>,
    pub kind: MapKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MapKind {
    /// Chain to a mapper handle held by the host (field-shaped terminal).
    Chain(Chain),
    /// `result.` form: chain to a method whose invocation result becomes
    /// the mapped value (method-shaped terminal).
    ResultChain(Chain),
    Variable(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptionSpec {
    pub kind: DescriptionKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DescriptionKind {
    Text(String),
    Variable(String),
    Translated(String),
    Lines(Vec<String>),
}

// =============================================================================
// SOURCE RENDERING
// =============================================================================

const INDENT: &str = "    ";

fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

impl CommandDecl {
    /// Render the declaration back to DSL source.
    pub fn to_dsl_string(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("name = {}\n", self.name.to_dsl_string()));
        if let Some(permission) = &self.permission {
            out.push_str(&format!("permission = {}\n", permission.to_dsl_string()));
        }
        if !self.aliases.is_empty() {
            let rendered: Vec<String> = self.aliases.iter().map(Name::to_dsl_string).collect();
            out.push_str(&format!("aliases = {}\n", rendered.join(" | ")));
        }
        if let Some(description) = &self.description {
            out.push_str(&format!("description = {}\n", description.to_dsl_string()));
        }
        for node in &self.nodes {
            node.render(&mut out, 0);
        }
        out
    }
}

impl Name {
    pub fn to_dsl_string(&self) -> String {
        match &self.kind {
            NameKind::Literal(text) => quote(text),
            NameKind::Variable(name) => format!("@{}", name),
            NameKind::Raw(name) => name.clone(),
        }
    }
}

impl DescriptionSpec {
    pub fn to_dsl_string(&self) -> String {
        match &self.kind {
            DescriptionKind::Text(text) => quote(text),
            DescriptionKind::Variable(name) => format!("@{}", name),
            DescriptionKind::Translated(key) => format!("translate({})", quote(key)),
            DescriptionKind::Lines(lines) => {
                let rendered: Vec<String> = lines.iter().map(|l| quote(l)).collect();
                format!("[{}]", rendered.join(", "))
            }
        }
    }
}

impl TypeRef {
    pub fn to_dsl_string(&self) -> String {
        match &self.kind {
            TypeRefKind::Named { name, options } => {
                if options.is_empty() {
                    name.clone()
                } else {
                    let rendered: Vec<String> = options
                        .iter()
                        .map(|(key, token)| format!("{}={}", key, render_token(token)))
                        .collect();
                    format!("{}({})", name, rendered.join(", "))
                }
            }
            TypeRefKind::Variable(name) => format!("@{}", name),
        }
    }
}

fn render_token(token: &Token) -> String {
    match &token.kind {
        TokenKind::Ident(name) => name.clone(),
        TokenKind::Str(text) => quote(text),
        TokenKind::Int(v) => v.to_string(),
        TokenKind::Float(v) => format!("{:?}", v),
        other => other.to_string(),
    }
}

impl RequireSpec {
    pub fn to_dsl_string(&self) -> String {
        match &self.kind {
            RequireKind::Permission(name) => format!("permission({})", name.to_dsl_string()),
            RequireKind::Chain(chain) => chain.path(),
            RequireKind::Variable(name) => format!("@{}", name),
            RequireKind::Constant(value) => value.to_string(),
        }
    }
}

impl SuggestSpec {
    pub fn to_dsl_string(&self) -> String {
        match &self.kind {
            SuggestKind::Strings(entries) => {
                let rendered: Vec<String> = entries.iter().map(|e| quote(e)).collect();
                format!("[{}]", rendered.join(", "))
            }
            SuggestKind::Chain(chain) => chain.path(),
            SuggestKind::Variable(name) => format!("@{}", name),
        }
    }
}

impl ExecSpec {
    pub fn to_dsl_string(&self) -> String {
        match &self.kind {
            ExecKind::Chain(chain) => chain.path(),
            ExecKind::Variable(name) => format!("@{}", name),
        }
    }
}

impl MapSpec {
    pub fn to_dsl_string(&self) -> String {
        let value = match &self.kind {
            MapKind::Chain(chain) => chain.path(),
            MapKind::ResultChain(chain) => format!("result.{}", chain.path()),
            MapKind::Variable(name) => format!("@{}", name),
        };
        match &self.target {
            Some(target) => format!("map_result({}) = {}", target.to_dsl_string(), value),
            None => format!("map_result = {}", value),
        }
    }
}

impl NodeDecl {
    fn render(&self, out: &mut String, depth: usize) {
        let pad = INDENT.repeat(depth);
        let header = match self {
            NodeDecl::Literal(l) => format!("literal({})", l.name.to_dsl_string()),
            NodeDecl::Argument(a) => format!(
                "argument({}, {})",
                a.name.to_dsl_string(),
                a.type_ref.to_dsl_string()
            ),
        };
        let body = self.body();
        if body.is_executes_shorthand() {
            let exec = body.executes().unwrap();
            out.push_str(&format!("{}{} = {}\n", pad, header, exec.to_dsl_string()));
            return;
        }
        out.push_str(&format!("{}{} {{\n", pad, header));
        let inner = INDENT.repeat(depth + 1);
        for item in &body.items {
            match item {
                BodyItem::Requires(r) => {
                    out.push_str(&format!("{}requires = {}\n", inner, r.to_dsl_string()))
                }
                BodyItem::Suggests(s) => {
                    out.push_str(&format!("{}suggests = {}\n", inner, s.to_dsl_string()))
                }
                BodyItem::Executes(e) => {
                    out.push_str(&format!("{}executes = {}\n", inner, e.to_dsl_string()))
                }
                BodyItem::MapResult(m) => {
                    out.push_str(&format!("{}{}\n", inner, m.to_dsl_string()))
                }
                BodyItem::Child(child) => child.render(out, depth + 1),
            }
        }
        out.push_str(&format!("{}}}\n", pad));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(text: &str) -> Name {
        Name {
            kind: NameKind::Literal(text.into()),
            span: Span::default(),
        }
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("a'b\\c"), r"'a\'b\\c'");
        assert_eq!(quote("line\nbreak"), r"'line\nbreak'");
    }

    #[test]
    fn test_render_shorthand_node() {
        let decl = CommandDecl {
            name: name("t"),
            permission: None,
            aliases: vec![],
            description: None,
            nodes: vec![NodeDecl::Literal(LiteralDecl {
                name: name("go"),
                body: NodeBody {
                    items: vec![BodyItem::Executes(ExecSpec {
                        kind: ExecKind::Chain(Chain {
                            hops: vec![ChainHop {
                                name: "run".into(),
                                call: true,
                                span: Span::default(),
                            }],
                            span: Span::default(),
                        }),
                        span: Span::default(),
                    })],
                },
                span: Span::default(),
            })],
            span: Span::default(),
        };
        assert_eq!(decl.to_dsl_string(), "name = 't'\nliteral('go') = run()\n");
    }

    #[test]
    fn test_chain_path_marks_calls() {
        let chain = Chain {
            hops: vec![
                ChainHop {
                    name: "a".into(),
                    call: false,
                    span: Span::default(),
                },
                ChainHop {
                    name: "b".into(),
                    call: true,
                    span: Span::default(),
                },
            ],
            span: Span::default(),
        };
        assert_eq!(chain.path(), "a.b()");
    }

    #[test]
    fn test_body_accessors() {
        let body = NodeBody {
            items: vec![
                BodyItem::Requires(RequireSpec {
                    kind: RequireKind::Constant(true),
                    span: Span::default(),
                }),
                BodyItem::Child(NodeDecl::Literal(LiteralDecl {
                    name: name("x"),
                    body: NodeBody::default(),
                    span: Span::default(),
                })),
            ],
        };
        assert!(body.requires().is_some());
        assert!(body.executes().is_none());
        assert_eq!(body.children().count(), 1);
        assert!(!body.is_executes_shorthand());
    }
}
