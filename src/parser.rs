//! Recursive-descent parser for the command-tree DSL.
//!
//! Consumes the lexer's token stream and produces one [`CommandDecl`].
//! Grammar violations are reported into the shared diagnostic sink and the
//! parser resynchronizes rather than aborting, so one pass collects every
//! error in the document.
//!
//! Resynchronization policy: after a violation inside a node body, tokens
//! are skipped until the next clause or node keyword at the current brace
//! depth, a `}` closing the current depth (left unconsumed), or end of
//! input. At the top level the stop set also includes the root clause
//! keywords. Nested braces are depth-tracked so a malformed child cannot
//! consume its parent's closer.

use crate::ast::*;
use crate::diagnostics::{Diagnostics, Span};
use crate::lexer::{Lexer, Token, TokenKind};

/// Keywords that may open an item inside a node body.
const BODY_KEYWORDS: &[&str] = &[
    "literal",
    "argument",
    "requires",
    "suggests",
    "executes",
    "map_result",
];

/// Keywords that may open a top-level item.
const ROOT_KEYWORDS: &[&str] = &[
    "name",
    "permission",
    "description",
    "aliases",
    "literal",
    "argument",
];

/// Parse one command declaration. Returns `None` only when no usable
/// declaration could be built; diagnostics carry the reasons either way.
pub fn parse(src: &str, diags: &mut Diagnostics) -> Option<CommandDecl> {
    Parser::new(src, diags).command()
}

struct Parser<'a, 'd> {
    lexer: Lexer<'a>,
    diags: &'d mut Diagnostics,
    lookahead: Option<Token>,
    last_span: Span,
    eof_span: Span,
}

impl<'a, 'd> Parser<'a, 'd> {
    fn new(src: &'a str, diags: &'d mut Diagnostics) -> Self {
        Self {
            lexer: Lexer::new(src),
            diags,
            lookahead: None,
            last_span: Span::default(),
            eof_span: Span::new(src.len(), src.len()),
        }
    }

    // =========================================================================
    // TOKEN PLUMBING
    // =========================================================================

    fn peek(&mut self) -> Option<&Token> {
        if self.lookahead.is_none() && self.lexer.has_next(self.diags) {
            self.lookahead = Some(self.lexer.next_token(self.diags));
        }
        self.lookahead.as_ref()
    }

    /// Owned copy of the lookahead's kind and span.
    fn peek_parts(&mut self) -> Option<(TokenKind, Span)> {
        self.peek().map(|t| (t.kind.clone(), t.span))
    }

    fn advance(&mut self) -> Option<Token> {
        self.peek();
        let token = self.lookahead.take();
        if let Some(t) = &token {
            self.last_span = t.span;
        }
        token
    }

    fn peek_span(&mut self) -> Span {
        match self.peek() {
            Some(t) => t.span,
            None => self.eof_span,
        }
    }

    fn at_ident(&mut self, text: &str) -> bool {
        matches!(self.peek(), Some(t) if t.is_ident(text))
    }

    fn at_token(&mut self, kind: &TokenKind) -> bool {
        matches!(self.peek(), Some(t) if &t.kind == kind)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at_token(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume the expected punctuation or report. Lex-recovery tokens are
    /// consumed silently; the lexer already reported them.
    fn expect(&mut self, kind: TokenKind, what: &str) -> bool {
        match self.peek_parts() {
            Some((k, _)) if k == kind => {
                self.advance();
                true
            }
            Some((TokenKind::Recover, _)) => {
                self.advance();
                false
            }
            Some((k, span)) => {
                self.diags.error(format!("expected {}, got {}", what, k), span);
                false
            }
            None => {
                self.diags
                    .error(format!("expected {}, got end of input", what), self.eof_span);
                false
            }
        }
    }

    /// Report at the lookahead's position, unless it is a lex-recovery
    /// token (already reported). Consumes nothing.
    fn error_here(&mut self, message: impl Into<String>) {
        if self.at_token(&TokenKind::Recover) {
            return;
        }
        let span = self.peek_span();
        self.diags.error(message, span);
    }

    // =========================================================================
    // RESYNCHRONIZATION
    // =========================================================================

    /// Skip to the next item boundary inside a node body. Stops before a
    /// clause/node keyword at the current depth or a `}` closing it.
    fn recover_in_body(&mut self) {
        let mut depth = 0i32;
        loop {
            let Some((kind, _)) = self.peek_parts() else {
                return;
            };
            match kind {
                TokenKind::LBrace => {
                    depth += 1;
                    self.advance();
                }
                TokenKind::RBrace => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                    self.advance();
                }
                TokenKind::Ident(name) if depth == 0 && BODY_KEYWORDS.contains(&name.as_str()) => {
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// Skip to the next top-level clause or node keyword.
    fn recover_at_root(&mut self) {
        let mut depth = 0i32;
        loop {
            let Some((kind, _)) = self.peek_parts() else {
                return;
            };
            match kind {
                TokenKind::LBrace => {
                    depth += 1;
                    self.advance();
                }
                TokenKind::RBrace => {
                    depth = (depth - 1).max(0);
                    self.advance();
                }
                TokenKind::Ident(name) if depth == 0 && ROOT_KEYWORDS.contains(&name.as_str()) => {
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    // =========================================================================
    // ROOT
    // =========================================================================

    fn command(&mut self) -> Option<CommandDecl> {
        if self.peek().is_none() {
            self.diags.error("empty command declaration", self.eof_span);
            return None;
        }

        let mut name: Option<Name> = None;
        let mut permission: Option<Name> = None;
        let mut aliases: Option<Vec<Name>> = None;
        let mut description: Option<DescriptionSpec> = None;
        let mut nodes: Vec<NodeDecl> = Vec::new();

        loop {
            let Some((kind, span)) = self.peek_parts() else {
                break;
            };
            match kind {
                TokenKind::Ident(kw) => match kw.as_str() {
                    "name" => self.root_clause(span, "name", &mut name, Self::parse_name),
                    "permission" => {
                        self.root_clause(span, "permission", &mut permission, Self::parse_name)
                    }
                    "description" => self.root_clause(
                        span,
                        "description",
                        &mut description,
                        Self::parse_description,
                    ),
                    "aliases" => {
                        self.root_clause(span, "aliases", &mut aliases, Self::parse_aliases)
                    }
                    "literal" | "argument" => {
                        if let Some(node) = self.parse_node() {
                            nodes.push(node);
                        }
                    }
                    other => {
                        self.error_here(format!(
                            "expected a clause or 'literal'/'argument', got identifier '{}'",
                            other
                        ));
                        self.advance();
                        self.recover_at_root();
                    }
                },
                other => {
                    self.error_here(format!(
                        "expected a clause or 'literal'/'argument', got {}",
                        other
                    ));
                    self.advance();
                    self.recover_at_root();
                }
            }
        }

        let name = name.unwrap_or_else(|| {
            self.diags
                .error("command declaration has no 'name' clause", Span::default());
            Name {
                kind: NameKind::Literal(String::new()),
                span: Span::default(),
            }
        });

        let span = Span::new(0, self.last_span.end);
        Some(CommandDecl {
            name,
            permission,
            aliases: aliases.unwrap_or_default(),
            description,
            nodes,
            span,
        })
    }

    /// `keyword = <payload>` with the duplicate-clause policy: report the
    /// second occurrence, keep the first.
    fn root_clause<T>(
        &mut self,
        span: Span,
        keyword: &str,
        slot: &mut Option<T>,
        payload: fn(&mut Self) -> Option<T>,
    ) {
        self.advance();
        if !self.expect(TokenKind::Equals, "'='") {
            self.recover_at_root();
            return;
        }
        match payload(self) {
            Some(value) => {
                if slot.is_some() {
                    self.diags.warning(
                        format!("duplicate '{}' clause; keeping the first", keyword),
                        span,
                    );
                } else {
                    *slot = Some(value);
                }
            }
            None => self.recover_at_root(),
        }
    }

    fn parse_aliases(&mut self) -> Option<Vec<Name>> {
        let first = self.parse_name()?;
        let mut aliases = vec![first];
        while self.eat(&TokenKind::Pipe) {
            aliases.push(self.parse_name()?);
        }
        Some(aliases)
    }

    fn parse_description(&mut self) -> Option<DescriptionSpec> {
        let start = self.peek_span();
        match self.peek_parts().map(|(k, _)| k) {
            Some(TokenKind::Str(text)) => {
                self.advance();
                Some(DescriptionSpec {
                    kind: DescriptionKind::Text(text),
                    span: start,
                })
            }
            Some(TokenKind::At) => {
                let name = self.parse_variable_ref()?;
                Some(DescriptionSpec {
                    kind: DescriptionKind::Variable(name),
                    span: start.merge(self.last_span),
                })
            }
            Some(TokenKind::LBracket) => {
                let lines = self.parse_string_list()?;
                Some(DescriptionSpec {
                    kind: DescriptionKind::Lines(lines),
                    span: start.merge(self.last_span),
                })
            }
            Some(TokenKind::Ident(kw)) if kw == "translate" => {
                self.advance();
                if !self.expect(TokenKind::LParen, "'('") {
                    return None;
                }
                let key = match self.peek_parts().map(|(k, _)| k) {
                    Some(TokenKind::Str(text)) => {
                        self.advance();
                        text
                    }
                    _ => {
                        self.error_here("expected a translation key string");
                        return None;
                    }
                };
                if !self.expect(TokenKind::RParen, "')'") {
                    return None;
                }
                Some(DescriptionSpec {
                    kind: DescriptionKind::Translated(key),
                    span: start.merge(self.last_span),
                })
            }
            _ => {
                self.error_here("expected a description");
                None
            }
        }
    }

    // =========================================================================
    // NODES
    // =========================================================================

    fn parse_node(&mut self) -> Option<NodeDecl> {
        let keyword = self.advance()?;
        let start = keyword.span;
        let is_argument = keyword.is_ident("argument");

        if !self.expect(TokenKind::LParen, "'('") {
            self.recover_in_body();
            return None;
        }
        let name = match self.parse_name() {
            Some(name) => name,
            None => {
                self.recover_in_body();
                return None;
            }
        };

        let type_ref = if is_argument {
            if !self.expect(TokenKind::Comma, "','") {
                self.recover_in_body();
                return None;
            }
            match self.parse_type_ref() {
                Some(tr) => Some(tr),
                None => {
                    self.recover_in_body();
                    return None;
                }
            }
        } else {
            None
        };

        if !self.expect(TokenKind::RParen, "')'") {
            self.recover_in_body();
            return None;
        }

        let body = self.parse_body()?;
        let span = start.merge(self.last_span);
        Some(match type_ref {
            Some(type_ref) => NodeDecl::Argument(ArgumentDecl {
                name,
                type_ref,
                body,
                span,
            }),
            None => NodeDecl::Literal(LiteralDecl { name, body, span }),
        })
    }

    fn parse_body(&mut self) -> Option<NodeBody> {
        if self.eat(&TokenKind::Equals) {
            // Shorthand: a childless node whose only content is `executes`.
            let exec = self.parse_exec()?;
            return Some(NodeBody {
                items: vec![BodyItem::Executes(exec)],
            });
        }
        if !self.expect(TokenKind::LBrace, "'{' or '='") {
            self.recover_in_body();
            return None;
        }

        let mut body = NodeBody::default();
        let mut seen: Vec<&'static str> = Vec::new();
        loop {
            if self.eat(&TokenKind::RBrace) {
                return Some(body);
            }
            let Some((kind, span)) = self.peek_parts() else {
                self.diags.error("unclosed '{' in node body", self.eof_span);
                return Some(body);
            };
            match kind {
                TokenKind::Ident(kw) => match kw.as_str() {
                    "literal" | "argument" => {
                        if let Some(child) = self.parse_node() {
                            body.items.push(BodyItem::Child(child));
                        }
                    }
                    "requires" => {
                        self.advance();
                        if !self.expect(TokenKind::Equals, "'='") {
                            self.recover_in_body();
                            continue;
                        }
                        match self.parse_requires() {
                            Some(spec) => self.push_clause(
                                &mut body,
                                &mut seen,
                                span,
                                "requires",
                                BodyItem::Requires(spec),
                            ),
                            None => self.recover_in_body(),
                        }
                    }
                    "suggests" => {
                        self.advance();
                        if !self.expect(TokenKind::Equals, "'='") {
                            self.recover_in_body();
                            continue;
                        }
                        match self.parse_suggests() {
                            Some(spec) => self.push_clause(
                                &mut body,
                                &mut seen,
                                span,
                                "suggests",
                                BodyItem::Suggests(spec),
                            ),
                            None => self.recover_in_body(),
                        }
                    }
                    "executes" => {
                        self.advance();
                        if !self.expect(TokenKind::Equals, "'='") {
                            self.recover_in_body();
                            continue;
                        }
                        match self.parse_exec() {
                            Some(spec) => self.push_clause(
                                &mut body,
                                &mut seen,
                                span,
                                "executes",
                                BodyItem::Executes(spec),
                            ),
                            None => self.recover_in_body(),
                        }
                    }
                    "map_result" => {
                        self.advance();
                        let target = if self.eat(&TokenKind::LParen) {
                            let name = self.parse_name();
                            if !self.expect(TokenKind::RParen, "')'") {
                                self.recover_in_body();
                                continue;
                            }
                            match name {
                                Some(name) => Some(name),
                                None => {
                                    self.recover_in_body();
                                    continue;
                                }
                            }
                        } else {
                            None
                        };
                        if !self.expect(TokenKind::Equals, "'='") {
                            self.recover_in_body();
                            continue;
                        }
                        match self.parse_mapper(span, target) {
                            Some(spec) => self.push_clause(
                                &mut body,
                                &mut seen,
                                span,
                                "map_result",
                                BodyItem::MapResult(spec),
                            ),
                            None => self.recover_in_body(),
                        }
                    }
                    other => {
                        self.error_here(format!("unexpected identifier '{}' in node body", other));
                        self.advance();
                        self.recover_in_body();
                    }
                },
                other => {
                    self.error_here(format!("unexpected {} in node body", other));
                    self.advance();
                    self.recover_in_body();
                }
            }
        }
    }

    fn push_clause(
        &mut self,
        body: &mut NodeBody,
        seen: &mut Vec<&'static str>,
        span: Span,
        keyword: &'static str,
        item: BodyItem,
    ) {
        if seen.contains(&keyword) {
            self.diags.warning(
                format!("duplicate '{}' clause; keeping the first", keyword),
                span,
            );
            return;
        }
        seen.push(keyword);
        body.items.push(item);
    }

    // =========================================================================
    // CLAUSE PAYLOADS
    // =========================================================================

    fn parse_name(&mut self) -> Option<Name> {
        let span = self.peek_span();
        match self.peek_parts().map(|(k, _)| k) {
            Some(TokenKind::Str(text)) => {
                self.advance();
                Some(Name {
                    kind: NameKind::Literal(text),
                    span,
                })
            }
            Some(TokenKind::At) => {
                let name = self.parse_variable_ref()?;
                Some(Name {
                    kind: NameKind::Variable(name),
                    span: span.merge(self.last_span),
                })
            }
            Some(TokenKind::Ident(name)) => {
                self.advance();
                Some(Name {
                    kind: NameKind::Raw(name),
                    span,
                })
            }
            _ => {
                self.error_here("expected a name");
                None
            }
        }
    }

    /// `@` already peeked; consumes `@ident`.
    fn parse_variable_ref(&mut self) -> Option<String> {
        self.advance(); // '@'
        match self.peek_parts().map(|(k, _)| k) {
            Some(TokenKind::Ident(name)) => {
                self.advance();
                Some(name)
            }
            _ => {
                self.error_here("expected a variable name after '@'");
                None
            }
        }
    }

    fn parse_type_ref(&mut self) -> Option<TypeRef> {
        let start = self.peek_span();
        match self.peek_parts().map(|(k, _)| k) {
            Some(TokenKind::At) => {
                let name = self.parse_variable_ref()?;
                Some(TypeRef {
                    kind: TypeRefKind::Variable(name),
                    span: start.merge(self.last_span),
                })
            }
            Some(TokenKind::Ident(name)) => {
                self.advance();
                let mut options = Vec::new();
                if self.eat(&TokenKind::LParen) {
                    loop {
                        let key = match self.peek_parts().map(|(k, _)| k) {
                            Some(TokenKind::Ident(key)) => {
                                self.advance();
                                key
                            }
                            Some(TokenKind::RParen) if options.is_empty() => {
                                self.advance();
                                break;
                            }
                            _ => {
                                self.error_here("expected an option name");
                                return None;
                            }
                        };
                        if !self.expect(TokenKind::Equals, "'='") {
                            return None;
                        }
                        let is_value = matches!(
                            self.peek(),
                            Some(t) if matches!(
                                t.kind,
                                TokenKind::Str(_)
                                    | TokenKind::Int(_)
                                    | TokenKind::Float(_)
                                    | TokenKind::Ident(_)
                            )
                        );
                        if !is_value {
                            self.error_here("expected an option value");
                            return None;
                        }
                        let value = self.advance()?;
                        options.push((key, value));
                        if self.eat(&TokenKind::Comma) {
                            continue;
                        }
                        if !self.expect(TokenKind::RParen, "')' or ','") {
                            return None;
                        }
                        break;
                    }
                }
                Some(TypeRef {
                    kind: TypeRefKind::Named { name, options },
                    span: start.merge(self.last_span),
                })
            }
            _ => {
                self.error_here("expected an argument type");
                None
            }
        }
    }

    fn parse_requires(&mut self) -> Option<RequireSpec> {
        let start = self.peek_span();
        if self.at_token(&TokenKind::At) {
            let name = self.parse_variable_ref()?;
            return Some(RequireSpec {
                kind: RequireKind::Variable(name),
                span: start.merge(self.last_span),
            });
        }
        if self.at_ident("permission") {
            self.advance();
            if self.eat(&TokenKind::LParen) {
                let name = self.parse_name()?;
                if !self.expect(TokenKind::RParen, "')'") {
                    return None;
                }
                return Some(RequireSpec {
                    kind: RequireKind::Permission(name),
                    span: start.merge(self.last_span),
                });
            }
            // No '(': this was the first hop of a chain named "permission".
            let chain = self.parse_chain_from("permission".to_string(), start)?;
            return Some(RequireSpec {
                span: chain.span,
                kind: RequireKind::Chain(chain),
            });
        }
        let chain = self.parse_chain()?;
        if chain.hops.len() == 1 && !chain.hops[0].call {
            match chain.hops[0].name.as_str() {
                "true" => {
                    return Some(RequireSpec {
                        kind: RequireKind::Constant(true),
                        span: chain.span,
                    })
                }
                "false" => {
                    return Some(RequireSpec {
                        kind: RequireKind::Constant(false),
                        span: chain.span,
                    })
                }
                _ => {}
            }
        }
        Some(RequireSpec {
            span: chain.span,
            kind: RequireKind::Chain(chain),
        })
    }

    fn parse_suggests(&mut self) -> Option<SuggestSpec> {
        let start = self.peek_span();
        match self.peek_parts().map(|(k, _)| k) {
            Some(TokenKind::At) => {
                let name = self.parse_variable_ref()?;
                Some(SuggestSpec {
                    kind: SuggestKind::Variable(name),
                    span: start.merge(self.last_span),
                })
            }
            Some(TokenKind::LBracket) => {
                let entries = self.parse_string_list()?;
                Some(SuggestSpec {
                    kind: SuggestKind::Strings(entries),
                    span: start.merge(self.last_span),
                })
            }
            _ => {
                let chain = self.parse_chain()?;
                Some(SuggestSpec {
                    span: chain.span,
                    kind: SuggestKind::Chain(chain),
                })
            }
        }
    }

    fn parse_exec(&mut self) -> Option<ExecSpec> {
        let start = self.peek_span();
        if self.at_token(&TokenKind::At) {
            let name = self.parse_variable_ref()?;
            return Some(ExecSpec {
                kind: ExecKind::Variable(name),
                span: start.merge(self.last_span),
            });
        }
        let chain = self.parse_chain()?;
        Some(ExecSpec {
            span: chain.span,
            kind: ExecKind::Chain(chain),
        })
    }

    fn parse_mapper(&mut self, start: Span, target: Option<Name>) -> Option<MapSpec> {
        if self.at_token(&TokenKind::At) {
            let name = self.parse_variable_ref()?;
            return Some(MapSpec {
                target,
                kind: MapKind::Variable(name),
                span: start.merge(self.last_span),
            });
        }
        let chain = self.parse_chain()?;
        // `result.rest...` selects the use-invocation-result form.
        let kind = if chain.hops.len() > 1 && !chain.hops[0].call && chain.hops[0].name == "result"
        {
            MapKind::ResultChain(Chain {
                hops: chain.hops[1..].to_vec(),
                span: chain.span,
            })
        } else {
            MapKind::Chain(chain)
        };
        let span = match &kind {
            MapKind::Chain(c) | MapKind::ResultChain(c) => start.merge(c.span),
            MapKind::Variable(_) => start.merge(self.last_span),
        };
        Some(MapSpec { target, kind, span })
    }

    fn parse_string_list(&mut self) -> Option<Vec<String>> {
        self.advance(); // '['
        let mut entries = Vec::new();
        if self.eat(&TokenKind::RBracket) {
            return Some(entries);
        }
        loop {
            match self.peek_parts().map(|(k, _)| k) {
                Some(TokenKind::Str(text)) => {
                    self.advance();
                    entries.push(text);
                }
                _ => {
                    self.error_here("expected a string");
                    return None;
                }
            }
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            if !self.expect(TokenKind::RBracket, "']' or ','") {
                return None;
            }
            return Some(entries);
        }
    }

    fn parse_chain(&mut self) -> Option<Chain> {
        let start = self.peek_span();
        match self.peek_parts().map(|(k, _)| k) {
            Some(TokenKind::Ident(first)) => {
                self.advance();
                self.parse_chain_from(first, start)
            }
            _ => {
                self.error_here("expected a member chain");
                None
            }
        }
    }

    /// Continue a chain whose first hop identifier is already consumed.
    fn parse_chain_from(&mut self, first: String, start: Span) -> Option<Chain> {
        let mut hops = vec![self.finish_hop(first, start)?];
        while self.eat(&TokenKind::Dot) {
            let hop_span = self.peek_span();
            match self.peek_parts().map(|(k, _)| k) {
                Some(TokenKind::Ident(name)) => {
                    self.advance();
                    hops.push(self.finish_hop(name, hop_span)?);
                }
                _ => {
                    self.error_here("expected a member name after '.'");
                    return None;
                }
            }
        }
        let span = start.merge(self.last_span);
        Some(Chain { hops, span })
    }

    /// Attach the optional `()` call marker to a hop.
    fn finish_hop(&mut self, name: String, span: Span) -> Option<ChainHop> {
        let call = if self.eat(&TokenKind::LParen) {
            if !self.expect(TokenKind::RParen, "')'") {
                return None;
            }
            true
        } else {
            false
        };
        Some(ChainHop {
            name,
            call,
            span: span.merge(self.last_span),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> CommandDecl {
        let mut diags = Diagnostics::new();
        let decl = parse(src, &mut diags).expect("expected a declaration");
        assert!(
            !diags.has_errors(),
            "unexpected diagnostics: {:?}",
            diags.into_vec()
        );
        decl
    }

    fn parse_err(src: &str) -> (Option<CommandDecl>, Diagnostics) {
        let mut diags = Diagnostics::new();
        let decl = parse(src, &mut diags);
        (decl, diags)
    }

    #[test]
    fn test_root_clauses() {
        let decl = parse_ok(
            r#"
            name = 'tp'
            permission = 'cmd.tp'
            aliases = 'teleport' | 'goto'
            description = 'Moves the source somewhere else'
            "#,
        );
        assert_eq!(decl.name.kind, NameKind::Literal("tp".into()));
        assert_eq!(
            decl.permission.unwrap().kind,
            NameKind::Literal("cmd.tp".into())
        );
        assert_eq!(decl.aliases.len(), 2);
        assert!(matches!(
            decl.description.unwrap().kind,
            DescriptionKind::Text(_)
        ));
    }

    #[test]
    fn test_nested_nodes_preserve_order() {
        let decl = parse_ok(
            r#"
            name = 'scale'
            literal('up') {
                argument('amount', int(min=1, max=10)) {
                    executes = handlers.scale_up()
                }
            }
            literal('down') = handlers.scale_down()
            "#,
        );
        assert_eq!(decl.nodes.len(), 2);
        let up = match &decl.nodes[0] {
            NodeDecl::Literal(l) => l,
            other => panic!("expected literal, got {:?}", other),
        };
        assert_eq!(up.body.children().count(), 1);
        let amount = match up.body.children().next().unwrap() {
            NodeDecl::Argument(a) => a,
            other => panic!("expected argument, got {:?}", other),
        };
        match &amount.type_ref.kind {
            TypeRefKind::Named { name, options } => {
                assert_eq!(name, "int");
                assert_eq!(options.len(), 2);
                assert_eq!(options[0].0, "min");
            }
            other => panic!("expected named type, got {:?}", other),
        }
        assert!(decl.nodes[1].body().is_executes_shorthand());
    }

    #[test]
    fn test_requires_forms() {
        let decl = parse_ok(
            r#"
            name = 't'
            literal('a') { requires = permission('use.a') }
            literal('b') { requires = checks.is_admin }
            literal('c') { requires = @allowed }
            literal('d') { requires = true }
            "#,
        );
        let kinds: Vec<_> = decl
            .nodes
            .iter()
            .map(|n| n.body().requires().unwrap().kind.clone())
            .collect();
        assert!(matches!(kinds[0], RequireKind::Permission(_)));
        assert!(matches!(kinds[1], RequireKind::Chain(_)));
        assert!(matches!(kinds[2], RequireKind::Variable(_)));
        assert_eq!(kinds[3], RequireKind::Constant(true));
    }

    #[test]
    fn test_suggest_and_mapper_forms() {
        let decl = parse_ok(
            r#"
            name = 't'
            argument('who', word) {
                suggests = ['alice', 'bob']
                map_result = lookups.to_entity
            }
            argument('x', int) {
                suggests = lookups.names()
                map_result('who') = result.lookups.resolve()
            }
            "#,
        );
        let first = decl.nodes[0].body();
        let spec = first
            .items
            .iter()
            .find_map(|i| match i {
                BodyItem::Suggests(s) => Some(s),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            spec.kind,
            SuggestKind::Strings(vec!["alice".into(), "bob".into()])
        );

        let second = decl.nodes[1].body();
        let mapper = second
            .items
            .iter()
            .find_map(|i| match i {
                BodyItem::MapResult(m) => Some(m),
                _ => None,
            })
            .unwrap();
        assert!(mapper.target.is_some());
        match &mapper.kind {
            MapKind::ResultChain(chain) => assert_eq!(chain.path(), "lookups.resolve()"),
            other => panic!("expected result chain, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_clause_keeps_first() {
        let (decl, diags) = parse_err(
            r#"
            name = 't'
            literal('a') {
                executes = first.run()
                executes = second.run()
            }
            "#,
        );
        let decl = decl.unwrap();
        assert_eq!(diags.len(), 1);
        assert!(!diags.has_errors()); // duplicate is a warning
        let exec = decl.nodes[0].body().executes().unwrap();
        match &exec.kind {
            ExecKind::Chain(chain) => assert_eq!(chain.path(), "first.run()"),
            other => panic!("expected chain, got {:?}", other),
        }
    }

    #[test]
    fn test_recovery_collects_sibling_errors() {
        let (decl, diags) = parse_err(
            r#"
            name = 't'
            literal('a') { executes = = }
            literal('b') { suggests 'no equals' }
            literal('c') { executes = ok.run() }
            "#,
        );
        let decl = decl.unwrap();
        // Both malformed nodes report; the healthy sibling still parses.
        assert!(diags.error_count() >= 2);
        assert_eq!(decl.nodes.len(), 3);
        assert!(decl.nodes[2].body().executes().is_some());
    }

    #[test]
    fn test_recovery_respects_nesting_depth() {
        let (decl, diags) = parse_err(
            r#"
            name = 't'
            literal('outer') {
                literal('bad') { executes = }
                literal('good') = ok.run()
            }
            "#,
        );
        let decl = decl.unwrap();
        assert!(diags.has_errors());
        let outer = match &decl.nodes[0] {
            NodeDecl::Literal(l) => l,
            other => panic!("expected literal, got {:?}", other),
        };
        // The malformed child did not eat the parent's closing brace.
        let children: Vec<_> = outer.body.children().collect();
        assert_eq!(children.len(), 2);
        assert!(children[1].body().is_executes_shorthand());
    }

    #[test]
    fn test_missing_name_clause_is_error() {
        let (_, diags) = parse_err("literal('x') = run()");
        assert!(diags.has_errors());
    }

    #[test]
    fn test_empty_input_is_error() {
        let (decl, diags) = parse_err("  // nothing but trivia\n");
        assert!(decl.is_none());
        assert_eq!(diags.error_count(), 1);
    }

    #[test]
    fn test_unclosed_body_reports_and_keeps_items() {
        let (decl, diags) = parse_err(
            r#"
            name = 't'
            literal('a') {
                executes = run.now()
            "#,
        );
        let decl = decl.unwrap();
        assert!(diags.has_errors());
        assert!(decl.nodes[0].body().executes().is_some());
    }

    #[test]
    fn test_variable_positions() {
        let decl = parse_ok(
            r#"
            name = @cmd_name
            argument(@arg_name, @arg_type) {
                executes = @handler
            }
            "#,
        );
        assert_eq!(decl.name.kind, NameKind::Variable("cmd_name".into()));
        let arg = match &decl.nodes[0] {
            NodeDecl::Argument(a) => a,
            other => panic!("expected argument, got {:?}", other),
        };
        assert_eq!(arg.type_ref.kind, TypeRefKind::Variable("arg_type".into()));
        assert!(matches!(
            arg.body.executes().unwrap().kind,
            ExecKind::Variable(_)
        ));
    }
}
