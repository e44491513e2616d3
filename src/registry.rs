//! Argument type registry.
//!
//! Maps a type name from an `argument(name, type(...))` declaration to a
//! factory that builds an [`ArgumentParser`] from the declaration's option
//! map. The registry is supplied per compile call; [`default_registry`]
//! exposes a process-wide instance carrying the builtin types.
//!
//! The full library of domain argument types lives with the embedding
//! application; the builtins here cover the primitives.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use tracing::debug;

use cmdtree_types::{ArgParseError, ArgValue, ArgumentParser, ValueKind};

use crate::lexer::{Token, TokenKind};

type Factory =
    Box<dyn Fn(&TypeOptions<'_>) -> Result<Arc<dyn ArgumentParser>, String> + Send + Sync>;

/// Registry of argument type factories, keyed by type name.
#[derive(Default)]
pub struct TypeRegistry {
    factories: HashMap<String, Factory>,
}

impl TypeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the builtin types registered.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("int", |opts| {
            opts.ensure_known(&["min", "max"])?;
            Ok(Arc::new(IntParser {
                min: opts.int("min")?,
                max: opts.int("max")?,
            }) as Arc<dyn ArgumentParser>)
        });
        registry.register("float", |opts| {
            opts.ensure_known(&["min", "max"])?;
            Ok(Arc::new(FloatParser {
                min: opts.float("min")?,
                max: opts.float("max")?,
            }) as Arc<dyn ArgumentParser>)
        });
        registry.register("word", |opts| {
            opts.ensure_known(&[])?;
            Ok(Arc::new(WordParser) as Arc<dyn ArgumentParser>)
        });
        registry.register("string", |opts| {
            opts.ensure_known(&[])?;
            Ok(Arc::new(StringParser) as Arc<dyn ArgumentParser>)
        });
        registry.register("bool", |opts| {
            opts.ensure_known(&[])?;
            Ok(Arc::new(BoolParser) as Arc<dyn ArgumentParser>)
        });
        registry.register("choice", |opts| {
            opts.ensure_known(&["values"])?;
            let values = opts
                .str("values")?
                .ok_or_else(|| "argument type 'choice' requires a 'values' option".to_string())?;
            let entries: Vec<String> = values
                .split('|')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .collect();
            if entries.is_empty() {
                return Err("argument type 'choice' requires at least one value".to_string());
            }
            Ok(Arc::new(ChoiceParser { entries }) as Arc<dyn ArgumentParser>)
        });
        registry
    }

    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&TypeOptions<'_>) -> Result<Arc<dyn ArgumentParser>, String> + Send + Sync + 'static,
    {
        debug!(name, "registered argument type");
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    /// Build a parser for the named type from the declaration's options.
    pub fn lookup(
        &self,
        name: &str,
        options: &[(String, Token)],
    ) -> Result<Arc<dyn ArgumentParser>, String> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| format!("unknown argument type '{}'", name))?;
        factory(&TypeOptions {
            type_name: name,
            entries: options,
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

/// The process-wide registry with builtin types.
pub fn default_registry() -> &'static TypeRegistry {
    static REGISTRY: OnceLock<TypeRegistry> = OnceLock::new();
    REGISTRY.get_or_init(TypeRegistry::builtin)
}

// =============================================================================
// OPTION ACCESS
// =============================================================================

/// View over one declaration's option map, with typed access and unknown-
/// option detection.
pub struct TypeOptions<'a> {
    type_name: &'a str,
    entries: &'a [(String, Token)],
}

impl<'a> TypeOptions<'a> {
    /// Reject options outside the allowed set, and duplicates.
    pub fn ensure_known(&self, allowed: &[&str]) -> Result<(), String> {
        for (index, (key, _)) in self.entries.iter().enumerate() {
            if !allowed.contains(&key.as_str()) {
                return Err(format!(
                    "unknown option '{}' for argument type '{}'",
                    key, self.type_name
                ));
            }
            if self.entries[..index].iter().any(|(k, _)| k == key) {
                return Err(format!(
                    "duplicate option '{}' for argument type '{}'",
                    key, self.type_name
                ));
            }
        }
        Ok(())
    }

    fn get(&self, key: &str) -> Option<&Token> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, token)| token)
    }

    pub fn int(&self, key: &str) -> Result<Option<i64>, String> {
        match self.get(key) {
            None => Ok(None),
            Some(Token {
                kind: TokenKind::Int(v),
                ..
            }) => Ok(Some(*v)),
            Some(_) => Err(format!(
                "option '{}' of argument type '{}' expects an integer",
                key, self.type_name
            )),
        }
    }

    pub fn float(&self, key: &str) -> Result<Option<f64>, String> {
        match self.get(key) {
            None => Ok(None),
            Some(Token {
                kind: TokenKind::Float(v),
                ..
            }) => Ok(Some(*v)),
            Some(Token {
                kind: TokenKind::Int(v),
                ..
            }) => Ok(Some(*v as f64)),
            Some(_) => Err(format!(
                "option '{}' of argument type '{}' expects a number",
                key, self.type_name
            )),
        }
    }

    pub fn str(&self, key: &str) -> Result<Option<String>, String> {
        match self.get(key) {
            None => Ok(None),
            Some(Token {
                kind: TokenKind::Str(s),
                ..
            }) => Ok(Some(s.clone())),
            Some(Token {
                kind: TokenKind::Ident(s),
                ..
            }) => Ok(Some(s.clone())),
            Some(_) => Err(format!(
                "option '{}' of argument type '{}' expects a string",
                key, self.type_name
            )),
        }
    }
}

// =============================================================================
// BUILTIN PARSERS
// =============================================================================

struct IntParser {
    min: Option<i64>,
    max: Option<i64>,
}

impl ArgumentParser for IntParser {
    fn type_name(&self) -> &str {
        "int"
    }

    fn kind(&self) -> ValueKind {
        ValueKind::Int
    }

    fn parse(&self, input: &str) -> Result<ArgValue, ArgParseError> {
        let value: i64 = input
            .parse()
            .map_err(|_| ArgParseError::new(format!("expected an integer, got '{}'", input)))?;
        if let Some(min) = self.min {
            if value < min {
                return Err(ArgParseError::new(format!(
                    "value {} is below the minimum {}",
                    value, min
                )));
            }
        }
        if let Some(max) = self.max {
            if value > max {
                return Err(ArgParseError::new(format!(
                    "value {} is above the maximum {}",
                    value, max
                )));
            }
        }
        Ok(ArgValue::Int(value))
    }
}

struct FloatParser {
    min: Option<f64>,
    max: Option<f64>,
}

impl ArgumentParser for FloatParser {
    fn type_name(&self) -> &str {
        "float"
    }

    fn kind(&self) -> ValueKind {
        ValueKind::Float
    }

    fn parse(&self, input: &str) -> Result<ArgValue, ArgParseError> {
        let value: f64 = input
            .parse()
            .map_err(|_| ArgParseError::new(format!("expected a number, got '{}'", input)))?;
        if let Some(min) = self.min {
            if value < min {
                return Err(ArgParseError::new(format!(
                    "value {} is below the minimum {}",
                    value, min
                )));
            }
        }
        if let Some(max) = self.max {
            if value > max {
                return Err(ArgParseError::new(format!(
                    "value {} is above the maximum {}",
                    value, max
                )));
            }
        }
        Ok(ArgValue::Float(value))
    }
}

struct WordParser;

impl ArgumentParser for WordParser {
    fn type_name(&self) -> &str {
        "word"
    }

    fn kind(&self) -> ValueKind {
        ValueKind::Str
    }

    fn parse(&self, input: &str) -> Result<ArgValue, ArgParseError> {
        if input.is_empty() || input.contains(char::is_whitespace) {
            return Err(ArgParseError::new(format!(
                "expected a single word, got '{}'",
                input
            )));
        }
        Ok(ArgValue::Str(input.to_string()))
    }
}

struct StringParser;

impl ArgumentParser for StringParser {
    fn type_name(&self) -> &str {
        "string"
    }

    fn kind(&self) -> ValueKind {
        ValueKind::Str
    }

    fn parse(&self, input: &str) -> Result<ArgValue, ArgParseError> {
        Ok(ArgValue::Str(input.to_string()))
    }
}

struct BoolParser;

impl ArgumentParser for BoolParser {
    fn type_name(&self) -> &str {
        "bool"
    }

    fn kind(&self) -> ValueKind {
        ValueKind::Bool
    }

    fn parse(&self, input: &str) -> Result<ArgValue, ArgParseError> {
        match input {
            "true" => Ok(ArgValue::Bool(true)),
            "false" => Ok(ArgValue::Bool(false)),
            other => Err(ArgParseError::new(format!(
                "expected 'true' or 'false', got '{}'",
                other
            ))),
        }
    }
}

struct ChoiceParser {
    entries: Vec<String>,
}

impl ArgumentParser for ChoiceParser {
    fn type_name(&self) -> &str {
        "choice"
    }

    fn kind(&self) -> ValueKind {
        ValueKind::Str
    }

    fn parse(&self, input: &str) -> Result<ArgValue, ArgParseError> {
        if self.entries.iter().any(|e| e == input) {
            Ok(ArgValue::Str(input.to_string()))
        } else {
            Err(ArgParseError::new(format!(
                "expected one of: {}",
                self.entries.join(", ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Span;

    fn token(kind: TokenKind) -> Token {
        Token {
            kind,
            span: Span::default(),
        }
    }

    fn options(entries: &[(&str, TokenKind)]) -> Vec<(String, Token)> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), token(v.clone())))
            .collect()
    }

    #[test]
    fn test_unknown_type() {
        let err = default_registry().lookup("entity", &[]).unwrap_err();
        assert_eq!(err, "unknown argument type 'entity'");
    }

    #[test]
    fn test_unknown_option() {
        let err = default_registry()
            .lookup("int", &options(&[("step", TokenKind::Int(2))]))
            .unwrap_err();
        assert_eq!(err, "unknown option 'step' for argument type 'int'");
    }

    #[test]
    fn test_int_range() {
        let parser = default_registry()
            .lookup(
                "int",
                &options(&[("min", TokenKind::Int(1)), ("max", TokenKind::Int(2))]),
            )
            .unwrap();
        assert_eq!(parser.parse("2").unwrap(), ArgValue::Int(2));
        let err = parser.parse("5").unwrap_err();
        assert_eq!(err.message, "value 5 is above the maximum 2");
        assert!(parser.parse("abc").is_err());
    }

    #[test]
    fn test_option_type_mismatch() {
        let err = default_registry()
            .lookup("int", &options(&[("min", TokenKind::Str("low".into()))]))
            .unwrap_err();
        assert!(err.contains("expects an integer"));
    }

    #[test]
    fn test_choice_values() {
        let parser = default_registry()
            .lookup(
                "choice",
                &options(&[("values", TokenKind::Str("red|green|blue".into()))]),
            )
            .unwrap();
        assert_eq!(parser.parse("green").unwrap(), ArgValue::Str("green".into()));
        assert!(parser.parse("purple").is_err());

        let err = default_registry().lookup("choice", &[]).unwrap_err();
        assert!(err.contains("requires a 'values' option"));
    }

    #[test]
    fn test_custom_registration() {
        let mut registry = TypeRegistry::new();
        registry.register("upper_word", |opts| {
            opts.ensure_known(&[])?;
            Ok(Arc::new(WordParser) as Arc<dyn ArgumentParser>)
        });
        assert!(registry.contains("upper_word"));
        assert!(registry.lookup("upper_word", &[]).is_ok());
    }

    #[test]
    fn test_bool_and_word() {
        let registry = default_registry();
        let bool_parser = registry.lookup("bool", &[]).unwrap();
        assert_eq!(bool_parser.parse("true").unwrap(), ArgValue::Bool(true));
        assert!(bool_parser.parse("yes").is_err());

        let word_parser = registry.lookup("word", &[]).unwrap();
        assert!(word_parser.parse("two words").is_err());
        assert_eq!(
            word_parser.parse("one").unwrap(),
            ArgValue::Str("one".into())
        );
    }
}
