//! Host capability tables.
//!
//! Unqualified member chains in the DSL resolve against a host object: a
//! table of named handles implementing the typed hook traits, registered
//! explicitly by the embedding application. A [`TypeDescriptor`] declares
//! the shape (what exists and with which type); a [`HostObject`] instance
//! supplies the live handles. Compilation validates chains against the
//! descriptor only; instances are consulted at execution time, so a
//! declared slot may legitimately be empty when a command runs.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use cmdtree_types::{
    CommandExecutor, Requirement, SuggestionSource, ValueKind, ValueMapper,
};

// =============================================================================
// DECLARATIONS (compile-time shape)
// =============================================================================

/// Declared parameter of an executor member. Required parameters are
/// checked against the visible argument scope at compile time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDecl {
    pub name: String,
    pub kind: ValueKind,
    pub optional: bool,
}

impl ParamDecl {
    pub fn required(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            optional: false,
        }
    }

    pub fn optional(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            optional: true,
        }
    }
}

/// Shape of a member: a field is read, a method is invoked. Chain hops
/// written with `()` only match method-shaped members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberShape {
    Field,
    Method,
}

/// Declared type of a member.
#[derive(Debug, Clone)]
pub enum MemberType {
    /// A nested namespace; chains continue through it.
    Object(Arc<TypeDescriptor>),
    Executor(Vec<ParamDecl>),
    Requirement,
    Suggestions,
    Mapper,
}

impl MemberType {
    pub fn describe(&self) -> &'static str {
        match self {
            MemberType::Object(_) => "an object",
            MemberType::Executor(_) => "an executor",
            MemberType::Requirement => "a requirement",
            MemberType::Suggestions => "a suggestion provider",
            MemberType::Mapper => "a mapper",
        }
    }
}

#[derive(Debug, Clone)]
pub struct MemberDecl {
    pub shape: MemberShape,
    pub ty: MemberType,
}

/// The declared shape of a host object: member names to declarations.
#[derive(Debug, Clone, Default)]
pub struct TypeDescriptor {
    name: String,
    members: HashMap<String, MemberDecl>,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declare(&mut self, name: impl Into<String>, decl: MemberDecl) {
        self.members.insert(name.into(), decl);
    }

    pub fn member(&self, name: &str) -> Option<&MemberDecl> {
        self.members.get(name)
    }
}

// =============================================================================
// INSTANCES (execution-time values)
// =============================================================================

/// The live handle behind a declared member.
#[derive(Clone)]
pub enum MemberValue {
    Object(Arc<dyn HostObject>),
    Executor(Arc<dyn CommandExecutor>),
    Requirement(Arc<dyn Requirement>),
    Suggestions(Arc<dyn SuggestionSource>),
    Mapper(Arc<dyn ValueMapper>),
}

impl MemberValue {
    pub fn describe(&self) -> &'static str {
        match self {
            MemberValue::Object(_) => "an object",
            MemberValue::Executor(_) => "an executor",
            MemberValue::Requirement(_) => "a requirement",
            MemberValue::Suggestions(_) => "a suggestion provider",
            MemberValue::Mapper(_) => "a mapper",
        }
    }
}

impl fmt::Debug for MemberValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// The object unqualified member chains resolve against.
pub trait HostObject: Send + Sync {
    fn descriptor(&self) -> &TypeDescriptor;

    /// The live value of a member, or `None` when the slot holds nothing
    /// right now. An empty slot mid-chain is an execution-time error, not
    /// a compile-time one.
    fn member(&self, name: &str) -> Option<MemberValue>;
}

// =============================================================================
// CAPABILITY TABLE
// =============================================================================

/// Ready-made [`HostObject`] backed by explicit registration.
pub struct CapabilityTable {
    descriptor: Arc<TypeDescriptor>,
    members: HashMap<String, MemberValue>,
}

impl CapabilityTable {
    pub fn builder(name: impl Into<String>) -> CapabilityTableBuilder {
        CapabilityTableBuilder {
            descriptor: TypeDescriptor::new(name),
            members: HashMap::new(),
        }
    }

    /// A host with no members at all.
    pub fn empty(name: impl Into<String>) -> Arc<Self> {
        Self::builder(name).build()
    }
}

impl HostObject for CapabilityTable {
    fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    fn member(&self, name: &str) -> Option<MemberValue> {
        self.members.get(name).cloned()
    }
}

pub struct CapabilityTableBuilder {
    descriptor: TypeDescriptor,
    members: HashMap<String, MemberValue>,
}

impl CapabilityTableBuilder {
    pub fn executor(
        mut self,
        name: &str,
        shape: MemberShape,
        params: Vec<ParamDecl>,
        handler: Arc<dyn CommandExecutor>,
    ) -> Self {
        self.descriptor.declare(
            name,
            MemberDecl {
                shape,
                ty: MemberType::Executor(params),
            },
        );
        self.members
            .insert(name.to_string(), MemberValue::Executor(handler));
        self
    }

    pub fn requirement(
        mut self,
        name: &str,
        shape: MemberShape,
        handler: Arc<dyn Requirement>,
    ) -> Self {
        self.descriptor.declare(
            name,
            MemberDecl {
                shape,
                ty: MemberType::Requirement,
            },
        );
        self.members
            .insert(name.to_string(), MemberValue::Requirement(handler));
        self
    }

    pub fn suggestions(
        mut self,
        name: &str,
        shape: MemberShape,
        handler: Arc<dyn SuggestionSource>,
    ) -> Self {
        self.descriptor.declare(
            name,
            MemberDecl {
                shape,
                ty: MemberType::Suggestions,
            },
        );
        self.members
            .insert(name.to_string(), MemberValue::Suggestions(handler));
        self
    }

    pub fn mapper(mut self, name: &str, shape: MemberShape, handler: Arc<dyn ValueMapper>) -> Self {
        self.descriptor.declare(
            name,
            MemberDecl {
                shape,
                ty: MemberType::Mapper,
            },
        );
        self.members
            .insert(name.to_string(), MemberValue::Mapper(handler));
        self
    }

    /// Register a nested namespace. The child's descriptor becomes part of
    /// this table's declared shape.
    pub fn object(mut self, name: &str, shape: MemberShape, child: Arc<CapabilityTable>) -> Self {
        self.descriptor.declare(
            name,
            MemberDecl {
                shape,
                ty: MemberType::Object(child.descriptor.clone()),
            },
        );
        self.members
            .insert(name.to_string(), MemberValue::Object(child));
        self
    }

    /// Declare a member without supplying a value. Chains through it
    /// compile; walking it at execution time fails.
    pub fn vacant(mut self, name: &str, shape: MemberShape, ty: MemberType) -> Self {
        self.descriptor.declare(name, MemberDecl { shape, ty });
        self
    }

    pub fn build(self) -> Arc<CapabilityTable> {
        Arc::new(CapabilityTable {
            descriptor: Arc::new(self.descriptor),
            members: self.members,
        })
    }
}
