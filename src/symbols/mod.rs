//! Symbol arena handed to the delta engine by the front end.
//!
//! A [`Compilation`] owns every declaration of one build of the program in a flat arena.
//! Symbols are referred to by [`SymbolId`] handles, which embed the id of the owning
//! compilation. Handles compare by value, so maps keyed by them behave like identity maps:
//! the same declaration in two different compilations yields two different handles, and
//! only a [`matcher::SymbolMatcher`] can relate them.
//!
//! # Key Components
//!
//! - [`Compilation`] / [`CompilationBuilder`] - The arena and its builder
//! - [`Symbol`] / [`SymbolData`] - Declarations and their kind-specific data
//! - [`types`] - Type references, signatures and member references
//! - [`matcher`] - Cross-generation symbol matching
//! - [`names`] - Compiler-generated member names
//!
//! # Examples
//!
//! ```rust
//! use dotdelta::symbols::{CompilationBuilder, MethodData, TypeData};
//! use dotdelta::symbols::types::{MethodSignature, TypeRef};
//!
//! let mut builder = CompilationBuilder::new("App");
//! let ns = builder.namespace(builder.global_namespace(), "N");
//! let class = builder.add_type(ns, "C", TypeData::class());
//! let method = builder.add_method(
//!     class,
//!     "M",
//!     MethodData::new(MethodSignature::instance(TypeRef::void(), vec![])),
//! );
//! let compilation = builder.build();
//!
//! assert_eq!(compilation.qualified_name(method), "N.C.M");
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::{Error, Result};

mod builder;
mod flags;
pub mod matcher;
pub mod names;
pub mod types;

pub use builder::CompilationBuilder;
pub use flags::{
    EventAttributes, FieldAttributes, GenericParamAttributes, LocalConstraints,
    MethodAttributes, MethodImplAttributes, MethodSemanticsAttributes, ParamAttributes,
    PropertyAttributes, TypeAttributes, WellKnownAttributes,
};

use types::{CustomAttribute, MemberReference, MethodSignature, TypeRef};

static NEXT_COMPILATION_ID: AtomicU32 = AtomicU32::new(1);

/// Process-unique id of a [`Compilation`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompilationId(u32);

impl CompilationId {
    pub(crate) fn next() -> Self {
        CompilationId(NEXT_COMPILATION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Handle of a symbol inside a [`Compilation`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId {
    compilation: CompilationId,
    index: u32,
}

impl SymbolId {
    /// Returns the compilation the symbol belongs to.
    #[must_use]
    pub fn compilation(&self) -> CompilationId {
        self.compilation
    }

    /// Returns the arena index of the symbol.
    #[must_use]
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}", self.compilation.0, self.index)
    }
}

/// Kind of a declaration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    /// Namespace
    Namespace,
    /// Class, struct, interface, enum or delegate
    Type,
    /// Field
    Field,
    /// Method, constructor or accessor
    Method,
    /// Property
    Property,
    /// Event
    Event,
}

/// Shape of a type definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Reference type
    Class,
    /// Value type
    Struct,
    /// Interface
    Interface,
    /// Enumeration
    Enum,
    /// Delegate
    Delegate,
}

/// State machine a kickoff method is lowered into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StateMachineKind {
    /// `async` method
    Async,
    /// Iterator method
    Iterator,
    /// `async` iterator method
    AsyncIterator,
}

impl StateMachineKind {
    /// Returns the runtime attribute that marks kickoff methods of this kind.
    #[must_use]
    pub fn required_attribute(&self) -> WellKnownAttributes {
        match self {
            StateMachineKind::Async => WellKnownAttributes::ASYNC_STATE_MACHINE,
            StateMachineKind::Iterator => WellKnownAttributes::ITERATOR_STATE_MACHINE,
            StateMachineKind::AsyncIterator => WellKnownAttributes::ASYNC_ITERATOR_STATE_MACHINE,
        }
    }

    /// Returns the full name of the attribute that marks kickoff methods of this kind.
    #[must_use]
    pub fn attribute_name(&self) -> &'static str {
        match self {
            StateMachineKind::Async => {
                "System.Runtime.CompilerServices.AsyncStateMachineAttribute"
            }
            StateMachineKind::Iterator => {
                "System.Runtime.CompilerServices.IteratorStateMachineAttribute"
            }
            StateMachineKind::AsyncIterator => {
                "System.Runtime.CompilerServices.AsyncIteratorStateMachineAttribute"
            }
        }
    }
}

/// Link between the two parts of a partial method.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PartialMethodPart {
    /// The declaring part; carries the implementing part if there is one
    Definition {
        /// Implementing part
        implementation: Option<SymbolId>,
    },
    /// The implementing part
    Implementation {
        /// Declaring part
        definition: SymbolId,
    },
}

/// Origin of a compiler-generated symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SynthesizedOrigin {
    /// User method whose lowering produced the symbol
    pub generator: SymbolId,
    /// True if the symbol's content depends on the generator's body
    pub has_body_dependency: bool,
}

/// A generic parameter of a type or method.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GenericParameter {
    /// Parameter name
    pub name: String,
    /// Zero-based ordinal
    pub number: u16,
    /// Variance and special constraints
    pub flags: GenericParamAttributes,
    /// Type constraints
    pub constraints: Vec<TypeRef>,
}

/// A method parameter.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// 1-based sequence, 0 for the return value
    pub sequence: u16,
    /// Parameter flags
    pub flags: ParamAttributes,
    /// Attributes applied to the parameter
    pub attributes: Vec<CustomAttribute>,
}

impl Parameter {
    /// Creates a plain parameter.
    #[must_use]
    pub fn new(name: &str, sequence: u16) -> Self {
        Parameter {
            name: name.to_string(),
            sequence,
            flags: ParamAttributes::empty(),
            attributes: Vec::new(),
        }
    }
}

/// Type-specific data.
#[derive(Clone, Debug)]
pub struct TypeData {
    /// Shape of the type
    pub kind: TypeKind,
    /// Type flags
    pub flags: TypeAttributes,
    /// Base type
    pub base: Option<TypeRef>,
    /// Generic parameters
    pub generic_parameters: Vec<GenericParameter>,
}

impl TypeData {
    /// A public class deriving from `object`.
    #[must_use]
    pub fn class() -> Self {
        TypeData {
            kind: TypeKind::Class,
            flags: TypeAttributes::PUBLIC,
            base: Some(TypeRef::object()),
            generic_parameters: Vec::new(),
        }
    }

    /// A public struct.
    #[must_use]
    pub fn structure(value_type: TypeRef) -> Self {
        TypeData {
            kind: TypeKind::Struct,
            flags: TypeAttributes::PUBLIC
                | TypeAttributes::SEALED
                | TypeAttributes::SEQUENTIAL_LAYOUT,
            base: Some(value_type),
            generic_parameters: Vec::new(),
        }
    }

    /// Returns true for structs and enums.
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        matches!(self.kind, TypeKind::Struct | TypeKind::Enum)
    }
}

/// Field-specific data.
#[derive(Clone, Debug)]
pub struct FieldData {
    /// Field flags
    pub flags: FieldAttributes,
    /// Field type
    pub field_type: TypeRef,
}

impl FieldData {
    /// A private instance field of the given type.
    #[must_use]
    pub fn new(field_type: TypeRef) -> Self {
        FieldData {
            flags: FieldAttributes::PRIVATE,
            field_type,
        }
    }
}

/// Method-specific data.
#[derive(Clone, Debug)]
pub struct MethodData {
    /// Method flags
    pub flags: MethodAttributes,
    /// Implementation flags
    pub impl_flags: MethodImplAttributes,
    /// Signature
    pub signature: MethodSignature,
    /// Parameters with metadata rows
    pub parameters: Vec<Parameter>,
    /// Generic parameters
    pub generic_parameters: Vec<GenericParameter>,
    /// Partial method link
    pub partial: Option<PartialMethodPart>,
    /// Property or event this method is an accessor of
    pub association: Option<SymbolId>,
    /// State machine the method is lowered into, for kickoff methods
    pub state_machine: Option<StateMachineKind>,
    /// Interface methods this method explicitly implements
    pub implements: Vec<MemberReference>,
    /// Source position of the method declaration; syntax offsets are relative to it
    pub body_position: u32,
}

impl MethodData {
    /// A public method with the given signature.
    #[must_use]
    pub fn new(signature: MethodSignature) -> Self {
        let flags = if signature.has_this {
            MethodAttributes::PUBLIC | MethodAttributes::HIDE_BY_SIG
        } else {
            MethodAttributes::PUBLIC | MethodAttributes::HIDE_BY_SIG | MethodAttributes::STATIC
        };
        MethodData {
            flags,
            impl_flags: MethodImplAttributes::empty(),
            signature,
            parameters: Vec::new(),
            generic_parameters: Vec::new(),
            partial: None,
            association: None,
            state_machine: None,
            implements: Vec::new(),
            body_position: 0,
        }
    }

    /// Returns true for the implementing part of a partial method.
    #[must_use]
    pub fn is_partial_implementation(&self) -> bool {
        matches!(self.partial, Some(PartialMethodPart::Implementation { .. }))
    }

    /// Returns true if the method carries IL.
    #[must_use]
    pub fn has_body(&self) -> bool {
        !self.flags.contains(MethodAttributes::ABSTRACT)
            && !self.impl_flags.contains(MethodImplAttributes::RUNTIME)
            && !self.impl_flags.contains(MethodImplAttributes::INTERNAL_CALL)
    }
}

/// Property-specific data.
#[derive(Clone, Debug)]
pub struct PropertyData {
    /// Property flags
    pub flags: PropertyAttributes,
    /// Property signature; `has_this` and parameters describe indexers
    pub signature: MethodSignature,
    /// Getter method
    pub getter: Option<SymbolId>,
    /// Setter method
    pub setter: Option<SymbolId>,
}

/// Event-specific data.
#[derive(Clone, Debug)]
pub struct EventData {
    /// Event flags
    pub flags: EventAttributes,
    /// Delegate type
    pub event_type: TypeRef,
    /// Add accessor
    pub adder: Option<SymbolId>,
    /// Remove accessor
    pub remover: Option<SymbolId>,
    /// Raise accessor
    pub raiser: Option<SymbolId>,
}

/// Kind-specific data of a symbol.
#[derive(Clone, Debug)]
pub enum SymbolData {
    /// Namespace
    Namespace,
    /// Type definition
    Type(TypeData),
    /// Field definition
    Field(FieldData),
    /// Method definition
    Method(MethodData),
    /// Property definition
    Property(PropertyData),
    /// Event definition
    Event(EventData),
}

/// A declaration in a [`Compilation`].
#[derive(Clone, Debug)]
pub struct Symbol {
    /// Handle of the symbol
    pub id: SymbolId,
    /// Simple name
    pub name: String,
    /// Containing namespace, type, property or event
    pub container: Option<SymbolId>,
    /// Nested declarations in declaration order
    pub members: Vec<SymbolId>,
    /// Attributes applied to the declaration
    pub attributes: Vec<CustomAttribute>,
    /// Set for compiler-generated symbols
    pub synthesized: Option<SynthesizedOrigin>,
    /// Kind-specific data
    pub data: SymbolData,
}

impl Symbol {
    /// Returns the kind of the symbol.
    #[must_use]
    pub fn kind(&self) -> SymbolKind {
        match self.data {
            SymbolData::Namespace => SymbolKind::Namespace,
            SymbolData::Type(_) => SymbolKind::Type,
            SymbolData::Field(_) => SymbolKind::Field,
            SymbolData::Method(_) => SymbolKind::Method,
            SymbolData::Property(_) => SymbolKind::Property,
            SymbolData::Event(_) => SymbolKind::Event,
        }
    }

    /// Returns the type data of a type symbol.
    #[must_use]
    pub fn as_type(&self) -> Option<&TypeData> {
        match &self.data {
            SymbolData::Type(data) => Some(data),
            _ => None,
        }
    }

    /// Returns the field data of a field symbol.
    #[must_use]
    pub fn as_field(&self) -> Option<&FieldData> {
        match &self.data {
            SymbolData::Field(data) => Some(data),
            _ => None,
        }
    }

    /// Returns the method data of a method symbol.
    #[must_use]
    pub fn as_method(&self) -> Option<&MethodData> {
        match &self.data {
            SymbolData::Method(data) => Some(data),
            _ => None,
        }
    }

    /// Returns the property data of a property symbol.
    #[must_use]
    pub fn as_property(&self) -> Option<&PropertyData> {
        match &self.data {
            SymbolData::Property(data) => Some(data),
            _ => None,
        }
    }

    /// Returns the event data of an event symbol.
    #[must_use]
    pub fn as_event(&self) -> Option<&EventData> {
        match &self.data {
            SymbolData::Event(data) => Some(data),
            _ => None,
        }
    }

    /// Returns the number of generic parameters of a type or method.
    #[must_use]
    pub fn generic_arity(&self) -> usize {
        match &self.data {
            SymbolData::Type(data) => data.generic_parameters.len(),
            SymbolData::Method(data) => data.generic_parameters.len(),
            _ => 0,
        }
    }
}

/// Key of an anonymous type or delegate synthesized by the front end.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AnonymousTypeKey {
    /// Anonymous type, identified by its ordered property names
    Type(Vec<String>),
    /// Anonymous delegate, identified by its signature description
    Delegate(String),
}

/// Emitted identity of an anonymous type or delegate.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AnonymousTypeValue {
    /// Emitted metadata name
    pub name: String,
    /// Index used to generate the name
    pub unique_index: u32,
    /// The type definition
    pub type_symbol: SymbolId,
}

/// Anonymous types and delegates of a generation, by key.
pub type SynthesizedTypeMap = HashMap<AnonymousTypeKey, AnonymousTypeValue>;

/// A compiled program: the symbol arena the delta engine walks.
#[derive(Debug)]
pub struct Compilation {
    id: CompilationId,
    assembly_name: String,
    core_library: String,
    global_namespace: SymbolId,
    symbols: Vec<Symbol>,
    well_known: WellKnownAttributes,
    anonymous_types: SynthesizedTypeMap,
}

impl Compilation {
    pub(crate) fn from_parts(
        id: CompilationId,
        assembly_name: String,
        core_library: String,
        global_namespace: SymbolId,
        symbols: Vec<Symbol>,
        well_known: WellKnownAttributes,
        anonymous_types: SynthesizedTypeMap,
    ) -> Self {
        Compilation {
            id,
            assembly_name,
            core_library,
            global_namespace,
            symbols,
            well_known,
            anonymous_types,
        }
    }

    /// Returns the compilation id.
    #[must_use]
    pub fn id(&self) -> CompilationId {
        self.id
    }

    /// Returns the simple name of the assembly being compiled.
    #[must_use]
    pub fn assembly_name(&self) -> &str {
        &self.assembly_name
    }

    /// Returns the name of the core library (`System.Runtime`, `mscorlib`, ...).
    #[must_use]
    pub fn core_library(&self) -> &str {
        &self.core_library
    }

    /// Returns the global namespace.
    #[must_use]
    pub fn global_namespace(&self) -> SymbolId {
        self.global_namespace
    }

    /// Returns the runtime attributes available to this compilation.
    #[must_use]
    pub fn well_known_attributes(&self) -> WellKnownAttributes {
        self.well_known
    }

    /// Returns the anonymous types and delegates synthesized for this compilation.
    #[must_use]
    pub fn anonymous_types(&self) -> &SynthesizedTypeMap {
        &self.anonymous_types
    }

    /// Returns true if `id` is a handle of this compilation.
    #[must_use]
    pub fn contains(&self, id: SymbolId) -> bool {
        id.compilation == self.id && (id.index as usize) < self.symbols.len()
    }

    /// Returns the symbol for `id`, or `None` for handles of other compilations.
    #[must_use]
    pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
        if id.compilation != self.id {
            return None;
        }
        self.symbols.get(id.index as usize)
    }

    /// Returns the symbol for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SymbolNotFound`] for handles of other compilations.
    pub fn symbol(&self, id: SymbolId) -> Result<&Symbol> {
        self.get(id)
            .ok_or_else(|| Error::SymbolNotFound(format!("{} in {:?}", id, self.id)))
    }

    /// Returns the method data of `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SymbolNotFound`] if `id` is not a method of this compilation.
    pub fn method(&self, id: SymbolId) -> Result<&MethodData> {
        self.symbol(id)?
            .as_method()
            .ok_or_else(|| Error::SymbolNotFound(format!("{} is not a method", id)))
    }

    /// Iterates over all symbols in arena order.
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    /// Returns the nearest containing type.
    #[must_use]
    pub fn containing_type(&self, id: SymbolId) -> Option<SymbolId> {
        let mut current = self.get(id)?.container;
        while let Some(container) = current {
            let symbol = self.get(container)?;
            if symbol.kind() == SymbolKind::Type {
                return Some(container);
            }
            current = symbol.container;
        }
        None
    }

    /// Returns the dotted namespace of a top-level type, or of the outermost type
    /// enclosing a nested type.
    #[must_use]
    pub fn namespace_name(&self, id: SymbolId) -> String {
        let mut parts = Vec::new();
        let mut current = self.get(id).and_then(|symbol| symbol.container);
        while let Some(container) = current {
            let Some(symbol) = self.get(container) else {
                break;
            };
            if symbol.kind() == SymbolKind::Namespace && container != self.global_namespace {
                parts.push(symbol.name.as_str());
            }
            current = symbol.container;
        }
        parts.reverse();
        parts.join(".")
    }

    /// Returns the dotted name of the symbol including its containers, for messages.
    #[must_use]
    pub fn qualified_name(&self, id: SymbolId) -> String {
        let mut parts = Vec::new();
        let mut current = Some(id);
        while let Some(symbol_id) = current {
            let Some(symbol) = self.get(symbol_id) else {
                break;
            };
            if symbol_id != self.global_namespace {
                parts.push(symbol.name.as_str());
            }
            current = symbol.container;
        }
        parts.reverse();
        parts.join(".")
    }

    /// Maps the implementing part of a partial method to its declaring part.
    #[must_use]
    pub fn canonical_definition(&self, id: SymbolId) -> SymbolId {
        match self.get(id).and_then(Symbol::as_method).and_then(|m| m.partial) {
            Some(PartialMethodPart::Implementation { definition }) => definition,
            _ => id,
        }
    }

    /// Maps the declaring part of an implemented partial method to its implementing part,
    /// which owns the single `MethodDef` row of the pair.
    #[must_use]
    pub fn row_owner(&self, id: SymbolId) -> SymbolId {
        match self.get(id).and_then(Symbol::as_method).and_then(|m| m.partial) {
            Some(PartialMethodPart::Definition {
                implementation: Some(implementation),
            }) => implementation,
            _ => id,
        }
    }

    /// Returns the symbol whose change a member inherits: the associated property or event
    /// for accessors, the container otherwise.
    #[must_use]
    pub fn change_container(&self, id: SymbolId) -> Option<SymbolId> {
        let symbol = self.get(id)?;
        symbol
            .as_method()
            .and_then(|method| method.association)
            .or(symbol.container)
    }

    /// Returns the compiler-generated members of every container.
    #[must_use]
    pub fn synthesized_members(&self) -> HashMap<SymbolId, Vec<SymbolId>> {
        let mut members: HashMap<SymbolId, Vec<SymbolId>> = HashMap::new();
        for symbol in &self.symbols {
            if let (Some(_), Some(container)) = (symbol.synthesized, symbol.container) {
                members.entry(container).or_default().push(symbol.id);
            }
        }
        members
    }
}

/// Shared handle to a compilation.
pub type CompilationRc = Arc<Compilation>;
