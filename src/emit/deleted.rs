//! Definitions standing in for members removed by an edit.
//!
//! A method that no longer exists in the current compilation may still be running, or be
//! called through a delegate created before the edit. Its row is re-emitted with a body
//! that throws, so such calls fail loudly instead of running stale code.
//!
//! The shim is built from the *previous* compilation's symbol. Its signature still
//! mentions types of the previous compilation, which are re-resolved through
//! [`DeletedTypeDefinition`] shims; [`DeletedDefinitions`] caches those so every
//! reference to the same old type shares one instance.

use std::collections::HashMap;
use std::rc::Rc;

use crate::{
    emit::{body::MethodBody, definitionmap::DefinitionMap, options::EmitOptions},
    metadata::{tables::TableId, token::Token},
    symbols::{
        types::{
            ExternalMember, ExternalType, MemberReference, MemberSignature,
            MethodSignature, TypeRef,
        },
        MethodAttributes, MethodImplAttributes, Parameter, SymbolId,
    },
    Error, Result,
};

/// Row of the definition a shim stands in for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeletedOrigin {
    /// The row belongs to the original module
    Metadata {
        /// Token in the original metadata
        token: Token,
    },
    /// The row was added by an earlier delta
    PreviousDelta {
        /// Row id
        row: u32,
        /// Generation of the baseline that last recorded the row
        generation: u32,
    },
}

impl DeletedOrigin {
    /// Returns the origin of `row` of `table`, given the row count of the original module.
    #[must_use]
    pub fn for_row(table: TableId, row: u32, original_rows: u32, generation: u32) -> Self {
        if row <= original_rows {
            DeletedOrigin::Metadata {
                token: Token::from_parts(table, row),
            }
        } else {
            DeletedOrigin::PreviousDelta { row, generation }
        }
    }

    /// Returns the row id.
    #[must_use]
    pub fn row(&self) -> u32 {
        match self {
            DeletedOrigin::Metadata { token } => token.row(),
            DeletedOrigin::PreviousDelta { row, .. } => *row,
        }
    }

    /// Returns the token of the row in `table`.
    #[must_use]
    pub fn token(&self, table: TableId) -> Token {
        match self {
            DeletedOrigin::Metadata { token } => *token,
            DeletedOrigin::PreviousDelta { row, .. } => Token::from_parts(table, *row),
        }
    }
}

/// Writer-side key of a `MethodDef` row: a current method or a shim for a removed one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DefinitionKey {
    /// Method of the current compilation
    Current(SymbolId),
    /// Method of the previous compilation that was deleted
    Deleted(SymbolId),
}

impl DefinitionKey {
    /// Returns the wrapped symbol handle.
    #[must_use]
    pub fn symbol(&self) -> SymbolId {
        match self {
            DefinitionKey::Current(symbol) | DefinitionKey::Deleted(symbol) => *symbol,
        }
    }
}

/// A type of the previous compilation referenced by a deleted member.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeletedTypeDefinition {
    /// Type in the previous compilation
    pub old: SymbolId,
    /// Row of the type
    pub origin: DeletedOrigin,
}

impl DeletedTypeDefinition {
    /// Returns the `TypeDef` token of the type.
    #[must_use]
    pub fn token(&self) -> Token {
        self.origin.token(TableId::TypeDef)
    }
}

/// A method of the previous compilation re-emitted with a throwing body.
///
/// Only the `MethodDef` row and the body are re-emitted; the method's attribute rows keep
/// what the previous generation wrote.
#[derive(Clone, Debug)]
pub struct DeletedMethodDefinition {
    /// Method in the previous compilation
    pub old: SymbolId,
    /// Row of the method
    pub origin: DeletedOrigin,
    /// Method name
    pub name: String,
    /// Method flags
    pub flags: MethodAttributes,
    /// Implementation flags
    pub impl_flags: MethodImplAttributes,
    /// Signature in the previous compilation's vocabulary
    pub signature: MethodSignature,
    /// Parameters
    pub parameters: Vec<Parameter>,
    /// Shims of the old types the signature mentions
    pub referenced_types: Vec<Rc<DeletedTypeDefinition>>,
}

impl DeletedMethodDefinition {
    /// Returns the `MethodDef` token of the method.
    #[must_use]
    pub fn token(&self) -> Token {
        self.origin.token(TableId::MethodDef)
    }

    /// Returns the body that replaces the deleted implementation: `ldstr message;
    /// newobj <exception>::.ctor(string); throw`.
    #[must_use]
    pub fn body(&self, options: &EmitOptions, core_library: &str) -> MethodBody {
        let (namespace, name) = options.exception_type();
        let constructor = MemberReference::External(ExternalMember {
            parent: TypeRef::External(ExternalType::class(core_library, namespace, name)),
            name: ".ctor".to_string(),
            signature: MemberSignature::Method(MethodSignature::instance(
                TypeRef::void(),
                vec![TypeRef::string()],
            )),
        });
        MethodBody::throwing(options.deleted_method_message(), constructor)
    }
}

/// Shim cache of one emission.
#[derive(Debug, Default)]
pub struct DeletedDefinitions {
    types: HashMap<SymbolId, Rc<DeletedTypeDefinition>>,
    methods: HashMap<SymbolId, Rc<DeletedMethodDefinition>>,
}

impl DeletedDefinitions {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        DeletedDefinitions::default()
    }

    /// Returns the shim of the previous-compilation type `old`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RowNotFound`] if the type has no row in the previous generation.
    pub fn type_definition(
        &mut self,
        old: SymbolId,
        map: &DefinitionMap<'_>,
    ) -> Result<Rc<DeletedTypeDefinition>> {
        if let Some(existing) = self.types.get(&old) {
            return Ok(existing.clone());
        }

        let row = map
            .previous_type_row(old)
            .ok_or_else(|| Error::RowNotFound(format!("TypeDef of deleted member type {}", old)))?;
        let shim = Rc::new(DeletedTypeDefinition {
            old,
            origin: map.deleted_origin(TableId::TypeDef, row),
        });
        self.types.insert(old, shim.clone());
        Ok(shim)
    }

    /// Returns the shim of the previous-compilation method `old`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SymbolNotFound`] if `old` is not a method of the previous
    /// compilation and [`Error::RowNotFound`] if it has no row.
    pub fn method(
        &mut self,
        old: SymbolId,
        map: &DefinitionMap<'_>,
    ) -> Result<Rc<DeletedMethodDefinition>> {
        if let Some(existing) = self.methods.get(&old) {
            return Ok(existing.clone());
        }

        let previous = map.previous_compilation().clone();
        let symbol = previous.symbol(old)?;
        let data = previous.method(old)?;
        let row = map
            .previous_method_row(old)
            .ok_or_else(|| Error::RowNotFound(format!("MethodDef of deleted method {}", old)))?;

        let mut definitions = Vec::new();
        data.signature.return_type.definitions(&mut definitions);
        for parameter in &data.signature.parameters {
            parameter.definitions(&mut definitions);
        }
        definitions.dedup();

        let mut referenced_types = Vec::with_capacity(definitions.len());
        for definition in definitions {
            let shim = self.type_definition(definition, map)?;
            if !referenced_types.iter().any(|t| Rc::ptr_eq(t, &shim)) {
                referenced_types.push(shim);
            }
        }

        let shim = Rc::new(DeletedMethodDefinition {
            old,
            origin: map.deleted_origin(TableId::MethodDef, row),
            name: symbol.name.clone(),
            flags: data.flags,
            impl_flags: data.impl_flags,
            signature: data.signature.clone(),
            parameters: data.parameters.clone(),
            referenced_types,
        });
        self.methods.insert(old, shim.clone());
        Ok(shim)
    }

    /// Returns a shim created earlier in this emission.
    #[must_use]
    pub fn get_method(&self, old: SymbolId) -> Option<&Rc<DeletedMethodDefinition>> {
        self.methods.get(&old)
    }

    /// Returns the number of cached type shims.
    #[must_use]
    pub fn type_count(&self) -> usize {
        self.types.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_for_row() {
        let original = DeletedOrigin::for_row(TableId::MethodDef, 3, 5, 1);
        assert_eq!(
            original,
            DeletedOrigin::Metadata {
                token: Token::from_parts(TableId::MethodDef, 3)
            }
        );

        let added = DeletedOrigin::for_row(TableId::MethodDef, 7, 5, 2);
        assert_eq!(added, DeletedOrigin::PreviousDelta { row: 7, generation: 2 });
        assert_eq!(added.row(), 7);
        assert_eq!(added.token(TableId::MethodDef), Token::from_parts(TableId::MethodDef, 7));
    }

    #[test]
    fn test_definition_key_symbol() {
        let compilation = crate::symbols::CompilationBuilder::new("A").build();
        let id = compilation.global_namespace();
        assert_eq!(DefinitionKey::Current(id).symbol(), id);
        assert_ne!(DefinitionKey::Current(id), DefinitionKey::Deleted(id));
    }
}
