//! Row structures of the tables a delta can carry.
//!
//! Every row records its logical row id (`rid`). In a delta, rows of one table are a mix
//! of replacements for existing rows and brand-new rows appended after the previous
//! generation's last row, so the id cannot be derived from the row's position.
//!
//! Heap columns hold offsets into the cumulative heaps (the delta heaps start where the
//! previous generation's heaps end). Coded index columns are stored as full
//! [`Token`]s; the physical coded-index encoding is left to the table serializer.

use crate::metadata::token::Token;

/// `Module` row. A delta always rewrites row 1.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleRow {
    /// Generation ordinal of the delta
    pub generation: u16,
    /// `#Strings` offset of the module name
    pub name: u32,
    /// `#GUID` index of the module version id
    pub mvid: u32,
    /// `#GUID` index of this generation's id
    pub enc_id: u32,
    /// `#GUID` index of the previous generation's id
    pub enc_base_id: u32,
}

/// `AssemblyRef` row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssemblyRefRow {
    /// Row id
    pub rid: u32,
    /// `#Strings` offset of the assembly name
    pub name: u32,
}

/// `ModuleRef` row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleRefRow {
    /// Row id
    pub rid: u32,
    /// `#Strings` offset of the module name
    pub name: u32,
}

/// `TypeRef` row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeRefRow {
    /// Row id
    pub rid: u32,
    /// `AssemblyRef`, `ModuleRef` or enclosing `TypeRef` token
    pub resolution_scope: Token,
    /// `#Strings` offset of the type name
    pub name: u32,
    /// `#Strings` offset of the namespace
    pub namespace: u32,
}

/// `TypeDef` row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeDefRow {
    /// Row id
    pub rid: u32,
    /// `TypeAttributes` bits
    pub flags: u32,
    /// `#Strings` offset of the type name
    pub name: u32,
    /// `#Strings` offset of the namespace
    pub namespace: u32,
    /// Base type token, null for interfaces and `System.Object`
    pub extends: Token,
}

/// `Field` row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldRow {
    /// Row id
    pub rid: u32,
    /// `FieldAttributes` bits
    pub flags: u16,
    /// `#Strings` offset of the field name
    pub name: u32,
    /// `#Blob` offset of the field signature
    pub signature: u32,
}

/// `MethodDef` row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodDefRow {
    /// Row id
    pub rid: u32,
    /// Offset of the method body in the delta IL stream, 0 without body
    pub rva: u32,
    /// `MethodImplAttributes` bits
    pub impl_flags: u16,
    /// `MethodAttributes` bits
    pub flags: u16,
    /// `#Strings` offset of the method name
    pub name: u32,
    /// `#Blob` offset of the method signature
    pub signature: u32,
}

/// `Param` row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParamRow {
    /// Row id
    pub rid: u32,
    /// `ParamAttributes` bits
    pub flags: u16,
    /// Parameter sequence, 0 for the return value
    pub sequence: u16,
    /// `#Strings` offset of the parameter name
    pub name: u32,
}

/// `MemberRef` row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberRefRow {
    /// Row id
    pub rid: u32,
    /// Parent token (`TypeRef`, `TypeDef`, `TypeSpec`, `ModuleRef` or `MethodDef`)
    pub class: Token,
    /// `#Strings` offset of the member name
    pub name: u32,
    /// `#Blob` offset of the member signature
    pub signature: u32,
}

/// `CustomAttribute` row.
///
/// A row whose constructor is the null token is a tombstone: it removes the attribute that
/// previously occupied the row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CustomAttributeRow {
    /// Row id
    pub rid: u32,
    /// Token of the attributed entity
    pub parent: Token,
    /// Constructor token (`MethodDef` or `MemberRef`), null for a tombstone
    pub constructor: Token,
    /// `#Blob` offset of the attribute value, 0 for a tombstone
    pub value: u32,
}

impl CustomAttributeRow {
    /// Returns true if this row deletes the attribute it replaces.
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.constructor.is_null()
    }
}

/// `StandAloneSig` row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StandAloneSigRow {
    /// Row id
    pub rid: u32,
    /// `#Blob` offset of the signature
    pub signature: u32,
}

/// `EventMap` row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventMapRow {
    /// Row id
    pub rid: u32,
    /// `TypeDef` row owning the events
    pub parent: u32,
}

/// `Event` row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventRow {
    /// Row id
    pub rid: u32,
    /// `EventAttributes` bits
    pub flags: u16,
    /// `#Strings` offset of the event name
    pub name: u32,
    /// Delegate type token
    pub event_type: Token,
}

/// `PropertyMap` row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyMapRow {
    /// Row id
    pub rid: u32,
    /// `TypeDef` row owning the properties
    pub parent: u32,
}

/// `Property` row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyRow {
    /// Row id
    pub rid: u32,
    /// `PropertyAttributes` bits
    pub flags: u16,
    /// `#Strings` offset of the property name
    pub name: u32,
    /// `#Blob` offset of the property signature
    pub signature: u32,
}

/// `MethodSemantics` row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodSemanticsRow {
    /// Row id
    pub rid: u32,
    /// `MethodSemanticsAttributes` bits
    pub semantics: u16,
    /// `MethodDef` row of the accessor
    pub method: u32,
    /// Property or event token
    pub association: Token,
}

/// `MethodImpl` row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodImplRow {
    /// Row id
    pub rid: u32,
    /// `TypeDef` row of the implementing type
    pub class: u32,
    /// Implementing method token
    pub body: Token,
    /// Implemented method token
    pub declaration: Token,
}

/// `TypeSpec` row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeSpecRow {
    /// Row id
    pub rid: u32,
    /// `#Blob` offset of the type signature
    pub signature: u32,
}

/// `NestedClass` row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NestedClassRow {
    /// Row id
    pub rid: u32,
    /// `TypeDef` row of the nested type
    pub nested: u32,
    /// `TypeDef` row of the enclosing type
    pub enclosing: u32,
}

/// `GenericParam` row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenericParamRow {
    /// Row id
    pub rid: u32,
    /// Zero-based ordinal within the owner
    pub number: u16,
    /// `GenericParamAttributes` bits
    pub flags: u16,
    /// Owning `TypeDef` or `MethodDef`
    pub owner: Token,
    /// `#Strings` offset of the parameter name
    pub name: u32,
}

/// `MethodSpec` row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodSpecRow {
    /// Row id
    pub rid: u32,
    /// Generic method token (`MethodDef` or `MemberRef`)
    pub method: Token,
    /// `#Blob` offset of the instantiation signature
    pub instantiation: u32,
}

/// `GenericParamConstraint` row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenericParamConstraintRow {
    /// Row id
    pub rid: u32,
    /// `GenericParam` row being constrained
    pub owner: u32,
    /// Constraint type token
    pub constraint: Token,
}
