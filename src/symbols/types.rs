//! Structured type references, signatures and member references.
//!
//! These values describe *uses* of types and members as they appear in signatures,
//! IL operands and custom attributes. Definitions inside the compilation are referenced by
//! [`SymbolId`]; everything defined elsewhere is described by name.

use std::fmt;

use crate::symbols::SymbolId;

/// Built-in element types that have their own signature encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveType {
    /// `void`
    Void,
    /// `bool`
    Boolean,
    /// `char`
    Char,
    /// `sbyte`
    I1,
    /// `byte`
    U1,
    /// `short`
    I2,
    /// `ushort`
    U2,
    /// `int`
    I4,
    /// `uint`
    U4,
    /// `long`
    I8,
    /// `ulong`
    U8,
    /// `float`
    R4,
    /// `double`
    R8,
    /// `string`
    String,
    /// `nint`
    IntPtr,
    /// `nuint`
    UIntPtr,
    /// `object`
    Object,
    /// `TypedReference`
    TypedReference,
}

impl PrimitiveType {
    const ALL: [PrimitiveType; 18] = [
        PrimitiveType::Void,
        PrimitiveType::Boolean,
        PrimitiveType::Char,
        PrimitiveType::I1,
        PrimitiveType::U1,
        PrimitiveType::I2,
        PrimitiveType::U2,
        PrimitiveType::I4,
        PrimitiveType::U4,
        PrimitiveType::I8,
        PrimitiveType::U8,
        PrimitiveType::R4,
        PrimitiveType::R8,
        PrimitiveType::String,
        PrimitiveType::IntPtr,
        PrimitiveType::UIntPtr,
        PrimitiveType::Object,
        PrimitiveType::TypedReference,
    ];

    /// Returns the `ELEMENT_TYPE_*` byte of the primitive (II.23.1.16).
    #[must_use]
    pub fn element_type(&self) -> u8 {
        match self {
            PrimitiveType::Void => 0x01,
            PrimitiveType::Boolean => 0x02,
            PrimitiveType::Char => 0x03,
            PrimitiveType::I1 => 0x04,
            PrimitiveType::U1 => 0x05,
            PrimitiveType::I2 => 0x06,
            PrimitiveType::U2 => 0x07,
            PrimitiveType::I4 => 0x08,
            PrimitiveType::U4 => 0x09,
            PrimitiveType::I8 => 0x0A,
            PrimitiveType::U8 => 0x0B,
            PrimitiveType::R4 => 0x0C,
            PrimitiveType::R8 => 0x0D,
            PrimitiveType::String => 0x0E,
            PrimitiveType::TypedReference => 0x16,
            PrimitiveType::IntPtr => 0x18,
            PrimitiveType::UIntPtr => 0x19,
            PrimitiveType::Object => 0x1C,
        }
    }

    /// Maps an `ELEMENT_TYPE_*` byte back to the primitive it encodes.
    #[must_use]
    pub fn from_element_type(value: u8) -> Option<PrimitiveType> {
        Self::ALL
            .iter()
            .copied()
            .find(|primitive| primitive.element_type() == value)
    }

    /// Returns the name of the `System` type the primitive stands for.
    #[must_use]
    pub fn system_name(&self) -> &'static str {
        match self {
            PrimitiveType::Void => "Void",
            PrimitiveType::Boolean => "Boolean",
            PrimitiveType::Char => "Char",
            PrimitiveType::I1 => "SByte",
            PrimitiveType::U1 => "Byte",
            PrimitiveType::I2 => "Int16",
            PrimitiveType::U2 => "UInt16",
            PrimitiveType::I4 => "Int32",
            PrimitiveType::U4 => "UInt32",
            PrimitiveType::I8 => "Int64",
            PrimitiveType::U8 => "UInt64",
            PrimitiveType::R4 => "Single",
            PrimitiveType::R8 => "Double",
            PrimitiveType::String => "String",
            PrimitiveType::IntPtr => "IntPtr",
            PrimitiveType::UIntPtr => "UIntPtr",
            PrimitiveType::Object => "Object",
            PrimitiveType::TypedReference => "TypedReference",
        }
    }

    /// Returns the `System` type the primitive stands for, defined in `core_library`.
    /// Used where a `TypeDefOrRef` token is required, such as a base type.
    #[must_use]
    pub fn system_type(&self, core_library: &str) -> ExternalType {
        ExternalType {
            scope: ResolutionScope::Assembly(core_library.to_string()),
            namespace: "System".to_string(),
            name: self.system_name().to_string(),
            is_value_type: self.is_value_type(),
        }
    }

    /// Returns true for primitives that are value types.
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        !matches!(
            self,
            PrimitiveType::String | PrimitiveType::Object | PrimitiveType::Void
        )
    }
}

/// Where an external type is defined.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResolutionScope {
    /// Another assembly, by simple name
    Assembly(String),
    /// Another module of the same assembly
    Module(String),
}

/// A type defined outside the compilation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExternalType {
    /// Defining assembly or module
    pub scope: ResolutionScope,
    /// Namespace, empty for the global namespace
    pub namespace: String,
    /// Type name including the generic arity suffix
    pub name: String,
    /// True for structs and enums
    pub is_value_type: bool,
}

impl ExternalType {
    /// Creates a reference type defined in `assembly`.
    #[must_use]
    pub fn class(assembly: &str, namespace: &str, name: &str) -> Self {
        ExternalType {
            scope: ResolutionScope::Assembly(assembly.to_string()),
            namespace: namespace.to_string(),
            name: name.to_string(),
            is_value_type: false,
        }
    }

    /// Creates a value type defined in `assembly`.
    #[must_use]
    pub fn value_type(assembly: &str, namespace: &str, name: &str) -> Self {
        ExternalType {
            is_value_type: true,
            ..ExternalType::class(assembly, namespace, name)
        }
    }
}

/// A use of a type in a signature, an operand or an attribute.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeRef {
    /// Built-in element type
    Primitive(PrimitiveType),
    /// Type defined in the compilation
    Definition(SymbolId),
    /// Type defined elsewhere
    External(ExternalType),
    /// Single-dimensional zero-based array
    SzArray(Box<TypeRef>),
    /// Unmanaged pointer
    Pointer(Box<TypeRef>),
    /// Managed reference
    ByRef(Box<TypeRef>),
    /// Constructed generic type
    GenericInstance {
        /// The generic type definition
        generic: Box<TypeRef>,
        /// Type arguments
        arguments: Vec<TypeRef>,
    },
    /// Type parameter of the enclosing type, by ordinal
    TypeParameter(u32),
    /// Type parameter of the enclosing method, by ordinal
    MethodTypeParameter(u32),
}

impl TypeRef {
    /// `void`
    #[must_use]
    pub fn void() -> TypeRef {
        TypeRef::Primitive(PrimitiveType::Void)
    }

    /// `int`
    #[must_use]
    pub fn int32() -> TypeRef {
        TypeRef::Primitive(PrimitiveType::I4)
    }

    /// `string`
    #[must_use]
    pub fn string() -> TypeRef {
        TypeRef::Primitive(PrimitiveType::String)
    }

    /// `object`
    #[must_use]
    pub fn object() -> TypeRef {
        TypeRef::Primitive(PrimitiveType::Object)
    }

    /// Returns the element type of arrays, pointers and references.
    #[must_use]
    pub fn element(&self) -> Option<&TypeRef> {
        match self {
            TypeRef::SzArray(inner) | TypeRef::Pointer(inner) | TypeRef::ByRef(inner) => {
                Some(inner)
            }
            _ => None,
        }
    }

    /// Collects every definition referenced anywhere inside this type.
    pub fn definitions(&self, out: &mut Vec<SymbolId>) {
        match self {
            TypeRef::Definition(id) => out.push(*id),
            TypeRef::SzArray(inner) | TypeRef::Pointer(inner) | TypeRef::ByRef(inner) => {
                inner.definitions(out);
            }
            TypeRef::GenericInstance { generic, arguments } => {
                generic.definitions(out);
                for argument in arguments {
                    argument.definitions(out);
                }
            }
            TypeRef::Primitive(_)
            | TypeRef::External(_)
            | TypeRef::TypeParameter(_)
            | TypeRef::MethodTypeParameter(_) => {}
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Primitive(primitive) => write!(f, "{:?}", primitive),
            TypeRef::Definition(id) => write!(f, "{}", id),
            TypeRef::External(external) if external.namespace.is_empty() => {
                write!(f, "{}", external.name)
            }
            TypeRef::External(external) => write!(f, "{}.{}", external.namespace, external.name),
            TypeRef::SzArray(inner) => write!(f, "{}[]", inner),
            TypeRef::Pointer(inner) => write!(f, "{}*", inner),
            TypeRef::ByRef(inner) => write!(f, "{}&", inner),
            TypeRef::GenericInstance { generic, arguments } => {
                write!(f, "{}<", generic)?;
                for (index, argument) in arguments.iter().enumerate() {
                    if index > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", argument)?;
                }
                write!(f, ">")
            }
            TypeRef::TypeParameter(ordinal) => write!(f, "!{}", ordinal),
            TypeRef::MethodTypeParameter(ordinal) => write!(f, "!!{}", ordinal),
        }
    }
}

/// A method signature (II.23.2.1).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    /// True for instance methods
    pub has_this: bool,
    /// Number of method type parameters
    pub generic_arity: u32,
    /// Return type
    pub return_type: TypeRef,
    /// Parameter types in declaration order
    pub parameters: Vec<TypeRef>,
}

impl MethodSignature {
    /// Creates an instance method signature.
    #[must_use]
    pub fn instance(return_type: TypeRef, parameters: Vec<TypeRef>) -> Self {
        MethodSignature {
            has_this: true,
            generic_arity: 0,
            return_type,
            parameters,
        }
    }

    /// Creates a static method signature.
    #[must_use]
    pub fn static_method(return_type: TypeRef, parameters: Vec<TypeRef>) -> Self {
        MethodSignature {
            has_this: false,
            ..MethodSignature::instance(return_type, parameters)
        }
    }
}

/// Signature of an external member.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MemberSignature {
    /// Method signature
    Method(MethodSignature),
    /// Field type
    Field(TypeRef),
}

/// A member defined outside the compilation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ExternalMember {
    /// Declaring type
    pub parent: TypeRef,
    /// Member name
    pub name: String,
    /// Member signature
    pub signature: MemberSignature,
}

/// The target of an IL token operand or of an attribute constructor.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MemberReference {
    /// Method defined in the compilation
    Method(SymbolId),
    /// Field defined in the compilation
    Field(SymbolId),
    /// A type (`ldtoken`, `box`, `newarr`, ...)
    Type(TypeRef),
    /// Member defined elsewhere
    External(ExternalMember),
    /// Member of the compilation accessed through a generic instantiation of its type
    MemberOfGeneric {
        /// The instantiated declaring type
        parent: TypeRef,
        /// The member definition
        member: SymbolId,
    },
    /// Generic method instantiation
    MethodInstance {
        /// The generic method
        method: Box<MemberReference>,
        /// Method type arguments
        arguments: Vec<TypeRef>,
    },
    /// `ldstr` literal
    String(String),
}

/// A custom attribute application.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CustomAttribute {
    /// Attribute constructor
    pub constructor: MemberReference,
    /// Encoded attribute value blob (II.23.3), starting with the `0x0001` prolog
    pub value: Vec<u8>,
}

impl CustomAttribute {
    /// Creates an attribute application with the given constructor and value blob.
    #[must_use]
    pub fn new(constructor: MemberReference, value: Vec<u8>) -> Self {
        CustomAttribute { constructor, value }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_element_types_roundtrip() {
        for primitive in PrimitiveType::ALL {
            assert_eq!(
                PrimitiveType::from_element_type(primitive.element_type()),
                Some(primitive)
            );
        }
        assert_eq!(PrimitiveType::from_element_type(0x12), None);
    }

    #[test]
    fn test_type_display() {
        let list = TypeRef::GenericInstance {
            generic: Box::new(TypeRef::External(ExternalType::class(
                "System.Runtime",
                "System.Collections.Generic",
                "List`1",
            ))),
            arguments: vec![TypeRef::int32()],
        };
        assert_eq!(
            TypeRef::SzArray(Box::new(list)).to_string(),
            "System.Collections.Generic.List`1<I4>[]"
        );
        assert_eq!(TypeRef::MethodTypeParameter(1).to_string(), "!!1");
    }
}
