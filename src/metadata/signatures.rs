//! Signature blob encoding and local signature decoding.
//!
//! Encoders turn the structured [`TypeRef`] / [`MethodSignature`] model into ECMA-335
//! signature blobs. Tokens for the types a blob mentions are obtained through a
//! [`TypeTokenResolver`], which lets the delta writer allocate `TypeRef` and `TypeSpec`
//! rows on demand while the blob is being built.
//!
//! The decoder is the inverse for local variable signatures only: it is used to recover
//! the slot layout of methods emitted by a previous generation. It keeps the raw bytes of
//! every local so a slot can be re-emitted verbatim even when its type cannot be mapped
//! into the current compilation.
//!
//! # Reference
//! * [ECMA-335 II.23.2](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf) - Blobs and signatures

use crate::{
    metadata::{tables::TableId, token::Token},
    symbols::{
        types::{MethodSignature, PrimitiveType, TypeRef},
        LocalConstraints,
    },
    utils::{write_compressed_token, write_compressed_uint, Parser},
    Error, Result,
};

#[allow(non_snake_case)]
/// Element type bytes used in signatures (II.23.1.16)
pub mod ELEMENT_TYPE {
    /// Unmanaged pointer
    pub const PTR: u8 = 0x0F;
    /// Managed reference
    pub const BYREF: u8 = 0x10;
    /// Value type followed by a `TypeDefOrRef` token
    pub const VALUETYPE: u8 = 0x11;
    /// Reference type followed by a `TypeDefOrRef` token
    pub const CLASS: u8 = 0x12;
    /// Generic parameter of a type
    pub const VAR: u8 = 0x13;
    /// Multi-dimensional array
    pub const ARRAY: u8 = 0x14;
    /// Generic instantiation
    pub const GENERICINST: u8 = 0x15;
    /// Function pointer
    pub const FNPTR: u8 = 0x1B;
    /// Single-dimensional zero-based array
    pub const SZARRAY: u8 = 0x1D;
    /// Generic parameter of a method
    pub const MVAR: u8 = 0x1E;
    /// Required custom modifier
    pub const CMOD_REQD: u8 = 0x1F;
    /// Optional custom modifier
    pub const CMOD_OPT: u8 = 0x20;
    /// Pinned local
    pub const PINNED: u8 = 0x45;
}

#[allow(non_snake_case)]
/// Leading bytes of the signature kinds (II.23.2)
pub mod SIGNATURE_HEADER {
    /// Field signature
    pub const FIELD: u8 = 0x06;
    /// Local variable signature
    pub const LOCAL_SIG: u8 = 0x07;
    /// Property signature
    pub const PROPERTY: u8 = 0x08;
    /// Generic method instantiation
    pub const METHOD_SPEC: u8 = 0x0A;
}

#[allow(non_snake_case)]
/// Calling convention flags of method and property signatures (II.23.2.1)
pub mod CALLING_CONVENTION {
    /// Default managed calling convention
    pub const DEFAULT: u8 = 0x00;
    /// Generic method
    pub const GENERIC: u8 = 0x10;
    /// Instance member
    pub const HASTHIS: u8 = 0x20;
}

/// Supplies the tokens and value-type information needed to encode type references.
pub trait TypeTokenResolver {
    /// Returns the `TypeDef`, `TypeRef` or `TypeSpec` token for `reference`.
    ///
    /// # Errors
    ///
    /// Fails if the type cannot be referenced from the metadata being written.
    fn resolve_type(&mut self, reference: &TypeRef) -> Result<Token>;

    /// Returns true if `reference` denotes a value type.
    fn is_value_type(&self, reference: &TypeRef) -> bool;
}

/// Maps tokens found in previous-generation signatures back to type references.
pub trait TypeTokenDecoder {
    /// Returns the type a `TypeDef`, `TypeRef` or `TypeSpec` token stands for.
    ///
    /// # Errors
    ///
    /// Fails if the token does not resolve.
    fn decode_type_token(&self, token: Token) -> Result<TypeRef>;
}

/// Appends the encoding of `reference` to `buffer`.
///
/// # Errors
///
/// Returns [`Error::Signature`] for generic instantiations over something other than a
/// named type, or whatever the resolver reports.
pub fn encode_type(
    reference: &TypeRef,
    resolver: &mut dyn TypeTokenResolver,
    buffer: &mut Vec<u8>,
) -> Result<()> {
    match reference {
        TypeRef::Primitive(primitive) => buffer.push(primitive.element_type()),
        TypeRef::Definition(_) | TypeRef::External(_) => {
            buffer.push(if resolver.is_value_type(reference) {
                ELEMENT_TYPE::VALUETYPE
            } else {
                ELEMENT_TYPE::CLASS
            });
            let token = resolver.resolve_type(reference)?;
            write_compressed_token(token, buffer)?;
        }
        TypeRef::SzArray(inner) => {
            buffer.push(ELEMENT_TYPE::SZARRAY);
            encode_type(inner, resolver, buffer)?;
        }
        TypeRef::Pointer(inner) => {
            buffer.push(ELEMENT_TYPE::PTR);
            encode_type(inner, resolver, buffer)?;
        }
        TypeRef::ByRef(inner) => {
            buffer.push(ELEMENT_TYPE::BYREF);
            encode_type(inner, resolver, buffer)?;
        }
        TypeRef::GenericInstance { generic, arguments } => {
            if !matches!(**generic, TypeRef::Definition(_) | TypeRef::External(_)) {
                return Err(Error::Signature(format!(
                    "Cannot instantiate {} - not a named type",
                    generic
                )));
            }
            buffer.push(ELEMENT_TYPE::GENERICINST);
            encode_type(generic, resolver, buffer)?;
            write_compressed_uint(count(arguments.len())?, buffer);
            for argument in arguments {
                encode_type(argument, resolver, buffer)?;
            }
        }
        TypeRef::TypeParameter(ordinal) => {
            buffer.push(ELEMENT_TYPE::VAR);
            write_compressed_uint(*ordinal, buffer);
        }
        TypeRef::MethodTypeParameter(ordinal) => {
            buffer.push(ELEMENT_TYPE::MVAR);
            write_compressed_uint(*ordinal, buffer);
        }
    }
    Ok(())
}

fn count(length: usize) -> Result<u32> {
    u32::try_from(length)
        .ok()
        .filter(|value| *value <= 0x1FFF_FFFF)
        .ok_or_else(|| Error::Signature(format!("Too many elements in signature: {}", length)))
}

/// Encodes a `MethodDefSig` / `MethodRefSig` (II.23.2.1).
///
/// # Errors
///
/// Propagates type encoding failures.
pub fn encode_method_signature(
    signature: &MethodSignature,
    resolver: &mut dyn TypeTokenResolver,
) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();

    let mut calling_convention = CALLING_CONVENTION::DEFAULT;
    if signature.has_this {
        calling_convention |= CALLING_CONVENTION::HASTHIS;
    }
    if signature.generic_arity > 0 {
        calling_convention |= CALLING_CONVENTION::GENERIC;
    }
    buffer.push(calling_convention);

    if signature.generic_arity > 0 {
        write_compressed_uint(signature.generic_arity, &mut buffer);
    }

    write_compressed_uint(count(signature.parameters.len())?, &mut buffer);
    encode_type(&signature.return_type, resolver, &mut buffer)?;
    for parameter in &signature.parameters {
        encode_type(parameter, resolver, &mut buffer)?;
    }

    Ok(buffer)
}

/// Encodes a `FieldSig` (II.23.2.4).
///
/// # Errors
///
/// Propagates type encoding failures.
pub fn encode_field_signature(
    field_type: &TypeRef,
    resolver: &mut dyn TypeTokenResolver,
) -> Result<Vec<u8>> {
    let mut buffer = vec![SIGNATURE_HEADER::FIELD];
    encode_type(field_type, resolver, &mut buffer)?;
    Ok(buffer)
}

/// Encodes a `PropertySig` (II.23.2.5).
///
/// # Errors
///
/// Propagates type encoding failures.
pub fn encode_property_signature(
    signature: &MethodSignature,
    resolver: &mut dyn TypeTokenResolver,
) -> Result<Vec<u8>> {
    let mut header = SIGNATURE_HEADER::PROPERTY;
    if signature.has_this {
        header |= CALLING_CONVENTION::HASTHIS;
    }

    let mut buffer = vec![header];
    write_compressed_uint(count(signature.parameters.len())?, &mut buffer);
    encode_type(&signature.return_type, resolver, &mut buffer)?;
    for parameter in &signature.parameters {
        encode_type(parameter, resolver, &mut buffer)?;
    }
    Ok(buffer)
}

/// Encodes a `MethodSpec` instantiation blob (II.23.2.15).
///
/// # Errors
///
/// Propagates type encoding failures.
pub fn encode_method_instantiation(
    arguments: &[TypeRef],
    resolver: &mut dyn TypeTokenResolver,
) -> Result<Vec<u8>> {
    let mut buffer = vec![SIGNATURE_HEADER::METHOD_SPEC];
    write_compressed_uint(count(arguments.len())?, &mut buffer);
    for argument in arguments {
        encode_type(argument, resolver, &mut buffer)?;
    }
    Ok(buffer)
}

/// Encodes a `TypeSpec` blob (II.23.2.14).
///
/// # Errors
///
/// Propagates type encoding failures.
pub fn encode_type_spec(
    reference: &TypeRef,
    resolver: &mut dyn TypeTokenResolver,
) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    encode_type(reference, resolver, &mut buffer)?;
    Ok(buffer)
}

/// Encodes a single local variable entry: constraints followed by the type.
///
/// # Errors
///
/// Propagates type encoding failures.
pub fn encode_local(
    local_type: &TypeRef,
    constraints: LocalConstraints,
    resolver: &mut dyn TypeTokenResolver,
) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    if constraints.contains(LocalConstraints::PINNED) {
        buffer.push(ELEMENT_TYPE::PINNED);
    }
    if constraints.contains(LocalConstraints::BYREF) {
        buffer.push(ELEMENT_TYPE::BYREF);
    }
    encode_type(local_type, resolver, &mut buffer)?;
    Ok(buffer)
}

/// Assembles a `LocalVarSig` (II.23.2.6) from pre-encoded local entries.
///
/// # Errors
///
/// Returns [`Error::Signature`] if there are too many locals.
pub fn assemble_local_signature(locals: &[Vec<u8>]) -> Result<Vec<u8>> {
    let mut buffer = vec![SIGNATURE_HEADER::LOCAL_SIG];
    write_compressed_uint(count(locals.len())?, &mut buffer);
    for local in locals {
        buffer.extend_from_slice(local);
    }
    Ok(buffer)
}

/// A local variable recovered from a previous generation's local signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedLocal {
    /// Raw bytes of the entry, constraints included
    pub signature: Vec<u8>,
    /// Pinned / by-ref constraints
    pub constraints: LocalConstraints,
    /// Decoded type, `None` for shapes the type model cannot express
    pub local_type: Option<TypeRef>,
}

/// Decodes a `LocalVarSig` blob.
///
/// # Errors
///
/// Returns [`Error::Malformed`] / [`Error::OutOfBounds`] for corrupt blobs and whatever
/// the decoder reports for unresolvable tokens.
pub fn decode_local_signature(
    blob: &[u8],
    decoder: &dyn TypeTokenDecoder,
) -> Result<Vec<DecodedLocal>> {
    let mut parser = Parser::new(blob);
    let header = parser.read_u8()?;
    if header != SIGNATURE_HEADER::LOCAL_SIG {
        return Err(malformed_error!(
            "Invalid local signature header - 0x{:02x}",
            header
        ));
    }

    let local_count = parser.read_compressed_uint()?;
    if local_count as usize > blob.len() {
        return Err(malformed_error!(
            "Local signature declares {} locals in {} bytes",
            local_count,
            blob.len()
        ));
    }

    let mut locals = Vec::with_capacity(local_count as usize);
    for _ in 0..local_count {
        let start = parser.pos();
        let mut constraints = LocalConstraints::empty();
        loop {
            match parser.peek_byte()? {
                ELEMENT_TYPE::CMOD_REQD | ELEMENT_TYPE::CMOD_OPT => {
                    parser.read_u8()?;
                    parser.read_compressed_token()?;
                }
                ELEMENT_TYPE::PINNED => {
                    parser.read_u8()?;
                    constraints |= LocalConstraints::PINNED;
                }
                ELEMENT_TYPE::BYREF => {
                    parser.read_u8()?;
                    constraints |= LocalConstraints::BYREF;
                }
                _ => break,
            }
        }

        let local_type = decode_type(&mut parser, decoder, 0)?;
        locals.push(DecodedLocal {
            signature: parser.slice_from(start)?.to_vec(),
            constraints,
            local_type,
        });
    }

    if parser.has_more_data() {
        return Err(malformed_error!(
            "Trailing data after local signature at offset {}",
            parser.pos()
        ));
    }

    Ok(locals)
}

const MAX_NESTING: u32 = 64;

fn decode_type(
    parser: &mut Parser<'_>,
    decoder: &dyn TypeTokenDecoder,
    depth: u32,
) -> Result<Option<TypeRef>> {
    if depth > MAX_NESTING {
        return Err(malformed_error!("Signature nesting exceeds {}", MAX_NESTING));
    }

    let element = parser.read_u8()?;
    if let Some(primitive) = PrimitiveType::from_element_type(element) {
        return Ok(Some(TypeRef::Primitive(primitive)));
    }

    Ok(match element {
        ELEMENT_TYPE::CLASS | ELEMENT_TYPE::VALUETYPE => {
            let token = parser.read_compressed_token()?;
            Some(decoder.decode_type_token(token)?)
        }
        ELEMENT_TYPE::SZARRAY => decode_type(parser, decoder, depth + 1)?
            .map(|inner| TypeRef::SzArray(Box::new(inner))),
        ELEMENT_TYPE::PTR => decode_type(parser, decoder, depth + 1)?
            .map(|inner| TypeRef::Pointer(Box::new(inner))),
        ELEMENT_TYPE::BYREF => decode_type(parser, decoder, depth + 1)?
            .map(|inner| TypeRef::ByRef(Box::new(inner))),
        ELEMENT_TYPE::VAR => Some(TypeRef::TypeParameter(parser.read_compressed_uint()?)),
        ELEMENT_TYPE::MVAR => Some(TypeRef::MethodTypeParameter(
            parser.read_compressed_uint()?,
        )),
        ELEMENT_TYPE::GENERICINST => {
            let generic = decode_type(parser, decoder, depth + 1)?;
            let argument_count = parser.read_compressed_uint()?;
            let mut arguments = Vec::new();
            let mut complete = generic.is_some();
            for _ in 0..argument_count {
                match decode_type(parser, decoder, depth + 1)? {
                    Some(argument) => arguments.push(argument),
                    None => complete = false,
                }
            }
            match generic {
                Some(generic) if complete => Some(TypeRef::GenericInstance {
                    generic: Box::new(generic),
                    arguments,
                }),
                _ => None,
            }
        }
        ELEMENT_TYPE::ARRAY => {
            decode_type(parser, decoder, depth + 1)?;
            let _rank = parser.read_compressed_uint()?;
            let sizes = parser.read_compressed_uint()?;
            for _ in 0..sizes {
                parser.read_compressed_uint()?;
            }
            let bounds = parser.read_compressed_uint()?;
            for _ in 0..bounds {
                parser.read_compressed_uint()?;
            }
            None
        }
        ELEMENT_TYPE::CMOD_REQD | ELEMENT_TYPE::CMOD_OPT => {
            parser.read_compressed_token()?;
            decode_type(parser, decoder, depth + 1)?
        }
        ELEMENT_TYPE::FNPTR => {
            return Err(Error::Signature(
                "Function pointer locals are not supported".to_string(),
            ))
        }
        other => {
            return Err(malformed_error!("Invalid element type - 0x{:02x}", other));
        }
    })
}

/// Returns true if `token` can appear as a `TypeDefOrRef` operand of a signature.
#[must_use]
pub fn is_type_def_or_ref(token: Token) -> bool {
    matches!(
        token.table_id(),
        Some(TableId::TypeDef | TableId::TypeRef | TableId::TypeSpec)
    )
}
