//! # dotdelta Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the dotdelta library. Import this module to get quick access to everything needed
//! to drive an Edit-and-Continue session.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all dotdelta operations
pub use crate::Error;

/// The result type used throughout dotdelta
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Delta emission and its result
pub use crate::emit::{emit_difference, EmitDifferenceResult, MethodBodyProvider};

/// Cumulative state between generations
pub use crate::emit::{BaselineUpdate, EmitBaseline};

/// Edits, options and cancellation
pub use crate::emit::{
    CancellationToken, EmitOptions, SemanticEdit, SemanticEditKind, SyntaxMapper,
};

/// The generation-0 module
pub use crate::metadata::module::{EmittedModule, ModuleMetadata, ModuleMetadataBuilder};

// ================================================================================================
// Method Bodies and Local Slots
// ================================================================================================

/// Bodies handed back by the code generator
pub use crate::emit::{MethodBody, TokenFixup};

/// Slot allocation for updated methods
pub use crate::emit::{
    EncHoistedLocalInfo, EncLocalInfo, EncVariableSlotAllocator, LocalSlotBuilder,
    StateMachineBodyInfo, StateMachineSlotBuilder, SynthesizedLocalKind,
};

/// Edit-and-Continue debug information
pub use crate::emit::{
    ClosureDebugInfo, DebugId, DebugInformationProvider, EditAndContinueMethodDebugInformation,
    LambdaDebugInfo, LocalDebugId, LocalSignatureProvider, LocalSlotDebugInfo,
};

// ================================================================================================
// Output
// ================================================================================================

/// The delta and its tables
pub use crate::emit::{DeltaTables, MetadataDelta};

/// Tokens, table ids and the EnC bookkeeping tables
pub use crate::metadata::{
    tables::{EditAndContinueOperation, EncLogRow, EncMap, TableId, TableSizes},
    token::Token,
};

/// Diagnostics reported during emission
pub use crate::metadata::diagnostics::{
    Diagnostic, DiagnosticCategory, DiagnosticCode, DiagnosticSeverity, Diagnostics,
};

// ================================================================================================
// Symbol Model
// ================================================================================================

/// Compilations and symbols
pub use crate::symbols::{
    Compilation, CompilationBuilder, EventData, FieldData, MethodData, Parameter, PropertyData,
    Symbol, SymbolData, SymbolId, SymbolKind, TypeData,
};

/// Declaration flags
pub use crate::symbols::{
    EventAttributes, FieldAttributes, GenericParamAttributes, LocalConstraints,
    MethodAttributes, MethodImplAttributes, MethodSemanticsAttributes, ParamAttributes,
    PropertyAttributes, TypeAttributes, WellKnownAttributes,
};

/// Type references and signatures
pub use crate::symbols::types::{
    CustomAttribute, ExternalMember, ExternalType, MemberReference, MemberSignature,
    MethodSignature, PrimitiveType, ResolutionScope, TypeRef,
};

/// Cross-generation symbol matching
pub use crate::symbols::matcher::{StructuralSymbolMatcher, SymbolMatcher};
