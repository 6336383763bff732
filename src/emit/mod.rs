//! Edit-and-Continue delta emission.
//!
//! This module turns a set of [`SemanticEdit`]s between two compilations into a metadata
//! delta that a running .NET process can apply, together with the [`EmitBaseline`] the
//! next edit is computed against.
//!
//! # Architecture
//!
//! One emission runs through these components:
//!
//! - [`definitionmap::DefinitionMap`] - Relates definitions of the new compilation to rows
//!   of the original module and of earlier deltas, and builds slot allocators
//! - [`changes::SymbolChanges`] - Classifies every symbol as added, updated, or containing
//!   changes
//! - [`writer::DeltaMetadataWriter`] - Allocates rows, requests method bodies and writes
//!   the tables, heaps and `EncLog`/`EncMap`
//! - [`baseline::EmitBaseline`] - Immutable cumulative state, extended with the writer's
//!   [`baseline::BaselineUpdate`] after a successful emission
//!
//! Method bodies come from the front end through [`MethodBodyProvider`]. Problems the
//! front end has to report to the user (unreadable debug information, a missing state
//! machine attribute, ...) are collected as diagnostics and make the emission
//! unsuccessful; broken invariants are returned as errors.
//!
//! # Examples
//!
//! ```rust,ignore
//! use dotdelta::emit::{emit_difference, CancellationToken, EmitOptions, SemanticEdit};
//!
//! let result = emit_difference(
//!     &baseline,
//!     compilation1,
//!     &[SemanticEdit::update(method0, method1)],
//!     &bodies,
//!     &EmitOptions::default(),
//!     &CancellationToken::new(),
//! )?;
//! if result.success {
//!     let next = result.baseline.unwrap();
//! }
//! ```

use std::sync::Arc;

use crate::{
    metadata::{diagnostics::Diagnostics, token::Token},
    symbols::{Compilation, SymbolId},
    Result,
};

pub mod allocator;
pub mod baseline;
pub mod body;
pub mod cancel;
pub mod changes;
pub mod debuginfo;
pub mod definitionmap;
pub mod deleted;
pub mod edits;
pub mod index;
pub mod locals;
pub mod options;
pub mod writer;

pub use allocator::EncVariableSlotAllocator;
pub use baseline::{AddedOrChangedMethodInfo, BaselineUpdate, EmitBaseline};
pub use body::{MethodBody, TokenFixup};
pub use cancel::CancellationToken;
pub use changes::{SymbolChange, SymbolChanges};
pub use debuginfo::{
    ClosureDebugInfo, DebugId, DebugInformationProvider, EditAndContinueMethodDebugInformation,
    LambdaDebugInfo, LocalDebugId, LocalSignatureProvider, LocalSlotDebugInfo,
};
pub use edits::{SemanticEdit, SemanticEditKind, SyntaxMapper};
pub use locals::{
    EncHoistedLocalInfo, EncLocalInfo, LocalSlotBuilder, StateMachineBodyInfo,
    StateMachineSlotBuilder, SynthesizedLocalKind,
};
pub use options::EmitOptions;
pub use writer::{DeltaMetadataWriter, DeltaTables, MetadataDelta};

use definitionmap::DefinitionMap;

/// Generates method bodies on request of the writer.
///
/// The allocator is present for updated methods whose variables survive the edit; the
/// generator must take slots from it so the runtime can remap live frames.
pub trait MethodBodyProvider {
    /// Returns the body of `method`.
    ///
    /// # Errors
    ///
    /// Code generation failures abort the emission.
    fn method_body(
        &self,
        compilation: &Compilation,
        method: SymbolId,
        allocator: Option<&EncVariableSlotAllocator>,
    ) -> Result<MethodBody>;
}

impl<F> MethodBodyProvider for F
where
    F: Fn(&Compilation, SymbolId, Option<&EncVariableSlotAllocator>) -> Result<MethodBody>,
{
    fn method_body(
        &self,
        compilation: &Compilation,
        method: SymbolId,
        allocator: Option<&EncVariableSlotAllocator>,
    ) -> Result<MethodBody> {
        self(compilation, method, allocator)
    }
}

/// Outcome of [`emit_difference`].
pub struct EmitDifferenceResult {
    /// Whether a delta was produced
    pub success: bool,
    /// Everything reported during the emission
    pub diagnostics: Diagnostics,
    /// The delta, on success
    pub delta: Option<writer::MetadataDelta>,
    /// The baseline of the next edit, on success
    pub baseline: Option<EmitBaseline>,
    /// `MethodDef` tokens of methods whose existing rows were re-emitted
    pub updated_methods: Vec<Token>,
    /// `TypeDef` tokens of the types the delta touches
    pub changed_types: Vec<Token>,
}

/// Emits the delta that turns the generation described by `baseline` into `compilation`.
///
/// # Arguments
///
/// * `baseline` - State after the previous generation
/// * `compilation` - The edited program
/// * `edits` - Semantic edits between the baseline's compilation and `compilation`
/// * `bodies` - Code generator for added and updated methods
/// * `options` - Emission settings
/// * `cancellation` - Checked between types and methods
///
/// # Errors
///
/// Returns [`crate::Error::Cancelled`] when cancelled and [`crate::Error::Invariant`],
/// [`crate::Error::Malformed`] or [`crate::Error::Signature`] for inputs that cannot be
/// emitted. Problems attributable to user code end up in the diagnostics of an
/// unsuccessful result instead.
pub fn emit_difference(
    baseline: &EmitBaseline,
    compilation: Arc<Compilation>,
    edits: &[SemanticEdit],
    bodies: &dyn MethodBodyProvider,
    options: &EmitOptions,
    cancellation: &CancellationToken,
) -> Result<EmitDifferenceResult> {
    cancellation.check()?;
    tracing::debug!(
        generation = baseline.ordinal() + 1,
        edits = edits.len(),
        "emitting difference"
    );

    let diagnostics = Diagnostics::new();
    let map = DefinitionMap::new(baseline, compilation.clone(), edits)?;
    let changes = SymbolChanges::new(edits, &compilation, &map)?;
    let writer = DeltaMetadataWriter::new(&map, &changes, options, &diagnostics, cancellation)?;
    let written = writer.write(bodies)?;

    if diagnostics.has_errors() {
        tracing::warn!(
            errors = diagnostics.error_count(),
            "emission produced errors, no delta published"
        );
        return Ok(EmitDifferenceResult {
            success: false,
            diagnostics,
            delta: None,
            baseline: None,
            updated_methods: Vec::new(),
            changed_types: Vec::new(),
        });
    }

    let next = map.mapped_baseline().with(compilation, written.update)?;
    Ok(EmitDifferenceResult {
        success: true,
        diagnostics,
        delta: Some(written.delta),
        baseline: Some(next),
        updated_methods: written.updated_methods,
        changed_types: written.changed_types,
    })
}
