//! Shared fixtures for the integration tests.
//!
//! Every test starts from the same small program:
//!
//! ```text
//! namespace N {
//!     class C {                 // TypeDef 2
//!         int count;            // Field 1
//!         void M() { }          // MethodDef 1
//!         void F(int x) { }     // MethodDef 2, Param 1
//!     }
//! }
//! ```
//!
//! and builds later generations as fresh compilations with the same shape plus whatever
//! the test edits.

#![allow(dead_code)]

use std::sync::Arc;

use dotdelta::prelude::*;

/// Token of the `TypeDef` row of `N.C`.
pub const CLASS_C: u32 = 0x0200_0002;
/// Token of `N.C.M`.
pub const METHOD_M: u32 = 0x0600_0001;
/// Token of `N.C.F`.
pub const METHOD_F: u32 = 0x0600_0002;

/// Declares `N.C` with its field.
pub fn class_c(builder: &mut CompilationBuilder) -> SymbolId {
    let global = builder.global_namespace();
    let namespace = builder.namespace(global, "N");
    let class = builder.add_type(namespace, "C", TypeData::class());
    builder.add_field(class, "count", FieldData::new(TypeRef::int32()));
    class
}

/// Declares `void M()` with its body at `body_position`.
pub fn method_m(builder: &mut CompilationBuilder, class: SymbolId, body_position: u32) -> SymbolId {
    let mut data = MethodData::new(MethodSignature::instance(TypeRef::void(), vec![]));
    data.body_position = body_position;
    builder.add_method(class, "M", data)
}

/// Declares `void F(int x)`.
pub fn method_f(builder: &mut CompilationBuilder, class: SymbolId) -> SymbolId {
    let mut data = MethodData::new(MethodSignature::instance(
        TypeRef::void(),
        vec![TypeRef::int32()],
    ));
    data.parameters.push(Parameter::new("x", 1));
    builder.add_method(class, "F", data)
}

/// Builds the standard program, then lets the test add to `N.C`.
pub fn program(customize: impl FnOnce(&mut CompilationBuilder, SymbolId)) -> Arc<Compilation> {
    program_from(CompilationBuilder::new("App"), customize)
}

/// Builds the standard program with a preconfigured builder.
pub fn program_from(
    mut builder: CompilationBuilder,
    customize: impl FnOnce(&mut CompilationBuilder, SymbolId),
) -> Arc<Compilation> {
    let class = class_c(&mut builder);
    method_m(&mut builder, class, 100);
    method_f(&mut builder, class);
    customize(&mut builder, class);
    Arc::new(builder.build())
}

/// Builds the standard program without additions.
pub fn standard_program() -> Arc<Compilation> {
    program(|_, _| {})
}

/// Finds a symbol by its dotted name.
pub fn find(compilation: &Compilation, qualified_name: &str) -> SymbolId {
    compilation
        .symbols()
        .find(|symbol| compilation.qualified_name(symbol.id) == qualified_name)
        .map(|symbol| symbol.id)
        .unwrap_or_else(|| panic!("no symbol named {}", qualified_name))
}

/// Emits generation 0 of `compilation` and wraps it into a baseline.
pub fn initial_baseline(compilation: &Arc<Compilation>) -> EmitBaseline {
    initial_baseline_with(compilation, |module| module)
}

/// Like [`initial_baseline`], with extra locals or debug information recorded for the
/// module.
pub fn initial_baseline_with(
    compilation: &Arc<Compilation>,
    customize: impl FnOnce(ModuleMetadataBuilder) -> ModuleMetadataBuilder,
) -> EmitBaseline {
    let module = customize(ModuleMetadataBuilder::new(compilation.clone()))
        .emit()
        .expect("generation 0 should emit");
    EmitBaseline::create_initial_baseline(
        compilation.clone(),
        module.metadata,
        module.debug_information,
        module.local_signatures,
    )
    .expect("baseline should be created")
}

/// A body consisting of a single `ret`.
pub fn ret_body(
    _: &Compilation,
    _: SymbolId,
    _: Option<&EncVariableSlotAllocator>,
) -> Result<MethodBody> {
    Ok(MethodBody::new(vec![0x2A], 8))
}

/// Emits a generation with strict options.
pub fn emit(
    baseline: &EmitBaseline,
    compilation: &Arc<Compilation>,
    edits: &[SemanticEdit],
    bodies: &dyn MethodBodyProvider,
) -> EmitDifferenceResult {
    emit_with(baseline, compilation, edits, bodies, &EmitOptions::strict())
}

/// Emits a generation with the given options.
pub fn emit_with(
    baseline: &EmitBaseline,
    compilation: &Arc<Compilation>,
    edits: &[SemanticEdit],
    bodies: &dyn MethodBodyProvider,
    options: &EmitOptions,
) -> EmitDifferenceResult {
    emit_difference(
        baseline,
        compilation.clone(),
        edits,
        bodies,
        options,
        &CancellationToken::new(),
    )
    .expect("emission should not fail")
}

/// Returns the delta and next baseline of a successful emission.
pub fn succeeded(result: EmitDifferenceResult) -> (MetadataDelta, EmitBaseline, Vec<Token>) {
    assert!(
        result.success,
        "emission reported: {}",
        result.diagnostics.summary()
    );
    let delta = result.delta.expect("successful emission has a delta");
    let baseline = result.baseline.expect("successful emission has a baseline");
    (delta, baseline, result.updated_methods)
}

/// Renders the `EncLog` as `(token, operation)` pairs.
pub fn log_of(delta: &MetadataDelta) -> Vec<(u32, EditAndContinueOperation)> {
    delta
        .enc_log
        .iter()
        .map(|row| (row.token.value(), row.operation))
        .collect()
}

/// Renders the `EncMap` as raw token values.
pub fn map_of(delta: &MetadataDelta) -> Vec<u32> {
    delta.enc_map.tokens().iter().map(Token::value).collect()
}

/// Reads the blob at heap offset `offset` of a delta whose blob heap starts at `start`.
pub fn blob(delta: &MetadataDelta, start: u32, offset: u32) -> Vec<u8> {
    let local = (offset - start) as usize;
    let data = &delta.heaps.blobs[local..];
    // Fixture blobs are shorter than 0x80 bytes, so the length is a single byte.
    let length = data[0] as usize;
    data[1..=length].to_vec()
}
