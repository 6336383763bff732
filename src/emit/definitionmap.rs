//! Previous-generation view of the current compilation.
//!
//! A [`DefinitionMap`] answers, for symbols of the compilation being emitted, what the
//! generations before it know about them: their rows and, for methods whose variables
//! are preserved, the slot layout a new body has to respect.
//!
//! Three compilations are involved. The *current* one is being emitted; the *previous*
//! one keys the previous baseline's maps; the *metadata* one is the compilation the
//! original module was emitted from. Four matchers relate them:
//!
//! | matcher                | from     | to       |
//! |------------------------|----------|----------|
//! | `to_metadata`          | current  | metadata |
//! | `to_previous`          | current  | previous |
//! | `previous_to_metadata` | previous | metadata |
//! | `previous_to_current`  | previous | current  |
//!
//! The previous baseline is also re-based onto the current compilation once, so row
//! lookups for current symbols are plain map lookups.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use crate::{
    emit::{
        allocator::{EncVariableSlotAllocator, PreviousStateMachine},
        baseline::EmitBaseline,
        changes::PreviousDefinitions,
        debuginfo::{DebugId, EditAndContinueMethodDebugInformation},
        deleted::DeletedOrigin,
        edits::{SemanticEdit, SemanticEditKind, SyntaxMapper},
        index::MethodImplKey,
        locals::{EncHoistedLocalInfo, EncLocalInfo},
    },
    metadata::{
        diagnostics::{Diagnostic, DiagnosticCode, Diagnostics},
        module::ModuleMetadata,
        signatures::decode_local_signature,
        tables::TableId,
        token::Token,
    },
    symbols::{
        matcher::{map_baseline_to_compilation, StructuralSymbolMatcher, SymbolMatcher},
        names::{parse_state_machine_field, StateMachineField},
        types::TypeRef,
        Compilation, SymbolId, SymbolKind,
    },
    Result,
};

/// Previous-generation view of the compilation being emitted.
pub struct DefinitionMap<'a> {
    previous: &'a EmitBaseline,
    mapped: EmitBaseline,
    compilation: Arc<Compilation>,
    to_metadata: Rc<StructuralSymbolMatcher>,
    to_previous: Rc<StructuralSymbolMatcher>,
    previous_to_metadata: Rc<StructuralSymbolMatcher>,
    previous_to_current: Rc<StructuralSymbolMatcher>,
    preserve_locals: HashMap<SymbolId, Option<SyntaxMapper>>,
}

impl<'a> DefinitionMap<'a> {
    /// Builds the view of `compilation` against `previous`.
    ///
    /// Only [`SemanticEditKind::Update`] edits that preserve local variables get slot
    /// allocators.
    ///
    /// # Errors
    ///
    /// Propagates failures of re-basing the baseline.
    pub fn new(
        previous: &'a EmitBaseline,
        compilation: Arc<Compilation>,
        edits: &[SemanticEdit],
    ) -> Result<Self> {
        let metadata = previous.module.compilation().clone();
        let to_metadata = Rc::new(StructuralSymbolMatcher::new(
            compilation.clone(),
            metadata.clone(),
        ));
        let to_previous = Rc::new(StructuralSymbolMatcher::new(
            compilation.clone(),
            previous.compilation.clone(),
        ));
        let previous_to_metadata = Rc::new(StructuralSymbolMatcher::new(
            previous.compilation.clone(),
            metadata,
        ));
        let previous_to_current = Rc::new(StructuralSymbolMatcher::new(
            previous.compilation.clone(),
            compilation.clone(),
        ));

        let mapped =
            map_baseline_to_compilation(previous, compilation.clone(), previous_to_current.as_ref())?;

        let preserve_locals = edits
            .iter()
            .filter(|edit| edit.kind == SemanticEditKind::Update && edit.preserve_local_variables)
            .map(|edit| {
                (
                    compilation.canonical_definition(edit.new_symbol),
                    edit.syntax_map.clone(),
                )
            })
            .collect();

        Ok(DefinitionMap {
            previous,
            mapped,
            compilation,
            to_metadata,
            to_previous,
            previous_to_metadata,
            previous_to_current,
            preserve_locals,
        })
    }

    /// The baseline being extended.
    #[must_use]
    pub fn previous(&self) -> &EmitBaseline {
        self.previous
    }

    /// The previous baseline re-based onto the current compilation.
    #[must_use]
    pub fn mapped_baseline(&self) -> &EmitBaseline {
        &self.mapped
    }

    /// The compilation being emitted.
    #[must_use]
    pub fn compilation(&self) -> &Arc<Compilation> {
        &self.compilation
    }

    /// The compilation keying the previous baseline.
    #[must_use]
    pub fn previous_compilation(&self) -> &Arc<Compilation> {
        &self.previous.compilation
    }

    /// The original module.
    #[must_use]
    pub fn module(&self) -> &ModuleMetadata {
        &self.previous.module
    }

    /// Maps previous-compilation symbols to current ones.
    #[must_use]
    pub fn previous_to_current(&self) -> &dyn SymbolMatcher {
        self.previous_to_current.as_ref()
    }

    /// Returns the `TypeDef` row of a current type.
    #[must_use]
    pub fn try_get_type_row(&self, symbol: SymbolId) -> Option<u32> {
        self.mapped
            .types_added
            .get(&symbol)
            .copied()
            .or_else(|| self.metadata_row(symbol, TableId::TypeDef))
    }

    /// Returns the `MethodDef` row of a current method.
    #[must_use]
    pub fn try_get_method_row(&self, symbol: SymbolId) -> Option<u32> {
        let symbol = self.compilation.row_owner(symbol);
        self.mapped
            .methods_added
            .get(&symbol)
            .copied()
            .or_else(|| self.metadata_row(symbol, TableId::MethodDef))
    }

    /// Returns the `Field` row of a current field.
    #[must_use]
    pub fn try_get_field_row(&self, symbol: SymbolId) -> Option<u32> {
        self.mapped
            .fields_added
            .get(&symbol)
            .copied()
            .or_else(|| self.metadata_row(symbol, TableId::Field))
    }

    /// Returns the `Property` row of a current property.
    #[must_use]
    pub fn try_get_property_row(&self, symbol: SymbolId) -> Option<u32> {
        self.mapped
            .properties_added
            .get(&symbol)
            .copied()
            .or_else(|| self.metadata_row(symbol, TableId::Property))
    }

    /// Returns the `Event` row of a current event.
    #[must_use]
    pub fn try_get_event_row(&self, symbol: SymbolId) -> Option<u32> {
        self.mapped
            .events_added
            .get(&symbol)
            .copied()
            .or_else(|| self.metadata_row(symbol, TableId::Event))
    }

    /// Returns the `MethodDef` row of a method of the previous compilation.
    #[must_use]
    pub fn previous_method_row(&self, old: SymbolId) -> Option<u32> {
        let old = self.previous.compilation.row_owner(old);
        self.previous
            .methods_added
            .get(&old)
            .copied()
            .or_else(|| self.previous_metadata_row(old, TableId::MethodDef))
    }

    /// Returns the `TypeDef` row of a type of the previous compilation.
    #[must_use]
    pub fn previous_type_row(&self, old: SymbolId) -> Option<u32> {
        self.previous
            .types_added
            .get(&old)
            .copied()
            .or_else(|| self.previous_metadata_row(old, TableId::TypeDef))
    }

    /// Returns whether `row` of `table` belongs to the original module or to a delta.
    #[must_use]
    pub fn deleted_origin(&self, table: TableId, row: u32) -> DeletedOrigin {
        DeletedOrigin::for_row(
            table,
            row,
            self.module().table_sizes()[table],
            self.previous.ordinal,
        )
    }

    /// Returns the `EventMap` row of a type, if any generation created one.
    #[must_use]
    pub fn event_map_row(&self, type_row: u32) -> Option<u32> {
        self.module()
            .event_map_row(type_row)
            .or_else(|| self.previous.event_map_added.get(&type_row).copied())
    }

    /// Returns the `PropertyMap` row of a type, if any generation created one.
    #[must_use]
    pub fn property_map_row(&self, type_row: u32) -> Option<u32> {
        self.module()
            .property_map_row(type_row)
            .or_else(|| self.previous.property_map_added.get(&type_row).copied())
    }

    /// Returns the first `Param` row and the count of parameter rows of a method row.
    /// Methods of the original module use its ranges, methods added by a delta the
    /// recorded first row.
    #[must_use]
    pub fn param_rows(&self, method_row: u32, parameter_count: u32) -> Option<(u32, u32)> {
        if method_row <= self.module().table_sizes()[TableId::MethodDef] {
            self.module().param_range(method_row)
        } else {
            self.previous
                .first_param_rows
                .get(&method_row)
                .map(|first| (*first, parameter_count))
        }
    }

    /// Returns the existing `CustomAttribute` rows of `parent`: the original ones followed
    /// by those added by earlier deltas.
    #[must_use]
    pub fn custom_attribute_rows(&self, parent: Token) -> Vec<u32> {
        let mut rows = self.module().custom_attribute_rows(parent).to_vec();
        for row in self.previous.custom_attributes_added(parent) {
            if !rows.contains(row) {
                rows.push(*row);
            }
        }
        rows
    }

    /// Returns true if the `index`-th `MethodImpl` row of a method row already exists.
    #[must_use]
    pub fn method_impl_exists(&self, method_row: u32, index: u32) -> bool {
        index <= self.module().method_impl_count(method_row)
            || self
                .previous
                .method_impls_added
                .contains_key(&MethodImplKey::new(method_row, index))
    }

    fn metadata_row(&self, symbol: SymbolId, table: TableId) -> Option<u32> {
        let original = self.to_metadata.map_definition(symbol)?;
        self.module()
            .token(original)
            .filter(|token| token.is_table(table))
            .map(|token| token.row())
    }

    fn previous_metadata_row(&self, old: SymbolId, table: TableId) -> Option<u32> {
        let original = self.previous_to_metadata.map_definition(old)?;
        self.module()
            .token(original)
            .filter(|token| token.is_table(table))
            .map(|token| token.row())
    }

    /// Creates the slot allocator for an updated method whose variables are preserved.
    ///
    /// Returns `Ok(None)` for methods that do not preserve variables, methods without a
    /// previous row, and methods whose previous debug information is unusable; the last
    /// case also reports a diagnostic.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SymbolNotFound`] if `method` is not a method of the
    /// current compilation.
    pub fn try_create_variable_slot_allocator(
        &self,
        method: SymbolId,
        diagnostics: &Diagnostics,
    ) -> Result<Option<EncVariableSlotAllocator>> {
        let Some(syntax_map) = self
            .preserve_locals
            .get(&self.compilation.canonical_definition(method))
            .cloned()
        else {
            return Ok(None);
        };
        let method = self.compilation.row_owner(method);
        let Some(row) = self.try_get_method_row(method) else {
            return Ok(None);
        };
        let current = self.compilation.method(method)?;
        let token = Token::from_parts(TableId::MethodDef, row);

        if let Some(info) = self.previous.added_or_changed_methods.get(&row) {
            let Some(previous_method) = self.to_previous.map_definition(method) else {
                return Ok(None);
            };
            let previous_body_position = self.previous.compilation.method(previous_method)?.body_position;
            let state_machine = match (&info.state_machine_type_name, &info.awaiter_slots) {
                (Some(type_name), Some(awaiter_slots)) => Some(PreviousStateMachine {
                    type_name: type_name.clone(),
                    hoisted_locals: info.hoisted_locals.clone(),
                    awaiter_slots: awaiter_slots.clone(),
                }),
                _ => None,
            };

            tracing::trace!(%token, generation = self.previous.ordinal, "reusing slots of previous delta");
            return Ok(Some(EncVariableSlotAllocator::new(
                self.to_previous.clone(),
                syntax_map,
                current.body_position,
                previous_body_position,
                info.method_id,
                info.locals.clone(),
                &info.lambdas,
                &info.closures,
                state_machine,
            )));
        }

        if row > self.module().table_sizes()[TableId::MethodDef] {
            return Ok(None);
        }

        let report = |message: String| {
            tracing::warn!(%token, %message, "previous slots unavailable");
            diagnostics.push(
                Diagnostic::from_code(DiagnosticCode::InvalidDebugInfo, message)
                    .with_symbol(method)
                    .with_token(token),
            );
        };

        let debug_information = match self.previous.debug_information.get(token) {
            Ok(info) => info,
            Err(error) => {
                report(format!(
                    "Unable to read debug information of {}: {}",
                    self.compilation.qualified_name(method),
                    error
                ));
                return Ok(None);
            }
        };

        let Some(original) = self.to_metadata.map_definition(method) else {
            return Ok(None);
        };
        let previous_body_position = self.module().compilation().method(original)?.body_position;

        let (previous_locals, state_machine) =
            if let Some(state_machine_type) = self.module().state_machine_type(original) {
                match self.previous_state_machine(state_machine_type, &debug_information) {
                    Ok(state_machine) => (Vec::new(), Some(state_machine)),
                    Err(message) => {
                        report(message);
                        return Ok(None);
                    }
                }
            } else {
                if let Some(kind) = current.state_machine {
                    if !self
                        .compilation
                        .well_known_attributes()
                        .contains(kind.required_attribute())
                    {
                        diagnostics.push(
                            Diagnostic::from_code(
                                DiagnosticCode::MissingStateMachineAttribute,
                                format!(
                                    "{} requires {} to be defined",
                                    self.compilation.qualified_name(method),
                                    kind.attribute_name()
                                ),
                            )
                            .with_symbol(method)
                            .with_token(token),
                        );
                        return Ok(None);
                    }
                }
                match self.previous_locals(token, &debug_information) {
                    Ok(locals) => (locals, None),
                    Err(message) => {
                        report(message);
                        return Ok(None);
                    }
                }
            };

        tracing::trace!(%token, locals = previous_locals.len(), "reading slots of original module");
        Ok(Some(EncVariableSlotAllocator::new(
            self.to_metadata.clone(),
            syntax_map,
            current.body_position,
            previous_body_position,
            DebugId::new(debug_information.method_ordinal, 0),
            previous_locals,
            &debug_information.lambdas,
            &debug_information.closures,
            state_machine,
        )))
    }

    /// Pairs the decoded local signature with the slot records. Without slot records every
    /// slot is kept but none is reused.
    fn previous_locals(
        &self,
        token: Token,
        debug_information: &EditAndContinueMethodDebugInformation,
    ) -> std::result::Result<Vec<EncLocalInfo>, String> {
        let signature = (self.previous.local_signatures)(token)
            .map_err(|error| format!("Unable to read local signature of {}: {}", token, error))?;
        let Some(signature) = signature else {
            return Ok(Vec::new());
        };

        let decoded = decode_local_signature(&signature, self.module())
            .map_err(|error| format!("Unable to decode local signature of {}: {}", token, error))?;
        let slots = &debug_information.local_slots;
        if !slots.is_empty() && slots.len() != decoded.len() {
            return Err(format!(
                "Local signature of {} has {} slots but debug information describes {}",
                token,
                decoded.len(),
                slots.len()
            ));
        }

        Ok(decoded
            .into_iter()
            .enumerate()
            .map(|(index, local)| match (slots.get(index), local.local_type) {
                (Some(slot), Some(local_type)) if slot.kind.is_long_lived() => {
                    EncLocalInfo::new(*slot, local_type, local.constraints)
                        .with_signature(local.signature)
                }
                _ => EncLocalInfo::unused(Some(local.signature)),
            })
            .collect())
    }

    /// Recovers hoisted variable and awaiter slots from the fields of the original state
    /// machine type.
    fn previous_state_machine(
        &self,
        state_machine_type: SymbolId,
        debug_information: &EditAndContinueMethodDebugInformation,
    ) -> std::result::Result<PreviousStateMachine, String> {
        let metadata = self.module().compilation();
        let Some(symbol) = metadata.get(state_machine_type) else {
            return Err(format!("State machine type {} not found", state_machine_type));
        };

        let mut hoisted_locals: Vec<EncHoistedLocalInfo> = Vec::new();
        let mut awaiter_slots: Vec<Option<TypeRef>> = Vec::new();

        for field in symbol.members.iter().filter_map(|id| metadata.get(*id)) {
            if field.kind() != SymbolKind::Field {
                continue;
            }
            let Some(field_type) = field.as_field().map(|data| data.field_type.clone()) else {
                continue;
            };
            match parse_state_machine_field(&field.name) {
                Some(StateMachineField::Awaiter { slot }) => {
                    // Every awaiter slot of the original machine has its own field.
                    let index = slot as usize;
                    if index >= symbol.members.len() {
                        return Err(format!(
                            "Awaiter field {} of {} is out of range",
                            field.name, symbol.name
                        ));
                    }
                    if awaiter_slots.len() <= index {
                        awaiter_slots.resize(index + 1, None);
                    }
                    awaiter_slots[index] = Some(field_type);
                }
                Some(parsed) => {
                    let index = parsed.slot() as usize;
                    let Some(slot) = debug_information.local_slots.get(index) else {
                        return Err(format!(
                            "Hoisted field {} of {} has no slot record",
                            field.name, symbol.name
                        ));
                    };
                    if hoisted_locals.len() <= index {
                        hoisted_locals.resize(index + 1, EncHoistedLocalInfo::unused());
                    }
                    hoisted_locals[index] = EncHoistedLocalInfo::new(*slot, field_type);
                }
                None => {}
            }
        }

        Ok(PreviousStateMachine {
            type_name: symbol.name.clone(),
            hoisted_locals,
            awaiter_slots,
        })
    }
}

impl PreviousDefinitions for DefinitionMap<'_> {
    fn definition_exists(&self, symbol: SymbolId) -> bool {
        let Some(definition) = self.compilation.get(symbol) else {
            return false;
        };
        match definition.kind() {
            SymbolKind::Namespace => {
                self.to_previous.map_namespace(symbol).is_some()
                    || self.to_metadata.map_namespace(symbol).is_some()
            }
            SymbolKind::Type => self.try_get_type_row(symbol).is_some(),
            SymbolKind::Field => self.try_get_field_row(symbol).is_some(),
            SymbolKind::Method => self.try_get_method_row(symbol).is_some(),
            SymbolKind::Property => self.try_get_property_row(symbol).is_some(),
            SymbolKind::Event => self.try_get_event_row(symbol).is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        emit::{
            debuginfo::{LocalDebugId, LocalSlotDebugInfo},
            locals::SynthesizedLocalKind,
        },
        metadata::module::ModuleMetadataBuilder,
        symbols::{
            types::MethodSignature, CompilationBuilder, FieldData, LocalConstraints, MethodData,
            StateMachineKind, TypeData, WellKnownAttributes,
        },
    };

    struct Generation {
        compilation: Arc<Compilation>,
        method: SymbolId,
    }

    fn compile(async_method: bool, extra_method: bool) -> Generation {
        let mut builder = CompilationBuilder::new("App");
        if async_method {
            builder = builder.well_known_attributes(WellKnownAttributes::empty());
        }
        let class = builder.add_type(builder.global_namespace(), "C", TypeData::class());
        let mut data = MethodData::new(MethodSignature::instance(TypeRef::void(), vec![]));
        data.body_position = 100;
        if async_method {
            data.state_machine = Some(StateMachineKind::Async);
        }
        let method = builder.add_method(class, "M", data);
        if extra_method {
            builder.add_method(
                class,
                "N",
                MethodData::new(MethodSignature::static_method(TypeRef::void(), vec![])),
            );
        }
        Generation {
            compilation: Arc::new(builder.build()),
            method,
        }
    }

    fn user(offset: i32) -> LocalSlotDebugInfo {
        LocalSlotDebugInfo::new(SynthesizedLocalKind::UserDefined, LocalDebugId::new(offset, 0))
    }

    fn baseline(
        generation: &Generation,
        slots: Vec<LocalSlotDebugInfo>,
    ) -> EmitBaseline {
        let module = ModuleMetadataBuilder::new(generation.compilation.clone())
            .with_locals(
                generation.method,
                vec![
                    (TypeRef::int32(), LocalConstraints::empty()),
                    (TypeRef::string(), LocalConstraints::empty()),
                ],
            )
            .with_debug_info(
                generation.method,
                EditAndContinueMethodDebugInformation {
                    method_ordinal: 1,
                    local_slots: slots,
                    ..Default::default()
                },
            )
            .emit()
            .unwrap();
        EmitBaseline::create_initial_baseline(
            generation.compilation.clone(),
            module.metadata,
            module.debug_information,
            module.local_signatures,
        )
        .unwrap()
    }

    fn identity_map() -> SyntaxMapper {
        Arc::new(Some)
    }

    #[test]
    fn test_rows_through_matcher() -> Result<()> {
        let original = compile(false, false);
        let baseline = baseline(&original, vec![user(5), user(9)]);
        let current = compile(false, true);
        let map = DefinitionMap::new(&baseline, current.compilation.clone(), &[])?;

        assert_eq!(map.try_get_method_row(current.method), Some(1));
        assert!(map.definition_exists(current.method));
        let added = current.compilation.symbols().last().unwrap().id;
        assert!(!map.definition_exists(added));
        assert_eq!(map.previous_method_row(original.method), Some(1));
        Ok(())
    }

    #[test]
    fn test_allocator_from_original_module() -> Result<()> {
        let original = compile(false, false);
        let baseline = baseline(
            &original,
            vec![
                user(5),
                LocalSlotDebugInfo::new(SynthesizedLocalKind::LoweringTemp, LocalDebugId::default()),
            ],
        );
        let current = compile(false, false);
        let edits = [SemanticEdit::update(original.method, current.method)
            .with_syntax_map(identity_map())];
        let map = DefinitionMap::new(&baseline, current.compilation.clone(), &edits)?;
        let diagnostics = Diagnostics::new();

        let allocator = map
            .try_create_variable_slot_allocator(current.method, &diagnostics)?
            .unwrap();
        assert!(!diagnostics.has_errors());
        assert_eq!(allocator.method_id(), DebugId::new(1, 0));

        let reused = EncLocalInfo::new(user(5), TypeRef::int32(), LocalConstraints::empty());
        assert_eq!(allocator.get_previous_local(&reused), Some(0));

        let mut previous = Vec::new();
        allocator.add_previous_locals(&mut previous);
        assert_eq!(previous.len(), 2);
        assert!(previous.iter().all(EncLocalInfo::is_unused));
        assert_eq!(previous[1].signature, Some(vec![0x0E]));
        Ok(())
    }

    #[test]
    fn test_no_allocator_without_preserved_locals() -> Result<()> {
        let original = compile(false, false);
        let baseline = baseline(&original, vec![user(5), user(9)]);
        let current = compile(false, false);
        let edits = [SemanticEdit::update(original.method, current.method)];
        let map = DefinitionMap::new(&baseline, current.compilation.clone(), &edits)?;
        let diagnostics = Diagnostics::new();

        assert!(map
            .try_create_variable_slot_allocator(current.method, &diagnostics)?
            .is_none());
        assert!(!diagnostics.has_any());
        Ok(())
    }

    #[test]
    fn test_slot_count_mismatch_is_reported() -> Result<()> {
        let original = compile(false, false);
        let baseline = baseline(&original, vec![user(5)]);
        let current = compile(false, false);
        let edits = [SemanticEdit::update(original.method, current.method).preserving_locals()];
        let map = DefinitionMap::new(&baseline, current.compilation.clone(), &edits)?;
        let diagnostics = Diagnostics::new();

        assert!(map
            .try_create_variable_slot_allocator(current.method, &diagnostics)?
            .is_none());
        assert!(diagnostics.has_code(DiagnosticCode::InvalidDebugInfo));
        Ok(())
    }

    #[test]
    fn test_missing_state_machine_attribute() -> Result<()> {
        let original = compile(false, false);
        let baseline = baseline(&original, vec![user(5), user(9)]);
        let current = compile(true, false);
        let edits = [SemanticEdit::update(original.method, current.method).preserving_locals()];
        let map = DefinitionMap::new(&baseline, current.compilation.clone(), &edits)?;
        let diagnostics = Diagnostics::new();

        assert!(map
            .try_create_variable_slot_allocator(current.method, &diagnostics)?
            .is_none());
        assert!(diagnostics.has_code(DiagnosticCode::MissingStateMachineAttribute));
        Ok(())
    }

    #[test]
    fn test_state_machine_slots_from_fields() -> Result<()> {
        let mut builder = CompilationBuilder::new("App");
        let class = builder.add_type(builder.global_namespace(), "C", TypeData::class());
        let mut data = MethodData::new(MethodSignature::instance(TypeRef::void(), vec![]));
        data.state_machine = Some(StateMachineKind::Async);
        let method = builder.add_method(class, "RunAsync", data);
        let machine = builder.add_type(class, "<RunAsync>d__0", TypeData::class());
        builder.mark_synthesized(machine, method, true);
        builder.add_field(machine, "<x>5__1", FieldData::new(TypeRef::int32()));
        builder.add_field(machine, "<>u__2", FieldData::new(TypeRef::object()));
        let compilation = Arc::new(builder.build());

        let module = ModuleMetadataBuilder::new(compilation.clone())
            .with_debug_info(
                method,
                EditAndContinueMethodDebugInformation {
                    local_slots: vec![user(7)],
                    ..Default::default()
                },
            )
            .emit()?;
        let baseline = EmitBaseline::create_initial_baseline(
            compilation.clone(),
            module.metadata,
            module.debug_information,
            module.local_signatures,
        )?;

        let edits = [SemanticEdit::update(method, method).with_syntax_map(identity_map())];
        let map = DefinitionMap::new(&baseline, compilation, &edits)?;
        let diagnostics = Diagnostics::new();
        let allocator = map
            .try_create_variable_slot_allocator(method, &diagnostics)?
            .unwrap();

        assert_eq!(allocator.previous_state_machine_type_name(), Some("<RunAsync>d__0"));
        assert_eq!(allocator.previous_hoisted_local_slot_count(), 1);
        assert_eq!(allocator.previous_awaiter_slot_count(), 2);
        assert_eq!(
            allocator.try_get_previous_hoisted_local_slot_index(user(7), &TypeRef::int32()),
            Some(0)
        );
        assert_eq!(
            allocator.try_get_previous_awaiter_slot_index(&TypeRef::object()),
            Some(1)
        );
        Ok(())
    }

    #[test]
    fn test_out_of_range_awaiter_field_is_invalid_debug_info() -> Result<()> {
        let mut builder = CompilationBuilder::new("App");
        let class = builder.add_type(builder.global_namespace(), "C", TypeData::class());
        let mut data = MethodData::new(MethodSignature::instance(TypeRef::void(), vec![]));
        data.state_machine = Some(StateMachineKind::Async);
        let method = builder.add_method(class, "RunAsync", data);
        let machine = builder.add_type(class, "<RunAsync>d__0", TypeData::class());
        builder.mark_synthesized(machine, method, true);
        builder.add_field(machine, "<>u__4000000000", FieldData::new(TypeRef::object()));
        let compilation = Arc::new(builder.build());

        let module = ModuleMetadataBuilder::new(compilation.clone()).emit()?;
        let baseline = EmitBaseline::create_initial_baseline(
            compilation.clone(),
            module.metadata,
            module.debug_information,
            module.local_signatures,
        )?;

        let edits = [SemanticEdit::update(method, method).with_syntax_map(identity_map())];
        let map = DefinitionMap::new(&baseline, compilation, &edits)?;
        let diagnostics = Diagnostics::new();

        assert!(map
            .try_create_variable_slot_allocator(method, &diagnostics)?
            .is_none());
        assert!(diagnostics.has_code(DiagnosticCode::InvalidDebugInfo));
        Ok(())
    }
}
