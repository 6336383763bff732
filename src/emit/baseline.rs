//! Per-generation emit state.
//!
//! An [`EmitBaseline`] is everything a delta needs to know about the generations before
//! it: which rows earlier deltas added, how many rows and heap bytes every table and heap
//! has grown by, the slot layout of every method body an earlier delta emitted, and the
//! synthesized and deleted members seen so far.
//!
//! Baselines are immutable. The first one is created from the original module with
//! [`EmitBaseline::create_initial_baseline`]; every successful delta returns the next one,
//! built with [`EmitBaseline::with`]. All symbol-keyed maps of a baseline are keyed by
//! symbols of [`EmitBaseline::compilation`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use uguid::Guid;

use crate::{
    emit::{
        debuginfo::{
            CachedDebugInformation, ClosureDebugInfo, DebugId, DebugInformationProvider,
            LambdaDebugInfo, LocalSignatureProvider,
        },
        index::MethodImplKey,
        locals::{EncHoistedLocalInfo, EncLocalInfo},
    },
    metadata::{
        heaps::HeapSizes,
        module::ModuleMetadata,
        tables::{TableId, TableSizes},
        token::Token,
    },
    symbols::{matcher::SymbolMatcher, types::TypeRef, Compilation, SymbolId, SynthesizedTypeMap},
    utils::name_based_guid,
    Result,
};

/// Slot layout and debug identities of a method body emitted by a delta.
///
/// Types are expressed in the vocabulary of the compilation the body was emitted for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddedOrChangedMethodInfo {
    /// Identity of the method
    pub method_id: DebugId,
    /// Local slots
    pub locals: Vec<EncLocalInfo>,
    /// Lambdas of the body
    pub lambdas: Vec<LambdaDebugInfo>,
    /// Closures of the body
    pub closures: Vec<ClosureDebugInfo>,
    /// State machine type name, for kickoff methods
    pub state_machine_type_name: Option<String>,
    /// Hoisted variable slots, for kickoff methods
    pub hoisted_locals: Vec<EncHoistedLocalInfo>,
    /// Awaiter slots, present exactly when the state machine type name is
    pub awaiter_slots: Option<Vec<Option<TypeRef>>>,
}

impl AddedOrChangedMethodInfo {
    /// Creates the record.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Invariant`] unless awaiter slots are given exactly when a
    /// state machine type name is.
    pub fn new(
        method_id: DebugId,
        locals: Vec<EncLocalInfo>,
        lambdas: Vec<LambdaDebugInfo>,
        closures: Vec<ClosureDebugInfo>,
        state_machine_type_name: Option<String>,
        hoisted_locals: Vec<EncHoistedLocalInfo>,
        awaiter_slots: Option<Vec<Option<TypeRef>>>,
    ) -> Result<Self> {
        if state_machine_type_name.is_some() != awaiter_slots.is_some() {
            return Err(invariant_error!(
                "Method {} has a state machine type name without awaiter slots or vice versa",
                method_id
            ));
        }

        Ok(AddedOrChangedMethodInfo {
            method_id,
            locals,
            lambdas,
            closures,
            state_machine_type_name,
            hoisted_locals,
            awaiter_slots,
        })
    }

    /// Translates every stored type through `matcher`. Slots whose type has no
    /// counterpart become unused.
    #[must_use]
    pub fn map_types(&self, matcher: &dyn SymbolMatcher) -> AddedOrChangedMethodInfo {
        AddedOrChangedMethodInfo {
            locals: self.locals.iter().map(|local| local.map_types(matcher)).collect(),
            hoisted_locals: self
                .hoisted_locals
                .iter()
                .map(|hoisted| hoisted.map_types(matcher))
                .collect(),
            awaiter_slots: self.awaiter_slots.as_ref().map(|slots| {
                slots
                    .iter()
                    .map(|slot| slot.as_ref().and_then(|t| matcher.map_reference(t)))
                    .collect()
            }),
            ..self.clone()
        }
    }
}

/// What one delta adds to its baseline. Produced by the delta writer.
#[derive(Clone, Debug, Default)]
pub struct BaselineUpdate {
    /// `TypeDef` rows added
    pub types_added: HashMap<SymbolId, u32>,
    /// `Event` rows added
    pub events_added: HashMap<SymbolId, u32>,
    /// `Field` rows added
    pub fields_added: HashMap<SymbolId, u32>,
    /// `MethodDef` rows added
    pub methods_added: HashMap<SymbolId, u32>,
    /// `Property` rows added
    pub properties_added: HashMap<SymbolId, u32>,
    /// `EventMap` rows added, by `TypeDef` row
    pub event_map_added: HashMap<u32, u32>,
    /// `PropertyMap` rows added, by `TypeDef` row
    pub property_map_added: HashMap<u32, u32>,
    /// `MethodImpl` rows added
    pub method_impls_added: HashMap<MethodImplKey, u32>,
    /// First `Param` row of every added method, by `MethodDef` row
    pub first_param_rows: HashMap<u32, u32>,
    /// `CustomAttribute` rows beyond the original ones, by parent
    pub custom_attributes_added: HashMap<Token, Vec<u32>>,
    /// Rows the delta appended to every table
    pub table_entries_added: TableSizes,
    /// Bytes the delta appended to every heap
    pub heap_lengths_added: HeapSizes,
    /// Bodies emitted by the delta, by `MethodDef` row
    pub added_or_changed_methods: HashMap<u32, AddedOrChangedMethodInfo>,
    /// Anonymous types known after the delta
    pub synthesized_types: SynthesizedTypeMap,
    /// Compiler-generated members known after the delta, by container
    pub synthesized_members: HashMap<SymbolId, Vec<SymbolId>>,
    /// Members deleted so far, by container
    pub deleted_members: HashMap<SymbolId, Vec<SymbolId>>,
}

/// Emit state of one generation.
#[derive(Clone)]
pub struct EmitBaseline {
    pub(crate) ordinal: u32,
    pub(crate) enc_id: Guid,
    pub(crate) enc_base_id: Guid,
    pub(crate) module: Arc<ModuleMetadata>,
    pub(crate) compilation: Arc<Compilation>,
    pub(crate) types_added: HashMap<SymbolId, u32>,
    pub(crate) events_added: HashMap<SymbolId, u32>,
    pub(crate) fields_added: HashMap<SymbolId, u32>,
    pub(crate) methods_added: HashMap<SymbolId, u32>,
    pub(crate) properties_added: HashMap<SymbolId, u32>,
    pub(crate) event_map_added: HashMap<u32, u32>,
    pub(crate) property_map_added: HashMap<u32, u32>,
    pub(crate) method_impls_added: HashMap<MethodImplKey, u32>,
    pub(crate) first_param_rows: HashMap<u32, u32>,
    pub(crate) custom_attributes_added: HashMap<Token, Vec<u32>>,
    pub(crate) table_entries_added: TableSizes,
    pub(crate) heap_lengths_added: HeapSizes,
    pub(crate) added_or_changed_methods: HashMap<u32, AddedOrChangedMethodInfo>,
    pub(crate) synthesized_types: SynthesizedTypeMap,
    pub(crate) synthesized_members: HashMap<SymbolId, Vec<SymbolId>>,
    pub(crate) deleted_members: HashMap<SymbolId, Vec<SymbolId>>,
    pub(crate) debug_information: CachedDebugInformation,
    pub(crate) local_signatures: LocalSignatureProvider,
}

impl EmitBaseline {
    /// Creates the generation-0 baseline of `module`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if `compilation` is not the compilation the
    /// module was emitted from.
    pub fn create_initial_baseline(
        compilation: Arc<Compilation>,
        module: Arc<ModuleMetadata>,
        debug_information: DebugInformationProvider,
        local_signatures: LocalSignatureProvider,
    ) -> Result<EmitBaseline> {
        if compilation.id() != module.compilation().id() {
            return Err(malformed_error!(
                "Module {} was not emitted from compilation {:?}",
                module.name(),
                compilation.id()
            ));
        }

        tracing::debug!(module = %module.name(), mvid = %module.mvid(), "created initial baseline");

        Ok(EmitBaseline {
            ordinal: 0,
            enc_id: Guid::ZERO,
            enc_base_id: Guid::ZERO,
            synthesized_members: compilation.synthesized_members(),
            synthesized_types: compilation.anonymous_types().clone(),
            module,
            compilation,
            types_added: HashMap::new(),
            events_added: HashMap::new(),
            fields_added: HashMap::new(),
            methods_added: HashMap::new(),
            properties_added: HashMap::new(),
            event_map_added: HashMap::new(),
            property_map_added: HashMap::new(),
            method_impls_added: HashMap::new(),
            first_param_rows: HashMap::new(),
            custom_attributes_added: HashMap::new(),
            table_entries_added: TableSizes::new(),
            heap_lengths_added: HeapSizes::default(),
            added_or_changed_methods: HashMap::new(),
            deleted_members: HashMap::new(),
            debug_information: CachedDebugInformation::new(debug_information),
            local_signatures,
        })
    }

    /// Derives the baseline of the next generation.
    ///
    /// `self` must already be expressed in the vocabulary of `compilation`. Every added
    /// map is the union of both, with `update` winning; sizes add up.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Invariant`] if an added map records more rows than the
    /// cumulative row count of its table.
    pub fn with(&self, compilation: Arc<Compilation>, update: BaselineUpdate) -> Result<EmitBaseline> {
        fn union<K: std::hash::Hash + Eq + Clone, V: Clone>(
            previous: &HashMap<K, V>,
            current: HashMap<K, V>,
        ) -> HashMap<K, V> {
            let mut merged = previous.clone();
            merged.extend(current);
            merged
        }

        let ordinal = self.ordinal + 1;
        let enc_id = self.next_enc_id();

        let baseline = EmitBaseline {
            ordinal,
            enc_id,
            enc_base_id: self.enc_id,
            module: self.module.clone(),
            compilation,
            types_added: union(&self.types_added, update.types_added),
            events_added: union(&self.events_added, update.events_added),
            fields_added: union(&self.fields_added, update.fields_added),
            methods_added: union(&self.methods_added, update.methods_added),
            properties_added: union(&self.properties_added, update.properties_added),
            event_map_added: union(&self.event_map_added, update.event_map_added),
            property_map_added: union(&self.property_map_added, update.property_map_added),
            method_impls_added: union(&self.method_impls_added, update.method_impls_added),
            first_param_rows: union(&self.first_param_rows, update.first_param_rows),
            custom_attributes_added: union(
                &self.custom_attributes_added,
                update.custom_attributes_added,
            ),
            table_entries_added: self.table_entries_added.plus(&update.table_entries_added),
            heap_lengths_added: self.heap_lengths_added.plus(&update.heap_lengths_added),
            added_or_changed_methods: union(
                &self.added_or_changed_methods,
                update.added_or_changed_methods,
            ),
            synthesized_types: update.synthesized_types,
            synthesized_members: update.synthesized_members,
            deleted_members: update.deleted_members,
            debug_information: self.debug_information.clone(),
            local_signatures: self.local_signatures.clone(),
        };
        baseline.check_added_counts()?;

        tracing::debug!(
            generation = ordinal,
            enc_id = %enc_id,
            methods = baseline.added_or_changed_methods.len(),
            "derived baseline"
        );
        Ok(baseline)
    }

    /// Id of the generation derived from this one: a name-based GUID over the MVID, this
    /// generation's id and the next ordinal.
    #[must_use]
    pub fn next_enc_id(&self) -> Guid {
        let ordinal = self.ordinal + 1;
        name_based_guid(&[
            self.module.mvid().to_bytes().as_slice(),
            self.enc_id.to_bytes().as_slice(),
            ordinal.to_le_bytes().as_slice(),
        ])
    }

    fn check_added_counts(&self) -> Result<()> {
        let counts = [
            (TableId::TypeDef, self.types_added.len()),
            (TableId::Event, self.events_added.len()),
            (TableId::Field, self.fields_added.len()),
            (TableId::MethodDef, self.methods_added.len()),
            (TableId::Property, self.properties_added.len()),
            (TableId::EventMap, self.event_map_added.len()),
            (TableId::PropertyMap, self.property_map_added.len()),
            (TableId::MethodImpl, self.method_impls_added.len()),
        ];

        for (table, count) in counts {
            if count as u64 > u64::from(self.table_entries_added[table]) {
                return Err(invariant_error!(
                    "{} rows recorded as added to {:?} but the table only grew by {}",
                    count,
                    table,
                    self.table_entries_added[table]
                ));
            }
        }
        Ok(())
    }

    /// Generation ordinal; 0 for the original module.
    #[must_use]
    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    /// Id of this generation; zero for the original module.
    #[must_use]
    pub fn enc_id(&self) -> Guid {
        self.enc_id
    }

    /// Id of the previous generation.
    #[must_use]
    pub fn enc_base_id(&self) -> Guid {
        self.enc_base_id
    }

    /// The original module.
    #[must_use]
    pub fn module(&self) -> &Arc<ModuleMetadata> {
        &self.module
    }

    /// The compilation whose symbols key this baseline's maps.
    #[must_use]
    pub fn compilation(&self) -> &Arc<Compilation> {
        &self.compilation
    }

    /// Row counts of every table after this generation.
    #[must_use]
    pub fn table_sizes(&self) -> TableSizes {
        self.module.table_sizes().plus(&self.table_entries_added)
    }

    /// Rows added to every table by all deltas so far.
    #[must_use]
    pub fn table_entries_added(&self) -> &TableSizes {
        &self.table_entries_added
    }

    /// Offsets at which the next delta's heaps start.
    #[must_use]
    pub fn heap_starts(&self) -> HeapSizes {
        self.module.heap_sizes().plus(&self.heap_lengths_added)
    }

    /// Returns the `MethodDef` row an earlier delta added for `method`.
    #[must_use]
    pub fn added_method_row(&self, method: SymbolId) -> Option<u32> {
        self.methods_added.get(&method).copied()
    }

    /// Returns the `TypeDef` row an earlier delta added for `symbol`.
    #[must_use]
    pub fn added_type_row(&self, symbol: SymbolId) -> Option<u32> {
        self.types_added.get(&symbol).copied()
    }

    /// Returns the body record of the method at `row`, if a delta emitted one.
    #[must_use]
    pub fn added_or_changed_method(&self, row: u32) -> Option<&AddedOrChangedMethodInfo> {
        self.added_or_changed_methods.get(&row)
    }

    /// Returns the `CustomAttribute` rows deltas added for `parent`.
    #[must_use]
    pub fn custom_attributes_added(&self, parent: Token) -> &[u32] {
        self.custom_attributes_added
            .get(&parent)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns the members deleted from `container` so far.
    #[must_use]
    pub fn deleted_members(&self, container: SymbolId) -> &[SymbolId] {
        self.deleted_members
            .get(&container)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

impl fmt::Debug for EmitBaseline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmitBaseline")
            .field("ordinal", &self.ordinal)
            .field("enc_id", &self.enc_id)
            .field("enc_base_id", &self.enc_base_id)
            .field("module", &self.module.name())
            .field("table_entries_added", &self.table_entries_added)
            .field("heap_lengths_added", &self.heap_lengths_added)
            .field("methods", &self.added_or_changed_methods.len())
            .finish()
    }
}
