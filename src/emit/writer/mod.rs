//! Delta metadata writer.
//!
//! [`DeltaMetadataWriter`] turns the classified changes of one generation into a
//! [`MetadataDelta`]: the rows of every table the delta touches, the `EncLog` and `EncMap`
//! tables, the four heap deltas and the IL stream.
//!
//! # Architecture
//!
//! Emission runs in fixed phases, each appending to the shared heap builders:
//!
//! ## Phase 1: Row Allocation
//! The types of the compilation are walked in declaration order. Every definition that
//! changed either re-emits its existing row or gets a new row following the previous
//! generation's last row. See `traversal`.
//!
//! ## Phase 2: Method Bodies
//! Bodies of added and updated methods are requested from the code generator, together
//! with a slot allocator for methods whose variables survive the edit. Token operands are
//! patched, local signatures serialized, and headers chosen. See `bodies`.
//!
//! ## Phase 3: Definition Rows
//! `TypeDef`, `Field`, `MethodDef`, `Param`, `Property`, `Event`, their map tables,
//! generic parameters, `NestedClass`, `MethodImpl` and `MethodSemantics` rows are written
//! from the frozen indices. Reference rows are appended on demand while signatures are
//! encoded.
//!
//! ## Phase 4: Custom Attributes
//! Attribute rows of every emitted definition are merged with the rows the parent already
//! owns. See `attributes`.
//!
//! ## Phase 5: Module Row and EnC Tables
//! The module row carries the generation and the EnC ids; the `EncLog` lists every row
//! in dependency order and the `EncMap` is derived from it. See `enctables`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use uguid::Guid;

use crate::{
    emit::{
        baseline::{AddedOrChangedMethodInfo, BaselineUpdate},
        cancel::CancellationToken,
        changes::SymbolChanges,
        definitionmap::DefinitionMap,
        deleted::DefinitionKey,
        index::ReferenceIndex,
        options::EmitOptions,
        MethodBodyProvider,
    },
    metadata::{
        body::IlStreamBuilder,
        diagnostics::{Diagnostic, DiagnosticCode, Diagnostics},
        heaps::{DeltaHeaps, HeapBuilders},
        signatures::{
            encode_field_signature, encode_method_instantiation, encode_method_signature,
            encode_property_signature, encode_type_spec, TypeTokenResolver,
        },
        tables::{
            rows::{
                AssemblyRefRow, CustomAttributeRow, EventMapRow, EventRow, FieldRow,
                GenericParamConstraintRow, GenericParamRow, MemberRefRow, MethodDefRow,
                MethodImplRow, MethodSemanticsRow, MethodSpecRow, ModuleRefRow, ModuleRow,
                NestedClassRow, ParamRow, PropertyMapRow, PropertyRow, StandAloneSigRow,
                TypeDefRow, TypeRefRow, TypeSpecRow,
            },
            EncLogRow, EncMap, TableId, TableSizes,
        },
        token::Token,
    },
    symbols::{
        names::replaced_type_name,
        types::{ExternalType, MemberReference, MemberSignature, ResolutionScope, TypeRef},
        Compilation, GenericParameter, MethodSemanticsAttributes, SymbolData, SymbolId,
        SymbolKind,
    },
    Error, Result,
};

mod attributes;
mod bodies;
mod enctables;
mod traversal;

pub use enctables::populate_enc_tables;

use traversal::{DefinitionIndices, Traversal};

/// Rows carried by a delta, table by table, each sorted by row id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeltaTables {
    /// The rewritten module row
    pub module: Option<ModuleRow>,
    /// `AssemblyRef` rows
    pub assembly_refs: Vec<AssemblyRefRow>,
    /// `ModuleRef` rows
    pub module_refs: Vec<ModuleRefRow>,
    /// `TypeRef` rows
    pub type_refs: Vec<TypeRefRow>,
    /// `TypeDef` rows
    pub type_defs: Vec<TypeDefRow>,
    /// `Field` rows
    pub fields: Vec<FieldRow>,
    /// `MethodDef` rows
    pub methods: Vec<MethodDefRow>,
    /// `Param` rows
    pub params: Vec<ParamRow>,
    /// `MemberRef` rows
    pub member_refs: Vec<MemberRefRow>,
    /// `CustomAttribute` rows, tombstones included
    pub custom_attributes: Vec<CustomAttributeRow>,
    /// `StandAloneSig` rows
    pub stand_alone_sigs: Vec<StandAloneSigRow>,
    /// `EventMap` rows
    pub event_maps: Vec<EventMapRow>,
    /// `Event` rows
    pub events: Vec<EventRow>,
    /// `PropertyMap` rows
    pub property_maps: Vec<PropertyMapRow>,
    /// `Property` rows
    pub properties: Vec<PropertyRow>,
    /// `MethodSemantics` rows
    pub method_semantics: Vec<MethodSemanticsRow>,
    /// `MethodImpl` rows
    pub method_impls: Vec<MethodImplRow>,
    /// `TypeSpec` rows
    pub type_specs: Vec<TypeSpecRow>,
    /// `NestedClass` rows
    pub nested_classes: Vec<NestedClassRow>,
    /// `GenericParam` rows
    pub generic_params: Vec<GenericParamRow>,
    /// `MethodSpec` rows
    pub method_specs: Vec<MethodSpecRow>,
    /// `GenericParamConstraint` rows
    pub generic_param_constraints: Vec<GenericParamConstraintRow>,
}

impl DeltaTables {
    /// Returns the number of rows carried per table.
    #[must_use]
    pub fn row_counts(&self) -> TableSizes {
        let mut sizes = TableSizes::new();
        sizes[TableId::Module] = u32::from(self.module.is_some());
        sizes[TableId::AssemblyRef] = self.assembly_refs.len() as u32;
        sizes[TableId::ModuleRef] = self.module_refs.len() as u32;
        sizes[TableId::TypeRef] = self.type_refs.len() as u32;
        sizes[TableId::TypeDef] = self.type_defs.len() as u32;
        sizes[TableId::Field] = self.fields.len() as u32;
        sizes[TableId::MethodDef] = self.methods.len() as u32;
        sizes[TableId::Param] = self.params.len() as u32;
        sizes[TableId::MemberRef] = self.member_refs.len() as u32;
        sizes[TableId::CustomAttribute] = self.custom_attributes.len() as u32;
        sizes[TableId::StandAloneSig] = self.stand_alone_sigs.len() as u32;
        sizes[TableId::EventMap] = self.event_maps.len() as u32;
        sizes[TableId::Event] = self.events.len() as u32;
        sizes[TableId::PropertyMap] = self.property_maps.len() as u32;
        sizes[TableId::Property] = self.properties.len() as u32;
        sizes[TableId::MethodSemantics] = self.method_semantics.len() as u32;
        sizes[TableId::MethodImpl] = self.method_impls.len() as u32;
        sizes[TableId::TypeSpec] = self.type_specs.len() as u32;
        sizes[TableId::NestedClass] = self.nested_classes.len() as u32;
        sizes[TableId::GenericParam] = self.generic_params.len() as u32;
        sizes[TableId::MethodSpec] = self.method_specs.len() as u32;
        sizes[TableId::GenericParamConstraint] = self.generic_param_constraints.len() as u32;
        sizes
    }
}

/// The metadata delta of one generation.
#[derive(Clone, Debug)]
pub struct MetadataDelta {
    /// Generation ordinal, 1 for the first delta
    pub generation: u32,
    /// EnC id of this generation
    pub enc_id: Guid,
    /// EnC id of the generation this delta applies to
    pub enc_base_id: Guid,
    /// Table rows
    pub tables: DeltaTables,
    /// Operation log, in application order
    pub enc_log: Vec<EncLogRow>,
    /// Sorted token map
    pub enc_map: EncMap,
    /// Heap deltas
    pub heaps: DeltaHeaps,
    /// IL stream; RVAs of `MethodDef` rows are offsets into it
    pub il: Vec<u8>,
    /// Rows carried per table
    pub table_sizes: TableSizes,
}

/// Everything one run of the writer produces.
#[derive(Debug)]
pub struct WrittenDelta {
    /// The delta itself
    pub delta: MetadataDelta,
    /// What the next baseline has to record
    pub update: BaselineUpdate,
    /// `MethodDef` tokens of re-emitted methods, deleted shims included
    pub updated_methods: Vec<Token>,
    /// `TypeDef` tokens of every type the delta touches
    pub changed_types: Vec<Token>,
}

/// Writes the delta of one generation.
pub struct DeltaMetadataWriter<'w, 'a> {
    map: &'w DefinitionMap<'a>,
    changes: &'w SymbolChanges<'w>,
    compilation: Arc<Compilation>,
    options: &'w EmitOptions,
    diagnostics: &'w Diagnostics,
    cancellation: &'w CancellationToken,
    generation: u32,
    previous_sizes: TableSizes,
    indices: DefinitionIndices,
    heaps: HeapBuilders,
    il: IlStreamBuilder,
    tables: DeltaTables,
    assembly_refs: ReferenceIndex<String>,
    module_refs: ReferenceIndex<String>,
    type_refs: ReferenceIndex<ExternalType>,
    type_specs: ReferenceIndex<TypeRef>,
    member_refs: ReferenceIndex<(Token, String, Vec<u8>)>,
    method_specs: ReferenceIndex<(Token, Vec<u8>)>,
    stand_alone_sigs: ReferenceIndex<Vec<u8>>,
    method_rvas: HashMap<DefinitionKey, u32>,
    added_or_changed_methods: HashMap<u32, AddedOrChangedMethodInfo>,
    custom_attributes_added: HashMap<Token, Vec<u32>>,
    custom_attributes_appended: u32,
}

impl<'w, 'a> DeltaMetadataWriter<'w, 'a> {
    /// Allocates the rows of the delta.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RowNotFound`] if a re-emitted definition has no previous row,
    /// [`Error::Invariant`] for inconsistent row allocation and [`Error::Cancelled`] once
    /// `cancellation` fires.
    pub fn new(
        map: &'w DefinitionMap<'a>,
        changes: &'w SymbolChanges<'w>,
        options: &'w EmitOptions,
        diagnostics: &'w Diagnostics,
        cancellation: &'w CancellationToken,
    ) -> Result<Self> {
        let indices = Traversal::new(map, changes, options, cancellation).run()?;
        let previous = map.previous();
        let sizes = previous.table_sizes();

        Ok(DeltaMetadataWriter {
            map,
            changes,
            compilation: map.compilation().clone(),
            options,
            diagnostics,
            cancellation,
            generation: previous.ordinal() + 1,
            previous_sizes: sizes,
            indices,
            heaps: HeapBuilders::new(previous.heap_starts()),
            il: IlStreamBuilder::new(),
            tables: DeltaTables::default(),
            assembly_refs: ReferenceIndex::new(sizes[TableId::AssemblyRef]),
            module_refs: ReferenceIndex::new(sizes[TableId::ModuleRef]),
            type_refs: ReferenceIndex::new(sizes[TableId::TypeRef]),
            type_specs: ReferenceIndex::new(sizes[TableId::TypeSpec]),
            member_refs: ReferenceIndex::new(sizes[TableId::MemberRef]),
            method_specs: ReferenceIndex::new(sizes[TableId::MethodSpec]),
            stand_alone_sigs: ReferenceIndex::new(sizes[TableId::StandAloneSig]),
            method_rvas: HashMap::new(),
            added_or_changed_methods: HashMap::new(),
            custom_attributes_added: HashMap::new(),
            custom_attributes_appended: 0,
        })
    }

    /// Runs the remaining phases and assembles the delta.
    ///
    /// # Errors
    ///
    /// Propagates body generation and signature encoding failures, returns
    /// [`Error::Invariant`] if the `EncMap` would contain a token twice and
    /// [`Error::Cancelled`] once cancellation was requested.
    pub fn write(mut self, bodies: &dyn MethodBodyProvider) -> Result<WrittenDelta> {
        self.write_method_bodies(bodies)?;
        self.cancellation.check()?;

        self.write_type_defs()?;
        self.write_fields()?;
        self.write_methods()?;
        self.write_params()?;
        self.write_events()?;
        self.write_properties()?;
        self.write_generic_params()?;
        self.write_nested_classes();
        self.write_method_impls()?;
        self.write_method_semantics()?;
        self.write_custom_attributes()?;

        let previous = self.map.previous();
        let enc_id = previous.next_enc_id();
        let enc_base_id = previous.enc_id();
        self.write_module(enc_id, enc_base_id)?;

        let table_entries_added = self.table_entries_added();
        let (enc_log, enc_map) = populate_enc_tables(&self.tables, &self.indices.parents)?;
        if self.options.validate_enc_map() {
            enctables::validate_enc_map(
                &enc_map,
                &self.previous_sizes.plus(&table_entries_added),
            )?;
        }

        let updated_methods = self
            .indices
            .methods
            .entries()
            .filter(|entry| !entry.added)
            .map(|entry| Token::from_parts(TableId::MethodDef, entry.row))
            .collect();
        let mut changed_types: Vec<Token> = self
            .indices
            .changed_types
            .iter()
            .map(|row| Token::from_parts(TableId::TypeDef, *row))
            .collect();
        changed_types.sort_unstable();
        changed_types.dedup();

        let heap_lengths_added = self.heaps.sizes();
        let update = self.baseline_update(table_entries_added, heap_lengths_added);
        let table_sizes = self.tables.row_counts();

        tracing::debug!(
            generation = self.generation,
            enc_log = enc_log.len(),
            enc_map = enc_map.len(),
            il = self.il.len(),
            "wrote metadata delta"
        );

        Ok(WrittenDelta {
            delta: MetadataDelta {
                generation: self.generation,
                enc_id,
                enc_base_id,
                tables: self.tables,
                enc_log,
                enc_map,
                heaps: self.heaps.into_heaps(),
                il: self.il.into_bytes(),
                table_sizes,
            },
            update,
            updated_methods,
            changed_types,
        })
    }

    fn table_entries_added(&self) -> TableSizes {
        let indices = &self.indices;
        let mut sizes = TableSizes::new();
        sizes[TableId::AssemblyRef] = self.assembly_refs.len();
        sizes[TableId::ModuleRef] = self.module_refs.len();
        sizes[TableId::TypeRef] = self.type_refs.len();
        sizes[TableId::TypeSpec] = self.type_specs.len();
        sizes[TableId::MemberRef] = self.member_refs.len();
        sizes[TableId::MethodSpec] = self.method_specs.len();
        sizes[TableId::StandAloneSig] = self.stand_alone_sigs.len();
        sizes[TableId::TypeDef] = indices.type_defs.added_count();
        sizes[TableId::Field] = indices.fields.added_count();
        sizes[TableId::MethodDef] = indices.methods.added_count();
        sizes[TableId::Param] = indices.params.added_count();
        sizes[TableId::Property] = indices.properties.added_count();
        sizes[TableId::Event] = indices.events.added_count();
        sizes[TableId::EventMap] = indices.event_maps.added_count();
        sizes[TableId::PropertyMap] = indices.property_maps.added_count();
        sizes[TableId::GenericParam] = indices.generic_params.added_count();
        sizes[TableId::MethodImpl] = indices.method_impls.added_count();
        sizes[TableId::CustomAttribute] = self.custom_attributes_appended;
        sizes[TableId::MethodSemantics] = self.tables.method_semantics.len() as u32;
        sizes[TableId::NestedClass] = self.tables.nested_classes.len() as u32;
        sizes[TableId::GenericParamConstraint] = self.tables.generic_param_constraints.len() as u32;
        sizes
    }

    fn baseline_update(
        &mut self,
        table_entries_added: TableSizes,
        heap_lengths_added: crate::metadata::heaps::HeapSizes,
    ) -> BaselineUpdate {
        fn added<K: Clone + Eq + std::hash::Hash>(
            index: &crate::emit::index::DefinitionIndex<K>,
        ) -> HashMap<K, u32> {
            index
                .added()
                .map(|entry| (entry.key.clone(), entry.row))
                .collect()
        }

        let mapped = self.map.mapped_baseline();
        let mut deleted_members = mapped.deleted_members.clone();
        for (container, members) in self.changes.all_deleted_members() {
            let recorded = deleted_members.entry(*container).or_default();
            for member in members {
                if !recorded.contains(member) {
                    recorded.push(*member);
                }
            }
        }

        BaselineUpdate {
            types_added: added(&self.indices.type_defs),
            events_added: added(&self.indices.events),
            fields_added: added(&self.indices.fields),
            methods_added: self
                .indices
                .methods
                .added()
                .filter_map(|entry| match entry.key {
                    DefinitionKey::Current(method) => Some((method, entry.row)),
                    DefinitionKey::Deleted(_) => None,
                })
                .collect(),
            properties_added: added(&self.indices.properties),
            event_map_added: added(&self.indices.event_maps),
            property_map_added: added(&self.indices.property_maps),
            method_impls_added: added(&self.indices.method_impls),
            first_param_rows: std::mem::take(&mut self.indices.first_param_rows),
            custom_attributes_added: std::mem::take(&mut self.custom_attributes_added),
            table_entries_added,
            heap_lengths_added,
            added_or_changed_methods: std::mem::take(&mut self.added_or_changed_methods),
            synthesized_types: mapped.synthesized_types.clone(),
            synthesized_members: mapped.synthesized_members.clone(),
            deleted_members,
        }
    }

    fn write_module(&mut self, enc_id: Guid, enc_base_id: Guid) -> Result<()> {
        let module = self.map.module();
        let generation = u16::try_from(self.generation)
            .map_err(|_| malformed_error!("Generation {} exceeds the module row", self.generation))?;
        self.tables.module = Some(ModuleRow {
            generation,
            name: self.heaps.strings.add(module.name()),
            mvid: self.heaps.guids.add(module.mvid()),
            enc_id: self.heaps.guids.add(enc_id),
            enc_base_id: self.heaps.guids.add(enc_base_id),
        });
        Ok(())
    }

    fn write_type_defs(&mut self) -> Result<()> {
        let compilation = self.compilation.clone();
        let entries: Vec<_> = self.indices.type_defs.entries().cloned().collect();
        for entry in entries {
            let symbol = compilation.symbol(entry.key)?;
            let Some(data) = symbol.as_type() else {
                return Err(Error::SymbolNotFound(format!("{} is not a type", entry.key)));
            };

            let name = if self.changes.is_replaced(entry.key) {
                replaced_type_name(&symbol.name, self.generation)
            } else {
                symbol.name.clone()
            };
            let is_nested = symbol
                .container
                .and_then(|container| compilation.get(container))
                .is_some_and(|container| container.kind() == SymbolKind::Type);
            let namespace = if is_nested {
                String::new()
            } else {
                compilation.namespace_name(entry.key)
            };
            let extends = match &data.base {
                Some(base) => self.resolve_type(base)?,
                None => Token::NULL,
            };

            self.tables.type_defs.push(TypeDefRow {
                rid: entry.row,
                flags: data.flags.bits(),
                name: self.heaps.strings.add(&name),
                namespace: self.heaps.strings.add(&namespace),
                extends,
            });
        }
        Ok(())
    }

    fn write_fields(&mut self) -> Result<()> {
        let compilation = self.compilation.clone();
        let entries: Vec<_> = self.indices.fields.entries().cloned().collect();
        for entry in entries {
            let symbol = compilation.symbol(entry.key)?;
            let Some(data) = symbol.as_field() else {
                return Err(Error::SymbolNotFound(format!("{} is not a field", entry.key)));
            };
            let signature = encode_field_signature(&data.field_type, self)?;
            self.tables.fields.push(FieldRow {
                rid: entry.row,
                flags: data.flags.bits(),
                name: self.heaps.strings.add(&symbol.name),
                signature: self.heaps.blobs.add(&signature),
            });
        }
        Ok(())
    }

    fn write_methods(&mut self) -> Result<()> {
        let compilation = self.compilation.clone();
        let entries: Vec<_> = self.indices.methods.entries().cloned().collect();
        for entry in entries {
            let rva = self.method_rvas.get(&entry.key).copied().unwrap_or(0);
            let row = match entry.key {
                DefinitionKey::Current(method) => {
                    let symbol = compilation.symbol(method)?;
                    let data = compilation.method(method)?;
                    let signature = encode_method_signature(&data.signature, self)?;
                    MethodDefRow {
                        rid: entry.row,
                        rva,
                        impl_flags: data.impl_flags.bits(),
                        flags: data.flags.bits(),
                        name: self.heaps.strings.add(&symbol.name),
                        signature: self.heaps.blobs.add(&signature),
                    }
                }
                DefinitionKey::Deleted(old) => {
                    let shim = self.deleted_method(old)?;
                    let signature = encode_method_signature(&shim.signature, self)?;
                    MethodDefRow {
                        rid: entry.row,
                        rva,
                        impl_flags: shim.impl_flags.bits(),
                        flags: shim.flags.bits(),
                        name: self.heaps.strings.add(&shim.name),
                        signature: self.heaps.blobs.add(&signature),
                    }
                }
            };
            self.tables.methods.push(row);
        }
        Ok(())
    }

    fn write_params(&mut self) -> Result<()> {
        let compilation = self.compilation.clone();
        let entries: Vec<_> = self.indices.params.entries().cloned().collect();
        for entry in entries {
            let parameters = match entry.key.method {
                DefinitionKey::Current(method) => compilation.method(method)?.parameters.clone(),
                DefinitionKey::Deleted(old) => self.deleted_method(old)?.parameters.clone(),
            };
            let Some(parameter) = parameters
                .iter()
                .find(|parameter| parameter.sequence == entry.key.sequence)
            else {
                return Err(invariant_error!(
                    "Param row {} has no parameter with sequence {}",
                    entry.row,
                    entry.key.sequence
                ));
            };
            self.tables.params.push(ParamRow {
                rid: entry.row,
                flags: parameter.flags.bits(),
                sequence: parameter.sequence,
                name: self.heaps.strings.add(&parameter.name),
            });
        }
        Ok(())
    }

    fn write_events(&mut self) -> Result<()> {
        for entry in self.indices.event_maps.entries() {
            self.tables.event_maps.push(EventMapRow {
                rid: entry.row,
                parent: entry.key,
            });
        }

        let compilation = self.compilation.clone();
        let entries: Vec<_> = self.indices.events.entries().cloned().collect();
        for entry in entries {
            let symbol = compilation.symbol(entry.key)?;
            let Some(data) = symbol.as_event() else {
                return Err(Error::SymbolNotFound(format!("{} is not an event", entry.key)));
            };
            let event_type = self.resolve_type(&data.event_type)?;
            self.tables.events.push(EventRow {
                rid: entry.row,
                flags: data.flags.bits(),
                name: self.heaps.strings.add(&symbol.name),
                event_type,
            });
        }
        Ok(())
    }

    fn write_properties(&mut self) -> Result<()> {
        for entry in self.indices.property_maps.entries() {
            self.tables.property_maps.push(PropertyMapRow {
                rid: entry.row,
                parent: entry.key,
            });
        }

        let compilation = self.compilation.clone();
        let entries: Vec<_> = self.indices.properties.entries().cloned().collect();
        for entry in entries {
            let symbol = compilation.symbol(entry.key)?;
            let Some(data) = symbol.as_property() else {
                return Err(Error::SymbolNotFound(format!("{} is not a property", entry.key)));
            };
            let signature = encode_property_signature(&data.signature, self)?;
            self.tables.properties.push(PropertyRow {
                rid: entry.row,
                flags: data.flags.bits(),
                name: self.heaps.strings.add(&symbol.name),
                signature: self.heaps.blobs.add(&signature),
            });
        }
        Ok(())
    }

    fn write_generic_params(&mut self) -> Result<()> {
        let compilation = self.compilation.clone();
        let mut next_constraint = self.previous_sizes[TableId::GenericParamConstraint];
        let entries: Vec<_> = self.indices.generic_params.entries().cloned().collect();
        for entry in entries {
            let owner = compilation.symbol(entry.key.owner)?;
            let (parameters, owner_token): (&[GenericParameter], Token) = match &owner.data {
                SymbolData::Type(data) => (
                    &data.generic_parameters,
                    Token::from_parts(TableId::TypeDef, self.type_def_row(owner.id)?),
                ),
                SymbolData::Method(data) => (
                    &data.generic_parameters,
                    Token::from_parts(TableId::MethodDef, self.method_row(owner.id)?),
                ),
                _ => {
                    return Err(malformed_error!(
                        "{} cannot own generic parameters",
                        compilation.qualified_name(owner.id)
                    ))
                }
            };
            let Some(parameter) = parameters
                .iter()
                .find(|parameter| parameter.number == entry.key.number)
            else {
                return Err(invariant_error!(
                    "GenericParam row {} has no parameter number {}",
                    entry.row,
                    entry.key.number
                ));
            };

            self.tables.generic_params.push(GenericParamRow {
                rid: entry.row,
                number: parameter.number,
                flags: parameter.flags.bits(),
                owner: owner_token,
                name: self.heaps.strings.add(&parameter.name),
            });

            for constraint in &parameter.constraints {
                next_constraint += 1;
                let constraint = self.resolve_type(constraint)?;
                self.tables
                    .generic_param_constraints
                    .push(GenericParamConstraintRow {
                        rid: next_constraint,
                        owner: entry.row,
                        constraint,
                    });
            }
        }
        Ok(())
    }

    fn write_nested_classes(&mut self) {
        let first = self.previous_sizes[TableId::NestedClass] + 1;
        for (offset, (nested, enclosing)) in self.indices.nested_classes.iter().enumerate() {
            self.tables.nested_classes.push(NestedClassRow {
                rid: first + offset as u32,
                nested: *nested,
                enclosing: *enclosing,
            });
        }
    }

    fn write_method_impls(&mut self) -> Result<()> {
        let compilation = self.compilation.clone();
        let entries: Vec<_> = self.indices.method_impls.entries().cloned().collect();
        for entry in entries {
            let Some((method, position)) = self.indices.method_impl_targets.get(&entry.key).copied()
            else {
                return Err(invariant_error!("MethodImpl row {} has no target", entry.row));
            };
            let Some(declaration) = compilation.method(method)?.implements.get(position) else {
                return Err(invariant_error!(
                    "MethodImpl row {} refers to a missing implementation",
                    entry.row
                ));
            };
            let class = compilation
                .containing_type(method)
                .ok_or_else(|| Error::SymbolNotFound(format!("Declaring type of {}", method)))?;

            let declaration = self.resolve_member(declaration)?;
            self.tables.method_impls.push(MethodImplRow {
                rid: entry.row,
                class: self.type_def_row(class)?,
                body: Token::from_parts(TableId::MethodDef, entry.key.row),
                declaration,
            });
        }
        Ok(())
    }

    /// Accessors of added properties and events, and added accessors of existing ones.
    fn write_method_semantics(&mut self) -> Result<()> {
        let compilation = self.compilation.clone();
        let mut associations: Vec<SymbolId> = self
            .indices
            .properties
            .added()
            .chain(self.indices.events.added())
            .map(|entry| entry.key)
            .collect();
        for entry in self.indices.methods.added() {
            if let DefinitionKey::Current(method) = entry.key {
                if let Some(association) = compilation.method(method)?.association {
                    associations.push(association);
                }
            }
        }

        let mut seen = HashSet::new();
        let mut next_row = self.previous_sizes[TableId::MethodSemantics];
        for association in associations {
            let symbol = compilation.symbol(association)?;
            let association_added = self.changes.is_added(association);
            let (token, accessors) = match &symbol.data {
                SymbolData::Property(data) => (
                    Token::from_parts(TableId::Property, self.property_row(association)?),
                    vec![
                        (data.getter, MethodSemanticsAttributes::GETTER),
                        (data.setter, MethodSemanticsAttributes::SETTER),
                    ],
                ),
                SymbolData::Event(data) => (
                    Token::from_parts(TableId::Event, self.event_row(association)?),
                    vec![
                        (data.adder, MethodSemanticsAttributes::ADD_ON),
                        (data.remover, MethodSemanticsAttributes::REMOVE_ON),
                        (data.raiser, MethodSemanticsAttributes::FIRE),
                    ],
                ),
                _ => continue,
            };

            for (accessor, semantics) in accessors {
                let Some(accessor) = accessor else {
                    continue;
                };
                if !association_added && !self.changes.is_added(accessor) {
                    continue;
                }
                let method = self.method_row(accessor)?;
                if !seen.insert((method, token)) {
                    continue;
                }
                next_row += 1;
                self.tables.method_semantics.push(MethodSemanticsRow {
                    rid: next_row,
                    semantics: semantics.bits(),
                    method,
                    association: token,
                });
            }
        }
        Ok(())
    }

    fn deleted_method(
        &self,
        old: SymbolId,
    ) -> Result<std::rc::Rc<crate::emit::deleted::DeletedMethodDefinition>> {
        self.indices
            .deleted
            .get_method(old)
            .cloned()
            .ok_or_else(|| invariant_error!("No shim was created for deleted method {}", old))
    }

    fn type_def_row(&self, symbol: SymbolId) -> Result<u32> {
        self.indices
            .type_defs
            .get(&symbol)
            .or_else(|| self.map.try_get_type_row(symbol))
            .ok_or_else(|| self.row_not_found("TypeDef", symbol))
    }

    fn method_row(&self, symbol: SymbolId) -> Result<u32> {
        self.indices
            .methods
            .get(&DefinitionKey::Current(symbol))
            .or_else(|| self.map.try_get_method_row(symbol))
            .ok_or_else(|| self.row_not_found("MethodDef", symbol))
    }

    fn field_row(&self, symbol: SymbolId) -> Result<u32> {
        self.indices
            .fields
            .get(&symbol)
            .or_else(|| self.map.try_get_field_row(symbol))
            .ok_or_else(|| self.row_not_found("Field", symbol))
    }

    fn property_row(&self, symbol: SymbolId) -> Result<u32> {
        self.indices
            .properties
            .get(&symbol)
            .or_else(|| self.map.try_get_property_row(symbol))
            .ok_or_else(|| self.row_not_found("Property", symbol))
    }

    fn event_row(&self, symbol: SymbolId) -> Result<u32> {
        self.indices
            .events
            .get(&symbol)
            .or_else(|| self.map.try_get_event_row(symbol))
            .ok_or_else(|| self.row_not_found("Event", symbol))
    }

    fn row_not_found(&self, table: &str, symbol: SymbolId) -> Error {
        Error::RowNotFound(format!(
            "{} of {}",
            table,
            self.compilation.qualified_name(symbol)
        ))
    }

    fn resolution_scope(&mut self, scope: &ResolutionScope) -> Token {
        match scope {
            ResolutionScope::Assembly(name) => {
                let (row, is_new) = self.assembly_refs.get_or_add(name.clone());
                if is_new {
                    let name = self.heaps.strings.add(name);
                    self.tables.assembly_refs.push(AssemblyRefRow { rid: row, name });
                }
                Token::from_parts(TableId::AssemblyRef, row)
            }
            ResolutionScope::Module(name) => {
                let (row, is_new) = self.module_refs.get_or_add(name.clone());
                if is_new {
                    let name = self.heaps.strings.add(name);
                    self.tables.module_refs.push(ModuleRefRow { rid: row, name });
                }
                Token::from_parts(TableId::ModuleRef, row)
            }
        }
    }

    fn member_ref(&mut self, class: Token, name: &str, signature: Vec<u8>) -> Token {
        let (row, is_new) = self
            .member_refs
            .get_or_add((class, name.to_string(), signature.clone()));
        if is_new {
            let name = self.heaps.strings.add(name);
            let signature = self.heaps.blobs.add(&signature);
            self.tables.member_refs.push(MemberRefRow {
                rid: row,
                class,
                name,
                signature,
            });
        }
        Token::from_parts(TableId::MemberRef, row)
    }

    /// Returns the token an IL operand or attribute constructor refers to, appending
    /// reference rows and user strings as needed.
    pub(crate) fn resolve_member(&mut self, member: &MemberReference) -> Result<Token> {
        match member {
            MemberReference::Method(method) => Ok(Token::from_parts(
                TableId::MethodDef,
                self.method_row(*method)?,
            )),
            MemberReference::Field(field) => {
                Ok(Token::from_parts(TableId::Field, self.field_row(*field)?))
            }
            MemberReference::Type(reference) => self.resolve_type(reference),
            MemberReference::External(external) => {
                let class = self.resolve_type(&external.parent)?;
                let signature = match &external.signature {
                    MemberSignature::Method(signature) => encode_method_signature(signature, self)?,
                    MemberSignature::Field(field_type) => encode_field_signature(field_type, self)?,
                };
                Ok(self.member_ref(class, &external.name, signature))
            }
            MemberReference::MemberOfGeneric { parent, member } => {
                let compilation = self.compilation.clone();
                let symbol = compilation.symbol(*member)?;
                let class = self.resolve_type(parent)?;
                let signature = match &symbol.data {
                    SymbolData::Method(data) => encode_method_signature(&data.signature, self)?,
                    SymbolData::Field(data) => encode_field_signature(&data.field_type, self)?,
                    _ => {
                        return Err(malformed_error!(
                            "{} cannot be referenced through {}",
                            compilation.qualified_name(*member),
                            parent
                        ))
                    }
                };
                let token = self.member_ref(class, &symbol.name, signature);

                if self.changes.is_added(*member) {
                    self.diagnostics.push(
                        Diagnostic::from_code(
                            DiagnosticCode::EncReferenceToAddedMember,
                            format!(
                                "{} was added in this edit and cannot be referenced through {}",
                                compilation.qualified_name(*member),
                                parent
                            ),
                        )
                        .with_symbol(*member)
                        .with_token(token),
                    );
                }
                Ok(token)
            }
            MemberReference::MethodInstance { method, arguments } => {
                let method = self.resolve_member(method)?;
                let instantiation = encode_method_instantiation(arguments, self)?;
                let (row, is_new) = self
                    .method_specs
                    .get_or_add((method, instantiation.clone()));
                if is_new {
                    let instantiation = self.heaps.blobs.add(&instantiation);
                    self.tables.method_specs.push(MethodSpecRow {
                        rid: row,
                        method,
                        instantiation,
                    });
                }
                Ok(Token::from_parts(TableId::MethodSpec, row))
            }
            MemberReference::String(value) => {
                Ok(Token::user_string(self.heaps.user_strings.add(value)?))
            }
        }
    }
}

impl TypeTokenResolver for DeltaMetadataWriter<'_, '_> {
    fn resolve_type(&mut self, reference: &TypeRef) -> Result<Token> {
        match reference {
            TypeRef::Definition(id) if self.compilation.contains(*id) => Ok(Token::from_parts(
                TableId::TypeDef,
                self.type_def_row(*id)?,
            )),
            TypeRef::Definition(id) if self.map.previous_compilation().contains(*id) => {
                let shim = self.indices.deleted.type_definition(*id, self.map)?;
                Ok(shim.token())
            }
            TypeRef::Definition(id) => Err(Error::SymbolNotFound(format!(
                "{} belongs to neither the current nor the previous compilation",
                id
            ))),
            TypeRef::External(external) => {
                let (row, is_new) = self.type_refs.get_or_add(external.clone());
                if is_new {
                    let resolution_scope = self.resolution_scope(&external.scope);
                    let name = self.heaps.strings.add(&external.name);
                    let namespace = self.heaps.strings.add(&external.namespace);
                    self.tables.type_refs.push(TypeRefRow {
                        rid: row,
                        resolution_scope,
                        name,
                        namespace,
                    });
                }
                Ok(Token::from_parts(TableId::TypeRef, row))
            }
            TypeRef::Primitive(primitive) => {
                let external = primitive.system_type(self.compilation.core_library());
                self.resolve_type(&TypeRef::External(external))
            }
            _ => {
                if let Some(row) = self.type_specs.get(reference) {
                    return Ok(Token::from_parts(TableId::TypeSpec, row));
                }
                let blob = encode_type_spec(reference, self)?;
                let (row, _) = self.type_specs.get_or_add(reference.clone());
                let signature = self.heaps.blobs.add(&blob);
                self.tables.type_specs.push(TypeSpecRow {
                    rid: row,
                    signature,
                });
                Ok(Token::from_parts(TableId::TypeSpec, row))
            }
        }
    }

    fn is_value_type(&self, reference: &TypeRef) -> bool {
        match reference {
            TypeRef::Definition(id) => self
                .compilation
                .get(*id)
                .or_else(|| self.map.previous_compilation().get(*id))
                .and_then(|symbol| symbol.as_type())
                .is_some_and(|data| data.is_value_type()),
            TypeRef::External(external) => external.is_value_type,
            TypeRef::Primitive(primitive) => primitive.is_value_type(),
            _ => false,
        }
    }
}
