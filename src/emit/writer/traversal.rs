//! Phase 1: row allocation.
//!
//! Walks the types of the current compilation in declaration order and decides, per
//! definition, whether it re-emits its existing row, gets a new row, or is skipped. The
//! result is a set of frozen [`DefinitionIndex`]es plus the bookkeeping the later phases
//! need: the `Add*` parent of every new row, `NestedClass` pairs and the explicit
//! implementations behind each new `MethodImpl` row.

use std::collections::HashMap;

use crate::{
    emit::{
        changes::{SymbolChange, SymbolChanges},
        cancel::CancellationToken,
        definitionmap::DefinitionMap,
        deleted::{DefinitionKey, DeletedDefinitions},
        index::{
            DefinitionIndex, DefinitionIndexBuilder, GenericParamKey, MethodImplKey, ParamKey,
        },
        options::EmitOptions,
    },
    metadata::{tables::TableId, token::Token},
    symbols::{GenericParameter, MethodData, Parameter, Symbol, SymbolData, SymbolId, SymbolKind},
    Error, Result,
};

/// Rows of the definition tables of one delta.
#[derive(Debug)]
pub(crate) struct DefinitionIndices {
    pub type_defs: DefinitionIndex<SymbolId>,
    pub fields: DefinitionIndex<SymbolId>,
    pub methods: DefinitionIndex<DefinitionKey>,
    pub params: DefinitionIndex<ParamKey>,
    pub properties: DefinitionIndex<SymbolId>,
    pub events: DefinitionIndex<SymbolId>,
    pub event_maps: DefinitionIndex<u32>,
    pub property_maps: DefinitionIndex<u32>,
    pub generic_params: DefinitionIndex<GenericParamKey>,
    pub method_impls: DefinitionIndex<MethodImplKey>,
    /// Implementing method and position in its `implements` list, per new `MethodImpl` row
    pub method_impl_targets: HashMap<MethodImplKey, (SymbolId, usize)>,
    /// `(nested, enclosing)` `TypeDef` rows of added nested types
    pub nested_classes: Vec<(u32, u32)>,
    /// First `Param` row of every added method with parameters
    pub first_param_rows: HashMap<u32, u32>,
    /// Parent token of the `Add*` `EncLog` entry preceding each new member row
    pub parents: HashMap<Token, Token>,
    /// Shims of the methods deleted in this generation
    pub deleted: DeletedDefinitions,
    /// `TypeDef` rows of every visited type, in visiting order
    pub changed_types: Vec<u32>,
}

/// Mutable state of the row allocation walk.
pub(crate) struct Traversal<'w, 'a> {
    map: &'w DefinitionMap<'a>,
    changes: &'w SymbolChanges<'w>,
    options: &'w EmitOptions,
    cancellation: &'w CancellationToken,
    type_defs: DefinitionIndexBuilder<SymbolId>,
    fields: DefinitionIndexBuilder<SymbolId>,
    methods: DefinitionIndexBuilder<DefinitionKey>,
    params: DefinitionIndexBuilder<ParamKey>,
    properties: DefinitionIndexBuilder<SymbolId>,
    events: DefinitionIndexBuilder<SymbolId>,
    event_maps: DefinitionIndexBuilder<u32>,
    property_maps: DefinitionIndexBuilder<u32>,
    generic_params: DefinitionIndexBuilder<GenericParamKey>,
    method_impls: DefinitionIndexBuilder<MethodImplKey>,
    method_impl_targets: HashMap<MethodImplKey, (SymbolId, usize)>,
    nested_classes: Vec<(u32, u32)>,
    first_param_rows: HashMap<u32, u32>,
    parents: HashMap<Token, Token>,
    deleted: DeletedDefinitions,
    changed_types: Vec<u32>,
}

impl<'w, 'a> Traversal<'w, 'a> {
    pub(crate) fn new(
        map: &'w DefinitionMap<'a>,
        changes: &'w SymbolChanges<'w>,
        options: &'w EmitOptions,
        cancellation: &'w CancellationToken,
    ) -> Self {
        let sizes = map.previous().table_sizes();
        Traversal {
            map,
            changes,
            options,
            cancellation,
            type_defs: DefinitionIndexBuilder::new(sizes[TableId::TypeDef]),
            fields: DefinitionIndexBuilder::new(sizes[TableId::Field]),
            methods: DefinitionIndexBuilder::new(sizes[TableId::MethodDef]),
            params: DefinitionIndexBuilder::new(sizes[TableId::Param]),
            properties: DefinitionIndexBuilder::new(sizes[TableId::Property]),
            events: DefinitionIndexBuilder::new(sizes[TableId::Event]),
            event_maps: DefinitionIndexBuilder::new(sizes[TableId::EventMap]),
            property_maps: DefinitionIndexBuilder::new(sizes[TableId::PropertyMap]),
            generic_params: DefinitionIndexBuilder::new(sizes[TableId::GenericParam]),
            method_impls: DefinitionIndexBuilder::new(sizes[TableId::MethodImpl]),
            method_impl_targets: HashMap::new(),
            nested_classes: Vec::new(),
            first_param_rows: HashMap::new(),
            parents: HashMap::new(),
            deleted: DeletedDefinitions::new(),
            changed_types: Vec::new(),
        }
    }

    /// Allocates every row of the delta.
    pub(crate) fn run(mut self) -> Result<DefinitionIndices> {
        let compilation = self.map.compilation().clone();
        for symbol in compilation.symbols().filter(|s| s.kind() == SymbolKind::Type) {
            self.cancellation.check()?;
            self.visit_type(symbol)?;
        }

        tracing::debug!(
            types = self.type_defs.added_count(),
            methods = self.methods.added_count(),
            fields = self.fields.added_count(),
            "allocated delta rows"
        );

        Ok(DefinitionIndices {
            type_defs: self.type_defs.freeze(),
            fields: self.fields.freeze(),
            methods: self.methods.freeze(),
            params: self.params.freeze(),
            properties: self.properties.freeze(),
            events: self.events.freeze(),
            event_maps: self.event_maps.freeze(),
            property_maps: self.property_maps.freeze(),
            generic_params: self.generic_params.freeze(),
            method_impls: self.method_impls.freeze(),
            method_impl_targets: self.method_impl_targets,
            nested_classes: self.nested_classes,
            first_param_rows: self.first_param_rows,
            parents: self.parents,
            deleted: self.deleted,
            changed_types: self.changed_types,
        })
    }

    fn visit_type(&mut self, symbol: &Symbol) -> Result<()> {
        let Some(data) = symbol.as_type() else {
            return Ok(());
        };

        let type_row = match self.changes.get_change(symbol.id) {
            SymbolChange::None => return Ok(()),
            SymbolChange::Added => {
                let row = self.type_defs.add(symbol.id)?;
                tracing::trace!(%symbol.id, row, "added type");
                self.add_generic_parameters(symbol.id, &data.generic_parameters)?;
                if let Some(enclosing) = self.enclosing_type_row(symbol)? {
                    self.nested_classes.push((row, enclosing));
                }
                row
            }
            SymbolChange::Updated => {
                let row = self.existing_type_row(symbol.id)?;
                self.type_defs.add_updated(symbol.id, row)?;
                row
            }
            SymbolChange::ContainsChanges => self.existing_type_row(symbol.id)?,
        };
        self.changed_types.push(type_row);

        let compilation = self.map.compilation().clone();
        for member in symbol.members.iter().filter_map(|id| compilation.get(*id)) {
            match &member.data {
                SymbolData::Field(_) => self.visit_field(member.id, type_row)?,
                // The implementing part of a partial method emits the row of the pair.
                SymbolData::Method(_) if compilation.row_owner(member.id) != member.id => {}
                SymbolData::Method(method) => {
                    self.cancellation.check()?;
                    self.visit_method(member.id, method, type_row)?;
                }
                SymbolData::Property(_) => self.visit_property(member.id, type_row)?,
                SymbolData::Event(_) => self.visit_event(member.id, type_row)?,
                SymbolData::Namespace | SymbolData::Type(_) => {}
            }
        }

        if self.options.emit_deleted_method_shims() {
            self.visit_deleted_methods(symbol.id)?;
        }
        Ok(())
    }

    fn visit_field(&mut self, field: SymbolId, type_row: u32) -> Result<()> {
        match self.changes.get_change(field) {
            SymbolChange::Added => {
                let row = self.fields.add(field)?;
                self.parents.insert(
                    Token::from_parts(TableId::Field, row),
                    Token::from_parts(TableId::TypeDef, type_row),
                );
            }
            SymbolChange::Updated => {
                let row = self
                    .map
                    .try_get_field_row(field)
                    .ok_or_else(|| self.row_not_found("Field", field))?;
                self.fields.add_updated(field, row)?;
            }
            SymbolChange::None | SymbolChange::ContainsChanges => {}
        }
        Ok(())
    }

    fn visit_method(&mut self, method: SymbolId, data: &MethodData, type_row: u32) -> Result<()> {
        let key = DefinitionKey::Current(method);
        let row = match self.changes.get_change(method) {
            SymbolChange::Added => {
                let row = self.methods.add(key)?;
                self.parents.insert(
                    Token::from_parts(TableId::MethodDef, row),
                    Token::from_parts(TableId::TypeDef, type_row),
                );
                self.add_parameters(key, row, &data.parameters)?;
                self.add_generic_parameters(method, &data.generic_parameters)?;
                row
            }
            SymbolChange::Updated => {
                let row = self
                    .map
                    .try_get_method_row(method)
                    .ok_or_else(|| self.row_not_found("MethodDef", method))?;
                self.methods.add_updated(key, row)?;
                self.update_parameters(key, row, &data.parameters)?;
                row
            }
            SymbolChange::None | SymbolChange::ContainsChanges => return Ok(()),
        };

        self.add_method_impls(method, row, data.implements.len())
    }

    fn visit_property(&mut self, property: SymbolId, type_row: u32) -> Result<()> {
        match self.changes.get_change(property) {
            SymbolChange::Added => {
                let row = self.properties.add(property)?;
                let map_row = match self.map.property_map_row(type_row) {
                    Some(existing) => existing,
                    None => match self.property_maps.try_get(&type_row) {
                        Some(current) => current,
                        None => self.property_maps.add(type_row)?,
                    },
                };
                self.parents.insert(
                    Token::from_parts(TableId::Property, row),
                    Token::from_parts(TableId::PropertyMap, map_row),
                );
            }
            SymbolChange::Updated => {
                let row = self
                    .map
                    .try_get_property_row(property)
                    .ok_or_else(|| self.row_not_found("Property", property))?;
                self.properties.add_updated(property, row)?;
            }
            SymbolChange::None | SymbolChange::ContainsChanges => {}
        }
        Ok(())
    }

    fn visit_event(&mut self, event: SymbolId, type_row: u32) -> Result<()> {
        match self.changes.get_change(event) {
            SymbolChange::Added => {
                let row = self.events.add(event)?;
                let map_row = match self.map.event_map_row(type_row) {
                    Some(existing) => existing,
                    None => match self.event_maps.try_get(&type_row) {
                        Some(current) => current,
                        None => self.event_maps.add(type_row)?,
                    },
                };
                self.parents.insert(
                    Token::from_parts(TableId::Event, row),
                    Token::from_parts(TableId::EventMap, map_row),
                );
            }
            SymbolChange::Updated => {
                let row = self
                    .map
                    .try_get_event_row(event)
                    .ok_or_else(|| self.row_not_found("Event", event))?;
                self.events.add_updated(event, row)?;
            }
            SymbolChange::None | SymbolChange::ContainsChanges => {}
        }
        Ok(())
    }

    /// Deleted methods re-emit their previous row with a throwing body.
    fn visit_deleted_methods(&mut self, container: SymbolId) -> Result<()> {
        let previous = self.map.previous_compilation().clone();
        let changes = self.changes;
        for old in changes.deleted_members(container) {
            if previous.get(*old).map(Symbol::kind) != Some(SymbolKind::Method) {
                continue;
            }

            let shim = self.deleted.method(*old, self.map)?;
            let key = DefinitionKey::Deleted(*old);
            let row = shim.origin.row();
            self.methods.add_updated(key, row)?;
            self.update_parameters(key, row, &shim.parameters)?;
            tracing::trace!(method = %old, row, "deleted method shim");
        }
        Ok(())
    }

    fn add_parameters(
        &mut self,
        method: DefinitionKey,
        method_row: u32,
        parameters: &[Parameter],
    ) -> Result<()> {
        let method_token = Token::from_parts(TableId::MethodDef, method_row);
        for (offset, parameter) in parameters.iter().enumerate() {
            let row = self.params.add(ParamKey {
                method,
                sequence: parameter.sequence,
            })?;
            if offset == 0 {
                self.first_param_rows.insert(method_row, row);
            }
            self.parents
                .insert(Token::from_parts(TableId::Param, row), method_token);
        }
        Ok(())
    }

    /// Parameters of a re-emitted method keep their rows.
    fn update_parameters(
        &mut self,
        method: DefinitionKey,
        method_row: u32,
        parameters: &[Parameter],
    ) -> Result<()> {
        if parameters.is_empty() {
            return Ok(());
        }

        let (first, count) = self
            .map
            .param_rows(method_row, parameters.len() as u32)
            .unwrap_or((0, 0));
        if (parameters.len() as u32) > count {
            return Err(malformed_error!(
                "MethodDef row {} has {} parameter rows but {} parameters",
                method_row,
                count,
                parameters.len()
            ));
        }

        for (offset, parameter) in parameters.iter().enumerate() {
            self.params.add_updated(
                ParamKey {
                    method,
                    sequence: parameter.sequence,
                },
                first + offset as u32,
            )?;
        }
        Ok(())
    }

    fn add_generic_parameters(
        &mut self,
        owner: SymbolId,
        parameters: &[GenericParameter],
    ) -> Result<()> {
        for parameter in parameters {
            self.generic_params.add(GenericParamKey {
                owner,
                number: parameter.number,
            })?;
        }
        Ok(())
    }

    /// Allocates one `MethodImpl` row per explicit implementation, unless the method's
    /// implementations already have rows.
    fn add_method_impls(&mut self, method: SymbolId, row: u32, count: usize) -> Result<()> {
        if count == 0 || self.map.method_impl_exists(row, 1) {
            return Ok(());
        }

        let mut index = 1;
        for position in 0..count {
            let mut key = MethodImplKey::new(row, index);
            while self.map.method_impl_exists(row, key.index)
                || self.method_impls.try_get(&key).is_some()
            {
                index += 1;
                key = MethodImplKey::new(row, index);
            }
            self.method_impls.add(key)?;
            self.method_impl_targets.insert(key, (method, position));
        }
        Ok(())
    }

    fn existing_type_row(&self, symbol: SymbolId) -> Result<u32> {
        self.type_defs
            .try_get(&symbol)
            .or_else(|| self.map.try_get_type_row(symbol))
            .ok_or_else(|| self.row_not_found("TypeDef", symbol))
    }

    fn enclosing_type_row(&self, symbol: &Symbol) -> Result<Option<u32>> {
        let compilation = self.map.compilation();
        match symbol.container.and_then(|container| compilation.get(container)) {
            Some(container) if container.kind() == SymbolKind::Type => {
                self.existing_type_row(container.id).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn row_not_found(&self, table: &str, symbol: SymbolId) -> Error {
        Error::RowNotFound(format!(
            "{} of {}",
            table,
            self.map.compilation().qualified_name(symbol)
        ))
    }
}
