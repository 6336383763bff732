//! `EncLog` and `EncMap` population.
//!
//! Tables are logged in the order the runtime applies them: references first, then
//! definitions in dependency order. Every new member row is preceded by an `Add*` entry
//! naming the row it extends.

use std::collections::HashMap;

use crate::{
    metadata::{
        tables::{EditAndContinueOperation, EncLogRow, EncMap, TableId, TableSizes},
        token::Token,
    },
    Result,
};

use super::DeltaTables;

/// Application order of the tables a delta may carry.
const LOG_ORDER: [TableId; 21] = [
    TableId::AssemblyRef,
    TableId::ModuleRef,
    TableId::MemberRef,
    TableId::MethodSpec,
    TableId::TypeRef,
    TableId::TypeSpec,
    TableId::StandAloneSig,
    TableId::TypeDef,
    TableId::EventMap,
    TableId::PropertyMap,
    TableId::Event,
    TableId::Field,
    TableId::MethodDef,
    TableId::Property,
    TableId::Param,
    TableId::CustomAttribute,
    TableId::MethodSemantics,
    TableId::MethodImpl,
    TableId::NestedClass,
    TableId::GenericParam,
    TableId::GenericParamConstraint,
];

fn add_operation(table: TableId) -> Option<EditAndContinueOperation> {
    match table {
        TableId::Event => Some(EditAndContinueOperation::AddEvent),
        TableId::Field => Some(EditAndContinueOperation::AddField),
        TableId::MethodDef => Some(EditAndContinueOperation::AddMethod),
        TableId::Property => Some(EditAndContinueOperation::AddProperty),
        TableId::Param => Some(EditAndContinueOperation::AddParameter),
        _ => None,
    }
}

fn rows_of(tables: &DeltaTables, table: TableId) -> Vec<u32> {
    fn rids<T>(rows: &[T], rid: impl Fn(&T) -> u32) -> Vec<u32> {
        rows.iter().map(rid).collect()
    }

    match table {
        TableId::AssemblyRef => rids(&tables.assembly_refs, |row| row.rid),
        TableId::ModuleRef => rids(&tables.module_refs, |row| row.rid),
        TableId::MemberRef => rids(&tables.member_refs, |row| row.rid),
        TableId::MethodSpec => rids(&tables.method_specs, |row| row.rid),
        TableId::TypeRef => rids(&tables.type_refs, |row| row.rid),
        TableId::TypeSpec => rids(&tables.type_specs, |row| row.rid),
        TableId::StandAloneSig => rids(&tables.stand_alone_sigs, |row| row.rid),
        TableId::TypeDef => rids(&tables.type_defs, |row| row.rid),
        TableId::EventMap => rids(&tables.event_maps, |row| row.rid),
        TableId::PropertyMap => rids(&tables.property_maps, |row| row.rid),
        TableId::Event => rids(&tables.events, |row| row.rid),
        TableId::Field => rids(&tables.fields, |row| row.rid),
        TableId::MethodDef => rids(&tables.methods, |row| row.rid),
        TableId::Property => rids(&tables.properties, |row| row.rid),
        TableId::Param => rids(&tables.params, |row| row.rid),
        TableId::CustomAttribute => rids(&tables.custom_attributes, |row| row.rid),
        TableId::MethodSemantics => rids(&tables.method_semantics, |row| row.rid),
        TableId::MethodImpl => rids(&tables.method_impls, |row| row.rid),
        TableId::NestedClass => rids(&tables.nested_classes, |row| row.rid),
        TableId::GenericParam => rids(&tables.generic_params, |row| row.rid),
        TableId::GenericParamConstraint => {
            rids(&tables.generic_param_constraints, |row| row.rid)
        }
        _ => Vec::new(),
    }
}

/// Builds the `EncLog` and `EncMap` of a delta.
///
/// `parents` maps the token of every new `Event`, `Field`, `MethodDef`, `Property` and
/// `Param` row to the row it is added to.
///
/// # Errors
///
/// Returns [`crate::Error::Invariant`] if a token would be logged twice.
pub fn populate_enc_tables(
    tables: &DeltaTables,
    parents: &HashMap<Token, Token>,
) -> Result<(Vec<EncLogRow>, EncMap)> {
    let mut log = Vec::new();
    for table in LOG_ORDER {
        for rid in rows_of(tables, table) {
            let token = Token::from_parts(table, rid);
            if let (Some(parent), Some(operation)) = (parents.get(&token), add_operation(table)) {
                log.push(EncLogRow::new(*parent, operation));
            }
            log.push(EncLogRow::new(token, EditAndContinueOperation::Default));
        }
    }

    let map = EncMap::from_log(&log)?;
    Ok((log, map))
}

/// Checks that every mapped row exists once the delta is applied.
pub(crate) fn validate_enc_map(map: &EncMap, table_sizes: &TableSizes) -> Result<()> {
    for window in map.tokens().windows(2) {
        if window[0] >= window[1] {
            return Err(invariant_error!(
                "EncMap is not strictly ordered at {} and {}",
                window[0],
                window[1]
            ));
        }
    }

    for token in map.tokens() {
        let Some(table) = token.table_id() else {
            return Err(invariant_error!("EncMap entry {} names no table", token));
        };
        if token.row() == 0 || token.row() > table_sizes[table] {
            return Err(invariant_error!(
                "EncMap entry {} is outside the {} rows of {:?}",
                token,
                table_sizes[table],
                table
            ));
        }
    }
    Ok(())
}
