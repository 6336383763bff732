//! Custom attribute merge.
//!
//! A parent that already owns `n` attribute rows keeps them: the first rows are
//! rewritten with the current attributes, surplus rows are turned into tombstones
//! (null constructor, empty value) and missing rows are appended. Appended rows are
//! remembered per parent so later generations can find them again.

use crate::{
    emit::deleted::DefinitionKey,
    metadata::{
        tables::{rows::CustomAttributeRow, TableId},
        token::Token,
    },
    symbols::types::CustomAttribute,
    Result,
};

use super::DeltaMetadataWriter;

impl DeltaMetadataWriter<'_, '_> {
    pub(super) fn write_custom_attributes(&mut self) -> Result<()> {
        let compilation = self.compilation.clone();
        let mut parents: Vec<(Token, bool, &[CustomAttribute])> = Vec::new();

        let definition_tables = [
            (TableId::TypeDef, &self.indices.type_defs),
            (TableId::Field, &self.indices.fields),
            (TableId::Property, &self.indices.properties),
            (TableId::Event, &self.indices.events),
        ];
        for (table, index) in definition_tables {
            for entry in index.entries() {
                let symbol = compilation.symbol(entry.key)?;
                parents.push((
                    Token::from_parts(table, entry.row),
                    entry.added,
                    &symbol.attributes,
                ));
            }
        }

        for entry in self.indices.methods.entries() {
            if let DefinitionKey::Current(method) = entry.key {
                let symbol = compilation.symbol(method)?;
                parents.push((
                    Token::from_parts(TableId::MethodDef, entry.row),
                    entry.added,
                    &symbol.attributes,
                ));
            }
        }

        for entry in self.indices.params.entries() {
            let DefinitionKey::Current(method) = entry.key.method else {
                continue;
            };
            let parameter = compilation
                .method(method)?
                .parameters
                .iter()
                .find(|parameter| parameter.sequence == entry.key.sequence);
            if let Some(parameter) = parameter {
                parents.push((
                    Token::from_parts(TableId::Param, entry.row),
                    entry.added,
                    &parameter.attributes,
                ));
            }
        }

        for (parent, added, attributes) in parents {
            self.merge_custom_attributes(parent, added, attributes)?;
        }
        self.tables.custom_attributes.sort_by_key(|row| row.rid);
        Ok(())
    }

    fn merge_custom_attributes(
        &mut self,
        parent: Token,
        added: bool,
        attributes: &[CustomAttribute],
    ) -> Result<()> {
        let existing = if added {
            Vec::new()
        } else {
            self.map.custom_attribute_rows(parent)
        };

        let mut appended = Vec::new();
        for (position, attribute) in attributes.iter().enumerate() {
            let constructor = self.resolve_member(&attribute.constructor)?;
            let value = self.heaps.blobs.add(&attribute.value);
            let rid = match existing.get(position) {
                Some(row) => *row,
                None => {
                    self.custom_attributes_appended += 1;
                    let row =
                        self.previous_sizes[TableId::CustomAttribute] + self.custom_attributes_appended;
                    appended.push(row);
                    row
                }
            };
            self.tables.custom_attributes.push(CustomAttributeRow {
                rid,
                parent,
                constructor,
                value,
            });
        }

        for rid in existing.iter().skip(attributes.len()) {
            self.tables.custom_attributes.push(CustomAttributeRow {
                rid: *rid,
                parent,
                constructor: Token::NULL,
                value: 0,
            });
        }

        if !appended.is_empty() {
            let mut rows = self.map.previous().custom_attributes_added(parent).to_vec();
            rows.extend(appended);
            self.custom_attributes_added.insert(parent, rows);
        }
        Ok(())
    }
}
