//! Method body serialization.
//!
//! Bodies are requested in `MethodDef` row order, so the IL stream and the
//! `StandAloneSig` rows come out in a deterministic order.

use crate::{
    emit::{
        baseline::AddedOrChangedMethodInfo, body::MethodBody, debuginfo::DebugId,
        deleted::DefinitionKey, locals::EncLocalInfo, MethodBodyProvider,
    },
    metadata::{
        body::encode_method_body,
        signatures::{assemble_local_signature, encode_local},
        tables::{rows::StandAloneSigRow, TableId},
        token::Token,
    },
    symbols::SymbolId,
    Result,
};

use super::DeltaMetadataWriter;

impl DeltaMetadataWriter<'_, '_> {
    pub(super) fn write_method_bodies(&mut self, bodies: &dyn MethodBodyProvider) -> Result<()> {
        let entries: Vec<(u32, DefinitionKey, bool)> = self
            .indices
            .methods
            .entries()
            .map(|entry| (entry.row, entry.key, entry.added))
            .collect();

        for (row, key, added) in entries {
            self.cancellation.check()?;
            match key {
                DefinitionKey::Current(method) => self.write_method_body(row, method, added, bodies)?,
                DefinitionKey::Deleted(old) => {
                    let shim = self.deleted_method(old)?;
                    let body = shim.body(self.options, self.compilation.core_library());
                    let (rva, _) = self.serialize_body(&body)?;
                    self.method_rvas.insert(key, rva);
                }
            }
        }
        Ok(())
    }

    fn write_method_body(
        &mut self,
        row: u32,
        method: SymbolId,
        added: bool,
        bodies: &dyn MethodBodyProvider,
    ) -> Result<()> {
        let compilation = self.compilation.clone();
        if !compilation.method(method)?.has_body() {
            return Ok(());
        }

        let errors = self.diagnostics.error_count();
        let allocator = if added {
            None
        } else {
            self.map
                .try_create_variable_slot_allocator(method, self.diagnostics)?
        };
        if self.diagnostics.error_count() > errors {
            // Reported; the emit fails.
            return Ok(());
        }

        let body = bodies.method_body(&compilation, method, allocator.as_ref())?;
        let (rva, signatures) = self.serialize_body(&body)?;
        self.method_rvas.insert(DefinitionKey::Current(method), rva);

        let method_id = match &allocator {
            Some(allocator) => allocator.method_id(),
            None => self.method_id(row),
        };
        let (state_machine_type_name, hoisted_locals, awaiter_slots) = match &body.state_machine {
            Some(state_machine) => (
                Some(state_machine.type_name.clone()),
                state_machine.hoisted_slots.clone(),
                Some(state_machine.awaiter_slots.clone()),
            ),
            None => (None, Vec::new(), None),
        };
        // Recorded slots carry their encoded type so a later tombstone keeps it.
        let locals = body
            .locals
            .into_iter()
            .zip(signatures)
            .map(|(local, signature)| local.with_signature(signature))
            .collect();
        let info = AddedOrChangedMethodInfo::new(
            method_id,
            locals,
            body.lambdas,
            body.closures,
            state_machine_type_name,
            hoisted_locals,
            awaiter_slots,
        )?;
        self.added_or_changed_methods.insert(row, info);
        Ok(())
    }

    /// Debug id of a method whose variables are not carried over.
    fn method_id(&self, row: u32) -> DebugId {
        if let Some(info) = self.map.previous().added_or_changed_method(row) {
            return info.method_id;
        }
        if row <= self.map.module().table_sizes()[TableId::MethodDef] {
            let token = Token::from_parts(TableId::MethodDef, row);
            if let Ok(debug_information) = self.map.previous().debug_information.get(token) {
                return DebugId::new(debug_information.method_ordinal, 0);
            }
        }
        DebugId::new(row as i32, self.generation as i32)
    }

    /// Patches token operands, writes the local signature and appends the body to the IL
    /// stream. Returns the RVA of the body and the encoded entry of every local.
    fn serialize_body(&mut self, body: &MethodBody) -> Result<(u32, Vec<Vec<u8>>)> {
        let mut il = body.il.clone();
        for fixup in &body.fixups {
            let token = self.resolve_member(&fixup.target)?;
            let start = fixup.offset as usize;
            let Some(operand) = il.get_mut(start..start + 4) else {
                return Err(malformed_error!(
                    "Token operand at offset {} is outside the {} byte body",
                    fixup.offset,
                    body.il.len()
                ));
            };
            operand.copy_from_slice(&token.value().to_le_bytes());
        }

        let entries = self.local_entries(&body.locals)?;
        let local_signature = self.local_signature(&entries)?;
        let encoded = encode_method_body(&il, body.max_stack, local_signature, body.init_locals)?;
        Ok((self.il.add_body(&encoded), entries))
    }

    fn local_entries(&mut self, locals: &[EncLocalInfo]) -> Result<Vec<Vec<u8>>> {
        let mut entries = Vec::with_capacity(locals.len());
        for (slot, local) in locals.iter().enumerate() {
            let entry = match (&local.local_type, &local.signature) {
                (Some(local_type), _) => encode_local(local_type, local.constraints, self)?,
                (None, Some(signature)) => signature.clone(),
                (None, None) => {
                    return Err(invariant_error!(
                        "Unused local slot {} has no recorded signature",
                        slot
                    ))
                }
            };
            entries.push(entry);
        }
        Ok(entries)
    }

    fn local_signature(&mut self, entries: &[Vec<u8>]) -> Result<Token> {
        if entries.is_empty() {
            return Ok(Token::NULL);
        }

        let blob = assemble_local_signature(entries)?;
        let (row, is_new) = self.stand_alone_sigs.get_or_add(blob.clone());
        if is_new {
            let signature = self.heaps.blobs.add(&blob);
            self.tables
                .stand_alone_sigs
                .push(StandAloneSigRow { rid: row, signature });
        }
        Ok(Token::from_parts(TableId::StandAloneSig, row))
    }
}
