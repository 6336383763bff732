//! Previous-generation slot lookup for an updated method body.
//!
//! The code generator receives one [`EncVariableSlotAllocator`] per updated method whose
//! variables must survive the edit. The allocator answers, for a variable, lambda,
//! closure, hoisted field or awaiter of the new body, which slot or identity it had in the
//! previous generation.
//!
//! Every lookup translates twice before consulting the previous maps: the syntax offset
//! goes through the syntax map (current source position to previous source position,
//! both absolute, rebased on the respective method body positions), and the type goes
//! through the symbol matcher into the previous generation's vocabulary. If either
//! translation fails there is no previous slot. An edit without a syntax map leaves the
//! source untouched, so its offsets are used unchanged.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::{
    emit::{
        debuginfo::{ClosureDebugInfo, DebugId, LambdaDebugInfo, LocalDebugId, LocalSlotDebugInfo},
        edits::SyntaxMapper,
        locals::{EncHoistedLocalInfo, EncLocalInfo},
    },
    symbols::{matcher::SymbolMatcher, types::TypeRef},
};

/// Slot layout of the previous state machine of a kickoff method.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PreviousStateMachine {
    /// Metadata name of the state machine type
    pub type_name: String,
    /// Hoisted variable slots, by slot index
    pub hoisted_locals: Vec<EncHoistedLocalInfo>,
    /// Awaiter types, by slot index; `None` marks an unused slot
    pub awaiter_slots: Vec<Option<TypeRef>>,
}

/// Previous-generation slot lookup for one updated method.
pub struct EncVariableSlotAllocator {
    symbol_map: Rc<dyn SymbolMatcher>,
    syntax_map: Option<SyntaxMapper>,
    current_body_position: u32,
    previous_body_position: u32,
    method_id: DebugId,
    previous_locals: Vec<EncLocalInfo>,
    local_map: HashMap<EncLocalInfo, u32>,
    lambda_map: HashMap<i32, (DebugId, i32)>,
    closure_map: HashMap<i32, DebugId>,
    state_machine_type_name: Option<String>,
    hoisted_local_map: HashMap<EncHoistedLocalInfo, u32>,
    hoisted_local_count: u32,
    awaiter_map: HashMap<TypeRef, u32>,
    awaiter_count: u32,
}

impl EncVariableSlotAllocator {
    /// Builds the lookup maps.
    ///
    /// `symbol_map` translates current symbols into the vocabulary of `previous_locals`
    /// and of the state machine slots.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        symbol_map: Rc<dyn SymbolMatcher>,
        syntax_map: Option<SyntaxMapper>,
        current_body_position: u32,
        previous_body_position: u32,
        method_id: DebugId,
        previous_locals: Vec<EncLocalInfo>,
        lambdas: &[LambdaDebugInfo],
        closures: &[ClosureDebugInfo],
        state_machine: Option<PreviousStateMachine>,
    ) -> Self {
        let mut local_map = HashMap::new();
        for (slot, local) in previous_locals.iter().enumerate() {
            if !local.is_unused() {
                local_map.insert(local.clone(), slot as u32);
            }
        }

        let lambda_map = lambdas
            .iter()
            .map(|lambda| (lambda.syntax_offset, (lambda.lambda_id, lambda.closure_ordinal)))
            .collect();
        let closure_map = closures
            .iter()
            .map(|closure| (closure.syntax_offset, closure.closure_id))
            .collect();

        let mut hoisted_local_map = HashMap::new();
        let mut awaiter_map = HashMap::new();
        let (state_machine_type_name, hoisted_local_count, awaiter_count) = match state_machine {
            Some(state_machine) => {
                for (slot, hoisted) in state_machine.hoisted_locals.iter().enumerate() {
                    if !hoisted.is_unused() {
                        hoisted_local_map.insert(hoisted.clone(), slot as u32);
                    }
                }
                for (slot, awaiter) in state_machine.awaiter_slots.iter().enumerate() {
                    if let Some(awaiter) = awaiter {
                        awaiter_map.entry(awaiter.clone()).or_insert(slot as u32);
                    }
                }
                (
                    Some(state_machine.type_name),
                    state_machine.hoisted_locals.len() as u32,
                    state_machine.awaiter_slots.len() as u32,
                )
            }
            None => (None, 0, 0),
        };

        tracing::trace!(
            method = %method_id,
            locals = previous_locals.len(),
            hoisted = hoisted_local_count,
            awaiters = awaiter_count,
            "created slot allocator"
        );

        EncVariableSlotAllocator {
            symbol_map,
            syntax_map,
            current_body_position,
            previous_body_position,
            method_id,
            previous_locals,
            local_map,
            lambda_map,
            closure_map,
            state_machine_type_name,
            hoisted_local_map,
            hoisted_local_count,
            awaiter_map,
            awaiter_count,
        }
    }

    /// Identity of the method in the previous generation.
    #[must_use]
    pub fn method_id(&self) -> DebugId {
        self.method_id
    }

    /// Appends every previous local slot, as a tombstone, to `builder`. Slots the new
    /// body does not claim keep their previous signature.
    pub fn add_previous_locals(&self, builder: &mut Vec<EncLocalInfo>) {
        builder.extend(self.previous_locals.iter().map(EncLocalInfo::to_tombstone));
    }

    /// Returns the previous slot of a long-lived local.
    #[must_use]
    pub fn get_previous_local(&self, local: &EncLocalInfo) -> Option<u32> {
        if !local.slot.kind.is_long_lived() {
            return None;
        }

        let local_type = local.local_type.as_ref()?;
        let slot = self.map_slot(local.slot)?;
        let local_type = self.symbol_map.map_reference(local_type)?;
        let key = EncLocalInfo::new(slot, local_type, local.constraints);
        self.local_map.get(&key).copied()
    }

    /// Returns the previous field slot of a hoisted variable.
    #[must_use]
    pub fn try_get_previous_hoisted_local_slot_index(
        &self,
        slot: LocalSlotDebugInfo,
        local_type: &TypeRef,
    ) -> Option<u32> {
        let slot = self.map_slot(slot)?;
        let local_type = self.symbol_map.map_reference(local_type)?;
        self.hoisted_local_map
            .get(&EncHoistedLocalInfo::new(slot, local_type))
            .copied()
    }

    /// Returns the previous awaiter slot of `awaiter_type`.
    #[must_use]
    pub fn try_get_previous_awaiter_slot_index(&self, awaiter_type: &TypeRef) -> Option<u32> {
        let awaiter_type = self.symbol_map.map_reference(awaiter_type)?;
        self.awaiter_map.get(&awaiter_type).copied()
    }

    /// Returns the previous identity of the closure created for the scope at
    /// `syntax_offset`.
    #[must_use]
    pub fn try_get_previous_closure(&self, syntax_offset: i32) -> Option<DebugId> {
        let previous = self.map_syntax_offset(syntax_offset)?;
        self.closure_map.get(&previous).copied()
    }

    /// Returns the previous identity and closure ordinal of the lambda at
    /// `syntax_offset`.
    #[must_use]
    pub fn try_get_previous_lambda(&self, syntax_offset: i32) -> Option<(DebugId, i32)> {
        let previous = self.map_syntax_offset(syntax_offset)?;
        self.lambda_map.get(&previous).copied()
    }

    /// Number of hoisted variable slots of the previous state machine.
    #[must_use]
    pub fn previous_hoisted_local_slot_count(&self) -> u32 {
        self.hoisted_local_count
    }

    /// Number of awaiter slots of the previous state machine.
    #[must_use]
    pub fn previous_awaiter_slot_count(&self) -> u32 {
        self.awaiter_count
    }

    /// Name of the previous state machine type, for kickoff methods.
    #[must_use]
    pub fn previous_state_machine_type_name(&self) -> Option<&str> {
        self.state_machine_type_name.as_deref()
    }

    fn map_slot(&self, slot: LocalSlotDebugInfo) -> Option<LocalSlotDebugInfo> {
        let offset = self.map_syntax_offset(slot.id.syntax_offset)?;
        Some(LocalSlotDebugInfo::new(
            slot.kind,
            LocalDebugId::new(offset, slot.id.ordinal),
        ))
    }

    /// Without a syntax map the source is unchanged and offsets carry over as is.
    fn map_syntax_offset(&self, syntax_offset: i32) -> Option<i32> {
        let Some(syntax_map) = self.syntax_map.as_ref() else {
            return Some(syntax_offset);
        };
        let absolute = u32::try_from(i64::from(self.current_body_position) + i64::from(syntax_offset)).ok()?;
        let previous = syntax_map(absolute)?;
        i32::try_from(i64::from(previous) - i64::from(self.previous_body_position)).ok()
    }
}

impl fmt::Debug for EncVariableSlotAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncVariableSlotAllocator")
            .field("method_id", &self.method_id)
            .field("locals", &self.previous_locals.len())
            .field("state_machine", &self.state_machine_type_name)
            .field("syntax_map", &self.syntax_map.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        emit::locals::{LocalSlotBuilder, StateMachineSlotBuilder, SynthesizedLocalKind},
        symbols::{matcher::StructuralSymbolMatcher, CompilationBuilder, LocalConstraints},
    };

    fn identity() -> Rc<dyn SymbolMatcher> {
        let compilation = Arc::new(CompilationBuilder::new("A").build());
        Rc::new(StructuralSymbolMatcher::new(compilation.clone(), compilation))
    }

    fn user(offset: i32) -> LocalSlotDebugInfo {
        LocalSlotDebugInfo::new(SynthesizedLocalKind::UserDefined, LocalDebugId::new(offset, 0))
    }

    /// Current body at position 100, previous at 40; the edit inserted 10 characters
    /// before every variable.
    fn shifted_map() -> SyntaxMapper {
        Arc::new(|position| position.checked_sub(10).map(|p| p - 60))
    }

    fn allocator(syntax_map: Option<SyntaxMapper>) -> EncVariableSlotAllocator {
        let previous_locals = vec![
            EncLocalInfo::new(user(5), TypeRef::int32(), LocalConstraints::empty())
                .with_signature(vec![0x08]),
            EncLocalInfo::unused(Some(vec![0x0E])),
            EncLocalInfo::new(user(20), TypeRef::string(), LocalConstraints::empty())
                .with_signature(vec![0x0E]),
        ];
        let lambdas = [LambdaDebugInfo {
            syntax_offset: 30,
            lambda_id: DebugId::new(0, 0),
            closure_ordinal: 0,
        }];
        let closures = [ClosureDebugInfo {
            syntax_offset: 25,
            closure_id: DebugId::new(0, 0),
        }];
        EncVariableSlotAllocator::new(
            identity(),
            syntax_map,
            100,
            40,
            DebugId::new(3, 0),
            previous_locals,
            &lambdas,
            &closures,
            None,
        )
    }

    #[test]
    fn test_previous_local_through_syntax_map() {
        let allocator = allocator(Some(shifted_map()));
        let moved = EncLocalInfo::new(user(15), TypeRef::int32(), LocalConstraints::empty());
        assert_eq!(allocator.get_previous_local(&moved), Some(0));

        let retyped = EncLocalInfo::new(user(15), TypeRef::string(), LocalConstraints::empty());
        assert_eq!(allocator.get_previous_local(&retyped), None);

        let second = EncLocalInfo::new(user(30), TypeRef::string(), LocalConstraints::empty());
        assert_eq!(allocator.get_previous_local(&second), Some(2));
    }

    #[test]
    fn test_short_lived_locals_are_never_reused() {
        let allocator = allocator(Some(shifted_map()));
        let temp = EncLocalInfo::new(
            LocalSlotDebugInfo::new(SynthesizedLocalKind::LoweringTemp, LocalDebugId::new(15, 0)),
            TypeRef::int32(),
            LocalConstraints::empty(),
        );
        assert_eq!(allocator.get_previous_local(&temp), None);
    }

    #[test]
    fn test_missing_syntax_map_keeps_offsets() {
        let allocator = allocator(None);
        let same = EncLocalInfo::new(user(5), TypeRef::int32(), LocalConstraints::empty());
        assert_eq!(allocator.get_previous_local(&same), Some(0));
        let moved = EncLocalInfo::new(user(15), TypeRef::int32(), LocalConstraints::empty());
        assert_eq!(allocator.get_previous_local(&moved), None);
        assert_eq!(allocator.try_get_previous_lambda(30), Some((DebugId::new(0, 0), 0)));
        assert_eq!(allocator.try_get_previous_closure(25), Some(DebugId::new(0, 0)));
    }

    #[test]
    fn test_lambdas_and_closures() {
        let allocator = allocator(Some(shifted_map()));
        assert_eq!(allocator.try_get_previous_lambda(40), Some((DebugId::new(0, 0), 0)));
        assert_eq!(allocator.try_get_previous_closure(35), Some(DebugId::new(0, 0)));
        assert_eq!(allocator.try_get_previous_closure(36), None);
        assert_eq!(allocator.method_id(), DebugId::new(3, 0));
    }

    #[test]
    fn test_slot_builder_keeps_previous_layout() {
        let allocator = allocator(Some(shifted_map()));
        let mut builder = LocalSlotBuilder::new(Some(&allocator));
        assert_eq!(builder.len(), 3);

        let second = builder.declare(EncLocalInfo::new(
            user(30),
            TypeRef::string(),
            LocalConstraints::empty(),
        ));
        let added = builder.declare(EncLocalInfo::new(
            user(50),
            TypeRef::int32(),
            LocalConstraints::empty(),
        ));
        assert_eq!(second, 2);
        assert_eq!(added, 3);

        let slots = builder.finish();
        assert!(slots[0].is_unused());
        assert_eq!(slots[0].signature, Some(vec![0x08]));
        assert!(slots[1].is_unused());
        assert_eq!(slots[2].local_type, Some(TypeRef::string()));
    }

    #[test]
    fn test_state_machine_slots() {
        let awaiter = TypeRef::object();
        let allocator = EncVariableSlotAllocator::new(
            identity(),
            Some(shifted_map()),
            100,
            40,
            DebugId::new(0, 0),
            Vec::new(),
            &[],
            &[],
            Some(PreviousStateMachine {
                type_name: "<M>d__0".to_string(),
                hoisted_locals: vec![
                    EncHoistedLocalInfo::new(user(5), TypeRef::int32()),
                    EncHoistedLocalInfo::unused(),
                ],
                awaiter_slots: vec![None, Some(awaiter.clone())],
            }),
        );

        assert_eq!(allocator.previous_state_machine_type_name(), Some("<M>d__0"));
        assert_eq!(allocator.previous_hoisted_local_slot_count(), 2);
        assert_eq!(allocator.previous_awaiter_slot_count(), 2);
        assert_eq!(
            allocator.try_get_previous_hoisted_local_slot_index(user(15), &TypeRef::int32()),
            Some(0)
        );
        assert_eq!(allocator.try_get_previous_awaiter_slot_index(&awaiter), Some(1));

        let mut builder = StateMachineSlotBuilder::new("<M>d__7", Some(&allocator));
        assert_eq!(builder.type_name(), "<M>d__0");
        assert_eq!(builder.hoist(user(15), TypeRef::int32()), 0);
        assert_eq!(builder.hoist(user(60), TypeRef::int32()), 2);
        assert_eq!(builder.awaiter(awaiter.clone()), 1);

        let info = builder.finish();
        assert_eq!(info.hoisted_slots.len(), 3);
        assert!(info.hoisted_slots[1].is_unused());
        assert_eq!(info.awaiter_slots, vec![None, Some(awaiter)]);
    }
}
