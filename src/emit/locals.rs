//! Local variable and hoisted field slot identities.
//!
//! A running frame addresses its locals by slot index, and a suspended state machine
//! addresses its hoisted variables by field. When a method body is replaced, every
//! variable that survives the edit must land in the slot it occupied before, and slots
//! whose variable disappeared must keep their type so the frame layout stays valid.
//!
//! [`LocalSlotBuilder`] and [`StateMachineSlotBuilder`] are the slot managers a code
//! generator drives while producing an updated body. They consult the
//! [`EncVariableSlotAllocator`] and produce the final slot layout.

use std::hash::{Hash, Hasher};

use crate::{
    emit::{allocator::EncVariableSlotAllocator, debuginfo::LocalSlotDebugInfo},
    symbols::{matcher::SymbolMatcher, types::TypeRef, LocalConstraints},
};

/// Kind of a local variable slot.
///
/// Negative kinds are short-lived temporaries whose value never needs to survive an
/// edit; everything from [`SynthesizedLocalKind::UserDefined`] on is long-lived.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(i32)]
pub enum SynthesizedLocalKind {
    /// Temporary allocated by the IL emitter
    EmitterTemp = -3,
    /// Temporary introduced by lowering
    LoweringTemp = -2,
    /// Variable declared in source
    UserDefined = 0,
    /// `lock` taken flag
    LockTaken = 2,
    /// `lock` target
    Lock = 3,
    /// `using` resource
    Using = 4,
    /// `foreach` enumerator
    ForEachEnumerator = 5,
    /// `foreach` array
    ForEachArray = 6,
    /// `foreach` array index
    ForEachArrayIndex = 8,
    /// `fixed` reference
    FixedReference = 9,
    /// `fixed` string
    FixedString = 10,
    /// Spilled by-ref value across an `await`
    AwaitByRefSpill = 24,
    /// Display class instance of a closure
    LambdaDisplayClass = 29,
    /// Cached state of a state machine
    StateMachineCachedState = 30,
}

impl SynthesizedLocalKind {
    /// Returns true if values of this kind must be preserved across edits.
    #[must_use]
    pub fn is_long_lived(&self) -> bool {
        *self >= SynthesizedLocalKind::UserDefined
    }

    /// Returns the raw value stored in debug information.
    #[must_use]
    pub fn value(&self) -> i32 {
        *self as i32
    }

    /// Maps a raw debug information value back to a kind.
    #[must_use]
    pub fn from_i32(value: i32) -> Option<SynthesizedLocalKind> {
        Some(match value {
            -3 => SynthesizedLocalKind::EmitterTemp,
            -2 => SynthesizedLocalKind::LoweringTemp,
            0 => SynthesizedLocalKind::UserDefined,
            2 => SynthesizedLocalKind::LockTaken,
            3 => SynthesizedLocalKind::Lock,
            4 => SynthesizedLocalKind::Using,
            5 => SynthesizedLocalKind::ForEachEnumerator,
            6 => SynthesizedLocalKind::ForEachArray,
            8 => SynthesizedLocalKind::ForEachArrayIndex,
            9 => SynthesizedLocalKind::FixedReference,
            10 => SynthesizedLocalKind::FixedString,
            24 => SynthesizedLocalKind::AwaitByRefSpill,
            29 => SynthesizedLocalKind::LambdaDisplayClass,
            30 => SynthesizedLocalKind::StateMachineCachedState,
            _ => return None,
        })
    }
}

/// Identity of a local variable slot.
///
/// Two infos are equal when their slot debug info, type and constraints match. The
/// encoded signature bytes do not take part in equality; they are what the writer emits
/// for slots whose type is unknown.
#[derive(Clone, Debug)]
pub struct EncLocalInfo {
    /// Kind and declaration position
    pub slot: LocalSlotDebugInfo,
    /// Type of the slot; `None` marks an unused slot
    pub local_type: Option<TypeRef>,
    /// Pinned / by-ref constraints
    pub constraints: LocalConstraints,
    /// Encoded signature entry, when known
    pub signature: Option<Vec<u8>>,
}

impl EncLocalInfo {
    /// Creates a used slot.
    #[must_use]
    pub fn new(slot: LocalSlotDebugInfo, local_type: TypeRef, constraints: LocalConstraints) -> Self {
        EncLocalInfo {
            slot,
            local_type: Some(local_type),
            constraints,
            signature: None,
        }
    }

    /// Creates an unused slot that re-emits `signature`.
    #[must_use]
    pub fn unused(signature: Option<Vec<u8>>) -> Self {
        EncLocalInfo {
            slot: LocalSlotDebugInfo::new(
                SynthesizedLocalKind::EmitterTemp,
                Default::default(),
            ),
            local_type: None,
            constraints: LocalConstraints::empty(),
            signature,
        }
    }

    /// Attaches encoded signature bytes.
    #[must_use]
    pub fn with_signature(mut self, signature: Vec<u8>) -> Self {
        self.signature = Some(signature);
        self
    }

    /// Returns true for slots that are preserved but never reused.
    #[must_use]
    pub fn is_unused(&self) -> bool {
        self.local_type.is_none()
    }

    /// Returns this slot as a tombstone: same signature, never reused.
    #[must_use]
    pub fn to_tombstone(&self) -> EncLocalInfo {
        EncLocalInfo::unused(self.signature.clone())
    }

    /// Translates the slot type through `matcher`. A type without counterpart turns the
    /// slot into an unused one that keeps its signature.
    #[must_use]
    pub fn map_types(&self, matcher: &dyn SymbolMatcher) -> EncLocalInfo {
        match &self.local_type {
            None => self.clone(),
            Some(local_type) => match matcher.map_reference(local_type) {
                Some(mapped) => EncLocalInfo {
                    local_type: Some(mapped),
                    ..self.clone()
                },
                None => self.to_tombstone(),
            },
        }
    }
}

impl PartialEq for EncLocalInfo {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot
            && self.local_type == other.local_type
            && self.constraints == other.constraints
    }
}

impl Eq for EncLocalInfo {}

impl Hash for EncLocalInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.slot.hash(state);
        self.local_type.hash(state);
        self.constraints.hash(state);
    }
}

/// Identity of a hoisted state machine field.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EncHoistedLocalInfo {
    /// Kind and declaration position of the hoisted variable
    pub slot: LocalSlotDebugInfo,
    /// Field type; `None` marks an unused slot
    pub local_type: Option<TypeRef>,
}

impl EncHoistedLocalInfo {
    /// Creates a used hoisted slot.
    #[must_use]
    pub fn new(slot: LocalSlotDebugInfo, local_type: TypeRef) -> Self {
        EncHoistedLocalInfo {
            slot,
            local_type: Some(local_type),
        }
    }

    /// Creates an unused hoisted slot.
    #[must_use]
    pub fn unused() -> Self {
        EncHoistedLocalInfo {
            slot: LocalSlotDebugInfo::new(SynthesizedLocalKind::EmitterTemp, Default::default()),
            local_type: None,
        }
    }

    /// Returns true for slots that are preserved but never reused.
    #[must_use]
    pub fn is_unused(&self) -> bool {
        self.local_type.is_none()
    }

    /// Translates the field type through `matcher`; unmappable types become unused.
    #[must_use]
    pub fn map_types(&self, matcher: &dyn SymbolMatcher) -> EncHoistedLocalInfo {
        match self.local_type.as_ref().and_then(|t| matcher.map_reference(t)) {
            Some(mapped) => EncHoistedLocalInfo {
                slot: self.slot,
                local_type: Some(mapped),
            },
            None => EncHoistedLocalInfo::unused(),
        }
    }
}

/// Assigns local slots of an updated method body.
///
/// Previous slots are pre-populated as tombstones. A long-lived local that the allocator
/// maps to a previous slot takes that slot over; everything else is appended.
pub struct LocalSlotBuilder<'a> {
    allocator: Option<&'a EncVariableSlotAllocator>,
    slots: Vec<EncLocalInfo>,
    reserved: Vec<bool>,
}

impl<'a> LocalSlotBuilder<'a> {
    /// Creates a builder; without an allocator every local gets a fresh slot.
    #[must_use]
    pub fn new(allocator: Option<&'a EncVariableSlotAllocator>) -> Self {
        let mut slots = Vec::new();
        if let Some(allocator) = allocator {
            allocator.add_previous_locals(&mut slots);
        }
        let reserved = vec![true; slots.len()];
        LocalSlotBuilder {
            allocator,
            slots,
            reserved,
        }
    }

    /// Declares a local and returns its slot index.
    pub fn declare(&mut self, local: EncLocalInfo) -> u32 {
        if let Some(index) = self
            .allocator
            .and_then(|allocator| allocator.get_previous_local(&local))
        {
            let index = index as usize;
            if self.reserved.get(index).copied().unwrap_or(false) {
                self.reserved[index] = false;
                self.slots[index] = local;
                return index as u32;
            }
        }

        self.slots.push(local);
        self.reserved.push(false);
        (self.slots.len() - 1) as u32
    }

    /// Declares a short-lived temporary, which never reuses a previous slot.
    pub fn declare_temp(&mut self, local_type: TypeRef, constraints: LocalConstraints) -> u32 {
        self.declare(EncLocalInfo::new(
            LocalSlotDebugInfo::new(SynthesizedLocalKind::LoweringTemp, Default::default()),
            local_type,
            constraints,
        ))
    }

    /// Returns the number of slots assigned so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if no slot has been assigned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the final slot layout.
    #[must_use]
    pub fn finish(self) -> Vec<EncLocalInfo> {
        self.slots
    }
}

/// Hoisted variable and awaiter slots of a state machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateMachineBodyInfo {
    /// Metadata name of the state machine type
    pub type_name: String,
    /// Hoisted variable slots; the index is the slot number encoded in the field name
    pub hoisted_slots: Vec<EncHoistedLocalInfo>,
    /// Awaiter types by slot; `None` marks an unused slot
    pub awaiter_slots: Vec<Option<TypeRef>>,
}

/// Assigns hoisted variable and awaiter slots of an updated state machine.
pub struct StateMachineSlotBuilder<'a> {
    allocator: Option<&'a EncVariableSlotAllocator>,
    type_name: String,
    hoisted: Vec<EncHoistedLocalInfo>,
    hoisted_reserved: Vec<bool>,
    awaiters: Vec<Option<TypeRef>>,
    awaiters_reserved: Vec<bool>,
}

impl<'a> StateMachineSlotBuilder<'a> {
    /// Creates a builder. With an allocator the previous slot counts are reserved up
    /// front and the previous type name is kept.
    #[must_use]
    pub fn new(type_name: &str, allocator: Option<&'a EncVariableSlotAllocator>) -> Self {
        let (type_name, hoisted_count, awaiter_count) = match allocator {
            Some(allocator) => (
                allocator
                    .previous_state_machine_type_name()
                    .unwrap_or(type_name)
                    .to_string(),
                allocator.previous_hoisted_local_slot_count(),
                allocator.previous_awaiter_slot_count(),
            ),
            None => (type_name.to_string(), 0, 0),
        };

        StateMachineSlotBuilder {
            allocator,
            type_name,
            hoisted: vec![EncHoistedLocalInfo::unused(); hoisted_count as usize],
            hoisted_reserved: vec![true; hoisted_count as usize],
            awaiters: vec![None; awaiter_count as usize],
            awaiters_reserved: vec![true; awaiter_count as usize],
        }
    }

    /// Returns the state machine type name to emit.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Hoists a variable and returns its slot index.
    pub fn hoist(&mut self, slot: LocalSlotDebugInfo, local_type: TypeRef) -> u32 {
        if let Some(index) = self.allocator.and_then(|allocator| {
            allocator.try_get_previous_hoisted_local_slot_index(slot, &local_type)
        }) {
            let index = index as usize;
            if self.hoisted_reserved.get(index).copied().unwrap_or(false) {
                self.hoisted_reserved[index] = false;
                self.hoisted[index] = EncHoistedLocalInfo::new(slot, local_type);
                return index as u32;
            }
        }

        self.hoisted.push(EncHoistedLocalInfo::new(slot, local_type));
        self.hoisted_reserved.push(false);
        (self.hoisted.len() - 1) as u32
    }

    /// Returns the awaiter slot for `awaiter_type`; awaiters of one type share a slot.
    pub fn awaiter(&mut self, awaiter_type: TypeRef) -> u32 {
        if let Some(index) = self
            .awaiters
            .iter()
            .zip(&self.awaiters_reserved)
            .position(|(existing, reserved)| !reserved && existing.as_ref() == Some(&awaiter_type))
        {
            return index as u32;
        }

        if let Some(index) = self
            .allocator
            .and_then(|allocator| allocator.try_get_previous_awaiter_slot_index(&awaiter_type))
        {
            let index = index as usize;
            if self.awaiters_reserved.get(index).copied().unwrap_or(false) {
                self.awaiters_reserved[index] = false;
                self.awaiters[index] = Some(awaiter_type);
                return index as u32;
            }
        }

        self.awaiters.push(Some(awaiter_type));
        self.awaiters_reserved.push(false);
        (self.awaiters.len() - 1) as u32
    }

    /// Returns the final slot layout.
    #[must_use]
    pub fn finish(self) -> StateMachineBodyInfo {
        StateMachineBodyInfo {
            type_name: self.type_name,
            hoisted_slots: self.hoisted,
            awaiter_slots: self
                .awaiters
                .into_iter()
                .zip(self.awaiters_reserved)
                .map(|(awaiter, reserved)| if reserved { None } else { awaiter })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::debuginfo::LocalDebugId;

    fn user(offset: i32) -> LocalSlotDebugInfo {
        LocalSlotDebugInfo::new(SynthesizedLocalKind::UserDefined, LocalDebugId::new(offset, 0))
    }

    #[test]
    fn test_long_lived_kinds() {
        assert!(!SynthesizedLocalKind::EmitterTemp.is_long_lived());
        assert!(!SynthesizedLocalKind::LoweringTemp.is_long_lived());
        assert!(SynthesizedLocalKind::UserDefined.is_long_lived());
        assert!(SynthesizedLocalKind::LambdaDisplayClass.is_long_lived());
        assert_eq!(
            SynthesizedLocalKind::from_i32(SynthesizedLocalKind::Using.value()),
            Some(SynthesizedLocalKind::Using)
        );
        assert_eq!(SynthesizedLocalKind::from_i32(-1), None);
    }

    #[test]
    fn test_local_identity_ignores_signature() {
        let first = EncLocalInfo::new(user(10), TypeRef::int32(), LocalConstraints::empty());
        let second = first.clone().with_signature(vec![0x08]);
        assert_eq!(first, second);

        let pinned = EncLocalInfo::new(user(10), TypeRef::int32(), LocalConstraints::PINNED);
        assert_ne!(first, pinned);

        let unused = EncLocalInfo::unused(Some(vec![0x08]));
        assert!(unused.is_unused());
        assert_eq!(second.to_tombstone().signature, Some(vec![0x08]));
    }

    #[test]
    fn test_builder_without_allocator_appends() {
        let mut builder = LocalSlotBuilder::new(None);
        assert!(builder.is_empty());
        assert_eq!(
            builder.declare(EncLocalInfo::new(user(0), TypeRef::int32(), LocalConstraints::empty())),
            0
        );
        assert_eq!(builder.declare_temp(TypeRef::string(), LocalConstraints::empty()), 1);
        let slots = builder.finish();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[1].slot.kind, SynthesizedLocalKind::LoweringTemp);
    }

    #[test]
    fn test_state_machine_builder_shares_awaiter_slots() {
        let awaiter = TypeRef::External(crate::symbols::types::ExternalType::value_type(
            "System.Runtime",
            "System.Runtime.CompilerServices",
            "TaskAwaiter",
        ));
        let mut builder = StateMachineSlotBuilder::new("<M>d__0", None);
        assert_eq!(builder.hoist(user(5), TypeRef::int32()), 0);
        assert_eq!(builder.awaiter(awaiter.clone()), 0);
        assert_eq!(builder.awaiter(awaiter.clone()), 0);
        assert_eq!(builder.awaiter(TypeRef::object()), 1);

        let info = builder.finish();
        assert_eq!(info.type_name, "<M>d__0");
        assert_eq!(info.hoisted_slots.len(), 1);
        assert_eq!(info.awaiter_slots, vec![Some(awaiter), Some(TypeRef::object())]);
    }
}
