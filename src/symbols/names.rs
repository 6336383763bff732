//! Compiler-generated member names.
//!
//! State machines record the slot of every hoisted variable in the name of the field
//! that stores it, so the field layout of an emitted state machine type is enough to
//! rebuild its slot map. Slot numbers in names are 1-based, slot indices are 0-based.
//!
//! | Pattern          | Meaning                          |
//! |------------------|----------------------------------|
//! | `<name>5__N`     | hoisted user-defined local       |
//! | `<>s__N`         | hoisted synthesized local        |
//! | `<>u__N`         | awaiter                          |
//! | `<Method>d__N`   | state machine type               |
//! | `Name#G`         | type replaced in generation `G`  |

const HOISTED_LOCAL_MARKER: &str = ">5__";
const SYNTHESIZED_LOCAL_PREFIX: &str = "<>s__";
const AWAITER_PREFIX: &str = "<>u__";
const STATE_MACHINE_MARKER: &str = ">d__";

/// A state machine field classified by its name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StateMachineField<'a> {
    /// Hoisted user-defined local with its declared name and slot index
    HoistedLocal {
        /// Name of the local in source
        name: &'a str,
        /// 0-based slot index
        slot: u32,
    },
    /// Hoisted compiler-generated local
    SynthesizedLocal {
        /// 0-based slot index
        slot: u32,
    },
    /// Awaiter field
    Awaiter {
        /// 0-based slot index
        slot: u32,
    },
}

impl StateMachineField<'_> {
    /// Returns the slot index recorded in the name.
    #[must_use]
    pub fn slot(&self) -> u32 {
        match self {
            StateMachineField::HoistedLocal { slot, .. }
            | StateMachineField::SynthesizedLocal { slot }
            | StateMachineField::Awaiter { slot } => *slot,
        }
    }
}

fn parse_slot_number(digits: &str) -> Option<u32> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u32>().ok()?.checked_sub(1)
}

/// Classifies a state machine field name. Returns `None` for fields that do not hold
/// variables (`<>1__state`, `<>4__this`, parameter copies, ...).
#[must_use]
pub fn parse_state_machine_field(name: &str) -> Option<StateMachineField<'_>> {
    if let Some(rest) = name.strip_prefix(SYNTHESIZED_LOCAL_PREFIX) {
        return parse_slot_number(rest).map(|slot| StateMachineField::SynthesizedLocal { slot });
    }
    if let Some(rest) = name.strip_prefix(AWAITER_PREFIX) {
        return parse_slot_number(rest).map(|slot| StateMachineField::Awaiter { slot });
    }

    let inner = name.strip_prefix('<')?;
    let marker = inner.find(HOISTED_LOCAL_MARKER)?;
    let local_name = &inner[..marker];
    if local_name.is_empty() {
        return None;
    }
    parse_slot_number(&inner[marker + HOISTED_LOCAL_MARKER.len()..])
        .map(|slot| StateMachineField::HoistedLocal {
            name: local_name,
            slot,
        })
}

/// Name of the field storing hoisted user local `name` in slot `slot`.
#[must_use]
pub fn hoisted_local_field_name(name: &str, slot: u32) -> String {
    format!("<{}>5__{}", name, slot + 1)
}

/// Name of the field storing a hoisted synthesized local in slot `slot`.
#[must_use]
pub fn synthesized_local_field_name(slot: u32) -> String {
    format!("{}{}", SYNTHESIZED_LOCAL_PREFIX, slot + 1)
}

/// Name of the field storing the awaiter in slot `slot`.
#[must_use]
pub fn awaiter_field_name(slot: u32) -> String {
    format!("{}{}", AWAITER_PREFIX, slot + 1)
}

/// Name of the state machine type generated for `method`.
#[must_use]
pub fn state_machine_type_name(method: &str, ordinal: u32) -> String {
    format!("<{}>d__{}", method, ordinal)
}

/// Returns the kickoff method name encoded in a state machine type name.
#[must_use]
pub fn parse_state_machine_type_name(name: &str) -> Option<&str> {
    let inner = name.strip_prefix('<')?;
    let marker = inner.rfind(STATE_MACHINE_MARKER)?;
    let digits = &inner[marker + STATE_MACHINE_MARKER.len()..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(&inner[..marker])
}

/// Metadata name of a type replaced in `generation`.
#[must_use]
pub fn replaced_type_name(name: &str, generation: u32) -> String {
    format!("{}#{}", name, generation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hoisted_fields() {
        assert_eq!(
            parse_state_machine_field("<count>5__2"),
            Some(StateMachineField::HoistedLocal {
                name: "count",
                slot: 1
            })
        );
        assert_eq!(
            parse_state_machine_field("<>s__1"),
            Some(StateMachineField::SynthesizedLocal { slot: 0 })
        );
        assert_eq!(
            parse_state_machine_field("<>u__3"),
            Some(StateMachineField::Awaiter { slot: 2 })
        );
    }

    #[test]
    fn test_reject_other_fields() {
        assert_eq!(parse_state_machine_field("<>1__state"), None);
        assert_eq!(parse_state_machine_field("<>4__this"), None);
        assert_eq!(parse_state_machine_field("<x>5__"), None);
        assert_eq!(parse_state_machine_field("<x>5__0"), None);
        assert_eq!(parse_state_machine_field("<>5__1"), None);
        assert_eq!(parse_state_machine_field("value"), None);
    }

    #[test]
    fn test_generated_names_parse_back() {
        let name = hoisted_local_field_name("item", 4);
        assert_eq!(name, "<item>5__5");
        assert_eq!(parse_state_machine_field(&name).map(|f| f.slot()), Some(4));
        assert_eq!(
            parse_state_machine_field(&awaiter_field_name(0)).map(|f| f.slot()),
            Some(0)
        );
        assert_eq!(
            parse_state_machine_field(&synthesized_local_field_name(7)).map(|f| f.slot()),
            Some(7)
        );
    }

    #[test]
    fn test_state_machine_type_names() {
        let name = state_machine_type_name("RunAsync", 3);
        assert_eq!(name, "<RunAsync>d__3");
        assert_eq!(parse_state_machine_type_name(&name), Some("RunAsync"));
        assert_eq!(parse_state_machine_type_name("<>c__DisplayClass0_0"), None);
        assert_eq!(replaced_type_name("Widget", 2), "Widget#2");
    }
}
