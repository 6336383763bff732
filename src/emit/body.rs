//! Method bodies handed to the writer by the code generator.

use crate::{
    emit::{
        debuginfo::{ClosureDebugInfo, LambdaDebugInfo},
        locals::{EncLocalInfo, StateMachineBodyInfo},
    },
    metadata::body::throwing_stub_il,
    symbols::types::MemberReference,
};

/// A 4-byte token operand in IL that the writer patches once the target's row is known.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenFixup {
    /// Offset of the operand in the IL
    pub offset: u32,
    /// Entity the operand refers to
    pub target: MemberReference,
}

/// A generated method body.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MethodBody {
    /// IL code with zeroed token operands
    pub il: Vec<u8>,
    /// Maximum evaluation stack depth
    pub max_stack: u16,
    /// Zero-initialize locals
    pub init_locals: bool,
    /// Local slots, usually produced by [`crate::emit::LocalSlotBuilder`]
    pub locals: Vec<EncLocalInfo>,
    /// Token operands to patch
    pub fixups: Vec<TokenFixup>,
    /// Lambdas declared in the body
    pub lambdas: Vec<LambdaDebugInfo>,
    /// Closures created by the body
    pub closures: Vec<ClosureDebugInfo>,
    /// Slot layout of the state machine, for kickoff methods
    pub state_machine: Option<StateMachineBodyInfo>,
}

impl MethodBody {
    /// Creates a body without locals.
    #[must_use]
    pub fn new(il: Vec<u8>, max_stack: u16) -> Self {
        MethodBody {
            il,
            max_stack,
            ..Default::default()
        }
    }

    /// Adds a token operand.
    #[must_use]
    pub fn with_fixup(mut self, offset: u32, target: MemberReference) -> Self {
        self.fixups.push(TokenFixup { offset, target });
        self
    }

    /// Sets the local slot layout.
    #[must_use]
    pub fn with_locals(mut self, locals: Vec<EncLocalInfo>) -> Self {
        self.locals = locals;
        self
    }

    /// Sets the state machine slot layout.
    #[must_use]
    pub fn with_state_machine(mut self, state_machine: StateMachineBodyInfo) -> Self {
        self.state_machine = Some(state_machine);
        self
    }

    /// Body that throws `constructor`'s exception with `message`.
    #[must_use]
    pub fn throwing(message: &str, constructor: MemberReference) -> Self {
        let (il, message_offset, constructor_offset) = throwing_stub_il();
        MethodBody::new(il, 1)
            .with_fixup(message_offset, MemberReference::String(message.to_string()))
            .with_fixup(constructor_offset, constructor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::types::{
        ExternalMember, ExternalType, MemberSignature, MethodSignature, TypeRef,
    };

    #[test]
    fn test_throwing_body() {
        let constructor = MemberReference::External(ExternalMember {
            parent: TypeRef::External(ExternalType::class(
                "System.Runtime",
                "System",
                "MissingMethodException",
            )),
            name: ".ctor".to_string(),
            signature: MemberSignature::Method(MethodSignature::instance(
                TypeRef::void(),
                vec![TypeRef::string()],
            )),
        });

        let body = MethodBody::throwing("gone", constructor.clone());
        assert_eq!(body.max_stack, 1);
        assert_eq!(body.il.len(), 11);
        assert_eq!(body.fixups.len(), 2);
        assert_eq!(body.fixups[0].offset, 1);
        assert_eq!(body.fixups[0].target, MemberReference::String("gone".to_string()));
        assert_eq!(body.fixups[1].offset, 6);
        assert_eq!(body.fixups[1].target, constructor);
        assert!(body.locals.is_empty());
    }
}
