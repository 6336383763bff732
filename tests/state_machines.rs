//! Integration tests for hoisted variables of state machines.
//!
//! A suspended async method keeps its variables in fields of the state machine. Every
//! variable must stay in its field across generations, and the awaiter fields must keep
//! their slots too.

mod common;

use std::{cell::RefCell, sync::Arc};

use common::*;
use dotdelta::{prelude::*, symbols::StateMachineKind};

fn user_local(syntax_offset: i32) -> LocalSlotDebugInfo {
    LocalSlotDebugInfo::new(
        SynthesizedLocalKind::UserDefined,
        LocalDebugId::new(syntax_offset, 0),
    )
}

fn awaiter() -> TypeRef {
    TypeRef::External(ExternalType::value_type(
        "System.Runtime",
        "System.Runtime.CompilerServices",
        "TaskAwaiter",
    ))
}

/// `async void RunAsync()` hoisting `int count` (offset 10) and `string text` (offset 20).
fn async_program() -> Arc<Compilation> {
    program(|builder, class| {
        let mut data = MethodData::new(MethodSignature::instance(TypeRef::void(), vec![]));
        data.state_machine = Some(StateMachineKind::Async);
        data.body_position = 200;
        let kickoff = builder.add_method(class, "RunAsync", data);

        let machine = builder.add_type(class, "<RunAsync>d__0", TypeData::class());
        builder.mark_synthesized(machine, kickoff, true);
        builder.add_field(machine, "<count>5__1", FieldData::new(TypeRef::int32()));
        builder.add_field(machine, "<text>5__2", FieldData::new(TypeRef::string()));
        builder.add_field(machine, "<>u__1", FieldData::new(awaiter()));
    })
}

fn original_baseline(compilation0: &Arc<Compilation>) -> EmitBaseline {
    let kickoff = find(compilation0, "N.C.RunAsync");
    initial_baseline_with(compilation0, |module| {
        module.with_debug_info(
            kickoff,
            EditAndContinueMethodDebugInformation {
                method_ordinal: 0,
                local_slots: vec![user_local(10), user_local(20)],
                lambdas: Vec::new(),
                closures: Vec::new(),
            },
        )
    })
}

fn update_kickoff(
    baseline: &EmitBaseline,
    previous: &Arc<Compilation>,
    current: &Arc<Compilation>,
    bodies: &dyn MethodBodyProvider,
) -> EmitBaseline {
    let result = emit(
        baseline,
        current,
        &[SemanticEdit::update(
            find(previous, "N.C.RunAsync"),
            find(current, "N.C.RunAsync"),
        )
        .preserving_locals()],
        bodies,
    );
    let (delta, next, updated) = succeeded(result);
    let kickoff = baseline
        .module()
        .token(find(baseline.module().compilation(), "N.C.RunAsync"))
        .expect("kickoff has a row");
    assert_eq!(updated, vec![kickoff]);
    assert!(delta.enc_map.contains(kickoff));
    next
}

#[test]
fn hoisted_variables_keep_their_fields() -> Result<()> {
    let compilation0 = async_program();
    let baseline0 = original_baseline(&compilation0);
    let row = baseline0
        .module()
        .token(find(&compilation0, "N.C.RunAsync"))
        .expect("kickoff has a row")
        .row();

    // Generation 1 hoists the variables in reverse order.
    let assigned = RefCell::new(Vec::new());
    let reversed = |_: &Compilation,
                    _: SymbolId,
                    allocator: Option<&EncVariableSlotAllocator>|
     -> Result<MethodBody> {
        let allocator = allocator.expect("kickoff method should get an allocator");
        assert_eq!(allocator.previous_hoisted_local_slot_count(), 2);
        assert_eq!(allocator.previous_awaiter_slot_count(), 1);

        let mut fields = StateMachineSlotBuilder::new("<RunAsync>d__5", Some(allocator));
        let text = fields.hoist(user_local(20), TypeRef::string());
        let count = fields.hoist(user_local(10), TypeRef::int32());
        let awaiter_slot = fields.awaiter(awaiter());
        assigned.borrow_mut().push((text, count, awaiter_slot));
        Ok(MethodBody::new(vec![0x2A], 8).with_state_machine(fields.finish()))
    };
    let compilation1 = async_program();
    let baseline1 = update_kickoff(&baseline0, &compilation0, &compilation1, &reversed);

    assert_eq!(assigned.borrow().as_slice(), &[(1, 0, 0)]);
    let info = baseline1
        .added_or_changed_method(row)
        .expect("kickoff method is recorded");
    assert_eq!(info.state_machine_type_name.as_deref(), Some("<RunAsync>d__0"));
    assert_eq!(info.hoisted_locals.len(), 2);
    assert_eq!(info.hoisted_locals[0].local_type, Some(TypeRef::int32()));
    assert_eq!(info.hoisted_locals[1].local_type, Some(TypeRef::string()));
    assert_eq!(info.awaiter_slots, Some(vec![Some(awaiter())]));

    // Generation 2 drops `text`; its field stays reserved.
    let kept = RefCell::new(Vec::new());
    let count_only = |_: &Compilation,
                      _: SymbolId,
                      allocator: Option<&EncVariableSlotAllocator>|
     -> Result<MethodBody> {
        let allocator = allocator.expect("kickoff method should get an allocator");
        assert_eq!(
            allocator.previous_state_machine_type_name(),
            Some("<RunAsync>d__0")
        );
        let mut fields = StateMachineSlotBuilder::new("<RunAsync>d__9", Some(allocator));
        let count = fields.hoist(user_local(10), TypeRef::int32());
        let awaiter_slot = fields.awaiter(awaiter());
        kept.borrow_mut().push((count, awaiter_slot));
        Ok(MethodBody::new(vec![0x2A], 8).with_state_machine(fields.finish()))
    };
    let compilation2 = async_program();
    let baseline2 = update_kickoff(&baseline1, &compilation1, &compilation2, &count_only);

    assert_eq!(kept.borrow().as_slice(), &[(0, 0)]);
    let info = baseline2
        .added_or_changed_method(row)
        .expect("kickoff method is recorded");
    assert_eq!(info.hoisted_locals.len(), 2);
    assert_eq!(info.hoisted_locals[0].local_type, Some(TypeRef::int32()));
    assert!(info.hoisted_locals[1].is_unused());
    assert_eq!(info.awaiter_slots, Some(vec![Some(awaiter())]));
    Ok(())
}
