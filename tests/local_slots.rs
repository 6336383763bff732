//! Integration tests for local slot preservation.
//!
//! A method whose variables are live in a suspended frame must keep every variable in
//! the slot it had, across any number of generations. New variables take fresh slots and
//! removed variables leave their slot unused.

mod common;

use std::{cell::RefCell, sync::Arc};

use common::*;
use dotdelta::prelude::*;

fn user_local(syntax_offset: i32) -> LocalSlotDebugInfo {
    LocalSlotDebugInfo::new(
        SynthesizedLocalKind::UserDefined,
        LocalDebugId::new(syntax_offset, 0),
    )
}

fn identity_syntax_map() -> SyntaxMapper {
    Arc::new(|position: u32| Some(position))
}

fn boolean() -> TypeRef {
    TypeRef::Primitive(PrimitiveType::Boolean)
}

/// Generation 0 of `M` declares `int count` at offset 10 and `string text` at offset 20.
fn original_baseline(compilation0: &Arc<Compilation>) -> EmitBaseline {
    let m = find(compilation0, "N.C.M");
    initial_baseline_with(compilation0, |module| {
        module
            .with_locals(
                m,
                vec![
                    (TypeRef::int32(), LocalConstraints::empty()),
                    (TypeRef::string(), LocalConstraints::empty()),
                ],
            )
            .with_debug_info(
                m,
                EditAndContinueMethodDebugInformation {
                    method_ordinal: 0,
                    local_slots: vec![user_local(10), user_local(20)],
                    lambdas: Vec::new(),
                    closures: Vec::new(),
                },
            )
    })
}

#[test]
fn variables_keep_their_slots() -> Result<()> {
    let compilation0 = standard_program();
    let baseline0 = original_baseline(&compilation0);
    let compilation1 = standard_program();

    let assigned = RefCell::new(Vec::new());
    let bodies = |_: &Compilation,
                  _: SymbolId,
                  allocator: Option<&EncVariableSlotAllocator>|
     -> Result<MethodBody> {
        assert!(allocator.is_some(), "updated method should get an allocator");
        let mut slots = LocalSlotBuilder::new(allocator);
        let text = slots.declare(EncLocalInfo::new(
            user_local(20),
            TypeRef::string(),
            LocalConstraints::empty(),
        ));
        let flag = slots.declare(EncLocalInfo::new(
            user_local(30),
            boolean(),
            LocalConstraints::empty(),
        ));
        let count = slots.declare(EncLocalInfo::new(
            user_local(10),
            TypeRef::int32(),
            LocalConstraints::empty(),
        ));
        assigned.borrow_mut().push(vec![text, flag, count]);
        Ok(MethodBody::new(vec![0x2A], 8).with_locals(slots.finish()))
    };

    let result = emit(
        &baseline0,
        &compilation1,
        &[SemanticEdit::update(
            find(&compilation0, "N.C.M"),
            find(&compilation1, "N.C.M"),
        )
        .with_syntax_map(identity_syntax_map())],
        &bodies,
    );
    let (delta1, baseline1, _) = succeeded(result);

    assert_eq!(assigned.borrow().as_slice(), &[vec![1, 2, 0]]);
    assert_eq!(delta1.tables.stand_alone_sigs.len(), 1);
    let signature = delta1.tables.stand_alone_sigs[0].rid;
    assert_eq!(
        signature,
        baseline0.table_sizes()[TableId::StandAloneSig] + 1
    );
    assert!(delta1
        .enc_map
        .contains(Token::from_parts(TableId::StandAloneSig, signature)));

    let info = baseline1
        .added_or_changed_method(1)
        .expect("updated method is recorded");
    assert_eq!(info.locals.len(), 3);
    assert_eq!(info.locals[0].local_type, Some(TypeRef::int32()));
    assert_eq!(info.locals[1].local_type, Some(TypeRef::string()));
    assert_eq!(info.locals[2].local_type, Some(boolean()));
    Ok(())
}

#[test]
fn variables_keep_their_slots_without_syntax_map() -> Result<()> {
    let compilation0 = standard_program();
    let baseline0 = original_baseline(&compilation0);
    let compilation1 = standard_program();

    let assigned = RefCell::new(Vec::new());
    let bodies = |_: &Compilation,
                  _: SymbolId,
                  allocator: Option<&EncVariableSlotAllocator>|
     -> Result<MethodBody> {
        let mut slots = LocalSlotBuilder::new(allocator);
        let text = slots.declare(EncLocalInfo::new(
            user_local(20),
            TypeRef::string(),
            LocalConstraints::empty(),
        ));
        let flag = slots.declare(EncLocalInfo::new(
            user_local(30),
            boolean(),
            LocalConstraints::empty(),
        ));
        let count = slots.declare(EncLocalInfo::new(
            user_local(10),
            TypeRef::int32(),
            LocalConstraints::empty(),
        ));
        assigned.borrow_mut().push(vec![text, flag, count]);
        Ok(MethodBody::new(vec![0x2A], 8).with_locals(slots.finish()))
    };

    let result = emit(
        &baseline0,
        &compilation1,
        &[SemanticEdit::update(
            find(&compilation0, "N.C.M"),
            find(&compilation1, "N.C.M"),
        )
        .preserving_locals()],
        &bodies,
    );
    succeeded(result);

    assert_eq!(assigned.borrow().as_slice(), &[vec![1, 2, 0]]);
    Ok(())
}

#[test]
fn unused_slot_keeps_its_type_across_deltas() -> Result<()> {
    let compilation0 = standard_program();
    let baseline0 = initial_baseline(&compilation0);

    // Generation 1 declares `int count` and `string text` in a fresh frame.
    let declare_both = |_: &Compilation,
                        _: SymbolId,
                        allocator: Option<&EncVariableSlotAllocator>|
     -> Result<MethodBody> {
        let mut slots = LocalSlotBuilder::new(allocator);
        slots.declare(EncLocalInfo::new(
            user_local(10),
            TypeRef::int32(),
            LocalConstraints::empty(),
        ));
        slots.declare(EncLocalInfo::new(
            user_local(20),
            TypeRef::string(),
            LocalConstraints::empty(),
        ));
        Ok(MethodBody::new(vec![0x2A], 8).with_locals(slots.finish()))
    };
    let compilation1 = standard_program();
    let result = emit(
        &baseline0,
        &compilation1,
        &[SemanticEdit::update(
            find(&compilation0, "N.C.M"),
            find(&compilation1, "N.C.M"),
        )],
        &declare_both,
    );
    let (_, baseline1, _) = succeeded(result);

    // Generation 2 drops `count` and adds `bool flag`.
    let assigned = RefCell::new(Vec::new());
    let drop_count = |_: &Compilation,
                      _: SymbolId,
                      allocator: Option<&EncVariableSlotAllocator>|
     -> Result<MethodBody> {
        let mut slots = LocalSlotBuilder::new(allocator);
        let text = slots.declare(EncLocalInfo::new(
            user_local(20),
            TypeRef::string(),
            LocalConstraints::empty(),
        ));
        let flag = slots.declare(EncLocalInfo::new(
            user_local(30),
            boolean(),
            LocalConstraints::empty(),
        ));
        assigned.borrow_mut().push((text, flag));
        Ok(MethodBody::new(vec![0x2A], 8).with_locals(slots.finish()))
    };
    let compilation2 = standard_program();
    let result = emit(
        &baseline1,
        &compilation2,
        &[SemanticEdit::update(
            find(&compilation1, "N.C.M"),
            find(&compilation2, "N.C.M"),
        )
        .preserving_locals()],
        &drop_count,
    );
    let (delta2, baseline2, _) = succeeded(result);

    assert_eq!(assigned.borrow().as_slice(), &[(1, 2)]);
    assert_eq!(delta2.tables.stand_alone_sigs.len(), 1);
    // The unused slot 0 is still an int32, not an object.
    assert_eq!(
        blob(
            &delta2,
            baseline1.heap_starts().blobs,
            delta2.tables.stand_alone_sigs[0].signature
        ),
        vec![0x07, 0x03, 0x08, 0x0E, 0x02]
    );
    let info = baseline2
        .added_or_changed_method(1)
        .expect("updated method is recorded");
    assert!(info.locals[0].is_unused());
    Ok(())
}

#[test]
fn removed_variable_leaves_its_slot_unused() -> Result<()> {
    let compilation0 = standard_program();
    let baseline0 = original_baseline(&compilation0);

    let declare_all = |_: &Compilation,
                       _: SymbolId,
                       allocator: Option<&EncVariableSlotAllocator>|
     -> Result<MethodBody> {
        let mut slots = LocalSlotBuilder::new(allocator);
        for (offset, local_type) in [(10, TypeRef::int32()), (20, TypeRef::string()), (30, boolean())] {
            slots.declare(EncLocalInfo::new(
                user_local(offset),
                local_type,
                LocalConstraints::empty(),
            ));
        }
        Ok(MethodBody::new(vec![0x2A], 8).with_locals(slots.finish()))
    };

    let compilation1 = standard_program();
    let result = emit(
        &baseline0,
        &compilation1,
        &[SemanticEdit::update(
            find(&compilation0, "N.C.M"),
            find(&compilation1, "N.C.M"),
        )
        .with_syntax_map(identity_syntax_map())],
        &declare_all,
    );
    let (_, baseline1, _) = succeeded(result);

    // Generation 2 drops `text`, declared at offset 20.
    let finished = RefCell::new(Vec::new());
    let drop_text = |_: &Compilation,
                     _: SymbolId,
                     allocator: Option<&EncVariableSlotAllocator>|
     -> Result<MethodBody> {
        let mut slots = LocalSlotBuilder::new(allocator);
        let flag = slots.declare(EncLocalInfo::new(
            user_local(30),
            boolean(),
            LocalConstraints::empty(),
        ));
        let count = slots.declare(EncLocalInfo::new(
            user_local(10),
            TypeRef::int32(),
            LocalConstraints::empty(),
        ));
        assert_eq!((flag, count), (2, 0));
        let locals = slots.finish();
        finished.borrow_mut().extend(locals.iter().map(EncLocalInfo::is_unused));
        Ok(MethodBody::new(vec![0x2A], 8).with_locals(locals))
    };

    let compilation2 = standard_program();
    let result = emit(
        &baseline1,
        &compilation2,
        &[SemanticEdit::update(
            find(&compilation1, "N.C.M"),
            find(&compilation2, "N.C.M"),
        )
        .with_syntax_map(identity_syntax_map())],
        &drop_text,
    );
    let (_, baseline2, _) = succeeded(result);

    assert_eq!(finished.borrow().as_slice(), &[false, true, false]);
    let info = baseline2
        .added_or_changed_method(1)
        .expect("updated method is recorded");
    assert_eq!(info.locals.len(), 3);
    assert!(info.locals[1].is_unused());
    Ok(())
}

#[test]
fn moved_declaration_follows_syntax_map() -> Result<()> {
    let compilation0 = standard_program();
    let baseline0 = original_baseline(&compilation0);

    // Five characters were inserted before both declarations.
    let compilation1 = program(|_, _| {});
    let shifted: SyntaxMapper = Arc::new(|position: u32| position.checked_sub(5));

    let assigned = RefCell::new(Vec::new());
    let bodies = |_: &Compilation,
                  _: SymbolId,
                  allocator: Option<&EncVariableSlotAllocator>|
     -> Result<MethodBody> {
        let mut slots = LocalSlotBuilder::new(allocator);
        let text = slots.declare(EncLocalInfo::new(
            user_local(25),
            TypeRef::string(),
            LocalConstraints::empty(),
        ));
        let count = slots.declare(EncLocalInfo::new(
            user_local(15),
            TypeRef::int32(),
            LocalConstraints::empty(),
        ));
        assigned.borrow_mut().push((text, count));
        Ok(MethodBody::new(vec![0x2A], 8).with_locals(slots.finish()))
    };

    let result = emit(
        &baseline0,
        &compilation1,
        &[SemanticEdit::update(
            find(&compilation0, "N.C.M"),
            find(&compilation1, "N.C.M"),
        )
        .with_syntax_map(shifted)],
        &bodies,
    );
    succeeded(result);

    assert_eq!(assigned.borrow().as_slice(), &[(1, 0)]);
    Ok(())
}

#[test]
fn added_method_gets_no_allocator() -> Result<()> {
    let compilation0 = standard_program();
    let baseline0 = original_baseline(&compilation0);
    let compilation1 = program(|builder, class| {
        builder.add_method(
            class,
            "G",
            MethodData::new(MethodSignature::instance(TypeRef::void(), vec![])),
        );
    });

    let bodies = |_: &Compilation,
                  _: SymbolId,
                  allocator: Option<&EncVariableSlotAllocator>|
     -> Result<MethodBody> {
        assert!(allocator.is_none());
        Ok(MethodBody::new(vec![0x2A], 8))
    };
    let result = emit(
        &baseline0,
        &compilation1,
        &[SemanticEdit::insert(find(&compilation1, "N.C.G"))],
        &bodies,
    );
    succeeded(result);
    Ok(())
}
