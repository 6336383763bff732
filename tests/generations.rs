//! Integration tests for emitting chains of generations.
//!
//! These tests drive several edits against the same original module and verify that
//! existing definitions keep their tokens, that added rows extend the tables of the
//! previous generation and that the baseline accumulates correctly.

mod common;

use common::*;
use dotdelta::prelude::*;

#[test]
fn updated_method_keeps_token_across_generations() -> Result<()> {
    let compilation0 = standard_program();
    let baseline0 = initial_baseline(&compilation0);

    let compilation1 = standard_program();
    let result = emit(
        &baseline0,
        &compilation1,
        &[SemanticEdit::update(
            find(&compilation0, "N.C.M"),
            find(&compilation1, "N.C.M"),
        )],
        &ret_body,
    );
    let (delta1, baseline1, updated) = succeeded(result);

    assert_eq!(delta1.generation, 1);
    assert_eq!(map_of(&delta1), vec![METHOD_M]);
    assert_eq!(
        log_of(&delta1),
        vec![(METHOD_M, EditAndContinueOperation::Default)]
    );
    assert_eq!(updated, vec![Token::new(METHOD_M)]);

    let compilation2 = standard_program();
    let result = emit(
        &baseline1,
        &compilation2,
        &[SemanticEdit::update(
            find(&compilation1, "N.C.M"),
            find(&compilation2, "N.C.M"),
        )],
        &ret_body,
    );
    let (delta2, baseline2, updated) = succeeded(result);

    assert_eq!(delta2.generation, 2);
    assert_eq!(map_of(&delta2), vec![METHOD_M]);
    assert_eq!(updated, vec![Token::new(METHOD_M)]);
    assert_eq!(baseline2.ordinal(), 2);
    assert_eq!(
        baseline2.table_sizes()[TableId::MethodDef],
        baseline0.table_sizes()[TableId::MethodDef]
    );
    Ok(())
}

#[test]
fn added_methods_extend_previous_generation() -> Result<()> {
    let compilation0 = standard_program();
    let baseline0 = initial_baseline(&compilation0);

    let add_g = |builder: &mut CompilationBuilder, class: SymbolId| {
        builder.add_method(
            class,
            "G",
            MethodData::new(MethodSignature::instance(TypeRef::void(), vec![])),
        );
    };

    let compilation1 = program(add_g);
    let result = emit(
        &baseline0,
        &compilation1,
        &[SemanticEdit::insert(find(&compilation1, "N.C.G"))],
        &ret_body,
    );
    let (delta1, baseline1, updated) = succeeded(result);

    assert_eq!(map_of(&delta1), vec![0x0600_0003]);
    assert_eq!(
        log_of(&delta1),
        vec![
            (CLASS_C, EditAndContinueOperation::AddMethod),
            (0x0600_0003, EditAndContinueOperation::Default),
        ]
    );
    assert!(updated.is_empty());
    assert_eq!(delta1.tables.methods.len(), 1);
    assert_ne!(delta1.tables.methods[0].rva, 0);

    let compilation2 = program(|builder, class| {
        add_g(builder, class);
        builder.add_method(
            class,
            "H",
            MethodData::new(MethodSignature::instance(TypeRef::void(), vec![])),
        );
    });
    let result = emit(
        &baseline1,
        &compilation2,
        &[SemanticEdit::insert(find(&compilation2, "N.C.H"))],
        &ret_body,
    );
    let (delta2, baseline2, _) = succeeded(result);

    assert_eq!(map_of(&delta2), vec![0x0600_0004]);
    assert_eq!(
        log_of(&delta2),
        vec![
            (CLASS_C, EditAndContinueOperation::AddMethod),
            (0x0600_0004, EditAndContinueOperation::Default),
        ]
    );
    assert_eq!(baseline2.table_sizes()[TableId::MethodDef], 4);
    assert_eq!(baseline2.table_entries_added()[TableId::MethodDef], 2);

    // G was added by generation 1 and keeps its row when updated later.
    let compilation3 = program(|builder, class| {
        add_g(builder, class);
        builder.add_method(
            class,
            "H",
            MethodData::new(MethodSignature::instance(TypeRef::void(), vec![])),
        );
    });
    let result = emit(
        &baseline2,
        &compilation3,
        &[SemanticEdit::update(
            find(&compilation2, "N.C.G"),
            find(&compilation3, "N.C.G"),
        )],
        &ret_body,
    );
    let (delta3, _, updated) = succeeded(result);
    assert_eq!(map_of(&delta3), vec![0x0600_0003]);
    assert_eq!(updated, vec![Token::new(0x0600_0003)]);
    Ok(())
}

#[test]
fn added_members_log_their_parents() -> Result<()> {
    let compilation0 = standard_program();
    let baseline0 = initial_baseline(&compilation0);

    let compilation1 = program(|builder, class| {
        builder.add_field(class, "total", FieldData::new(TypeRef::int32()));
        let mut add = MethodData::new(MethodSignature::instance(
            TypeRef::void(),
            vec![TypeRef::int32()],
        ));
        add.parameters.push(Parameter::new("value", 1));
        builder.add_method(class, "Add", add);
    });
    let result = emit(
        &baseline0,
        &compilation1,
        &[
            SemanticEdit::insert(find(&compilation1, "N.C.total")),
            SemanticEdit::insert(find(&compilation1, "N.C.Add")),
        ],
        &ret_body,
    );
    let (delta, baseline1, _) = succeeded(result);

    assert_eq!(
        log_of(&delta),
        vec![
            (CLASS_C, EditAndContinueOperation::AddField),
            (0x0400_0002, EditAndContinueOperation::Default),
            (CLASS_C, EditAndContinueOperation::AddMethod),
            (0x0600_0003, EditAndContinueOperation::Default),
            (0x0600_0003, EditAndContinueOperation::AddParameter),
            (0x0800_0002, EditAndContinueOperation::Default),
        ]
    );
    assert_eq!(map_of(&delta), vec![0x0400_0002, 0x0600_0003, 0x0800_0002]);
    assert_eq!(delta.tables.params.len(), 1);
    assert_eq!(delta.tables.params[0].sequence, 1);
    assert_eq!(baseline1.table_sizes()[TableId::Param], 2);
    assert_eq!(baseline1.table_sizes()[TableId::Field], 2);
    Ok(())
}

#[test]
fn baseline_accumulates_sizes_and_ids() -> Result<()> {
    let compilation0 = standard_program();
    let baseline0 = initial_baseline(&compilation0);
    assert_eq!(baseline0.ordinal(), 0);

    let compilation1 = program(|builder, class| {
        builder.add_method(
            class,
            "G",
            MethodData::new(MethodSignature::instance(TypeRef::void(), vec![])),
        );
    });
    let result = emit(
        &baseline0,
        &compilation1,
        &[SemanticEdit::insert(find(&compilation1, "N.C.G"))],
        &ret_body,
    );
    let (delta1, baseline1, _) = succeeded(result);

    assert_eq!(delta1.enc_base_id, baseline0.enc_id());
    assert_eq!(baseline1.enc_id(), delta1.enc_id);
    assert_ne!(delta1.enc_id, baseline0.enc_id());
    assert_eq!(
        baseline1.heap_starts(),
        baseline0.heap_starts().plus(&delta1.heaps.sizes())
    );
    for table in [TableId::TypeDef, TableId::Field, TableId::MethodDef, TableId::Param] {
        assert_eq!(
            baseline1.table_sizes()[table],
            baseline0.table_sizes()[table] + baseline1.table_entries_added()[table]
        );
    }

    let compilation2 = program(|builder, class| {
        builder.add_method(
            class,
            "G",
            MethodData::new(MethodSignature::instance(TypeRef::void(), vec![])),
        );
    });
    let result = emit(
        &baseline1,
        &compilation2,
        &[SemanticEdit::update(
            find(&compilation1, "N.C.G"),
            find(&compilation2, "N.C.G"),
        )],
        &ret_body,
    );
    let (delta2, baseline2, _) = succeeded(result);

    assert_eq!(delta2.enc_base_id, delta1.enc_id);
    assert_eq!(
        baseline2.heap_starts(),
        baseline1.heap_starts().plus(&delta2.heaps.sizes())
    );
    assert_eq!(baseline2.table_sizes()[TableId::MethodDef], 3);
    assert!(baseline2.added_or_changed_method(3).is_some());
    Ok(())
}

#[test]
fn cancelled_emission_returns_error() {
    let compilation0 = standard_program();
    let baseline0 = initial_baseline(&compilation0);
    let compilation1 = standard_program();

    let cancellation = CancellationToken::new();
    cancellation.cancel();
    let result = emit_difference(
        &baseline0,
        compilation1.clone(),
        &[SemanticEdit::update(
            find(&compilation0, "N.C.M"),
            find(&compilation1, "N.C.M"),
        )],
        &ret_body,
        &EmitOptions::default(),
        &cancellation,
    );
    assert!(matches!(result, Err(Error::Cancelled)));
}
