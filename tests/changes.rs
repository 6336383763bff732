//! Integration tests for change propagation and reported diagnostics.
//!
//! Edits inside nested types, properties and generic types touch more than the edited
//! symbol. Problems caused by user code must make the emission unsuccessful without
//! producing a delta.

mod common;

use std::sync::Arc;

use common::*;
use dotdelta::{
    prelude::*,
    symbols::{GenericParameter, StateMachineKind},
};

fn with_nested(customize: impl FnOnce(&mut CompilationBuilder, SymbolId)) -> Arc<Compilation> {
    program(|builder, class| {
        let nested = builder.add_type(class, "D", TypeData::class());
        builder.add_method(
            nested,
            "Q",
            MethodData::new(MethodSignature::instance(TypeRef::void(), vec![])),
        );
        customize(builder, nested);
    })
}

fn generic_program(added: bool) -> Arc<Compilation> {
    program(|builder, _| {
        let global = builder.global_namespace();
        let namespace = builder.namespace(global, "N");
        let mut data = TypeData::class();
        data.generic_parameters.push(GenericParameter {
            name: "T".to_string(),
            number: 0,
            flags: GenericParamAttributes::empty(),
            constraints: Vec::new(),
        });
        let generic = builder.add_type(namespace, "G`1", data);
        builder.add_method(
            generic,
            "Existing",
            MethodData::new(MethodSignature::instance(TypeRef::void(), vec![])),
        );
        if added {
            builder.add_method(
                generic,
                "Added",
                MethodData::new(MethodSignature::instance(TypeRef::void(), vec![])),
            );
        }
    })
}

fn with_partial() -> Arc<Compilation> {
    program(|builder, class| {
        let signature = MethodSignature::instance(TypeRef::void(), vec![]);
        let definition = builder.add_method(class, "P", MethodData::new(signature.clone()));
        let implementation = builder.add_method(class, "P", MethodData::new(signature));
        builder.link_partial(definition, implementation);
    })
}

/// Returns the declaring and implementing parts of `N.C.P`.
fn partial_parts(compilation: &Compilation) -> (SymbolId, SymbolId) {
    let mut definition = None;
    let mut implementation = None;
    for symbol in compilation
        .symbols()
        .filter(|symbol| compilation.qualified_name(symbol.id) == "N.C.P")
    {
        match symbol.as_method() {
            Some(method) if method.is_partial_implementation() => implementation = Some(symbol.id),
            Some(_) => definition = Some(symbol.id),
            None => {}
        }
    }
    (
        definition.expect("declaring part"),
        implementation.expect("implementing part"),
    )
}

fn call_through_instance(compilation: &Compilation, member: &str) -> MethodBody {
    let generic = find(compilation, "N.G`1");
    MethodBody::new(vec![0x28, 0, 0, 0, 0, 0x2A], 8).with_fixup(
        1,
        MemberReference::MemberOfGeneric {
            parent: TypeRef::GenericInstance {
                generic: Box::new(TypeRef::Definition(generic)),
                arguments: vec![TypeRef::int32()],
            },
            member: find(compilation, member),
        },
    )
}

#[test]
fn edit_in_nested_type_touches_enclosing_types() -> Result<()> {
    let compilation0 = with_nested(|_, _| {});
    let baseline0 = initial_baseline(&compilation0);
    let compilation1 = with_nested(|_, _| {});

    let result = emit(
        &baseline0,
        &compilation1,
        &[SemanticEdit::update(
            find(&compilation0, "N.C.D.Q"),
            find(&compilation1, "N.C.D.Q"),
        )],
        &ret_body,
    );
    let mut changed_types = result.changed_types.clone();
    let (delta, _, updated) = succeeded(result);

    changed_types.sort();
    assert_eq!(
        changed_types,
        vec![Token::new(CLASS_C), Token::new(0x0200_0003)]
    );
    assert_eq!(updated, vec![Token::new(0x0600_0003)]);
    // Containing types are not re-emitted.
    assert_eq!(map_of(&delta), vec![0x0600_0003]);
    Ok(())
}

#[test]
fn added_nested_type_records_its_enclosing_type() -> Result<()> {
    let compilation0 = standard_program();
    let baseline0 = initial_baseline(&compilation0);
    let compilation1 = with_nested(|_, _| {});

    let result = emit(
        &baseline0,
        &compilation1,
        &[SemanticEdit::insert(find(&compilation1, "N.C.D"))],
        &ret_body,
    );
    let (delta, baseline1, _) = succeeded(result);

    assert_eq!(delta.tables.type_defs.len(), 1);
    assert_eq!(delta.tables.type_defs[0].rid, 3);
    assert_eq!(delta.tables.nested_classes.len(), 1);
    assert_eq!(delta.tables.nested_classes[0].nested, 3);
    assert_eq!(delta.tables.nested_classes[0].enclosing, 2);
    // The member of the added type is added with it.
    assert!(delta.enc_map.contains(Token::new(0x0600_0003)));
    assert_eq!(baseline1.table_sizes()[TableId::TypeDef], 3);
    assert_eq!(baseline1.table_sizes()[TableId::NestedClass], 1);
    Ok(())
}

#[test]
fn added_property_gets_map_and_semantics() -> Result<()> {
    let compilation0 = standard_program();
    let baseline0 = initial_baseline(&compilation0);

    let compilation1 = program(|builder, class| {
        let getter = builder.add_method(
            class,
            "get_P",
            MethodData::new(MethodSignature::instance(TypeRef::int32(), vec![])),
        );
        builder.add_property(
            class,
            "P",
            MethodSignature::instance(TypeRef::int32(), vec![]),
            Some(getter),
            None,
        );
    });
    let result = emit(
        &baseline0,
        &compilation1,
        &[
            SemanticEdit::insert(find(&compilation1, "N.C.P")),
            SemanticEdit::insert(find(&compilation1, "N.C.get_P")),
        ],
        &ret_body,
    );
    let (delta, baseline1, _) = succeeded(result);

    assert_eq!(
        log_of(&delta),
        vec![
            (0x1500_0001, EditAndContinueOperation::Default),
            (CLASS_C, EditAndContinueOperation::AddMethod),
            (0x0600_0003, EditAndContinueOperation::Default),
            (0x1500_0001, EditAndContinueOperation::AddProperty),
            (0x1700_0001, EditAndContinueOperation::Default),
            (0x1800_0001, EditAndContinueOperation::Default),
        ]
    );

    assert_eq!(delta.tables.property_maps[0].parent, 2);
    let semantics = &delta.tables.method_semantics[0];
    assert_eq!(semantics.method, 3);
    assert_eq!(semantics.association, Token::new(0x1700_0001));
    assert_eq!(
        semantics.semantics,
        MethodSemanticsAttributes::GETTER.bits()
    );

    // A second property reuses the map row of the first.
    let compilation2 = program(|builder, class| {
        let getter = builder.add_method(
            class,
            "get_P",
            MethodData::new(MethodSignature::instance(TypeRef::int32(), vec![])),
        );
        builder.add_property(
            class,
            "P",
            MethodSignature::instance(TypeRef::int32(), vec![]),
            Some(getter),
            None,
        );
        builder.add_property(
            class,
            "R",
            MethodSignature::instance(TypeRef::int32(), vec![]),
            None,
            None,
        );
    });
    let result = emit(
        &baseline1,
        &compilation2,
        &[SemanticEdit::insert(find(&compilation2, "N.C.R"))],
        &ret_body,
    );
    let (delta2, _, _) = succeeded(result);
    assert!(delta2.tables.property_maps.is_empty());
    assert_eq!(
        log_of(&delta2),
        vec![
            (0x1500_0001, EditAndContinueOperation::AddProperty),
            (0x1700_0002, EditAndContinueOperation::Default),
        ]
    );
    Ok(())
}

#[test]
fn partial_method_updates_its_single_row() -> Result<()> {
    let compilation0 = with_partial();
    let baseline0 = initial_baseline(&compilation0);
    // M, F and one row for both parts of P.
    assert_eq!(baseline0.table_sizes()[TableId::MethodDef], 3);
    let (_, implementation0) = partial_parts(&compilation0);

    let compilation1 = with_partial();
    let (definition1, implementation1) = partial_parts(&compilation1);
    let requested = std::cell::RefCell::new(Vec::new());
    let bodies = |_: &Compilation,
                  method: SymbolId,
                  _: Option<&EncVariableSlotAllocator>|
     -> Result<MethodBody> {
        requested.borrow_mut().push(method);
        Ok(MethodBody::new(vec![0x2A], 8))
    };
    let result = emit(
        &baseline0,
        &compilation1,
        &[SemanticEdit::update(implementation0, implementation1)],
        &bodies,
    );
    let (delta1, baseline1, updated) = succeeded(result);

    assert_eq!(updated, vec![Token::new(0x0600_0003)]);
    assert_eq!(map_of(&delta1), vec![0x0600_0003]);
    assert_eq!(requested.borrow().as_slice(), &[implementation1]);

    // Editing through the declaring part touches the same row.
    let compilation2 = with_partial();
    let (definition2, _) = partial_parts(&compilation2);
    let result = emit(
        &baseline1,
        &compilation2,
        &[SemanticEdit::update(definition1, definition2)],
        &ret_body,
    );
    let (delta2, _, updated) = succeeded(result);
    assert_eq!(updated, vec![Token::new(0x0600_0003)]);
    assert_eq!(map_of(&delta2), vec![0x0600_0003]);
    Ok(())
}

#[test]
fn existing_generic_member_is_referenced_through_type_spec() -> Result<()> {
    let compilation0 = generic_program(false);
    let baseline0 = initial_baseline(&compilation0);
    let compilation1 = generic_program(false);
    let m1 = find(&compilation1, "N.C.M");

    let bodies = |compilation: &Compilation,
                  _: SymbolId,
                  _: Option<&EncVariableSlotAllocator>|
     -> Result<MethodBody> { Ok(call_through_instance(compilation, "N.G`1.Existing")) };
    let result = emit(
        &baseline0,
        &compilation1,
        &[SemanticEdit::update(find(&compilation0, "N.C.M"), m1)],
        &bodies,
    );
    let (delta, _, _) = succeeded(result);

    assert_eq!(delta.tables.member_refs.len(), 1);
    assert_eq!(delta.tables.member_refs[0].class.table(), 0x1B);
    assert_eq!(delta.tables.type_specs.len(), 1);
    Ok(())
}

#[test]
fn reference_to_added_generic_member_is_reported() -> Result<()> {
    let compilation0 = generic_program(false);
    let baseline0 = initial_baseline(&compilation0);
    let compilation1 = generic_program(true);
    let m1 = find(&compilation1, "N.C.M");

    let bodies = |compilation: &Compilation,
                  method: SymbolId,
                  _: Option<&EncVariableSlotAllocator>|
     -> Result<MethodBody> {
        if method == m1 {
            Ok(call_through_instance(compilation, "N.G`1.Added"))
        } else {
            Ok(MethodBody::new(vec![0x2A], 8))
        }
    };
    let result = emit(
        &baseline0,
        &compilation1,
        &[
            SemanticEdit::update(find(&compilation0, "N.C.M"), m1),
            SemanticEdit::insert(find(&compilation1, "N.G`1.Added")),
        ],
        &bodies,
    );

    assert!(!result.success);
    assert!(result
        .diagnostics
        .has_code(DiagnosticCode::EncReferenceToAddedMember));
    assert!(result.delta.is_none());
    assert!(result.baseline.is_none());
    Ok(())
}

#[test]
fn missing_state_machine_attribute_is_reported() -> Result<()> {
    let compilation0 = standard_program();
    let m0 = find(&compilation0, "N.C.M");
    let baseline0 = initial_baseline_with(&compilation0, |module| {
        module.with_debug_info(m0, EditAndContinueMethodDebugInformation::default())
    });

    let mut builder =
        CompilationBuilder::new("App").well_known_attributes(WellKnownAttributes::empty());
    let class = class_c(&mut builder);
    let m1 = method_m(&mut builder, class, 100);
    method_f(&mut builder, class);
    if let Some(method) = builder.method_mut(m1) {
        method.state_machine = Some(StateMachineKind::Async);
    }
    let compilation1 = Arc::new(builder.build());

    let requested = std::cell::Cell::new(false);
    let bodies = |_: &Compilation,
                  _: SymbolId,
                  _: Option<&EncVariableSlotAllocator>|
     -> Result<MethodBody> {
        requested.set(true);
        Ok(MethodBody::new(vec![0x2A], 8))
    };
    let result = emit(
        &baseline0,
        &compilation1,
        &[SemanticEdit::update(m0, m1).preserving_locals()],
        &bodies,
    );

    assert!(!result.success);
    assert!(result
        .diagnostics
        .has_code(DiagnosticCode::MissingStateMachineAttribute));
    assert!(!requested.get());
    assert!(result.delta.is_none());
    Ok(())
}

#[test]
fn unreadable_debug_information_is_reported() -> Result<()> {
    let compilation0 = standard_program();
    let m0 = find(&compilation0, "N.C.M");
    // Two locals but a single slot record.
    let baseline0 = initial_baseline_with(&compilation0, |module| {
        module
            .with_locals(
                m0,
                vec![
                    (TypeRef::int32(), LocalConstraints::empty()),
                    (TypeRef::string(), LocalConstraints::empty()),
                ],
            )
            .with_debug_info(
                m0,
                EditAndContinueMethodDebugInformation {
                    method_ordinal: 0,
                    local_slots: vec![LocalSlotDebugInfo::new(
                        SynthesizedLocalKind::UserDefined,
                        LocalDebugId::new(10, 0),
                    )],
                    lambdas: Vec::new(),
                    closures: Vec::new(),
                },
            )
    });
    let compilation1 = standard_program();

    let result = emit(
        &baseline0,
        &compilation1,
        &[SemanticEdit::update(m0, find(&compilation1, "N.C.M")).preserving_locals()],
        &ret_body,
    );

    assert!(!result.success);
    assert!(result.diagnostics.has_code(DiagnosticCode::InvalidDebugInfo));
    assert_eq!(result.diagnostics.by_category(DiagnosticCategory::DebugInfo).len(), 1);
    Ok(())
}
