//! Classification of the symbols of an edited compilation.
//!
//! Edits name the symbols the user touched. [`SymbolChanges`] turns them into a change for
//! every symbol of the compilation: the edited symbols themselves, the containers the
//! writer has to walk to reach them, members that appeared inside updated types, and
//! compiler-generated members whose fate follows the method that generated them.

use std::collections::{HashMap, HashSet};

use crate::{
    emit::edits::{SemanticEdit, SemanticEditKind},
    symbols::{Compilation, Symbol, SymbolId, SymbolKind, SynthesizedOrigin},
    Result,
};

/// Change of one symbol between the previous and the current generation.
///
/// `None < ContainsChanges < Updated` and `None < ContainsChanges < Added`; `Updated` and
/// `Added` are not comparable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SymbolChange {
    /// Unchanged, and nothing inside changed
    None,
    /// Unchanged itself, but members changed
    ContainsChanges,
    /// Changed in place; keeps its row
    Updated,
    /// New; gets a new row
    Added,
}

/// Tells whether a current symbol had a definition in the previous generation.
pub trait PreviousDefinitions {
    /// Returns true if `symbol` (of the current compilation) has a previous counterpart.
    fn definition_exists(&self, symbol: SymbolId) -> bool;
}

/// Per-symbol changes of one emission.
pub struct SymbolChanges<'a> {
    compilation: &'a Compilation,
    definitions: &'a dyn PreviousDefinitions,
    changes: HashMap<SymbolId, SymbolChange>,
    replaced: HashSet<SymbolId>,
    deleted: HashMap<SymbolId, Vec<SymbolId>>,
}

impl<'a> SymbolChanges<'a> {
    /// Classifies `edits` against `compilation`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Invariant`] if a symbol is edited twice and
    /// [`crate::Error::Malformed`] for a delete edit without the deleted symbol.
    pub fn new(
        edits: &[SemanticEdit],
        compilation: &'a Compilation,
        definitions: &'a dyn PreviousDefinitions,
    ) -> Result<Self> {
        let mut changes = HashMap::new();
        let mut replaced = HashSet::new();
        let mut deleted: HashMap<SymbolId, Vec<SymbolId>> = HashMap::new();
        let mut seeds = Vec::with_capacity(edits.len());

        for edit in edits.iter().filter(|edit| edit.kind != SemanticEditKind::Delete) {
            let symbol = compilation.canonical_definition(edit.new_symbol);
            let change = match edit.kind {
                SemanticEditKind::Update => SymbolChange::Updated,
                _ => SymbolChange::Added,
            };
            if changes.insert(symbol, change).is_some() {
                return Err(invariant_error!(
                    "{} is edited more than once",
                    compilation.qualified_name(symbol)
                ));
            }
            if edit.kind == SemanticEditKind::Replace {
                replaced.insert(symbol);
            }
            seeds.push(symbol);
        }

        for edit in edits.iter().filter(|edit| edit.kind == SemanticEditKind::Delete) {
            let old = edit
                .old_symbol
                .ok_or_else(|| malformed_error!("Delete edit in {} names no symbol", edit.new_symbol))?;
            let container = edit.new_symbol;
            changes.entry(container).or_insert(SymbolChange::ContainsChanges);
            let members = deleted.entry(container).or_default();
            if !members.contains(&old) {
                members.push(old);
            }
            seeds.push(container);
        }

        for symbol in seeds {
            let mut current = compilation.change_container(symbol);
            while let Some(container) = current {
                if changes.contains_key(&container) {
                    break;
                }
                let change = match compilation.get(container).map(Symbol::kind) {
                    Some(SymbolKind::Property | SymbolKind::Event) => SymbolChange::Updated,
                    _ => SymbolChange::ContainsChanges,
                };
                changes.insert(container, change);
                current = compilation.change_container(container);
            }
        }

        tracing::trace!(
            edits = edits.len(),
            classified = changes.len(),
            deleted = deleted.len(),
            "classified edits"
        );

        Ok(SymbolChanges {
            compilation,
            definitions,
            changes,
            replaced,
            deleted,
        })
    }

    /// Returns the change of `symbol`.
    #[must_use]
    pub fn get_change(&self, symbol: SymbolId) -> SymbolChange {
        let symbol = self.compilation.canonical_definition(symbol);
        if let Some(change) = self.changes.get(&symbol) {
            return *change;
        }

        let Some(definition) = self.compilation.get(symbol) else {
            return SymbolChange::None;
        };
        if let Some(origin) = definition.synthesized {
            return self.synthesized_change(definition, origin);
        }
        if definition.kind() == SymbolKind::Namespace {
            return SymbolChange::None;
        }

        let Some(container) = self.compilation.change_container(symbol) else {
            return SymbolChange::None;
        };
        match self.get_change(container) {
            SymbolChange::Added => SymbolChange::Added,
            SymbolChange::None => SymbolChange::None,
            SymbolChange::Updated | SymbolChange::ContainsChanges => {
                if self.definitions.definition_exists(symbol) {
                    SymbolChange::None
                } else {
                    SymbolChange::Added
                }
            }
        }
    }

    fn synthesized_change(&self, definition: &Symbol, origin: SynthesizedOrigin) -> SymbolChange {
        let exists = self.definitions.definition_exists(definition.id);
        match self.get_change(origin.generator) {
            SymbolChange::Updated => {
                let container_exists = definition
                    .container
                    .map_or(true, |container| self.definitions.definition_exists(container));
                if !container_exists || !exists {
                    SymbolChange::Added
                } else if !origin.has_body_dependency {
                    SymbolChange::None
                } else {
                    Self::generated_content_change(definition)
                }
            }
            SymbolChange::Added => {
                if exists {
                    Self::generated_content_change(definition)
                } else {
                    SymbolChange::Added
                }
            }
            SymbolChange::None | SymbolChange::ContainsChanges => SymbolChange::None,
        }
    }

    fn generated_content_change(definition: &Symbol) -> SymbolChange {
        match definition.kind() {
            SymbolKind::Type => SymbolChange::ContainsChanges,
            SymbolKind::Method => SymbolChange::Updated,
            _ => SymbolChange::None,
        }
    }

    /// Returns true if `symbol` was edited with [`SemanticEditKind::Replace`].
    #[must_use]
    pub fn is_replaced(&self, symbol: SymbolId) -> bool {
        self.replaced.contains(&self.compilation.canonical_definition(symbol))
    }

    /// Returns true if `symbol` gets a new row.
    #[must_use]
    pub fn is_added(&self, symbol: SymbolId) -> bool {
        self.get_change(symbol) == SymbolChange::Added
    }

    /// Returns the previous-compilation members deleted from `container` by this edit.
    #[must_use]
    pub fn deleted_members(&self, container: SymbolId) -> &[SymbolId] {
        self.deleted
            .get(&container)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns every container that lost members, with the deleted members.
    pub fn all_deleted_members(&self) -> impl Iterator<Item = (&SymbolId, &Vec<SymbolId>)> {
        self.deleted.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::{
        types::{MethodSignature, TypeRef},
        CompilationBuilder, FieldData, MethodData, TypeData,
    };

    struct Existing(HashSet<SymbolId>);

    impl PreviousDefinitions for Existing {
        fn definition_exists(&self, symbol: SymbolId) -> bool {
            self.0.contains(&symbol)
        }
    }

    struct Fixture {
        compilation: Compilation,
        ns: SymbolId,
        class: SymbolId,
        method: SymbolId,
        getter: SymbolId,
        property: SymbolId,
        new_field: SymbolId,
        other_class: SymbolId,
    }

    fn fixture() -> Fixture {
        let mut builder = CompilationBuilder::new("App");
        let ns = builder.namespace(builder.global_namespace(), "N");
        let class = builder.add_type(ns, "C", TypeData::class());
        let method = builder.add_method(
            class,
            "M",
            MethodData::new(MethodSignature::instance(TypeRef::void(), vec![])),
        );
        let getter = builder.add_method(
            class,
            "get_P",
            MethodData::new(MethodSignature::instance(TypeRef::int32(), vec![])),
        );
        let property = builder.add_property(
            class,
            "P",
            MethodSignature::instance(TypeRef::int32(), vec![]),
            Some(getter),
            None,
        );
        let new_field = builder.add_field(class, "f", FieldData::new(TypeRef::int32()));
        let other_class = builder.add_type(ns, "D", TypeData::class());
        Fixture {
            compilation: builder.build(),
            ns,
            class,
            method,
            getter,
            property,
            new_field,
            other_class,
        }
    }

    fn existing(fixture: &Fixture) -> Existing {
        Existing(
            [
                fixture.ns,
                fixture.class,
                fixture.method,
                fixture.getter,
                fixture.property,
                fixture.other_class,
            ]
            .into_iter()
            .collect(),
        )
    }

    #[test]
    fn test_containment_walk() -> Result<()> {
        let fixture = fixture();
        let definitions = existing(&fixture);
        let edits = [SemanticEdit::update(fixture.getter, fixture.getter)];
        let changes = SymbolChanges::new(&edits, &fixture.compilation, &definitions)?;

        assert_eq!(changes.get_change(fixture.getter), SymbolChange::Updated);
        assert_eq!(changes.get_change(fixture.property), SymbolChange::Updated);
        assert_eq!(changes.get_change(fixture.class), SymbolChange::ContainsChanges);
        assert_eq!(changes.get_change(fixture.ns), SymbolChange::ContainsChanges);
        assert_eq!(changes.get_change(fixture.method), SymbolChange::None);
        assert_eq!(changes.get_change(fixture.other_class), SymbolChange::None);
        Ok(())
    }

    #[test]
    fn test_unseen_member_of_changed_type_is_added() -> Result<()> {
        let fixture = fixture();
        let definitions = existing(&fixture);
        let edits = [SemanticEdit::update(fixture.method, fixture.method)];
        let changes = SymbolChanges::new(&edits, &fixture.compilation, &definitions)?;

        assert_eq!(changes.get_change(fixture.new_field), SymbolChange::Added);
        assert!(changes.is_added(fixture.new_field));
        assert_eq!(changes.get_change(fixture.getter), SymbolChange::None);
        Ok(())
    }

    #[test]
    fn test_added_container_adds_members() -> Result<()> {
        let fixture = fixture();
        let definitions = existing(&fixture);
        let edits = [SemanticEdit::replace(fixture.class)];
        let changes = SymbolChanges::new(&edits, &fixture.compilation, &definitions)?;

        assert!(changes.is_replaced(fixture.class));
        assert_eq!(changes.get_change(fixture.method), SymbolChange::Added);
        assert_eq!(changes.get_change(fixture.ns), SymbolChange::ContainsChanges);
        Ok(())
    }

    #[test]
    fn test_duplicate_edit_is_invariant_violation() {
        let fixture = fixture();
        let definitions = existing(&fixture);
        let edits = [
            SemanticEdit::update(fixture.method, fixture.method),
            SemanticEdit::insert(fixture.method),
        ];
        let result = SymbolChanges::new(&edits, &fixture.compilation, &definitions);
        assert!(matches!(result, Err(crate::Error::Invariant { .. })));
    }

    #[test]
    fn test_delete_marks_container() -> Result<()> {
        let fixture = fixture();
        let previous = CompilationBuilder::new("App").build();
        let old_method = previous.global_namespace();
        let definitions = existing(&fixture);
        let edits = [SemanticEdit::delete(old_method, fixture.other_class)];
        let changes = SymbolChanges::new(&edits, &fixture.compilation, &definitions)?;

        assert_eq!(changes.get_change(fixture.other_class), SymbolChange::ContainsChanges);
        assert_eq!(changes.get_change(fixture.ns), SymbolChange::ContainsChanges);
        assert_eq!(changes.deleted_members(fixture.other_class), &[old_method]);
        assert!(changes.deleted_members(fixture.class).is_empty());
        Ok(())
    }

    #[test]
    fn test_partial_implementation_is_canonicalized() -> Result<()> {
        let mut builder = CompilationBuilder::new("App");
        let class = builder.add_type(builder.global_namespace(), "C", TypeData::class());
        let signature = MethodSignature::instance(TypeRef::void(), vec![]);
        let definition = builder.add_method(class, "P", MethodData::new(signature.clone()));
        let implementation = builder.add_method(class, "P", MethodData::new(signature));
        builder.link_partial(definition, implementation);
        let compilation = builder.build();
        let definitions = Existing([class, definition].into_iter().collect());

        let edits = [SemanticEdit::update(implementation, implementation)];
        let changes = SymbolChanges::new(&edits, &compilation, &definitions)?;
        assert_eq!(changes.get_change(definition), SymbolChange::Updated);
        assert_eq!(changes.get_change(implementation), SymbolChange::Updated);
        Ok(())
    }

    #[test]
    fn test_synthesized_members_follow_generator() -> Result<()> {
        let mut builder = CompilationBuilder::new("App");
        let class = builder.add_type(builder.global_namespace(), "C", TypeData::class());
        let generator = builder.add_method(
            class,
            "M",
            MethodData::new(MethodSignature::instance(TypeRef::void(), vec![])),
        );
        let closure = builder.add_type(class, "<>c", TypeData::class());
        let lambda = builder.add_method(
            closure,
            "<M>b__0_0",
            MethodData::new(MethodSignature::instance(TypeRef::void(), vec![])),
        );
        let cache = builder.add_field(closure, "<>9", FieldData::new(TypeRef::int32()));
        let new_lambda = builder.add_method(
            closure,
            "<M>b__0_1",
            MethodData::new(MethodSignature::instance(TypeRef::void(), vec![])),
        );
        builder.mark_synthesized(closure, generator, true);
        builder.mark_synthesized(lambda, generator, true);
        builder.mark_synthesized(cache, generator, false);
        builder.mark_synthesized(new_lambda, generator, true);
        let compilation = builder.build();
        let definitions = Existing([class, generator, closure, lambda, cache].into_iter().collect());

        let edits = [SemanticEdit::update(generator, generator)];
        let changes = SymbolChanges::new(&edits, &compilation, &definitions)?;
        assert_eq!(changes.get_change(closure), SymbolChange::ContainsChanges);
        assert_eq!(changes.get_change(lambda), SymbolChange::Updated);
        assert_eq!(changes.get_change(cache), SymbolChange::None);
        assert_eq!(changes.get_change(new_lambda), SymbolChange::Added);

        let unchanged = SymbolChanges::new(&[], &compilation, &definitions)?;
        assert_eq!(unchanged.get_change(lambda), SymbolChange::None);
        Ok(())
    }
}
