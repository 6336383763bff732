//! Cross-generation symbol matching.
//!
//! Every generation is compiled into a fresh [`Compilation`], so the same declaration has
//! a different [`SymbolId`] in each of them. A [`SymbolMatcher`] relates the symbols of
//! a source compilation to their counterparts in a target compilation. The delta engine
//! only ever talks to the trait; [`StructuralSymbolMatcher`] is the provided
//! implementation and matches by container, kind, name and signature.
//!
//! The free functions in this module re-base state recorded by an earlier generation
//! (baseline row maps, synthesized members, anonymous types) into the vocabulary of a
//! newer compilation.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    emit::baseline::EmitBaseline,
    symbols::{
        types::{MethodSignature, TypeRef},
        Compilation, Symbol, SymbolData, SymbolId, SymbolKind, SynthesizedTypeMap,
    },
    Result,
};

/// Maps symbols of one compilation to their counterparts in another.
///
/// All methods return `None` when the symbol has no counterpart, e.g. a type added in
/// the source compilation that the target never saw.
pub trait SymbolMatcher {
    /// Maps a type, member or namespace definition.
    fn map_definition(&self, symbol: SymbolId) -> Option<SymbolId>;

    /// Maps a namespace.
    fn map_namespace(&self, namespace: SymbolId) -> Option<SymbolId>;

    /// Maps a type reference, rewriting every definition it mentions.
    fn map_reference(&self, reference: &TypeRef) -> Option<TypeRef> {
        Some(match reference {
            TypeRef::Definition(id) => TypeRef::Definition(self.map_definition(*id)?),
            TypeRef::SzArray(inner) => TypeRef::SzArray(Box::new(self.map_reference(inner)?)),
            TypeRef::Pointer(inner) => TypeRef::Pointer(Box::new(self.map_reference(inner)?)),
            TypeRef::ByRef(inner) => TypeRef::ByRef(Box::new(self.map_reference(inner)?)),
            TypeRef::GenericInstance { generic, arguments } => TypeRef::GenericInstance {
                generic: Box::new(self.map_reference(generic)?),
                arguments: arguments
                    .iter()
                    .map(|argument| self.map_reference(argument))
                    .collect::<Option<Vec<_>>>()?,
            },
            TypeRef::Primitive(_)
            | TypeRef::External(_)
            | TypeRef::TypeParameter(_)
            | TypeRef::MethodTypeParameter(_) => reference.clone(),
        })
    }
}

/// Matches symbols by structure: a symbol maps to the member of its mapped container
/// with the same kind, name, generic arity and mapped signature.
pub struct StructuralSymbolMatcher {
    source: Arc<Compilation>,
    target: Arc<Compilation>,
    cache: RefCell<HashMap<SymbolId, Option<SymbolId>>>,
}

impl StructuralSymbolMatcher {
    /// Creates a matcher from `source` symbols to `target` symbols.
    #[must_use]
    pub fn new(source: Arc<Compilation>, target: Arc<Compilation>) -> Self {
        StructuralSymbolMatcher {
            source,
            target,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Returns the compilation symbols are mapped from.
    #[must_use]
    pub fn source(&self) -> &Arc<Compilation> {
        &self.source
    }

    /// Returns the compilation symbols are mapped to.
    #[must_use]
    pub fn target(&self) -> &Arc<Compilation> {
        &self.target
    }

    fn is_identity(&self) -> bool {
        Arc::ptr_eq(&self.source, &self.target) || self.source.id() == self.target.id()
    }

    fn find_counterpart(&self, symbol: &Symbol) -> Option<SymbolId> {
        if symbol.id == self.source.global_namespace() {
            return Some(self.target.global_namespace());
        }

        let container = self.map_definition(symbol.container?)?;
        let target_container = self.target.get(container)?;

        target_container
            .members
            .iter()
            .copied()
            .find(|candidate| {
                self.target
                    .get(*candidate)
                    .is_some_and(|candidate| self.is_match(symbol, candidate))
            })
    }

    fn is_match(&self, source: &Symbol, target: &Symbol) -> bool {
        if source.kind() != target.kind() || source.name != target.name {
            return false;
        }

        match (&source.data, &target.data) {
            (SymbolData::Type(source_type), SymbolData::Type(target_type)) => {
                source_type.generic_parameters.len() == target_type.generic_parameters.len()
            }
            (SymbolData::Method(source_method), SymbolData::Method(target_method)) => {
                source_method.generic_parameters.len() == target_method.generic_parameters.len()
                    && source_method.is_partial_implementation()
                        == target_method.is_partial_implementation()
                    && self.signatures_match(&source_method.signature, &target_method.signature)
            }
            (SymbolData::Property(source_property), SymbolData::Property(target_property)) => {
                source_property.signature.parameters.len()
                    == target_property.signature.parameters.len()
                    && source_property
                        .signature
                        .parameters
                        .iter()
                        .zip(&target_property.signature.parameters)
                        .all(|(source, target)| self.map_reference(source).as_ref() == Some(target))
            }
            _ => true,
        }
    }

    fn signatures_match(&self, source: &MethodSignature, target: &MethodSignature) -> bool {
        source.has_this == target.has_this
            && source.generic_arity == target.generic_arity
            && source.parameters.len() == target.parameters.len()
            && self.map_reference(&source.return_type).as_ref() == Some(&target.return_type)
            && source
                .parameters
                .iter()
                .zip(&target.parameters)
                .all(|(source, target)| self.map_reference(source).as_ref() == Some(target))
    }
}

impl SymbolMatcher for StructuralSymbolMatcher {
    fn map_definition(&self, symbol: SymbolId) -> Option<SymbolId> {
        if !self.source.contains(symbol) {
            return None;
        }
        if self.is_identity() {
            return Some(symbol);
        }
        if let Some(cached) = self.cache.borrow().get(&symbol) {
            return *cached;
        }

        let mapped = self
            .source
            .get(symbol)
            .and_then(|source| self.find_counterpart(source));
        self.cache.borrow_mut().insert(symbol, mapped);
        mapped
    }

    fn map_namespace(&self, namespace: SymbolId) -> Option<SymbolId> {
        if self.source.get(namespace)?.kind() != SymbolKind::Namespace {
            return None;
        }
        self.map_definition(namespace)
    }
}

/// Re-bases a baseline recorded against an earlier compilation onto `compilation`.
///
/// Every symbol-keyed row map, every type stored in method slot records and the
/// synthesized member and type maps are translated through `matcher`, which must map
/// from the baseline's compilation to `compilation`. Entries without a counterpart are
/// dropped; row counts and heap sizes are carried over unchanged.
///
/// # Errors
///
/// Returns [`crate::Error::Invariant`] if the synthesized member maps are inconsistent.
pub fn map_baseline_to_compilation(
    baseline: &EmitBaseline,
    compilation: Arc<Compilation>,
    matcher: &dyn SymbolMatcher,
) -> Result<EmitBaseline> {
    let map_rows = |rows: &HashMap<SymbolId, u32>| -> HashMap<SymbolId, u32> {
        rows.iter()
            .filter_map(|(symbol, row)| Some((matcher.map_definition(*symbol)?, *row)))
            .collect()
    };

    let synthesized_members = map_synthesized_or_deleted_members(
        matcher,
        &baseline.synthesized_members,
        &compilation.synthesized_members(),
        false,
    )?;
    let deleted_members = map_synthesized_or_deleted_members(
        matcher,
        &baseline.deleted_members,
        &HashMap::new(),
        true,
    )?;
    let synthesized_types =
        map_anonymous_types(matcher, &baseline.synthesized_types, compilation.anonymous_types());

    let mut mapped = baseline.clone();
    mapped.compilation = compilation;
    mapped.types_added = map_rows(&baseline.types_added);
    mapped.events_added = map_rows(&baseline.events_added);
    mapped.fields_added = map_rows(&baseline.fields_added);
    mapped.methods_added = map_rows(&baseline.methods_added);
    mapped.properties_added = map_rows(&baseline.properties_added);
    mapped.added_or_changed_methods = baseline
        .added_or_changed_methods
        .iter()
        .map(|(row, info)| (*row, info.map_types(matcher)))
        .collect();
    mapped.synthesized_types = synthesized_types;
    mapped.synthesized_members = synthesized_members;
    mapped.deleted_members = deleted_members;
    Ok(mapped)
}

/// Merges the synthesized (or deleted) members recorded by an earlier generation with
/// the members of the current one.
///
/// Containers present in `new` take their member list from `new`. Containers only known
/// to `previous` keep their recorded members, translated where possible. Unless
/// `is_deleted_member_mapping` is set, every previous member that still maps must be
/// among the new members of its container.
///
/// # Errors
///
/// Returns [`crate::Error::Invariant`] if a mapped previous member is missing from the
/// new member list of its container.
pub fn map_synthesized_or_deleted_members(
    matcher: &dyn SymbolMatcher,
    previous: &HashMap<SymbolId, Vec<SymbolId>>,
    new: &HashMap<SymbolId, Vec<SymbolId>>,
    is_deleted_member_mapping: bool,
) -> Result<HashMap<SymbolId, Vec<SymbolId>>> {
    if previous.is_empty() {
        return Ok(new.clone());
    }

    let mut merged = new.clone();
    let mut containers: Vec<_> = previous.iter().collect();
    containers.sort_by_key(|(container, _)| **container);

    for (container, members) in containers {
        let Some(mapped_container) = matcher.map_definition(*container) else {
            continue;
        };

        if let Some(new_members) = new.get(&mapped_container) {
            if !is_deleted_member_mapping {
                for member in members {
                    if let Some(mapped_member) = matcher.map_definition(*member) {
                        if !new_members.contains(&mapped_member) {
                            return Err(invariant_error!(
                                "Synthesized member {} of {} is missing from the current generation",
                                member,
                                container
                            ));
                        }
                    }
                }
            }
            continue;
        }

        let mapped_members = members
            .iter()
            .map(|member| matcher.map_definition(*member).unwrap_or(*member))
            .collect();
        merged.insert(mapped_container, mapped_members);
    }

    Ok(merged)
}

/// Unions anonymous type maps; entries of the current generation win and the type
/// symbols of previous entries are translated where possible.
#[must_use]
pub fn map_anonymous_types(
    matcher: &dyn SymbolMatcher,
    previous: &SynthesizedTypeMap,
    current: &SynthesizedTypeMap,
) -> SynthesizedTypeMap {
    let mut merged = current.clone();
    for (key, value) in previous {
        if merged.contains_key(key) {
            continue;
        }
        let mut value = value.clone();
        if let Some(mapped) = matcher.map_definition(value.type_symbol) {
            value.type_symbol = mapped;
        }
        merged.insert(key.clone(), value);
    }
    merged
}
