use std::collections::HashMap;

use crate::symbols::{
    types::{CustomAttribute, MethodSignature, TypeRef},
    AnonymousTypeKey, AnonymousTypeValue, Compilation, CompilationId, EventAttributes,
    EventData, FieldData, MethodData, PartialMethodPart, PropertyAttributes, PropertyData,
    Symbol, SymbolData, SymbolId, SynthesizedOrigin, SynthesizedTypeMap, TypeData,
    WellKnownAttributes,
};

/// Incrementally builds a [`Compilation`] arena.
///
/// Front ends (and tests) declare namespaces, types and members top-down; every `add_*`
/// call returns the handle of the new symbol. Handles stay valid in the built
/// compilation.
pub struct CompilationBuilder {
    id: CompilationId,
    assembly_name: String,
    core_library: String,
    symbols: Vec<Symbol>,
    well_known: WellKnownAttributes,
    anonymous_types: SynthesizedTypeMap,
}

impl CompilationBuilder {
    /// Creates a builder for an assembly named `assembly_name` referencing `System.Runtime`.
    #[must_use]
    pub fn new(assembly_name: &str) -> Self {
        let id = CompilationId::next();
        let global = Symbol {
            id: SymbolId {
                compilation: id,
                index: 0,
            },
            name: String::new(),
            container: None,
            members: Vec::new(),
            attributes: Vec::new(),
            synthesized: None,
            data: SymbolData::Namespace,
        };

        CompilationBuilder {
            id,
            assembly_name: assembly_name.to_string(),
            core_library: "System.Runtime".to_string(),
            symbols: vec![global],
            well_known: WellKnownAttributes::all(),
            anonymous_types: HashMap::new(),
        }
    }

    /// Sets the name of the core library.
    #[must_use]
    pub fn core_library(mut self, name: &str) -> Self {
        self.core_library = name.to_string();
        self
    }

    /// Sets the runtime attributes the compilation can reference.
    #[must_use]
    pub fn well_known_attributes(mut self, attributes: WellKnownAttributes) -> Self {
        self.well_known = attributes;
        self
    }

    /// Returns the global namespace.
    #[must_use]
    pub fn global_namespace(&self) -> SymbolId {
        SymbolId {
            compilation: self.id,
            index: 0,
        }
    }

    /// Returns the namespace `name` inside `parent`, declaring it if needed.
    pub fn namespace(&mut self, parent: SymbolId, name: &str) -> SymbolId {
        let existing = self.symbol(parent).and_then(|symbol| {
            symbol.members.iter().copied().find(|member| {
                self.symbol(*member).is_some_and(|candidate| {
                    matches!(candidate.data, SymbolData::Namespace) && candidate.name == name
                })
            })
        });

        match existing {
            Some(namespace) => namespace,
            None => self.push(parent, name, SymbolData::Namespace),
        }
    }

    /// Declares a type in a namespace or as a nested type.
    pub fn add_type(&mut self, container: SymbolId, name: &str, data: TypeData) -> SymbolId {
        self.push(container, name, SymbolData::Type(data))
    }

    /// Declares a field.
    pub fn add_field(&mut self, container: SymbolId, name: &str, data: FieldData) -> SymbolId {
        self.push(container, name, SymbolData::Field(data))
    }

    /// Declares a method.
    pub fn add_method(&mut self, container: SymbolId, name: &str, data: MethodData) -> SymbolId {
        self.push(container, name, SymbolData::Method(data))
    }

    /// Declares a property and associates its accessors with it.
    pub fn add_property(
        &mut self,
        container: SymbolId,
        name: &str,
        signature: MethodSignature,
        getter: Option<SymbolId>,
        setter: Option<SymbolId>,
    ) -> SymbolId {
        let property = self.push(
            container,
            name,
            SymbolData::Property(PropertyData {
                flags: PropertyAttributes::empty(),
                signature,
                getter,
                setter,
            }),
        );
        for accessor in [getter, setter].into_iter().flatten() {
            self.associate(accessor, property);
        }
        property
    }

    /// Declares an event and associates its accessors with it.
    pub fn add_event(
        &mut self,
        container: SymbolId,
        name: &str,
        event_type: TypeRef,
        adder: Option<SymbolId>,
        remover: Option<SymbolId>,
    ) -> SymbolId {
        let event = self.push(
            container,
            name,
            SymbolData::Event(EventData {
                flags: EventAttributes::empty(),
                event_type,
                adder,
                remover,
                raiser: None,
            }),
        );
        for accessor in [adder, remover].into_iter().flatten() {
            self.associate(accessor, event);
        }
        event
    }

    /// Links the declaring and implementing parts of a partial method.
    pub fn link_partial(&mut self, definition: SymbolId, implementation: SymbolId) {
        if let Some(method) = self.method_mut(definition) {
            method.partial = Some(PartialMethodPart::Definition {
                implementation: Some(implementation),
            });
        }
        if let Some(method) = self.method_mut(implementation) {
            method.partial = Some(PartialMethodPart::Implementation { definition });
        }
    }

    /// Marks a symbol as compiler-generated on behalf of `generator`.
    pub fn mark_synthesized(
        &mut self,
        symbol: SymbolId,
        generator: SymbolId,
        has_body_dependency: bool,
    ) {
        if let Some(symbol) = self.symbol_mut(symbol) {
            symbol.synthesized = Some(SynthesizedOrigin {
                generator,
                has_body_dependency,
            });
        }
    }

    /// Applies a custom attribute to a symbol.
    pub fn add_attribute(&mut self, symbol: SymbolId, attribute: CustomAttribute) {
        if let Some(symbol) = self.symbol_mut(symbol) {
            symbol.attributes.push(attribute);
        }
    }

    /// Records an anonymous type or delegate produced by the front end.
    pub fn add_anonymous_type(&mut self, key: AnonymousTypeKey, type_symbol: SymbolId) {
        let unique_index = u32::try_from(self.anonymous_types.len()).unwrap_or(u32::MAX);
        let name = self
            .symbol(type_symbol)
            .map(|symbol| symbol.name.clone())
            .unwrap_or_default();
        self.anonymous_types.insert(
            key,
            AnonymousTypeValue {
                name,
                unique_index,
                type_symbol,
            },
        );
    }

    /// Returns mutable method data for further configuration.
    pub fn method_mut(&mut self, method: SymbolId) -> Option<&mut MethodData> {
        match &mut self.symbol_mut(method)?.data {
            SymbolData::Method(data) => Some(data),
            _ => None,
        }
    }

    /// Returns a symbol declared so far.
    pub fn symbol_mut(&mut self, id: SymbolId) -> Option<&mut Symbol> {
        if id.compilation != self.id {
            return None;
        }
        self.symbols.get_mut(id.index as usize)
    }

    /// Finishes the arena.
    #[must_use]
    pub fn build(self) -> Compilation {
        let global = self.global_namespace();
        Compilation::from_parts(
            self.id,
            self.assembly_name,
            self.core_library,
            global,
            self.symbols,
            self.well_known,
            self.anonymous_types,
        )
    }

    fn symbol(&self, id: SymbolId) -> Option<&Symbol> {
        if id.compilation != self.id {
            return None;
        }
        self.symbols.get(id.index as usize)
    }

    fn associate(&mut self, accessor: SymbolId, association: SymbolId) {
        if let Some(method) = self.method_mut(accessor) {
            method.association = Some(association);
        }
    }

    fn push(&mut self, container: SymbolId, name: &str, data: SymbolData) -> SymbolId {
        let id = SymbolId {
            compilation: self.id,
            index: u32::try_from(self.symbols.len()).unwrap_or(u32::MAX),
        };
        self.symbols.push(Symbol {
            id,
            name: name.to_string(),
            container: Some(container),
            members: Vec::new(),
            attributes: Vec::new(),
            synthesized: None,
            data,
        });
        if let Some(parent) = self.symbol_mut(container) {
            parent.members.push(id);
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::SymbolKind;

    #[test]
    fn test_namespace_reuse() {
        let mut builder = CompilationBuilder::new("App");
        let global = builder.global_namespace();
        let first = builder.namespace(global, "N");
        let second = builder.namespace(global, "N");
        assert_eq!(first, second);

        let compilation = builder.build();
        assert_eq!(compilation.symbol(global).unwrap().members, vec![first]);
    }

    #[test]
    fn test_accessor_association() {
        let mut builder = CompilationBuilder::new("App");
        let class = builder.add_type(builder.global_namespace(), "C", TypeData::class());
        let add = builder.add_method(
            class,
            "add_E",
            MethodData::new(MethodSignature::instance(TypeRef::void(), vec![])),
        );
        let event = builder.add_event(class, "E", TypeRef::object(), Some(add), None);
        let compilation = builder.build();

        assert_eq!(compilation.method(add).unwrap().association, Some(event));
        assert_eq!(compilation.symbol(event).unwrap().kind(), SymbolKind::Event);
        assert_eq!(compilation.symbol(class).unwrap().members, vec![add, event]);
    }
}
