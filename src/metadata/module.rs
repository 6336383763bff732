//! Generation-0 metadata of a module.
//!
//! [`ModuleMetadata`] is the view of the original, fully emitted module that the delta
//! engine needs: the token of every definition, table row counts, heap sizes, parameter
//! ranges, custom attribute rows per parent, event and property map rows, `MethodImpl`
//! counts, the state machine type of every kickoff method, and the `TypeRef` / `TypeSpec`
//! rows required to decode local signatures.
//!
//! [`ModuleMetadataBuilder`] produces that view from a [`Compilation`] by assigning rows
//! the way a full metadata writer does: definitions in declaration order, members grouped
//! per type, reference rows on first use. It also records the local signatures and the
//! Edit-and-Continue debug information a PDB would hold, and hands them out through the
//! provider callbacks a baseline is created from.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use dotdelta::metadata::module::ModuleMetadataBuilder;
//! use dotdelta::metadata::tables::TableId;
//! use dotdelta::symbols::{CompilationBuilder, MethodData, TypeData};
//! use dotdelta::symbols::types::{MethodSignature, TypeRef};
//!
//! let mut builder = CompilationBuilder::new("App");
//! let class = builder.add_type(builder.global_namespace(), "C", TypeData::class());
//! let method = builder.add_method(
//!     class,
//!     "M",
//!     MethodData::new(MethodSignature::instance(TypeRef::void(), vec![])),
//! );
//! let compilation = Arc::new(builder.build());
//!
//! let module = ModuleMetadataBuilder::new(compilation).emit()?;
//! let token = module.metadata.token(method).unwrap();
//! assert!(token.is_table(TableId::MethodDef));
//! assert_eq!(module.metadata.table_sizes()[TableId::TypeDef], 2);
//! # Ok::<(), dotdelta::Error>(())
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use uguid::Guid;

use crate::{
    emit::{
        debuginfo::{
            DebugInformationProvider, EditAndContinueMethodDebugInformation,
            LocalSignatureProvider,
        },
        index::ReferenceIndex,
    },
    metadata::{
        heaps::{HeapBuilders, HeapSizes},
        signatures::{
            assemble_local_signature, encode_field_signature, encode_local,
            encode_method_signature, encode_property_signature, encode_type_spec,
            TypeTokenDecoder, TypeTokenResolver,
        },
        tables::{TableId, TableSizes},
        token::Token,
    },
    symbols::{
        names::parse_state_machine_type_name,
        types::{ExternalType, MemberReference, MemberSignature, ResolutionScope, TypeRef},
        Compilation, GenericParameter, LocalConstraints, SymbolData, SymbolId, SymbolKind,
    },
    utils::name_based_guid,
    Error, Result,
};

/// Generation-0 metadata of a module.
pub struct ModuleMetadata {
    mvid: Guid,
    name: String,
    compilation: Arc<Compilation>,
    tokens: HashMap<SymbolId, Token>,
    definitions: HashMap<Token, SymbolId>,
    table_sizes: TableSizes,
    heap_sizes: HeapSizes,
    param_ranges: HashMap<u32, (u32, u32)>,
    custom_attributes: HashMap<Token, Vec<u32>>,
    event_maps: HashMap<u32, u32>,
    property_maps: HashMap<u32, u32>,
    method_impls: HashMap<u32, u32>,
    state_machines: HashMap<SymbolId, SymbolId>,
    type_refs: HashMap<u32, ExternalType>,
    type_specs: HashMap<u32, TypeRef>,
}

impl ModuleMetadata {
    /// Module version id.
    #[must_use]
    pub fn mvid(&self) -> Guid {
        self.mvid
    }

    /// Module name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The compilation the module was emitted from. Its symbols carry the original tokens.
    #[must_use]
    pub fn compilation(&self) -> &Arc<Compilation> {
        &self.compilation
    }

    /// Returns the token of a definition of [`Self::compilation`]. Both parts of a
    /// partial method resolve to the row of the implementing part.
    #[must_use]
    pub fn token(&self, symbol: SymbolId) -> Option<Token> {
        self.tokens.get(&self.compilation.row_owner(symbol)).copied()
    }

    /// Returns the definition occupying a `TypeDef`, `Field`, `MethodDef`, `Property` or
    /// `Event` row.
    #[must_use]
    pub fn definition(&self, token: Token) -> Option<SymbolId> {
        self.definitions.get(&token).copied()
    }

    /// Row counts of every table.
    #[must_use]
    pub fn table_sizes(&self) -> &TableSizes {
        &self.table_sizes
    }

    /// Sizes of the four heaps.
    #[must_use]
    pub fn heap_sizes(&self) -> HeapSizes {
        self.heap_sizes
    }

    /// Returns `(first row, count)` of the `Param` rows of a method.
    #[must_use]
    pub fn param_range(&self, method_row: u32) -> Option<(u32, u32)> {
        self.param_ranges.get(&method_row).copied()
    }

    /// Returns the `CustomAttribute` rows of `parent` in table order.
    #[must_use]
    pub fn custom_attribute_rows(&self, parent: Token) -> &[u32] {
        self.custom_attributes
            .get(&parent)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns the `EventMap` row of a type.
    #[must_use]
    pub fn event_map_row(&self, type_row: u32) -> Option<u32> {
        self.event_maps.get(&type_row).copied()
    }

    /// Returns the `PropertyMap` row of a type.
    #[must_use]
    pub fn property_map_row(&self, type_row: u32) -> Option<u32> {
        self.property_maps.get(&type_row).copied()
    }

    /// Returns the number of `MethodImpl` rows whose body is the given method.
    #[must_use]
    pub fn method_impl_count(&self, method_row: u32) -> u32 {
        self.method_impls.get(&method_row).copied().unwrap_or(0)
    }

    /// Returns the state machine type a kickoff method was lowered into.
    #[must_use]
    pub fn state_machine_type(&self, kickoff: SymbolId) -> Option<SymbolId> {
        self.state_machines.get(&kickoff).copied()
    }
}

impl TypeTokenDecoder for ModuleMetadata {
    fn decode_type_token(&self, token: Token) -> Result<TypeRef> {
        match token.table_id() {
            Some(TableId::TypeDef) => self
                .definitions
                .get(&token)
                .map(|symbol| TypeRef::Definition(*symbol))
                .ok_or_else(|| Error::RowNotFound(format!("TypeDef {}", token))),
            Some(TableId::TypeRef) => self
                .type_refs
                .get(&token.row())
                .map(|external| TypeRef::External(external.clone()))
                .ok_or_else(|| Error::RowNotFound(format!("TypeRef {}", token))),
            Some(TableId::TypeSpec) => self
                .type_specs
                .get(&token.row())
                .cloned()
                .ok_or_else(|| Error::RowNotFound(format!("TypeSpec {}", token))),
            _ => Err(Error::Signature(format!(
                "Token {} is not a TypeDefOrRef",
                token
            ))),
        }
    }
}

impl fmt::Debug for ModuleMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleMetadata")
            .field("name", &self.name)
            .field("mvid", &self.mvid)
            .field("tables", &self.table_sizes)
            .field("heaps", &self.heap_sizes)
            .finish()
    }
}

/// Output of [`ModuleMetadataBuilder::emit`].
pub struct EmittedModule {
    /// The generation-0 metadata view
    pub metadata: Arc<ModuleMetadata>,
    /// Edit-and-Continue debug information, by `MethodDef` token
    pub debug_information: DebugInformationProvider,
    /// Local signature blobs, by `MethodDef` token
    pub local_signatures: LocalSignatureProvider,
}

/// Assigns generation-0 rows to a compilation.
pub struct ModuleMetadataBuilder {
    compilation: Arc<Compilation>,
    name: String,
    mvid: Option<Guid>,
    locals: HashMap<SymbolId, Vec<(TypeRef, LocalConstraints)>>,
    debug_information: HashMap<SymbolId, EditAndContinueMethodDebugInformation>,
}

impl ModuleMetadataBuilder {
    /// Creates a builder for `compilation`.
    #[must_use]
    pub fn new(compilation: Arc<Compilation>) -> Self {
        let name = format!("{}.dll", compilation.assembly_name());
        ModuleMetadataBuilder {
            compilation,
            name,
            mvid: None,
            locals: HashMap::new(),
            debug_information: HashMap::new(),
        }
    }

    /// Sets the module version id. Defaults to an id derived from the assembly name.
    #[must_use]
    pub fn mvid(mut self, mvid: Guid) -> Self {
        self.mvid = Some(mvid);
        self
    }

    /// Sets the module name. Defaults to `<assembly>.dll`.
    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Records the local variables of `method`.
    #[must_use]
    pub fn with_locals(mut self, method: SymbolId, locals: Vec<(TypeRef, LocalConstraints)>) -> Self {
        self.locals.insert(method, locals);
        self
    }

    /// Records the Edit-and-Continue debug information of `method`.
    #[must_use]
    pub fn with_debug_info(
        mut self,
        method: SymbolId,
        info: EditAndContinueMethodDebugInformation,
    ) -> Self {
        self.debug_information.insert(method, info);
        self
    }

    /// Assigns rows and builds the metadata view and its providers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SymbolNotFound`] for locals or debug information of symbols that
    /// are not methods of the compilation, and signature encoding failures.
    pub fn emit(self) -> Result<EmittedModule> {
        let compilation = self.compilation.clone();
        let mvid = self.mvid.unwrap_or_else(|| {
            name_based_guid(&[b"mvid".as_slice(), compilation.assembly_name().as_bytes()])
        });

        let mut writer = InitialWriter::new(&compilation);
        writer.assign_definition_rows();
        writer.heaps.strings.add(&self.name);
        writer.heaps.guids.add(mvid);
        writer.write_definitions()?;
        writer.write_custom_attributes()?;

        let mut local_signatures = HashMap::new();
        for (method, locals) in &self.locals {
            let token = writer.method_token(*method)?;
            let mut entries = Vec::with_capacity(locals.len());
            for (local_type, constraints) in locals {
                entries.push(encode_local(local_type, *constraints, &mut writer)?);
            }
            let blob = assemble_local_signature(&entries)?;
            writer.heaps.blobs.add(&blob);
            writer.sizes[TableId::StandAloneSig] += 1;
            local_signatures.insert(token, blob);
        }

        let mut debug_information = HashMap::new();
        for (method, info) in self.debug_information {
            debug_information.insert(writer.method_token(method)?, info);
        }

        let state_machines = compilation
            .symbols()
            .filter(|symbol| symbol.kind() == SymbolKind::Type)
            .filter_map(|symbol| {
                let generator = symbol.synthesized?.generator;
                let kickoff = compilation.get(generator)?;
                (parse_state_machine_type_name(&symbol.name) == Some(kickoff.name.as_str()))
                    .then_some((generator, symbol.id))
            })
            .collect();

        writer.sizes[TableId::Module] = 1;
        writer.sizes[TableId::Assembly] = 1;
        writer.sizes[TableId::AssemblyRef] = writer.assembly_refs.len();
        writer.sizes[TableId::ModuleRef] = writer.module_refs.len();
        writer.sizes[TableId::TypeRef] = writer.type_refs.len();
        writer.sizes[TableId::TypeSpec] = writer.type_specs.len();
        writer.sizes[TableId::MemberRef] = writer.member_refs.len();

        let definitions = writer
            .tokens
            .iter()
            .map(|(symbol, token)| (*token, *symbol))
            .collect();
        let type_refs = writer
            .type_refs
            .rows()
            .map(|(row, external)| (row, external.clone()))
            .collect();
        let type_specs = writer
            .type_specs
            .rows()
            .map(|(row, spec)| (row, spec.clone()))
            .collect();

        tracing::debug!(
            module = %self.name,
            types = writer.sizes[TableId::TypeDef],
            methods = writer.sizes[TableId::MethodDef],
            "assigned generation 0 rows"
        );

        let metadata = Arc::new(ModuleMetadata {
            mvid,
            name: self.name,
            compilation: compilation.clone(),
            tokens: writer.tokens,
            definitions,
            table_sizes: writer.sizes,
            heap_sizes: writer.heaps.sizes(),
            param_ranges: writer.param_ranges,
            custom_attributes: writer.custom_attributes,
            event_maps: writer.event_maps,
            property_maps: writer.property_maps,
            method_impls: writer.method_impls,
            state_machines,
            type_refs,
            type_specs,
        });

        let debug_information = Arc::new(debug_information);
        let local_signatures = Arc::new(local_signatures);
        Ok(EmittedModule {
            metadata,
            debug_information: Arc::new(move |token: Token| {
                Ok(debug_information.get(&token).cloned().unwrap_or_default())
            }),
            local_signatures: Arc::new(move |token: Token| Ok(local_signatures.get(&token).cloned())),
        })
    }
}

/// `HasCustomAttribute` coded index (II.24.2.6), used to sort the `CustomAttribute` table.
fn has_custom_attribute_index(token: Token) -> u32 {
    let tag = match token.table_id() {
        Some(TableId::MethodDef) => 0,
        Some(TableId::Field) => 1,
        Some(TableId::TypeRef) => 2,
        Some(TableId::TypeDef) => 3,
        Some(TableId::Param) => 4,
        Some(TableId::MemberRef) => 6,
        Some(TableId::Module) => 7,
        Some(TableId::Property) => 9,
        Some(TableId::Event) => 10,
        Some(TableId::GenericParam) => 19,
        _ => 31,
    };
    (token.row() << 5) | tag
}

/// Row assignment and reference allocation of generation 0.
struct InitialWriter<'a> {
    compilation: &'a Compilation,
    sizes: TableSizes,
    heaps: HeapBuilders,
    tokens: HashMap<SymbolId, Token>,
    param_ranges: HashMap<u32, (u32, u32)>,
    custom_attributes: HashMap<Token, Vec<u32>>,
    event_maps: HashMap<u32, u32>,
    property_maps: HashMap<u32, u32>,
    method_impls: HashMap<u32, u32>,
    assembly_refs: ReferenceIndex<String>,
    module_refs: ReferenceIndex<String>,
    type_refs: ReferenceIndex<ExternalType>,
    type_specs: ReferenceIndex<TypeRef>,
    member_refs: ReferenceIndex<(Token, String, Vec<u8>)>,
}

impl<'a> InitialWriter<'a> {
    fn new(compilation: &'a Compilation) -> Self {
        InitialWriter {
            compilation,
            sizes: TableSizes::new(),
            heaps: HeapBuilders::new(HeapSizes::default()),
            tokens: HashMap::new(),
            param_ranges: HashMap::new(),
            custom_attributes: HashMap::new(),
            event_maps: HashMap::new(),
            property_maps: HashMap::new(),
            method_impls: HashMap::new(),
            assembly_refs: ReferenceIndex::new(0),
            module_refs: ReferenceIndex::new(0),
            type_refs: ReferenceIndex::new(0),
            type_specs: ReferenceIndex::new(0),
            member_refs: ReferenceIndex::new(0),
        }
    }

    fn next_row(&mut self, table: TableId) -> Token {
        self.sizes[table] += 1;
        Token::from_parts(table, self.sizes[table])
    }

    fn method_token(&self, method: SymbolId) -> Result<Token> {
        self.tokens
            .get(&self.compilation.row_owner(method))
            .copied()
            .filter(|token| token.is_table(TableId::MethodDef))
            .ok_or_else(|| Error::SymbolNotFound(format!("{} is not a method", method)))
    }

    /// Row 1 of `TypeDef` is the `<Module>` type. Members are grouped per type.
    fn assign_definition_rows(&mut self) {
        let compilation = self.compilation;
        self.next_row(TableId::TypeDef);

        let types: Vec<_> = compilation
            .symbols()
            .filter(|symbol| symbol.kind() == SymbolKind::Type)
            .collect();

        for symbol in &types {
            let token = self.next_row(TableId::TypeDef);
            self.tokens.insert(symbol.id, token);
        }

        for table in [
            TableId::Field,
            TableId::MethodDef,
            TableId::Property,
            TableId::Event,
        ] {
            for symbol in &types {
                let type_row = self.tokens.get(&symbol.id).map_or(0, Token::row);
                let mut owns_member = false;
                for member in symbol
                    .members
                    .iter()
                    .filter(|id| compilation.row_owner(**id) == **id)
                    .filter_map(|id| compilation.get(*id))
                {
                    let matches = matches!(
                        (&member.data, table),
                        (SymbolData::Field(_), TableId::Field)
                            | (SymbolData::Method(_), TableId::MethodDef)
                            | (SymbolData::Property(_), TableId::Property)
                            | (SymbolData::Event(_), TableId::Event)
                    );
                    if matches {
                        let token = self.next_row(table);
                        self.tokens.insert(member.id, token);
                        owns_member = true;
                    }
                }

                if owns_member && table == TableId::Property {
                    let map = self.next_row(TableId::PropertyMap);
                    self.property_maps.insert(type_row, map.row());
                }
                if owns_member && table == TableId::Event {
                    let map = self.next_row(TableId::EventMap);
                    self.event_maps.insert(type_row, map.row());
                }
            }
        }

        let mut methods: Vec<_> = self
            .tokens
            .iter()
            .filter(|(_, token)| token.is_table(TableId::MethodDef))
            .map(|(symbol, token)| (token.row(), *symbol))
            .collect();
        methods.sort_unstable();

        for (row, method) in methods {
            let Some(data) = compilation.get(method).and_then(|symbol| symbol.as_method()) else {
                continue;
            };
            let first = self.sizes[TableId::Param] + 1;
            let count = data.parameters.len() as u32;
            self.sizes[TableId::Param] += count;
            self.param_ranges.insert(row, (first, count));

            if !data.implements.is_empty() {
                self.method_impls.insert(row, data.implements.len() as u32);
                self.sizes[TableId::MethodImpl] += data.implements.len() as u32;
            }
            if data.association.is_some() {
                self.sizes[TableId::MethodSemantics] += 1;
            }
        }
    }

    fn write_definitions(&mut self) -> Result<()> {
        let compilation = self.compilation;
        for symbol in compilation
            .symbols()
            .filter(|symbol| compilation.row_owner(symbol.id) == symbol.id)
        {
            match &symbol.data {
                SymbolData::Namespace => {
                    self.heaps.strings.add(&compilation.namespace_name(symbol.id));
                }
                SymbolData::Type(data) => {
                    self.heaps.strings.add(&symbol.name);
                    if let Some(base) = &data.base {
                        self.resolve_type(base)?;
                    }
                    if matches!(
                        symbol.container.and_then(|c| compilation.get(c)).map(|c| c.kind()),
                        Some(SymbolKind::Type)
                    ) {
                        self.sizes[TableId::NestedClass] += 1;
                    }
                    self.write_generic_parameters(&data.generic_parameters)?;
                }
                SymbolData::Field(data) => {
                    self.heaps.strings.add(&symbol.name);
                    let signature = encode_field_signature(&data.field_type, self)?;
                    self.heaps.blobs.add(&signature);
                }
                SymbolData::Method(data) => {
                    self.heaps.strings.add(&symbol.name);
                    let signature = encode_method_signature(&data.signature, self)?;
                    self.heaps.blobs.add(&signature);
                    for parameter in &data.parameters {
                        self.heaps.strings.add(&parameter.name);
                    }
                    for implemented in &data.implements {
                        self.resolve_member(implemented)?;
                    }
                    self.write_generic_parameters(&data.generic_parameters)?;
                }
                SymbolData::Property(data) => {
                    self.heaps.strings.add(&symbol.name);
                    let signature = encode_property_signature(&data.signature, self)?;
                    self.heaps.blobs.add(&signature);
                }
                SymbolData::Event(data) => {
                    self.heaps.strings.add(&symbol.name);
                    self.resolve_type(&data.event_type)?;
                }
            }
        }
        Ok(())
    }

    fn write_generic_parameters(
        &mut self,
        parameters: &[GenericParameter],
    ) -> Result<()> {
        for parameter in parameters {
            self.sizes[TableId::GenericParam] += 1;
            self.heaps.strings.add(&parameter.name);
            for constraint in &parameter.constraints {
                self.resolve_type(constraint)?;
                self.sizes[TableId::GenericParamConstraint] += 1;
            }
        }
        Ok(())
    }

    fn write_custom_attributes(&mut self) -> Result<()> {
        let compilation = self.compilation;
        let mut rows = Vec::new();

        for symbol in compilation.symbols() {
            let Some(token) = self.tokens.get(&symbol.id).copied() else {
                continue;
            };
            for attribute in &symbol.attributes {
                rows.push((token, attribute));
            }

            if let (Some(method), Some((first, _))) = (
                symbol.as_method(),
                self.param_ranges.get(&token.row()).copied(),
            ) {
                for (offset, parameter) in method.parameters.iter().enumerate() {
                    let param = Token::from_parts(TableId::Param, first + offset as u32);
                    for attribute in &parameter.attributes {
                        rows.push((param, attribute));
                    }
                }
            }
        }

        rows.sort_by_key(|(parent, _)| has_custom_attribute_index(*parent));
        for (parent, attribute) in rows {
            self.resolve_member(&attribute.constructor)?;
            self.heaps.blobs.add(&attribute.value);
            let row = self.next_row(TableId::CustomAttribute).row();
            self.custom_attributes.entry(parent).or_default().push(row);
        }
        Ok(())
    }

    fn resolution_scope(&mut self, scope: &ResolutionScope) -> Token {
        match scope {
            ResolutionScope::Assembly(name) => {
                let (row, is_new) = self.assembly_refs.get_or_add(name.clone());
                if is_new {
                    self.heaps.strings.add(name);
                }
                Token::from_parts(TableId::AssemblyRef, row)
            }
            ResolutionScope::Module(name) => {
                let (row, is_new) = self.module_refs.get_or_add(name.clone());
                if is_new {
                    self.heaps.strings.add(name);
                }
                Token::from_parts(TableId::ModuleRef, row)
            }
        }
    }

    fn resolve_member(&mut self, member: &MemberReference) -> Result<Token> {
        match member {
            MemberReference::Method(id) | MemberReference::Field(id) => self
                .tokens
                .get(id)
                .copied()
                .ok_or_else(|| Error::SymbolNotFound(id.to_string())),
            MemberReference::External(external) => {
                let class = self.resolve_type(&external.parent)?;
                let signature = match &external.signature {
                    MemberSignature::Method(signature) => encode_method_signature(signature, self)?,
                    MemberSignature::Field(field_type) => encode_field_signature(field_type, self)?,
                };
                let (row, is_new) = self.member_refs.get_or_add((
                    class,
                    external.name.clone(),
                    signature.clone(),
                ));
                if is_new {
                    self.heaps.strings.add(&external.name);
                    self.heaps.blobs.add(&signature);
                }
                Ok(Token::from_parts(TableId::MemberRef, row))
            }
            MemberReference::MemberOfGeneric { parent, member } => {
                let class = self.resolve_type(parent)?;
                let symbol = self.compilation.symbol(*member)?;
                let signature = match &symbol.data {
                    SymbolData::Method(data) => encode_method_signature(&data.signature, self)?,
                    SymbolData::Field(data) => encode_field_signature(&data.field_type, self)?,
                    _ => {
                        return Err(malformed_error!(
                            "{} cannot be referenced through {}",
                            member,
                            parent
                        ))
                    }
                };
                let (row, _) =
                    self.member_refs
                        .get_or_add((class, symbol.name.clone(), signature));
                Ok(Token::from_parts(TableId::MemberRef, row))
            }
            MemberReference::Type(_)
            | MemberReference::MethodInstance { .. }
            | MemberReference::String(_) => Err(malformed_error!(
                "{:?} cannot be referenced from generation 0 metadata",
                member
            )),
        }
    }
}

impl TypeTokenResolver for InitialWriter<'_> {
    fn resolve_type(&mut self, reference: &TypeRef) -> Result<Token> {
        match reference {
            TypeRef::Definition(id) => self
                .tokens
                .get(id)
                .copied()
                .filter(|token| token.is_table(TableId::TypeDef))
                .ok_or_else(|| Error::SymbolNotFound(format!("{} is not a type", id))),
            TypeRef::External(external) => {
                let (row, is_new) = self.type_refs.get_or_add(external.clone());
                if is_new {
                    self.resolution_scope(&external.scope);
                    self.heaps.strings.add(&external.name);
                    self.heaps.strings.add(&external.namespace);
                }
                Ok(Token::from_parts(TableId::TypeRef, row))
            }
            TypeRef::Primitive(primitive) => {
                let external = primitive.system_type(self.compilation.core_library());
                self.resolve_type(&TypeRef::External(external))
            }
            _ => {
                let blob = encode_type_spec(reference, self)?;
                let (row, is_new) = self.type_specs.get_or_add(reference.clone());
                if is_new {
                    self.heaps.blobs.add(&blob);
                }
                Ok(Token::from_parts(TableId::TypeSpec, row))
            }
        }
    }

    fn is_value_type(&self, reference: &TypeRef) -> bool {
        match reference {
            TypeRef::Definition(id) => self
                .compilation
                .get(*id)
                .and_then(|symbol| symbol.as_type())
                .is_some_and(|data| data.is_value_type()),
            TypeRef::External(external) => external.is_value_type,
            TypeRef::Primitive(primitive) => primitive.is_value_type(),
            _ => false,
        }
    }
}
