use strum::{EnumCount, EnumIter, IntoEnumIterator};

/// Identifiers for the ECMA-335 metadata tables that can appear in a module or in an
/// Edit-and-Continue delta.
///
/// The numeric values are the table numbers from the CLI specification and form the high
/// byte of a [`crate::metadata::token::Token`]. Portable PDB tables are not listed since
/// deltas produced here never carry them.
///
/// ## Reference
/// * [ECMA-335 Partition II, Section 22](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf) - Metadata Tables
#[derive(Clone, Copy, PartialEq, Debug, EnumIter, EnumCount, Eq, Hash, PartialOrd, Ord)]
pub enum TableId {
    /// `Module` table (0x00). A delta rewrites row 1 with the new generation and ids.
    Module = 0x00,
    /// `TypeRef` table (0x01).
    TypeRef = 0x01,
    /// `TypeDef` table (0x02).
    TypeDef = 0x02,
    /// `FieldPtr` table (0x03), indirection table of unoptimized metadata.
    FieldPtr = 0x03,
    /// `Field` table (0x04).
    Field = 0x04,
    /// `MethodPtr` table (0x05), indirection table of unoptimized metadata.
    MethodPtr = 0x05,
    /// `MethodDef` table (0x06).
    MethodDef = 0x06,
    /// `ParamPtr` table (0x07), indirection table of unoptimized metadata.
    ParamPtr = 0x07,
    /// `Param` table (0x08).
    Param = 0x08,
    /// `InterfaceImpl` table (0x09).
    InterfaceImpl = 0x09,
    /// `MemberRef` table (0x0A).
    MemberRef = 0x0A,
    /// `Constant` table (0x0B).
    Constant = 0x0B,
    /// `CustomAttribute` table (0x0C).
    CustomAttribute = 0x0C,
    /// `FieldMarshal` table (0x0D).
    FieldMarshal = 0x0D,
    /// `DeclSecurity` table (0x0E).
    DeclSecurity = 0x0E,
    /// `ClassLayout` table (0x0F).
    ClassLayout = 0x0F,
    /// `FieldLayout` table (0x10).
    FieldLayout = 0x10,
    /// `StandAloneSig` table (0x11), holds local variable signatures.
    StandAloneSig = 0x11,
    /// `EventMap` table (0x12).
    EventMap = 0x12,
    /// `EventPtr` table (0x13), indirection table of unoptimized metadata.
    EventPtr = 0x13,
    /// `Event` table (0x14).
    Event = 0x14,
    /// `PropertyMap` table (0x15).
    PropertyMap = 0x15,
    /// `PropertyPtr` table (0x16), indirection table of unoptimized metadata.
    PropertyPtr = 0x16,
    /// `Property` table (0x17).
    Property = 0x17,
    /// `MethodSemantics` table (0x18).
    MethodSemantics = 0x18,
    /// `MethodImpl` table (0x19).
    MethodImpl = 0x19,
    /// `ModuleRef` table (0x1A).
    ModuleRef = 0x1A,
    /// `TypeSpec` table (0x1B).
    TypeSpec = 0x1B,
    /// `ImplMap` table (0x1C).
    ImplMap = 0x1C,
    /// `FieldRVA` table (0x1D).
    FieldRva = 0x1D,
    /// `EncLog` table (0x1E), the Edit-and-Continue operation log.
    EncLog = 0x1E,
    /// `EncMap` table (0x1F), the sorted list of tokens touched by a delta.
    EncMap = 0x1F,
    /// `Assembly` table (0x20).
    Assembly = 0x20,
    /// `AssemblyProcessor` table (0x21).
    AssemblyProcessor = 0x21,
    /// `AssemblyOS` table (0x22).
    AssemblyOS = 0x22,
    /// `AssemblyRef` table (0x23).
    AssemblyRef = 0x23,
    /// `AssemblyRefProcessor` table (0x24).
    AssemblyRefProcessor = 0x24,
    /// `AssemblyRefOS` table (0x25).
    AssemblyRefOS = 0x25,
    /// `File` table (0x26).
    File = 0x26,
    /// `ExportedType` table (0x27).
    ExportedType = 0x27,
    /// `ManifestResource` table (0x28).
    ManifestResource = 0x28,
    /// `NestedClass` table (0x29).
    NestedClass = 0x29,
    /// `GenericParam` table (0x2A).
    GenericParam = 0x2A,
    /// `MethodSpec` table (0x2B).
    MethodSpec = 0x2B,
    /// `GenericParamConstraint` table (0x2C).
    GenericParamConstraint = 0x2C,
}

impl TableId {
    /// Looks up the table for a token's high byte.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<TableId> {
        TableId::iter().find(|table| *table as u8 == value)
    }

    /// Returns true for tables whose rows are only ever appended by a delta and never
    /// updated in place.
    #[must_use]
    pub fn is_reference_table(&self) -> bool {
        matches!(
            self,
            TableId::AssemblyRef
                | TableId::ModuleRef
                | TableId::MemberRef
                | TableId::MethodSpec
                | TableId::TypeRef
                | TableId::TypeSpec
                | TableId::StandAloneSig
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u8_roundtrips_every_table() {
        for table in TableId::iter() {
            assert_eq!(TableId::from_u8(table as u8), Some(table));
        }
        assert_eq!(TableId::from_u8(0x70), None);
        assert_eq!(TableId::from_u8(0x2D), None);
    }

    #[test]
    fn test_table_count() {
        assert_eq!(TableId::COUNT, 45);
    }

    #[test]
    fn test_reference_tables() {
        assert!(TableId::TypeRef.is_reference_table());
        assert!(TableId::StandAloneSig.is_reference_table());
        assert!(!TableId::TypeDef.is_reference_table());
        assert!(!TableId::CustomAttribute.is_reference_table());
    }
}
