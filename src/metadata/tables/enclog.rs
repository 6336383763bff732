//! `EncLog` table rows.
//!
//! The `EncLog` table (0x1E) lists every row a delta touches, in the order the runtime has
//! to apply them. Rows that extend a parent (a field added to a type, a parameter added to
//! a method, ...) are preceded by an entry carrying the parent token and the matching
//! `Add*` operation code.
//!
//! # Reference
//! - [ECMA-335 II.22.12](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf) - `EncLog` table specification

use std::fmt;

use crate::metadata::token::Token;

/// Operation code of an `EncLog` row.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
#[repr(u32)]
pub enum EditAndContinueOperation {
    /// The row identified by the token is added or replaced as-is.
    Default = 0,
    /// The next `MethodDef` row is added to the type identified by the token.
    AddMethod = 1,
    /// The next `Field` row is added to the type identified by the token.
    AddField = 2,
    /// The next `Param` row is added to the method identified by the token.
    AddParameter = 3,
    /// The next `Property` row is added to the `PropertyMap` row identified by the token.
    AddProperty = 4,
    /// The next `Event` row is added to the `EventMap` row identified by the token.
    AddEvent = 5,
}

impl EditAndContinueOperation {
    /// Returns the operation code as stored in the `FuncCode` column.
    #[must_use]
    pub fn code(&self) -> u32 {
        *self as u32
    }
}

impl fmt::Display for EditAndContinueOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EditAndContinueOperation::Default => "Default",
            EditAndContinueOperation::AddMethod => "AddMethod",
            EditAndContinueOperation::AddField => "AddField",
            EditAndContinueOperation::AddParameter => "AddParameter",
            EditAndContinueOperation::AddProperty => "AddProperty",
            EditAndContinueOperation::AddEvent => "AddEvent",
        };
        f.write_str(name)
    }
}

/// A single `EncLog` row: the token of the affected entity and the operation applied to it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct EncLogRow {
    /// Token of the row being added or updated, or of the parent for `Add*` operations
    pub token: Token,
    /// Operation applied to the token
    pub operation: EditAndContinueOperation,
}

impl EncLogRow {
    /// Creates a new `EncLog` row.
    #[must_use]
    pub fn new(token: Token, operation: EditAndContinueOperation) -> Self {
        EncLogRow { token, operation }
    }
}

impl fmt::Display for EncLogRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.token, self.operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tables::TableId;

    #[test]
    fn test_operation_codes() {
        assert_eq!(EditAndContinueOperation::Default.code(), 0);
        assert_eq!(EditAndContinueOperation::AddMethod.code(), 1);
        assert_eq!(EditAndContinueOperation::AddField.code(), 2);
        assert_eq!(EditAndContinueOperation::AddParameter.code(), 3);
        assert_eq!(EditAndContinueOperation::AddProperty.code(), 4);
        assert_eq!(EditAndContinueOperation::AddEvent.code(), 5);
    }

    #[test]
    fn test_row_display() {
        let row = EncLogRow::new(
            Token::from_parts(TableId::TypeDef, 2),
            EditAndContinueOperation::AddMethod,
        );
        assert_eq!(row.to_string(), "0x02000002 AddMethod");
    }
}
