//! Semantic edits reported by the front end.

use std::fmt;
use std::sync::Arc;

use crate::symbols::SymbolId;

/// Maps an absolute source position in the current generation to the position of the
/// corresponding syntax in the previous generation.
pub type SyntaxMapper = Arc<dyn Fn(u32) -> Option<u32> + Send + Sync>;

/// Kind of a semantic edit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SemanticEditKind {
    /// The symbol exists in both generations and changed
    Update,
    /// The symbol is new
    Insert,
    /// The symbol replaces a previous definition that cannot be updated in place
    Replace,
    /// The symbol was removed
    Delete,
}

/// One edit between the previous and the current compilation.
///
/// For [`SemanticEditKind::Delete`], `old_symbol` is the removed symbol (a handle of the
/// previous compilation) and `new_symbol` the type that contained it in the current one.
#[derive(Clone)]
pub struct SemanticEdit {
    /// Kind of the edit
    pub kind: SemanticEditKind,
    /// Symbol in the previous compilation
    pub old_symbol: Option<SymbolId>,
    /// Symbol in the current compilation
    pub new_symbol: SymbolId,
    /// Syntax map for methods whose locals are preserved
    pub syntax_map: Option<SyntaxMapper>,
    /// True if the method may have live frames whose state must survive
    pub preserve_local_variables: bool,
}

impl SemanticEdit {
    /// An update of `new_symbol`, which corresponds to `old_symbol`.
    #[must_use]
    pub fn update(old_symbol: SymbolId, new_symbol: SymbolId) -> Self {
        SemanticEdit {
            kind: SemanticEditKind::Update,
            old_symbol: Some(old_symbol),
            new_symbol,
            syntax_map: None,
            preserve_local_variables: false,
        }
    }

    /// An inserted symbol.
    #[must_use]
    pub fn insert(new_symbol: SymbolId) -> Self {
        SemanticEdit {
            kind: SemanticEditKind::Insert,
            old_symbol: None,
            new_symbol,
            syntax_map: None,
            preserve_local_variables: false,
        }
    }

    /// A replaced symbol.
    #[must_use]
    pub fn replace(new_symbol: SymbolId) -> Self {
        SemanticEdit {
            kind: SemanticEditKind::Replace,
            ..SemanticEdit::insert(new_symbol)
        }
    }

    /// A deleted symbol and the current type that contained it.
    #[must_use]
    pub fn delete(old_symbol: SymbolId, new_container: SymbolId) -> Self {
        SemanticEdit {
            kind: SemanticEditKind::Delete,
            old_symbol: Some(old_symbol),
            ..SemanticEdit::insert(new_container)
        }
    }

    /// Preserves the method's variables, mapping syntax through `syntax_map`.
    #[must_use]
    pub fn with_syntax_map(mut self, syntax_map: SyntaxMapper) -> Self {
        self.syntax_map = Some(syntax_map);
        self.preserve_local_variables = true;
        self
    }

    /// Preserves the method's variables without a syntax map. The source of the method is
    /// taken as unchanged, so every syntax offset maps to itself.
    #[must_use]
    pub fn preserving_locals(mut self) -> Self {
        self.preserve_local_variables = true;
        self
    }
}

impl fmt::Debug for SemanticEdit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SemanticEdit")
            .field("kind", &self.kind)
            .field("old_symbol", &self.old_symbol)
            .field("new_symbol", &self.new_symbol)
            .field("syntax_map", &self.syntax_map.is_some())
            .field("preserve_local_variables", &self.preserve_local_variables)
            .finish()
    }
}
