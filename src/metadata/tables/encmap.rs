//! `EncMap` table.
//!
//! The `EncMap` table (0x1F) lists every token whose row content is carried by a delta,
//! sorted by table and then by row. The runtime uses it to associate the physical rows of
//! the delta with their logical row ids, so the list must be strictly increasing.
//!
//! # Reference
//! - [ECMA-335 II.22.13](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf) - `EncMap` table specification

use crate::{
    metadata::tables::{EditAndContinueOperation, EncLogRow},
    metadata::token::Token,
    Result,
};

/// The sorted token list of one delta.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncMap {
    tokens: Vec<Token>,
}

impl EncMap {
    /// Builds the map from an `EncLog`.
    ///
    /// Every `Default` entry contributes its token. `Add*` entries name a parent and are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Invariant`] if a token occurs twice. A duplicate means two
    /// rows were emitted for one logical entity, which would corrupt the runtime's view of
    /// the module.
    pub fn from_log(log: &[EncLogRow]) -> Result<EncMap> {
        let mut tokens: Vec<Token> = log
            .iter()
            .filter(|row| row.operation == EditAndContinueOperation::Default)
            .map(|row| row.token)
            .collect();
        tokens.sort_unstable();

        if let Some(pair) = tokens.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(invariant_error!(
                "Duplicate token {} in EncMap",
                pair[0]
            ));
        }

        Ok(EncMap { tokens })
    }

    /// Returns the tokens in table/row order.
    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Returns the number of tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns true if the delta touches no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Returns true if `token` is part of the map.
    #[must_use]
    pub fn contains(&self, token: Token) -> bool {
        self.tokens.binary_search(&token).is_ok()
    }
}
