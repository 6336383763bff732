//! Edit-and-Continue debug information of previously emitted methods.
//!
//! The compiler records, per method, which synthesized kind and syntax position every
//! local slot, lambda and closure came from. The record is stored in the PDB of the
//! original module and in the baseline for methods emitted by later generations. It is
//! what allows an updated body to put a variable back into the slot a live frame already
//! uses.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::{emit::locals::SynthesizedLocalKind, metadata::token::Token, Result};

/// Identity of a method, lambda or closure: an ordinal plus the generation that
/// introduced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DebugId {
    /// Ordinal within the containing method or type
    pub ordinal: i32,
    /// Generation that produced the id
    pub generation: i32,
}

impl DebugId {
    /// Creates an id.
    #[must_use]
    pub fn new(ordinal: i32, generation: i32) -> Self {
        DebugId {
            ordinal,
            generation,
        }
    }
}

impl fmt::Display for DebugId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.generation > 0 {
            write!(f, "{}#{}", self.ordinal, self.generation)
        } else {
            write!(f, "{}", self.ordinal)
        }
    }
}

/// Position of a local declaration: syntax offset relative to the method body start plus
/// an ordinal distinguishing several locals declared by the same syntax node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalDebugId {
    /// Offset of the declaring syntax relative to the method body
    pub syntax_offset: i32,
    /// Ordinal among locals declared by the same syntax
    pub ordinal: i32,
}

impl LocalDebugId {
    /// Creates a local id.
    #[must_use]
    pub fn new(syntax_offset: i32, ordinal: i32) -> Self {
        LocalDebugId {
            syntax_offset,
            ordinal,
        }
    }
}

/// What produced a local slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LocalSlotDebugInfo {
    /// Kind of local
    pub kind: SynthesizedLocalKind,
    /// Declaration position
    pub id: LocalDebugId,
}

impl LocalSlotDebugInfo {
    /// Creates slot debug info.
    #[must_use]
    pub fn new(kind: SynthesizedLocalKind, id: LocalDebugId) -> Self {
        LocalSlotDebugInfo { kind, id }
    }
}

/// Debug record of a lambda.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LambdaDebugInfo {
    /// Offset of the lambda syntax relative to the method body
    pub syntax_offset: i32,
    /// Identity of the lambda
    pub lambda_id: DebugId,
    /// Closure the lambda is emitted into, or one of the special ordinals
    pub closure_ordinal: i32,
}

impl LambdaDebugInfo {
    /// The lambda captures nothing and lives in the static closure.
    pub const STATIC_CLOSURE_ORDINAL: i32 = -1;
    /// The lambda captures only `this` and is emitted on the containing type.
    pub const THIS_ONLY_CLOSURE_ORDINAL: i32 = -2;
}

/// Debug record of a closure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClosureDebugInfo {
    /// Offset of the scope syntax the closure was created for
    pub syntax_offset: i32,
    /// Identity of the closure
    pub closure_id: DebugId,
}

/// Per-method Edit-and-Continue debug record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EditAndContinueMethodDebugInformation {
    /// Ordinal of the method among the members of its type
    pub method_ordinal: i32,
    /// Slot records, indexed like the local signature (or the hoisted fields of a
    /// state machine)
    pub local_slots: Vec<LocalSlotDebugInfo>,
    /// Lambdas declared in the method
    pub lambdas: Vec<LambdaDebugInfo>,
    /// Closures created by the method
    pub closures: Vec<ClosureDebugInfo>,
}

/// Returns the debug information of a method of the original module, by token.
pub type DebugInformationProvider =
    Arc<dyn Fn(Token) -> Result<EditAndContinueMethodDebugInformation> + Send + Sync>;

/// Returns the local signature blob of a method of the original module, by token.
/// `Ok(None)` means the method has no locals.
pub type LocalSignatureProvider = Arc<dyn Fn(Token) -> Result<Option<Vec<u8>>> + Send + Sync>;

/// Memoizing wrapper around a [`DebugInformationProvider`].
///
/// The provider is a pure function, so results are cached per token and shared by every
/// clone of the wrapper (and therefore by every baseline derived from the same original
/// module). Failures are not cached.
#[derive(Clone)]
pub struct CachedDebugInformation {
    provider: DebugInformationProvider,
    cache: Arc<DashMap<Token, EditAndContinueMethodDebugInformation>>,
}

impl CachedDebugInformation {
    /// Wraps `provider`.
    #[must_use]
    pub fn new(provider: DebugInformationProvider) -> Self {
        CachedDebugInformation {
            provider,
            cache: Arc::new(DashMap::new()),
        }
    }

    /// Returns the debug information for `method`.
    ///
    /// # Errors
    ///
    /// Propagates failures of the wrapped provider.
    pub fn get(&self, method: Token) -> Result<EditAndContinueMethodDebugInformation> {
        if let Some(cached) = self.cache.get(&method) {
            return Ok(cached.value().clone());
        }

        let info = (self.provider)(method)?;
        self.cache.insert(method, info.clone());
        Ok(info)
    }

    /// Returns the number of cached entries.
    #[must_use]
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}

impl fmt::Debug for CachedDebugInformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedDebugInformation")
            .field("cached", &self.cache.len())
            .finish()
    }
}
