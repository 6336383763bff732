// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![allow(clippy::too_many_arguments)]

//! # dotdelta
//!
//! An Edit-and-Continue delta emitter for .NET metadata. Given the module a process was
//! started with, a new compilation and the semantic edits between the two, `dotdelta`
//! produces the metadata, IL and `EncLog`/`EncMap` deltas the runtime applies to the
//! running process, and carries the cumulative state needed for the next edit.
//!
//! ## Features
//!
//! - **Stable row ids** - Updated definitions keep their tokens across any number of
//!   generations; added definitions extend the tables
//! - **Local slot preservation** - Variables of active methods keep their slots, hoisted
//!   state machine fields keep their names
//! - **Deleted members** - Removed methods are replaced by throwing stubs, so stale
//!   callers fail loudly instead of executing dead code
//! - **Attribute merging** - Attribute rows of existing definitions are reused, cleared
//!   or extended
//! - **Diagnostics** - User-facing problems are reported without aborting the process
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dotdelta::prelude::*;
//!
//! let module = ModuleMetadataBuilder::new(compilation0.clone()).emit()?;
//! let baseline = EmitBaseline::create_initial_baseline(
//!     compilation0,
//!     module.metadata,
//!     module.debug_information,
//!     module.local_signatures,
//! )?;
//!
//! let result = emit_difference(
//!     &baseline,
//!     compilation1,
//!     &[SemanticEdit::update(method0, method1)],
//!     &bodies,
//!     &EmitOptions::default(),
//!     &CancellationToken::new(),
//! )?;
//! assert!(result.success);
//! # Ok::<(), dotdelta::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`symbols`] - The compilation model: symbols in an arena, types and signatures,
//!   and matching of symbols across compilations
//! - [`metadata`] - Tokens, tables, heaps, signatures and the original module
//! - [`emit`] - Change classification, row mapping, slot allocation, the delta writer
//!   and the baseline chain
//! - [`prelude`] - Re-exports of the commonly used types
//! - [`Error`] and [`Result`] - Error handling

#[macro_use]
pub(crate) mod error;

pub(crate) mod utils;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use dotdelta::prelude::*;
///
/// let options = EmitOptions::strict();
/// assert!(options.validate_enc_map());
/// ```
pub mod prelude;

/// Delta emission: change classification, row mapping, slot allocation and writing.
pub mod emit;

/// Metadata tokens, tables, heaps, signatures and the original module.
pub mod metadata;

/// The compilation model the emitter works on.
pub mod symbols;

/// `dotdelta` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `dotdelta` Error type
///
/// The main error type for all operations in this crate.
///
/// # Examples
///
/// ```rust
/// use dotdelta::{emit::CancellationToken, Error};
///
/// let token = CancellationToken::new();
/// token.cancel();
/// match token.check() {
///     Err(Error::Cancelled) => {}
///     other => panic!("unexpected {:?}", other),
/// }
/// ```
pub use error::Error;
