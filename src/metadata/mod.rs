//! ECMA-335 metadata as seen by the delta emitter.
//!
//! This module contains everything needed to describe the original module and to write
//! its deltas: tokens, table rows, heap builders, signature encoding and method body
//! headers.
//!
//! # Key Components
//!
//! - [`token`] - Metadata tokens, stable across generations
//! - [`tables`] - Table ids, row shapes, `EncLog` and `EncMap`
//! - [`heaps`] - Append-only builders for `#Strings`, `#Blob`, `#US` and `#GUID`
//! - [`signatures`] - Signature blob encoding and local signature decoding
//! - [`body`] - Method body headers and the IL stream of a delta
//! - [`module`] - The original module: row assignment, debug information and local
//!   signatures of generation 0
//! - [`diagnostics`] - Recoverable problems reported during emission

/// Method body headers and IL stream building
pub mod body;
/// Diagnostics collected during emission
pub mod diagnostics;
/// Metadata heap builders
pub mod heaps;
/// The original module
pub mod module;
/// Signature encoding and decoding
pub mod signatures;
/// Table identifiers and rows
pub mod tables;
/// Metadata tokens
pub mod token;
