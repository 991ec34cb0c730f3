//! Code generation for Tern
//!
//! This module renders the linked AST as JavaScript text, optionally with a
//! statement-level source map.

mod codegen;
mod source_map;

pub use codegen::{Codegen, CodegenOptions, Generated, OutputFormat, generate};
pub use source_map::{Mapping, SourceMap, SourceMapBuilder, encode_mappings, encode_vlq};
