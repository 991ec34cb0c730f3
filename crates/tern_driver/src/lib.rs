//! Compilation entry points for Tern
//!
//! A request takes every source file at once, links them into one program and
//! renders JavaScript. Semantic problems are collected as diagnostics; only
//! lexer failures abort the request.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use tern_codegen::{Codegen, CodegenOptions};
use tern_diagnostics::Diagnostics;
use tern_resolve::{LinkError, LinkOptions};

pub use tern_codegen::{OutputFormat, SourceMap};
pub use tern_diagnostics::{Diagnostic, Severity};
pub use tern_resolve::{CompileMode, ImplicitMemberCallPolicy};

/// File name used by [`compile_source`]
pub const REPL_FILE: &str = "<repl>";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    pub output_format: OutputFormat,
    pub optimize: bool,
    pub debug: bool,
    pub implicit_member_calls: ImplicitMemberCallPolicy,
    /// Produce a source map alongside the code
    pub source_map: bool,
    /// Generated file name recorded in the source map
    pub out_file: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Script,
            optimize: false,
            debug: false,
            implicit_member_calls: ImplicitMemberCallPolicy::Warn,
            source_map: false,
            out_file: "out.js".to_string(),
        }
    }
}

/// Outcome of one compilation request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilationResult {
    pub success: bool,
    /// Absent whenever an error diagnostic was reported
    pub code: Option<String>,
    /// Errors first, then warnings
    pub diagnostics: Vec<Diagnostic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_map: Option<SourceMap>,
}

impl CompilationResult {
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("lex error in {file}: {message}")]
    Lex {
        file: String,
        line: u32,
        column: u32,
        message: String,
    },
}

impl From<LinkError> for CompileError {
    fn from(err: LinkError) -> Self {
        match err {
            LinkError::Lex { file, source } => CompileError::Lex {
                file,
                line: source.line(),
                column: source.column(),
                message: source.to_string(),
            },
        }
    }
}

impl CompileError {
    pub fn file(&self) -> &str {
        match self {
            CompileError::Lex { file, .. } => file,
        }
    }

    /// The failure as a located error diagnostic
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            CompileError::Lex {
                file,
                line,
                column,
                message,
            } => Diagnostic::error(message.clone()).with_location(file.clone(), *line, *column),
        }
    }
}

/// Compile a set of files keyed by name
pub fn compile(
    sources: &BTreeMap<String, String>,
    mode: CompileMode,
    options: &CompileOptions,
) -> Result<CompilationResult, CompileError> {
    info!(files = sources.len(), ?mode, "compiling");

    let mut diagnostics = Diagnostics::new();
    let link_options = LinkOptions {
        mode,
        implicit_member_calls: options.implicit_member_calls,
    };
    let linked = tern_resolve::link(sources, &link_options, &mut diagnostics)?;

    if diagnostics.has_errors() {
        debug!(errors = diagnostics.errors().len(), "skipping code generation");
        return Ok(CompilationResult {
            success: false,
            code: None,
            diagnostics: diagnostics.into_vec(),
            source_map: None,
        });
    }

    let codegen = Codegen::new(CodegenOptions {
        format: options.output_format,
        optimize: options.optimize,
        debug: options.debug,
        source_map: options.source_map.then(|| options.out_file.clone()),
    });
    let generated = codegen.generate(&linked.program, &linked.files);
    debug!(bytes = generated.code.len(), "generated code");

    Ok(CompilationResult {
        success: true,
        code: Some(generated.code),
        diagnostics: diagnostics.into_vec(),
        source_map: generated.source_map,
    })
}

/// Compile one source string as a lone file in repl mode
pub fn compile_source(source: &str, options: &CompileOptions) -> Result<CompilationResult, CompileError> {
    let mut sources = BTreeMap::new();
    sources.insert(REPL_FILE.to_string(), source.to_string());
    compile(&sources, CompileMode::Repl, options)
}
