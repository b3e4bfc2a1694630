//! Source-to-source JavaScript obfuscation on the swc AST: scope-aware
//! identifier renaming and string-literal extraction into an encoded array.

use swc_core::{common::SourceMapper, ecma::ast::Program};
use tracing::{debug, debug_span};

pub mod console;
pub mod debug_protection;
pub mod error;
pub mod names;
pub mod options;
pub mod pipeline;
pub mod rename;
pub mod scope;
pub mod string_array;
pub mod syntax;
pub mod template;

#[cfg(feature = "plugin")]
mod plugin;

pub use error::{ConfigurationError, ObfuscatorError, Result, TransformError};
pub use options::{ObfuscatorOptions, Pattern};
pub use pipeline::{Pipeline, RunStats, TransformContext};
pub use string_array::StringArrayEncoding;

#[derive(Debug, Clone)]
pub struct ObfuscationResult {
    pub code: String,
    pub stats: RunStats,
}

/// Parse, obfuscate and print `source`.
pub fn obfuscate(source: &str, options: &ObfuscatorOptions) -> Result<ObfuscationResult> {
    obfuscate_file("input.js", source, options)
}

/// Like [`obfuscate`], with `file` used for syntax selection and error locations.
pub fn obfuscate_file(
    file: &str,
    source: &str,
    options: &ObfuscatorOptions,
) -> Result<ObfuscationResult> {
    options.validate()?;
    let (cm, mut program) = syntax::parse_program(file, source)?;
    let stats = obfuscate_program(&mut program, options, Some(&*cm))?;
    let code = syntax::print_program(cm, &program)?;
    Ok(ObfuscationResult { code, stats })
}

/// Runs every stage over `program`. On error `program` is left exactly as it was.
pub fn obfuscate_program(
    program: &mut Program,
    options: &ObfuscatorOptions,
    source_map: Option<&dyn SourceMapper>,
) -> Result<RunStats> {
    options.validate()?;
    let _guard = debug_span!("obfuscate").entered();

    let mut working = program.clone();
    let mut cx = TransformContext::new(options, source_map);
    let mut pipeline = Pipeline::for_options(options);
    debug!(transformers = ?pipeline.transformer_names(), "pipeline ready");

    pipeline.run(&mut working, &mut cx)?;
    *program = working;

    debug!(
        renamed_bindings = cx.stats.renamed_bindings,
        renamed_labels = cx.stats.renamed_labels,
        string_array_entries = cx.stats.string_array_entries,
        string_array_calls = cx.stats.string_array_calls,
        "obfuscation finished"
    );
    Ok(cx.stats)
}
