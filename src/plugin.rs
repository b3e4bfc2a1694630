use swc_core::{
    common::{errors::HANDLER, SourceMapper},
    ecma::ast::Program,
    plugin::{plugin_transform, proxies::TransformPluginProgramMetadata},
};

use crate::{obfuscate_program, ObfuscatorError, ObfuscatorOptions};

fn report(err: &ObfuscatorError) {
    let message = format!("obfuscator: {err}");
    HANDLER.with(|handler| handler.err(&message));
}

#[plugin_transform]
pub fn process_transform(
    mut program: Program,
    metadata: TransformPluginProgramMetadata,
) -> Program {
    let options = match metadata.get_transform_plugin_config() {
        Some(json) => match ObfuscatorOptions::from_json(&json) {
            Ok(options) => options,
            Err(err) => {
                report(&err.into());
                return program;
            }
        },
        None => ObfuscatorOptions::default(),
    };

    let source_map: &dyn SourceMapper = &metadata.source_map;
    if let Err(err) = obfuscate_program(&mut program, &options, Some(source_map)) {
        report(&err);
    }
    program
}
