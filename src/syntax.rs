//! Parser and printer collaborators.

use swc_core::{
    common::{sync::Lrc, FileName, SourceMap},
    ecma::{
        ast::{EsVersion, Program},
        codegen::{text_writer::JsWriter, Config, Emitter},
        parser::{lexer::Lexer, EsSyntax, Parser, StringInput, Syntax},
    },
};

use crate::error::ObfuscatorError;

fn syntax_for(file: &str) -> Syntax {
    Syntax::Es(EsSyntax {
        jsx: file.ends_with(".jsx"),
        ..Default::default()
    })
}

/// Parses `source` as a script, or as a module when it uses import/export.
pub fn parse_program(
    file: &str,
    source: &str,
) -> Result<(Lrc<SourceMap>, Program), ObfuscatorError> {
    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(
        Lrc::new(FileName::Custom(file.to_string())),
        source.to_string(),
    );

    let lexer = Lexer::new(
        syntax_for(file),
        EsVersion::EsNext,
        StringInput::from(&*fm),
        None,
    );
    let mut parser = Parser::new_from(lexer);

    let program = parser.parse_program().map_err(|e| ObfuscatorError::Parse {
        file: file.to_string(),
        message: format!("{:?}", e.kind()),
    })?;

    let errors: Vec<String> = parser
        .take_errors()
        .into_iter()
        .map(|e| format!("{:?}", e.kind()))
        .collect();
    if !errors.is_empty() {
        return Err(ObfuscatorError::Parse {
            file: file.to_string(),
            message: errors.join(", "),
        });
    }

    Ok((cm, program))
}

pub fn print_program(cm: Lrc<SourceMap>, program: &Program) -> Result<String, ObfuscatorError> {
    let mut buf = Vec::new();
    {
        let wr = JsWriter::new(cm.clone(), "\n", &mut buf, None);
        let mut emitter = Emitter {
            cfg: Config::default().with_minify(false),
            cm,
            comments: None,
            wr,
        };
        emitter
            .emit_program(program)
            .map_err(|e| ObfuscatorError::Print(e.to_string()))?;
    }
    String::from_utf8(buf).map_err(|e| ObfuscatorError::Print(e.to_string()))
}
