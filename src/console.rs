use swc_core::ecma::ast::Program;
use tracing::debug;

use crate::error::TransformError;
use crate::pipeline::{Node, NodeKind, NodeTransformer, TransformContext, TransformationStage};
use crate::template;

const CONSOLE_TEMPLATE: &str = r#"
var {disabler} = function () {
    var that;
    try {
        that = Function('return (function() ' + '{}.constructor("return this")( )' + ');')();
    } catch (error) {
        that = window;
    }
    var noop = function () {};
    var methods = ['log', 'warn', 'info', 'error', 'exception', 'table', 'trace', 'debug'];
    if (!that.console) {
        that.console = {};
    }
    for (var slot = 0; slot < methods.length; slot++) {
        that.console[methods[slot]] = noop;
    }
};
{disabler}();
"#;

/// Identifiers the console template declares or reads.
pub(crate) const CONSOLE_NAMES: &[&str] = &[
    "that", "error", "noop", "methods", "slot", "Function", "window", "console",
];

/// Replaces the global console methods with no-ops once the program starts.
pub struct ConsoleOutputTransformer;

impl ConsoleOutputTransformer {
    const NAME: &'static str = "ConsoleOutputTransformer";
}

impl NodeTransformer for ConsoleOutputTransformer {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn interest(&self, _stage: TransformationStage) -> &'static [NodeKind] {
        &[]
    }

    fn transform_node(
        &mut self,
        _node: &mut Node<'_>,
        _cx: &mut TransformContext<'_>,
    ) -> Result<(), TransformError> {
        Ok(())
    }

    fn finish(
        &mut self,
        stage: TransformationStage,
        program: &mut Program,
        cx: &mut TransformContext<'_>,
    ) -> Result<(), TransformError> {
        if stage != TransformationStage::Obfuscating {
            return Ok(());
        }
        let disabler = cx.names.generate_for_global_scope()?;
        let stmts = template::render(
            "console-output",
            CONSOLE_TEMPLATE,
            &[("disabler", &*disabler)],
        )?;
        template::prepend(program, stmts);
        debug!(function = %disabler, "console output disabled");
        Ok(())
    }
}
