use swc_core::ecma::ast::Program;
use tracing::debug;

use crate::error::TransformError;
use crate::pipeline::{Node, NodeKind, NodeTransformer, TransformContext, TransformationStage};
use crate::template;

// Recurses until the stack overflows; each frame hits a `debugger` statement.
const DEBUG_PROTECTION_TEMPLATE: &str = r#"
var {guard} = function (ret) {
    function trap(counter) {
        if (typeof counter === 'string') {
            return function () {}.constructor('while (true) {}').apply('counter');
        }
        if (('' + counter / counter).length !== 1 || counter % 20 === 0) {
            (function () {
                return true;
            }).constructor('debu' + 'gger').call('action');
        } else {
            (function () {
                return false;
            }).constructor('debu' + 'gger').apply('stateObject');
        }
        trap(++counter);
    }
    try {
        if (ret) {
            return trap;
        }
        trap(0);
    } catch (error) {}
};
{guard}();
"#;

/// Identifiers the debug protection template declares or reads.
pub(crate) const DEBUG_PROTECTION_NAMES: &[&str] = &["ret", "trap", "counter", "error"];

/// Stalls the program inside `debugger` statements whenever developer tools are attached.
pub struct DebugProtectionTransformer;

impl DebugProtectionTransformer {
    const NAME: &'static str = "DebugProtectionTransformer";
}

impl NodeTransformer for DebugProtectionTransformer {
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
        let guard = cx.names.generate_for_global_scope()?;
        let stmts = template::render(
            "debug-protection",
            DEBUG_PROTECTION_TEMPLATE,
            &[("guard", &*guard)],
        )?;
        template::prepend(program, stmts);
        debug!(function = %guard, "debug protection installed");
        Ok(())
    }
}
