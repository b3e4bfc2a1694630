//! Splices small fixed code fragments into the program.

use swc_core::{
    common::{Span, DUMMY_SP},
    ecma::{
        ast::*,
        visit::{VisitMut, VisitMutWith},
    },
};

use crate::error::TransformError;
use crate::syntax;

/// Substitutes every `{key}` in `template`, parses the result as a script and
/// strips source positions so the fragment reads as synthesized code.
pub fn render(
    name: &'static str,
    template: &str,
    substitutions: &[(&str, &str)],
) -> Result<Vec<Stmt>, TransformError> {
    let mut code = template.to_string();
    for (key, value) in substitutions {
        code = code.replace(&format!("{{{key}}}"), value);
    }

    let (_, program) = syntax::parse_program(name, &code).map_err(|e| TransformError::Template {
        name,
        message: e.to_string(),
    })?;
    let mut stmts = match program {
        Program::Script(script) => script.body,
        Program::Module(_) => {
            return Err(TransformError::Template {
                name,
                message: "fragment must not contain module declarations".into(),
            })
        }
    };
    stmts.visit_mut_with(&mut ClearSpans);
    Ok(stmts)
}

/// Inserts `stmts` at the top of `program`, after any directive prologue.
pub fn prepend(program: &mut Program, stmts: Vec<Stmt>) {
    match program {
        Program::Module(m) => {
            let at = m
                .body
                .iter()
                .take_while(|item| matches!(item, ModuleItem::Stmt(s) if is_directive(s)))
                .count();
            m.body
                .splice(at..at, stmts.into_iter().map(ModuleItem::Stmt));
        }
        Program::Script(s) => {
            let at = s.body.iter().take_while(|s| is_directive(s)).count();
            s.body.splice(at..at, stmts);
        }
    }
}

fn is_directive(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Expr(ExprStmt { expr, .. }) => matches!(&**expr, Expr::Lit(Lit::Str(_))),
        _ => false,
    }
}

struct ClearSpans;

impl VisitMut for ClearSpans {
    fn visit_mut_span(&mut self, span: &mut Span) {
        *span = DUMMY_SP;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_placeholders_and_clears_spans() {
        let stmts = render(
            "greeting",
            "var {name} = function () { return '{text}'; };",
            &[("name", "greet"), ("text", "hi")],
        )
        .unwrap();
        assert_eq!(stmts.len(), 1);
        let Stmt::Decl(Decl::Var(var)) = &stmts[0] else {
            panic!("expected a var declaration");
        };
        assert!(var.span.is_dummy());
        let Pat::Ident(binding) = &var.decls[0].name else {
            panic!("expected a plain binding");
        };
        assert_eq!(&*binding.id.sym, "greet");
        assert!(binding.id.span.is_dummy());
    }

    #[test]
    fn unparsable_fragment_is_a_template_error() {
        let err = render("broken", "var = ;", &[]).unwrap_err();
        assert!(matches!(err, TransformError::Template { name: "broken", .. }));
    }

    #[test]
    fn prepend_keeps_directives_first() {
        let (_, mut program) = syntax::parse_program("a.js", "'use strict';\nfoo();").unwrap();
        let stmts = render("x", "var x = 1;", &[]).unwrap();
        prepend(&mut program, stmts);
        let Program::Script(script) = &program else {
            panic!("expected a script");
        };
        assert!(is_directive(&script.body[0]));
        assert!(matches!(script.body[1], Stmt::Decl(Decl::Var(_))));
        assert_eq!(script.body.len(), 3);
    }
}
