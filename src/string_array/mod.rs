//! Moves string literals into one deduplicated array behind a decoder call.

pub mod encoding;
pub mod policy;
pub mod registry;

use swc_core::{
    common::{SyntaxContext, DUMMY_SP},
    ecma::{ast::*, atoms::Atom, utils::ExprFactory},
};
use tracing::{debug, trace};

pub use encoding::StringArrayEncoding;
pub use policy::{Eligibility, EligibilityPolicy};
pub use registry::{StringArrayEntry, StringArrayRegistry};

use crate::error::TransformError;
use crate::pipeline::{
    LiteralPosition, Node, NodeKind, NodeTransformer, TransformContext, TransformationStage,
};
use crate::template;

const DECODER_TEMPLATE: &str = r#"
var {decoder} = function (index, key) {
    var value = {array}[index];
    var flag = '{flags}'.charAt(index);
    if (flag === '0') {
        return value;
    }
    var alphabet = '{alphabet}';
    var input = value.replace(/=+$/, '');
    var raw = '';
    for (var bits = 0, count = 0, position = 0; position < input.length; position++) {
        bits = bits << 6 | alphabet.indexOf(input.charAt(position));
        count += 6;
        if (count >= 8) {
            count -= 8;
            raw += String.fromCharCode(bits >> count & 255);
        }
    }
    if (flag === '2') {
        var state = [], swap, cursor = 0, result = '';
        for (var slot = 0; slot < 256; slot++) {
            state[slot] = slot;
        }
        for (slot = 0; slot < 256; slot++) {
            cursor = (cursor + state[slot] + key.charCodeAt(slot % key.length)) % 256;
            swap = state[slot];
            state[slot] = state[cursor];
            state[cursor] = swap;
        }
        slot = 0;
        cursor = 0;
        for (var offset = 0; offset < raw.length; offset++) {
            slot = (slot + 1) % 256;
            cursor = (cursor + state[slot]) % 256;
            swap = state[slot];
            state[slot] = state[cursor];
            state[cursor] = swap;
            result += String.fromCharCode(raw.charCodeAt(offset) ^ state[(state[slot] + state[cursor]) % 256]);
        }
        raw = result;
    }
    var escaped = '';
    for (var at = 0; at < raw.length; at++) {
        escaped += '%' + ('00' + raw.charCodeAt(at).toString(16)).slice(-2);
    }
    return decodeURIComponent(escaped);
};
"#;

/// Identifiers the decoder template declares or reads.
pub(crate) const DECODER_NAMES: &[&str] = &[
    "index", "key", "value", "flag", "alphabet", "input", "raw", "bits", "count", "position",
    "state", "swap", "cursor", "result", "slot", "offset", "escaped", "at", "String",
    "decodeURIComponent",
];

struct EmittedNames {
    array: Atom,
    decoder: Atom,
}

pub struct StringArrayTransformer {
    encodings: Vec<StringArrayEncoding>,
    registry: StringArrayRegistry,
    names: Option<EmittedNames>,
    calls: usize,
}

impl StringArrayTransformer {
    const NAME: &'static str = "StringArrayTransformer";

    pub fn new(encodings: Vec<StringArrayEncoding>) -> Self {
        Self {
            encodings,
            registry: StringArrayRegistry::default(),
            names: None,
            calls: 0,
        }
    }

    /// `decoder(index)` or `decoder(index, 'key')` for `value`.
    fn call_for(
        &mut self,
        value: &Atom,
        cx: &mut TransformContext<'_>,
    ) -> Result<Expr, TransformError> {
        if self.names.is_none() {
            self.names = Some(EmittedNames {
                array: cx.names.generate_for_global_scope()?,
                decoder: cx.names.generate_for_global_scope()?,
            });
        }
        let decoder = match &self.names {
            Some(names) => names.decoder.clone(),
            None => return Err(cx.node_error(Self::NAME, DUMMY_SP, "decoder name missing")),
        };

        let entry = self.registry.register(value, &self.encodings, &mut cx.rng);
        let mut args = vec![Expr::Lit(Lit::Num(Number {
            span: DUMMY_SP,
            value: entry.index as f64,
            raw: None,
        }))
        .as_arg()];
        if let Some(key) = &entry.key {
            args.push(
                Expr::Lit(Lit::Str(Str {
                    span: DUMMY_SP,
                    value: key.as_str().into(),
                    raw: None,
                }))
                .as_arg(),
            );
        }
        self.calls += 1;

        Ok(Expr::Call(CallExpr {
            span: DUMMY_SP,
            ctxt: SyntaxContext::empty(),
            callee: Expr::Ident(Ident::new(decoder, DUMMY_SP, SyntaxContext::empty())).as_callee(),
            args,
            type_args: None,
        }))
    }

    fn emit(&self) -> Result<Vec<Stmt>, TransformError> {
        let Some(names) = &self.names else {
            return Ok(vec![]);
        };

        let elems = self
            .registry
            .entries()
            .iter()
            .map(|entry| {
                Some(
                    Expr::Lit(Lit::Str(Str {
                        span: DUMMY_SP,
                        value: entry.stored.as_str().into(),
                        raw: None,
                    }))
                    .as_arg(),
                )
            })
            .collect();
        let array = Stmt::Decl(Decl::Var(Box::new(VarDecl {
            span: DUMMY_SP,
            ctxt: SyntaxContext::empty(),
            kind: VarDeclKind::Var,
            declare: false,
            decls: vec![VarDeclarator {
                span: DUMMY_SP,
                name: Pat::Ident(BindingIdent {
                    id: Ident::new(names.array.clone(), DUMMY_SP, SyntaxContext::empty()),
                    type_ann: None,
                }),
                init: Some(Box::new(Expr::Array(ArrayLit {
                    span: DUMMY_SP,
                    elems,
                }))),
                definite: false,
            }],
        })));

        let flags = self.registry.flags();
        let mut stmts = vec![array];
        stmts.extend(template::render(
            "string-array-decoder",
            DECODER_TEMPLATE,
            &[
                ("decoder", &*names.decoder),
                ("array", &*names.array),
                ("flags", flags.as_str()),
                ("alphabet", encoding::ALPHABET),
            ],
        )?);
        Ok(stmts)
    }
}

impl NodeTransformer for StringArrayTransformer {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn interest(&self, stage: TransformationStage) -> &'static [NodeKind] {
        match stage {
            TransformationStage::Preparing => &[],
            TransformationStage::Obfuscating => &[NodeKind::Expr, NodeKind::Literal],
        }
    }

    fn transform_node(
        &mut self,
        node: &mut Node<'_>,
        cx: &mut TransformContext<'_>,
    ) -> Result<(), TransformError> {
        let policy = EligibilityPolicy::from_options(cx.options);
        match node {
            Node::Expr(expr) => {
                let Expr::Lit(Lit::Str(s)) = &**expr else {
                    return Ok(());
                };
                // synthesized by an earlier transformer
                if s.span.is_dummy() {
                    return Ok(());
                }
                let value = s.value.clone();
                let verdict = policy.classify(&value, LiteralPosition::Value, &mut cx.rng);
                trace!(value = %value, ?verdict, "string literal");
                if verdict.includes() {
                    **expr = self.call_for(&value, cx)?;
                }
            }
            Node::Literal(s, position) => {
                let verdict = policy.classify(&s.value, *position, &mut cx.rng);
                trace!(value = %s.value, ?position, ?verdict, "string literal kept in place");
            }
            _ => {}
        }
        Ok(())
    }

    fn finish(
        &mut self,
        stage: TransformationStage,
        program: &mut Program,
        cx: &mut TransformContext<'_>,
    ) -> Result<(), TransformError> {
        if stage != TransformationStage::Obfuscating || self.registry.is_empty() {
            return Ok(());
        }
        let stmts = self.emit()?;
        template::prepend(program, stmts);
        cx.stats.string_array_entries = self.registry.len();
        cx.stats.string_array_calls = self.calls;
        debug!(
            entries = self.registry.len(),
            calls = self.calls,
            "string array emitted"
        );
        Ok(())
    }
}
