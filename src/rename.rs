use swc_core::{
    common::{Span, Spanned},
    ecma::{
        ast::*,
        atoms::Atom,
        visit::{VisitMut, VisitMutWith},
    },
};
use tracing::debug;

use crate::error::TransformError;
use crate::names::MangledNameGenerator;
use crate::pipeline::{
    Binding, BindingKind, IdentRole, Node, NodeKind, NodeTransformer, RunStats, TransformContext,
    TransformationStage,
};
use crate::scope::{ScopeId, ScopeTracker};

// -----------------------------------------------------------------------------
// Renamer
// -----------------------------------------------------------------------------

/// Per-scope binding tables plus the run's name generator.
pub struct IdentifierRenamer<'a> {
    scopes: &'a mut ScopeTracker,
    names: &'a mut MangledNameGenerator,
    stats: &'a mut RunStats,
}

impl<'a> IdentifierRenamer<'a> {
    pub fn new(
        scopes: &'a mut ScopeTracker,
        names: &'a mut MangledNameGenerator,
        stats: &'a mut RunStats,
    ) -> Self {
        Self { scopes, names, stats }
    }

    /// Registers a pending binding. The generated name is assigned on first `replace`.
    pub fn store_local_name(&mut self, name: &Atom, scope: ScopeId) {
        self.scopes
            .node_mut(scope)
            .local_names
            .entry(name.clone())
            .or_insert(None);
    }

    /// Keeps `name` as written in `scope`, overriding any pending entry.
    pub fn pin_local_name(&mut self, name: &Atom, scope: ScopeId) {
        self.scopes
            .node_mut(scope)
            .local_names
            .insert(name.clone(), Some(name.clone()));
    }

    /// Name to print for `name` as seen from `scope`. Free names come back unchanged,
    /// as do bindings owned by a scope that `eval` or `with` can observe.
    pub fn replace(&mut self, name: &Atom, scope: ScopeId) -> Result<Atom, TransformError> {
        let scopes = &*self.scopes;
        let Some(owner) = scopes
            .ancestors(scope)
            .find(|s| scopes.node(*s).local_names.contains_key(name))
        else {
            return Ok(name.clone());
        };
        let node = scopes.node(owner);
        if node.dynamic {
            return Ok(name.clone());
        }
        if let Some(Some(generated)) = node.local_names.get(name) {
            return Ok(generated.clone());
        }

        let generated = if scopes.is_root(owner) {
            self.names.generate_for_global_scope()?
        } else {
            self.names.generate_next()?
        };
        self.scopes
            .node_mut(owner)
            .local_names
            .insert(name.clone(), Some(generated.clone()));
        self.stats.renamed_bindings += 1;
        Ok(generated)
    }

    pub fn store_labeled_statement_name(&mut self, label: &Atom, scope: ScopeId) {
        self.scopes
            .node_mut(scope)
            .label_names
            .entry(label.clone())
            .or_insert(None);
    }

    /// Renames the label of `stmt` and every `break`/`continue` in its body that targets it.
    pub fn replace_labeled_statement_name(
        &mut self,
        stmt: &mut LabeledStmt,
        scope: ScopeId,
    ) -> Result<(), TransformError> {
        let original = stmt.label.sym.clone();
        let scopes = &*self.scopes;
        let Some(owner) = scopes
            .ancestors(scope)
            .find(|s| scopes.node(*s).label_names.contains_key(&original))
        else {
            return Ok(());
        };

        let assigned = scopes.node(owner).label_names.get(&original).cloned().flatten();
        let generated = match assigned {
            Some(generated) => generated,
            None => {
                let generated = self.names.generate_next()?;
                self.scopes
                    .node_mut(owner)
                    .label_names
                    .insert(original.clone(), Some(generated.clone()));
                self.stats.renamed_labels += 1;
                generated
            }
        };

        stmt.label.sym = generated.clone();
        stmt.body.visit_mut_with(&mut LabelReferences {
            from: &original,
            to: &generated,
        });
        Ok(())
    }
}

/// Rewrites jump targets without crossing into nested functions.
struct LabelReferences<'a> {
    from: &'a Atom,
    to: &'a Atom,
}

impl LabelReferences<'_> {
    fn retarget(&self, label: &mut Option<Ident>) {
        if let Some(label) = label {
            if label.sym == *self.from {
                label.sym = self.to.clone();
            }
        }
    }
}

impl VisitMut for LabelReferences<'_> {
    fn visit_mut_break_stmt(&mut self, s: &mut BreakStmt) {
        self.retarget(&mut s.label);
    }

    fn visit_mut_continue_stmt(&mut self, s: &mut ContinueStmt) {
        self.retarget(&mut s.label);
    }

    fn visit_mut_function(&mut self, _: &mut Function) {}

    fn visit_mut_arrow_expr(&mut self, _: &mut ArrowExpr) {}

    fn visit_mut_class(&mut self, _: &mut Class) {}

    fn visit_mut_getter_prop(&mut self, _: &mut GetterProp) {}

    fn visit_mut_setter_prop(&mut self, _: &mut SetterProp) {}
}

// -----------------------------------------------------------------------------
// Transformers
// -----------------------------------------------------------------------------

const IDENT_PREPARE: &[NodeKind] = &[
    NodeKind::Ident,
    NodeKind::ShorthandProp,
    NodeKind::PatProp,
    NodeKind::ImportSpecifier,
    NodeKind::ExportSpecifier,
    NodeKind::Expr,
    NodeKind::With,
];

const IDENT_OBFUSCATE: &[NodeKind] = &[
    NodeKind::Ident,
    NodeKind::ShorthandProp,
    NodeKind::PatProp,
    NodeKind::ImportSpecifier,
    NodeKind::ExportSpecifier,
];

/// Renames bindings declared in each scope along with every reference that resolves to them.
pub struct ScopeIdentifiersTransformer {
    rename_globals: bool,
}

impl ScopeIdentifiersTransformer {
    const NAME: &'static str = "ScopeIdentifiersTransformer";

    pub fn new(rename_globals: bool) -> Self {
        Self { rename_globals }
    }

    fn declare(
        &self,
        name: &Atom,
        binding: Binding,
        span: Span,
        cx: &mut TransformContext<'_>,
    ) -> Result<(), TransformError> {
        if binding.exported || cx.names.is_reserved_by_caller(name) {
            return Ok(());
        }
        let scope = if binding.kind.hoists() {
            cx.scopes.nearest_var_scope()
        } else {
            cx.scopes.enclosing_scope()
        };
        let Some(scope) = scope else {
            return Err(cx.node_error(Self::NAME, span, "binding outside any scope"));
        };
        if binding.kind.hoists() {
            // `var e` inside `catch (e)` writes the parameter but declares in the function
            if let Some(catch) = cx.scopes.shadowing_catch(name) {
                let mut renamer = cx.renamer();
                renamer.pin_local_name(name, catch);
                renamer.pin_local_name(name, scope);
                return Ok(());
            }
        }
        if cx.scopes.is_root(scope) && !self.rename_globals {
            return Ok(());
        }
        cx.renamer().store_local_name(name, scope);
        Ok(())
    }

    fn prepare(
        &mut self,
        node: &mut Node<'_>,
        cx: &mut TransformContext<'_>,
    ) -> Result<(), TransformError> {
        match node {
            Node::Ident(ident, role) => {
                cx.names.preserve_name(&ident.sym);
                if let IdentRole::Binding(binding) = *role {
                    self.declare(&ident.sym, binding, ident.span, cx)?;
                }
            }
            Node::ShorthandProp(prop) => {
                if let Prop::Shorthand(ident) = &**prop {
                    cx.names.preserve_name(&ident.sym);
                }
            }
            Node::PatProp(prop, role) => {
                if let ObjectPatProp::Assign(assign) = &**prop {
                    cx.names.preserve_name(&assign.key.sym);
                    if let IdentRole::Binding(binding) = *role {
                        self.declare(&assign.key.sym, binding, assign.span, cx)?;
                    }
                }
            }
            Node::ImportSpecifier(spec) => {
                let local = import_local(spec);
                cx.names.preserve_name(&local.sym);
                let binding = Binding {
                    kind: BindingKind::Lexical,
                    exported: false,
                };
                self.declare(&local.sym, binding, local.span, cx)?;
            }
            Node::ExportSpecifier(spec) => {
                if let ModuleExportName::Ident(orig) = &spec.orig {
                    cx.names.preserve_name(&orig.sym);
                }
            }
            Node::Expr(expr) => {
                if is_direct_eval(expr) {
                    let scope = cx.current_scope(Self::NAME, expr.span())?;
                    cx.scopes.mark_dynamic(scope);
                    let location = cx.describe_span(expr.span());
                    debug!(%location, "direct eval pins scope names");
                }
            }
            Node::With(stmt) => {
                let scope = cx.current_scope(Self::NAME, stmt.span)?;
                cx.scopes.mark_dynamic(scope);
                debug!(location = %cx.describe_span(stmt.span), "with statement pins scope names");
            }
            Node::LabeledStmt(_) | Node::Literal(..) => {}
        }
        Ok(())
    }

    fn obfuscate(
        &mut self,
        node: &mut Node<'_>,
        cx: &mut TransformContext<'_>,
    ) -> Result<(), TransformError> {
        let scope = cx.current_scope(Self::NAME, node.span())?;
        match node {
            Node::Ident(ident, _) => {
                ident.sym = cx.renamer().replace(&ident.sym, scope)?;
            }
            Node::ShorthandProp(prop) => {
                let Prop::Shorthand(ident) = &**prop else {
                    return Ok(());
                };
                let renamed = cx.renamer().replace(&ident.sym, scope)?;
                if renamed != ident.sym {
                    let key = PropName::Ident(IdentName::new(ident.sym.clone(), ident.span));
                    let value = Ident::new(renamed, ident.span, ident.ctxt);
                    **prop = Prop::KeyValue(KeyValueProp {
                        key,
                        value: Box::new(Expr::Ident(value)),
                    });
                }
            }
            Node::PatProp(prop, _) => {
                let ObjectPatProp::Assign(assign) = &mut **prop else {
                    return Ok(());
                };
                let renamed = cx.renamer().replace(&assign.key.sym, scope)?;
                if renamed != assign.key.sym {
                    let key = PropName::Ident(IdentName::new(
                        assign.key.sym.clone(),
                        assign.key.span,
                    ));
                    let mut binding = assign.key.clone();
                    binding.id.sym = renamed;
                    let value = match assign.value.take() {
                        Some(default) => Pat::Assign(AssignPat {
                            span: assign.span,
                            left: Box::new(Pat::Ident(binding)),
                            right: default,
                        }),
                        None => Pat::Ident(binding),
                    };
                    **prop = ObjectPatProp::KeyValue(KeyValuePatProp {
                        key,
                        value: Box::new(value),
                    });
                }
            }
            Node::ImportSpecifier(spec) => match spec {
                ImportSpecifier::Named(named) => {
                    let renamed = cx.renamer().replace(&named.local.sym, scope)?;
                    if renamed != named.local.sym {
                        if named.imported.is_none() {
                            named.imported = Some(ModuleExportName::Ident(named.local.clone()));
                        }
                        named.local.sym = renamed;
                    }
                }
                ImportSpecifier::Default(default) => {
                    default.local.sym = cx.renamer().replace(&default.local.sym, scope)?;
                }
                ImportSpecifier::Namespace(ns) => {
                    ns.local.sym = cx.renamer().replace(&ns.local.sym, scope)?;
                }
            },
            Node::ExportSpecifier(spec) => {
                if let ModuleExportName::Ident(orig) = &mut spec.orig {
                    let renamed = cx.renamer().replace(&orig.sym, scope)?;
                    if renamed != orig.sym {
                        if spec.exported.is_none() {
                            spec.exported = Some(ModuleExportName::Ident(orig.clone()));
                        }
                        orig.sym = renamed;
                    }
                }
            }
            Node::Expr(_) | Node::With(_) | Node::LabeledStmt(_) | Node::Literal(..) => {}
        }
        Ok(())
    }
}

impl NodeTransformer for ScopeIdentifiersTransformer {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn interest(&self, stage: TransformationStage) -> &'static [NodeKind] {
        match stage {
            TransformationStage::Preparing => IDENT_PREPARE,
            TransformationStage::Obfuscating => IDENT_OBFUSCATE,
        }
    }

    fn transform_node(
        &mut self,
        node: &mut Node<'_>,
        cx: &mut TransformContext<'_>,
    ) -> Result<(), TransformError> {
        match cx.stage {
            TransformationStage::Preparing => self.prepare(node, cx),
            TransformationStage::Obfuscating => self.obfuscate(node, cx),
        }
    }

    fn finish(
        &mut self,
        stage: TransformationStage,
        _program: &mut Program,
        cx: &mut TransformContext<'_>,
    ) -> Result<(), TransformError> {
        if stage == TransformationStage::Obfuscating {
            debug!(renamed = cx.stats.renamed_bindings, "identifiers renamed");
        }
        Ok(())
    }
}

/// Labels live in their own per-scope table, separate from variables.
pub struct LabeledStatementTransformer;

impl LabeledStatementTransformer {
    const NAME: &'static str = "LabeledStatementTransformer";
}

impl NodeTransformer for LabeledStatementTransformer {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn interest(&self, _stage: TransformationStage) -> &'static [NodeKind] {
        &[NodeKind::LabeledStmt]
    }

    fn transform_node(
        &mut self,
        node: &mut Node<'_>,
        cx: &mut TransformContext<'_>,
    ) -> Result<(), TransformError> {
        let Node::LabeledStmt(stmt) = node else {
            return Ok(());
        };
        let scope = cx.current_scope(Self::NAME, stmt.span)?;
        match cx.stage {
            TransformationStage::Preparing => {
                cx.names.preserve_name(&stmt.label.sym);
                if !cx.names.is_reserved_by_caller(&stmt.label.sym) {
                    cx.renamer().store_labeled_statement_name(&stmt.label.sym, scope);
                }
            }
            TransformationStage::Obfuscating => {
                cx.renamer().replace_labeled_statement_name(stmt, scope)?;
            }
        }
        Ok(())
    }
}

fn import_local(spec: &ImportSpecifier) -> &Ident {
    match spec {
        ImportSpecifier::Named(s) => &s.local,
        ImportSpecifier::Default(s) => &s.local,
        ImportSpecifier::Namespace(s) => &s.local,
    }
}

fn is_direct_eval(expr: &Expr) -> bool {
    let Expr::Call(CallExpr {
        callee: Callee::Expr(callee),
        ..
    }) = expr
    else {
        return false;
    };
    // `(eval)(src)` is still a direct call
    let mut callee = &**callee;
    while let Expr::Paren(paren) = callee {
        callee = &paren.expr;
    }
    matches!(callee, Expr::Ident(i) if &*i.sym == "eval")
}
