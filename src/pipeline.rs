use rand::{rngs::StdRng, SeedableRng};
use swc_core::{
    common::{SourceMapper, Span, Spanned},
    ecma::{
        ast::*,
        atoms::Atom,
        visit::{VisitMut, VisitMutWith},
    },
};
use tracing::{debug, debug_span};

use crate::console::{ConsoleOutputTransformer, CONSOLE_NAMES};
use crate::debug_protection::{DebugProtectionTransformer, DEBUG_PROTECTION_NAMES};
use crate::error::TransformError;
use crate::names::MangledNameGenerator;
use crate::options::ObfuscatorOptions;
use crate::rename::{IdentifierRenamer, LabeledStatementTransformer, ScopeIdentifiersTransformer};
use crate::scope::{ScopeId, ScopeKind, ScopeTracker};
use crate::string_array::{StringArrayTransformer, DECODER_NAMES};

// -----------------------------------------------------------------------------
// Stages & dispatch keys
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformationStage {
    /// Collects bindings, reserved names and dynamic scopes. Does not mutate.
    Preparing,
    Obfuscating,
}

impl TransformationStage {
    pub const ALL: [TransformationStage; 2] =
        [TransformationStage::Preparing, TransformationStage::Obfuscating];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Expr,
    Ident,
    ShorthandProp,
    PatProp,
    ImportSpecifier,
    ExportSpecifier,
    LabeledStmt,
    Literal,
    With,
}

/// Where a string literal sits. Anything but `Value` requires a literal grammatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralPosition {
    Value,
    PropertyKey,
    ImportSource,
    ExportSource,
    Directive,
    JsxAttribute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Var,
    Function,
    Lexical,
    Param,
}

impl BindingKind {
    pub fn hoists(self) -> bool {
        matches!(self, BindingKind::Var | BindingKind::Function)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub kind: BindingKind,
    pub exported: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentRole {
    Binding(Binding),
    Reference,
}

pub enum Node<'a> {
    Expr(&'a mut Expr),
    Ident(&'a mut Ident, IdentRole),
    /// Always `Prop::Shorthand` when dispatched; may be replaced by `Prop::KeyValue`.
    ShorthandProp(&'a mut Prop),
    /// Always `ObjectPatProp::Assign` when dispatched.
    PatProp(&'a mut ObjectPatProp, IdentRole),
    ImportSpecifier(&'a mut ImportSpecifier),
    ExportSpecifier(&'a mut ExportNamedSpecifier),
    LabeledStmt(&'a mut LabeledStmt),
    Literal(&'a mut Str, LiteralPosition),
    With(&'a mut WithStmt),
}

impl Node<'_> {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Expr(_) => NodeKind::Expr,
            Node::Ident(..) => NodeKind::Ident,
            Node::ShorthandProp(_) => NodeKind::ShorthandProp,
            Node::PatProp(..) => NodeKind::PatProp,
            Node::ImportSpecifier(_) => NodeKind::ImportSpecifier,
            Node::ExportSpecifier(_) => NodeKind::ExportSpecifier,
            Node::LabeledStmt(_) => NodeKind::LabeledStmt,
            Node::Literal(..) => NodeKind::Literal,
            Node::With(_) => NodeKind::With,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Node::Expr(e) => e.span(),
            Node::Ident(i, _) => i.span,
            Node::ShorthandProp(p) => p.span(),
            Node::PatProp(p, _) => p.span(),
            Node::ImportSpecifier(s) => s.span(),
            Node::ExportSpecifier(s) => s.span,
            Node::LabeledStmt(s) => s.span,
            Node::Literal(s, _) => s.span,
            Node::With(s) => s.span,
        }
    }
}

// -----------------------------------------------------------------------------
// Transformers & run context
// -----------------------------------------------------------------------------

pub trait NodeTransformer {
    fn name(&self) -> &'static str;

    /// Node kinds this transformer wants to see during `stage`.
    fn interest(&self, stage: TransformationStage) -> &'static [NodeKind];

    fn transform_node(
        &mut self,
        node: &mut Node<'_>,
        cx: &mut TransformContext<'_>,
    ) -> Result<(), TransformError>;

    /// Runs once after the traversal of `stage`.
    fn finish(
        &mut self,
        _stage: TransformationStage,
        _program: &mut Program,
        _cx: &mut TransformContext<'_>,
    ) -> Result<(), TransformError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub renamed_bindings: usize,
    pub renamed_labels: usize,
    pub string_array_entries: usize,
    pub string_array_calls: usize,
}

pub struct TransformContext<'a> {
    pub options: &'a ObfuscatorOptions,
    pub stage: TransformationStage,
    pub scopes: ScopeTracker,
    pub names: MangledNameGenerator,
    pub rng: StdRng,
    pub stats: RunStats,
    source_map: Option<&'a dyn SourceMapper>,
}

impl<'a> TransformContext<'a> {
    pub fn new(options: &'a ObfuscatorOptions, source_map: Option<&'a dyn SourceMapper>) -> Self {
        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut names = MangledNameGenerator::new(
            options.identifiers_prefix.clone(),
            options.reserved_names.clone(),
        );
        for name in DECODER_NAMES
            .iter()
            .chain(CONSOLE_NAMES)
            .chain(DEBUG_PROTECTION_NAMES)
        {
            names.preserve_name(&Atom::from(*name));
        }
        Self {
            options,
            stage: TransformationStage::Preparing,
            scopes: ScopeTracker::default(),
            names,
            rng,
            stats: RunStats::default(),
            source_map,
        }
    }

    pub fn renamer(&mut self) -> IdentifierRenamer<'_> {
        IdentifierRenamer::new(&mut self.scopes, &mut self.names, &mut self.stats)
    }

    /// `file:startLine-endLine`, or `unknown:0-0` when no position is known.
    pub fn describe_span(&self, span: Span) -> String {
        if span.is_dummy() {
            return "unknown:0-0".to_string();
        }
        if let Some(cm) = self.source_map {
            let lo = cm.lookup_char_pos(span.lo());
            let hi = cm.lookup_char_pos(span.hi());
            return format!("{}:{}-{}", lo.file.name, lo.line, hi.line);
        }
        "unknown:0-0".to_string()
    }

    pub fn node_error(
        &self,
        transformer: &'static str,
        span: Span,
        message: impl Into<String>,
    ) -> TransformError {
        TransformError::Node {
            transformer,
            message: message.into(),
            location: self.describe_span(span),
        }
    }

    pub fn current_scope(
        &self,
        transformer: &'static str,
        span: Span,
    ) -> Result<ScopeId, TransformError> {
        self.scopes
            .enclosing_scope()
            .ok_or_else(|| self.node_error(transformer, span, "node visited outside any scope"))
    }
}

// -----------------------------------------------------------------------------
// Pipeline
// -----------------------------------------------------------------------------

#[derive(Default)]
pub struct Pipeline {
    transformers: Vec<Box<dyn NodeTransformer>>,
}

impl Pipeline {
    /// The standard transformer chain for `options`, in registration order.
    pub fn for_options(options: &ObfuscatorOptions) -> Self {
        let mut pipeline = Pipeline::default();
        pipeline
            .register(ScopeIdentifiersTransformer::new(options.rename_globals))
            .register(LabeledStatementTransformer);
        if options.string_array {
            pipeline.register(StringArrayTransformer::new(options.encodings()));
        }
        if options.disable_console_output {
            pipeline.register(ConsoleOutputTransformer);
        }
        if options.debug_protection {
            pipeline.register(DebugProtectionTransformer);
        }
        pipeline
    }

    pub fn register(&mut self, transformer: impl NodeTransformer + 'static) -> &mut Self {
        self.transformers.push(Box::new(transformer));
        self
    }

    pub fn transformer_names(&self) -> Vec<&'static str> {
        self.transformers.iter().map(|t| t.name()).collect()
    }

    pub fn run(
        &mut self,
        program: &mut Program,
        cx: &mut TransformContext<'_>,
    ) -> Result<(), TransformError> {
        for stage in TransformationStage::ALL {
            let _guard = debug_span!("stage", ?stage).entered();
            cx.stage = stage;

            let active: Vec<usize> = self
                .transformers
                .iter()
                .enumerate()
                .filter(|(_, t)| !t.interest(stage).is_empty())
                .map(|(i, _)| i)
                .collect();

            cx.scopes.begin_traversal();
            let mut walker = Walker {
                transformers: &mut self.transformers,
                active: &active,
                cx: &mut *cx,
                binding: None,
                exporting: false,
                strict: false,
                error: None,
            };
            walker.walk(program);
            if let Some(err) = walker.error {
                return Err(err);
            }
            cx.scopes.end_traversal()?;

            for t in self.transformers.iter_mut() {
                t.finish(stage, program, cx)?;
            }
            debug!(
                scopes = cx.scopes.len(),
                transformers = active.len(),
                "stage complete"
            );
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Walker
// -----------------------------------------------------------------------------

struct Walker<'w, 'a> {
    transformers: &'w mut [Box<dyn NodeTransformer>],
    active: &'w [usize],
    cx: &'w mut TransformContext<'a>,
    /// Set while visiting a declaration's binding pattern.
    binding: Option<Binding>,
    /// Set between `export` and the declaration it wraps.
    exporting: bool,
    /// Strict mode code: modules, class bodies, `'use strict'` functions.
    strict: bool,
    error: Option<TransformError>,
}

impl Walker<'_, '_> {
    fn walk(&mut self, program: &mut Program) {
        self.scoped(ScopeKind::Program, |w| match program {
            Program::Module(m) => {
                w.strict = true;
                w.visit_module_body(&mut m.body)
            }
            Program::Script(s) => w.visit_body(&mut s.body),
        });
    }

    fn dispatch(&mut self, mut node: Node<'_>) {
        if self.error.is_some() {
            return;
        }
        let kind = node.kind();
        let stage = self.cx.stage;
        let active = self.active;
        for &i in active {
            let t = &mut self.transformers[i];
            if !t.interest(stage).contains(&kind) {
                continue;
            }
            if let Err(err) = t.transform_node(&mut node, self.cx) {
                self.error = Some(err);
                return;
            }
        }
    }

    fn scoped(&mut self, kind: ScopeKind, f: impl FnOnce(&mut Self)) {
        if self.error.is_some() {
            return;
        }
        if let Err(err) = self.cx.scopes.enter(kind) {
            self.error = Some(err);
            return;
        }
        let saved = (
            self.binding.take(),
            std::mem::take(&mut self.exporting),
            self.strict,
        );
        f(self);
        (self.binding, self.exporting, self.strict) = saved;
        self.cx.scopes.exit();
    }

    fn with_binding(&mut self, kind: BindingKind, exported: bool, f: impl FnOnce(&mut Self)) {
        let saved = self.binding.replace(Binding { kind, exported });
        f(self);
        self.binding = saved;
    }

    fn role(&self) -> IdentRole {
        match self.binding {
            Some(b) => IdentRole::Binding(b),
            None => IdentRole::Reference,
        }
    }

    // ---------- bodies with directive prologues ----------

    fn visit_body(&mut self, stmts: &mut [Stmt]) {
        let mut prologue = true;
        for stmt in stmts {
            if self.error.is_some() {
                return;
            }
            if prologue {
                if let Some(s) = directive_mut(stmt) {
                    self.strict |= is_use_strict(s);
                    self.dispatch(Node::Literal(s, LiteralPosition::Directive));
                    continue;
                }
                prologue = false;
            }
            stmt.visit_mut_with(self);
        }
    }

    fn visit_module_body(&mut self, items: &mut [ModuleItem]) {
        let mut prologue = true;
        for item in items {
            if self.error.is_some() {
                return;
            }
            if prologue {
                if let ModuleItem::Stmt(stmt) = item {
                    if let Some(s) = directive_mut(stmt) {
                        self.dispatch(Node::Literal(s, LiteralPosition::Directive));
                        continue;
                    }
                }
                prologue = false;
            }
            item.visit_mut_with(self);
        }
    }

    fn visit_function_parts(&mut self, f: &mut Function) {
        f.params.visit_mut_with(self);
        if let Some(body) = &mut f.body {
            self.visit_body(&mut body.stmts);
        }
    }
}

fn is_use_strict(s: &Str) -> bool {
    &*s.value == "use strict"
}

fn directive_mut(stmt: &mut Stmt) -> Option<&mut Str> {
    match stmt {
        Stmt::Expr(ExprStmt { expr, .. }) => match &mut **expr {
            Expr::Lit(Lit::Str(s)) => Some(s),
            _ => None,
        },
        _ => None,
    }
}

impl VisitMut for Walker<'_, '_> {
    fn visit_mut_stmt(&mut self, s: &mut Stmt) {
        if self.error.is_some() {
            return;
        }
        s.visit_mut_children_with(self);
    }

    fn visit_mut_expr(&mut self, e: &mut Expr) {
        if self.error.is_some() {
            return;
        }
        let saved = (self.binding.take(), std::mem::take(&mut self.exporting));
        self.dispatch(Node::Expr(e));
        e.visit_mut_children_with(self);
        (self.binding, self.exporting) = saved;
    }

    fn visit_mut_ident(&mut self, i: &mut Ident) {
        let role = self.role();
        self.dispatch(Node::Ident(i, role));
    }

    fn visit_mut_private_name(&mut self, _: &mut PrivateName) {}

    // ---------- declarations ----------

    fn visit_mut_var_decl(&mut self, v: &mut VarDecl) {
        let exported = std::mem::take(&mut self.exporting);
        let kind = match v.kind {
            VarDeclKind::Var => BindingKind::Var,
            VarDeclKind::Let | VarDeclKind::Const => BindingKind::Lexical,
        };
        for decl in &mut v.decls {
            self.with_binding(kind, exported, |w| decl.name.visit_mut_with(w));
            decl.init.visit_mut_with(self);
        }
    }

    fn visit_mut_using_decl(&mut self, u: &mut UsingDecl) {
        for decl in &mut u.decls {
            self.with_binding(BindingKind::Lexical, false, |w| decl.name.visit_mut_with(w));
            decl.init.visit_mut_with(self);
        }
    }

    fn visit_mut_fn_decl(&mut self, d: &mut FnDecl) {
        let exported = std::mem::take(&mut self.exporting);
        // block-level functions only hoist out of their block in sloppy code
        let kind = if self.strict {
            BindingKind::Lexical
        } else {
            BindingKind::Function
        };
        self.with_binding(kind, exported, |w| w.visit_mut_ident(&mut d.ident));
        d.function.visit_mut_with(self);
    }

    fn visit_mut_class_decl(&mut self, d: &mut ClassDecl) {
        let exported = std::mem::take(&mut self.exporting);
        self.with_binding(BindingKind::Lexical, exported, |w| w.visit_mut_ident(&mut d.ident));
        d.class.visit_mut_with(self);
    }

    fn visit_mut_param(&mut self, p: &mut Param) {
        p.decorators.visit_mut_with(self);
        self.with_binding(BindingKind::Param, false, |w| p.pat.visit_mut_with(w));
    }

    fn visit_mut_object_pat_prop(&mut self, p: &mut ObjectPatProp) {
        if !matches!(p, ObjectPatProp::Assign(_)) {
            p.visit_mut_children_with(self);
            return;
        }
        let role = self.role();
        self.dispatch(Node::PatProp(p, role));
        match p {
            ObjectPatProp::Assign(a) => a.value.visit_mut_with(self),
            ObjectPatProp::KeyValue(kv) => {
                if let Pat::Assign(default) = &mut *kv.value {
                    default.right.visit_mut_with(self);
                }
            }
            ObjectPatProp::Rest(_) => {}
        }
    }

    // ---------- scopes ----------

    fn visit_mut_function(&mut self, f: &mut Function) {
        f.decorators.visit_mut_with(self);
        self.scoped(ScopeKind::Function, |w| w.visit_function_parts(f));
    }

    fn visit_mut_fn_expr(&mut self, e: &mut FnExpr) {
        let FnExpr { ident, function } = e;
        function.decorators.visit_mut_with(self);
        self.scoped(ScopeKind::Function, |w| {
            if let Some(ident) = ident {
                w.with_binding(BindingKind::Function, false, |w| w.visit_mut_ident(ident));
            }
            w.visit_function_parts(function);
        });
    }

    fn visit_mut_arrow_expr(&mut self, a: &mut ArrowExpr) {
        self.scoped(ScopeKind::Function, |w| {
            for p in &mut a.params {
                w.with_binding(BindingKind::Param, false, |w| p.visit_mut_with(w));
            }
            match &mut *a.body {
                BlockStmtOrExpr::BlockStmt(b) => w.visit_body(&mut b.stmts),
                BlockStmtOrExpr::Expr(e) => e.visit_mut_with(w),
            }
        });
    }

    fn visit_mut_constructor(&mut self, c: &mut Constructor) {
        c.key.visit_mut_with(self);
        self.scoped(ScopeKind::Function, |w| {
            c.params.visit_mut_with(w);
            if let Some(body) = &mut c.body {
                w.visit_body(&mut body.stmts);
            }
        });
    }

    fn visit_mut_getter_prop(&mut self, g: &mut GetterProp) {
        g.key.visit_mut_with(self);
        self.scoped(ScopeKind::Function, |w| {
            if let Some(body) = &mut g.body {
                w.visit_body(&mut body.stmts);
            }
        });
    }

    fn visit_mut_setter_prop(&mut self, s: &mut SetterProp) {
        s.key.visit_mut_with(self);
        self.scoped(ScopeKind::Function, |w| {
            w.with_binding(BindingKind::Param, false, |w| {
                s.this_param.visit_mut_with(w);
                s.param.visit_mut_with(w);
            });
            if let Some(body) = &mut s.body {
                w.visit_body(&mut body.stmts);
            }
        });
    }

    fn visit_mut_static_block(&mut self, b: &mut StaticBlock) {
        self.scoped(ScopeKind::Function, |w| w.visit_body(&mut b.body.stmts));
    }

    fn visit_mut_class_expr(&mut self, e: &mut ClassExpr) {
        let ClassExpr { ident, class } = e;
        match ident {
            Some(ident) => {
                self.scoped(ScopeKind::Class, |w| {
                    w.with_binding(BindingKind::Lexical, false, |w| w.visit_mut_ident(ident));
                    class.visit_mut_with(w);
                });
            }
            None => class.visit_mut_with(self),
        }
    }

    fn visit_mut_class(&mut self, c: &mut Class) {
        let strict = std::mem::replace(&mut self.strict, true);
        c.visit_mut_children_with(self);
        self.strict = strict;
    }

    fn visit_mut_block_stmt(&mut self, b: &mut BlockStmt) {
        self.scoped(ScopeKind::Block, |w| b.stmts.visit_mut_with(w));
    }

    fn visit_mut_for_stmt(&mut self, s: &mut ForStmt) {
        self.scoped(ScopeKind::Block, |w| s.visit_mut_children_with(w));
    }

    fn visit_mut_for_in_stmt(&mut self, s: &mut ForInStmt) {
        self.scoped(ScopeKind::Block, |w| s.visit_mut_children_with(w));
    }

    fn visit_mut_for_of_stmt(&mut self, s: &mut ForOfStmt) {
        self.scoped(ScopeKind::Block, |w| s.visit_mut_children_with(w));
    }

    fn visit_mut_switch_stmt(&mut self, s: &mut SwitchStmt) {
        s.discriminant.visit_mut_with(self);
        self.scoped(ScopeKind::Block, |w| s.cases.visit_mut_with(w));
    }

    fn visit_mut_catch_clause(&mut self, c: &mut CatchClause) {
        self.scoped(ScopeKind::Catch, |w| {
            w.with_binding(BindingKind::Lexical, false, |w| c.param.visit_mut_with(w));
            c.body.stmts.visit_mut_with(w);
        });
    }

    // ---------- labels, with ----------

    fn visit_mut_labeled_stmt(&mut self, s: &mut LabeledStmt) {
        self.dispatch(Node::LabeledStmt(s));
        s.body.visit_mut_with(self);
    }

    fn visit_mut_break_stmt(&mut self, _: &mut BreakStmt) {}

    fn visit_mut_continue_stmt(&mut self, _: &mut ContinueStmt) {}

    fn visit_mut_with_stmt(&mut self, s: &mut WithStmt) {
        self.dispatch(Node::With(s));
        s.visit_mut_children_with(self);
    }

    // ---------- properties ----------

    fn visit_mut_prop(&mut self, p: &mut Prop) {
        if matches!(p, Prop::Shorthand(_)) {
            self.dispatch(Node::ShorthandProp(p));
            return;
        }
        p.visit_mut_children_with(self);
    }

    fn visit_mut_prop_name(&mut self, n: &mut PropName) {
        match n {
            PropName::Str(s) => self.dispatch(Node::Literal(s, LiteralPosition::PropertyKey)),
            PropName::Computed(c) => c.visit_mut_with(self),
            PropName::Ident(_) | PropName::Num(_) | PropName::BigInt(_) => {}
        }
    }

    // ---------- modules ----------

    fn visit_mut_import_decl(&mut self, d: &mut ImportDecl) {
        for s in &mut d.specifiers {
            self.dispatch(Node::ImportSpecifier(s));
        }
        self.dispatch(Node::Literal(&mut *d.src, LiteralPosition::ImportSource));
    }

    fn visit_mut_named_export(&mut self, e: &mut NamedExport) {
        match &mut e.src {
            Some(src) => self.dispatch(Node::Literal(&mut **src, LiteralPosition::ExportSource)),
            None => {
                for s in &mut e.specifiers {
                    if let ExportSpecifier::Named(named) = s {
                        self.dispatch(Node::ExportSpecifier(named));
                    }
                }
            }
        }
    }

    fn visit_mut_export_all(&mut self, e: &mut ExportAll) {
        self.dispatch(Node::Literal(&mut *e.src, LiteralPosition::ExportSource));
    }

    fn visit_mut_export_decl(&mut self, d: &mut ExportDecl) {
        self.exporting = true;
        d.decl.visit_mut_with(self);
        self.exporting = false;
    }

    fn visit_mut_export_default_decl(&mut self, d: &mut ExportDefaultDecl) {
        match &mut d.decl {
            DefaultDecl::Fn(FnExpr { ident, function }) => {
                if let Some(ident) = ident {
                    self.with_binding(BindingKind::Function, true, |w| w.visit_mut_ident(ident));
                }
                function.visit_mut_with(self);
            }
            DefaultDecl::Class(ClassExpr { ident, class }) => {
                if let Some(ident) = ident {
                    self.with_binding(BindingKind::Lexical, true, |w| w.visit_mut_ident(ident));
                }
                class.visit_mut_with(self);
            }
            DefaultDecl::TsInterfaceDecl(_) => {}
        }
    }

    // ---------- jsx ----------

    fn visit_mut_jsx_element_name(&mut self, n: &mut JSXElementName) {
        match n {
            // intrinsic elements are tag strings, not bindings
            JSXElementName::Ident(i) if i.sym.starts_with(|c: char| c.is_ascii_lowercase()) => {}
            _ => n.visit_mut_children_with(self),
        }
    }

    fn visit_mut_jsx_attr_value(&mut self, v: &mut JSXAttrValue) {
        match v {
            JSXAttrValue::Lit(Lit::Str(s)) => {
                self.dispatch(Node::Literal(s, LiteralPosition::JsxAttribute))
            }
            _ => v.visit_mut_children_with(self),
        }
    }
}
