//! Control-flow lowering.
//!
//! Structured statements are rewritten into flat blocks connected by
//! unconditional jumps to synthetic numeric labels; the target language has
//! no native construct matching C's labeled break/continue and switch
//! fallthrough. Break/continue targets thread through the recursion as
//! `JumpLabel` slots; a slot's label is only emitted if some jump used it.
//! One dead-code flag flows through the whole lowering: set by diverging
//! statements, cleared on every labeled statement.

use std::cell::Cell;
use std::rc::Rc;

use hashbrown::{HashMap, HashSet};

use crate::ast::{CaseId, Declarator, Expr, ExprKind, Initializer, Linkage, Stmt, StorageFlags};
use crate::error::{Result, TranslationError};
use crate::semantic::types::Type;
use crate::source::Position;
use crate::Name;

use super::decl::mangle_ident;
use super::{w, Generator};

/// A break or continue target. `used` flips on the first jump lowered
/// against it.
pub(crate) struct JumpLabel {
    pub(crate) label: u32,
    pub(crate) used: Cell<bool>,
}

impl JumpLabel {
    fn new(label: u32) -> JumpLabel {
        JumpLabel {
            label,
            used: Cell::new(false),
        }
    }

    /// A target the construct itself already jumps to.
    fn used_new(label: u32) -> JumpLabel {
        JumpLabel {
            label,
            used: Cell::new(true),
        }
    }
}

impl Generator<'_> {
    /// Lowers a block. `vars` is present only for a function body: locals
    /// are hoisted, classified and declared there, and the body grows braces
    /// and the trailing `return r` sentinel.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn compound_stmt(
        &mut self,
        items: &[Stmt],
        vars: Option<&[Rc<Declarator>]>,
        cases: Option<&HashMap<CaseId, u32>>,
        sentinel: bool,
        brk: Option<&JumpLabel>,
        cont: Option<&JumpLabel>,
        esc_params: &[Rc<Declarator>],
        deadcode: &mut bool,
    ) -> Result<()> {
        if vars.is_some() {
            w!(self, " {{");
        }

        let mut kept: Vec<Rc<Declarator>> = Vec::new();
        if let Some(vars) = vars {
            for v in vars {
                // Unreferenced __func__ bindings are dropped.
                if v.referenced == 0
                    && v.initializer.is_some()
                    && v.linkage == Linkage::None
                    && v.storage.contains(StorageFlags::STATIC)
                    && v.name == Name::from("__func__")
                {
                    continue;
                }
                // Never read, never written past its absent initializer,
                // address never taken: the local is eliminated entirely.
                if v.referenced == 0 && v.initializer.is_none() && !v.address_taken {
                    continue;
                }
                // Static locals are hoisted to the top level under a shadow
                // number.
                if v.storage.contains(StorageFlags::STATIC) {
                    self.enqueue_numbered(v);
                    continue;
                }
                kept.push(v.clone());
            }

            // Shadow-number name collisions among the hoisted locals.
            let mut local_names: HashSet<Name> = HashSet::new();
            for v in &kept {
                if !local_names.insert(v.name) {
                    self.assign_num(v);
                }
            }
        }

        let mut free: Vec<Rc<Declarator>> = Vec::new();
        if kept.len() + esc_params.len() != 0 {
            let single = kept.len() + esc_params.len() == 1;
            if single {
                w!(self, "\nvar ");
            } else {
                w!(self, "\nvar (\n");
            }
            for v in esc_params {
                free.push(v.clone());
                let size = v.ty.size_of(v.pos)?;
                let star = self.star_typ(&v.ty, v.pos)?;
                let name = self.mangle_declarator(v);
                w!(self, "\n\t{} = crt.MustMalloc({}) // {}", name, size, star);
            }
            for v in &kept {
                let name = self.mangle_declarator(v);
                if self.escaped(v) {
                    free.push(v.clone());
                    let size = v.ty.size_of(v.pos)?;
                    let star = self.star_typ(&v.ty, v.pos)?;
                    w!(self, "\n\t{} = crt.MustMalloc({}) // {}", name, size, star);
                } else {
                    let ty = self.typ(&v.ty, v.pos)?;
                    w!(self, "\n\t{} {}", name, ty);
                    if v.ty.is_pointer_type() {
                        if let Type::Pointer(p) = &*crate::semantic::underlying(&v.ty) {
                            if let Ok(item) = self.typ(&p.item, v.pos) {
                                w!(self, "\t// *{}", item);
                            }
                        }
                    }
                    // Write-only and unread locals get a blank use to keep
                    // the target's unused-variable rule satisfied.
                    if v.referenced == 0 || v.referenced == v.assigned_to {
                        w!(self, "\n_ = {}", name);
                    }
                }
            }
            if !single {
                w!(self, "\n)");
            }
            for v in esc_params {
                let ty = self.typ(&v.ty, v.pos)?;
                let name = self.mangle_declarator(v);
                w!(self, "\n*(*{})(unsafe.Pointer({})) = a{}", ty, name, v.name);
            }
        }

        // One guaranteed-run cleanup frees every heap slot on every exit
        // path; a failure in flight is re-raised after the frees complete.
        if !free.is_empty() {
            w!(self, "\ndefer func() {{");
            w!(self, "\nerr := recover()");
            for v in &free {
                let name = self.mangle_declarator(v);
                w!(self, "\ncrt.Free({})", name);
            }
            w!(self, "\nif err != nil {{ panic(err) }}");
            w!(self, "\n}}()");
        }

        for item in items {
            self.block_item(item, cases, brk, cont, deadcode)?;
        }

        if vars.is_some() {
            if sentinel && !*deadcode {
                w!(self, ";return r");
            }
            w!(self, "\n}}");
        }
        Ok(())
    }

    fn block_item(
        &mut self,
        item: &Stmt,
        cases: Option<&HashMap<CaseId, u32>>,
        brk: Option<&JumpLabel>,
        cont: Option<&JumpLabel>,
        deadcode: &mut bool,
    ) -> Result<()> {
        match item {
            Stmt::Decl(d) => self.local_declaration(d),
            _ => self.stmt(item, cases, brk, cont, deadcode),
        }
    }

    pub(crate) fn stmt(
        &mut self,
        s: &Stmt,
        cases: Option<&HashMap<CaseId, u32>>,
        brk: Option<&JumpLabel>,
        cont: Option<&JumpLabel>,
        deadcode: &mut bool,
    ) -> Result<()> {
        match s {
            Stmt::Expr(list) => self.expr_stmt(list),
            Stmt::Decl(d) => self.local_declaration(d),
            Stmt::Compound(items) => {
                self.compound_stmt(items, None, cases, false, brk, cont, &[], deadcode)
            }
            Stmt::If { .. } | Stmt::IfElse { .. } | Stmt::Switch { .. } => {
                self.selection_stmt(s, cases, brk, cont, deadcode)
            }
            Stmt::While { .. } | Stmt::DoWhile { .. } | Stmt::For { .. } => {
                self.iteration_stmt(s, cases, brk, cont, deadcode)
            }
            Stmt::Case { .. } | Stmt::Label { .. } => {
                self.labeled_stmt(s, cases, brk, cont, deadcode)
            }
            Stmt::Goto { .. } | Stmt::Break | Stmt::Continue | Stmt::Return { .. } => {
                self.jump_stmt(s, brk, cont, deadcode)
            }
        }
    }

    /// A block-item declaration: statics were hoisted at block entry, dead
    /// locals were eliminated, what remains is the initializing store.
    fn local_declaration(&mut self, d: &Rc<Declarator>) -> Result<()> {
        if d.storage.contains(StorageFlags::STATIC) {
            return Ok(());
        }
        if d.referenced == 0 && d.initializer.is_none() {
            return Ok(());
        }
        let Some(init) = &d.initializer else {
            return Ok(());
        };

        let name = self.mangle_declarator(d);
        let escaped = self.escaped(d);
        match init {
            Initializer::Zero => {
                // Aggregates are already zero in their storage.
                if !d.ty.is_scalar_type() {
                    return Ok(());
                }
                if escaped {
                    let ty = self.typ(&d.ty, d.pos)?;
                    w!(self, "\n*(*{})(unsafe.Pointer({})) = 0", ty, name);
                } else {
                    w!(self, "\n{} = 0", name);
                }
            }
            Initializer::Const(op) => {
                let lit = self.operand_literal(&op.convert_to(&d.ty), d.pos)?;
                if escaped {
                    let ty = self.typ(&d.ty, d.pos)?;
                    w!(self, "\n*(*{})(unsafe.Pointer({})) = {}", ty, name, lit);
                } else {
                    w!(self, "\n{} = {}", name, lit);
                }
            }
            Initializer::Expr(e) => {
                if escaped {
                    let ty = self.typ(&d.ty, d.pos)?;
                    w!(self, "\n*(*{})(unsafe.Pointer({})) = ", ty, name);
                } else {
                    w!(self, "\n{} = ", name);
                }
                self.convert(e, &d.ty)?;
            }
        }
        Ok(())
    }

    fn expr_stmt(&mut self, list: &[Expr]) -> Result<()> {
        for e in list {
            w!(self, "\n");
            self.void_value(e)?;
        }
        Ok(())
    }

    fn labeled_stmt(
        &mut self,
        s: &Stmt,
        cases: Option<&HashMap<CaseId, u32>>,
        brk: Option<&JumpLabel>,
        cont: Option<&JumpLabel>,
        deadcode: &mut bool,
    ) -> Result<()> {
        match s {
            Stmt::Case { id, stmt, .. } => {
                let l = cases.and_then(|m| m.get(id).copied()).ok_or_else(|| {
                    TranslationError::UnsupportedConstruct {
                        construct: "case label outside of switch dispatch".into(),
                        pos: Position::default(),
                    }
                })?;
                w!(self, "\n_{}:", l);
                let mut f = false;
                self.stmt(stmt, cases, brk, cont, &mut f)?;
            }
            Stmt::Label { name, stmt } => {
                w!(self, "\n{}:\n", mangle_ident(*name, false));
                let mut f = false;
                self.stmt(stmt, cases, brk, cont, &mut f)?;
            }
            _ => panic!("ICE: labeled_stmt on a non-label statement"),
        }
        // Anything reachable by jump is live again.
        *deadcode = false;
        Ok(())
    }

    fn selection_stmt(
        &mut self,
        s: &Stmt,
        cases: Option<&HashMap<CaseId, u32>>,
        brk: Option<&JumpLabel>,
        cont: Option<&JumpLabel>,
        deadcode: &mut bool,
    ) -> Result<()> {
        match s {
            // if C == 0 { goto A }; S; A:
            Stmt::If { cond, then } => {
                let a = self.local();
                w!(self, "\nif ");
                self.value(cond)?;
                w!(self, " == 0 {{ goto _{} }}\n", a);
                self.stmt(then, cases, brk, cont, deadcode)?;
                w!(self, "\n_{}:", a);
                *deadcode = false;
            }
            // if C == 0 { goto A }; S; goto B; A: T; B:
            Stmt::IfElse { cond, then, els } => {
                let a = self.local();
                let b = self.local();
                w!(self, "\nif ");
                self.value(cond)?;
                w!(self, " == 0 {{ goto _{} }}\n", a);
                self.stmt(then, cases, brk, cont, deadcode)?;
                w!(self, "\ngoto _{}\n", b);
                w!(self, "\n_{}:", a);
                let mut f = false;
                self.stmt(els, cases, brk, cont, &mut f)?;
                w!(self, "\n_{}:", b);
                *deadcode = false;
            }
            // A dispatch header jumps to one synthetic label per arm; the
            // body is emitted in place with each case rewritten to its
            // label. The switch supplies a break target but passes the
            // enclosing loop's continue target through.
            Stmt::Switch {
                expr,
                op_ty,
                cases: arms,
                body,
            } => {
                if expr.operand.value.is_some() {
                    return Err(TranslationError::UnsupportedConstruct {
                        construct: "switch on a constant expression".into(),
                        pos: expr.pos,
                    });
                }
                w!(self, "\nswitch ");
                self.convert(expr, op_ty)?;
                w!(self, " {{");
                let after = JumpLabel::new(self.local());
                let mut case_map: HashMap<CaseId, u32> = HashMap::new();
                let mut has_default = false;
                for arm in arms {
                    let l = self.local();
                    case_map.insert(arm.id, l);
                    match &arm.value {
                        Some(op) => {
                            let lit = self.operand_literal(&op.convert_to(op_ty), expr.pos)?;
                            w!(self, "\ncase {}: goto _{}", lit, l);
                        }
                        None => {
                            has_default = true;
                            w!(self, "\ndefault: goto _{}\n", l);
                        }
                    }
                }
                w!(self, "}}");
                if !has_default {
                    after.used.set(true);
                    w!(self, "\ngoto _{}\n", after.label);
                }
                self.stmt(body, Some(&case_map), Some(&after), cont, deadcode)?;
                if after.used.get() {
                    w!(self, "\n_{}:", after.label);
                    *deadcode = false;
                }
            }
            _ => panic!("ICE: selection_stmt on a non-selection statement"),
        }
        Ok(())
    }

    fn iteration_stmt(
        &mut self,
        s: &Stmt,
        cases: Option<&HashMap<CaseId, u32>>,
        _brk: Option<&JumpLabel>,
        _cont: Option<&JumpLabel>,
        deadcode: &mut bool,
    ) -> Result<()> {
        match s {
            // A: if C == 0 { goto B }; S; goto A; B:
            Stmt::While { cond, body } => {
                let a = self.local();
                let b = self.local();
                w!(self, "\n_{}:\nif ", a);
                self.value(cond)?;
                w!(self, " == 0 {{ goto _{} }}\n", b);
                let brk2 = JumpLabel::used_new(b);
                let cont2 = JumpLabel::used_new(a);
                self.stmt(body, cases, Some(&brk2), Some(&cont2), deadcode)?;
                w!(self, "\ngoto _{}\n\n_{}:", a, b);
                *deadcode = false;
            }
            // A: S; B: if C != 0 { goto A }; C:
            Stmt::DoWhile { body, cond } => {
                let a = self.local();
                let b = JumpLabel::new(self.local());
                let c = JumpLabel::new(self.local());
                w!(self, "\n_{}:", a);
                self.stmt(body, cases, Some(&c), Some(&b), deadcode)?;
                if b.used.get() {
                    w!(self, "\n_{}:", b.label);
                }
                w!(self, "\nif ");
                self.value(cond)?;
                w!(self, " != 0 {{ goto _{} }}\n", a);
                if c.used.get() {
                    w!(self, "\ngoto _{}\n\n_{}:", c.label, c.label);
                }
                if b.used.get() || c.used.get() {
                    *deadcode = false;
                }
            }
            // I; A: if C == 0 { goto C }; S; B: P; goto A; C:
            Stmt::For {
                init,
                cond,
                post,
                body,
            } => {
                w!(self, "\n");
                for e in init {
                    w!(self, "\n");
                    self.void_value(e)?;
                }
                let a = self.local();
                let b = JumpLabel::new(self.local());
                let c = JumpLabel::new(self.local());
                w!(self, "\n_{}:", a);
                if let Some(cond) = cond {
                    c.used.set(true);
                    w!(self, "if ");
                    self.value(cond)?;
                    w!(self, " == 0 {{ goto _{} }}\n", c.label);
                }
                self.stmt(body, cases, Some(&c), Some(&b), deadcode)?;
                if b.used.get() {
                    w!(self, "\n_{}:", b.label);
                }
                for e in post {
                    w!(self, "\n");
                    self.void_value(e)?;
                }
                w!(self, "\ngoto _{}\n", a);
                if c.used.get() {
                    w!(self, "\n_{}:", c.label);
                    *deadcode = false;
                }
            }
            _ => panic!("ICE: iteration_stmt on a non-iteration statement"),
        }
        Ok(())
    }

    fn jump_stmt(
        &mut self,
        s: &Stmt,
        brk: Option<&JumpLabel>,
        cont: Option<&JumpLabel>,
        deadcode: &mut bool,
    ) -> Result<()> {
        match s {
            Stmt::Return { expr } => {
                match (expr, self.fn_result.clone()) {
                    (Some(e), Some(rt)) => {
                        // The target has no conditional expression; a ternary
                        // return splits into two returns.
                        if let ExprKind::Cond(c, x, y) = &e.kind {
                            w!(self, "\nif ");
                            self.value(c)?;
                            w!(self, " != 0 {{ return ");
                            self.convert(x, &rt)?;
                            w!(self, " }}\n\nreturn ");
                            self.convert(y, &rt)?;
                        } else {
                            w!(self, "\nreturn ");
                            self.convert(e, &rt)?;
                        }
                    }
                    (Some(e), None) => {
                        w!(self, "\nreturn ");
                        self.value(e)?;
                    }
                    (None, _) => {
                        w!(self, "\nreturn ");
                    }
                }
                w!(self, "\n");
                *deadcode = true;
            }
            Stmt::Break => {
                let b = brk.ok_or_else(|| TranslationError::UnsupportedConstruct {
                    construct: "break outside of a loop or switch".into(),
                    pos: Position::default(),
                })?;
                b.used.set(true);
                w!(self, "\ngoto _{}\n", b.label);
            }
            Stmt::Continue => {
                let c = cont.ok_or_else(|| TranslationError::UnsupportedConstruct {
                    construct: "continue outside of a loop".into(),
                    pos: Position::default(),
                })?;
                c.used.set(true);
                w!(self, "\ngoto _{}\n", c.label);
            }
            Stmt::Goto { name } => {
                w!(self, "\ngoto {}\n", mangle_ident(*name, false));
                *deadcode = true;
            }
            _ => panic!("ICE: jump_stmt on a non-jump statement"),
        }
        Ok(())
    }
}
