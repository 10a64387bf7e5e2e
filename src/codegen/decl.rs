//! Top-level emission and the declaration scheduler.
//!
//! Deferred emission runs through an explicit FIFO worklist instead of
//! call-stack recursion: emission order stays deterministic and mutually
//! referential declarations terminate, because an item is marked produced
//! before its own emission body runs.

use std::rc::Rc;

use log::debug;

use crate::ast::{Declarator, Initializer, Linkage, Stmt, StorageFlags};
use crate::error::{Result, TranslationError};
use crate::semantic::operand::{Operand, Value};
use crate::semantic::types::{underlying, Prim, Type, TypeKind};
use crate::semantic::TypeRef;
use crate::source::Position;
use crate::Name;

use super::{w, Generator, WorkItem};

impl Generator<'_> {
    /// Records the canonical declarator for every defining external-linkage
    /// declarator; repeated `extern` declarations of the name redirect to it,
    /// so a single definition is ever emitted.
    pub fn register_externs(&mut self, decls: &[Rc<Declarator>]) {
        for d in decls {
            if d.linkage != Linkage::External {
                continue;
            }
            let defines = d.definition.is_some()
                || d.initializer.is_some()
                || !d.storage.contains(StorageFlags::EXTERN);
            if defines && !self.externs.contains_key(&d.name) {
                debug!("scheduler: canonical extern '{}'", d.name);
                self.externs.insert(d.name, d.clone());
            }
        }
    }

    /// Emits `d`, then drains the worklist until every transitively
    /// referenced item has been produced.
    pub fn define(&mut self, d: &Rc<Declarator>) -> Result<()> {
        self.define_declarator(d)?;
        while let Some(item) = self.pop_work() {
            match item {
                WorkItem::Decl(d) => self.define_declarator(&d)?,
                WorkItem::Named(t) => self.define_named_type(&t)?,
                WorkItem::TaggedEnum(t) => self.define_tagged_enum_type(&t)?,
                WorkItem::TaggedStruct(t) => self.define_tagged_struct_type(&t)?,
            }
        }
        Ok(())
    }

    fn define_declarator(&mut self, d: &Rc<Declarator>) -> Result<()> {
        let n = self.normalize_declarator(d);
        // An external name with no definition in this unit belongs to the
        // runtime; references mangle to it, nothing is emitted.
        let defined = n.linkage != Linkage::External || self.externs.contains_key(&n.name);
        if defined && self.mark_declarator(n.id) {
            self.tld(&n)?;
        }
        Ok(())
    }

    pub(crate) fn normalize_declarator(&self, d: &Rc<Declarator>) -> Rc<Declarator> {
        if d.linkage == Linkage::External {
            if let Some(c) = self.externs.get(&d.name) {
                return c.clone();
            }
        }
        d.clone()
    }

    /// Emits one top-level declarator, classifying its storage.
    fn tld(&mut self, d: &Rc<Declarator>) -> Result<()> {
        if underlying(&d.ty).kind() == TypeKind::Function {
            return self.function_definition(d);
        }

        let name = self.mangle_declarator(d);
        if is_zero_initializer(&d.initializer) {
            if self.escaped(d) {
                let off = self.alloc_bss(&d.ty, d.pos)?;
                w!(self, "\nvar {} = bss + {}\n", name, off);
            } else {
                let ty = self.typ(&d.ty, d.pos)?;
                w!(self, "\nvar {} {}\n", name, ty);
            }
            return Ok(());
        }

        if self.escaped(d) {
            return self.escaped_tld(d);
        }

        match &d.initializer {
            Some(Initializer::Const(op)) => {
                let lit = self.operand_literal(&op.convert_to(&d.ty), d.pos)?;
                w!(self, "\nvar {} = {}\n", name, lit);
            }
            Some(Initializer::Expr(e)) => {
                w!(self, "\nvar {} = ", name);
                self.convert(e, &d.ty)?;
                w!(self, "\n");
            }
            // Zero shapes were classified above.
            Some(Initializer::Zero) | None => {}
        }
        Ok(())
    }

    /// A non-zero-initialized global whose address escapes: the value lives
    /// in static memory, the variable is its offset.
    fn escaped_tld(&mut self, d: &Rc<Declarator>) -> Result<()> {
        let name = self.mangle_declarator(d);
        if let Some(op) = const_initializer(&d.initializer) {
            let off = self.alloc_ds(&d.ty, &op, d.pos)?;
            w!(self, "\nvar {} = ds + {}\n", name, off);
            return Ok(());
        }

        // Char arrays initialized from a string constant live in the string
        // table.
        if let Type::Array(a) = &*underlying(&d.ty) {
            if matches!(
                &*underlying(&a.item),
                Type::Prim(Prim::Char | Prim::SChar | Prim::UChar)
            ) {
                if let Some(Initializer::Expr(e)) = &d.initializer {
                    if let Some(Value::Str(id)) = &e.operand.value {
                        let off = self.alloc_string(*id, d.pos)?;
                        w!(self, "\nvar {} = ts + {}\n", name, off);
                        return Ok(());
                    }
                }
            }
        }

        // Not constant-foldable: reserve zero-filled storage and compute the
        // value in a one-time startup action.
        let off = self.alloc_bss(&d.ty, d.pos)?;
        let star = self.star_typ(&d.ty, d.pos)?;
        w!(self, "\nvar {} = bss + {} // {}\n", name, off, d.ty);
        w!(self, "\nfunc init() {{ *({})(unsafe.Pointer({})) = ", star, name);
        match &d.initializer {
            Some(Initializer::Expr(e)) => self.convert(e, &d.ty)?,
            _ => {
                return Err(TranslationError::UnsupportedConstruct {
                    construct: "non-constant initializer shape".into(),
                    pos: d.pos,
                })
            }
        }
        w!(self, " }}\n");
        Ok(())
    }

    fn define_named_type(&mut self, t: &TypeRef) -> Result<()> {
        let Type::Named(n) = &**t else {
            panic!("ICE: named work item is not a named type")
        };
        if !self.mark_named(n.name) {
            return Ok(());
        }
        let ty = self.typ(&n.ty, Position::default())?;
        w!(self, "\ntype T{} = {}\n", n.name, ty);
        Ok(())
    }

    fn define_tagged_enum_type(&mut self, t: &TypeRef) -> Result<()> {
        let Type::TaggedEnum(tt) = &**t else {
            panic!("ICE: enum work item is not a tagged enum")
        };
        if !self.mark_enum_tag(tt.tag) {
            return Ok(());
        }
        let Some(backing) = tt.resolve_enum() else {
            return Err(TranslationError::IncompleteType {
                ty: t.to_string(),
                pos: Position::default(),
            });
        };
        let Type::Enum(et) = &*backing else {
            panic!("ICE: enum tag resolved to a non-enum type")
        };
        let base = self.typ(&et.base, Position::default())?;
        w!(self, "\ntype E{} {}\n", tt.tag, base);
        w!(self, "\nconst (");
        let mut iota = 0i64;
        for (i, v) in et.enums.iter().enumerate() {
            let val = v.value;
            if i == 0 {
                w!(self, "\nC{} E{} = iota", v.name, tt.tag);
                if val != 0 {
                    w!(self, " {:+}", val);
                }
                iota = val + 1;
                continue;
            }

            w!(self, "\nC{}", v.name);
            if val == iota {
                iota += 1;
                continue;
            }

            w!(self, " = {}", val);
            iota = val + 1;
        }
        w!(self, "\n)\n");
        Ok(())
    }

    fn define_tagged_struct_type(&mut self, t: &TypeRef) -> Result<()> {
        let (tag, backing) = match &**t {
            Type::TaggedStruct(tt) | Type::TaggedUnion(tt) => (tt.tag, tt.resolve_record()),
            _ => panic!("ICE: struct work item is not a tagged record"),
        };
        if !self.mark_struct_tag(tag) {
            return Ok(());
        }
        let Some(b) = backing else {
            return Err(TranslationError::IncompleteType {
                ty: t.to_string(),
                pos: Position::default(),
            });
        };
        let ty = self.typ(&b, Position::default())?;
        w!(self, "\ntype S{} {}\n", tag, ty);
        Ok(())
    }

    fn function_definition(&mut self, d: &Rc<Declarator>) -> Result<()> {
        self.reset_labels();
        let fnty = underlying(&d.ty);
        let Type::Function(ft) = &*fnty else {
            panic!("ICE: function declarator without a function type")
        };

        let name = self.mangle_declarator(d);
        w!(self, "\nfunc {}(tls *crt.TLS", name);
        let mut esc_params: Vec<Rc<Declarator>> = Vec::new();
        let single_void =
            ft.params.len() == 1 && matches!(&*underlying(&ft.params[0]), Type::Prim(Prim::Void));
        if !single_void {
            for (i, pt) in ft.params.iter().enumerate() {
                w!(self, ", ");
                match d.params.get(i) {
                    // Parameters arrive by value; an address-taken parameter
                    // is copied into a heap slot at entry, the argument gets
                    // an `a` prefix.
                    Some(p) if p.address_taken => {
                        let ty = self.typ(pt, p.pos)?;
                        w!(self, "a{} {}", p.name, ty);
                        esc_params.push(p.clone());
                    }
                    param => {
                        let mut v = pt.clone();
                        if let Type::Pointer(ptr) = &*underlying(pt) {
                            if matches!(&*underlying(&ptr.item), Type::Function(_)) {
                                v = ptr.item.clone();
                            }
                        }
                        let nm = match param {
                            Some(p) => self.mangle_declarator(p),
                            None => format!("_p{}", i),
                        };
                        let ty = self.typ(&v, d.pos)?;
                        w!(self, "{} {}", nm, ty);
                        if v.is_pointer_type() {
                            if let Type::Pointer(p) = &*underlying(&v) {
                                if let Ok(item) = self.typ(&p.item, d.pos) {
                                    w!(self, " /* *{} */", item);
                                }
                            }
                        }
                    }
                }
            }
            if ft.variadic {
                w!(self, ", ap ...interface{{}}");
            }
        }
        w!(self, ")");
        let void = matches!(&*underlying(&ft.result), Type::Prim(Prim::Void));
        if !void {
            let rt = self.typ(&ft.result, d.pos)?;
            w!(self, "(r {})", rt);
        }
        self.fn_result = if void { None } else { Some(ft.result.clone()) };

        let Some(def) = &d.definition else {
            return Err(TranslationError::UnsupportedConstruct {
                construct: format!("function '{}' without a body", d.name),
                pos: d.pos,
            });
        };
        let Stmt::Compound(items) = &def.body else {
            return Err(TranslationError::UnsupportedConstruct {
                construct: "function body is not a compound statement".into(),
                pos: d.pos,
            });
        };
        let mut deadcode = false;
        self.compound_stmt(
            items,
            Some(&def.locals[..]),
            None,
            !void,
            None,
            None,
            &esc_params,
            &mut deadcode,
        )?;
        w!(self, "\n");
        self.fn_result = None;
        Ok(())
    }

    pub(crate) fn mangle_declarator(&self, d: &Rc<Declarator>) -> String {
        if let Some(&num) = self.nums.get(&d.id) {
            return format!("_{}{}", num, d.name);
        }

        if d.is_field {
            return mangle_ident(d.name, true);
        }

        if d.linkage == Linkage::External {
            return match self.externs.contains_key(&d.name) {
                false => format!("crt.{}", mangle_ident(d.name, true)),
                true => mangle_ident(d.name, true),
            };
        }

        mangle_ident(d.name, false)
    }
}

pub(crate) fn mangle_ident(name: Name, exported: bool) -> String {
    match exported {
        true => format!("X{}", name),
        false => format!("_{}", name),
    }
}

fn is_zero_initializer(init: &Option<Initializer>) -> bool {
    match init {
        None | Some(Initializer::Zero) => true,
        Some(Initializer::Const(op)) => op.is_zero(),
        Some(Initializer::Expr(e)) => e.operand.value.is_some() && e.operand.is_zero(),
    }
}

/// A fully folded, non-string constant initializer, eligible for the
/// constant-data segment.
fn const_initializer(init: &Option<Initializer>) -> Option<Operand> {
    match init {
        Some(Initializer::Const(op))
            if op.value.is_some() && !matches!(op.value, Some(Value::Str(_))) =>
        {
            Some(op.clone())
        }
        Some(Initializer::Expr(e))
            if e.operand.value.is_some() && !matches!(e.operand.value, Some(Value::Str(_))) =>
        {
            Some(e.operand.clone())
        }
        _ => None,
    }
}
