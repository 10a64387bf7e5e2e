//! Expression rendering.
//!
//! Expression-level semantics live in the external front end; nodes arrive
//! here with folded operands. The renderer turns them into Go text: folded
//! constants become literals, identifiers with escaped storage read through
//! their heap address, and conversions go through the assignment rule so
//! that an uncovered combination fails loudly instead of coercing.

use crate::ast::{BinaryOp, Expr, ExprKind, UnaryOp};
use crate::error::{Result, TranslationError};
use crate::semantic::operand::{Operand, Value};
use crate::semantic::types::{assign_from, underlying, Field, Type, TypeRef};
use crate::source::Position;
use crate::Name;

use super::{w, Generator};

impl Generator<'_> {
    /// Renders `e` as a Go value.
    pub(crate) fn value(&mut self, e: &Expr) -> Result<()> {
        if let Some(v) = &e.operand.value {
            match v {
                Value::Str(id) => {
                    let off = self.alloc_string(*id, e.pos)?;
                    w!(self, "ts + {}", off);
                }
                Value::Int(_) | Value::Float(_) | Value::Null => {
                    let lit = self.operand_literal(&e.operand, e.pos)?;
                    w!(self, "{}", lit);
                }
            }
            return Ok(());
        }
        self.render(e)
    }

    /// Renders `e` in statement position.
    pub(crate) fn void_value(&mut self, e: &Expr) -> Result<()> {
        match &e.kind {
            ExprKind::Assign(l, r) => self.store(l, r),
            ExprKind::Call(..) => self.render(e),
            ExprKind::Comma(list) => {
                for (i, x) in list.iter().enumerate() {
                    if i != 0 {
                        w!(self, "\n");
                    }
                    self.void_value(x)?;
                }
                Ok(())
            }
            // A pure value in statement position still gets a use, keeping
            // the target's unused rules quiet.
            _ => {
                w!(self, "_ = ");
                self.value(e)
            }
        }
    }

    /// Renders `e` converted to `to`, validated through the assignment rule.
    pub(crate) fn convert(&mut self, e: &Expr, to: &TypeRef) -> Result<()> {
        let mut op = e.operand.clone();
        // Arrays decay to a pointer to their element.
        if let Type::Array(a) = &*underlying(&op.ty) {
            op.ty = Type::pointer(a.item.clone());
        }
        let converted = assign_from(to, self.opts, &op, e.pos)?;

        if converted.value.is_some() {
            match &converted.value {
                Some(Value::Str(id)) => {
                    let off = self.alloc_string(*id, e.pos)?;
                    w!(self, "ts + {}", off);
                }
                _ => {
                    let lit = self.operand_literal(&converted, e.pos)?;
                    w!(self, "{}", lit);
                }
            }
            return Ok(());
        }

        if e.operand.ty.equal(to) {
            return self.value(e);
        }

        // Arithmetic conversions render as Go conversions; pointers are all
        // addresses and convert freely.
        if to.is_arithmetic_type() && e.operand.ty.is_arithmetic_type() {
            let ty = self.typ(to, e.pos)?;
            w!(self, "{}(", ty);
            self.value(e)?;
            w!(self, ")");
            return Ok(());
        }
        self.value(e)
    }

    /// Renders a folded constant.
    pub(crate) fn operand_literal(&mut self, op: &Operand, pos: Position) -> Result<String> {
        match &op.value {
            Some(Value::Int(v)) => {
                if op.ty.is_unsigned() {
                    Ok(format!("{}", *v as u64))
                } else {
                    Ok(format!("{}", v))
                }
            }
            Some(Value::Float(f)) => Ok(format_float(*f)),
            Some(Value::Null) => Ok("0".into()),
            Some(Value::Str(id)) => {
                let off = self.alloc_string(*id, pos)?;
                Ok(format!("ts + {}", off))
            }
            None => Err(TranslationError::UnsupportedConstruct {
                construct: "non-constant operand in constant position".into(),
                pos,
            }),
        }
    }

    fn render(&mut self, e: &Expr) -> Result<()> {
        match &e.kind {
            ExprKind::Ident(d) => {
                let d = self.normalize_declarator(d);
                let name = self.mangle_declarator(&d);
                if self.escaped(&d) && !matches!(&*underlying(&d.ty), Type::Function(_)) {
                    let ty = self.typ(&d.ty, e.pos)?;
                    w!(self, "*(*{})(unsafe.Pointer({}))", ty, name);
                } else {
                    w!(self, "{}", name);
                }
                Ok(())
            }
            ExprKind::IntLit | ExprKind::FloatLit | ExprKind::StrLit => {
                Err(TranslationError::UnsupportedConstruct {
                    construct: "literal without a folded value".into(),
                    pos: e.pos,
                })
            }
            ExprKind::Unary(op, x) => {
                match op {
                    UnaryOp::Neg => {
                        w!(self, "-(");
                        self.value(x)?;
                        w!(self, ")");
                    }
                    UnaryOp::BitNot => {
                        w!(self, "^(");
                        self.value(x)?;
                        w!(self, ")");
                    }
                    UnaryOp::Not => {
                        w!(self, "crt.Bool32(");
                        self.value(x)?;
                        w!(self, " == 0)");
                    }
                }
                Ok(())
            }
            ExprKind::Binary(op, l, r) => self.binary(*op, l, r),
            ExprKind::Assign(..) => Err(TranslationError::UnsupportedConstruct {
                construct: "assignment in value position".into(),
                pos: e.pos,
            }),
            ExprKind::Call(f, args) => self.call(f, args, e.pos),
            ExprKind::Index(a, i) => {
                let elem = e.operand.ty.clone();
                let size = elem.size_of(e.pos)?;
                let ty = self.typ(&elem, e.pos)?;
                w!(self, "*(*{})(unsafe.Pointer(", ty);
                self.value(a)?;
                w!(self, " + uintptr(");
                self.value(i)?;
                w!(self, ")*{}))", size);
                Ok(())
            }
            ExprKind::Member(x, name) => self.member(x, *name, e),
            ExprKind::Deref(p) => {
                let ty = self.typ(&e.operand.ty, e.pos)?;
                w!(self, "*(*{})(unsafe.Pointer(", ty);
                self.value(p)?;
                w!(self, "))");
                Ok(())
            }
            ExprKind::AddrOf(x) => self.addr(x),
            ExprKind::Cast(ty, x) => self.convert(x, ty),
            ExprKind::Cond(..) => Err(TranslationError::UnsupportedConstruct {
                construct: "conditional expression in value position".into(),
                pos: e.pos,
            }),
            ExprKind::Comma(..) => Err(TranslationError::UnsupportedConstruct {
                construct: "comma expression in value position".into(),
                pos: e.pos,
            }),
        }
    }

    fn binary(&mut self, op: BinaryOp, l: &Expr, r: &Expr) -> Result<()> {
        use BinaryOp::*;
        match op {
            Add | Sub | Mul | Div | Rem | And | Or | Xor => {
                let tok = match op {
                    Add => "+",
                    Sub => "-",
                    Mul => "*",
                    Div => "/",
                    Rem => "%",
                    And => "&",
                    Or => "|",
                    Xor => "^",
                    _ => unreachable!(),
                };
                w!(self, "(");
                self.value(l)?;
                w!(self, " {} ", tok);
                self.value(r)?;
                w!(self, ")");
            }
            Shl | Shr => {
                w!(self, "(");
                self.value(l)?;
                w!(self, " {} uint(", if op == Shl { "<<" } else { ">>" });
                self.value(r)?;
                w!(self, "))");
            }
            Eq | Ne | Lt | Gt | Le | Ge => {
                let tok = match op {
                    Eq => "==",
                    Ne => "!=",
                    Lt => "<",
                    Gt => ">",
                    Le => "<=",
                    Ge => ">=",
                    _ => unreachable!(),
                };
                w!(self, "crt.Bool32(");
                self.value(l)?;
                w!(self, " {} ", tok);
                self.value(r)?;
                w!(self, ")");
            }
            LAnd => {
                w!(self, "crt.Bool32((");
                self.value(l)?;
                w!(self, " != 0) && (");
                self.value(r)?;
                w!(self, " != 0))");
            }
            LOr => {
                w!(self, "crt.Bool32((");
                self.value(l)?;
                w!(self, " != 0) || (");
                self.value(r)?;
                w!(self, " != 0))");
            }
        }
        Ok(())
    }

    fn call(&mut self, f: &Expr, args: &[Expr], pos: Position) -> Result<()> {
        let fnty = match &*underlying(&f.operand.ty) {
            Type::Function(_) => underlying(&f.operand.ty),
            Type::Pointer(p) => underlying(&p.item),
            _ => {
                return Err(TranslationError::UnsupportedConstruct {
                    construct: "call of a non-function".into(),
                    pos,
                })
            }
        };
        let Type::Function(ft) = &*fnty else {
            return Err(TranslationError::UnsupportedConstruct {
                construct: "call of a non-function".into(),
                pos,
            });
        };
        self.render(f)?;
        w!(self, "(tls");
        for (i, a) in args.iter().enumerate() {
            w!(self, ", ");
            match ft.params.get(i) {
                Some(pt) => self.convert(a, pt)?,
                // Variadic tail arguments pass through unconverted.
                None => self.value(a)?,
            }
        }
        w!(self, ")");
        Ok(())
    }

    /// Renders the address of an lvalue.
    fn addr(&mut self, e: &Expr) -> Result<()> {
        match &e.kind {
            ExprKind::Ident(d) => {
                let d = self.normalize_declarator(d);
                if self.escaped(&d) {
                    let name = self.mangle_declarator(&d);
                    w!(self, "{}", name);
                    Ok(())
                } else {
                    Err(TranslationError::UnsupportedConstruct {
                        construct: format!("address of non-escaped object '{}'", d.name),
                        pos: e.pos,
                    })
                }
            }
            ExprKind::Deref(p) => self.value(p),
            ExprKind::Index(a, i) => {
                let size = e.operand.ty.size_of(e.pos)?;
                w!(self, "(");
                self.value(a)?;
                w!(self, " + uintptr(");
                self.value(i)?;
                w!(self, ")*{})", size);
                Ok(())
            }
            _ => Err(TranslationError::UnsupportedConstruct {
                construct: "address of expression".into(),
                pos: e.pos,
            }),
        }
    }

    fn member(&mut self, x: &Expr, name: Name, e: &Expr) -> Result<()> {
        // A stack-resident struct is a native Go struct; field access is
        // direct. Everything else goes through the field's byte offset.
        if let ExprKind::Ident(d) = &x.kind {
            let d = self.normalize_declarator(d);
            if !self.escaped(&d) {
                let mangled = self.mangle_declarator(&d);
                w!(self, "{}.X{}", mangled, name);
                return Ok(());
            }
        }
        let off = field_offset(&x.operand.ty, name, e.pos)?;
        let ty = self.typ(&e.operand.ty, e.pos)?;
        w!(self, "*(*{})(unsafe.Pointer(", ty);
        self.addr(x)?;
        w!(self, " + {}))", off);
        Ok(())
    }

    /// Renders the store `l = r`.
    pub(crate) fn store(&mut self, l: &Expr, r: &Expr) -> Result<()> {
        match &l.kind {
            ExprKind::Ident(d) => {
                let d = self.normalize_declarator(d);
                let name = self.mangle_declarator(&d);
                if self.escaped(&d) {
                    let ty = self.typ(&d.ty, l.pos)?;
                    w!(self, "*(*{})(unsafe.Pointer({})) = ", ty, name);
                } else {
                    w!(self, "{} = ", name);
                }
            }
            ExprKind::Deref(_) | ExprKind::Index(..) | ExprKind::Member(..) => {
                self.render(l)?;
                w!(self, " = ");
            }
            _ => {
                return Err(TranslationError::UnsupportedConstruct {
                    construct: "assignment target".into(),
                    pos: l.pos,
                })
            }
        }
        self.convert(r, &l.operand.ty)
    }
}

/// Byte offset of `name` inside the record type `t`.
fn field_offset(t: &TypeRef, name: Name, pos: Position) -> Result<u64> {
    let u = underlying(t);
    let (fields, is_union): (&[Field], bool) = match &*u {
        Type::Struct(r) => (&r.fields[..], false),
        Type::Union(r) => (&r.fields[..], true),
        _ => {
            return Err(TranslationError::UnsupportedConstruct {
                construct: format!("member access into {}", t),
                pos,
            })
        }
    };
    let mut offset = 0u64;
    for f in fields {
        let ft = match (&f.packed, f.bits) {
            (Some(p), b) if b != 0 => p,
            _ => &f.ty,
        };
        if !is_union {
            offset = crate::semantic::types::round_up(offset, ft.align_of(pos)?);
        }
        if f.name == name {
            return Ok(if is_union { 0 } else { offset });
        }
        if !is_union {
            offset += ft.size_of(pos)?;
        }
    }
    Err(TranslationError::UnsupportedConstruct {
        construct: format!("unknown field '{}' in {}", name, t),
        pos,
    })
}

fn format_float(f: f64) -> String {
    if f.is_finite() && f == f.trunc() {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}
