//! Go source generation.
//!
//! The generator owns the output writer, the synthetic label counter, the
//! static segment allocators and the deferred-emission worklist. One
//! generator serves exactly one translation unit; none of its counters are
//! reentrant.

use std::collections::VecDeque;
use std::rc::Rc;

use hashbrown::{HashMap, HashSet};
use log::debug;
use serde::Serialize;

use crate::ast::{DeclId, Declarator};
use crate::error::{Result, TranslationError};
use crate::options::Options;
use crate::semantic::operand::{Operand, Value};
use crate::semantic::types::{round_up, Prim, Type, TypeRef};
use crate::source::Position;
use crate::Name;

mod decl;
mod expr;
mod stmt;

#[cfg(test)]
mod tests_decl;

/// Writes formatted text into the generator's output buffer.
macro_rules! w {
    ($g:expr, $($arg:tt)*) => {{
        use std::fmt::Write as _;
        let _ = write!($g.out, $($arg)*);
    }};
}
pub(crate) use w;

/// An item awaiting top-level emission.
pub(crate) enum WorkItem {
    Decl(Rc<Declarator>),
    Named(TypeRef),
    TaggedEnum(TypeRef),
    /// Tagged structs and tagged unions; the two share a tag namespace.
    TaggedStruct(TypeRef),
}

/// Static memory-layout metadata produced alongside the source text and
/// consumed by the downstream runtime initializer.
#[derive(Debug, Serialize)]
pub struct Layout {
    /// Total size of the zero-filled segment.
    pub bss_len: u64,
    /// Byte image of the constant-data segment.
    pub ds: Vec<u8>,
    /// Byte image of the string table.
    pub ts: Vec<u8>,
    /// Interned string constants with their table offsets.
    pub strings: Vec<StringSlot>,
}

#[derive(Debug, Serialize)]
pub struct StringSlot {
    pub text: String,
    pub offset: u64,
}

pub struct Generator<'a> {
    pub(crate) opts: &'a Options,
    strings: &'a HashMap<Name, Vec<u8>>,
    pub(crate) out: String,

    queue: VecDeque<WorkItem>,
    queued_decls: HashSet<DeclId>,
    queued_named: HashSet<Name>,
    queued_struct_tags: HashSet<Name>,
    queued_enum_tags: HashSet<Name>,
    produced_declarators: HashSet<DeclId>,
    produced_named_types: HashSet<Name>,
    produced_struct_tags: HashSet<Name>,
    produced_enum_tags: HashSet<Name>,

    /// Canonical declarator per external name; first definition wins.
    pub(crate) externs: HashMap<Name, Rc<Declarator>>,
    /// Shadow numbers for name-colliding and hoisted locals.
    pub(crate) nums: HashMap<DeclId, u32>,
    next_num: u32,
    next_label: u32,

    bss: u64,
    ds: Vec<u8>,
    ts: Vec<u8>,
    ts_offsets: HashMap<Name, u64>,
    ts_order: Vec<Name>,

    /// Result type of the function currently being emitted, if non-void.
    pub(crate) fn_result: Option<TypeRef>,
}

impl<'a> Generator<'a> {
    pub fn new(opts: &'a Options, strings: &'a HashMap<Name, Vec<u8>>) -> Generator<'a> {
        Generator {
            opts,
            strings,
            out: String::new(),
            queue: VecDeque::new(),
            queued_decls: HashSet::new(),
            queued_named: HashSet::new(),
            queued_struct_tags: HashSet::new(),
            queued_enum_tags: HashSet::new(),
            produced_declarators: HashSet::new(),
            produced_named_types: HashSet::new(),
            produced_struct_tags: HashSet::new(),
            produced_enum_tags: HashSet::new(),
            externs: HashMap::new(),
            nums: HashMap::new(),
            next_num: 0,
            next_label: 1,
            bss: 0,
            ds: Vec::new(),
            ts: Vec::new(),
            ts_offsets: HashMap::new(),
            ts_order: Vec::new(),
            fn_result: None,
        }
    }

    pub fn finish(self) -> (String, Layout) {
        let strings = self
            .ts_order
            .iter()
            .map(|name| StringSlot {
                text: String::from_utf8_lossy(
                    self.strings.get(name).map(Vec::as_slice).unwrap_or(&[]),
                )
                .into_owned(),
                offset: self.ts_offsets[name],
            })
            .collect();
        (
            self.out,
            Layout {
                bss_len: self.bss,
                ds: self.ds,
                ts: self.ts,
                strings,
            },
        )
    }

    /// Allocates a fresh numeric label. Reset per function definition.
    pub(crate) fn local(&mut self) -> u32 {
        let r = self.next_label;
        self.next_label += 1;
        r
    }

    pub(crate) fn reset_labels(&mut self) {
        self.next_label = 1;
    }

    pub(crate) fn assign_num(&mut self, d: &Declarator) {
        self.next_num += 1;
        self.nums.insert(d.id, self.next_num);
    }

    pub(crate) fn escaped(&self, d: &Declarator) -> bool {
        d.address_taken
    }

    // ============================================================
    // Segment allocators. Offsets are handed out once per unit and
    // never reused or freed.
    // ============================================================

    pub(crate) fn alloc_bss(&mut self, ty: &TypeRef, pos: Position) -> Result<u64> {
        let align = ty.align_of(pos)?;
        let size = ty.size_of(pos)?;
        let off = round_up(self.bss, align);
        self.bss = off + size;
        Ok(off)
    }

    pub(crate) fn alloc_ds(&mut self, ty: &TypeRef, op: &Operand, pos: Position) -> Result<u64> {
        let align = ty.align_of(pos)?;
        let size = ty.size_of(pos)? as usize;
        let off = round_up(self.ds.len() as u64, align) as usize;
        self.ds.resize(off, 0);

        let converted = op.convert_to(ty);
        let mut bytes = vec![0u8; size];
        let n = size.min(8);
        match converted.value {
            Some(Value::Int(v)) => {
                bytes[..n].copy_from_slice(&v.to_le_bytes()[..n]);
            }
            Some(Value::Float(f)) => {
                if size == 4 {
                    bytes.copy_from_slice(&(f as f32).to_le_bytes());
                } else {
                    bytes[..n].copy_from_slice(&f.to_le_bytes()[..n]);
                }
            }
            Some(Value::Null) | None => {}
            Some(Value::Str(_)) => {
                return Err(TranslationError::UnsupportedConstruct {
                    construct: "string constant in data segment".into(),
                    pos,
                });
            }
        }
        self.ds.extend_from_slice(&bytes);
        Ok(off as u64)
    }

    pub(crate) fn alloc_string(&mut self, id: Name, pos: Position) -> Result<u64> {
        if let Some(&off) = self.ts_offsets.get(&id) {
            return Ok(off);
        }
        let bytes = self
            .strings
            .get(&id)
            .ok_or_else(|| TranslationError::UnsupportedConstruct {
                construct: format!("unknown string constant '{}'", id),
                pos,
            })?;
        let off = self.ts.len() as u64;
        self.ts.extend_from_slice(bytes);
        self.ts.push(0);
        self.ts_offsets.insert(id, off);
        self.ts_order.push(id);
        Ok(off)
    }

    // ============================================================
    // Scheduler queue
    // ============================================================

    pub(crate) fn enqueue_decl(&mut self, d: &Rc<Declarator>) {
        if self.produced_declarators.contains(&d.id) || !self.queued_decls.insert(d.id) {
            return;
        }
        debug!("scheduler: enqueue declarator '{}'", d.name);
        self.queue.push_back(WorkItem::Decl(d.clone()));
    }

    /// Shadow-numbers a hoisted static local, then enqueues it.
    pub(crate) fn enqueue_numbered(&mut self, d: &Rc<Declarator>) {
        if !self.nums.contains_key(&d.id) {
            self.assign_num(d);
        }
        self.enqueue_decl(d);
    }

    pub(crate) fn enqueue_named(&mut self, t: &TypeRef, name: Name) {
        if self.produced_named_types.contains(&name) || !self.queued_named.insert(name) {
            return;
        }
        debug!("scheduler: enqueue named type '{}'", name);
        self.queue.push_back(WorkItem::Named(t.clone()));
    }

    pub(crate) fn enqueue_tagged_struct(&mut self, t: &TypeRef, tag: Name) {
        if self.produced_struct_tags.contains(&tag) || !self.queued_struct_tags.insert(tag) {
            return;
        }
        debug!("scheduler: enqueue tagged struct/union '{}'", tag);
        self.queue.push_back(WorkItem::TaggedStruct(t.clone()));
    }

    pub(crate) fn enqueue_tagged_enum(&mut self, t: &TypeRef, tag: Name) {
        if self.produced_enum_tags.contains(&tag) || !self.queued_enum_tags.insert(tag) {
            return;
        }
        debug!("scheduler: enqueue tagged enum '{}'", tag);
        self.queue.push_back(WorkItem::TaggedEnum(t.clone()));
    }

    pub(crate) fn pop_work(&mut self) -> Option<WorkItem> {
        self.queue.pop_front()
    }

    /// Marks a declarator produced. Returns false if it already was. Marking
    /// precedes the emission body so self-referential items terminate.
    pub(crate) fn mark_declarator(&mut self, id: DeclId) -> bool {
        self.queued_decls.remove(&id);
        self.produced_declarators.insert(id)
    }

    pub(crate) fn mark_named(&mut self, name: Name) -> bool {
        self.queued_named.remove(&name);
        self.produced_named_types.insert(name)
    }

    pub(crate) fn mark_struct_tag(&mut self, tag: Name) -> bool {
        self.queued_struct_tags.remove(&tag);
        self.produced_struct_tags.insert(tag)
    }

    pub(crate) fn mark_enum_tag(&mut self, tag: Name) -> bool {
        self.queued_enum_tags.remove(&tag);
        self.produced_enum_tags.insert(tag)
    }

    // ============================================================
    // Go type rendering. Rendering a named or tagged type also
    // enqueues it for top-level emission.
    // ============================================================

    pub(crate) fn typ(&mut self, t: &TypeRef, pos: Position) -> Result<String> {
        match &**t {
            Type::Prim(p) => go_prim(*p, pos),
            Type::Pointer(p) => {
                // Pointers render flat, but the pointee's named or tagged
                // definition is still a dependency of this unit.
                match &*p.item {
                    Type::Named(n) => self.enqueue_named(&p.item, n.name),
                    Type::TaggedStruct(tt) | Type::TaggedUnion(tt) => {
                        self.enqueue_tagged_struct(&p.item, tt.tag)
                    }
                    Type::TaggedEnum(tt) => self.enqueue_tagged_enum(&p.item, tt.tag),
                    _ => {}
                }
                Ok("uintptr".into())
            }
            Type::Array(a) => match a.size {
                Some(n) if n >= 0 => Ok(format!("[{}]{}", n, self.typ(&a.item, pos)?)),
                _ => Err(TranslationError::IncompleteType {
                    ty: t.to_string(),
                    pos,
                }),
            },
            Type::Function(f) => {
                let mut s = String::from("func(tls *crt.TLS");
                let single_void = f.params.len() == 1
                    && matches!(
                        &*crate::semantic::underlying(&f.params[0]),
                        Type::Prim(Prim::Void)
                    );
                if !single_void {
                    for p in &f.params {
                        s.push_str(", ");
                        s.push_str(&self.typ(p, pos)?);
                    }
                    if f.variadic {
                        s.push_str(", ...interface{}");
                    }
                }
                s.push(')');
                if !matches!(&*crate::semantic::underlying(&f.result), Type::Prim(Prim::Void)) {
                    s.push(' ');
                    s.push_str(&self.typ(&f.result, pos)?);
                }
                Ok(s)
            }
            Type::Struct(r) => {
                let mut s = String::from("struct {");
                for (i, field) in r.fields.iter().enumerate() {
                    if i != 0 {
                        s.push_str("; ");
                    }
                    let ft = match (&field.packed, field.bits) {
                        (Some(p), b) if b != 0 => p.clone(),
                        _ => field.ty.clone(),
                    };
                    s.push_str(&format!("X{} {}", field.name, self.typ(&ft, pos)?));
                }
                s.push('}');
                Ok(s)
            }
            // Unions are rendered as raw storage; access goes through casts.
            Type::Union(_) => Ok(format!("[{}]byte", t.size_of(pos)?)),
            Type::Enum(e) => self.typ(&e.base, pos),
            Type::Named(n) => {
                self.enqueue_named(t, n.name);
                Ok(format!("T{}", n.name))
            }
            Type::TaggedStruct(tt) | Type::TaggedUnion(tt) => {
                self.enqueue_tagged_struct(t, tt.tag);
                Ok(format!("S{}", tt.tag))
            }
            Type::TaggedEnum(tt) => {
                self.enqueue_tagged_enum(t, tt.tag);
                Ok(format!("E{}", tt.tag))
            }
        }
    }

    /// The Go pointer form `*T` for a variable of type `t`, used in
    /// `unsafe.Pointer` casts and storage comments.
    pub(crate) fn star_typ(&mut self, t: &TypeRef, pos: Position) -> Result<String> {
        Ok(format!("*{}", self.typ(t, pos)?))
    }
}

fn go_prim(p: Prim, pos: Position) -> Result<String> {
    let s = match p {
        Prim::Bool => "uint8",
        Prim::Char | Prim::SChar => "int8",
        Prim::UChar => "uint8",
        Prim::Short => "int16",
        Prim::UShort => "uint16",
        Prim::Int => "int32",
        Prim::UInt => "uint32",
        Prim::Long | Prim::LongLong => "int64",
        Prim::ULong | Prim::ULongLong => "uint64",
        Prim::Float => "float32",
        Prim::Double | Prim::LongDouble => "float64",
        Prim::Void => {
            return Err(TranslationError::UnsupportedConstruct {
                construct: "void object type".into(),
                pos,
            })
        }
    };
    Ok(s.into())
}
