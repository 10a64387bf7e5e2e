//! The C type algebra.
//!
//! Types form a closed variant set; equality, compatibility and assignment
//! conversion are total functions over the full pairwise matrix. Exhaustive
//! matching replaces the policy of treating an unhandled combination as an
//! internal error: adding a variant forces every query to decide its rules.
//!
//! Invariants:
//! - a named type never participates in structural comparison on its own
//!   identity; comparisons unwrap to the aliased type
//! - a tagged type's resolution is memoized for the node's lifetime and is
//!   never re-performed, even if the enclosing scope changes afterwards

use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;

use thin_vec::ThinVec;

use crate::error::{Result, TranslationError};
use crate::options::Options;
use crate::semantic::operand::{Operand, Value};
use crate::semantic::scope::Scope;
use crate::source::Position;
use crate::Name;

/// Shared handle to a type node.
pub type TypeRef = Rc<Type>;

/// Primitive type kinds, with signedness baked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prim {
    Bool,
    Char,
    SChar,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,
    Float,
    Double,
    LongDouble,
    Void,
}

impl Prim {
    pub fn is_integer(self) -> bool {
        !matches!(self, Prim::Float | Prim::Double | Prim::LongDouble | Prim::Void)
    }

    pub fn is_float(self) -> bool {
        matches!(self, Prim::Float | Prim::Double | Prim::LongDouble)
    }

    pub fn is_arithmetic(self) -> bool {
        self != Prim::Void
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            Prim::Bool | Prim::UChar | Prim::UShort | Prim::UInt | Prim::ULong | Prim::ULongLong
        )
    }

    pub fn is_signed(self) -> bool {
        self.is_integer() && !self.is_unsigned()
    }

    /// Size in bytes under the LP64 target model.
    pub fn size(self) -> u64 {
        match self {
            Prim::Void => 0,
            Prim::Bool | Prim::Char | Prim::SChar | Prim::UChar => 1,
            Prim::Short | Prim::UShort => 2,
            Prim::Int | Prim::UInt | Prim::Float => 4,
            Prim::Long | Prim::ULong | Prim::LongLong | Prim::ULongLong => 8,
            Prim::Double | Prim::LongDouble => 8,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Prim::Bool => "bool",
            Prim::Char => "char",
            Prim::SChar => "signed char",
            Prim::UChar => "unsigned char",
            Prim::Short => "short",
            Prim::UShort => "unsigned short",
            Prim::Int => "int",
            Prim::UInt => "unsigned",
            Prim::Long => "long",
            Prim::ULong => "unsigned long",
            Prim::LongLong => "long long",
            Prim::ULongLong => "unsigned long long",
            Prim::Float => "float",
            Prim::Double => "double",
            Prim::LongDouble => "long double",
            Prim::Void => "void",
        }
    }
}

/// Discriminant returned by `Type::kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Bool,
    Char,
    SChar,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,
    Float,
    Double,
    LongDouble,
    Void,
    Array,
    Enum,
    Function,
    Ptr,
    Struct,
    Union,
}

impl Prim {
    fn kind(self) -> TypeKind {
        match self {
            Prim::Bool => TypeKind::Bool,
            Prim::Char => TypeKind::Char,
            Prim::SChar => TypeKind::SChar,
            Prim::UChar => TypeKind::UChar,
            Prim::Short => TypeKind::Short,
            Prim::UShort => TypeKind::UShort,
            Prim::Int => TypeKind::Int,
            Prim::UInt => TypeKind::UInt,
            Prim::Long => TypeKind::Long,
            Prim::ULong => TypeKind::ULong,
            Prim::LongLong => TypeKind::LongLong,
            Prim::ULongLong => TypeKind::ULongLong,
            Prim::Float => TypeKind::Float,
            Prim::Double => TypeKind::Double,
            Prim::LongDouble => TypeKind::LongDouble,
            Prim::Void => TypeKind::Void,
        }
    }
}

/// A struct/union field.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: Name,
    pub ty: TypeRef,
    /// Bit-field width; 0 means not a bit-field.
    pub bits: u8,
    /// Bits != 0: the underlying storage type used to pack the field.
    pub packed: Option<TypeRef>,
}

impl Field {
    pub fn new(name: impl Into<Name>, ty: TypeRef) -> Field {
        Field {
            name: name.into(),
            ty,
            bits: 0,
            packed: None,
        }
    }

    pub fn bit_field(name: impl Into<Name>, ty: TypeRef, bits: u8, packed: TypeRef) -> Field {
        Field {
            name: name.into(),
            ty,
            bits,
            packed: Some(packed),
        }
    }

    fn equal(&self, other: &Field) -> bool {
        self.name == other.name && self.ty.equal(&other.ty) && self.bits == other.bits
    }

    fn storage_ty(&self) -> &TypeRef {
        match (&self.packed, self.bits) {
            (Some(p), b) if b != 0 => p,
            _ => &self.ty,
        }
    }
}

#[derive(Debug)]
pub struct PointerType {
    pub item: TypeRef,
}

#[derive(Debug)]
pub struct ArrayType {
    pub item: TypeRef,
    /// Statically known element count, when the declaration carries one.
    pub size: Option<i64>,
}

#[derive(Debug)]
pub struct FunctionType {
    pub params: ThinVec<TypeRef>,
    pub result: TypeRef,
    pub variadic: bool,
}

#[derive(Debug)]
pub struct RecordType {
    pub fields: ThinVec<Field>,
}

#[derive(Debug, Clone)]
pub struct EnumConstant {
    pub name: Name,
    pub value: i64,
}

#[derive(Debug)]
pub struct EnumType {
    /// Underlying integer type.
    pub base: TypeRef,
    pub enums: ThinVec<EnumConstant>,
}

/// A typedef name: a transparent alias for the aliased type.
#[derive(Debug)]
pub struct NamedType {
    pub name: Name,
    pub ty: TypeRef,
}

/// A struct/union/enum identified by its declared tag.
///
/// Resolution state machine: `Unresolved` until the first query that needs
/// the backing type looks the tag up in the recorded scope. A failed lookup
/// leaves the node unresolved (forward declarations are a normal outcome); a
/// successful one is cached permanently in the single-assignment cell.
pub struct TaggedType {
    pub tag: Name,
    scope: Rc<Scope>,
    resolved: OnceCell<TypeRef>,
}

impl TaggedType {
    pub fn new(tag: impl Into<Name>, scope: Rc<Scope>) -> TaggedType {
        TaggedType {
            tag: tag.into(),
            scope,
            resolved: OnceCell::new(),
        }
    }

    /// A tagged node whose backing type is already known.
    pub fn with_backing(tag: impl Into<Name>, ty: TypeRef) -> TaggedType {
        let resolved = OnceCell::new();
        let _ = resolved.set(ty);
        TaggedType {
            tag: tag.into(),
            scope: Scope::root(),
            resolved,
        }
    }

    /// Backing type of a struct/union tag, memoized on first success.
    pub fn resolve_record(&self) -> Option<TypeRef> {
        if let Some(t) = self.resolved.get() {
            return Some(t.clone());
        }
        let t = self.scope.lookup_struct_tag(self.tag)?;
        let _ = self.resolved.set(t.clone());
        Some(t)
    }

    /// Backing type of an enum tag, memoized on first success.
    pub fn resolve_enum(&self) -> Option<TypeRef> {
        if let Some(t) = self.resolved.get() {
            return Some(t.clone());
        }
        let t = self.scope.lookup_enum_tag(self.tag)?;
        let _ = self.resolved.set(t.clone());
        Some(t)
    }
}

impl fmt::Debug for TaggedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaggedType")
            .field("tag", &self.tag)
            .field("resolved", &self.resolved.get().is_some())
            .finish()
    }
}

/// A C type. The variant set is closed; every query matches exhaustively.
#[derive(Debug)]
pub enum Type {
    Prim(Prim),
    Pointer(PointerType),
    Array(ArrayType),
    Function(FunctionType),
    Struct(RecordType),
    Union(RecordType),
    Enum(EnumType),
    TaggedStruct(TaggedType),
    TaggedUnion(TaggedType),
    TaggedEnum(TaggedType),
    Named(NamedType),
}

impl Type {
    pub fn prim(p: Prim) -> TypeRef {
        Rc::new(Type::Prim(p))
    }

    pub fn pointer(item: TypeRef) -> TypeRef {
        Rc::new(Type::Pointer(PointerType { item }))
    }

    pub fn array(item: TypeRef, size: Option<i64>) -> TypeRef {
        Rc::new(Type::Array(ArrayType { item, size }))
    }

    pub fn function(
        params: impl IntoIterator<Item = TypeRef>,
        result: TypeRef,
        variadic: bool,
    ) -> TypeRef {
        Rc::new(Type::Function(FunctionType {
            params: params.into_iter().collect(),
            result,
            variadic,
        }))
    }

    pub fn struct_type(fields: impl IntoIterator<Item = Field>) -> TypeRef {
        Rc::new(Type::Struct(RecordType {
            fields: fields.into_iter().collect(),
        }))
    }

    pub fn union_type(fields: impl IntoIterator<Item = Field>) -> TypeRef {
        Rc::new(Type::Union(RecordType {
            fields: fields.into_iter().collect(),
        }))
    }

    pub fn enumeration(base: TypeRef, enums: impl IntoIterator<Item = EnumConstant>) -> TypeRef {
        Rc::new(Type::Enum(EnumType {
            base,
            enums: enums.into_iter().collect(),
        }))
    }

    pub fn named(name: impl Into<Name>, ty: TypeRef) -> TypeRef {
        Rc::new(Type::Named(NamedType { name: name.into(), ty }))
    }

    pub fn tagged_struct(tag: impl Into<Name>, scope: Rc<Scope>) -> TypeRef {
        Rc::new(Type::TaggedStruct(TaggedType::new(tag, scope)))
    }

    pub fn tagged_union(tag: impl Into<Name>, scope: Rc<Scope>) -> TypeRef {
        Rc::new(Type::TaggedUnion(TaggedType::new(tag, scope)))
    }

    pub fn tagged_enum(tag: impl Into<Name>, scope: Rc<Scope>) -> TypeRef {
        Rc::new(Type::TaggedEnum(TaggedType::new(tag, scope)))
    }

    pub fn kind(&self) -> TypeKind {
        match self {
            Type::Prim(p) => p.kind(),
            Type::Pointer(_) => TypeKind::Ptr,
            Type::Array(_) => TypeKind::Array,
            Type::Function(_) => TypeKind::Function,
            Type::Struct(_) | Type::TaggedStruct(_) => TypeKind::Struct,
            Type::Union(_) | Type::TaggedUnion(_) => TypeKind::Union,
            Type::Enum(_) => TypeKind::Enum,
            // Tagged enums answer as their underlying integer type.
            Type::TaggedEnum(_) => TypeKind::Int,
            Type::Named(n) => n.ty.kind(),
        }
    }

    pub fn equal(&self, other: &Type) -> bool {
        match self {
            Type::Prim(p) => match other {
                Type::Prim(q) => p == q,
                Type::Named(n) => self.equal(&n.ty),
                Type::Pointer(_)
                | Type::Array(_)
                | Type::Function(_)
                | Type::Struct(_)
                | Type::Union(_)
                | Type::Enum(_)
                | Type::TaggedStruct(_)
                | Type::TaggedUnion(_)
                | Type::TaggedEnum(_) => false,
            },
            Type::Pointer(t) => match other {
                Type::Pointer(o) => t.item.equal(&o.item),
                Type::Named(n) => self.equal(&n.ty),
                Type::Prim(_)
                | Type::Array(_)
                | Type::Function(_)
                | Type::Struct(_)
                | Type::Union(_)
                | Type::Enum(_)
                | Type::TaggedStruct(_)
                | Type::TaggedUnion(_)
                | Type::TaggedEnum(_) => false,
            },
            Type::Array(t) => match other {
                Type::Array(o) => {
                    t.item.equal(&o.item)
                        && match (t.size, o.size) {
                            (Some(a), Some(b)) => a == b,
                            (None, None) => true,
                            (Some(_), None) | (None, Some(_)) => false,
                        }
                }
                Type::Named(n) => self.equal(&n.ty),
                Type::Prim(_)
                | Type::Pointer(_)
                | Type::Function(_)
                | Type::Struct(_)
                | Type::Union(_)
                | Type::Enum(_)
                | Type::TaggedStruct(_)
                | Type::TaggedUnion(_)
                | Type::TaggedEnum(_) => false,
            },
            Type::Function(t) => match other {
                Type::Function(o) => {
                    t.params.len() == o.params.len()
                        && t.variadic == o.variadic
                        && t.result.equal(&o.result)
                        && t.params.iter().zip(o.params.iter()).all(|(a, b)| a.equal(b))
                }
                Type::Named(n) => self.equal(&n.ty),
                Type::Prim(_)
                | Type::Pointer(_)
                | Type::Array(_)
                | Type::Struct(_)
                | Type::Union(_)
                | Type::Enum(_)
                | Type::TaggedStruct(_)
                | Type::TaggedUnion(_)
                | Type::TaggedEnum(_) => false,
            },
            Type::Struct(t) => match other {
                Type::Struct(o) => fields_equal(&t.fields, &o.fields),
                Type::TaggedStruct(o) => match o.resolve_record() {
                    Some(b) => self.equal(&b),
                    None => false,
                },
                Type::Named(n) => self.equal(&n.ty),
                Type::Prim(_)
                | Type::Pointer(_)
                | Type::Array(_)
                | Type::Function(_)
                | Type::Union(_)
                | Type::Enum(_)
                | Type::TaggedUnion(_)
                | Type::TaggedEnum(_) => false,
            },
            Type::Union(t) => match other {
                Type::Union(o) => fields_equal(&t.fields, &o.fields),
                Type::TaggedUnion(o) => match o.resolve_record() {
                    Some(b) => self.equal(&b),
                    None => false,
                },
                Type::Named(n) => self.equal(&n.ty),
                Type::Prim(_)
                | Type::Pointer(_)
                | Type::Array(_)
                | Type::Function(_)
                | Type::Struct(_)
                | Type::Enum(_)
                | Type::TaggedStruct(_)
                | Type::TaggedEnum(_) => false,
            },
            Type::Enum(t) => match other {
                Type::Enum(o) => {
                    t.base.equal(&o.base)
                        && t.enums.len() == o.enums.len()
                        && t.enums
                            .iter()
                            .zip(o.enums.iter())
                            .all(|(a, b)| a.name == b.name && a.value == b.value)
                }
                Type::TaggedEnum(o) => match o.resolve_enum() {
                    Some(b) => self.equal(&b),
                    None => false,
                },
                Type::Named(n) => self.equal(&n.ty),
                Type::Prim(_)
                | Type::Pointer(_)
                | Type::Array(_)
                | Type::Function(_)
                | Type::Struct(_)
                | Type::Union(_)
                | Type::TaggedStruct(_)
                | Type::TaggedUnion(_) => false,
            },
            Type::TaggedStruct(t) => match other {
                // Tag identity shortcut, valid even before resolution.
                Type::TaggedStruct(o) if t.tag == o.tag => true,
                Type::Named(n) => self.equal(&n.ty),
                Type::Prim(_)
                | Type::Pointer(_)
                | Type::Array(_)
                | Type::Function(_)
                | Type::Struct(_)
                | Type::Union(_)
                | Type::Enum(_)
                | Type::TaggedStruct(_)
                | Type::TaggedUnion(_)
                | Type::TaggedEnum(_) => match t.resolve_record() {
                    Some(b) => b.equal(other),
                    None => false,
                },
            },
            Type::TaggedUnion(t) => match other {
                Type::TaggedUnion(o) if t.tag == o.tag => true,
                Type::Named(n) => self.equal(&n.ty),
                Type::Prim(_)
                | Type::Pointer(_)
                | Type::Array(_)
                | Type::Function(_)
                | Type::Struct(_)
                | Type::Union(_)
                | Type::Enum(_)
                | Type::TaggedStruct(_)
                | Type::TaggedUnion(_)
                | Type::TaggedEnum(_) => match t.resolve_record() {
                    Some(b) => b.equal(other),
                    None => false,
                },
            },
            Type::TaggedEnum(t) => match other {
                // Tag identity only; enum tags never compare structurally.
                Type::TaggedEnum(o) => t.tag == o.tag,
                Type::Named(n) => self.equal(&n.ty),
                Type::Prim(_)
                | Type::Pointer(_)
                | Type::Array(_)
                | Type::Function(_)
                | Type::Struct(_)
                | Type::Union(_)
                | Type::Enum(_)
                | Type::TaggedStruct(_)
                | Type::TaggedUnion(_) => match t.resolve_enum() {
                    Some(b) => b.equal(other),
                    None => false,
                },
            },
            Type::Named(t) => match other {
                Type::Named(o) => t.name == o.name && t.ty.equal(&o.ty),
                Type::Prim(_)
                | Type::Pointer(_)
                | Type::Array(_)
                | Type::Function(_)
                | Type::Struct(_)
                | Type::Union(_)
                | Type::Enum(_)
                | Type::TaggedStruct(_)
                | Type::TaggedUnion(_)
                | Type::TaggedEnum(_) => t.ty.equal(other),
            },
        }
    }

    /// Compatibility per C99 6.2.7; weaker than equality.
    pub fn is_compatible(&self, other: &Type) -> bool {
        match self {
            Type::Prim(p) => match other {
                Type::Prim(q) => p == q,
                Type::Named(n) => self.is_compatible(&n.ty),
                Type::Enum(o) => self.is_compatible(&o.base),
                Type::TaggedEnum(o) => match o.resolve_enum() {
                    Some(b) => self.is_compatible(&b),
                    None => false,
                },
                Type::Pointer(_)
                | Type::Array(_)
                | Type::Function(_)
                | Type::Struct(_)
                | Type::Union(_)
                | Type::TaggedStruct(_)
                | Type::TaggedUnion(_) => false,
            },
            Type::Pointer(t) => {
                if self.equal(other) {
                    return true;
                }
                match other {
                    Type::Named(n) => self.is_compatible(&n.ty),
                    // A pointer to void converts to or from a pointer to any
                    // incomplete or object type (C99 6.3.2.3).
                    Type::Pointer(o) => {
                        is_void(&t.item) || is_void(&o.item) || t.item.is_compatible(&o.item)
                    }
                    Type::Prim(_)
                    | Type::Array(_)
                    | Type::Function(_)
                    | Type::Struct(_)
                    | Type::Union(_)
                    | Type::Enum(_)
                    | Type::TaggedStruct(_)
                    | Type::TaggedUnion(_)
                    | Type::TaggedEnum(_) => false,
                }
            }
            Type::Array(t) => match other {
                // Compatible element types; when both sizes are known they
                // must agree, an unknown size is compatible with any
                // (C99 6.7.5.2).
                Type::Array(o) => {
                    t.item.is_compatible(&o.item)
                        && match (t.size, o.size) {
                            (Some(a), Some(b)) => a == b,
                            (None, _) | (_, None) => true,
                        }
                }
                Type::Named(n) => self.is_compatible(&n.ty),
                Type::Prim(_)
                | Type::Pointer(_)
                | Type::Function(_)
                | Type::Struct(_)
                | Type::Union(_)
                | Type::Enum(_)
                | Type::TaggedStruct(_)
                | Type::TaggedUnion(_)
                | Type::TaggedEnum(_) => false,
            },
            Type::Function(t) => match other {
                Type::Function(o) => {
                    t.params.len() == o.params.len()
                        && t.variadic == o.variadic
                        && t.result.is_compatible(&o.result)
                        && t.params
                            .iter()
                            .zip(o.params.iter())
                            .all(|(a, b)| a.is_compatible(b))
                }
                Type::Named(n) => self.is_compatible(&n.ty),
                Type::Prim(_)
                | Type::Pointer(_)
                | Type::Array(_)
                | Type::Struct(_)
                | Type::Union(_)
                | Type::Enum(_)
                | Type::TaggedStruct(_)
                | Type::TaggedUnion(_)
                | Type::TaggedEnum(_) => false,
            },
            // Record compatibility collapses to equality in this model.
            Type::Struct(_) | Type::Union(_) | Type::TaggedStruct(_) | Type::TaggedUnion(_) => {
                self.equal(other)
            }
            Type::Enum(t) => match other {
                Type::Enum(_) | Type::TaggedEnum(_) => self.equal(other),
                Type::Prim(_) => t.base.is_compatible(other),
                Type::Named(n) => self.is_compatible(&n.ty),
                Type::Pointer(_)
                | Type::Array(_)
                | Type::Function(_)
                | Type::Struct(_)
                | Type::Union(_)
                | Type::TaggedStruct(_)
                | Type::TaggedUnion(_) => false,
            },
            Type::TaggedEnum(t) => match other {
                Type::Enum(_) | Type::TaggedEnum(_) => self.equal(other),
                Type::Prim(_) => match t.resolve_enum() {
                    Some(b) => b.is_compatible(other),
                    None => false,
                },
                Type::Named(n) => self.is_compatible(&n.ty),
                Type::Pointer(_)
                | Type::Array(_)
                | Type::Function(_)
                | Type::Struct(_)
                | Type::Union(_)
                | Type::TaggedStruct(_)
                | Type::TaggedUnion(_) => false,
            },
            Type::Named(t) => t.ty.is_compatible(other),
        }
    }

    pub fn is_arithmetic_type(&self) -> bool {
        match self {
            Type::Prim(p) => p.is_arithmetic(),
            Type::Enum(_) | Type::TaggedEnum(_) => true,
            Type::Named(n) => n.ty.is_arithmetic_type(),
            Type::Pointer(_)
            | Type::Array(_)
            | Type::Function(_)
            | Type::Struct(_)
            | Type::Union(_)
            | Type::TaggedStruct(_)
            | Type::TaggedUnion(_) => false,
        }
    }

    pub fn is_integer_type(&self) -> bool {
        match self {
            Type::Prim(p) => p.is_integer(),
            Type::Enum(_) | Type::TaggedEnum(_) => true,
            Type::Named(n) => n.ty.is_integer_type(),
            Type::Pointer(_)
            | Type::Array(_)
            | Type::Function(_)
            | Type::Struct(_)
            | Type::Union(_)
            | Type::TaggedStruct(_)
            | Type::TaggedUnion(_) => false,
        }
    }

    pub fn is_scalar_type(&self) -> bool {
        match self {
            Type::Prim(p) => p.is_arithmetic(),
            Type::Pointer(_) => true,
            Type::Enum(_) | Type::TaggedEnum(_) => true,
            Type::Named(n) => n.ty.is_scalar_type(),
            Type::Array(_)
            | Type::Function(_)
            | Type::Struct(_)
            | Type::Union(_)
            | Type::TaggedStruct(_)
            | Type::TaggedUnion(_) => false,
        }
    }

    pub fn is_pointer_type(&self) -> bool {
        match self {
            Type::Pointer(_) => true,
            Type::Named(n) => n.ty.is_pointer_type(),
            Type::Prim(_)
            | Type::Array(_)
            | Type::Function(_)
            | Type::Struct(_)
            | Type::Union(_)
            | Type::Enum(_)
            | Type::TaggedStruct(_)
            | Type::TaggedUnion(_)
            | Type::TaggedEnum(_) => false,
        }
    }

    pub fn is_unsigned(&self) -> bool {
        match self {
            Type::Prim(p) => p.is_unsigned(),
            // Pointers compare and convert as unsigned addresses.
            Type::Pointer(_) => true,
            Type::Enum(e) => e.base.is_unsigned(),
            Type::TaggedEnum(t) => match t.resolve_enum() {
                Some(b) => b.is_unsigned(),
                None => false,
            },
            Type::Named(n) => n.ty.is_unsigned(),
            Type::Array(_)
            | Type::Function(_)
            | Type::Struct(_)
            | Type::Union(_)
            | Type::TaggedStruct(_)
            | Type::TaggedUnion(_) => false,
        }
    }

    pub fn is_void_pointer_type(&self) -> bool {
        match self {
            Type::Pointer(t) => is_void(&t.item),
            Type::Named(n) => n.ty.is_void_pointer_type(),
            Type::Prim(_)
            | Type::Array(_)
            | Type::Function(_)
            | Type::Struct(_)
            | Type::Union(_)
            | Type::Enum(_)
            | Type::TaggedStruct(_)
            | Type::TaggedUnion(_)
            | Type::TaggedEnum(_) => false,
        }
    }

    /// Size in bytes under the LP64 target model.
    pub fn size_of(&self, pos: Position) -> Result<u64> {
        match self {
            Type::Prim(Prim::Void) => Err(TranslationError::IncompleteType {
                ty: self.to_string(),
                pos,
            }),
            Type::Prim(p) => Ok(p.size()),
            Type::Pointer(_) => Ok(8),
            Type::Array(t) => match t.size {
                Some(n) if n >= 0 => Ok(t.item.size_of(pos)? * n as u64),
                _ => Err(TranslationError::IncompleteType {
                    ty: self.to_string(),
                    pos,
                }),
            },
            Type::Function(_) => Err(TranslationError::UnsupportedConstruct {
                construct: "size of function type".into(),
                pos,
            }),
            Type::Struct(r) => {
                let mut offset = 0u64;
                let mut align = 1u64;
                for f in &r.fields {
                    let t = f.storage_ty();
                    let fa = t.align_of(pos)?;
                    let fs = t.size_of(pos)?;
                    align = align.max(fa);
                    offset = round_up(offset, fa) + fs;
                }
                Ok(round_up(offset, align))
            }
            Type::Union(r) => {
                let mut size = 0u64;
                let mut align = 1u64;
                for f in &r.fields {
                    let t = f.storage_ty();
                    size = size.max(t.size_of(pos)?);
                    align = align.max(t.align_of(pos)?);
                }
                Ok(round_up(size, align))
            }
            Type::Enum(e) => e.base.size_of(pos),
            Type::TaggedStruct(t) | Type::TaggedUnion(t) => match t.resolve_record() {
                Some(b) => b.size_of(pos),
                None => Err(TranslationError::IncompleteType {
                    ty: self.to_string(),
                    pos,
                }),
            },
            Type::TaggedEnum(t) => match t.resolve_enum() {
                Some(b) => b.size_of(pos),
                None => Err(TranslationError::IncompleteType {
                    ty: self.to_string(),
                    pos,
                }),
            },
            Type::Named(n) => n.ty.size_of(pos),
        }
    }

    pub fn align_of(&self, pos: Position) -> Result<u64> {
        match self {
            Type::Prim(Prim::Void) => Err(TranslationError::IncompleteType {
                ty: self.to_string(),
                pos,
            }),
            Type::Prim(p) => Ok(p.size().max(1)),
            Type::Pointer(_) => Ok(8),
            Type::Array(t) => t.item.align_of(pos),
            Type::Function(_) => Err(TranslationError::UnsupportedConstruct {
                construct: "alignment of function type".into(),
                pos,
            }),
            Type::Struct(r) | Type::Union(r) => {
                let mut align = 1u64;
                for f in &r.fields {
                    align = align.max(f.storage_ty().align_of(pos)?);
                }
                Ok(align)
            }
            Type::Enum(e) => e.base.align_of(pos),
            Type::TaggedStruct(t) | Type::TaggedUnion(t) => match t.resolve_record() {
                Some(b) => b.align_of(pos),
                None => Err(TranslationError::IncompleteType {
                    ty: self.to_string(),
                    pos,
                }),
            },
            Type::TaggedEnum(t) => match t.resolve_enum() {
                Some(b) => b.align_of(pos),
                None => Err(TranslationError::IncompleteType {
                    ty: self.to_string(),
                    pos,
                }),
            },
            Type::Named(n) => n.ty.align_of(pos),
        }
    }
}

fn fields_equal(a: &[Field], b: &[Field]) -> bool {
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equal(y))
}

fn is_void(t: &TypeRef) -> bool {
    matches!(&*underlying(t), Type::Prim(Prim::Void))
}

pub(crate) fn round_up(n: u64, align: u64) -> u64 {
    (n + align - 1) / align * align
}

/// The concrete type behind aliases and resolvable tags. An unresolved tag
/// returns its own stub.
pub fn underlying(t: &TypeRef) -> TypeRef {
    let mut cur = t.clone();
    loop {
        let next = match &*cur {
            Type::Named(n) => n.ty.clone(),
            Type::TaggedStruct(tt) | Type::TaggedUnion(tt) => match tt.resolve_record() {
                Some(b) => b,
                None => return cur,
            },
            Type::TaggedEnum(tt) => match tt.resolve_enum() {
                Some(b) => b,
                None => return cur,
            },
            Type::Prim(_)
            | Type::Pointer(_)
            | Type::Array(_)
            | Type::Function(_)
            | Type::Struct(_)
            | Type::Union(_)
            | Type::Enum(_) => return cur,
        };
        cur = next;
    }
}

/// The type of an expression used as a function argument (C99 6.9.1-10):
/// arrays decay to a pointer to their element type.
pub fn adjusted_parameter_type(t: &TypeRef) -> TypeRef {
    let mut cur = t.clone();
    loop {
        match &*cur {
            Type::Array(a) => return Type::pointer(a.item.clone()),
            Type::Named(n) => cur = n.ty.clone(),
            Type::Prim(_)
            | Type::Pointer(_)
            | Type::Function(_)
            | Type::Struct(_)
            | Type::Union(_)
            | Type::Enum(_)
            | Type::TaggedStruct(_)
            | Type::TaggedUnion(_)
            | Type::TaggedEnum(_) => return t.clone(),
        }
    }
}

fn is_record(t: &TypeRef) -> bool {
    matches!(
        &**t,
        Type::Struct(_) | Type::Union(_) | Type::TaggedStruct(_) | Type::TaggedUnion(_)
    )
}

/// The constrained-assignment rule (C99 6.5.16.1). Never coerces silently:
/// a combination outside the rule set is a fatal error.
pub fn assign_from(target: &TypeRef, opts: &Options, op: &Operand, pos: Position) -> Result<Operand> {
    if let Type::Named(n) = &**target {
        return assign_from(&n.ty, opts, op, pos);
    }

    // Arithmetic target, arithmetic source: numeric conversion.
    if target.is_arithmetic_type() && op.ty.is_arithmetic_type() {
        return Ok(op.convert_to(target));
    }

    if target.is_pointer_type() {
        // Leniency for code relying on non-conforming implicit conversions.
        if opts.enable_pointer_compatibility && op.ty.is_pointer_type() {
            return Ok(op.convert_to(target));
        }
        // Pointers to compatible types.
        if op.ty.is_pointer_type() && target.is_compatible(&op.ty) {
            return Ok(op.convert_to(target));
        }
        // Null pointer constant.
        if op.is_null_ptr_const() {
            return Ok(Operand::new(target.clone(), Some(Value::Null)));
        }
    }

    // Structure or union type compatible with the source.
    let tu = underlying(target);
    let su = underlying(&op.ty);
    if is_record(&tu) && is_record(&su) && tu.is_compatible(&su) {
        return Ok(Operand::new(target.clone(), op.value.clone()));
    }

    Err(TranslationError::InvalidAssignment {
        target: target.to_string(),
        from: op.ty.to_string(),
        pos,
    })
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Prim(p) => write!(f, "{}", p.name()),
            Type::Pointer(t) => write!(f, "pointer to {}", t.item),
            Type::Array(t) => match t.size {
                Some(n) => write!(f, "array {} of {}", n, t.item),
                None => write!(f, "array of {}", t.item),
            },
            Type::Function(t) => {
                write!(f, "function (")?;
                for (i, p) in t.params.iter().enumerate() {
                    if i != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ") returning {}", t.result)
            }
            Type::Struct(r) => write_record(f, "struct", r),
            Type::Union(r) => write_record(f, "union", r),
            Type::Enum(e) => write!(f, "{} enumeration", e.base),
            Type::TaggedStruct(t) => write!(f, "struct {}", t.tag),
            Type::TaggedUnion(t) => write!(f, "union {}", t.tag),
            Type::TaggedEnum(t) => write!(f, "enum {}", t.tag),
            Type::Named(n) => write!(f, "{}", n.name),
        }
    }
}

fn write_record(f: &mut fmt::Formatter<'_>, kw: &str, r: &RecordType) -> fmt::Result {
    write!(f, "{}{{", kw)?;
    for (i, field) in r.fields.iter().enumerate() {
        if i != 0 {
            write!(f, "; ")?;
        }
        write!(f, "{} {}", field.name, field.ty)?;
        if field.bits != 0 {
            write!(f, ".{}", field.bits)?;
        }
    }
    write!(f, "}}")
}
