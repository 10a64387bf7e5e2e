//! The consumed syntax tree.
//!
//! Nodes arrive from the external front end with fixed case discriminants and
//! already-resolved operands from constant folding. The translation core
//! reads them; the only state it ever adds is the tagged-type resolution
//! cache inside the type graph and the generator-side extern normalization.

use std::rc::Rc;

use bitflags::bitflags;
use hashbrown::HashMap;
use thin_vec::ThinVec;

use crate::semantic::operand::Operand;
use crate::semantic::scope::Scope;
use crate::semantic::types::TypeRef;
use crate::source::Position;
use crate::Name;

bitflags! {
    /// Storage-class flags recorded by the parser.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StorageFlags: u8 {
        const STATIC = 1 << 0;
        const EXTERN = 1 << 1;
        const TYPEDEF = 1 << 2;
    }
}

/// Whether a declarator's name denotes the same entity across declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    External,
    Internal,
    None,
}

/// Stable identity for a declarator, assigned once by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeclId(pub u32);

/// Unique id of a `case`/`default` label within a switch body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CaseId(pub u32);

#[derive(Debug)]
pub enum Initializer {
    /// An explicit all-zero initializer.
    Zero,
    /// A compile-time constant.
    Const(Operand),
    /// A general expression evaluated at startup.
    Expr(Expr),
}

#[derive(Debug)]
pub struct Declarator {
    pub id: DeclId,
    pub name: Name,
    pub ty: TypeRef,
    pub linkage: Linkage,
    pub storage: StorageFlags,
    pub initializer: Option<Initializer>,
    /// Address observed outside the declaring activation; supplied by the
    /// external escape analysis and treated as immutable here.
    pub address_taken: bool,
    /// Number of reads and writes recorded by the front end.
    pub referenced: u32,
    pub assigned_to: u32,
    pub is_field: bool,
    /// Parameter declarators, for function declarators.
    pub params: ThinVec<Rc<Declarator>>,
    /// Present when this declarator is a defined function.
    pub definition: Option<FunctionDefinition>,
    pub pos: Position,
}

impl Declarator {
    /// A declarator with no storage flags, no initializer and no uses; the
    /// parser fills in the rest.
    pub fn new(id: u32, name: impl Into<Name>, ty: TypeRef, pos: Position) -> Declarator {
        Declarator {
            id: DeclId(id),
            name: name.into(),
            ty,
            linkage: Linkage::None,
            storage: StorageFlags::empty(),
            initializer: None,
            address_taken: false,
            referenced: 0,
            assigned_to: 0,
            is_field: false,
            params: ThinVec::new(),
            definition: None,
            pos,
        }
    }
}

#[derive(Debug)]
pub struct FunctionDefinition {
    /// The function body; always a compound statement.
    pub body: Stmt,
    /// Every block-scope declarator of the body, in declaration order. The
    /// generator hoists them to the function entry.
    pub locals: ThinVec<Rc<Declarator>>,
}

/// One `case`/`default` arm of a switch, pre-collected by the front end.
#[derive(Debug)]
pub struct SwitchCase {
    pub id: CaseId,
    /// The case value; `None` for `default`.
    pub value: Option<Operand>,
}

#[derive(Debug)]
pub enum Stmt {
    /// An expression statement; comma lists arrive flattened.
    Expr(ThinVec<Expr>),
    /// A block-item declaration.
    Decl(Rc<Declarator>),
    Compound(ThinVec<Stmt>),
    If {
        cond: Expr,
        then: Box<Stmt>,
    },
    IfElse {
        cond: Expr,
        then: Box<Stmt>,
        els: Box<Stmt>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },
    For {
        init: ThinVec<Expr>,
        cond: Option<Expr>,
        post: ThinVec<Expr>,
        body: Box<Stmt>,
    },
    Switch {
        expr: Expr,
        /// The promoted type the scrutinee and case values convert to.
        op_ty: TypeRef,
        cases: ThinVec<SwitchCase>,
        body: Box<Stmt>,
    },
    /// A `case`/`default` label inside a switch body; `value` is `None` for
    /// `default`.
    Case {
        id: CaseId,
        value: Option<Operand>,
        stmt: Box<Stmt>,
    },
    Label {
        name: Name,
        stmt: Box<Stmt>,
    },
    Goto {
        name: Name,
    },
    Break,
    Continue,
    Return {
        expr: Option<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    LAnd,
    LOr,
}

#[derive(Debug)]
pub struct Expr {
    pub kind: ExprKind,
    /// The folded (type, value) result from semantic analysis.
    pub operand: Operand,
    pub pos: Position,
}

#[derive(Debug)]
pub enum ExprKind {
    Ident(Rc<Declarator>),
    IntLit,
    FloatLit,
    StrLit,
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Assign(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, ThinVec<Expr>),
    Index(Box<Expr>, Box<Expr>),
    Member(Box<Expr>, Name),
    Deref(Box<Expr>),
    AddrOf(Box<Expr>),
    Cast(TypeRef, Box<Expr>),
    Cond(Box<Expr>, Box<Expr>, Box<Expr>),
    Comma(ThinVec<Expr>),
}

impl Expr {
    pub fn new(kind: ExprKind, operand: Operand, pos: Position) -> Expr {
        Expr { kind, operand, pos }
    }

    pub fn ident(d: &Rc<Declarator>, pos: Position) -> Expr {
        Expr {
            kind: ExprKind::Ident(d.clone()),
            operand: Operand::new(d.ty.clone(), None),
            pos,
        }
    }

    pub fn int_lit(v: i64, ty: TypeRef, pos: Position) -> Expr {
        Expr {
            kind: ExprKind::IntLit,
            operand: Operand::new(ty, Some(crate::semantic::Value::Int(v))),
            pos,
        }
    }
}

/// One parsed translation unit, as handed over by the front end.
#[derive(Debug)]
pub struct TranslationUnit {
    /// Top-level variable and function declarators, in source order.
    pub decls: ThinVec<Rc<Declarator>>,
    /// The file scope.
    pub scope: Rc<Scope>,
    /// Interned string constants referenced by operands.
    pub strings: HashMap<Name, Vec<u8>>,
}

impl TranslationUnit {
    pub fn new(scope: Rc<Scope>) -> TranslationUnit {
        TranslationUnit {
            decls: ThinVec::new(),
            scope,
            strings: HashMap::new(),
        }
    }
}
