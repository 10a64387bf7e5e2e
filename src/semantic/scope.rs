//! Scope resolution.
//!
//! A scope is a stack of nested namespaces: ordinary identifiers, struct and
//! union tags (one unioned namespace, per the C standard), and enum tags.
//! Lookup walks innermost to outermost; a miss is a normal outcome and
//! supports forward declarations. The translation core only reads scopes;
//! population is the parser's job.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use hashbrown::HashMap;
use log::debug;

use crate::ast::Declarator;
use crate::semantic::types::TypeRef;
use crate::Name;

pub struct Scope {
    parent: Option<Rc<Scope>>,
    idents: RefCell<HashMap<Name, Rc<Declarator>>>,
    record_tags: RefCell<HashMap<Name, TypeRef>>,
    enum_tags: RefCell<HashMap<Name, TypeRef>>,
}

impl Scope {
    /// The file scope of a translation unit.
    pub fn root() -> Rc<Scope> {
        Rc::new(Scope {
            parent: None,
            idents: RefCell::new(HashMap::new()),
            record_tags: RefCell::new(HashMap::new()),
            enum_tags: RefCell::new(HashMap::new()),
        })
    }

    /// A block scope nested in `parent`.
    pub fn child(parent: &Rc<Scope>) -> Rc<Scope> {
        Rc::new(Scope {
            parent: Some(parent.clone()),
            idents: RefCell::new(HashMap::new()),
            record_tags: RefCell::new(HashMap::new()),
            enum_tags: RefCell::new(HashMap::new()),
        })
    }

    pub fn declare_ident(&self, name: impl Into<Name>, d: Rc<Declarator>) {
        let name = name.into();
        debug!("scope: declare ident '{}'", name);
        self.idents.borrow_mut().insert(name, d);
    }

    /// Declares a struct or union tag; the two share one namespace.
    pub fn declare_struct_tag(&self, name: impl Into<Name>, ty: TypeRef) {
        let name = name.into();
        debug!("scope: declare struct/union tag '{}'", name);
        self.record_tags.borrow_mut().insert(name, ty);
    }

    pub fn declare_enum_tag(&self, name: impl Into<Name>, ty: TypeRef) {
        let name = name.into();
        debug!("scope: declare enum tag '{}'", name);
        self.enum_tags.borrow_mut().insert(name, ty);
    }

    pub fn lookup_ident(&self, name: Name) -> Option<Rc<Declarator>> {
        let mut scope = self;
        loop {
            if let Some(d) = scope.idents.borrow().get(&name) {
                return Some(d.clone());
            }
            scope = scope.parent.as_deref()?;
        }
    }

    pub fn lookup_struct_tag(&self, name: Name) -> Option<TypeRef> {
        let mut scope = self;
        loop {
            if let Some(t) = scope.record_tags.borrow().get(&name) {
                return Some(t.clone());
            }
            scope = scope.parent.as_deref()?;
        }
    }

    /// Union tags live in the struct tag namespace.
    pub fn lookup_union_tag(&self, name: Name) -> Option<TypeRef> {
        self.lookup_struct_tag(name)
    }

    pub fn lookup_enum_tag(&self, name: Name) -> Option<TypeRef> {
        let mut scope = self;
        loop {
            if let Some(t) = scope.enum_tags.borrow().get(&name) {
                return Some(t.clone());
            }
            scope = scope.parent.as_deref()?;
        }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("idents", &self.idents.borrow().len())
            .field("record_tags", &self.record_tags.borrow().len())
            .field("enum_tags", &self.enum_tags.borrow().len())
            .field("nested", &self.parent.is_some())
            .finish()
    }
}
