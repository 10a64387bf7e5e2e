use std::rc::Rc;

use crate::ast::Declarator;
use crate::semantic::scope::Scope;
use crate::semantic::types::{Field, Prim, Type};
use crate::source::Position;
use crate::Name;

fn int_decl(id: u32, name: &str) -> Rc<Declarator> {
    Rc::new(Declarator::new(
        id,
        name,
        Type::prim(Prim::Int),
        Position::new(1, 1),
    ))
}

#[test]
fn lookup_misses_are_normal() {
    let scope = Scope::root();
    assert!(scope.lookup_ident(Name::from("x")).is_none());
    assert!(scope.lookup_struct_tag(Name::from("s")).is_none());
    assert!(scope.lookup_enum_tag(Name::from("e")).is_none());
}

#[test]
fn innermost_match_wins() {
    let outer = Scope::root();
    let inner = Scope::child(&outer);
    let outer_def = Type::struct_type(vec![Field::new("a", Type::prim(Prim::Int))]);
    let inner_def = Type::struct_type(vec![Field::new("b", Type::prim(Prim::Char))]);
    outer.declare_struct_tag("s", outer_def.clone());
    inner.declare_struct_tag("s", inner_def.clone());

    let from_inner = inner.lookup_struct_tag(Name::from("s")).unwrap();
    assert!(from_inner.equal(&inner_def));
    let from_outer = outer.lookup_struct_tag(Name::from("s")).unwrap();
    assert!(from_outer.equal(&outer_def));
}

#[test]
fn lookup_walks_to_outer_scopes() {
    let outer = Scope::root();
    let inner = Scope::child(&outer);
    outer.declare_struct_tag("s", Type::struct_type(vec![]));
    assert!(inner.lookup_struct_tag(Name::from("s")).is_some());

    outer.declare_ident("x", int_decl(1, "x"));
    assert!(inner.lookup_ident(Name::from("x")).is_some());
}

#[test]
fn struct_and_union_tags_share_a_namespace() {
    let scope = Scope::root();
    scope.declare_struct_tag("u", Type::union_type(vec![]));
    assert!(scope.lookup_union_tag(Name::from("u")).is_some());
    assert!(scope.lookup_struct_tag(Name::from("u")).is_some());
}

#[test]
fn enum_tags_are_a_separate_namespace() {
    let scope = Scope::root();
    scope.declare_enum_tag("e", Type::enumeration(Type::prim(Prim::Int), vec![]));
    assert!(scope.lookup_enum_tag(Name::from("e")).is_some());
    assert!(scope.lookup_struct_tag(Name::from("e")).is_none());

    scope.declare_struct_tag("s", Type::struct_type(vec![]));
    assert!(scope.lookup_enum_tag(Name::from("s")).is_none());
}

#[test]
fn identifier_namespace_is_independent_of_tags() {
    let scope = Scope::root();
    scope.declare_struct_tag("x", Type::struct_type(vec![]));
    assert!(scope.lookup_ident(Name::from("x")).is_none());

    scope.declare_ident("x", int_decl(1, "x"));
    assert!(scope.lookup_ident(Name::from("x")).is_some());
}
