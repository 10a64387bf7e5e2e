use crate::options::Options;
use crate::semantic::operand::{Operand, Value};
use crate::semantic::scope::Scope;
use crate::semantic::types::*;
use crate::source::Position;

fn pos() -> Position {
    Position::new(1, 1)
}

fn int() -> TypeRef {
    Type::prim(Prim::Int)
}

fn ch() -> TypeRef {
    Type::prim(Prim::Char)
}

fn dbl() -> TypeRef {
    Type::prim(Prim::Double)
}

fn void() -> TypeRef {
    Type::prim(Prim::Void)
}

fn int_op(v: i64) -> Operand {
    Operand::new(int(), Some(Value::Int(v)))
}

#[test]
fn equality_is_reflexive() {
    let types = [
        int(),
        ch(),
        dbl(),
        Type::pointer(int()),
        Type::array(ch(), Some(3)),
        Type::array(ch(), None),
        Type::function(vec![int(), ch()], void(), false),
        Type::struct_type(vec![Field::new("a", int())]),
        Type::union_type(vec![Field::new("a", int())]),
        Type::named("T", int()),
        Type::enumeration(int(), vec![EnumConstant { name: "A".into(), value: 0 }]),
    ];
    for t in &types {
        assert!(t.equal(t), "{} not equal to itself", t);
    }
}

#[test]
fn equality_is_symmetric_across_the_matrix() {
    let scope = Scope::root();
    scope.declare_struct_tag("s", Type::struct_type(vec![Field::new("a", int())]));
    let types = [
        int(),
        dbl(),
        Type::pointer(int()),
        Type::pointer(void()),
        Type::array(int(), Some(2)),
        Type::function(vec![int()], int(), false),
        Type::struct_type(vec![Field::new("a", int())]),
        Type::union_type(vec![Field::new("a", int())]),
        Type::named("T", int()),
        Type::tagged_struct("s", scope.clone()),
        Type::tagged_struct("undefined", scope.clone()),
        Type::tagged_enum("e", scope),
    ];
    for a in &types {
        for b in &types {
            assert_eq!(
                a.equal(b),
                b.equal(a),
                "asymmetric equality: {} vs {}",
                a,
                b
            );
        }
    }
}

#[test]
fn prims_compare_by_kind() {
    assert!(int().equal(&int()));
    assert!(!int().equal(&ch()));
    assert!(!int().equal(&Type::prim(Prim::UInt)));
    assert!(!int().equal(&Type::pointer(int())));
    assert!(!Type::pointer(int()).equal(&int()));
}

#[test]
fn named_alias_equality_requires_matching_names() {
    let a = Type::named("size_t", Type::prim(Prim::ULong));
    let b = Type::named("size_t", Type::prim(Prim::ULong));
    let c = Type::named("off_t", Type::prim(Prim::ULong));
    assert!(a.equal(&b));
    assert!(!a.equal(&c));
}

#[test]
fn named_alias_unwraps_against_other_kinds() {
    let t = Type::named("T", int());
    assert!(t.equal(&int()));
    assert!(int().equal(&t));
    let p = Type::named("P", Type::pointer(ch()));
    assert!(p.equal(&Type::pointer(ch())));
    assert!(Type::pointer(ch()).equal(&p));
}

#[test]
fn pointer_equality_compares_pointees() {
    assert!(Type::pointer(int()).equal(&Type::pointer(int())));
    assert!(!Type::pointer(int()).equal(&Type::pointer(ch())));
}

#[test]
fn array_equality_compares_items_and_sizes() {
    assert!(Type::array(int(), Some(3)).equal(&Type::array(int(), Some(3))));
    assert!(!Type::array(int(), Some(3)).equal(&Type::array(int(), Some(4))));
    assert!(!Type::array(int(), Some(3)).equal(&Type::array(int(), None)));
    assert!(Type::array(int(), None).equal(&Type::array(int(), None)));
    assert!(!Type::array(int(), Some(3)).equal(&Type::array(ch(), Some(3))));
}

#[test]
fn array_compatibility_tolerates_unknown_sizes() {
    assert!(Type::array(int(), None).is_compatible(&Type::array(int(), Some(7))));
    assert!(Type::array(int(), Some(7)).is_compatible(&Type::array(int(), None)));
    assert!(!Type::array(int(), Some(7)).is_compatible(&Type::array(int(), Some(8))));
    assert!(!Type::array(int(), None).is_compatible(&Type::array(ch(), None)));
}

#[test]
fn pointer_compatibility_void_rule() {
    let pi = Type::pointer(int());
    let pc = Type::pointer(ch());
    let pv = Type::pointer(void());
    assert!(pi.is_compatible(&pi));
    assert!(pi.is_compatible(&pv));
    assert!(pv.is_compatible(&pi));
    assert!(!pi.is_compatible(&pc));
    assert!(!pc.is_compatible(&pi));
}

#[test]
fn function_compatibility() {
    let f = Type::function(vec![int(), ch()], int(), false);
    let same = Type::function(vec![int(), ch()], int(), false);
    let fewer = Type::function(vec![int()], int(), false);
    let variadic = Type::function(vec![int(), ch()], int(), true);
    let other_result = Type::function(vec![int(), ch()], void(), false);
    assert!(f.is_compatible(&same));
    assert!(!f.is_compatible(&fewer));
    assert!(!f.is_compatible(&variadic));
    assert!(!f.is_compatible(&other_result));
}

#[test]
fn struct_equality_compares_fields_in_order() {
    let a = Type::struct_type(vec![Field::new("x", int()), Field::new("y", ch())]);
    let b = Type::struct_type(vec![Field::new("x", int()), Field::new("y", ch())]);
    let swapped = Type::struct_type(vec![Field::new("y", ch()), Field::new("x", int())]);
    let renamed = Type::struct_type(vec![Field::new("x", int()), Field::new("z", ch())]);
    assert!(a.equal(&b));
    assert!(!a.equal(&swapped));
    assert!(!a.equal(&renamed));
}

#[test]
fn bit_field_width_participates_in_field_equality() {
    let a = Type::struct_type(vec![Field::bit_field("f", int(), 3, int())]);
    let b = Type::struct_type(vec![Field::bit_field("f", int(), 3, int())]);
    let wider = Type::struct_type(vec![Field::bit_field("f", int(), 4, int())]);
    assert!(a.equal(&b));
    assert!(!a.equal(&wider));
}

#[test]
fn struct_is_never_equal_to_union() {
    let fields = vec![Field::new("x", int())];
    let s = Type::struct_type(fields.clone());
    let u = Type::union_type(fields);
    assert!(!s.equal(&u));
    assert!(!u.equal(&s));
}

#[test]
fn tagged_struct_tag_identity_shortcut() {
    let scope = Scope::root();
    // No definition in scope; the tags alone decide.
    let a = Type::tagged_struct("node", scope.clone());
    let b = Type::tagged_struct("node", scope.clone());
    let c = Type::tagged_struct("leaf", scope);
    assert!(a.equal(&b));
    assert!(b.equal(&a));
    assert!(!a.equal(&c));
}

#[test]
fn tagged_struct_resolves_against_concrete_struct() {
    let scope = Scope::root();
    let backing = Type::struct_type(vec![Field::new("x", int())]);
    scope.declare_struct_tag("s", backing.clone());
    let tagged = Type::tagged_struct("s", scope);
    assert!(tagged.equal(&backing));
    assert!(backing.equal(&tagged));
}

#[test]
fn unresolved_tagged_struct_is_not_equal_to_concrete_struct() {
    let scope = Scope::root();
    let tagged = Type::tagged_struct("forward", scope);
    let concrete = Type::struct_type(vec![Field::new("x", int())]);
    assert!(!tagged.equal(&concrete));
    assert!(!concrete.equal(&tagged));
}

#[test]
fn forward_declared_tag_resolution_is_a_normal_miss() {
    let scope = Scope::root();
    let tagged = Type::tagged_struct("later", scope.clone());
    // Unresolved: underlying returns the stub itself, still a struct kind.
    let stub = underlying(&tagged);
    assert_eq!(stub.kind(), TypeKind::Struct);
    assert!(!stub.is_scalar_type());

    // A later definition becomes visible on the next query.
    let backing = Type::struct_type(vec![Field::new("x", int())]);
    scope.declare_struct_tag("later", backing.clone());
    assert!(tagged.equal(&backing));
}

#[test]
fn tagged_resolution_is_memoized_once() {
    let scope = Scope::root();
    let first = Type::struct_type(vec![Field::new("x", int())]);
    scope.declare_struct_tag("s", first.clone());
    let tagged = Type::tagged_struct("s", scope.clone());
    assert!(tagged.equal(&first));

    // Redeclaring the tag does not change the memoized resolution.
    let second = Type::struct_type(vec![Field::new("y", dbl())]);
    scope.declare_struct_tag("s", second.clone());
    assert!(tagged.equal(&first));
    assert!(!tagged.equal(&second));
}

#[test]
fn tagged_resolution_ignores_later_shadowing_scopes() {
    let outer = Scope::root();
    let outer_def = Type::struct_type(vec![Field::new("x", int())]);
    outer.declare_struct_tag("s", outer_def.clone());

    let inner = Scope::child(&outer);
    let tagged = Type::tagged_struct("s", inner.clone());
    assert!(tagged.equal(&outer_def));

    // A shadowing definition introduced afterwards is not consulted.
    let inner_def = Type::struct_type(vec![Field::new("y", dbl())]);
    inner.declare_struct_tag("s", inner_def.clone());
    assert!(tagged.equal(&outer_def));
    assert!(!tagged.equal(&inner_def));
}

#[test]
fn tagged_union_resolves_through_the_shared_tag_namespace() {
    let scope = Scope::root();
    let backing = Type::union_type(vec![Field::new("x", int())]);
    scope.declare_struct_tag("u", backing.clone());
    let tagged = Type::tagged_union("u", scope.clone());
    assert!(tagged.equal(&backing));
    assert!(backing.equal(&tagged));

    let same = Type::tagged_union("u", scope.clone());
    let other = Type::tagged_union("v", scope);
    assert!(tagged.equal(&same));
    assert!(!tagged.equal(&other));
}

#[test]
fn pre_resolved_tagged_node_never_consults_its_scope() {
    use crate::semantic::types::TaggedType;
    use std::rc::Rc;

    let backing = Type::struct_type(vec![Field::new("x", int())]);
    let tagged = Rc::new(Type::TaggedStruct(TaggedType::with_backing(
        "s",
        backing.clone(),
    )));
    assert!(tagged.equal(&backing));
    assert_eq!(tagged.size_of(pos()).unwrap(), 4);
}

#[test]
fn tagged_enum_behaves_as_integer_but_keeps_tag_identity() {
    let scope = Scope::root();
    let e = Type::tagged_enum("color", scope.clone());
    assert!(e.is_arithmetic_type());
    assert!(e.is_integer_type());
    assert!(e.is_scalar_type());
    assert_eq!(e.kind(), TypeKind::Int);

    let same = Type::tagged_enum("color", scope.clone());
    let other = Type::tagged_enum("shade", scope);
    assert!(e.equal(&same));
    assert!(!e.equal(&other));
    assert!(!e.equal(&int()));
}

#[test]
fn enum_is_compatible_with_its_underlying_type() {
    let e = Type::enumeration(int(), vec![EnumConstant { name: "A".into(), value: 0 }]);
    assert!(e.is_compatible(&int()));
    assert!(int().is_compatible(&e));
    assert!(!e.is_compatible(&dbl()));
}

#[test]
fn classification_queries() {
    assert!(int().is_arithmetic_type());
    assert!(dbl().is_arithmetic_type());
    assert!(!void().is_arithmetic_type());
    assert!(int().is_integer_type());
    assert!(!dbl().is_integer_type());
    assert!(int().is_scalar_type());
    assert!(Type::pointer(int()).is_scalar_type());
    assert!(!Type::array(int(), Some(2)).is_scalar_type());
    assert!(!Type::struct_type(vec![]).is_arithmetic_type());
    assert!(Type::pointer(int()).is_pointer_type());
    assert!(!int().is_pointer_type());
    assert!(Type::named("P", Type::pointer(int())).is_pointer_type());
}

#[test]
fn unsignedness() {
    assert!(Type::prim(Prim::UInt).is_unsigned());
    assert!(!int().is_unsigned());
    // Pointers compare as unsigned addresses.
    assert!(Type::pointer(int()).is_unsigned());
    let e = Type::enumeration(
        Type::prim(Prim::UInt),
        vec![EnumConstant { name: "A".into(), value: 0 }],
    );
    assert!(e.is_unsigned());
}

#[test]
fn void_pointer_detection() {
    assert!(Type::pointer(void()).is_void_pointer_type());
    assert!(!Type::pointer(int()).is_void_pointer_type());
    assert!(Type::pointer(Type::named("V", void())).is_void_pointer_type());
    assert!(!int().is_void_pointer_type());
}

#[test]
fn underlying_chases_aliases_and_tags() {
    let scope = Scope::root();
    let backing = Type::struct_type(vec![Field::new("x", int())]);
    scope.declare_struct_tag("s", backing.clone());
    let named = Type::named("T", Type::tagged_struct("s", scope));
    let u = underlying(&named);
    assert!(u.equal(&backing));
}

#[test]
fn adjusted_parameter_type_decays_arrays() {
    let arr = Type::array(ch(), Some(16));
    let adj = adjusted_parameter_type(&arr);
    assert!(adj.equal(&Type::pointer(ch())));

    let named_arr = Type::named("buf_t", Type::array(ch(), Some(16)));
    assert!(adjusted_parameter_type(&named_arr).equal(&Type::pointer(ch())));

    assert!(adjusted_parameter_type(&int()).equal(&int()));
}

#[test]
fn sizes_follow_the_lp64_model() {
    let p = pos();
    assert_eq!(int().size_of(p).unwrap(), 4);
    assert_eq!(Type::prim(Prim::Long).size_of(p).unwrap(), 8);
    assert_eq!(Type::pointer(ch()).size_of(p).unwrap(), 8);
    assert_eq!(Type::array(int(), Some(3)).size_of(p).unwrap(), 12);

    // char, then int padded to 4-byte alignment.
    let s = Type::struct_type(vec![Field::new("c", ch()), Field::new("i", int())]);
    assert_eq!(s.size_of(p).unwrap(), 8);
    assert_eq!(s.align_of(p).unwrap(), 4);

    let u = Type::union_type(vec![Field::new("c", ch()), Field::new("i", int())]);
    assert_eq!(u.size_of(p).unwrap(), 4);
}

#[test]
fn size_of_incomplete_types_is_an_error() {
    let p = pos();
    assert!(Type::array(int(), None).size_of(p).is_err());
    assert!(void().size_of(p).is_err());
    let scope = Scope::root();
    assert!(Type::tagged_struct("forward", scope).size_of(p).is_err());
}

#[test]
fn assign_arithmetic_converts_to_target_representation() {
    let opts = Options::default();
    let r = assign_from(&ch(), &opts, &int_op(300), pos()).unwrap();
    assert_eq!(r.value, Some(Value::Int(44)));
    assert!(r.ty.equal(&ch()));
}

#[test]
fn assign_int_to_double_folds_to_float() {
    let opts = Options::default();
    let r = assign_from(&dbl(), &opts, &int_op(3), pos()).unwrap();
    assert_eq!(r.value, Some(Value::Float(3.0)));
}

#[test]
fn assign_null_constant_to_pointer() {
    let opts = Options::default();
    let target = Type::pointer(int());
    let r = assign_from(&target, &opts, &int_op(0), pos()).unwrap();
    assert_eq!(r.value, Some(Value::Null));
    assert!(r.ty.equal(&target));
}

#[test]
fn assign_compatible_pointer_passes() {
    let opts = Options::default();
    let target = Type::pointer(int());
    let src = Operand::new(Type::pointer(void()), None);
    assert!(assign_from(&target, &opts, &src, pos()).is_ok());
}

#[test]
fn assign_incompatible_pointer_is_fatal_without_leniency() {
    let strict = Options::default();
    let target = Type::pointer(int());
    let src = Operand::new(Type::pointer(ch()), None);
    assert!(assign_from(&target, &strict, &src, pos()).is_err());

    let lenient = Options {
        enable_pointer_compatibility: true,
    };
    assert!(assign_from(&target, &lenient, &src, pos()).is_ok());
}

#[test]
fn assign_compatible_record_passes_through() {
    let opts = Options::default();
    let s = Type::struct_type(vec![Field::new("x", int())]);
    let same = Type::struct_type(vec![Field::new("x", int())]);
    let r = assign_from(&s, &opts, &Operand::new(same, None), pos());
    assert!(r.is_ok());
}

#[test]
fn assign_struct_from_integer_is_fatal() {
    let opts = Options::default();
    let s = Type::struct_type(vec![Field::new("x", int())]);
    assert!(assign_from(&s, &opts, &int_op(1), pos()).is_err());
}

#[test]
fn assign_through_named_target_delegates() {
    let opts = Options::default();
    let t = Type::named("myint", int());
    let r = assign_from(&t, &opts, &int_op(5), pos()).unwrap();
    assert_eq!(r.value, Some(Value::Int(5)));
}

#[test]
fn type_display_is_structural() {
    assert_eq!(Type::pointer(int()).to_string(), "pointer to int");
    assert_eq!(Type::array(ch(), Some(3)).to_string(), "array 3 of char");
    assert_eq!(
        Type::function(vec![int()], void(), false).to_string(),
        "function (int) returning void"
    );
    let scope = Scope::root();
    assert_eq!(Type::tagged_struct("s", scope).to_string(), "struct s");
}
