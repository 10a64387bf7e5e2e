use std::rc::Rc;

use hashbrown::HashMap;

use crate::ast::{
    Declarator, Expr, FunctionDefinition, Initializer, Linkage, Stmt, StorageFlags,
};
use crate::options::Options;
use crate::semantic::operand::{Operand, Value};
use crate::semantic::scope::Scope;
use crate::semantic::types::{EnumConstant, Field, Prim, Type, TypeRef};
use crate::source::Position;
use crate::Name;

use super::Generator;

fn pos() -> Position {
    Position::new(1, 1)
}

fn int() -> TypeRef {
    Type::prim(Prim::Int)
}

fn int_op(v: i64) -> Operand {
    Operand::new(int(), Some(Value::Int(v)))
}

fn global(id: u32, name: &str, ty: TypeRef) -> Declarator {
    Declarator::new(id, name, ty, pos())
}

fn fn_decl(
    id: u32,
    name: &str,
    params: Vec<TypeRef>,
    result: TypeRef,
    body: Vec<Stmt>,
    locals: Vec<Rc<Declarator>>,
) -> Declarator {
    let mut d = Declarator::new(id, name, Type::function(params, result, false), pos());
    d.definition = Some(FunctionDefinition {
        body: Stmt::Compound(body.into_iter().collect()),
        locals: locals.into_iter().collect(),
    });
    d
}

macro_rules! with_gen {
    ($g:ident, $body:block) => {
        let opts = Options::default();
        let strings: HashMap<Name, Vec<u8>> = HashMap::new();
        let mut $g = Generator::new(&opts, &strings);
        $body
    };
}

#[test]
fn zero_nonescaped_global_is_a_plain_declaration() {
    with_gen!(g, {
        let x = Rc::new(global(1, "x", int()));
        g.define(&x).unwrap();
        assert_eq!(g.out, "\nvar _x int32\n");
    });
}

#[test]
fn zero_escaped_globals_get_monotonic_bss_offsets() {
    with_gen!(g, {
        let mut x = global(1, "x", int());
        x.address_taken = true;
        let mut y = global(2, "y", Type::prim(Prim::Long));
        y.address_taken = true;
        g.define(&Rc::new(x)).unwrap();
        g.define(&Rc::new(y)).unwrap();
        assert!(g.out.contains("var _x = bss + 0\n"));
        // The long rounds up to 8-byte alignment past the 4-byte int.
        assert!(g.out.contains("var _y = bss + 8\n"));
        let (_, layout) = g.finish();
        assert_eq!(layout.bss_len, 16);
    });
}

#[test]
fn constant_escaped_global_goes_to_the_data_segment() {
    with_gen!(g, {
        let mut x = global(1, "x", int());
        x.address_taken = true;
        x.initializer = Some(Initializer::Const(int_op(42)));
        g.define(&Rc::new(x)).unwrap();
        assert!(g.out.contains("var _x = ds + 0\n"));
        let (_, layout) = g.finish();
        assert_eq!(layout.ds, vec![42, 0, 0, 0]);
    });
}

#[test]
fn nonconstant_escaped_global_gets_bss_and_a_startup_store() {
    with_gen!(g, {
        let y = Rc::new(global(2, "y", int()));
        let mut x = global(1, "x", int());
        x.address_taken = true;
        x.initializer = Some(Initializer::Expr(Expr::ident(&y, pos())));
        g.define(&Rc::new(x)).unwrap();
        assert!(g.out.contains("var _x = bss + 0"));
        assert!(g
            .out
            .contains("func init() { *(*int32)(unsafe.Pointer(_x)) = _y }"));
    });
}

#[test]
fn constant_nonescaped_global_is_an_initialized_declaration() {
    with_gen!(g, {
        let mut x = global(1, "x", int());
        x.initializer = Some(Initializer::Const(int_op(5)));
        g.define(&Rc::new(x)).unwrap();
        assert_eq!(g.out, "\nvar _x = 5\n");
    });
}

#[test]
fn scheduler_emits_a_declarator_exactly_once() {
    with_gen!(g, {
        let x = Rc::new(global(1, "x", int()));
        g.define(&x).unwrap();
        g.define(&x).unwrap();
        assert_eq!(g.out.matches("var _x").count(), 1);
    });
}

#[test]
fn repeated_extern_declarations_resolve_to_one_canonical_emission() {
    with_gen!(g, {
        let mut fwd = global(1, "v", int());
        fwd.linkage = Linkage::External;
        fwd.storage = StorageFlags::EXTERN;
        let mut def = global(2, "v", int());
        def.linkage = Linkage::External;
        def.initializer = Some(Initializer::Const(int_op(7)));
        let fwd = Rc::new(fwd);
        let def = Rc::new(def);

        g.register_externs(&[fwd.clone(), def.clone()]);
        g.define(&fwd).unwrap();
        g.define(&def).unwrap();
        assert_eq!(g.out.matches("var Xv").count(), 1);
        assert!(g.out.contains("var Xv = 7\n"));
    });
}

#[test]
fn declared_only_externs_are_not_emitted() {
    with_gen!(g, {
        let mut d = global(1, "puts", int());
        d.linkage = Linkage::External;
        d.storage = StorageFlags::EXTERN;
        let d = Rc::new(d);
        g.register_externs(&[d.clone()]);
        g.define(&d).unwrap();
        assert_eq!(g.out, "");
    });
}

#[test]
fn named_type_reference_emits_one_alias() {
    with_gen!(g, {
        let size_t = Type::named("size_t", Type::prim(Prim::ULong));
        let x = Rc::new(global(1, "x", size_t.clone()));
        let y = Rc::new(global(2, "y", size_t));
        g.define(&x).unwrap();
        g.define(&y).unwrap();
        assert!(g.out.contains("var _x Tsize_t\n"));
        assert!(g.out.contains("var _y Tsize_t\n"));
        assert_eq!(g.out.matches("type Tsize_t = uint64").count(), 1);
    });
}

#[test]
fn tagged_enum_emits_type_and_iota_constants() {
    with_gen!(g, {
        let scope = Scope::root();
        scope.declare_enum_tag(
            "color",
            Type::enumeration(
                int(),
                vec![
                    EnumConstant { name: "RED".into(), value: 0 },
                    EnumConstant { name: "GREEN".into(), value: 1 },
                    EnumConstant { name: "BLUE".into(), value: 5 },
                ],
            ),
        );
        let x = Rc::new(global(1, "x", Type::tagged_enum("color", scope)));
        g.define(&x).unwrap();
        assert!(g.out.contains("type Ecolor int32\n"));
        assert!(g.out.contains("\nCRED Ecolor = iota"));
        assert!(g.out.contains("\nCGREEN\n"));
        assert!(g.out.contains("\nCBLUE = 5\n"));
    });
}

#[test]
fn mutually_recursive_tagged_structs_terminate() {
    with_gen!(g, {
        let scope = Scope::root();
        scope.declare_struct_tag(
            "a",
            Type::struct_type(vec![Field::new(
                "next",
                Type::pointer(Type::tagged_struct("b", scope.clone())),
            )]),
        );
        scope.declare_struct_tag(
            "b",
            Type::struct_type(vec![Field::new(
                "prev",
                Type::pointer(Type::tagged_struct("a", scope.clone())),
            )]),
        );
        let x = Rc::new(global(1, "x", Type::tagged_struct("a", scope)));
        g.define(&x).unwrap();
        assert_eq!(g.out.matches("type Sa ").count(), 1);
        assert_eq!(g.out.matches("type Sb ").count(), 1);
        assert!(g.out.contains("Xnext uintptr"));
        assert!(g.out.contains("Xprev uintptr"));
    });
}

#[test]
fn static_local_is_hoisted_under_a_shadow_number() {
    with_gen!(g, {
        let mut s = global(2, "s", int());
        s.storage = StorageFlags::STATIC;
        s.referenced = 1;
        s.initializer = Some(Initializer::Const(int_op(3)));
        let s = Rc::new(s);
        let f = Rc::new(fn_decl(
            1,
            "f",
            vec![],
            Type::prim(Prim::Void),
            vec![],
            vec![s.clone()],
        ));
        g.define(&f).unwrap();
        assert!(g.out.contains("\nvar _1s = 3\n"));
        // The function body declares no local for it.
        assert!(!g.out.contains("\t_1s"));
    });
}

#[test]
fn string_initialized_escaped_array_uses_the_string_table() {
    let opts = Options::default();
    let mut strings: HashMap<Name, Vec<u8>> = HashMap::new();
    strings.insert(Name::from("greeting"), b"hi".to_vec());
    let mut g = Generator::new(&opts, &strings);

    let mut s = global(1, "s", Type::array(Type::prim(Prim::Char), Some(3)));
    s.address_taken = true;
    let e = Expr::new(
        crate::ast::ExprKind::StrLit,
        Operand::new(
            Type::array(Type::prim(Prim::Char), Some(3)),
            Some(Value::Str(Name::from("greeting"))),
        ),
        pos(),
    );
    s.initializer = Some(Initializer::Expr(e));
    g.define(&Rc::new(s)).unwrap();
    assert!(g.out.contains("var _s = ts + 0\n"));
    let (_, layout) = g.finish();
    assert_eq!(layout.ts, b"hi\0".to_vec());
    assert_eq!(layout.strings.len(), 1);
    assert_eq!(layout.strings[0].offset, 0);
    assert_eq!(layout.strings[0].text, "hi");
}

#[test]
fn void_function_signature_skips_single_void_parameter() {
    with_gen!(g, {
        let f = Rc::new(fn_decl(
            1,
            "f",
            vec![Type::prim(Prim::Void)],
            Type::prim(Prim::Void),
            vec![],
            vec![],
        ));
        g.define(&f).unwrap();
        assert!(g.out.starts_with("\nfunc _f(tls *crt.TLS) {"));
        // Void result: no named result, no sentinel return.
        assert!(!g.out.contains("(r "));
        assert!(!g.out.contains("return r"));
    });
}

#[test]
fn address_taken_parameter_is_copied_into_a_heap_slot() {
    with_gen!(g, {
        let mut p = global(2, "p", int());
        p.address_taken = true;
        p.referenced = 1;
        let p = Rc::new(p);
        let mut f = fn_decl(1, "f", vec![int()], Type::prim(Prim::Void), vec![], vec![]);
        f.params.push(p.clone());
        g.define(&Rc::new(f)).unwrap();

        assert!(g.out.contains("func _f(tls *crt.TLS, ap int32)"));
        assert!(g.out.contains("_p = crt.MustMalloc(4) // *int32"));
        assert!(g.out.contains("*(*int32)(unsafe.Pointer(_p)) = ap"));
        assert!(g.out.contains("crt.Free(_p)"));
    });
}

#[test]
fn external_function_references_mangle_to_the_runtime() {
    with_gen!(g, {
        // No extern registration: the name is runtime-provided.
        let mut puts = global(
            2,
            "puts",
            Type::function(vec![Type::pointer(Type::prim(Prim::Char))], int(), false),
        );
        puts.linkage = Linkage::External;
        puts.storage = StorageFlags::EXTERN;
        assert_eq!(g.mangle_declarator(&Rc::new(puts)), "crt.Xputs");
    });
}
