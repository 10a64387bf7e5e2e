//! Operands: the (type, value) pairs produced by expression evaluation.
//!
//! The core consumes operands as inputs to assignment and conversion queries;
//! it never stores them beyond the call that consumes them.

use crate::semantic::types::{underlying, Prim, Type, TypeRef};
use crate::Name;

/// A constant value attached to an operand, when folding produced one.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    /// Interned string constant.
    Str(Name),
    /// The null pointer.
    Null,
}

#[derive(Debug, Clone)]
pub struct Operand {
    pub ty: TypeRef,
    pub value: Option<Value>,
}

impl Operand {
    pub fn new(ty: TypeRef, value: Option<Value>) -> Operand {
        Operand { ty, value }
    }

    pub fn is_zero(&self) -> bool {
        matches!(
            self.value,
            Some(Value::Int(0)) | Some(Value::Null)
        ) || matches!(self.value, Some(Value::Float(f)) if f == 0.0)
    }

    pub fn is_nonzero(&self) -> bool {
        match &self.value {
            Some(Value::Int(v)) => *v != 0,
            Some(Value::Float(v)) => *v != 0.0,
            Some(Value::Str(_)) => true,
            Some(Value::Null) => false,
            None => false,
        }
    }

    /// An integer constant expression with value 0 (C99 6.3.2.3).
    pub fn is_null_ptr_const(&self) -> bool {
        match &self.value {
            Some(Value::Null) => true,
            Some(Value::Int(0)) => self.ty.is_integer_type(),
            _ => false,
        }
    }

    /// Converts to the target's representation. Constant values are folded
    /// into the target's width and signedness; non-constant operands are
    /// simply retyped.
    pub fn convert_to(&self, target: &TypeRef) -> Operand {
        let value = match &self.value {
            None => None,
            Some(v) => Some(convert_value(v, target)),
        };
        Operand {
            ty: target.clone(),
            value,
        }
    }
}

fn convert_value(v: &Value, target: &TypeRef) -> Value {
    let t = underlying(target);
    let prim = match &*t {
        Type::Prim(p) => *p,
        Type::Enum(e) => match &*underlying(&e.base) {
            Type::Prim(p) => *p,
            _ => return v.clone(),
        },
        // Unresolved tagged enums behave as int.
        Type::TaggedEnum(_) => Prim::Int,
        _ => return v.clone(),
    };

    match (v, prim.is_float()) {
        (Value::Int(n), false) => Value::Int(truncate(*n, prim)),
        (Value::Int(n), true) => {
            if prim == Prim::Float {
                Value::Float(*n as f32 as f64)
            } else {
                Value::Float(*n as f64)
            }
        }
        (Value::Float(f), false) => Value::Int(truncate(*f as i64, prim)),
        (Value::Float(f), true) => {
            if prim == Prim::Float {
                Value::Float(*f as f32 as f64)
            } else {
                Value::Float(*f)
            }
        }
        (Value::Str(_), _) | (Value::Null, _) => v.clone(),
    }
}

/// Wraps an integer into the target's width and signedness.
fn truncate(v: i64, prim: Prim) -> i64 {
    let bits = prim.size() * 8;
    if bits >= 64 {
        return v;
    }
    let mask = (1u64 << bits) - 1;
    let u = (v as u64) & mask;
    if prim.is_signed() && (u >> (bits - 1)) & 1 == 1 {
        (u | !mask) as i64
    } else {
        u as i64
    }
}
