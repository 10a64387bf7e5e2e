//! The semantic layer: the type algebra, scope resolution and operands.

pub mod operand;
pub mod scope;
pub mod types;

pub use operand::{Operand, Value};
pub use scope::Scope;
pub use types::{
    adjusted_parameter_type, assign_from, underlying, EnumConstant, Field, Prim, Type, TypeKind,
    TypeRef,
};

#[cfg(test)]
mod tests_scope;
#[cfg(test)]
mod tests_types;
