//! The source language's static type system.

use std::fmt;

/// A type assigned to an expression, or `Void` for statements and the no-value literals.
///
/// Equality is structural: two `Array`s are equal when their element types are equal, and two
/// `Function`s are equal when their parameter types (in declaration order) and return type are
/// equal. There is no nominal typing anywhere in this language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Number,
    Bool,
    Void,
    String,
    Array(Box<Type>),
    Function(Box<FunctionType>),
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Number => write!(f, "number"),
            Type::Bool => write!(f, "bool"),
            Type::Void => write!(f, "void"),
            Type::String => write!(f, "string"),
            Type::Array(inner) => write!(f, "array<{inner}>"),
            Type::Function(sig) => {
                write!(f, "(")?;
                for (i, (_, t)) in sig.parameters.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{t}")?;
                }
                write!(f, ") -> {}", sig.return_type)
            }
        }
    }
}

/// A function's declared signature: its parameters (name and type, in declaration order) and
/// its return type. Carried both on the `Func` AST node (as written by the programmer) and in
/// the checker's function environment (as `Type::Function` for call-site checking).
#[derive(Debug, Clone)]
pub struct FunctionType {
    pub parameters: Vec<(String, Type)>,
    pub return_type: Type,
}

impl PartialEq for FunctionType {
    /// Parameter names are written by the programmer for readability only - two signatures with
    /// differently-named parameters of the same types are the same type.
    fn eq(&self, other: &Self) -> bool {
        self.parameters.len() == other.parameters.len()
            && self
                .parameters
                .iter()
                .zip(&other.parameters)
                .all(|((_, a), (_, b))| a == b)
            && self.return_type == other.return_type
    }
}

impl Eq for FunctionType {}
