//! The type checker.
//!
//! One recursive function walks the whole [`AstNode`] enum - expression-shaped and
//! statement-shaped nodes alike - and assigns each a [`Type`], returning `Void` for the
//! statement-shaped ones. See the design note in `ast.rs` for why there is no separate
//! statement/expression walker.

use std::collections::HashMap;
use std::fmt;

use crate::ast::AstNode;
use crate::types::{FunctionType, Type};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeError {
    UndefinedVariable(String),
    UndefinedFunction(String),
    Mismatch { expected: Type, actual: Type },
    ArityMismatch { function: String, expected: usize, actual: usize },
    EmptyArrayLiteral,
    NotIndexable(Type),
    ReturnOutsideFunction,
    AssignToUndefined(String),
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeError::UndefinedVariable(name) => write!(f, "undefined variable '{name}'"),
            TypeError::UndefinedFunction(name) => write!(f, "undefined function '{name}'"),
            TypeError::Mismatch { expected, actual } => {
                write!(f, "expected type {expected}, found {actual}")
            }
            TypeError::ArityMismatch { function, expected, actual } => write!(
                f,
                "function '{function}' expects {expected} argument(s), found {actual}"
            ),
            TypeError::EmptyArrayLiteral => write!(f, "cannot infer element type of an empty array literal"),
            TypeError::NotIndexable(ty) => write!(f, "type {ty} cannot be indexed"),
            TypeError::ReturnOutsideFunction => write!(f, "'return' outside of a function"),
            TypeError::AssignToUndefined(name) => write!(f, "assignment to undefined variable '{name}'"),
        }
    }
}

impl std::error::Error for TypeError {}

/// Per-function local scope. There is no block scoping: a `Var` inside an `if` or `while`
/// body is visible for the rest of the enclosing function, and shadowing silently overwrites.
type Locals = HashMap<String, Type>;

pub struct Checker {
    functions: HashMap<String, FunctionType>,
}

impl Default for Checker {
    /// Seeds the function table with the one C library function the language assumes exists
    /// without a declaration syntax: `putchar(number) -> void`. Every other externally linked
    /// name (notably `malloc`, which only the code generator ever calls) is never looked up
    /// through this table and so needs no entry here.
    fn default() -> Self {
        let mut functions = HashMap::new();
        functions.insert(
            "putchar".to_string(),
            FunctionType { parameters: vec![("c".to_string(), Type::Number)], return_type: Type::Void },
        );
        Checker { functions }
    }
}

impl Checker {
    pub fn new() -> Self {
        Checker::default()
    }

    /// Checks every top-level node (in practice, every top-level `Func`) against a single
    /// shared function table, returning the first error encountered.
    pub fn check_program(&mut self, program: &[AstNode]) -> Result<(), TypeError> {
        for node in program {
            self.check(node, &mut Locals::new(), None)?;
        }
        Ok(())
    }

    fn check(
        &mut self,
        node: &AstNode,
        locals: &mut Locals,
        return_type: Option<&Type>,
    ) -> Result<Type, TypeError> {
        match node {
            AstNode::Num(_) => Ok(Type::Number),
            AstNode::Bool(_) => Ok(Type::Bool),
            AstNode::Undefined | AstNode::Null => Ok(Type::Void),
            AstNode::StringLiteral(_) => Ok(Type::Array(Box::new(Type::Number))),

            AstNode::Id(name) => locals
                .get(name)
                .cloned()
                .ok_or_else(|| TypeError::UndefinedVariable(name.clone())),

            AstNode::Not(inner) => {
                let ty = self.check(inner, locals, return_type)?;
                expect(&ty, &Type::Bool)?;
                Ok(Type::Bool)
            }

            AstNode::Equal(left, right) | AstNode::NotEqual(left, right) => {
                let lt = self.check(left, locals, return_type)?;
                let rt = self.check(right, locals, return_type)?;
                expect(&rt, &lt)?;
                Ok(Type::Bool)
            }

            AstNode::Add(left, right)
            | AstNode::Subtract(left, right)
            | AstNode::Multiply(left, right)
            | AstNode::Divide(left, right) => {
                let lt = self.check(left, locals, return_type)?;
                expect(&lt, &Type::Number)?;
                let rt = self.check(right, locals, return_type)?;
                expect(&rt, &Type::Number)?;
                Ok(Type::Number)
            }

            AstNode::Call { callee, args } => {
                let signature = self
                    .functions
                    .get(callee)
                    .cloned()
                    .ok_or_else(|| TypeError::UndefinedFunction(callee.clone()))?;
                if args.len() != signature.parameters.len() {
                    return Err(TypeError::ArityMismatch {
                        function: callee.clone(),
                        expected: signature.parameters.len(),
                        actual: args.len(),
                    });
                }
                for (arg, (_, expected)) in args.iter().zip(signature.parameters.iter()) {
                    let actual = self.check(arg, locals, return_type)?;
                    expect(&actual, expected)?;
                }
                Ok(signature.return_type)
            }

            AstNode::Return(inner) => {
                let expected = return_type.ok_or(TypeError::ReturnOutsideFunction)?;
                let actual = self.check(inner, locals, return_type)?;
                expect(&actual, expected)?;
                Ok(Type::Void)
            }

            AstNode::Block(statements) => {
                for statement in statements {
                    self.check(statement, locals, return_type)?;
                }
                Ok(Type::Void)
            }

            AstNode::If { condition, then_branch, else_branch } => {
                self.check(condition, locals, return_type)?;
                self.check(then_branch, locals, return_type)?;
                self.check(else_branch, locals, return_type)?;
                Ok(Type::Void)
            }

            AstNode::While { condition, body } => {
                self.check(condition, locals, return_type)?;
                self.check(body, locals, return_type)?;
                Ok(Type::Void)
            }

            AstNode::For { init, condition, step, body } => {
                self.check(init, locals, return_type)?;
                self.check(condition, locals, return_type)?;
                self.check(step, locals, return_type)?;
                self.check(body, locals, return_type)?;
                Ok(Type::Void)
            }

            AstNode::Var { name, init } => {
                let ty = self.check(init, locals, return_type)?;
                locals.insert(name.clone(), ty);
                Ok(Type::Void)
            }

            AstNode::Assign { name, value } => {
                let expected = locals
                    .get(name)
                    .cloned()
                    .ok_or_else(|| TypeError::AssignToUndefined(name.clone()))?;
                let actual = self.check(value, locals, return_type)?;
                expect(&actual, &expected)?;
                Ok(Type::Void)
            }

            AstNode::Func { name, signature, body } => {
                self.functions.insert(name.clone(), signature.clone());
                let mut fn_locals: Locals =
                    signature.parameters.iter().cloned().collect();
                self.check(body, &mut fn_locals, Some(&signature.return_type))?;
                Ok(Type::Void)
            }

            AstNode::ArrayLiteral(elements) => {
                let mut elements = elements.iter();
                let first = elements
                    .next()
                    .ok_or(TypeError::EmptyArrayLiteral)
                    .and_then(|e| self.check(e, locals, return_type))?;
                for element in elements {
                    let ty = self.check(element, locals, return_type)?;
                    expect(&ty, &first)?;
                }
                Ok(Type::Array(Box::new(first)))
            }

            AstNode::ArrayLookup { array, index } => {
                let index_ty = self.check(index, locals, return_type)?;
                expect(&index_ty, &Type::Number)?;
                match self.check(array, locals, return_type)? {
                    Type::Array(inner) => Ok(*inner),
                    Type::String => Ok(Type::Number),
                    other => Err(TypeError::NotIndexable(other)),
                }
            }

            AstNode::Length(array) => match self.check(array, locals, return_type)? {
                Type::Array(_) => Ok(Type::Number),
                other => Err(TypeError::NotIndexable(other)),
            },
        }
    }
}

fn expect(actual: &Type, expected: &Type) -> Result<(), TypeError> {
    if actual == expected {
        Ok(())
    } else {
        Err(TypeError::Mismatch { expected: expected.clone(), actual: actual.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::parse_program;

    fn check(source: &str) -> Result<(), TypeError> {
        let program = parse_program(source).expect("source must parse");
        Checker::new().check_program(&program)
    }

    #[test]
    fn accepts_a_well_typed_program() {
        assert!(check("function main() { return 2 + 3 * 4; }").is_ok());
    }

    #[test]
    fn rejects_adding_a_bool_to_a_number() {
        let err = check("function main() { return 1 + true; }").unwrap_err();
        assert!(matches!(err, TypeError::Mismatch { .. }));
    }

    #[test]
    fn rejects_call_with_wrong_arity() {
        let err = check("function f(x) { return x; } function main() { return f(1, 2); }").unwrap_err();
        assert!(matches!(err, TypeError::ArityMismatch { .. }));
    }

    #[test]
    fn rejects_call_with_wrong_argument_type() {
        let err =
            check("function f(x: bool) { return x; } function main() { return f(1); }").unwrap_err();
        assert!(matches!(err, TypeError::Mismatch { .. }));
    }

    #[test]
    fn allows_self_recursion() {
        assert!(check("function f(x) { return f(x); }").is_ok());
    }

    #[test]
    fn rejects_call_to_function_declared_later() {
        let err =
            check("function main() { return later(); } function later() { return 1; }").unwrap_err();
        assert!(matches!(err, TypeError::UndefinedFunction(_)));
    }

    #[test]
    fn rejects_return_type_mismatch() {
        let err = check("function f(): bool { return 1; }").unwrap_err();
        assert!(matches!(err, TypeError::Mismatch { .. }));
    }

    #[test]
    fn rejects_assignment_to_undeclared_variable() {
        let err = check("function main() { x = 1; }").unwrap_err();
        assert!(matches!(err, TypeError::AssignToUndefined(_)));
    }

    #[test]
    fn rejects_assignment_of_mismatched_type() {
        let err = check("function main() { var x = 1; x = true; }").unwrap_err();
        assert!(matches!(err, TypeError::Mismatch { .. }));
    }

    #[test]
    fn shadowing_a_local_with_var_changes_its_type() {
        assert!(check("function main() { var x = 1; var x = true; if (x) {} else {} }").is_ok());
    }

    #[test]
    fn rejects_empty_array_literal() {
        let err = check("function main() { var a = []; }").unwrap_err();
        assert_eq!(err, TypeError::EmptyArrayLiteral);
    }

    #[test]
    fn rejects_array_literal_with_mismatched_elements() {
        let err = check("function main() { var a = [1, true]; }").unwrap_err();
        assert!(matches!(err, TypeError::Mismatch { .. }));
    }

    #[test]
    fn array_lookup_on_array_yields_element_type() {
        assert!(check("function main() { var a = [1, 2]; var b = a[0]; b = 3; }").is_ok());
    }

    #[test]
    fn array_lookup_on_string_yields_number() {
        assert!(check(r#"function main() { var s = "hi"; var c = s[0]; c = 3; }"#).is_ok());
    }

    #[test]
    fn array_lookup_index_must_be_a_number() {
        let err = check("function main() { var a = [1]; var b = a[true]; }").unwrap_err();
        assert!(matches!(err, TypeError::Mismatch { .. }));
    }

    #[test]
    fn rejects_lookup_on_a_non_indexable_type() {
        let err = check("function main() { var x = 1; var y = x[0]; }").unwrap_err();
        assert!(matches!(err, TypeError::NotIndexable(_)));
    }

    #[test]
    fn length_of_array_is_a_number() {
        assert!(check("function main() { var a = [1, 2, 3]; var n = Length(a); n = 4; }").is_ok());
    }

    #[test]
    fn rejects_length_of_a_non_array() {
        let err = check("function main() { var x = 1; var n = Length(x); }").unwrap_err();
        assert!(matches!(err, TypeError::NotIndexable(_)));
    }

    #[test]
    fn rejects_return_outside_a_function_body_context() {
        // `Return` only ever appears inside a parsed function body, but the checker itself
        // must still reject it if `return_type` is absent (e.g. a future top-level statement).
        let mut checker = Checker::new();
        let node = AstNode::Return(Box::new(AstNode::Num(1)));
        let err = checker.check(&node, &mut Locals::new(), None).unwrap_err();
        assert_eq!(err, TypeError::ReturnOutsideFunction);
    }

    #[test]
    fn putchar_is_callable_without_a_declaration() {
        assert!(check("function main() { putchar(65); }").is_ok());
    }

    #[test]
    fn rejects_undefined_variable_reference() {
        let err = check("function main() { return missing; }").unwrap_err();
        assert!(matches!(err, TypeError::UndefinedVariable(_)));
    }
}
