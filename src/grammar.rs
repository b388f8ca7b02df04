//! The concrete grammar, built on top of the [`crate::combinators`] algebra.
//!
//! There is no separate lexer pass: every rule below matches directly against the source text
//! through a [`Cursor`], and [`token`] is the only place whitespace/comments get skipped -
//! right after each terminal, never before.

use std::fmt;

use colored::Colorize;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::AstNode;
use crate::combinators::{
    error, maybe, placeholder, separated_list, seq2, seq4, seq5, zero_or_more, Parser,
};
use crate::cursor::Cursor;
use crate::types::{FunctionType, Type};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub index: usize,
    pub line: usize,
    pub col: usize,
    source_line: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ParseError { message, line, col, source_line, .. } = self;
        let margin = " ".repeat(format!("{line}").len());
        let padding = " ".repeat(col.saturating_sub(1));
        let caret = "^".red();
        write!(f, "{margin} |\n{line} |{source_line}\n{margin} |{padding}{caret} {message}")
    }
}

impl std::error::Error for ParseError {}

fn compile(pattern: &str) -> Regex {
    Regex::new(&format!("^(?:{pattern})")).unwrap_or_else(|e| panic!("invalid pattern {pattern}: {e}"))
}

fn regexp(pattern: &str) -> Parser<String> {
    let compiled = compile(pattern);
    Parser::new(move |cursor: Cursor| Ok(cursor.matching(&compiled)))
}

static IGNORED: Lazy<String> = Lazy::new(|| {
    let whitespace = r"\s+";
    let line_comment = r"//[^\n]*";
    let block_comment = r"(?s:/\*.*?\*/)";
    format!("(?:{whitespace}|{line_comment}|{block_comment})")
});

fn ignored() -> Parser<()> {
    zero_or_more(regexp(&IGNORED)).map(|_| ())
}

/// Matches `pattern` then swallows any trailing ignored input. Every terminal in the grammar
/// goes through this - there is no other place ignored input is consumed.
fn token(pattern: &str) -> Parser<String> {
    regexp(pattern).bind(|text: String| ignored().map(move |_| text))
}

fn keyword(word: &str) -> Parser<()> {
    token(&format!("{word}\\b")).map(|_| ())
}

fn punct(literal: &str) -> Parser<()> {
    token(&regex::escape(literal)).map(|_| ())
}

fn identifier() -> Parser<String> {
    token(r"[A-Za-z_][A-Za-z0-9_]*")
}

fn number() -> Parser<i32> {
    token(r"[0-9]+").try_map(|digits| {
        digits
            .parse::<i32>()
            .map_err(|_| format!("integer literal '{digits}' is out of range for a 32-bit value"))
    })
}

/// Internal marker produced by an operator token; applied during left-associative folding.
#[derive(Debug, Clone, Copy)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    NotEq,
}

impl BinOp {
    fn apply(self, left: AstNode, right: AstNode) -> AstNode {
        let (l, r) = (Box::new(left), Box::new(right));
        match self {
            BinOp::Add => AstNode::Add(l, r),
            BinOp::Sub => AstNode::Subtract(l, r),
            BinOp::Mul => AstNode::Multiply(l, r),
            BinOp::Div => AstNode::Divide(l, r),
            BinOp::Eq => AstNode::Equal(l, r),
            BinOp::NotEq => AstNode::NotEqual(l, r),
        }
    }
}

/// `operand (operator operand)*`, folded left-associatively: `a op b op c` becomes
/// `apply(apply(a, op, b), op, c)`.
fn left_assoc(operand: Parser<AstNode>, operator: Parser<BinOp>) -> Parser<AstNode> {
    let tail = zero_or_more(seq2(operator, operand.clone()));
    operand.bind(move |first| {
        tail.clone()
            .map(move |rest| rest.into_iter().fold(first.clone(), |acc, (op, rhs)| op.apply(acc, rhs)))
    })
}

/// Builds the whole grammar and returns the `statement` parser, which is what `program`
/// (zero or more statements) is built from. Forward references for `expression`, `statement`
/// and `type` are patched here, once, at construction time.
pub fn build_statement_parser() -> Parser<AstNode> {
    let (expression, patch_expression) = placeholder::<AstNode>();
    let (statement, patch_statement) = placeholder::<AstNode>();
    let (type_rule, patch_type) = placeholder::<Type>();

    // ---- type ----
    let array_type = seq4(keyword("array"), punct("<"), type_rule.clone(), punct(">"))
        .map(|(_, _, inner, _)| Type::Array(Box::new(inner)));
    let concrete_type = keyword("void")
        .map(|_| Type::Void)
        .or(keyword("bool").map(|_| Type::Bool))
        .or(keyword("number").map(|_| Type::Number))
        .or(keyword("string").map(|_| Type::String))
        .or(array_type);
    patch_type(concrete_type);

    // A type annotation defaults to `number` when omitted - the only default the grammar
    // itself documents, applied uniformly to both parameter and return-type positions.
    let opt_type_annotation = maybe(punct(":").and(type_rule.clone())).map(|ty| ty.unwrap_or(Type::Number));

    // ---- literals & atoms ----
    let num_lit = number().map(AstNode::Num);
    let bool_lit = keyword("true")
        .map(|_| AstNode::Bool(true))
        .or(keyword("false").map(|_| AstNode::Bool(false)));
    let undefined_lit = keyword("undefined").map(|_| AstNode::Undefined);
    let null_lit = keyword("null").map(|_| AstNode::Null);

    let string_body = token(r#"[A-Za-z0-9 ]*"#);
    let string_lit = punct("\"").and(string_body).bind(move |text| {
        let text = text.clone();
        punct("\"").map(move |_| AstNode::StringLiteral(text.clone()))
    });

    let array_lit = {
        let expression = expression.clone();
        punct("[")
            .and(separated_list(expression, punct(",")))
            .bind(move |elements| punct("]").map(move |_| AstNode::ArrayLiteral(elements.clone())))
    };

    // `Length` is syntactically a call (`Length(a)`) but produces its own node: there is no
    // separate nonterminal for it, it is just the one callee name the grammar recognizes
    // instead of emitting a generic `Call`.
    let call = {
        let expression = expression.clone();
        seq2(identifier(), punct("(")).bind(move |(name, _)| {
            let expression = expression.clone();
            separated_list(expression, punct(",")).bind(move |args| {
                let name = name.clone();
                punct(")").map(move |_| {
                    if name == "Length" && args.len() == 1 {
                        AstNode::Length(Box::new(args[0].clone()))
                    } else {
                        AstNode::Call { callee: name.clone(), args: args.clone() }
                    }
                })
            })
        })
    };

    let array_lookup = {
        let expression = expression.clone();
        seq2(identifier(), punct("[")).bind(move |(name, _)| {
            let name = name.clone();
            expression.clone().bind(move |index| {
                let name = name.clone();
                punct("]").map(move |_| AstNode::ArrayLookup {
                    array: Box::new(AstNode::Id(name.clone())),
                    index: Box::new(index.clone()),
                })
            })
        })
    };

    let scalar = bool_lit
        .or(undefined_lit)
        .or(null_lit)
        .or(identifier().map(AstNode::Id))
        .or(num_lit);

    let parenthesized = {
        let expression = expression.clone();
        punct("(")
            .and(expression)
            .bind(move |inner| punct(")").map(move |_| inner.clone()))
    };

    let atom = call
        .or(array_lit)
        .or(string_lit)
        .or(array_lookup)
        .or(scalar)
        .or(parenthesized);

    let unary = maybe(punct("!")).bind(move |bang| {
        let atom = atom.clone();
        atom.map(move |value| match bang {
            Some(_) => AstNode::Not(Box::new(value)),
            None => value,
        })
    });

    // ---- expression precedence layers ----
    let mul_op = punct("*").map(|_| BinOp::Mul).or(punct("/").map(|_| BinOp::Div));
    let product = left_assoc(unary, mul_op);

    let add_op = punct("+").map(|_| BinOp::Add).or(punct("-").map(|_| BinOp::Sub));
    let sum = left_assoc(product, add_op);

    let eq_op = punct("==").map(|_| BinOp::Eq).or(punct("!=").map(|_| BinOp::NotEq));
    let comparison = left_assoc(sum, eq_op);

    patch_expression(comparison);

    // ---- statements ----
    let return_stmt = {
        let expression = expression.clone();
        keyword("return").and(expression).bind(move |value| {
            let value = value.clone();
            punct(";").map(move |_| AstNode::Return(Box::new(value.clone())))
        })
    };

    let parameter = seq2(identifier(), opt_type_annotation.clone());
    let parameters = separated_list(parameter, punct(","));

    let func_stmt = {
        let statement = statement.clone();
        seq5(
            keyword("function").and(identifier()),
            punct("("),
            parameters,
            punct(")"),
            opt_type_annotation.clone(),
        )
        .bind(move |(name, _, params, _, return_type)| {
            let statement = statement.clone();
            statement.map(move |body| AstNode::Func {
                name: name.clone(),
                signature: FunctionType {
                    parameters: params.clone(),
                    return_type: return_type.clone(),
                },
                body: Box::new(body),
            })
        })
    };

    let if_stmt = {
        let expression = expression.clone();
        let statement = statement.clone();
        let statement_for_else = statement.clone();
        seq4(
            keyword("if").and(punct("(")).and(expression),
            punct(")"),
            statement,
            keyword("else"),
        )
        .bind(move |(condition, _, then_branch, _)| {
            let statement_for_else = statement_for_else.clone();
            statement_for_else.map(move |else_branch| AstNode::If {
                condition: Box::new(condition.clone()),
                then_branch: Box::new(then_branch.clone()),
                else_branch: Box::new(else_branch),
            })
        })
    };

    let while_stmt = {
        let expression = expression.clone();
        let statement = statement.clone();
        seq2(keyword("while").and(punct("(")).and(expression), punct(")")).bind(move |(condition, _)| {
            let statement = statement.clone();
            statement.map(move |body| AstNode::While {
                condition: Box::new(condition.clone()),
                body: Box::new(body),
            })
        })
    };

    let for_stmt = {
        let statement = statement.clone();
        let statement_for_body = statement.clone();
        seq4(
            keyword("for").and(punct("(")),
            statement.clone(),
            statement.clone(),
            statement,
        )
        .bind(move |(_, init, condition, step)| {
            let statement_for_body = statement_for_body.clone();
            punct(")").and(statement_for_body).map(move |body| AstNode::For {
                init: Box::new(init.clone()),
                condition: Box::new(condition.clone()),
                step: Box::new(step.clone()),
                body: Box::new(body),
            })
        })
    };

    let var_stmt = {
        let expression = expression.clone();
        keyword("var")
            .and(identifier())
            .bind(move |name| {
                let name = name.clone();
                opt_type_annotation.clone().map(move |_| name.clone())
            })
            .bind(move |name| {
                let name = name.clone();
                let expression = expression.clone();
                punct("=").and(expression).bind(move |init| {
                    let name = name.clone();
                    punct(";").map(move |_| AstNode::Var {
                        name: name.clone(),
                        init: Box::new(init.clone()),
                    })
                })
            })
    };

    let assign_stmt = {
        let expression = expression.clone();
        identifier().bind(move |name| {
            let name = name.clone();
            let expression = expression.clone();
            punct("=").and(expression).bind(move |value| {
                let name = name.clone();
                punct(";").map(move |_| AstNode::Assign {
                    name: name.clone(),
                    value: Box::new(value.clone()),
                })
            })
        })
    };

    let block_stmt = {
        let statement = statement.clone();
        punct("{")
            .and(zero_or_more(statement))
            .bind(move |statements| punct("}").map(move |_| AstNode::Block(statements.clone())))
    };

    let expr_stmt = {
        let expression = expression.clone();
        expression.bind(move |value| {
            let value = value.clone();
            punct(";").map(move |_| value.clone())
        })
    };

    let full_statement = return_stmt
        .or(func_stmt)
        .or(if_stmt)
        .or(while_stmt)
        .or(for_stmt)
        .or(var_stmt)
        .or(assign_stmt)
        .or(block_stmt)
        .or(expr_stmt)
        .or(error("expected a statement"));

    patch_statement(full_statement);

    statement
}

fn error_at(source: &str, index: usize, message: String) -> ParseError {
    let span = crate::cursor::Span::locate(source, index);
    let source_line = source.lines().nth(span.line - 1).unwrap_or("").to_string();
    ParseError { message, index, line: span.line, col: span.col, source_line }
}

pub fn parse_program(source: &str) -> Result<Vec<AstNode>, ParseError> {
    let statement = build_statement_parser();
    let program = ignored().and(zero_or_more(statement));
    let cursor = Cursor::new(source);

    match program.parse(cursor.clone()) {
        Err(fatal) => {
            let index = cursor.furthest();
            Err(error_at(source, index, fatal.0))
        }
        Ok(Some((statements, rest))) => {
            if rest.at_end() {
                Ok(statements)
            } else {
                let index = rest.furthest();
                Err(error_at(source, index, format!("Parse error at index {index}")))
            }
        }
        Ok(None) => unreachable!("zero_or_more always succeeds"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_trivial_function() {
        let program = parse_program("function main() { return 1; }").unwrap();
        assert_eq!(program.len(), 1);
        assert!(matches!(program[0], AstNode::Func { .. }));
    }

    #[test]
    fn precedence_sum_before_product_is_rejected_left_to_right() {
        let program = parse_program("function main() { return 2 + 3 * 4; }").unwrap();
        let AstNode::Func { body, .. } = &program[0] else {
            panic!("expected Func")
        };
        let AstNode::Block(statements) = body.as_ref() else {
            panic!("expected Block")
        };
        let AstNode::Return(expr) = &statements[0] else {
            panic!("expected Return")
        };
        assert_eq!(
            **expr,
            AstNode::Add(
                Box::new(AstNode::Num(2)),
                Box::new(AstNode::Multiply(Box::new(AstNode::Num(3)), Box::new(AstNode::Num(4))))
            )
        );
    }

    #[test]
    fn subtraction_is_left_associative() {
        let program = parse_program("function main() { return 10 - 3 - 2; }").unwrap();
        let AstNode::Func { body, .. } = &program[0] else {
            panic!("expected Func")
        };
        let AstNode::Block(statements) = body.as_ref() else {
            panic!("expected Block")
        };
        let AstNode::Return(expr) = &statements[0] else {
            panic!("expected Return")
        };
        assert_eq!(
            **expr,
            AstNode::Subtract(
                Box::new(AstNode::Subtract(Box::new(AstNode::Num(10)), Box::new(AstNode::Num(3)))),
                Box::new(AstNode::Num(2))
            )
        );
    }

    #[test]
    fn comparison_binds_looser_than_sum() {
        let program = parse_program("function main() { return 1 + 1 == 2; }").unwrap();
        let AstNode::Func { body, .. } = &program[0] else {
            panic!("expected Func")
        };
        let AstNode::Block(statements) = body.as_ref() else {
            panic!("expected Block")
        };
        let AstNode::Return(expr) = &statements[0] else {
            panic!("expected Return")
        };
        assert_eq!(
            **expr,
            AstNode::Equal(
                Box::new(AstNode::Add(Box::new(AstNode::Num(1)), Box::new(AstNode::Num(1)))),
                Box::new(AstNode::Num(2))
            )
        );
    }

    #[test]
    fn call_wins_over_array_lookup_and_bare_id() {
        let program = parse_program("function main() { return f(1); }").unwrap();
        let AstNode::Func { body, .. } = &program[0] else {
            panic!("expected Func")
        };
        let AstNode::Block(statements) = body.as_ref() else {
            panic!("expected Block")
        };
        let AstNode::Return(expr) = &statements[0] else {
            panic!("expected Return")
        };
        assert!(matches!(**expr, AstNode::Call { .. }));
    }

    #[test]
    fn array_literal_and_indexing_round_trip() {
        let program = parse_program("function main() { var a = [1, 2, 3]; return a[1]; }").unwrap();
        let AstNode::Func { body, .. } = &program[0] else {
            panic!("expected Func")
        };
        let AstNode::Block(statements) = body.as_ref() else {
            panic!("expected Block")
        };
        assert!(matches!(statements[0], AstNode::Var { .. }));
        let AstNode::Return(expr) = &statements[1] else {
            panic!("expected Return")
        };
        assert!(matches!(**expr, AstNode::ArrayLookup { .. }));
    }

    #[test]
    fn the_four_semicolon_for_loop_parses() {
        let program =
            parse_program("function main() { for (var i = 0; i != 3; i = i + 1;) { putchar(65); } }")
                .unwrap();
        let AstNode::Func { body, .. } = &program[0] else {
            panic!("expected Func")
        };
        let AstNode::Block(statements) = body.as_ref() else {
            panic!("expected Block")
        };
        assert!(matches!(statements[0], AstNode::For { .. }));
    }

    #[test]
    fn string_literal_is_distinct_from_array_literal_node() {
        let program = parse_program(r#"function main() { var s = "hi"; return s; }"#).unwrap();
        let AstNode::Func { body, .. } = &program[0] else {
            panic!("expected Func")
        };
        let AstNode::Block(statements) = body.as_ref() else {
            panic!("expected Block")
        };
        let AstNode::Var { init, .. } = &statements[0] else {
            panic!("expected Var")
        };
        assert_eq!(**init, AstNode::StringLiteral("hi".to_string()));
    }

    #[test]
    fn unclosed_block_reports_furthest_index() {
        let err = parse_program("function main() { return 1;").unwrap_err();
        assert!(err.message.starts_with("Parse error at index"));
    }

    #[test]
    fn parse_error_display_renders_the_offending_source_line() {
        let err = parse_program("function main() { return ; }").unwrap_err();
        let rendered = err.to_string();
        assert!(rendered.contains("function main() { return ; }"));
        assert_eq!(err.line, 1);
    }

    #[test]
    fn comments_and_whitespace_are_ignored_between_tokens() {
        let program = parse_program(
            "function main() {\n  // a comment\n  /* another */ return 1;\n}",
        )
        .unwrap();
        assert_eq!(program.len(), 1);
    }

    #[test]
    fn length_call_produces_a_dedicated_node_not_a_generic_call() {
        let program = parse_program("function main() { var a = [1]; return Length(a); }").unwrap();
        let AstNode::Func { body, .. } = &program[0] else {
            panic!("expected Func")
        };
        let AstNode::Block(statements) = body.as_ref() else {
            panic!("expected Block")
        };
        let AstNode::Return(expr) = &statements[1] else {
            panic!("expected Return")
        };
        assert!(matches!(**expr, AstNode::Length(_)));
    }

    #[test]
    fn type_annotation_defaults_to_number() {
        let program = parse_program("function f(x) { return x; }").unwrap();
        let AstNode::Func { signature, .. } = &program[0] else {
            panic!("expected Func")
        };
        assert_eq!(signature.parameters[0].1, Type::Number);
        assert_eq!(signature.return_type, Type::Number);
    }

    #[test]
    fn var_with_a_type_annotation_parses() {
        let program =
            parse_program("function main() { var x: bool = true; var y: number = 1; return y; }")
                .unwrap();
        let AstNode::Func { body, .. } = &program[0] else {
            panic!("expected Func")
        };
        let AstNode::Block(statements) = body.as_ref() else {
            panic!("expected Block")
        };
        assert!(matches!(statements[0], AstNode::Var { .. }));
        assert!(matches!(statements[1], AstNode::Var { .. }));
    }
}
