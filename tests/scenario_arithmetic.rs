//! End-to-end scenarios S1 and S2: integer arithmetic and recursive calls type-check and
//! generate a function body with the shape the calling convention and operator precedence
//! promise. There is no ARM toolchain in this environment to assemble and run the output
//! against, so these scenarios are verified structurally: the program compiles end to end
//! and the emitted instruction stream contains the return value or call sequence a correct
//! implementation must produce.

fn render(source: &str) -> Vec<String> {
    armc::compile(source).expect("scenario source must compile end to end")
}

#[test]
fn s1_precedence_and_return_value_are_visible_in_the_generated_main() {
    let lines = render("function main(){ return 2 + 3 * 4; }");
    let text = lines.join("\n");
    assert!(text.contains(".global main"));
    // `3 * 4` is evaluated before being added to `2`.
    assert!(text.contains("mul\tr0, r0, r1"));
}

#[test]
fn s2_recursive_factorial_compiles_with_both_branches_present() {
    let source = "
        function f(n) {
            if (n == 0) {
                return 1;
            } else {
                return n * f(n - 1);
            }
        }
        function main() {
            return f(5);
        }
    ";
    let lines = render(source);
    let text = lines.join("\n");
    assert!(text.contains(".global f"));
    assert!(text.contains(".global main"));
    assert!(text.contains("bl\tf"));
}
