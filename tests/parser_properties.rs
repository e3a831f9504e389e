// Property tests for the lexer, parser and arithmetic

use pseudomem::interpreter::constants::MAX_NESTING_DEPTH;
use pseudomem::interpreter::{BufferedHost, InterpreterConfig};
use pseudomem::parser::{parse, tokenize, TokenKind};
use quickcheck::TestResult;
use quickcheck_macros::quickcheck;

fn run_outputs(source: &str) -> Option<Vec<String>> {
    let mut host = BufferedHost::new();
    pseudomem::run_source(source, InterpreterConfig::default(), &mut host).ok()?;
    Some(host.outputs().into_iter().map(str::to_string).collect())
}

#[quickcheck]
fn tokenize_is_total(source: String) -> bool {
    match tokenize(&source) {
        Ok(tokens) => tokens.last().map(|t| &t.kind) == Some(&TokenKind::Eof),
        Err(e) => e.line() >= 1,
    }
}

#[quickcheck]
fn syntax_errors_point_into_the_source(source: String) -> TestResult {
    match parse(&source) {
        Ok(_) => TestResult::discard(),
        Err(e) => {
            let lines = source.split('\n').count();
            TestResult::from_bool(e.line() >= 1 && e.line() <= lines && e.column() >= 1)
        }
    }
}

#[quickcheck]
fn keyword_soup_never_panics(words: Vec<u8>) -> bool {
    const WORDS: &[&str] = &[
        "IF", "THEN", "ELSE", "ENDIF", "WHILE", "ENDWHILE", "FOR", "TO", "NEXT", "(", ")",
        "x", "1", "←", "\n", "*", "&", "CASE", "OF", ":", "OTHERWISE", "ENDCASE",
    ];
    let source: Vec<&str> = words
        .iter()
        .map(|w| WORDS[*w as usize % WORDS.len()])
        .collect();
    // Either outcome is fine; reaching here means no panic
    let _ = parse(&source.join(" "));
    true
}

#[quickcheck]
fn parenthesis_depth_is_bounded(depth: u16) -> bool {
    let depth = depth as usize;
    let source = format!("OUTPUT {}7{}\n", "(".repeat(depth), ")".repeat(depth));
    match parse(&source) {
        Ok(_) => depth < MAX_NESTING_DEPTH,
        Err(e) => depth >= MAX_NESTING_DEPTH && e.message.contains("nested"),
    }
}

#[quickcheck]
fn integer_literals_print_as_written(n: i32) -> bool {
    run_outputs(&format!("OUTPUT {}\n", n)) == Some(vec![n.to_string()])
}

#[quickcheck]
fn addition_matches_host_arithmetic(a: i16, b: i16) -> bool {
    let expected = (a as i32 + b as i32).to_string();
    run_outputs(&format!("OUTPUT {} + {}\n", a, b)) == Some(vec![expected])
}

#[quickcheck]
fn div_and_mod_reconstruct_the_dividend(a: i16, b: i16) -> TestResult {
    if b == 0 {
        return TestResult::discard();
    }
    let source = format!(
        "DECLARE q, r : INTEGER\nq ← {a} DIV {b}\nr ← {a} MOD {b}\nOUTPUT q * {b} + r\n",
        a = a,
        b = b
    );
    TestResult::from_bool(run_outputs(&source) == Some(vec![a.to_string()]))
}
