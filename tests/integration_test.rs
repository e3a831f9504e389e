// Integration tests for the pseudocode interpreter

use pseudomem::interpreter::constants::{DEFAULT_MAX_RECURSION_DEPTH, MAX_ARRAY_CELLS};
use pseudomem::interpreter::{
    BufferedHost, Interpreter, InterpreterConfig, RunOutcome, RuntimeError,
};
use pseudomem::parser::parse;
use pseudomem::snapshot::OutputKind;

fn run_with(
    source: &str,
    config: InterpreterConfig,
    mut host: BufferedHost,
) -> (Interpreter, BufferedHost, Result<RunOutcome, RuntimeError>) {
    let program = parse(source).expect("Parsing failed");
    let mut interpreter = Interpreter::new(program, config);
    let result = interpreter.run(&mut host);
    (interpreter, host, result)
}

fn run(source: &str) -> (Interpreter, BufferedHost, Result<RunOutcome, RuntimeError>) {
    run_with(source, InterpreterConfig::default(), BufferedHost::new())
}

/// Run a program that must complete, returning its OUTPUT lines
fn outputs(source: &str) -> Vec<String> {
    let (_, host, result) = run(source);
    assert_eq!(result, Ok(RunOutcome::Completed), "Execution failed: {:?}", result);
    host.outputs().into_iter().map(str::to_string).collect()
}

fn small_budget(max_iterations: u64) -> InterpreterConfig {
    InterpreterConfig {
        max_iterations,
        ..InterpreterConfig::default()
    }
}

#[test]
fn test_simple_arithmetic() {
    let source = r#"
        DECLARE x, y : INTEGER
        x ← 5
        y <-- x * 3 + 1
        OUTPUT "y = ", y
        OUTPUT 7 DIV 2, " ", 7 MOD 2, " ", 7 / 2
    "#;
    assert_eq!(outputs(source), vec!["y = 16", "3 1 3.5"]);
}

#[test]
fn test_for_loop_counts_up() {
    let source = r#"
        FOR i ← 1 TO 5 STEP 1
            OUTPUT i
        NEXT i
    "#;
    assert_eq!(outputs(source), vec!["1", "2", "3", "4", "5"]);
}

#[test]
fn test_for_loop_negative_fractional_step_floors() {
    let source = r#"
        FOR i ← 5 TO 1 STEP -1.5
            OUTPUT i
        NEXT i
    "#;
    assert_eq!(outputs(source), vec!["5", "3", "1"]);
}

#[test]
fn test_for_loop_positive_fractional_step_drops_fraction() {
    let source = r#"
        FOR i ← 1 TO 5 STEP 1.5
            OUTPUT i
        NEXT i
    "#;
    assert_eq!(outputs(source), vec!["1", "2", "3", "4", "5"]);
}

#[test]
fn test_for_loop_sub_unit_step_hits_iteration_budget() {
    let source = r#"
        FOR i ← 1 TO 3 STEP 0.5
        NEXT i
    "#;
    let (interpreter, _, result) = run_with(source, small_budget(50), BufferedHost::new());
    assert_eq!(
        result,
        Err(RuntimeError::IterationLimit { limit: 50, line: 2 })
    );
    assert_eq!(interpreter.iterations(), 51);
}

#[test]
fn test_for_loop_zero_step_is_an_error() {
    let source = "FOR i ← 1 TO 3 STEP 0\nNEXT i\n";
    let (_, _, result) = run(source);
    assert_eq!(result, Err(RuntimeError::ZeroStep { line: 1 }));
}

#[test]
fn test_for_loop_end_is_evaluated_once() {
    let source = r#"
        DECLARE n : INTEGER
        n ← 3
        FOR i ← 1 TO n
            n ← 10
            OUTPUT i
        NEXT
    "#;
    assert_eq!(outputs(source), vec!["1", "2", "3"]);
}

#[test]
fn test_while_and_repeat() {
    let source = r#"
        DECLARE n : INTEGER
        n ← 0
        WHILE n < 3 DO
            n ← n + 1
        ENDWHILE
        OUTPUT n
        REPEAT
            n ← n - 1
        UNTIL n <= 0
        OUTPUT n
        WHILE FALSE
            OUTPUT "never"
        ENDWHILE
    "#;
    assert_eq!(outputs(source), vec!["3", "0"]);
}

#[test]
fn test_infinite_while_hits_iteration_budget() {
    let source = r#"
        WHILE TRUE
        ENDWHILE
    "#;
    let (_, _, result) = run_with(source, small_budget(100), BufferedHost::new());
    assert!(matches!(result, Err(RuntimeError::IterationLimit { limit: 100, .. })));
}

#[test]
fn test_if_condition_must_be_boolean() {
    let source = r#"
        IF 1 THEN
            OUTPUT "yes"
        ENDIF
    "#;
    let (_, _, result) = run(source);
    assert!(matches!(result, Err(RuntimeError::TypeMismatch { line: 2, .. })));
}

#[test]
fn test_if_else() {
    let source = r#"
        DECLARE age : INTEGER
        age ← 17
        IF age >= 18 AND age < 65
            THEN
                OUTPUT "adult"
            ELSE
                OUTPUT "not adult"
        ENDIF
    "#;
    assert_eq!(outputs(source), vec!["not adult"]);
}

#[test]
fn test_case_range_is_inclusive() {
    let program = |m: i32| {
        format!(
            "DECLARE m : INTEGER\nm ← {}\nCASE OF m\n  50 TO 59 : OUTPUT \"fifties\"\n  OTHERWISE : OUTPUT \"other\"\nENDCASE\n",
            m
        )
    };
    assert_eq!(outputs(&program(50)), vec!["fifties"]);
    assert_eq!(outputs(&program(59)), vec!["fifties"]);
    assert_eq!(outputs(&program(60)), vec!["other"]);
}

#[test]
fn test_case_first_match_wins() {
    let source = r#"
        DECLARE c : CHAR
        c ← 'b'
        CASE OF c
            'a' : OUTPUT "A"
            'a' TO 'z' : OUTPUT "lower"
            'b' : OUTPUT "B"
        ENDCASE
    "#;
    assert_eq!(outputs(source), vec!["lower"]);
}

#[test]
fn test_byref_mutates_caller_and_byval_does_not() {
    let source = r#"
        PROCEDURE Bump(BYREF a : INTEGER, BYVAL b : INTEGER)
            a ← a + 1
            b ← b + 1
        ENDPROCEDURE

        DECLARE x, y : INTEGER
        x ← 1
        y ← 1
        CALL Bump(x, y)
        OUTPUT x, " ", y
    "#;
    assert_eq!(outputs(source), vec!["2 1"]);
}

#[test]
fn test_byref_needs_a_variable() {
    let source = r#"
        PROCEDURE Set(BYREF a : INTEGER)
            a ← 0
        ENDPROCEDURE
        CALL Set(3)
    "#;
    let (_, _, result) = run(source);
    assert!(matches!(result, Err(RuntimeError::TypeMismatch { line: 5, .. })));
}

#[test]
fn test_argument_count_must_match() {
    let source = r#"
        FUNCTION Add(a : INTEGER, b : INTEGER) RETURNS INTEGER
            RETURN a + b
        ENDFUNCTION
        OUTPUT Add(1)
    "#;
    let (_, _, result) = run(source);
    assert_eq!(
        result,
        Err(RuntimeError::ArgumentCountMismatch {
            name: "Add".into(),
            expected: 2,
            got: 1,
            line: 5
        })
    );
}

#[test]
fn test_recursive_function() {
    let source = r#"
        FUNCTION Fact(n : INTEGER) RETURNS INTEGER
            IF n <= 1 THEN
                RETURN 1
            ENDIF
            RETURN n * Fact(n - 1)
        ENDFUNCTION
        OUTPUT Fact(10)
    "#;
    assert_eq!(outputs(source), vec!["3628800"]);
}

#[test]
fn test_recursion_limit_is_exact() {
    let source = r#"
        DECLARE depth : INTEGER
        depth ← 0
        PROCEDURE Dive
            depth ← depth + 1
            CALL Dive
        ENDPROCEDURE
        CALL Dive
    "#;
    let config = InterpreterConfig {
        max_recursion_depth: 10,
        ..InterpreterConfig::default()
    };
    let (interpreter, _, result) = run_with(source, config, BufferedHost::new());

    assert!(matches!(
        result,
        Err(RuntimeError::RecursionLimit { limit: 10, ref name, .. }) if name == "Dive"
    ));
    assert_eq!(interpreter.global("depth"), Some(pseudomem::memory::value::Value::Number(10.0)));
    assert!(interpreter.call_stack().is_empty());
}

#[test]
fn test_unbounded_procedure_recursion_stops_at_default_limit() {
    let source = r#"
        PROCEDURE Forever(n : INTEGER)
            DECLARE pad : ARRAY[1:8] OF STRING
            IF n >= 0 THEN
                CALL Forever(n + 1)
            ENDIF
        ENDPROCEDURE
        CALL Forever(0)
    "#;
    let (interpreter, _, result) = run(source);

    assert!(matches!(
        result,
        Err(RuntimeError::RecursionLimit { limit: DEFAULT_MAX_RECURSION_DEPTH, ref name, line: 5 })
            if name == "Forever"
    ));
    assert!(interpreter.call_stack().is_empty());
}

#[test]
fn test_unbounded_function_recursion_stops_at_default_limit() {
    let source = r#"
        FUNCTION Down(n : INTEGER) RETURNS INTEGER
            IF n = n THEN
                RETURN 1 + (2 * (3 + Down(n - 1)))
            ENDIF
            RETURN 0
        ENDFUNCTION
        OUTPUT Down(1)
    "#;
    let (_, host, result) = run(source);

    assert!(host.outputs().is_empty());
    assert!(matches!(
        result,
        Err(RuntimeError::RecursionLimit { limit: DEFAULT_MAX_RECURSION_DEPTH, ref name, .. })
            if name == "Down"
    ));
}

#[test]
fn test_recursion_just_under_the_default_limit_completes() {
    let source = format!(
        r#"
        FUNCTION Sum(n : INTEGER) RETURNS INTEGER
            IF n = 0 THEN
                RETURN 0
            ENDIF
            RETURN n + Sum(n - 1)
        ENDFUNCTION
        OUTPUT Sum({})
    "#,
        DEFAULT_MAX_RECURSION_DEPTH - 1
    );
    let n = DEFAULT_MAX_RECURSION_DEPTH - 1;
    assert_eq!(outputs(&source), vec![(n * (n + 1) / 2).to_string()]);
}

#[test]
fn test_function_without_return_is_an_error() {
    let source = r#"
        FUNCTION Nothing RETURNS INTEGER
            DECLARE x : INTEGER
        ENDFUNCTION
        OUTPUT Nothing()
    "#;
    let (_, _, result) = run(source);
    assert!(matches!(result, Err(RuntimeError::MissingReturn { ref name, .. }) if name == "Nothing"));
}

#[test]
fn test_function_cannot_output() {
    let source = r#"
        FUNCTION Loud(x : INTEGER) RETURNS INTEGER
            OUTPUT "side effect"
            RETURN x
        ENDFUNCTION
        DECLARE y : INTEGER
        y ← Loud(1)
    "#;
    let (_, host, result) = run(source);
    assert_eq!(
        result,
        Err(RuntimeError::IllegalInFunction {
            statement: "OUTPUT",
            line: 3
        })
    );
    assert!(host.lines.is_empty());
}

#[test]
fn test_procedure_called_from_function_cannot_input() {
    let source = r#"
        PROCEDURE Ask
            DECLARE n : INTEGER
            INPUT n
        ENDPROCEDURE
        FUNCTION Wrapper RETURNS BOOLEAN
            CALL Ask
            RETURN TRUE
        ENDFUNCTION
        OUTPUT Wrapper()
    "#;
    let (_, host, result) = run_with(
        source,
        InterpreterConfig::default(),
        BufferedHost::with_inputs(["1"]),
    );
    assert!(matches!(
        result,
        Err(RuntimeError::IllegalInFunction { statement: "INPUT", .. })
    ));
    assert!(host.prompts.is_empty());
}

#[test]
fn test_procedures_see_globals_but_not_caller_locals() {
    let source = r#"
        DECLARE g : INTEGER
        g ← 7
        PROCEDURE Inner
            OUTPUT g
            OUTPUT local
        ENDPROCEDURE
        PROCEDURE Outer
            DECLARE local : INTEGER
            local ← 1
            CALL Inner
        ENDPROCEDURE
        CALL Outer
    "#;
    let (_, host, result) = run(source);
    assert_eq!(host.outputs(), vec!["7"]);
    assert!(matches!(result, Err(RuntimeError::UndefinedVariable { ref name, .. }) if name == "local"));
}

#[test]
fn test_uninitialized_variable_read() {
    let source = "DECLARE x : INTEGER\nOUTPUT x\n";
    let (_, _, result) = run(source);
    assert_eq!(
        result,
        Err(RuntimeError::UninitializedRead {
            name: "x".into(),
            line: 2
        })
    );

    assert_eq!(outputs("DECLARE x : INTEGER\nx ← 3\nOUTPUT x\n"), vec!["3"]);
}

#[test]
fn test_uninitialized_array_element_read() {
    let source = r#"
        DECLARE A : ARRAY[1:3] OF INTEGER
        A[1] ← 5
        OUTPUT A[1]
        OUTPUT A[2]
    "#;
    let (_, host, result) = run(source);
    assert_eq!(host.outputs(), vec!["5"]);
    assert_eq!(
        result,
        Err(RuntimeError::UninitializedRead {
            name: "A[2]".into(),
            line: 5
        })
    );
}

#[test]
fn test_two_dimensional_array() {
    let source = r#"
        DECLARE Grid : ARRAY[1:3, 1:3] OF INTEGER
        FOR r ← 1 TO 3
            FOR c ← 1 TO 3
                Grid[r, c] ← r * 10 + c
            NEXT c
        NEXT r
        OUTPUT Grid[2, 3], " ", Grid[3, 1]
        OUTPUT Grid[4, 1]
    "#;
    let (_, host, result) = run(source);
    assert_eq!(host.outputs(), vec!["23 31"]);
    assert!(matches!(
        result,
        Err(RuntimeError::IndexOutOfBounds { index: 4, lower: 1, upper: 3, .. })
    ));
}

#[test]
fn test_array_shape_overflow_is_refused() {
    let source = r#"
        DECLARE Huge : ARRAY[1:9000000000, 1:9000000000] OF INTEGER
        OUTPUT "unreachable"
    "#;
    let (_, host, result) = run(source);
    assert!(host.outputs().is_empty());
    assert!(matches!(result, Err(RuntimeError::InvalidArgument { line: 2, .. })));
}

#[test]
fn test_array_larger_than_cell_cap_is_refused() {
    let source = format!(
        "DECLARE Big : ARRAY[0:{}] OF BOOLEAN\nOUTPUT \"unreachable\"\n",
        MAX_ARRAY_CELLS
    );
    let (interpreter, host, result) = run(&source);
    assert!(host.outputs().is_empty());
    assert!(matches!(
        result,
        Err(RuntimeError::InvalidArgument { ref message, line: 1 }) if message.contains("Big")
    ));
    assert_eq!(interpreter.global("Big"), None);

    let source = format!("DECLARE Edge : ARRAY[1:{}] OF BOOLEAN\nOUTPUT \"ok\"\n", MAX_ARRAY_CELLS);
    assert_eq!(outputs(&source), vec!["ok"]);
}

#[test]
fn test_constant_cannot_be_assigned() {
    let source = r#"
        CONSTANT Pi = 3.14
        OUTPUT Pi
        Pi ← 3
    "#;
    let (_, host, result) = run(source);
    assert_eq!(host.outputs(), vec!["3.14"]);
    assert_eq!(
        result,
        Err(RuntimeError::ConstantAssignment {
            name: "Pi".into(),
            line: 4
        })
    );
}

#[test]
fn test_integer_rejects_fractional_value() {
    let source = "DECLARE n : INTEGER\nn ← 7 / 2\n";
    let (_, _, result) = run(source);
    assert!(matches!(result, Err(RuntimeError::TypeMismatch { line: 2, .. })));
}

#[test]
fn test_division_by_zero() {
    let (_, _, result) = run("OUTPUT 1 / 0\n");
    assert_eq!(
        result,
        Err(RuntimeError::DivisionByZero {
            operation: "Division",
            line: 1
        })
    );
}

#[test]
fn test_string_builtins_and_concatenation() {
    let source = r#"
        DECLARE s : STRING
        s ← "Hello World"
        OUTPUT LENGTH(s)
        OUTPUT UCASE(LEFT(s, 5)) & "/" & MID(s, 7, 5)
        OUTPUT "n" & 3 & TRUE
    "#;
    assert_eq!(outputs(source), vec!["11", "HELLO/World", "n3TRUE"]);
}

#[test]
fn test_user_function_shadows_builtin() {
    let source = r#"
        FUNCTION LENGTH(s : STRING) RETURNS INTEGER
            RETURN 99
        ENDFUNCTION
        OUTPUT LENGTH("abc")
    "#;
    assert_eq!(outputs(source), vec!["99"]);
}

#[test]
fn test_input_is_converted_and_echoed() {
    let source = r#"
        DECLARE n : INTEGER
        DECLARE ok : BOOLEAN
        INPUT n
        INPUT ok
        OUTPUT n * 2, " ", NOT ok
    "#;
    let (interpreter, host, result) = run_with(
        source,
        InterpreterConfig::default(),
        BufferedHost::with_inputs(["21", "false"]),
    );
    assert_eq!(result, Ok(RunOutcome::Completed));
    assert_eq!(host.texts(OutputKind::InputEcho), vec!["21", "false"]);
    assert_eq!(host.outputs(), vec!["42 TRUE"]);
    assert_eq!(host.prompts[0].0, "n");
    assert_eq!(interpreter.transcript().len(), 3);
}

#[test]
fn test_invalid_input_is_an_error() {
    let source = "DECLARE n : INTEGER\nINPUT n\n";
    let (_, _, result) = run_with(
        source,
        InterpreterConfig::default(),
        BufferedHost::with_inputs(["abc"]),
    );
    assert!(matches!(result, Err(RuntimeError::InvalidInput { ref input, .. }) if input == "abc"));
}

#[test]
fn test_missing_input_cancels_cleanly() {
    let source = r#"
        DECLARE n : INTEGER
        OUTPUT "before"
        INPUT n
        OUTPUT "after"
    "#;
    let (_, host, result) = run(source);
    assert_eq!(result, Ok(RunOutcome::Cancelled));
    assert_eq!(host.outputs(), vec!["before"]);
}

#[test]
fn test_cancel_token_stops_before_first_statement() {
    let program = parse("OUTPUT \"never\"\n").expect("Parsing failed");
    let mut interpreter = Interpreter::new(program, InterpreterConfig::default());
    interpreter.cancel_token().cancel();

    let mut host = BufferedHost::new();
    assert_eq!(interpreter.run(&mut host), Ok(RunOutcome::Cancelled));
    assert!(host.lines.is_empty());
}

#[test]
fn test_second_run_is_refused_and_keeps_state() {
    let program = parse("DECLARE n : INTEGER\nn ← 3\nOUTPUT n\n").expect("Parsing failed");
    let mut interpreter = Interpreter::new(program, InterpreterConfig::default());

    let mut host = BufferedHost::new();
    assert_eq!(interpreter.run(&mut host), Ok(RunOutcome::Completed));
    let trace_len = interpreter.tracer().len();

    let mut again = BufferedHost::new();
    let err = interpreter.run(&mut again).unwrap_err();
    assert_eq!(err, RuntimeError::AlreadyRun);
    assert_eq!(err.line(), 0);
    assert!(again.lines.is_empty());
    assert_eq!(host.outputs(), vec!["3"]);
    assert_eq!(interpreter.tracer().len(), trace_len);
    assert_eq!(interpreter.global("n"), Some(pseudomem::memory::value::Value::Number(3.0)));
}

#[test]
fn test_debug_mode_steps_and_stops() {
    let source = r#"
        DECLARE x : INTEGER
        x ← 1
        OUTPUT x
        x ← 2
        OUTPUT x
    "#;
    let config = InterpreterConfig {
        debug: true,
        ..InterpreterConfig::default()
    };
    let (_, host, result) = run_with(source, config, BufferedHost::new().stop_after_steps(3));

    assert_eq!(result, Ok(RunOutcome::Cancelled));
    assert_eq!(host.outputs(), vec!["1"]);
    assert_eq!(host.snapshots.len(), 4);

    let third = &host.snapshots[2];
    assert_eq!(third.line, 4);
    assert!(third.paused);
    assert_eq!(
        third.variable("x").and_then(|v| v.value.clone()),
        Some(pseudomem::memory::value::Value::Number(1.0))
    );
}

#[test]
fn test_debug_mode_does_not_step_inside_functions() {
    let source = r#"
        FUNCTION Twice(n : INTEGER) RETURNS INTEGER
            DECLARE r : INTEGER
            r ← n * 2
            RETURN r
        ENDFUNCTION
        OUTPUT Twice(4)
    "#;
    let config = InterpreterConfig {
        debug: true,
        ..InterpreterConfig::default()
    };
    let (_, host, result) = run_with(source, config, BufferedHost::new());
    assert_eq!(result, Ok(RunOutcome::Completed));
    assert_eq!(host.outputs(), vec!["8"]);
    assert_eq!(host.snapshots.len(), 1);
}

#[test]
fn test_files_round_trip() {
    let source = r#"
        DECLARE total : INTEGER
        DECLARE n : INTEGER
        total ← 0
        OPENFILE "numbers.txt" FOR READ
        WHILE NOT EOF("numbers.txt")
            READFILE "numbers.txt", n
            total ← total + n
        ENDWHILE
        CLOSEFILE "numbers.txt"
        OPENFILE "out.txt" FOR WRITE
        WRITEFILE "out.txt", "total " & total
        CLOSEFILE "out.txt"
        OUTPUT total
    "#;
    let config = InterpreterConfig {
        echo_file_writes: true,
        ..InterpreterConfig::default()
    };
    let host = BufferedHost::new().with_file("numbers.txt", "1\n2\n3\n");
    let (interpreter, host, result) = run_with(source, config, host);

    assert_eq!(result, Ok(RunOutcome::Completed));
    assert_eq!(host.outputs(), vec!["6"]);
    assert_eq!(host.texts(OutputKind::FileWrite), vec!["total 6"]);
    assert_eq!(
        interpreter.files().get("out.txt").map(|f| f.contents()),
        Some("total 6\n".to_string())
    );
}

#[test]
fn test_reading_missing_file_is_an_error() {
    let (_, _, result) = run("OPENFILE \"nope.txt\" FOR READ\n");
    assert!(matches!(result, Err(RuntimeError::File { line: 1, .. })));
}

#[test]
fn test_duplicate_procedure_is_rejected_before_running() {
    let source = r#"
        OUTPUT "start"
        PROCEDURE P
        ENDPROCEDURE
        PROCEDURE P
        ENDPROCEDURE
    "#;
    let (_, host, result) = run(source);
    assert!(matches!(result, Err(RuntimeError::Redeclaration { line: 5, .. })));
    assert!(host.lines.is_empty());
}

#[test]
fn test_error_message_carries_line() {
    let (_, _, result) = run("DECLARE s : STRING\ns ← \"a\"\nOUTPUT s - 1\n");
    let err = result.unwrap_err();
    assert_eq!(err.line(), 3);
    assert!(err.to_string().contains("line 3"));
}

#[test]
fn test_run_source_reports_syntax_errors() {
    let mut host = BufferedHost::new();
    let err = pseudomem::run_source("OUTPUT (1\n", InterpreterConfig::default(), &mut host)
        .unwrap_err();
    assert!(matches!(err, pseudomem::Error::Syntax(_)));
    assert_eq!(err.line(), 1);
}
