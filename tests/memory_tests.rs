// Tests for pointers, MALLOC/FREE and the operation trace

use pseudomem::interpreter::constants::RESERVED_ADDRESSES;
use pseudomem::interpreter::{BufferedHost, Interpreter, InterpreterConfig, RunOutcome, RuntimeError};
use pseudomem::memory::arena::MemoryFault;
use pseudomem::memory::value::Value;
use pseudomem::parser::parse;
use pseudomem::trace::OperationKind;

fn run_with(
    source: &str,
    config: InterpreterConfig,
) -> (Interpreter, BufferedHost, Result<RunOutcome, RuntimeError>) {
    let program = parse(source).expect("Parsing failed");
    let mut interpreter = Interpreter::new(program, config);
    let mut host = BufferedHost::new();
    let result = interpreter.run(&mut host);
    (interpreter, host, result)
}

fn run(source: &str) -> (Interpreter, BufferedHost, Result<RunOutcome, RuntimeError>) {
    run_with(source, InterpreterConfig::default())
}

fn memory_fault(result: &Result<RunOutcome, RuntimeError>) -> Option<(&MemoryFault, usize)> {
    let error = result.as_ref().err()?;
    error.memory_fault().map(|fault| (fault, error.line()))
}

#[test]
fn test_malloc_write_read_free() {
    let source = r#"
        DECLARE p : POINTER TO INTEGER
        p ← MALLOC(4, INTEGER)
        *p ← 42
        OUTPUT *p
        FREE(p)
        OUTPUT *p
    "#;
    let (interpreter, host, result) = run(source);

    assert_eq!(host.outputs(), vec!["42"]);
    assert_eq!(
        memory_fault(&result),
        Some((&MemoryFault::NotAllocated(RESERVED_ADDRESSES), 7))
    );
    assert_eq!(interpreter.arena().stats().live_blocks, 0);

    let stats = interpreter.tracer().stats();
    assert_eq!(stats.count(OperationKind::Allocate), 1);
    assert_eq!(stats.count(OperationKind::Free), 1);
}

#[test]
fn test_pointer_aliasing_updates_variable() {
    let source = r#"
        DECLARE x : INTEGER
        DECLARE p, q : ^INTEGER
        x ← 1
        p ← &x
        q ← p
        *q ← 99
        OUTPUT x, " ", *p
    "#;
    let (interpreter, host, result) = run(source);

    assert_eq!(result, Ok(RunOutcome::Completed));
    assert_eq!(host.outputs(), vec!["99 99"]);
    assert_eq!(interpreter.global("x"), Some(Value::Number(99.0)));

    let targets = interpreter.tracer().pointer_targets();
    assert_eq!(targets.get("p"), Some(&RESERVED_ADDRESSES));
    assert_eq!(targets.get("q"), Some(&RESERVED_ADDRESSES));

    // The arena copy of x follows the name as well
    assert_eq!(
        interpreter.arena().read(RESERVED_ADDRESSES),
        Ok(Value::Number(99.0))
    );
}

#[test]
fn test_address_of_is_stable() {
    let source = r#"
        DECLARE x : REAL
        DECLARE p, q : ^REAL
        x ← 2.5
        p ← &x
        q ← &x
        OUTPUT p = q
    "#;
    let (interpreter, host, _) = run(source);

    assert_eq!(host.outputs(), vec!["TRUE"]);
    let stats = interpreter.tracer().stats();
    assert_eq!(stats.count(OperationKind::AddressOf), 2);
    assert_eq!(stats.count(OperationKind::Allocate), 1);
    assert_eq!(interpreter.arena().used_slots(), 8);
}

#[test]
fn test_pointer_arithmetic_over_a_block() {
    let source = r#"
        DECLARE p : ^INTEGER
        DECLARE i : INTEGER
        p ← MALLOC(3, INTEGER)
        FOR i ← 0 TO 2
            *(p + i) ← i * 10
        NEXT i
        OUTPUT *(p + 2), " ", (p + 2) - p
    "#;
    let (_, host, result) = run(source);

    assert_eq!(result, Ok(RunOutcome::Completed));
    assert_eq!(host.outputs(), vec!["20 2"]);
}

#[test]
fn test_uninitialized_block_read() {
    let source = r#"
        DECLARE p : ^INTEGER
        p ← MALLOC(1)
        OUTPUT *p
    "#;
    let (_, _, result) = run(source);
    assert_eq!(
        memory_fault(&result),
        Some((&MemoryFault::Uninitialized(RESERVED_ADDRESSES), 4))
    );
}

#[test]
fn test_null_dereference() {
    let source = r#"
        DECLARE p : ^INTEGER
        p ← NULL
        *p ← 1
    "#;
    let (_, _, result) = run(source);
    assert_eq!(memory_fault(&result), Some((&MemoryFault::NullDereference, 4)));
}

#[test]
fn test_free_null_is_invalid() {
    let source = r#"
        DECLARE p : ^INTEGER
        p ← NULL
        FREE(p)
    "#;
    let (_, _, result) = run(source);
    assert_eq!(memory_fault(&result), Some((&MemoryFault::InvalidFree(0), 4)));
}

#[test]
fn test_free_of_variable_address_is_invalid() {
    let source = r#"
        DECLARE x : INTEGER
        DECLARE p : ^INTEGER
        x ← 1
        p ← &x
        FREE(p)
    "#;
    let (interpreter, _, result) = run(source);
    assert_eq!(
        memory_fault(&result),
        Some((&MemoryFault::InvalidFree(RESERVED_ADDRESSES), 6))
    );
    // The variable still owns its slots
    assert!(interpreter.arena().is_allocated(RESERVED_ADDRESSES));
}

#[test]
fn test_double_free() {
    let source = r#"
        DECLARE p : ^INTEGER
        p ← MALLOC(1)
        FREE(p)
        FREE(p)
    "#;
    let (_, _, result) = run(source);
    assert_eq!(
        memory_fault(&result),
        Some((&MemoryFault::DoubleFree(RESERVED_ADDRESSES), 5))
    );
}

#[test]
fn test_malloc_size_must_be_positive_and_whole() {
    let (_, _, result) = run("DECLARE p : ^INTEGER\np ← MALLOC(0)\n");
    assert_eq!(memory_fault(&result), Some((&MemoryFault::InvalidSize(0), 2)));

    let (_, _, result) = run("DECLARE p : ^INTEGER\np ← MALLOC(1.5)\n");
    assert!(matches!(
        memory_fault(&result),
        Some((MemoryFault::InvalidSize(_), 2))
    ));
}

#[test]
fn test_out_of_memory() {
    let config = InterpreterConfig {
        arena_size: RESERVED_ADDRESSES as usize + 64,
        ..InterpreterConfig::default()
    };
    let (_, _, result) = run_with("DECLARE p : ^INTEGER\np ← MALLOC(100)\n", config);
    assert_eq!(
        memory_fault(&result),
        Some((&MemoryFault::OutOfMemory { requested: 100 }, 2))
    );
}

#[test]
fn test_huge_malloc_is_out_of_memory() {
    let (interpreter, _, result) = run("DECLARE p : ^INTEGER\np ← MALLOC(1000000 * 1000000 * 1000000 * 1000000)\n");
    assert!(matches!(
        memory_fault(&result),
        Some((MemoryFault::OutOfMemory { .. }, 2))
    ));
    assert_eq!(interpreter.arena().stats().live_blocks, 0);

    let source = format!("DECLARE p : ^INTEGER\np ← MALLOC({})\n", u64::MAX);
    let (_, _, result) = run(&source);
    assert!(matches!(
        memory_fault(&result),
        Some((MemoryFault::OutOfMemory { .. }, 2))
    ));
}

#[test]
fn test_scope_end_releases_bound_locals() {
    let source = r#"
        PROCEDURE Touch
            DECLARE local : INTEGER
            DECLARE p : ^INTEGER
            local ← 5
            p ← &local
            OUTPUT *p
        ENDPROCEDURE
        CALL Touch
        CALL Touch
    "#;
    let (interpreter, host, result) = run(source);

    assert_eq!(result, Ok(RunOutcome::Completed));
    assert_eq!(host.outputs(), vec!["5", "5"]);

    let arena = interpreter.arena().stats();
    assert_eq!(arena.live_blocks, 0);
    assert_eq!(arena.watermark, RESERVED_ADDRESSES);

    let frees: Vec<_> = interpreter
        .tracer()
        .entries()
        .iter()
        .filter(|e| e.kind == OperationKind::Free)
        .collect();
    assert_eq!(frees.len(), 2);
    assert!(frees.iter().all(|e| e.variable() == Some("local")));
    assert!(frees.iter().all(|e| e.metadata() == Some("end of scope")));
}

#[test]
fn test_byref_alias_survives_callee_scope() {
    let source = r#"
        PROCEDURE Zero(BYREF n : INTEGER)
            n ← 0
        ENDPROCEDURE
        DECLARE x : INTEGER
        DECLARE p : ^INTEGER
        x ← 7
        p ← &x
        CALL Zero(x)
        OUTPUT *p
    "#;
    let (interpreter, host, result) = run(source);

    assert_eq!(result, Ok(RunOutcome::Completed));
    assert_eq!(host.outputs(), vec!["0"]);
    assert!(interpreter.arena().is_allocated(RESERVED_ADDRESSES));
}

#[test]
fn test_freed_tail_block_is_reused() {
    let source = r#"
        DECLARE a, b, c : ^INTEGER
        a ← MALLOC(4)
        b ← MALLOC(4)
        FREE(b)
        c ← MALLOC(4)
        OUTPUT c - a
    "#;
    let (interpreter, host, _) = run(source);

    assert_eq!(host.outputs(), vec!["4"]);
    assert_eq!(interpreter.arena().watermark(), RESERVED_ADDRESSES + 8);
}

#[test]
fn test_sizeof() {
    let source = "OUTPUT SIZE_OF(INTEGER), \" \", SIZE_OF(REAL), \" \", SIZE_OF(^CHAR)\n";
    let (_, host, _) = run(source);
    assert_eq!(host.outputs(), vec!["4 8 4"]);
}

#[test]
fn test_trace_records_reads_and_writes() {
    let source = r#"
        DECLARE x : INTEGER
        x ← 3
        x ← x + 1
    "#;
    let (interpreter, _, result) = run(source);
    assert_eq!(result, Ok(RunOutcome::Completed));

    let tracer = interpreter.tracer();
    let kinds: Vec<OperationKind> = tracer.by_variable("x").iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            OperationKind::Declare,
            OperationKind::Write,
            OperationKind::Read,
            OperationKind::Write
        ]
    );

    let last = tracer.last_for_variable("x").unwrap();
    assert_eq!(last.value(), Some("4"));
    assert_eq!(last.metadata(), Some("old: 3"));
    assert_eq!(last.line, 4);

    // Steps are strictly increasing
    assert!(tracer.entries().windows(2).all(|w| w[0].step < w[1].step));
}

#[test]
fn test_trace_limit_truncates() {
    let config = InterpreterConfig {
        trace_limit: 5,
        ..InterpreterConfig::default()
    };
    let source = r#"
        DECLARE i : INTEGER
        FOR i ← 1 TO 10
        NEXT i
    "#;
    let (interpreter, _, result) = run_with(source, config);

    assert_eq!(result, Ok(RunOutcome::Completed));
    assert_eq!(interpreter.tracer().len(), 5);
    assert!(interpreter.tracer().is_truncated());
}

#[test]
fn test_hex_dump_marks_slot_states() {
    let source = r#"
        DECLARE p : ^CHAR
        p ← MALLOC(2, CHAR)
        *p ← 'A'
    "#;
    let (interpreter, _, result) = run(source);
    assert_eq!(result, Ok(RunOutcome::Completed));

    let dump = interpreter.arena().hex_dump(RESERVED_ADDRESSES, 4);
    assert!(dump.starts_with("0x0400: 41 ?? -- --"), "unexpected dump: {}", dump);
    assert!(dump.trim_end().ends_with("|A...|"));
}
