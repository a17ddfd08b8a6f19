//! try/catch/recover/retry 测试

mod common;
use common::{get_int, get_str, run_code, run_fault, ExecError};
use quill_core::{FaultKind, RunError};

#[test]
fn test_retry_runs_body_twice() {
    let code = r#"
run int {
    int attempts
    int result
    try {
        attempts += 1
        if attempts == 1 {
            error(100, "first attempt")
        }
        result = attempts * 10
    } catch {
        retry
    }
    return attempts * 100 + result
}
"#;
    assert_eq!(get_int(code), 220);
}

#[test]
fn test_retry_does_not_roll_back() {
    let code = r#"
run int {
    arr.int log
    try {
        log += *log
        if *log < 3 {
            error(1, "again")
        }
    } catch {
        retry
    }
    return *log
}
"#;
    assert_eq!(get_int(code), 3);
}

#[test]
fn test_recover_continues_after_construct() {
    let code = r#"
run str {
    str trace
    try {
        try {
            trace += "a"
            error(7, "inner")
            trace += "never"
        } catch err {
            trace += "b" + str(ErrID(err))
            recover
            trace += "never"
        }
        trace += "c"
    } catch {
        trace += "outer"
        recover
    }
    return trace
}
"#;
    assert_eq!(get_str(code), "ab7c");
}

#[test]
fn test_unhandled_catch_rethrows_to_outer() {
    let code = r#"
run str {
    str trace
    try {
        try {
            error(5, "boom")
        } catch {
            trace += "inner "
        }
        trace += "skipped "
    } catch err {
        trace += ErrText(err)
        recover
    }
    return trace
}
"#;
    assert_eq!(get_str(code), "inner boom");
}

#[test]
fn test_fault_inside_catch_goes_to_outer_guard() {
    let code = r#"
run int {
    int id
    try {
        try {
            error(1, "first")
        } catch {
            error(2, "second")
        }
    } catch err {
        id = ErrID(err)
        recover
    }
    return id
}
"#;
    assert_eq!(get_int(code), 2);
}

#[test]
fn test_fault_unwinds_through_calls() {
    let code = r#"
func deep(int n) int {
    if n == 0 {
        arr.int empty
        return empty[1]
    }
    return deep(n - 1)
}
run int {
    try {
        return deep(5)
    } catch err {
        recover
    }
    return -ErrID(err)
}
"#;
    // err 在 catch 之外不可见
    assert!(matches!(
        run_code(code),
        Err(ExecError::Compile(e)) if matches!(e.kind, quill_core::ErrorKind::UnknownIdent(_))
    ));

    let code = r#"
func deep(int n) int {
    if n == 0 {
        arr.int empty
        return empty[1]
    }
    return deep(n - 1)
}
run int {
    int id
    try {
        id = deep(5)
    } catch err {
        id = -ErrID(err)
        recover
    }
    return id
}
"#;
    assert_eq!(get_int(code), -2);
}

#[test]
fn test_break_out_of_try_inside_loop() {
    let code = r#"
run int {
    int i
    while true {
        try {
            i += 1
            if i == 3 {
                break
            }
        } catch {
            recover
        }
    }
    try {
        error(9, "after loop")
    } catch err {
        i += ErrID(err) * 10
        recover
    }
    return i
}
"#;
    assert_eq!(get_int(code), 93);
}

#[test]
fn test_uncaught_fault_reports_location() {
    let fault = run_fault("run {\n  error(42, \"custom failure\")\n}");
    assert_eq!(fault.kind, FaultKind::Custom);
    assert_eq!(fault.id, 42);
    assert_eq!(fault.to_string(), "main.ql:2:8: custom failure");
    let err = RunError::Fault(fault);
    assert_eq!(err.to_string(), "main.ql:2:8: custom failure");
}
