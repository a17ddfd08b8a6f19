//! go/sleep 协作调度测试

mod common;
use common::{get_int, get_str, run_code, run_with, ExecError};
use quill_core::{RunError, RunSettings, VmConfig};

#[test]
fn test_go_receives_private_copy() {
    let code = r#"
run int {
    arr.int nums = [1, 2, 3]
    go (items: nums) {
        items[0] = 99
    }
    sleep(5)
    return nums[0]
}
"#;
    assert_eq!(get_int(code), 1);
}

#[test]
fn test_go_shares_aliased_container() {
    let code = r#"
run int {
    arr.int nums = [1, 2, 3]
    arr.int shared
    shared &= nums
    go (items: shared) {
        items[0] = 99
    }
    sleep(5)
    return nums[0]
}
"#;
    assert_eq!(get_int(code), 99);
}

#[test]
fn test_sleep_interleaves_tasks() {
    let code = r#"
run str {
    arr.str log
    arr.str shared
    shared &= log
    go (out: shared) {
        out += "task"
    }
    shared += "main1"
    sleep(10)
    shared += "main2"
    return Join(log, ",")
}
"#;
    assert_eq!(get_str(code), "main1,task,main2");
}

#[test]
fn test_spawning_task_does_not_block() {
    let code = r#"
run int {
    arr.int flag = [0]
    arr.int shared
    shared &= flag
    go (f: shared) {
        sleep(50)
        f[0] = 1
    }
    return flag[0]
}
"#;
    // 主任务结束时其余任务被放弃
    assert_eq!(get_int(code), 0);
}

#[test]
fn test_fault_in_spawned_task_fails_run() {
    let code = r#"
run int {
    go {
        error(77, "worker failed")
    }
    sleep(20)
    return 1
}
"#;
    match run_code(code) {
        Err(ExecError::Run(RunError::Fault(fault))) => {
            assert_eq!(fault.id, 77);
            assert_eq!(fault.message, "worker failed");
        }
        other => panic!("expecting fault, got {other:?}"),
    }
}

#[test]
fn test_timeout_at_loop_back_edge() {
    let code = r#"
run int {
    int i
    while true {
        i += 1
    }
    return i
}
"#;
    let settings = RunSettings {
        vm: VmConfig {
            timeout_ms: 50,
            ..VmConfig::default()
        },
        ..RunSettings::default()
    };
    match run_with(code, &settings) {
        Err(ExecError::Run(RunError::Timeout { timeout_ms, location })) => {
            assert_eq!(timeout_ms, 50);
            assert!(location.starts_with("main.ql:"), "{location}");
        }
        other => panic!("expecting timeout, got {other:?}"),
    }
}

#[test]
fn test_many_tasks_complete() {
    let code = r#"
func work(arr.int out, int n) {
    int i
    while i < 100 {
        i += 1
    }
    out += n
}
run int {
    arr.int results
    arr.int shared
    shared &= results
    for n in 1..5 {
        go (out: shared, k: n) {
            work(out, k)
        }
    }
    while *results < 5 {
        sleep(1)
    }
    int total
    for r in results {
        total += r
    }
    return total
}
"#;
    assert_eq!(get_int(code), 15);
}
