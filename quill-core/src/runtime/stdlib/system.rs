//! 输出、错误与调度相关的原生函数

use super::{arg, call, NativeCtx, NativeDef};
use crate::runtime::fault::Fault;
use crate::runtime::value::Value;
use std::time::Duration;

type NativeResult = Result<Option<Value>, Fault>;

fn print(ctx: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    let text = arg(args, 0)?.to_string();
    ctx.output.push_str(&text);
    Ok(None)
}

fn println(ctx: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    let text = arg(args, 0)?.to_string();
    ctx.output.push_str(&text);
    ctx.output.push('\n');
    Ok(None)
}

/// `error(id, msg)`：抛出用户错误
fn raise(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    let id = arg(args, 0)?.as_int()?;
    let message = arg(args, 1)?.as_str()?;
    Err(Fault::custom(id, message.to_string()))
}

fn err_text(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    Ok(Some(Value::str(&arg(args, 0)?.as_error()?.message)))
}

fn err_id(_: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    Ok(Some(Value::Int(arg(args, 0)?.as_error()?.id)))
}

/// 记录挂起时长；负数视为 0
fn sleep(ctx: &mut NativeCtx<'_>, args: &[Value]) -> NativeResult {
    let ms = arg(args, 0)?.as_int()?.max(0) as u64;
    *ctx.sleep = Some(Duration::from_millis(ms));
    Ok(None)
}

pub(super) fn register(defs: &mut Vec<NativeDef>) {
    defs.extend([
        call("Print", "*", "", print),
        call("Println", "*", "", println),
        call("error", "int,str", "", raise),
        call("ErrText", "error", "str", err_text),
        call("ErrID", "error", "int", err_id),
        call("sleep", "int", "", sleep),
    ]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::fault::FaultKind;
    use crate::runtime::stdlib::testing::invoke;
    use quill_config::LimitConfig;
    use std::rc::Rc;

    #[test]
    fn test_error_carries_user_id() {
        let err = invoke(raise, &[Value::Int(42), Value::str("boom")]).unwrap_err();
        assert_eq!(err.kind, FaultKind::Custom);
        assert_eq!(err.id, 42);
        let value = Value::Error(Rc::new(err));
        assert_eq!(invoke(err_text, &[value.clone()]).unwrap(), Some(Value::str("boom")));
        assert_eq!(invoke(err_id, &[value]).unwrap(), Some(Value::Int(42)));
    }

    #[test]
    fn test_print_and_sleep_use_context() {
        let mut output = String::new();
        let mut pause = None;
        let limits = LimitConfig::default();
        let mut ctx = NativeCtx {
            output: &mut output,
            sleep: &mut pause,
            limits: &limits,
        };
        println(&mut ctx, &[Value::Int(5)]).unwrap();
        print(&mut ctx, &[Value::str("x")]).unwrap();
        sleep(&mut ctx, &[Value::Int(-3)]).unwrap();
        assert_eq!(output, "5\nx");
        assert_eq!(pause, Some(Duration::ZERO));
    }
}
