//! One-shot evaluation of untrusted JavaScript inside a fresh V8 isolate.
//!
//! Each submission gets a brand new `JsRuntime`; no state survives between
//! calls. The bootstrap script rebinds `print`/`console.*` to an in-memory
//! capture sink, exposes a cooperative `sleep(ms)`, and strips the isolate
//! of `Deno`, `eval`, and the `Function` constructor escape hatches. The
//! source runs as the body of a single anonymous async function; anything it
//! throws is reported as `kind: message`, never propagated raw.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use deno_core::{op2, JsRuntime, OpState, PollEventLoopOptions, RuntimeOptions};

use super::error::SandboxError;

/// Capture sink: receives everything the submission prints.
struct CaptureBuf(String);

/// First exception reported by the wrapper's catch handler, if any.
struct FailureSlot(Option<(String, String)>);

#[op2(fast)]
fn op_host_print(state: &mut OpState, #[string] text: &str) {
    state.borrow_mut::<CaptureBuf>().0.push_str(text);
}

#[op2(fast)]
fn op_host_fail(state: &mut OpState, #[string] kind: &str, #[string] message: &str) {
    let slot = state.borrow_mut::<FailureSlot>();
    if slot.0.is_none() {
        slot.0 = Some((kind.to_string(), message.to_string()));
    }
}

#[op2(async)]
async fn op_host_sleep(ms: f64) {
    tokio::time::sleep(Duration::from_millis(ms.max(0.0) as u64)).await;
}

deno_core::extension!(
    sandbox_ext,
    ops = [op_host_print, op_host_fail, op_host_sleep]
);

/// Capture ops in closures, rebind the output primitives, then remove the
/// engine's code-generation and host-access surfaces. Runs before any user
/// code; after it, `Deno` is gone and `__host` is the only bridge left.
const BOOTSTRAP: &str = r#"
((ops) => {
    const write = (text) => ops.op_host_print(text);
    const sleepOp = ops.op_host_sleep;
    const fmt = (value) => {
        if (value === undefined) return "undefined";
        if (typeof value === "string") return value;
        try {
            const json = JSON.stringify(value);
            return json === undefined ? String(value) : json;
        } catch (_) {
            return String(value);
        }
    };
    const print = (...args) => write(args.map(fmt).join(" ") + "\n");
    globalThis.print = print;
    globalThis.console = Object.freeze({
        log: print,
        info: print,
        warn: print,
        error: print,
    });
    globalThis.sleep = (ms) => sleepOp(Number(ms));
    globalThis.__host = Object.freeze({
        fail: (kind, message) => ops.op_host_fail(String(kind), String(message)),
    });

    delete globalThis.Deno;
    delete globalThis.eval;
    const AsyncFunction = (async function () {}).constructor;
    const GeneratorFunction = (function* () {}).constructor;
    Object.defineProperty(Function.prototype, "constructor", {
        value: undefined, configurable: false, writable: false,
    });
    Object.defineProperty(AsyncFunction.prototype, "constructor", {
        value: undefined, configurable: false, writable: false,
    });
    Object.defineProperty(GeneratorFunction.prototype, "constructor", {
        value: undefined, configurable: false, writable: false,
    });
})(Deno.core.ops);
"#;

/// Wrap the source as the body of one anonymous async unit. The catch
/// handler routes exceptions through the fail op so they come back with a
/// kind and a message instead of a raw engine error.
fn wrap(source: &str) -> String {
    format!(
        r#"(async () => {{
"use strict";
try {{
{source}
}} catch (e) {{
    __host.fail(
        e && e.name ? e.name : "Error",
        e && e.message !== undefined ? String(e.message) : String(e)
    );
}}
}})();"#
    )
}

/// Evaluate one submission. Must run inside the worker's private runtime
/// (V8 isolates are not `Send`, so everything happens on that thread).
///
/// Two mechanisms bound execution: a watchdog thread terminates V8 at the
/// timeout (CPU-bound loops never reach a suspension point), and the
/// event-loop drive is wrapped in an async timeout (op-suspended
/// submissions never return to JS).
pub(crate) async fn evaluate(source: &str, timeout: Duration) -> Result<String, SandboxError> {
    let mut runtime = JsRuntime::new(RuntimeOptions {
        extensions: vec![sandbox_ext::init_ops()],
        ..Default::default()
    });
    {
        let state = runtime.op_state();
        let mut state = state.borrow_mut();
        state.put(CaptureBuf(String::new()));
        state.put(FailureSlot(None));
    }

    runtime
        .execute_script("[masterbot:bootstrap]", BOOTSTRAP)
        .map_err(|e| SandboxError::Failed {
            kind: "SetupError".into(),
            message: e.to_string(),
        })?;

    let watchdog_handle = runtime.v8_isolate().thread_safe_handle();
    let timed_out = Arc::new(AtomicBool::new(false));
    let watchdog_flag = Arc::clone(&timed_out);
    let (cancel_tx, cancel_rx) = mpsc::channel::<()>();
    let watchdog = std::thread::spawn(move || {
        if let Err(mpsc::RecvTimeoutError::Timeout) = cancel_rx.recv_timeout(timeout) {
            watchdog_flag.store(true, Ordering::SeqCst);
            watchdog_handle.terminate_execution();
        }
    });

    let exec_error = match runtime.execute_script("[masterbot:eval]", wrap(source)) {
        Ok(_) => {
            match tokio::time::timeout(
                timeout,
                runtime.run_event_loop(PollEventLoopOptions::default()),
            )
            .await
            {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(_) => {
                    timed_out.store(true, Ordering::SeqCst);
                    None
                }
            }
        }
        Err(e) => Some(e.to_string()),
    };

    // The watchdog must be done before the runtime drops, or its
    // IsolateHandle outlives the isolate.
    let _ = cancel_tx.send(());
    let _ = watchdog.join();

    if timed_out.load(Ordering::SeqCst) {
        return Err(SandboxError::Timed(timeout.as_secs()));
    }

    if let Some(raw) = exec_error {
        let (kind, message) = split_engine_error(&raw);
        return Err(SandboxError::Failed { kind, message });
    }

    let state = runtime.op_state();
    let state = state.borrow();
    if let Some((kind, message)) = state
        .try_borrow::<FailureSlot>()
        .and_then(|slot| slot.0.clone())
    {
        return Err(SandboxError::Failed { kind, message });
    }

    Ok(state
        .try_borrow::<CaptureBuf>()
        .map(|buf| buf.0.clone())
        .unwrap_or_default())
}

/// Engine errors read like "Uncaught SyntaxError: Unexpected token '}'"
/// with a stack underneath; keep the exception name and the first line of
/// the message.
fn split_engine_error(raw: &str) -> (String, String) {
    let line = raw.lines().next().unwrap_or(raw).trim();
    let line = line.strip_prefix("Uncaught ").unwrap_or(line);
    match line.split_once(": ") {
        Some((kind, message)) if !kind.is_empty() && !kind.contains(' ') => {
            (kind.to_string(), message.to_string())
        }
        _ => ("Error".to_string(), line.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_split_into_kind_and_message() {
        let (kind, message) =
            split_engine_error("Uncaught SyntaxError: Unexpected token '}'\n  at eval:3:1");
        assert_eq!(kind, "SyntaxError");
        assert_eq!(message, "Unexpected token '}'");
    }

    #[test]
    fn unshaped_engine_errors_fall_back_to_error() {
        let (kind, message) = split_engine_error("something went sideways");
        assert_eq!(kind, "Error");
        assert_eq!(message, "something went sideways");
    }

    #[test]
    fn wrapper_keeps_the_source_as_the_body() {
        let wrapped = wrap("print(1);");
        assert!(wrapped.contains("print(1);"));
        assert!(wrapped.starts_with("(async () => {"));
        assert!(wrapped.contains("__host.fail"));
    }
}
