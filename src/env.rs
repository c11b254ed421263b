use std::{cell::RefCell, ffi::OsStr};

/// Instruction budget for `run` when neither the command line nor the environment sets one.
pub const DEFAULT_MAX_STEPS: usize = 1_000_000;

#[derive(Clone, Copy)]
struct Env {
    trace_enabled: bool,
    max_steps: usize,
}

thread_local! {
    /// Must only be mutated within `set_env`
    static ENV: RefCell<Option<Env>> = const { RefCell::new(None) };
}

/// Read configuration from the process environment. Call once, before any accessor.
pub fn init() {
    let max_steps = std::env::var("RASM8_MAX_STEPS")
        .ok()
        .and_then(|v| match v.trim().parse() {
            Ok(steps) => Some(steps),
            Err(_) => {
                log::warn!("ignoring invalid RASM8_MAX_STEPS value `{v}`");
                None
            }
        })
        .unwrap_or(DEFAULT_MAX_STEPS);
    let value = Env {
        trace_enabled: var_is("RASM8_TRACE", "1"),
        max_steps,
    };
    set_env(value);
}

/// Log every executed instruction.
pub fn is_trace_enabled() -> bool {
    with_env(|env| env.trace_enabled)
}

pub fn max_steps() -> usize {
    with_env(|env| env.max_steps)
}

fn set_env(value: Env) {
    ENV.with(|env| {
        let mut env = env.borrow_mut();
        assert!(
            env.is_none(),
            "tried to initialize environment state multiple times"
        );
        *env = Some(value);
    });
}

fn with_env<F, R>(callback: F) -> R
where
    F: Fn(&Env) -> R,
{
    ENV.with(|env| {
        let env = env.borrow();
        let env = env.unwrap_or_else(|| {
            panic!("tried to access environment state before initialization");
        });
        callback(&env)
    })
}

fn var_is(name: impl AsRef<OsStr>, value: impl AsRef<str>) -> bool {
    std::env::var(name.as_ref()).is_ok_and(|v| v == value.as_ref())
}
