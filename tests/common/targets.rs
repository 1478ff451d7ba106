//! Stateful targets for worker tests

use colony::{Invocable, Invocation, InvokeResult};
use serde_json::json;
use std::thread;
use std::time::Duration;

/// Fails its first invocation, then squares its input
#[derive(Default)]
pub struct FailOnce {
    calls: u32,
}

impl Invocable for FailOnce {
    fn invoke(&mut self, call: &Invocation) -> InvokeResult {
        self.calls += 1;
        if self.calls == 1 {
            anyhow::bail!("first call always fails");
        }
        let x = call.arg(0).as_i64().unwrap_or(0);
        Ok(json!(x * x))
    }
}

/// Panics on negative input, echoes everything else
pub struct PanicOnNegative;

impl Invocable for PanicOnNegative {
    fn invoke(&mut self, call: &Invocation) -> InvokeResult {
        let x = call.arg(0).as_i64().unwrap_or(0);
        if x < 0 {
            panic!("negative input {}", x);
        }
        Ok(json!(x))
    }
}

/// Counts how many invocations this instance has served
#[derive(Default)]
pub struct InstanceCounter {
    served: u64,
}

impl Invocable for InstanceCounter {
    fn invoke(&mut self, _call: &Invocation) -> InvokeResult {
        self.served += 1;
        Ok(json!(self.served))
    }
}

/// Sleeps before echoing, to keep executors busy
pub struct Slow {
    pub delay: Duration,
}

impl Invocable for Slow {
    fn invoke(&mut self, call: &Invocation) -> InvokeResult {
        thread::sleep(self.delay);
        Ok(call.arg(0).clone())
    }
}
