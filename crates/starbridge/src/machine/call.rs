//! Calling guest functions from the host

use std::panic::{self, AssertUnwindSafe};

use starbridge_vm::{Args, CancellationToken, Value, EXIT_CODE_LOCAL};
use tracing::debug;

use super::{export_value, new_thread, Machine};
use crate::convert::{to_guest, HostValue};
use crate::error::{ConvertError, ExecError};

impl Machine {
    /// Call a function bound in the predeclared environment by an earlier
    /// run (or a builtin placed there by globals and preloads)
    pub fn call(&self, name: &str, args: &[HostValue]) -> Result<HostValue, ExecError> {
        if name.is_empty() {
            return Err(ExecError::bridge("call", "no function name"));
        }
        let config = self.config.read().clone();

        let mut state = self.state.lock();
        let Some(runtime) = state.as_mut() else {
            return Err(ExecError::bridge("call", "no function loaded"));
        };
        let callee = match runtime.predeclared.get(name) {
            None => return Err(ExecError::bridge("call", format!("no such function: {name}"))),
            Some(v @ (Value::Function(_) | Value::Builtin(_))) => v.clone(),
            Some(_) => return Err(ExecError::bridge("call", format!("mistyped function: {name}"))),
        };
        let args = args
            .iter()
            .map(|arg| guest_arg(arg, config.input_conversion))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ExecError::conversion("convert args", e))?;

        debug!(function = name, args = args.len(), "calling guest function");
        let thread = &mut runtime.thread;
        thread.uncancel();
        thread.set_cancellation_token(CancellationToken::new());
        thread.remove_local(EXIT_CODE_LOCAL);
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| {
            starbridge_vm::call(thread, &callee, Args::new(args))
        })) {
            Ok(outcome) => outcome,
            Err(payload) => {
                runtime.thread = new_thread(&config, &runtime.cache);
                return Err(ExecError::panic("call", payload));
            }
        };

        let value = match outcome {
            Ok(value) => value,
            Err(err) if err.is_exit() => match err.exit_code().unwrap_or(0) {
                0 => Value::None,
                code => return Err(ExecError::bridge("call", format!("exit code: {code}"))),
            },
            Err(err) => return Err(ExecError::engine("call", err)),
        };
        if !config.output_conversion {
            return Ok(HostValue::Guest(value));
        }
        export_value(&value).map_err(|e| ExecError::conversion("convert output", e))
    }
}

fn guest_arg(arg: &HostValue, convert: bool) -> Result<Value, ConvertError> {
    match arg {
        HostValue::Guest(v) => Ok(v.clone()),
        other if convert => to_guest(other),
        other => Err(ConvertError::NotGuest(other.kind().to_string())),
    }
}
