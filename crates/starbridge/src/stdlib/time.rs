//! Wall-clock time values
//!
//! Durations are plain numbers of seconds; `second`, `minute` and `hour`
//! are the units.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use starbridge_vm::builtins::registry::BuiltinRegistry;
use starbridge_vm::{Args, Env, Thread, Value, VmError};

use super::{int_arg, module_env, opt_str_arg, str_arg};

pub const NAME: &str = "time";

pub fn load() -> Result<Env, VmError> {
    let mut registry = BuiltinRegistry::new();
    registry.register("now", vm_now);
    registry.register("from_timestamp", vm_from_timestamp);
    registry.register("parse_time", vm_parse_time);
    registry.constant("second", Value::Int(1));
    registry.constant("minute", Value::Int(60));
    registry.constant("hour", Value::Int(3600));
    module_env(NAME, registry)
}

fn vm_now(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    args.no_args("now")?;
    Ok(Value::Time(Utc::now()))
}

/// `from_timestamp(sec, nsec=0)`
fn vm_from_timestamp(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [sec, nsec] = args.unpack("from_timestamp", ["sec", "nsec?"])?;
    let sec = int_arg("from_timestamp", "sec", &sec)?;
    let nsec = match nsec {
        Value::None => 0,
        other => int_arg("from_timestamp", "nsec", &other)?,
    };
    let nsec = u32::try_from(nsec).map_err(|_| VmError::runtime(format!("from_timestamp: invalid nsec {nsec}")))?;
    Utc.timestamp_opt(sec, nsec)
        .single()
        .map(Value::Time)
        .ok_or_else(|| VmError::runtime(format!("from_timestamp: {sec} out of range")))
}

/// `parse_time(x, format=None)`: RFC 3339 by default, otherwise a strftime
/// layout with or without a zone
fn vm_parse_time(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    let [text, format] = args.unpack("parse_time", ["x", "format?"])?;
    let text = str_arg("parse_time", "x", &text)?;
    let parsed = match opt_str_arg("parse_time", "format", &format)? {
        None => DateTime::parse_from_rfc3339(text).map(|t| t.with_timezone(&Utc)),
        Some(layout) => DateTime::parse_from_str(text, layout)
            .map(|t| t.with_timezone(&Utc))
            .or_else(|_| NaiveDateTime::parse_from_str(text, layout).map(|t| t.and_utc())),
    };
    parsed
        .map(Value::Time)
        .map_err(|e| VmError::runtime(format!("parse_time: {e}")))
}
