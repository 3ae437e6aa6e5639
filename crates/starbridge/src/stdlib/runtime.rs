//! Host process facts

use std::time::Instant;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use starbridge_vm::builtins::registry::BuiltinRegistry;
use starbridge_vm::{Args, Env, Thread, Value, VmError};

use super::module_env;

pub const NAME: &str = "runtime";

/// Set the first time the module is loaded
static APP_START: Lazy<(DateTime<Utc>, Instant)> = Lazy::new(|| (Utc::now(), Instant::now()));

pub fn load() -> Result<Env, VmError> {
    let (started, _) = *APP_START;

    let mut registry = BuiltinRegistry::new();
    registry.constant("hostname", Value::string(hostname()));
    registry.constant("workdir", path_value(std::env::current_dir().ok()));
    registry.constant("homedir", path_value(dirs::home_dir()));
    registry.constant("os", Value::string(std::env::consts::OS));
    registry.constant("arch", Value::string(std::env::consts::ARCH));
    registry.constant("pid", Value::Int(i64::from(std::process::id())));
    registry.constant("app_start", Value::Time(started));
    registry.register("uptime", vm_uptime);
    module_env(NAME, registry)
}

fn path_value(path: Option<std::path::PathBuf>) -> Value {
    path.map_or(Value::string(""), |p| Value::string(p.to_string_lossy()))
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .or_else(|| std::env::var("COMPUTERNAME").ok())
        .map(|h| h.trim().to_string())
        .unwrap_or_default()
}

/// Seconds since `app_start`
fn vm_uptime(_thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    args.no_args("uptime")?;
    Ok(Value::Float(APP_START.1.elapsed().as_secs_f64()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_members() {
        let env = load().unwrap();
        let Some(Value::Module(module)) = env.get(NAME) else { panic!("not a module") };
        assert_eq!(module.members.get("os"), Some(&Value::string(std::env::consts::OS)));
        assert_eq!(module.members.get("pid"), Some(&Value::Int(i64::from(std::process::id()))));
        assert!(matches!(module.members.get("app_start"), Some(Value::Time(_))));
    }

    #[test]
    fn test_uptime_grows() {
        let mut thread = Thread::new("t");
        let Value::Float(a) = vm_uptime(&mut thread, &Args::default()).unwrap() else { panic!() };
        std::thread::sleep(std::time::Duration::from_millis(5));
        let Value::Float(b) = vm_uptime(&mut thread, &Args::default()).unwrap() else { panic!() };
        assert!(b > a);
    }
}
