//! Running scripts

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use starbridge_vm::{compile, CancellationToken, Env, Program, EXIT_CODE_LOCAL};
use tracing::debug;

use super::{cache_config, guest_env, host_env, new_thread, Config, Machine, Runtime, Script, DEFAULT_SCRIPT_NAME};
use crate::cache::Cache;
use crate::convert::HostMap;
use crate::error::ExecError;
use crate::fs::FileSystem;

/// How often the supervisor re-checks whether the run has finished
const SUPERVISOR_TICK: Duration = Duration::from_millis(10);

enum Source {
    Inline { name: String, text: String },
    File { name: String, fs: Arc<dyn FileSystem> },
}

impl Machine {
    /// Run the configured script
    pub fn run(&self) -> Result<HostMap, ExecError> {
        self.run_with_context(CancellationToken::new(), HostMap::new())
    }

    /// Run `source` as an inline script; it becomes the configured script
    pub fn run_script(&self, source: impl Into<Vec<u8>>, extras: HostMap) -> Result<HostMap, ExecError> {
        self.set_script_content(DEFAULT_SCRIPT_NAME, source);
        self.run_with_context(CancellationToken::new(), extras)
    }

    /// Run the file `name` from `fs`; it becomes the configured script
    pub fn run_file(&self, name: impl Into<String>, fs: Arc<dyn FileSystem>, extras: HostMap) -> Result<HostMap, ExecError> {
        self.set_script_file(name, fs);
        self.run_with_context(CancellationToken::new(), extras)
    }

    /// Run the configured script, cancelling it after `timeout`
    pub fn run_with_timeout(&self, timeout: Duration, extras: HostMap) -> Result<HostMap, ExecError> {
        self.run_with_context(CancellationToken::with_timeout(timeout), extras)
    }

    /// Run the configured script under a host cancellation token
    pub fn run_with_context(&self, token: CancellationToken, extras: HostMap) -> Result<HostMap, ExecError> {
        let mut state = self.state.lock();
        let config = self.config.read().clone();
        let source = resolve_source(&config)?;

        let first = state.is_none();
        let runtime = match state.take() {
            Some(runtime) => runtime,
            None => prepare(&config)?,
        };
        let runtime = state.insert(runtime);
        let result = run_on(runtime, &config, source, token, extras);
        match &result {
            Ok(_) => {
                self.run_count.fetch_add(1, Ordering::Relaxed);
            }
            // Nothing survives a failed first run
            Err(_) if first => *state = None,
            Err(_) => {}
        }
        result
    }
}

fn run_on(
    runtime: &mut Runtime,
    config: &Config,
    source: Source,
    token: CancellationToken,
    extras: HostMap,
) -> Result<HostMap, ExecError> {
    refresh(runtime, config)?;
    let extras = guest_env(&extras, config.input_conversion, "convert extras")?;
    // Extras and new bindings reach the machine only if the run succeeds
    let mut env = runtime.predeclared.clone();
    env.extend(extras);

    let program = match source {
        Source::Inline { name, text } => compile(&name, &text),
        Source::File { name, fs } => runtime.cache.program(&name, fs.as_ref()),
    }
    .map_err(|e| ExecError::engine("exec", e))?;

    debug!(script = program.filename(), "running script");
    let globals = execute(runtime, config, &program, &env, token)?;
    env.extend(globals.clone());
    runtime.predeclared = env;
    host_env(&globals, config.output_conversion, "convert output")
}

fn resolve_source(config: &Config) -> Result<Source, ExecError> {
    match &config.script {
        None => Err(ExecError::bridge("run", "no script to execute")),
        Some(Script::Content { name, source }) => {
            let name = if name.is_empty() { DEFAULT_SCRIPT_NAME } else { name };
            let text = String::from_utf8(source.clone())
                .map_err(|_| ExecError::bridge("run", format!("{name}: source is not valid UTF-8")))?;
            Ok(Source::Inline {
                name: name.to_string(),
                text,
            })
        }
        Some(Script::File { name, .. }) if name.is_empty() => Err(ExecError::bridge("run", "no script name")),
        Some(Script::File { name, fs }) => Ok(Source::File {
            name: name.clone(),
            fs: fs.clone(),
        }),
    }
}

/// Globals followed by preload exports
fn base_env(config: &Config) -> Result<Env, ExecError> {
    let mut env = guest_env(&config.globals, config.input_conversion, "convert globals")?;
    config
        .preloads
        .load_all(&mut env)
        .map_err(|e| ExecError::engine("preload", e))?;
    Ok(env)
}

/// First run: build the predeclared environment, the cache and the thread
pub(super) fn prepare(config: &Config) -> Result<Runtime, ExecError> {
    let base = base_env(config)?;
    let cache = Arc::new(Cache::new(cache_config(config, base.clone())));
    let thread = new_thread(config, &cache);
    debug!(
        predeclared = base.len(),
        preloads = config.preloads.len(),
        lazyloads = config.lazyloads.len(),
        "machine prepared"
    );
    Ok(Runtime {
        thread,
        predeclared: base.clone(),
        base,
        cache,
        version: config.version,
    })
}

/// Re-apply changed globals and preloads, refresh the cache and clear the
/// thread's cancellation
pub(super) fn refresh(runtime: &mut Runtime, config: &Config) -> Result<(), ExecError> {
    if runtime.version != config.version {
        runtime.base = base_env(config)?;
        runtime.predeclared.extend(runtime.base.clone());
        runtime.version = config.version;
    }
    runtime.cache.configure(cache_config(config, runtime.base.clone()));
    runtime.thread.uncancel();
    runtime.thread.set_print(config.print.clone());
    runtime.thread.set_options(config.options.clone());
    Ok(())
}

/// Execute `program` on the runtime's thread while a supervisor forwards
/// `token` to the thread's cancel flag
fn execute(
    runtime: &mut Runtime,
    config: &Config,
    program: &Program,
    predeclared: &Env,
    token: CancellationToken,
) -> Result<Env, ExecError> {
    let thread = &mut runtime.thread;
    thread.set_cancellation_token(token.clone());
    thread.remove_local(EXIT_CODE_LOCAL);

    let done = Arc::new(AtomicBool::new(false));
    let supervisor = {
        let done = done.clone();
        let handle = thread.cancel_handle();
        thread::spawn(move || {
            while !done.load(Ordering::Acquire) {
                if let Some(reason) = token.wait_timeout(SUPERVISOR_TICK) {
                    handle.cancel(reason.to_string());
                    return;
                }
            }
        })
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| program.init_partial(thread, predeclared)));
    done.store(true, Ordering::Release);
    // The supervisor only waits on the token; a join failure means it panicked
    let _ = supervisor.join();

    let (globals, result) = match outcome {
        Ok(outcome) => outcome,
        Err(payload) => {
            // The unwound thread still holds the frames of the panicking call
            runtime.thread = new_thread(config, &runtime.cache);
            return Err(ExecError::panic("exec", payload));
        }
    };
    match result {
        Ok(()) => Ok(globals),
        Err(err) if err.is_exit() => match err.exit_code().unwrap_or(0) {
            0 => Ok(globals),
            code => Err(ExecError::bridge("run", format!("exit code: {code}"))),
        },
        Err(err) => {
            debug!(error = %err.message, "script failed");
            Err(ExecError::engine("exec", err))
        }
    }
}
