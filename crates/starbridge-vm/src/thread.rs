//! Execution thread: per-run state shared by all frames of one evaluation

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use starbridge_parser::Pos;

use crate::cancel::{CancelHandle, CancellationToken};
use crate::error::{Frame, VmError};
use crate::options::Options;
use crate::value::Env;

/// Receives the output of `print`
pub type PrintFn = Arc<dyn Fn(&Thread, &str) + Send + Sync>;

/// Resolves `load(module, ...)` to the module's exported names
pub type LoadFn = Arc<dyn Fn(&mut Thread, &str) -> Result<Env, VmError> + Send + Sync>;

/// Thread-local key holding the `CancellationToken`
pub const CONTEXT_LOCAL: &str = "context";
/// Thread-local key holding the `exit()` status code
pub const EXIT_CODE_LOCAL: &str = "exit_code";

#[derive(Debug, Clone)]
pub(crate) struct CallFrame {
    pub(crate) function: String,
    pub(crate) file: String,
    /// Position of the call currently being made from this frame
    pub(crate) pos: Pos,
    /// Identity of the callee, for the recursion check
    pub(crate) id: usize,
}

/// A guest execution thread
///
/// Not shared between OS threads while running; cancellation goes through
/// the `CancelHandle`, which is.
pub struct Thread {
    pub name: String,
    print: Option<PrintFn>,
    load: Option<LoadFn>,
    locals: HashMap<String, Arc<dyn Any + Send + Sync>>,
    cancel: CancelHandle,
    options: Options,
    pub(crate) frames: Vec<CallFrame>,
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("name", &self.name)
            .field("depth", &self.frames.len())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl Thread {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_options(name, Options::default())
    }

    pub fn with_options(name: impl Into<String>, options: Options) -> Self {
        Self {
            name: name.into(),
            print: None,
            load: None,
            locals: HashMap::new(),
            cancel: CancelHandle::new(),
            options,
            frames: Vec::new(),
        }
    }

    /// A thread for evaluating a loaded module on behalf of this one.
    /// Shares hooks, locals, options and the cancellation flag.
    pub fn child(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            print: self.print.clone(),
            load: self.load.clone(),
            locals: self.locals.clone(),
            cancel: self.cancel.clone(),
            options: self.options.clone(),
            frames: Vec::new(),
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn set_options(&mut self, options: Options) {
        self.options = options;
    }

    pub fn set_print(&mut self, print: Option<PrintFn>) {
        self.print = print;
    }

    pub fn set_load(&mut self, load: Option<LoadFn>) {
        self.load = load;
    }

    /// Emit a line of guest output
    pub fn print(&self, msg: &str) {
        match &self.print {
            Some(print) => print(self, msg),
            None => println!("{msg}"),
        }
    }

    pub fn load(&mut self, module: &str) -> Result<Env, VmError> {
        match self.load.clone() {
            Some(load) => load(self, module),
            None => Err(VmError::runtime("load not implemented by this application")),
        }
    }

    // ========================================================================
    // Thread-locals
    // ========================================================================

    pub fn set_local<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.locals.insert(key.into(), Arc::new(value));
    }

    pub fn local<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.locals.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn remove_local(&mut self, key: &str) {
        self.locals.remove(key);
    }

    pub fn cancellation_token(&self) -> Option<CancellationToken> {
        self.local::<CancellationToken>(CONTEXT_LOCAL).cloned()
    }

    pub fn set_cancellation_token(&mut self, token: CancellationToken) {
        self.set_local(CONTEXT_LOCAL, token);
    }

    pub fn exit_code(&self) -> Option<u8> {
        self.local::<u8>(EXIT_CODE_LOCAL).copied()
    }

    pub fn set_exit_code(&mut self, code: u8) {
        self.set_local(EXIT_CODE_LOCAL, code);
    }

    // ========================================================================
    // Cancellation
    // ========================================================================

    pub fn cancel(&self, reason: impl Into<String>) {
        self.cancel.cancel(reason);
    }

    pub fn uncancel(&self) {
        self.cancel.uncancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn check_cancelled(&self) -> Result<(), VmError> {
        if self.cancel.is_cancelled() {
            let reason = self.cancel.reason().unwrap_or_else(|| "cancelled".to_string());
            return Err(VmError::cancelled(reason));
        }
        Ok(())
    }

    // ========================================================================
    // Call stack
    // ========================================================================

    pub fn call_depth(&self) -> usize {
        self.frames.len()
    }

    /// Snapshot of the guest call stack, outermost first
    pub fn call_stack(&self) -> Vec<Frame> {
        self.frames
            .iter()
            .map(|f| Frame {
                file: f.file.clone(),
                pos: f.pos,
                function: f.function.clone(),
            })
            .collect()
    }

    pub(crate) fn push_frame(&mut self, frame: CallFrame) -> Result<(), VmError> {
        if self.frames.len() >= self.options.max_call_depth {
            return Err(VmError::runtime(format!(
                "call stack depth exceeded (max {})",
                self.options.max_call_depth
            )));
        }
        if !self.options.allow_recursion && frame.id != 0 && self.frames.iter().any(|f| f.id == frame.id) {
            return Err(VmError::runtime(format!("function {} called recursively", frame.function)));
        }
        self.frames.push(frame);
        Ok(())
    }

    pub(crate) fn pop_frame(&mut self) {
        self.frames.pop();
    }

    pub(crate) fn set_pos(&mut self, pos: Pos) {
        if let Some(frame) = self.frames.last_mut() {
            frame.pos = pos;
        }
    }

    /// Attach the current call stack to an error raised at `pos`
    pub(crate) fn annotate(&mut self, mut err: VmError, pos: Pos) -> VmError {
        if err.frames.is_empty() {
            self.set_pos(pos);
            err.frames = self.call_stack();
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_typed_locals() {
        let mut thread = Thread::new("t");
        assert_eq!(thread.exit_code(), None);
        thread.set_exit_code(3);
        assert_eq!(thread.exit_code(), Some(3));
        thread.set_cancellation_token(CancellationToken::new());
        assert!(thread.cancellation_token().is_some());
        assert!(thread.local::<u32>(EXIT_CODE_LOCAL).is_none());
    }

    #[test]
    fn test_child_shares_cancellation() {
        let thread = Thread::new("parent");
        let child = thread.child("child");
        thread.cancel("stop");
        let err = child.check_cancelled().unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(err.message, "Starlark computation cancelled: stop");
    }

    #[test]
    fn test_print_hook() {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let sink = captured.clone();
        let mut thread = Thread::new("t");
        thread.set_print(Some(Arc::new(move |_, msg| sink.lock().push(msg.to_string()))));
        thread.print("hello");
        assert_eq!(captured.lock().as_slice(), ["hello".to_string()]);
    }

    #[test]
    fn test_missing_load_hook() {
        let mut thread = Thread::new("t");
        let err = thread.load("m").unwrap_err();
        assert_eq!(err.message, "load not implemented by this application");
    }
}
