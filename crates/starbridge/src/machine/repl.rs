//! Interactive loop against a machine's thread

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use starbridge_vm::{compile, Value};

use super::run::{prepare, refresh};
use super::Machine;
use crate::error::ExecError;

const PROMPT: &str = ">>> ";
const CONTINUATION: &str = "... ";

impl Machine {
    /// Read-eval-print loop on this machine's thread and predeclared
    /// environment. Lines ending in `:` open a block that ends at an empty
    /// line. Returns on end of input.
    pub fn repl(&self) -> Result<(), ExecError> {
        let mut editor = DefaultEditor::new().map_err(|e| ExecError::bridge("repl", e.to_string()))?;
        let mut chunk = String::new();
        loop {
            let prompt = if chunk.is_empty() { PROMPT } else { CONTINUATION };
            let line = match editor.readline(prompt) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) => {
                    chunk.clear();
                    continue;
                }
                Err(ReadlineError::Eof) => return Ok(()),
                Err(e) => return Err(ExecError::bridge("repl", e.to_string())),
            };
            if !chunk_complete(&mut chunk, &line) {
                continue;
            }
            let source = std::mem::take(&mut chunk);
            if source.trim().is_empty() {
                continue;
            }
            // History is best effort
            let _ = editor.add_history_entry(source.trim_end());
            match self.eval_chunk(&source) {
                Ok(Some(value)) => println!("{}", value.repr()),
                Ok(None) => {}
                Err(err) => eprintln!("{err}"),
            }
        }
    }

    /// Evaluate one interactive chunk; its bindings join the predeclared
    /// environment and the value of a trailing expression is returned
    fn eval_chunk(&self, source: &str) -> Result<Option<Value>, ExecError> {
        let config = self.config.read().clone();
        let mut state = self.state.lock();
        let runtime = match state.take() {
            Some(runtime) => runtime,
            None => prepare(&config)?,
        };
        let runtime = state.insert(runtime);
        refresh(runtime, &config)?;

        let program = compile("<stdin>", source).map_err(|e| ExecError::engine("exec", e))?;
        let (globals, value) = program
            .init_repl(&mut runtime.thread, &runtime.predeclared)
            .map_err(|e| ExecError::engine("exec", e))?;
        runtime.predeclared.extend(globals);
        Ok(value.filter(|v| !v.is_none()))
    }
}

/// Append `line` to `chunk`; true once the chunk is ready to evaluate
fn chunk_complete(chunk: &mut String, line: &str) -> bool {
    let in_block = !chunk.is_empty();
    if in_block && line.trim().is_empty() {
        return true;
    }
    chunk.push_str(line);
    chunk.push('\n');
    !in_block && !line.trim_end().ends_with(':')
}
