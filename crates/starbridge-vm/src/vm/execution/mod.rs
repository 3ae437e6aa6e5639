//! Statement and expression evaluation for `Interp`

mod expressions;
mod statements;
