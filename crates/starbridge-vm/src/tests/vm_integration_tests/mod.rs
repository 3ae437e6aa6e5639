pub mod helpers;

pub mod basic_operations;
pub mod cancellation;
pub mod comprehensions;
pub mod control_flow;
pub mod data_structures;
pub mod errors;
pub mod freezing;
pub mod functions;
pub mod loading;
pub mod options;
