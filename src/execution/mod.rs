//! Pipeline execution

pub mod backend;
pub mod driver;

pub use backend::{ExecutionBackend, StepOutcome, StepRequest};
pub use driver::{CancelFlag, EventHandler, ExecutionDriver, RunEvent};
