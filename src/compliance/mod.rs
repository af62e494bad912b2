pub mod evaluator;
pub mod status;

pub use evaluator::{Evaluator, RunVerdict};
pub use status::RunStatus;
