pub mod run;

pub use run::{Run, RunEntry, RunId, RunRecord};
