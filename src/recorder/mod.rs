pub mod controller;
pub mod location;
pub mod state;

pub use controller::{FinishOutcome, RecorderController, RecorderEvent};
pub use location::{FixSource, LocationFix};
pub use state::{RecorderSnapshot, RecorderState, RecorderStatus};
