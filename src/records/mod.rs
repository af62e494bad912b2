pub mod editor;
pub mod store;

pub use editor::RecordEditor;
pub use store::{RecordEvent, RecordStore};
