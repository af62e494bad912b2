pub mod request;
pub mod service;

pub use request::UploadRequest;
pub use service::{UploadError, UploadService};
