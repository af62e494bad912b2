pub mod api;
pub mod bind;
pub mod context;
pub mod plan;
pub mod user;

pub use api::{ApiError, BindResponse, PlanResponse, ProfileResponse, SchoolInfo, UploadResponse};
pub use bind::{bind_account, fetch_profile, fetch_schools, hash_password, Profile};
pub use context::AccountContext;
pub use plan::Plan;
pub use user::{Gender, User};
