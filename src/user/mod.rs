pub mod auth;
mod sqlite_user_store;
mod user_manager;
mod user_models;
mod user_store;

pub use auth::{VidstreamHasher, MAX_PASSWORD_LENGTH};
pub use sqlite_user_store::SqliteUserStore;
pub use user_manager::{AuthError, UserManager};
pub use user_models::{ProfileFields, User, UserProfile};
pub use user_store::{RefreshSwapOutcome, UserStore};
