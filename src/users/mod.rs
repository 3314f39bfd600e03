pub mod assigner;
pub mod types;

pub use assigner::UserProfileAssigner;
pub use types::{UserClass, UserProfile};
