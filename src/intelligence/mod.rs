pub mod interpret;
pub mod messages;
pub mod summary;

pub use interpret::{display_value, interpret};
pub use summary::{summarize, MAX_SUMMARY_INSIGHTS};
