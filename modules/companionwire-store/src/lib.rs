pub mod clusters;
pub mod credibility;
pub mod cursor;
pub mod feed;
pub mod models;
pub mod store;

pub use cursor::Cursor;
pub use store::{is_unique_violation, RawInsertOutcome, Store};
