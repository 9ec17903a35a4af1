pub mod context;
pub mod fetch;
pub mod listing;
pub mod query;
pub mod version;

pub use context::Context;
pub use fetch::{fetch_bounded, FetchOutcome, MAX_IN_FLIGHT_FETCHES};
pub use listing::{ListPlan, ScrollState, DEFAULT_SCROLL_KEEP_ALIVE, MAX_RESULT_WINDOW};
pub use query::{translate, Keyword, TermValue};
pub use version::{Versioned, VERSION_KEY};
