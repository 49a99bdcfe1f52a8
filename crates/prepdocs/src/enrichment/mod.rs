//! External enrichment services

pub mod content_understanding;
pub mod poll;

pub use content_understanding::{
    analyzer_schema, ContentUnderstandingDescriber, MediaDescriber, ANALYZER_ID, CU_API_VERSION,
};
pub use poll::{classify_status, poll_until_done, PollPolicy, PollStatus};
