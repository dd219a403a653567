pub mod headercodec;
pub mod response;
pub mod retry;
pub mod sink;

// Re-exports for convenience
pub use headercodec::HeaderFields;
pub use response::ResponseHead;
pub use retry::{AttemptOutcome, RetryBudget};
pub use sink::StreamSink;
