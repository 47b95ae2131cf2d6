/// Resilience patterns for microservices
///
/// This library provides the two resilience patterns the document pipeline
/// needs at its seams:
/// - **Retry**: exponential backoff with jitter for the consumer-side local
///   retry interceptor (wraps a handler invocation before it is allowed to
///   fall through to dead-lettering).
/// - **Timeout**: bounds a single publish attempt made by the outbox
///   publisher so a wedged broker connection cannot stall a drain tick
///   forever.
///
/// # Example: bounding an outbox publish attempt
///
/// ```rust,no_run
/// use resilience::timeout::with_timeout_result;
/// use std::time::Duration;
///
/// # async fn publish() -> Result<(), String> { Ok(()) }
/// #[tokio::main]
/// async fn main() {
///     let result = with_timeout_result(Duration::from_secs(30), publish()).await;
/// }
/// ```

pub mod retry;
pub mod timeout;

pub use retry::{RetryConfig, RetryError, with_retry};
pub use timeout::{TimeoutConfig, TimeoutError, with_timeout, with_timeout_result};
