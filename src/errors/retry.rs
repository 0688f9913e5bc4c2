/// Classification for retry policy.
///
/// Used to decide whether a failed source call may be retried in place.
///
/// | Class | Retry in place? | Typical causes |
/// |-------|-----------------|----------------|
/// | `WithBackoff` | Yes, with exponential backoff | network error, non-2xx, timeout |
/// | `Never` | No - move on to the next source | missing mandatory field |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Transport-level failure. The same endpoint may recover, so a bounded
    /// exponential backoff retry is worthwhile.
    WithBackoff,

    /// Content-level failure. The source answered but the data is missing a
    /// mandatory field; asking again returns the same answer. The cascade
    /// handles this by moving to the next source, never by retrying in place.
    Never,
}
