//! Message header names shared by producers, the failure router and retry.

pub const ENQUEUED_AT: &str = "x-enqueued-at";
pub const PAGINATED_BY: &str = "x-paginated-by";

pub const ORIGINAL_QUEUE: &str = "x-original-queue";
pub const ERROR_MESSAGE: &str = "x-error-message";
pub const DEATH_REASON: &str = "x-death-reason";
pub const DEATH_TIMESTAMP: &str = "x-death-timestamp";
pub const FAILURE_KIND: &str = "x-failure-kind";
pub const HTTP_STATUS: &str = "x-http-status";
pub const HTTP_URL: &str = "x-http-url";
pub const ERROR_BODY: &str = "x-error-body";

pub const RETRY_COUNT: &str = "x-retry-count";
pub const RETRY_ATTEMPT: &str = "x-retry-attempt";
pub const RETRIED_AT: &str = "x-retried-at";

/// Set by the broker when it dead-letters a rejected message itself
pub const FIRST_DEATH_QUEUE: &str = "x-first-death-queue";
pub const FIRST_DEATH_REASON: &str = "x-first-death-reason";
pub const X_DEATH: &str = "x-death";

/// Headers describing a past failure; stripped before a message is retried
pub const FAILURE_HEADERS: &[&str] = &[
    ORIGINAL_QUEUE,
    ERROR_MESSAGE,
    DEATH_REASON,
    DEATH_TIMESTAMP,
    FAILURE_KIND,
    HTTP_STATUS,
    HTTP_URL,
    ERROR_BODY,
    FIRST_DEATH_QUEUE,
    FIRST_DEATH_REASON,
    X_DEATH,
    "x-first-death-exchange",
    "x-last-death-queue",
    "x-last-death-reason",
    "x-last-death-exchange",
];

/// Error bodies are truncated to this many bytes before going into a header
pub const MAX_ERROR_BODY_BYTES: usize = 4096;

/// Truncate on a char boundary at or below `max` bytes
pub fn truncate_header_value(value: &str, max: usize) -> &str {
    if value.len() <= max {
        return value;
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_header_value("short", 10), "short");
        assert_eq!(truncate_header_value("abcdef", 3), "abc");
        // 'é' is two bytes; cutting at 2 would split it
        assert_eq!(truncate_header_value("aé", 2), "a");
    }
}
