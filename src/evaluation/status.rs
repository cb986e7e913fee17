// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

/// Failed-count value that marks a Job as failed.
const FAILED_MARKER: i32 = 1;

/// A Job is reported as failed only when exactly one attempt failed.
///
/// Counts above one are not reported.
pub fn is_failed(failed_count: i32) -> bool {
    failed_count == FAILED_MARKER
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_failures_is_healthy() {
        assert!(!is_failed(0));
    }

    #[test]
    fn test_single_failure_is_failed() {
        assert!(is_failed(1));
    }

    #[test]
    fn test_exact_match_boundary() {
        // Only the literal value one counts
        assert!(!is_failed(2));
        assert!(!is_failed(6));
        assert!(!is_failed(-1));
    }
}
