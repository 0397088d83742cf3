//! Assertion helpers.

use civreg_search::error::{CoreError, ErrorKind};
use civreg_search::CoreResult;

/// Asserts that `result` failed with `kind`.
#[track_caller]
pub fn assert_kind<T: std::fmt::Debug>(result: CoreResult<T>, kind: ErrorKind) -> CoreError {
    match result {
        Ok(value) => panic!("Expected {} error, got Ok({:?})", kind, value),
        Err(e) => {
            assert_eq!(e.kind(), kind, "Expected {} error, got {}", kind, e);
            e
        }
    }
}
