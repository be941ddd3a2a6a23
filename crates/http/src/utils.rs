//! Internal helper macros.

/// Returns early with an error if a condition is not met.
///
/// Like `assert!`, but for validation that has to fail with an error instead of a panic.
///
/// ```ignore
/// ensure!(!name.is_empty(), DecodeError::invalid_header("empty header name"));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
