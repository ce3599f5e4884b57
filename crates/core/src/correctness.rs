//! Precondition checks in the *design by contract* style.
//!
//! These are small, composable validators used at module boundaries (topic
//! and pattern parsing in particular) so that malformed input produces a
//! descriptive error instead of a panic deep inside matching logic.

/// A message prefix used alongside `expect` calls for invariants that the
/// crate itself is responsible for upholding (as opposed to caller input).
pub const FAILED: &str = "Condition failed";

/// Checks that `s` is non-empty.
///
/// # Errors
///
/// Returns an error if `s` is empty.
pub fn check_nonempty_string<T: AsRef<str>>(s: T, param: &str) -> Result<(), String> {
    if s.as_ref().is_empty() {
        return Err(format!("invalid string for '{param}', was empty"));
    }
    Ok(())
}

/// Checks that every character in `s` is allowed by the given predicate.
///
/// # Errors
///
/// Returns an error naming the first disallowed character.
pub fn check_chars<T: AsRef<str>>(
    s: T,
    param: &str,
    allowed: impl Fn(char) -> bool,
) -> Result<(), String> {
    if let Some(bad) = s.as_ref().chars().find(|c| !allowed(*c)) {
        return Err(format!(
            "invalid character '{bad}' in '{param}', value was '{}'",
            s.as_ref()
        ));
    }
    Ok(())
}

/// Checks the `predicate` is true, failing with `fail_msg` otherwise.
///
/// # Errors
///
/// Returns an error if the predicate does not hold.
pub fn check_predicate_true(predicate: bool, fail_msg: &str) -> Result<(), String> {
    if !predicate {
        return Err(fail_msg.to_string());
    }
    Ok(())
}
