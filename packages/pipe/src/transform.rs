//! Item transforms applied by consumers.

/// Returns the uppercase version of `line`.
#[must_use]
pub fn capitalize<S: AsRef<str>>(line: S) -> String {
    line.as_ref().to_uppercase()
}
