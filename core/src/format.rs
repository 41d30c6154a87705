//! JSON pretty-printing.

use crate::error::FormatError;

/// Re-serialize `raw` with two-space indentation.
///
/// Object keys keep their input order, so for ordinary documents the output
/// differs from `raw` only in whitespace.
pub fn pretty_print(raw: &str) -> Result<String, FormatError> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    Ok(serde_json::to_string_pretty(&value)?)
}
