//! A single user-submitted income/expense record, constructed from raw chat
//! text, validated, committed as one row, and discarded.

use crate::StepError;

/// One income/expense entry as the user typed it: a label and the raw amount
/// text. The amount is validated later, at commit time, so that a bad amount
/// loops the conversation without any cells having been written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Entry {
    pub(crate) label: String,
    pub(crate) raw_amount: String,
}

impl Entry {
    /// Splits raw text of the form `label: amount` into an `Entry`. Exactly
    /// two `:`-separated tokens are required and the label must be non-empty.
    pub(crate) fn split(raw: &str) -> Result<Self, StepError> {
        let tokens: Vec<&str> = raw.split(':').collect();
        if tokens.len() != 2 {
            return Err(StepError::Format(format!(
                "expected 2 ':'-separated tokens, got {}",
                tokens.len()
            )));
        }
        let label = tokens[0].trim();
        if label.is_empty() {
            return Err(StepError::Format("the label must not be empty".to_string()));
        }
        Ok(Entry {
            label: label.to_string(),
            raw_amount: tokens[1].trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_label_and_amount() {
        let e = Entry::split("Bread: 50").unwrap();
        assert_eq!(e.label, "Bread");
        assert_eq!(e.raw_amount, "50");
    }

    #[test]
    fn no_separator_is_a_format_error() {
        let err = Entry::split("Bread").unwrap_err();
        assert!(matches!(err, StepError::Format(_)));
    }

    #[test]
    fn too_many_tokens_is_a_format_error() {
        let err = Entry::split("Bread: 50: extra").unwrap_err();
        assert!(matches!(err, StepError::Format(_)));
    }

    #[test]
    fn empty_label_is_rejected() {
        assert!(Entry::split(": 50").is_err());
    }
}
