//! Validation outcome taxonomy.
//!
//! Outcomes are data, never exceptions: each is a code-tagged value attached
//! to one path, carrying the structured parameters a presentation layer
//! needs to render a message later. The engine itself never produces
//! human-readable text.

use serde::Serialize;

/// Outcome severity. Only [`Severity::Error`] contributes to `has_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// Stable outcome codes with their structured parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "code", rename_all = "camelCase")]
pub enum Code {
    Required,
    /// Raw input could not be parsed into the field's value type.
    Parse,
    Length { len: usize },
    MinLength { min: usize },
    MaxLength { max: usize },
    Pattern,
    /// Value is not a member of the declared allowed set.
    Source,
    Min { min: f64 },
    Max { max: f64 },
    /// A fractional value where an integer is required.
    Float,
    MinDate { min: String },
    MaxDate { max: String },
    MinTime { min: String },
    MaxTime { max: String },
    PairBefore { name: String },
    PairAfter { name: String },
    Accept { accept: String },
    MaxSize { max: u64 },
    /// Authored validator outcome, keyed for locale lookup by the caller.
    Custom { key: String },
}

impl Code {
    /// The stable code tag, as it serializes.
    pub fn tag(&self) -> &'static str {
        match self {
            Code::Required => "required",
            Code::Parse => "parse",
            Code::Length { .. } => "length",
            Code::MinLength { .. } => "minLength",
            Code::MaxLength { .. } => "maxLength",
            Code::Pattern => "pattern",
            Code::Source => "source",
            Code::Min { .. } => "min",
            Code::Max { .. } => "max",
            Code::Float => "float",
            Code::MinDate { .. } => "minDate",
            Code::MaxDate { .. } => "maxDate",
            Code::MinTime { .. } => "minTime",
            Code::MaxTime { .. } => "maxTime",
            Code::PairBefore { .. } => "pairBefore",
            Code::PairAfter { .. } => "pairAfter",
            Code::Accept { .. } => "accept",
            Code::MaxSize { .. } => "maxSize",
            Code::Custom { .. } => "custom",
        }
    }
}

/// One validation outcome for one path.
///
/// Change detection compares severity and code (with parameters), never
/// object identity, so re-producing an equal outcome is a no-op downstream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldResult {
    pub severity: Severity,
    #[serde(flatten)]
    pub code: Code,
}

impl FieldResult {
    pub fn error(code: Code) -> Self {
        Self {
            severity: Severity::Error,
            code,
        }
    }

    pub fn warning(code: Code) -> Self {
        Self {
            severity: Severity::Warning,
            code,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn code_tags_are_stable() {
        assert_eq!(Code::Parse.tag(), "parse");
        assert_eq!(Code::MinLength { min: 2 }.tag(), "minLength");
        assert_eq!(
            Code::PairAfter {
                name: "start".into()
            }
            .tag(),
            "pairAfter"
        );
    }

    #[test]
    fn serializes_with_code_tag_and_params() {
        let result = FieldResult::error(Code::Min { min: 0.0 });
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value, json!({"severity": "error", "code": "min", "min": 0.0}));
    }

    #[test]
    fn equality_ignores_nothing() {
        let a = FieldResult::error(Code::Max { max: 10.0 });
        let b = FieldResult::error(Code::Max { max: 10.0 });
        let c = FieldResult::warning(Code::Max { max: 10.0 });
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn only_errors_count_as_errors() {
        assert!(FieldResult::error(Code::Required).is_error());
        assert!(!FieldResult::warning(Code::Required).is_error());
    }
}
