//! Date, month, and datetime fields.
//!
//! Values normalize to canonical strings: `YYYY-MM-DD` for dates, `YYYY-MM`
//! for months, `YYYY-MM-DDTHH:MM:SS` for datetimes. Comparisons (bounds,
//! pair rules) happen on parsed instants, never on the raw strings.

use std::rc::Rc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;

use super::number::parse_number;
use super::{shift_fullwidth, FieldDescriptor, FieldKind, Parsed, Validator};
use crate::context::Constraint;
use crate::outcome::{Code, FieldResult};

/// Which member of the date family a field is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateKind {
    Date,
    Month,
    DateTime,
}

impl DateKind {
    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            DateKind::Date => "date",
            DateKind::Month => "month",
            DateKind::DateTime => "datetime",
        }
    }
}

/// Which side of the sibling a pair rule requires this date to fall on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairPosition {
    Before,
    After,
}

/// Cross-field ordering rule: this date must fall before/after a named
/// sibling date. The comparison is this field's instant against the
/// *sibling's* instant; `allow_same` (default true) permits equal instants.
#[derive(Debug, Clone)]
pub struct PairRule {
    pub name: String,
    pub position: PairPosition,
    pub allow_same: bool,
}

impl PairRule {
    pub fn before(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position: PairPosition::Before,
            allow_same: true,
        }
    }

    pub fn after(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position: PairPosition::After,
            allow_same: true,
        }
    }

    /// Forbid equal instants.
    pub fn strict(mut self) -> Self {
        self.allow_same = false;
        self
    }
}

/// Split-date component units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateUnit {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

impl DateUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateUnit::Year => "year",
            DateUnit::Month => "month",
            DateUnit::Day => "day",
            DateUnit::Hour => "hour",
            DateUnit::Minute => "minute",
            DateUnit::Second => "second",
        }
    }
}

/// A split-date component: an independent numeric sub-field with its own
/// min/max/required, addressed at `{date_path}.{unit}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatePart {
    min: Option<i64>,
    max: Option<i64>,
    required: bool,
}

impl DatePart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min(mut self, min: i64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: i64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Parse and bound-check one component value.
    pub(crate) fn check(&self, raw: Option<&Value>) -> (Option<Value>, Option<FieldResult>) {
        let parsed = parse_number(raw);
        if parsed.error.is_some() {
            return (None, parsed.error);
        }
        let Some(value) = parsed.value else {
            if self.required {
                return (None, Some(FieldResult::error(Code::Required)));
            }
            return (None, None);
        };
        let n = value.as_f64().unwrap_or(f64::NAN);
        if let Some(min) = self.min {
            if n < min as f64 {
                return (Some(value), Some(FieldResult::error(Code::Min { min: min as f64 })));
            }
        }
        if let Some(max) = self.max {
            if n > max as f64 {
                return (Some(value), Some(FieldResult::error(Code::Max { max: max as f64 })));
            }
        }
        (Some(value), None)
    }
}

/// Builder for date-family fields.
#[derive(Debug)]
pub struct DateField {
    kind: DateKind,
    min: Option<Constraint<NaiveDate>>,
    max: Option<Constraint<NaiveDate>>,
    min_time: Option<Constraint<NaiveTime>>,
    max_time: Option<Constraint<NaiveTime>>,
    pair: Option<PairRule>,
    parts: Vec<(DateUnit, DatePart)>,
}

impl DateField {
    pub fn date() -> Self {
        Self::with_kind(DateKind::Date)
    }

    pub fn month() -> Self {
        Self::with_kind(DateKind::Month)
    }

    pub fn datetime() -> Self {
        Self::with_kind(DateKind::DateTime)
    }

    fn with_kind(kind: DateKind) -> Self {
        Self {
            kind,
            min: None,
            max: None,
            min_time: None,
            max_time: None,
            pair: None,
            parts: Vec::new(),
        }
    }

    pub fn min(mut self, min: impl Into<Constraint<NaiveDate>>) -> Self {
        self.min = Some(min.into());
        self
    }

    pub fn max(mut self, max: impl Into<Constraint<NaiveDate>>) -> Self {
        self.max = Some(max.into());
        self
    }

    /// Earliest allowed time of day (datetime fields).
    pub fn min_time(mut self, min: impl Into<Constraint<NaiveTime>>) -> Self {
        self.min_time = Some(min.into());
        self
    }

    /// Latest allowed time of day (datetime fields).
    pub fn max_time(mut self, max: impl Into<Constraint<NaiveTime>>) -> Self {
        self.max_time = Some(max.into());
        self
    }

    /// Order this date against a named sibling date. The sibling is
    /// automatically added to the field's dependency refs.
    pub fn pair(mut self, pair: PairRule) -> Self {
        self.pair = Some(pair);
        self
    }

    /// Attach a split-date component sub-field.
    pub fn part(mut self, unit: DateUnit, part: DatePart) -> Self {
        self.parts.push((unit, part));
        self
    }

    pub fn build(self) -> FieldDescriptor {
        let kind = self.kind;
        let mut validators: Vec<Validator> = Vec::new();

        if let Some(min) = self.min.clone() {
            validators.push(Rc::new(move |ctx| {
                let bound = min.resolve(ctx)?;
                let date = instant(kind, ctx.value.as_str()?)?.date();
                (date < bound).then(|| {
                    FieldResult::error(Code::MinDate {
                        min: bound.format("%Y-%m-%d").to_string(),
                    })
                })
            }));
        }
        if let Some(max) = self.max.clone() {
            validators.push(Rc::new(move |ctx| {
                let bound = max.resolve(ctx)?;
                let date = instant(kind, ctx.value.as_str()?)?.date();
                (date > bound).then(|| {
                    FieldResult::error(Code::MaxDate {
                        max: bound.format("%Y-%m-%d").to_string(),
                    })
                })
            }));
        }
        if let Some(min_time) = self.min_time.clone() {
            validators.push(Rc::new(move |ctx| {
                let bound = min_time.resolve(ctx)?;
                let time = instant(kind, ctx.value.as_str()?)?.time();
                (time < bound).then(|| {
                    FieldResult::error(Code::MinTime {
                        min: bound.format("%H:%M").to_string(),
                    })
                })
            }));
        }
        if let Some(max_time) = self.max_time.clone() {
            validators.push(Rc::new(move |ctx| {
                let bound = max_time.resolve(ctx)?;
                let time = instant(kind, ctx.value.as_str()?)?.time();
                (time > bound).then(|| {
                    FieldResult::error(Code::MaxTime {
                        max: bound.format("%H:%M").to_string(),
                    })
                })
            }));
        }
        if let Some(pair) = self.pair.clone() {
            validators.push(Rc::new(move |ctx| {
                let own = instant(kind, ctx.value.as_str()?)?;
                let sibling_raw = ctx.relative(&format!(".{}", pair.name))?;
                let sibling = instant(kind, sibling_raw.as_str()?)?;
                let ok = match (pair.position, pair.allow_same) {
                    (PairPosition::Before, true) => own <= sibling,
                    (PairPosition::Before, false) => own < sibling,
                    (PairPosition::After, true) => own >= sibling,
                    (PairPosition::After, false) => own > sibling,
                };
                (!ok).then(|| {
                    let name = pair.name.clone();
                    match pair.position {
                        PairPosition::Before => FieldResult::error(Code::PairBefore { name }),
                        PairPosition::After => FieldResult::error(Code::PairAfter { name }),
                    }
                })
            }));
        }

        let pair_ref = self.pair.as_ref().map(|p| format!(".{}", p.name));
        let mut descriptor = FieldDescriptor::of(FieldKind::Date(self), validators);
        if let Some(r) = pair_ref {
            descriptor.refs.push(r);
        }
        descriptor
    }

    pub(crate) fn kind(&self) -> DateKind {
        self.kind
    }

    /// Declared split-date components.
    pub(crate) fn parts(&self) -> &[(DateUnit, DatePart)] {
        &self.parts
    }

    pub(crate) fn parse(&self, raw: Option<&Value>) -> Parsed {
        match raw {
            None | Some(Value::Null) => Parsed::absent(),
            Some(Value::String(s)) => {
                let shifted = shift_fullwidth(s);
                let trimmed = shifted.trim();
                if trimmed.is_empty() {
                    return Parsed::absent();
                }
                match instant(self.kind, trimmed) {
                    Some(parsed) => Parsed::value(Value::String(canonical(self.kind, parsed))),
                    None => Parsed::failed(),
                }
            }
            Some(_) => Parsed::failed(),
        }
    }
}

/// Parse a raw date-family string into an instant. Date-only kinds resolve
/// to midnight (months to the first of the month).
fn instant(kind: DateKind, s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    match kind {
        DateKind::Date => {
            let normalized = s.replace('/', "-").replace('.', "-");
            NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        }
        DateKind::Month => {
            let normalized = s.replace('/', "-");
            NaiveDate::parse_from_str(&format!("{}-1", normalized), "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        }
        DateKind::DateTime => {
            let normalized = s.replace('/', "-");
            const FORMATS: &[&str] = &[
                "%Y-%m-%dT%H:%M:%S",
                "%Y-%m-%dT%H:%M",
                "%Y-%m-%d %H:%M:%S",
                "%Y-%m-%d %H:%M",
            ];
            FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(&normalized, f).ok())
                .or_else(|| {
                    // date-only input promotes to midnight
                    NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                })
        }
    }
}

fn canonical(kind: DateKind, instant: NaiveDateTime) -> String {
    match kind {
        DateKind::Date => instant.format("%Y-%m-%d").to_string(),
        DateKind::Month => instant.format("%Y-%m").to_string(),
        DateKind::DateTime => instant.format("%Y-%m-%dT%H:%M:%S").to_string(),
    }
}
