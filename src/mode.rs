//! Field mode resolution.
//!
//! A field's effective mode cascades down from its ancestors: each ancestor
//! can only make a field *less* interactive, never more. External scope
//! state (an enclosing field-set, a busy session) floors the result after
//! the structural cascade, it is never mixed into it.

use serde::{Deserialize, Serialize};

/// Interactivity mode, ordered by priority.
///
/// `Enabled < Readonly < Disabled < Hidden`; cascading takes the maximum.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Enabled,
    Readonly,
    Disabled,
    Hidden,
}

/// Disabled/readonly flags supplied by an enclosing field-set scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldSetState {
    pub disabled: bool,
    pub readonly: bool,
}

/// Cascade a field's own mode with its ancestor chain (nearest first).
///
/// Stops early once `Hidden` is reached: nothing below a hidden ancestor
/// can become visible again.
pub fn cascade(own: Mode, ancestors: impl IntoIterator<Item = Mode>) -> Mode {
    let mut effective = own;
    if effective == Mode::Hidden {
        return effective;
    }
    for ancestor in ancestors {
        effective = effective.max(ancestor);
        if effective == Mode::Hidden {
            break;
        }
    }
    effective
}

/// Apply external scope state on top of the structural cascade.
///
/// An enclosing disabled field-set floors to `Disabled`, a readonly one to
/// `Readonly`; a busy session (submitting/loading) floors to `Disabled`.
pub fn apply_scope(mode: Mode, field_set: FieldSetState, busy: bool) -> Mode {
    let mut effective = mode;
    if field_set.disabled || busy {
        effective = effective.max(Mode::Disabled);
    } else if field_set.readonly {
        effective = effective.max(Mode::Readonly);
    }
    effective
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_is_total() {
        assert!(Mode::Enabled < Mode::Readonly);
        assert!(Mode::Readonly < Mode::Disabled);
        assert!(Mode::Disabled < Mode::Hidden);
    }

    #[test]
    fn cascade_takes_maximum() {
        assert_eq!(cascade(Mode::Enabled, [Mode::Readonly]), Mode::Readonly);
        assert_eq!(cascade(Mode::Disabled, [Mode::Readonly]), Mode::Disabled);
    }

    #[test]
    fn hidden_ancestor_wins_over_everything() {
        assert_eq!(
            cascade(Mode::Enabled, [Mode::Hidden, Mode::Enabled]),
            Mode::Hidden
        );
    }

    #[test]
    fn scope_floors_after_cascade() {
        let fs = FieldSetState {
            disabled: false,
            readonly: true,
        };
        assert_eq!(apply_scope(Mode::Enabled, fs, false), Mode::Readonly);
        assert_eq!(apply_scope(Mode::Hidden, fs, false), Mode::Hidden);
    }

    #[test]
    fn busy_disables() {
        assert_eq!(
            apply_scope(Mode::Enabled, FieldSetState::default(), true),
            Mode::Disabled
        );
    }
}
