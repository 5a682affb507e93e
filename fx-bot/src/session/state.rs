//! Session stage and accumulated fields.

use crate::currency::CurrencyCode;
use crate::error::{DialogueError, DialogueResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dialogue stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// No conversion in progress.
    #[default]
    Idle,
    /// Waiting for the base currency.
    AwaitingBase,
    /// Base chosen, waiting for the target currency.
    AwaitingTarget,
    /// Both currencies chosen, waiting for the amount.
    AwaitingAmount,
}

impl Stage {
    /// Stable snake-case name, used in logs and errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingBase => "awaiting_base",
            Self::AwaitingTarget => "awaiting_target",
            Self::AwaitingAmount => "awaiting_amount",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's in-progress conversion.
///
/// The mutators keep the session consistent: `target` is only set after
/// `base`, the two never match, and both are empty whenever the stage is
/// [`Stage::Idle`]. A session obtained from a store backend through serde is
/// not checked; see [`Session::is_consistent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Session {
    stage: Stage,
    #[serde(default)]
    base: Option<CurrencyCode>,
    #[serde(default)]
    target: Option<CurrencyCode>,
}

impl Session {
    /// An idle session with no fields set.
    #[must_use]
    pub const fn idle() -> Self {
        Self {
            stage: Stage::Idle,
            base: None,
            target: None,
        }
    }

    /// A fresh session waiting for the base currency.
    #[must_use]
    pub const fn awaiting_base() -> Self {
        Self {
            stage: Stage::AwaitingBase,
            base: None,
            target: None,
        }
    }

    /// Current stage.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    /// Chosen base currency.
    #[must_use]
    pub const fn base(&self) -> Option<CurrencyCode> {
        self.base
    }

    /// Chosen target currency.
    #[must_use]
    pub const fn target(&self) -> Option<CurrencyCode> {
        self.target
    }

    /// Whether this is the empty idle session.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        *self == Self::idle()
    }

    /// Record the base currency and move on to the target.
    ///
    /// Any previously chosen target is dropped.
    pub fn choose_base(&mut self, base: CurrencyCode) {
        self.base = Some(base);
        self.target = None;
        self.stage = Stage::AwaitingTarget;
    }

    /// Record the target currency and move on to the amount.
    ///
    /// # Errors
    ///
    /// Fails without touching the session if no base is set or the target
    /// equals the base.
    pub fn choose_target(&mut self, target: CurrencyCode) -> DialogueResult<()> {
        let base = self.base.ok_or(DialogueError::MissingField {
            stage: self.stage.as_str(),
            field: "base",
        })?;
        if base == target {
            return Err(DialogueError::SameCurrency(target.to_string()));
        }
        self.target = Some(target);
        self.stage = Stage::AwaitingAmount;
        Ok(())
    }

    /// Return to idle, dropping both fields.
    pub fn clear(&mut self) {
        *self = Self::idle();
    }

    /// The `(base, target)` pair needed for a conversion.
    ///
    /// # Errors
    ///
    /// Fails if either field is unset or they are equal.
    pub fn conversion_pair(&self) -> DialogueResult<(CurrencyCode, CurrencyCode)> {
        let missing = |field| DialogueError::MissingField {
            stage: self.stage.as_str(),
            field,
        };
        let base = self.base.ok_or_else(|| missing("base"))?;
        let target = self.target.ok_or_else(|| missing("target"))?;
        if base == target {
            return Err(DialogueError::SameCurrency(base.to_string()));
        }
        Ok((base, target))
    }

    /// Whether the fields agree with each other and with the stage.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let fields_ok = match (self.base, self.target) {
            (None, Some(_)) => false,
            (Some(base), Some(target)) => base != target,
            _ => true,
        };
        let stage_ok = match self.stage {
            Stage::Idle | Stage::AwaitingBase => self.base.is_none() && self.target.is_none(),
            Stage::AwaitingTarget => self.base.is_some() && self.target.is_none(),
            Stage::AwaitingAmount => self.base.is_some() && self.target.is_some(),
        };
        fields_ok && stage_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> CurrencyCode {
        CurrencyCode::parse(s).unwrap()
    }

    #[test]
    fn test_happy_path() {
        let mut session = Session::awaiting_base();
        session.choose_base(code("EUR"));
        assert_eq!(session.stage(), Stage::AwaitingTarget);
        assert_eq!(session.base(), Some(code("EUR")));

        session.choose_target(code("USD")).unwrap();
        assert_eq!(session.stage(), Stage::AwaitingAmount);
        assert_eq!(session.conversion_pair().unwrap(), (code("EUR"), code("USD")));
        assert!(session.is_consistent());

        session.clear();
        assert!(session.is_idle());
    }

    #[test]
    fn test_same_currency_rejected() {
        let mut session = Session::awaiting_base();
        session.choose_base(code("USD"));
        let before = session;

        let err = session.choose_target(code("USD")).unwrap_err();
        assert!(matches!(err, DialogueError::SameCurrency(_)));
        assert_eq!(session, before);
    }

    #[test]
    fn test_target_requires_base() {
        let mut session = Session::awaiting_base();
        assert!(session.choose_target(code("USD")).is_err());
        assert_eq!(session.target(), None);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut session = Session::idle();
        session.clear();
        assert_eq!(session, Session::idle());
        assert_eq!(session, Session::default());
    }

    #[test]
    fn test_inconsistent_from_storage() {
        let broken: Session =
            serde_json::from_str(r#"{"stage":"awaiting_amount","base":"USD"}"#).unwrap();
        assert!(!broken.is_consistent());
        let err = broken.conversion_pair().unwrap_err();
        assert_eq!(err.to_string(), "stage awaiting_amount reached without target");
    }
}
