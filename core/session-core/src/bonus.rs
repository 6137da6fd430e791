//! Bonus eligibility: a one-way latch with a recorded cause.
//!
//! The incentive itself is calculated by an external reporting collaborator;
//! this core only tracks whether the session still qualifies and why it
//! stopped qualifying. Once revoked, nothing short of a brand-new session
//! restores eligibility.

use serde::{Deserialize, Serialize};

/// Why a session lost bonus eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BonusRevocation {
    /// A crew-oversight QC hold was raised.
    CrewOversight,
    /// An operator manually edited a worker's logged minutes.
    ManualEdit,
    /// Explicitly cancelled from settings or by remote command.
    Cancelled,
}

impl BonusRevocation {
    pub fn describe(&self) -> &'static str {
        match self {
            BonusRevocation::CrewOversight => "QC crew oversight hold",
            BonusRevocation::ManualEdit => "worker hours edited manually",
            BonusRevocation::Cancelled => "cancelled by operator",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BonusState {
    Eligible,
    Revoked { reason: BonusRevocation },
}

impl Default for BonusState {
    fn default() -> Self {
        BonusState::Eligible
    }
}

impl BonusState {
    pub fn is_eligible(&self) -> bool {
        matches!(self, BonusState::Eligible)
    }

    /// Latches to `Revoked`, keeping the first recorded reason.
    pub fn revoke(&mut self, reason: BonusRevocation) {
        if self.is_eligible() {
            *self = BonusState::Revoked { reason };
        }
    }
}
