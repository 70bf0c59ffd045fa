//! Signing session phases.

use std::fmt;

/// Lifecycle phase of a [`SigningSession`](crate::services::SigningSession).
///
/// Phases only move forward, one step at a time:
/// `Created -> Prepared -> ParamsFetched -> LocallySigned -> Injected -> Finalized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Created,
    Prepared,
    ParamsFetched,
    LocallySigned,
    Injected,
    Finalized,
}

impl Phase {
    /// The phase a session must be in for a transition into `self` to be legal.
    ///
    /// `Created` has no predecessor: sessions start there and never return.
    #[must_use]
    pub fn predecessor(self) -> Option<Phase> {
        match self {
            Phase::Created => None,
            Phase::Prepared => Some(Phase::Created),
            Phase::ParamsFetched => Some(Phase::Prepared),
            Phase::LocallySigned => Some(Phase::ParamsFetched),
            Phase::Injected => Some(Phase::LocallySigned),
            Phase::Finalized => Some(Phase::Injected),
        }
    }

    /// Name of the operation that moves a session into this phase.
    #[must_use]
    pub fn operation(self) -> &'static str {
        match self {
            Phase::Created => "create",
            Phase::Prepared => "prepare",
            Phase::ParamsFetched => "fetch params",
            Phase::LocallySigned => "sign locally",
            Phase::Injected => "inject",
            Phase::Finalized => "finalize",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == Phase::Finalized
    }
}

/// Renders the phase when printed as the current state and the operation name when
/// printed with the alternate flag (`{:#}`).
impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            return f.write_str(self.operation());
        }
        let name = match self {
            Phase::Created => "created",
            Phase::Prepared => "prepared",
            Phase::ParamsFetched => "params-fetched",
            Phase::LocallySigned => "locally-signed",
            Phase::Injected => "injected",
            Phase::Finalized => "finalized",
        };
        f.write_str(name)
    }
}
