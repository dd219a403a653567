//! Attempt classification and the shared retry budget.
//!
//! Every non-success outcome of an attempt draws from one budget, whether it
//! was a transport failure, a bad status, or a redirect hop. A chain of five
//! redirects followed by one failure therefore costs the same as six
//! failures. A 200 outcome never draws from the budget.

use crate::base::loadstate::LoadState;
use crate::base::neterror::NetError;
use crate::http::response::ResponseHead;
use url::Url;

/// What one attempt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Status 200.
    Success,
    /// 3xx with a usable location; the next attempt goes there.
    Redirect(Url),
    /// 3xx without a usable location. Retried against the same url.
    RedirectWithoutLocation(u16),
    /// Status line could not be parsed (status 0).
    MalformedResponse,
    /// Any other status.
    HttpStatus(u16),
    /// The attempt did not complete at the protocol level.
    TransportFailure(NetError),
}

impl AttemptOutcome {
    /// Classify a decoded response. Relative locations resolve against `current`.
    pub fn from_response(head: &ResponseHead, current: &str) -> Self {
        if head.is_success() {
            return AttemptOutcome::Success;
        }
        if head.status == 0 {
            return AttemptOutcome::MalformedResponse;
        }
        if head.is_redirection() {
            return match head.location().and_then(|loc| resolve_location(current, loc)) {
                Some(url) => AttemptOutcome::Redirect(url),
                None => AttemptOutcome::RedirectWithoutLocation(head.status),
            };
        }
        AttemptOutcome::HttpStatus(head.status)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Success)
    }
}

fn resolve_location(current: &str, location: &str) -> Option<Url> {
    let resolved = match Url::parse(current) {
        Ok(base) => base.join(location),
        Err(_) => Url::parse(location),
    };
    match resolved {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::debug!(location = %location, error = %e, "unusable redirect location");
            None
        }
    }
}

/// Remaining attempts for one submission cycle. May go negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    remaining: i32,
}

impl RetryBudget {
    pub fn new(max_retry_count: u32) -> Self {
        Self {
            remaining: i32::try_from(max_retry_count).unwrap_or(i32::MAX),
        }
    }

    pub fn remaining(&self) -> i32 {
        self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining < 0
    }

    /// Charge the budget for `outcome` and pick the next state.
    ///
    /// Returns a terminal state (`Completed`/`Failed`) or the transient state
    /// the controller passes through before preparing the next attempt.
    pub fn next_state(&mut self, outcome: &AttemptOutcome) -> LoadState {
        if outcome.is_success() {
            return LoadState::Completed;
        }
        self.remaining -= 1;
        if self.is_exhausted() {
            LoadState::Failed
        } else if matches!(outcome, AttemptOutcome::Redirect(_)) {
            LoadState::Redirecting
        } else {
            LoadState::Retrying
        }
    }
}
