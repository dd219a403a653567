/// Where a request sits in its lifecycle.
///
/// `Redirecting` and `Retrying` are transient: the controller moves straight
/// back to `Preparing` for the next attempt. `Completed` and `Failed` are
/// terminal for one submission cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    /// Never submitted, or reset.
    #[default]
    Idle,

    /// Wiring sinks, headers and body for the next attempt.
    Preparing,

    /// Handed to the multiplexer, waiting for its completion notification.
    InFlight,

    /// A 3xx response with a location; the url has been rewritten.
    Redirecting,

    /// A non-success outcome with budget left.
    Retrying,

    /// Final attempt returned 200.
    Completed,

    /// Retry budget exhausted.
    Failed,
}

impl LoadState {
    pub fn is_terminal(self) -> bool {
        matches!(self, LoadState::Completed | LoadState::Failed)
    }
}
