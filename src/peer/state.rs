use std::fmt;

/// Lifecycle of one negotiation attempt.
///
/// ```text
/// Idle -> AwaitingLocalAnswer -> Negotiating -> Connected -> Closed
/// ```
/// Any state may move straight to `Closed`; nothing leaves `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Idle,
    AwaitingLocalAnswer,
    Negotiating,
    Connected,
    Closed,
}

impl NegotiationState {
    pub fn can_transition_to(self, next: NegotiationState) -> bool {
        use NegotiationState::*;
        matches!(
            (self, next),
            (Idle, AwaitingLocalAnswer)
                | (AwaitingLocalAnswer, Negotiating)
                | (Negotiating, Connected)
                | (Idle | AwaitingLocalAnswer | Negotiating | Connected, Closed)
        )
    }

    /// Local candidates are forwarded only once the answer has been sent
    pub fn accepts_candidates(self) -> bool {
        matches!(
            self,
            NegotiationState::Negotiating | NegotiationState::Connected
        )
    }

    /// A remote stream may be bound to the sink from `Negotiating` onward
    pub fn accepts_streams(self) -> bool {
        self.accepts_candidates()
    }

    pub fn is_closed(self) -> bool {
        self == NegotiationState::Closed
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NegotiationState::Idle => "idle",
            NegotiationState::AwaitingLocalAnswer => "awaiting-local-answer",
            NegotiationState::Negotiating => "negotiating",
            NegotiationState::Connected => "connected",
            NegotiationState::Closed => "closed",
        }
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
