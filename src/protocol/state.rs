//! Session state machine.
//!
//! A session is always in exactly one [`SessionState`]. Every change goes
//! through [`SessionState::can_transition_to`], which makes reading and
//! sending mutually exclusive and keeps `Disconnected` terminal.

use std::fmt;

/// Lifecycle and activity state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// Created with a remote address, transport not opened yet
    #[default]
    Unconnected,
    /// Connect in flight
    Connecting,
    /// Transport open and no operation outstanding
    Connected,
    /// One frame read outstanding
    Reading,
    /// One frame write outstanding
    Sending,
    /// Terminal; the transport has been released
    Disconnected,
}

impl SessionState {
    /// Transport is open (idle or busy)
    pub fn is_connected(self) -> bool {
        matches!(
            self,
            SessionState::Connected | SessionState::Reading | SessionState::Sending
        )
    }

    pub fn is_reading(self) -> bool {
        self == SessionState::Reading
    }

    pub fn is_sending(self) -> bool {
        self == SessionState::Sending
    }

    pub fn is_disconnected(self) -> bool {
        self == SessionState::Disconnected
    }

    /// Connected, not disconnected, not reading and not sending
    pub fn is_idle(self) -> bool {
        self == SessionState::Connected
    }

    /// Central transition table.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;

        match (self, next) {
            (Disconnected, _) => false,
            (_, Disconnected) => true,
            (Unconnected, Connecting)
            | (Connecting, Connected)
            | (Connected, Reading)
            | (Connected, Sending)
            | (Reading, Connected)
            | (Sending, Connected) => true,
            _ => false,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SessionState::Unconnected => "unconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Reading => "reading",
            SessionState::Sending => "sending",
            SessionState::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
