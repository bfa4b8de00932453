//! Camera session states and the commands that move between them.

use std::fmt;

/// Lifecycle state of the single managed camera.
///
/// ```text
/// Uninitialized --init--> Configured --start--> Running --stop--> Stopped
///                                                  |                 ^
///                                           (close fails)            |
///                                                  v                 |
///                                                Halted ----stop-----+
/// ```
///
/// `Stopped` needs a fresh `init` before the camera can stream again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// No open handle; `init` has not succeeded.
    #[default]
    Uninitialized,
    /// Handle open and configured, not streaming.
    Configured,
    /// Streaming frames to the sink.
    Running,
    /// Streaming was halted but the device handle could not be closed.
    Halted,
    /// Streaming halted and handle closed.
    Stopped,
}

impl SessionState {
    /// Whether the device handle is held open in this state.
    pub fn handle_open(self) -> bool {
        matches!(self, Self::Configured | Self::Running | Self::Halted)
    }

    /// Numeric code exported as a gauge.
    pub fn code(self) -> i64 {
        match self {
            Self::Uninitialized => 0,
            Self::Configured => 1,
            Self::Running => 2,
            Self::Halted => 3,
            Self::Stopped => 4,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Configured => "configured",
            Self::Running => "running",
            Self::Halted => "halted",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Controller commands, used to name the operation in errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Configure the camera.
    Init,
    /// Begin streaming.
    Start,
    /// Halt streaming and close.
    Stop,
    /// Change exposure time.
    SetExposure,
    /// Save the device's last frame.
    SaveFrame,
}

impl Command {
    /// States from which the command may be issued.
    pub fn allowed_from(self) -> &'static [SessionState] {
        use SessionState::*;
        match self {
            Self::Init => &[Uninitialized, Stopped],
            Self::Start => &[Configured],
            Self::Stop => &[Running, Halted],
            Self::SetExposure => &[Configured, Running],
            Self::SaveFrame => &[Configured, Running, Halted],
        }
    }

    /// Whether the command may be issued from `state`.
    pub fn is_allowed(self, state: SessionState) -> bool {
        self.allowed_from().contains(&state)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::SetExposure => "set_exposure",
            Self::SaveFrame => "save_frame",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_only_from_configured() {
        assert!(Command::Start.is_allowed(SessionState::Configured));
        for state in [
            SessionState::Uninitialized,
            SessionState::Running,
            SessionState::Halted,
            SessionState::Stopped,
        ] {
            assert!(!Command::Start.is_allowed(state), "start allowed from {state}");
        }
    }

    #[test]
    fn test_init_rejected_while_handle_open() {
        for state in [SessionState::Configured, SessionState::Running, SessionState::Halted] {
            assert!(state.handle_open());
            assert!(!Command::Init.is_allowed(state));
        }
    }
}
