//! Connection state of a device session.

/// Where a session is in the connect/pair/subscribe sequence.
///
/// Any state falls back to [`Disconnected`](Self::Disconnected) when the
/// link fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No link.
    #[default]
    Disconnected,
    /// Link being opened or pairing key being written.
    Connecting,
    /// Pairing key accepted; settings can be written.
    Paired,
    /// Notifications enabled; readings are flowing.
    Subscribed,
}

impl ConnectionState {
    /// Check if the pairing key has been accepted on the current link.
    pub fn is_paired(&self) -> bool {
        matches!(self, Self::Paired | Self::Subscribed)
    }

    /// Check if readings are flowing.
    pub fn is_subscribed(&self) -> bool {
        matches!(self, Self::Subscribed)
    }

    /// Check if in a transitional state.
    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::Connecting)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Paired => write!(f, "Paired"),
            Self::Subscribed => write!(f, "Subscribed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state() {
        assert!(!ConnectionState::Disconnected.is_paired());
        assert!(!ConnectionState::Connecting.is_paired());
        assert!(ConnectionState::Paired.is_paired());
        assert!(ConnectionState::Subscribed.is_paired());

        assert!(ConnectionState::Subscribed.is_subscribed());
        assert!(!ConnectionState::Paired.is_subscribed());

        assert!(ConnectionState::Connecting.is_transitioning());
        assert!(!ConnectionState::Subscribed.is_transitioning());
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(format!("{}", ConnectionState::Subscribed), "Subscribed");
        assert_eq!(format!("{}", ConnectionState::Disconnected), "Disconnected");
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }
}
