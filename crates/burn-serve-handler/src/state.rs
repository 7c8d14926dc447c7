use crate::error::HandlerError;

/// Lifecycle of a handler instance.
///
/// `Uninitialized` moves to `Initialized` on a successful
/// [`initialize`](crate::BaseHandler::initialize) and to `Failed` otherwise.
/// `Failed` is terminal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum HandlerState {
    #[default]
    Uninitialized,
    Initialized,
    Failed,
}

impl HandlerState {
    /// Checks that pipeline stages may run.
    pub fn ensure_ready(self) -> Result<(), HandlerError> {
        match self {
            HandlerState::Initialized => Ok(()),
            HandlerState::Uninitialized => Err(HandlerError::Uninitialized),
            HandlerState::Failed => Err(HandlerError::Failed),
        }
    }

    /// Checks that `initialize` may run.
    pub fn ensure_initializable(self) -> Result<(), HandlerError> {
        match self {
            HandlerState::Uninitialized => Ok(()),
            HandlerState::Initialized => Err(HandlerError::AlreadyInitialized),
            HandlerState::Failed => Err(HandlerError::Failed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn only_initialized_is_ready() {
        assert!(HandlerState::Initialized.ensure_ready().is_ok());
        assert!(matches!(
            HandlerState::Uninitialized.ensure_ready(),
            Err(HandlerError::Uninitialized)
        ));
        assert!(matches!(
            HandlerState::Failed.ensure_ready(),
            Err(HandlerError::Failed)
        ));
    }

    #[test]
    fn failed_state_is_terminal() {
        assert!(matches!(
            HandlerState::Failed.ensure_initializable(),
            Err(HandlerError::Failed)
        ));
        assert!(matches!(
            HandlerState::Initialized.ensure_initializable(),
            Err(HandlerError::AlreadyInitialized)
        ));
    }

    #[test]
    fn state_names_round_trip_through_strum() {
        assert_eq!(HandlerState::Uninitialized.to_string(), "uninitialized");
        assert_eq!(
            HandlerState::from_str("initialized").unwrap(),
            HandlerState::Initialized
        );
    }
}
