use crate::management::error::TransitionError;
use log::debug;
use mcsv_protocol::management::instance::InstanceStatus;

/// Lifecycle of the supervised process.
///
/// `Stopped` and `Crashed` are terminal for a run, but a new run may start from them.
#[derive(Debug, Default)]
pub struct StatusMachine {
    status: InstanceStatus,
}

impl StatusMachine {
    pub fn status(&self) -> InstanceStatus {
        self.status
    }

    pub fn can_transition(&self, to: InstanceStatus) -> bool {
        use InstanceStatus::*;
        matches!(
            (self.status, to),
            (Idle | Stopped | Crashed, Starting)
                | (Starting, Running)
                | (Starting, Idle) // spawn failed
                | (Running, Stopping)
                | (Running, Crashed)
                | (Stopping, Stopped)
        )
    }

    pub fn transition(&mut self, to: InstanceStatus) -> Result<(), TransitionError> {
        if self.can_transition(to) {
            debug!("status transition: {} -> {}", self.status, to);
            self.status = to;
            Ok(())
        } else {
            Err(TransitionError::InvalidTransition(self.status, to))
        }
    }
}
