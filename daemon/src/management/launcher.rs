use crate::management::comm::{ProcessHandle, ProcessSupervisor};
use crate::management::error::{InputError, LaunchError};
use crate::management::launch::{LaunchSpec, LaunchValidation};
use crate::management::profile::{describe, ServerProfile, ServerProfiles};
use crate::storage::ConfigStore;
use log::{info, warn};
use std::sync::Arc;

/// Starts the server configured in the settings store.
///
/// The launch spec is re-read from the settings on every start.
pub struct Launcher {
    supervisor: Arc<ProcessSupervisor>,
    profiles: ServerProfiles,
    store: Arc<dyn ConfigStore>,
}

impl Launcher {
    pub fn new(
        supervisor: Arc<ProcessSupervisor>,
        profiles: ServerProfiles,
        store: Arc<dyn ConfigStore>,
    ) -> Self {
        Self {
            supervisor,
            profiles,
            store,
        }
    }

    pub fn supervisor(&self) -> &Arc<ProcessSupervisor> {
        &self.supervisor
    }

    pub fn spec(&self) -> LaunchSpec {
        LaunchSpec::from_store(self.store.as_ref())
    }

    pub fn profile(&self, spec: &LaunchSpec) -> Result<Arc<dyn ServerProfile>, LaunchError> {
        self.profiles.get(&spec.server_type).ok_or_else(|| {
            let mut validation = LaunchValidation::default();
            validation.error(
                "server_type",
                format!(
                    "unknown server type {:?}, expected one of {}",
                    spec.server_type,
                    self.profiles.names().collect::<Vec<_>>().join(", ")
                ),
            );
            LaunchError::Invalid(validation)
        })
    }

    pub async fn start(&self) -> Result<ProcessHandle, LaunchError> {
        let spec = self.spec();
        let profile = self.profile(&spec)?;
        info!("launching {}", describe(profile.as_ref()));
        self.supervisor.start(profile, spec).await
    }

    /// Gracefully stops a running server, then starts it again.
    pub async fn restart(&self) -> Result<ProcessHandle, LaunchError> {
        match self.supervisor.stop(true).await {
            Ok(()) => info!("server stopped for restart"),
            Err(InputError::ProcessNotRunning) => {}
            Err(err) => warn!("stop before restart: {}", err),
        }
        self.start().await
    }
}
