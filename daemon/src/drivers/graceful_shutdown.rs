use log::{debug, error, info};
use tokio::select;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::driver::Driver;
use std::sync::Arc;

pub struct GracefulShutdown {
    drivers: Vec<Arc<dyn Driver>>,
}

impl GracefulShutdown {
    pub fn new() -> Self {
        Self { drivers: vec![] }
    }
}

impl GracefulShutdown {
    pub fn add_driver(&mut self, driver: impl Driver + 'static) {
        self.drivers.push(Arc::new(driver));
    }

    /// Runs every driver until ctrl+c (or any other holder of `stop_token`) cancels the token.
    pub async fn watch(mut self, stop_token: CancellationToken) {
        let shutdown = {
            let stop_token = stop_token.clone();
            async move {
                select! {
                    result = tokio::signal::ctrl_c() => match result {
                        Ok(()) => info!("ctrl+c received, shutting down"),
                        Err(err) => {
                            error!(
                                "graceful shutdown can't install ctrl+c signal handler: {}",
                                err
                            );
                            stop_token.cancelled().await;
                        }
                    },
                    _ = stop_token.cancelled() => {}
                }
                stop_token.cancel();
            }
        };

        let mut join_set = JoinSet::new();
        for driver in self.drivers.drain(..) {
            join_set.spawn(async move {
                driver.run().await;
                debug!("driver {} stopped", driver.name());
            });
        }

        join_set.spawn(shutdown);
        debug!("graceful shutdown start watching");
        join_set.join_all().await;
    }
}
