/// A long-running front of the daemon; `run` returns once the app is shutting down.
#[async_trait::async_trait]
pub trait Driver: Send + Sync {
    async fn run(&self);

    fn name(&self) -> &'static str;
}
