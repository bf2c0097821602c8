use crate::utils::error::{BoxError, ClientKind};
use async_trait::async_trait;

/// Construct, probe and close one kind of vendor client.
///
/// Implementations only talk to the vendor library; caching, the probe
/// timeout and logging live in [`crate::core::factory::ClientFactory`].
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Config: Send + Sync;
    type Client: Send + Sync + 'static;

    fn kind(&self) -> ClientKind;

    /// Builds the vendor client. Must not assume the remote side is reachable.
    async fn connect(&self, config: &Self::Config) -> Result<Self::Client, BoxError>;

    /// Lightweight round-trip proving the remote side answers.
    async fn probe(&self, client: &Self::Client) -> Result<(), BoxError>;

    async fn close(&self, client: &Self::Client) -> Result<(), BoxError>;
}
