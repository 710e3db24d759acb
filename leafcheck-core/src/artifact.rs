use async_trait::async_trait;

use crate::accounts::Account;

/// Receives diagnostic page snapshots captured on repeated readiness
/// failures. Persistence is the caller's concern; the core only names and
/// hands over the bytes. Store failures must never fail the attempt.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    async fn store(&self, name: &str, png: &[u8]);
}

/// Discards everything; the default when no sink is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullArtifactSink;

#[async_trait]
impl ArtifactSink for NullArtifactSink {
    async fn store(&self, _name: &str, _png: &[u8]) {}
}

/// Snapshot name disambiguating retries across accounts: local part of the
/// identifier plus the attempt number.
pub fn artifact_name(account: &Account, attempt: usize) -> String {
    format!("{}_attempt{attempt}", account.local_part())
}
