use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Persisted metadata of one account or container, with the resource's
/// sysmeta prefix already stripped (e.g. `default-object-x-delete-after`).
pub type SysmetaMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MetadataError {
    #[error("account metadata lookup failed for {account}: {detail}")]
    Account { account: String, detail: String },
    #[error("container metadata lookup failed for {account}/{container}: {detail}")]
    Container {
        account: String,
        container: String,
        detail: String,
    },
}

/// Source of persisted account and container metadata.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn fetch_account_metadata(&self, account: &str) -> Result<SysmetaMap, MetadataError>;

    async fn fetch_container_metadata(
        &self,
        account: &str,
        container: &str,
    ) -> Result<SysmetaMap, MetadataError>;
}

pub type SharedMetadataProvider = Arc<dyn MetadataProvider>;
