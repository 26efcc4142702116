//! In-memory account, container, and object store used as the terminal pipeline stage.
//!
//! Accounts exist implicitly. Containers must be created with a PUT before
//! objects can be written into them. Account and container system metadata
//! is persisted from `x-<resource>-sysmeta-*` request headers and returned on
//! every response for that resource; empty values are kept as written.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use defaults_resolution::{MetadataError, MetadataProvider, SysmetaMap};
use runtime_pipeline::{Headers, Pipeline, PipelineError, PipelineRequest, PipelineResponse};
use storage_namespace::{ResourcePath, ResourceType};
use tokio::sync::Mutex;
use tracing::debug;

const REMOVE_HEADER_PREFIX: &str = "x-remove-";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredObject {
    pub headers: Headers,
    pub body: Vec<u8>,
}

#[derive(Debug, Default)]
struct StoreState {
    accounts: BTreeMap<String, BTreeMap<String, String>>,
    containers: BTreeMap<(String, String), BTreeMap<String, String>>,
    objects: BTreeMap<(String, String, String), StoredObject>,
}

/// Cloneable handle onto one shared in-memory store.
#[derive(Debug, Clone, Default)]
pub struct SysmetaStore {
    inner: Arc<Mutex<StoreState>>,
}

impl SysmetaStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist account metadata given in provider form (`default-object-...`).
    pub async fn seed_account<I, K, V>(&self, account: &str, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut state = self.inner.lock().await;
        let stored = state.accounts.entry(account.to_string()).or_default();
        merge_seed(stored, ResourceType::Account, pairs);
    }

    /// Create `container` if needed and persist metadata given in provider form.
    pub async fn seed_container<I, K, V>(&self, account: &str, container: &str, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut state = self.inner.lock().await;
        let stored = state
            .containers
            .entry((account.to_string(), container.to_string()))
            .or_default();
        merge_seed(stored, ResourceType::Container, pairs);
    }

    /// Full persisted sysmeta headers of an account.
    pub async fn account_sysmeta(&self, account: &str) -> Option<BTreeMap<String, String>> {
        self.inner.lock().await.accounts.get(account).cloned()
    }

    /// Full persisted sysmeta headers of a container.
    pub async fn container_sysmeta(
        &self,
        account: &str,
        container: &str,
    ) -> Option<BTreeMap<String, String>> {
        self.inner
            .lock()
            .await
            .containers
            .get(&(account.to_string(), container.to_string()))
            .cloned()
    }

    pub async fn object(
        &self,
        account: &str,
        container: &str,
        object: &str,
    ) -> Option<StoredObject> {
        self.inner
            .lock()
            .await
            .objects
            .get(&(account.to_string(), container.to_string(), object.to_string()))
            .cloned()
    }

    async fn handle_account(&self, request: &PipelineRequest, account: &str) -> PipelineResponse {
        let mut state = self.inner.lock().await;
        if request.is_method("DELETE") {
            state.accounts.remove(account);
            return PipelineResponse::new(204);
        }
        let stored = state.accounts.entry(account.to_string()).or_default();
        let status = if request.is_method("PUT") || request.is_method("POST") {
            persist_sysmeta(stored, ResourceType::Account, &request.headers);
            if request.is_method("PUT") {
                201
            } else {
                204
            }
        } else {
            204
        };
        sysmeta_response(status, stored)
    }

    async fn handle_container(
        &self,
        request: &PipelineRequest,
        account: &str,
        container: &str,
    ) -> PipelineResponse {
        let mut state = self.inner.lock().await;
        let key = (account.to_string(), container.to_string());
        if request.is_method("PUT") {
            state.accounts.entry(account.to_string()).or_default();
            let created = !state.containers.contains_key(&key);
            let stored = state.containers.entry(key).or_default();
            persist_sysmeta(stored, ResourceType::Container, &request.headers);
            return sysmeta_response(if created { 201 } else { 202 }, stored);
        }
        if request.is_method("DELETE") {
            let removed = state.containers.remove(&key).is_some();
            return PipelineResponse::new(if removed { 204 } else { 404 });
        }
        let Some(stored) = state.containers.get_mut(&key) else {
            return PipelineResponse::new(404);
        };
        if request.is_method("POST") {
            persist_sysmeta(stored, ResourceType::Container, &request.headers);
        }
        sysmeta_response(204, stored)
    }

    async fn handle_object(
        &self,
        request: PipelineRequest,
        account: &str,
        container: &str,
        object: &str,
    ) -> PipelineResponse {
        let mut state = self.inner.lock().await;
        if !state
            .containers
            .contains_key(&(account.to_string(), container.to_string()))
        {
            return PipelineResponse::new(404);
        }
        let key = (account.to_string(), container.to_string(), object.to_string());

        if request.is_method("PUT") {
            state.objects.insert(
                key,
                StoredObject {
                    headers: request.headers,
                    body: request.body,
                },
            );
            return PipelineResponse::new(201);
        }
        if request.is_method("DELETE") {
            let removed = state.objects.remove(&key).is_some();
            return PipelineResponse::new(if removed { 204 } else { 404 });
        }
        let Some(stored) = state.objects.get_mut(&key) else {
            return PipelineResponse::new(404);
        };
        if request.is_method("POST") {
            apply_object_update(&mut stored.headers, &request.headers);
            return PipelineResponse::new(202);
        }

        let mut response = PipelineResponse::ok();
        response.headers = stored.headers.clone();
        if request.is_method("GET") {
            response.body = stored.body.clone();
        }
        response
    }
}

fn merge_seed<I, K, V>(stored: &mut BTreeMap<String, String>, kind: ResourceType, pairs: I)
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    for (key, value) in pairs {
        stored.insert(
            format!("{}{}", kind.sysmeta_prefix(), key.as_ref().to_ascii_lowercase()),
            value.as_ref().to_string(),
        );
    }
}

fn persist_sysmeta(stored: &mut BTreeMap<String, String>, kind: ResourceType, headers: &Headers) {
    let prefix = kind.sysmeta_prefix();
    for (name, value) in headers.iter() {
        let name = name.to_ascii_lowercase();
        if name.starts_with(prefix) && name.len() > prefix.len() {
            debug!(resource = %kind, key = %name, "persisting sysmeta");
            stored.insert(name, value.to_string());
        }
    }
}

fn sysmeta_response(status: u16, stored: &BTreeMap<String, String>) -> PipelineResponse {
    let mut response = PipelineResponse::new(status);
    for (name, value) in stored {
        response.headers.insert(name.clone(), value.clone());
    }
    response
}

/// Object POST semantics: plain headers replace, `X-Remove-<Name>` deletes `X-<Name>`.
fn apply_object_update(stored: &mut Headers, update: &Headers) {
    for (name, value) in update.iter() {
        let lowered = name.to_ascii_lowercase();
        match lowered.strip_prefix(REMOVE_HEADER_PREFIX) {
            Some(target) if !target.is_empty() => {
                stored.remove(&format!("x-{target}"));
            }
            _ => stored.insert(name, value),
        }
    }
}

fn strip_sysmeta(stored: Option<&BTreeMap<String, String>>, kind: ResourceType) -> SysmetaMap {
    let prefix = kind.sysmeta_prefix();
    stored
        .into_iter()
        .flatten()
        .filter_map(|(key, value)| {
            key.strip_prefix(prefix)
                .map(|stripped| (stripped.to_string(), value.clone()))
        })
        .collect()
}

#[async_trait]
impl Pipeline for SysmetaStore {
    async fn handle(&self, request: PipelineRequest) -> Result<PipelineResponse, PipelineError> {
        let path = ResourcePath::parse(&request.path).map_err(|err| PipelineError::NotFound {
            detail: err.to_string(),
        })?;
        debug!(
            trans_id = %request.trans_id,
            method = %request.method,
            path = %request.path,
            "store handling request"
        );
        let response = match (&path.container, &path.object) {
            (Some(container), Some(object)) => {
                self.handle_object(request, &path.account, container, object)
                    .await
            }
            (Some(container), None) => {
                self.handle_container(&request, &path.account, container)
                    .await
            }
            _ => self.handle_account(&request, &path.account).await,
        };
        Ok(response)
    }
}

#[async_trait]
impl MetadataProvider for SysmetaStore {
    async fn fetch_account_metadata(&self, account: &str) -> Result<SysmetaMap, MetadataError> {
        let state = self.inner.lock().await;
        Ok(strip_sysmeta(
            state.accounts.get(account),
            ResourceType::Account,
        ))
    }

    async fn fetch_container_metadata(
        &self,
        account: &str,
        container: &str,
    ) -> Result<SysmetaMap, MetadataError> {
        let state = self.inner.lock().await;
        Ok(strip_sysmeta(
            state
                .containers
                .get(&(account.to_string(), container.to_string())),
            ResourceType::Container,
        ))
    }
}
