//! Pipeline stage that applies, records, and exposes default headers.
//!
//! Clients declare defaults with `X-Default-<Container|Object>-<Header>` on
//! account and container POSTs (or clear them with
//! `X-Remove-Default-<Container|Object>-<Header>`). Later PUTs of containers
//! and objects below that scope receive the declared headers unless they
//! already carry them. Container declarations beat account declarations,
//! which beat cluster configuration.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use defaults_resolution::{DefaulterConfig, DefaultsResolver, SharedMetadataProvider};
use runtime_pipeline::{
    CapabilityRegistry, Pipeline, PipelineError, PipelineRequest, PipelineResponse, SharedPipeline,
};
use tracing::{debug, warn};

pub mod dispatch;

pub use dispatch::{apply_defaults, expose_defaults, record_declarations, RequestPlan};

/// Name the middleware publishes its capabilities under.
pub const CAPABILITY_NAME: &str = "defaulter";

/// Builds [`DefaulterMiddleware`] instances sharing one immutable configuration.
#[derive(Debug, Clone)]
pub struct DefaulterFactory {
    config: Arc<DefaulterConfig>,
}

impl DefaulterFactory {
    /// Freeze `config` and publish it to the capability registry.
    pub fn new(config: DefaulterConfig, registry: &CapabilityRegistry) -> Self {
        registry.register(CAPABILITY_NAME, config.capability_info());
        Self {
            config: Arc::new(config),
        }
    }

    /// Build from global and local configuration layers, local entries winning.
    pub fn from_layers(
        global: &BTreeMap<String, String>,
        local: &BTreeMap<String, String>,
        registry: &CapabilityRegistry,
    ) -> Self {
        Self::new(DefaulterConfig::from_layers(global, local), registry)
    }

    #[must_use]
    pub fn config(&self) -> &DefaulterConfig {
        &self.config
    }

    /// Wrap the next stage of the pipeline.
    #[must_use]
    pub fn wrap(
        &self,
        next: SharedPipeline,
        metadata: SharedMetadataProvider,
    ) -> DefaulterMiddleware {
        DefaulterMiddleware {
            resolver: DefaultsResolver::new(Arc::clone(&self.config)),
            metadata,
            next,
        }
    }
}

/// The default-header stage itself.
pub struct DefaulterMiddleware {
    resolver: DefaultsResolver,
    metadata: SharedMetadataProvider,
    next: SharedPipeline,
}

#[async_trait]
impl Pipeline for DefaulterMiddleware {
    async fn handle(&self, request: PipelineRequest) -> Result<PipelineResponse, PipelineError> {
        let trans_id = request.trans_id;
        let (request, scope) = match RequestPlan::for_request(&request.method, &request.path) {
            RequestPlan::PassThrough => {
                debug!(%trans_id, path = %request.path, "no resource path; passing through");
                return self.next.handle(request).await;
            }
            RequestPlan::Forward(path) => (request, path.resource_type()),
            RequestPlan::Capture(path) => {
                let scope = path.resource_type();
                let (request, declarations) = record_declarations(request, scope);
                for declaration in &declarations {
                    debug!(
                        %trans_id,
                        resource = %scope,
                        subresource = %declaration.subresource,
                        attribute = %declaration.attribute,
                        tombstone = declaration.is_tombstone(),
                        "recorded default declaration"
                    );
                }
                (request, scope)
            }
            RequestPlan::ApplyDefaults(path) => {
                let scope = path.resource_type();
                let defaults = self
                    .resolver
                    .resolve_for_path(&path, self.metadata.as_ref())
                    .await
                    .map_err(|err| {
                        warn!(%trans_id, error = %err, "default resolution failed");
                        PipelineError::Unavailable {
                            detail: err.to_string(),
                        }
                    })?;
                let (request, applied) = apply_defaults(request, &defaults);
                if !applied.is_empty() {
                    debug!(%trans_id, resource = %scope, ?applied, "applied default headers");
                }
                let (request, declarations) = record_declarations(request, scope);
                if !declarations.is_empty() {
                    debug!(
                        %trans_id,
                        resource = %scope,
                        count = declarations.len(),
                        "recorded default declarations on create"
                    );
                }
                (request, scope)
            }
        };

        let response = self.next.handle(request).await?;
        Ok(expose_defaults(response, scope))
    }
}
