//! Request classification and the header rewrites applied for each behaviour.

use defaults_resolution::EffectiveDefaults;
use runtime_pipeline::{PipelineRequest, PipelineResponse};
use storage_namespace::{
    capture_declarations, exposed_header_name, DefaultDeclaration, ResourcePath, ResourceType,
};

/// Behaviour selected for a request from its method and resource depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestPlan {
    /// No resource path (capability probes and the like): forward untouched.
    PassThrough,
    /// Forward, then expose persisted defaults on the response.
    Forward(ResourcePath),
    /// Record default declarations on the request, forward, expose.
    Capture(ResourcePath),
    /// Apply resolved defaults, record declarations, forward, expose.
    ApplyDefaults(ResourcePath),
}

impl RequestPlan {
    #[must_use]
    pub fn for_request(method: &str, raw_path: &str) -> Self {
        let Ok(path) = ResourcePath::parse(raw_path) else {
            return Self::PassThrough;
        };
        if method.eq_ignore_ascii_case("PUT") {
            Self::ApplyDefaults(path)
        } else if method.eq_ignore_ascii_case("POST")
            && path.resource_type() != ResourceType::Object
        {
            Self::Capture(path)
        } else {
            Self::Forward(path)
        }
    }

    #[must_use]
    pub const fn path(&self) -> Option<&ResourcePath> {
        match self {
            Self::PassThrough => None,
            Self::Forward(path) | Self::Capture(path) | Self::ApplyDefaults(path) => Some(path),
        }
    }
}

/// Set every applicable default the request does not already carry.
///
/// Returns the attributes that were actually added.
#[must_use]
pub fn apply_defaults(
    mut request: PipelineRequest,
    defaults: &EffectiveDefaults,
) -> (PipelineRequest, Vec<String>) {
    let mut applied = Vec::new();
    for (attribute, value) in defaults.applicable() {
        if request.headers.set_default(attribute, value) {
            applied.push(attribute.to_string());
        }
    }
    (request, applied)
}

/// Translate declaration headers into persisted metadata writes on the request.
///
/// Declarations are only legal for resources below `scope`, so object
/// requests never produce writes.
#[must_use]
pub fn record_declarations(
    mut request: PipelineRequest,
    scope: ResourceType,
) -> (PipelineRequest, Vec<DefaultDeclaration>) {
    let declarations = capture_declarations(scope, request.headers.iter());
    for declaration in &declarations {
        request
            .headers
            .insert(declaration.sysmeta_key(), declaration.value.clone());
    }
    (request, declarations)
}

/// Mirror persisted default declarations as `x-default-*` response headers.
#[must_use]
pub fn expose_defaults(mut response: PipelineResponse, scope: ResourceType) -> PipelineResponse {
    let exposed: Vec<(String, String)> = response
        .headers
        .iter()
        .filter_map(|(name, value)| {
            exposed_header_name(scope, name).map(|client| (client, value.to_string()))
        })
        .collect();
    for (name, value) in exposed {
        response.headers.insert(name, value);
    }
    response
}
