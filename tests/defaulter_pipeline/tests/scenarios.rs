use std::sync::Arc;

use async_trait::async_trait;
use defaults_resolution::{DefaulterConfig, MetadataError, MetadataProvider, SysmetaMap};
use runtime_defaulter::{DefaulterFactory, DefaulterMiddleware, CAPABILITY_NAME};
use runtime_pipeline::{
    CapabilityRegistry, Pipeline, PipelineRequest, PipelineResponse, RecordingPipeline,
    SharedPipeline,
};
use serde_json::json;
use storage_sysmeta::SysmetaStore;

/// Provider whose backend is always unreachable.
struct FailingMetadata;

#[async_trait]
impl MetadataProvider for FailingMetadata {
    async fn fetch_account_metadata(&self, account: &str) -> Result<SysmetaMap, MetadataError> {
        Err(MetadataError::Account {
            account: account.into(),
            detail: "account ring unavailable".into(),
        })
    }

    async fn fetch_container_metadata(
        &self,
        account: &str,
        container: &str,
    ) -> Result<SysmetaMap, MetadataError> {
        Err(MetadataError::Container {
            account: account.into(),
            container: container.into(),
            detail: "container ring unavailable".into(),
        })
    }
}

fn stack(pairs: &[(&str, &str)]) -> (DefaulterMiddleware, SysmetaStore) {
    let registry = CapabilityRegistry::default();
    let factory = DefaulterFactory::new(
        DefaulterConfig::from_pairs(pairs.iter().copied()),
        &registry,
    );
    let store = SysmetaStore::new();
    let middleware = factory.wrap(Arc::new(store.clone()), Arc::new(store.clone()));
    (middleware, store)
}

async fn send(
    middleware: &DefaulterMiddleware,
    method: &str,
    path: &str,
    headers: &[(&str, &str)],
) -> anyhow::Result<PipelineResponse> {
    let mut request = PipelineRequest::new(method, path);
    for (name, value) in headers {
        request.headers.insert(*name, *value);
    }
    Ok(middleware.handle(request).await?)
}

async fn object_header(
    store: &SysmetaStore,
    path: (&str, &str, &str),
    header: &str,
) -> Option<String> {
    store
        .object(path.0, path.1, path.2)
        .await
        .and_then(|object| object.headers.get(header).map(str::to_string))
}

#[tokio::test]
async fn delete_after_defaults_follow_scope_precedence() -> anyhow::Result<()> {
    let (middleware, store) = stack(&[]);

    send(
        &middleware,
        "POST",
        "/v1/acct",
        &[("X-Default-Object-X-Delete-After", "2592000")],
    )
    .await?;
    for container in ["foo", "bar", "baz"] {
        let created = send(&middleware, "PUT", &format!("/v1/acct/{container}"), &[]).await?;
        assert_eq!(created.status, 201);
    }
    send(
        &middleware,
        "POST",
        "/v1/acct/foo",
        &[("X-Default-Object-X-Delete-After", "86400")],
    )
    .await?;

    send(&middleware, "PUT", "/v1/acct/foo/o1", &[]).await?;
    send(
        &middleware,
        "PUT",
        "/v1/acct/foo/o2",
        &[("X-Delete-After", "3600")],
    )
    .await?;
    send(&middleware, "PUT", "/v1/acct/bar/o", &[]).await?;
    send(&middleware, "PUT", "/v1/acct/baz/o", &[]).await?;

    assert_eq!(
        object_header(&store, ("acct", "foo", "o1"), "x-delete-after").await,
        Some("86400".into())
    );
    assert_eq!(
        object_header(&store, ("acct", "foo", "o2"), "x-delete-after").await,
        Some("3600".into())
    );
    assert_eq!(
        object_header(&store, ("acct", "bar", "o"), "x-delete-after").await,
        Some("2592000".into())
    );

    send(&middleware, "PUT", "/v1/other_acct/quux", &[]).await?;
    send(&middleware, "PUT", "/v1/other_acct/quux/o", &[]).await?;
    assert_eq!(
        object_header(&store, ("other_acct", "quux", "o"), "x-delete-after").await,
        None
    );
    Ok(())
}

#[tokio::test]
async fn unrelated_remove_headers_are_left_to_the_store() -> anyhow::Result<()> {
    let (middleware, store) = stack(&[]);
    send(
        &middleware,
        "POST",
        "/v1/acct",
        &[("X-Default-Object-X-Delete-After", "2592000")],
    )
    .await?;
    send(&middleware, "PUT", "/v1/acct/baz", &[]).await?;
    send(
        &middleware,
        "PUT",
        "/v1/acct/baz/o",
        &[("X-Delete-At", "1893456000")],
    )
    .await?;

    let updated = send(
        &middleware,
        "POST",
        "/v1/acct/baz/o",
        &[("X-Remove-Delete-At", "1")],
    )
    .await?;
    assert_eq!(updated.status, 202);

    let object = store.object("acct", "baz", "o").await.expect("object stored");
    assert!(!object.headers.contains("x-delete-at"));
    assert_eq!(object.headers.get("x-delete-after"), Some("2592000"));
    assert!(object
        .headers
        .iter()
        .all(|(name, _)| !name.to_ascii_lowercase().contains("sysmeta")));
    assert_eq!(
        store.account_sysmeta("acct").await.map(|meta| meta.len()),
        Some(1)
    );
    Ok(())
}

#[tokio::test]
async fn container_tombstone_stops_account_default() -> anyhow::Result<()> {
    let (middleware, store) = stack(&[(
        "default-object-content-type",
        "application/octet-stream",
    )]);
    send(
        &middleware,
        "POST",
        "/v1/acct",
        &[
            ("X-Default-Object-X-Delete-After", "2592000"),
            ("X-Remove-Default-Object-Content-Type", "1"),
        ],
    )
    .await?;
    send(
        &middleware,
        "PUT",
        "/v1/acct/keep",
        &[("X-Remove-Default-Object-X-Delete-After", "yes")],
    )
    .await?;
    send(&middleware, "PUT", "/v1/acct/keep/report.pdf", &[]).await?;

    let object = store
        .object("acct", "keep", "report.pdf")
        .await
        .expect("object stored");
    assert!(!object.headers.contains("x-delete-after"));
    assert!(!object.headers.contains("content-type"));

    let container = store
        .container_sysmeta("acct", "keep")
        .await
        .expect("container stored");
    assert_eq!(
        container
            .get("x-container-sysmeta-default-object-x-delete-after")
            .map(String::as_str),
        Some("")
    );
    Ok(())
}

#[tokio::test]
async fn declarations_are_exposed_on_later_responses() -> anyhow::Result<()> {
    let (middleware, _store) = stack(&[]);
    let posted = send(
        &middleware,
        "POST",
        "/v1/acct",
        &[("X-Default-Container-Foo", "bar")],
    )
    .await?;
    assert_eq!(posted.headers.get("X-Default-Container-Foo"), Some("bar"));

    let head = send(&middleware, "HEAD", "/v1/acct", &[]).await?;
    assert_eq!(head.headers.get("x-default-container-foo"), Some("bar"));
    assert_eq!(
        head.headers.get("x-account-sysmeta-default-container-foo"),
        Some("bar")
    );

    send(
        &middleware,
        "PUT",
        "/v1/acct/c",
        &[("X-Default-Object-X-Delete-After", "600")],
    )
    .await?;
    let container = send(&middleware, "GET", "/v1/acct/c", &[]).await?;
    assert_eq!(
        container.headers.get("x-default-object-x-delete-after"),
        Some("600")
    );
    assert!(!container.headers.contains("x-default-container-foo"));
    Ok(())
}

#[tokio::test]
async fn formatting_substitutes_path_components() -> anyhow::Result<()> {
    let (middleware, store) = stack(&[("use_formatting", "true")]);
    send(
        &middleware,
        "POST",
        "/v1/acct",
        &[(
            "X-Default-Object-X-Object-Meta-Origin",
            "{account}/{container}/{object}",
        )],
    )
    .await?;
    send(&middleware, "PUT", "/v1/acct/mycontainer", &[]).await?;
    send(&middleware, "PUT", "/v1/acct/mycontainer/a/b.txt", &[]).await?;

    assert_eq!(
        object_header(
            &store,
            ("acct", "mycontainer", "a/b.txt"),
            "x-object-meta-origin"
        )
        .await,
        Some("acct/mycontainer/a/b.txt".into())
    );
    Ok(())
}

#[tokio::test]
async fn unresolvable_placeholders_pass_through_literally() -> anyhow::Result<()> {
    let registry = CapabilityRegistry::default();
    let factory = DefaulterFactory::new(
        DefaulterConfig::from_pairs([
            ("use_formatting", "true"),
            ("default-account-x-account-meta-archive", ".{container}_versions"),
        ]),
        &registry,
    );
    let store = SysmetaStore::new();
    store
        .seed_account(
            "acct",
            [("default-container-x-versions-location", ".{container}_versions")],
        )
        .await;
    let downstream = Arc::new(RecordingPipeline::default());
    let middleware = factory.wrap(downstream.clone() as SharedPipeline, Arc::new(store));

    middleware
        .handle(PipelineRequest::new("PUT", "/v1/acct/mycontainer"))
        .await?;
    middleware
        .handle(PipelineRequest::new("PUT", "/v1/newacct"))
        .await?;

    let calls = downstream.calls().await;
    assert_eq!(
        calls[0].headers.get("x-versions-location"),
        Some(".mycontainer_versions")
    );
    assert_eq!(
        calls[1].headers.get("x-account-meta-archive"),
        Some(".{container}_versions")
    );
    Ok(())
}

#[tokio::test]
async fn unreachable_metadata_fails_creates_only() -> anyhow::Result<()> {
    let registry = CapabilityRegistry::default();
    let factory = DefaulterFactory::new(DefaulterConfig::default(), &registry);
    let downstream = Arc::new(RecordingPipeline::default());
    let middleware = factory.wrap(
        downstream.clone() as SharedPipeline,
        Arc::new(FailingMetadata),
    );

    let err = middleware
        .handle(PipelineRequest::new("PUT", "/v1/acct/c/o"))
        .await
        .expect_err("object create needs metadata");
    assert_eq!(err.status_code(), 503);

    let read = middleware
        .handle(PipelineRequest::new("GET", "/v1/acct/c/o"))
        .await?;
    assert_eq!(read.status, 204);
    let posted = middleware
        .handle(
            PipelineRequest::new("POST", "/v1/acct/c").with_header("X-Default-Object-A", "b"),
        )
        .await?;
    assert_eq!(posted.status, 204);
    assert_eq!(downstream.calls().await.len(), 2);
    Ok(())
}

#[tokio::test]
async fn capability_probe_is_forwarded_and_registered() -> anyhow::Result<()> {
    let registry = CapabilityRegistry::default();
    let factory = DefaulterFactory::new(
        DefaulterConfig::from_toml_str(
            "use_formatting = \"t\"\n\"default-object-x-delete-after\" = 86400\n",
        )?,
        &registry,
    );
    let downstream = Arc::new(RecordingPipeline::default());
    downstream
        .script_response(Ok(PipelineResponse::ok().with_body(
            serde_json::to_vec(&registry.snapshot())?,
        )))
        .await;
    let middleware = factory.wrap(
        downstream.clone() as SharedPipeline,
        Arc::new(SysmetaStore::new()),
    );

    let probe = PipelineRequest::new("GET", "/info");
    let response = middleware.handle(probe.clone()).await?;
    let body: serde_json::Value = serde_json::from_slice(&response.body)?;
    assert_eq!(
        body[CAPABILITY_NAME],
        json!({ "use_formatting": true, "default-object-x-delete-after": "86400" })
    );
    assert_eq!(downstream.calls().await, vec![probe]);
    Ok(())
}
