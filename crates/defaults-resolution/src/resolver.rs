//! Precedence-ordered merge of cluster, account, and container defaults.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use storage_namespace::{ResourcePath, ResourceType};

use crate::config::DefaulterConfig;
use crate::provider::{MetadataError, MetadataProvider, SysmetaMap};
use crate::template::{format_value, FormatArgs};

/// Scope a resolved default was taken from, lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultSource {
    Cluster,
    Account,
    Container,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDefault {
    pub value: String,
    pub source: DefaultSource,
}

impl ResolvedDefault {
    /// An empty value stops inheritance without supplying a header.
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.value.is_empty()
    }
}

/// Effective defaults for one target resource type, keyed by lowercase attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveDefaults {
    pub target: ResourceType,
    entries: BTreeMap<String, ResolvedDefault>,
}

impl EffectiveDefaults {
    #[must_use]
    pub fn empty(target: ResourceType) -> Self {
        Self {
            target,
            entries: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&ResolvedDefault> {
        self.entries.get(&attribute.to_ascii_lowercase())
    }

    /// Value to apply for `attribute`; `None` when absent or tombstoned.
    #[must_use]
    pub fn value(&self, attribute: &str) -> Option<&str> {
        self.get(attribute)
            .filter(|resolved| !resolved.is_tombstone())
            .map(|resolved| resolved.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResolvedDefault)> {
        self.entries
            .iter()
            .map(|(attribute, resolved)| (attribute.as_str(), resolved))
    }

    /// Attribute/value pairs that should be set on a request, tombstones skipped.
    pub fn applicable(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter()
            .filter(|(_, resolved)| !resolved.is_tombstone())
            .map(|(attribute, resolved)| (attribute, resolved.value.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn absorb<'a, I>(
        &mut self,
        source: DefaultSource,
        entries: I,
        use_formatting: bool,
        args: &FormatArgs,
    ) where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let prefix = format!("default-{}-", self.target.as_str());
        for (key, value) in entries {
            let Some(attribute) = key
                .get(..prefix.len())
                .filter(|head| head.eq_ignore_ascii_case(&prefix))
                .and_then(|_| key.get(prefix.len()..))
                .filter(|attribute| !attribute.is_empty())
            else {
                continue;
            };
            let value = if use_formatting {
                format_value(value, args).into_owned()
            } else {
                value.clone()
            };
            self.entries.insert(
                attribute.to_ascii_lowercase(),
                ResolvedDefault { value, source },
            );
        }
    }
}

/// Computes [`EffectiveDefaults`] from the static configuration and persisted metadata.
#[derive(Debug, Clone)]
pub struct DefaultsResolver {
    config: Arc<DefaulterConfig>,
}

impl DefaultsResolver {
    #[must_use]
    pub const fn new(config: Arc<DefaulterConfig>) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &DefaulterConfig {
        &self.config
    }

    /// Merge cluster, account, then container defaults for `target`.
    ///
    /// Container metadata only participates for object targets.
    #[must_use]
    pub fn resolve(
        &self,
        target: ResourceType,
        args: &FormatArgs,
        account: &SysmetaMap,
        container: &SysmetaMap,
    ) -> EffectiveDefaults {
        let use_formatting = self.config.use_formatting;
        let mut defaults = EffectiveDefaults::empty(target);
        defaults.absorb(
            DefaultSource::Cluster,
            &self.config.cluster_defaults,
            use_formatting,
            args,
        );
        defaults.absorb(DefaultSource::Account, account, use_formatting, args);
        if target == ResourceType::Object {
            defaults.absorb(DefaultSource::Container, container, use_formatting, args);
        }
        defaults
    }

    /// Fetch whatever metadata `path` needs and resolve defaults for its depth.
    ///
    /// Account targets are being created and carry no persisted declarations,
    /// so only cluster configuration applies to them.
    pub async fn resolve_for_path(
        &self,
        path: &ResourcePath,
        provider: &dyn MetadataProvider,
    ) -> Result<EffectiveDefaults, MetadataError> {
        let target = path.resource_type();
        let args = FormatArgs::from_path(path);

        let account = match target {
            ResourceType::Account => SysmetaMap::new(),
            ResourceType::Container | ResourceType::Object => {
                provider.fetch_account_metadata(&path.account).await?
            }
        };
        let container = match (&path.container, target) {
            (Some(container), ResourceType::Object) => {
                provider
                    .fetch_container_metadata(&path.account, container)
                    .await?
            }
            _ => SysmetaMap::new(),
        };

        Ok(self.resolve(target, &args, &account, &container))
    }
}
