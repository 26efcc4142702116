//! Default header resolution across cluster, account, and container scopes.

pub mod config;
pub mod provider;
pub mod resolver;
pub mod template;

pub use config::{config_true_value, ConfigError, DefaulterConfig};
pub use provider::{MetadataError, MetadataProvider, SharedMetadataProvider, SysmetaMap};
pub use resolver::{DefaultSource, DefaultsResolver, EffectiveDefaults, ResolvedDefault};
pub use template::{format_value, FormatArgs};
