//! Resource hierarchy, request path grammar, and the default-header transcoder.

use std::fmt;

use serde::{Deserialize, Serialize};

mod path;
mod transcode;

pub use path::{PathError, ResourcePath};
pub use transcode::{
    capture_declarations, exposed_header_name, parse_declaration, DeclarationKind,
    DefaultDeclaration, DEFAULT_HEADER_PREFIX, REMOVE_DEFAULT_HEADER_PREFIX,
};

/// Depth of a resource in the account / container / object hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Account,
    Container,
    Object,
}

impl ResourceType {
    /// Lowercase name used in header and metadata key construction.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::Container => "container",
            Self::Object => "object",
        }
    }

    /// Prefix under which this resource type persists system metadata.
    #[must_use]
    pub const fn sysmeta_prefix(self) -> &'static str {
        match self {
            Self::Account => "x-account-sysmeta-",
            Self::Container => "x-container-sysmeta-",
            Self::Object => "x-object-sysmeta-",
        }
    }

    /// Prefix of persisted default declarations owned by this resource type.
    #[must_use]
    pub fn sysmeta_default_prefix(self) -> String {
        format!("{}default-", self.sysmeta_prefix())
    }

    /// Resource types a declaration made at this depth may target.
    ///
    /// Declarations only flow downward: an account may declare defaults for
    /// its containers and objects, a container only for its objects.
    #[must_use]
    pub const fn default_subresources(self) -> &'static [ResourceType] {
        match self {
            Self::Account => &[Self::Container, Self::Object],
            Self::Container => &[Self::Object],
            Self::Object => &[],
        }
    }

    /// Case-insensitive parse of a resource type name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        [Self::Account, Self::Container, Self::Object]
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive prefix strip that keeps the remainder's original casing.
pub(crate) fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        value.get(prefix.len()..)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subresources_only_flow_downward() {
        assert_eq!(
            ResourceType::Account.default_subresources(),
            &[ResourceType::Container, ResourceType::Object]
        );
        assert_eq!(
            ResourceType::Container.default_subresources(),
            &[ResourceType::Object]
        );
        assert!(ResourceType::Object.default_subresources().is_empty());
    }

    #[test]
    fn sysmeta_prefixes_follow_resource_name() {
        assert_eq!(
            ResourceType::Container.sysmeta_default_prefix(),
            "x-container-sysmeta-default-"
        );
        assert_eq!(ResourceType::parse("OBJECT"), Some(ResourceType::Object));
        assert_eq!(ResourceType::parse("bucket"), None);
    }

    #[test]
    fn prefix_strip_is_case_insensitive_and_char_safe() {
        assert_eq!(
            strip_prefix_ignore_case("X-Default-Object-X-Delete-After", "x-default-object-"),
            Some("X-Delete-After")
        );
        assert_eq!(strip_prefix_ignore_case("x-def", "x-default-"), None);
        assert_eq!(strip_prefix_ignore_case("ééééé-x", "x-default-"), None);
    }
}
