//! Mapping between client-facing default headers and persisted metadata keys.

use serde::{Deserialize, Serialize};

use crate::{strip_prefix_ignore_case, ResourceType};

/// Client header prefix declaring a default, e.g. `X-Default-Object-X-Delete-After`.
pub const DEFAULT_HEADER_PREFIX: &str = "x-default-";
/// Client header prefix clearing a default, e.g. `X-Remove-Default-Object-X-Delete-After`.
pub const REMOVE_DEFAULT_HEADER_PREFIX: &str = "x-remove-default-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclarationKind {
    Set,
    Clear,
}

impl DeclarationKind {
    const fn header_prefix(self) -> &'static str {
        match self {
            Self::Set => DEFAULT_HEADER_PREFIX,
            Self::Clear => REMOVE_DEFAULT_HEADER_PREFIX,
        }
    }
}

/// A default declared at `scope` for resources of type `subresource`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultDeclaration {
    pub scope: ResourceType,
    pub subresource: ResourceType,
    /// Header the default supplies, in the casing the client sent.
    pub attribute: String,
    /// Stored value; empty for a tombstone.
    pub value: String,
}

impl DefaultDeclaration {
    /// Persisted metadata key, e.g. `x-account-sysmeta-default-object-X-Delete-After`.
    #[must_use]
    pub fn sysmeta_key(&self) -> String {
        format!(
            "{}{}-{}",
            self.scope.sysmeta_default_prefix(),
            self.subresource.as_str(),
            self.attribute
        )
    }

    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.value.is_empty()
    }
}

/// Match a single request header against the declaration patterns legal at `scope`.
///
/// Clear patterns always produce a tombstone regardless of the header value.
#[must_use]
pub fn parse_declaration(
    scope: ResourceType,
    header: &str,
    value: &str,
) -> Option<(DeclarationKind, DefaultDeclaration)> {
    [DeclarationKind::Set, DeclarationKind::Clear]
        .into_iter()
        .find_map(|kind| match_kind(scope, kind, header, value).map(|decl| (kind, decl)))
}

fn match_kind(
    scope: ResourceType,
    kind: DeclarationKind,
    header: &str,
    value: &str,
) -> Option<DefaultDeclaration> {
    let rest = strip_prefix_ignore_case(header, kind.header_prefix())?;
    scope.default_subresources().iter().find_map(|subresource| {
        let attribute = strip_prefix_ignore_case(rest, subresource.as_str())?.strip_prefix('-')?;
        if attribute.is_empty() {
            return None;
        }
        Some(DefaultDeclaration {
            scope,
            subresource: *subresource,
            attribute: attribute.to_string(),
            value: match kind {
                DeclarationKind::Set => value.to_string(),
                DeclarationKind::Clear => String::new(),
            },
        })
    })
}

/// Collect every declaration carried by a header set, sets before clears.
///
/// Ordering the clear pass last means a request that both sets and clears
/// one attribute ends up writing the tombstone.
pub fn capture_declarations<'a, I>(scope: ResourceType, headers: I) -> Vec<DefaultDeclaration>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let headers: Vec<(&str, &str)> = headers.into_iter().collect();
    let mut declarations = Vec::new();
    for kind in [DeclarationKind::Set, DeclarationKind::Clear] {
        declarations.extend(
            headers
                .iter()
                .filter_map(|(header, value)| match_kind(scope, kind, header, value)),
        );
    }
    declarations
}

/// Client-visible name for a persisted default header on a `scope` response.
///
/// The remainder after the default prefix is kept verbatim, so an account
/// declaration `x-account-sysmeta-default-object-x-delete-after` is exposed as
/// `x-default-object-x-delete-after`.
#[must_use]
pub fn exposed_header_name(scope: ResourceType, header: &str) -> Option<String> {
    let remainder = strip_prefix_ignore_case(header, &scope.sysmeta_default_prefix())?;
    if remainder.is_empty() {
        return None;
    }
    Some(format!("{DEFAULT_HEADER_PREFIX}{remainder}"))
}
