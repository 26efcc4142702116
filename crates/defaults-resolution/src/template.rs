//! Tolerant `{placeholder}` substitution for default values.

use std::borrow::Cow;

use storage_namespace::ResourcePath;

/// Path components available to a default value template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatArgs {
    pub account: Option<String>,
    pub container: Option<String>,
    pub object: Option<String>,
}

impl FormatArgs {
    #[must_use]
    pub fn from_path(path: &ResourcePath) -> Self {
        Self {
            account: Some(path.account.clone()),
            container: path.container.clone(),
            object: path.object.clone(),
        }
    }

    fn lookup(&self, name: &str) -> Option<&str> {
        match name {
            "account" => self.account.as_deref(),
            "container" => self.container.as_deref(),
            "object" => self.object.as_deref(),
            _ => None,
        }
    }
}

/// Substitute placeholders in `raw`, or hand `raw` back untouched.
///
/// `{{` and `}}` escape literal braces. A template naming a placeholder that is
/// not available, or one that does not parse, is returned unmodified.
#[must_use]
pub fn format_value<'a>(raw: &'a str, args: &FormatArgs) -> Cow<'a, str> {
    if !raw.contains(['{', '}']) {
        return Cow::Borrowed(raw);
    }
    match render(raw, args) {
        Some(rendered) => Cow::Owned(rendered),
        None => {
            tracing::debug!(value = raw, "default value left unformatted");
            Cow::Borrowed(raw)
        }
    }
}

fn render(raw: &str, args: &FormatArgs) -> Option<String> {
    let mut output = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                output.push('{');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next()? {
                        '}' => break,
                        '{' => return None,
                        other => name.push(other),
                    }
                }
                // Conversions, format specs, and attribute access are not supported.
                output.push_str(args.lookup(&name)?);
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                output.push('}');
            }
            '}' => return None,
            other => output.push(other),
        }
    }
    Some(output)
}
