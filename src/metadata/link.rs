//! Index links
//!
//! An `IndexLink` names an index together with the field pair used to join
//! into it from another index. Textual form:
//!
//! ```text
//! user_id=<users>id
//! author:(user_id=<users>id)
//! ```
//!
//! Two links are equal iff their index name and field pair match; the alias
//! is a lookup convenience only.

use std::fmt;
use std::hash::{Hash, Hasher};

use super::errors::{MetadataError, MetadataResult};

/// A join target: `left_field` in the outer index matches `right_field` in `index_name`
#[derive(Debug, Clone, Eq)]
pub struct IndexLink {
    left_field: String,
    index_name: String,
    right_field: String,
    alias: Option<String>,
}

impl IndexLink {
    /// Creates a link
    pub fn new(
        left_field: impl Into<String>,
        index_name: impl Into<String>,
        right_field: impl Into<String>,
    ) -> Self {
        Self {
            left_field: left_field.into(),
            index_name: index_name.into(),
            right_field: right_field.into(),
            alias: None,
        }
    }

    /// Creates the self-link for a home index: `pk=<index>pk`
    pub fn home(index_name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        let pk = primary_key.into();
        Self::new(pk.clone(), index_name, pk)
    }

    /// Attaches an alias
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Parses `left=<index>right` or `alias:(left=<index>right)`
    pub fn parse(text: &str) -> MetadataResult<Self> {
        let text = text.trim();

        if let Some((alias, rest)) = text.split_once(':') {
            let alias = alias.trim();
            let inner = rest
                .trim()
                .strip_prefix('(')
                .and_then(|r| r.strip_suffix(')'))
                .ok_or_else(|| {
                    MetadataError::invalid_link(text, "aliased link must be wrapped in parentheses")
                })?;
            if alias.is_empty() {
                return Err(MetadataError::invalid_link(text, "empty alias"));
            }
            return Ok(Self::parse_bare(inner, text)?.with_alias(alias));
        }

        Self::parse_bare(text, text)
    }

    fn parse_bare(body: &str, original: &str) -> MetadataResult<Self> {
        let (left, rest) = body
            .split_once('=')
            .ok_or_else(|| MetadataError::invalid_link(original, "missing '='"))?;
        let rest = rest
            .trim()
            .strip_prefix('<')
            .ok_or_else(|| MetadataError::invalid_link(original, "missing '<' before index name"))?;
        let (index, right) = rest
            .split_once('>')
            .ok_or_else(|| MetadataError::invalid_link(original, "missing '>' after index name"))?;

        let (left, index, right) = (left.trim(), index.trim(), right.trim());
        if left.is_empty() || index.is_empty() || right.is_empty() {
            return Err(MetadataError::invalid_link(
                original,
                "left field, index name and right field are all required",
            ));
        }

        Ok(Self::new(left, index, right))
    }

    /// Field in the outer (nearer) index
    pub fn left_field(&self) -> &str {
        &self.left_field
    }

    /// Index joined into
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Field in the joined index
    pub fn right_field(&self) -> &str {
        &self.right_field
    }

    /// Optional alias
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Returns the same join walked in the opposite direction
    pub fn reversed(&self, outer_index: &str) -> Self {
        Self::new(self.right_field.clone(), outer_index, self.left_field.clone())
    }

    /// True if `name` is this link's alias or index name
    pub fn answers_to(&self, name: &str) -> bool {
        self.alias.as_deref() == Some(name) || self.index_name == name
    }
}

impl PartialEq for IndexLink {
    fn eq(&self, other: &Self) -> bool {
        self.index_name == other.index_name
            && self.left_field == other.left_field
            && self.right_field == other.right_field
    }
}

impl Hash for IndexLink {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index_name.hash(state);
        self.left_field.hash(state);
        self.right_field.hash(state);
    }
}

impl fmt::Display for IndexLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(alias) => write!(
                f,
                "{}:({}=<{}>{})",
                alias, self.left_field, self.index_name, self.right_field
            ),
            None => write!(
                f,
                "{}=<{}>{}",
                self.left_field, self.index_name, self.right_field
            ),
        }
    }
}
