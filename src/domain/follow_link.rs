//! Declarative request to resolve a named link.

use super::find_options::FindListOptions;

/// Describes one link to resolve on a resource, and recursively the links
/// to resolve on whatever that link points to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowLinkConfig {
    pub name: String,
    pub is_list: bool,
    pub nested_links: Vec<FollowLinkConfig>,
    pub find_options: FindListOptions,
    pub use_cached_version_if_available: bool,
    pub re_request_on_stale: bool,
    pub is_optional: bool,
    pub should_embed: bool,
}

/// Follow the single-valued link `name`.
pub fn follow_link(name: impl Into<String>) -> FollowLinkConfig {
    FollowLinkConfig {
        name: name.into(),
        is_list: false,
        nested_links: Vec::new(),
        find_options: FindListOptions::default(),
        use_cached_version_if_available: true,
        re_request_on_stale: true,
        is_optional: false,
        should_embed: true,
    }
}

/// Follow the list-valued link `name`.
pub fn follow_list(name: impl Into<String>) -> FollowLinkConfig {
    FollowLinkConfig {
        is_list: true,
        ..follow_link(name)
    }
}

impl FollowLinkConfig {
    pub fn with_nested(mut self, nested: FollowLinkConfig) -> Self {
        self.nested_links.push(nested);
        self
    }

    pub fn with_options(mut self, options: FindListOptions) -> Self {
        self.find_options = options;
        self
    }

    pub fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }

    pub fn bypass_cache(mut self) -> Self {
        self.use_cached_version_if_available = false;
        self
    }

    pub fn keep_stale(mut self) -> Self {
        self.re_request_on_stale = false;
        self
    }

    pub fn without_embed(mut self) -> Self {
        self.should_embed = false;
        self
    }
}
