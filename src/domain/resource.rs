//! Typed hypermedia resource.

use std::collections::BTreeMap;
use std::fmt;

use hypercache_hal::{self as hal, LinkValue, Links};
use serde_json::Value;

use crate::links::ResolvedLink;

use super::types::ResourceType;

/// A server-side entity: its raw JSON body plus any links resolved on this
/// copy. Resolved links are never written to the cache.
#[derive(Clone)]
pub struct Resource {
    resource_type: ResourceType,
    body: Value,
    resolved: BTreeMap<String, ResolvedLink>,
}

impl Resource {
    /// Wrap a JSON object that carries a `type` tag. Returns `None` for
    /// anything else.
    pub fn from_json(body: Value) -> Option<Self> {
        let tag = hal::type_tag(&body)?.to_string();
        Some(Self {
            resource_type: ResourceType::new(tag),
            body,
            resolved: BTreeMap::new(),
        })
    }

    /// Wrap a body that could not be cached (no self link). The type is
    /// empty when the body carries no tag.
    pub fn detached(body: Value) -> Self {
        let tag = hal::type_tag(&body).unwrap_or_default().to_string();
        Self {
            resource_type: ResourceType::new(tag),
            body,
            resolved: BTreeMap::new(),
        }
    }

    pub(crate) fn with_body(&self, body: Value) -> Self {
        Self {
            resource_type: self.resource_type.clone(),
            body,
            resolved: BTreeMap::new(),
        }
    }

    pub fn resource_type(&self) -> &ResourceType {
        &self.resource_type
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn into_body(self) -> Value {
        self.body
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.body.get(field)
    }

    pub fn self_link(&self) -> Option<&str> {
        hal::self_href(&self.body)
    }

    pub fn link_href(&self, name: &str) -> Option<&str> {
        hal::link_href(&self.body, name)
    }

    pub fn link(&self, name: &str) -> Option<LinkValue> {
        self.links().remove(name)
    }

    pub fn links(&self) -> Links {
        hal::links_of(&self.body)
    }

    pub fn resolved(&self, name: &str) -> Option<&ResolvedLink> {
        self.resolved.get(name)
    }

    pub fn resolved_names(&self) -> impl Iterator<Item = &str> {
        self.resolved.keys().map(String::as_str)
    }

    pub fn has_resolved_links(&self) -> bool {
        !self.resolved.is_empty()
    }

    pub(crate) fn attach(&mut self, name: &str, link: ResolvedLink) {
        self.resolved.insert(name.to_string(), link);
    }

    pub(crate) fn detach(&mut self, name: &str) {
        self.resolved.remove(name);
    }

    /// Copy of this resource with every resolved link cleared.
    pub fn without_resolved_links(&self) -> Self {
        self.with_body(self.body.clone())
    }
}

/// Equality compares type and body; resolved links are views, not data.
impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        self.resource_type == other.resource_type && self.body == other.body
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("resource_type", &self.resource_type)
            .field("self_link", &self.self_link())
            .field("resolved", &self.resolved.keys().collect::<Vec<_>>())
            .finish()
    }
}
