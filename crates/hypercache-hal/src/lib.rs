//! HAL wire types.
//!
//! Every resource served by a HAL API carries a `_links` object whose values
//! are either a single link or an array of links, an optional `_embedded`
//! object holding inlined resources, and (for collections) a `page` block.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const LINKS_KEY: &str = "_links";
pub const EMBEDDED_KEY: &str = "_embedded";
pub const PAGE_KEY: &str = "page";
pub const TYPE_KEY: &str = "type";
pub const SELF_LINK: &str = "self";
/// Name of the link array listing the members of a cached page.
pub const PAGE_LINK: &str = "page";

/// A single hypermedia link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HalLink {
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub templated: bool,
}

impl HalLink {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            name: None,
            templated: false,
        }
    }
}

/// Value of one entry in a `_links` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LinkValue {
    Single(HalLink),
    Many(Vec<HalLink>),
}

impl LinkValue {
    /// First href of the link, if any.
    pub fn href(&self) -> Option<&str> {
        match self {
            Self::Single(link) => Some(link.href.as_str()),
            Self::Many(links) => links.first().map(|link| link.href.as_str()),
        }
    }

    pub fn hrefs(&self) -> Vec<&str> {
        match self {
            Self::Single(link) => vec![link.href.as_str()],
            Self::Many(links) => links.iter().map(|link| link.href.as_str()).collect(),
        }
    }
}

pub type Links = BTreeMap<String, LinkValue>;

/// Pagination block of a collection response.
///
/// `number` is zero-based on the wire; [`PageInfo::current_page`] is one-based.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    #[serde(rename = "size", default)]
    pub elements_per_page: u32,
    #[serde(default)]
    pub total_elements: u64,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub number: u32,
}

impl PageInfo {
    pub fn current_page(&self) -> u32 {
        self.number + 1
    }
}

/// Parse the `_links` object of a resource. Entries that are not valid links
/// are skipped.
pub fn links_of(value: &Value) -> Links {
    value
        .get(LINKS_KEY)
        .and_then(Value::as_object)
        .map(|links| {
            links
                .iter()
                .filter_map(|(name, raw)| {
                    serde_json::from_value::<LinkValue>(raw.clone())
                        .ok()
                        .map(|link| (name.clone(), link))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Href of the named link.
pub fn link_href<'a>(value: &'a Value, name: &str) -> Option<&'a str> {
    let raw = value.get(LINKS_KEY)?.get(name)?;
    match raw {
        Value::Object(link) => link.get("href").and_then(Value::as_str),
        Value::Array(links) => links
            .first()
            .and_then(|link| link.get("href"))
            .and_then(Value::as_str),
        _ => None,
    }
}

pub fn self_href(value: &Value) -> Option<&str> {
    link_href(value, SELF_LINK)
}

pub fn type_tag(value: &Value) -> Option<&str> {
    value.get(TYPE_KEY).and_then(Value::as_str)
}

pub fn page_info(value: &Value) -> Option<PageInfo> {
    value
        .get(PAGE_KEY)
        .and_then(|page| serde_json::from_value(page.clone()).ok())
}

/// Insert or replace a link on a resource body, creating `_links` if needed.
pub fn set_link(value: &mut Value, name: &str, link: LinkValue) {
    let Some(object) = value.as_object_mut() else {
        return;
    };
    let links = object
        .entry(LINKS_KEY)
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(links) = links
        && let Ok(link) = serde_json::to_value(link)
    {
        links.insert(name.to_string(), link);
    }
}
