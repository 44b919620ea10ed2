//! Request href construction.
//!
//! Arguments are appended in a fixed order (extra args, page, size, sort,
//! search params, embeds) and an argument already present in the href or
//! already added is skipped, so building from the output again is a no-op.

use url::form_urlencoded::byte_serialize;

use crate::domain::{FindListOptions, FollowLinkConfig};

/// Separator between nested link names in an `embed=` argument.
const EMBED_PATH_SEPARATOR: &str = "%2F";

struct HrefArgs<'a> {
    existing: Vec<&'a str>,
    added: Vec<String>,
}

impl<'a> HrefArgs<'a> {
    fn for_href(href: &'a str) -> Self {
        let existing = href
            .split_once('?')
            .map(|(_, query)| query.split('&').filter(|arg| !arg.is_empty()).collect())
            .unwrap_or_default();
        Self {
            existing,
            added: Vec::new(),
        }
    }

    fn push(&mut self, arg: String) {
        if self.existing.contains(&arg.as_str()) || self.added.contains(&arg) {
            return;
        }
        self.added.push(arg);
    }
}

fn encode(value: &str) -> String {
    byte_serialize(value.as_bytes()).collect()
}

/// Final href for a request: `href` plus paging, sorting, search and embed
/// arguments. `current_page` is one-based; the wire `page` is zero-based.
pub fn build_href(
    href: &str,
    options: &FindListOptions,
    extra_args: &[String],
    links: &[FollowLinkConfig],
) -> String {
    let mut args = HrefArgs::for_href(href);

    for arg in extra_args {
        args.push(arg.clone());
    }
    if let Some(page) = options.current_page {
        args.push(format!("page={}", page.saturating_sub(1)));
    }
    if let Some(size) = options.elements_per_page {
        args.push(format!("size={size}"));
    }
    if let Some(sort) = &options.sort {
        args.push(format!("sort={},{}", sort.field, sort.direction));
    }
    for param in &options.search_params {
        args.push(format!("{}={}", encode(&param.name), encode(&param.value)));
    }
    for link in links {
        add_embeds(&mut args, None, link);
    }

    if args.added.is_empty() {
        return href.to_string();
    }
    let separator = match href.split_once('?') {
        None => "?",
        Some((_, "")) => "",
        Some(_) if href.ends_with('&') => "",
        Some(_) => "&",
    };
    format!("{href}{separator}{}", args.added.join("&"))
}

fn add_embeds(args: &mut HrefArgs<'_>, parent: Option<&str>, link: &FollowLinkConfig) {
    if !link.should_embed {
        return;
    }
    let path = match parent {
        Some(parent) => format!("{parent}{EMBED_PATH_SEPARATOR}{}", link.name),
        None => link.name.clone(),
    };
    if let Some(size) = link.find_options.elements_per_page {
        args.push(format!("embed.size={path}={size}"));
    }

    let nested: Vec<&FollowLinkConfig> = link
        .nested_links
        .iter()
        .filter(|nested| nested.should_embed)
        .collect();
    if nested.is_empty() {
        args.push(format!("embed={path}"));
    } else {
        for nested in nested {
            add_embeds(args, Some(&path), nested);
        }
    }
}
