//! Link Resolution Engine.
//!
//! Turns a resource's named HAL links into live results by looking up the
//! link's declaration in the [`TypeRegistry`](crate::registry::TypeRegistry)
//! and dispatching to the target type's strategy. Resolved links live on the
//! returned copy only; the cached resource is never touched.

use thiserror::Error;
use tracing::debug;

use crate::data::{BaseDataService, RemoteDataHandle};
use crate::domain::{FollowLinkConfig, PaginatedList, Resource, ResourceType};

/// A resolved link.
#[derive(Debug, Clone)]
pub enum ResolvedLink {
    Single(RemoteDataHandle<Resource>),
    List(RemoteDataHandle<PaginatedList<Resource>>),
    /// Nothing to fetch: an undeclared optional link, or a link missing from
    /// the resource. Reads as an empty successful result.
    Absent,
}

impl ResolvedLink {
    pub fn single(&self) -> Option<&RemoteDataHandle<Resource>> {
        match self {
            Self::Single(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn list(&self) -> Option<&RemoteDataHandle<PaginatedList<Resource>>> {
        match self {
            Self::List(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

/// Configuration errors. These indicate a caller or registry bug and are
/// never turned into a failed result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("`{resource_type}` declares no link named `{link}`")]
    MissingLinkDeclaration {
        resource_type: ResourceType,
        link: String,
    },
    #[error("no data-access strategy is registered for `{resource_type}`")]
    MissingDataAccessStrategy { resource_type: ResourceType },
    #[error("link `{link}` on `{resource_type}` is declared {}", cardinality(.declared_list))]
    CardinalityMismatch {
        resource_type: ResourceType,
        link: String,
        declared_list: bool,
    },
}

fn cardinality(declared_list: &bool) -> &'static str {
    if *declared_list {
        "as a list but was followed as a single resource"
    } else {
        "as a single resource but was followed as a list"
    }
}

#[derive(Clone)]
pub struct LinkService {
    service: BaseDataService,
}

impl LinkService {
    pub fn new(service: BaseDataService) -> Self {
        Self { service }
    }

    /// Copy of `resource` with `config` resolved. Already resolved links are
    /// kept as they are.
    pub fn resolve_link(
        &self,
        resource: &Resource,
        config: &FollowLinkConfig,
    ) -> Result<Resource, LinkError> {
        if resource.resolved(&config.name).is_some() {
            return Ok(resource.clone());
        }
        let link = self.resolve_link_without_attaching(resource, config)?;
        let mut resolved = resource.clone();
        resolved.attach(&config.name, link);
        Ok(resolved)
    }

    pub fn resolve_links(
        &self,
        resource: &Resource,
        configs: &[FollowLinkConfig],
    ) -> Result<Resource, LinkError> {
        configs
            .iter()
            .try_fold(resource.clone(), |resolved, config| self.resolve_link(&resolved, config))
    }

    /// Dispatch the fetch for `config` without touching `resource`.
    pub fn resolve_link_without_attaching(
        &self,
        resource: &Resource,
        config: &FollowLinkConfig,
    ) -> Result<ResolvedLink, LinkError> {
        let registry = self.service.registry();
        let resource_type = resource.resource_type();

        let Some(definition) = registry.declared_link(resource_type, &config.name) else {
            if config.is_optional {
                debug!(
                    resource_type = %resource_type,
                    link = %config.name,
                    "optional link not declared"
                );
                return Ok(ResolvedLink::Absent);
            }
            return Err(LinkError::MissingLinkDeclaration {
                resource_type: resource_type.clone(),
                link: config.name.clone(),
            });
        };

        if definition.is_list != config.is_list {
            return Err(LinkError::CardinalityMismatch {
                resource_type: resource_type.clone(),
                link: config.name.clone(),
                declared_list: definition.is_list,
            });
        }

        let strategy = registry.lookup(&definition.target_type).ok_or_else(|| {
            LinkError::MissingDataAccessStrategy {
                resource_type: definition.target_type.clone(),
            }
        })?;

        let Some(href) = resource.link_href(&config.name) else {
            debug!(
                resource_type = %resource_type,
                link = %config.name,
                "link has no href"
            );
            return Ok(ResolvedLink::Absent);
        };

        Ok(if definition.is_list {
            ResolvedLink::List(strategy.find_list_by_href(
                &self.service,
                href,
                &config.find_options,
                config.use_cached_version_if_available,
                config.re_request_on_stale,
                &config.nested_links,
            ))
        } else {
            ResolvedLink::Single(strategy.find_by_href(
                &self.service,
                href,
                config.use_cached_version_if_available,
                config.re_request_on_stale,
                &config.nested_links,
            ))
        })
    }

    /// Copy of `resource` with every link its type declares cleared.
    pub fn remove_resolved_links(&self, resource: &Resource) -> Resource {
        let mut cleared = resource.clone();
        for name in self.service.registry().declared_links(resource.resource_type()) {
            cleared.detach(name);
        }
        cleared
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::data::GenericStrategy;
    use crate::domain::{follow_link, follow_list};
    use crate::infra::{RawRequest, RawResponse, Transport, TransportError};
    use crate::registry::{LinkDefinition, TypeRegistry};

    use super::*;

    struct NotFound;

    #[async_trait]
    impl Transport for NotFound {
        async fn send(&self, _request: RawRequest) -> Result<RawResponse, TransportError> {
            Ok(RawResponse::new(404, "").with_status_text("Not Found"))
        }
    }

    fn links() -> LinkService {
        let registry = TypeRegistry::builder()
            .register("item", Arc::new(GenericStrategy::new()))
            .and_then(|builder| builder.register("collection", Arc::new(GenericStrategy::new())))
            .and_then(|builder| {
                builder.declare_link("item", "owningCollection", LinkDefinition::single("collection"))
            })
            .and_then(|builder| builder.declare_link("item", "bundles", LinkDefinition::list("bundle")))
            .map(|builder| builder.build_unchecked())
            .expect("registry");
        BaseDataService::new(registry, Arc::new(NotFound), Default::default()).links()
    }

    fn item(links: serde_json::Value) -> Resource {
        Resource::from_json(json!({ "type": "item", "_links": links })).expect("typed resource")
    }

    #[tokio::test]
    async fn undeclared_link_is_an_error_unless_optional() {
        let links = links();
        let resource = item(json!({ "self": { "href": "/items/1" } }));

        let err = links
            .resolve_link(&resource, &follow_link("thumbnail"))
            .expect_err("undeclared");
        assert_eq!(
            err,
            LinkError::MissingLinkDeclaration {
                resource_type: "item".into(),
                link: "thumbnail".into()
            }
        );

        let resolved = links
            .resolve_link(&resource, &follow_link("thumbnail").optional())
            .expect("optional link");
        assert!(resolved.resolved("thumbnail").is_some_and(ResolvedLink::is_absent));
    }

    #[tokio::test]
    async fn cardinality_must_match_declaration() {
        let links = links();
        let resource = item(json!({ "self": { "href": "/items/1" } }));
        let err = links
            .resolve_link(&resource, &follow_list("owningCollection"))
            .expect_err("declared single");
        assert!(matches!(
            err,
            LinkError::CardinalityMismatch {
                declared_list: false,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn target_without_strategy_is_an_error() {
        let links = links();
        let resource = item(json!({ "self": { "href": "/items/1" } }));
        let err = links
            .resolve_link(&resource, &follow_list("bundles"))
            .expect_err("no bundle strategy");
        assert_eq!(
            err,
            LinkError::MissingDataAccessStrategy {
                resource_type: "bundle".into()
            }
        );
    }

    #[tokio::test]
    async fn missing_href_resolves_to_absent() {
        let links = links();
        let resource = item(json!({ "self": { "href": "/items/1" } }));
        let resolved = links
            .resolve_link(&resource, &follow_link("owningCollection"))
            .expect("declared link");
        assert!(
            resolved
                .resolved("owningCollection")
                .is_some_and(ResolvedLink::is_absent)
        );
    }

    #[tokio::test]
    async fn resolution_is_idempotent_and_removable() {
        let links = links();
        let resource = item(json!({
            "self": { "href": "/items/1" },
            "owningCollection": { "href": "/items/1/owningCollection" }
        }));
        let config = follow_link("owningCollection");

        let once = links.resolve_link(&resource, &config).expect("resolved");
        let first = once
            .resolved("owningCollection")
            .and_then(ResolvedLink::single)
            .and_then(RemoteDataHandle::request_id);
        let twice = links.resolve_link(&once, &config).expect("resolved");
        let second = twice
            .resolved("owningCollection")
            .and_then(ResolvedLink::single)
            .and_then(RemoteDataHandle::request_id);
        assert!(first.is_some());
        assert_eq!(first, second);
        assert!(!resource.has_resolved_links());

        let cleared = links.remove_resolved_links(&twice);
        assert!(!cleared.has_resolved_links());
        assert_eq!(cleared, resource);
    }

    #[test]
    fn cardinality_message_names_declaration() {
        let err = LinkError::CardinalityMismatch {
            resource_type: "item".into(),
            link: "bundles".into(),
            declared_list: true,
        };
        assert_eq!(
            err.to_string(),
            "link `bundles` on `item` is declared as a list but was followed as a single resource"
        );
    }
}
