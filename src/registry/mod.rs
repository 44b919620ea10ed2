//! Type Registry.
//!
//! Binds each resource type to the strategy that fetches it and to the links
//! it declares. Built once at startup through [`TypeRegistryBuilder`] and
//! immutable afterwards, so lookups need no synchronization.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::data::DataAccessStrategy;
use crate::domain::ResourceType;

/// Target of a declared link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkDefinition {
    pub target_type: ResourceType,
    pub is_list: bool,
}

impl LinkDefinition {
    pub fn single(target_type: impl Into<ResourceType>) -> Self {
        Self {
            target_type: target_type.into(),
            is_list: false,
        }
    }

    pub fn list(target_type: impl Into<ResourceType>) -> Self {
        Self {
            target_type: target_type.into(),
            is_list: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("a data-access strategy is already registered for `{resource_type}`")]
    DuplicateStrategy { resource_type: ResourceType },
    #[error("link `{link}` is already declared on `{resource_type}`")]
    DuplicateLink {
        resource_type: ResourceType,
        link: String,
    },
    #[error("link `{link}` on `{resource_type}` targets `{target}`, which has no strategy")]
    UnknownType {
        resource_type: ResourceType,
        link: String,
        target: ResourceType,
    },
}

#[derive(Default)]
pub struct TypeRegistryBuilder {
    strategies: HashMap<ResourceType, Arc<dyn DataAccessStrategy>>,
    links: HashMap<ResourceType, HashMap<String, LinkDefinition>>,
}

impl TypeRegistryBuilder {
    pub fn register(
        mut self,
        resource_type: impl Into<ResourceType>,
        strategy: Arc<dyn DataAccessStrategy>,
    ) -> Result<Self, RegistryError> {
        let resource_type = resource_type.into();
        if self.strategies.contains_key(&resource_type) {
            return Err(RegistryError::DuplicateStrategy { resource_type });
        }
        self.strategies.insert(resource_type, strategy);
        Ok(self)
    }

    pub fn declare_link(
        mut self,
        resource_type: impl Into<ResourceType>,
        name: impl Into<String>,
        definition: LinkDefinition,
    ) -> Result<Self, RegistryError> {
        let resource_type = resource_type.into();
        let name = name.into();
        let declared = self.links.entry(resource_type.clone()).or_default();
        if declared.contains_key(&name) {
            return Err(RegistryError::DuplicateLink {
                resource_type,
                link: name,
            });
        }
        declared.insert(name, definition);
        Ok(self)
    }

    /// Freeze the registry. Fails if a declared link targets a type with no
    /// strategy.
    pub fn build(self) -> Result<TypeRegistry, RegistryError> {
        for (resource_type, declared) in &self.links {
            for (link, definition) in declared {
                if !self.strategies.contains_key(&definition.target_type) {
                    return Err(RegistryError::UnknownType {
                        resource_type: resource_type.clone(),
                        link: link.clone(),
                        target: definition.target_type.clone(),
                    });
                }
            }
        }

        info!(
            types = self.strategies.len(),
            links = self.links.values().map(HashMap::len).sum::<usize>(),
            "type registry built"
        );
        Ok(TypeRegistry {
            strategies: self.strategies,
            links: self.links,
        })
    }

    /// Freeze the registry without checking link targets. Links whose target
    /// has no strategy fail at resolution time instead.
    pub fn build_unchecked(self) -> TypeRegistry {
        TypeRegistry {
            strategies: self.strategies,
            links: self.links,
        }
    }
}

pub struct TypeRegistry {
    strategies: HashMap<ResourceType, Arc<dyn DataAccessStrategy>>,
    links: HashMap<ResourceType, HashMap<String, LinkDefinition>>,
}

impl TypeRegistry {
    pub fn builder() -> TypeRegistryBuilder {
        TypeRegistryBuilder::default()
    }

    pub fn lookup(&self, resource_type: &ResourceType) -> Option<Arc<dyn DataAccessStrategy>> {
        self.strategies.get(resource_type).cloned()
    }

    pub fn declared_link(&self, resource_type: &ResourceType, name: &str) -> Option<&LinkDefinition> {
        self.links.get(resource_type)?.get(name)
    }

    pub fn declared_links(&self, resource_type: &ResourceType) -> impl Iterator<Item = &str> {
        self.links
            .get(resource_type)
            .into_iter()
            .flat_map(|declared| declared.keys().map(String::as_str))
    }

    pub fn types(&self) -> impl Iterator<Item = &ResourceType> {
        self.strategies.keys()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.strategies.keys().collect::<Vec<_>>())
            .field("links", &self.links)
            .finish()
    }
}
