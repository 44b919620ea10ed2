//! Paging, sorting and search parameters of a list request.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortOptions {
    pub field: String,
    pub direction: SortDirection,
}

impl SortOptions {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

/// One `name=value` search argument. Names may repeat.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestParam {
    pub name: String,
    pub value: String,
}

impl RequestParam {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Options applied to a list href. `current_page` is one-based.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FindListOptions {
    pub current_page: Option<u32>,
    pub elements_per_page: Option<u32>,
    pub sort: Option<SortOptions>,
    pub search_params: Vec<RequestParam>,
}

impl FindListOptions {
    pub fn page(mut self, current_page: u32) -> Self {
        self.current_page = Some(current_page);
        self
    }

    pub fn size(mut self, elements_per_page: u32) -> Self {
        self.elements_per_page = Some(elements_per_page);
        self
    }

    pub fn sorted_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort = Some(SortOptions::new(field, direction));
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.search_params.push(RequestParam::new(name, value));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.current_page.is_none()
            && self.elements_per_page.is_none()
            && self.sort.is_none()
            && self.search_params.is_empty()
    }
}
