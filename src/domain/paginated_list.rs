use hypercache_hal::PageInfo;

/// One page of a collection, elements in server order.
#[derive(Debug, Clone, PartialEq)]
pub struct PaginatedList<T> {
    pub self_link: Option<String>,
    pub page_info: PageInfo,
    pub page: Vec<T>,
}

impl<T> PaginatedList<T> {
    pub fn new(self_link: Option<String>, page_info: PageInfo, page: Vec<T>) -> Self {
        Self {
            self_link,
            page_info,
            page,
        }
    }

    pub fn current_page(&self) -> u32 {
        self.page_info.current_page()
    }

    pub fn total_elements(&self) -> u64 {
        self.page_info.total_elements
    }

    pub fn total_pages(&self) -> u32 {
        self.page_info.total_pages
    }

    pub fn len(&self) -> usize {
        self.page.len()
    }

    pub fn is_empty(&self) -> bool {
        self.page.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.page.iter()
    }
}
