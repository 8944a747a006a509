//! Pagination decoration for materialized relations.

use crate::view::View;
use serde::Serialize;

/// One page of views with the numbers a paginated listing needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub items: Vec<View>,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_count: usize,
    pub limit_value: usize,
    pub next_page: Option<usize>,
    pub is_last_page: bool,
}

impl Page {
    pub(crate) fn new(items: Vec<View>, page: usize, per: usize, total_count: usize) -> Self {
        let total_pages = total_count.div_ceil(per);
        Self {
            items,
            current_page: page,
            total_pages,
            total_count,
            limit_value: per,
            next_page: (page < total_pages).then_some(page + 1),
            is_last_page: page >= total_pages,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &View> {
        self.items.iter()
    }
}
