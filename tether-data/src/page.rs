use serde::{Deserialize, Serialize};

use crate::condition::{OrderBy, SortDirection};

/// Pagination parameters, typically deserialized from query params.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Pageable {
    pub page: u64,
    pub size: u64,
    /// `"field"` or `"field,desc"`.
    pub sort: Option<String>,
}

impl Default for Pageable {
    fn default() -> Self {
        Self {
            page: 0,
            size: 20,
            sort: None,
        }
    }
}

impl Pageable {
    pub fn offset(&self) -> u64 {
        self.page * self.size
    }

    /// Parse the `sort` spec into an [`OrderBy`], defaulting to ascending.
    pub fn order_by(&self) -> Option<OrderBy> {
        let sort = self.sort.as_deref()?;
        let (field, direction) = match sort.split_once(',') {
            Some((field, "desc")) => (field, SortDirection::Desc),
            Some((field, _)) => (field, SortDirection::Asc),
            None => (sort, SortDirection::Asc),
        };
        let field = field.trim();
        if field.is_empty() {
            return None;
        }
        Some(OrderBy {
            field: field.to_string(),
            direction,
        })
    }
}

/// A page of results with pagination metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: u64,
    pub size: u64,
    pub total_elements: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, pageable: &Pageable, total_elements: u64) -> Self {
        let total_pages = if pageable.size == 0 {
            0
        } else {
            (total_elements + pageable.size - 1) / pageable.size
        };
        Self {
            content,
            page: pageable.page,
            size: pageable.size,
            total_elements,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_is_page_times_size() {
        let pageable = Pageable {
            page: 3,
            size: 25,
            sort: None,
        };
        assert_eq!(pageable.offset(), 75);
    }

    #[test]
    fn sort_spec_parses_direction() {
        let mut pageable = Pageable::default();
        assert!(pageable.order_by().is_none());

        pageable.sort = Some("name".to_string());
        let order = pageable.order_by().unwrap();
        assert_eq!((order.field.as_str(), order.direction), ("name", SortDirection::Asc));

        pageable.sort = Some("created_at,desc".to_string());
        let order = pageable.order_by().unwrap();
        assert_eq!(order.direction, SortDirection::Desc);
    }

    #[test]
    fn total_pages_rounds_up() {
        let pageable = Pageable::default();
        let page: Page<u8> = Page::new(Vec::new(), &pageable, 41);
        assert_eq!(page.total_pages, 3);

        let page: Page<u8> = Page::new(Vec::new(), &pageable, 40);
        assert_eq!(page.total_pages, 2);
    }
}
