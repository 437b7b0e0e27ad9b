use serde::{Deserialize, Serialize};

/// Page/limit pair after clamping to the configured bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn new(page: Option<u32>, limit: Option<u32>, default_limit: u32, max_limit: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).clamp(1, max_limit.max(1)),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }

    pub fn limit_i64(&self) -> i64 {
        i64::from(self.limit)
    }

    /// Slice an already-ordered list, for in-process stores.
    pub fn apply<T: Clone>(&self, items: &[T]) -> Vec<T> {
        items
            .iter()
            .skip(self.offset() as usize)
            .take(self.limit as usize)
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: i64, page: PageRequest) -> Self {
        let total_pages = if total <= 0 {
            0
        } else {
            ((total + i64::from(page.limit) - 1) / i64::from(page.limit)) as u32
        };
        Self {
            items,
            total,
            page: page.page,
            limit: page.limit,
            total_pages,
        }
    }
}

/// Raw pagination query parameters shared by list endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}
