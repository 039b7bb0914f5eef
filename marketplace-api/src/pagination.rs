use serde::Serialize;

/// Normalized page/limit pair shared by every list endpoint.
#[derive(Debug, Clone, Copy)]
pub struct PageParams {
    pub page: i64,
    pub limit: i64,
}

impl PageParams {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(20).clamp(1, 100);
        Self { page, limit }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub pages: i64,
    pub current: i64,
    pub limit: i64,
}

impl Pagination {
    pub fn new(total: i64, params: PageParams) -> Self {
        let pages = if total <= 0 {
            0
        } else {
            (total + params.limit - 1) / params.limit
        };
        Self {
            total: total.max(0),
            pages,
            current: params.page,
            limit: params.limit,
        }
    }
}
