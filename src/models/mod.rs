pub mod scan_job;
pub mod vulnerability;

pub use scan_job::*;
pub use vulnerability::*;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 分页参数
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    20
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
        }
    }
}

impl Pagination {
    /// 计算OFFSET，页码从1开始
    pub fn offset(&self) -> i64 {
        (self.page.max(1) as i64 - 1) * self.page_size as i64
    }

    pub fn limit(&self) -> i64 {
        self.page_size.clamp(1, 100) as i64
    }
}

/// 分页结果
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, page: u32, page_size: u32) -> Self {
        // 与Pagination::limit()同样的钳制，避免page_size=0时除出无穷大
        let page_size = page_size.clamp(1, 100);
        let total_pages = if total == 0 {
            0
        } else {
            ((total as f64) / (page_size as f64)).ceil() as u32
        };

        Self {
            items,
            total,
            page,
            page_size,
            total_pages,
        }
    }
}

/// 实体通用trait
pub trait Entity {
    type Id;
    fn id(&self) -> Self::Id;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_offset() {
        let p = Pagination {
            page: 3,
            page_size: 20,
        };
        assert_eq!(p.offset(), 40);
        assert_eq!(p.limit(), 20);
    }

    #[test]
    fn test_paged_result_total_pages() {
        let r: PagedResult<i32> = PagedResult::new(vec![], 41, 1, 20);
        assert_eq!(r.total_pages, 3);

        let empty: PagedResult<i32> = PagedResult::new(vec![], 0, 1, 20);
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn test_paged_result_clamps_page_size() {
        // page_size=0与SQL侧LIMIT钳制一致，按每页1条计算
        let r: PagedResult<i32> = PagedResult::new(vec![], 41, 1, 0);
        assert_eq!(r.page_size, 1);
        assert_eq!(r.total_pages, 41);

        let r: PagedResult<i32> = PagedResult::new(vec![], 41, 1, 1000);
        assert_eq!(r.page_size, 100);
        assert_eq!(r.total_pages, 1);
    }
}
