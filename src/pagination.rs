use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 6;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageParams {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_page() -> u32 {
    1
}
fn default_limit() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl PageParams {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or_else(default_page),
            limit: limit.unwrap_or_else(default_limit),
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.limit.clamp(1, MAX_PAGE_SIZE))
    }

    pub fn page(&self) -> i64 {
        i64::from(self.page.max(1))
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }
}

/// Page-number envelope: `{count, next, previous, results}`.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<i64>,
    pub previous: Option<i64>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(params: &PageParams, count: i64, results: Vec<T>) -> Self {
        let page = params.page();
        let next = (page * params.limit() < count).then_some(page + 1);
        let previous = (page > 1).then_some(page - 1);
        Self {
            count,
            next,
            previous,
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_and_offsets() {
        let p = PageParams { page: 0, limit: 0 };
        assert_eq!(p.page(), 1);
        assert_eq!(p.limit(), 1);
        assert_eq!(p.offset(), 0);

        let p = PageParams { page: 3, limit: 500 };
        assert_eq!(p.limit(), i64::from(MAX_PAGE_SIZE));
        assert_eq!(p.offset(), 200);

        let p = PageParams::new(None, None);
        assert_eq!((p.page, p.limit), (1, DEFAULT_PAGE_SIZE));
    }

    #[test]
    fn links_between_pages() {
        let p = PageParams { page: 1, limit: 6 };
        let page = Page::new(&p, 13, vec![(); 6]);
        assert_eq!(page.next, Some(2));
        assert_eq!(page.previous, None);

        let p = PageParams { page: 3, limit: 6 };
        let page = Page::new(&p, 13, vec![()]);
        assert_eq!(page.next, None);
        assert_eq!(page.previous, Some(2));

        let page = Page::<()>::new(&PageParams::default(), 0, vec![]);
        assert_eq!((page.next, page.previous), (None, None));
    }
}
