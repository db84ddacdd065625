/// Page-number navigation over a counted result set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
    pub current: u32,
    pub total_pages: u32,
}

impl Pagination {
    pub fn new(count: u64, page_size: u32, current: u32) -> Self {
        let page_size = u64::from(page_size.max(1));
        let total_pages = count.div_ceil(page_size);
        Self {
            current: current.max(1),
            total_pages: u32::try_from(total_pages).unwrap_or(u32::MAX),
        }
    }

    pub fn has_previous(&self) -> bool {
        self.current > 1
    }

    pub fn has_next(&self) -> bool {
        self.current < self.total_pages
    }

    /// A single page (or none) needs no navigation.
    pub fn is_visible(&self) -> bool {
        self.total_pages > 1
    }

    pub fn label(&self) -> String {
        format!("{} / {}", self.current, self.total_pages)
    }
}
