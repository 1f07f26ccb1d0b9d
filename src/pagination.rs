use std::ops::Range;

use tracing::trace;

use crate::domain::TabError;

/// Rows per page, restricted to the sizes offered in the page size selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageSize {
    #[default]
    Ten,
    Twenty,
    Thirty,
    Forty,
    Fifty,
}

impl PageSize {
    pub const ALL: [PageSize; 5] = [
        PageSize::Ten,
        PageSize::Twenty,
        PageSize::Thirty,
        PageSize::Forty,
        PageSize::Fifty,
    ];

    pub fn rows(&self) -> usize {
        match self {
            PageSize::Ten => 10,
            PageSize::Twenty => 20,
            PageSize::Thirty => 30,
            PageSize::Forty => 40,
            PageSize::Fifty => 50,
        }
    }

    pub fn next(&self) -> PageSize {
        let idx = Self::ALL.iter().position(|s| s == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

impl TryFrom<usize> for PageSize {
    type Error = TabError;

    fn try_from(rows: usize) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|s| s.rows() == rows)
            .ok_or(TabError::UnsupportedPageSize(rows))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageInfo {
    pub page_index: usize,
    pub page_count: usize,
    pub range: Range<usize>, // Slice of the row sequence shown on this page
    pub can_go_previous: bool,
    pub can_go_next: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PaginationController {
    page_index: usize,
    page_size: PageSize,
}

impl PaginationController {
    pub fn new(page_size: PageSize) -> Self {
        Self {
            page_index: 0,
            page_size,
        }
    }

    pub fn page_size(&self) -> PageSize {
        self.page_size
    }

    pub fn page_count(&self, row_count: usize) -> usize {
        std::cmp::max(1, row_count.div_ceil(self.page_size.rows()))
    }

    /// Current page over a row sequence of `row_count` rows.
    ///
    /// An index past the last page yields an empty range.
    pub fn page(&self, row_count: usize) -> PageInfo {
        let size = self.page_size.rows();
        let page_count = self.page_count(row_count);
        let begin = std::cmp::min(row_count, self.page_index.saturating_mul(size));
        let end = std::cmp::min(row_count, begin.saturating_add(size));
        PageInfo {
            page_index: self.page_index,
            page_count,
            range: begin..end,
            can_go_previous: self.page_index > 0,
            can_go_next: self.page_index + 1 < page_count,
        }
    }

    pub fn next_page(&mut self, row_count: usize) -> bool {
        if self.page_index + 1 < self.page_count(row_count) {
            self.page_index += 1;
            true
        } else {
            false
        }
    }

    pub fn previous_page(&mut self) -> bool {
        if self.page_index > 0 {
            self.page_index -= 1;
            true
        } else {
            false
        }
    }

    pub fn last_page(&mut self, row_count: usize) {
        self.page_index = self.page_count(row_count) - 1;
    }

    /// Changes the page size. The page index stays as it is, even if it is now out of range.
    pub fn set_page_size(&mut self, page_size: PageSize) {
        trace!(
            "Page size {} -> {}, page index {}",
            self.page_size.rows(),
            page_size.rows(),
            self.page_index
        );
        self.page_size = page_size;
    }

    pub fn cycle_page_size(&mut self) -> PageSize {
        self.set_page_size(self.page_size.next());
        self.page_size
    }

    /// Moves back onto the last page if the row count shrank below the current page.
    pub fn clamp(&mut self, row_count: usize) {
        self.page_index = std::cmp::min(self.page_index, self.page_count(row_count) - 1);
    }

    pub fn reset(&mut self) {
        self.page_index = 0;
    }
}
