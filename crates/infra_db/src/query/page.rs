//! Page descriptors and paged results

use serde::Serialize;

use crate::error::DataError;

/// A validated `(page_index, page_size)` pair; page 1 is the first page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    index: u32,
    size: u32,
}

impl Page {
    /// Creates a page descriptor
    ///
    /// # Errors
    ///
    /// Returns `DataError::InvalidArgument` when `index < 1` or `size == 0`
    pub fn new(index: u32, size: u32) -> Result<Self, DataError> {
        if index < 1 {
            return Err(DataError::invalid_argument(format!(
                "page index must be at least 1, got {index}"
            )));
        }
        if size == 0 {
            return Err(DataError::invalid_argument("page size must be greater than 0"));
        }
        Ok(Self { index, size })
    }

    /// One-based page index
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Maximum number of items on the page
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Number of items before this page: `(index - 1) * size`
    pub fn skip(&self) -> usize {
        (self.index as usize - 1).saturating_mul(self.size as usize)
    }

    /// Number of items on a full page
    pub fn take(&self) -> usize {
        self.size as usize
    }

    /// Cuts this page out of an already ordered sequence
    pub fn slice<I: IntoIterator>(&self, items: I) -> Vec<I::Item> {
        items.into_iter().skip(self.skip()).take(self.take()).collect()
    }

    /// Number of pages needed for `total` items
    pub fn count_for(total: u64, size: u32) -> u64 {
        if size == 0 {
            0
        } else {
            total.div_ceil(u64::from(size))
        }
    }
}

/// One page of results together with the size of the whole result set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagedList<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub page_index: u32,
    pub page_size: u32,
}

impl<T> PagedList<T> {
    pub(crate) fn new(items: Vec<T>, total_count: u64, page: Page) -> Self {
        Self {
            items,
            total_count,
            page_index: page.index(),
            page_size: page.size(),
        }
    }

    pub fn total_pages(&self) -> u64 {
        Page::count_for(self.total_count, self.page_size)
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.page_index) < self.total_pages()
    }

    pub fn has_previous(&self) -> bool {
        self.page_index > 1
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_malformed_descriptors() {
        assert!(Page::new(0, 10).unwrap_err().is_invalid_argument());
        assert!(Page::new(1, 0).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_skip_and_take() {
        let page = Page::new(3, 10).unwrap();
        assert_eq!(page.skip(), 20);
        assert_eq!(page.take(), 10);
        assert_eq!(Page::new(1, 7).unwrap().skip(), 0);
    }

    #[test]
    fn test_slice_past_the_end_is_empty() {
        let page = Page::new(4, 10).unwrap();
        assert!(page.slice(0..25).is_empty());
        assert_eq!(Page::new(3, 10).unwrap().slice(0..25), (20..25).collect::<Vec<_>>());
    }

    #[test]
    fn test_paged_list_navigation() {
        let list = PagedList::new(vec![1, 2], 12, Page::new(2, 5).unwrap());
        assert_eq!(list.total_pages(), 3);
        assert!(list.has_next());
        assert!(list.has_previous());

        let last = PagedList::new(vec![11, 12], 12, Page::new(3, 5).unwrap());
        assert!(!last.has_next());
    }

    proptest::proptest! {
        #[test]
        fn prop_slices_cover_every_item_once(len in 0usize..200, size in 1u32..25) {
            let pages = Page::count_for(len as u64, size) as u32;
            let mut seen = Vec::with_capacity(len);
            for index in 1..=pages {
                let slice = Page::new(index, size).unwrap().slice(0..len);
                proptest::prop_assert!(slice.len() <= size as usize);
                seen.extend(slice);
            }
            proptest::prop_assert_eq!(seen, (0..len).collect::<Vec<_>>());
        }
    }
}
