use crate::error::{AppError, AppResult};

/// Home page page size.
pub const POSTS_PER_PAGE: i64 = 4;

/// One page of a fixed-size paginated listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    pub number: i64,
    pub num_pages: i64,
    pub per_page: i64,
    pub total: i64,
}

impl PageInfo {
    /// Resolve the `page` query value (`1`-based number or `last`) against a
    /// result count. The first page always exists, even when empty; anything
    /// else out of range is a 404.
    pub fn resolve(page: Option<&str>, total: i64, per_page: i64) -> AppResult<Self> {
        let per_page = per_page.max(1);
        let total = total.max(0);
        let num_pages = ((total + per_page - 1) / per_page).max(1);

        let number = match page.map(str::trim) {
            None | Some("") => 1,
            Some("last") => num_pages,
            Some(raw) => raw.parse::<i64>().map_err(|_| AppError::NotFound)?,
        };

        if number < 1 || number > num_pages {
            return Err(AppError::NotFound);
        }

        Ok(Self {
            number,
            num_pages,
            per_page,
            total,
        })
    }

    pub fn offset(&self) -> i64 {
        (self.number - 1) * self.per_page
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn previous_number(&self) -> i64 {
        (self.number - 1).max(1)
    }

    pub fn next_number(&self) -> i64 {
        (self.number + 1).min(self.num_pages)
    }

    pub fn is_paginated(&self) -> bool {
        self.num_pages > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_first_page() {
        let page = PageInfo::resolve(None, 10, 4).unwrap();
        assert_eq!(page.number, 1);
        assert_eq!(page.num_pages, 3);
        assert_eq!(page.offset(), 0);
        assert!(!page.has_previous());
        assert!(page.has_next());
        assert!(page.is_paginated());
    }

    #[test]
    fn empty_listing_has_one_page() {
        let page = PageInfo::resolve(Some("1"), 0, 4).unwrap();
        assert_eq!(page.num_pages, 1);
        assert!(!page.has_next());
        assert!(!page.is_paginated());
    }

    #[test]
    fn last_resolves_to_final_page() {
        let page = PageInfo::resolve(Some("last"), 9, 4).unwrap();
        assert_eq!(page.number, 3);
        assert_eq!(page.offset(), 8);
        assert_eq!(page.previous_number(), 2);
        assert_eq!(page.next_number(), 3);
    }

    #[test]
    fn exact_multiple_has_no_trailing_empty_page() {
        let page = PageInfo::resolve(Some("last"), 8, 4).unwrap();
        assert_eq!(page.number, 2);
        assert!(PageInfo::resolve(Some("3"), 8, 4).is_err());
    }

    #[test]
    fn invalid_pages_are_not_found() {
        for bad in ["0", "-1", "4", "abc", "1.5"] {
            let result = PageInfo::resolve(Some(bad), 10, 4);
            assert!(matches!(result, Err(AppError::NotFound)), "page {bad}");
        }
    }
}
