use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Column a paginated listing may be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    CreatedAt,
    UpdatedAt,
    LikeCount,
    ReplyCount,
    Level,
    Path,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDir {
    Asc,
    #[default]
    Desc,
}

/// Query parameters for paginated listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    /// Zero-based page index (default: 0).
    pub page: Option<i64>,
    /// Items per page (default: 10, max: 100).
    pub size: Option<i64>,
    pub sort_by: Option<SortKey>,
    pub sort_dir: Option<SortDir>,
}

/// A validated offset+limit window with its sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub size: i64,
    pub sort_by: SortKey,
    pub sort_dir: SortDir,
}

impl PageRequest {
    /// Row offset of this page. Requests built through `TryFrom<PageParams>` never
    /// overflow here.
    pub fn offset(&self) -> i64 {
        self.page.saturating_mul(self.size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            size: DEFAULT_PAGE_SIZE,
            sort_by: SortKey::default(),
            sort_dir: SortDir::default(),
        }
    }
}

impl TryFrom<PageParams> for PageRequest {
    type Error = AppError;

    fn try_from(params: PageParams) -> Result<Self, Self::Error> {
        let page = params.page.unwrap_or(0);
        if page < 0 {
            return Err(AppError::Validation(
                "Page index must not be negative".to_string(),
            ));
        }

        let size = params.size.unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE).contains(&size) {
            return Err(AppError::Validation(format!(
                "Page size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        if page.checked_mul(size).is_none() {
            return Err(AppError::Validation(format!(
                "Page index {} is out of range",
                page
            )));
        }

        Ok(Self {
            page,
            size,
            sort_by: params.sort_by.unwrap_or_default(),
            sort_dir: params.sort_dir.unwrap_or_default(),
        })
    }
}

/// One page of results plus the size of the whole filtered set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: i64,
    pub size: i64,
    pub total_elements: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, request: &PageRequest, total_elements: i64) -> Self {
        let total_pages = if total_elements == 0 {
            0
        } else {
            (total_elements + request.size - 1) / request.size
        };

        Self {
            content,
            page: request.page,
            size: request.size,
            total_elements,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_first_page_newest_first() {
        let req = PageRequest::try_from(PageParams::default()).unwrap();
        assert_eq!(req, PageRequest::default());
        assert_eq!(req.sort_dir, SortDir::Desc);
        assert_eq!(req.offset(), 0);
    }

    #[test]
    fn rejects_out_of_range_windows() {
        let too_big = PageParams {
            size: Some(MAX_PAGE_SIZE + 1),
            ..Default::default()
        };
        assert!(matches!(
            PageRequest::try_from(too_big),
            Err(AppError::Validation(_))
        ));

        let negative = PageParams {
            page: Some(-1),
            ..Default::default()
        };
        assert!(PageRequest::try_from(negative).is_err());
    }

    #[test]
    fn rejects_page_index_whose_offset_overflows() {
        let huge = PageParams {
            page: Some(i64::MAX),
            size: Some(MAX_PAGE_SIZE),
            ..Default::default()
        };
        assert!(matches!(
            PageRequest::try_from(huge),
            Err(AppError::Validation(_))
        ));

        let last = PageParams {
            page: Some(i64::MAX / MAX_PAGE_SIZE),
            size: Some(MAX_PAGE_SIZE),
            ..Default::default()
        };
        let req = PageRequest::try_from(last).unwrap();
        assert!(req.offset() > 0);
    }

    #[test]
    fn total_pages_rounds_up() {
        let req = PageRequest {
            page: 2,
            size: 10,
            ..Default::default()
        };
        assert_eq!(req.offset(), 20);
        assert_eq!(Page::new(vec![1, 2], &req, 21).total_pages, 3);
        assert_eq!(Page::<i32>::new(vec![], &req, 0).total_pages, 0);
    }
}
