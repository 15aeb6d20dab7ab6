//! `?skip=&limit=` for admin list endpoints.

use serde::Deserialize;

use crate::db::models::users::UserFilter;

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

/// Raw query parameters. Use the accessors, which apply defaults and bounds.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pagination {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl Pagination {
    /// Offset into the list; negative values count as 0.
    pub fn skip(&self) -> i64 {
        self.skip.map_or(0, |skip| skip.max(0))
    }

    /// Page size in `1..=MAX_LIMIT`, [`DEFAULT_LIMIT`] when absent.
    pub fn limit(&self) -> i64 {
        self.limit.map_or(DEFAULT_LIMIT, |limit| limit.clamp(1, MAX_LIMIT))
    }
}

impl From<&Pagination> for UserFilter {
    fn from(pagination: &Pagination) -> Self {
        UserFilter::new(pagination.skip(), pagination.limit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(skip: Option<i64>, limit: Option<i64>) -> UserFilter {
        UserFilter::from(&Pagination { skip, limit })
    }

    #[test]
    fn test_defaults_and_bounds() {
        assert_eq!(page(None, None), UserFilter::new(0, DEFAULT_LIMIT));
        assert_eq!(page(Some(-5), Some(1000)), UserFilter::new(0, MAX_LIMIT));
        assert_eq!(page(Some(20), Some(0)), UserFilter::new(20, 1));
        assert_eq!(page(Some(3), Some(25)), UserFilter::new(3, 25));
    }
}
