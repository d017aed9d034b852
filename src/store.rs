use crate::error::StoreError;
use crate::models::{CohortFilter, StudentRecord};

/// Query surface the ranking engine needs from whatever holds the records.
///
/// `fetch_matching` must return records ordered by the filter's composite
/// ranking key (primary metric descending, the variant's secondary key
/// descending, then name ascending) so that a `limit` cuts the head of the
/// globally sorted sequence. The engine re-sorts whatever it receives; the
/// store's ordering only decides which records make it into a limited window.
///
/// Inclusion must match the ranking predicate exactly: for the overall
/// variant a record matches when its rounded average exists and is non-zero,
/// for a term-scoped variant when it has a score for that term. The same
/// predicate backs `count_matching`, which keeps reported totals in agreement
/// with the entries a ranking can enumerate.
pub trait CohortStore {
    async fn fetch_matching(
        &self,
        filter: &CohortFilter,
        offset: Option<u32>,
        limit: Option<u32>,
    ) -> Result<Vec<StudentRecord>, StoreError>;

    async fn count_matching(&self, filter: &CohortFilter) -> Result<u64, StoreError>;

    /// Cohort-wide maximum term number for an admission year, `None` when the
    /// cohort has no recorded scores at all.
    async fn max_term(&self, year: i32) -> Result<Option<i32>, StoreError>;

    /// Distinct admission years across the whole store, descending.
    async fn distinct_years(&self) -> Result<Vec<i32>, StoreError>;

    /// Distinct term numbers recorded anywhere in the year's cohort,
    /// ascending.
    async fn distinct_terms(&self, year: i32) -> Result<Vec<i32>, StoreError>;
}
