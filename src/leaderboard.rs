use crate::error::RankError;
use crate::metrics;
use crate::models::{CohortFilter, RankingPage, ScoredEntry, StudentRecord};
use crate::ranking;
use crate::store::CohortStore;

/// Ranking engine over an abstract record store. Every request recomputes
/// from freshly fetched records; nothing is cached between requests, so pages
/// beyond the first re-materialize the whole cohort (O(N log N) per request,
/// a known ceiling accepted for correctness).
pub struct Leaderboard<S> {
    store: S,
}

impl<S: CohortStore> Leaderboard<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Standings by cumulative average. Records with no recorded terms, or a
    /// rounded average of zero, are absent rather than ranked at the bottom.
    pub async fn overall_ranking(
        &self,
        year: i32,
        page: u32,
        page_size: u32,
    ) -> Result<RankingPage, RankError> {
        validate_year(year)?;
        self.ranked_page(CohortFilter::Overall { year }, page, page_size)
            .await
    }

    /// Standings by one term's score. Records without an entry for that term
    /// are absent from the ranking entirely.
    pub async fn term_ranking(
        &self,
        year: i32,
        term: i32,
        page: u32,
        page_size: u32,
    ) -> Result<RankingPage, RankError> {
        validate_year(year)?;
        if term < 1 {
            return Err(RankError::Validation(format!(
                "term must be at least 1, got {term}"
            )));
        }
        self.ranked_page(CohortFilter::Term { year, term }, page, page_size)
            .await
    }

    /// Standings by the cohort-wide most recent term. The term is the maximum
    /// recorded anywhere in the cohort, so records that have not reported it
    /// yet are simply excluded. An empty cohort is a not-found condition.
    pub async fn current_term_ranking(
        &self,
        year: i32,
        page: u32,
        page_size: u32,
    ) -> Result<RankingPage, RankError> {
        validate_year(year)?;
        let term = self.store.max_term(year).await?.ok_or_else(|| {
            RankError::NotFound(format!(
                "no term scores recorded for admission year {year}"
            ))
        })?;
        self.ranked_page(CohortFilter::Term { year, term }, page, page_size)
            .await
    }

    /// Distinct admission years across the store, most recent first.
    pub async fn available_years(&self) -> Result<Vec<i32>, RankError> {
        let mut years = self.store.distinct_years().await?;
        years.sort_unstable_by(|a, b| b.cmp(a));
        Ok(years)
    }

    /// Distinct terms with any recorded score in the year's cohort, ascending.
    pub async fn available_terms(&self, year: i32) -> Result<Vec<i32>, RankError> {
        validate_year(year)?;
        let mut terms = self.store.distinct_terms(year).await?;
        terms.sort_unstable();
        Ok(terms)
    }

    async fn ranked_page(
        &self,
        filter: CohortFilter,
        page: u32,
        page_size: u32,
    ) -> Result<RankingPage, RankError> {
        if page == 0 {
            return Err(RankError::Validation("page must be at least 1".to_string()));
        }
        if page_size == 0 {
            return Err(RankError::Validation(
                "page size must be at least 1".to_string(),
            ));
        }

        let total_records = self.store.count_matching(&filter).await?;
        let total_pages = total_records.div_ceil(u64::from(page_size));

        // The first page's window starts at offset 0, so ranking the window
        // alone is globally correct: no tied value can be cut off before the
        // window begins. Any later page starts mid-sequence and cannot tell
        // from its own contents whether its first entries tie with excluded
        // ones, so the whole cohort is materialized and ranked from the top
        // before slicing. Both paths must report identical ranks for any
        // entry they both cover.
        let records = if page == 1 {
            self.store
                .fetch_matching(&filter, None, Some(page_size))
                .await?
        } else {
            self.store.fetch_matching(&filter, None, None).await?
        };

        let mut scored = score_records(records, &filter);
        ranking::sort_standings(&mut scored);
        let ranked = ranking::assign_dense_ranks(scored);

        let skip = (page as usize - 1) * page_size as usize;
        let entries = ranked
            .into_iter()
            .skip(skip)
            .take(page_size as usize)
            .collect();

        Ok(RankingPage {
            entries,
            page,
            page_size,
            total_records,
            total_pages,
            term: match filter {
                CohortFilter::Term { term, .. } => Some(term),
                CohortFilter::Overall { .. } => None,
            },
        })
    }
}

fn validate_year(year: i32) -> Result<(), RankError> {
    if year < 1 {
        return Err(RankError::Validation(format!(
            "admission year must be positive, got {year}"
        )));
    }
    Ok(())
}

/// Derive metrics for each record and keep the ones the filter's metric
/// applies to, paired with their sort keys. Overall ranks by rounded average
/// with the latest term's score as tie-break input; term-scoped variants rank
/// by that term's score with the average as tie-break input.
pub(crate) fn score_records(
    records: Vec<StudentRecord>,
    filter: &CohortFilter,
) -> Vec<ScoredEntry> {
    records
        .into_iter()
        .filter_map(|record| {
            let derived = metrics::derive(&record);
            match *filter {
                CohortFilter::Overall { .. } => {
                    let primary = derived.average.filter(|average| *average != 0.0)?;
                    let secondary = derived.latest.map(|entry| entry.score).unwrap_or(0.0);
                    Some(ScoredEntry {
                        record,
                        primary,
                        secondary,
                    })
                }
                CohortFilter::Term { term, .. } => {
                    let primary = metrics::score_for_term(&record, term)?;
                    let secondary = derived.average.unwrap_or(0.0);
                    Some(ScoredEntry {
                        record,
                        primary,
                        secondary,
                    })
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::models::TermScore;

    struct MemStore {
        records: Vec<StudentRecord>,
    }

    impl CohortStore for MemStore {
        async fn fetch_matching(
            &self,
            filter: &CohortFilter,
            offset: Option<u32>,
            limit: Option<u32>,
        ) -> Result<Vec<StudentRecord>, StoreError> {
            let matching: Vec<StudentRecord> = self
                .records
                .iter()
                .filter(|record| record.admission_year == filter.year())
                .cloned()
                .collect();

            let mut scored = score_records(matching, filter);
            ranking::sort_standings(&mut scored);

            let skip = offset.unwrap_or(0) as usize;
            let take = limit.map_or(usize::MAX, |value| value as usize);
            Ok(scored
                .into_iter()
                .map(|entry| entry.record)
                .skip(skip)
                .take(take)
                .collect())
        }

        async fn count_matching(&self, filter: &CohortFilter) -> Result<u64, StoreError> {
            let matching: Vec<StudentRecord> = self
                .records
                .iter()
                .filter(|record| record.admission_year == filter.year())
                .cloned()
                .collect();
            Ok(score_records(matching, filter).len() as u64)
        }

        async fn max_term(&self, year: i32) -> Result<Option<i32>, StoreError> {
            Ok(self
                .records
                .iter()
                .filter(|record| record.admission_year == year)
                .flat_map(|record| record.scores.iter().map(|entry| entry.term))
                .max())
        }

        async fn distinct_years(&self) -> Result<Vec<i32>, StoreError> {
            let mut years: Vec<i32> = self
                .records
                .iter()
                .map(|record| record.admission_year)
                .collect();
            years.sort_unstable();
            years.dedup();
            Ok(years)
        }

        async fn distinct_terms(&self, year: i32) -> Result<Vec<i32>, StoreError> {
            let mut terms: Vec<i32> = self
                .records
                .iter()
                .filter(|record| record.admission_year == year)
                .flat_map(|record| record.scores.iter().map(|entry| entry.term))
                .collect();
            terms.sort_unstable();
            terms.dedup();
            Ok(terms)
        }
    }

    struct FailingStore;

    impl CohortStore for FailingStore {
        async fn fetch_matching(
            &self,
            _filter: &CohortFilter,
            _offset: Option<u32>,
            _limit: Option<u32>,
        ) -> Result<Vec<StudentRecord>, StoreError> {
            Err(StoreError::Backend {
                message: "connection refused".to_string(),
            })
        }

        async fn count_matching(&self, _filter: &CohortFilter) -> Result<u64, StoreError> {
            Err(StoreError::Backend {
                message: "connection refused".to_string(),
            })
        }

        async fn max_term(&self, _year: i32) -> Result<Option<i32>, StoreError> {
            Err(StoreError::Backend {
                message: "connection refused".to_string(),
            })
        }

        async fn distinct_years(&self) -> Result<Vec<i32>, StoreError> {
            Err(StoreError::Backend {
                message: "connection refused".to_string(),
            })
        }

        async fn distinct_terms(&self, _year: i32) -> Result<Vec<i32>, StoreError> {
            Err(StoreError::Backend {
                message: "connection refused".to_string(),
            })
        }
    }

    fn student(seat: &str, name: &str, year: i32, scores: &[(i32, f64)]) -> StudentRecord {
        StudentRecord {
            seat_number: seat.to_string(),
            full_name: name.to_string(),
            admission_year: year,
            scores: scores
                .iter()
                .map(|&(term, score)| TermScore { term, score })
                .collect(),
        }
    }

    fn board(records: Vec<StudentRecord>) -> Leaderboard<MemStore> {
        Leaderboard::new(MemStore { records })
    }

    #[tokio::test]
    async fn ties_share_ranks_and_totals_line_up() {
        let board = board(vec![
            student("GS-04", "Drew", 2024, &[(1, 7.0)]),
            student("GS-03", "Casey", 2024, &[(1, 8.5)]),
            student("GS-01", "Avery", 2024, &[(1, 8.0), (2, 10.0)]),
            student("GS-02", "Blair", 2024, &[(1, 8.0), (2, 10.0)]),
        ]);

        let page = board.overall_ranking(2024, 1, 10).await.unwrap();

        let ranks: Vec<u32> = page.entries.iter().map(|e| e.rank).collect();
        let names: Vec<&str> = page
            .entries
            .iter()
            .map(|e| e.record.full_name.as_str())
            .collect();
        assert_eq!(ranks, vec![1, 1, 2, 3]);
        assert_eq!(names, vec!["Avery", "Blair", "Casey", "Drew"]);
        assert_eq!(page.entries[0].score, 9.0);
        assert_eq!(page.total_records, 4);
        assert_eq!(page.total_pages, 1);
    }

    #[tokio::test]
    async fn windowed_first_page_matches_full_materialization() {
        // Averages 9.0, 9.0, 9.0, 8.0, 8.0, 7.0, 6.0 with a tie group
        // straddling the first page boundary.
        let records = vec![
            student("GS-01", "Avery", 2024, &[(1, 9.0)]),
            student("GS-02", "Blair", 2024, &[(1, 9.0)]),
            student("GS-03", "Casey", 2024, &[(1, 9.0)]),
            student("GS-04", "Drew", 2024, &[(1, 8.0)]),
            student("GS-05", "Emery", 2024, &[(1, 8.0)]),
            student("GS-06", "Finley", 2024, &[(1, 7.0)]),
            student("GS-07", "Gale", 2024, &[(1, 6.0)]),
        ];

        let mut full = score_records(records.clone(), &CohortFilter::Overall { year: 2024 });
        ranking::sort_standings(&mut full);
        let full = ranking::assign_dense_ranks(full);

        let board = board(records);
        let page_size = 3u32;
        let total = full.len() as u32;
        let total_pages = total.div_ceil(page_size);

        for page_no in 1..=total_pages {
            let page = board
                .overall_ranking(2024, page_no, page_size)
                .await
                .unwrap();
            let expected: Vec<(&str, u32)> = full
                .iter()
                .skip(((page_no - 1) * page_size) as usize)
                .take(page_size as usize)
                .map(|e| (e.record.seat_number.as_str(), e.rank))
                .collect();
            let got: Vec<(&str, u32)> = page
                .entries
                .iter()
                .map(|e| (e.record.seat_number.as_str(), e.rank))
                .collect();
            assert_eq!(got, expected, "page {page_no} diverged between strategies");
        }
    }

    #[tokio::test]
    async fn concatenated_pages_reproduce_the_whole_ranking_once() {
        let records: Vec<StudentRecord> = (0..11)
            .map(|i| {
                student(
                    &format!("GS-{i:02}"),
                    &format!("Student {i:02}"),
                    2023,
                    &[(1, 5.0 + (i % 4) as f64)],
                )
            })
            .collect();

        let board = board(records);
        let first = board.overall_ranking(2023, 1, 4).await.unwrap();
        assert_eq!(first.total_records, 11);
        assert_eq!(first.total_pages, 3);

        let mut seen = Vec::new();
        for page_no in 1..=first.total_pages {
            let page = board
                .overall_ranking(2023, page_no as u32, 4)
                .await
                .unwrap();
            seen.extend(
                page.entries
                    .iter()
                    .map(|e| e.record.seat_number.clone()),
            );
        }

        assert_eq!(seen.len(), 11);
        let mut deduped = seen.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), 11, "an entry appeared on more than one page");
    }

    #[tokio::test]
    async fn unrankable_records_are_neither_counted_nor_listed() {
        let board = board(vec![
            student("GS-01", "Avery", 2024, &[(1, 9.0)]),
            student("GS-02", "Blair", 2024, &[]),
            student("GS-03", "Casey", 2024, &[(1, 0.0), (2, 0.0)]),
        ]);

        let page = board.overall_ranking(2024, 1, 10).await.unwrap();
        assert_eq!(page.total_records, 1);
        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.entries[0].record.seat_number, "GS-01");
    }

    #[tokio::test]
    async fn term_ranking_skips_records_without_that_term() {
        let board = board(vec![
            student("GS-01", "Avery", 2024, &[(1, 9.0), (2, 8.0)]),
            student("GS-02", "Blair", 2024, &[(1, 7.0)]),
        ]);

        let page = board.term_ranking(2024, 2, 1, 10).await.unwrap();
        assert_eq!(page.total_records, 1);
        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.entries[0].record.seat_number, "GS-01");
        assert_eq!(page.term, Some(2));
    }

    #[tokio::test]
    async fn current_term_agrees_with_explicit_max_term() {
        let board = board(vec![
            student("GS-01", "Avery", 2024, &[(1, 9.0), (4, 8.0)]),
            student("GS-02", "Blair", 2024, &[(1, 7.0), (4, 9.5)]),
            student("GS-03", "Casey", 2024, &[(1, 8.0)]),
        ]);

        let current = board.current_term_ranking(2024, 1, 10).await.unwrap();
        let explicit = board.term_ranking(2024, 4, 1, 10).await.unwrap();

        assert_eq!(current.term, Some(4));
        let current_rows: Vec<(String, u32)> = current
            .entries
            .iter()
            .map(|e| (e.record.seat_number.clone(), e.rank))
            .collect();
        let explicit_rows: Vec<(String, u32)> = explicit
            .entries
            .iter()
            .map(|e| (e.record.seat_number.clone(), e.rank))
            .collect();
        assert_eq!(current_rows, explicit_rows);
    }

    #[tokio::test]
    async fn current_term_on_empty_cohort_is_not_found() {
        let board = board(vec![student("GS-01", "Avery", 2024, &[(1, 9.0)])]);

        let err = board.current_term_ranking(2025, 1, 10).await.unwrap_err();
        assert!(matches!(err, RankError::NotFound(_)));
    }

    #[tokio::test]
    async fn zero_page_and_zero_page_size_are_rejected() {
        let board = board(vec![]);

        assert!(matches!(
            board.overall_ranking(2024, 0, 10).await.unwrap_err(),
            RankError::Validation(_)
        ));
        assert!(matches!(
            board.overall_ranking(2024, 1, 0).await.unwrap_err(),
            RankError::Validation(_)
        ));
        assert!(matches!(
            board.term_ranking(2024, 0, 1, 10).await.unwrap_err(),
            RankError::Validation(_)
        ));
        assert!(matches!(
            board.overall_ranking(0, 1, 10).await.unwrap_err(),
            RankError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn page_past_the_end_is_empty_with_correct_totals() {
        let board = board(vec![student("GS-01", "Avery", 2024, &[(1, 9.0)])]);

        let page = board.overall_ranking(2024, 3, 10).await.unwrap();
        assert!(page.entries.is_empty());
        assert_eq!(page.total_records, 1);
        assert_eq!(page.total_pages, 1);
    }

    #[tokio::test]
    async fn store_failures_propagate_as_store_errors() {
        let board = Leaderboard::new(FailingStore);

        let err = board.overall_ranking(2024, 1, 10).await.unwrap_err();
        assert!(matches!(err, RankError::Store(_)));
    }

    #[tokio::test]
    async fn aggregates_sort_years_descending_and_terms_ascending() {
        let board = board(vec![
            student("GS-01", "Avery", 2023, &[(2, 9.0), (1, 8.0)]),
            student("GS-02", "Blair", 2024, &[(1, 7.0)]),
        ]);

        assert_eq!(board.available_years().await.unwrap(), vec![2024, 2023]);
        assert_eq!(board.available_terms(2023).await.unwrap(), vec![1, 2]);
    }
}
