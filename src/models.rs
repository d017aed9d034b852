use serde::Serialize;

/// One student as the store hands it to the ranking engine. Scores arrive in
/// the order they were recorded; the deriver relies on that order when two
/// entries claim the same term.
#[derive(Debug, Clone, Serialize)]
pub struct StudentRecord {
    pub seat_number: String,
    pub full_name: String,
    pub admission_year: i32,
    pub scores: Vec<TermScore>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TermScore {
    pub term: i32,
    pub score: f64,
}

/// Per-record quantities computed on demand, never stored.
#[derive(Debug, Clone, Copy)]
pub struct DerivedMetrics {
    /// Mean of all scores rounded to two decimals; `None` when no terms exist.
    pub average: Option<f64>,
    pub term_count: usize,
    /// Entry with the maximum term number.
    pub latest: Option<TermScore>,
}

/// A record paired with the key values one ranking variant sorts by.
#[derive(Debug, Clone)]
pub struct ScoredEntry {
    pub record: StudentRecord,
    pub primary: f64,
    pub secondary: f64,
}

/// A standings row. The rank only has meaning within the request that
/// produced it.
#[derive(Debug, Clone, Serialize)]
pub struct RankedEntry {
    pub rank: u32,
    pub score: f64,
    #[serde(flatten)]
    pub record: StudentRecord,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankingPage {
    pub entries: Vec<RankedEntry>,
    pub page: u32,
    pub page_size: u32,
    pub total_records: u64,
    pub total_pages: u64,
    /// Term the ranking was scoped to, when it was. The current-term variant
    /// reports the term it resolved to.
    pub term: Option<i32>,
}

/// Which slice of a cohort a ranking request covers. The filter also decides
/// the metric: overall ranks by cumulative average, term-scoped variants rank
/// by that term's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CohortFilter {
    Overall { year: i32 },
    Term { year: i32, term: i32 },
}

impl CohortFilter {
    pub fn year(&self) -> i32 {
        match self {
            CohortFilter::Overall { year } => *year,
            CohortFilter::Term { year, .. } => *year,
        }
    }
}
