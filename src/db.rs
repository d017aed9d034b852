use std::collections::HashMap;

use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{CohortFilter, StudentRecord, TermScore};
use crate::store::CohortStore;

/// Postgres-backed record store. Matching and ordering happen in SQL with the
/// same composite key and inclusion predicate the engine uses, so a LIMIT
/// returns the head of the globally sorted sequence.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn scores_for(&self, ids: &[Uuid]) -> Result<Vec<sqlx::postgres::PgRow>, StoreError> {
        let rows = sqlx::query(
            "SELECT student_id, term, score \
             FROM cohort_standings.term_scores \
             WHERE student_id = ANY($1) \
             ORDER BY recorded_at ASC, id ASC",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

impl CohortStore for PgStore {
    async fn fetch_matching(
        &self,
        filter: &CohortFilter,
        offset: Option<u32>,
        limit: Option<u32>,
    ) -> Result<Vec<StudentRecord>, StoreError> {
        let (mut query, mut next_bind) = match filter {
            CohortFilter::Overall { .. } => (
                String::from(
                    "SELECT s.id, s.seat_number, s.full_name, s.admission_year \
                     FROM cohort_standings.students s \
                     JOIN cohort_standings.term_scores t ON t.student_id = s.id \
                     WHERE s.admission_year = $1 \
                     GROUP BY s.id, s.seat_number, s.full_name, s.admission_year \
                     HAVING ROUND(AVG(t.score)::numeric, 2) <> 0 \
                     ORDER BY ROUND(AVG(t.score)::numeric, 2) DESC, \
                     (ARRAY_AGG(t.score ORDER BY t.term DESC, t.recorded_at DESC))[1] DESC, \
                     s.full_name ASC",
                ),
                2,
            ),
            CohortFilter::Term { .. } => (
                String::from(
                    "SELECT s.id, s.seat_number, s.full_name, s.admission_year \
                     FROM cohort_standings.students s \
                     JOIN cohort_standings.term_scores tn \
                     ON tn.student_id = s.id AND tn.term = $2 \
                     WHERE s.admission_year = $1 \
                     ORDER BY tn.score DESC, \
                     (SELECT ROUND(AVG(t2.score)::numeric, 2) \
                      FROM cohort_standings.term_scores t2 \
                      WHERE t2.student_id = s.id) DESC, \
                     s.full_name ASC",
                ),
                3,
            ),
        };

        if limit.is_some() {
            query.push_str(&format!(" LIMIT ${next_bind}"));
            next_bind += 1;
        }
        if offset.is_some() {
            query.push_str(&format!(" OFFSET ${next_bind}"));
        }

        let mut rows = sqlx::query(&query).bind(filter.year());
        if let CohortFilter::Term { term, .. } = filter {
            rows = rows.bind(term);
        }
        if let Some(value) = limit {
            rows = rows.bind(i64::from(value));
        }
        if let Some(value) = offset {
            rows = rows.bind(i64::from(value));
        }

        let students = rows.fetch_all(&self.pool).await?;
        if students.is_empty() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::with_capacity(students.len());
        let mut positions: HashMap<Uuid, usize> = HashMap::with_capacity(students.len());
        let mut records = Vec::with_capacity(students.len());

        for (position, row) in students.iter().enumerate() {
            let id: Uuid = row.get("id");
            ids.push(id);
            positions.insert(id, position);
            records.push(StudentRecord {
                seat_number: row.get("seat_number"),
                full_name: row.get("full_name"),
                admission_year: row.get("admission_year"),
                scores: Vec::new(),
            });
        }

        for row in self.scores_for(&ids).await? {
            let student_id: Uuid = row.get("student_id");
            if let Some(&position) = positions.get(&student_id) {
                records[position].scores.push(TermScore {
                    term: row.get("term"),
                    score: row.get("score"),
                });
            }
        }

        Ok(records)
    }

    async fn count_matching(&self, filter: &CohortFilter) -> Result<u64, StoreError> {
        let row = match filter {
            CohortFilter::Overall { year } => {
                sqlx::query(
                    "SELECT COUNT(*) AS total FROM ( \
                     SELECT s.id \
                     FROM cohort_standings.students s \
                     JOIN cohort_standings.term_scores t ON t.student_id = s.id \
                     WHERE s.admission_year = $1 \
                     GROUP BY s.id \
                     HAVING ROUND(AVG(t.score)::numeric, 2) <> 0 \
                     ) matched",
                )
                .bind(year)
                .fetch_one(&self.pool)
                .await?
            }
            CohortFilter::Term { year, term } => {
                sqlx::query(
                    "SELECT COUNT(*) AS total \
                     FROM cohort_standings.students s \
                     JOIN cohort_standings.term_scores t \
                     ON t.student_id = s.id AND t.term = $2 \
                     WHERE s.admission_year = $1",
                )
                .bind(year)
                .bind(term)
                .fetch_one(&self.pool)
                .await?
            }
        };

        let total: i64 = row.get("total");
        Ok(total.max(0) as u64)
    }

    async fn max_term(&self, year: i32) -> Result<Option<i32>, StoreError> {
        let row = sqlx::query(
            "SELECT MAX(t.term) AS max_term \
             FROM cohort_standings.students s \
             JOIN cohort_standings.term_scores t ON t.student_id = s.id \
             WHERE s.admission_year = $1",
        )
        .bind(year)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("max_term"))
    }

    async fn distinct_years(&self) -> Result<Vec<i32>, StoreError> {
        let rows = sqlx::query(
            "SELECT DISTINCT admission_year \
             FROM cohort_standings.students \
             ORDER BY admission_year DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get("admission_year")).collect())
    }

    async fn distinct_terms(&self, year: i32) -> Result<Vec<i32>, StoreError> {
        let rows = sqlx::query(
            "SELECT DISTINCT t.term \
             FROM cohort_standings.students s \
             JOIN cohort_standings.term_scores t ON t.student_id = s.id \
             WHERE s.admission_year = $1 \
             ORDER BY t.term ASC",
        )
        .bind(year)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get("term")).collect())
    }
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let students = vec![
        ("GS-2023-001", "Avery Lee", 2023),
        ("GS-2023-002", "Jules Moreno", 2023),
        ("GS-2023-003", "Kiara Patel", 2023),
        ("GS-2023-004", "Noor Haddad", 2023),
        ("GS-2024-001", "Sage Okafor", 2024),
        ("GS-2024-002", "Rowan Castillo", 2024),
    ];

    for (seat_number, full_name, admission_year) in students {
        sqlx::query(
            r#"
            INSERT INTO cohort_standings.students (id, seat_number, full_name, admission_year)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (seat_number) DO UPDATE
            SET full_name = EXCLUDED.full_name, admission_year = EXCLUDED.admission_year
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(seat_number)
        .bind(full_name)
        .bind(admission_year)
        .execute(pool)
        .await?;
    }

    let scores = vec![
        ("GS-2023-001", 1, 8.75),
        ("GS-2023-001", 2, 9.25),
        ("GS-2023-002", 1, 8.75),
        ("GS-2023-002", 2, 9.25),
        ("GS-2023-003", 1, 8.50),
        ("GS-2023-003", 2, 8.50),
        ("GS-2023-004", 1, 7.00),
        ("GS-2024-001", 1, 9.10),
        ("GS-2024-002", 1, 8.40),
    ];

    for (seat_number, term, score) in scores {
        let student_id: Uuid =
            sqlx::query("SELECT id FROM cohort_standings.students WHERE seat_number = $1")
                .bind(seat_number)
                .fetch_one(pool)
                .await?
                .get("id");

        sqlx::query(
            r#"
            INSERT INTO cohort_standings.term_scores (id, student_id, term, score)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (student_id, term) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(term)
        .bind(score)
        .execute(pool)
        .await?;
    }

    Ok(())
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        seat_number: String,
        full_name: String,
        admission_year: i32,
        term: i32,
        score: f64,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let student_id: Uuid = sqlx::query(
            r#"
            INSERT INTO cohort_standings.students
            (id, seat_number, full_name, admission_year)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (seat_number) DO UPDATE
            SET full_name = EXCLUDED.full_name, admission_year = EXCLUDED.admission_year
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.seat_number)
        .bind(&row.full_name)
        .bind(row.admission_year)
        .fetch_one(pool)
        .await?
        .get("id");

        let result = sqlx::query(
            r#"
            INSERT INTO cohort_standings.term_scores (id, student_id, term, score)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (student_id, term) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(row.term)
        .bind(row.score)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}
