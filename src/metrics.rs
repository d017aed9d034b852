use crate::models::{DerivedMetrics, StudentRecord};

/// Round to two decimal places. All metric values pass through here before
/// any comparison, so equal logical values compare bit-equal downstream.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Compute the derived quantities for one record. Quantities that cannot be
/// computed come back as `None`; an empty term list is routine filtering, not
/// a fault.
pub fn derive(record: &StudentRecord) -> DerivedMetrics {
    let term_count = record.scores.len();

    let average = if term_count == 0 {
        None
    } else {
        let total: f64 = record.scores.iter().map(|entry| entry.score).sum();
        Some(round2(total / term_count as f64))
    };

    // max_by_key keeps the last maximal element, so a duplicated maximum term
    // resolves to the most recently recorded entry. Stable per record because
    // the store returns scores in recorded order.
    let latest = record.scores.iter().copied().max_by_key(|entry| entry.term);

    DerivedMetrics {
        average,
        term_count,
        latest,
    }
}

/// Score recorded for a specific term, `None` when the record has no entry
/// for it. A duplicated term resolves to the most recently recorded entry,
/// matching the latest-term rule.
pub fn score_for_term(record: &StudentRecord, term: i32) -> Option<f64> {
    record
        .scores
        .iter()
        .rev()
        .find(|entry| entry.term == term)
        .map(|entry| entry.score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TermScore;

    fn record_with(scores: Vec<TermScore>) -> StudentRecord {
        StudentRecord {
            seat_number: "GS-2024-001".to_string(),
            full_name: "Avery Lee".to_string(),
            admission_year: 2024,
            scores,
        }
    }

    #[test]
    fn average_rounds_to_two_decimals() {
        let record = record_with(vec![
            TermScore { term: 1, score: 8.0 },
            TermScore { term: 2, score: 9.0 },
            TermScore { term: 3, score: 9.5 },
        ]);

        let derived = derive(&record);
        assert_eq!(derived.average, Some(8.83));
        assert_eq!(derived.term_count, 3);
    }

    #[test]
    fn empty_record_has_no_average_or_latest() {
        let derived = derive(&record_with(vec![]));
        assert_eq!(derived.average, None);
        assert_eq!(derived.term_count, 0);
        assert!(derived.latest.is_none());
    }

    #[test]
    fn latest_picks_maximum_term_regardless_of_order() {
        let record = record_with(vec![
            TermScore { term: 3, score: 7.5 },
            TermScore { term: 1, score: 9.0 },
            TermScore { term: 2, score: 8.0 },
        ]);

        let latest = derive(&record).latest.unwrap();
        assert_eq!(latest.term, 3);
        assert_eq!(latest.score, 7.5);
    }

    #[test]
    fn duplicated_maximum_term_resolves_to_most_recent_entry() {
        let record = record_with(vec![
            TermScore { term: 2, score: 6.0 },
            TermScore { term: 2, score: 8.5 },
        ]);

        let latest = derive(&record).latest.unwrap();
        assert_eq!(latest.score, 8.5);
        assert_eq!(score_for_term(&record, 2), Some(8.5));
    }

    #[test]
    fn score_for_missing_term_is_none() {
        let record = record_with(vec![TermScore { term: 1, score: 9.0 }]);
        assert_eq!(score_for_term(&record, 2), None);
    }
}
