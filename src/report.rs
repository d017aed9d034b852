use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::RankingPage;

pub fn build_report(
    year: i32,
    generated_on: NaiveDate,
    terms: &[i32],
    overall: &RankingPage,
    current: Option<&RankingPage>,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Cohort Standings Report");
    let _ = writeln!(
        output,
        "Admission year {} (generated {})",
        year, generated_on
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Students by Cumulative Average");

    if overall.entries.is_empty() {
        let _ = writeln!(output, "No rankable students in this cohort.");
    } else {
        for entry in overall.entries.iter() {
            let _ = writeln!(
                output,
                "- #{} {} ({}) average {:.2}",
                entry.rank, entry.record.full_name, entry.record.seat_number, entry.score
            );
        }
        let _ = writeln!(
            output,
            "{} ranked students across {} pages.",
            overall.total_records, overall.total_pages
        );
    }

    let _ = writeln!(output);
    match current {
        Some(page) => {
            let term_label = page
                .term
                .map(|term| format!("Term {term}"))
                .unwrap_or_else(|| "Current Term".to_string());
            let _ = writeln!(output, "## Current Term Standings ({term_label})");
            if page.entries.is_empty() {
                let _ = writeln!(output, "No students have reported this term yet.");
            } else {
                for entry in page.entries.iter() {
                    let _ = writeln!(
                        output,
                        "- #{} {} ({}) score {:.2}",
                        entry.rank, entry.record.full_name, entry.record.seat_number, entry.score
                    );
                }
            }
        }
        None => {
            let _ = writeln!(output, "## Current Term Standings");
            let _ = writeln!(output, "No term scores recorded for this cohort.");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Terms on Record");

    if terms.is_empty() {
        let _ = writeln!(output, "No terms recorded.");
    } else {
        let labels: Vec<String> = terms.iter().map(|term| term.to_string()).collect();
        let _ = writeln!(output, "Terms {}.", labels.join(", "));
    }

    output
}
