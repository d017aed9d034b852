use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;

mod db;
mod error;
mod leaderboard;
mod metrics;
mod models;
mod ranking;
mod report;
mod store;

use error::RankError;
use leaderboard::Leaderboard;
use models::RankingPage;

#[derive(Parser)]
#[command(name = "cohort-standings")]
#[command(about = "Tie-aware cohort standings for Group Scholar", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import term scores from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Rank a cohort by cumulative average
    Overall {
        #[arg(long)]
        year: i32,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 25)]
        page_size: u32,
        #[arg(long)]
        json: bool,
    },
    /// Rank a cohort by one term's score
    Term {
        #[arg(long)]
        year: i32,
        #[arg(long)]
        term: i32,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 25)]
        page_size: u32,
        #[arg(long)]
        json: bool,
    },
    /// Rank a cohort by its most recent term
    Current {
        #[arg(long)]
        year: i32,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 25)]
        page_size: u32,
        #[arg(long)]
        json: bool,
    },
    /// List admission years present in the store
    Years,
    /// List terms with recorded scores for a cohort
    Terms {
        #[arg(long)]
        year: i32,
    },
    /// Generate a markdown standings report
    Report {
        #[arg(long)]
        year: i32,
        #[arg(long, default_value = "standings.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} term scores from {}.", csv.display());
        }
        Commands::Overall {
            year,
            page,
            page_size,
            json,
        } => {
            let board = Leaderboard::new(db::PgStore::new(pool));
            let standings = board.overall_ranking(year, page, page_size).await?;
            print_page(
                &standings,
                &format!("Cumulative standings for admission year {year}"),
                json,
            )?;
        }
        Commands::Term {
            year,
            term,
            page,
            page_size,
            json,
        } => {
            let board = Leaderboard::new(db::PgStore::new(pool));
            let standings = board.term_ranking(year, term, page, page_size).await?;
            print_page(
                &standings,
                &format!("Term {term} standings for admission year {year}"),
                json,
            )?;
        }
        Commands::Current {
            year,
            page,
            page_size,
            json,
        } => {
            let board = Leaderboard::new(db::PgStore::new(pool));
            let standings = board.current_term_ranking(year, page, page_size).await?;
            let term_label = standings
                .term
                .map(|term| format!("term {term}"))
                .unwrap_or_else(|| "current term".to_string());
            print_page(
                &standings,
                &format!("Standings for admission year {year}, {term_label}"),
                json,
            )?;
        }
        Commands::Years => {
            let board = Leaderboard::new(db::PgStore::new(pool));
            let years = board.available_years().await?;
            if years.is_empty() {
                println!("No admission years recorded.");
            } else {
                for year in years {
                    println!("{year}");
                }
            }
        }
        Commands::Terms { year } => {
            let board = Leaderboard::new(db::PgStore::new(pool));
            let terms = board.available_terms(year).await?;
            if terms.is_empty() {
                println!("No terms recorded for admission year {year}.");
            } else {
                for term in terms {
                    println!("{term}");
                }
            }
        }
        Commands::Report { year, out } => {
            let board = Leaderboard::new(db::PgStore::new(pool));
            let overall = board.overall_ranking(year, 1, 10).await?;
            let terms = board.available_terms(year).await?;
            let current = match board.current_term_ranking(year, 1, 10).await {
                Ok(page) => Some(page),
                Err(RankError::NotFound(_)) => None,
                Err(err) => return Err(err.into()),
            };
            let report = report::build_report(
                year,
                chrono::Utc::now().date_naive(),
                &terms,
                &overall,
                current.as_ref(),
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

fn print_page(page: &RankingPage, heading: &str, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(page)?);
        return Ok(());
    }

    println!(
        "{heading} (page {} of {}, {} ranked students):",
        page.page, page.total_pages, page.total_records
    );

    if page.entries.is_empty() {
        println!("No rankable students on this page.");
        return Ok(());
    }

    for entry in page.entries.iter() {
        println!(
            "- #{} {} ({}) score {:.2}",
            entry.rank, entry.record.full_name, entry.record.seat_number, entry.score
        );
    }

    Ok(())
}
