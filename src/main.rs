//! trenbase - training plan knowledge base
//!
//! Import a plan spreadsheet, then search trainings from the command line.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};

use trenbase::classify::IntensityLevel;
use trenbase::search::filters::IntensityFilter;
use trenbase::{Database, KnowledgeBase, SearchFilters, SearchIndex, parse_rows, sheet};

const DEFAULT_DB_PATH: &str = "trenbase.db";

#[derive(Parser)]
#[command(name = "trenbase")]
#[command(author, version, about = "Training plan knowledge base and workout search")]
struct Cli {
    /// SQLite database with imported snapshots
    #[arg(long, global = true, env = "TRENBASE_DB", default_value = DEFAULT_DB_PATH)]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Source {
    /// Read a JSON export instead of the latest stored snapshot
    #[arg(long)]
    kb: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a plan spreadsheet (.xlsx/.xls/.ods or a .json grid)
    Import {
        file: PathBuf,

        /// Also write the knowledge base as JSON
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Do not store a snapshot in the database
        #[arg(long)]
        no_save: bool,
    },

    /// Find trainings
    Search {
        /// Exercise the training must contain (repeatable)
        #[arg(short, long)]
        include: Vec<String>,

        /// Exercise the training must not contain (repeatable)
        #[arg(short, long)]
        exclude: Vec<String>,

        /// Percent range, e.g. "60-70" or "80"
        #[arg(long, value_parser = parse_percent_range)]
        intensity: Option<(u32, u32)>,

        /// high, medium, low or rest
        #[arg(long, conflicts_with = "intensity")]
        level: Option<IntensityLevel>,

        /// AMRAP, rounds, timed, every_x_min
        #[arg(long)]
        set_type: Option<String>,

        /// Print the full response as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        source: Source,
    },

    /// List exercise names, optionally filtered
    Exercises {
        query: Option<String>,

        #[command(flatten)]
        source: Source,
    },

    /// Show knowledge base statistics
    Stats {
        #[command(flatten)]
        source: Source,
    },

    /// List stored snapshots
    Snapshots {
        /// Number of records to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
}

fn parse_percent_range(s: &str) -> Result<(u32, u32), String> {
    let s = s.trim().trim_end_matches('%');
    let parse = |v: &str| {
        v.trim()
            .parse::<u32>()
            .map_err(|_| format!("invalid percent: {v}"))
    };
    let (min, max) = match s.split_once('-') {
        Some((min, max)) => (parse(min)?, parse(max)?),
        None => {
            let v = parse(s)?;
            (v, v)
        }
    };
    if min > max {
        return Err(format!("range {min}-{max} is reversed"));
    }
    Ok((min, max))
}

fn load_kb(db_path: &str, source: &Source) -> Result<KnowledgeBase> {
    if let Some(path) = &source.kb {
        let json = fs::read_to_string(path)
            .with_context(|| format!("read knowledge base {}", path.display()))?;
        return KnowledgeBase::from_json(&json)
            .with_context(|| format!("parse knowledge base {}", path.display()));
    }

    let db = Database::open(db_path).with_context(|| format!("open database {db_path}"))?;
    db.latest_snapshot()?
        .context("no snapshots stored, run `trenbase import <file>` first")
}

fn import(db_path: &str, file: &Path, out: Option<&Path>, no_save: bool) -> Result<()> {
    let rows = sheet::load_rows(file).with_context(|| format!("load {}", file.display()))?;
    if rows.len() < 2 {
        bail!("{} has no data rows", file.display());
    }

    let kb = parse_rows(&rows);
    print_stats(&kb);

    if let Some(out) = out {
        fs::write(out, kb.to_json()?).with_context(|| format!("write {}", out.display()))?;
        println!("JSON: {}", out.display());
    }

    if !no_save {
        let db = Database::open(db_path).with_context(|| format!("open database {db_path}"))?;
        let id = db.save_snapshot(&kb)?;
        println!("Snapshot saved (id: {id}, db: {db_path})");
    }
    Ok(())
}

fn print_stats(kb: &KnowledgeBase) {
    let meta = kb.metadata();
    let stats = kb.statistics();

    println!("Knowledge base");
    println!("{:-<40}", "");
    println!("Period:     {}", meta.date_range);
    println!("Weeks:      {}", stats.total_weeks);
    println!("Trainings:  {}", stats.total_trainings);
    println!("Blocks:     {}", stats.total_blocks);
    println!("Exercises:  {} ({} unique)", stats.total_exercises, stats.unique_exercises);

    if !stats.block_types.is_empty() {
        println!();
        println!("Set types:");
        for (set_type, count) in &stats.block_types {
            println!("  {set_type:20} {count}");
        }
    }

    if !stats.top_exercises.is_empty() {
        println!();
        println!("Top exercises:");
        for ex in &stats.top_exercises {
            println!("  {:30} {}", ex.name, ex.count);
        }
    }
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Logs go to stderr so --json output stays clean
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Import { file, out, no_save } => {
            import(&cli.db, &file, out.as_deref(), no_save)?;
        }

        Commands::Search {
            include,
            exclude,
            intensity,
            level,
            set_type,
            json,
            source,
        } => {
            let kb = load_kb(&cli.db, &source)?;
            let intensity = match (intensity, level) {
                (Some((min, max)), _) => Some(IntensityFilter::range(min, max)),
                (None, Some(level)) => Some(IntensityFilter::level(level)),
                (None, None) => None,
            };
            let filters = SearchFilters {
                include,
                exclude,
                intensity,
                set_type,
            };
            let response = SearchIndex::new(&kb).search(&filters);

            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
                return Ok(());
            }

            println!(
                "Found {} trainings ({:.1} ms)",
                response.total_results, response.search_time_ms
            );
            println!("{:-<80}", "");
            for r in &response.results {
                let number = r
                    .training_number
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "W{:<2} {:12} | #{:2} | {:8} | {} | {}",
                    r.week_number,
                    r.week_date_range,
                    number,
                    r.intensity,
                    r.summary,
                    r.preview_text
                );
                if !r.matched_exercises.is_empty() {
                    println!("     matched: {}", r.matched_exercises.join(", "));
                }
            }
        }

        Commands::Exercises { query, source } => {
            let kb = load_kb(&cli.db, &source)?;
            let names = SearchIndex::new(&kb).search_exercises(query.as_deref().unwrap_or(""));
            for name in &names {
                println!("{name}");
            }
            println!("{:-<40}", "");
            println!("{} exercises", names.len());
        }

        Commands::Stats { source } => {
            let kb = load_kb(&cli.db, &source)?;
            print_stats(&kb);
        }

        Commands::Snapshots { limit } => {
            let db = Database::open(&cli.db).with_context(|| format!("open database {}", cli.db))?;
            let snapshots = db.list_snapshots(limit)?;
            println!("Stored snapshots:");
            println!("{:-<70}", "");
            for s in &snapshots {
                println!(
                    "{:4} | {} | {:2} weeks | {:3} trainings | {:4} exercises | {}",
                    s.id,
                    s.saved_at.format("%Y-%m-%d %H:%M"),
                    s.weeks,
                    s.trainings,
                    s.exercises,
                    s.date_range
                );
            }
        }
    }

    Ok(())
}
