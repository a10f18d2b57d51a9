use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use student_performance_dashboard::aggregator::Aggregator;
use student_performance_dashboard::models::QueryResult;
use student_performance_dashboard::report;
use student_performance_dashboard::store::RecordTable;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "student-dashboard")]
#[command(about = "Answer plain-language questions about student exam results", long_about = None)]
struct Cli {
    /// CSV file with Roll No, Name, subject scores, Total and Average
    #[arg(long, global = true, env = "STUDENT_MARKS_PATH", default_value = "student_marks.csv")]
    data: PathBuf,
    /// Only include students whose total is at least this value
    #[arg(long, global = true, default_value_t = 0)]
    min_total: u32,
    #[arg(long, global = true, value_enum, default_value_t = Format::Markdown)]
    format: Format,
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Markdown,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a single question, e.g. "show top 5 students"
    Ask {
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// Read one question per line from stdin until EOF or "exit"
    Chat,
    /// Marks distribution, subject correlation and pass vs fail counts
    Extras,
    /// Write a markdown report with the summary, top students and failures
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let table = load_table(&cli.data, cli.min_total)?;
    let aggregator = Aggregator::new(Rc::new(table));

    match cli.command {
        Commands::Ask { query } => {
            let result = aggregator.answer(&query.join(" "));
            print_result(&result, cli.format)?;
        }
        Commands::Chat => chat(&aggregator, cli.format)?,
        Commands::Extras => print_result(&aggregator.extras(), cli.format)?,
        Commands::Report { out } => {
            let source = cli.data.display().to_string();
            let report =
                report::build_report(&aggregator, &source, chrono::Local::now().date_naive());
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write report to {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_table(path: &Path, min_total: u32) -> anyhow::Result<RecordTable> {
    let table = RecordTable::load(path)
        .with_context(|| format!("failed to load student data from {}", path.display()))?;
    Ok(table.with_min_total(min_total))
}

fn chat(aggregator: &Aggregator, format: Format) -> anyhow::Result<()> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    print_result(&aggregator.answer(""), format)?;
    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let query = line.trim();
        if matches!(query, "exit" | "quit") {
            break;
        }
        print_result(&aggregator.answer(query), format)?;
    }

    Ok(())
}

fn print_result(result: &QueryResult, format: Format) -> anyhow::Result<()> {
    match format {
        Format::Markdown => print!("{}", report::render_markdown(result)),
        Format::Json => println!("{}", serde_json::to_string_pretty(result)?),
    }
    Ok(())
}
