use clap::{ArgGroup, Parser};
use log::error;
use rubricsheet::app::{self, GradebookSource, RunRequest};
use rubricsheet::config::Config;
use std::path::PathBuf;
use std::process::ExitCode;

/// Format gradebook rubric scores into per-student spreadsheet tabs
#[derive(Parser, Debug)]
#[command(version, about)]
#[command(group(ArgGroup::new("source").required(true).args(["csv", "course"])))]
struct Cli {
    /// Gradebook CSV export on disk
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Course ID to export from the LMS (needs CANVAS_BASE_URL and CANVAS_TOKEN)
    #[arg(long)]
    course: Option<String>,

    /// Link to, or ID of, the template spreadsheet
    #[arg(long, required_unless_present = "dry_run")]
    template: Option<String>,

    /// Name of the spreadsheet created from the template
    #[arg(long, default_value = "Student Rubrics")]
    name: String,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also write the extracted records to this CSV file
    #[arg(long)]
    dump: Option<PathBuf>,

    /// Only extract (and dump); make no spreadsheet calls
    #[arg(long)]
    dry_run: bool,

    /// Override the template tab name
    #[arg(long)]
    template_tab: Option<String>,

    /// Override the number of tabs duplicated at once
    #[arg(long)]
    batch_size: Option<usize>,
}

#[tokio::main]
async fn main() -> ExitCode {
    rubricsheet::config::load_env();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> rubricsheet::Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(tab) = cli.template_tab {
        config.template_tab = tab;
    }
    if let Some(n) = cli.batch_size {
        config.duplicate_batch_size = n;
    }

    let source = match (cli.csv, cli.course) {
        (Some(path), _) => GradebookSource::File(path),
        (None, Some(course)) => GradebookSource::Course(course),
        (None, None) => {
            return Err(rubricsheet::Error::MalformedInput(
                "give --csv or --course".to_string(),
            ));
        }
    };
    let dump = match (cli.dump, cli.dry_run) {
        (Some(path), _) => Some(path),
        (None, true) => Some(rubricsheet::downloader::default_dump_path()),
        (None, false) => None,
    };

    let request = RunRequest {
        source,
        template: cli.template,
        copy_name: cli.name,
        dump,
        dry_run: cli.dry_run,
        google_token: None,
    };

    let report = app::run(&config, &request).await?;
    println!(
        "{} students, {} standards",
        report.extraction.records.len(),
        report.extraction.standards.len()
    );
    if let Some(outcome) = report.formatted {
        if !outcome.unresolved.is_empty() {
            println!(
                "{} standards had no label in the template: {}",
                outcome.unresolved.len(),
                outcome.unresolved.join(", ")
            );
        }
        println!("{}", outcome.url);
    }
    Ok(())
}
