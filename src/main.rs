//! `edison` command line: analyze a photo, pick an idea, stream the tutorial.

use clap::Parser;
use edison_lib::config::{self, Config};
use edison_lib::{
    analyze_image, run_tutorial_stream, AnalysisResult, BackendClient, Error, ImageUpload, Result,
    StreamOutcome, Workspace,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Exit status for a tutorial stopped with Ctrl-C.
const EXIT_CANCELLED: u8 = 130;

#[derive(Parser, Debug)]
#[command(version, about = "Turn a photo of electronic components into a project tutorial")]
struct Cli {
    /// Photo of your components (PNG, JPEG, WebP, ...).
    #[arg(value_name = "IMAGE")]
    image: PathBuf,

    /// Project idea to build, by name. Must be one of the suggested ideas.
    #[arg(long, conflicts_with = "pick")]
    idea: Option<String>,

    /// Project idea to build, by its number in the printed list.
    #[arg(long, value_name = "N")]
    pick: Option<usize>,

    /// Only print components and ideas; do not request a tutorial.
    #[arg(long, default_value_t = false)]
    list: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Before the logger: .env may set RUST_LOG.
    let env_file = config::load_env_files(Path::new("."));
    env_logger::init();
    match env_file {
        Ok(Some(path)) => log::info!("[CONFIG] Loaded {}", path.display()),
        Ok(None) => {}
        Err(e) => log::warn!("[CONFIG] Failed to load env file: {}", e),
    }

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("edison: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let backend = BackendClient::new(Config::load()?)?;
    let mut workspace = Workspace::new();
    workspace.set_file(ImageUpload::from_path(&cli.image)?);

    let analysis = analyze_image(&mut workspace, &backend).await?;
    print_analysis(analysis);
    if cli.list {
        return Ok(ExitCode::SUCCESS);
    }
    if analysis.ideas.is_empty() {
        eprintln!("edison: the backend suggested no project ideas for this image");
        return Ok(ExitCode::FAILURE);
    }

    match (cli.idea.as_deref(), cli.pick) {
        (Some(idea), _) => workspace.select_idea(idea)?,
        (None, Some(n)) => {
            let index = n.checked_sub(1).ok_or_else(|| Error::UnknownIdea("#0".to_string()))?;
            workspace.select_idea_at(index)?
        }
        (None, None) => workspace.select_idea_at(0)?,
    }

    let ticket = workspace.begin_stream()?;
    println!("\n== {} ==\n", ticket.idea);

    let handle = ticket.cancel_handle();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.cancel();
        }
    });

    let mut stdout = std::io::stdout();
    let outcome = run_tutorial_stream(&mut workspace, &backend, ticket, |chunk, _| {
        // A closed stdout is not worth aborting the stream over.
        let _ = write!(stdout, "{}", chunk.text());
        let _ = stdout.flush();
    })
    .await;
    ctrl_c.abort();
    println!();

    match outcome {
        StreamOutcome::Completed { .. } => Ok(ExitCode::SUCCESS),
        StreamOutcome::Cancelled => {
            eprintln!("edison: stopped");
            Ok(ExitCode::from(EXIT_CANCELLED))
        }
        StreamOutcome::Failed(e) => Err(e),
    }
}

fn print_analysis(analysis: &AnalysisResult) {
    println!("Components:");
    if analysis.components.is_empty() {
        println!("  (none detected)");
    }
    for component in &analysis.components {
        println!("  - {}", component);
    }

    println!("Project ideas:");
    if analysis.ideas.is_empty() {
        println!("  (none)");
    }
    for (i, idea) in analysis.ideas.iter().enumerate() {
        println!("  {}. {}", i + 1, idea);
    }
}
