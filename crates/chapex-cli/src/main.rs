mod commands;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "chapex",
    version,
    about = "Extract chapters, figures and captions from PDF textbooks"
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the chapter ranges derived from a document's table of contents
    Toc {
        /// Path to PDF file
        pdf: PathBuf,

        /// List every TOC item with its level, not just top-level chapters
        #[arg(long)]
        all: bool,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Extract chapters into chapter_NN directories
    Extract {
        /// Path to PDF file
        pdf: PathBuf,

        /// Output root directory
        #[arg(long = "out", value_name = "DIR")]
        out: PathBuf,

        /// Domain annotations: default, math, it or biz
        #[arg(short, long)]
        domain: Option<String>,

        /// JSON options file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Extract a single TOC item (1-based, see `toc --all`); repeatable
        #[arg(long = "item", value_name = "N")]
        items: Vec<usize>,

        /// Merge adjacent TOC items into one chapter, e.g. 3-5 or 3,4,5; repeatable
        #[arg(long = "group", value_name = "A-B")]
        groups: Vec<String>,

        /// Explicit 1-based page range, e.g. 12-40 or "12-40:Sorting"; repeatable
        #[arg(long = "range", value_name = "S-E[:TITLE]")]
        ranges: Vec<String>,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Print the generation request for an extracted chapter
    Prompt {
        /// Chapter directory containing chapter.json
        chapter_dir: PathBuf,

        /// explanation (default) or quiz
        #[arg(short, long, default_value = "explanation")]
        kind: String,

        /// Leave figure and table captions out of the prompt
        #[arg(long)]
        no_images: bool,

        /// Keep figures only, dropping tables
        #[arg(long)]
        diagram_only: bool,

        /// Extra instruction appended to the prompt
        #[arg(short, long)]
        instruction: Option<String>,

        /// Number of quiz questions (5-8)
        #[arg(short, long, default_value_t = 6)]
        questions: usize,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Toc { pdf, all, output } => commands::toc::run(&pdf, all, &output),
        Commands::Extract {
            pdf,
            out,
            domain,
            config,
            items,
            groups,
            ranges,
            output,
        } => commands::extract::run(commands::extract::ExtractArgs {
            pdf,
            out,
            domain,
            config,
            items,
            groups,
            ranges,
            output,
        }),
        Commands::Prompt {
            chapter_dir,
            kind,
            no_images,
            diagram_only,
            instruction,
            questions,
        } => commands::prompt::run(
            &chapter_dir,
            &kind,
            !no_images,
            diagram_only,
            instruction,
            questions,
        ),
    };

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}
