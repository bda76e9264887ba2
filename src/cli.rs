use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Debug, Parser)]
#[command(
    name = "subsearch",
    about = "Index and search subtitle corpora by word"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Rebuild the index from a corpus directory (full rebuild)
    Build(BuildArgs),
    /// Search cues containing every word of a phrase
    Search(SearchArgs),
    /// Show one indexed cue and the words it is indexed under
    Get(GetArgs),
    /// Show the current index generation and statistics
    Status(StatusArgs),
    /// Dump the inverted index as JSON
    Export(ExportArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Build --

#[derive(Debug, Parser)]
pub struct BuildArgs {
    /// Corpus root: one folder per show, one `<episode>.srt` per episode
    pub root: PathBuf,

    /// Segmenter used to split cue text into words
    #[arg(long, default_value = subsearch::tokenizer::DEFAULT_SEGMENTER)]
    pub segmenter: String,
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// The search phrase
    pub phrase: String,

    /// Only match cues from this show (repeatable)
    #[arg(short = 's', long = "show")]
    pub shows: Vec<String>,

    /// Never match cues from this show (repeatable)
    #[arg(short = 'x', long = "exclude-show")]
    pub exclude_shows: Vec<String>,

    /// Only match cues from this season (repeatable)
    #[arg(long = "season")]
    pub seasons: Vec<u32>,

    /// Only match cues from this episode number (repeatable)
    #[arg(short = 'e', long = "episode")]
    pub episodes: Vec<u32>,

    /// Reserved; currently has no effect
    #[arg(long)]
    pub exact_match: bool,

    /// Maximum number of results to return
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Number of results to skip
    #[arg(long, default_value = "0")]
    pub offset: usize,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,

    /// Log the query plan before executing it
    #[arg(long)]
    pub explain: bool,
}

// -- Get --

#[derive(Debug, Parser)]
pub struct GetArgs {
    /// Document id, as printed after `#` in search results
    pub id: u64,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Export --

#[derive(Debug, Parser)]
pub struct ExportArgs {
    /// Write to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "subsearch",
            &mut std::io::stdout(),
        );
    }
}
