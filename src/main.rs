use std::io::Write;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command};
use subsearch::{
    DataDir,
    IndexDb,
    TextTokenizer,
    builder,
    error,
    export,
    index_db::{GenerationInfo, IndexSource},
    query::SearchFilters,
    search::{self, SearchParams},
};

const NOT_BUILT: &str =
    "No index built yet. Run `subsearch build <root>` first.";

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("SUBSEARCH_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let result = run(cli.command, &data_dir);
    if let Err(e) = &result
        && e.is_storage()
    {
        tracing::error!(
            index = %data_dir.index_db().display(),
            "the index is unreadable or held by a running build; \
             wait for it or rerun `subsearch build <root>`"
        );
    }
    result
}

fn run(command: Command, data_dir: &DataDir) -> error::Result<()> {
    // Only builds take the index exclusively.
    if let Command::Build(args) = &command {
        let index = data_dir.open_index_for_build()?;
        return cmd_build(&index, args);
    }

    let index = data_dir.open_index_for_reading()?;
    match command {
        Command::Search(args) => cmd_search(index.as_ref(), &args),
        Command::Get(args) => cmd_get(index.as_ref(), &args),
        Command::Status(args) => {
            cmd_status(index.as_ref(), data_dir, args.json)
        }
        Command::Export(args) => cmd_export(index.as_ref(), &args),
        Command::Build(_) | Command::Completions(_) => Ok(()),
    }
}

fn cmd_build(index: &IndexDb, args: &cli::BuildArgs) -> error::Result<()> {
    let tokenizer = TextTokenizer::by_name(&args.segmenter)?;
    let built = builder::build_index(&args.root, &tokenizer)?;

    let source = IndexSource {
        corpus_root: &built.corpus_root,
        segmenter: &built.segmenter,
    };
    let info = index.rebuild(&built.documents, &built.postings, source)?;

    let report = &built.report;
    println!(
        "Indexed {} cue(s) from {} file(s) into generation {}",
        report.cues_indexed, report.files_processed, info.generation
    );
    if report.files_skipped > 0 {
        println!("Skipped {} file(s)", report.files_skipped);
    }
    if report.malformed_blocks > 0 {
        println!("Skipped {} malformed block(s)", report.malformed_blocks);
    }
    println!(
        "{} distinct word(s), {} posting(s)",
        info.words, info.postings
    );
    Ok(())
}

fn cmd_search(
    index: Option<&IndexDb>,
    args: &cli::SearchArgs,
) -> error::Result<()> {
    let Some((index, generation)) = with_generation(index)? else {
        eprintln!("{NOT_BUILT}");
        return Ok(());
    };
    // Queries must be segmented the way the index was.
    let tokenizer = TextTokenizer::by_name(&generation.segmenter)?;

    let params = SearchParams {
        phrase: args.phrase.clone(),
        filters: SearchFilters {
            include_shows: args.shows.clone(),
            exclude_shows: args.exclude_shows.clone(),
            seasons: args.seasons.clone(),
            episodes: args.episodes.clone(),
        },
        exact_match: args.exact_match,
        offset: args.offset,
        limit: args.limit,
    };

    if args.explain {
        let plan = search::plan_search(&params, &tokenizer)?;
        tracing::info!(%plan, window = ?plan.window(), "query plan");
    }

    let outcome = search::execute_search(&params, &tokenizer, index)?;

    if args.json {
        println!("{}", search::format_json(&outcome, &args.phrase)?);
    } else {
        print!("{}", search::format_human(&outcome, &tokenizer)?);
    }
    Ok(())
}

fn cmd_get(index: Option<&IndexDb>, args: &cli::GetArgs) -> error::Result<()> {
    let Some(index) = index else {
        eprintln!("{NOT_BUILT}");
        return Ok(());
    };
    let doc = index.get_document(args.id)?.ok_or_else(|| {
        error::Error::NotFound {
            kind: "document",
            name: format!("#{}", args.id),
        }
    })?;
    let words = index.document_words(args.id)?;

    if args.json {
        let value = serde_json::json!({
            "document": doc,
            "words": words,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!(
        "{} S{:02}E{:02} {} --> {} #{}",
        doc.show, doc.season, doc.episode, doc.start, doc.end, doc.id
    );
    for line in doc.text.lines() {
        println!("    {line}");
    }
    println!("Words: {}", words.join(" "));
    Ok(())
}

fn cmd_status(
    index: Option<&IndexDb>,
    data_dir: &DataDir,
    json: bool,
) -> error::Result<()> {
    let generation = with_generation(index)?.map(|(_, info)| info);

    if json {
        let status = serde_json::json!({
            "data_dir": data_dir.root().display().to_string(),
            "index": generation,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Data directory: {}", data_dir.root().display());
    let Some(info) = generation else {
        println!("Index: not built");
        return Ok(());
    };
    println!("Generation: {}", info.generation);
    println!("Corpus: {}", info.corpus_root);
    println!("Segmenter: {}", info.segmenter);
    println!("Built at: {} (unix seconds)", info.built_at);
    println!("Documents: {}", info.documents);
    println!("Words: {}", info.words);
    println!("Postings: {}", info.postings);
    Ok(())
}

fn cmd_export(
    index: Option<&IndexDb>,
    args: &cli::ExportArgs,
) -> error::Result<()> {
    let Some(index) = index else {
        eprintln!("{NOT_BUILT}");
        return Ok(());
    };
    match &args.output {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            let mut out = std::io::BufWriter::new(file);
            let words = export::write_json(index, &mut out)?;
            out.flush()?;
            eprintln!("Exported {words} word(s) to {}", path.display());
        }
        None => {
            let stdout = std::io::stdout();
            export::write_json(index, stdout.lock())?;
        }
    }
    Ok(())
}

/// The index together with its committed generation, if both exist.
fn with_generation(
    index: Option<&IndexDb>,
) -> error::Result<Option<(&IndexDb, GenerationInfo)>> {
    let Some(index) = index else {
        return Ok(None);
    };
    Ok(index.generation()?.map(|info| (index, info)))
}
