use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "photosync", version, about = "Copy a photo library into a YYYY/MM-Month/DD-Weekday tree, skipping files already present")]
struct Cli {
    /// Photo library to copy from
    source: PathBuf,

    /// Existing directory to build the date tree in
    destination: PathBuf,

    /// Do not descend into symlinked directories
    #[arg(long)]
    no_follow_links: bool,

    /// Give up on a file after this many `_N` renames
    #[arg(long, default_value_t = photosync_core::DEFAULT_MAX_RENAME_ATTEMPTS)]
    max_rename_attempts: u32,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// Increase verbosity (-v=INFO, -vv=DEBUG, -vvv=TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);
    let t_total = std::time::Instant::now();

    let options = photosync_core::SyncOptions {
        source: cli.source,
        destination: cli.destination,
        follow_symlinks: !cli.no_follow_links,
        max_rename_attempts: cli.max_rename_attempts,
    };

    let stats = photosync_core::sync(&options)?;
    let elapsed_ms = t_total.elapsed().as_millis() as u64;

    if cli.json {
        let summary = serde_json::json!({
            "stats": stats,
            "elapsed_ms": elapsed_ms,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{} files checked.", stats.files_visited);
        println!("{} files copied.", stats.files_copied);
        println!("Finished sync in: {}ms", elapsed_ms);
    }

    Ok(())
}
