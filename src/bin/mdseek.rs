use anyhow::Result;
use clap::Parser;
use mdseek::Finder;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
struct Cli {
    /// Query in the search grammar, e.g. `size>10kb | blockcodelang:python`.
    query: String,
    /// Directory to search.
    #[clap(default_value = ".")]
    dir: String,
    #[clap(short, long, default_value = "false")]
    /// Match case-sensitively; phrase and regex literals are kept verbatim.
    case_sensitive: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();
    let finder = Finder::new();
    info!("file scanning starts.");
    for record in finder.find(&cli.query, &cli.dir, cli.case_sensitive)? {
        println!("{}", record?.path);
    }
    info!("file scanning completes.");
    Ok(())
}
