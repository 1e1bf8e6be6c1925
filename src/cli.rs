use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::source::ContentKind;

#[derive(Debug, Parser)]
#[command(author, version, about = "Download webnovel books as EPUB and comics as PDF")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Walk the chapter chain and write the title to one file.
    Download(DownloadArgs),
    /// Print the title's metadata as JSON.
    Info(InfoArgs),
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Title URL (`https://www.webnovel.com/book/...` or `.../comic/...`).
    pub url: String,

    /// JSON file with auth cookies (object of name/value or browser export array).
    #[arg(short, long)]
    pub cookies: Option<String>,

    /// Content kind; detected from the URL when omitted.
    #[arg(long, value_enum)]
    pub kind: Option<KindArg>,

    /// Per-request timeout.
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,
}

#[derive(Debug, Args)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub fetch: FetchArgs,

    /// Output directory for the EPUB/PDF file.
    #[arg(short, long, default_value = ".")]
    pub out: String,

    /// Overwrite an existing output file.
    #[arg(long, default_value_t = false)]
    pub force: bool,

    /// Language tag written to EPUB metadata.
    #[arg(long, default_value = "en")]
    pub lang: String,

    /// Stop after this many chapters.
    #[arg(long)]
    pub max_chapters: Option<usize>,

    /// Skip downloading the cover image.
    #[arg(long, default_value_t = false)]
    pub no_cover: bool,
}

#[derive(Debug, Args)]
pub struct InfoArgs {
    #[command(flatten)]
    pub fetch: FetchArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Book,
    Comic,
}

impl From<KindArg> for ContentKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Book => Self::Book,
            KindArg::Comic => Self::Comic,
        }
    }
}
