use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;

use crate::cli::{DownloadArgs, FetchArgs, InfoArgs};
use crate::epub::{CoverImage, EpubBook, EpubOptions};
use crate::fetch::{FetchOptions, HttpFetcher, PageFetcher};
use crate::model::Chapter;
use crate::pdf::PdfDocument;
use crate::source::{ContentKind, Source};

/// Characters that are not allowed in file names on common platforms.
const INVALID_FILE_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// The EPUB on disk is rewritten after this many new chapters.
pub const DEFAULT_CHECKPOINT_CHAPTERS: usize = 10;

#[derive(Debug, Clone)]
pub struct SaveOptions {
    pub out_dir: PathBuf,
    pub force: bool,
    pub lang: String,
    pub max_chapters: Option<usize>,
    pub with_cover: bool,
    /// Rewrite the EPUB every N chapters so an interrupted run keeps its progress.
    pub checkpoint_chapters: usize,
}

pub fn run(args: DownloadArgs) -> anyhow::Result<()> {
    let kind = resolve_kind(&args.fetch.url, args.fetch.kind.map(ContentKind::from))?;
    let fetcher = build_fetcher(&args.fetch)?;
    let source = Source::open(kind, &args.fetch.url, fetcher).context("fetch title info")?;

    let options = SaveOptions {
        out_dir: PathBuf::from(&args.out),
        force: args.force,
        lang: args.lang,
        max_chapters: args.max_chapters,
        with_cover: !args.no_cover,
        checkpoint_chapters: DEFAULT_CHECKPOINT_CHAPTERS,
    };
    let path = match kind {
        ContentKind::Book => save_book(&source, &options)?,
        ContentKind::Comic => save_comic(&source, &options)?,
    };

    tracing::info!(path = %path.display(), "saved");
    Ok(())
}

pub fn info(args: InfoArgs) -> anyhow::Result<()> {
    let kind = resolve_kind(&args.fetch.url, args.fetch.kind.map(ContentKind::from))?;
    let fetcher = build_fetcher(&args.fetch)?;
    let source = Source::open(kind, &args.fetch.url, fetcher).context("fetch title info")?;

    let json = serde_json::to_string_pretty(source.info()).context("serialize info")?;
    println!("{json}");
    Ok(())
}

/// Writes every reachable chapter of a text title into one EPUB.
pub fn save_book<F: PageFetcher>(
    source: &Source<F>,
    options: &SaveOptions,
) -> anyhow::Result<PathBuf> {
    let info = source.info();
    let path = options
        .out_dir
        .join(sanitize_file_name(&format!("{}.epub", info.name())));
    if path.exists() && !options.force {
        anyhow::bail!("epub output already exists: {}", path.display());
    }

    let cover = options
        .with_cover
        .then(|| fetch_cover(source))
        .flatten()
        .and_then(CoverImage::from_bytes);
    let mut book = EpubBook::new(info, cover);
    let epub_options = EpubOptions {
        force: true,
        lang: options.lang.clone(),
    };

    let walked = walk_chapters(source, options.max_chapters, |chapter| {
        book.push_chapter(chapter);
        if options.checkpoint_chapters > 0
            && book.chapter_count() % options.checkpoint_chapters == 0
        {
            tracing::debug!(chapters = book.chapter_count(), "epub checkpoint");
            write_epub(&book, &path, &epub_options)?;
        }
        Ok(())
    });

    write_epub(&book, &path, &epub_options)?;
    finish_walk(walked, book.chapter_count(), &path)
}

/// Writes next to `path` first so a killed run never leaves a torn EPUB.
fn write_epub(book: &EpubBook, path: &Path, options: &EpubOptions) -> anyhow::Result<()> {
    let part = path.with_extension("epub.part");
    book.write(&part, options)
        .with_context(|| format!("write epub: {}", path.display()))?;
    std::fs::rename(&part, path)
        .with_context(|| format!("move epub into place: {}", path.display()))
}

/// Writes the cover and every page image of every reachable chapter into one PDF.
pub fn save_comic<F: PageFetcher>(
    source: &Source<F>,
    options: &SaveOptions,
) -> anyhow::Result<PathBuf> {
    let info = source.info();
    let path = options
        .out_dir
        .join(sanitize_file_name(&format!("{}.pdf", info.name())));

    let mut doc = PdfDocument::create(&path, options.force)?;
    if options.with_cover
        && let Some(bytes) = fetch_cover(source)
        && let Err(err) = doc.add_image_page(&bytes)
    {
        tracing::warn!(?err, "cover image is unusable; skipping");
    }

    let mut chapters = 0_usize;
    let walked = walk_chapters(source, options.max_chapters, |chapter| {
        for page in chapter.page_images() {
            let bytes = source.fetcher().fetch_bytes(&page.url)?;
            doc.add_image_page(&bytes)
                .with_context(|| format!("add page {} of chapter {}", page.page_id, chapter.id()))?;
        }
        chapters += 1;
        Ok(())
    });

    doc.finish()
        .with_context(|| format!("write pdf: {}", path.display()))?;

    finish_walk(walked, chapters, &path)
}

/// Feeds chapters to `on_chapter` in chain order until the walk ends, the
/// limit is reached, or something fails.
fn walk_chapters<F: PageFetcher>(
    source: &Source<F>,
    max_chapters: Option<usize>,
    mut on_chapter: impl FnMut(&Chapter) -> anyhow::Result<()>,
) -> anyhow::Result<()> {
    let limit = max_chapters.unwrap_or(usize::MAX);
    for chapter in source.chapters().take(limit) {
        let chapter = chapter?;
        tracing::info!(
            index = chapter.index(),
            name = chapter.name(),
            "fetched chapter"
        );
        on_chapter(&chapter)?;
    }
    Ok(())
}

fn finish_walk(walked: anyhow::Result<()>, chapters: usize, path: &Path) -> anyhow::Result<PathBuf> {
    match walked {
        Ok(()) => {
            tracing::info!(chapters, "chapter walk complete");
            Ok(path.to_path_buf())
        }
        Err(err) => {
            tracing::warn!(
                chapters,
                path = %path.display(),
                "chapter walk failed; saved chapters fetched so far"
            );
            Err(err.context(format!("partial output kept at {}", path.display())))
        }
    }
}

fn fetch_cover<F: PageFetcher>(source: &Source<F>) -> Option<Vec<u8>> {
    let url = source.info().cover();
    match source.fetcher().fetch_bytes(url) {
        Ok(bytes) => Some(bytes),
        Err(err) => {
            tracing::warn!(%url, ?err, "cover download failed; skipping");
            None
        }
    }
}

fn resolve_kind(url: &str, kind: Option<ContentKind>) -> anyhow::Result<ContentKind> {
    if let Some(kind) = kind {
        return Ok(kind);
    }
    ContentKind::detect(url).ok_or_else(|| {
        anyhow::anyhow!("cannot tell book from comic for {url}; pass a webnovel book/comic url or --kind")
    })
}

fn build_fetcher(args: &FetchArgs) -> anyhow::Result<HttpFetcher> {
    let parsed = url::Url::parse(&args.url).context("parse title url")?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        anyhow::bail!("title url must be http/https: {parsed}");
    }

    let cookie_header = match args.cookies.as_deref() {
        Some(path) => crate::cookies::load_cookie_header(Path::new(path))?,
        None => None,
    };
    let options = FetchOptions {
        timeout: Duration::from_secs(args.timeout_secs),
        cookie_header,
        ..FetchOptions::default()
    };
    HttpFetcher::new(&options)
}

/// Drops characters that are illegal in file names and turns spaces into `_`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .filter(|c| !INVALID_FILE_NAME_CHARS.contains(c))
        .map(|c| if c == ' ' { '_' } else { c })
        .collect()
}
