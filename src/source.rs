use once_cell::sync::Lazy;
use serde_json::{Map, Value};

use crate::embedded::{Boundary, Locator, extract};
use crate::error::ScrapeError;
use crate::fetch::PageFetcher;
use crate::model::{BookInfo, Chapter, ChapterBody, ChapterMeta, ComicInfo, Info};
use crate::repair::repair_escapes;
use crate::schema::{Alias, SchemaError, map_record, map_records, take_object};
use crate::walker::ChapterWalker;

/// The two kinds of title the site serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Book,
    Comic,
}

impl ContentKind {
    /// Guesses the kind from a title URL (`.../book/...` or `.../comic/...`).
    pub fn detect(url: &str) -> Option<Self> {
        if url.contains("webnovel.com/book") {
            Some(Self::Book)
        } else if url.contains("webnovel.com/comic") {
            Some(Self::Comic)
        } else {
            None
        }
    }

    pub fn profile(self) -> &'static SourceProfile {
        match self {
            Self::Book => &BOOK_PROFILE,
            Self::Comic => &COMIC_PROFILE,
        }
    }
}

/// Everything that differs between book and comic pages.
#[derive(Debug)]
pub struct SourceProfile {
    pub kind: ContentKind,
    pub info_locator: Locator,
    pub info_key: &'static str,
    pub info_aliases: &'static [Alias],
    pub chapter_locator: Locator,
    pub chapter_key: &'static str,
}

const INFO_ANCHOR: &str = r"g_data\.book\s*=\s*";
const CHAPTER_ANCHOR: &str = r"var chapInfo\s*=\s*";

const CHAPTER_ALIASES: &[Alias] = &[Alias {
    field: "chapterIndex",
    alternates: &["index"],
}];

const CONTENT_ALIASES: &[Alias] = &[
    Alias {
        field: "likeAmount",
        alternates: &["likeCount", "likeNums"],
    },
    Alias {
        field: "contentId",
        alternates: &["id"],
    },
];

const PAGE_ALIASES: &[Alias] = &[
    Alias {
        field: "pageId",
        alternates: &["id"],
    },
    Alias {
        field: "url",
        alternates: &["imgUrl"],
    },
];

static BOOK_PROFILE: Lazy<SourceProfile> = Lazy::new(|| SourceProfile {
    kind: ContentKind::Book,
    info_locator: Locator::new(
        "g_data.book",
        INFO_ANCHOR,
        Boundary::Delimited(r"\s*,\s*g_data\."),
    )
    .expect("book info locator"),
    info_key: "bookInfo",
    info_aliases: &[
        Alias {
            field: "bookId",
            alternates: &["id"],
        },
        Alias {
            field: "totalChapterNum",
            alternates: &["chapterNum"],
        },
    ],
    chapter_locator: chapter_locator(),
    chapter_key: "chapterInfo",
});

static COMIC_PROFILE: Lazy<SourceProfile> = Lazy::new(|| SourceProfile {
    kind: ContentKind::Comic,
    info_locator: Locator::new("g_data.book", INFO_ANCHOR, Boundary::Balanced)
        .expect("comic info locator"),
    info_key: "comicInfo",
    info_aliases: &[
        Alias {
            field: "comicId",
            alternates: &["id"],
        },
        Alias {
            field: "chapterNum",
            alternates: &["totalChapterNum"],
        },
        Alias {
            field: "authorName",
            alternates: &["publisher"],
        },
    ],
    chapter_locator: chapter_locator(),
    chapter_key: "chapterInfo",
});

fn chapter_locator() -> Locator {
    Locator::new("chapInfo", CHAPTER_ANCHOR, Boundary::Delimited(";")).expect("chapter locator")
}

impl SourceProfile {
    pub fn parse_info(&self, page: &str, url: &str) -> Result<Info, ScrapeError> {
        let mut root = decode_payload(page, url, &self.info_locator)?;
        let record = match self.kind {
            ContentKind::Book => "book info",
            ContentKind::Comic => "comic info",
        };

        let info = take_object(&mut root, record, self.info_key)
            .and_then(|object| match self.kind {
                ContentKind::Book => map_record::<BookInfo>(object, record, self.info_aliases)
                    .map(Info::Book),
                ContentKind::Comic => map_record::<ComicInfo>(object, record, self.info_aliases)
                    .map(Info::Comic),
            })
            .map_err(|source| schema_error(url, source))?;

        Ok(info.with_derived_cover())
    }

    pub fn parse_chapter(&self, page: &str, url: &str) -> Result<Chapter, ScrapeError> {
        let mut root = decode_payload(page, url, &self.chapter_locator)?;
        take_object(&mut root, "chapter", self.chapter_key)
            .and_then(|object| self.map_chapter(object))
            .map_err(|source| schema_error(url, source))
    }

    fn map_chapter(&self, mut object: Map<String, Value>) -> Result<Chapter, SchemaError> {
        let body = match self.kind {
            ContentKind::Book => ChapterBody::Contents(map_records(
                &mut object,
                "chapter content",
                "contents",
                CONTENT_ALIASES,
            )?),
            ContentKind::Comic => ChapterBody::Pages(map_records(
                &mut object,
                "chapter page",
                "chapterPage",
                PAGE_ALIASES,
            )?),
        };
        let meta: ChapterMeta = map_record(object, "chapter", CHAPTER_ALIASES)?;
        Ok(Chapter { meta, body })
    }
}

fn decode_payload(page: &str, url: &str, locator: &Locator) -> Result<Value, ScrapeError> {
    let payload = extract(page, locator).map_err(|source| ScrapeError::Locate {
        url: url.to_owned(),
        source,
    })?;
    let repaired = repair_escapes(payload);
    serde_json::from_str(&repaired).map_err(|source| ScrapeError::Decode {
        url: url.to_owned(),
        source,
    })
}

fn schema_error(url: &str, source: SchemaError) -> ScrapeError {
    ScrapeError::Schema {
        url: url.to_owned(),
        source,
    }
}

/// One title on the site: its metadata plus access to its chapter chain.
#[derive(Debug)]
pub struct Source<F> {
    profile: &'static SourceProfile,
    base_url: String,
    fetcher: F,
    info: Info,
}

impl<F: PageFetcher> Source<F> {
    /// Fetches the title page and maps its metadata.
    pub fn open(kind: ContentKind, url: &str, fetcher: F) -> Result<Self, ScrapeError> {
        let profile = kind.profile();
        let base_url = url.trim_end_matches('/').to_owned();
        let page = fetcher.fetch_text(&base_url)?;
        let info = profile.parse_info(&page, &base_url)?;
        tracing::info!(name = info.name(), id = info.id(), "fetched info");

        Ok(Self {
            profile,
            base_url,
            fetcher,
            info,
        })
    }

    pub fn kind(&self) -> ContentKind {
        self.profile.kind
    }

    pub fn info(&self) -> &Info {
        &self.info
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn chapter_url(&self, chapter_id: &str) -> String {
        format!("{}/{chapter_id}", self.base_url)
    }

    pub fn fetch_chapter(&self, chapter_id: &str) -> Result<Chapter, ScrapeError> {
        let url = self.chapter_url(chapter_id);
        let page = self.fetcher.fetch_text(&url)?;
        self.profile.parse_chapter(&page, &url)
    }

    /// Lazily walks the chapter chain starting at the first chapter.
    pub fn chapters(&self) -> ChapterWalker<'_, F> {
        ChapterWalker::new(self, self.info.first_chapter_id())
    }
}
