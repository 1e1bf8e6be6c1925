use serde::{Deserialize, Serialize};

use crate::schema::lenient;

/// Covers are never read from the payload; they live at a fixed path keyed by id.
pub const COVER_URL_BASE: &str = "https://book-pic.webnovel.com/bookcover";

pub fn cover_url(id: &str) -> String {
    format!("{COVER_URL_BASE}/{id}")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookInfo {
    #[serde(deserialize_with = "lenient::id")]
    pub book_id: String,
    pub book_name: String,
    pub author_name: String,
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub author_id: Option<String>,
    #[serde(deserialize_with = "lenient::int")]
    pub total_chapter_num: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub first_chapter_id: Option<String>,
    #[serde(default)]
    pub first_chapter_name: Option<String>,
    #[serde(skip_deserializing)]
    pub cover: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComicInfo {
    #[serde(deserialize_with = "lenient::id")]
    pub comic_id: String,
    pub comic_name: String,
    pub author_name: String,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(deserialize_with = "lenient::int")]
    pub chapter_num: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub first_chapter_id: Option<String>,
    #[serde(default)]
    pub first_chapter_name: Option<String>,
    #[serde(skip_deserializing)]
    pub cover: String,
}

/// Root metadata of one title.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Info {
    Book(BookInfo),
    Comic(ComicInfo),
}

impl Info {
    /// Sets the derived cover URL; runs after every payload field is mapped.
    pub(crate) fn with_derived_cover(mut self) -> Self {
        match &mut self {
            Self::Book(book) => book.cover = cover_url(&book.book_id),
            Self::Comic(comic) => comic.cover = cover_url(&comic.comic_id),
        }
        self
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Book(book) => &book.book_id,
            Self::Comic(comic) => &comic.comic_id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Book(book) => &book.book_name,
            Self::Comic(comic) => &comic.comic_name,
        }
    }

    pub fn cover(&self) -> &str {
        match self {
            Self::Book(book) => &book.cover,
            Self::Comic(comic) => &comic.cover,
        }
    }

    pub fn author_name(&self) -> &str {
        match self {
            Self::Book(book) => &book.author_name,
            Self::Comic(comic) => &comic.author_name,
        }
    }

    pub fn total_item_count(&self) -> i64 {
        match self {
            Self::Book(book) => book.total_chapter_num,
            Self::Comic(comic) => comic.chapter_num,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Book(book) => book.description.as_deref(),
            Self::Comic(comic) => comic.description.as_deref(),
        }
    }

    /// Empty when the payload names no first chapter.
    pub fn first_chapter_id(&self) -> &str {
        let id = match self {
            Self::Book(book) => book.first_chapter_id.as_deref(),
            Self::Comic(comic) => comic.first_chapter_id.as_deref(),
        };
        id.unwrap_or_default()
    }
}

/// Fields shared by text and image chapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterMeta {
    #[serde(deserialize_with = "lenient::id")]
    pub chapter_id: String,
    pub chapter_name: String,
    #[serde(deserialize_with = "lenient::int")]
    pub chapter_index: i64,
    #[serde(default, deserialize_with = "lenient::id_or_empty")]
    pub pre_chapter_id: String,
    #[serde(default)]
    pub pre_chapter_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::id_or_empty")]
    pub next_chapter_id: String,
    #[serde(default)]
    pub next_chapter_name: Option<String>,
    #[serde(deserialize_with = "lenient::int")]
    pub is_auth: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBlock {
    #[serde(default, deserialize_with = "lenient::id_or_empty")]
    pub content_id: String,
    pub content: String,
    #[serde(default, deserialize_with = "lenient::id_or_empty")]
    pub paragraph_id: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub like_amount: i64,
    #[serde(default)]
    pub user_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageImage {
    #[serde(deserialize_with = "lenient::id")]
    pub page_id: String,
    pub url: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub width: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub height: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ChapterBody {
    Contents(Vec<ContentBlock>),
    Pages(Vec<PageImage>),
}

/// One chapter page, text or images.
#[derive(Debug, Clone, Serialize)]
pub struct Chapter {
    #[serde(flatten)]
    pub meta: ChapterMeta,
    #[serde(flatten)]
    pub body: ChapterBody,
}

impl Chapter {
    pub fn id(&self) -> &str {
        &self.meta.chapter_id
    }

    pub fn name(&self) -> &str {
        &self.meta.chapter_name
    }

    pub fn index(&self) -> i64 {
        self.meta.chapter_index
    }

    pub fn next_id(&self) -> &str {
        &self.meta.next_chapter_id
    }

    /// `isAuth == 0` marks a withheld (locked) chapter.
    pub fn is_authorized(&self) -> bool {
        self.meta.is_auth != 0
    }

    pub fn content_blocks(&self) -> &[ContentBlock] {
        match &self.body {
            ChapterBody::Contents(blocks) => blocks,
            ChapterBody::Pages(_) => &[],
        }
    }

    pub fn page_images(&self) -> &[PageImage] {
        match &self.body {
            ChapterBody::Pages(pages) => pages,
            ChapterBody::Contents(_) => &[],
        }
    }
}

/// Whether a chapter pointer means "no further chapter".
pub fn is_chain_end(chapter_id: &str) -> bool {
    chapter_id.is_empty() || chapter_id == "-1"
}
