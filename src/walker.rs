use std::collections::HashSet;
use std::iter::FusedIterator;

use crate::error::ScrapeError;
use crate::fetch::PageFetcher;
use crate::model::{Chapter, is_chain_end};
use crate::source::Source;

#[derive(Debug, Clone, PartialEq, Eq)]
enum WalkState {
    AwaitingChapter(String),
    Terminated,
}

/// Pull-based cursor over a title's chapter chain.
///
/// Each call to `next` fetches at most one chapter page. The walk ends at a
/// sentinel id (`""` or `"-1"`), at the first chapter with `isAuth == 0`
/// (which is not yielded), or after yielding the first error. Once ended it
/// never fetches again.
#[derive(Debug)]
pub struct ChapterWalker<'a, F> {
    source: &'a Source<F>,
    state: WalkState,
    visited: HashSet<String>,
}

impl<'a, F: PageFetcher> ChapterWalker<'a, F> {
    pub fn new(source: &'a Source<F>, first_chapter_id: &str) -> Self {
        Self {
            source,
            state: WalkState::AwaitingChapter(first_chapter_id.to_owned()),
            visited: HashSet::new(),
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.state == WalkState::Terminated
    }

    fn step(&mut self, chapter_id: String) -> Option<Result<Chapter, ScrapeError>> {
        if is_chain_end(&chapter_id) {
            tracing::debug!(%chapter_id, "chapter chain ended");
            return None;
        }
        if !self.visited.insert(chapter_id.clone()) {
            return Some(Err(ScrapeError::CycleDetected { chapter_id }));
        }

        let chapter = match self.source.fetch_chapter(&chapter_id) {
            Ok(chapter) => chapter,
            Err(err) => return Some(Err(err)),
        };
        if !chapter.is_authorized() {
            tracing::info!(
                %chapter_id,
                name = chapter.name(),
                "chapter is not accessible; stopping"
            );
            return None;
        }

        self.state = WalkState::AwaitingChapter(chapter.next_id().to_owned());
        Some(Ok(chapter))
    }
}

impl<F: PageFetcher> Iterator for ChapterWalker<'_, F> {
    type Item = Result<Chapter, ScrapeError>;

    fn next(&mut self) -> Option<Self::Item> {
        let WalkState::AwaitingChapter(chapter_id) =
            std::mem::replace(&mut self.state, WalkState::Terminated)
        else {
            return None;
        };
        // `step` only moves back to `AwaitingChapter` when it yields a chapter.
        self.step(chapter_id)
    }
}

impl<F: PageFetcher> FusedIterator for ChapterWalker<'_, F> {}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::*;
    use crate::error::ErrorKind;
    use crate::source::ContentKind;

    const BASE: &str = "https://www.webnovel.com/book/tale_1";

    /// Serves canned pages and records every URL it was asked for.
    #[derive(Default)]
    struct MemoryFetcher {
        pages: HashMap<String, String>,
        requested: RefCell<Vec<String>>,
    }

    impl MemoryFetcher {
        fn with_book(first_chapter_id: &str) -> Self {
            let mut fetcher = Self::default();
            fetcher.pages.insert(
                BASE.to_owned(),
                format!(
                    r#"<script>g_data.book = {{"bookInfo":{{"bookId":"1","bookName":"Tale","authorName":"Ann","totalChapterNum":3,"firstChapterId":"{first_chapter_id}"}}}}, g_data.x = 1;</script>"#
                ),
            );
            fetcher
        }

        fn chapter(mut self, id: &str, next: &str, is_auth: i64) -> Self {
            self.pages.insert(
                format!("{BASE}/{id}"),
                format!(
                    r#"<script>var chapInfo = {{"chapterInfo":{{"chapterId":"{id}","chapterName":"Chapter {id}","chapterIndex":{id},"nextChapterId":"{next}","isAuth":{is_auth},"contents":[{{"content":"text {id}"}}]}}}};</script>"#
                ),
            );
            self
        }

        fn chapter_requests(&self) -> Vec<String> {
            self.requested
                .borrow()
                .iter()
                .filter(|url| url.as_str() != BASE)
                .cloned()
                .collect()
        }
    }

    impl PageFetcher for MemoryFetcher {
        fn fetch_text(&self, url: &str) -> Result<String, ScrapeError> {
            self.requested.borrow_mut().push(url.to_owned());
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| ScrapeError::HttpStatus {
                    url: url.to_owned(),
                    status: 404,
                })
        }

        fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, ScrapeError> {
            self.fetch_text(url).map(String::into_bytes)
        }
    }

    fn ids(chapters: &[Chapter]) -> Vec<&str> {
        chapters.iter().map(Chapter::id).collect()
    }

    #[test]
    fn walks_until_sentinel() -> anyhow::Result<()> {
        let fetcher = MemoryFetcher::with_book("1")
            .chapter("1", "2", 1)
            .chapter("2", "3", 1)
            .chapter("3", "-1", 1);
        let source = Source::open(ContentKind::Book, BASE, &fetcher)?;

        let chapters = source.chapters().collect::<Result<Vec<_>, _>>()?;
        assert_eq!(ids(&chapters), ["1", "2", "3"]);
        assert_eq!(fetcher.chapter_requests().len(), 3);
        Ok(())
    }

    #[test]
    fn stops_before_first_unauthorized_chapter() -> anyhow::Result<()> {
        let fetcher = MemoryFetcher::with_book("1")
            .chapter("1", "2", 1)
            .chapter("2", "3", 1)
            .chapter("3", "4", 0)
            .chapter("4", "-1", 1);
        let source = Source::open(ContentKind::Book, BASE, &fetcher)?;

        let mut walker = source.chapters();
        let chapters = walker.by_ref().collect::<Result<Vec<_>, _>>()?;
        assert_eq!(ids(&chapters), ["1", "2"]);
        assert!(walker.is_terminated());
        assert!(walker.next().is_none());
        assert!(
            !fetcher
                .chapter_requests()
                .contains(&format!("{BASE}/4"))
        );
        Ok(())
    }

    #[test]
    fn sentinel_first_chapter_yields_nothing() -> anyhow::Result<()> {
        for first in ["-1", ""] {
            let fetcher = MemoryFetcher::with_book(first);
            let source = Source::open(ContentKind::Book, BASE, &fetcher)?;
            assert_eq!(source.chapters().count(), 0);
            assert!(fetcher.chapter_requests().is_empty());
        }
        Ok(())
    }

    #[test]
    fn stopping_early_fetches_nothing_more() -> anyhow::Result<()> {
        let fetcher = MemoryFetcher::with_book("1")
            .chapter("1", "2", 1)
            .chapter("2", "-1", 1);
        let source = Source::open(ContentKind::Book, BASE, &fetcher)?;

        let first = source.chapters().next().transpose()?;
        assert_eq!(first.as_ref().map(Chapter::id), Some("1"));
        assert_eq!(fetcher.chapter_requests(), [format!("{BASE}/1")]);
        Ok(())
    }

    #[test]
    fn error_ends_the_walk() -> anyhow::Result<()> {
        let fetcher = MemoryFetcher::with_book("1").chapter("1", "missing", 1);
        let source = Source::open(ContentKind::Book, BASE, &fetcher)?;

        let mut walker = source.chapters();
        assert!(walker.next().transpose()?.is_some());
        let err = walker.next().and_then(Result::err);
        assert_eq!(err.map(|e| e.kind()), Some(ErrorKind::Transport));
        assert!(walker.next().is_none());
        assert_eq!(fetcher.chapter_requests().len(), 2);
        Ok(())
    }

    #[test]
    fn cycle_is_detected() -> anyhow::Result<()> {
        let fetcher = MemoryFetcher::with_book("1")
            .chapter("1", "2", 1)
            .chapter("2", "1", 1);
        let source = Source::open(ContentKind::Book, BASE, &fetcher)?;

        let results = source.chapters().collect::<Vec<_>>();
        assert_eq!(results.len(), 3);
        let err = results
            .into_iter()
            .last()
            .and_then(Result::err)
            .map(|e| e.kind());
        assert_eq!(err, Some(ErrorKind::CycleDetected));
        assert_eq!(fetcher.chapter_requests().len(), 2);
        Ok(())
    }
}
