mod site_stub;

use std::fs;
use std::io::Read as _;
use std::path::Path;

use predicates::prelude::*;
use site_stub::{
    SiteStub, book_info_page, comic_info_page, html, image_chapter_page, png, text_chapter_page,
};
use webnovel_dl::fetch::{FetchOptions, HttpFetcher};
use webnovel_dl::model::Info;
use webnovel_dl::source::{ContentKind, Source};

fn zip_entry_names(path: &Path) -> anyhow::Result<Vec<String>> {
    let archive = zip::ZipArchive::new(fs::File::open(path)?)?;
    Ok(archive.file_names().map(str::to_owned).collect())
}

fn zip_entry_text(path: &Path, name: &str) -> anyhow::Result<String> {
    let mut archive = zip::ZipArchive::new(fs::File::open(path)?)?;
    let mut text = String::new();
    archive.by_name(name)?.read_to_string(&mut text)?;
    Ok(text)
}

#[test]
fn two_page_site_yields_exactly_one_chapter() -> anyhow::Result<()> {
    let site = SiteStub::spawn();
    site.route("/book/two_3", html(book_info_page("3", "Two Pages", "c1")));
    site.route("/book/two_3/c1", html(text_chapter_page("c1", 1, "-1", 1)));

    let fetcher = HttpFetcher::new(&FetchOptions::default())?;
    let source = Source::open(ContentKind::Book, &site.url("/book/two_3"), fetcher)?;

    let Info::Book(book) = source.info() else {
        anyhow::bail!("expected book info");
    };
    assert_eq!(book.book_name, "Two Pages");
    assert_eq!(book.author_name, "Ann 'A' Lee");
    assert_eq!(book.total_chapter_num, 2);
    assert_eq!(book.description.as_deref(), Some("First line secondline"));
    assert_eq!(book.cover, "https://book-pic.webnovel.com/bookcover/3");

    let chapters = source.chapters().collect::<Result<Vec<_>, _>>()?;
    assert_eq!(chapters.len(), 1);
    assert_eq!(chapters[0].id(), "c1");
    assert_eq!(chapters[0].name(), "Chapter 1: Start");
    assert_eq!(chapters[0].content_blocks()[0].content, "It was a 'dark' night &amp; cold.");
    assert_eq!(chapters[0].content_blocks()[0].like_amount, 2);
    Ok(())
}

#[test]
fn download_book_writes_epub_up_to_locked_chapter() -> anyhow::Result<()> {
    let site = SiteStub::spawn();
    site.route("/book/tale_1", html(book_info_page("1", "A Tale: Of Two", "c1")));
    site.route("/book/tale_1/c1", html(text_chapter_page("c1", 1, "c2", 1)));
    site.route("/book/tale_1/c2", html(text_chapter_page("c2", 2, "c3", 1)));
    site.route("/book/tale_1/c3", html(text_chapter_page("c3", 3, "-1", 0)));

    let temp = tempfile::TempDir::new()?;
    let out_dir = temp.path().join("out");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("webnovel-dl");
    cmd.args([
        "download",
        &site.url("/book/tale_1"),
        "--kind",
        "book",
        "--no-cover",
        "--out",
        out_dir.to_str().unwrap(),
    ])
    .assert()
    .success();

    let epub_path = out_dir.join("A_Tale_Of_Two.epub");
    assert!(epub_path.exists(), "expected {}", epub_path.display());

    let names = zip_entry_names(&epub_path)?;
    assert!(names.contains(&"OEBPS/chap_1.xhtml".to_owned()));
    assert!(names.contains(&"OEBPS/chap_2.xhtml".to_owned()));
    assert!(!names.contains(&"OEBPS/chap_3.xhtml".to_owned()));

    let chapter = zip_entry_text(&epub_path, "OEBPS/chap_2.xhtml")?;
    assert!(chapter.contains("<h1>Chapter 2: Start</h1>"));
    assert!(chapter.contains("<p>Then morning came.</p>"));
    assert!(chapter.contains("<p>It was a 'dark' night &amp; cold.</p>"));

    let opf = zip_entry_text(&epub_path, "OEBPS/content.opf")?;
    assert!(opf.contains("<dc:title>A Tale: Of Two</dc:title>"));
    assert!(opf.contains("<dc:creator>Ann &apos;A&apos; Lee</dc:creator>"));
    Ok(())
}

#[test]
fn max_chapters_stops_the_walk() -> anyhow::Result<()> {
    let site = SiteStub::spawn();
    site.route("/book/tale_1", html(book_info_page("1", "Short", "c1")));
    site.route("/book/tale_1/c1", html(text_chapter_page("c1", 1, "c2", 1)));
    site.route("/book/tale_1/c2", html(text_chapter_page("c2", 2, "-1", 1)));

    let temp = tempfile::TempDir::new()?;

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("webnovel-dl");
    cmd.args([
        "download",
        &site.url("/book/tale_1"),
        "--kind",
        "book",
        "--no-cover",
        "--max-chapters",
        "1",
        "--out",
        temp.path().to_str().unwrap(),
    ])
    .assert()
    .success();

    let names = zip_entry_names(&temp.path().join("Short.epub"))?;
    assert!(names.contains(&"OEBPS/chap_1.xhtml".to_owned()));
    assert!(!names.contains(&"OEBPS/chap_2.xhtml".to_owned()));
    Ok(())
}

#[test]
fn broken_chapter_keeps_partial_epub_and_fails() -> anyhow::Result<()> {
    let site = SiteStub::spawn();
    site.route("/book/broken_2", html(book_info_page("2", "Broken", "b1")));
    site.route("/book/broken_2/b1", html(text_chapter_page("b1", 1, "b2", 1)));
    site.route(
        "/book/broken_2/b2",
        html("<html><body>maintenance</body></html>".to_owned()),
    );

    let temp = tempfile::TempDir::new()?;

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("webnovel-dl");
    cmd.args([
        "download",
        &site.url("/book/broken_2"),
        "--kind",
        "book",
        "--no-cover",
        "--out",
        temp.path().to_str().unwrap(),
    ])
    .assert()
    .failure()
    .stderr(predicate::str::contains("partial output kept"))
    .stderr(predicate::str::contains("/book/broken_2/b2"))
    .stderr(predicate::str::contains("chapInfo"));

    let names = zip_entry_names(&temp.path().join("Broken.epub"))?;
    assert!(names.contains(&"OEBPS/chap_1.xhtml".to_owned()));
    Ok(())
}

#[test]
fn download_comic_writes_one_pdf_page_per_image() -> anyhow::Result<()> {
    let site = SiteStub::spawn();
    site.route("/comic/sky_9", html(comic_info_page("9", "Sky High", "e1")));
    site.route(
        "/comic/sky_9/e1",
        html(image_chapter_page(
            "e1",
            "-1",
            &[site.url("/img/p1.png"), site.url("/img/p2.png")],
        )),
    );
    site.route("/img/p1.png", png());
    site.route("/img/p2.png", png());

    let temp = tempfile::TempDir::new()?;

    // The derived cover points at the real image host; skip it here.
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("webnovel-dl");
    cmd.args([
        "download",
        &site.url("/comic/sky_9"),
        "--kind",
        "comic",
        "--no-cover",
        "--out",
        temp.path().to_str().unwrap(),
    ])
    .assert()
    .success();

    let bytes = fs::read(temp.path().join("Sky_High.pdf"))?;
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.starts_with("%PDF-"));
    assert!(text.contains("/Count 2"));
    assert!(text.contains("/MediaBox [0 0 1 1]"));
    Ok(())
}

#[test]
fn existing_output_is_not_overwritten_without_force() -> anyhow::Result<()> {
    let site = SiteStub::spawn();
    site.route("/book/tale_1", html(book_info_page("1", "Again", "c1")));
    site.route("/book/tale_1/c1", html(text_chapter_page("c1", 1, "c2", 1)));
    site.route("/book/tale_1/c2", html(text_chapter_page("c2", 2, "-1", 1)));

    let temp = tempfile::TempDir::new()?;
    fs::write(temp.path().join("Again.epub"), b"keep me")?;

    let args = |force: bool| {
        let mut args = vec![
            "download".to_owned(),
            site.url("/book/tale_1"),
            "--kind".to_owned(),
            "book".to_owned(),
            "--no-cover".to_owned(),
            "--out".to_owned(),
            temp.path().to_string_lossy().to_string(),
        ];
        if force {
            args.push("--force".to_owned());
        }
        args
    };

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("webnovel-dl");
    cmd.args(args(false))
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
    assert_eq!(fs::read(temp.path().join("Again.epub"))?, b"keep me");
    assert_eq!(site.requested_paths(), ["/book/tale_1"]);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("webnovel-dl");
    cmd.args(args(true)).assert().success();
    let names = zip_entry_names(&temp.path().join("Again.epub"))?;
    assert!(names.contains(&"OEBPS/nav.xhtml".to_owned()));
    assert!(names.contains(&"OEBPS/chap_2.xhtml".to_owned()));
    Ok(())
}

#[test]
fn info_prints_mapped_metadata() -> anyhow::Result<()> {
    let site = SiteStub::spawn();
    site.route("/comic/sky_9", html(comic_info_page("9", "Sky High", "-1")));

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("webnovel-dl");
    let output = cmd
        .args(["info", &site.url("/comic/sky_9"), "--kind", "comic"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: serde_json::Value = serde_json::from_slice(&output)?;
    assert_eq!(value["kind"], "comic");
    assert_eq!(value["comicName"], "Sky High");
    assert_eq!(value["chapterNum"], 1);
    assert_eq!(value["cover"], "https://book-pic.webnovel.com/bookcover/9");
    Ok(())
}
