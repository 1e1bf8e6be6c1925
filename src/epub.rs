use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::Path;

use anyhow::Context as _;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use zip::write::SimpleFileOptions;

use crate::model::{Chapter, Info};

#[derive(Debug, Clone)]
pub struct EpubOptions {
    pub force: bool,
    /// BCP-47 language tag used for EPUB metadata and XHTML documents.
    pub lang: String,
}

impl Default for EpubOptions {
    fn default() -> Self {
        Self {
            force: false,
            lang: "en".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoverImage {
    pub bytes: Vec<u8>,
    pub media_type: &'static str,
    pub extension: &'static str,
}

impl CoverImage {
    /// Sniffs the image format; `None` for bytes that are not a known image.
    pub fn from_bytes(bytes: Vec<u8>) -> Option<Self> {
        let format = image::guess_format(&bytes).ok()?;
        let extension = format.extensions_str().first().copied()?;
        Some(Self {
            media_type: format.to_mime_type(),
            extension,
            bytes,
        })
    }
}

#[derive(Debug, Clone)]
struct ChapterDoc {
    stem: String,
    title: String,
    body_html: String,
}

/// A text title being assembled chapter by chapter.
#[derive(Debug, Clone)]
pub struct EpubBook {
    id: String,
    title: String,
    author: String,
    description: Option<String>,
    cover: Option<CoverImage>,
    chapters: Vec<ChapterDoc>,
    stems: HashSet<String>,
}

impl EpubBook {
    pub fn new(info: &Info, cover: Option<CoverImage>) -> Self {
        Self {
            id: info.id().to_owned(),
            title: info.name().to_owned(),
            author: info.author_name().to_owned(),
            description: info.description().map(str::to_owned),
            cover,
            chapters: Vec::new(),
            stems: HashSet::new(),
        }
    }

    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    pub fn push_chapter(&mut self, chapter: &Chapter) {
        let mut stem = format!("chap_{}", chapter.index());
        if !self.stems.insert(stem.clone()) {
            stem = format!("{stem}_{}", self.chapters.len() + 1);
            self.stems.insert(stem.clone());
        }

        let mut body_html = format!("<h1>{}</h1>\n", xml_escape(chapter.name()));
        for block in chapter.content_blocks() {
            body_html.push_str(&render_paragraph(&block.content));
            body_html.push('\n');
        }

        self.chapters.push(ChapterDoc {
            stem,
            title: chapter.name().to_owned(),
            body_html,
        });
    }

    pub fn write(&self, out_path: &Path, options: &EpubOptions) -> anyhow::Result<()> {
        if out_path.exists() && !options.force {
            anyhow::bail!("epub output already exists: {}", out_path.display());
        }
        if let Some(parent) = out_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("create epub parent dir: {}", parent.display()))?;
        }

        let lang = options.lang.trim();
        let lang = if lang.is_empty() { "und" } else { lang };
        let modified = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);

        let mut out_options = OpenOptions::new();
        out_options.write(true);
        if options.force {
            out_options.create(true).truncate(true);
        } else {
            out_options.create_new(true);
        }
        let out_file = out_options
            .open(out_path)
            .with_context(|| format!("open epub output: {}", out_path.display()))?;

        let mut zip = zip::ZipWriter::new(out_file);

        // `mimetype` must be the first entry and stored uncompressed.
        let mimetype_options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored)
            .unix_permissions(0o644);
        zip.start_file("mimetype", mimetype_options)
            .context("epub start_file mimetype")?;
        zip.write_all(b"application/epub+zip")
            .context("epub write mimetype")?;

        let deflated_options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .unix_permissions(0o644);

        let mut entries = vec![
            ("META-INF/container.xml".to_owned(), render_container_xml()),
            (
                "OEBPS/content.opf".to_owned(),
                self.render_content_opf(lang, &modified),
            ),
            ("OEBPS/nav.xhtml".to_owned(), self.render_nav_xhtml(lang)),
            ("OEBPS/toc.ncx".to_owned(), self.render_toc_ncx()),
            ("OEBPS/style.css".to_owned(), default_style_css()),
        ];
        if let Some(cover) = &self.cover {
            let body = format!(
                "<div class=\"cover\"><img src=\"cover.{}\" alt=\"{}\" /></div>\n",
                cover.extension,
                xml_escape(&self.title)
            );
            entries.push((
                "OEBPS/cover.xhtml".to_owned(),
                wrap_xhtml_document(&self.title, lang, &body),
            ));
        }
        for chapter in &self.chapters {
            entries.push((
                format!("OEBPS/{}.xhtml", chapter.stem),
                wrap_xhtml_document(&chapter.title, lang, &chapter.body_html),
            ));
        }

        for (name, contents) in &entries {
            zip.start_file(name.as_str(), deflated_options)
                .with_context(|| format!("epub start_file {name}"))?;
            zip.write_all(contents.as_bytes())
                .with_context(|| format!("epub write {name}"))?;
        }

        if let Some(cover) = &self.cover {
            let name = format!("OEBPS/cover.{}", cover.extension);
            zip.start_file(name.as_str(), deflated_options)
                .with_context(|| format!("epub start_file {name}"))?;
            zip.write_all(&cover.bytes)
                .with_context(|| format!("epub write {name}"))?;
        }

        zip.finish().context("epub finish zip")?;
        Ok(())
    }

    fn render_nav_xhtml(&self, lang: &str) -> String {
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        out.push_str("<!DOCTYPE html>\n");
        out.push_str(&format!(
            "<html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\" lang=\"{}\" xml:lang=\"{}\">\n",
            xml_escape(lang),
            xml_escape(lang)
        ));
        out.push_str("<head>\n");
        out.push_str(&format!("  <title>{}</title>\n", xml_escape(&self.title)));
        out.push_str("  <meta charset=\"utf-8\" />\n");
        out.push_str("  <link rel=\"stylesheet\" type=\"text/css\" href=\"style.css\" />\n");
        out.push_str("</head>\n");
        out.push_str("<body>\n");
        out.push_str(&format!("  <h1>{}</h1>\n", xml_escape(&self.title)));
        out.push_str("  <nav epub:type=\"toc\" id=\"toc\">\n");
        out.push_str("    <ol>\n");
        for ch in &self.chapters {
            out.push_str(&format!(
                "      <li><a href=\"{}.xhtml\">{}</a></li>\n",
                xml_escape(&ch.stem),
                xml_escape(&ch.title)
            ));
        }
        out.push_str("    </ol>\n");
        out.push_str("  </nav>\n");
        out.push_str("</body>\n");
        out.push_str("</html>\n");
        out
    }

    fn render_toc_ncx(&self) -> String {
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        out.push_str(
            "<!DOCTYPE ncx PUBLIC \"-//NISO//DTD ncx 2005-1//EN\" \"http://www.daisy.org/z3986/2005/ncx-2005-1.dtd\">\n",
        );
        out.push_str("<ncx xmlns=\"http://www.daisy.org/z3986/2005/ncx/\" version=\"2005-1\">\n");
        out.push_str("  <head>\n");
        out.push_str(&format!(
            "    <meta name=\"dtb:uid\" content=\"{}\" />\n",
            xml_escape(&self.id)
        ));
        out.push_str("    <meta name=\"dtb:depth\" content=\"1\" />\n");
        out.push_str("    <meta name=\"dtb:totalPageCount\" content=\"0\" />\n");
        out.push_str("    <meta name=\"dtb:maxPageNumber\" content=\"0\" />\n");
        out.push_str("  </head>\n");
        out.push_str("  <docTitle><text>");
        out.push_str(&xml_escape(&self.title));
        out.push_str("</text></docTitle>\n");
        out.push_str("  <navMap>\n");
        for (idx, ch) in self.chapters.iter().enumerate() {
            let play = idx + 1;
            out.push_str(&format!(
                "    <navPoint id=\"navPoint-{play}\" playOrder=\"{play}\">\n"
            ));
            out.push_str("      <navLabel><text>");
            out.push_str(&xml_escape(&ch.title));
            out.push_str("</text></navLabel>\n");
            out.push_str(&format!(
                "      <content src=\"{}.xhtml\" />\n",
                xml_escape(&ch.stem)
            ));
            out.push_str("    </navPoint>\n");
        }
        out.push_str("  </navMap>\n");
        out.push_str("</ncx>\n");
        out
    }

    fn render_content_opf(&self, lang: &str, modified: &str) -> String {
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        out.push_str(&format!(
            "<package xmlns=\"http://www.idpf.org/2007/opf\" unique-identifier=\"bookid\" version=\"3.0\" xml:lang=\"{}\">\n",
            xml_escape(lang)
        ));
        out.push_str("  <metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\">\n");
        out.push_str(&format!(
            "    <dc:identifier id=\"bookid\">{}</dc:identifier>\n",
            xml_escape(&self.id)
        ));
        out.push_str(&format!(
            "    <dc:title>{}</dc:title>\n",
            xml_escape(&self.title)
        ));
        out.push_str(&format!(
            "    <dc:language>{}</dc:language>\n",
            xml_escape(lang)
        ));
        if !self.author.is_empty() {
            out.push_str(&format!(
                "    <dc:creator>{}</dc:creator>\n",
                xml_escape(&self.author)
            ));
        }
        if let Some(description) = self.description.as_deref().filter(|d| !d.is_empty()) {
            out.push_str(&format!(
                "    <dc:description>{}</dc:description>\n",
                xml_escape(description)
            ));
        }
        if self.cover.is_some() {
            out.push_str("    <meta name=\"cover\" content=\"cover-image\" />\n");
        }
        out.push_str(&format!(
            "    <meta property=\"dcterms:modified\">{}</meta>\n",
            xml_escape(modified)
        ));
        out.push_str("  </metadata>\n");
        out.push_str("  <manifest>\n");
        out.push_str(
            "    <item id=\"nav\" href=\"nav.xhtml\" media-type=\"application/xhtml+xml\" properties=\"nav\" />\n",
        );
        out.push_str(
            "    <item id=\"ncx\" href=\"toc.ncx\" media-type=\"application/x-dtbncx+xml\" />\n",
        );
        out.push_str("    <item id=\"css\" href=\"style.css\" media-type=\"text/css\" />\n");
        if let Some(cover) = &self.cover {
            out.push_str(&format!(
                "    <item id=\"cover-image\" href=\"cover.{}\" media-type=\"{}\" properties=\"cover-image\" />\n",
                cover.extension,
                xml_escape(cover.media_type)
            ));
            out.push_str(
                "    <item id=\"cover\" href=\"cover.xhtml\" media-type=\"application/xhtml+xml\" />\n",
            );
        }
        for ch in &self.chapters {
            out.push_str(&format!(
                "    <item id=\"{}\" href=\"{}.xhtml\" media-type=\"application/xhtml+xml\" />\n",
                xml_escape(&ch.stem),
                xml_escape(&ch.stem)
            ));
        }
        out.push_str("  </manifest>\n");
        out.push_str("  <spine toc=\"ncx\">\n");
        if self.cover.is_some() {
            out.push_str("    <itemref idref=\"cover\" />\n");
        }
        out.push_str("    <itemref idref=\"nav\" />\n");
        for ch in &self.chapters {
            out.push_str(&format!(
                "    <itemref idref=\"{}\" />\n",
                xml_escape(&ch.stem)
            ));
        }
        out.push_str("  </spine>\n");
        out.push_str("</package>\n");
        out
    }
}

static ENTITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\A&(#[0-9]+|#[xX][0-9a-fA-F]+|[A-Za-z][A-Za-z0-9]*);").expect("entity regex")
});

/// HTML named entities seen in chapter text, mapped to code points. XHTML
/// without a DTD only knows the five XML entities.
const HTML_ENTITIES: &[(&str, u32)] = &[
    ("nbsp", 160),
    ("copy", 169),
    ("reg", 174),
    ("hellip", 8230),
    ("ndash", 8211),
    ("mdash", 8212),
    ("lsquo", 8216),
    ("rsquo", 8217),
    ("ldquo", 8220),
    ("rdquo", 8221),
];

/// Content blocks are HTML fragments. Blocks that already carry paragraph
/// markup are kept as-is, anything else is wrapped in `<p>`.
fn render_paragraph(content: &str) -> String {
    let trimmed = content.trim();
    let fragment = ensure_xhtml_void_tags(&escape_stray_markup(trimmed));
    if trimmed.starts_with("<p>") || trimmed.ends_with("</p>") {
        fragment
    } else {
        format!("<p>{fragment}</p>")
    }
}

/// Escapes `&` and `<` that do not start an entity or a tag. Existing
/// entities are kept, except named HTML ones which become numeric references.
fn escape_stray_markup(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;

    while let Some(rel) = html[cursor..].find(['&', '<']) {
        let at = cursor + rel;
        out.push_str(&html[cursor..at]);
        let rest = &html[at..];

        if rest.starts_with('<') {
            let opens_tag = rest[1..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '/' || c == '!')
                && rest.contains('>');
            out.push_str(if opens_tag { "<" } else { "&lt;" });
            cursor = at + 1;
            continue;
        }

        let Some(caps) = ENTITY_RE.captures(rest) else {
            out.push_str("&amp;");
            cursor = at + 1;
            continue;
        };
        let whole = caps.get(0).map_or("", |m| m.as_str());
        let name = caps.get(1).map_or("", |m| m.as_str());
        if name.starts_with('#') || matches!(name, "amp" | "lt" | "gt" | "quot" | "apos") {
            out.push_str(whole);
        } else if let Some((_, code)) = HTML_ENTITIES.iter().find(|(known, _)| *known == name) {
            out.push_str(&format!("&#{code};"));
        } else {
            out.push_str("&amp;");
            out.push_str(&whole[1..]);
        }
        cursor = at + whole.len();
    }

    out.push_str(&html[cursor..]);
    out
}

fn render_container_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#
    .to_string()
}

fn default_style_css() -> String {
    r#"@charset "utf-8";

body { font-family: Arial, Helvetica, sans-serif; margin: 0; padding: 0 1.2em; line-height: 1.6; }
h1 { font-size: 1.4em; margin: 1em 0; }
.cover { text-align: center; }
.cover img { max-width: 100%; max-height: 100%; }
"#
    .to_string()
}

fn wrap_xhtml_document(title: &str, lang: &str, body_html: &str) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str("<!DOCTYPE html>\n");
    out.push_str(&format!(
        "<html xmlns=\"http://www.w3.org/1999/xhtml\" lang=\"{}\" xml:lang=\"{}\">\n",
        xml_escape(lang),
        xml_escape(lang)
    ));
    out.push_str("<head>\n");
    out.push_str(&format!("  <title>{}</title>\n", xml_escape(title)));
    out.push_str("  <meta charset=\"utf-8\" />\n");
    out.push_str("  <link rel=\"stylesheet\" type=\"text/css\" href=\"style.css\" />\n");
    out.push_str("</head>\n");
    out.push_str("<body>\n");
    out.push_str(body_html);
    if !body_html.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("</body>\n");
    out.push_str("</html>\n");
    out
}

fn ensure_xhtml_void_tags(html: &str) -> String {
    // `<br>` and friends must be self-closed to stay well-formed XHTML.
    const VOID_TAGS: &[&str] = &[
        "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
        "source", "track", "wbr",
    ];

    let bytes = html.as_bytes();
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;

    while let Some(rel_lt) = html[cursor..].find('<') {
        let lt = cursor + rel_lt;
        out.push_str(&html[cursor..lt]);

        let mut in_quote: Option<u8> = None;
        let mut gt = lt + 1;
        while gt < bytes.len() {
            let b = bytes[gt];
            match in_quote {
                Some(q) if b == q => in_quote = None,
                Some(_) => {}
                None if b == b'"' || b == b'\'' => in_quote = Some(b),
                None if b == b'>' => break,
                None => {}
            }
            gt += 1;
        }
        if gt >= bytes.len() {
            out.push_str(&html[lt..]);
            return out;
        }

        let raw_tag = &html[lt..=gt];
        let name_start = lt + 1;
        let name_end = html[name_start..gt]
            .find(|c: char| !c.is_ascii_alphabetic())
            .map_or(gt, |offset| name_start + offset);
        let tag_name = html[name_start..name_end].to_ascii_lowercase();

        let tag_without_gt = &html[lt..gt];
        if VOID_TAGS.contains(&tag_name.as_str()) && !tag_without_gt.trim_end().ends_with('/') {
            out.push_str(tag_without_gt);
            out.push_str(" />");
        } else {
            out.push_str(raw_tag);
        }

        cursor = gt + 1;
    }

    out.push_str(&html[cursor..]);
    out
}

fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
