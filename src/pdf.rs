use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use image::ImageFormat;
use image::codecs::jpeg::JpegEncoder;

const CATALOG_ID: usize = 1;
const PAGES_ID: usize = 2;

/// Image ready to be embedded as a `DCTDecode` XObject.
#[derive(Debug)]
struct JpegImage {
    data: Vec<u8>,
    width: u32,
    height: u32,
    color_space: &'static str,
}

impl JpegImage {
    fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        let format = image::guess_format(bytes).context("detect image format")?;
        let decoded =
            image::load_from_memory_with_format(bytes, format).context("decode image")?;
        let (width, height) = (decoded.width(), decoded.height());

        // CMYK and YCCK files are re-encoded; the decoder already hands back RGB.
        let passthrough = match jpeg_components(bytes) {
            Some(1) if format == ImageFormat::Jpeg => Some("DeviceGray"),
            Some(3) if format == ImageFormat::Jpeg => Some("DeviceRGB"),
            _ => None,
        };
        if let Some(color_space) = passthrough {
            return Ok(Self {
                data: bytes.to_vec(),
                width,
                height,
                color_space,
            });
        }

        let rgb = decoded.to_rgb8();
        let mut data = Vec::new();
        JpegEncoder::new_with_quality(&mut data, 90)
            .encode_image(&rgb)
            .context("re-encode image as jpeg")?;
        Ok(Self {
            data,
            width,
            height,
            color_space: "DeviceRGB",
        })
    }
}

/// Component count from the first start-of-frame segment of a JPEG.
fn jpeg_components(bytes: &[u8]) -> Option<u8> {
    if !bytes.starts_with(&[0xFF, 0xD8]) {
        return None;
    }

    let mut pos = 2;
    loop {
        // Markers may be padded with extra 0xFF fill bytes.
        while bytes.get(pos) == Some(&0xFF) && bytes.get(pos + 1) == Some(&0xFF) {
            pos += 1;
        }
        if *bytes.get(pos)? != 0xFF {
            return None;
        }
        let marker = *bytes.get(pos + 1)?;
        let length = u16::from_be_bytes([*bytes.get(pos + 2)?, *bytes.get(pos + 3)?]) as usize;
        let is_frame = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_frame {
            // length(2) precision(1) height(2) width(2) components(1)
            return bytes.get(pos + 9).copied();
        }
        if marker == 0xDA || length < 2 {
            return None;
        }
        pos += 2 + length;
    }
}

/// Streams a PDF with one full-bleed image per page.
///
/// Objects are written as pages arrive; the page tree and cross-reference
/// table are written by [`PdfDocument::finish`]. Dropping the document without
/// finishing leaves an unreadable file.
pub struct PdfDocument {
    path: PathBuf,
    out: BufWriter<File>,
    written: u64,
    /// Byte offset per object, indexed by `id - 1`.
    offsets: Vec<u64>,
    page_ids: Vec<usize>,
}

impl PdfDocument {
    pub fn create(path: &Path, force: bool) -> anyhow::Result<Self> {
        if path.exists() && !force {
            anyhow::bail!("pdf output already exists: {}", path.display());
        }
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("create pdf parent dir: {}", parent.display()))?;
        }

        let mut options = OpenOptions::new();
        options.write(true);
        if force {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }
        let file = options
            .open(path)
            .with_context(|| format!("open pdf output: {}", path.display()))?;

        let mut doc = Self {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
            written: 0,
            // Catalog and page tree ids are reserved up front.
            offsets: vec![0, 0],
            page_ids: Vec::new(),
        };
        doc.write_raw(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n")?;
        Ok(doc)
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Appends one page sized to the image's pixel dimensions.
    pub fn add_image_page(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        let image = JpegImage::from_bytes(bytes)?;
        let (w, h) = (image.width, image.height);

        let image_id = self.begin_object()?;
        self.write_raw(
            format!(
                "<< /Type /XObject /Subtype /Image /Width {w} /Height {h} /ColorSpace /{} /BitsPerComponent 8 /Filter /DCTDecode /Length {} >>\nstream\n",
                image.color_space,
                image.data.len()
            )
            .as_bytes(),
        )?;
        self.write_raw(&image.data)?;
        self.write_raw(b"\nendstream\nendobj\n")?;

        let content = format!("q\n{w} 0 0 {h} 0 0 cm\n/Im0 Do\nQ\n");
        let content_id = self.begin_object()?;
        self.write_raw(
            format!(
                "<< /Length {} >>\nstream\n{content}endstream\nendobj\n",
                content.len()
            )
            .as_bytes(),
        )?;

        let page_id = self.begin_object()?;
        self.write_raw(
            format!(
                "<< /Type /Page /Parent {PAGES_ID} 0 R /MediaBox [0 0 {w} {h}] /Resources << /XObject << /Im0 {image_id} 0 R >> >> /Contents {content_id} 0 R >>\nendobj\n"
            )
            .as_bytes(),
        )?;
        self.page_ids.push(page_id);
        Ok(())
    }

    pub fn finish(mut self) -> anyhow::Result<()> {
        self.offsets[CATALOG_ID - 1] = self.written;
        self.write_raw(
            format!("{CATALOG_ID} 0 obj\n<< /Type /Catalog /Pages {PAGES_ID} 0 R >>\nendobj\n")
                .as_bytes(),
        )?;

        let kids = self
            .page_ids
            .iter()
            .map(|id| format!("{id} 0 R"))
            .collect::<Vec<_>>()
            .join(" ");
        self.offsets[PAGES_ID - 1] = self.written;
        self.write_raw(
            format!(
                "{PAGES_ID} 0 obj\n<< /Type /Pages /Kids [{kids}] /Count {} >>\nendobj\n",
                self.page_ids.len()
            )
            .as_bytes(),
        )?;

        let xref_offset = self.written;
        let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", self.offsets.len() + 1);
        for offset in &self.offsets {
            xref.push_str(&format!("{offset:010} 00000 n \n"));
        }
        xref.push_str(&format!(
            "trailer\n<< /Size {} /Root {CATALOG_ID} 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n",
            self.offsets.len() + 1
        ));
        self.write_raw(xref.as_bytes())?;

        self.out
            .flush()
            .with_context(|| format!("flush pdf output: {}", self.path.display()))?;
        Ok(())
    }

    fn begin_object(&mut self) -> anyhow::Result<usize> {
        self.offsets.push(self.written);
        let id = self.offsets.len();
        self.write_raw(format!("{id} 0 obj\n").as_bytes())?;
        Ok(id)
    }

    fn write_raw(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        self.out
            .write_all(bytes)
            .with_context(|| format!("write pdf output: {}", self.path.display()))?;
        self.written += bytes.len() as u64;
        Ok(())
    }
}
