// Document text extraction
// Readers never fail: any read or parse problem is logged and yields an empty string


use anyhow::{Context, Result, anyhow};
use quick_xml::Reader;
use quick_xml::events::Event;
use std::fs;
use std::io::Read;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["pdf", "docx", "txt"];

const DOCX_BODY_PART: &str = "word/document.xml";
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const PAGE_BREAK: char = '\u{c}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    Txt,
}

impl DocumentKind {
    /// Detect the document kind from the file extension, ignoring case
    #[inline]
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "txt" => Some(Self::Txt),
            _ => None,
        }
    }
}

/// Extract text from any supported file, or an empty string when unsupported or unreadable
#[inline]
pub fn extract_text(path: &Path) -> String {
    match DocumentKind::from_path(path) {
        Some(DocumentKind::Pdf) => read_pdf(path),
        Some(DocumentKind::Docx) => read_docx(path),
        Some(DocumentKind::Txt) => read_txt(path),
        None => {
            info!("Skipping unsupported file type: {}", path.display());
            String::new()
        }
    }
}

#[inline]
pub fn read_pdf(path: &Path) -> String {
    log_outcome("PDF", path, try_read_pdf(path))
}

#[inline]
pub fn read_docx(path: &Path) -> String {
    log_outcome("DOCX", path, try_read_docx(path))
}

#[inline]
pub fn read_txt(path: &Path) -> String {
    log_outcome("TXT", path, try_read_txt(path))
}

fn log_outcome(kind: &str, path: &Path, result: Result<String>) -> String {
    match result {
        Ok(text) => {
            info!("Successfully read {}: {}", kind, path.display());
            text
        }
        Err(e) => {
            error!("Error reading {} {}: {:#}", kind, path.display(), e);
            String::new()
        }
    }
}

fn try_read_pdf(path: &Path) -> Result<String> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;

    // pdf-extract panics on some malformed documents
    let text = catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(&bytes)))
        .map_err(|_| anyhow!("PDF parser panicked"))?
        .map_err(|e| anyhow!("Failed to extract PDF text: {}", e))?;

    let pages = text
        .split(PAGE_BREAK)
        .map(str::trim)
        .filter(|page| !page.is_empty())
        .collect::<Vec<_>>();
    debug!("Extracted {} pages from {}", pages.len(), path.display());

    let mut joined = String::new();
    for page in pages {
        joined.push_str(page);
        joined.push('\n');
    }
    Ok(joined)
}

fn try_read_docx(path: &Path) -> Result<String> {
    let file =
        fs::File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
    let mut archive = zip::ZipArchive::new(file).context("Not a valid DOCX archive")?;

    let mut xml = String::new();
    archive
        .by_name(DOCX_BODY_PART)
        .context("DOCX archive has no document body")?
        .read_to_string(&mut xml)
        .context("Failed to read DOCX document body")?;

    docx_xml_to_text(&xml)
}

/// Collect paragraph text from WordprocessingML, one paragraph per line
#[inline]
pub fn docx_xml_to_text(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event().context("Malformed DOCX XML")? {
            Event::Start(element) => match element.name().as_ref() {
                b"w:p" => current.clear(),
                b"w:t" => in_text = true,
                _ => {}
            },
            Event::End(element) => match element.name().as_ref() {
                b"w:p" => paragraphs.push(std::mem::take(&mut current)),
                b"w:t" => in_text = false,
                _ => {}
            },
            Event::Empty(element) => match element.name().as_ref() {
                b"w:p" => paragraphs.push(String::new()),
                b"w:tab" => current.push('\t'),
                b"w:br" | b"w:cr" => current.push('\n'),
                _ => {}
            },
            Event::Text(text) if in_text => {
                current.push_str(&text.unescape().context("Invalid DOCX text escape")?);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs.join("\n"))
}

fn try_read_txt(path: &Path) -> Result<String> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes);

    String::from_utf8(bytes.to_vec()).context("File is not valid UTF-8")
}

/// List supported documents under `dir`, sorted by path
#[inline]
pub fn scan_directory(dir: &Path, recursive: bool) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_files(dir, recursive, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_files(dir: &Path, recursive: bool, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();

    for path in entries {
        if path.is_dir() {
            if recursive {
                collect_files(&path, recursive, files)?;
            } else {
                debug!("Not descending into {}", path.display());
            }
        } else if DocumentKind::from_path(&path).is_some() {
            files.push(path);
        } else {
            info!("Skipping unsupported file type: {}", path.display());
        }
    }

    Ok(())
}
