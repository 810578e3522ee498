use anyhow::{Context, Result};
use log::{debug, info, warn};
use mime_guess::from_path;
use pdf_extract::extract_text;
use std::fs;
use std::path::Path;

/// Represents a loaded document with its extracted text and metadata
#[derive(Debug, Clone)]
pub struct Document {
    /// The extracted text content of the document
    pub content: String,
    /// The document's file name
    pub source: String,
    /// The document's MIME type
    pub mime_type: String,
    /// Page number, when the extractor reports page breaks
    pub page: Option<u32>,
}

/// Loader used for a file, selected by extension only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loader {
    Pdf,
    Docx,
    PlainText,
}

impl Loader {
    /// Pick the loader for a path. Unrecognized extensions fall back to a
    /// plain-text read.
    pub fn for_path<P: AsRef<Path>>(path: P) -> Loader {
        let extension = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some("pdf") => Loader::Pdf,
            Some("docx") => Loader::Docx,
            _ => Loader::PlainText,
        }
    }
}

/// Load a file into one or more documents.
///
/// PDFs yield one document per page when the extractor emits form-feed page
/// breaks, otherwise a single document covering the whole file.
pub fn load_documents<P: AsRef<Path>>(file_path: P) -> Result<Vec<Document>> {
    let path = file_path.as_ref();
    let source = path
        .file_name()
        .context("Invalid file name")?
        .to_str()
        .context("Invalid file name encoding")?
        .to_string();

    // MIME type is recorded as metadata only; routing is by extension
    let mime_type = from_path(path).first_or_octet_stream().to_string();
    debug!("Detected MIME type: {}", mime_type);

    match Loader::for_path(path) {
        Loader::Pdf => {
            info!("Processing PDF document: {}", path.display());
            let content = extract_text(path)
                .with_context(|| format!("Failed to extract text from PDF: {}", path.display()))?;
            let content = normalize_whitespace(&content);

            if content.is_empty() {
                warn!("Extracted PDF content is empty or contains only whitespace");
            }

            Ok(split_pages(&content)
                .into_iter()
                .map(|(page, text)| Document {
                    content: text,
                    source: source.clone(),
                    mime_type: mime_type.clone(),
                    page,
                })
                .collect())
        }

        Loader::Docx => {
            info!("Processing Word document: {}", path.display());
            let content = read_docx_content(path)?;

            Ok(vec![Document {
                content,
                source,
                mime_type,
                page: None,
            }])
        }

        Loader::PlainText => {
            info!("Processing text document: {}", path.display());
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read text file: {}", path.display()))?;

            Ok(vec![Document {
                content,
                source,
                mime_type,
                page: None,
            }])
        }
    }
}

/// Extract the paragraph text from a .docx file
fn read_docx_content<P: AsRef<Path>>(file_path: P) -> Result<String> {
    let path = file_path.as_ref();
    let data =
        fs::read(path).with_context(|| format!("Failed to read Word file: {}", path.display()))?;
    let docx = docx_rs::read_docx(&data)
        .map_err(|e| anyhow::anyhow!("Failed to parse Word file {}: {}", path.display(), e))?;

    let mut content = String::new();
    for child in docx.document.children {
        if let docx_rs::DocumentChild::Paragraph(paragraph) = child {
            for child in paragraph.children {
                if let docx_rs::ParagraphChild::Run(run) = child {
                    for child in run.children {
                        if let docx_rs::RunChild::Text(text) = child {
                            content.push_str(&text.text);
                        }
                    }
                }
            }
            content.push('\n');
        }
    }

    Ok(content.trim().to_string())
}

/// Split extracted PDF text into numbered pages on form-feed breaks. Without
/// any break the whole text stays a single unnumbered document.
fn split_pages(content: &str) -> Vec<(Option<u32>, String)> {
    let pages: Vec<&str> = content
        .split('\u{c}')
        .filter(|p| !p.trim().is_empty())
        .collect();

    if pages.len() <= 1 {
        return vec![(None, content.to_string())];
    }

    pages
        .into_iter()
        .enumerate()
        .map(|(i, page)| (Some(i as u32 + 1), page.trim().to_string()))
        .collect()
}

/// Normalize whitespace in text (remove multiple consecutive spaces, newlines, etc.)
fn normalize_whitespace(text: &str) -> String {
    // Replace multiple spaces with a single space
    let result = text.replace('\r', "");

    // Replace multiple consecutive newlines with double newlines (paragraph separator)
    let mut prev_char = ' ';
    let mut newline_count = 0;
    let mut normalized = String::with_capacity(result.len());

    for c in result.chars() {
        if c == '\n' {
            newline_count += 1;
        } else {
            if newline_count > 0 {
                // Add at most two newlines (paragraph break)
                if newline_count >= 2 {
                    normalized.push_str("\n\n");
                } else {
                    normalized.push('\n');
                }
                newline_count = 0;
            }

            // Don't add consecutive spaces
            if !(c == ' ' && prev_char == ' ') {
                normalized.push(c);
            }

            prev_char = c;
        }
    }

    // Handle trailing newlines
    if newline_count > 0 {
        if newline_count >= 2 {
            normalized.push_str("\n\n");
        } else {
            normalized.push('\n');
        }
    }

    normalized.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_routing_by_extension() {
        assert_eq!(Loader::for_path("report.pdf"), Loader::Pdf);
        assert_eq!(Loader::for_path("notes.PDF"), Loader::Pdf);
        assert_eq!(Loader::for_path("letter.docx"), Loader::Docx);
        assert_eq!(Loader::for_path("readme.txt"), Loader::PlainText);
    }

    #[test]
    fn test_unknown_extension_falls_back_to_plain_text() {
        assert_eq!(Loader::for_path("data.csv"), Loader::PlainText);
        assert_eq!(Loader::for_path("no_extension"), Loader::PlainText);
    }

    #[test]
    fn test_load_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.txt");
        fs::write(&path, "hello world").unwrap();

        let documents = load_documents(&path).unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].content, "hello world");
        assert_eq!(documents[0].source, "sample.txt");
        assert_eq!(documents[0].page, None);
    }

    #[test]
    fn test_split_pages_on_form_feed() {
        let pages = split_pages("first page\u{c}second page");
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0], (Some(1), "first page".to_string()));
        assert_eq!(pages[1], (Some(2), "second page".to_string()));
    }

    #[test]
    fn test_split_pages_without_breaks() {
        let pages = split_pages("just one block of text");
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].0, None);
    }

    #[test]
    fn test_normalize_whitespace() {
        let text = "This  has   multiple    spaces.\n\n\nAnd multiple newlines.\r\nAnd Windows line endings.";
        let expected =
            "This has multiple spaces.\n\nAnd multiple newlines.\nAnd Windows line endings.";
        assert_eq!(normalize_whitespace(text), expected);
    }
}
