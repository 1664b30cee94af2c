//! Document-to-text adapters for PDF files and web pages.

use crate::types::SourceKind;
use ragbasics_core::{AppError, AppResult};
use scraper::{ElementRef, Html, Node, Selector};
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

/// Timeout for fetching a web page.
pub const FETCH_TIMEOUT_SECS: u64 = 30;

/// Raw text of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDocument {
    /// File path or URL the text came from
    pub source: String,
    pub text: String,
}

/// Extract every document named by `source`.
///
/// For PDFs `source` is a file or a directory searched recursively for
/// `*.pdf`; for websites it is a URL.
pub async fn extract(kind: SourceKind, source: &str) -> AppResult<Vec<ExtractedDocument>> {
    match kind {
        SourceKind::Pdf => {
            let files = collect_pdfs(Path::new(source))?;
            let mut documents = Vec::with_capacity(files.len());
            for file in files {
                let path = file.clone();
                let text = tokio::task::spawn_blocking(move || extract_pdf(&path))
                    .await
                    .map_err(|e| {
                        AppError::Extraction(format!("PDF extraction task failed: {}", e))
                    })??;
                documents.push(ExtractedDocument {
                    source: file.display().to_string(),
                    text,
                });
            }
            Ok(documents)
        }
        SourceKind::Website => {
            let text = fetch_website(source, Duration::from_secs(FETCH_TIMEOUT_SECS)).await?;
            Ok(vec![ExtractedDocument {
                source: source.to_string(),
                text,
            }])
        }
    }
}

/// PDF files under `path`, in sorted order.
pub fn collect_pdfs(path: &Path) -> AppResult<Vec<PathBuf>> {
    if !path.exists() {
        return Err(AppError::Extraction(format!("{:?} does not exist", path)));
    }

    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Skipping unreadable entry under {:?}: {}", path, e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("pdf"))
                .unwrap_or(false)
        })
        .collect();

    files.sort();

    if files.is_empty() {
        return Err(AppError::Extraction(format!(
            "No PDF files found under {:?}",
            path
        )));
    }

    tracing::debug!("Found {} PDF files under {:?}", files.len(), path);
    Ok(files)
}

/// Text of every page of a PDF, pages separated by newlines.
pub fn extract_pdf(path: &Path) -> AppResult<String> {
    // pdf-extract panics on some malformed files
    let pages = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        pdf_extract::extract_text_by_pages(path)
    }));

    let pages = match pages {
        Ok(Ok(pages)) => pages,
        Ok(Err(e)) => {
            return Err(AppError::Extraction(format!(
                "Cannot read PDF {:?}: {}",
                path, e
            )))
        }
        Err(_) => {
            return Err(AppError::Extraction(format!(
                "Cannot read PDF {:?}: unsupported file structure",
                path
            )))
        }
    };

    tracing::debug!("Extracted {} pages from {:?}", pages.len(), path);
    Ok(pages.join("\n"))
}

/// Fetch a page and keep the text of its `<p>` elements.
pub async fn fetch_website(url: &str, timeout: Duration) -> AppResult<String> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("ragbasics/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AppError::Extraction(format!("Failed to create HTTP client: {}", e)))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| AppError::Extraction(format!("Failed to fetch {}: {}", url, e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AppError::Extraction(format!(
            "Fetching {} returned {}",
            url, status
        )));
    }

    let html = response
        .text()
        .await
        .map_err(|e| AppError::Extraction(format!("Failed to read body of {}: {}", url, e)))?;

    let text = paragraph_text(&html);
    if text.trim().is_empty() {
        return Err(AppError::Extraction(format!(
            "No paragraph text found at {}",
            url
        )));
    }

    Ok(text)
}

/// Text inside `<p>` elements, one space between paragraphs.
///
/// Text under `script` and `style` is skipped; entities are decoded by the
/// parser.
pub fn paragraph_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let paragraphs = match Selector::parse("p") {
        Ok(selector) => selector,
        Err(e) => {
            tracing::warn!("Invalid paragraph selector: {}", e);
            return String::new();
        }
    };

    document
        .select(&paragraphs)
        .map(element_text)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Visible text of one element with whitespace collapsed. `<br>` counts as a
/// space.
fn element_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();

    for node in element.descendants() {
        match node.value() {
            Node::Text(text) => {
                let hidden = node
                    .ancestors()
                    .take_while(|ancestor| ancestor.id() != element.id())
                    .filter_map(|ancestor| ancestor.value().as_element())
                    .any(|e| matches!(e.name(), "script" | "style"));
                if !hidden {
                    raw.push_str(text);
                }
            }
            Node::Element(e) if e.name() == "br" => raw.push(' '),
            _ => {}
        }
    }

    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paragraph_text_keeps_only_paragraphs() {
        let html = r#"<html><head><title>Skip</title><style>p { color: red; }</style></head>
            <body><h1>Heading</h1><p>Hello <b>world</b>.</p>
            <div>outside</div><P class="x">Second
            paragraph</P><script>var p = "<p>no</p>";</script></body></html>"#;

        assert_eq!(paragraph_text(html), "Hello world. Second paragraph");
    }

    #[test]
    fn test_paragraph_text_entities_and_comments() {
        let html = "<p>Fish &amp; chips &lt;3 &#39;yes&#x27; &bogus; <!-- <p>hidden</p> -->done</p>";
        assert_eq!(paragraph_text(html), "Fish & chips <3 'yes' &bogus; done");
    }

    #[test]
    fn test_unclosed_paragraphs() {
        let html = "<p>one<p>two<br>three";
        assert_eq!(paragraph_text(html), "one two three");
    }

    #[test]
    fn test_angle_bracket_inside_attribute() {
        let html = r#"<p title="a > b">Hello</p><p data-x='<p>'>again</p>"#;
        assert_eq!(paragraph_text(html), "Hello again");
    }

    #[test]
    fn test_script_inside_paragraph_is_skipped() {
        let html = "<p>Before<script>track();</script> after</p>";
        assert_eq!(paragraph_text(html), "Before after");
    }

    #[test]
    fn test_no_paragraphs() {
        assert_eq!(paragraph_text("<div>nothing here</div>"), "");
    }

    #[test]
    fn test_collect_pdfs_sorted() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("sub")).unwrap();
        std::fs::write(temp.path().join("b.pdf"), b"").unwrap();
        std::fs::write(temp.path().join("a.PDF"), b"").unwrap();
        std::fs::write(temp.path().join("sub").join("c.pdf"), b"").unwrap();
        std::fs::write(temp.path().join("notes.txt"), b"").unwrap();

        let files = collect_pdfs(temp.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(temp.path()).unwrap().display().to_string())
            .collect();
        assert_eq!(names, vec!["a.PDF", "b.pdf", "sub/c.pdf"]);
    }

    #[test]
    fn test_collect_pdfs_empty_dir() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            collect_pdfs(temp.path()),
            Err(AppError::Extraction(_))
        ));
    }

    #[test]
    fn test_invalid_pdf_is_extraction_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf at all").unwrap();

        assert!(matches!(extract_pdf(&path), Err(AppError::Extraction(_))));
    }
}
