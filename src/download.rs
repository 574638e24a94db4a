//! Downloads one publication and packages it as a single PDF.
//!
//! Page images live at `image.isu.pub/{revision}-{publication}/jpg/page_N.jpg`.
//! They are fetched sequentially into a [`tempfile::TempDir`], which is
//! dropped on every exit path, then assembled into a PDF in page order.
//! Any page failure fails the whole publication; it stays unprocessed and
//! the next scheduled run retries it.

use std::fs;
use std::time::Duration;

use async_trait::async_trait;
use mockall::automock;
use printpdf::{Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, Px, RawImage, XObjectTransform};
use regex::Regex;
use tracing::{debug, info};

use crate::catalog::Publication;
use crate::error::DownloadError;

pub const IMAGE_BASE_URL: &str = "https://image.isu.pub";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Issuu page scans are rendered at reading resolution; 96 dpi keeps page
/// dimensions close to the original print size.
const IMAGE_DPI: f32 = 96.0;
const MAX_FILENAME_LEN: usize = 200;

/// A downloaded publication ready for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedDocument {
    pub filename: String,
    pub content: Vec<u8>,
}

/// Turns a catalog [`Publication`] into an uploadable document.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, publication: &Publication) -> Result<FetchedDocument, DownloadError>;
}

pub struct IssuuFetcher {
    client: reqwest::Client,
    image_base: String,
}

impl IssuuFetcher {
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_image_base(IMAGE_BASE_URL)
    }

    /// Same as [`IssuuFetcher::new`] with an overridable host, for tests.
    pub fn with_image_base(image_base: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            image_base: image_base.into(),
        })
    }

    fn page_image_url(&self, publication: &Publication, page: u32) -> String {
        format!(
            "{}/{}-{}/jpg/page_{}.jpg",
            self.image_base, publication.revision_id, publication.id, page
        )
    }
}

#[async_trait]
impl Fetcher for IssuuFetcher {
    async fn fetch(&self, publication: &Publication) -> Result<FetchedDocument, DownloadError> {
        if publication.page_count == 0 {
            return Err(DownloadError::NoPages {
                id: publication.id.clone(),
            });
        }

        // Scoped scratch space; removed when `pages_dir` drops, also on error.
        let pages_dir = tempfile::tempdir()?;

        for page in 1..=publication.page_count {
            let url = self.page_image_url(publication, page);
            debug!(url = %url, page, "Downloading page image");
            let response = self.client.get(&url).send().await?;
            if !response.status().is_success() {
                return Err(DownloadError::PageStatus {
                    id: publication.id.clone(),
                    page,
                    status: response.status(),
                });
            }
            let bytes = response.bytes().await?;
            fs::write(pages_dir.path().join(format!("page_{page:03}.jpg")), &bytes)?;
        }

        let mut jpegs = Vec::with_capacity(publication.page_count as usize);
        for page in 1..=publication.page_count {
            jpegs.push(fs::read(
                pages_dir.path().join(format!("page_{page:03}.jpg")),
            )?);
        }

        let content = assemble_pdf(&publication.title, &jpegs)?;
        let filename = format!("{}.pdf", sanitize_filename(&publication.title));
        info!(
            id = %publication.id,
            filename = %filename,
            pages = publication.page_count,
            size = content.len(),
            "Assembled publication PDF"
        );
        Ok(FetchedDocument { filename, content })
    }
}

/// One PDF page per image, sized to the image at [`IMAGE_DPI`].
fn assemble_pdf(title: &str, jpegs: &[Vec<u8>]) -> Result<Vec<u8>, DownloadError> {
    let mut warnings = Vec::new();
    let mut doc = PdfDocument::new(title);
    let mut pages = Vec::with_capacity(jpegs.len());
    for bytes in jpegs {
        let image = RawImage::decode_from_bytes(bytes, &mut warnings)
            .map_err(DownloadError::Pdf)?;
        let width = Mm::from(Px(image.width).into_pt(IMAGE_DPI));
        let height = Mm::from(Px(image.height).into_pt(IMAGE_DPI));
        let image_id = doc.add_image(&image);
        pages.push(PdfPage::new(
            width,
            height,
            vec![Op::UseXobject {
                id: image_id,
                transform: XObjectTransform::default(),
            }],
        ));
    }
    Ok(doc
        .with_pages(pages)
        .save(&PdfSaveOptions::default(), &mut warnings))
}

/// Rewrites a publication title into a filename safe on common filesystems:
/// unsafe characters get readable replacements, control characters are
/// dropped, runs of whitespace/dashes collapse, and the result is capped.
pub fn sanitize_filename(title: &str) -> String {
    const REPLACEMENTS: &[(char, &str)] = &[
        ('<', "("),
        ('>', ")"),
        (':', "-"),
        ('"', "'"),
        ('/', "-"),
        ('\\', "-"),
        ('|', "-"),
        ('?', ""),
        ('*', ""),
        ('&', "and"),
        ('#', "No."),
        ('%', "pct"),
        ('{', "("),
        ('}', ")"),
        ('~', "-"),
        ('+', "plus"),
        ('@', "at"),
        ('!', ""),
        ('`', "'"),
        ('=', "-"),
        (';', ","),
        ('[', "("),
        (']', ")"),
    ];

    let mut name = String::with_capacity(title.len());
    'chars: for c in title.chars() {
        for (from, to) in REPLACEMENTS {
            if c == *from {
                name.push_str(to);
                continue 'chars;
            }
        }
        if !c.is_control() {
            name.push(c);
        }
    }

    let name = Regex::new(r"\s+").unwrap().replace_all(&name, " ");
    let name = Regex::new(r"-+").unwrap().replace_all(&name, "-");
    let mut name = name.trim_matches(|c| c == ' ' || c == '-').to_string();

    if name.len() > MAX_FILENAME_LEN {
        // Cut at the last char boundary within the cap; a byte-index
        // truncate panics mid-character on multi-byte titles.
        let mut cut = MAX_FILENAME_LEN;
        while !name.is_char_boundary(cut) {
            cut -= 1;
        }
        name.truncate(cut);
    }
    if name.is_empty() {
        name = "unnamed_document".to_string();
    }
    name
}
