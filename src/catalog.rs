//! Publication listing for Issuu publisher handles.
//!
//! A publisher's public page embeds an `initial-data` script tag per
//! document whose `data-json` attribute carries the document metadata
//! (publication id, revision, page count, publish date). Listing a handle
//! means paginating the publisher page for `/handle/docs/...` links, then
//! fetching each document page and reading that metadata.
//!
//! Failure policy: the first catalog page failing makes the whole handle
//! [`SourceUnavailable`] for this run. Later pagination pages or individual
//! document pages failing are logged and listing continues with what was
//! already gathered.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use mockall::automock;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::SourceUnavailable;

pub const ISSUU_BASE_URL: &str = "https://issuu.com";

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One discoverable document on a handle's catalog. Transient: recomputed
/// each run, only `id` is ever persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Publication {
    pub id: String,
    pub revision_id: String,
    pub title: String,
    pub handle: String,
    pub page_count: u32,
    pub published: DateTime<Utc>,
}

/// Lists the publications of one handle with publish date on/after the
/// cutoff. Implemented by [`IssuuCatalog`] and by test mocks.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn list(
        &self,
        handle: &str,
        cutoff: NaiveDate,
    ) -> Result<Vec<Publication>, SourceUnavailable>;
}

pub struct IssuuCatalog {
    client: reqwest::Client,
    base_url: String,
    list_depth: usize,
}

impl IssuuCatalog {
    pub fn new(list_depth: usize) -> Result<Self, reqwest::Error> {
        Self::with_base_url(list_depth, ISSUU_BASE_URL)
    }

    /// Same as [`IssuuCatalog::new`] with an overridable host, for tests.
    pub fn with_base_url(
        list_depth: usize,
        base_url: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            list_depth,
        })
    }

    async fn fetch_text(&self, url: &str) -> Result<String, reqwest::Error> {
        self.client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }

    /// Walks the publisher page(s) and returns up to `list_depth` unique
    /// document paths, newest first as listed by the host.
    async fn collect_doc_paths(&self, handle: &str) -> Result<Vec<String>, SourceUnavailable> {
        let mut paths: Vec<String> = Vec::new();
        let mut page = 1;
        while paths.len() < self.list_depth {
            let url = if page == 1 {
                format!("{}/{}", self.base_url, handle)
            } else {
                format!("{}/{}?page={}", self.base_url, handle, page)
            };
            debug!(url = %url, page, "Fetching catalog page");
            let html = match self.fetch_text(&url).await {
                Ok(html) => html,
                Err(e) if page == 1 => {
                    return Err(SourceUnavailable {
                        handle: handle.to_string(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!(error = %e, page, handle, "Catalog pagination failed, stopping early");
                    break;
                }
            };

            let found = extract_doc_paths(&html, handle);
            let before = paths.len();
            for path in found {
                if !paths.contains(&path) {
                    paths.push(path);
                    if paths.len() >= self.list_depth {
                        break;
                    }
                }
            }
            // A page that contributes nothing new ends the walk.
            if paths.len() == before {
                debug!(page, handle, "No more publications found");
                break;
            }
            page += 1;
        }
        Ok(paths)
    }
}

#[async_trait]
impl Catalog for IssuuCatalog {
    async fn list(
        &self,
        handle: &str,
        cutoff: NaiveDate,
    ) -> Result<Vec<Publication>, SourceUnavailable> {
        let doc_paths = self.collect_doc_paths(handle).await?;
        info!(handle, count = doc_paths.len(), "Collected document links");

        let mut publications = Vec::new();
        for path in doc_paths {
            let url = format!("{}{}", self.base_url, path);
            let html = match self.fetch_text(&url).await {
                Ok(html) => html,
                Err(e) => {
                    warn!(error = %e, url = %url, "Failed to fetch document page, skipping");
                    continue;
                }
            };
            let Some(doc) = parse_document_data(&html) else {
                warn!(url = %url, "No document data found on page, skipping");
                continue;
            };
            let Some(published) = doc.published else {
                warn!(title = %doc.title, "Document has no publish date, skipping");
                continue;
            };
            if published.date_naive() < cutoff {
                debug!(id = %doc.id, published = %published, "Publication predates cutoff");
                continue;
            }
            publications.push(Publication {
                id: doc.id,
                revision_id: doc.revision_id,
                title: doc.title,
                handle: handle.to_string(),
                page_count: doc.page_count,
                published,
            });
        }
        Ok(publications)
    }
}

struct ParsedDocument {
    id: String,
    revision_id: String,
    title: String,
    page_count: u32,
    published: Option<DateTime<Utc>>,
}

/// Extracts `/{handle}/docs/{slug}` links from a publisher page.
fn extract_doc_paths(html: &str, handle: &str) -> Vec<String> {
    let link_re = Regex::new(r#"href="(/[^"/]+/docs/[^"?#]+)""#).unwrap();
    let prefix = format!("/{}/docs/", handle);
    let mut paths = Vec::new();
    for cap in link_re.captures_iter(html) {
        let path = &cap[1];
        if path.starts_with(&prefix) && !paths.iter().any(|p| p == path) {
            paths.push(path.to_string());
        }
    }
    paths
}

/// Reads the `initial-data` script tag's `data-json` attribute and pulls
/// the document metadata out of it.
fn parse_document_data(html: &str) -> Option<ParsedDocument> {
    let data_re = Regex::new(r#"<script[^>]*id="initial-data"[^>]*data-json="([^"]*)""#).unwrap();
    let raw = data_re.captures(html)?.get(1)?.as_str();
    let json: serde_json::Value = serde_json::from_str(&unescape_attr(raw)).ok()?;
    let doc = json.get("initialDocumentData")?.get("document")?;

    let id = doc.get("publicationId")?.as_str()?.to_string();
    let revision_id = doc.get("revisionId")?.as_str()?.to_string();
    let title = doc
        .get("title")
        .and_then(|v| v.as_str())
        .unwrap_or("Untitled")
        .to_string();
    let page_count = doc
        .get("pageCount")
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as u32;
    let published = doc
        .get("originalPublishDateInISOString")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Some(ParsedDocument {
        id,
        revision_id,
        title,
        page_count,
        published,
    })
}

/// Minimal HTML attribute entity unescape, enough for the `data-json`
/// payload. `&amp;` goes last so double-escaped entities survive one level.
fn unescape_attr(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&#34;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
