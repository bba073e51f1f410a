//! Markdown import from URLs
//!
//! GitHub `blob` links are rewritten to their raw counterpart before
//! fetching. In strict mode only URLs whose path carries a Markdown or text
//! extension are accepted.

use crate::error::{ImportError, ImportResult};
use crate::utils::path::MARKDOWN_EXTENSIONS;
use url::Url;

const RAW_GITHUB_HOST: &str = "raw.githubusercontent.com";

/// Rewrite GitHub blob links to raw links; other URLs pass through parsed,
/// unparsable input is returned unchanged
pub fn normalize_md_url(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };

    let is_github = matches!(
        parsed.host_str().map(|h| h.to_ascii_lowercase()).as_deref(),
        Some("github.com" | "www.github.com")
    );
    if is_github && parsed.path().contains("/blob/") {
        let path = parsed.path().replacen("/blob/", "/", 1);
        if parsed.set_host(Some(RAW_GITHUB_HOST)).is_ok() {
            parsed.set_path(&path);
        }
    }
    parsed.to_string()
}

/// Whether the URL path ends with an accepted extension
pub fn is_allowed_md_url(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let path = parsed.path().to_ascii_lowercase();
    MARKDOWN_EXTENSIONS
        .iter()
        .any(|ext| path.ends_with(&format!(".{}", ext)))
}

/// Document URL carried by a page location, as `?url=` or `#/?url=`
pub fn markdown_url_from_location(location: &str) -> Option<String> {
    let parsed = Url::parse(location).ok()?;

    let direct = parsed
        .query_pairs()
        .find(|(key, _)| key == "url")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty());
    if direct.is_some() {
        return direct;
    }

    let fragment = parsed.fragment()?;
    let fragment = fragment.strip_prefix('/').unwrap_or(fragment);
    let (_, query) = fragment.split_once('?')?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "url")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Fetches Markdown documents over HTTP
#[derive(Debug, Clone)]
pub struct RemoteImporter {
    client: reqwest::Client,
    strict: bool,
}

impl RemoteImporter {
    pub fn new(strict: bool) -> ImportResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("md2pdf-studio/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| ImportError::Fetch {
                url: String::new(),
                source,
            })?;
        Ok(Self { client, strict })
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Normalize, check and fetch a document; the whole body is read before
    /// anything is returned
    pub async fn fetch(&self, url: &str) -> ImportResult<String> {
        let url = normalize_md_url(url.trim());
        if Url::parse(&url).is_err() || (self.strict && !is_allowed_md_url(&url)) {
            return Err(ImportError::DisallowedUrl { url });
        }

        log::debug!("Importing Markdown from {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| ImportError::Fetch {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImportError::Status {
                url,
                status: status.as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|source| ImportError::Fetch { url, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::MockServer;

    #[test]
    fn test_github_blob_rewritten_to_raw() {
        assert_eq!(
            normalize_md_url("https://github.com/owner/repo/blob/main/docs/README.md"),
            "https://raw.githubusercontent.com/owner/repo/main/docs/README.md"
        );
        assert_eq!(
            normalize_md_url("https://www.github.com/o/r/blob/v1/a.md?plain=1"),
            "https://raw.githubusercontent.com/o/r/v1/a.md?plain=1"
        );
        assert_eq!(
            normalize_md_url("https://github.com/owner/repo/tree/main/docs"),
            "https://github.com/owner/repo/tree/main/docs"
        );
        assert_eq!(normalize_md_url("not a url"), "not a url");
    }

    #[test]
    fn test_allowed_md_urls() {
        assert!(is_allowed_md_url("https://example.com/notes.md"));
        assert!(is_allowed_md_url("https://example.com/NOTES.MDOWN?x=1"));
        assert!(!is_allowed_md_url("https://example.com/index.html"));
        assert!(!is_allowed_md_url("https://example.com/notes.md/"));
        assert!(!is_allowed_md_url("notes.md"));
    }

    #[test]
    fn test_markdown_url_from_location() {
        assert_eq!(
            markdown_url_from_location("https://app.test/?url=https%3A%2F%2Fa.test%2Fx.md"),
            Some("https://a.test/x.md".to_string())
        );
        assert_eq!(
            markdown_url_from_location("https://app.test/#/?url=https://a.test/y.md"),
            Some("https://a.test/y.md".to_string())
        );
        assert_eq!(
            markdown_url_from_location("https://app.test/#?mode=1&url=https://a.test/z.md"),
            Some("https://a.test/z.md".to_string())
        );
        assert_eq!(markdown_url_from_location("https://app.test/?url="), None);
        assert_eq!(markdown_url_from_location("https://app.test/#/about"), None);
    }

    #[tokio::test]
    async fn test_fetch_document() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("GET").path("/docs/guide.md");
            then.status(200)
                .header("content-type", "text/markdown")
                .body("# Guide\n");
        });

        let importer = RemoteImporter::new(true).unwrap();
        let text = importer.fetch(&server.url("/docs/guide.md")).await.unwrap();

        mock.assert();
        assert_eq!(text, "# Guide\n");
    }

    #[tokio::test]
    async fn test_fetch_failure_status() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("GET").path("/missing.md");
            then.status(404).body("not found");
        });

        let importer = RemoteImporter::new(true).unwrap();
        let err = importer.fetch(&server.url("/missing.md")).await.unwrap_err();

        mock.assert();
        assert!(matches!(err, ImportError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_strict_mode_rejects_before_request() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("GET").path("/page.html");
            then.status(200).body("<p>hi</p>");
        });

        let strict = RemoteImporter::new(true).unwrap();
        let err = strict.fetch(&server.url("/page.html")).await.unwrap_err();
        assert!(matches!(err, ImportError::DisallowedUrl { .. }));
        mock.assert_calls(0);

        let lenient = RemoteImporter::new(false).unwrap();
        assert_eq!(lenient.fetch(&server.url("/page.html")).await.unwrap(), "<p>hi</p>");
        mock.assert();
    }
}
