use crate::url::{logical_name, normalize_parsed, relative_path, short_digest};
use crate::UrlError;
use std::fmt;
use url::Url;

/// A page to crawl
///
/// Category pages and their paginated continuations share this one type; the
/// frontier does not care how a page was discovered. Two descriptors with the
/// same `canonical_url` are the same frontier entry; the page itself is loaded
/// from `fetch_url`, the link as it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageDescriptor {
    /// Site-relative path and query
    pub relative_path: String,

    /// Normalized absolute URL; the deduplication key
    pub canonical_url: Url,

    /// Absolute URL the page was discovered under, without fragment
    pub fetch_url: Url,

    /// Filesystem-safe identifier used to name the page's artifact
    pub logical_name: String,

    /// Human-readable category name, inherited by continuation pages
    pub label: Option<String>,
}

impl PageDescriptor {
    /// Builds a descriptor from an absolute URL
    pub fn from_url(mut url: Url, label: Option<String>) -> Result<Self, UrlError> {
        url.set_fragment(None);
        let canonical_url = normalize_parsed(url.clone())?;
        let relative_path = relative_path(&canonical_url);
        let logical_name = logical_name(&relative_path);

        Ok(Self {
            relative_path,
            canonical_url,
            fetch_url: url,
            logical_name,
            label,
        })
    }

    /// Resolves a link found on `base` into a descriptor
    ///
    /// Relative references follow RFC 3986, so a query-only `href` such as
    /// `?page=3` replaces the query of `base` and keeps its path.
    pub fn resolve(base: &Url, href: &str, label: Option<String>) -> Result<Self, UrlError> {
        let href = href.trim();
        if href.is_empty() {
            return Err(UrlError::Malformed("empty link target".to_string()));
        }

        let absolute = base
            .join(href)
            .map_err(|e| UrlError::Parse(format!("{} (relative to {}): {}", href, base, e)))?;
        Self::from_url(absolute, label)
    }

    /// Descriptor for a site's top-level page, stored under a fixed name
    pub fn seed(base_url: &str, seed_name: &str) -> Result<Self, UrlError> {
        let url = Url::parse(base_url).map_err(|e| UrlError::Parse(e.to_string()))?;
        let mut descriptor = Self::from_url(url, None)?;
        descriptor.logical_name = seed_name.to_string();
        Ok(descriptor)
    }

    /// Next page of the same listing; the category label carries over
    pub fn continuation(&self, next: Url) -> Result<Self, UrlError> {
        Self::from_url(next, self.label.clone())
    }

    /// Same page, stored under a name qualified by its canonical URL
    pub fn with_qualified_name(mut self) -> Self {
        self.logical_name = format!("{}_{}", self.logical_name, short_digest(self.key()));
        self
    }

    /// Deduplication key
    pub fn key(&self) -> &str {
        self.canonical_url.as_str()
    }
}

impl fmt::Display for PageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.logical_name, self.canonical_url)
    }
}
