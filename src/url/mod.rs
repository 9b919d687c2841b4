//! URL handling module for Shelfscan
//!
//! Canonical URLs identify frontier entries; logical names identify the
//! artifacts fetched for them.

mod normalize;

pub use normalize::{normalize_parsed, normalize_url};

use sha2::{Digest, Sha256};
use url::Url;

/// Extracts the lowercase host of a URL
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Checks if a host matches a domain pattern
///
/// `"shop.com"` matches only `shop.com`; `"*.shop.com"` matches `shop.com`
/// and any of its subdomains.
///
/// ```
/// use shelfscan::url::host_matches;
///
/// assert!(host_matches("*.lazada.vn", "www.lazada.vn"));
/// assert!(host_matches("*.lazada.vn", "lazada.vn"));
/// assert!(!host_matches("*.lazada.vn", "notlazada.vn"));
/// ```
pub fn host_matches(pattern: &str, host: &str) -> bool {
    if let Some(base) = pattern.strip_prefix("*.") {
        host == base || host.ends_with(&format!(".{}", base))
    } else {
        host == pattern
    }
}

/// Path and query of a URL, as used relative to the site root
pub fn relative_path(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

/// Derives a filesystem-safe identifier from a site-relative path
///
/// Every run of characters that is not ASCII alphanumeric collapses into a
/// single `_`; leading and trailing separators are dropped. The site root maps
/// to `index`.
///
/// Collapsing loses information, so only paths that can be read back from
/// their name (`/` followed by alphanumeric words joined by single `-`) keep
/// the bare name. Every other path gets a suffix derived from its digest;
/// the name stays the same from one run to the next.
///
/// ```
/// use shelfscan::url::logical_name;
///
/// assert_eq!(logical_name("/dien-thoai"), "dien_thoai");
/// assert_eq!(logical_name("/"), "index");
/// assert!(logical_name("/dien-thoai?page=2").starts_with("dien_thoai_page_2_"));
/// assert_ne!(logical_name("/rau/cu"), logical_name("/rau-cu"));
/// ```
pub fn logical_name(relative: &str) -> String {
    let mut name = String::with_capacity(relative.len());
    let mut pending_sep = false;

    for c in relative.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !name.is_empty() {
                name.push('_');
            }
            pending_sep = false;
            name.push(c);
        } else {
            pending_sep = true;
        }
    }

    if name.is_empty() {
        return if relative == "/" || relative.is_empty() {
            "index".to_string()
        } else {
            format!("index_{}", short_digest(relative))
        };
    }

    let readable = name != "index" && relative == format!("/{}", name.replace('_', "-"));
    if readable {
        name
    } else {
        format!("{}_{}", name, short_digest(relative))
    }
}

/// First ten hex digits of the SHA-256 of `text`
pub fn short_digest(text: &str) -> String {
    let mut digest = hex::encode(Sha256::digest(text.as_bytes()));
    digest.truncate(10);
    digest
}
