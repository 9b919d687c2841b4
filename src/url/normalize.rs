use crate::UrlError;
use url::form_urlencoded;
use url::Url;

/// Query parameters that carry tracking state rather than page identity
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid", "spm", "scm"];

/// Normalizes a URL into its canonical form
///
/// The canonical form is the frontier's deduplication key, so two links that
/// lead to the same listing page must normalize to the same string.
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed or not HTTP(S)
/// 2. Lowercase the host
/// 3. Normalize path:
///    - Remove dot segments (. and ..) and empty segments
///    - Remove trailing slash (except for root /)
/// 4. Remove fragment
/// 5. Remove tracking query parameters (`utm_*`, `fbclid`, `spm`, ...)
/// 6. Sort remaining query parameters by key, keeping the relative order of
///    repeated keys
/// 7. Remove empty query string (trailing ?)
///
/// # Examples
///
/// ```
/// use shelfscan::url::normalize_url;
///
/// let url = normalize_url("https://Shop.Example.com/phones/?page=2&utm_source=x#top").unwrap();
/// assert_eq!(url.as_str(), "https://shop.example.com/phones?page=2");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;
    normalize_parsed(url)
}

/// Same as [`normalize_url`] for an already parsed URL
pub fn normalize_parsed(mut url: Url) -> Result<Url, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    let host = url
        .host_str()
        .ok_or(UrlError::MissingDomain)?
        .to_lowercase();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            let query = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                .finish();
            url.set_query(Some(&query));
        }
    }

    Ok(url)
}

/// Removes dot segments, duplicate slashes and the trailing slash
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Filters out tracking parameters and sorts the rest by key
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !key.is_empty() && !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    // Stable sort: `?c=2&c=1` must not become `?c=1&c=2`
    params.sort_by(|a, b| a.0.cmp(&b.0));

    params
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}
