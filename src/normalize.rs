/// URL normalization and classification for frame matching
use url::Url;

/// Schemes whose pages never accept style injection and never host widgets
const INTERNAL_SCHEMES: &[&str] = &[
    "about",
    "chrome",
    "chrome-extension",
    "moz-extension",
    "edge",
    "devtools",
];

/// Schemes of extension pages, where injection is skipped instead of retried
const EXTENSION_SCHEMES: &[&str] = &["chrome-extension", "moz-extension"];

/// Normalize a URL for widget/frame matching
///
/// Algorithm:
/// 1. Drop everything from the first `?` onward
/// 2. Strip all trailing `/`
///
/// Only used for equality comparison. Raw URLs (query strings included)
/// are what gets persisted.
///
/// Examples:
/// - https://a.com/path/?x=1 → https://a.com/path
/// - https://x.test/app?ref=abc → https://x.test/app
pub fn normalize_url(url: &str) -> String {
    let without_query = url.split('?').next().unwrap_or_default();
    without_query.trim_end_matches('/').to_string()
}

/// True for blank pages and browser/extension internal pages
pub fn is_internal_url(url: &str) -> bool {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return true;
    }

    match Url::parse(trimmed) {
        Ok(parsed) => INTERNAL_SCHEMES.contains(&parsed.scheme()),
        Err(_) => false,
    }
}

/// True for pages served by an extension, such as the dashboard itself
pub fn is_extension_url(url: &str) -> bool {
    Url::parse(url.trim()).is_ok_and(|parsed| EXTENSION_SCHEMES.contains(&parsed.scheme()))
}

/// Page a tab should be sent to when one of our own top-level pages fails to load
///
/// Returns `None` when the failure is in a subframe, outside the extension,
/// or already on the fallback page.
pub fn fallback_page_for(
    failed_url: &str,
    frame_id: i32,
    extension_base: &str,
    fallback_page: &str,
) -> Option<String> {
    if frame_id != 0 || extension_base.is_empty() {
        return None;
    }
    if !failed_url.starts_with(extension_base) || failed_url.contains(fallback_page) {
        return None;
    }

    Some(join_extension_path(extension_base, fallback_page))
}

/// Join a page path onto the extension base URL (`chrome-extension://<id>/`)
pub fn join_extension_path(extension_base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        extension_base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_query_and_slash() {
        assert_eq!(normalize_url("https://a.com/path/?x=1"), "https://a.com/path");
        assert_eq!(normalize_url("https://a.com/path"), "https://a.com/path");
        assert_eq!(normalize_url("https://x.test/app?ref=abc"), "https://x.test/app");
    }

    #[test]
    fn test_normalize_keeps_fragment_and_path() {
        assert_eq!(normalize_url("https://a.com/p#top"), "https://a.com/p#top");
        assert_eq!(normalize_url("https://a.com/a/b/"), "https://a.com/a/b");
    }

    #[test]
    fn test_normalize_strips_every_trailing_slash() {
        assert_eq!(normalize_url("https://a.com//"), "https://a.com");
        assert_eq!(normalize_url("https://a.com/p//?x=1"), "https://a.com/p");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "",
            "/",
            "?",
            "https://a.com//",
            "https://a.com/path/?x=1",
            "https://a.com/?a=1?b=2",
            "not a url/",
            "https://x.test/app",
        ];

        for sample in samples {
            let once = normalize_url(sample);
            assert_eq!(normalize_url(&once), once, "input: {:?}", sample);
        }
    }

    #[test]
    fn test_is_internal_url() {
        assert!(is_internal_url("about:blank"));
        assert!(is_internal_url("chrome-extension://abcdef/index.html"));
        assert!(is_internal_url("chrome://newtab/"));
        assert!(is_internal_url(""));
        assert!(!is_internal_url("https://x.test/app"));
        assert!(!is_internal_url("http://localhost:3000"));
        assert!(!is_internal_url("not-a-url"));
    }

    #[test]
    fn test_is_extension_url() {
        assert!(is_extension_url("chrome-extension://abcdef/index.html"));
        assert!(is_extension_url("moz-extension://abcdef/index.html"));
        assert!(!is_extension_url("chrome://newtab/"));
        assert!(!is_extension_url("about:blank"));
        assert!(!is_extension_url(""));
        assert!(!is_extension_url("https://x.test/app"));
    }

    #[test]
    fn test_fallback_page_for_extension_top_frame() {
        let base = "chrome-extension://abc/";
        assert_eq!(
            fallback_page_for("chrome-extension://abc/dist/missing.html", 0, base, "404.html"),
            Some("chrome-extension://abc/404.html".to_string())
        );
    }

    #[test]
    fn test_fallback_page_for_ignored_cases() {
        let base = "chrome-extension://abc/";
        // subframe
        assert_eq!(fallback_page_for("chrome-extension://abc/x.html", 3, base, "404.html"), None);
        // already on fallback
        assert_eq!(fallback_page_for("chrome-extension://abc/404.html", 0, base, "404.html"), None);
        // other origin
        assert_eq!(fallback_page_for("https://x.test/", 0, base, "404.html"), None);
    }
}
