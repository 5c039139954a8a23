//! Utility functions and helpers.

pub mod http;

use url::Url;

/// Resolve a potentially relative post URL against the portal base URL.
///
/// Fragments are dropped so two spellings of the same post compare equal.
/// Unparsable links are kept verbatim (trimmed).
pub fn canonical_url(base: &Url, href: &str) -> String {
    let href = href.trim();
    match base.join(href) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => href.to_string(),
    }
}
