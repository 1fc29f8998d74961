//! Registered-domain (eTLD+1) extraction and queue-key derivation.
//!
//! A full implementation would consult the Mozilla Public Suffix List (the
//! `publicsuffix` crate, as used elsewhere in this codebase's crawler
//! lineage) to handle every multi-label suffix correctly. Since this crate
//! ships no bundled PSL data file, [`KNOWN_MULTI_LABEL_SUFFIXES`] curates the
//! common cases (`co.uk`, `com.au`, ...) and falls back to "last two labels"
//! for everything else — the same rule the Public Suffix List applies by
//! default to any suffix it doesn't know about.

use url::Url;

/// Public suffixes that are themselves two labels long. Anything not listed
/// here is assumed to be a single-label suffix (`com`, `org`, `io`, ...),
/// which is true for the overwhelming majority of TLDs.
const KNOWN_MULTI_LABEL_SUFFIXES: &[&str] = &[
    "co.uk", "org.uk", "gov.uk", "ac.uk", "net.uk", "sch.uk",
    "co.jp", "ne.jp", "or.jp", "ac.jp",
    "com.au", "net.au", "org.au", "edu.au", "gov.au",
    "co.nz", "net.nz", "org.nz",
    "co.in", "net.in", "org.in", "gen.in", "firm.in", "ind.in",
    "co.kr", "or.kr", "ne.kr",
    "com.br", "net.br", "org.br",
    "com.cn", "net.cn", "org.cn", "gov.cn",
    "com.mx", "com.ar", "com.tr", "com.sg", "com.hk",
];

/// Extract the registered domain (eTLD+1) from a URL, e.g.
/// `https://app.example.co.uk/path` → `example.co.uk`.
///
/// Returns `None` if the URL cannot be parsed or has no host.
pub fn registered_domain(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(registered_domain_for_host(host))
}

/// Same as [`registered_domain`] but operating directly on a hostname
/// (no scheme/path parsing).
pub fn registered_domain_for_host(host: &str) -> String {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return host;
    }
    let last_two = format!("{}.{}", labels[labels.len() - 2], labels[labels.len() - 1]);
    if labels.len() >= 3 && KNOWN_MULTI_LABEL_SUFFIXES.contains(&last_two.as_str()) {
        format!(
            "{}.{}.{}",
            labels[labels.len() - 3],
            labels[labels.len() - 2],
            labels[labels.len() - 1]
        )
    } else {
        last_two
    }
}

/// Derive the per-domain queue key for a URL: `"<prefix>:domain:<registered-domain>"`.
pub fn url_queue_key(prefix: &str, url: &str) -> Option<String> {
    registered_domain(url).map(|d| format!("{}:domain:{}", prefix, d))
}

/// Inverse of [`url_queue_key`]: extract the registered domain from a queue key.
pub fn queue_key_domain(key: &str) -> &str {
    key.rsplit(':').next().unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_domain_unchanged() {
        assert_eq!(registered_domain("https://example2.com/foo").unwrap(), "example2.com");
    }

    #[test]
    fn subdomain_collapses_to_registered_domain() {
        assert_eq!(
            registered_domain("http://wwww.example.com/foo").unwrap(),
            "example.com"
        );
    }

    #[test]
    fn multi_label_suffix_preserved() {
        assert_eq!(
            registered_domain("http://app.example.co.uk").unwrap(),
            "example.co.uk"
        );
    }

    #[test]
    fn queue_key_matches_spec_examples() {
        assert_eq!(
            url_queue_key("P", "http://wwww.example.com/foo").unwrap(),
            "P:domain:example.com"
        );
        assert_eq!(
            url_queue_key("P", "https://example2.com/foo").unwrap(),
            "P:domain:example2.com"
        );
        assert_eq!(
            url_queue_key("P", "http://app.example.co.uk").unwrap(),
            "P:domain:example.co.uk"
        );
    }

    #[test]
    fn queue_key_domain_round_trips() {
        let key = url_queue_key("P", "http://app.example.co.uk").unwrap();
        assert_eq!(queue_key_domain(&key), "example.co.uk");
    }

    #[test]
    fn malformed_url_returns_none() {
        assert!(registered_domain("not a url").is_none());
    }
}
