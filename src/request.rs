//! The unit of work carried by the frontier: a URL, its priority, and crawl
//! depth.

/// A single crawl request.
///
/// `priority` follows scrapy convention: higher is more urgent. `depth` is
/// the number of link-hops from a seed URL; it is clamped to `i16` bounds
/// when encoded (see [`crate::codec`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: String,
    pub priority: i32,
    pub depth: i32,
}

impl Request {
    pub fn new(url: impl Into<String>, priority: i32, depth: i32) -> Self {
        Request {
            url: url.into(),
            priority,
            depth,
        }
    }
}
