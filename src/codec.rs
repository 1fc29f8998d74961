//! Compact, stable encoding of a [`Request`] into the byte string stored as a
//! sorted-set member, plus optional URL compression.
//!
//! The wire format is three whitespace-separated fields: `priority depth
//! url`. Decoding splits at the first two separators only, so the URL (the
//! tail) may not itself contain literal spaces — callers percent-encode
//! spaces before pushing, as the original crawler does.

use crate::error::{FrontierError, Result};
use crate::request::Request;
use percent_encoding::{percent_decode, utf8_percent_encode, AsciiSet};

/// No ASCII byte is added to the escape set: [`utf8_percent_encode`] already
/// escapes every non-ASCII byte unconditionally, which is exactly the
/// behavior [`decompress`] wants and nothing more.
const NON_ASCII_ONLY: &AsciiSet = &AsciiSet::EMPTY;

/// Encode a request as `"<priority> <depth> <url>"`.
///
/// `depth` saturates to `i16` bounds before encoding (negative depths are
/// legal — they show up on requests seeded below depth 0 — and must survive
/// the round trip too).
pub fn encode(request: &Request, compress_url: bool) -> String {
    let depth = request.depth.clamp(i16::MIN as i32, i16::MAX as i32);
    let url = if compress_url {
        compress(&request.url)
    } else {
        request.url.clone()
    };
    format!("{} {} {}", request.priority, depth, url)
}

/// Decode a member previously produced by [`encode`].
///
/// Returns [`FrontierError::Decode`] if the member does not have the
/// `priority depth url` shape (e.g. it was corrupted, or written by an
/// incompatible version of the codec).
pub fn decode(encoded: &str, compress_url: bool) -> Result<Request> {
    let mut parts = encoded.splitn(3, ' ');
    let priority = parts
        .next()
        .ok_or_else(|| FrontierError::Decode(encoded.to_string()))?;
    let depth = parts
        .next()
        .ok_or_else(|| FrontierError::Decode(encoded.to_string()))?;
    let url = parts
        .next()
        .ok_or_else(|| FrontierError::Decode(encoded.to_string()))?;

    let priority: i32 = priority
        .parse()
        .map_err(|_| FrontierError::Decode(encoded.to_string()))?;
    let depth: i32 = depth
        .parse()
        .map_err(|_| FrontierError::Decode(encoded.to_string()))?;
    let url = if compress_url {
        decompress(url)
    } else {
        url.to_string()
    };

    Ok(Request {
        url,
        priority,
        depth,
    })
}

/// Shrink a percent-encoded URL by replacing runs of percent-encoded
/// non-ASCII bytes with the literal UTF-8 bytes they decode to. ASCII
/// percent-escapes (e.g. `%20`) are left untouched, since they cost no more
/// encoded than decoded.
pub fn compress(url: &str) -> String {
    let bytes = url.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Some(b) = decode_percent_triplet(bytes[i + 1], bytes[i + 2]) {
                if b >= 0x80 {
                    let mut run = vec![b];
                    let mut j = i + 3;
                    while j + 2 < bytes.len() && bytes[j] == b'%' {
                        match decode_percent_triplet(bytes[j + 1], bytes[j + 2]) {
                            Some(b2) if b2 >= 0x80 => {
                                run.push(b2);
                                j += 3;
                            }
                            _ => break,
                        }
                    }
                    if std::str::from_utf8(&run).is_ok() {
                        out.extend_from_slice(&run);
                        i = j;
                        continue;
                    }
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    // `out` interleaves verbatim slices of the original (valid) UTF-8 string
    // with byte runs we just checked via `str::from_utf8`, so it is valid
    // UTF-8 as a whole.
    String::from_utf8(out).expect("compress() preserves UTF-8 validity")
}

/// Invert [`compress`]: re-encode every non-ASCII byte as an uppercase-hex
/// percent escape.
pub fn decompress(compressed: &str) -> String {
    utf8_percent_encode(compressed, NON_ASCII_ONLY).to_string()
}

/// Decode a single `%XX` triplet via [`percent_decode`], the same escape
/// table `url::Url` uses elsewhere in this crate. Returns `None` for
/// malformed hex, matching the old hand-rolled parser's behavior of leaving
/// the run-collapsing loop in [`compress`] untouched.
fn decode_percent_triplet(hi: u8, lo: u8) -> Option<u8> {
    let triplet = [b'%', hi, lo];
    let decoded: Vec<u8> = percent_decode(&triplet).collect();
    (decoded.len() == 1).then(|| decoded[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_plain_request() {
        let r = Request::new("http://example.com/foo", 100, 10);
        let encoded = encode(&r, false);
        let decoded = decode(&encoded, false).unwrap();
        assert_eq!(decoded, r);
    }

    #[test]
    fn depth_saturates_high() {
        let r = Request::new("http://example.com/foo", 1, 1 << 16);
        let decoded = decode(&encode(&r, false), false).unwrap();
        assert!(decoded.depth >= (1 << 15) - 1);
    }

    #[test]
    fn depth_saturates_low() {
        let r = Request::new("http://example.com/foo", 1, -(1 << 16));
        let decoded = decode(&encode(&r, false), false).unwrap();
        assert!(decoded.depth <= -(1 << 15));
    }

    #[test]
    fn decode_rejects_malformed_member() {
        assert!(decode("not-a-valid-member", false).is_err());
        assert!(decode("notanumber 1 http://x", false).is_err());
    }

    #[test]
    fn url_compress_round_trips_ascii() {
        let url = "https://example.ru/~ONLY-ASCII-ALLOWED-HERE";
        assert_eq!(decompress(&compress(url)), url);
    }

    #[test]
    fn url_compress_round_trips_percent_encoded_ascii() {
        let url = "http://www.example.com/?foo=%20+";
        assert_eq!(decompress(&compress(url)), url);
    }

    #[test]
    fn url_compress_round_trips_percent_encoded_non_ascii() {
        // %C3%A9 is the UTF-8 encoding of 'é'.
        let url = "http://example.com/na%C3%AFve";
        assert_eq!(decompress(&compress(url)), url);
        // Compression should actually shrink the encoded form.
        assert!(compress(url).len() < url.len());
    }

    #[test]
    fn encode_with_compression_round_trips() {
        let r = Request::new("http://example.com/na%C3%AFve", 5, 2);
        let decoded = decode(&encode(&r, true), true).unwrap();
        assert_eq!(decoded, r);
    }
}
