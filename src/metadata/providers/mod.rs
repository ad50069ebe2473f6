//! Concrete metadata provider implementations.
//!
//! Each submodule wraps one family of remote sources and implements the
//! [`MetadataProvider`](super::provider::MetadataProvider) trait.

pub mod imdb;
pub mod kodi;
pub mod tmdb;

pub use imdb::ImdbProvider;
pub use kodi::KodiAddonProvider;
pub use tmdb::TmdbProvider;

/// Minimal percent-encoding for query parameter values.
pub(crate) fn urlencoded(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char);
            }
            b' ' => out.push('+'),
            _ => {
                out.push('%');
                out.push(char::from(HEX[(b >> 4) as usize]));
                out.push(char::from(HEX[(b & 0x0f) as usize]));
            }
        }
    }
    out
}

const HEX: [u8; 16] = *b"0123456789ABCDEF";
