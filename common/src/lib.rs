#![warn(clippy::nursery, clippy::pedantic)]

//! Contains common functions and structures used by the Pastegate front ends.
//!
//! Everything that decides *whether* a paste may be shown lives here: the
//! remote API contract, the durable and per-session storage layers, the gate
//! evaluator and the unlock state machine. The front ends only supply IO.

pub use url::Url;

pub mod api;
pub mod driver;
pub mod flow;
pub mod gate;
pub mod linkify;
pub mod paste;
pub mod store;

pub use api::{ApiError, HttpApi, PasteApi};
pub use flow::{navigate, FlowError, Reveal, State, Unlock};
pub use gate::{evaluate, Gate, GateInput, Progress};
pub use paste::{Action, ActionType, Paste};
pub use store::{MemoryStore, ProgressStore, Store, StoreError, VerificationSession};

/// Default location of the paste API when none is configured.
pub const DEFAULT_API_BASE: &str = "http://localhost/pastein/api/public/api";

/// Extracts the short code from either a bare code or a share link.
///
/// Share links carry the code as their last non-empty path segment, e.g.
/// `https://paste.example/abc123`. Query strings and fragments are ignored.
#[must_use]
pub fn code_from_link(link: &str) -> Option<String> {
    let link = link.trim();
    if link.is_empty() {
        return None;
    }

    match Url::parse(link) {
        Ok(url) => url
            .path_segments()?
            .filter(|segment| !segment.is_empty())
            .last()
            .map(ToString::to_string),
        Err(_) if link.contains('/') || link.contains(char::is_whitespace) => None,
        Err(_) => Some(link.to_string()),
    }
}

/// Builds the public share link for a code, e.g. `https://paste.example/abc123`.
#[must_use]
pub fn share_link(origin: &Url, code: &str) -> Url {
    let mut url = origin.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.set_path("/");
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.clear().push(code);
    }
    url
}
