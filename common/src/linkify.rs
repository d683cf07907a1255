//! Finds bare URLs in paste content so front ends can turn them into links.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref URL_REGEX: Regex = Regex::new(r"https?://\S+").expect("URL regex should compile");
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    Link(&'a str),
}

/// Splits one line into text and link segments. Empty text is never emitted.
#[must_use]
pub fn segments(line: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut cursor = 0;

    for found in URL_REGEX.find_iter(line) {
        if found.start() > cursor {
            out.push(Segment::Text(&line[cursor..found.start()]));
        }
        out.push(Segment::Link(found.as_str()));
        cursor = found.end();
    }

    if cursor < line.len() {
        out.push(Segment::Text(&line[cursor..]));
    }

    out
}

/// Splits content into lines of segments. Blank lines come back empty so
/// callers can keep the original spacing.
#[must_use]
pub fn lines(content: &str) -> Vec<Vec<Segment<'_>>> {
    content
        .split('\n')
        .map(|line| segments(line.strip_suffix('\r').unwrap_or(line)))
        .collect()
}
