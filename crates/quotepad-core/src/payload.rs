//! Quote-of-the-day response decoding.
//!
//! The service answers with a JSON list of `{"q": quote, "a": author, ...}`
//! objects; only the first entry is used.

use core::fmt;

use heapless::String;
use log::debug;
use serde::Deserialize;
use serde::de::{self, Deserializer, IgnoredAny, SeqAccess, Visitor};

use crate::error::QuoteError;

pub const QUOTE_TEXT_BYTES: usize = 512;
pub type QuoteText = String<QUOTE_TEXT_BYTES>;

const ENTRY_QUOTE_BYTES: usize = 448;
const ENTRY_AUTHOR_BYTES: usize = 64;
const UNESCAPE_BYTES: usize = 512;

#[derive(Debug, Deserialize)]
struct QuoteEntry {
    #[serde(rename = "q")]
    quote: String<ENTRY_QUOTE_BYTES>,
    #[serde(rename = "a")]
    author: String<ENTRY_AUTHOR_BYTES>,
}

struct FirstEntry(QuoteEntry);

impl<'de> Deserialize<'de> for FirstEntry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(FirstEntryVisitor)
    }
}

struct FirstEntryVisitor;

impl<'de> Visitor<'de> for FirstEntryVisitor {
    type Value = FirstEntry;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a non-empty list of quote entries")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let first = seq
            .next_element::<QuoteEntry>()?
            .ok_or_else(|| de::Error::invalid_length(0, &self))?;
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(FirstEntry(first))
    }
}

/// Decodes a response body into display text `"<quote>" - <author>`.
pub fn parse_quote(body: &[u8]) -> Result<QuoteText, QuoteError> {
    let mut scratch = [0u8; UNESCAPE_BYTES];
    let (FirstEntry(entry), _) =
        serde_json_core::from_slice_escaped::<FirstEntry>(body, &mut scratch).map_err(|err| {
            debug!("payload: decode failed err={:?}", err);
            QuoteError::MalformedPayload
        })?;

    let quote = entry.quote.trim();
    if quote.is_empty() {
        return Err(QuoteError::MalformedPayload);
    }

    Ok(compose(quote, entry.author.trim()))
}

pub fn compose(quote: &str, author: &str) -> QuoteText {
    let mut out = QuoteText::new();
    push_truncated(&mut out, "\"");
    push_truncated(&mut out, quote);
    push_truncated(&mut out, "\"");
    if !author.is_empty() {
        push_truncated(&mut out, " - ");
        push_truncated(&mut out, author);
    }
    out
}

/// Appends as many whole characters of `text` as fit.
pub fn push_truncated<const N: usize>(out: &mut String<N>, text: &str) {
    for ch in text.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn takes_first_entry_and_composes() {
        let body = br#"[{"q":"Stay hungry.","a":"Steve Jobs","h":"<blockquote>x</blockquote>"},
                        {"q":"Second","a":"Nobody"}]"#;
        let text = parse_quote(body).unwrap();
        assert_eq!(text.as_str(), "\"Stay hungry.\" - Steve Jobs");
    }

    #[test]
    fn escaped_quote_text_is_unescaped() {
        let body = br#"[{"q":"Say \"yes\"","a":"Anon"}]"#;
        assert_eq!(parse_quote(body).unwrap().as_str(), "\"Say \"yes\"\" - Anon");
    }

    #[test]
    fn rejects_empty_list_and_garbage() {
        assert_eq!(parse_quote(b"[]"), Err(QuoteError::MalformedPayload));
        assert_eq!(parse_quote(b"<html>"), Err(QuoteError::MalformedPayload));
        assert_eq!(
            parse_quote(br#"[{"a":"missing quote"}]"#),
            Err(QuoteError::MalformedPayload)
        );
        assert_eq!(
            parse_quote(br#"[{"q":"   ","a":"blank"}]"#),
            Err(QuoteError::MalformedPayload)
        );
    }

    #[test]
    fn compose_truncates_on_char_boundary() {
        let long: std::string::String = "é".repeat(400);
        let text = compose(&long, "Author");
        assert!(text.len() <= QUOTE_TEXT_BYTES);
        assert!(text.starts_with("\"é"));
    }
}
