//! Subscription document parsers.
//!
//! Parsers are tried in `PARSERS` order. A parser only "wins" for an upstream
//! if it yields at least one outbound after the upstream's keyword filter is
//! applied, so a document that decodes under the first schema but carries
//! nothing useful still gets a chance under the next one.

pub mod clash;
pub mod singbox;

use crate::proxy::{ProxyOutbound, SubscriptionFormat, matches_any_keyword};

pub use clash::ClashParser;
pub use singbox::SingBoxParser;

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("empty document")]
    Empty,
    #[error("could not decode {format} document: {reason}")]
    Decode {
        format: SubscriptionFormat,
        reason: String,
    },
    #[error("{format} document contains no proxy entries")]
    NoEntries { format: SubscriptionFormat },
    #[error("no {format} entry matched the node keywords")]
    NoMatches { format: SubscriptionFormat },
}

pub trait SubscriptionParser: Send + Sync {
    fn format(&self) -> SubscriptionFormat;

    /// User-Agent presented when fetching a document for this parser.
    /// Subscription providers commonly pick the response schema from it.
    fn user_agent(&self) -> &'static str;

    fn parse(&self, raw: &[u8]) -> Result<Vec<ProxyOutbound>, ParseError>;
}

/// All known parsers in priority order.
pub static PARSERS: &[&dyn SubscriptionParser] = &[&ClashParser, &SingBoxParser];

/// Parses `raw` with `parser` and keeps the entries whose name matches any of
/// `keywords`.
pub fn parse_filtered(
    parser: &dyn SubscriptionParser,
    raw: &[u8],
    keywords: &[String],
) -> Result<Vec<ProxyOutbound>, ParseError> {
    let filtered: Vec<ProxyOutbound> = parser
        .parse(raw)?
        .into_iter()
        .filter(|p| matches_any_keyword(p.name(), keywords))
        .collect();

    if filtered.is_empty() {
        return Err(ParseError::NoMatches {
            format: parser.format(),
        });
    }
    Ok(filtered)
}
