//! Ticker and intent extraction
//!
//! Free text is matched against an ordered list of patterns; the first one
//! that yields a token wins:
//!
//! 1. the whole text is a ticker (`AAPL`, `$AAPL`)
//! 2. an action verb followed by a ticker (`analyze TSLA`, `look at MSFT`)
//! 3. a question form (`what about MSFT?`, `how is NVDA`)
//! 4. an information request (`tell me about GOOGL`, `show me AMD`)
//! 5. the first upper-case token that is not a common English word
//!
//! Everything here is pure and deterministic.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static ticker pattern must compile")
}

static DIRECT: LazyLock<Regex> = LazyLock::new(|| compile(r"^\$?([A-Z]{1,5})$"));
static ACTION: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)(?:analyze|check|look\s+at|review)\s+\$?([A-Z]{1,5})\b"));
static QUESTION: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)(?:what|how)(?:\s+is|\s+about|'s)?\s+\$?([A-Z]{1,5})\b"));
static INFO: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?i)(?:tell\s+me\s+about|give\s+me\s+info\s+on|show\s+me|info\s+on)\s+\$?([A-Z]{1,5})\b")
});
static GENERIC: LazyLock<Regex> = LazyLock::new(|| compile(r"\b\$?([A-Z]{1,5})\b"));
static TICKER_SYNTAX: LazyLock<Regex> = LazyLock::new(|| compile(r"^[A-Z][A-Z0-9.]{0,4}$"));

/// Upper-case words that are never tickers
const STOP_WORDS: &[&str] = &[
    "I", "A", "AN", "THE", "IS", "ARE", "WAS", "WERE", "BE", "BEEN", "HAVE", "HAS", "HAD", "DO",
    "DOES", "DID", "WILL", "WOULD", "CAN", "COULD", "MAY", "MIGHT", "MUST", "SHALL", "SHOULD",
    "AM", "OR", "AND", "BUT", "IF", "SO", "AS", "AT", "BY", "FOR", "IN", "OF", "ON", "TO", "UP",
    "IT", "ME", "MY", "WE", "US", "YOU", "HE", "SHE", "HELLO", "HI", "THANKS", "THANK", "PLEASE",
    "YES", "NO", "OK", "OKAY",
];

/// What the requester wants done
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Analyze,
    Unknown,
}

/// Result of interpreting one query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryIntent {
    pub ticker: Option<String>,
    pub intent: Intent,
    pub valid: bool,
    pub error: Option<String>,
}

/// Extract a ticker symbol from free text, upper-cased
pub fn extract_ticker(query: &str) -> Option<String> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }

    if let Some(caps) = DIRECT.captures(query) {
        return Some(caps[1].to_ascii_uppercase());
    }

    for (name, pattern) in [("action", &*ACTION), ("question", &*QUESTION), ("info", &*INFO)] {
        if let Some(caps) = pattern.captures(query) {
            let ticker = caps[1].to_ascii_uppercase();
            debug!(%ticker, pattern = name, "extracted ticker");
            return Some(ticker);
        }
    }

    let ticker = GENERIC
        .captures_iter(query)
        .map(|caps| caps[1].to_ascii_uppercase())
        .find(|token| !STOP_WORDS.contains(&token.as_str()) && is_valid_ticker(token));

    if ticker.is_none() {
        debug!(%query, "no ticker found");
    }
    ticker
}

/// Check ticker syntax: 1-5 chars, leading letter, then letters, digits or dots,
/// and not purely numeric once dots are removed
pub fn is_valid_ticker(ticker: &str) -> bool {
    let ticker = ticker.trim().to_ascii_uppercase();
    if ticker.is_empty() || ticker.len() > 5 {
        return false;
    }
    if !TICKER_SYNTAX.is_match(&ticker) {
        return false;
    }
    !ticker.chars().filter(|c| *c != '.').all(|c| c.is_ascii_digit())
}

/// Interpret a query as an analysis request
pub fn parse_intent(query: &str) -> QueryIntent {
    if query.trim().is_empty() {
        return QueryIntent {
            ticker: None,
            intent: Intent::Analyze,
            valid: false,
            error: Some("Invalid query input".to_string()),
        };
    }

    let Some(ticker) = extract_ticker(query) else {
        return QueryIntent {
            ticker: None,
            intent: Intent::Unknown,
            valid: false,
            error: Some("No ticker symbol found in query".to_string()),
        };
    };

    if !is_valid_ticker(&ticker) {
        return QueryIntent {
            error: Some(format!("Invalid ticker symbol: {ticker}")),
            ticker: Some(ticker),
            intent: Intent::Analyze,
            valid: false,
        };
    }

    debug!(%ticker, "parsed analysis intent");
    QueryIntent {
        ticker: Some(ticker),
        intent: Intent::Analyze,
        valid: true,
        error: None,
    }
}

/// User-facing text for a missing or invalid ticker
pub fn format_ticker_error(ticker: Option<&str>) -> String {
    match ticker {
        Some(ticker) => format!(
            "❌ Invalid ticker symbol '{ticker}'. Please provide a valid NASDAQ ticker symbol (1-5 letters)."
        ),
        None => "❌ No ticker symbol found in your query. Please include a valid NASDAQ ticker symbol (e.g., AAPL, TSLA, MSFT).".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_ticker_patterns() {
        let cases: &[(&str, Option<&str>)] = &[
            ("AAPL", Some("AAPL")),
            ("  $NVDA  ", Some("NVDA")),
            ("analyze TSLA", Some("TSLA")),
            ("Please check $amd today", Some("AMD")),
            ("look at MSFT", Some("MSFT")),
            ("what about MSFT?", Some("MSFT")),
            ("how is NVDA doing", Some("NVDA")),
            ("what's INTC", Some("INTC")),
            ("tell me about GOOGL", Some("GOOGL")),
            ("give me info on META", Some("META")),
            ("I want to know about AMZN", Some("AMZN")),
            ("Should I buy AAPL?", Some("AAPL")),
            ("hello", None),
            ("I AM OK", None),
            ("", None),
            ("   ", None),
        ];

        for (query, expected) in cases {
            assert_eq!(
                extract_ticker(query).as_deref(),
                *expected,
                "query {query:?}"
            );
        }
    }

    #[test]
    fn test_direct_pattern_is_case_sensitive() {
        // lower-case single words fall through to the generic scan, which
        // only accepts upper-case tokens
        assert_eq!(extract_ticker("aapl"), None);
    }

    #[test]
    fn test_is_valid_ticker() {
        for valid in ["A", "AAPL", "GOOGL", "brk.b", "BF.A", "X1"] {
            assert!(is_valid_ticker(valid), "{valid} should be valid");
        }
        for invalid in ["", "TOOLONG", "1ABC", ".AB", "A-B", "ABCDEF"] {
            assert!(!is_valid_ticker(invalid), "{invalid} should be invalid");
        }
    }

    #[test]
    fn test_all_digit_tickers_rejected() {
        assert!(!is_valid_ticker("123"));
        assert!(!is_valid_ticker("1.2"));
    }

    #[test]
    fn test_parse_intent_valid() {
        let intent = parse_intent("analyze AAPL");
        assert!(intent.valid);
        assert_eq!(intent.ticker.as_deref(), Some("AAPL"));
        assert_eq!(intent.intent, Intent::Analyze);
        assert!(intent.error.is_none());
    }

    #[test]
    fn test_parse_intent_no_ticker() {
        let intent = parse_intent("hello there");
        assert!(!intent.valid);
        assert_eq!(intent.intent, Intent::Unknown);
        assert!(intent.ticker.is_none());
        assert_eq!(intent.error.as_deref(), Some("No ticker symbol found in query"));
    }

    #[test]
    fn test_parse_intent_blank() {
        let intent = parse_intent("  ");
        assert!(!intent.valid);
        assert_eq!(intent.error.as_deref(), Some("Invalid query input"));
    }

    #[test]
    fn test_format_ticker_error() {
        assert!(format_ticker_error(Some("12")).contains("'12'"));
        assert!(format_ticker_error(None).contains("e.g., AAPL, TSLA, MSFT"));
    }
}
