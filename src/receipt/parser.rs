use std::sync::LazyLock;

use super::{ParsedItem, ParsedReceipt, ReceiptSummary};
use regex::Regex;
use tracing::debug;

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]{1,2}[-/][0-9]{1,2}[-/][0-9]{2,4}|[0-9]{1,2}:[0-9]{2}(?::[0-9]{2})?(?:\s*[AP]M)?)")
        .expect("valid date regex")
});

// Currency-ish token anchored to the end of the line, e.g. "$12.99" or "1,024.00"
static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[$0-9.,]+$").expect("valid amount regex"));

static COUNT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([0-9]+)\s+").expect("valid count regex"));

/// Summary field a line can be classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SummaryField {
    Subtotal,
    Tax,
    Tip,
    Total,
}

/// A named keyword matcher over a lowercased line.
struct LineMatcher {
    field: SummaryField,
    any_of: &'static [&'static str],
    none_of: &'static [&'static str],
}

impl LineMatcher {
    fn matches(&self, lower: &str) -> bool {
        self.any_of.iter().any(|k| lower.contains(k)) && !self.none_of.iter().any(|k| lower.contains(k))
    }
}

// Precedence order: the first matcher that fires classifies the line.
const SUMMARY_MATCHERS: &[LineMatcher] = &[
    LineMatcher {
        field: SummaryField::Subtotal,
        any_of: &["subtotal", "sub-total"],
        none_of: &[],
    },
    LineMatcher {
        field: SummaryField::Tax,
        any_of: &["tax", "gst", "hst"],
        none_of: &[],
    },
    LineMatcher {
        field: SummaryField::Tip,
        any_of: &["tip", "gratuity"],
        none_of: &[],
    },
    LineMatcher {
        field: SummaryField::Total,
        any_of: &["total"],
        none_of: &["subtotal"],
    },
];

/// Keywords that disqualify a line from being an item.
const NON_ITEM_KEYWORDS: &[&str] = &[
    "subtotal", "tax", "total", "round", "rounding", "tip", "gratuity",
];

/// Line-oriented keyword and pattern matching.
pub fn parse(text: &str) -> ParsedReceipt {
    let lines = receipt_lines(text);

    let mut summary = ReceiptSummary {
        merchant: lines.first().map(|l| l.to_string()).unwrap_or_default(),
        date: extract_date(&lines),
        ..ReceiptSummary::default()
    };

    for line in &lines {
        let Some(field) = classify_summary_line(line) else {
            continue;
        };
        let Some((_, amount)) = trailing_amount(line) else {
            continue;
        };
        // Last match wins per field
        match field {
            SummaryField::Subtotal => summary.subtotal = amount,
            SummaryField::Tax => summary.tax = amount,
            SummaryField::Tip => summary.tip = amount,
            SummaryField::Total => summary.total = amount,
        }
    }

    let items: Vec<ParsedItem> = lines
        .iter()
        .filter(|line| is_item_candidate(line))
        .filter_map(|line| parse_item_line(line))
        .collect();

    debug!(
        lines = lines.len(),
        items = items.len(),
        merchant = %summary.merchant,
        "Receipt text parsed"
    );

    ParsedReceipt { items, summary }
}

/// Split on line breaks, trim, drop blank lines.
fn receipt_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect()
}

fn extract_date(lines: &[&str]) -> String {
    lines
        .iter()
        .find(|line| DATE_RE.is_match(line))
        .map(|line| {
            line.chars()
                .filter(|c| {
                    c.is_ascii_digit() || c.is_whitespace() || matches!(c, '-' | '/' | ':' | 'A' | 'P' | 'M')
                })
                .collect::<String>()
                .trim()
                .to_string()
        })
        .unwrap_or_default()
}

pub(crate) fn classify_summary_line(line: &str) -> Option<SummaryField> {
    let lower = line.to_lowercase();
    SUMMARY_MATCHERS
        .iter()
        .find(|m| m.matches(&lower))
        .map(|m| m.field)
}

fn is_item_candidate(line: &str) -> bool {
    if !line.contains('$') {
        return false;
    }
    let lower = line.to_lowercase();
    !NON_ITEM_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Find the trailing amount token; returns its byte offset and value.
///
/// A token that reduces to no number (e.g. a lone `$`) yields `None`.
fn trailing_amount(line: &str) -> Option<(usize, f64)> {
    let m = AMOUNT_RE.find(line)?;
    let digits: String = m
        .as_str()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    parse_leading_float(&digits).map(|v| (m.start(), v))
}

fn parse_item_line(line: &str) -> Option<ParsedItem> {
    let (price_start, price) = trailing_amount(line)?;

    let (name_start, count) = match COUNT_RE.captures(line) {
        Some(cap) => {
            let count = cap[1].parse::<u32>().ok().filter(|&c| c > 0).unwrap_or(1);
            (cap.get(0).map_or(0, |m| m.end()), count)
        }
        None => (0, 1),
    };
    if name_start > price_start {
        return None;
    }

    let name = line[name_start..price_start].trim();
    if name.is_empty() {
        return None;
    }

    Some(ParsedItem {
        name: name.to_string(),
        price,
        count,
    })
}

/// Parse the longest numeric prefix of `s` (`digits[.digits]`), ignoring
/// anything after it. `"1.2.3"` reads as `1.2`; `""` and `"."` read as nothing.
pub fn parse_leading_float(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let mut end = 0;
    let mut seen_dot = false;
    let mut seen_digit = false;
    for (i, c) in s.char_indices() {
        match c {
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end = i + c.len_utf8();
    }
    if !seen_digit {
        return None;
    }
    s[..end].trim_end_matches('.').parse::<f64>().ok()
}
