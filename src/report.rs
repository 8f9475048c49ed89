// src/report.rs

use std::fmt::Write;

use crate::allocation::Breakdown;
use crate::receipt::ReceiptSummary;

fn money(currency: &str, amount: f64) -> String {
    format!("{currency}{amount:.2}")
}

/// Plain-text summary: receipt amounts, then one row per participant.
pub fn render_table(breakdown: &Breakdown, summary: &ReceiptSummary, currency: &str) -> String {
    let mut out = String::new();
    let m = |v| money(currency, v);

    if !summary.merchant.is_empty() {
        let _ = writeln!(out, "{}", summary.merchant);
    }
    if !summary.date.is_empty() {
        let _ = writeln!(out, "{}", summary.date);
    }
    let _ = writeln!(
        out,
        "Subtotal {}  Tax {}  Tip {}  Total {}",
        m(summary.subtotal),
        m(summary.tax),
        m(summary.tip),
        m(summary.total)
    );
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<4} {:<16} {:>10} {:>10} {:>10} {:>10}",
        "", "Name", "Subtotal", "Tax", "Tip", "Total"
    );
    for t in &breakdown.people {
        let _ = writeln!(
            out,
            "{:<4} {:<16} {:>10} {:>10} {:>10} {:>10}",
            t.initials,
            t.name,
            m(t.subtotal),
            m(t.tax),
            m(t.tip),
            m(t.total)
        );
    }
    if breakdown.unassigned > 0.0 {
        let _ = writeln!(out, "\nUnassigned items: {}", m(breakdown.unassigned));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::PersonTotal;
    use crate::people::PersonId;

    #[test]
    fn test_render_table() {
        let breakdown = Breakdown {
            people: vec![PersonTotal {
                person: PersonId(0),
                name: "Alice".into(),
                initials: "AE".into(),
                color: "#FF6B6B".into(),
                subtotal: 10.0,
                tax: 1.0,
                tip: 1.5,
                total: 12.5,
            }],
            allocated: 10.0,
            unassigned: 4.0,
        };
        let summary = ReceiptSummary {
            subtotal: 14.0,
            tax: 1.4,
            merchant: "Diner".into(),
            ..Default::default()
        };
        let table = render_table(&breakdown, &summary, "€");
        assert!(table.starts_with("Diner\n"));
        assert!(table.contains("Alice"));
        assert!(table.contains("€12.50"));
        assert!(table.contains("Unassigned items: €4.00"));
    }
}
