// src/manual.rs

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::SplitError;
use crate::items::{count_from_input, filter_price_input};
use crate::receipt::{ParsedItem, parse_leading_float};

/// One row of the manual entry form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftRow {
    #[serde(default)]
    pub name: String,
    /// Digits and at most one dot, as typed.
    #[serde(default)]
    pub price: String,
    #[serde(default = "default_count")]
    pub count: u32,
}

fn default_count() -> u32 {
    1
}

impl Default for DraftRow {
    fn default() -> Self {
        Self {
            name: String::new(),
            price: String::new(),
            count: 1,
        }
    }
}

impl DraftRow {
    fn unit_price(&self) -> Option<f64> {
        parse_leading_float(&self.price)
    }

    fn amount(&self) -> f64 {
        self.unit_price().unwrap_or(0.0) * f64::from(self.count.max(1))
    }
}

/// Amounts produced by a successful commit.
#[derive(Debug, Clone, PartialEq)]
pub struct ManualTotals {
    pub subtotal: f64,
    pub tax: f64,
    pub tip: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ManualCommit {
    /// Rows to insert, already filtered against existing item names.
    pub items: Vec<ParsedItem>,
    pub totals: ManualTotals,
}

/// Fallback entry path: typed rows plus flat tax and a flat or percentage tip.
#[derive(Debug, Clone, PartialEq)]
pub struct ManualEntry {
    rows: Vec<DraftRow>,
    pub tax: String,
    pub tip: String,
    pub tip_is_percentage: bool,
    /// Set once a commit was attempted, so empty required fields get flagged.
    pub validation_attempted: bool,
}

impl Default for ManualEntry {
    fn default() -> Self {
        Self {
            rows: vec![DraftRow::default()],
            tax: String::new(),
            tip: String::new(),
            tip_is_percentage: true,
            validation_attempted: false,
        }
    }
}

impl ManualEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[DraftRow] {
        &self.rows
    }

    pub fn replace_rows(&mut self, rows: Vec<DraftRow>) {
        self.rows = rows;
    }

    pub fn add_row(&mut self) {
        let mut next = self.rows.clone();
        next.push(DraftRow::default());
        self.replace_rows(next);
    }

    pub fn remove_row(&mut self, idx: usize) -> Option<DraftRow> {
        if idx >= self.rows.len() {
            return None;
        }
        let mut next = self.rows.clone();
        let removed = next.remove(idx);
        self.replace_rows(next);
        Some(removed)
    }

    pub fn set_name(&mut self, idx: usize, name: &str) {
        if let Some(row) = self.rows.get_mut(idx) {
            row.name = name.to_string();
        }
    }

    /// Returns false when the input was rejected (second decimal point).
    pub fn set_price(&mut self, idx: usize, raw: &str) -> bool {
        let (Some(row), Some(price)) = (self.rows.get_mut(idx), filter_price_input(raw)) else {
            return false;
        };
        row.price = price;
        true
    }

    pub fn set_count(&mut self, idx: usize, raw: &str) {
        if let Some(row) = self.rows.get_mut(idx) {
            row.count = count_from_input(raw);
        }
    }

    /// Σ price × count over every row; unparseable prices count as 0.
    pub fn subtotal(&self) -> f64 {
        self.rows.iter().map(DraftRow::amount).sum()
    }

    pub fn tax_amount(&self) -> f64 {
        parse_amount(&self.tax)
    }

    pub fn tip_amount(&self) -> f64 {
        let tip = parse_amount(&self.tip);
        if self.tip_is_percentage {
            self.subtotal() * (tip / 100.0)
        } else {
            tip
        }
    }

    pub fn total(&self) -> f64 {
        self.subtotal() + self.tax_amount() + self.tip_amount()
    }

    /// Total is only shown once both tax and tip are filled in.
    pub fn display_total(&self) -> Option<f64> {
        (!self.tax.trim().is_empty() && !self.tip.trim().is_empty()).then(|| self.total())
    }

    pub fn tax_error(&self) -> Option<SplitError> {
        (self.validation_attempted && self.tax.trim().is_empty()).then_some(SplitError::MissingTax)
    }

    pub fn tip_error(&self) -> Option<SplitError> {
        (self.validation_attempted && self.tip.trim().is_empty()).then_some(SplitError::MissingTip)
    }

    /// Validate and turn the draft into items and receipt amounts.
    ///
    /// Rows with no name or no parseable price are left out, as are rows whose
    /// name already exists in `existing_names`.
    pub fn commit(&mut self, existing_names: &HashSet<&str>) -> Result<ManualCommit, SplitError> {
        if self.rows.is_empty() {
            return Err(SplitError::NoDraftRows);
        }
        self.validation_attempted = true;
        if self.tax.trim().is_empty() {
            return Err(SplitError::MissingTax);
        }
        if self.tip.trim().is_empty() {
            return Err(SplitError::MissingTip);
        }

        let items: Vec<ParsedItem> = self
            .rows
            .iter()
            .filter(|row| !row.name.is_empty() && !existing_names.contains(row.name.as_str()))
            .filter_map(|row| {
                row.unit_price().map(|price| ParsedItem {
                    name: row.name.clone(),
                    price,
                    count: row.count.max(1),
                })
            })
            .collect();

        let totals = ManualTotals {
            subtotal: self.subtotal(),
            tax: self.tax_amount(),
            tip: self.tip_amount(),
            total: self.total(),
        };
        info!(
            rows = self.rows.len(),
            items = items.len(),
            subtotal = totals.subtotal,
            total = totals.total,
            "Manual entry committed"
        );

        Ok(ManualCommit { items, totals })
    }
}

fn parse_amount(raw: &str) -> f64 {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    parse_leading_float(&kept).unwrap_or(0.0)
}
