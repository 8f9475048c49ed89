// src/items.rs

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::SplitError;
use crate::people::PersonId;
use crate::receipt::{ParsedItem, parse_leading_float};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.0)
    }
}

/// One participant's stake in an item. An equal split is every stake at weight 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub person: PersonId,
    pub weight: f64,
}

impl Assignment {
    pub fn equal(person: PersonId) -> Self {
        Self { person, weight: 1.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    /// Unit price.
    pub price: f64,
    pub count: u32,
    pub assignments: Vec<Assignment>,
    /// Set while the item is shared by everyone via the all-or-nothing toggle.
    pub is_selected: bool,
}

impl Item {
    /// `price × count`.
    pub fn cost(&self) -> f64 {
        self.price * f64::from(self.count.max(1))
    }

    pub fn is_assigned(&self, person: PersonId) -> bool {
        self.assignments.iter().any(|a| a.person == person)
    }

    pub fn total_weight(&self) -> f64 {
        self.assignments.iter().map(|a| a.weight).sum()
    }
}

/// A raw inline edit, as typed into a form field.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemEdit {
    Name(String),
    Price(String),
    Count(String),
}

/// Count field: digits only; empty or zero falls back to 1.
pub fn count_from_input(raw: &str) -> u32 {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    digits.parse::<u32>().ok().filter(|&c| c > 0).unwrap_or(1)
}

/// Price field: digits and dots only; unparseable falls back to 0.
pub fn price_from_input(raw: &str) -> f64 {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    parse_leading_float(&kept).unwrap_or(0.0)
}

/// Filter keystrokes for a price field. Input with a second dot is rejected,
/// so the caller keeps the previous value.
pub fn filter_price_input(raw: &str) -> Option<String> {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    (kept.matches('.').count() <= 1).then_some(kept)
}

/// Every line item on the bill. Mutations rebuild and swap the whole list.
#[derive(Debug, Default)]
pub struct ItemStore {
    items: Vec<Item>,
    next_id: u64,
}

impl ItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.iter().find(|i| i.id == id)
    }

    /// First item with exactly this name.
    pub fn find_by_name(&self, name: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.name == name)
    }

    pub fn names(&self) -> HashSet<&str> {
        self.items.iter().map(|i| i.name.as_str()).collect()
    }

    /// Replace the whole collection.
    pub fn replace_all(&mut self, items: Vec<Item>) {
        let max_id = items.iter().map(|i| i.id.0 + 1).max().unwrap_or(0);
        self.next_id = self.next_id.max(max_id);
        self.items = items;
    }

    fn new_item(&mut self, name: &str, price: f64, count: u32) -> Item {
        let item = Item {
            id: ItemId(self.next_id),
            name: name.to_string(),
            price: price.max(0.0),
            count: count.max(1),
            assignments: Vec::new(),
            is_selected: false,
        };
        self.next_id += 1;
        item
    }

    pub fn add(&mut self, name: &str, price: f64, count: u32) -> ItemId {
        let item = self.new_item(name, price, count);
        let id = item.id;
        let mut next = self.items.clone();
        next.push(item);
        self.replace_all(next);
        id
    }

    /// Blank row for inline editing.
    pub fn add_blank(&mut self) -> ItemId {
        self.add("", 0.0, 1)
    }

    /// Append parsed items, dropping any whose name already exists (exact,
    /// case-sensitive). Returns how many were added.
    pub fn merge_parsed(&mut self, parsed: &[ParsedItem]) -> usize {
        let existing: HashSet<String> = self.items.iter().map(|i| i.name.clone()).collect();
        let mut next = self.items.clone();
        let mut added = 0;
        for p in parsed {
            if existing.contains(&p.name) {
                debug!(name = %p.name, "Skipping item already in store");
                continue;
            }
            next.push(self.new_item(&p.name, p.price, p.count));
            added += 1;
        }
        self.replace_all(next);
        info!(added, skipped = parsed.len() - added, "Merged parsed items");
        added
    }

    /// Apply one inline edit. Returns `Ok(false)` when the input was rejected
    /// (a price with a second decimal point) and the previous value kept.
    pub fn edit(&mut self, id: ItemId, edit: ItemEdit) -> Result<bool, SplitError> {
        let mut accepted = true;
        self.update(id, |item| match edit {
            ItemEdit::Name(name) => item.name = name,
            ItemEdit::Price(raw) => match filter_price_input(&raw) {
                Some(kept) => item.price = price_from_input(&kept),
                None => accepted = false,
            },
            ItemEdit::Count(raw) => item.count = count_from_input(&raw),
        })?;
        if !accepted {
            debug!(item = %id, "Rejected price input");
        }
        Ok(accepted)
    }

    pub fn remove(&mut self, id: ItemId) -> Option<Item> {
        let pos = self.items.iter().position(|i| i.id == id)?;
        let mut next = self.items.clone();
        let removed = next.remove(pos);
        self.replace_all(next);
        Some(removed)
    }

    /// Apply `f` to one item and swap in the rebuilt list.
    pub(crate) fn update(
        &mut self,
        id: ItemId,
        f: impl FnOnce(&mut Item),
    ) -> Result<(), SplitError> {
        let mut next = self.items.clone();
        let item = next
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| SplitError::UnknownItem(id.to_string()))?;
        f(item);
        self.replace_all(next);
        Ok(())
    }

    /// Strip `person` from every item. Returns the number of items touched.
    pub fn unassign_everywhere(&mut self, person: PersonId) -> usize {
        let mut touched = 0;
        let next = self
            .items
            .iter()
            .cloned()
            .map(|mut item| {
                if item.is_assigned(person) {
                    item.assignments.retain(|a| a.person != person);
                    touched += 1;
                }
                item
            })
            .collect();
        self.replace_all(next);
        touched
    }
}
