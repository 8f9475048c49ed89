// src/people.rs

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::SplitError;
use crate::items::ItemStore;

/// Display colours handed out in creation order, cycling once exhausted.
pub const PALETTE: [&str; 8] = [
    "#FF6B6B", // red
    "#4ECDC4", // teal
    "#45B7D1", // blue
    "#96C93D", // green
    "#A78BFA", // purple
    "#FBBF24", // yellow
    "#2DD4BF", // cyan
    "#F472B6", // pink
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonId(pub u64);

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    pub initials: String,
    pub color: String,
}

/// Initials for an avatar badge.
///
/// One word gives its first and last letter (`"Alice"` → `"AE"`), several
/// words give the first letter of each, capped at two (`"Mary Jane Watson"` → `"MJ"`).
pub fn initials(name: &str) -> String {
    let words: Vec<&str> = name.split_whitespace().collect();
    match words.as_slice() {
        [] => String::new(),
        [word] => {
            let mut chars = word.chars();
            let first = chars.next();
            let last = chars.next_back();
            first
                .into_iter()
                .chain(last)
                .flat_map(char::to_uppercase)
                .collect()
        }
        many => many
            .iter()
            .filter_map(|w| w.chars().next())
            .flat_map(char::to_uppercase)
            .take(2)
            .collect(),
    }
}

/// The people splitting the bill, in the order they were added.
#[derive(Debug, Default)]
pub struct ParticipantStore {
    people: Vec<Person>,
    next_id: u64,
}

impl ParticipantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn people(&self) -> &[Person] {
        &self.people
    }

    pub fn len(&self) -> usize {
        self.people.len()
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }

    pub fn ids(&self) -> Vec<PersonId> {
        self.people.iter().map(|p| p.id).collect()
    }

    pub fn get(&self, id: PersonId) -> Option<&Person> {
        self.people.iter().find(|p| p.id == id)
    }

    /// Case-insensitive lookup on the trimmed name.
    pub fn find_by_name(&self, name: &str) -> Option<&Person> {
        let wanted = name.trim().to_lowercase();
        self.people.iter().find(|p| p.name.to_lowercase() == wanted)
    }

    /// Replace the whole collection.
    pub fn replace_all(&mut self, people: Vec<Person>) {
        let max_id = people.iter().map(|p| p.id.0 + 1).max().unwrap_or(0);
        self.next_id = self.next_id.max(max_id);
        self.people = people;
    }

    pub fn add(&mut self, name: &str) -> Result<&Person, SplitError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SplitError::EmptyName);
        }
        if self.find_by_name(name).is_some() {
            return Err(SplitError::DuplicateName(name.to_string()));
        }

        let person = Person {
            id: PersonId(self.next_id),
            name: name.to_string(),
            initials: initials(name),
            color: PALETTE[self.people.len() % PALETTE.len()].to_string(),
        };
        self.next_id += 1;
        info!(id = %person.id, name = %person.name, color = %person.color, "Participant added");

        let mut next = self.people.clone();
        next.push(person);
        self.replace_all(next);
        Ok(&self.people[self.people.len() - 1])
    }

    /// Remove a participant and strip them from every item's assignment.
    pub fn remove(&mut self, id: PersonId, items: &mut ItemStore) -> Option<Person> {
        let pos = self.people.iter().position(|p| p.id == id)?;
        let mut next = self.people.clone();
        let removed = next.remove(pos);
        self.replace_all(next);
        let touched = items.unassign_everywhere(id);
        info!(id = %id, name = %removed.name, items_touched = touched, "Participant removed");
        Some(removed)
    }
}
