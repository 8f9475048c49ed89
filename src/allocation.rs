// src/allocation.rs

use serde::Serialize;
use tracing::debug;

use crate::errors::SplitError;
use crate::items::{Assignment, Item, ItemId, ItemStore};
use crate::people::{Person, PersonId};
use crate::receipt::ReceiptSummary;

impl ItemStore {
    /// Add or remove one participant on one item. Leaves `is_selected` alone.
    pub fn toggle_assignment(&mut self, item: ItemId, person: PersonId) -> Result<(), SplitError> {
        self.update(item, |item| {
            if item.is_assigned(person) {
                item.assignments.retain(|a| a.person != person);
            } else {
                item.assignments.push(Assignment::equal(person));
            }
        })
    }

    /// All-or-nothing share: on assigns every participant, off clears the item.
    pub fn toggle_everyone(&mut self, item: ItemId, people: &[PersonId]) -> Result<(), SplitError> {
        self.update(item, |item| {
            item.is_selected = !item.is_selected;
            item.assignments = if item.is_selected {
                people.iter().copied().map(Assignment::equal).collect()
            } else {
                Vec::new()
            };
        })
    }

    /// Replace an item's assignment with explicit weights.
    ///
    /// Weights must be finite and positive. A person listed twice keeps the
    /// last weight given.
    pub fn set_weights(&mut self, item: ItemId, weights: &[Assignment]) -> Result<(), SplitError> {
        let mut merged: Vec<Assignment> = Vec::with_capacity(weights.len());
        for w in weights {
            if !w.weight.is_finite() || w.weight <= 0.0 {
                return Err(SplitError::InvalidWeight {
                    person: w.person.to_string(),
                    weight: w.weight,
                });
            }
            match merged.iter_mut().find(|a| a.person == w.person) {
                Some(existing) => existing.weight = w.weight,
                None => merged.push(*w),
            }
        }
        self.update(item, |item| item.assignments = merged)
    }

    /// The assignment to start editing from: the current one, or everyone at
    /// weight 1 if the item is unassigned.
    pub fn assignment_or_everyone(&self, item: ItemId, people: &[PersonId]) -> Result<Vec<Assignment>, SplitError> {
        let item = self
            .get(item)
            .ok_or_else(|| SplitError::UnknownItem(item.to_string()))?;
        if item.assignments.is_empty() {
            Ok(people.iter().copied().map(Assignment::equal).collect())
        } else {
            Ok(item.assignments.clone())
        }
    }
}

/// What one participant pays for one item.
pub fn item_share(item: &Item, person: PersonId) -> f64 {
    let total_weight = item.total_weight();
    if total_weight <= 0.0 {
        return 0.0;
    }
    item.assignments
        .iter()
        .filter(|a| a.person == person)
        .map(|a| item.cost() * a.weight / total_weight)
        .sum()
}

/// `part / whole × amount`, or 0 when `whole` is not a positive number.
fn proportional(part: f64, whole: f64, amount: f64) -> f64 {
    if whole > 0.0 && whole.is_finite() {
        part / whole * amount
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonTotal {
    pub person: PersonId,
    pub name: String,
    pub initials: String,
    pub color: String,
    pub subtotal: f64,
    pub tax: f64,
    pub tip: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breakdown {
    pub people: Vec<PersonTotal>,
    /// Sum of item cost that landed on somebody.
    pub allocated: f64,
    /// Cost of items nobody was assigned to.
    pub unassigned: f64,
}

/// Recompute every participant's share from scratch.
pub fn compute_breakdown(items: &[Item], people: &[Person], summary: &ReceiptSummary) -> Breakdown {
    let totals: Vec<PersonTotal> = people
        .iter()
        .map(|person| {
            let subtotal: f64 = items.iter().map(|item| item_share(item, person.id)).sum();
            let tax = proportional(subtotal, summary.subtotal, summary.tax);
            let tip = proportional(subtotal, summary.subtotal, summary.tip);
            PersonTotal {
                person: person.id,
                name: person.name.clone(),
                initials: person.initials.clone(),
                color: person.color.clone(),
                subtotal,
                tax,
                tip,
                total: subtotal + tax + tip,
            }
        })
        .collect();

    let unassigned: f64 = items
        .iter()
        .filter(|i| i.total_weight() <= 0.0)
        .map(Item::cost)
        .sum();
    let allocated: f64 = totals.iter().map(|t| t.subtotal).sum();

    debug!(people = totals.len(), allocated, unassigned, "Breakdown computed");

    Breakdown {
        people: totals,
        allocated,
        unassigned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::people::ParticipantStore;

    const EPS: f64 = 1e-9;

    fn setup() -> (ParticipantStore, ItemStore, Vec<PersonId>) {
        let mut people = ParticipantStore::new();
        for name in ["Alice", "Bob", "Carol"] {
            people.add(name).unwrap();
        }
        let ids = people.ids();
        (people, ItemStore::new(), ids)
    }

    #[test]
    fn test_equal_split_sums_to_item_cost() {
        let (_, mut items, ids) = setup();
        let pizza = items.add("Pizza", 10.0, 3);
        items.toggle_assignment(pizza, ids[0]).unwrap();
        items.toggle_assignment(pizza, ids[2]).unwrap();

        let item = items.get(pizza).unwrap();
        let shares: f64 = ids.iter().map(|&p| item_share(item, p)).sum();
        assert!((shares - 30.0).abs() < EPS);
        assert!((item_share(item, ids[0]) - 15.0).abs() < EPS);
        assert_eq!(item_share(item, ids[1]), 0.0);
    }

    #[test]
    fn test_unassigned_item_costs_nobody() {
        let (people, mut items, ids) = setup();
        let salad = items.add("Salad", 9.0, 1);
        let item = items.get(salad).unwrap();
        assert!(ids.iter().all(|&p| item_share(item, p) == 0.0));

        let summary = ReceiptSummary { subtotal: 9.0, tax: 1.0, ..Default::default() };
        let breakdown = compute_breakdown(items.items(), people.people(), &summary);
        assert!(breakdown.people.iter().all(|t| t.total == 0.0));
        assert_eq!(breakdown.unassigned, 9.0);
        assert_eq!(breakdown.allocated, 0.0);
    }

    #[test]
    fn test_toggle_assignment_keeps_selection_flag() {
        let (_, mut items, ids) = setup();
        let tea = items.add("Tea", 3.0, 1);
        items.toggle_everyone(tea, &ids).unwrap();
        items.toggle_assignment(tea, ids[1]).unwrap();
        let item = items.get(tea).unwrap();
        assert!(item.is_selected);
        assert!(!item.is_assigned(ids[1]));
        items.toggle_assignment(tea, ids[1]).unwrap();
        assert!(items.get(tea).unwrap().is_assigned(ids[1]));
    }

    #[test]
    fn test_toggle_everyone_round_trip() {
        let (_, mut items, ids) = setup();
        let nachos = items.add("Nachos", 12.0, 1);
        items.toggle_assignment(nachos, ids[0]).unwrap();

        items.toggle_everyone(nachos, &ids).unwrap();
        let mut assigned: Vec<PersonId> = items.get(nachos).unwrap().assignments.iter().map(|a| a.person).collect();
        assigned.sort();
        assert_eq!(assigned, ids);

        items.toggle_everyone(nachos, &ids).unwrap();
        let item = items.get(nachos).unwrap();
        assert!(item.assignments.is_empty());
        assert!(!item.is_selected);
    }

    #[test]
    fn test_zero_receipt_subtotal_gives_zero_tax_and_tip() {
        let (people, mut items, ids) = setup();
        let wings = items.add("Wings", 8.0, 1);
        items.toggle_everyone(wings, &ids).unwrap();
        let summary = ReceiptSummary { subtotal: 0.0, tax: 2.0, tip: 5.0, ..Default::default() };
        let breakdown = compute_breakdown(items.items(), people.people(), &summary);
        for t in &breakdown.people {
            assert_eq!(t.tax, 0.0);
            assert_eq!(t.tip, 0.0);
            assert!(t.total.is_finite());
        }
    }

    #[test]
    fn test_proportional_tax_and_tip() {
        let (people, mut items, ids) = setup();
        let steak = items.add("Steak", 30.0, 1);
        let soup = items.add("Soup", 10.0, 1);
        items.toggle_assignment(steak, ids[0]).unwrap();
        items.toggle_assignment(soup, ids[1]).unwrap();
        let summary = ReceiptSummary { subtotal: 40.0, tax: 4.0, tip: 8.0, ..Default::default() };

        let breakdown = compute_breakdown(items.items(), people.people(), &summary);
        let alice = &breakdown.people[0];
        assert!((alice.subtotal - 30.0).abs() < EPS);
        assert!((alice.tax - 3.0).abs() < EPS);
        assert!((alice.tip - 6.0).abs() < EPS);
        assert!((alice.total - 39.0).abs() < EPS);
        let carol = &breakdown.people[2];
        assert_eq!(carol.total, 0.0);
    }

    #[test]
    fn test_weighted_split() {
        let (_, mut items, ids) = setup();
        let wine = items.add("Wine", 40.0, 1);
        items
            .set_weights(
                wine,
                &[
                    Assignment { person: ids[0], weight: 1.0 },
                    Assignment { person: ids[1], weight: 5.0 },
                    Assignment { person: ids[1], weight: 3.0 },
                ],
            )
            .unwrap();
        let item = items.get(wine).unwrap();
        assert_eq!(item.assignments.len(), 2);
        assert!((item_share(item, ids[0]) - 10.0).abs() < EPS);
        assert!((item_share(item, ids[1]) - 30.0).abs() < EPS);
    }

    #[test]
    fn test_invalid_weights_rejected_without_mutation() {
        let (_, mut items, ids) = setup();
        let wine = items.add("Wine", 40.0, 1);
        items.toggle_assignment(wine, ids[0]).unwrap();
        for weight in [0.0, -1.0, f64::NAN] {
            let err = items
                .set_weights(wine, &[Assignment { person: ids[1], weight }])
                .unwrap_err();
            assert!(matches!(err, SplitError::InvalidWeight { .. }));
        }
        assert!(items.get(wine).unwrap().is_assigned(ids[0]));
    }

    #[test]
    fn test_assignment_defaults_to_everyone() {
        let (_, mut items, ids) = setup();
        let cake = items.add("Cake", 6.0, 1);
        let draft = items.assignment_or_everyone(cake, &ids).unwrap();
        assert_eq!(draft.len(), 3);
        items.toggle_assignment(cake, ids[2]).unwrap();
        let draft = items.assignment_or_everyone(cake, &ids).unwrap();
        assert_eq!(draft, vec![Assignment::equal(ids[2])]);
    }

    #[test]
    fn test_toggle_unknown_item() {
        let (_, mut items, ids) = setup();
        assert!(matches!(
            items.toggle_assignment(ItemId(9), ids[0]),
            Err(SplitError::UnknownItem(_))
        ));
    }
}
