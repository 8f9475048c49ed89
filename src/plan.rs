// src/plan.rs

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::errors::{ConfigError, SplitError};
use crate::items::{Assignment, ItemEdit, ItemId};
use crate::manual::{DraftRow, ManualEntry};
use crate::people::PersonId;
use crate::receipt::ImageRef;
use crate::session::{Session, Step};

/// A declarative bill split, read from TOML.
///
/// ```toml
/// receipt = "dinner.jpg"
/// people = ["Alice", "Bob", "Carol"]
/// remove = ["Carol"]
/// remove_items = ["Bread"]
///
/// [[add_item]]
/// name = "Corkage"
/// price = "15"
///
/// [[edit]]
/// item = "Burger"
/// price = "11.50"
///
/// [[assign]]
/// item = "Burger"
/// people = ["Alice"]
///
/// [[assign]]
/// item = "Fries"
/// everyone = true
/// ```
#[derive(Debug, Deserialize)]
pub struct SplitPlan {
    pub receipt: Option<PathBuf>,
    pub manual: Option<ManualPlan>,
    #[serde(default)]
    pub add_item: Vec<AddItemRule>,
    #[serde(default)]
    pub edit: Vec<EditRule>,
    #[serde(default)]
    pub remove_items: Vec<String>,
    #[serde(default)]
    pub people: Vec<String>,
    /// Participants dropped again after being added; their assignments go too.
    #[serde(default)]
    pub remove: Vec<String>,
    #[serde(default)]
    pub assign: Vec<AssignRule>,
}

#[derive(Debug, Deserialize)]
pub struct ManualPlan {
    #[serde(default)]
    pub rows: Vec<DraftRow>,
    #[serde(default)]
    pub tax: String,
    #[serde(default)]
    pub tip: String,
    #[serde(default = "default_tip_percentage")]
    pub tip_percentage: bool,
}

fn default_tip_percentage() -> bool {
    true
}

/// An extra item typed in after the receipt was read. Fields are raw input.
#[derive(Debug, Deserialize)]
pub struct AddItemRule {
    pub name: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub count: String,
}

#[derive(Debug, Deserialize)]
pub struct EditRule {
    pub item: String,
    pub name: Option<String>,
    pub price: Option<String>,
    pub count: Option<String>,
}

/// How one item is shared. With no people, weights or `everyone`, an
/// unassigned item goes to everyone.
#[derive(Debug, Deserialize)]
pub struct AssignRule {
    pub item: String,
    #[serde(default)]
    pub people: Vec<String>,
    #[serde(default)]
    pub everyone: bool,
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,
}

impl SplitPlan {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// The receipt path, relative to the directory the plan lives in.
    pub fn receipt_path(&self, plan_path: &Path) -> Option<PathBuf> {
        let receipt = self.receipt.as_ref()?;
        let base = plan_path.parent().unwrap_or(Path::new(""));
        Some(base.join(receipt))
    }

    /// Drive `session` through every step, ending on the summary.
    ///
    /// `extracted` carries the receipt fingerprint and its recognised text
    /// when the plan names a receipt.
    pub fn run(&self, session: &mut Session, extracted: Option<(ImageRef, &str)>) -> Result<(), SplitError> {
        match extracted {
            Some((image, text)) => {
                session.attach_image(image);
                session.advance()?;
                session.ingest_text(text);
                session.advance()?;
            }
            None => session.skip_to_manual(),
        }

        if let Some(manual) = &self.manual {
            // Receipt read fine but the plan adds manual rows on top
            if session.step() == Step::Participants {
                session.back();
            }
            fill_manual(&mut session.manual, manual)?;
        }
        if session.step() == Step::ManualEntry {
            commit_manual(session)?;
        }

        for rule in &self.add_item {
            add_item(session, rule)?;
        }
        for rule in &self.edit {
            edit_item(session, rule)?;
        }
        for name in &self.remove_items {
            let id = item_id(session, name)?;
            session.items.remove(id);
        }
        if session.items.is_empty() {
            warn!("Nothing to split: no items on the bill");
        }

        for name in &self.people {
            session.add_person(name)?;
        }
        for name in &self.remove {
            let id = person_id(session, name)?;
            session.remove_person(id);
        }
        session.advance()?;

        for rule in &self.assign {
            apply_rule(session, rule)?;
        }
        session.advance()?;

        info!(
            items = session.items.len(),
            people = session.people.len(),
            rules = self.assign.len(),
            "Plan applied"
        );
        Ok(())
    }
}

/// Type the plan's rows into a fresh form, the way a user would.
fn fill_manual(entry: &mut ManualEntry, plan: &ManualPlan) -> Result<(), SplitError> {
    entry.replace_rows(vec![DraftRow::default()]);
    if plan.rows.is_empty() {
        entry.remove_row(0);
    }
    for (idx, row) in plan.rows.iter().enumerate() {
        if idx > 0 {
            entry.add_row();
        }
        entry.set_name(idx, &row.name);
        if !entry.set_price(idx, &row.price) {
            return Err(SplitError::InvalidPrice {
                item: row.name.clone(),
                input: row.price.clone(),
            });
        }
        entry.set_count(idx, &row.count.to_string());
    }
    entry.tax = plan.tax.clone();
    entry.tip = plan.tip.clone();
    entry.tip_is_percentage = plan.tip_percentage;
    info!(
        rows = entry.rows().len(),
        total = ?entry.display_total(),
        "Manual entry filled"
    );
    Ok(())
}

fn commit_manual(session: &mut Session) -> Result<(), SplitError> {
    if let Err(e) = session.advance() {
        for problem in [session.manual.tax_error(), session.manual.tip_error()].into_iter().flatten() {
            warn!(%problem, "Manual entry incomplete");
        }
        return Err(e);
    }
    Ok(())
}

fn add_item(session: &mut Session, rule: &AddItemRule) -> Result<(), SplitError> {
    let id = session.items.add_blank();
    session.items.edit(id, ItemEdit::Name(rule.name.clone()))?;
    if !session.items.edit(id, ItemEdit::Price(rule.price.clone()))? {
        session.items.remove(id);
        return Err(SplitError::InvalidPrice {
            item: rule.name.clone(),
            input: rule.price.clone(),
        });
    }
    session.items.edit(id, ItemEdit::Count(rule.count.clone()))?;
    info!(item = %id, name = %rule.name, "Item added");
    Ok(())
}

fn edit_item(session: &mut Session, rule: &EditRule) -> Result<(), SplitError> {
    let id = item_id(session, &rule.item)?;
    if let Some(price) = &rule.price {
        if !session.items.edit(id, ItemEdit::Price(price.clone()))? {
            return Err(SplitError::InvalidPrice {
                item: rule.item.clone(),
                input: price.clone(),
            });
        }
    }
    if let Some(count) = &rule.count {
        session.items.edit(id, ItemEdit::Count(count.clone()))?;
    }
    if let Some(name) = &rule.name {
        session.items.edit(id, ItemEdit::Name(name.clone()))?;
    }
    Ok(())
}

fn apply_rule(session: &mut Session, rule: &AssignRule) -> Result<(), SplitError> {
    let item = item_id(session, &rule.item)?;

    if rule.everyone {
        return session.toggle_everyone(item);
    }
    if !rule.weights.is_empty() {
        let weights = rule
            .weights
            .iter()
            .map(|(name, &weight)| Ok(Assignment { person: person_id(session, name)?, weight }))
            .collect::<Result<Vec<_>, SplitError>>()?;
        return session.items.set_weights(item, &weights);
    }
    if rule.people.is_empty() {
        let draft = session.items.assignment_or_everyone(item, &session.people.ids())?;
        return session.items.set_weights(item, &draft);
    }
    for name in &rule.people {
        let person = person_id(session, name)?;
        assign_once(session, item, person)?;
    }
    Ok(())
}

fn item_id(session: &Session, name: &str) -> Result<ItemId, SplitError> {
    session
        .items
        .find_by_name(name)
        .map(|i| i.id)
        .ok_or_else(|| SplitError::UnknownItem(name.to_string()))
}

fn person_id(session: &Session, name: &str) -> Result<PersonId, SplitError> {
    session
        .people
        .find_by_name(name)
        .map(|p| p.id)
        .ok_or_else(|| SplitError::UnknownPerson(name.to_string()))
}

/// Toggle only if not already on, so repeated names don't cancel out.
fn assign_once(session: &mut Session, item: ItemId, person: PersonId) -> Result<(), SplitError> {
    let already = session.items.get(item).is_some_and(|i| i.is_assigned(person));
    if already {
        return Ok(());
    }
    session.toggle_assignment(item, person)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn parse_plan(toml_src: &str) -> SplitPlan {
        toml::from_str(toml_src).unwrap()
    }

    #[test]
    fn test_manual_plan() {
        let plan = parse_plan(
            r#"
            people = ["Alice", "Bob"]

            [manual]
            rows = [{ name = "Pizza", price = "20.00" }, { name = "Soda", price = "2", count = 2 }]
            tax = "2.40"
            tip = "10"
            tip_percentage = true

            [[assign]]
            item = "Pizza"
            everyone = true

            [[assign]]
            item = "Soda"
            people = ["bob", "Bob"]
            "#,
        );
        let mut session = Session::new();
        plan.run(&mut session, None).unwrap();
        assert_eq!(session.step(), Step::Summary);

        let breakdown = session.breakdown();
        let alice = &breakdown.people[0];
        let bob = &breakdown.people[1];
        assert!((alice.subtotal - 10.0).abs() < EPS);
        assert!((bob.subtotal - 14.0).abs() < EPS);
        // subtotal 24, tax 2.40, tip 2.40
        assert!((alice.total - 12.0).abs() < EPS);
        assert!((bob.total - 16.8).abs() < EPS);
    }

    #[test]
    fn test_receipt_plan_with_weights() {
        let plan = parse_plan(
            r#"
            receipt = "dinner.txt"
            people = ["Alice", "Bob"]

            [[assign]]
            item = "Burger"
            weights = { Alice = 3.0, Bob = 1.0 }
            "#,
        );
        let text = "Grill\nBurger $12.00\nSubtotal $12.00\nTotal $12.00";
        let image = ImageRef {
            file_name: "dinner.txt".into(),
            sha256: "ab".into(),
        };
        let mut session = Session::new();
        plan.run(&mut session, Some((image, text))).unwrap();

        let breakdown = session.breakdown();
        assert!((breakdown.people[0].total - 9.0).abs() < EPS);
        assert!((breakdown.people[1].total - 3.0).abs() < EPS);
        assert_eq!(
            plan.receipt_path(Path::new("plans/dinner.toml")),
            Some(PathBuf::from("plans/dinner.txt"))
        );
    }

    #[test]
    fn test_unknown_names_are_reported() {
        let plan = parse_plan(
            r#"
            people = ["Alice"]
            [manual]
            rows = [{ name = "Tea", price = "3" }]
            tax = "0"
            tip = "0"

            [[assign]]
            item = "Coffee"
            people = ["Alice"]
            "#,
        );
        let err = plan.run(&mut Session::new(), None).unwrap_err();
        assert_eq!(err, SplitError::UnknownItem("Coffee".into()));

        let plan = parse_plan(
            r#"
            people = ["Alice"]
            [manual]
            rows = [{ name = "Tea", price = "3" }]
            tax = "0"
            tip = "0"

            [[assign]]
            item = "Tea"
            people = ["Zed"]
            "#,
        );
        let err = plan.run(&mut Session::new(), None).unwrap_err();
        assert_eq!(err, SplitError::UnknownPerson("Zed".into()));
    }

    #[test]
    fn test_plan_without_people_is_blocked() {
        let plan = parse_plan(
            r#"
            [manual]
            rows = [{ name = "Tea", price = "3" }]
            tax = "0"
            tip = "0"
            "#,
        );
        assert_eq!(plan.run(&mut Session::new(), None), Err(SplitError::NoParticipants));
    }

    #[test]
    fn test_item_edits_and_removals() {
        let plan = parse_plan(
            r#"
            receipt = "dinner.txt"
            people = ["Alice", "Bob", "Carol"]
            remove = ["carol"]
            remove_items = ["Bread"]

            [[add_item]]
            name = "Corkage"
            price = "$15"

            [[edit]]
            item = "Burger"
            price = "10.00"
            count = "2"

            [[assign]]
            item = "Burger"
            people = ["Alice", "Carol"]

            [[assign]]
            item = "Corkage"
            "#,
        );
        let text = "Grill\nBurger $12.00\nBread $3.00\nSubtotal $35.00\nTotal $35.00";
        let image = ImageRef {
            file_name: "dinner.txt".into(),
            sha256: "cd".into(),
        };
        let mut session = Session::new();
        let err = plan.run(&mut session, Some((image, text))).unwrap_err();
        // Carol was removed before assignment
        assert_eq!(err, SplitError::UnknownPerson("Carol".into()));
        assert!(session.items.find_by_name("Bread").is_none());
        let burger = session.items.find_by_name("Burger").unwrap();
        assert_eq!(burger.price, 10.0);
        assert_eq!(burger.count, 2);
        assert_eq!(session.people.len(), 2);
    }

    #[test]
    fn test_unqualified_assign_goes_to_everyone() {
        let plan = parse_plan(
            r#"
            people = ["Alice", "Bob"]

            [manual]
            rows = [{ name = "Pizza", price = "20" }]
            tax = "0"
            tip = "0"

            [[add_item]]
            name = "Cake"
            price = "6"
            count = "0"

            [[assign]]
            item = "Pizza"
            people = ["Alice"]

            [[assign]]
            item = "Pizza"

            [[assign]]
            item = "Cake"
            "#,
        );
        let mut session = Session::new();
        plan.run(&mut session, None).unwrap();

        let breakdown = session.breakdown();
        // Pizza keeps its explicit assignment, cake is shared
        assert!((breakdown.people[0].subtotal - 23.0).abs() < EPS);
        assert!((breakdown.people[1].subtotal - 3.0).abs() < EPS);
        assert_eq!(session.items.find_by_name("Cake").unwrap().count, 1);
    }

    #[test]
    fn test_rejected_prices_are_reported() {
        let plan = parse_plan(
            r#"
            people = ["Alice"]
            [manual]
            rows = [{ name = "Pizza", price = "20" }]
            tax = "0"
            tip = "0"

            [[edit]]
            item = "Pizza"
            price = "1.2.3"
            "#,
        );
        let mut session = Session::new();
        let err = plan.run(&mut session, None).unwrap_err();
        assert!(matches!(err, SplitError::InvalidPrice { .. }));
        assert_eq!(session.items.find_by_name("Pizza").unwrap().price, 20.0);

        let plan = parse_plan(
            r#"
            [manual]
            rows = [{ name = "Pizza", price = "2..0" }]
            tax = "0"
            tip = "0"
            "#,
        );
        assert!(matches!(
            plan.run(&mut Session::new(), None),
            Err(SplitError::InvalidPrice { .. })
        ));
    }

    #[test]
    fn test_manual_rows_on_top_of_receipt() {
        let plan = parse_plan(
            r#"
            receipt = "dinner.txt"
            people = ["Alice"]

            [manual]
            rows = [{ name = "Shake", price = "5" }]
            tax = "1"
            tip = "0"
            tip_percentage = false
            "#,
        );
        let text = "Grill\nBurger $12.00\nSubtotal $12.00\nTotal $12.00";
        let image = ImageRef {
            file_name: "dinner.txt".into(),
            sha256: "ef".into(),
        };
        let mut session = Session::new();
        plan.run(&mut session, Some((image, text))).unwrap();
        assert_eq!(session.items.len(), 2);
        assert_eq!(session.summary.merchant, "Grill");
        assert!((session.summary.total - 6.0).abs() < EPS);
    }

    #[test]
    fn test_manual_plan_without_rows() {
        let plan = parse_plan(
            r#"
            people = ["Alice"]
            [manual]
            tax = "1"
            tip = "1"
            "#,
        );
        assert_eq!(plan.run(&mut Session::new(), None), Err(SplitError::NoDraftRows));
    }
}
