// src/session.rs

use tracing::info;

use crate::allocation::{Breakdown, compute_breakdown};
use crate::errors::SplitError;
use crate::items::{ItemId, ItemStore};
use crate::manual::ManualEntry;
use crate::people::{ParticipantStore, Person, PersonId};
use crate::receipt::{ImageRef, ParsedReceipt, ReceiptSummary, parse_receipt};

/// Where the user is in the split workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Upload,
    Breakdown,
    ManualEntry,
    Participants,
    ItemAssignment,
    Summary,
}

impl Step {
    fn previous(self) -> Self {
        match self {
            Self::Upload | Self::Breakdown => Self::Upload,
            Self::ManualEntry => Self::Breakdown,
            Self::Participants => Self::ManualEntry,
            Self::ItemAssignment => Self::Participants,
            Self::Summary => Self::ItemAssignment,
        }
    }
}

/// Everything one bill-splitting session owns. Passed by reference to
/// whatever drives it; the stores keep replace-the-whole-collection updates.
#[derive(Debug)]
pub struct Session {
    pub items: ItemStore,
    pub people: ParticipantStore,
    pub summary: ReceiptSummary,
    pub manual: ManualEntry,
    step: Step,
    image: Option<ImageRef>,
    extracted_text: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            items: ItemStore::new(),
            people: ParticipantStore::new(),
            summary: ReceiptSummary::default(),
            manual: ManualEntry::new(),
            step: Step::Upload,
            image: None,
            extracted_text: None,
        }
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> Step {
        self.step
    }

    /// Record the image being read. Any text from a previous image is dropped.
    pub fn attach_image(&mut self, image: ImageRef) {
        info!(file = %image.file_name, sha256 = %image.sha256, "Receipt image attached");
        self.image = Some(image);
        self.extracted_text = None;
    }

    /// Parse recognised text, merge its items and replace the receipt summary.
    pub fn ingest_text(&mut self, text: &str) -> ParsedReceipt {
        let parsed = parse_receipt(text);
        let added = self.items.merge_parsed(&parsed.items);
        self.summary = ReceiptSummary {
            original_image: self.image.clone(),
            ..parsed.summary.clone()
        };
        self.extracted_text = Some(text.to_string());

        let (filled, total) = parsed.coverage();
        info!(
            filled,
            total,
            merchant = %self.summary.merchant,
            date = %self.summary.date,
            subtotal = self.summary.subtotal,
            tax = self.summary.tax,
            tip = self.summary.tip,
            receipt_total = self.summary.total,
            parsed_items = parsed.items.len(),
            added,
            "Receipt text ingested"
        );
        parsed
    }

    /// Commit the manual entry draft into the items and the receipt amounts.
    /// Merchant, date and image survive from any earlier OCR pass.
    pub fn commit_manual(&mut self) -> Result<(), SplitError> {
        let commit = {
            let existing = self.items.names();
            self.manual.commit(&existing)?
        };
        self.items.merge_parsed(&commit.items);
        self.summary = ReceiptSummary {
            subtotal: commit.totals.subtotal,
            tax: commit.totals.tax,
            tip: commit.totals.tip,
            total: commit.totals.total,
            ..self.summary.clone()
        };
        Ok(())
    }

    pub fn add_person(&mut self, name: &str) -> Result<PersonId, SplitError> {
        self.people.add(name).map(|p| p.id)
    }

    pub fn remove_person(&mut self, id: PersonId) -> Option<Person> {
        self.people.remove(id, &mut self.items)
    }

    pub fn toggle_assignment(&mut self, item: ItemId, person: PersonId) -> Result<(), SplitError> {
        if self.people.get(person).is_none() {
            return Err(SplitError::UnknownPerson(person.to_string()));
        }
        self.items.toggle_assignment(item, person)
    }

    pub fn toggle_everyone(&mut self, item: ItemId) -> Result<(), SplitError> {
        let everyone = self.people.ids();
        self.items.toggle_everyone(item, &everyone)
    }

    pub fn breakdown(&self) -> Breakdown {
        compute_breakdown(self.items.items(), self.people.people(), &self.summary)
    }

    /// Jump straight from upload to manual entry.
    pub fn skip_to_manual(&mut self) {
        if self.step == Step::Upload {
            self.step = Step::ManualEntry;
        }
    }

    /// Move forward, running whatever the current step has to finish first.
    pub fn advance(&mut self) -> Result<Step, SplitError> {
        let next = match self.step {
            Step::Upload if self.image.is_none() => {
                return Err(SplitError::StepBlocked(self.step, "no receipt image submitted"));
            }
            Step::Upload => Step::Breakdown,
            Step::Breakdown => match &self.extracted_text {
                Some(text) if !text.trim().is_empty() => Step::Participants,
                _ => Step::ManualEntry,
            },
            Step::ManualEntry => {
                self.commit_manual()?;
                Step::Participants
            }
            Step::Participants if self.people.is_empty() => return Err(SplitError::NoParticipants),
            Step::Participants => Step::ItemAssignment,
            Step::ItemAssignment | Step::Summary => Step::Summary,
        };
        info!(from = ?self.step, to = ?next, "Step advanced");
        self.step = next;
        Ok(next)
    }

    pub fn back(&mut self) -> Step {
        self.step = self.step.previous();
        self.step
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;
    const RECEIPT: &str = "Merchant Name\nBurger $12.99\n2 Fries $6.50\nSubtotal $19.49\nTax $1.50\nTotal $20.99";

    fn image() -> ImageRef {
        ImageRef {
            file_name: "r.png".into(),
            sha256: "00".into(),
        }
    }

    #[test]
    fn test_ocr_flow_end_to_end() {
        let mut session = Session::new();
        assert!(matches!(session.advance(), Err(SplitError::StepBlocked(Step::Upload, _))));

        session.attach_image(image());
        assert_eq!(session.advance().unwrap(), Step::Breakdown);
        session.ingest_text(RECEIPT);
        assert_eq!(session.summary.original_image, Some(image()));
        assert_eq!(session.advance().unwrap(), Step::Participants);

        assert_eq!(session.advance(), Err(SplitError::NoParticipants));
        let alice = session.add_person("Alice").unwrap();
        let bob = session.add_person("Bob").unwrap();
        assert_eq!(session.advance().unwrap(), Step::ItemAssignment);

        let burger = session.items.find_by_name("Burger").unwrap().id;
        let fries = session.items.find_by_name("Fries").unwrap().id;
        session.toggle_assignment(burger, alice).unwrap();
        session.toggle_everyone(fries).unwrap();
        assert_eq!(session.advance().unwrap(), Step::Summary);

        let breakdown = session.breakdown();
        let a = &breakdown.people[0];
        let b = &breakdown.people[1];
        assert!((a.subtotal - 19.49).abs() < EPS);
        assert!((b.subtotal - 6.50).abs() < EPS);
        assert!((a.tax + b.tax - 1.50 * 25.99 / 19.49).abs() < EPS);
        assert_eq!(b.person, bob);
    }

    #[test]
    fn test_empty_text_falls_back_to_manual() {
        let mut session = Session::new();
        session.attach_image(image());
        session.advance().unwrap();
        session.ingest_text("   \n");
        assert_eq!(session.advance().unwrap(), Step::ManualEntry);

        // Blocked until tax and tip are present
        assert_eq!(session.advance(), Err(SplitError::MissingTax));
        assert_eq!(session.step(), Step::ManualEntry);

        session.manual.set_name(0, "Pizza");
        session.manual.set_price(0, "20.00");
        session.manual.tax = "2.50".into();
        session.manual.tip = "15".into();
        assert_eq!(session.advance().unwrap(), Step::Participants);
        assert!((session.summary.total - 25.5).abs() < EPS);
        assert_eq!(session.items.len(), 1);
    }

    #[test]
    fn test_manual_commit_keeps_ocr_metadata_and_skips_existing_names() {
        let mut session = Session::new();
        session.ingest_text(RECEIPT);
        session.manual.set_name(0, "Burger");
        session.manual.set_price(0, "1.00");
        session.manual.add_row();
        session.manual.set_name(1, "Shake");
        session.manual.set_price(1, "5");
        session.manual.tax = "0".into();
        session.manual.tip = "0".into();
        session.manual.tip_is_percentage = false;
        session.commit_manual().unwrap();

        assert_eq!(session.summary.merchant, "Merchant Name");
        assert_eq!(session.items.len(), 3);
        assert_eq!(session.items.find_by_name("Burger").unwrap().price, 12.99);
        assert!((session.summary.subtotal - 6.0).abs() < EPS);
    }

    #[test]
    fn test_reingesting_same_text_does_not_duplicate() {
        let mut session = Session::new();
        session.ingest_text(RECEIPT);
        session.ingest_text(RECEIPT);
        assert_eq!(session.items.len(), 2);
    }

    #[test]
    fn test_remove_person_cascades() {
        let mut session = Session::new();
        session.ingest_text(RECEIPT);
        let alice = session.add_person("Alice").unwrap();
        session.add_person("Bob").unwrap();
        let fries = session.items.find_by_name("Fries").unwrap().id;
        session.toggle_everyone(fries).unwrap();

        session.remove_person(alice).unwrap();
        assert!(session.items.items().iter().all(|i| !i.is_assigned(alice)));
        assert!(matches!(
            session.toggle_assignment(fries, alice),
            Err(SplitError::UnknownPerson(_))
        ));
    }

    #[test]
    fn test_navigation() {
        let mut session = Session::new();
        assert_eq!(session.back(), Step::Upload);
        session.skip_to_manual();
        assert_eq!(session.step(), Step::ManualEntry);
        assert_eq!(session.back(), Step::Breakdown);
        assert_eq!(session.back(), Step::Upload);
    }
}
