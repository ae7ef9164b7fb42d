//! Canonical symptom set and its free-text mirror.
//!
//! `InputReconciler` is the only writer of the selected symptoms. Every
//! mutation re-derives the comma-joined text in the same call, so the set
//! and the text never diverge between observations.

use serde::Serialize;

/// Fixed selection installed by an example prediction.
pub const EXAMPLE_SYMPTOMS: &[&str] = &["fever", "cough", "headache"];

/// Separator used when serialising the set back to text.
const TEXT_SEPARATOR: &str = ", ";

/// Which screen the user is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveView {
    #[default]
    Predict,
    Symptoms,
    Manage,
}

/// Split raw text on commas, trim, drop empty segments. Keeps duplicates.
pub fn parse_symptom_text(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

// ═══════════════════════════════════════════════════════════
// CanonicalSymptomSet
// ═══════════════════════════════════════════════════════════

/// Ordered symptom selection; insertion order is display order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CanonicalSymptomSet {
    items: Vec<String>,
}

impl CanonicalSymptomSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.iter().any(|s| s == name)
    }

    pub fn to_text(&self) -> String {
        self.items.join(TEXT_SEPARATOR)
    }

    fn push_unique(&mut self, name: &str) -> bool {
        if self.contains(name) {
            return false;
        }
        self.items.push(name.to_string());
        true
    }
}

// ═══════════════════════════════════════════════════════════
// InputReconciler
// ═══════════════════════════════════════════════════════════

/// Atomic view of the selection and its text form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymptomSnapshot {
    pub symptoms: Vec<String>,
    pub text: String,
}

/// Keeps typed text, catalog clicks and the canonical set in step.
#[derive(Debug, Clone, Default)]
pub struct InputReconciler {
    set: CanonicalSymptomSet,
    text: String,
    view: ActiveView,
}

impl InputReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) -> &CanonicalSymptomSet {
        &self.set
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn view(&self) -> ActiveView {
        self.view
    }

    pub fn set_view(&mut self, view: ActiveView) {
        self.view = view;
    }

    pub fn snapshot(&self) -> SymptomSnapshot {
        SymptomSnapshot {
            symptoms: self.set.as_slice().to_vec(),
            text: self.text.clone(),
        }
    }

    /// Append a symptom unless it is already selected, and switch to the
    /// prediction view. Returns `true` if the set changed.
    ///
    /// A name containing commas is added segment by segment so the text
    /// form stays re-parseable into the same set.
    pub fn add_symptom(&mut self, name: &str) -> bool {
        let mut changed = false;
        for segment in parse_symptom_text(name) {
            changed |= self.set.push_unique(&segment);
        }
        if changed {
            self.view = ActiveView::Predict;
            self.sync_text();
        }
        changed
    }

    /// Remove a selected symptom. Returns `true` if it was present.
    pub fn remove_symptom(&mut self, name: &str) -> bool {
        let name = name.trim();
        let Some(index) = self.set.items.iter().position(|s| s == name) else {
            return false;
        };
        self.set.items.remove(index);
        self.sync_text();
        true
    }

    /// Replace the whole selection from typed text.
    ///
    /// Duplicates in the text are kept, unlike `add_symptom`.
    pub fn set_from_text(&mut self, raw: &str) {
        self.set.items = parse_symptom_text(raw);
        self.sync_text();
    }

    /// Empty the selection and the text together.
    pub fn clear_all(&mut self) {
        self.set.items.clear();
        self.text.clear();
    }

    /// Overwrite the selection wholesale (example prediction).
    pub fn replace_all<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.set.items = names
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        self.sync_text();
    }

    fn sync_text(&mut self) {
        self.text = self.set.to_text();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_duplicates(items: &[String]) -> bool {
        items
            .iter()
            .enumerate()
            .any(|(i, a)| items[i + 1..].iter().any(|b| a == b))
    }

    #[test]
    fn add_appends_in_order_and_syncs_text() {
        let mut input = InputReconciler::new();
        assert!(input.add_symptom("fever"));
        assert!(input.add_symptom("cough"));
        assert_eq!(input.set().as_slice(), ["fever", "cough"]);
        assert_eq!(input.text(), "fever, cough");
    }

    #[test]
    fn add_existing_is_noop() {
        let mut input = InputReconciler::new();
        input.add_symptom("fever");
        input.set_view(ActiveView::Manage);
        assert!(!input.add_symptom("fever"));
        assert_eq!(input.set().len(), 1);
        // No change, so no navigation either
        assert_eq!(input.view(), ActiveView::Manage);
    }

    #[test]
    fn add_is_case_sensitive() {
        let mut input = InputReconciler::new();
        input.add_symptom("Fever");
        assert!(input.add_symptom("fever"));
        assert_eq!(input.set().len(), 2);
    }

    #[test]
    fn add_switches_to_predict_view() {
        let mut input = InputReconciler::new();
        input.set_view(ActiveView::Symptoms);
        input.add_symptom("itching");
        assert_eq!(input.view(), ActiveView::Predict);
    }

    #[test]
    fn add_trims_and_ignores_blank_names() {
        let mut input = InputReconciler::new();
        assert!(!input.add_symptom("   "));
        assert!(input.add_symptom("  chills "));
        assert_eq!(input.set().as_slice(), ["chills"]);
    }

    #[test]
    fn add_with_comma_adds_each_segment() {
        let mut input = InputReconciler::new();
        input.add_symptom("fever");
        input.add_symptom("nausea, fever");
        assert_eq!(input.set().as_slice(), ["fever", "nausea"]);
    }

    #[test]
    fn remove_drops_symptom_and_syncs_text() {
        let mut input = InputReconciler::new();
        input.add_symptom("fever");
        input.add_symptom("cough");
        input.add_symptom("headache");
        assert!(input.remove_symptom("cough"));
        assert_eq!(input.set().as_slice(), ["fever", "headache"]);
        assert_eq!(input.text(), "fever, headache");
        assert!(!input.remove_symptom("cough"));
    }

    #[test]
    fn set_from_text_keeps_duplicates() {
        let mut input = InputReconciler::new();
        input.set_from_text("fever, cough, fever");
        assert_eq!(input.set().as_slice(), ["fever", "cough", "fever"]);
    }

    #[test]
    fn add_after_duplicated_text_still_refuses_duplicates() {
        let mut input = InputReconciler::new();
        input.set_from_text("fever, cough, fever");
        assert!(!input.add_symptom("fever"));
        assert_eq!(input.set().len(), 3);
    }

    #[test]
    fn set_from_text_trims_and_drops_empty_segments() {
        let mut input = InputReconciler::new();
        input.set_from_text(" fever ,, ,cough,");
        assert_eq!(input.set().as_slice(), ["fever", "cough"]);
        assert_eq!(input.text(), "fever, cough");
    }

    #[test]
    fn set_from_text_replaces_previous_selection() {
        let mut input = InputReconciler::new();
        input.add_symptom("rash");
        input.set_from_text("fatigue");
        assert_eq!(input.set().as_slice(), ["fatigue"]);
    }

    #[test]
    fn clear_all_empties_set_and_text_together() {
        let mut input = InputReconciler::new();
        input.set_from_text("fever, cough");
        input.clear_all();
        let snapshot = input.snapshot();
        assert!(snapshot.symptoms.is_empty());
        assert!(snapshot.text.is_empty());
    }

    #[test]
    fn replace_all_overwrites_selection() {
        let mut input = InputReconciler::new();
        input.add_symptom("rash");
        input.replace_all(EXAMPLE_SYMPTOMS);
        assert_eq!(input.set().as_slice(), ["fever", "cough", "headache"]);
        assert_eq!(input.text(), "fever, cough, headache");
    }

    #[test]
    fn add_remove_sequences_stay_unique_and_round_trip() {
        let names = ["fever", "cough", "headache", "nausea", "Fever", "chills"];
        let mut input = InputReconciler::new();

        // Deterministic pseudo-random walk over add/remove
        let mut seed: u64 = 0x5eed;
        for _ in 0..500 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let name = names[(seed >> 33) as usize % names.len()];
            if (seed >> 20) & 1 == 0 {
                input.add_symptom(name);
            } else {
                input.remove_symptom(name);
            }

            let snapshot = input.snapshot();
            assert!(!has_duplicates(&snapshot.symptoms));
            assert_eq!(snapshot.text, snapshot.symptoms.join(", "));

            let mut reparsed = InputReconciler::new();
            reparsed.set_from_text(&snapshot.text);
            assert_eq!(reparsed.set().as_slice(), snapshot.symptoms.as_slice());
        }
    }

    #[test]
    fn parse_symptom_text_handles_empty_input() {
        assert!(parse_symptom_text("").is_empty());
        assert!(parse_symptom_text(" , ,").is_empty());
    }
}
