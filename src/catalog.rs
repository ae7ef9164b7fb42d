use serde::Serialize;

/// Symptom names recognised by the backend, in the order it returned them.
///
/// Read-only once fetched. A failed fetch leaves the session with an empty
/// catalog, never a missing one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SymptomCatalog {
    names: Vec<String>,
}

impl SymptomCatalog {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Case-insensitive substring search, preserving catalog order.
    pub fn filter(&self, term: &str) -> Vec<&str> {
        let needle = term.trim().to_lowercase();
        self.names
            .iter()
            .filter(|name| needle.is_empty() || name.to_lowercase().contains(&needle))
            .map(String::as_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> SymptomCatalog {
        SymptomCatalog::new(vec![
            "itching".into(),
            "skin_rash".into(),
            "High_Fever".into(),
            "mild_fever".into(),
        ])
    }

    #[test]
    fn empty_term_returns_everything() {
        assert_eq!(catalog().filter("").len(), 4);
        assert_eq!(catalog().filter("   ").len(), 4);
    }

    #[test]
    fn filter_is_case_insensitive_and_ordered() {
        assert_eq!(catalog().filter("FEVER"), vec!["High_Fever", "mild_fever"]);
    }

    #[test]
    fn filter_without_match_is_empty() {
        assert!(catalog().filter("vertigo").is_empty());
    }

    #[test]
    fn default_catalog_is_empty() {
        let empty = SymptomCatalog::default();
        assert!(empty.is_empty());
        assert!(!empty.contains("itching"));
    }
}
