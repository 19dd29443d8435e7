//! Complaint catalogue served to the booking form.

use crate::AllowLists;
use api_shared::ComplaintEntry;

/// Every allowed complaint with the specialty it triages to, in catalogue order.
pub fn complaint_catalog(allow: &AllowLists) -> Vec<ComplaintEntry> {
    allow
        .complaints()
        .map(|(label, specialty)| ComplaintEntry {
            label: label.to_string(),
            specialty: specialty.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_matches_allow_list() {
        let allow = AllowLists::standard();
        let entries = complaint_catalog(&allow);

        assert_eq!(entries.len(), 14);
        assert!(entries.iter().all(|e| allow.is_complaint(&e.label)));
        assert!(entries.iter().all(|e| allow.is_specialty(&e.specialty)));
        let chest = entries.iter().find(|e| e.label == "Chest pain").unwrap();
        assert_eq!(chest.specialty, "Cardiology");
    }
}
