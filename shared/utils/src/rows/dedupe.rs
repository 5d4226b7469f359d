//! Deduplicator
//!
//! Heuristic identity resolution across a whole batch: rows sharing a primary
//! email are the same contact; rows without one are matched on
//! `(phone1, fullName, company)`. The first occurrence wins and input order is
//! preserved.

use std::collections::HashSet;

use cardex_models::ExtractedRow;

/// Composite key deciding whether two rows describe the same contact.
pub fn dedup_key(row: &ExtractedRow) -> String {
    if let Some(email) = &row.email1 {
        return format!("email:{}", email);
    }
    let phone = row.phone1.as_deref().unwrap_or("");
    let name = row.full_name.as_deref().unwrap_or("").to_lowercase();
    let company = row.company.as_deref().unwrap_or("").to_lowercase();
    format!("fallback:{}|{}|{}", phone, name, company)
}

/// Keep the first row for every key, in input order.
pub fn deduplicate_rows(rows: Vec<ExtractedRow>) -> Vec<ExtractedRow> {
    let mut seen_keys = HashSet::with_capacity(rows.len());
    rows.into_iter()
        .filter(|row| seen_keys.insert(dedup_key(row)))
        .collect()
}
