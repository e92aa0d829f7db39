use crate::types::ConfounderCandidate;

/// Candidate names shorter than this never fuzzy-match.
const MIN_FUZZY_LEN: usize = 3;

/// Finds the dataset column a candidate refers to.
///
/// An exact case-insensitive match wins. Otherwise the first column, in
/// declaration order, whose lower-cased name contains the candidate name or is
/// contained in it. Treatment and outcome columns are not filtered here.
pub fn match_candidate(candidate: &ConfounderCandidate, columns: &[String]) -> Option<String> {
    let name = candidate.name.to_lowercase();
    if name.is_empty() {
        return None;
    }

    if let Some(exact) = columns.iter().find(|c| c.to_lowercase() == name) {
        return Some(exact.clone());
    }

    if name.chars().count() < MIN_FUZZY_LEN {
        return None;
    }

    let fuzzy = columns.iter().find(|c| {
        let col = c.to_lowercase();
        col.contains(&name) || name.contains(&col)
    })?;
    log::debug!("Fuzzy-matched candidate '{}' to column '{fuzzy}'", candidate.name);
    Some(fuzzy.clone())
}
