//! Card number display helpers.

/// The last four digits of a PAN, or `None` if it is shorter than four.
#[must_use]
pub fn last_four(pan: &str) -> Option<&str> {
    if pan.len() < 4 || !pan.is_ascii() {
        return None;
    }
    Some(&pan[pan.len() - 4..])
}

/// Masks a PAN for display as `**** **** **** 0366`.
///
/// Inputs too short to mask are fully starred.
#[must_use]
pub fn mask_pan(pan: &str) -> String {
    match last_four(pan) {
        Some(tail) => format!("**** **** **** {tail}"),
        None => "****".to_string(),
    }
}
