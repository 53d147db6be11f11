//! Well identifier translation
//!
//! UK offshore wells are named two ways. The national quadrant/block-well
//! scheme used by BGS writes `015/09-0019` (zero-padded quadrant and well
//! numbers). The NDR register stores the same well as `15/09- 19`: leading
//! zeros stripped from both halves, exactly one space after the hyphen and
//! none before. The two forms are isomorphic up to zero-padding and
//! punctuation, and the transforms here are exact inverses on well-formed
//! input.
//!
//! Both functions are pure; neither touches the network or the register.

/// Error for identifier strings that do not match the expected shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WellIdError {
    /// The id does not split into exactly two halves on `-`.
    #[error("well id '{0}' does not split into two halves on '-'")]
    DashSplit(String),
    /// The part before the `-` carries no `quadrant/block` slash.
    #[error("well id '{0}' has no '<quadrant>/<block>' before the '-'")]
    QuadrantSplit(String),
}

/// Convert a national (BGS) well id to the NDR register form.
///
/// Splits on `-`, strips leading zeros from each half independently and
/// rejoins with `"- "` — one space after the hyphen, none before. Anything
/// after a `/` in the left half is carried through untouched:
/// `015/09-0019` becomes `15/09- 19`.
pub fn bgs_to_ndr(id: &str) -> Result<String, WellIdError> {
    let parts: Vec<&str> = id.split('-').collect();
    if parts.len() != 2 {
        return Err(WellIdError::DashSplit(id.to_string()));
    }
    let left = parts[0].trim_start_matches('0');
    let right = parts[1].trim_start_matches('0');
    Ok(format!("{}- {}", left, right))
}

/// Convert an NDR register well id back to the national (BGS) form.
///
/// Splits on `-`, trims whitespace from the right half, splits the left half
/// into quadrant and block on `/`, zero-pads quadrant and well number to
/// width 3 and rejoins: `15/9- 19` becomes `015/9-019`.
pub fn ndr_to_bgs(id: &str) -> Result<String, WellIdError> {
    let parts: Vec<&str> = id.split('-').collect();
    if parts.len() != 2 {
        return Err(WellIdError::DashSplit(id.to_string()));
    }
    let well = parts[1].trim();
    let halves: Vec<&str> = parts[0].split('/').collect();
    if halves.len() != 2 {
        return Err(WellIdError::QuadrantSplit(id.to_string()));
    }
    Ok(format!(
        "{}/{}-{}",
        pad_to_three(halves[0]),
        halves[1],
        pad_to_three(well)
    ))
}

/// Zero-pad a numeric fragment to width 3. Fragments already 3 characters
/// or longer pass through unchanged — never truncated.
pub fn pad_to_three(fragment: &str) -> String {
    match fragment.chars().count() {
        1 => format!("00{}", fragment),
        2 => format!("0{}", fragment),
        _ => fragment.to_string(),
    }
}
