//! Timezone name validation and normalization
use chrono_tz::Tz;
use std::collections::HashMap;
use std::str::FromStr;

lazy_static::lazy_static! {
    /// Names found in feeds that are not canonical tz database names
    static ref ALIASES: HashMap<&'static str, &'static str> = [
        ("us/alaska", "America/Anchorage"),
        ("us/aleutian", "America/Adak"),
        ("us/arizona", "America/Phoenix"),
        ("us/central", "America/Chicago"),
        ("us/east-indiana", "America/Indiana/Indianapolis"),
        ("us/eastern", "America/New_York"),
        ("us/hawaii", "Pacific/Honolulu"),
        ("us/michigan", "America/Detroit"),
        ("us/mountain", "America/Denver"),
        ("us/pacific", "America/Los_Angeles"),
        ("canada/atlantic", "America/Halifax"),
        ("canada/central", "America/Winnipeg"),
        ("canada/eastern", "America/Toronto"),
        ("canada/mountain", "America/Edmonton"),
        ("canada/newfoundland", "America/St_Johns"),
        ("canada/pacific", "America/Vancouver"),
        ("america/montreal", "America/Toronto"),
        ("america/buenos_aires", "America/Argentina/Buenos_Aires"),
        ("america/indianapolis", "America/Indiana/Indianapolis"),
        ("asia/calcutta", "Asia/Kolkata"),
        ("asia/saigon", "Asia/Ho_Chi_Minh"),
        ("asia/katmandu", "Asia/Kathmandu"),
        ("europe/kiev", "Europe/Kyiv"),
        ("australia/act", "Australia/Sydney"),
        ("australia/canberra", "Australia/Sydney"),
        ("australia/nsw", "Australia/Sydney"),
        ("gb", "Europe/London"),
        ("nz", "Pacific/Auckland"),
        ("eastern standard time", "America/New_York"),
        ("central standard time", "America/Chicago"),
        ("mountain standard time", "America/Denver"),
        ("pacific standard time", "America/Los_Angeles"),
    ]
    .into_iter()
    .collect();
}

/// The canonical tz database name of `name`, `None` if it can not be recognized
///
/// ```
/// use gtfs_structures::timezones::normalize;
/// assert_eq!(normalize("US/Pacific"), Some("America/Los_Angeles"));
/// assert_eq!(normalize("europe/paris"), Some("Europe/Paris"));
/// assert_eq!(normalize("Mars/Olympus_Mons"), None);
/// ```
pub fn normalize(name: &str) -> Option<&'static str> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    if let Some(alias) = ALIASES.get(name.to_lowercase().as_str()) {
        return Some(alias);
    }
    Tz::from_str(name)
        .or_else(|_| Tz::from_str_insensitive(name))
        .ok()
        .map(|tz| tz.name())
}

/// True if `name` is a known timezone, exactly as written
pub fn is_valid(name: &str) -> bool {
    Tz::from_str(name).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_names_are_kept() {
        assert_eq!(normalize("America/Chicago"), Some("America/Chicago"));
        assert!(is_valid("Europe/Paris"));
    }

    #[test]
    fn case_and_spaces_are_ignored() {
        assert_eq!(normalize(" america/new_york "), Some("America/New_York"));
        assert!(!is_valid("america/new_york"));
    }

    #[test]
    fn aliases_are_resolved() {
        assert_eq!(normalize("US/Eastern"), Some("America/New_York"));
        assert_eq!(normalize("Asia/Calcutta"), Some("Asia/Kolkata"));
    }

    #[test]
    fn unknown_names() {
        assert_eq!(normalize(""), None);
        assert_eq!(normalize("Nowhere/Land"), None);
        assert!(!is_valid("Nowhere/Land"));
    }
}
