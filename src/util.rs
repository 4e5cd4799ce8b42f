use chrono::Local;
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Length of the random suffix appended to the date in a session id.
const SESSION_ID_SUFFIX_LEN: usize = 16;

/// Generate a session id: the local date followed by 16 random alphanumerics.
pub fn session_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!("{}{}", Local::now().format("%Y-%m-%d"), suffix)
}

/// Remove every occurrence of each pattern from the input.
pub fn remove_substrings(input: &str, patterns: &[&str]) -> String {
    let mut result = input.to_string();
    for pattern in patterns {
        result = result.replace(pattern, "");
    }
    result
}

/// Shorten a string for log output, appending an ellipsis when cut.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let head: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{head}...")
}

#[cfg(test)]
mod tests {
    use super::{remove_substrings, session_id, truncate};

    #[test]
    fn session_id_has_date_prefix_and_random_suffix() {
        let id = session_id();
        assert_eq!(id.chars().count(), 10 + 16);
        let (date, suffix) = id.split_at(10);
        assert_eq!(&date[4..5], "-");
        assert_eq!(&date[7..8], "-");
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn session_ids_are_unique_enough() {
        assert_ne!(session_id(), session_id());
    }

    #[test]
    fn remove_substrings_strips_all_occurrences() {
        let cleaned = remove_substrings("* as THREE ", &["*", " as ", "{", "}", " "]);
        assert_eq!(cleaned, "THREE");
    }

    #[test]
    fn truncate_appends_ellipsis() {
        assert_eq!(truncate("abcdef", 5), "ab...");
        assert_eq!(truncate("abc", 5), "abc");
    }
}
