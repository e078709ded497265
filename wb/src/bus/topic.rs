//! Topic naming and filter matching

/// Build a topic from the application prefix and a command name
pub fn join(namespace: &str, command: &str) -> String {
    format!("{}/{}", namespace, command)
}

/// Wildcard filter covering every topic under a namespace
pub fn all_under(namespace: &str) -> String {
    format!("{}/#", namespace)
}

/// Check whether a topic filter matches a concrete topic
///
/// Levels are separated by `/`. `+` matches exactly one level and a trailing
/// `#` matches any number of remaining levels, including none.
pub fn matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return filter_levels.next().is_none(),
            (Some("+"), Some(_)) => continue,
            (Some(f), Some(t)) if f == t => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join() {
        assert_eq!(join("app", "set_ftp"), "app/set_ftp");
        assert_eq!(all_under("app"), "app/#");
    }

    #[test]
    fn test_exact_match() {
        assert!(matches("app/set_ftp", "app/set_ftp"));
        assert!(!matches("app/set_ftp", "app/set_ftp_x"));
        assert!(!matches("app/set_ftp", "app"));
        assert!(!matches("app", "app/set_ftp"));
    }

    #[test]
    fn test_hash_wildcard() {
        assert!(matches("app/#", "app/set_ftp"));
        assert!(matches("app/#", "app/a/b/c"));
        assert!(matches("app/#", "app"));
        assert!(matches("#", "anything/at/all"));
        assert!(!matches("app/#", "other/set_ftp"));
        // '#' is only valid as the last level
        assert!(!matches("app/#/x", "app/y/x"));
    }

    #[test]
    fn test_plus_wildcard() {
        assert!(matches("+/set_ftp", "app/set_ftp"));
        assert!(matches("app/+", "app/stop_plan"));
        assert!(!matches("app/+", "app/a/b"));
        assert!(!matches("app/+", "app"));
    }
}
