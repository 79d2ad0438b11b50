/// Command template expansion
///
/// Backup and restore commands are configured as argument lists in which
/// any token may carry the `$date` placeholder.

use crate::utils::DATE_PLACEHOLDER;

/// Substitute `timestamp` for every placeholder occurrence in every token.
pub fn expand(template: &[String], timestamp: &str) -> Vec<String> {
    template
        .iter()
        .map(|token| {
            if token.contains(DATE_PLACEHOLDER) {
                token.replace(DATE_PLACEHOLDER, timestamp)
            } else {
                token.clone()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_expand_replaces_embedded_marker() {
        let template = args(&["dump", "--out=$date"]);
        assert_eq!(
            expand(&template, "01-03-2024-10:15"),
            args(&["dump", "--out=01-03-2024-10:15"])
        );
    }

    #[test]
    fn test_expand_replaces_every_occurrence() {
        let template = args(&["cp", "$date/$date.gz", "$date"]);
        assert_eq!(
            expand(&template, "ts"),
            args(&["cp", "ts/ts.gz", "ts"])
        );
    }

    #[test]
    fn test_expand_leaves_other_tokens_untouched() {
        let template = args(&["pg_dump", "-U", "post gres", "$DATE", "date", "ünï"]);
        assert_eq!(expand(&template, "x"), template);
    }

    #[test]
    fn test_expand_does_not_touch_template() {
        let template = args(&["mongorestore", "--dir=/data/dump/$date"]);
        let _ = expand(&template, "02-03-2024-11:00");
        assert_eq!(template[1], "--dir=/data/dump/$date");
    }
}
