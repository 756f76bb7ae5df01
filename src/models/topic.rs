//! Topic labels
//!
//! Topics are free-form labels typed by the editor as a comma-separated
//! string. They are stored in a canonical form: trimmed, lower-cased and
//! then title-cased, so `" rust"`, `"RUST"` and `"Rust"` are the same topic.

/// Normalize a single topic label.
///
/// Returns an empty string for blank input.
pub fn normalize_topic(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_alpha = false;

    for c in raw.trim().chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }

    out
}

/// Normalize a list of topic labels, dropping blanks and duplicates.
///
/// First occurrence wins, so the editor's ordering is kept.
pub fn normalize_topics<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut topics: Vec<String> = Vec::new();
    for topic in raw {
        let topic = normalize_topic(topic.as_ref());
        if !topic.is_empty() && !topics.contains(&topic) {
            topics.push(topic);
        }
    }
    topics
}

/// Split the editor's comma-separated topic field into normalized labels.
pub fn split_topics(field: &str) -> Vec<String> {
    normalize_topics(field.split(','))
}

/// Join topic labels for the editor's topic field.
pub fn join_topics(topics: &[String]) -> String {
    topics.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_topic() {
        assert_eq!(normalize_topic("  rust "), "Rust");
        assert_eq!(normalize_topic("MACHINE learning"), "Machine Learning");
        assert_eq!(normalize_topic("web3 and c++"), "Web3 And C++");
        assert_eq!(normalize_topic("   "), "");
    }

    #[test]
    fn test_normalize_topic_after_non_letter() {
        // A letter after any non-letter starts a new word
        assert_eq!(normalize_topic("rust2go"), "Rust2Go");
        assert_eq!(normalize_topic("o'reilly"), "O'Reilly");
    }

    #[test]
    fn test_normalize_topics_dedupes() {
        let topics = normalize_topics(["Go", "go ", "  GO"]);
        assert_eq!(topics, vec!["Go".to_string()]);
    }

    #[test]
    fn test_split_topics() {
        let topics = split_topics("rust, Databases,,  , rust ,web");
        assert_eq!(topics, vec!["Rust", "Databases", "Web"]);
    }

    #[test]
    fn test_split_topics_empty_field() {
        assert!(split_topics("").is_empty());
        assert!(split_topics(" , ,").is_empty());
    }

    #[test]
    fn test_join_topics() {
        let topics = vec!["Go".to_string(), "Rust".to_string()];
        assert_eq!(join_topics(&topics), "Go, Rust");
        assert_eq!(join_topics(&[]), "");
    }
}
