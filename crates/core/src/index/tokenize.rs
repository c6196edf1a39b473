//! Lowercasing word tokenizer shared by indexing and querying.

/// Words too common in English prose to carry any ranking signal.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "how", "i", "if", "in", "into", "is", "it",
    "its", "of", "on", "or", "so", "that", "the", "their", "then", "there", "these", "this", "to", "was", "what",
    "when", "where", "which", "who", "why", "will", "with", "you", "your",
];

/// Split text into lowercase alphanumeric tokens, dropping stop words.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .filter(|word| !STOP_WORDS.contains(&word.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_lowercases_and_splits() {
        assert_eq!(tokenize("Docker-Compose vs. K8s"), vec!["docker", "compose", "vs", "k8s"]);
    }

    #[test]
    fn test_tokenize_drops_stop_words() {
        assert_eq!(tokenize("What is the difference"), vec!["difference"]);
        assert!(tokenize("the of and").is_empty());
    }

    #[test]
    fn test_tokenize_handles_paths() {
        assert_eq!(tokenize("topics/linux/README.md"), vec!["topics", "linux", "readme", "md"]);
    }
}
