pub mod chat;
pub mod department;
pub mod mail;
pub mod tracking;
pub mod user;

/// Unicode-aware case folding shared by every free-text comparison.
/// SQLite's `NOCASE` and `LIKE` only fold ASCII.
pub fn fold(text: &str) -> String {
    text.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::fold;

    #[test]
    fn fold_handles_non_ascii_case() {
        assert_eq!(fold("  ÉTAT Civil "), "état civil");
        assert_eq!(fold("Øresund"), fold("øRESUND"));
    }
}
