use rand::Rng;

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

pub const DEFAULT_CODE_LENGTH: usize = 6;
pub const MAX_SHORT_CODE_LENGTH: usize = 20;

#[derive(Debug, Clone)]
pub struct TokenGenerator {
    length: usize,
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenGenerator {
    pub fn new() -> Self {
        Self {
            length: DEFAULT_CODE_LENGTH,
        }
    }

    pub fn with_length(length: usize) -> Self {
        Self { length }
    }

    pub fn generate(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..self.length)
            .map(|_| {
                let idx = rng.gen_range(0..CHARSET.len());
                CHARSET[idx] as char
            })
            .collect()
    }

    /// Samples codes until `is_taken` rejects one, giving up after `max_attempts`.
    pub fn generate_unique<F>(&self, max_attempts: usize, mut is_taken: F) -> Option<String>
    where
        F: FnMut(&str) -> bool,
    {
        (0..max_attempts)
            .map(|_| self.generate())
            .find(|code| !is_taken(code))
    }
}

/// 1 to 20 characters of `[A-Za-z0-9_-]`.
pub fn is_valid_short_code(code: &str) -> bool {
    (1..=MAX_SHORT_CODE_LENGTH).contains(&code.len())
        && code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_generation() {
        let generator = TokenGenerator::new();
        let token = generator.generate();

        assert_eq!(token.len(), 6);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(is_valid_short_code(&token));
    }

    #[test]
    fn test_custom_length() {
        let generator = TokenGenerator::with_length(10);
        let token = generator.generate();

        assert_eq!(token.len(), 10);
    }

    #[test]
    fn test_generate_unique_skips_taken_codes() {
        let generator = TokenGenerator::new();
        let mut calls = 0;
        let code = generator.generate_unique(10, |_| {
            calls += 1;
            calls < 3
        });

        assert!(code.is_some());
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_generate_unique_gives_up() {
        let generator = TokenGenerator::new();
        assert!(generator.generate_unique(5, |_| true).is_none());
    }

    #[test]
    fn test_short_code_format() {
        assert!(is_valid_short_code("a"));
        assert!(is_valid_short_code("my-link_2024"));
        assert!(is_valid_short_code(&"x".repeat(20)));

        assert!(!is_valid_short_code(""));
        assert!(!is_valid_short_code(&"x".repeat(21)));
        assert!(!is_valid_short_code("has space"));
        assert!(!is_valid_short_code("slash/code"));
        assert!(!is_valid_short_code("émoji"));
    }
}
