use webql_core::{Operator, QueryProvider};

/// The in-memory backend's capability surface: every operator in the
/// language, plus hexadecimal object-id parsing for key equalities.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryProvider;

impl QueryProvider for MemoryProvider {
    fn supports(&self, _operator: Operator) -> bool {
        true
    }

    /// Accepts `0x`-prefixed hex strings, normalized to lowercase
    /// without the prefix.
    fn parse_identifier(&self, raw: &str) -> Option<String> {
        let digits = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X"))?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        Some(digits.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_ids_normalize() {
        assert_eq!(
            MemoryProvider.parse_identifier("0xAB12cd"),
            Some("ab12cd".to_string())
        );
        assert_eq!(MemoryProvider.parse_identifier("ab12"), None);
        assert_eq!(MemoryProvider.parse_identifier("0xZZ"), None);
        assert_eq!(MemoryProvider.parse_identifier("0x"), None);
    }
}
