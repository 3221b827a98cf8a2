//! Character classification for the tokenizer.
//!
//! ASCII code points are classified through a fixed 128-entry table so
//! the tokenizer's hot loop is a single array index. Non-ASCII
//! characters fall back to Unicode properties. The table is immutable
//! after process start and safe to read concurrently.

/// Lexical class of a single character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    Letter,
    Digit,
    Whitespace,
    Quote,
    Punctuation,
    Control,
    Other,
}

const ASCII_CLASSES: [CharClass; 128] = build_ascii_table();

const fn build_ascii_table() -> [CharClass; 128] {
    let mut table = [CharClass::Other; 128];
    let mut i = 0usize;
    while i < 128 {
        let c = i as u8;
        table[i] = if c == b' ' || c == b'\t' || c == b'\n' || c == b'\r' {
            CharClass::Whitespace
        } else if c < 0x20 || c == 0x7f {
            CharClass::Control
        } else if c.is_ascii_alphabetic() || c == b'_' || c == b'$' {
            CharClass::Letter
        } else if c.is_ascii_digit() {
            CharClass::Digit
        } else if c == b'"' || c == b'\'' {
            CharClass::Quote
        } else {
            CharClass::Punctuation
        };
        i += 1;
    }
    table
}

/// Classify a character. O(1) for ASCII, Unicode fallback otherwise.
pub fn classify(c: char) -> CharClass {
    if (c as u32) < 128 {
        ASCII_CLASSES[c as usize]
    } else if c.is_alphabetic() {
        CharClass::Letter
    } else if c.is_whitespace() {
        CharClass::Whitespace
    } else if c.is_control() {
        CharClass::Control
    } else {
        CharClass::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_classes() {
        assert_eq!(classify('a'), CharClass::Letter);
        assert_eq!(classify('Z'), CharClass::Letter);
        assert_eq!(classify('_'), CharClass::Letter);
        assert_eq!(classify('$'), CharClass::Letter);
        assert_eq!(classify('7'), CharClass::Digit);
        assert_eq!(classify(' '), CharClass::Whitespace);
        assert_eq!(classify('\n'), CharClass::Whitespace);
        assert_eq!(classify('"'), CharClass::Quote);
        assert_eq!(classify('\''), CharClass::Quote);
        assert_eq!(classify('{'), CharClass::Punctuation);
        assert_eq!(classify(':'), CharClass::Punctuation);
        assert_eq!(classify('\u{1}'), CharClass::Control);
    }

    #[test]
    fn unicode_fallback() {
        assert_eq!(classify('é'), CharClass::Letter);
        assert_eq!(classify('\u{00A0}'), CharClass::Whitespace);
        assert_eq!(classify('→'), CharClass::Other);
    }
}
