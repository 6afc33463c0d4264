//! Backslash escape decoding for user-supplied payloads.
//!
//! Only four pairs are special:
//! - `\n` newline
//! - `\r` carriage return
//! - `\t` tab
//! - `\\` backslash
//!
//! Any other escape is kept as written, and so is a trailing lone backslash.

/// Decode the recognized escape pairs in `input`.
pub fn decode(input: &str) -> String {
    let mut decoded = String::with_capacity(input.len());
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            decoded.push(c);
            continue;
        }

        match chars.next() {
            Some('n') => decoded.push('\n'),
            Some('r') => decoded.push('\r'),
            Some('t') => decoded.push('\t'),
            Some('\\') => decoded.push('\\'),
            Some(other) => {
                decoded.push('\\');
                decoded.push(other);
            }
            None => decoded.push('\\'),
        }
    }

    decoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_newline() {
        assert_eq!(decode(r"a\nb"), "a\nb");
    }

    #[test]
    fn test_decode_all_recognized() {
        assert_eq!(decode(r"QUIT\r\n"), "QUIT\r\n");
        assert_eq!(decode(r"a\tb"), "a\tb");
        assert_eq!(decode(r"C:\\dir"), "C:\\dir");
    }

    #[test]
    fn test_unrecognized_escape_kept() {
        assert_eq!(decode(r"a\qb"), r"a\qb");
        assert_eq!(decode(r"\0"), r"\0");
    }

    #[test]
    fn test_trailing_backslash() {
        assert_eq!(decode("abc\\"), "abc\\");
        assert_eq!(decode("\\"), "\\");
    }

    #[test]
    fn test_escaped_backslash_does_not_start_new_escape() {
        // `\\n` is an escaped backslash followed by a plain `n`
        assert_eq!(decode(r"\\n"), "\\n");
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(decode(""), "");
        assert_eq!(decode("HELO example.com"), "HELO example.com");
        assert_eq!(decode("héllo"), "héllo");
    }
}
