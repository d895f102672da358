//! Upload handling: raw bytes → tokens → canonical, de-duplicated identifiers.

use crate::error::InputError;
use crate::identifier::{dedup, CanonicalIdentifier, Normalizer};

/// Default upload ceiling: 5 MiB.
pub const DEFAULT_MAX_INPUT_BYTES: usize = 5 * 1024 * 1024;

/// Line boundaries recognised in uploads. Covers `\n`, `\r\n` and bare `\r`
/// plus the less common Unicode separators spreadsheet exports emit.
fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\x0b' | '\x0c' | '\x1c' | '\x1d' | '\x1e' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// Split an uploaded text file into trimmed, non-blank lines.
pub fn read_upload(bytes: &[u8], max_bytes: usize) -> Result<Vec<String>, InputError> {
    if bytes.len() > max_bytes {
        return Err(InputError::TooLarge {
            size: bytes.len(),
            max: max_bytes,
        });
    }
    let text = std::str::from_utf8(bytes).map_err(|_| InputError::InvalidEncoding)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let tokens: Vec<String> = text
        .split(is_line_break)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    if tokens.is_empty() {
        return Err(InputError::Empty);
    }
    Ok(tokens)
}

/// Tokens after normalization and de-duplication, ready for the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedInput {
    /// Canonical identifiers, first occurrence order.
    pub unique: Vec<CanonicalIdentifier>,
    /// Raw tokens that failed normalization, in input order.
    pub invalid: Vec<String>,
    pub duplicates_removed: usize,
    /// Number of tokens received.
    pub raw_count: usize,
}

impl PreparedInput {
    /// Normalize every token, set invalid ones aside and drop repeats.
    ///
    /// Fails with [`InputError::Empty`] for an empty token list and with
    /// [`InputError::NoValidNumbers`] when nothing survives normalization.
    pub fn prepare<S: AsRef<str>>(tokens: &[S], normalizer: &Normalizer) -> Result<Self, InputError> {
        if tokens.is_empty() {
            return Err(InputError::Empty);
        }

        let mut valid = Vec::with_capacity(tokens.len());
        let mut invalid = Vec::new();
        for token in tokens {
            let token = token.as_ref();
            match normalizer.normalize(token) {
                Some(id) => valid.push(id),
                None => invalid.push(token.to_string()),
            }
        }

        if valid.is_empty() {
            return Err(InputError::NoValidNumbers {
                invalid: invalid.len(),
            });
        }

        let deduped = dedup(valid);
        Ok(Self {
            unique: deduped.unique,
            invalid,
            duplicates_removed: deduped.duplicates_removed,
            raw_count: tokens.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_is_split_and_trimmed() {
        let tokens = read_upload(b"  01712345678 \r\n\n+8801812345678\n   \n", 1024).unwrap();
        assert_eq!(tokens, vec!["01712345678", "+8801812345678"]);
    }

    #[test]
    fn upload_limits() {
        assert_eq!(
            read_upload(&[b'1'; 11], 10),
            Err(InputError::TooLarge { size: 11, max: 10 })
        );
        assert_eq!(read_upload(&[0xff, 0xfe, 0x00], 10), Err(InputError::InvalidEncoding));
        assert_eq!(read_upload(b"\n \n\t\n", 10), Err(InputError::Empty));
    }

    #[test]
    fn carriage_return_only_files_are_split() {
        let tokens = read_upload(b"01712345678\r01812345678\r01912345678\r", 1024).unwrap();
        assert_eq!(tokens, vec!["01712345678", "01812345678", "01912345678"]);
    }

    #[test]
    fn unicode_line_separators_are_split() {
        let text = "01712345678\u{2028}01812345678\u{85}01912345678\x0c01512345678";
        let tokens = read_upload(text.as_bytes(), 1024).unwrap();
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[3], "01512345678");
    }

    #[test]
    fn byte_order_mark_is_ignored() {
        let tokens = read_upload("\u{feff}01712345678\n".as_bytes(), 1024).unwrap();
        assert_eq!(tokens, vec!["01712345678"]);
    }

    #[test]
    fn prepare_splits_invalid_and_duplicates() {
        let tokens = [
            "01712345678",
            "+880 1712-345678",
            "12345",
            "8801712345678",
            "01812345678",
        ];
        let prepared = PreparedInput::prepare(&tokens, &Normalizer::default()).unwrap();

        assert_eq!(prepared.unique.len(), 2);
        assert_eq!(prepared.unique[0].as_str(), "01712345678");
        assert_eq!(prepared.unique[1].as_str(), "01812345678");
        assert_eq!(prepared.invalid, vec!["12345"]);
        assert_eq!(prepared.duplicates_removed, 2);
        assert_eq!(prepared.raw_count, 5);
    }

    #[test]
    fn prepare_rejects_hopeless_input() {
        let none: [&str; 0] = [];
        assert_eq!(
            PreparedInput::prepare(&none, &Normalizer::default()),
            Err(InputError::Empty)
        );
        assert_eq!(
            PreparedInput::prepare(&["abc", "123"], &Normalizer::default()),
            Err(InputError::NoValidNumbers { invalid: 2 })
        );
    }
}
