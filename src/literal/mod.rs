//! Tokenizer for bracketed array literals such as `["A","B,C",[1,2],<OPAQUE>]`.
//!
//! Top-level elements become tokens. Quoted strings are unquoted (doubled quotes collapse to
//! one), bare numbers and `<...>` tokens are captured verbatim, and nested arrays are passed
//! through as a single opaque token containing their original text.

mod scanner;

use scanner::{scan_number, scan_opaque, scan_quoted, skip_array, starts_number};

/// Split a bracketed literal into its top-level tokens.
///
/// Returns `None` when the input is not wrapped in `[` `]`, when a string, opaque token or
/// nested array is unterminated, or when an unrecognized character appears between elements.
///
/// ```rust
/// use extdb::literal::tokenize;
///
/// let tokens = tokenize(r#"["A",'it''s',42]"#).unwrap();
/// assert_eq!(tokens, vec!["A", "it's", "42"]);
/// ```
#[must_use]
pub fn tokenize(input: &str) -> Option<Vec<String>> {
    if !(input.starts_with('[') && input.ends_with(']')) || input.len() < 2 {
        return None;
    }
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut idx = 1;
    while idx < bytes.len() {
        let b = bytes[idx];
        match b {
            b']' => {
                return (idx + 1 == bytes.len()).then_some(tokens);
            }
            b',' | b' ' => idx += 1,
            b'"' | b'\'' => {
                let (end, value) = scan_quoted(input, idx)?;
                tokens.push(value);
                idx = end;
            }
            b'<' => {
                let end = scan_opaque(bytes, idx)?;
                tokens.push(input[idx..end].to_string());
                idx = end;
            }
            b'[' => {
                let end = skip_array(input, idx)?;
                tokens.push(input[idx..end].to_string());
                idx = end;
            }
            _ if starts_number(b) => {
                let end = scan_number(bytes, idx);
                tokens.push(input[idx..end].to_string());
                idx = end;
            }
            _ => return None,
        }
    }
    None
}
