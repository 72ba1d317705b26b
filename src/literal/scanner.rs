/// Characters allowed inside a bare numeric literal (integer, float and exponent forms).
pub(super) fn is_number_byte(b: u8) -> bool {
    b.is_ascii_digit() || matches!(b, b'e' | b'+' | b'-' | b'.')
}

/// Bytes that may start a bare numeric literal.
pub(super) fn starts_number(b: u8) -> bool {
    b.is_ascii_digit() || matches!(b, b'-' | b'.')
}

pub(super) fn scan_number(bytes: &[u8], start: usize) -> usize {
    let mut idx = start;
    while idx < bytes.len() && is_number_byte(bytes[idx]) {
        idx += 1;
    }
    idx
}

/// Scan a quoted string starting at the opening quote.
///
/// Returns the index just past the closing quote together with the unescaped body, or `None`
/// when the string is unterminated.
pub(super) fn scan_quoted(input: &str, start: usize) -> Option<(usize, String)> {
    let bytes = input.as_bytes();
    let quote = bytes[start];
    let mut idx = start + 1;
    let mut body_start = idx;
    let mut out = String::new();
    while idx < bytes.len() {
        if bytes[idx] == quote {
            out.push_str(&input[body_start..idx]);
            if bytes.get(idx + 1) == Some(&quote) {
                out.push(quote as char);
                idx += 2;
                body_start = idx;
                continue;
            }
            return Some((idx + 1, out));
        }
        idx += 1;
    }
    None
}

/// Scan an `<...>` opaque token starting at `<`; returns the index just past `>`.
pub(super) fn scan_opaque(bytes: &[u8], start: usize) -> Option<usize> {
    bytes[start + 1..]
        .iter()
        .position(|&b| b == b'>')
        .map(|offset| start + 1 + offset + 1)
}

/// Skip a nested array starting at `[`; returns the index just past its closing `]`.
///
/// Quoted strings and opaque tokens inside are honoured so brackets within them do not count.
pub(super) fn skip_array(input: &str, start: usize) -> Option<usize> {
    let bytes = input.as_bytes();
    let mut idx = start + 1;
    while idx < bytes.len() {
        let b = bytes[idx];
        idx = match b {
            b']' => return Some(idx + 1),
            b'[' => skip_array(input, idx)?,
            b'"' | b'\'' => scan_quoted(input, idx)?.0,
            b'<' => scan_opaque(bytes, idx)?,
            b',' | b' ' => idx + 1,
            _ if starts_number(b) => scan_number(bytes, idx),
            _ => return None,
        };
    }
    None
}
