/// Characters a value may consist of and still count as blank. Unicode
/// spaces such as U+3000 are not among them.
const BLANK_CHARS: &[char] = &[' ', '\t', '\n', '\r', '\0', '\x0b'];

/// Whether a raw text value is worth sending for translation.
///
/// Blank values and values that read as a plain number are skipped; anything
/// else, including mixed values such as `42abc`, is kept verbatim.
pub fn is_translatable(value: &str) -> bool {
    !value.trim_matches(BLANK_CHARS).is_empty() && !is_numeric(value)
}

/// Numeric-string test: optional surrounding ASCII whitespace, optional sign,
/// decimal digits with an optional fraction, and an optional exponent.
/// Hex, `inf` and `NaN` forms are not numbers here.
pub fn is_numeric(value: &str) -> bool {
    let s = value.trim_matches(|c| matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0b' | '\x0c'));
    let bytes = s.as_bytes();
    let mut i = 0;

    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }

    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let int_digits = i - int_start;

    let mut frac_digits = 0;
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        let frac_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        frac_digits = i - frac_start;
    }

    if int_digits + frac_digits == 0 {
        return false;
    }

    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        i += 1;
        if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
            i += 1;
        }
        let exp_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == exp_start {
            return false;
        }
    }

    i == bytes.len()
}
