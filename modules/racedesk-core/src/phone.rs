//! Tolerant phone comparison for Brazilian numbers.
//!
//! Profiles store numbers in whatever shape the registrant typed:
//! with or without country code (55), area code, or the extra mobile
//! `9`. Transfer authorization binds a token to a phone, so comparison
//! has to absorb all of those shapes without matching unrelated numbers.

pub fn phone_digits(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Last `n` digits, or the whole string when shorter.
fn tail(s: &str, n: usize) -> &str {
    let start = s.len().saturating_sub(n);
    &s[start..]
}

/// Drop the leading mobile `9` from a 9-digit local tail.
fn without_mobile_nine(local: &str) -> &str {
    if local.len() == 9 && local.starts_with('9') {
        &local[1..]
    } else {
        local
    }
}

/// Whether two numbers plausibly denote the same phone.
///
/// Matches on equality, on equal 9-digit suffixes, and on equal
/// suffixes after dropping the extra mobile `9` from either side.
pub fn phones_match(a: &str, b: &str) -> bool {
    let a = phone_digits(a);
    let b = phone_digits(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b {
        return true;
    }

    let ta = tail(&a, 9);
    let tb = tail(&b, 9);
    if ta == tb {
        return true;
    }

    let na = without_mobile_nine(ta);
    let nb = without_mobile_nine(tb);
    na.len() >= 8 && nb.len() >= 8 && na == nb
}

// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_and_formatted_numbers_match() {
        assert!(phones_match("5547999887766", "5547999887766"));
        assert!(phones_match("+55 (47) 99988-7766", "5547999887766"));
    }

    #[test]
    fn country_and_area_prefixes_are_absorbed() {
        assert!(phones_match("999887766", "5547999887766"));
        assert!(phones_match("47999887766", "5547999887766"));
    }

    #[test]
    fn extra_mobile_nine_is_absorbed() {
        // profile stored without the leading 9
        assert!(phones_match("554799887766", "5547999887766"));
        assert!(phones_match("99887766", "999887766"));
    }

    #[test]
    fn different_numbers_do_not_match() {
        assert!(!phones_match("5547999887766", "5547999887767"));
        assert!(!phones_match("", "5547999887766"));
        assert!(!phones_match("5511987654321", "5521987654321"));
    }
}
