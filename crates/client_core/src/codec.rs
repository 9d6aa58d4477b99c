//! Placeholder template "encryption": a tagged base64 rendering of the score.
//!
//! Nothing here is confidential. The `FHE-` tag only marks values produced by
//! [`encode`] so that [`decode`] can tell them apart from bare numbers.

use base64::{
    alphabet,
    engine::{general_purpose::STANDARD, DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};

pub const TEMPLATE_PREFIX: &str = "FHE-";

/// Accepts payloads with or without `=` padding and with non-zero trailing bits.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

pub fn encode(value: f64) -> String {
    format!("{TEMPLATE_PREFIX}{}", STANDARD.encode(score_text(value)))
}

/// Inverse of [`encode`]. Untagged input is read as a plain number.
///
/// Never fails: anything that does not yield a number decodes to `NaN`.
pub fn decode(text: &str) -> f64 {
    let Some(payload) = text.strip_prefix(TEMPLATE_PREFIX) else {
        return parse_float(text);
    };

    LENIENT
        .decode(payload.trim())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .map_or(f64::NAN, |plain| parse_float(&plain))
}

/// Reads the longest leading decimal number, ignoring leading whitespace and
/// any trailing garbage (`"82abc"` is `82`).
pub fn parse_float(text: &str) -> f64 {
    let trimmed = text.trim_start();

    let unsigned = trimmed
        .strip_prefix('-')
        .or_else(|| trimmed.strip_prefix('+'))
        .unwrap_or(trimmed);
    if unsigned.starts_with("Infinity") {
        return if trimmed.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    let end = numeric_prefix_len(trimmed.as_bytes());
    if end == 0 {
        return f64::NAN;
    }
    trimmed[..end].parse::<f64>().unwrap_or(f64::NAN)
}

fn score_text(value: f64) -> String {
    if value.is_infinite() {
        if value.is_sign_negative() {
            "-Infinity".to_string()
        } else {
            "Infinity".to_string()
        }
    } else {
        value.to_string()
    }
}

fn numeric_prefix_len(bytes: &[u8]) -> usize {
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }

    if digits == 0 {
        return 0;
    }

    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores_survive_a_round_trip() {
        for score in 1..=100 {
            let score = f64::from(score);
            assert_eq!(decode(&encode(score)), score, "score {score}");
        }
        assert_eq!(decode(&encode(82.5)), 82.5);
    }

    #[test]
    fn encodes_integral_scores_without_fraction() {
        assert_eq!(encode(82.0), "FHE-ODI=");
        assert_eq!(encode(75.0), "FHE-NzU=");
    }

    #[test]
    fn malformed_input_decodes_to_nan() {
        assert!(decode("").is_nan());
        assert!(decode("not-base64").is_nan());
        assert!(decode("FHE-***").is_nan());
        assert!(decode("FHE-").is_nan());
    }

    #[test]
    fn unpadded_payloads_decode() {
        assert_eq!(decode("FHE-ODI"), 82.0);
        assert_eq!(decode("FHE-NzU"), 75.0);
        assert_eq!(decode("FHE-ODIuNQ"), 82.5);
    }

    #[test]
    fn untagged_input_is_parsed_as_number() {
        assert_eq!(decode("42"), 42.0);
        assert_eq!(decode("  7.25 points"), 7.25);
    }

    #[test]
    fn parse_float_takes_leading_number() {
        assert_eq!(parse_float("82abc"), 82.0);
        assert_eq!(parse_float("-3.5e2x"), -350.0);
        assert_eq!(parse_float(".5"), 0.5);
        assert_eq!(parse_float("5."), 5.0);
        assert_eq!(parse_float("1e"), 1.0);
        assert_eq!(parse_float("Infinity"), f64::INFINITY);
        assert!(parse_float(".").is_nan());
        assert!(parse_float("-").is_nan());
        assert!(parse_float("abc").is_nan());
    }

    #[test]
    fn infinite_scores_round_trip() {
        assert_eq!(decode(&encode(f64::NEG_INFINITY)), f64::NEG_INFINITY);
    }
}
