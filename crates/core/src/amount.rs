use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("Not a decimal amount: '{0}'")]
    NotDecimal(String),
}

/// Parse an OCR amount that uses a comma as its decimal separator
/// (e.g. `"-0,36"`). The text is trimmed and the first comma replaced with
/// a period before fixed-point parsing.
///
/// Failure here is an expected, local condition: the extraction chain uses
/// it as a stage validity check, not a fatal error.
pub fn parse_comma_decimal(text: &str) -> Result<Decimal, AmountError> {
    let trimmed = text.trim();
    let normalized = trimmed.replacen(',', ".", 1);
    Decimal::from_str(&normalized).map_err(|_| AmountError::NotDecimal(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn parses_comma_separator() {
        assert_eq!(parse_comma_decimal("37,19").unwrap(), dec("37.19"));
    }

    #[test]
    fn parses_negative_amount() {
        assert_eq!(parse_comma_decimal("-0,36").unwrap(), dec("-0.36"));
    }

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(parse_comma_decimal("  1,00 ").unwrap(), dec("1.00"));
    }

    #[test]
    fn only_first_comma_is_replaced() {
        assert!(parse_comma_decimal("1,2,3").is_err());
    }

    #[test]
    fn period_separator_also_accepted() {
        // Already-normalized text must not break.
        assert_eq!(parse_comma_decimal("4.50").unwrap(), dec("4.50"));
    }

    #[test]
    fn garbage_is_a_local_error() {
        let err = parse_comma_decimal("371912x").unwrap_err();
        assert_eq!(err, AmountError::NotDecimal("371912x".to_string()));
    }
}
