use std::fmt;

/// Monetary amounts are stored as integer minor units (two decimals).
/// 1 250,50 XOF is held as 125050.
pub type Cents = i64;

/// Largest amount accepted for a single movement, forecast, purchase or
/// opening balance (10 000 000 000 000.00).
pub const MAX_AMOUNT_CENTS: Cents = 1_000_000_000_000_000;

/// Render cents with two decimals: 5000 -> "50.00", -1 -> "-0.01".
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Render an amount followed by its currency code.
pub fn format_amount(cents: Cents, currency: &str) -> String {
    format!("{} {}", format_cents(cents), currency)
}

/// Parse a decimal amount into cents.
///
/// Accepts "50", "50.5", "50.00", ".50" and a leading minus sign.
/// More than two decimals is an error.
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let input = input.trim();
    let (negative, digits) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input),
    };

    if digits.is_empty() {
        return Err(ParseCentsError::Empty);
    }

    let (units_str, decimals_str) = match digits.split_once('.') {
        Some((units, decimals)) => (units, decimals),
        None => (digits, ""),
    };

    if decimals_str.contains('.') {
        return Err(ParseCentsError::InvalidFormat);
    }
    if decimals_str.len() > 2 {
        return Err(ParseCentsError::TooManyDecimals);
    }
    if !units_str.chars().all(|c| c.is_ascii_digit())
        || !decimals_str.chars().all(|c| c.is_ascii_digit())
        || (units_str.is_empty() && decimals_str.is_empty())
    {
        return Err(ParseCentsError::InvalidFormat);
    }

    let units: i64 = if units_str.is_empty() {
        0
    } else {
        units_str.parse().map_err(|_| ParseCentsError::Overflow)?
    };
    let decimals: i64 = match decimals_str.len() {
        0 => 0,
        1 => decimals_str.parse::<i64>().map_err(|_| ParseCentsError::InvalidFormat)? * 10,
        _ => decimals_str.parse().map_err(|_| ParseCentsError::InvalidFormat)?,
    };

    let cents = units
        .checked_mul(100)
        .and_then(|c| c.checked_add(decimals))
        .ok_or(ParseCentsError::Overflow)?;

    Ok(if negative { -cents } else { cents })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseCentsError {
    Empty,
    InvalidFormat,
    TooManyDecimals,
    Overflow,
}

impl fmt::Display for ParseCentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseCentsError::Empty => write!(f, "empty amount"),
            ParseCentsError::InvalidFormat => write!(f, "invalid money format"),
            ParseCentsError::TooManyDecimals => write!(f, "at most two decimals are allowed"),
            ParseCentsError::Overflow => write!(f, "amount is too large"),
        }
    }
}

impl std::error::Error for ParseCentsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(5000), "50.00");
        assert_eq!(format_cents(125050), "1250.50");
        assert_eq!(format_cents(7), "0.07");
        assert_eq!(format_cents(0), "0.00");
        assert_eq!(format_cents(-1), "-0.01");
        assert_eq!(format_amount(-250000, "XOF"), "-2500.00 XOF");
    }

    #[test]
    fn test_parse_cents() {
        assert_eq!(parse_cents("50"), Ok(5000));
        assert_eq!(parse_cents("50.5"), Ok(5050));
        assert_eq!(parse_cents(" 1250.50 "), Ok(125050));
        assert_eq!(parse_cents(".50"), Ok(50));
        assert_eq!(parse_cents("-12.34"), Ok(-1234));
    }

    #[test]
    fn test_parse_cents_rejects_garbage() {
        assert_eq!(parse_cents(""), Err(ParseCentsError::Empty));
        assert_eq!(parse_cents("-"), Err(ParseCentsError::Empty));
        assert_eq!(parse_cents("abc"), Err(ParseCentsError::InvalidFormat));
        assert_eq!(parse_cents("1.2.3"), Err(ParseCentsError::InvalidFormat));
        assert_eq!(parse_cents("."), Err(ParseCentsError::InvalidFormat));
        assert_eq!(parse_cents("10.999"), Err(ParseCentsError::TooManyDecimals));
        assert_eq!(
            parse_cents("99999999999999999999"),
            Err(ParseCentsError::Overflow)
        );
    }
}
