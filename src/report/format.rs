pub fn percent(fraction: f64, decimals: usize) -> String {
    let value = fraction * 100.0;
    // Avoid printing "-0.0%".
    let value = if value.abs() < 0.5 * 10f64.powi(-(decimals as i32)) {
        0.0
    } else {
        value
    };
    format!("{value:.decimals$}%")
}

pub fn thousands(value: i64) -> String {
    let grouped = group_digits(value.unsigned_abs());
    if value < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

fn group_digits(magnitude: u64) -> String {
    let digits = magnitude.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

// Saturates at the i64 range.
pub fn currency(amount: f64) -> String {
    let rounded = amount.round() as i64;
    let sign = if rounded < 0 { "-" } else { "" };
    format!("{sign}${}", group_digits(rounded.unsigned_abs()))
}

pub fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_uses_requested_precision() {
        assert_eq!(percent(0.12345, 2), "12.35%");
        assert_eq!(percent(0.5, 0), "50%");
        assert_eq!(percent(-0.031, 1), "-3.1%");
        assert_eq!(percent(-0.00001, 1), "0.0%");
    }

    #[test]
    fn currency_groups_thousands_and_keeps_sign() {
        assert_eq!(currency(0.0), "$0");
        assert_eq!(currency(999.4), "$999");
        assert_eq!(currency(12_345.0), "$12,345");
        assert_eq!(currency(1_234_567.8), "$1,234,568");
        assert_eq!(currency(-1_000.0), "-$1,000");
    }

    #[test]
    fn currency_saturates_instead_of_overflowing() {
        assert_eq!(currency(-1e19), "-$9,223,372,036,854,775,808");
        assert_eq!(currency(1e20), "$9,223,372,036,854,775,807");
        assert_eq!(thousands(i64::MIN), "-9,223,372,036,854,775,808");
    }

    #[test]
    fn ordinals_handle_teens() {
        assert_eq!(ordinal(1), "1st");
        assert_eq!(ordinal(2), "2nd");
        assert_eq!(ordinal(3), "3rd");
        assert_eq!(ordinal(4), "4th");
        assert_eq!(ordinal(11), "11th");
        assert_eq!(ordinal(12), "12th");
        assert_eq!(ordinal(13), "13th");
        assert_eq!(ordinal(22), "22nd");
        assert_eq!(ordinal(101), "101st");
    }
}
