//! Display helpers for whole-unit amounts.

/// `1234567` -> `"¥1,234,567"`, `-500` -> `"-¥500"`.
pub fn format_amount(value: i64, symbol: &str) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if value < 0 { "-" } else { "" };
    format!("{sign}{symbol}{grouped}")
}
