use chrono::Local;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use rand::Rng;

/// Form-encoding set: everything but `A-Z a-z 0-9 - _ . ~` is escaped.
const FORM_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// A transaction id of the form `{prefix}{YYYYmmddHHMMSS}{nnn}`.
///
/// The prefix is cut to three characters, keeping the id within the
/// gateway's 20-character limit.
pub fn generate_transaction_id(prefix: &str) -> String {
    let prefix: String = prefix.chars().take(3).collect();
    let timestamp = Local::now().format("%Y%m%d%H%M%S");
    let suffix: u16 = rand::thread_rng().gen_range(0..1000);
    format!("{prefix}{timestamp}{suffix:03}")
}

/// Append `return_url` to `payment_url` as the `return` query parameter.
pub fn build_return_url(payment_url: &str, return_url: &str) -> String {
    let separator = if payment_url.contains('?') { '&' } else { '?' };
    let encoded = return_url
        .split(' ')
        .map(|part| utf8_percent_encode(part, FORM_VALUE).to_string())
        .collect::<Vec<_>>()
        .join("+");
    format!("{payment_url}{separator}return={encoded}")
}

/// `Rp 1.500.000`
pub fn format_amount_idr(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }
    let sign = if amount < 0 { "-" } else { "" };
    format!("Rp {sign}{grouped}")
}

/// `10.50 USDT`
pub fn format_amount_usdt(amount: f64) -> String {
    format!("{amount:.2} USDT")
}
