use serde_json::Value;

use crate::{FieldSpec, Record, Result, ValueType};

/// Renders `prefix` followed by `count`, left-padding the number with `'0'`
/// until the whole string is `total_length` characters long.
///
/// Nothing is padded (or truncated) when the unpadded string already reaches
/// `total_length`. Lengths are counted in characters.
///
/// ```
/// use autonumber::pad_number;
///
/// assert_eq!(pad_number("AA-", 3, Some(6)), "AA-003");
/// assert_eq!(pad_number("", 1, Some(5)), "00001");
/// assert_eq!(pad_number("S1-", 1, None), "S1-1");
/// assert_eq!(pad_number("LONG-", 123, Some(4)), "LONG-123");
/// ```
pub fn pad_number(prefix: &str, count: u64, total_length: Option<usize>) -> String {
    let digits = count.to_string();
    let used = prefix.chars().count() + digits.len();
    let zeros = total_length.map_or(0, |total| total.saturating_sub(used));

    let mut out = String::with_capacity(prefix.len() + zeros + digits.len());
    out.push_str(prefix);
    out.extend(core::iter::repeat_n('0', zeros));
    out.push_str(&digits);
    out
}

/// Turns an allocated integer into the value stored on the record.
///
/// Integer fields get the number itself. String fields get the resolved
/// prefix (empty by default) followed by the number, zero padded when the
/// field asks for leading zeros and a total length is known.
///
/// # Errors
///
/// Fails only if the prefix selector fails to resolve.
pub async fn format_value(count: u64, field: &FieldSpec, record: &Record) -> Result<Value> {
    match field.value_type() {
        ValueType::Integer => Ok(Value::from(count)),
        ValueType::String => {
            let prefix = match field.prefix_selector() {
                Some(selector) => selector.resolve_text(record).await?,
                None => String::new(),
            };
            let total_length = field
                .pads_with_zeros()
                .then(|| field.total_length())
                .flatten();
            Ok(Value::String(pad_number(&prefix, count, total_length)))
        }
    }
}
