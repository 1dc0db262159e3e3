use std::{collections::HashSet, str::FromStr};

use anyhow::{anyhow, Result};

const NUMBER_ESCAPE_CHAR: &[char] = &['元', '%', ',', ' ', '"', '\n', '\r'];

/// Converts a GBK encoded byte slice to a UTF-8 `String`.
///
/// 新浪行情與上交所的股票清單都是 GBK 編碼，無法解碼的位元組以 U+FFFD 取代，
/// 不會讓整個回應失敗。
pub fn gbk_2_utf8(data: &[u8]) -> String {
    let (text, _, had_errors) = encoding_rs::GBK.decode(data);
    if had_errors {
        crate::logging::warn_file_async(format!(
            "GBK decode replaced malformed bytes, len:{}",
            data.len()
        ));
    }

    text.into_owned()
}

/// Parses a `f64` value from a given string.
///
/// 會先移除千分位逗號、百分比符號等字元再轉型。
///
/// # Example
///
/// ```ignore
/// let v = parse_f64("1,234.56", None)?;
/// ```
pub fn parse_f64(s: &str, escape_chars: Option<Vec<char>>) -> Result<f64> {
    let cleaned = clean_escape_chars(s, escape_chars);
    f64::from_str(&cleaned)
        .map_err(|why| anyhow!("Failed to parse '{}' as f64 because {:?}", cleaned, why))
}

/// Removes a set of escape characters from a given string.
pub(crate) fn clean_escape_chars(s: &str, escape_chars: Option<Vec<char>>) -> String {
    let mut combined: Vec<char> = NUMBER_ESCAPE_CHAR.to_vec();
    if let Some(ec) = escape_chars {
        combined.extend(ec);
    }

    let filters = combined.iter().collect::<HashSet<_>>();
    s.chars().filter(|c| !filters.contains(c)).collect()
}
