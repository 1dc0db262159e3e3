use crate::{logging, util::text};

/// A 股報價回應切開後固定的欄位數
///
/// 新浪每筆 A 股行情有 33 個逗號欄位，再加上行尾換行被當成一個欄位，共 34 個。
pub const QUOTE_FIELD_COUNT: usize = 34;
/// 昨收
const PREVIOUS_CLOSE_INDEX: usize = 2;
/// 現價
const CURRENT_PRICE_INDEX: usize = 3;

/// 行情報價
///
/// 任何解析失敗都回傳全部為零的報價，`valid` 為 false。
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ParsedQuote {
    /// 昨收
    pub previous_close: f64,
    /// 當前價
    pub current_price: f64,
    /// 所有欄位都成功解析
    pub valid: bool,
}

impl ParsedQuote {
    pub fn new(previous_close: f64, current_price: f64) -> Self {
        ParsedQuote {
            previous_close,
            current_price,
            valid: true,
        }
    }
}

/// 解析 `var hq_str_sh600000="浦发银行,10.00,9.50,...";`
pub fn parse(text: &str) -> ParsedQuote {
    let payload = match text.split('=').nth(1) {
        Some(p) => p,
        None => {
            logging::error_file_async(format!("Quote without '=', result: {}", text));
            return ParsedQuote::default();
        }
    };

    let fields: Vec<&str> = payload
        .split(['"', ',', ';'])
        .filter(|f| !f.is_empty())
        .collect();

    if fields.len() != QUOTE_FIELD_COUNT {
        logging::error_file_async(format!(
            "list: {:?},{{len: {}}},result: {}",
            fields,
            fields.len(),
            payload
        ));
        return ParsedQuote::default();
    }

    let previous_close = parse_price(fields[PREVIOUS_CLOSE_INDEX]);
    let current_price = parse_price(fields[CURRENT_PRICE_INDEX]);

    ParsedQuote {
        previous_close: previous_close.unwrap_or(0.0),
        current_price: current_price.unwrap_or(0.0),
        valid: previous_close.is_some() && current_price.is_some(),
    }
}

fn parse_price(field: &str) -> Option<f64> {
    match text::parse_f64(field, None) {
        Ok(v) => Some(v),
        Err(why) => {
            logging::error_file_async(format!("{:?}", why));
            None
        }
    }
}
