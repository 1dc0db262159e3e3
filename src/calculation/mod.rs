use crate::crawler::sina::quote::ParsedQuote;

/// 漲跌幅(%) = (現價 - 昨收) / 昨收 * 100
///
/// 昨收為零時回傳 NaN，讓「無法計算」與「平盤 0%」在 gauge 上可以區分。
pub fn change_ratio(quote: &ParsedQuote) -> f64 {
    if quote.previous_close == 0.0 {
        return f64::NAN;
    }

    (quote.current_price - quote.previous_close) / quote.previous_close * 100.0
}
