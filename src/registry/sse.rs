use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{self, HeaderMap, HeaderValue};

use crate::{config, declare::StockExchange, util::http};

/// 清單中的六碼股票代碼
static CODE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^\d{6}$").ok());

/// 下載上交所 A 股清單
pub async fn visit(listing: &config::Listing) -> Result<Vec<(String, String)>> {
    let headers = build_headers(&listing.sse_referer);
    let text = http::get_use_gbk(&listing.sse_url, Some(headers)).await?;

    Ok(parse_listing(&text))
}

fn build_headers(referer: &str) -> HeaderMap {
    let mut h = HeaderMap::with_capacity(4);
    h.insert(header::ACCEPT, HeaderValue::from_static("*/*"));
    h.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("zh-CN,zh;q=0.9"),
    );
    // 關鍵 header，沒有的話上交所回傳錯誤
    if let Ok(v) = HeaderValue::from_str(referer) {
        h.insert(header::REFERER, v);
    }
    h.insert(header::ORIGIN, HeaderValue::from_static("http://www.sse.com.cn"));
    h
}

/// 解析清單檔
///
/// 每一行以空白或 tab 切開，只要某欄剛好是六碼數字且後面還有欄位，
/// 就把 `sh<代碼>` 對應到下一欄的名稱。
pub(crate) fn parse_listing(text: &str) -> Vec<(String, String)> {
    let re = match CODE.as_ref() {
        Some(re) => re,
        None => return Vec::new(),
    };
    let mut result = Vec::with_capacity(2048);

    for line in text.lines() {
        let fields: Vec<&str> = line
            .split([' ', '\t', '\r'])
            .filter(|f| !f.is_empty())
            .collect();

        for (k, field) in fields.iter().enumerate() {
            if !re.is_match(field) {
                continue;
            }

            if let Some(name) = fields.get(k + 1) {
                result.push((StockExchange::SSE.symbol_key(field), name.to_string()));
            }
        }
    }

    result
}
