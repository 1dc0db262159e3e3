//! # 新浪財經即時行情
//!
//! `GET https://hq.sinajs.cn/list=sh600000` 回傳一行 GBK 編碼的文字︰
//!
//! ```text
//! var hq_str_sh600000="浦发银行,10.010,9.950,10.020,...,2024-05-10,15:00:00,00,";
//! ```
//!
//! 沒有帶 `Referer` 的請求會被拒絕。

use async_trait::async_trait;
use concat_string::concat_string;
use reqwest::header::{self, HeaderMap, HeaderValue};

use crate::{config, crawler::QuoteFetcher, logging, util::http};

/// 報價文字解析
pub mod quote;

/// 新浪財經採集器
#[derive(Debug, Clone)]
pub struct Sina {
    quote_url: String,
    referer: String,
}

impl Sina {
    pub fn new(settings: &config::Sina) -> Self {
        Sina {
            quote_url: settings.quote_url.clone(),
            referer: settings.referer.clone(),
        }
    }

    fn build_headers(&self) -> HeaderMap {
        let mut h = HeaderMap::with_capacity(2);
        if let Ok(v) = HeaderValue::from_str(&self.referer) {
            h.insert(header::REFERER, v);
        }
        if let Ok(v) = HeaderValue::from_str(&http::user_agent::gen_random_ua()) {
            h.insert(header::USER_AGENT, v);
        }
        h
    }
}

#[async_trait]
impl QuoteFetcher for Sina {
    async fn fetch(&self, symbol_key: &str) -> Option<String> {
        let url = concat_string!(self.quote_url, symbol_key);

        match http::get_use_gbk(&url, Some(self.build_headers())).await {
            Ok(text) => Some(text),
            Err(why) => {
                logging::error_file_async(format!(
                    "Failed to fetch quote({}) because {:?}",
                    symbol_key, why
                ));
                None
            }
        }
    }
}
