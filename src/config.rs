use std::{env, path::PathBuf, str::FromStr};

use anyhow::Result;
use config::{Config as config_config, File as config_file};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::{declare::MarketSelector, logging, util};

const CONFIG_PATH: &str = "app.json";

#[derive(Serialize, Deserialize, Default, Debug, Clone)]
#[serde(default)]
pub struct App {
    pub system: System,
    pub collector: Collector,
    pub sina: Sina,
    pub listing: Listing,
}

const SYSTEM_PORT: &str = "SYSTEM_PORT";
const SYSTEM_EXCHANGE: &str = "SYSTEM_EXCHANGE";

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct System {
    /// /metrics 監聽的埠號
    pub port: u16,
    /// 要載入的交易所 sh、sz、all
    pub exchange: MarketSelector,
}

impl Default for System {
    fn default() -> Self {
        System {
            port: 8080,
            exchange: MarketSelector::All,
        }
    }
}

const COLLECTOR_CONCURRENCY: &str = "COLLECTOR_CONCURRENCY";
const COLLECTOR_SCRAPE_TIMEOUT_MS: &str = "COLLECTOR_SCRAPE_TIMEOUT_MS";
const COLLECTOR_CONNECT_TIMEOUT_MS: &str = "COLLECTOR_CONNECT_TIMEOUT_MS";

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Collector {
    /// 同一時間最多幾個對上游的請求
    pub concurrency: usize,
    /// 一次 scrape 的總時限
    pub scrape_timeout_ms: u64,
    /// 建立連線的時限
    pub connect_timeout_ms: u64,
}

impl Default for Collector {
    fn default() -> Self {
        Collector {
            concurrency: util::concurrent_limit_64(),
            scrape_timeout_ms: 10_000,
            connect_timeout_ms: 5_000,
        }
    }
}

const SINA_QUOTE_URL: &str = "SINA_QUOTE_URL";
const SINA_REFERER: &str = "SINA_REFERER";

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Sina {
    /// 即時報價網址，後面直接接上股票代碼
    pub quote_url: String,
    pub referer: String,
}

impl Default for Sina {
    fn default() -> Self {
        Sina {
            quote_url: "https://hq.sinajs.cn/list=".to_string(),
            referer: "https://finance.sina.com.cn/".to_string(),
        }
    }
}

const LISTING_SSE_URL: &str = "LISTING_SSE_URL";
const LISTING_SSE_REFERER: &str = "LISTING_SSE_REFERER";
const LISTING_SZSE_URL: &str = "LISTING_SZSE_URL";

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Listing {
    /// 上交所 A 股清單下載網址
    pub sse_url: String,
    /// 上交所會檢查 Referer，沒有的話回傳錯誤
    pub sse_referer: String,
    /// 深交所清單 (sz000001,平安银行)
    pub szse_url: String,
}

impl Default for Listing {
    fn default() -> Self {
        Listing {
            sse_url: "http://query.sse.com.cn/security/stock/downloadStockListFile.do?csrcCode=&stockCode=&areaName=&stockType=1".to_string(),
            sse_referer: "http://www.sse.com.cn/assortment/stock/list/share/".to_string(),
            szse_url: "https://raw.githubusercontent.com/chentiangang/stock_exporter/master/szlist.txt".to_string(),
        }
    }
}

pub static SETTINGS: Lazy<App> = Lazy::new(|| {
    App::get().unwrap_or_else(|why| {
        logging::error_file_async(format!(
            "I can't read the config context because {:?}",
            why
        ));
        App::default().override_with_env()
    })
});

impl App {
    fn get() -> Result<Self> {
        let config_path = config_path();
        if config_path.exists() {
            let config: App = config_config::builder()
                .add_source(config_file::from(config_path))
                .build()?
                .try_deserialize()?;
            return Ok(config.override_with_env());
        }

        Ok(App::default().override_with_env())
    }

    /// 將來至於 env 的設定值覆蓋掉 json 上的設定值
    fn override_with_env(mut self) -> Self {
        override_parsed(SYSTEM_PORT, &mut self.system.port);
        override_parsed(SYSTEM_EXCHANGE, &mut self.system.exchange);

        override_parsed(COLLECTOR_CONCURRENCY, &mut self.collector.concurrency);
        override_parsed(
            COLLECTOR_SCRAPE_TIMEOUT_MS,
            &mut self.collector.scrape_timeout_ms,
        );
        override_parsed(
            COLLECTOR_CONNECT_TIMEOUT_MS,
            &mut self.collector.connect_timeout_ms,
        );

        if let Ok(url) = env::var(SINA_QUOTE_URL) {
            self.sina.quote_url = url;
        }

        if let Ok(referer) = env::var(SINA_REFERER) {
            self.sina.referer = referer;
        }

        if let Ok(url) = env::var(LISTING_SSE_URL) {
            self.listing.sse_url = url;
        }

        if let Ok(referer) = env::var(LISTING_SSE_REFERER) {
            self.listing.sse_referer = referer;
        }

        if let Ok(url) = env::var(LISTING_SZSE_URL) {
            self.listing.szse_url = url;
        }

        self
    }
}

/// env 有值且能轉型時才覆蓋，轉型失敗保留原值並記錄
fn override_parsed<T: FromStr>(key: &str, target: &mut T) {
    if let Ok(raw) = env::var(key) {
        match T::from_str(raw.trim()) {
            Ok(v) => *target = v,
            Err(_) => {
                logging::warn_file_async(format!("Ignore invalid env {}={}", key, raw));
            }
        }
    }
}

/// 回傳設定檔的路徑
fn config_path() -> PathBuf {
    PathBuf::from(CONFIG_PATH)
}
