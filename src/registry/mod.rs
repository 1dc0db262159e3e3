//! # 股票清單
//!
//! 啟動時下載一次各交易所的股票代碼與名稱，之後整個行程都只讀不寫。
//! Collector 每次 scrape 取得的是同一份 [`SymbolRegistry`] 快照，
//! 因此不需要任何鎖。
//!
//! - 上交所 (`sse`)：官網的 A 股清單檔，GBK 編碼、以空白或 tab 分隔。
//! - 深交所 (`szse`)：`sz000001,平安银行` 格式的文字檔。

use std::{collections::BTreeMap, slice::Iter, sync::Arc};

use anyhow::{anyhow, Result};

use crate::{
    config,
    declare::{MarketSelector, StockExchange},
    logging,
};

/// 上海證券交易所股票清單
pub mod sse;
/// 深圳證券交易所股票清單
pub mod szse;

/// 一檔股票
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    /// 含交易所前綴的代碼，例︰sh600000
    pub key: String,
    /// 顯示名稱
    pub name: String,
}

impl Symbol {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Symbol {
            key: key.into(),
            name: name.into(),
        }
    }
}

/// 不可變的股票清單，依代碼排序且代碼唯一
#[derive(Debug, Clone)]
pub struct SymbolRegistry {
    symbols: Arc<[Symbol]>,
}

impl Default for SymbolRegistry {
    fn default() -> Self {
        SymbolRegistry {
            symbols: Arc::from(Vec::new()),
        }
    }
}

impl SymbolRegistry {
    /// 相同代碼以最後一筆為準
    pub fn new<K, N>(entries: impl IntoIterator<Item = (K, N)>) -> Self
    where
        K: Into<String>,
        N: Into<String>,
    {
        let map: BTreeMap<String, String> = entries
            .into_iter()
            .map(|(k, n)| (k.into(), n.into()))
            .collect();

        SymbolRegistry {
            symbols: map
                .into_iter()
                .map(|(key, name)| Symbol { key, name })
                .collect(),
        }
    }

    /// 取得整份清單的共享快照
    pub fn snapshot(&self) -> Arc<[Symbol]> {
        Arc::clone(&self.symbols)
    }

    pub fn get(&self, key: &str) -> Option<&Symbol> {
        self.symbols
            .binary_search_by(|s| s.key.as_str().cmp(key))
            .ok()
            .map(|i| &self.symbols[i])
    }

    pub fn iter(&self) -> Iter<'_, Symbol> {
        self.symbols.iter()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl<K: Into<String>, N: Into<String>> FromIterator<(K, N)> for SymbolRegistry {
    fn from_iter<T: IntoIterator<Item = (K, N)>>(iter: T) -> Self {
        SymbolRegistry::new(iter)
    }
}

/// 依市場別下載股票清單
///
/// 任何一個來源失敗或最後清單為空都回傳錯誤，呼叫端應直接結束行程。
pub async fn load(selector: MarketSelector, listing: &config::Listing) -> Result<SymbolRegistry> {
    let mut entries: Vec<(String, String)> = Vec::with_capacity(5000);

    for exchange in selector.exchanges() {
        let listed = match exchange {
            StockExchange::SSE => sse::visit(listing).await,
            StockExchange::SZSE => szse::visit(listing).await,
        }
        .map_err(|why| {
            anyhow!(
                "Failed to load {}({}) listing because {:?}",
                exchange.name(),
                exchange,
                why
            )
        })?;

        logging::info_file_async(format!(
            "Loaded {} symbols from {}",
            listed.len(),
            exchange.name()
        ));
        entries.extend(listed);
    }

    let registry = SymbolRegistry::new(entries);
    if registry.is_empty() {
        return Err(anyhow!("No symbol loaded for market {}", selector));
    }

    Ok(registry)
}
