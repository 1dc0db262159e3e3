use concat_string::concat_string;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// 交易所
#[derive(PartialEq, Eq, Debug, Copy, Clone, Display)]
pub enum StockExchange {
    /// 上海證券交易所
    #[strum(serialize = "sh")]
    SSE,
    /// 深圳證券交易所
    #[strum(serialize = "sz")]
    SZSE,
}

impl StockExchange {
    /// 新浪行情代碼的前綴，例︰sh600000
    pub fn prefix(&self) -> &'static str {
        match self {
            StockExchange::SSE => "sh",
            StockExchange::SZSE => "sz",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StockExchange::SSE => "上交所",
            StockExchange::SZSE => "深交所",
        }
    }

    /// 組出含交易所前綴的代碼
    pub fn symbol_key(&self, code: &str) -> String {
        concat_string!(self.prefix(), code)
    }

    pub fn iterator() -> impl Iterator<Item = Self> {
        [Self::SSE, Self::SZSE].iter().copied()
    }
}

/// 啟動時要載入哪些交易所的股票清單
#[derive(
    PartialEq, Eq, Debug, Copy, Clone, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum MarketSelector {
    /// 僅上交所
    Sh,
    /// 僅深交所
    Sz,
    /// 兩者皆載入
    #[default]
    All,
}

impl MarketSelector {
    pub fn exchanges(&self) -> Vec<StockExchange> {
        match self {
            MarketSelector::Sh => vec![StockExchange::SSE],
            MarketSelector::Sz => vec![StockExchange::SZSE],
            MarketSelector::All => StockExchange::iterator().collect(),
        }
    }
}
