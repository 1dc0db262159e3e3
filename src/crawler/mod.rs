use async_trait::async_trait;

/// 新浪財經
pub mod sina;

/// 即時報價的來源
///
/// 實作者只負責把單一股票的原始回應取回來。失敗時自行記錄並回傳 `None`，
/// 不向上拋出錯誤；呼叫端只把 `None` 當成唯一的失敗訊號。
/// 回傳的 future 可以在任何 await 點被丟棄，用來實現逾時取消。
#[async_trait]
pub trait QuoteFetcher: Send + Sync {
    async fn fetch(&self, symbol_key: &str) -> Option<String>;
}
