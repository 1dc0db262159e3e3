//! # 報價收集
//!
//! 每次 scrape 對清單中的每檔股票各開一個 tokio task 執行
//! 「抓取 → 解析 → 計算漲跌幅」，全部完成後才一次回傳。
//!
//! - 回傳的樣本數永遠等於清單的股票數，順序與清單相同。
//! - 同時對上游的請求數由 semaphore 限制。
//! - 整次 scrape 共用一個 deadline，逾時的股票回傳降級樣本。
//! - `collect()` 的 future 被丟棄時，尚未完成的 task 會被 abort。
//! - 任何失敗都以「現價 0、漲跌幅 NaN」的樣本呈現，不會向上拋錯。

use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use scopeguard::{guard, ScopeGuard};
use strum::Display;
use tokio::{
    sync::Semaphore,
    task,
    time::{self, Instant},
};

use crate::{
    calculation, config,
    crawler::{
        sina::quote::{self, ParsedQuote},
        QuoteFetcher,
    },
    logging,
    registry::{Symbol, SymbolRegistry},
};

/// 樣本的內部狀態，不影響輸出的 gauge 數值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SampleStatus {
    Ok,
    /// 連線失敗或非 200
    FetchFailed,
    /// 欄位數不符或數值無法解析
    Malformed,
    /// 超過 scrape 時限
    TimedOut,
    /// task panic 或被取消
    Aborted,
}

/// 單一股票在一次 scrape 的結果
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub symbol: Symbol,
    /// 現價
    pub current_price: f64,
    /// 漲跌幅(%)
    pub change_ratio: f64,
    pub status: SampleStatus,
}

impl MetricSample {
    fn from_quote(symbol: Symbol, quote: ParsedQuote) -> Self {
        let status = if quote.valid {
            SampleStatus::Ok
        } else {
            SampleStatus::Malformed
        };

        MetricSample {
            symbol,
            current_price: quote.current_price,
            change_ratio: calculation::change_ratio(&quote),
            status,
        }
    }

    fn degraded(symbol: Symbol, status: SampleStatus) -> Self {
        MetricSample {
            status,
            ..Self::from_quote(symbol, ParsedQuote::default())
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == SampleStatus::Ok
    }
}

pub struct Collector {
    registry: SymbolRegistry,
    fetcher: Arc<dyn QuoteFetcher>,
    /// 同時對上游請求的名額
    permits: Arc<Semaphore>,
    scrape_timeout: Duration,
}

impl Collector {
    pub fn new(
        registry: SymbolRegistry,
        fetcher: Arc<dyn QuoteFetcher>,
        settings: &config::Collector,
    ) -> Self {
        Collector {
            registry,
            fetcher,
            permits: Arc::new(Semaphore::new(settings.concurrency.max(1))),
            scrape_timeout: Duration::from_millis(settings.scrape_timeout_ms),
        }
    }

    pub fn registry(&self) -> &SymbolRegistry {
        &self.registry
    }

    /// 收集清單中所有股票的報價，每檔一筆
    pub async fn collect(&self) -> Vec<MetricSample> {
        let start = Instant::now();
        let deadline = start + self.scrape_timeout;
        let symbols = self.registry.snapshot();

        let handles = symbols
            .iter()
            .map(|symbol| {
                task::spawn(collect_one(
                    symbol.clone(),
                    Arc::clone(&self.fetcher),
                    Arc::clone(&self.permits),
                    deadline,
                ))
            })
            .collect::<Vec<_>>();

        // 呼叫端中途放棄 (例︰HTTP client 斷線) 時取消尚未完成的 task
        let aborts = guard(
            handles
                .iter()
                .map(|h| h.abort_handle())
                .collect::<Vec<_>>(),
            |aborts| {
                for a in aborts {
                    a.abort();
                }
            },
        );

        let results = join_all(handles).await;
        let _ = ScopeGuard::into_inner(aborts);

        let samples = symbols
            .iter()
            .zip(results)
            .map(|(symbol, joined)| match joined {
                Ok(sample) => sample,
                Err(why) => {
                    logging::error_file_async(format!(
                        "Quote task of {} aborted because {:?}",
                        symbol.key, why
                    ));
                    MetricSample::degraded(symbol.clone(), SampleStatus::Aborted)
                }
            })
            .collect::<Vec<_>>();

        let ok = samples.iter().filter(|s| s.is_ok()).count();
        logging::info_file_async(format!(
            "Collected {} symbols, ok:{} failed:{} {} ms",
            samples.len(),
            ok,
            samples.len() - ok,
            start.elapsed().as_millis()
        ));

        samples
    }
}

async fn collect_one(
    symbol: Symbol,
    fetcher: Arc<dyn QuoteFetcher>,
    permits: Arc<Semaphore>,
    deadline: Instant,
) -> MetricSample {
    let work = async {
        // 等待名額的時間也算在 scrape 時限內
        let _permit = permits.acquire().await.ok()?;
        fetcher.fetch(&symbol.key).await
    };
    let result = time::timeout_at(deadline, work).await;

    match result {
        Ok(Some(text)) => MetricSample::from_quote(symbol, quote::parse(&text)),
        Ok(None) => MetricSample::degraded(symbol, SampleStatus::FetchFailed),
        Err(_) => {
            logging::warn_file_async(format!("Quote of {} timed out", symbol.key));
            MetricSample::degraded(symbol, SampleStatus::TimedOut)
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;

    use super::*;
    use crate::crawler::sina::quote::tests::quote_line;

    /// 依代碼回傳預先設定的延遲與內容
    #[derive(Default)]
    pub(crate) struct StubFetcher {
        responses: HashMap<String, (u64, Option<String>)>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        finished: AtomicUsize,
    }

    impl StubFetcher {
        pub(crate) fn respond(mut self, key: &str, delay_ms: u64, body: Option<String>) -> Self {
            self.responses.insert(key.to_string(), (delay_ms, body));
            self
        }

        pub(crate) fn quote(self, key: &str, delay_ms: u64, previous_close: &str, current: &str) -> Self {
            let body = quote_line(key, key, previous_close, current);
            self.respond(key, delay_ms, Some(body))
        }
    }

    #[async_trait]
    impl QuoteFetcher for StubFetcher {
        async fn fetch(&self, symbol_key: &str) -> Option<String> {
            let (delay_ms, body) = self
                .responses
                .get(symbol_key)
                .cloned()
                .unwrap_or((0, None));

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            let _in_flight = guard(&self.in_flight, |f| {
                f.fetch_sub(1, Ordering::SeqCst);
            });

            time::sleep(Duration::from_millis(delay_ms)).await;
            if symbol_key == "panic" {
                panic!("stub panic");
            }

            self.finished.fetch_add(1, Ordering::SeqCst);
            body
        }
    }

    pub(crate) fn settings(concurrency: usize, scrape_timeout_ms: u64) -> config::Collector {
        config::Collector {
            concurrency,
            scrape_timeout_ms,
            connect_timeout_ms: 1_000,
        }
    }

    fn find<'a>(samples: &'a [MetricSample], key: &str) -> &'a MetricSample {
        samples
            .iter()
            .find(|s| s.symbol.key == key)
            .unwrap_or_else(|| panic!("missing sample {}", key))
    }

    #[tokio::test]
    async fn test_collect_one_sample_per_symbol() {
        dotenv::dotenv().ok();
        let registry = SymbolRegistry::new([
            ("sh600000", "PuFaBank"),
            ("sh600004", "白云机场"),
            ("sz000001", "平安银行"),
            ("sz000002", "万科A"),
            ("sz000004", "国华网安"),
        ]);
        let fetcher = StubFetcher::default()
            .quote("sh600000", 1, "9.50", "10.00")
            .respond("sh600004", 1, None)
            .respond(
                "sz000001",
                1,
                Some("var hq_str_sz000001=\"\";".to_string()),
            )
            .quote("sz000002", 1, "8.00", "8.80");
        let collector = Collector::new(registry, Arc::new(fetcher), &settings(8, 2_000));

        let samples = collector.collect().await;

        assert_eq!(samples.len(), 5);
        let keys: Vec<&str> = samples.iter().map(|s| s.symbol.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["sh600000", "sh600004", "sz000001", "sz000002", "sz000004"]
        );

        assert_eq!(find(&samples, "sh600000").status, SampleStatus::Ok);
        assert_eq!(find(&samples, "sz000002").status, SampleStatus::Ok);

        let failed = find(&samples, "sh600004");
        assert_eq!(failed.status, SampleStatus::FetchFailed);
        assert_eq!(failed.current_price, 0.0);
        assert!(failed.change_ratio.is_nan());

        let malformed = find(&samples, "sz000001");
        assert_eq!(malformed.status, SampleStatus::Malformed);
        assert_eq!(malformed.current_price, 0.0);

        // 沒有設定回應的代碼視為抓取失敗
        assert_eq!(find(&samples, "sz000004").status, SampleStatus::FetchFailed);
    }

    #[tokio::test]
    async fn test_collect_keeps_attribution_under_varied_latency() {
        dotenv::dotenv().ok();
        let registry = SymbolRegistry::new([("sh600000", "A"), ("sh600001", "B"), ("sh600002", "C")]);
        let fetcher = StubFetcher::default()
            .quote("sh600000", 50, "1.00", "1.10")
            .quote("sh600001", 5, "2.00", "1.80")
            .quote("sh600002", 20, "3.00", "3.00");
        let collector = Collector::new(registry, Arc::new(fetcher), &settings(8, 2_000));

        let samples = collector.collect().await;

        let a = find(&samples, "sh600000");
        assert_eq!(a.symbol.name, "A");
        assert_eq!(a.current_price, 1.1);
        assert!((a.change_ratio - 10.0).abs() < 1e-9);

        let b = find(&samples, "sh600001");
        assert_eq!(b.symbol.name, "B");
        assert_eq!(b.current_price, 1.8);
        assert!((b.change_ratio + 10.0).abs() < 1e-9);

        let c = find(&samples, "sh600002");
        assert_eq!(c.current_price, 3.0);
        assert_eq!(c.change_ratio, 0.0);
    }

    #[tokio::test]
    async fn test_collect_end_to_end_scenario() {
        dotenv::dotenv().ok();
        let registry = SymbolRegistry::new([("sh600000", "PuFaBank")]);
        let fetcher = StubFetcher::default().respond(
            "sh600000",
            0,
            Some(quote_line("sh600000", "PuFaBank", "9.50", "10.00")),
        );
        let collector = Collector::new(registry, Arc::new(fetcher), &settings(8, 2_000));

        let samples = collector.collect().await;

        assert_eq!(samples.len(), 1);
        let s = &samples[0];
        assert_eq!(s.symbol, Symbol::new("sh600000", "PuFaBank"));
        assert_eq!(s.current_price, 10.0);
        assert!((s.change_ratio - 5.263).abs() < 1e-3);
        assert!(s.is_ok());
    }

    #[tokio::test]
    async fn test_collect_scrape_deadline() {
        dotenv::dotenv().ok();
        let registry = SymbolRegistry::new([("sh600000", "fast"), ("sh600001", "stalled")]);
        let fetcher = StubFetcher::default()
            .quote("sh600000", 1, "9.50", "10.00")
            .quote("sh600001", 60_000, "9.50", "10.00");
        let collector = Collector::new(registry, Arc::new(fetcher), &settings(8, 200));

        let start = std::time::Instant::now();
        let samples = collector.collect().await;

        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(samples.len(), 2);
        assert_eq!(find(&samples, "sh600000").status, SampleStatus::Ok);

        let stalled = find(&samples, "sh600001");
        assert_eq!(stalled.status, SampleStatus::TimedOut);
        assert_eq!(stalled.current_price, 0.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_collect_concurrency_cap() {
        dotenv::dotenv().ok();
        let mut fetcher = StubFetcher::default();
        let mut entries = Vec::new();
        for i in 0..24 {
            let key = format!("sz{:06}", i);
            fetcher = fetcher.quote(&key, 10, "1.00", "1.01");
            entries.push((key.clone(), key));
        }
        let fetcher = Arc::new(fetcher);
        let collector = Collector::new(
            SymbolRegistry::new(entries),
            fetcher.clone(),
            &settings(3, 5_000),
        );

        let samples = collector.collect().await;

        assert_eq!(samples.len(), 24);
        assert!(samples.iter().all(|s| s.is_ok()));
        assert!(fetcher.max_in_flight.load(Ordering::SeqCst) <= 3);
        assert_eq!(fetcher.finished.load(Ordering::SeqCst), 24);
    }

    #[tokio::test]
    async fn test_collect_survives_panicking_task() {
        dotenv::dotenv().ok();
        let registry = SymbolRegistry::new([("panic", "boom"), ("sh600000", "PuFaBank")]);
        let fetcher = StubFetcher::default().quote("sh600000", 1, "9.50", "10.00");
        let collector = Collector::new(registry, Arc::new(fetcher), &settings(8, 2_000));

        let samples = collector.collect().await;

        assert_eq!(samples.len(), 2);
        assert_eq!(find(&samples, "panic").status, SampleStatus::Aborted);
        assert_eq!(find(&samples, "panic").current_price, 0.0);
        assert!(find(&samples, "sh600000").is_ok());
    }

    #[tokio::test]
    async fn test_dropping_collect_aborts_tasks() {
        dotenv::dotenv().ok();
        let registry = SymbolRegistry::new([("sh600000", "a"), ("sh600001", "b")]);
        let fetcher = Arc::new(
            StubFetcher::default()
                .quote("sh600000", 60_000, "1.00", "1.00")
                .quote("sh600001", 60_000, "1.00", "1.00"),
        );
        let collector = Collector::new(registry, fetcher.clone(), &settings(8, 120_000));

        let outcome = time::timeout(Duration::from_millis(50), collector.collect()).await;
        assert!(outcome.is_err());

        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fetcher.in_flight.load(Ordering::SeqCst), 0);
        assert_eq!(fetcher.finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_collect_empty_registry() {
        dotenv::dotenv().ok();
        let collector = Collector::new(
            SymbolRegistry::default(),
            Arc::new(StubFetcher::default()),
            &settings(8, 1_000),
        );

        assert!(collector.collect().await.is_empty());
        assert!(collector.registry().is_empty());
    }
}
