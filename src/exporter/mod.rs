//! # Prometheus 輸出
//!
//! 每次 `/metrics` 請求都重新收集一次報價，並在一個新的 [`Registry`]
//! 上產生兩個 gauge︰
//!
//! | 名稱 | 說明 |
//! |---|---|
//! | `stock_current_price{name, code}` | 現價 |
//! | `stock_current_adr{name, code}` | 漲跌幅(%) |
//!
//! 不保留上一次 scrape 的任何狀態，已下市或本次失敗的股票也不會殘留舊值。

use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder, TEXT_FORMAT};

use crate::{
    collector::{Collector, MetricSample},
    logging,
};

pub const PRICE_METRIC: &str = "stock_current_price";
pub const RATIO_METRIC: &str = "stock_current_adr";
const LABELS: [&str; 2] = ["name", "code"];

/// 將樣本轉成 Prometheus 文字格式
pub fn render(samples: &[MetricSample]) -> Result<String> {
    let registry = Registry::new();
    let price = GaugeVec::new(Opts::new(PRICE_METRIC, "query stock current price"), &LABELS)?;
    let ratio = GaugeVec::new(Opts::new(RATIO_METRIC, "stock Rate of rise and fall"), &LABELS)?;
    registry.register(Box::new(price.clone()))?;
    registry.register(Box::new(ratio.clone()))?;

    for sample in samples {
        let labels = [sample.symbol.name.as_str(), sample.symbol.key.as_str()];
        price.with_label_values(&labels).set(sample.current_price);
        ratio.with_label_values(&labels).set(sample.change_ratio);
    }

    let mut buffer = Vec::with_capacity(samples.len() * 160);
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;

    Ok(String::from_utf8(buffer)?)
}

pub fn router(collector: Arc<Collector>) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .with_state(collector)
}

async fn metrics(State(collector): State<Arc<Collector>>) -> Response {
    let samples = collector.collect().await;

    match render(&samples) {
        Ok(body) => ([(header::CONTENT_TYPE, TEXT_FORMAT)], body).into_response(),
        Err(why) => {
            logging::error_file_async(format!("Failed to render metrics because {:?}", why));
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to render metrics").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use tokio::net::TcpListener;

    use super::*;
    use crate::{
        collector::tests::{settings, StubFetcher},
        registry::SymbolRegistry,
        util::http,
    };

    /// 取出指定 metric 且含有指定代碼的那一行
    fn line_of<'a>(text: &'a str, metric: &str, code: &str) -> Option<&'a str> {
        let code_label = format!("code=\"{}\"", code);
        text.lines()
            .find(|l| l.starts_with(&format!("{}{{", metric)) && l.contains(&code_label))
    }

    fn value_of(line: &str) -> f64 {
        line.rsplit(' ').next().unwrap().parse().unwrap()
    }

    async fn collect(registry: SymbolRegistry, fetcher: StubFetcher) -> Vec<MetricSample> {
        Collector::new(registry, Arc::new(fetcher), &settings(8, 2_000))
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_render() {
        dotenv::dotenv().ok();
        let samples = collect(
            SymbolRegistry::new([("sh600000", "PuFaBank"), ("sz000001", "平安银行")]),
            StubFetcher::default()
                .quote("sh600000", 0, "9.50", "10.00")
                .respond("sz000001", 0, None),
        )
        .await;

        let text = render(&samples).unwrap();

        assert!(text.contains("# HELP stock_current_price query stock current price"));
        assert!(text.contains("# TYPE stock_current_price gauge"));
        assert!(text.contains("# HELP stock_current_adr stock Rate of rise and fall"));
        assert!(text.contains("# TYPE stock_current_adr gauge"));

        let price = line_of(&text, PRICE_METRIC, "sh600000").unwrap();
        assert!(price.contains("name=\"PuFaBank\""));
        assert_eq!(value_of(price), 10.0);

        let ratio = value_of(line_of(&text, RATIO_METRIC, "sh600000").unwrap());
        assert!((ratio - 5.263).abs() < 1e-3);

        // 失敗的股票仍然輸出，現價為 0、漲跌幅為 NaN
        let failed = line_of(&text, PRICE_METRIC, "sz000001").unwrap();
        assert!(failed.contains("name=\"平安银行\""));
        assert_eq!(value_of(failed), 0.0);
        assert!(value_of(line_of(&text, RATIO_METRIC, "sz000001").unwrap()).is_nan());
    }

    #[test]
    fn test_render_empty() {
        let text = render(&[]).unwrap();
        assert!(!text.contains("stock_current_price{"));
        assert!(!text.contains("stock_current_adr{"));
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        dotenv::dotenv().ok();
        let collector = Collector::new(
            SymbolRegistry::new([("sh600000", "PuFaBank"), ("sh600001", "Stalled")]),
            Arc::new(
                StubFetcher::default()
                    .quote("sh600000", 0, "9.50", "10.00")
                    .quote("sh600001", 0, "0", "3.00"),
            ),
            &settings(8, 2_000),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(Arc::new(collector)))
                .await
                .unwrap();
        });

        let text = http::get(&format!("http://{}/metrics", addr), None)
            .await
            .unwrap();

        assert_eq!(value_of(line_of(&text, PRICE_METRIC, "sh600000").unwrap()), 10.0);
        assert_eq!(value_of(line_of(&text, PRICE_METRIC, "sh600001").unwrap()), 3.0);
        // 昨收為零無法計算漲跌幅
        assert!(value_of(line_of(&text, RATIO_METRIC, "sh600001").unwrap()).is_nan());
    }
}
