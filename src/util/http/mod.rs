use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use reqwest::{header, Client, Method, Response};

use crate::{config::SETTINGS, logging, util};

pub mod user_agent;

/// A singleton instance of the reqwest client.
static CLIENT: OnceCell<Client> = OnceCell::new();

/// An asynchronous trait that provides a method to force convert a reqwest::Response body
/// from GBK encoding to UTF-8 encoding.
#[async_trait]
pub trait TextForceGbk {
    /// Converts the body of a reqwest::Response from GBK encoding to UTF-8 encoding.
    async fn text_force_gbk(self) -> Result<String>;
}

#[async_trait]
impl TextForceGbk for Response {
    async fn text_force_gbk(self) -> Result<String> {
        Ok(util::text::gbk_2_utf8(self.bytes().await?.as_ref()))
    }
}

/// Returns the reqwest client singleton instance or creates one if it doesn't exist.
///
/// 只設定連線逾時，整體請求時限交給呼叫端 (collector 的 scrape deadline) 控制。
fn get_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        // 重複安裝時回傳 Err，代表已有 provider，可以忽略
        let _ = rustls::crypto::ring::default_provider().install_default();

        Client::builder()
            .gzip(true)
            .connect_timeout(Duration::from_millis(SETTINGS.collector.connect_timeout_ms))
            .tcp_nodelay(true)
            .tcp_keepalive(Duration::from_secs(60))
            .pool_max_idle_per_host(SETTINGS.collector.concurrency)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(user_agent::gen_random_ua())
            .build()
            .map_err(|e| anyhow!("Failed to create reqwest client: {:?}", e))
    })
}

/// Performs an HTTP GET request and returns the response as text.
pub async fn get(url: &str, headers: Option<header::HeaderMap>) -> Result<String> {
    send(Method::GET, url, headers)
        .await?
        .text()
        .await
        .map_err(|e| anyhow!("Error parsing response text: {:?}", e))
}

/// Performs an HTTP GET request and returns the GBK encoded body as UTF-8 text.
pub async fn get_use_gbk(url: &str, headers: Option<header::HeaderMap>) -> Result<String> {
    send(Method::GET, url, headers)
        .await?
        .text_force_gbk()
        .await
        .map_err(|e| anyhow!("Error parsing response text use GBK: {:?}", e))
}

/// Sends an HTTP request once.
///
/// 不重試；非 2xx 的狀態碼也視為失敗。下一次 scrape 就是重試。
///
/// # Errors
///
/// 連線失敗、傳輸錯誤或狀態碼不是成功時回傳 `Err`。
async fn send(method: Method, url: &str, headers: Option<header::HeaderMap>) -> Result<Response> {
    let visit_log = format!("{method}:{url}");
    let client = get_client()?;
    let mut rb = client.request(method, url);

    if let Some(h) = headers {
        rb = rb.headers(h);
    }

    let start = Instant::now();
    let res = rb.send().await;
    let elapsed = start.elapsed().as_millis();

    match res {
        Ok(response) if response.status().is_success() => {
            logging::debug_file_async(format!("{} {} ms", visit_log, elapsed));
            Ok(response)
        }
        Ok(response) => Err(anyhow!(
            "{} returned status {}. {} ms",
            visit_log,
            response.status(),
            elapsed
        )),
        Err(why) => Err(anyhow!(
            "Failed to send {} because {:?}. {} ms",
            visit_log,
            why,
            elapsed
        )),
    }
}
