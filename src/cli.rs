use anyhow::Result;
use clap::Parser;

use crate::{config::App, declare::MarketSelector};

#[derive(Debug, Parser)]
#[clap(about, version)]
pub struct Opts {
    /// 要載入的交易所︰sh、sz 或 all
    #[clap(short = 'e', long = "exchange")]
    pub exchange: Option<MarketSelector>,
    /// /metrics 監聽的埠號
    #[clap(short = 'p', long = "port")]
    pub port: Option<u16>,
}

impl Opts {
    pub fn parse_args() -> Result<Self> {
        let opts = Self::parse();
        Ok(opts)
    }

    /// 命令列參數優先於設定檔與 env
    pub fn apply(&self, mut app: App) -> App {
        if let Some(exchange) = self.exchange {
            app.system.exchange = exchange;
        }

        if let Some(port) = self.port {
            app.system.port = port;
        }

        app
    }
}
