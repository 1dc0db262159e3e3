//! 非同步檔案日誌。
//!
//! 呼叫端只把訊息丟進 channel，實際寫檔由背景線程批次處理，
//! 因此在 scrape 的熱路徑上記錄錯誤不會阻塞 tokio worker。
//! 檔案位於 `log/<日期>_<名稱>.log`。

use std::{
    fmt::Write as _,
    fs::{self, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    thread,
};

use chrono::{format::DelayedFormat, DateTime, Local};
use crossbeam_channel::{unbounded, Sender};
use log::Level;
use once_cell::sync::Lazy;

/// 單次 flush 的緩衝上限
const BATCH_BYTES: usize = 4096;

static LOGGER: Lazy<Logger> = Lazy::new(|| Logger::new("exporter"));

pub struct Logger {
    writer: Option<Sender<LogMessage>>,
}

impl Logger {
    fn new(log_name: &str) -> Self {
        let log_path = match Self::get_log_path(log_name) {
            Some(p) => p,
            None => {
                error_console("Failed to create log directory, fall back to console.".to_string());
                return Logger { writer: None };
            }
        };
        let (tx, rx) = unbounded::<LogMessage>();

        // 寫入檔案的操作使用另一個線程處理
        thread::spawn(move || {
            let file = match OpenOptions::new().create(true).append(true).open(&log_path) {
                Ok(f) => f,
                Err(why) => {
                    error_console(format!(
                        "Failed to open log file {:?} because {:?}",
                        log_path, why
                    ));
                    for received in &rx {
                        received.print();
                    }
                    return;
                }
            };

            let mut writer = BufWriter::new(file);
            let mut line = String::with_capacity(BATCH_BYTES);

            for received in &rx {
                if writeln!(
                    &mut line,
                    "{} {} {}",
                    received.created_at.format("%F %X%.6f"),
                    received.level,
                    received.msg
                )
                .is_err()
                {
                    continue;
                }

                if rx.is_empty() || line.len() >= BATCH_BYTES {
                    if let Err(why) = writer.write_all(line.as_bytes()) {
                        error_console(format!(
                            "Failed to write to log file. because:{:#?}\r\nmsg:{}",
                            why, line
                        ));
                    }

                    if let Err(why) = writer.flush() {
                        error_console(format!("Failed to flush log file. because:{:#?}", why));
                    }

                    line.clear();
                }
            }
        });

        Logger { writer: Some(tx) }
    }

    fn send(&self, level: Level, msg: String) {
        let message = LogMessage::new(level, msg);
        match &self.writer {
            Some(writer) => {
                if let Err(why) = writer.send(message) {
                    error_console(why.to_string());
                }
            }
            None => message.print(),
        }
    }

    fn get_log_path(name: &str) -> Option<PathBuf> {
        let path = Path::new("log");

        if !path.exists() {
            fs::create_dir_all(path).ok()?;
        }

        let mut log_path = PathBuf::from(path);
        log_path.push(format!("{}_{}.log", Local::now().format("%Y-%m-%d"), name));

        Some(log_path)
    }
}

pub struct LogMessage {
    pub level: Level,
    pub msg: String,
    pub created_at: DateTime<Local>,
}

impl LogMessage {
    pub fn new(level: Level, msg: String) -> Self {
        LogMessage {
            level,
            msg,
            created_at: Local::now(),
        }
    }

    fn print(&self) {
        println!(
            "{} {} {}",
            self.created_at.format("%Y-%m-%d %H:%M:%S.%3f"),
            self.level,
            self.msg
        );
    }
}

pub fn info_file_async(log: impl Into<String>) {
    LOGGER.send(Level::Info, log.into());
}

pub fn warn_file_async(log: impl Into<String>) {
    LOGGER.send(Level::Warn, log.into());
}

pub fn error_file_async(log: impl Into<String>) {
    LOGGER.send(Level::Error, log.into());
}

pub fn debug_file_async(log: impl Into<String>) {
    LOGGER.send(Level::Debug, log.into());
}

pub fn info_console(log: String) {
    println!(
        "{} Info {}",
        Local::now().format("%Y-%m-%d %H:%M:%S.%3f"),
        log
    );
}

pub fn error_console(log: String) {
    println!(
        "{} Error {}",
        DelayedFormat::to_string(&Local::now().format("%Y-%m-%d %H:%M:%S.%3f")),
        log
    );
}
