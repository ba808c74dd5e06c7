//! Bar replay from JSON-lines files

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::signal::{Signal, SignalKind, SignalMeta};

/// Errors reading a bar file
#[derive(Debug, Error)]
pub enum BarError {
    #[error("Failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read line {line}: {source}")]
    Read { line: usize, source: std::io::Error },
    #[error("Invalid bar on line {line}: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },
    #[error("Invalid bar on line {line}: {reason}")]
    Invalid { line: usize, reason: String },
}

/// OHLC price sample. Only high, low and close drive the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub open: Option<Decimal>,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    #[serde(default)]
    pub volume: Option<Decimal>,
}

impl PriceBar {
    /// Bar with every price equal to `close`
    pub fn flat(timestamp: DateTime<Utc>, close: Decimal) -> Self {
        Self {
            timestamp,
            open: None,
            high: close,
            low: close,
            close,
            volume: None,
        }
    }

    fn check(&self) -> Result<(), String> {
        if self.close <= Decimal::ZERO || self.low <= Decimal::ZERO {
            return Err("prices must be positive".into());
        }
        if self.high < self.low {
            return Err(format!("high {} below low {}", self.high, self.low));
        }
        if self.close > self.high || self.close < self.low {
            return Err(format!("close {} outside [{}, {}]", self.close, self.low, self.high));
        }
        Ok(())
    }
}

/// One line of a replay file: a bar plus the signal computed at its close
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalBar {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub open: Option<Decimal>,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    #[serde(default)]
    pub volume: Option<Decimal>,
    #[serde(default = "default_signal")]
    pub signal: SignalKind,
    /// Model confidence in `[0, 1]`. Missing means 0, which the default
    /// threshold rejects, so BUY/SELL lines without it never open a position.
    #[serde(default)]
    pub confidence: Decimal,
    #[serde(default)]
    pub meta: SignalMeta,
}

fn default_signal() -> SignalKind {
    SignalKind::Hold
}

impl SignalBar {
    pub fn new(bar: PriceBar, signal: Signal) -> Self {
        Self {
            timestamp: bar.timestamp,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            signal: signal.kind,
            confidence: signal.confidence,
            meta: signal.meta,
        }
    }

    pub fn bar(&self) -> PriceBar {
        PriceBar {
            timestamp: self.timestamp,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }

    pub fn signal(&self) -> Signal {
        Signal {
            kind: self.signal,
            confidence: self.confidence,
            meta: self.meta.clone(),
        }
    }
}

/// Reads [`SignalBar`]s from JSON lines, enforcing non-decreasing timestamps.
/// Blank lines and lines starting with `#` are skipped.
pub struct BarStream<R> {
    reader: R,
    line: usize,
    last_timestamp: Option<DateTime<Utc>>,
    warned_confidence: bool,
    buf: String,
}

impl BarStream<BufReader<File>> {
    /// Open a bar file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BarError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| BarError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_reader(BufReader::new(file)))
    }

    /// Read a whole bar file into memory
    pub fn load(path: impl AsRef<Path>) -> Result<Vec<SignalBar>, BarError> {
        Self::open(path)?.collect()
    }
}

impl<R: BufRead> BarStream<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            last_timestamp: None,
            warned_confidence: false,
            buf: String::new(),
        }
    }

    fn next_bar(&mut self) -> Option<Result<SignalBar, BarError>> {
        loop {
            self.buf.clear();
            self.line += 1;
            let line = self.line;
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(source) => return Some(Err(BarError::Read { line, source })),
            }

            let text = self.buf.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }

            let bar: SignalBar = match serde_json::from_str(text) {
                Ok(bar) => bar,
                Err(source) => return Some(Err(BarError::Parse { line, source })),
            };
            if let Err(reason) = bar.bar().check() {
                return Some(Err(BarError::Invalid { line, reason }));
            }
            if let Some(last) = self.last_timestamp {
                if bar.timestamp < last {
                    return Some(Err(BarError::Invalid {
                        line,
                        reason: format!("timestamp {} before {}", bar.timestamp, last),
                    }));
                }
            }
            let actionable = bar.signal.side().is_some();
            if actionable && bar.confidence.is_zero() && !self.warned_confidence {
                tracing::warn!(
                    line,
                    signal = ?bar.signal,
                    "Signal with zero or missing confidence"
                );
                self.warned_confidence = true;
            }
            self.last_timestamp = Some(bar.timestamp);
            return Some(Ok(bar));
        }
    }
}

impl<R: BufRead> Iterator for BarStream<R> {
    type Item = Result<SignalBar, BarError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_bar()
    }
}
