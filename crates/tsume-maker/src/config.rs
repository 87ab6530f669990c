//! 設定
//!
//! TOML ファイル（任意）→ CLI 引数の順で上書きする。エンジンのパスは
//! ここで決めた値を [`EngineConfig`] ごと `EngineSession::open` に渡す。

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// 設定値の矛盾
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("engine path is not configured (use --engine or [engine].path)")]
    MissingEnginePath,

    #[error("eval thresholds out of order: losing_below={losing_below} neutral_band={neutral_band} mating_at={mating_at}")]
    ThresholdOrder {
        losing_below: i32,
        neutral_band: i32,
        mating_at: i32,
    },

    #[error("engine.multipv must be at least 2 to detect duals, got {0}")]
    MultipvTooSmall(u32),

    #[error("{0} must be positive")]
    NotPositive(&'static str),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TsumeConfig {
    pub engine: EngineConfig,
    pub scan: ScanConfig,
}

impl TsumeConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: TsumeConfig = toml::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// 起動前の整合性チェック
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.path.as_os_str().is_empty() {
            return Err(ConfigError::MissingEnginePath);
        }
        if self.engine.multipv < 2 {
            return Err(ConfigError::MultipvTooSmall(self.engine.multipv));
        }
        if self.scan.eval_depth == 0 {
            return Err(ConfigError::NotPositive("scan.eval_depth"));
        }
        if self.scan.mate_time_ms == 0 {
            return Err(ConfigError::NotPositive("scan.mate_time_ms"));
        }
        self.scan.thresholds.validate()
    }
}

/// エンジンプロセス起動時の設定。
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub path: PathBuf,
    pub args: Vec<String>,
    /// 起動ディレクトリ。未指定ならエンジン本体のあるディレクトリ。
    pub workdir: Option<PathBuf>,
    /// MultiPV（上位何本の読み筋を返させるか）
    pub multipv: u32,
    /// USI_Hash (MiB)
    pub hash_mb: u32,
    /// 定跡を使うか（USI_OwnBook）
    pub own_book: bool,
    /// 追加のUSIオプション (Name=Value 形式)
    pub usi_options: Vec<String>,
    /// usiok / readyok を待つ時間
    pub ready_timeout_ms: u64,
    /// quit 送信後に終了を待つ時間。過ぎたら kill する。
    pub quit_timeout_ms: u64,
    /// stop 送信後に残りの出力を待つ時間
    pub stop_grace_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            args: Vec::new(),
            workdir: None,
            multipv: 2,
            hash_mb: 256,
            own_book: false,
            usi_options: Vec::new(),
            ready_timeout_ms: 30_000,
            quit_timeout_ms: 300,
            stop_grace_ms: 1_000,
        }
    }
}

impl EngineConfig {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn quit_timeout(&self) -> Duration {
        Duration::from_millis(self.quit_timeout_ms)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    /// 実際に使う起動ディレクトリ
    pub fn effective_workdir(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.workdir {
            return Some(dir.clone());
        }
        self.path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
    }
}

/// 後退探索の設定
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    /// 形勢判断に使う浅い探索の深さ
    pub eval_depth: u32,
    /// 浅い探索の打ち切り時間
    pub eval_timeout_ms: u64,
    /// `go mate` に渡す詰み探索時間
    pub mate_time_ms: u64,
    /// 詰み探索の応答を待つ追加時間
    pub mate_margin_ms: u64,
    pub thresholds: EvalThresholds,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            eval_depth: 6,
            eval_timeout_ms: 5_000,
            mate_time_ms: 3_000,
            mate_margin_ms: 1_000,
            thresholds: EvalThresholds::default(),
        }
    }
}

impl ScanConfig {
    pub fn eval_timeout(&self) -> Duration {
        Duration::from_millis(self.eval_timeout_ms)
    }

    pub fn mate_deadline(&self) -> Duration {
        Duration::from_millis(self.mate_time_ms.saturating_add(self.mate_margin_ms))
    }
}

/// 浅い探索の評価値（手番側から見た cp）の区分
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalBand {
    /// 0 付近。1手戻す
    Neutral,
    /// 手番側がはっきり負け。1手戻す
    Losing,
    /// 詰みがありそう。詰み探索へ
    Mating,
    /// どちらとも言えない。探索を終える
    Ambiguous,
}

/// 評価値の閾値。経験的な値なので設定で変えられるようにしている。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvalThresholds {
    /// |score| がこれ以下なら Neutral
    pub neutral_band: i32,
    /// これ未満なら Losing
    pub losing_below: i32,
    /// これ以上なら Mating
    pub mating_at: i32,
}

impl Default for EvalThresholds {
    fn default() -> Self {
        Self {
            neutral_band: 100,
            losing_below: -2_000,
            mating_at: 2_000,
        }
    }
}

impl EvalThresholds {
    pub fn classify(&self, score: i32) -> EvalBand {
        if score.abs() <= self.neutral_band {
            EvalBand::Neutral
        } else if score < self.losing_below {
            EvalBand::Losing
        } else if score >= self.mating_at {
            EvalBand::Mating
        } else {
            EvalBand::Ambiguous
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.neutral_band < 0
            || self.losing_below >= -self.neutral_band
            || self.mating_at <= self.neutral_band
        {
            return Err(ConfigError::ThresholdOrder {
                losing_below: self.losing_below,
                neutral_band: self.neutral_band,
                mating_at: self.mating_at,
            });
        }
        Ok(())
    }
}
