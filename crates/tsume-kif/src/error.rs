//! KIF 変換のエラー型

/// 棋譜変換で発生するエラー
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum KifError {
    /// 文法上は指し手行だが、必要な位置の文字が欠けている・変換表にない
    #[error("malformed move line `{line}`: {reason}")]
    MalformedMove { line: String, reason: &'static str },

    /// `position startpos|sfen ... [moves ...]` として解釈できない行
    #[error("invalid position command `{line}`: {reason}")]
    InvalidPosition { line: String, reason: String },
}

impl KifError {
    pub(crate) fn malformed(line: &str, reason: &'static str) -> Self {
        KifError::MalformedMove {
            line: line.to_string(),
            reason,
        }
    }
}
