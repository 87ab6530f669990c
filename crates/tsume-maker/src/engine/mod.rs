//! USI エンジンとの入出力
//!
//! [`EngineSession`] が実プロセスを持つ。探索側は [`UsiLink`] 越しに
//! コマンドを送り、出力を期限付きで回収する。

pub mod info;
pub mod session;

use std::time::Duration;

pub use info::{MateSearchResult, MateVerdict, Score};
pub use session::{EngineSession, SessionError};

/// [`UsiLink::drain_until`] が戻った理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainEnd {
    /// 終了条件に合う行を受け取った
    Matched,
    /// 期限切れ（stop を送った場合も含む）
    TimedOut,
    /// エンジンが終了していた
    Exited,
}

/// 1回の回収で得た出力
#[derive(Debug, Clone)]
pub struct Drained {
    /// エンジンが出した順の行
    pub lines: Vec<String>,
    pub end: DrainEnd,
}

/// エンジンとの1本の接続
pub trait UsiLink {
    /// コマンドを1行送る。エンジンが終了していれば何もしない。
    fn send(&mut self, cmd: &str);

    /// `until` が真を返す行、期限、エンジン終了のいずれかまで出力を回収する。
    ///
    /// `stop_on_timeout` なら期限切れで `stop` を送り、猶予時間だけ残りを待つ。
    fn drain_until(
        &mut self,
        until: &mut dyn FnMut(&str) -> bool,
        timeout: Duration,
        stop_on_timeout: bool,
    ) -> Drained;

    /// 前のコマンドの残り出力を捨て、捨てた行数を返す。
    fn discard_pending(&mut self) -> usize;
}
