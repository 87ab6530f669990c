//! 棋譜から詰将棋を取り出すツール群
//!
//! 棋譜の変換は `tsume-kif`、USI エンジンとのやり取りは [`engine`]、
//! 局面を戻しながら詰みを探すのは [`scan`] が受け持つ。

pub mod config;
pub mod engine;
pub mod io;
pub mod record;
pub mod scan;

pub use config::TsumeConfig;
pub use record::{PuzzleRecord, PuzzleStore};
pub use scan::{BatchReport, MateFinder, ScanEnd, ScanReport};
