//! KIF 形式の棋譜を USI の指し手列へ変換する。
//!
//! - [`normalize`]: コメント・消費時間を取り除き、指し手行だけを残す
//! - [`encode`]: 指し手行を [`Move`] に分解する
//! - [`MoveList`]: `position startpos moves ...` 形式の指し手列

pub mod encode;
pub mod error;
pub mod move_list;
pub mod normalize;

pub use encode::{Conversion, Move, Origin, PieceKind, SkippedLine, Square, encode, encode_record};
pub use error::KifError;
pub use move_list::{MoveList, PositionBase, Side};
pub use normalize::normalize;
