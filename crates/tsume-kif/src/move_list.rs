//! USI の指し手列（`position startpos moves ...`）

use std::fmt;

use crate::error::KifError;

/// 指し手列の起点となる局面
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionBase {
    /// 平手初期局面
    Startpos,
    /// `moves` より前の SFEN 本体
    Sfen(String),
}

/// 手番
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Sente,
    Gote,
}

impl Side {
    pub fn label(self) -> &'static str {
        match self {
            Side::Sente => "sente",
            Side::Gote => "gote",
        }
    }

    fn flipped(self) -> Side {
        match self {
            Side::Sente => Side::Gote,
            Side::Gote => Side::Sente,
        }
    }
}

/// 起点局面からの指し手列。
///
/// 一度作ったら変更しない。探索側は [`MoveList::prefix`] で先頭から
/// 何手目までを使うかだけを選ぶ。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveList {
    base: PositionBase,
    moves: Vec<String>,
}

impl MoveList {
    pub fn from_startpos(moves: Vec<String>) -> Self {
        Self {
            base: PositionBase::Startpos,
            moves,
        }
    }

    /// `position ...` 形式の行をパースする。先頭の `position` は省略可。
    pub fn parse(line: &str) -> Result<Self, KifError> {
        let invalid = |reason: String| KifError::InvalidPosition {
            line: line.trim().to_string(),
            reason,
        };
        let mut tokens = line.split_whitespace().peekable();
        if tokens.peek().is_some_and(|tok| *tok == "position") {
            tokens.next();
        }
        let base = match tokens.next() {
            Some("startpos") => PositionBase::Startpos,
            Some("sfen") => {
                let mut sfen_tokens = Vec::new();
                while let Some(token) = tokens.next_if(|tok| *tok != "moves") {
                    sfen_tokens.push(token);
                }
                if sfen_tokens.is_empty() {
                    return Err(invalid("missing SFEN payload".to_string()));
                }
                PositionBase::Sfen(sfen_tokens.join(" "))
            }
            other => {
                return Err(invalid(format!("expected 'startpos' or 'sfen', got {other:?}")));
            }
        };
        let moves = match tokens.next() {
            Some("moves") => tokens.map(str::to_string).collect(),
            Some(other) => return Err(invalid(format!("expected 'moves', got '{other}'"))),
            None => Vec::new(),
        };
        Ok(Self { base, moves })
    }

    pub fn base(&self) -> &PositionBase {
        &self.base
    }

    pub fn moves(&self) -> &[String] {
        &self.moves
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// 先頭 `plies` 手だけの指し手列。`plies` が長さを超える場合は全体。
    pub fn prefix(&self, plies: usize) -> MoveList {
        MoveList {
            base: self.base.clone(),
            moves: self.moves[..plies.min(self.moves.len())].to_vec(),
        }
    }

    /// 最終局面の手番（手数の偶奇から求める）
    pub fn side_to_move(&self) -> Side {
        let first = match &self.base {
            PositionBase::Startpos => Side::Sente,
            PositionBase::Sfen(sfen) => match sfen.split_whitespace().nth(1) {
                Some("w") => Side::Gote,
                _ => Side::Sente,
            },
        };
        if self.moves.len() % 2 == 0 { first } else { first.flipped() }
    }

    /// エンジンに送る `position` コマンド
    pub fn to_position_command(&self) -> String {
        let mut buf = String::from("position ");
        match &self.base {
            PositionBase::Startpos => buf.push_str("startpos"),
            PositionBase::Sfen(sfen) => {
                buf.push_str("sfen ");
                buf.push_str(sfen);
            }
        }
        if !self.moves.is_empty() {
            buf.push_str(" moves ");
            buf.push_str(&self.moves.join(" "));
        }
        buf
    }
}

impl fmt::Display for MoveList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_position_command())
    }
}
