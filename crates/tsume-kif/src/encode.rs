//! 指し手行 → USI 指し手
//!
//! 正規化済みの1行（`"3 ２二角成(88)"` など）を [`Move`] に分解し、
//! USI のトークン（`8h2b+`、`B*5e`）へ直列化する。位置の特定は
//! 手数直後の空白からの固定オフセットで行う。

use std::fmt;

use crate::error::KifError;
use crate::move_list::MoveList;
use crate::normalize::normalize;

/// 駒打ちを表す文字
const DROP_MARKER: char = '打';
/// 成りを完了した指し手（`角成(88)`）に現れる並び
const PROMOTION_MARKER: &str = "成(";
/// 不成（`銀不成(34)`）。`成(` を含むが成りではない
const DECLINED_PROMOTION: &str = "不成";

/// 駒の種類（成る前の8種）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PieceKind {
    Pawn,
    Lance,
    Knight,
    Silver,
    Gold,
    Bishop,
    Rook,
    King,
}

impl PieceKind {
    /// 駒の漢字1文字から変換する。玉・王はどちらも King。
    pub const fn from_kanji(c: char) -> Option<PieceKind> {
        Some(match c {
            '歩' => PieceKind::Pawn,
            '香' => PieceKind::Lance,
            '桂' => PieceKind::Knight,
            '銀' => PieceKind::Silver,
            '金' => PieceKind::Gold,
            '角' => PieceKind::Bishop,
            '飛' => PieceKind::Rook,
            '玉' | '王' => PieceKind::King,
            _ => return None,
        })
    }

    /// USI の駒文字（先手の大文字）
    pub const fn to_usi_char(self) -> char {
        match self {
            PieceKind::Pawn => 'P',
            PieceKind::Lance => 'L',
            PieceKind::Knight => 'N',
            PieceKind::Silver => 'S',
            PieceKind::Gold => 'G',
            PieceKind::Bishop => 'B',
            PieceKind::Rook => 'R',
            PieceKind::King => 'K',
        }
    }

    /// 持ち駒として打てるか
    pub const fn is_droppable(self) -> bool {
        !matches!(self, PieceKind::King)
    }
}

/// 盤上の升（筋 1-9、段 a-i）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Square {
    file: u8,
    rank: u8,
}

impl Square {
    /// 筋（1-9）と USI の段文字（'a'-'i'）から作る。
    pub fn new(file: u8, rank: char) -> Option<Square> {
        if !(1..=9).contains(&file) || !('a'..='i').contains(&rank) {
            return None;
        }
        Some(Square {
            file,
            rank: rank as u8 - b'a',
        })
    }

    /// 移動先の表記（全角数字の筋 + 漢数字の段）から作る。
    fn from_kif_dest(file: char, rank: char) -> Option<Square> {
        let file = "１２３４５６７８９".chars().position(|c| c == file)?;
        let rank = "一二三四五六七八九".chars().position(|c| c == rank)?;
        Some(Square {
            file: file as u8 + 1,
            rank: rank as u8,
        })
    }

    /// 移動元の表記（`(77)` の中身、半角数字2桁）から作る。
    fn from_kif_origin(file: char, rank: char) -> Option<Square> {
        let file = file.to_digit(10).filter(|d| (1..=9).contains(d))?;
        let rank = rank.to_digit(10).filter(|d| (1..=9).contains(d))?;
        Some(Square {
            file: file as u8,
            rank: rank as u8 - 1,
        })
    }

    /// USI 形式の段文字
    pub fn rank_char(self) -> char {
        (b'a' + self.rank) as char
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.file, self.rank_char())
    }
}

/// 移動元。盤上の升か、持ち駒からの打ち。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Board(Square),
    Drop(PieceKind),
}

/// KIF の1手
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Move {
    /// 表記上の駒（`歩`、`成銀` など。成り・不成・打の接尾辞は含まない）
    pub piece: String,
    pub dest: Square,
    pub origin: Origin,
    pub promoted: bool,
}

impl Move {
    /// USI のトークンに直列化する。
    pub fn to_usi(&self) -> String {
        match self.origin {
            Origin::Drop(kind) => format!("{}*{}", kind.to_usi_char(), self.dest),
            Origin::Board(from) => {
                let promotion = if self.promoted { "+" } else { "" };
                format!("{}{}{}", from, self.dest, promotion)
            }
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_usi())
    }
}

/// 正規化済みの指し手行を [`Move`] に分解する。
///
/// 移動先は手数直後の空白の次の2文字。移動元は空白から4文字目が `(` なら
/// その次の2文字、そうでなければ1文字ずらした2文字（`角成(88)` のように
/// 駒名の後に1文字入る表記）。
pub fn encode(line: &str) -> Result<Move, KifError> {
    let chars: Vec<char> = line.trim().chars().collect();
    let space = chars
        .iter()
        .position(|c| *c == ' ')
        .ok_or_else(|| KifError::malformed(line, "no separator after move number"))?;
    let at = |offset: usize| {
        chars
            .get(space + offset)
            .copied()
            .ok_or_else(|| KifError::malformed(line, "line is too short"))
    };

    let dest = Square::from_kif_dest(at(1)?, at(2)?)
        .ok_or_else(|| KifError::malformed(line, "unknown destination square"))?;

    if chars.contains(&DROP_MARKER) {
        let piece = at(3)?;
        let kind = PieceKind::from_kanji(piece)
            .filter(|kind| kind.is_droppable())
            .ok_or_else(|| KifError::malformed(line, "piece cannot be dropped"))?;
        return Ok(Move {
            piece: piece.to_string(),
            dest,
            origin: Origin::Drop(kind),
            promoted: false,
        });
    }

    let (file, rank) = if at(4)? == '(' { (at(5)?, at(6)?) } else { (at(6)?, at(7)?) };
    let from = Square::from_kif_origin(file, rank)
        .ok_or_else(|| KifError::malformed(line, "origin square not found at expected offset"))?;

    let text: String = chars[space + 1..].iter().collect();
    let promoted = text.contains(PROMOTION_MARKER) && !text.contains(DECLINED_PROMOTION);

    Ok(Move {
        piece: piece_label(&chars[space + 3..]),
        dest,
        origin: Origin::Board(from),
        promoted,
    })
}

/// 移動先の後ろから `(` までの駒表記。成り・不成の接尾辞を除く。
fn piece_label(rest: &[char]) -> String {
    let label: String = rest.iter().take_while(|c| **c != '(' && !c.is_whitespace()).collect();
    if let Some(base) = label.strip_suffix(DECLINED_PROMOTION) {
        return base.to_string();
    }
    match label.strip_suffix('成') {
        Some(base) if !base.is_empty() => base.to_string(),
        _ => label,
    }
}

/// 行単位で捨てた指し手
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    pub line: String,
    pub error: KifError,
}

/// 棋譜1本分の変換結果
#[derive(Debug, Clone)]
pub struct Conversion {
    pub moves: MoveList,
    pub skipped: Vec<SkippedLine>,
}

/// 棋譜テキストを正規化し、全ての指し手を USI 指し手列にする。
///
/// 分解できない行は警告を出して飛ばし、残りの変換を続ける。
pub fn encode_record<I, S>(lines: I) -> Conversion
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut tokens = Vec::new();
    let mut skipped = Vec::new();
    for line in normalize(lines) {
        match encode(&line) {
            Ok(mv) => tokens.push(mv.to_usi()),
            Err(error) => {
                log::warn!("skipping move: {error}");
                skipped.push(SkippedLine { line, error });
            }
        }
    }
    Conversion {
        moves: MoveList::from_startpos(tokens),
        skipped,
    }
}
