//! 棋譜テキストの正規化
//!
//! 貼り付けられた KIF から指し手行だけを取り出す。文法に合わない行は
//! エラーにせず黙って捨てる。

use std::sync::LazyLock;

use regex::Regex;

/// 消費時間 `(mm:ss/mm:ss)`。実際の KIF にある `( 0:01/00:00:01)` も受け付ける。
static TIME_ANNOTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(\s*\d+:\d+/\d+:\d+(?::\d+)?\)").expect("time annotation pattern is valid")
});

/// 手数 + 空白 + 移動先（全角筋・漢数字段） + 駒（成駒を含む）
static MOVE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d+)\s+([１-９][一二三四五六七八九](?:成[香桂銀]|[歩香桂銀金角飛玉王と馬龍竜])+.*)$",
    )
    .expect("move line pattern is valid")
});

/// コメント行の先頭記号
const COMMENT_MARKERS: [char; 2] = ['*', '#'];

/// 指し手行だけを残した棋譜を返す。
///
/// 返る各行は `"<手数> <指し手>"` の形（区切りは半角空白1つ）で、
/// 消費時間と行末の空白は取り除かれている。
pub fn normalize<I, S>(lines: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines.into_iter().filter_map(|line| normalize_line(line.as_ref())).collect()
}

fn normalize_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(COMMENT_MARKERS) {
        return None;
    }
    let stripped = TIME_ANNOTATION.replace_all(line, "");
    let caps = MOVE_LINE.captures(stripped.trim_end())?;
    Some(format!("{} {}", &caps[1], caps[2].trim_end()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_comment_lines_are_skipped() {
        let out = normalize(["", "   ", "*対局者のコメント", "# ---- Kifu for Windows ----"]);
        assert!(out.is_empty());
    }

    #[test]
    fn time_annotation_is_removed_anywhere() {
        let with = normalize(["1 ７六歩(77)(00:01/00:01)"]);
        let inside = normalize(["1 ７六歩(00:01/00:01)(77)"]);
        let without = normalize(["1 ７六歩(77)"]);
        assert_eq!(with, without);
        assert_eq!(inside, without);
        assert_eq!(without, vec!["1 ７六歩(77)".to_string()]);
    }

    #[test]
    fn real_kif_layout_is_normalized() {
        let out = normalize([
            "手数----指手---------消費時間--",
            "   1 ７六歩(77)        ( 0:01/00:00:01)",
            "   2 ３四歩(33)        ( 0:02/00:00:02)",
            "   3 ２二角成(88)      ( 0:03/00:00:04)",
            "   4 同　銀(31)        ( 0:01/00:00:03)",
            "   5 ５五角打          ( 0:05/00:00:09)",
            "  30 投了",
            "まで29手で先手の勝ち",
        ]);
        assert_eq!(out, vec!["1 ７六歩(77)", "2 ３四歩(33)", "3 ２二角成(88)", "5 ５五角打"]);
    }

    #[test]
    fn promoted_pieces_match_the_grammar() {
        let out = normalize(["41 ４三成銀(34)", "42 ５一龍(59)", "43 ２三と(24)"]);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn lines_outside_the_grammar_are_dropped() {
        let out = normalize(["開始日時：2024/01/01", "12 7六歩(77)", "x ７六歩(77)", "13 ７六"]);
        assert!(out.is_empty());
    }
}
