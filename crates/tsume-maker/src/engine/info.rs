//! USI の info 行の解析

use serde::Serialize;

/// 詰みの評価値を cp に換算するときの基準
pub const MATE_CP: i32 = 32_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Score {
    Cp(i32),
    Mate(i32),
}

impl Score {
    /// cp に揃えた値。詰みは手数が短いほど絶対値が大きい。
    ///
    /// `mate 0`（`mate -0` も同じ値になる）は手番側がすでに詰んでいる局面。
    pub fn as_cp(self) -> i32 {
        match self {
            Score::Cp(v) => v,
            Score::Mate(n) if n > 0 => MATE_CP - n,
            Score::Mate(n) => -MATE_CP - n,
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct InfoLine {
    pub multipv: Option<u32>,
    pub score: Option<Score>,
    pub pv: Vec<String>,
}

pub fn parse_info_line(line: &str) -> Option<InfoLine> {
    if !line.starts_with("info ") {
        return None;
    }
    let mut info = InfoLine::default();
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let mut i = 1;
    while i < tokens.len() {
        match tokens[i] {
            "multipv" => {
                info.multipv = tokens.get(i + 1).and_then(|t| t.parse().ok());
                i += 2;
            }
            "score" => {
                if i + 2 >= tokens.len() {
                    break;
                }
                info.score = match (tokens[i + 1], tokens[i + 2].parse::<i32>()) {
                    ("cp", Ok(v)) => Some(Score::Cp(v)),
                    ("mate", Ok(v)) => Some(Score::Mate(v)),
                    _ => None,
                };
                i += 3;
            }
            "pv" => {
                info.pv.extend(tokens[i + 1..].iter().map(|s| s.to_string()));
                break;
            }
            // 以降は自由文字列
            "string" => break,
            _ => i += 1,
        }
    }
    Some(info)
}

/// 第1候補（multipv 1、または multipv なし）の最後の評価値
pub fn primary_score<S: AsRef<str>>(lines: &[S]) -> Option<Score> {
    lines
        .iter()
        .filter_map(|line| parse_info_line(line.as_ref()))
        .filter(|info| info.multipv.is_none_or(|n| n == 1))
        .filter_map(|info| info.score)
        .last()
}

/// 2本の読み筋を求めた詰み探索の結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MateSearchResult {
    /// multipv 1 の詰み手数
    pub best_mate: Option<i32>,
    /// multipv 2 の詰み手数
    pub second_mate: Option<i32>,
    /// multipv 1 の読み筋
    pub principal_line: Vec<String>,
}

/// 詰み探索の結果から見た局面の扱い
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MateVerdict {
    /// 最短の詰みが1通りだけ
    Unique { mate_length: u32, steps: Vec<String> },
    /// 第2候補も同じ手数で詰む（余詰め）
    Dual { mate_length: u32 },
    NoMate,
}

impl MateSearchResult {
    /// `multipv` と `score mate` を両方含む info 行だけを拾う。
    /// 同じ multipv が複数回出たら最後の値を使う。
    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> Self {
        let mut result = MateSearchResult::default();
        for info in lines.iter().filter_map(|line| parse_info_line(line.as_ref())) {
            let (Some(index), Some(Score::Mate(mate))) = (info.multipv, info.score) else {
                continue;
            };
            match index {
                1 => {
                    result.best_mate = Some(mate);
                    if !info.pv.is_empty() {
                        result.principal_line = info.pv;
                    }
                }
                2 => result.second_mate = Some(mate),
                _ => {}
            }
        }
        result
    }

    /// 余詰めの判定は手数の比較だけで行う（手順の中身は見ない）。
    pub fn verdict(&self) -> MateVerdict {
        match self.best_mate {
            Some(mate) if mate > 0 => {
                if self.second_mate == Some(mate) {
                    MateVerdict::Dual {
                        mate_length: mate as u32,
                    }
                } else {
                    MateVerdict::Unique {
                        mate_length: mate as u32,
                        steps: self.principal_line.clone(),
                    }
                }
            }
            _ => MateVerdict::NoMate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_line_fields_are_parsed() {
        let info = parse_info_line(
            "info depth 12 seldepth 15 multipv 2 score mate 7 nodes 1234 pv 2b3c+ 4a3b G*2b",
        )
        .unwrap();
        assert_eq!(info.multipv, Some(2));
        assert_eq!(info.score, Some(Score::Mate(7)));
        assert_eq!(info.pv, vec!["2b3c+", "4a3b", "G*2b"]);

        assert!(parse_info_line("bestmove 7g7f").is_none());
        let text = parse_info_line("info string score mate 3 pv 1a1b").unwrap();
        assert_eq!(text.score, None);
    }

    #[test]
    fn bound_suffix_after_score_is_skipped() {
        let info = parse_info_line("info depth 3 score cp -420 lowerbound pv 7g7f").unwrap();
        assert_eq!(info.score, Some(Score::Cp(-420)));
        assert_eq!(info.pv, vec!["7g7f"]);
    }

    #[test]
    fn primary_score_ignores_secondary_lines() {
        let lines = [
            "info depth 1 multipv 1 score cp 120 pv 7g7f",
            "info depth 1 multipv 2 score cp 90 pv 2g2f",
            "info depth 2 score cp 2400 pv 7g7f",
            "info depth 2 multipv 2 score cp -50 pv 2g2f",
            "bestmove 7g7f",
        ];
        assert_eq!(primary_score(&lines), Some(Score::Cp(2400)));
        assert_eq!(primary_score::<&str>(&[]), None);
    }

    #[test]
    fn mate_scores_convert_to_large_cp() {
        assert_eq!(Score::Mate(5).as_cp(), MATE_CP - 5);
        assert_eq!(Score::Mate(-4).as_cp(), -MATE_CP + 4);
        assert!(Score::Mate(1).as_cp() > Score::Mate(9).as_cp());
        assert_eq!(Score::Mate(0).as_cp(), -MATE_CP);

        let mated = parse_info_line("info depth 0 score mate -0").unwrap();
        assert_eq!(mated.score.map(Score::as_cp), Some(-MATE_CP));
    }

    #[test]
    fn unique_mate_keeps_primary_line() {
        let lines = [
            "info depth 5 multipv 1 score mate 5 pv 2b3c+ 4a3b G*2b 3a2b 3c2b",
            "info depth 5 multipv 2 score mate 7 pv 2b1c+ 4a3b",
            "checkmate 2b3c+ 4a3b G*2b 3a2b 3c2b",
        ];
        let result = MateSearchResult::from_lines(&lines);
        assert_eq!(result.best_mate, Some(5));
        assert_eq!(result.second_mate, Some(7));
        assert_eq!(
            result.verdict(),
            MateVerdict::Unique {
                mate_length: 5,
                steps: vec!["2b3c+", "4a3b", "G*2b", "3a2b", "3c2b"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
            }
        );
    }

    #[test]
    fn equal_distance_is_a_dual() {
        let lines = [
            "info multipv 1 score mate 3 pv 1c1b+ 2a1b G*2b",
            "info multipv 2 score mate 3 pv G*2b 1a2b 1c1b+",
        ];
        assert_eq!(
            MateSearchResult::from_lines(&lines).verdict(),
            MateVerdict::Dual { mate_length: 3 }
        );
    }

    #[test]
    fn missing_or_losing_mate_is_no_mate() {
        let none: [&str; 0] = [];
        assert_eq!(MateSearchResult::from_lines(&none).verdict(), MateVerdict::NoMate);

        let cp_only = ["info depth 10 multipv 1 score cp 3000 pv 7g7f"];
        assert_eq!(MateSearchResult::from_lines(&cp_only).verdict(), MateVerdict::NoMate);

        let mated = ["info multipv 1 score mate -2 pv 5i4h"];
        assert_eq!(MateSearchResult::from_lines(&mated).verdict(), MateVerdict::NoMate);

        // multipv の無い行は対象外
        let untagged = ["info depth 9 score mate 3 pv 1c1b+"];
        assert_eq!(MateSearchResult::from_lines(&untagged).best_mate, None);
    }
}
