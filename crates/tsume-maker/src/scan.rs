//! 棋譜を後ろから戻しながら詰将棋を探す
//!
//! 最終局面から始め、浅い探索の評価値で「1手戻す」「詰み探索する」
//! 「やめる」を決める。唯一解の詰みが見つかるたびに採用して2手戻し、
//! より手数の長い出題を狙う。

use tsume_kif::MoveList;

use crate::config::{EvalBand, ScanConfig};
use crate::engine::info::primary_score;
use crate::engine::{MateSearchResult, MateVerdict, Score, UsiLink};
use crate::record::PuzzleRecord;

/// 後退探索が終わった理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanEnd {
    /// 初期局面まで戻り切った
    Exhausted,
    /// 評価値がどの区分にも入らなかった
    Ambiguous,
    /// 詰みが見つからなかった
    NoMate,
    /// 同じ手数の別解があった
    Dual,
    /// 浅い探索に評価値が返らなかった
    Unresponsive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    /// 最後に採用した出題。見つからなければ `None`。
    pub puzzle: Option<PuzzleRecord>,
    pub end: ScanEnd,
    /// 浅い探索を行った回数
    pub iterations: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub accepted: Vec<PuzzleRecord>,
    pub duals: usize,
    pub no_mate: usize,
}

/// 1本のエンジン接続を使って探索を進める。
pub struct MateFinder<'a, L: UsiLink> {
    link: &'a mut L,
    cfg: &'a ScanConfig,
}

impl<'a, L: UsiLink> MateFinder<'a, L> {
    pub fn new(link: &'a mut L, cfg: &'a ScanConfig) -> Self {
        Self { link, cfg }
    }

    fn set_position(&mut self, pos: &MoveList) {
        let stale = self.link.discard_pending();
        if stale > 0 {
            log::debug!("discarded {stale} stale line(s)");
        }
        self.link.send(&pos.to_position_command());
    }

    /// `go depth` の浅い探索。評価値は手番側から見た値。
    ///
    /// 評価値なしの `bestmove resign` は手番側が詰んでいるものとして扱う。
    pub fn evaluate(&mut self, pos: &MoveList) -> Option<Score> {
        self.set_position(pos);
        self.link.send(&format!("go depth {}", self.cfg.eval_depth));
        let drained = self.link.drain_until(
            &mut |line| line.starts_with("bestmove"),
            self.cfg.eval_timeout(),
            true,
        );
        let score = primary_score(&drained.lines).or_else(|| {
            drained
                .lines
                .iter()
                .any(|line| line.trim() == "bestmove resign")
                .then_some(Score::Mate(0))
        });
        log::debug!("eval plies={} score={score:?} end={:?}", pos.len(), drained.end);
        score
    }

    /// `go mate` で上位2本の詰み手順を求める。
    pub fn mate_search(&mut self, pos: &MoveList) -> MateSearchResult {
        self.set_position(pos);
        self.link.send(&format!("go mate {}", self.cfg.mate_time_ms));
        let drained = self.link.drain_until(
            &mut |line| line.starts_with("checkmate") || line.starts_with("bestmove"),
            self.cfg.mate_deadline(),
            true,
        );
        let result = MateSearchResult::from_lines(&drained.lines);
        log::debug!(
            "mate plies={} best={:?} second={:?} end={:?}",
            pos.len(),
            result.best_mate,
            result.second_mate,
            drained.end
        );
        result
    }

    /// 全体の手数から始めて後退探索する。浅い探索は高々手数回。
    pub fn backward_scan(&mut self, record: &MoveList) -> ScanReport {
        let mut plies = record.len();
        let mut puzzle = None;
        let mut iterations = 0;

        let end = loop {
            if plies == 0 {
                break ScanEnd::Exhausted;
            }
            iterations += 1;
            let pos = record.prefix(plies);
            let Some(score) = self.evaluate(&pos) else {
                log::warn!("no evaluation at ply {plies}; stopping");
                break ScanEnd::Unresponsive;
            };

            match self.cfg.thresholds.classify(score.as_cp()) {
                EvalBand::Neutral | EvalBand::Losing => plies -= 1,
                EvalBand::Ambiguous => break ScanEnd::Ambiguous,
                EvalBand::Mating => match self.mate_search(&pos).verdict() {
                    MateVerdict::Unique { mate_length, steps } => {
                        log::info!(
                            "mate in {mate_length} at ply {plies} ({} to move)",
                            pos.side_to_move().label()
                        );
                        puzzle = Some(PuzzleRecord::new(&pos, &steps, mate_length));
                        plies = plies.saturating_sub(2);
                    }
                    MateVerdict::Dual { mate_length } => {
                        log::info!("dual mate in {mate_length} at ply {plies}; stopping");
                        break ScanEnd::Dual;
                    }
                    MateVerdict::NoMate => break ScanEnd::NoMate,
                },
            }
        };

        ScanReport {
            puzzle,
            end,
            iterations,
        }
    }

    /// 各局面で1回ずつ詰み探索し、唯一解のものだけを入力順に集める。
    pub fn run_batch(&mut self, positions: &[MoveList]) -> BatchReport {
        let mut report = BatchReport::default();
        for (i, pos) in positions.iter().enumerate() {
            match self.mate_search(pos).verdict() {
                MateVerdict::Unique { mate_length, steps } => {
                    log::info!("[{}/{}] mate in {mate_length}", i + 1, positions.len());
                    report.accepted.push(PuzzleRecord::new(pos, &steps, mate_length));
                }
                MateVerdict::Dual { mate_length } => {
                    log::info!("[{}/{}] dual mate in {mate_length}, skipped", i + 1, positions.len());
                    report.duals += 1;
                }
                MateVerdict::NoMate => {
                    log::info!("[{}/{}] no mate", i + 1, positions.len());
                    report.no_mate += 1;
                }
            }
        }
        report
    }
}
