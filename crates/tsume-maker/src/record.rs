//! 採用した詰将棋の保存
//!
//! 保存先は JSON 配列のファイル1つ。既存の内容を読み込み、末尾に追加して
//! 書き戻す。

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tsume_kif::MoveList;

/// 詰め手順が1通りに決まった局面
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleRecord {
    /// 出題局面の `position` コマンド
    pub board: String,
    /// 最善の詰め手順（空白区切り）
    pub steps: String,
    pub mate_length: u32,
}

impl PuzzleRecord {
    pub fn new(position: &MoveList, steps: &[String], mate_length: u32) -> Self {
        Self {
            board: position.to_position_command(),
            steps: steps.join(" "),
            mate_length,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Stored {
    Many(Vec<PuzzleRecord>),
    One(PuzzleRecord),
}

/// JSON ファイルに保存する追記型の集合
#[derive(Debug)]
pub struct PuzzleStore {
    path: PathBuf,
    records: Vec<PuzzleRecord>,
}

impl PuzzleStore {
    /// ファイルが無ければ空。単独のオブジェクトは1要素の配列として扱う。
    /// 壊れた内容は警告して捨てる（次の保存で上書きされる）。
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self {
                path,
                records: Vec::new(),
            });
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let records = if text.trim().is_empty() {
            Vec::new()
        } else {
            match serde_json::from_str::<Stored>(&text) {
                Ok(Stored::Many(records)) => records,
                Ok(Stored::One(record)) => vec![record],
                Err(e) => {
                    log::warn!("{} is not a puzzle list ({e}); starting empty", path.display());
                    Vec::new()
                }
            }
        };
        Ok(Self { path, records })
    }

    pub fn records(&self) -> &[PuzzleRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn push(&mut self, record: PuzzleRecord) {
        self.records.push(record);
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = PuzzleRecord>) {
        self.records.extend(records);
    }

    /// 一時ファイルに書いてから置き換える。
    pub fn save(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)
            .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
        serde_json::to_writer_pretty(&mut tmp, &self.records)?;
        tmp.write_all(b"\n")?;
        tmp.flush()?;
        tmp.persist(&self.path)
            .map_err(|e| e.error)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        log::info!("saved {} puzzle(s) to {}", self.records.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(mate_length: u32) -> PuzzleRecord {
        PuzzleRecord {
            board: "position startpos moves 7g7f 3c3d".to_string(),
            steps: "2b3c+ 4a3b G*2b".to_string(),
            mate_length,
        }
    }

    #[test]
    fn record_is_built_from_prefix_and_line() {
        let list = MoveList::parse("position startpos moves 7g7f 3c3d 8h2b+").unwrap();
        let steps = vec!["3a2b".to_string(), "B*3b".to_string()];
        let record = PuzzleRecord::new(&list.prefix(2), &steps, 3);
        assert_eq!(record, PuzzleRecord {
            board: "position startpos moves 7g7f 3c3d".to_string(),
            steps: "3a2b B*3b".to_string(),
            mate_length: 3,
        });
    }

    #[test]
    fn missing_file_starts_empty_and_save_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("tsume.json");

        let mut store = PuzzleStore::load(&path).unwrap();
        assert!(store.is_empty());
        store.push(sample(3));
        store.save().unwrap();

        let mut store = PuzzleStore::load(&path).unwrap();
        store.push(sample(5));
        store.save().unwrap();

        let reloaded = PuzzleStore::load(&path).unwrap();
        assert_eq!(reloaded.records(), [sample(3), sample(5)]);
    }

    #[test]
    fn single_object_becomes_a_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tsume.json");
        fs::write(&path, serde_json::to_string(&sample(7)).unwrap()).unwrap();

        let store = PuzzleStore::load(&path).unwrap();
        assert_eq!(store.records(), [sample(7)]);
    }

    #[test]
    fn broken_file_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tsume.json");
        fs::write(&path, "{ not json").unwrap();

        let mut store = PuzzleStore::load(&path).unwrap();
        assert!(store.is_empty());
        store.push(sample(1));
        store.save().unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value.as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn output_keeps_non_ascii_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tsume.json");
        let mut store = PuzzleStore::load(&path).unwrap();
        store.push(PuzzleRecord {
            board: "position startpos".to_string(),
            steps: "５五角打".to_string(),
            mate_length: 1,
        });
        store.save().unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("５五角打"));
    }
}
