use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const RECORD: &str = "\
手合割：平手
   1 ７六歩(77)        ( 0:01/00:00:01)
   2 ３四歩(33)        ( 0:01/00:00:02)
*ここで長考
   3 ２二角成(88)      ( 0:03/00:00:04)
   4 ２三銀不成(34)    ( 0:01/00:00:03)
   5 ５五角打          ( 0:05/00:00:09)
";

fn tsume_maker() -> Command {
    Command::cargo_bin("tsume-maker").expect("binary exists")
}

#[test]
fn convert_appends_one_line_per_record() {
    let dir = TempDir::new().unwrap();
    let kifs = dir.path().join("kifs");
    fs::create_dir_all(&kifs).unwrap();
    fs::write(kifs.join("a.kif"), RECORD).unwrap();
    fs::write(kifs.join("b.kif"), "*コメントのみ\n").unwrap();
    let out = dir.path().join("out").join("output.sfen");

    for _ in 0..2 {
        tsume_maker()
            .args(["convert", kifs.to_str().unwrap(), "--out", out.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("converted 1/2"));
    }

    let text = fs::read_to_string(&out).unwrap();
    let expected = "position startpos moves 7g7f 3c3d 8h2b+ B*5e\n";
    assert_eq!(text, expected.repeat(2));
}

#[test]
fn capture_saves_pasted_lines_until_blank() {
    let dir = TempDir::new().unwrap();
    let kifs = dir.path().join("kifs");

    tsume_maker()
        .args(["capture", "--dir", kifs.to_str().unwrap()])
        .write_stdin("   1 ７六歩(77)\n   2 ３四歩(33)\n\nignored\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("saved"));

    let files: Vec<_> = fs::read_dir(&kifs).unwrap().map(|e| e.unwrap().path()).collect();
    assert_eq!(files.len(), 1);
    let name = files[0].file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("kif_") && name.ends_with(".kif"));
    assert_eq!(fs::read_to_string(&files[0]).unwrap(), "   1 ７六歩(77)\n   2 ３四歩(33)");
}

#[test]
fn capture_with_empty_input_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let kifs = dir.path().join("kifs");

    tsume_maker()
        .args(["capture", "--dir", kifs.to_str().unwrap()])
        .write_stdin("\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing saved"));
    assert!(!kifs.exists());
}

#[test]
fn scan_without_engine_path_fails() {
    let dir = TempDir::new().unwrap();
    let kif = dir.path().join("game.kif");
    fs::write(&kif, RECORD).unwrap();

    tsume_maker()
        .args(["scan", kif.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("engine path is not configured"));
}

#[test]
fn unknown_config_key_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("tsume.toml");
    fs::write(&config, "[scan]\nmate_seconds = 3\n").unwrap();
    let input = dir.path().join("positions.sfen");
    fs::write(&input, "position startpos moves 7g7f\n").unwrap();

    tsume_maker()
        .args(["batch", input.to_str().unwrap(), "--config", config.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse config"));
}

#[cfg(unix)]
#[test]
fn batch_keeps_unique_mates_and_skips_invalid_lines() {
    let script = r#"
while read -r line; do
  case "$line" in
    usi) echo "option name MultiPV type spin default 1 min 1 max 10"; echo "usiok" ;;
    isready) echo "readyok" ;;
    "position startpos moves 7g7f 3c3d")
      dual=1 ;;
    position*) dual=0 ;;
    "go mate"*)
      echo "info depth 3 multipv 1 score mate 3 pv 2c2b+ 3a2b G*3c"
      if [ "$dual" = 1 ]; then
        echo "info depth 3 multipv 2 score mate 3 pv G*3c 3a2b 2c2b+"
      fi
      echo "checkmate 2c2b+ 3a2b G*3c" ;;
    quit) exit 0 ;;
  esac
done
"#;
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("positions.sfen");
    fs::write(
        &input,
        "position startpos moves 7g7f\nnot a position\nposition startpos moves 7g7f 3c3d\n",
    )
    .unwrap();
    let out = dir.path().join("tsumeshogi.json");

    let script_arg = format!("--engine-arg={script}");

    tsume_maker()
        .args(["batch", input.to_str().unwrap(), "--out", out.to_str().unwrap()])
        .args(["--engine", "sh", "--engine-arg=-c", script_arg.as_str()])
        .args(["--mate-time-ms", "500"])
        .assert()
        .success()
        .stdout(predicate::str::contains("accepted 1, duals 1, no mate 0 (of 2)"));

    let saved: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(
        saved,
        serde_json::json!([{
            "board": "position startpos moves 7g7f",
            "steps": "2c2b+ 3a2b G*3c",
            "mate_length": 3
        }])
    );
}
