use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// `-` は標準入力、`.gz` は展開して読む。
pub fn open_reader<P: AsRef<Path>>(path: P) -> io::Result<Box<dyn BufRead>> {
    let p = path.as_ref();
    if p.to_string_lossy() == "-" {
        let stdin = io::stdin();
        return Ok(Box::new(BufReader::with_capacity(128 * 1024, stdin.lock())));
    }
    let f = File::open(p)?;
    let ext = p.extension().and_then(|e| e.to_str()).unwrap_or_default().to_ascii_lowercase();
    if ext == "gz" {
        let dec = flate2::read::GzDecoder::new(f);
        return Ok(Box::new(BufReader::with_capacity(128 * 1024, dec)));
    }
    Ok(Box::new(BufReader::with_capacity(128 * 1024, f)))
}

/// 全行を読む。行末の改行は含まない。
pub fn read_lines<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let p = path.as_ref();
    let reader = open_reader(p).with_context(|| format!("failed to open {}", p.display()))?;
    reader
        .lines()
        .collect::<io::Result<Vec<_>>>()
        .with_context(|| format!("failed to read {}", p.display()))
}

/// 引数のファイル・ディレクトリから `.kif` を集める（ディレクトリは1階層のみ）。
///
/// ディレクトリ内はファイル名順に並べる。ファイルの指定は拡張子を問わない。
pub fn collect_kif_files(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found = Vec::new();
            for entry in fs::read_dir(input)
                .with_context(|| format!("failed to list {}", input.display()))?
            {
                let path = entry?.path();
                let is_kif = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("kif"));
                if is_kif && path.is_file() {
                    found.push(path);
                }
            }
            found.sort();
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}
