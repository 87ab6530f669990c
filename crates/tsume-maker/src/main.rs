use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tsume_kif::{MoveList, encode_record};
use tsume_maker::engine::EngineSession;
use tsume_maker::io::{collect_kif_files, read_lines};
use tsume_maker::{MateFinder, PuzzleStore, TsumeConfig};

#[derive(Parser)]
#[command(
    name = "tsume-maker",
    version,
    about = "棋譜から唯一解の詰将棋を取り出す\n\nKIF → 指し手列 → USIエンジンで後退探索 → JSON"
)]
struct Cli {
    /// 設定ファイル (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// エンジンバイナリのパス（[engine].path を上書き）
    #[arg(long, global = true)]
    engine: Option<PathBuf>,

    /// エンジンに渡す引数（複数指定可）
    #[arg(long = "engine-arg", global = true, allow_hyphen_values = true)]
    engine_args: Vec<String>,

    /// 追加のUSIオプション (Name=Value 形式、複数指定可)
    #[arg(long = "usi-option", global = true)]
    usi_options: Vec<String>,

    /// `go mate` の探索時間 (ms)
    #[arg(long, global = true)]
    mate_time_ms: Option<u64>,

    /// エンジンとの通信を含むデバッグログを出す
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// 標準入力に貼り付けた棋譜をファイルに保存（空行か EOF で終了）
    Capture {
        /// 保存先ディレクトリ
        #[arg(long, default_value = "kifs")]
        dir: PathBuf,
    },
    /// KIF ファイルを指し手列に変換して追記
    Convert {
        /// KIF ファイル、または .kif を含むディレクトリ
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// 出力ファイル（1局1行）
        #[arg(long, default_value = "output_sfens/output.sfen")]
        out: PathBuf,
    },
    /// 棋譜を最終局面から戻しながら詰将棋を探す
    Scan {
        /// KIF ファイル、または指し手列を1行ずつ書いたファイル（- で標準入力）
        input: PathBuf,
        /// 詰将棋の保存先 (JSON)
        #[arg(long, default_value = "tsumeshogi.json")]
        out: PathBuf,
    },
    /// 指し手列ファイルの各局面で詰み探索する
    Batch {
        /// 指し手列を1行ずつ書いたファイル（- で標準入力、.gz 可）
        input: PathBuf,
        /// 詰将棋の保存先 (JSON)
        #[arg(long, default_value = "tsumeshogi.json")]
        out: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.debug { "debug" } else { "info" };
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, log_level),
    );
    builder
        .format(|buf, record| {
            writeln!(buf, "[{}] {}: {}", record.level(), record.target(), record.args())
        })
        .write_style(env_logger::WriteStyle::Never)
        .target(env_logger::Target::Stderr)
        .init();

    if let Err(e) = run(&cli) {
        log::error!("{e:#}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.cmd {
        Cmd::Capture { dir } => {
            let stdin = io::stdin();
            match capture(stdin.lock(), dir)? {
                Some(path) => println!("saved {}", path.display()),
                None => println!("no record was entered; nothing saved"),
            }
            Ok(())
        }
        Cmd::Convert { inputs, out } => convert(inputs, out),
        Cmd::Scan { input, out } => scan(cli, input, out),
        Cmd::Batch { input, out } => batch(cli, input, out),
    }
}

/// 設定ファイル → CLI の順に重ねる
fn load_config(cli: &Cli) -> Result<TsumeConfig> {
    let mut config = match &cli.config {
        Some(path) => TsumeConfig::load(path)?,
        None => TsumeConfig::default(),
    };
    if let Some(engine) = &cli.engine {
        config.engine.path = engine.clone();
    }
    if !cli.engine_args.is_empty() {
        config.engine.args = cli.engine_args.clone();
    }
    config.engine.usi_options.extend(cli.usi_options.iter().cloned());
    if let Some(ms) = cli.mate_time_ms {
        config.scan.mate_time_ms = ms;
    }
    config.validate()?;
    Ok(config)
}

fn capture(input: impl BufRead, dir: &Path) -> Result<Option<PathBuf>> {
    eprintln!("棋譜を貼り付けてください（空行で終了）:");
    let mut lines = Vec::new();
    for line in input.lines() {
        let line = line.context("failed to read stdin")?;
        if line.trim().is_empty() {
            break;
        }
        lines.push(line);
    }
    if lines.is_empty() {
        return Ok(None);
    }

    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("kif_{stamp}.kif"));
    fs::write(&path, lines.join("\n"))
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(Some(path))
}

fn convert(inputs: &[PathBuf], out: &Path) -> Result<()> {
    let files = collect_kif_files(inputs)?;
    if files.is_empty() {
        bail!("no .kif files found");
    }
    if let Some(dir) = out.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }
    let mut writer = OpenOptions::new()
        .create(true)
        .append(true)
        .open(out)
        .with_context(|| format!("failed to open {}", out.display()))?;

    let mut converted = 0usize;
    for file in &files {
        let conversion = encode_record(read_lines(file)?);
        if conversion.moves.is_empty() {
            log::warn!("{}: no moves found, skipped", file.display());
            continue;
        }
        log::info!(
            "{}: {} moves ({} line(s) skipped)",
            file.display(),
            conversion.moves.len(),
            conversion.skipped.len()
        );
        writeln!(writer, "{}", conversion.moves)?;
        converted += 1;
    }
    writer.flush()?;
    println!("converted {converted}/{} record(s) into {}", files.len(), out.display());
    Ok(())
}

fn is_kif(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("kif"))
}

/// `position` 行を読む。読めない行は警告して飛ばす。
fn load_move_lists(input: &Path) -> Result<Vec<MoveList>> {
    let mut lists = Vec::new();
    for (i, line) in read_lines(input)?.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match MoveList::parse(line) {
            Ok(list) => lists.push(list),
            Err(e) => log::warn!("{}:{}: {e}", input.display(), i + 1),
        }
    }
    Ok(lists)
}

fn scan(cli: &Cli, input: &Path, out: &Path) -> Result<()> {
    let config = load_config(cli)?;
    let games = if is_kif(input) {
        let conversion = encode_record(read_lines(input)?);
        if conversion.moves.is_empty() {
            bail!("{}: no moves found", input.display());
        }
        vec![conversion.moves]
    } else {
        load_move_lists(input)?
    };
    if games.is_empty() {
        println!("no game to scan");
        return Ok(());
    }

    let mut store = PuzzleStore::load(out)?;
    let mut session = EngineSession::open(&config.engine, "engine")?;
    let mut found = 0usize;
    {
        let mut finder = MateFinder::new(&mut session, &config.scan);
        for (i, game) in games.iter().enumerate() {
            log::info!("[{}/{}] scanning {} moves", i + 1, games.len(), game.len());
            let report = finder.backward_scan(game);
            match report.puzzle {
                Some(puzzle) => {
                    println!("{}", serde_json::to_string_pretty(&puzzle)?);
                    store.push(puzzle);
                    found += 1;
                }
                None => println!(
                    "no puzzle found ({:?} after {} evaluation(s))",
                    report.end, report.iterations
                ),
            }
        }
    }
    session.close();

    if found > 0 {
        store.save()?;
    }
    println!("{found} puzzle(s) from {} game(s)", games.len());
    Ok(())
}

fn batch(cli: &Cli, input: &Path, out: &Path) -> Result<()> {
    let config = load_config(cli)?;
    let positions = load_move_lists(input)?;
    if positions.is_empty() {
        println!("no position to search");
        return Ok(());
    }

    let mut store = PuzzleStore::load(out)?;
    let mut session = EngineSession::open(&config.engine, "engine")?;
    let report = MateFinder::new(&mut session, &config.scan).run_batch(&positions);
    session.close();

    let accepted = report.accepted.len();
    store.extend(report.accepted);
    store.save()?;
    println!(
        "accepted {accepted}, duals {}, no mate {} (of {})",
        report.duals,
        report.no_mate,
        positions.len()
    );
    Ok(())
}
