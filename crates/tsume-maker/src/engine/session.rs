use std::collections::HashSet;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};

use super::{DrainEnd, Drained, UsiLink};
use crate::config::EngineConfig;

/// キューを待つ1回あたりの上限。期限の確認はこの間隔で行う。
const POLL_INTERVAL: Duration = Duration::from_millis(100);
const QUIT_POLL_INTERVAL: Duration = Duration::from_millis(10);
const READER_JOIN_TIMEOUT: Duration = Duration::from_millis(500);

/// エンジンを使えない状態。いずれも実行全体を中断する。
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("failed to spawn engine at {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{label}: engine exited while waiting for `{expected}`")]
    Exited { label: String, expected: &'static str },

    #[error("{label}: no `{expected}` within {timeout_ms} ms")]
    Timeout {
        label: String,
        expected: &'static str,
        timeout_ms: u128,
    },
}

/// 1本のエンジンプロセスとその出力キュー。
///
/// 標準出力は専用スレッドが読み続けて無制限キューへ積む。プロセスと
/// reader スレッドは [`EngineSession::close`] か `Drop` でまとめて片付ける。
pub struct EngineSession {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    rx: Receiver<String>,
    readers: Vec<JoinHandle<()>>,
    running: Arc<AtomicBool>,
    opt_names: HashSet<String>,
    stop_grace: Duration,
    quit_timeout: Duration,
    closed: bool,
    label: String,
}

impl EngineSession {
    /// エンジンを起動し、`usi` → `setoption` → `isready` → `usinewgame` まで済ませる。
    pub fn open(cfg: &EngineConfig, label: impl Into<String>) -> Result<Self, SessionError> {
        let label = label.into();
        let spawn_err = |source: io::Error| SessionError::Spawn {
            path: cfg.path.clone(),
            source,
        };

        let workdir = cfg.effective_workdir();
        let mut cmd = Command::new(resolve_program(&cfg.path, workdir.is_some()));
        cmd.args(&cfg.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &workdir {
            cmd.current_dir(dir);
        }
        let mut child = cmd.spawn().map_err(spawn_err)?;
        log::info!("{label}: spawned {} (pid {})", cfg.path.display(), child.id());

        let stdin = child.stdin.take().ok_or_else(|| spawn_err(io::Error::other("no stdin")))?;
        let stdout = child.stdout.take().ok_or_else(|| spawn_err(io::Error::other("no stdout")))?;
        let stderr = child.stderr.take().ok_or_else(|| spawn_err(io::Error::other("no stderr")))?;

        let running = Arc::new(AtomicBool::new(true));
        let (tx, rx) = unbounded::<String>();
        let mut session = Self {
            child,
            stdin: BufWriter::new(stdin),
            rx,
            readers: Vec::with_capacity(2),
            running: Arc::clone(&running),
            opt_names: HashSet::new(),
            stop_grace: cfg.stop_grace(),
            quit_timeout: cfg.quit_timeout(),
            closed: false,
            label: label.clone(),
        };
        session
            .readers
            .push(spawn_stdout_reader(stdout, tx, running, &label).map_err(spawn_err)?);
        session.readers.push(spawn_stderr_logger(stderr, &label).map_err(spawn_err)?);

        session.handshake(cfg)?;
        log::info!("{label}: ready");
        Ok(session)
    }

    /// `usi` の応答で通知されたオプションか
    pub fn supports_option(&self, name: &str) -> bool {
        self.opt_names.contains(name)
    }

    /// quit を送り、プロセスと reader スレッドを片付ける。
    pub fn close(mut self) {
        self.shutdown();
    }

    fn handshake(&mut self, cfg: &EngineConfig) -> Result<(), SessionError> {
        let timeout = cfg.ready_timeout();
        self.send("usi");
        let mut names = HashSet::new();
        self.wait_for("usiok", timeout, |line| {
            if let Some(name) = line.strip_prefix("option ").and_then(parse_option_name) {
                names.insert(name);
            }
        })?;
        self.opt_names = names;
        if !self.opt_names.is_empty() && !self.supports_option("MultiPV") {
            log::warn!("{}: engine does not advertise MultiPV; duals cannot be detected", self.label);
        }

        self.send(&format!("setoption name MultiPV value {}", cfg.multipv));
        self.send(&format!("setoption name USI_Hash value {}", cfg.hash_mb));
        self.send(&format!("setoption name USI_OwnBook value {}", cfg.own_book));
        for opt in &cfg.usi_options {
            if let Some((name, value)) = opt.split_once('=') {
                self.set_option_if_available(name.trim(), value.trim());
            } else {
                // "=" がない場合はオプション名のみとみなし、値なしで送る
                self.send(&format!("setoption name {}", opt.trim()));
            }
        }

        self.send("isready");
        self.wait_for("readyok", timeout, |_| {})?;
        self.send("usinewgame");
        Ok(())
    }

    fn set_option_if_available(&mut self, name: &str, value: &str) {
        if self.opt_names.is_empty() || self.opt_names.contains(name) {
            self.send(&format!("setoption name {name} value {value}"));
        } else {
            log::warn!("{}: option {name} is not supported, skipped", self.label);
        }
    }

    fn wait_for(
        &mut self,
        expected: &'static str,
        timeout: Duration,
        mut on_line: impl FnMut(&str),
    ) -> Result<(), SessionError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(line) => {
                    log::debug!("{} < {}", self.label, line);
                    if line.trim() == expected {
                        return Ok(());
                    }
                    on_line(&line);
                }
                Err(RecvTimeoutError::Timeout) => {
                    return Err(SessionError::Timeout {
                        label: self.label.clone(),
                        expected,
                        timeout_ms: timeout.as_millis(),
                    });
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(SessionError::Exited {
                        label: self.label.clone(),
                        expected,
                    });
                }
            }
        }
    }

    fn has_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.send("quit");

        let deadline = Instant::now() + self.quit_timeout;
        let mut exited = false;
        while Instant::now() < deadline {
            if let Ok(Some(_)) = self.child.try_wait() {
                exited = true;
                break;
            }
            std::thread::sleep(QUIT_POLL_INTERVAL);
        }
        if !exited {
            log::debug!("{}: engine ignored quit, killing", self.label);
            let _ = self.child.kill();
        }
        let _ = self.child.wait();

        self.running.store(false, Ordering::Relaxed);
        let deadline = Instant::now() + READER_JOIN_TIMEOUT;
        for handle in self.readers.drain(..) {
            while !handle.is_finished() && Instant::now() < deadline {
                std::thread::sleep(QUIT_POLL_INTERVAL);
            }
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                log::warn!("{}: reader thread still blocked, detaching", self.label);
            }
        }
        log::info!("{}: closed", self.label);
    }
}

impl UsiLink for EngineSession {
    fn send(&mut self, cmd: &str) {
        if self.has_exited() {
            log::debug!("{}: engine has exited, dropped `{cmd}`", self.label);
            return;
        }
        log::debug!("{} > {}", self.label, cmd);
        let written = self
            .stdin
            .write_all(cmd.as_bytes())
            .and_then(|_| self.stdin.write_all(b"\n"))
            .and_then(|_| self.stdin.flush());
        if let Err(e) = written {
            log::warn!("{}: failed to write `{cmd}`: {e}", self.label);
        }
    }

    fn drain_until(
        &mut self,
        until: &mut dyn FnMut(&str) -> bool,
        timeout: Duration,
        stop_on_timeout: bool,
    ) -> Drained {
        let mut lines = Vec::new();
        let mut deadline = Instant::now() + timeout;
        let mut stop_sent = false;
        loop {
            let now = Instant::now();
            if now >= deadline {
                if stop_on_timeout && !stop_sent {
                    log::warn!(
                        "{}: no answer within {} ms, sending stop",
                        self.label,
                        timeout.as_millis()
                    );
                    self.send("stop");
                    stop_sent = true;
                    deadline = now + self.stop_grace;
                    continue;
                }
                return Drained {
                    lines,
                    end: DrainEnd::TimedOut,
                };
            }

            let wait = deadline.saturating_duration_since(now).min(POLL_INTERVAL);
            match self.rx.recv_timeout(wait) {
                Ok(line) => {
                    log::debug!("{} < {}", self.label, line);
                    let done = until(&line);
                    lines.push(line);
                    if done {
                        let end = if stop_sent { DrainEnd::TimedOut } else { DrainEnd::Matched };
                        return Drained { lines, end };
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if self.has_exited() {
                        // 終了直後に reader が積んだ分を拾う
                        lines.extend(self.rx.try_iter());
                        log::warn!("{}: engine exited during search", self.label);
                        return Drained {
                            lines,
                            end: DrainEnd::Exited,
                        };
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    log::warn!("{}: engine output closed", self.label);
                    return Drained {
                        lines,
                        end: DrainEnd::Exited,
                    };
                }
            }
        }
    }

    fn discard_pending(&mut self) -> usize {
        let mut count = 0;
        for line in self.rx.try_iter() {
            log::trace!("{}: discarded stale `{line}`", self.label);
            count += 1;
        }
        count
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// 起動ディレクトリを変える場合、相対パスは先に絶対パスにしておく。
fn resolve_program(path: &Path, changes_dir: bool) -> PathBuf {
    if changes_dir && path.is_relative() && path.components().count() > 1 {
        if let Ok(abs) = path.canonicalize() {
            return abs;
        }
    }
    path.to_path_buf()
}

fn spawn_stdout_reader(
    stdout: impl Read + Send + 'static,
    tx: Sender<String>,
    running: Arc<AtomicBool>,
    label: &str,
) -> io::Result<JoinHandle<()>> {
    std::thread::Builder::new().name(format!("{label}-stdout")).spawn(move || {
        let reader = BufReader::new(stdout);
        for line in reader.lines() {
            let Ok(line) = line else { break };
            if !running.load(Ordering::Relaxed) || tx.send(line).is_err() {
                break;
            }
        }
    })
}

fn spawn_stderr_logger(
    stderr: impl Read + Send + 'static,
    label: &str,
) -> io::Result<JoinHandle<()>> {
    let label = label.to_string();
    std::thread::Builder::new().name(format!("{label}-stderr")).spawn(move || {
        for line in BufReader::new(stderr).lines().map_while(Result::ok) {
            log::debug!("{label} stderr: {line}");
        }
    })
}

/// `option name <NAME> type ...` から名前を取り出す。
pub fn parse_option_name(line: &str) -> Option<String> {
    let mut tokens = line.split_whitespace().peekable();
    while let Some(tok) = tokens.next() {
        if tok == "name" {
            let mut parts = Vec::new();
            while let Some(part) = tokens.next_if(|next| *next != "type") {
                parts.push(part);
            }
            if !parts.is_empty() {
                return Some(parts.join(" "));
            }
        }
    }
    None
}
