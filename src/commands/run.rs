//! Run a command under a build listener

use buildlog::{Charset, ChannelTransport, RawSink, ServeStats, StreamListener, WriterDestination, fargs};
use chrono::Utc;
use colored::*;
use eyre::{Context, Result, eyre};
use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use std::thread;

use crate::config::{Config, OutputTarget};

/// Exit code reported when the program cannot be found
const EXIT_NOT_FOUND: i32 = 127;
/// Exit code reported when the program was found but could not be started
const EXIT_NOT_STARTED: i32 = 126;

/// Result recorded by `finished`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    Success,
    Failure,
}

impl fmt::Display for BuildOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildOutcome::Success => f.write_str("SUCCESS"),
            BuildOutcome::Failure => f.write_str("FAILURE"),
        }
    }
}

pub struct RunOptions {
    pub output: Option<PathBuf>,
    pub append: bool,
    pub charset: Option<String>,
    pub remote: bool,
}

/// Run `command`, returning the exit code buildlog should exit with
pub fn run(opts: RunOptions, command: &[String], config: &Config) -> Result<i32> {
    let charset = resolve_charset(opts.charset.as_deref(), config)?;
    let sink = open_sink(opts.output.as_ref(), opts.append, config)?;
    let listener = StreamListener::with_charset(sink.clone(), charset);

    let code = if opts.remote {
        run_remote(&listener, command)
    } else {
        execute(&listener, command)
    };

    // buildlog opened the destination, so it is the one to close it
    if let Err(e) = sink.close() {
        log::warn!("Failed to close build log destination: {}", e);
    }
    code
}

fn resolve_charset(flag: Option<&str>, config: &Config) -> Result<Option<Charset>> {
    match flag {
        Some(name) => Ok(Some(name.parse::<Charset>().context("Invalid --charset value")?)),
        None => Ok(config.charset),
    }
}

fn open_sink(output: Option<&PathBuf>, append: bool, config: &Config) -> Result<RawSink> {
    if let Some(path) = output {
        let path = Config::expand_path(path);
        return Ok(RawSink::new(WriterDestination::file(path, append || config.output.append)?));
    }

    let sink = match config.output.target {
        OutputTarget::Stdout => RawSink::new(WriterDestination::stdout()),
        OutputTarget::Stderr => RawSink::new(WriterDestination::stderr()),
        OutputTarget::File => {
            let path = config
                .output
                .path
                .as_ref()
                .ok_or_else(|| eyre!("output.target is 'file' but output.path is not set"))?;
            RawSink::new(WriterDestination::file(
                Config::expand_path(path),
                append || config.output.append,
            )?)
        }
    };
    Ok(sink)
}

/// Record a full build of `command` on `listener`
///
/// Shared by local runs and the agent process.
pub fn execute(listener: &StreamListener, command: &[String]) -> Result<i32> {
    let started_at = Utc::now();
    listener.started().context("Failed to record build start")?;

    let (program, args) = command.split_first().ok_or_else(|| eyre!("No command given"))?;

    let resolved = match which::which(program) {
        Ok(path) => path,
        Err(e) => {
            listener.fatal_error_with("cannot find %s: %s", fargs![program, e.to_string()])?;
            listener.finished(BuildOutcome::Failure)?;
            return Ok(EXIT_NOT_FOUND);
        }
    };

    log::info!("Running {} {:?}", resolved.display(), args);
    let mut child = match Command::new(&resolved)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            listener.fatal_error_with("failed to start %s: %s", fargs![program, e.to_string()])?;
            listener.finished(BuildOutcome::Failure)?;
            return Ok(EXIT_NOT_STARTED);
        }
    };

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let raw = listener.raw_sink();
    // A relay that cannot write kills the child so the other relay reaches EOF
    let child = Mutex::new(child);
    let (out, err) = thread::scope(|s| {
        let out = s.spawn(|| relay(stdout, raw, &child));
        let err = s.spawn(|| relay(stderr, raw, &child));
        (out.join(), err.join())
    });
    let mut child = child.into_inner().map_err(|_| eyre!("child handle poisoned"))?;

    let relayed = out
        .map_err(|_| eyre!("stdout relay panicked"))
        .and_then(|r| r.context("Failed to copy command stdout"))
        .and_then(|o| {
            err.map_err(|_| eyre!("stderr relay panicked"))
                .and_then(|r| r.context("Failed to copy command stderr"))
                .map(|e| o + e)
        });
    let copied = match relayed {
        Ok(copied) => copied,
        Err(e) => {
            log::warn!("Output relay for {} failed, stopping it: {:#}", program, e);
            if let Err(kill) = child.kill() {
                log::debug!("kill {}: {}", program, kill);
            }
            child.wait().context("Failed to reap command after relay failure")?;
            return Err(e);
        }
    };

    let status = child.wait().context("Failed to wait for command")?;
    let code = status.code().unwrap_or_else(|| {
        log::warn!("{} terminated without an exit code: {}", program, status);
        1
    });

    let outcome = if code == 0 {
        BuildOutcome::Success
    } else {
        listener.error_with("%s exited with code %d", fargs![program, code])?;
        BuildOutcome::Failure
    };
    listener.finished(outcome)?;

    let elapsed = Utc::now() - started_at;
    log::info!(
        "{} finished {} in {}ms ({} bytes of output)",
        program,
        outcome,
        elapsed.num_milliseconds(),
        copied
    );
    Ok(code)
}

fn relay<R: Read>(stream: Option<R>, sink: &RawSink, child: &Mutex<Child>) -> std::io::Result<u64> {
    let result = copy_stream(stream, sink);
    if result.is_err() {
        if let Ok(mut child) = child.lock() {
            if let Err(e) = child.kill() {
                log::debug!("kill after relay failure: {}", e);
            }
        }
    }
    result
}

fn copy_stream<R: Read>(stream: Option<R>, sink: &RawSink) -> std::io::Result<u64> {
    let Some(mut stream) = stream else {
        return Ok(0);
    };
    let mut buf = [0u8; 8192];
    let mut total = 0u64;
    loop {
        let n = match stream.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        sink.write_flushed(&buf[..n])?;
        total += n as u64;
    }
}

/// Hand the listener to an agent process and relay what it forwards back
fn run_remote(listener: &StreamListener, command: &[String]) -> Result<i32> {
    let transport = ChannelTransport::new(format!("buildlog-{}", std::process::id()));
    let serialized = listener
        .serialize(&transport)
        .context("Failed to export build log destination")?;
    let json = serialized.to_json()?;

    let exe = std::env::current_exe().context("Failed to locate buildlog executable")?;
    log::info!("Spawning agent for {}", serialized.token);
    let mut child = Command::new(exe)
        .arg("agent")
        .arg("--listener")
        .arg(&json)
        .arg("--")
        .args(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .context("Failed to spawn buildlog agent")?;

    let channel = child
        .stdout
        .take()
        .ok_or_else(|| eyre!("agent stdout was not captured"))?;
    let stats = relay_agent(&transport, serialized.token.export_id, BufReader::new(channel));

    let status = child.wait().context("Failed to wait for buildlog agent")?;
    let stats = stats.context("Failed to relay agent output")?;
    log::debug!("Relayed {} frames ({} bytes) from agent", stats.frames, stats.bytes);

    let code = status.code().unwrap_or(1);
    if code != 0 && stats.frames == 0 {
        eprintln!("{} agent exited with code {} before writing anything", "✗".red(), code);
    }
    Ok(code)
}

/// Serve frames until the agent hangs up, then drop its export
fn relay_agent<R: BufRead>(
    transport: &ChannelTransport,
    export_id: u64,
    reader: R,
) -> buildlog::Result<ServeStats> {
    let stats = transport.serve(reader);
    if !transport.release(export_id) {
        log::debug!("export {} on '{}' was already released", export_id, transport.name());
    }
    stats
}
