use std::fs;
use std::io::{BufRead, BufReader};
use std::process::Stdio;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use nix::sys::signal::Signal;

use shared::daemon::pidfile::{
    ensure_dir, is_process_running, read_pid, remove_pid, send_signal, verify_not_running,
    write_pid,
};

use crate::config::NosdConfig;
use crate::daemon::server::run_server;

pub async fn start_daemon(config: NosdConfig, foreground: bool) -> Result<()> {
    ensure_dir(&config.state_dir)?;
    if let Some(log_dir) = config.log_file().parent() {
        ensure_dir(log_dir)?;
    }
    verify_not_running(&config.pid_file())?;

    if foreground {
        tracing::info!("starting nosd in foreground");
        write_pid(&config.pid_file())?;
        let result = run_server(config.clone()).await;
        remove_pid(&config.pid_file())?;
        result
    } else {
        tracing::info!("starting nosd in background");
        let exe = std::env::current_exe().context("resolving current executable")?;
        let child = std::process::Command::new(exe)
            .arg("--background-child")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .context("spawning background nosd process")?;

        let child_pid = child.id();
        thread::sleep(Duration::from_millis(500));

        if !is_process_running(child_pid) {
            bail!("nosd exited immediately after starting");
        }
        tracing::info!(pid = child_pid, "nosd started");
        Ok(())
    }
}

pub async fn run_background_child(config: NosdConfig) -> Result<()> {
    write_pid(&config.pid_file())?;
    let result = run_server(config.clone()).await;
    remove_pid(&config.pid_file())?;
    result
}

pub fn stop_daemon(config: &NosdConfig, force: bool) -> Result<()> {
    let pid = match read_pid(&config.pid_file())? {
        Some(pid) => pid,
        None => bail!("nosd is not running"),
    };

    if !is_process_running(pid) {
        tracing::warn!(pid, "stale PID file found");
        remove_pid(&config.pid_file())?;
        return Ok(());
    }

    tracing::info!(pid, "stopping nosd");
    send_signal(pid, Signal::SIGTERM).context("sending SIGTERM")?;

    let mut waited = Duration::ZERO;
    let interval = Duration::from_millis(500);
    let max_wait = Duration::from_secs(10);
    while waited < max_wait {
        thread::sleep(interval);
        waited += interval;
        if !is_process_running(pid) {
            remove_pid(&config.pid_file())?;
            tracing::info!("nosd stopped");
            return Ok(());
        }
    }

    if !force {
        bail!("nosd did not stop within {}s, use --force", max_wait.as_secs());
    }

    tracing::warn!("nosd did not stop gracefully, sending SIGKILL");
    send_signal(pid, Signal::SIGKILL).context("sending SIGKILL")?;
    thread::sleep(Duration::from_millis(500));
    if is_process_running(pid) {
        bail!("failed to kill nosd process {pid}");
    }
    remove_pid(&config.pid_file())?;
    Ok(())
}

pub async fn restart_daemon(config: NosdConfig, foreground: bool) -> Result<()> {
    if let Some(pid) = read_pid(&config.pid_file())? {
        if is_process_running(pid) {
            stop_daemon(&config, false)?;
            thread::sleep(Duration::from_millis(500));
        } else {
            remove_pid(&config.pid_file())?;
        }
    }
    start_daemon(config, foreground).await
}

pub fn status_daemon(config: &NosdConfig) -> Result<()> {
    match read_pid(&config.pid_file())? {
        Some(pid) if is_process_running(pid) => {
            tracing::info!(pid, "nosd is running");
            Ok(())
        }
        Some(_) => {
            tracing::warn!("nosd is not running (stale PID file)");
            std::process::exit(1);
        }
        None => {
            tracing::info!("nosd is not running");
            std::process::exit(1);
        }
    }
}

pub fn logs_daemon(config: &NosdConfig, follow: bool) -> Result<()> {
    let path = config.log_file();
    if !path.exists() {
        bail!("log file not found at {}", path.display());
    }

    if follow {
        let file = fs::File::open(&path)?;
        let mut reader = BufReader::new(&file);
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line)? == 0 {
                thread::sleep(Duration::from_millis(200));
                continue;
            }
            print!("{line}");
        }
    } else {
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("reading log file {}", path.display()))?;
        print!("{contents}");
        Ok(())
    }
}
