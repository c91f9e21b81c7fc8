//! Device Bridge over the Android Debug Bridge
//!
//! Drives the `adb` executable as a subprocess to reach a device listening
//! for ADB over TCP/IP. Every invocation is bounded by a timeout and the
//! child process is killed if the timeout fires.

use async_trait::async_trait;
use bridge_traits::{
    device::{DeviceBridge, DeviceInfo},
    error::{BridgeError, Result},
};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error, info, instrument, warn};

/// Settings for [`AdbDeviceBridge`]
#[derive(Debug, Clone)]
pub struct AdbConfig {
    /// Path to the adb executable
    pub adb_path: PathBuf,
    /// Device IP address
    pub ip_address: String,
    /// ADB TCP port
    pub port: u16,
    /// Budget for connect/devices/kill-server calls
    pub connect_timeout: Duration,
    /// Budget for metadata probes (test, stat, mkdir, find)
    pub probe_timeout: Duration,
    /// Wait between `adb connect` and the verification probe
    pub connect_settle: Duration,
    /// Wait between failed connection attempts
    pub retry_delay: Duration,
}

impl AdbConfig {
    pub fn new(ip_address: impl Into<String>, port: u16) -> Self {
        Self {
            adb_path: PathBuf::from("adb"),
            ip_address: ip_address.into(),
            port,
            connect_timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(30),
            connect_settle: Duration::from_secs(2),
            retry_delay: Duration::from_secs(3),
        }
    }

    pub fn with_adb_path(mut self, adb_path: impl Into<PathBuf>) -> Self {
        self.adb_path = adb_path.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_connect_delays(mut self, settle: Duration, retry_delay: Duration) -> Self {
        self.connect_settle = settle;
        self.retry_delay = retry_delay;
        self
    }

    /// `ip:port` serial used to address the device.
    pub fn serial(&self) -> String {
        format!("{}:{}", self.ip_address, self.port)
    }
}

struct AdbOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

impl AdbOutput {
    fn failure_message(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// ADB-backed implementation of [`DeviceBridge`]
pub struct AdbDeviceBridge {
    config: AdbConfig,
    serial: String,
}

impl AdbDeviceBridge {
    pub fn new(config: AdbConfig) -> Self {
        let serial = config.serial();
        Self { config, serial }
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    async fn run_adb<I, S>(&self, args: I, timeout: Duration) -> Result<AdbOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<S> = args.into_iter().collect();
        let description = args
            .iter()
            .map(|a| a.as_ref().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ");

        let mut command = Command::new(&self.config.adb_path);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BridgeError::NotAvailable(format!(
                    "adb executable not found at {}",
                    self.config.adb_path.display()
                )))
            }
            Ok(Err(e)) => return Err(BridgeError::Io(e)),
            Err(_) => {
                error!("ADB command timed out: {}", description);
                return Err(BridgeError::Timeout {
                    operation: format!("adb {}", description),
                    secs: timeout.as_secs(),
                });
            }
        };

        Ok(AdbOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn probe(&self, command: &str) -> Result<String> {
        self.shell(command, self.config.probe_timeout).await
    }
}

/// Quote a device path for the remote shell.
fn quote(path: &str) -> Result<String> {
    shlex::try_quote(path)
        .map(|quoted| quoted.into_owned())
        .map_err(|e| BridgeError::OperationFailed(format!("Cannot quote {:?}: {}", path, e)))
}

fn remote_parent(remote: &str) -> Option<&str> {
    remote
        .rsplit_once('/')
        .map(|(parent, _)| parent)
        .filter(|parent| !parent.is_empty())
}

/// Whether `serial` is listed in `adb devices` output in the `device` state.
fn devices_lists(output: &str, serial: &str) -> bool {
    output.lines().skip(1).any(|line| {
        let mut fields = line.split_whitespace();
        fields.next() == Some(serial) && fields.next() == Some("device")
    })
}

/// Parse `getprop` output lines of the form `[key]: [value]`.
fn parse_getprop(output: &str) -> DeviceInfo {
    let mut info = DeviceInfo::default();
    for line in output.lines() {
        let Some((key, value)) = line.split_once("]: [") else {
            continue;
        };
        let key = key.trim().trim_start_matches('[');
        let value = value.trim().trim_end_matches(']').to_string();
        if value.is_empty() {
            continue;
        }
        match key {
            "ro.product.model" => info.model = Some(value),
            "ro.product.manufacturer" => info.manufacturer = Some(value),
            "ro.build.version.release" => info.os_version = Some(value),
            "ro.serialno" => info.serial = Some(value),
            _ => {}
        }
    }
    info
}

#[async_trait]
impl DeviceBridge for AdbDeviceBridge {
    #[instrument(skip(self), fields(device = %self.serial))]
    async fn connect(&self, retries: u32) -> Result<()> {
        let attempts = retries.max(1);
        for attempt in 1..=attempts {
            info!("Connecting to {} (attempt {}/{})", self.serial, attempt, attempts);

            if let Err(e) = self
                .run_adb(["kill-server"], self.config.connect_timeout)
                .await
            {
                debug!("kill-server failed: {}", e);
            }

            match self
                .run_adb(["connect", self.serial.as_str()], self.config.connect_timeout)
                .await
            {
                Ok(output) if output.success => {
                    tokio::time::sleep(self.config.connect_settle).await;
                    if self.is_connected().await {
                        info!("Successfully connected to {}", self.serial);
                        return Ok(());
                    }
                    debug!("Device not listed after connect: {}", output.stdout.trim());
                }
                Ok(output) => debug!("adb connect failed: {}", output.failure_message()),
                Err(BridgeError::NotAvailable(reason)) => {
                    return Err(BridgeError::NotAvailable(reason))
                }
                Err(e) => debug!("adb connect failed: {}", e),
            }

            if attempt < attempts {
                warn!(
                    "Connection failed, retrying in {} seconds...",
                    self.config.retry_delay.as_secs()
                );
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }

        error!("Failed to connect to {} after {} attempts", self.serial, attempts);
        Err(BridgeError::NotConnected(format!(
            "{} unreachable after {} attempts",
            self.serial, attempts
        )))
    }

    async fn is_connected(&self) -> bool {
        match self.run_adb(["devices"], self.config.connect_timeout).await {
            Ok(output) if output.success => devices_lists(&output.stdout, &self.serial),
            _ => false,
        }
    }

    async fn disconnect(&self) -> Result<()> {
        let output = self
            .run_adb(["disconnect", self.serial.as_str()], self.config.connect_timeout)
            .await?;
        if !output.success {
            return Err(BridgeError::OperationFailed(format!(
                "disconnect failed: {}",
                output.failure_message()
            )));
        }
        info!("Disconnected from {}", self.serial);
        Ok(())
    }

    async fn shell(&self, command: &str, timeout: Duration) -> Result<String> {
        let output = self
            .run_adb(["-s", self.serial.as_str(), "shell", command], timeout)
            .await?;
        if !output.success {
            debug!("Shell command failed: {}: {}", command, output.failure_message());
            return Err(BridgeError::OperationFailed(format!(
                "shell command `{}` failed: {}",
                command,
                output.failure_message()
            )));
        }
        Ok(output.stdout)
    }

    async fn push(&self, local: &Path, remote: &str, timeout: Duration) -> Result<()> {
        if !tokio::fs::try_exists(local).await? {
            return Err(BridgeError::OperationFailed(format!(
                "Local file does not exist: {}",
                local.display()
            )));
        }

        if let Some(parent) = remote_parent(remote) {
            if let Err(e) = self.mkdir(parent, true).await {
                warn!("Could not prepare {}: {}", parent, e);
            }
        }

        debug!("Pushing {} to {}", local.display(), remote);
        let args: [&OsStr; 5] = [
            OsStr::new("-s"),
            OsStr::new(&self.serial),
            OsStr::new("push"),
            local.as_os_str(),
            OsStr::new(remote),
        ];
        let output = self.run_adb(args, timeout).await?;
        if !output.success {
            return Err(BridgeError::OperationFailed(format!(
                "push {} failed: {}",
                local.display(),
                output.failure_message()
            )));
        }
        Ok(())
    }

    async fn pull(&self, remote: &str, local: &Path, timeout: Duration) -> Result<()> {
        if let Some(dir) = local.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }

        debug!("Pulling {} to {}", remote, local.display());
        let args: [&OsStr; 5] = [
            OsStr::new("-s"),
            OsStr::new(&self.serial),
            OsStr::new("pull"),
            OsStr::new(remote),
            local.as_os_str(),
        ];
        let output = self.run_adb(args, timeout).await?;
        if !output.success {
            return Err(BridgeError::OperationFailed(format!(
                "pull {} failed: {}",
                remote,
                output.failure_message()
            )));
        }
        Ok(())
    }

    async fn file_exists(&self, remote: &str) -> Result<bool> {
        let output = self
            .probe(&format!("test -f {} && echo exists || echo missing", quote(remote)?))
            .await?;
        Ok(output.trim() == "exists")
    }

    async fn mkdir(&self, remote: &str, create_parents: bool) -> Result<()> {
        let path = quote(remote)?;
        let flag = if create_parents { "-p " } else { "" };
        match self.probe(&format!("mkdir {}{} 2>&1", flag, path)).await {
            Ok(_) => Ok(()),
            Err(create_error) => {
                let output = self
                    .probe(&format!("test -d {} && echo exists || echo missing", path))
                    .await?;
                if output.trim() == "exists" {
                    Ok(())
                } else {
                    Err(create_error)
                }
            }
        }
    }

    async fn list_files(&self, remote: &str, recursive: bool) -> Result<Vec<String>> {
        let depth = if recursive { "" } else { " -maxdepth 1" };
        let output = self
            .probe(&format!("find {}{} -type f 2>/dev/null", quote(remote)?, depth))
            .await?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn delete_file(&self, remote: &str) -> Result<()> {
        self.probe(&format!("rm -f {}", quote(remote)?)).await?;
        Ok(())
    }

    async fn file_size(&self, remote: &str) -> Result<u64> {
        let output = self.probe(&format!("stat -c %s {}", quote(remote)?)).await?;
        output.trim().parse().map_err(|_| {
            BridgeError::OperationFailed(format!(
                "Unexpected size for {}: {:?}",
                remote,
                output.trim()
            ))
        })
    }

    async fn device_info(&self) -> Result<DeviceInfo> {
        let output = self.probe("getprop").await?;
        Ok(parse_getprop(&output))
    }
}
