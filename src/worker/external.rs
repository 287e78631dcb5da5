//! External worker for GPU and other out-of-process miners
//!
//! The command is run once per search window with four extra arguments:
//! the header as hex, the target as big-endian hex, and the inclusive nonce
//! bounds. The first token on stdout is the nonce (decimal or `0x` hex), or
//! `none`, `-1` or nothing when the window holds no solution.

use super::{search_span, NonceSearcher};
use crate::consensus::{Target, HEADER_SIZE};
use crate::error::{Error, Result};
use crate::search::check_nonce;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn, Instrument};

/// External worker that executes a mining command
pub struct ExternalSearcher {
    command: String,
    timeout: Duration,
}

impl ExternalSearcher {
    /// Create a new external searcher with the specified command
    pub fn new(command: String, timeout: Duration) -> Self {
        info!("Creating external worker with command: {}", command);
        Self { command, timeout }
    }

    /// Parse the command into program and arguments
    fn parse_command(&self) -> Result<(String, Vec<String>)> {
        let mut parts = self.command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| Error::external_process("No external command specified"))?;
        Ok((program.to_string(), parts.map(str::to_string).collect()))
    }

    async fn execute(
        &self,
        header: &[u8; HEADER_SIZE],
        target: &Target,
        min: u32,
        max: u32,
    ) -> Result<Vec<u8>> {
        let (program, mut args) = self.parse_command()?;
        args.push(hex::encode(header));
        args.push(target.to_hex_be());
        args.push(min.to_string());
        args.push(max.to_string());

        debug!("Executing external command: {} {:?}", program, args);

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::external_process(format!("Failed to spawn external process: {}", e)))?;

        let output = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| Error::timeout("External mining command"))?
            .map_err(|e| Error::external_process(format!("External process failed: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::external_process(format!(
                "External miner failed with exit code {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        Ok(output.stdout)
    }
}

/// Parse the nonce reported by an external miner
pub fn parse_output(stdout: &[u8]) -> Result<Option<u32>> {
    let text = String::from_utf8_lossy(stdout);
    let token = match text.split_whitespace().next() {
        None => return Ok(None),
        Some(token) => token,
    };

    if token.eq_ignore_ascii_case("none") || token == "-1" {
        return Ok(None);
    }

    let parsed = match token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        Some(digits) => u32::from_str_radix(digits, 16),
        None => token.parse::<u32>(),
    };

    parsed
        .map(Some)
        .map_err(|_| Error::external_process(format!("Invalid output from external miner: {}", token)))
}

#[async_trait]
impl NonceSearcher for ExternalSearcher {
    fn worker_type(&self) -> &'static str {
        "external"
    }

    async fn search(
        &self,
        header: [u8; HEADER_SIZE],
        target: Target,
        min: u32,
        max: u32,
    ) -> Result<Option<u32>> {
        let span = search_span(self.worker_type(), min, max);
        async move {
            let start = Instant::now();
            let stdout = self.execute(&header, &target, min, max).await?;
            let nonce = match parse_output(&stdout)? {
                None => {
                    debug!("External miner returned no solution in {:?}", start.elapsed());
                    return Ok(None);
                }
                Some(nonce) => nonce,
            };

            if nonce < min || nonce > max {
                return Err(Error::worker(
                    "external",
                    format!("Nonce {} outside of range {}..={}", nonce, min, max),
                ));
            }

            if !check_nonce(&header, &target, nonce) {
                warn!("External miner returned nonce {} that misses the target", nonce);
                return Err(Error::worker("external", format!("Nonce {} misses the target", nonce)));
            }

            debug!("External miner found nonce {} in {:?}", nonce, start.elapsed());
            Ok(Some(nonce))
        }
        .instrument(span)
        .await
    }
}
