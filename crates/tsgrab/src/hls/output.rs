// HLS output: joins the per-index segment files into the destination file.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::hls::HlsDownloaderError;

/// Produces the destination file from the ordered segment files.
#[async_trait]
pub trait Reassembler: Send + Sync {
    fn name(&self) -> &'static str;

    /// `parts` are in index order and all exist with non-empty contents.
    /// `workdir` may hold scratch files.
    async fn reassemble(
        &self,
        parts: &[PathBuf],
        workdir: &Path,
        destination: &Path,
    ) -> Result<(), HlsDownloaderError>;
}

/// Checks that every part exists and is non-empty. Returns their total size.
pub async fn verify_parts(parts: &[PathBuf]) -> Result<u64, HlsDownloaderError> {
    let mut total = 0;
    for part in parts {
        let metadata = tokio::fs::metadata(part).await.map_err(|e| {
            HlsDownloaderError::ReassemblyError(format!(
                "Segment file {} is missing: {e}",
                part.display()
            ))
        })?;
        if metadata.len() == 0 {
            return Err(HlsDownloaderError::ReassemblyError(format!(
                "Segment file {} is empty",
                part.display()
            )));
        }
        total += metadata.len();
    }
    Ok(total)
}

/// Plain byte concatenation in index order. Needs no external tool.
#[derive(Debug, Default, Clone, Copy)]
pub struct ByteConcat;

#[async_trait]
impl Reassembler for ByteConcat {
    fn name(&self) -> &'static str {
        "concat"
    }

    async fn reassemble(
        &self,
        parts: &[PathBuf],
        _workdir: &Path,
        destination: &Path,
    ) -> Result<(), HlsDownloaderError> {
        let mut output = File::create(destination).await?;
        for part in parts {
            let mut input = File::open(part).await?;
            tokio::io::copy(&mut input, &mut output).await?;
        }
        output.flush().await?;
        debug!(parts = parts.len(), destination = %destination.display(), "Concatenated segments");
        Ok(())
    }
}

const FFMPEG_TIMEOUT: Duration = Duration::from_secs(600);

/// Remuxes through ffmpeg's concat demuxer with stream copy.
#[derive(Debug, Clone)]
pub struct FfmpegConcat {
    program: PathBuf,
    timeout: Duration,
}

impl FfmpegConcat {
    /// Finds `ffmpeg` on `PATH`.
    pub fn locate() -> Result<Self, HlsDownloaderError> {
        let program = which::which("ffmpeg").map_err(|e| {
            HlsDownloaderError::ConfigError(format!("ffmpeg not found on PATH: {e}"))
        })?;
        Ok(Self::with_program(program))
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: FFMPEG_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Concat demuxer list, one `file '<path>'` line per part.
    fn concat_list(parts: &[PathBuf]) -> String {
        parts
            .iter()
            .map(|part| {
                let escaped = part.to_string_lossy().replace('\'', r"'\''");
                format!("file '{escaped}'\n")
            })
            .collect()
    }
}

#[async_trait]
impl Reassembler for FfmpegConcat {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn reassemble(
        &self,
        parts: &[PathBuf],
        workdir: &Path,
        destination: &Path,
    ) -> Result<(), HlsDownloaderError> {
        let list = workdir.join("list.txt");
        tokio::fs::write(&list, Self::concat_list(parts)).await?;

        let mut command = Command::new(&self.program);
        command
            .args(["-hide_banner", "-loglevel", "error"])
            .args(["-f", "concat", "-safe", "0", "-i"])
            .arg(&list)
            .args(["-c", "copy", "-y"])
            .arg(destination)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(program = %self.program.display(), parts = parts.len(), "Running ffmpeg concat");
        let child = command.spawn().map_err(|e| {
            HlsDownloaderError::ReassemblyError(format!(
                "Failed to start {}: {e}",
                self.program.display()
            ))
        })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                HlsDownloaderError::ReassemblyError(format!(
                    "ffmpeg timed out after {}s",
                    self.timeout.as_secs()
                ))
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HlsDownloaderError::ReassemblyError(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        if tokio::fs::metadata(destination).await.is_err() {
            return Err(HlsDownloaderError::ReassemblyError(format!(
                "ffmpeg produced no output at {}",
                destination.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn write_parts(dir: &Path, contents: &[&[u8]]) -> Vec<PathBuf> {
        let mut parts = Vec::new();
        for (index, content) in contents.iter().enumerate() {
            let path = dir.join(format!("{index}.ts"));
            tokio::fs::write(&path, content).await.unwrap();
            parts.push(path);
        }
        parts
    }

    #[tokio::test]
    async fn test_verify_parts() {
        let dir = tempfile::tempdir().unwrap();
        let parts = write_parts(dir.path(), &[b"abc", b"de"]).await;
        assert_eq!(verify_parts(&parts).await.unwrap(), 5);

        let mut missing = parts.clone();
        missing.push(dir.path().join("9.ts"));
        assert!(matches!(
            verify_parts(&missing).await,
            Err(HlsDownloaderError::ReassemblyError(_))
        ));

        let empty = write_parts(dir.path(), &[b"x", b""]).await;
        assert!(matches!(
            verify_parts(&empty).await,
            Err(HlsDownloaderError::ReassemblyError(_))
        ));
    }

    #[tokio::test]
    async fn test_byte_concat_preserves_index_order() {
        let dir = tempfile::tempdir().unwrap();
        let parts = write_parts(dir.path(), &[b"\x47first", b"\x47second", b"\x47third"]).await;
        let destination = dir.path().join("out.ts");

        ByteConcat
            .reassemble(&parts, dir.path(), &destination)
            .await
            .unwrap();
        assert_eq!(
            std::fs::read(&destination).unwrap(),
            b"\x47first\x47second\x47third"
        );
    }

    #[test]
    fn test_concat_list_quotes_paths() {
        let list = FfmpegConcat::concat_list(&[
            PathBuf::from("/tmp/w/0.ts"),
            PathBuf::from("/tmp/it's/1.ts"),
        ]);
        assert_eq!(list, "file '/tmp/w/0.ts'\nfile '/tmp/it'\\''s/1.ts'\n");
    }

    #[tokio::test]
    async fn test_ffmpeg_failures_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let parts = write_parts(dir.path(), &[b"\x47a"]).await;
        let destination = dir.path().join("out.ts");

        let missing = FfmpegConcat::with_program("/nonexistent/ffmpeg")
            .reassemble(&parts, dir.path(), &destination)
            .await;
        assert!(matches!(missing, Err(HlsDownloaderError::ReassemblyError(_))));

        let failing = FfmpegConcat::with_program("false")
            .reassemble(&parts, dir.path(), &destination)
            .await;
        assert!(matches!(failing, Err(HlsDownloaderError::ReassemblyError(_))));

        // Exits 0 but writes nothing.
        let silent = FfmpegConcat::with_program("true")
            .reassemble(&parts, dir.path(), &destination)
            .await;
        assert!(matches!(silent, Err(HlsDownloaderError::ReassemblyError(_))));
        assert!(dir.path().join("list.txt").exists());
    }
}
