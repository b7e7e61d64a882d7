//! External OCR pipeline (olmOCR) run as a subprocess.
//!
//! The pipeline is invoked as `<program> <args..> <workspace> --markdown --pdfs <pdf>`
//! and is expected to write `<workspace>/markdown/<stem>.md`, plus optional
//! Dolma JSON-lines files in `<workspace>`.

use super::{scoped_dir, ExtractedText, TextExtractor};
use crate::config::OlmOcrConfig;
use crate::document::Document;
use crate::error::ServiceError;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

pub struct OlmOcrExtractor {
    config: OlmOcrConfig,
    work_dir: Option<PathBuf>,
}

impl OlmOcrExtractor {
    pub fn new(config: OlmOcrConfig, work_dir: Option<PathBuf>) -> Self {
        Self { config, work_dir }
    }

    fn command(&self, cwd: &Path, workspace: &Path, pdf_path: &Path) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args)
            .arg(workspace)
            .arg("--markdown")
            .arg("--pdfs")
            .arg(pdf_path)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        // Own process group, so workers the pipeline forks can be killed with it.
        #[cfg(unix)]
        cmd.process_group(0);

        if self.config.cpu_only {
            cmd.env("CUDA_VISIBLE_DEVICES", "")
                .env("TORCH_DEVICE", "cpu")
                .env("PYTHONUNBUFFERED", "1")
                .env("PYTHONIOENCODING", "utf-8");
        }
        cmd
    }

    /// Run the pipeline once. The child is killed if the deadline passes.
    async fn run_pipeline(
        &self,
        cwd: &Path,
        workspace: &Path,
        pdf_path: &Path,
    ) -> Result<(), ServiceError> {
        let mut cmd = self.command(cwd, workspace, pdf_path);
        info!(
            "Running OCR pipeline: {} {} {:?} --markdown --pdfs {:?} (cpu_only={})",
            self.config.program,
            self.config.args.join(" "),
            workspace,
            pdf_path,
            self.config.cpu_only
        );

        let child = cmd
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ServiceError::Processing(format!(
                    "Failed to start OCR pipeline '{}': {}",
                    self.config.program, e
                ))
            })?;
        let pid = child.id();

        let output = match tokio::time::timeout(self.config.timeout(), child.wait_with_output()).await {
            Ok(result) => result.map_err(io_error("wait for OCR pipeline"))?,
            Err(_) => {
                // The leader is gone with the dropped future; take its workers down too.
                if let Some(pid) = pid {
                    kill_process_group(pid);
                }
                warn!(
                    "OCR pipeline exceeded {}s, killed",
                    self.config.timeout_secs
                );
                return Err(ServiceError::Timeout {
                    secs: self.config.timeout_secs,
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("OCR pipeline failed ({}): {}", output.status, stderr);
            return Err(ServiceError::Processing(format!(
                "PDF processing failed: {}",
                stderr.trim()
            )));
        }

        debug!(
            "OCR pipeline stdout: {}",
            String::from_utf8_lossy(&output.stdout)
        );
        Ok(())
    }
}

#[async_trait::async_trait]
impl TextExtractor for OlmOcrExtractor {
    fn name(&self) -> &str {
        "olmocr"
    }

    async fn extract(&self, document: &Document) -> Result<ExtractedText, ServiceError> {
        document.ensure_pdf()?;

        // Removed when dropped, on every return path below.
        let temp_dir = scoped_dir(self.work_dir.as_deref())?;
        let workspace = temp_dir.path().join("workspace");
        tokio::fs::create_dir_all(&workspace)
            .await
            .map_err(io_error("create workspace"))?;

        let pdf_path = temp_dir.path().join(document.safe_filename());
        tokio::fs::write(&pdf_path, &document.data)
            .await
            .map_err(io_error("save upload"))?;

        self.run_pipeline(temp_dir.path(), &workspace, &pdf_path)
            .await?;

        let markdown_file = find_markdown(&workspace.join("markdown"), &document.stem()).await?;
        let text = tokio::fs::read_to_string(&markdown_file)
            .await
            .map_err(io_error("read markdown output"))?;
        let dolma_content = read_dolma(&workspace).await?;

        info!(
            "OlmOcrExtractor: {} -> {} chars, {} dolma records (id={})",
            document.filename,
            text.chars().count(),
            dolma_content.len(),
            document.id
        );

        Ok(ExtractedText {
            text,
            dolma_content,
        })
    }
}

// ============================================================================
// Output discovery
// ============================================================================

/// `<dir>/<stem>.md`, else the first `.md` file by name.
async fn find_markdown(markdown_dir: &Path, stem: &str) -> Result<PathBuf, ServiceError> {
    let is_dir = tokio::fs::metadata(markdown_dir)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);
    if !is_dir {
        return Err(ServiceError::Processing(
            "No markdown output directory found".to_string(),
        ));
    }

    let exact = markdown_dir.join(format!("{}.md", stem));
    if tokio::fs::metadata(&exact)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
    {
        return Ok(exact);
    }

    let fallback = files_with_extension(markdown_dir, "md")
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ServiceError::Processing("No markdown file generated".to_string()))?;
    debug!("No {}.md, falling back to {:?}", stem, fallback);
    Ok(fallback)
}

/// Parse the first `.jsonl` file in the workspace, skipping blank lines.
async fn read_dolma(workspace: &Path) -> Result<Vec<serde_json::Value>, ServiceError> {
    let Some(path) = files_with_extension(workspace, "jsonl").await?.into_iter().next() else {
        return Ok(Vec::new());
    };

    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(io_error("read dolma output"))?;

    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str(line).map_err(|e| {
                ServiceError::Processing(format!("Invalid JSON in {:?}: {}", path.file_name(), e))
            })
        })
        .collect()
}

/// Regular files in `dir` with the given extension, sorted by path.
async fn files_with_extension(dir: &Path, ext: &str) -> Result<Vec<PathBuf>, ServiceError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(io_error("list OCR output"))?;

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(io_error("list OCR output"))?
    {
        let path = entry.path();
        let is_file = entry
            .file_type()
            .await
            .map(|t| t.is_file())
            .unwrap_or(false);
        if is_file && path.extension().map(|e| e == ext).unwrap_or(false) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(unix)]
fn kill_process_group(pgid: u32) {
    // SAFETY: killpg has no memory-safety preconditions; ESRCH just means the group is gone.
    let rc = unsafe { libc::killpg(pgid as libc::pid_t, libc::SIGKILL) };
    if rc != 0 {
        debug!("killpg({}) failed: {}", pgid, std::io::Error::last_os_error());
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: u32) {}

fn io_error(action: &'static str) -> impl Fn(std::io::Error) -> ServiceError {
    move |e| ServiceError::Processing(format!("PDF processing error: failed to {}: {}", action, e))
}
