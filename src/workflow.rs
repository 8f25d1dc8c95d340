use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::cache::ResultCache;
use crate::chunker::Chunker;
use crate::completion::CompletionService;
use crate::config::{Config, validate_max_tokens};
use crate::dispatcher::{DispatchParams, Dispatcher, is_warning};
use crate::error::{Result, RobertaError};
use crate::report::Report;
use crate::tokenizer::{Cl100kTokenizer, Tokenizer};

const SUBTITLE_EXTENSION: &str = "srt";

/// Runs the chunk → dispatch → report pipeline over subtitle files
pub struct Workflow {
    config: Config,
    chunker: Chunker,
    dispatcher: Dispatcher,
    show_progress: bool,
}

impl Workflow {
    pub fn new(config: Config, service: Box<dyn CompletionService>) -> Result<Self> {
        let tokenizer = Cl100kTokenizer::new()?;
        Self::with_tokenizer(config, Box::new(tokenizer), service)
    }

    pub fn with_tokenizer(
        config: Config,
        tokenizer: Box<dyn Tokenizer>,
        service: Box<dyn CompletionService>,
    ) -> Result<Self> {
        validate_max_tokens(config.analysis.max_tokens)?;

        let dispatcher = Dispatcher::new(
            service,
            DispatchParams::from_config(&config),
            ResultCache::with_capacity(config.analysis.cache_capacity),
        );

        Ok(Self {
            config,
            chunker: Chunker::new(tokenizer),
            dispatcher,
            show_progress: true,
        })
    }

    /// Hide the progress bar (tests, non-interactive output)
    pub fn quiet(mut self) -> Self {
        self.show_progress = false;
        self
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Analyze subtitle text, reporting progress on a fresh progress bar
    pub async fn analyze_text(&mut self, title: &str, text: &str) -> Report {
        let progress = if self.show_progress {
            let pb = ProgressBar::new(0);
            pb.set_style(ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"));
            pb
        } else {
            ProgressBar::hidden()
        };

        self.analyze_text_with_progress(title, text, &progress).await
    }

    /// Analyze subtitle text. `progress` advances by one after every chunk.
    pub async fn analyze_text_with_progress(&mut self, title: &str, text: &str, progress: &ProgressBar) -> Report {
        let max_tokens = self.config.analysis.max_tokens as usize;
        let chunks = self.chunker.split(text, max_tokens);
        let delay = Duration::from_millis(self.config.analysis.request_delay_ms);

        info!("Analyzing {}: {} chunks (max {} tokens each)", title, chunks.len(), max_tokens);
        progress.set_length(chunks.len() as u64);

        let mut results = Vec::new();
        let mut failed = 0;

        for (idx, chunk) in chunks.iter().enumerate() {
            info!(
                "┌─ Chunk {}/{} ─ records {}-{}, {} tokens",
                idx + 1,
                chunks.len(),
                format_sequence(chunk.first_sequence),
                format_sequence(chunk.last_sequence),
                chunk.token_count
            );

            let result = self.dispatcher.process(&chunk.text).await;

            if is_warning(&result) {
                failed += 1;
                warn!("└─ {}", result);
            } else {
                info!("└─ {} characters of findings", result.trim().len());
            }

            if !result.trim().is_empty() {
                results.push(result);
            }

            progress.inc(1);
            tokio::time::sleep(delay).await;
        }

        progress.finish_and_clear();
        info!("Analysis of {} completed ({} of {} chunks failed)", title, failed, chunks.len());

        Report::new(title, &results, chunks.len(), failed)
    }

    /// Analyze a single subtitle file and write its artifact.
    /// The artifact goes to `output_dir`, or next to the input by default.
    pub async fn analyze_file<P: AsRef<Path>>(&mut self, input_path: P, output_dir: Option<&Path>) -> Result<Report> {
        let input_path = input_path.as_ref();
        info!("Processing subtitle file: {}", input_path.display());

        if !input_path.is_file() {
            return Err(RobertaError::FileNotFound(input_path.display().to_string()));
        }

        let title = input_path.file_name()
            .ok_or_else(|| RobertaError::Config("Invalid subtitle filename".to_string()))?
            .to_string_lossy()
            .to_string();

        let output_dir = resolve_output_dir(input_path, output_dir);
        fs::create_dir_all(&output_dir).await?;

        let content = fs::read_to_string(input_path).await?;
        let report = self.analyze_text(&title, &content).await;
        report.write_artifact(&output_dir).await?;

        Ok(report)
    }

    /// Analyze every `.srt` file below `input_dir`, one after the other.
    /// Files that fail are logged and skipped.
    pub async fn analyze_directory<P: AsRef<Path>>(&mut self, input_dir: P, output_dir: Option<&Path>) -> Result<Vec<Report>> {
        let input_dir = input_dir.as_ref();
        info!("Processing directory: {}", input_dir.display());

        if !input_dir.is_dir() {
            return Err(RobertaError::Config("Input path is not a directory".to_string()));
        }

        let subtitle_files = find_subtitle_files(input_dir);
        info!("Found {} subtitle files to analyze", subtitle_files.len());

        let mut reports = Vec::new();
        for path in subtitle_files {
            match self.analyze_file(&path, output_dir).await {
                Ok(report) => {
                    info!("Successfully analyzed: {}", path.display());
                    reports.push(report);
                }
                Err(e) => warn!("Failed to analyze {}: {}", path.display(), e),
            }
        }

        Ok(reports)
    }
}

fn resolve_output_dir(input_path: &Path, output_dir: Option<&Path>) -> PathBuf {
    match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => match input_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        },
    }
}

/// Subtitle files below `dir`, sorted by path
fn find_subtitle_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(SUBTITLE_EXTENSION))
        })
        .map(|e| e.into_path())
        .collect();

    files.sort();
    files
}

fn format_sequence(sequence: Option<u64>) -> String {
    sequence.map(|n| n.to_string()).unwrap_or_else(|| "?".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_output_dir() {
        assert_eq!(resolve_output_dir(Path::new("a.srt"), None), PathBuf::from("."));
        assert_eq!(resolve_output_dir(Path::new("dir/a.srt"), None), PathBuf::from("dir"));
        assert_eq!(resolve_output_dir(Path::new("dir/a.srt"), Some(Path::new("out"))), PathBuf::from("out"));
    }

    #[test]
    fn test_find_subtitle_files_filters_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("b.srt"), "").unwrap();
        std::fs::write(dir.path().join("a.SRT"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();
        std::fs::write(dir.path().join("nested/c.srt"), "").unwrap();

        let files = find_subtitle_files(dir.path());
        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(names, vec!["a.SRT", "b.srt", "nested/c.srt"]);
    }

    #[test]
    fn test_format_sequence() {
        assert_eq!(format_sequence(Some(12)), "12");
        assert_eq!(format_sequence(None), "?");
    }
}
