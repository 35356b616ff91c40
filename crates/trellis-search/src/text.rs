//! Line-oriented full-text search backends
//!
//! Two strategies are provided. [`RipgrepProcess`] shells out to an installed
//! `rg` and parses its JSON output; [`GrepSearcherBackend`] runs the same kind of
//! literal line search in-process through `grep-searcher`. Both treat the query
//! as a fixed string.

use grep_matcher::Matcher;
use grep_regex::{RegexMatcher, RegexMatcherBuilder};
use grep_searcher::sinks::Lossy;
use grep_searcher::{BinaryDetection, SearcherBuilder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;
use trellis_core::{Result, TrellisError};

/// Files handed to one `rg` invocation; keeps argument lists below OS limits.
const RG_FILE_CHUNK: usize = 256;

#[derive(Debug, Clone)]
pub struct TextSearchOptions {
    pub case_insensitive: bool,
    /// Stop after this many matching lines.
    pub max_matches: usize,
}

impl Default for TextSearchOptions {
    fn default() -> Self {
        TextSearchOptions {
            case_insensitive: true,
            max_matches: 500,
        }
    }
}

/// One matching line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextMatch {
    pub file_path: PathBuf,
    /// 1-indexed
    pub line: u32,
    /// 1-indexed byte column of the first match on the line
    pub column: u32,
    /// The matched line, trimmed.
    pub snippet: String,
}

/// A strategy for literal line search over a fixed file list.
pub trait TextSearchBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the backend can run at all on this machine.
    fn is_available(&self) -> bool;

    fn search(&self, files: &[PathBuf], query: &str, options: &TextSearchOptions) -> Result<Vec<TextMatch>>;
}

fn clamp_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

// ── ripgrep subprocess ──────────────────────────────────

/// Runs an external `rg --json` over the file list.
#[derive(Debug, Clone)]
pub struct RipgrepProcess {
    binary: String,
}

#[derive(Deserialize)]
struct RgText {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct RgSubmatch {
    start: u64,
}

#[derive(Deserialize)]
struct RgMatch {
    path: RgText,
    lines: RgText,
    line_number: Option<u64>,
    #[serde(default)]
    submatches: Vec<RgSubmatch>,
}

impl RipgrepProcess {
    pub fn new(binary: impl Into<String>) -> Self {
        RipgrepProcess {
            binary: binary.into(),
        }
    }

    fn program(&self) -> Option<PathBuf> {
        which::which(&self.binary).ok()
    }

    /// Parse `rg --json` output, keeping only `match` messages.
    fn parse_output(stdout: &[u8], limit: usize, matches: &mut Vec<TextMatch>) {
        for line in stdout.split(|&b| b == b'\n') {
            if matches.len() >= limit {
                return;
            }
            let Ok(mut message) = serde_json::from_slice::<serde_json::Value>(line) else {
                continue;
            };
            if message.get("type").and_then(|t| t.as_str()) != Some("match") {
                continue;
            }
            let Ok(data) = serde_json::from_value::<RgMatch>(message["data"].take()) else {
                continue;
            };
            let (Some(path), Some(text), Some(line_number)) =
                (data.path.text, data.lines.text, data.line_number)
            else {
                continue;
            };
            let column = data.submatches.first().map(|m| m.start + 1).unwrap_or(1);
            matches.push(TextMatch {
                file_path: PathBuf::from(path),
                line: clamp_u32(line_number),
                column: clamp_u32(column),
                snippet: text.trim().to_string(),
            });
        }
    }
}

impl Default for RipgrepProcess {
    fn default() -> Self {
        RipgrepProcess::new("rg")
    }
}

impl TextSearchBackend for RipgrepProcess {
    fn name(&self) -> &'static str {
        "ripgrep"
    }

    fn is_available(&self) -> bool {
        self.program().is_some()
    }

    fn search(&self, files: &[PathBuf], query: &str, options: &TextSearchOptions) -> Result<Vec<TextMatch>> {
        let program = self.program().ok_or_else(|| TrellisError::TextSearchUnavailable {
            message: format!("{} not found on PATH", self.binary),
        })?;
        let mut matches = Vec::new();

        for chunk in files.chunks(RG_FILE_CHUNK) {
            if matches.len() >= options.max_matches {
                break;
            }

            let mut command = Command::new(&program);
            command
                .arg("--json")
                .arg("--no-config")
                .arg("--fixed-strings")
                .arg("--no-messages");
            if options.case_insensitive {
                command.arg("--ignore-case");
            }
            command.arg("--regexp").arg(query).arg("--").args(chunk);

            let output = command.output()?;
            // 0 = matches, 1 = no matches, 2 = error (possibly with partial output)
            match output.status.code() {
                Some(0) | Some(1) => {}
                _ if !output.stdout.is_empty() => {
                    debug!("rg exited with {} after partial output", output.status);
                }
                _ => {
                    return Err(TrellisError::TextSearchUnavailable {
                        message: format!(
                            "{} exited with {}: {}",
                            self.binary,
                            output.status,
                            String::from_utf8_lossy(&output.stderr).trim()
                        ),
                    });
                }
            }

            Self::parse_output(&output.stdout, options.max_matches, &mut matches);
        }

        Ok(matches)
    }
}

// ── In-process grep-searcher ────────────────────────────

/// Scans files line by line with `grep-searcher`. Always available.
#[derive(Debug, Clone, Default)]
pub struct GrepSearcherBackend;

impl GrepSearcherBackend {
    pub fn new() -> Self {
        GrepSearcherBackend
    }

    fn build_matcher(query: &str, options: &TextSearchOptions) -> Result<RegexMatcher> {
        let mut builder = RegexMatcherBuilder::new();
        builder.case_insensitive(options.case_insensitive);
        builder
            .build(&regex::escape(query))
            .map_err(|e| TrellisError::invalid_query(format!("cannot build matcher: {e}")))
    }

    fn search_file(
        path: &Path,
        matcher: &RegexMatcher,
        limit: usize,
        matches: &mut Vec<TextMatch>,
    ) -> std::io::Result<()> {
        let mut searcher = SearcherBuilder::new()
            .binary_detection(BinaryDetection::quit(b'\x00'))
            .line_number(true)
            .build();

        searcher.search_path(
            matcher,
            path,
            Lossy(|line_number, line| {
                if matches.len() >= limit {
                    return Ok(false);
                }
                let column = matcher
                    .find(line.as_bytes())
                    .ok()
                    .flatten()
                    .map(|m| m.start() as u64 + 1)
                    .unwrap_or(1);
                matches.push(TextMatch {
                    file_path: path.to_path_buf(),
                    line: clamp_u32(line_number),
                    column: clamp_u32(column),
                    snippet: line.trim().to_string(),
                });
                Ok(matches.len() < limit)
            }),
        )
    }
}

impl TextSearchBackend for GrepSearcherBackend {
    fn name(&self) -> &'static str {
        "grep-searcher"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn search(&self, files: &[PathBuf], query: &str, options: &TextSearchOptions) -> Result<Vec<TextMatch>> {
        let matcher = Self::build_matcher(query, options)?;
        let mut matches = Vec::new();

        for path in files {
            if matches.len() >= options.max_matches {
                break;
            }
            // Unreadable files are skipped, not fatal.
            if let Err(e) = Self::search_file(path, &matcher, options.max_matches, &mut matches) {
                debug!("Skipping {} in text search: {}", path.display(), e);
            }
        }

        Ok(matches)
    }
}
