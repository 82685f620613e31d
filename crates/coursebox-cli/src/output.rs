//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use coursebox_core::{ChangeLogStats, Courseware, Question, SyncResult};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print a single courseware with its details
    pub fn print_courseware(&self, courseware: &Courseware) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:          {}", courseware.id);
                println!("Title:       {}", courseware.title);
                if let Some(ref desc) = courseware.description {
                    println!("Description: {}", desc);
                }
                if let Some(ref thumbnail) = courseware.thumbnail {
                    println!("Thumbnail:   {}", thumbnail);
                }
                println!("Status:      {}", courseware.status.as_str());
                println!(
                    "Created:     {}",
                    courseware.created_at.format("%Y-%m-%d %H:%M")
                );
                println!(
                    "Updated:     {}",
                    courseware.updated_at.format("%Y-%m-%d %H:%M")
                );
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(courseware).unwrap());
            }
            OutputFormat::Quiet => {
                println!("{}", courseware.id);
            }
        }
    }

    /// Print a list of coursewares
    pub fn print_coursewares(&self, coursewares: &[Courseware]) {
        match self.format {
            OutputFormat::Human => {
                if coursewares.is_empty() {
                    println!("No coursewares found.");
                    return;
                }
                for courseware in coursewares {
                    println!(
                        "{} | {} | {} | {}",
                        &courseware.id[..8.min(courseware.id.len())],
                        truncate(&courseware.title, 40),
                        courseware.status.as_str(),
                        courseware.updated_at.format("%Y-%m-%d %H:%M")
                    );
                }
                println!("\n{} courseware(s)", coursewares.len());
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(coursewares).unwrap());
            }
            OutputFormat::Quiet => {
                for courseware in coursewares {
                    println!("{}", courseware.id);
                }
            }
        }
    }

    /// Print a list of questions
    pub fn print_questions(&self, questions: &[Question]) {
        match self.format {
            OutputFormat::Human => {
                if questions.is_empty() {
                    println!("No questions found.");
                    return;
                }
                for question in questions {
                    let media = if question.media_paths.is_empty() {
                        String::new()
                    } else {
                        format!(" [{} media]", question.media_paths.len())
                    };
                    println!(
                        "{:>3}. {} | {}{}",
                        question.order_index,
                        &question.id[..8.min(question.id.len())],
                        question.question_type,
                        media
                    );
                }
                println!("\n{} question(s)", questions.len());
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(questions).unwrap());
            }
            OutputFormat::Quiet => {
                for question in questions {
                    println!("{}", question.id);
                }
            }
        }
    }

    /// Print the outcome of a sync pass
    pub fn print_sync_result(&self, result: &SyncResult) {
        match self.format {
            OutputFormat::Human => {
                if result.success {
                    println!("✓ Sync complete");
                } else {
                    println!("✗ Sync finished with errors");
                }
                println!("  Uploaded:   {}", result.uploaded);
                println!("  Downloaded: {}", result.downloaded);
                println!("  Conflicts:  {}", result.conflicts);
                for error in &result.errors {
                    println!("  Error: {}", error);
                }
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(result).unwrap());
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print change-log statistics
    pub fn print_change_stats(&self, stats: &ChangeLogStats) {
        match self.format {
            OutputFormat::Human => {
                println!("Change log:");
                println!("  Pending: {}", stats.pending);
                println!("  Synced:  {}", stats.synced);
                println!("  Failed:  {}", stats.failed);
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "pending": stats.pending,
                        "synced": stats.synced,
                        "failed": stats.failed
                    })
                );
            }
            OutputFormat::Quiet => {
                println!("{}", stats.pending);
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

/// Truncate a string to max_len characters, adding "..." if truncated
///
/// Counts chars, not bytes, so multibyte titles never split mid-character.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
