//! CLI output formatting.
//!
//! Output is information-centric: every image leads with its positional
//! index and name, with filesystem paths and per-image status shown as
//! indented context lines.
//!
//! ```text
//! Images
//! 001 dawn.jpg (6000x4000)
//! 002 mountains.jpg (4000x6000)
//!     skipped: beach.bmp (failed to decode ...)
//!
//! Analyzing 3/5
//!
//! 001 dawn.jpg → crop-1.jpg
//! 002 mountains.jpg → failed: Permission denied
//! Exported 1 image, 1 failed
//! ```
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure — no I/O, no side effects.

use crate::collection::Collection;
use crate::export::ExportReport;
use crate::workspace::AddReport;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Format the result of adding files: loaded images with their dimensions,
/// then any skipped inputs as indented context.
pub fn format_add_report(report: &AddReport, collection: &Collection) -> Vec<String> {
    let mut lines = vec!["Images".to_string()];
    for (i, id) in report.added.iter().enumerate() {
        if let Some(entry) = collection.get(*id) {
            lines.push(format!(
                "{} {} ({}x{})",
                format_index(i + 1),
                entry.name,
                entry.width,
                entry.height
            ));
        }
    }
    for (path, reason) in &report.skipped {
        lines.push(format!("    skipped: {} ({})", path.display(), reason));
    }
    lines
}

pub fn print_add_report(report: &AddReport, collection: &Collection) {
    for line in format_add_report(report, collection) {
        println!("{}", line);
    }
}

// ============================================================================
// Progress
// ============================================================================

/// One-line progress counter for a batch stage.
pub fn format_progress(stage: &str, completed: usize, total: usize) -> String {
    format!("{} {}/{}", stage, completed, total)
}

/// Print a progress counter, overwriting the current line.
pub fn print_progress(stage: &str, completed: usize, total: usize) {
    use std::io::Write;
    print!("\r{}", format_progress(stage, completed, total));
    if completed == total {
        println!();
    }
    std::io::stdout().flush().ok();
}

// ============================================================================
// Export
// ============================================================================

/// Format an export report: one line per image, source name `→` output
/// filename, failures inline, then a summary line.
pub fn format_export_report(report: &ExportReport) -> Vec<String> {
    let mut lines = Vec::new();

    for (i, file) in report.written.iter().enumerate() {
        let filename = file
            .output
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.output.display().to_string());
        lines.push(format!(
            "{} {} \u{2192} {}",
            format_index(i + 1),
            file.source_name,
            filename
        ));
    }
    for failure in &report.failures {
        lines.push(format!(
            "    {} \u{2192} failed: {}",
            failure.source_name, failure.reason
        ));
    }

    let summary = if report.failures.is_empty() {
        format!("Exported {}", plural(report.written.len(), "image"))
    } else {
        format!(
            "Exported {}, {} failed",
            plural(report.written.len(), "image"),
            report.failures.len()
        )
    };
    lines.push(summary);
    lines
}

pub fn print_export_report(report: &ExportReport) {
    for line in format_export_report(report) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::ImageId;
    use crate::export::{ExportFailure, ExportedFile};
    use std::path::PathBuf;

    fn written(name: &str, output: &str) -> ExportedFile {
        ExportedFile {
            id: ImageId::for_tests(1),
            source_name: name.to_string(),
            output: PathBuf::from(output),
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    #[test]
    fn format_index_pads_to_three_digits() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(100), "100");
    }

    #[test]
    fn plural_handles_one_and_many() {
        assert_eq!(plural(1, "image"), "1 image");
        assert_eq!(plural(3, "image"), "3 images");
        assert_eq!(plural(0, "image"), "0 images");
    }

    // =========================================================================
    // Progress
    // =========================================================================

    #[test]
    fn progress_line() {
        assert_eq!(format_progress("Analyzing", 3, 5), "Analyzing 3/5");
    }

    // =========================================================================
    // Export report
    // =========================================================================

    #[test]
    fn export_report_lists_files_and_summary() {
        let report = ExportReport {
            written: vec![
                written("dawn.jpg", "/out/1.jpg"),
                written("dusk.jpg", "/out/2.jpg"),
            ],
            failures: vec![],
        };
        let lines = format_export_report(&report);
        assert_eq!(lines[0], "001 dawn.jpg \u{2192} 1.jpg");
        assert_eq!(lines[1], "002 dusk.jpg \u{2192} 2.jpg");
        assert_eq!(lines[2], "Exported 2 images");
    }

    #[test]
    fn export_report_shows_failures_in_summary() {
        let report = ExportReport {
            written: vec![written("dawn.jpg", "/out/1.jpg")],
            failures: vec![ExportFailure {
                id: ImageId::for_tests(2),
                source_name: "broken.jpg".to_string(),
                reason: "Permission denied".to_string(),
            }],
        };
        let lines = format_export_report(&report);
        assert_eq!(lines[1], "    broken.jpg \u{2192} failed: Permission denied");
        assert_eq!(lines[2], "Exported 1 image, 1 failed");
    }
}
