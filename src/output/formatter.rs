//! Output formatters for result trees
//!
//! Provides indented tree, JSON, CSV, and summary output formats.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

use crate::aggregate::{ResultTree, RunSummary};
use crate::error::EventError;
use crate::models::{Node, NodeStatus};

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Tree,
    Json,
    JsonPretty,
    Csv,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "tree" => Some(OutputFormat::Tree),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "csv" => Some(OutputFormat::Csv),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Tree => "tree",
            OutputFormat::Json => "json",
            OutputFormat::JsonPretty => "json-pretty",
            OutputFormat::Csv => "csv",
            OutputFormat::Summary => "summary",
        }
    }
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    /// Render a whole result tree
    pub fn format_tree(&self, tree: &ResultTree) -> Result<String> {
        match self.format {
            OutputFormat::Tree => Ok(self.format_tree_text(tree)),
            OutputFormat::Json => {
                serde_json::to_string(tree).context("Failed to serialize result tree")
            }
            OutputFormat::JsonPretty => {
                serde_json::to_string_pretty(tree).context("Failed to serialize result tree")
            }
            OutputFormat::Csv => self.format_leaves_csv(tree),
            OutputFormat::Summary => Ok(self.format_summary(&tree.summary())),
        }
    }

    fn format_tree_text(&self, tree: &ResultTree) -> String {
        let mut output = String::new();
        let root_depth = tree.root().id.depth();

        for node in tree.iter() {
            let indent = "  ".repeat(node.id.depth() - root_depth);
            output.push_str(&indent);
            output.push_str(&self.format_node(node));
            output.push('\n');

            if let Some(failure) = &node.failure {
                output.push_str(&format!("{indent}    {failure}\n"));
            }
            if let Some(reason) = &node.skip_reason {
                output.push_str(&format!("{indent}    skipped: {reason}\n"));
            }
        }

        output.push_str(&"─".repeat(60));
        output.push('\n');
        output.push_str(&self.format_summary(&tree.summary()));
        output.push('\n');
        output
    }

    /// One line for a node: symbol, name, status and duration
    pub fn format_node(&self, node: &Node) -> String {
        let status = format!("{} {}", node.status.symbol(), node.status);
        let status = if self.colorize {
            format!("{}{status}\x1b[0m", color_code(node.status))
        } else {
            status
        };

        if node.status.is_terminal() && node.status != NodeStatus::Skipped {
            format!("{} {} [{}ms]", node.display_name, status, node.duration_ms)
        } else {
            format!("{} {}", node.display_name, status)
        }
    }

    fn format_leaves_csv(&self, tree: &ResultTree) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["path", "display_name", "status", "duration_ms", "message"])?;

        for leaf in tree.leaves() {
            let message = leaf
                .failure
                .as_ref()
                .map(|f| f.to_string())
                .or_else(|| leaf.skip_reason.clone())
                .unwrap_or_default();
            writer.write_record([
                leaf.id.path(),
                leaf.display_name.clone(),
                format!("{:?}", leaf.status).to_lowercase(),
                leaf.duration_ms.to_string(),
                message,
            ])?;
        }

        let bytes = writer.into_inner().context("Failed to flush CSV output")?;
        String::from_utf8(bytes).context("CSV output is not valid UTF-8")
    }

    /// One-line summary of leaf outcomes
    pub fn format_summary(&self, summary: &RunSummary) -> String {
        let rate = format!("{:.1}%", summary.pass_rate());
        let rate = if !self.colorize {
            rate
        } else if summary.has_failures() {
            format!("\x1b[31m{rate}\x1b[0m")
        } else {
            format!("\x1b[32m{rate}\x1b[0m")
        };
        format!("{summary} | Pass Rate: {rate}")
    }

    /// Diagnostic for a rejected event
    pub fn format_rejection(&self, error: &EventError) -> String {
        if self.colorize {
            format!("\x1b[31m✗ {error}\x1b[0m")
        } else {
            format!("✗ {error}")
        }
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Tree)
    }
}

fn color_code(status: NodeStatus) -> &'static str {
    match status {
        NodeStatus::Passed => "\x1b[32m",
        NodeStatus::Failed | NodeStatus::Aborted => "\x1b[31m",
        NodeStatus::Skipped => "\x1b[33m",
        NodeStatus::Pending | NodeStatus::Running => "\x1b[2m",
    }
}

/// Write a rendered tree to a file
pub fn write_tree_to_file(
    path: impl AsRef<Path>,
    tree: &ResultTree,
    format: OutputFormat,
) -> Result<()> {
    let path = path.as_ref();
    let formatter = ResultFormatter::new(format).no_color();
    let content = formatter.format_tree(tree)?;

    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    file.write_all(content.as_bytes())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::TreeBuilder;
    use crate::models::{FailureDetail, Identifier, Outcome, SegmentKind};
    use chrono::{Duration, TimeZone, Utc};

    fn sample_tree() -> ResultTree {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let at = |ms: i64| t0 + Duration::milliseconds(ms);

        let root = Identifier::root();
        let class = root.child(SegmentKind::Container, "AlphaTest").unwrap();
        let ok = class.child(SegmentKind::Test, "alphaOne").unwrap();
        let bad = class.child(SegmentKind::Test, "alphaTwo").unwrap();
        let off = class.child(SegmentKind::Test, "alphaOff").unwrap();

        let mut b = TreeBuilder::new();
        b.start(&root, at(0)).unwrap();
        b.register_container(&root, class.clone(), "AlphaTest").unwrap();
        b.start(&class, at(1)).unwrap();
        b.register_test(&class, ok.clone(), "alphaOne()").unwrap();
        b.register_test(&class, bad.clone(), "alphaTwo()").unwrap();
        b.register_test(&class, off.clone(), "alphaOff()").unwrap();
        b.start(&ok, at(2)).unwrap();
        b.finish(&ok, Outcome::Passed, None, at(12)).unwrap();
        b.start(&bad, at(12)).unwrap();
        b.finish(
            &bad,
            Outcome::Failed,
            Some(FailureDetail::new("expected 1, got 2")),
            at(20),
        )
        .unwrap();
        b.skip(&off, "disabled", at(20)).unwrap();
        b.finish(&class, Outcome::Passed, None, at(21)).unwrap();
        b.finish(&root, Outcome::Passed, None, at(22)).unwrap();
        b.complete().unwrap()
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from_str("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str("TREE"), Some(OutputFormat::Tree));
        assert_eq!(
            OutputFormat::from_str("json-pretty"),
            Some(OutputFormat::JsonPretty)
        );
        assert_eq!(OutputFormat::from_str("unknown"), None);
    }

    #[test]
    fn test_tree_text_indents_children() {
        let tree = sample_tree();
        let output = ResultFormatter::new(OutputFormat::Tree)
            .no_color()
            .format_tree(&tree)
            .unwrap();

        assert!(output.contains("root ✗ FAIL"));
        assert!(output.contains("\n  AlphaTest ✗ FAIL"));
        assert!(output.contains("\n    alphaOne() ✓ PASS [10ms]"));
        assert!(output.contains("expected 1, got 2"));
        assert!(output.contains("skipped: disabled"));
        assert!(!output.contains("\x1b["));
    }

    #[test]
    fn test_json_output_parses() {
        let tree = sample_tree();
        let output = ResultFormatter::new(OutputFormat::Json)
            .format_tree(&tree)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["root"]["status"], "failed");
        assert_eq!(value["summary"]["skipped"], 1);
    }

    #[test]
    fn test_csv_lists_leaves() {
        let tree = sample_tree();
        let output = ResultFormatter::new(OutputFormat::Csv)
            .format_tree(&tree)
            .unwrap();
        let lines: Vec<_> = output.lines().collect();

        assert_eq!(lines[0], "path,display_name,status,duration_ms,message");
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("Container:AlphaTest/Test:alphaOne,alphaOne(),passed,10"));
        assert!(lines[3].ends_with("skipped,0,disabled"));
    }

    #[test]
    fn test_summary_line() {
        let tree = sample_tree();
        let output = ResultFormatter::new(OutputFormat::Summary)
            .no_color()
            .format_tree(&tree)
            .unwrap();
        assert!(output.starts_with("Total: 3 | Pass: 1 | Fail: 1 | Skip: 1"));
        assert!(output.ends_with("Pass Rate: 33.3%"));
    }

    #[test]
    fn test_write_tree_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        write_tree_to_file(&path, &sample_tree(), OutputFormat::JsonPretty).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"complete\": true"));
    }
}
