//! Plain text rendering of detect and convert reports.

use std::fmt::Display;
use std::io::{self, Write};

use helm_mapify::{ConvertReport, DetectReport};
use helm_mapify_core::UndetectedUsage;
use owo_colors::OwoColorize;

pub struct TextReport<W> {
    out: W,
    color: bool,
}

impl<W: Write> TextReport<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self { out, color }
    }

    fn heading(&mut self, indent: &str, text: &str) -> io::Result<()> {
        let text = if self.color {
            &text.bold() as &dyn Display
        } else {
            &text as &dyn Display
        };
        writeln!(self.out, "{indent}{text}:")
    }

    fn path(&self, path: &str) -> String {
        if self.color {
            path.cyan().to_string()
        } else {
            path.to_string()
        }
    }

    fn undetected(&mut self, indent: &str, items: &[UndetectedUsage]) -> io::Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        self.heading(indent, "undetected")?;
        for u in items {
            let path = self.path(&u.values_path);
            let category = if self.color {
                &u.category.yellow() as &dyn Display
            } else {
                &u.category as &dyn Display
            };
            writeln!(
                self.out,
                "{indent}  {path}  {category}  {}:{}  {}",
                u.source_file, u.line, u.reason
            )?;
            writeln!(self.out, "{indent}    suggestion: {}", u.suggested_override)?;
        }
        Ok(())
    }

    pub fn detect(&mut self, report: &DetectReport) -> io::Result<()> {
        writeln!(self.out, "chart: {}", report.chart)?;
        if !report.candidates.is_empty() {
            self.heading("", "candidates")?;
            for c in &report.candidates {
                let path = self.path(&c.values_path);
                let in_values = if c.exists_in_values {
                    "  (list in values.yaml)"
                } else {
                    ""
                };
                writeln!(
                    self.out,
                    "  {path}  key={}  type={}  {}{in_values}",
                    c.merge_key, c.element_type, c.source_file
                )?;
            }
        }
        self.undetected("", &report.undetected)?;
        if !report.links.is_empty() {
            self.heading("", "subcharts")?;
            for link in &report.links {
                let kinds: Vec<String> = link
                    .kinds
                    .iter()
                    .map(|k| format!("{k:?}").to_ascii_lowercase())
                    .collect();
                writeln!(
                    self.out,
                    "  {}  prefix={}  {}  {}",
                    link.name,
                    link.prefix,
                    kinds.join(","),
                    link.path.as_str()
                )?;
            }
        }
        Ok(())
    }

    pub fn convert(&mut self, report: &ConvertReport) -> io::Result<()> {
        self.convert_at("", report)
    }

    fn convert_at(&mut self, indent: &str, report: &ConvertReport) -> io::Result<()> {
        let mode = if report.dry_run { " (dry run)" } else { "" };
        writeln!(self.out, "{indent}chart: {}{mode}", report.chart)?;
        for (title, fields) in [("converted", &report.converted), ("folded", &report.folded)] {
            if fields.is_empty() {
                continue;
            }
            self.heading(indent, title)?;
            for f in fields {
                let path = self.path(&f.values_path);
                writeln!(self.out, "{indent}  {path}  key={}", f.merge_key)?;
            }
        }
        if !report.skipped.is_empty() {
            self.heading(indent, "skipped")?;
            for s in &report.skipped {
                let path = self.path(&s.values_path);
                writeln!(self.out, "{indent}  {path}  {}", s.reason)?;
            }
        }
        self.undetected(indent, &report.undetected)?;

        let (title, files) = if report.dry_run {
            ("would write", &report.files_changed)
        } else {
            ("written", &report.files_written)
        };
        if !files.is_empty() {
            self.heading(indent, title)?;
            for file in files {
                writeln!(self.out, "{indent}  {file}")?;
            }
        }

        let nested = format!("{indent}    ");
        for sub in &report.subcharts {
            writeln!(
                self.out,
                "{indent}subchart {} (prefix {})",
                sub.link.name, sub.link.prefix
            )?;
            if let Some(err) = &sub.error {
                let err = if self.color {
                    &err.red() as &dyn Display
                } else {
                    err as &dyn Display
                };
                writeln!(self.out, "{indent}  error: {err}")?;
            }
            if let Some(note) = &sub.note {
                writeln!(self.out, "{indent}  {note}")?;
            }
            if let Some(sub_report) = &sub.report {
                self.convert_at(&nested, sub_report)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helm_mapify::{ConvertedField, SkippedCandidate};

    #[test]
    fn convert_report_is_plain_text() -> io::Result<()> {
        let report = ConvertReport {
            chart: "app".to_string(),
            dry_run: true,
            converted: vec![ConvertedField {
                values_path: "env".to_string(),
                merge_key: "name".to_string(),
                promote_scalar: None,
                templates: vec!["templates/deployment.yaml".to_string()],
                values_changed: true,
            }],
            skipped: vec![SkippedCandidate {
                values_path: "ports".to_string(),
                reason: "flow style list".to_string(),
            }],
            files_changed: vec!["values.yaml".to_string()],
            ..ConvertReport::default()
        };
        let mut out = Vec::new();
        TextReport::new(&mut out, false).convert(&report)?;
        similar_asserts::assert_eq!(
            String::from_utf8_lossy(&out),
            "chart: app (dry run)\nconverted:\n  env  key=name\nskipped:\n  ports  flow style list\nwould write:\n  values.yaml\n"
        );
        Ok(())
    }

    #[test]
    fn colored_report_highlights_paths() -> io::Result<()> {
        let report = ConvertReport {
            chart: "app".to_string(),
            skipped: vec![SkippedCandidate {
                values_path: "ports".to_string(),
                reason: "flow style list".to_string(),
            }],
            ..ConvertReport::default()
        };
        let mut out = Vec::new();
        TextReport::new(&mut out, true).convert(&report)?;
        let out = String::from_utf8_lossy(&out);
        assert!(out.contains("  \u{1b}[36mports\u{1b}[39m  flow style list\n"));
        Ok(())
    }
}
