//! Output formatting for extraction results (table, JSON, markdown, CSV).

use crate::config::OutputFormat;
use crate::flipkart::health::HealthReport;
use crate::flipkart::models::{ExtractionResult, ProductRecord};

/// Formats records and reports for output.
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    /// Creates a new formatter.
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the records of an extraction result. Failures render as a
    /// short diagnostic in the human formats and structured JSON otherwise.
    pub fn format_result(&self, result: &ExtractionResult) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(result).unwrap_or_else(|_| "{}".to_string())
            }
            _ if !result.success => {
                let mut lines = vec![format!(
                    "Extraction failed after {}ms: {}",
                    result.elapsed_ms,
                    result.error.as_deref().unwrap_or("unknown error")
                )];
                if let Some(signal) = result.block {
                    lines.push(format!("Block signal: {}", signal));
                }
                lines.join("\n")
            }
            _ => self.format_records(&result.records),
        }
    }

    /// Formats a list of records.
    pub fn format_records(&self, records: &[ProductRecord]) -> String {
        if records.is_empty() {
            return match self.format {
                OutputFormat::Json => "[]".to_string(),
                OutputFormat::Csv => csv_header(),
                _ => "No products found.".to_string(),
            };
        }

        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(records).unwrap_or_else(|_| "[]".to_string())
            }
            OutputFormat::Table => table_records(records),
            OutputFormat::Markdown => markdown_records(records),
            OutputFormat::Csv => csv_records(records),
        }
    }

    /// Formats a health report.
    pub fn format_health(&self, report: &HealthReport) -> String {
        if self.format == OutputFormat::Json {
            return serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string());
        }

        let mut lines = Vec::new();
        lines.push(format!("Selector health: {}", report.status));
        lines.push(format!("Probe query:     {}", report.probe_query));
        lines.push(format!("Containers:      {}", report.containers_probed));
        lines.push(format!("Titles found:    {}", report.titles_found));
        lines.push(format!("Prices found:    {}", report.prices_found));
        lines.push(format!("Yield ratio:     {:.0}%", report.yield_ratio * 100.0));

        if let Some(signal) = report.block {
            lines.push(format!("Block signal:    {}", signal));
        }

        if !report.recommendations.is_empty() {
            lines.push(String::new());
            lines.push("Recommendations:".to_string());
            for rec in &report.recommendations {
                lines.push(format!("  - {}", rec));
            }
        }

        if !report.candidate_rules.title.is_empty() || !report.candidate_rules.price.is_empty() {
            lines.push(String::new());
            lines.push("Candidate rules:".to_string());
            for rule in &report.candidate_rules.title {
                lines.push(format!("  title: {}", rule));
            }
            for rule in &report.candidate_rules.price {
                lines.push(format!("  price: {}", rule));
            }
        }

        lines.join("\n")
    }
}

// Table formatting

fn table_records(records: &[ProductRecord]) -> String {
    let price_width = 12;
    let rating_width = 6;
    let method_width = 9;
    let title_width = 50;

    let mut lines = Vec::new();

    lines.push(format!(
        "{:<price_width$}  {:<rating_width$}  {:<method_width$}  {}",
        "Price", "Rating", "Method", "Title"
    ));
    lines.push(format!(
        "{:-<price_width$}  {:-<rating_width$}  {:-<method_width$}  {:-<title_width$}",
        "", "", "", ""
    ));

    for record in records {
        let rating_str = match record.rating {
            Some(r) => format!("{:.1}", r),
            None => "N/A".to_string(),
        };

        lines.push(format!(
            "{:<price_width$}  {:<rating_width$}  {:<method_width$}  {}",
            record.price_display,
            rating_str,
            record.extraction_method.to_string(),
            truncate_chars(&record.title, title_width),
        ));
    }

    lines.join("\n")
}

// Markdown formatting

fn markdown_records(records: &[ProductRecord]) -> String {
    let mut lines = Vec::new();

    lines.push("| Title | Price | Rating | Availability | Method |".to_string());
    lines.push("|-------|-------|--------|--------------|--------|".to_string());

    for record in records {
        let rating_str = match record.rating {
            Some(r) => format!("{:.1}", r),
            None => "N/A".to_string(),
        };

        lines.push(format!(
            "| [{}]({}) | {} | {} | {} | {} |",
            record.title.replace('|', "\\|"),
            record.url,
            record.price_display,
            rating_str,
            record.availability,
            record.extraction_method,
        ));
    }

    lines.join("\n")
}

// CSV formatting

fn csv_header() -> String {
    "title,price_display,price,rating,url,image_url,availability,extraction_method".to_string()
}

fn csv_records(records: &[ProductRecord]) -> String {
    let mut lines = vec![csv_header()];

    for record in records {
        lines.push(
            [
                csv_escape(&record.title),
                csv_escape(&record.price_display),
                record.price.map(|p| p.to_string()).unwrap_or_default(),
                record.rating.map(|r| format!("{:.1}", r)).unwrap_or_default(),
                csv_escape(&record.url),
                csv_escape(record.image_url.as_deref().unwrap_or("")),
                record.availability.to_string().replace(' ', ""),
                record.extraction_method.to_string(),
            ]
            .join(","),
        );
    }

    lines.join("\n")
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", cut)
}
