use crate::models::AnalysisResult;
use anyhow::{Result, bail};
use colored::*;
use std::fmt;
use std::fs::File;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Text,
    Json,
    Csv,
}

impl ExportFormat {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "text" | "txt" => Ok(ExportFormat::Text),
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => bail!("Unsupported output format '{}': use text, json or csv", other),
        }
    }

    /// Format implied by a file name, if its extension is one we write
    pub fn from_extension(filename: &str) -> Option<Self> {
        let (_, ext) = filename.rsplit_once('.')?;
        Self::parse(ext).ok()
    }
}

/// Renders an analysis result. Output depends only on the result.
pub struct Exporter;

impl Exporter {
    pub fn render(result: &AnalysisResult, format: ExportFormat) -> Result<String> {
        match format {
            ExportFormat::Text => Self::to_text(result),
            ExportFormat::Json => Self::to_json(result),
            ExportFormat::Csv => Self::to_csv(result),
        }
    }

    pub fn to_json(result: &AnalysisResult) -> Result<String> {
        Ok(serde_json::to_string_pretty(result)?)
    }

    /// One row per anchor text. Destinations are `href (count)` joined with
    /// `; `, pages joined with `; `.
    pub fn to_csv(result: &AnalysisResult) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["Anchor Text", "Count", "Destinations", "Pages"])?;

        for anchor in &result.anchors {
            let destinations = anchor
                .destinations
                .iter()
                .map(|d| format!("{} ({})", d.href, d.count))
                .collect::<Vec<_>>()
                .join("; ");
            writer.write_record([
                anchor.text.as_str(),
                anchor.count.to_string().as_str(),
                destinations.as_str(),
                anchor.pages.join("; ").as_str(),
            ])?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush CSV: {}", e.error()))?;
        Ok(String::from_utf8(bytes)?)
    }

    pub fn to_text(result: &AnalysisResult) -> Result<String> {
        let mut out = String::new();
        Self::write_text(&mut out, result)?;
        Ok(out)
    }

    fn write_text(out: &mut impl fmt::Write, result: &AnalysisResult) -> fmt::Result {
        let insights = &result.insights;

        writeln!(out, "Anchor Text Report")?;
        writeln!(out, "{}", "=".repeat(60))?;
        writeln!(out, "Site: {}", result.url)?;
        writeln!(out, "Analyzed: {}", result.analyzed_at)?;
        writeln!(out)?;
        writeln!(out, "Summary")?;
        writeln!(out, "  Pages crawled:        {}", insights.pages_crawled)?;
        writeln!(out, "  Pages with errors:    {}", insights.pages_with_errors)?;
        writeln!(out, "  Total anchors:        {}", insights.total_anchors)?;
        writeln!(out, "  Unique anchor texts:  {}", insights.unique_anchor_texts)?;
        writeln!(out, "  Unique destinations:  {}", insights.unique_destinations)?;
        writeln!(out, "  Internal links:       {}", insights.internal_links)?;
        writeln!(out, "  External links:       {}", insights.external_links)?;
        writeln!(out, "  Nofollow links:       {}", insights.nofollow_links)?;
        writeln!(out, "  Empty anchors:        {}", insights.empty_anchors)?;
        writeln!(out, "  Generic anchors:      {}", insights.generic_anchors)?;
        writeln!(out, "  Avg links per page:   {:.2}", insights.average_links_per_page)?;

        if !result.anchors.is_empty() {
            writeln!(out)?;
            writeln!(out, "Anchors")?;
            for anchor in &result.anchors {
                writeln!(out, "  {:>5}  {}", anchor.count, anchor.text)?;
                for destination in &anchor.destinations {
                    writeln!(out, "         -> {} ({})", destination.href, destination.count)?;
                }
            }
        }

        let failed: Vec<_> = result.crawled_pages.iter().filter(|p| !p.is_ok()).collect();
        if !failed.is_empty() {
            writeln!(out)?;
            writeln!(out, "Pages with errors")?;
            for page in failed {
                writeln!(
                    out,
                    "  {}: {}",
                    page.url,
                    page.error.as_deref().unwrap_or("unknown error")
                )?;
            }
        }

        if !result.pages_with_no_links.is_empty() {
            writeln!(out)?;
            writeln!(out, "Pages with no links")?;
            for url in &result.pages_with_no_links {
                writeln!(out, "  {}", url)?;
            }
        }

        Ok(())
    }

    pub fn print_text_report(result: &AnalysisResult) {
        let insights = &result.insights;

        println!("\n{}", "=".repeat(80).bright_blue());
        println!("{}", "Anchor Cloud - Report".bright_cyan().bold());
        println!("{}", "=".repeat(80).bright_blue());
        println!();
        println!("{}: {}", "Site".bright_white().bold(), result.url);
        println!("{}: {}", "Analyzed".bright_white().bold(), result.analyzed_at);
        println!();

        println!("{}", "Summary".bright_yellow().bold().underline());
        println!(
            "  Pages Crawled:       {}",
            insights.pages_crawled.to_string().bright_green()
        );
        println!(
            "  Pages With Errors:   {}",
            if insights.pages_with_errors > 0 {
                insights.pages_with_errors.to_string().bright_red()
            } else {
                insights.pages_with_errors.to_string().bright_green()
            }
        );
        println!(
            "  Total Anchors:       {}",
            insights.total_anchors.to_string().bright_green()
        );
        println!(
            "  Unique Texts:        {}",
            insights.unique_anchor_texts.to_string().bright_green()
        );
        println!(
            "  Internal / External: {} / {}",
            insights.internal_links.to_string().bright_green(),
            insights.external_links.to_string().bright_cyan()
        );
        println!(
            "  Generic Anchors:     {}",
            if insights.generic_anchors > 0 {
                insights.generic_anchors.to_string().yellow()
            } else {
                insights.generic_anchors.to_string().bright_green()
            }
        );
        println!(
            "  Empty Anchors:       {}",
            if insights.empty_anchors > 0 {
                insights.empty_anchors.to_string().yellow()
            } else {
                insights.empty_anchors.to_string().bright_green()
            }
        );
        println!();

        if !insights.top_anchors.is_empty() {
            println!("{}", "Top Anchors".bright_yellow().bold().underline());
            for top in &insights.top_anchors {
                println!("  {:>5}  {}", top.count.to_string().bright_green(), top.text);
            }
            println!();
        }

        let failed: Vec<_> = result.crawled_pages.iter().filter(|p| !p.is_ok()).collect();
        if !failed.is_empty() {
            println!("{}", "Pages With Errors".bright_yellow().bold().underline());
            for page in failed {
                println!(
                    "  [{}] {} {}",
                    "ERROR".bright_red(),
                    page.url,
                    page.error.as_deref().unwrap_or("").dimmed()
                );
            }
            println!();
        }

        if !result.pages_with_no_links.is_empty() {
            println!("{}", "Pages With No Links".bright_yellow().bold().underline());
            for url in &result.pages_with_no_links {
                println!("  [{}] {}", "WARN ".yellow(), url);
            }
            println!();
        }

        println!("{}", "=".repeat(80).bright_blue());
    }

    pub fn save(result: &AnalysisResult, format: ExportFormat, filename: &str) -> Result<()> {
        let contents = Self::render(result, format)?;
        let mut file = File::create(filename)?;
        file.write_all(contents.as_bytes())?;
        println!("Report saved to: {}", filename.bright_green());
        Ok(())
    }
}
