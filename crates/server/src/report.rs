//! Report rendering
//!
//! The default renderer writes Markdown. A styled document renderer can be
//! swapped in through [`ReportRenderer`].

use crate::artifacts::SummaryRecord;
use std::fmt::{self, Write};

/// Turns a job summary into a report document
pub trait ReportRenderer: Send + Sync {
    /// File name under the job's artifact directory
    fn file_name(&self) -> &'static str;

    /// MIME type served for the report
    fn content_type(&self) -> &'static str;

    fn render(&self, record: &SummaryRecord) -> Vec<u8>;
}

/// Plain Markdown report
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownReport;

impl ReportRenderer for MarkdownReport {
    fn file_name(&self) -> &'static str {
        "report.md"
    }

    fn content_type(&self) -> &'static str {
        "text/markdown; charset=utf-8"
    }

    fn render(&self, record: &SummaryRecord) -> Vec<u8> {
        let mut out = String::new();
        // Writing into a String cannot fail
        let _ = write_markdown(&mut out, record);
        out.into_bytes()
    }
}

fn write_markdown(out: &mut String, record: &SummaryRecord) -> fmt::Result {
    let t = &record.terrain;
    let s = &record.results;
    writeln!(out, "# Wetland Benefit Calculator Report\n")?;

    let mut subtitle = format!("Wetland: {}", record.wetland_name);
    if let Some(user) = &record.user_name {
        write!(subtitle, " | Analyst: {user}")?;
    }
    write!(subtitle, " | Date: {}", record.generated_at.format("%Y-%m-%d"))?;
    writeln!(out, "{subtitle}\n")?;

    writeln!(out, "## Terrain\n")?;
    writeln!(out, "| Metric | Value |")?;
    writeln!(out, "|---|---:|")?;
    writeln!(out, "| Wetland area (ha) | {:.2} |", t.area_hectares)?;
    writeln!(out, "| Catchment area (ha) | {:.2} |", t.catchment_hectares)?;
    writeln!(out, "| Average slope (°) | {:.2} |", t.average_slope)?;
    writeln!(out, "| Max slope (°) | {:.2} |", t.max_slope)?;
    writeln!(out, "| Mean LS factor | {:.3} |", t.mean_ls_factor)?;
    writeln!(out, "| Cell size (m) | {:.1} |", t.cell_size)?;
    if let Some(crs) = &t.crs {
        writeln!(out, "| Working CRS | {crs} |")?;
    }

    writeln!(out, "\n## Before and after restoration\n")?;
    writeln!(out, "| Metric | Before | After | Reduction |")?;
    writeln!(out, "|---|---:|---:|---:|")?;
    let rows = [
        (
            "Soil loss (t/yr)",
            s.before.soil_loss_tonnes,
            s.after.soil_loss_tonnes,
            s.soil_loss_reduction_tonnes,
        ),
        (
            "Delivered sediment (t/yr)",
            s.before.delivered_sediment_tonnes,
            s.after.delivered_sediment_tonnes,
            s.sediment_reduction_tonnes,
        ),
        (
            "Nitrogen (kg/yr)",
            s.before.nitrogen_load_kg,
            s.after.nitrogen_load_kg,
            s.nitrogen_reduction_kg,
        ),
        (
            "Phosphorus (kg/yr)",
            s.before.phosphorus_load_kg,
            s.after.phosphorus_load_kg,
            s.phosphorus_reduction_kg,
        ),
    ];
    for (name, before, after, reduction) in rows {
        writeln!(out, "| {name} | {before:.2} | {after:.2} | {reduction:.2} |")?;
    }

    let e = &record.inputs.efficiencies;
    writeln!(
        out,
        "\nAfter-restoration loads are net of wetland retention (sediment {:.0}%, nitrogen {:.0}%, phosphorus {:.0}%).",
        e.sediment * 100.0,
        e.nitrogen * 100.0,
        e.phosphorus * 100.0
    )?;
    if s.sediment_reduction_tonnes < 0.0 {
        writeln!(
            out,
            "\nThe after scenario exports more sediment than the current state."
        )?;
    }

    writeln!(
        out,
        "\n_Generated from job ID {}. See JSON summary: summary.json_",
        record.job_id
    )?;

    Ok(())
}
