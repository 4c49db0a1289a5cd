//! Display formatting for CLI output
//!
//! Provides human-readable output for:
//! - Single pod reports with their field diffs
//! - Batch tables for pods and policies, with an error marker per failed row
//! - Policy summaries
//!
//! JSON output shares the same data; everything writes to a caller-supplied
//! writer so stdout stays free of log output.

use console::{StyledObject, style};
use pspmigrator_core::{PodMutation, PolicyAnalysis};
use serde::Serialize;
use std::io::{self, Write};

use crate::commands::mutating::{PodBatch, PolicyRow, RowOutcome};
use crate::error::Result;

/// Marker shown in place of a result when a row could not be checked
const ERROR_MARKER: &str = "error";

/// Write a value as pretty-printed JSON
pub fn json(out: &mut impl Write, value: &impl Serialize) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Report for a single pod, followed by its policy's mutating fields
pub fn pod_report(out: &mut impl Write, report: &PodMutation) -> io::Result<()> {
    let Some(policy) = report.policy.as_deref() else {
        return writeln!(
            out,
            "Pod {} in namespace {} is not bound to a PodSecurityPolicy",
            style(&report.pod).bold(),
            report.namespace
        );
    };

    writeln!(
        out,
        "Pod {} is mutated by PSP {}: {}",
        style(&report.pod).bold(),
        style(policy).cyan(),
        mutated_style(report.mutated, &report.mutated.to_string())
    )?;

    for diff in &report.diff {
        writeln!(out, "  {} {}", style("-").dim(), diff)?;
    }

    if let Some(analysis) = &report.analysis {
        policy_summary(out, analysis)?;
    }

    Ok(())
}

/// One-line summary of a policy's mutating fields and annotations
pub fn policy_summary(out: &mut impl Write, analysis: &PolicyAnalysis) -> io::Result<()> {
    writeln!(
        out,
        "PSP profile {} has the following mutating fields: {} and annotations: {}",
        style(&analysis.policy).cyan(),
        bracketed(&analysis.field_names()),
        bracketed(&analysis.annotation_keys())
    )
}

/// Table of every policy-bound pod
pub fn pod_table(out: &mut impl Write, batch: &PodBatch) -> io::Result<()> {
    writeln!(out, "There are {} pods in the cluster", batch.total)?;

    if batch.pods.is_empty() {
        return writeln!(out, "No pods are bound to a PodSecurityPolicy");
    }

    let name_width = column_width("NAME", batch.pods.iter().map(|r| r.name.len()));
    let ns_width = column_width("NAMESPACE", batch.pods.iter().map(|r| r.namespace.len()));
    let mutated_width = column_width("MUTATED", [ERROR_MARKER.len()]);

    writeln!(
        out,
        "{:<name_width$}{:<ns_width$}{:<mutated_width$}{}",
        style("NAME").bold(),
        style("NAMESPACE").bold(),
        style("MUTATED").bold(),
        style("PSP").bold()
    )?;

    for row in &batch.pods {
        let mutated = match &row.outcome {
            RowOutcome::Checked(status) => mutated_style(status.mutated, &status.mutated.to_string()),
            RowOutcome::Error { .. } => style(ERROR_MARKER.to_string()).red(),
        };

        writeln!(
            out,
            "{:<name_width$}{:<ns_width$}{:<mutated_width$}{}",
            row.name, row.namespace, mutated, row.policy
        )?;
    }

    let failed = batch.pods.iter().filter(|r| r.outcome.is_error()).count();
    if failed > 0 {
        writeln!(out)?;
        writeln!(
            out,
            "{} pod(s) could not be checked, see the warnings on stderr",
            style(failed).red()
        )?;
    }

    Ok(())
}

/// Table of every policy with its mutating fields
pub fn policy_table(out: &mut impl Write, rows: &[PolicyRow]) -> io::Result<()> {
    if rows.is_empty() {
        return writeln!(out, "No PodSecurityPolicies found in the cluster");
    }

    let name_width = column_width("NAME", rows.iter().map(|r| r.name.len()));
    let mutating_width = column_width("MUTATING", [ERROR_MARKER.len()]);

    writeln!(
        out,
        "{:<name_width$}{:<mutating_width$}{}",
        style("NAME").bold(),
        style("MUTATING").bold(),
        style("FIELDS / ANNOTATIONS").bold()
    )?;

    for row in rows {
        match &row.outcome {
            RowOutcome::Checked(analysis) => {
                let mut sources = analysis.field_names();
                sources.extend(analysis.annotation_keys());
                let sources = if sources.is_empty() {
                    "-".to_string()
                } else {
                    sources.join(", ")
                };

                writeln!(
                    out,
                    "{:<name_width$}{:<mutating_width$}{}",
                    row.name,
                    mutated_style(analysis.is_mutating(), &analysis.is_mutating().to_string()),
                    sources
                )?;
            }
            RowOutcome::Error { error } => {
                writeln!(
                    out,
                    "{:<name_width$}{:<mutating_width$}{}",
                    row.name,
                    style(ERROR_MARKER.to_string()).red(),
                    style(error).dim()
                )?;
            }
        }
    }

    Ok(())
}

fn mutated_style(mutated: bool, text: &str) -> StyledObject<String> {
    if mutated {
        style(text.to_string()).yellow()
    } else {
        style(text.to_string()).green()
    }
}

fn bracketed(items: &[&str]) -> String {
    format!("[{}]", items.join(", "))
}

/// Width of a left-aligned column including two spaces of gutter
fn column_width(header: &str, cells: impl IntoIterator<Item = usize>) -> usize {
    cells.into_iter().fold(header.len(), usize::max) + 2
}
