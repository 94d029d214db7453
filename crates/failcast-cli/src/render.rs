//! Terminal rendering of assessments, job lists and failure analyses

use colored::{Color, ColoredString, Colorize};
use failcast_core::{BatchEntry, FailcastError, FailureAnalysis};
use failcast_model::{
    AssessmentSource, Dimension, EffortCategory, JobConfig, Probability, RiskAssessment, Severity,
};
use std::fmt::Write;

const RULE_WIDTH: usize = 80;

/// Color for a probability: `>= 70` red, `>= 40` yellow, otherwise green
pub(crate) fn probability_color(value: f64) -> Color {
    if value >= 70.0 {
        Color::Red
    } else if value >= 40.0 {
        Color::Yellow
    } else {
        Color::Green
    }
}

pub(crate) fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Critical => Color::Red,
        Severity::High => Color::Yellow,
        Severity::Medium => Color::Cyan,
        Severity::Low => Color::Green,
    }
}

fn probability(p: Probability) -> ColoredString {
    p.to_string().color(probability_color(p.value())).bold()
}

fn severity(s: Severity) -> ColoredString {
    s.as_str().color(severity_color(s)).bold()
}

fn rule(c: char) -> String {
    c.to_string().repeat(RULE_WIDTH)
}

fn effort_name(category: EffortCategory) -> &'static str {
    match category {
        EffortCategory::Simple => "SIMPLE",
        EffortCategory::Medium => "MEDIUM",
        EffortCategory::Complex => "COMPLEX",
    }
}

/// Main menu: one entry per job, then analysis and exit
pub(crate) fn format_menu(jobs: &[JobConfig]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n{}", rule('='));
    let _ = writeln!(out, "{}", "Job Failure Prediction".cyan().bold());
    let _ = writeln!(out, "{}", rule('='));
    let _ = writeln!(out, "\nAvailable jobs:");
    for (i, job) in jobs.iter().enumerate() {
        let _ = writeln!(out, "  {}. {}", i + 1, job.job_name.bold());
        if !job.description.is_empty() {
            let _ = writeln!(out, "     {}", job.description);
        }
        if !job.schedule.is_empty() {
            let _ = writeln!(out, "     Schedule: {}", job.schedule.dimmed());
        }
    }
    let _ = writeln!(out, "\n  {}. Analyze Historical Failures", jobs.len() + 1);
    let _ = writeln!(out, "  {}. Exit", jobs.len() + 2);
    out
}

/// Tabular job list for `failcast list`
pub(crate) fn format_job_list(jobs: &[JobConfig]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<28} {:>6} {:>10} {:>10}  {}",
        "JOB".bold(),
        "CPU".bold(),
        "MEM (GB)".bold(),
        "LIMIT".bold(),
        "SCHEDULE".bold()
    );
    for job in jobs {
        let _ = writeln!(
            out,
            "{:<28} {:>6.1} {:>10.1} {:>10.1}  {}",
            job.job_name,
            job.resources.cpu_request,
            job.resources.memory_request_gb,
            job.resources.memory_limit_gb,
            job.schedule
        );
    }
    out
}

/// Full report for one assessment
pub(crate) fn format_assessment(assessment: &RiskAssessment) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n{}", rule('='));
    let _ = writeln!(
        out,
        "{} {}",
        "Failure prediction for".bold(),
        assessment.job_name.cyan().bold()
    );
    let source = match &assessment.source {
        AssessmentSource::Heuristic => "heuristic rules".to_string(),
        AssessmentSource::ReasoningService { model } => format!("reasoning service ({model})"),
    };
    let _ = writeln!(out, "Source: {}", source.dimmed());
    let _ = writeln!(out, "{}", rule('='));

    if assessment.confidence.low_historical_confidence {
        let _ = writeln!(
            out,
            "{} only {} historical run(s); assessment is based mostly on configuration",
            "Low confidence:".yellow().bold(),
            assessment.confidence.history_records
        );
    }

    for dimension in Dimension::ALL {
        let Some(d) = assessment.dimension(dimension) else {
            continue;
        };
        let _ = writeln!(out, "\n{}", dimension.title().bold().underline());
        let _ = writeln!(out, "  Probability: {}", probability(d.probability));
        let _ = writeln!(out, "  Severity:    {}", severity(d.severity));
        let _ = writeln!(out, "  Root cause:  {}", d.cause);
        if !d.recommendations.is_empty() {
            let _ = writeln!(out, "  Recommendations:");
            for r in &d.recommendations {
                let _ = writeln!(out, "    - {r}");
            }
        }
    }

    let overall = &assessment.overall;
    let _ = writeln!(out, "\n{}", rule('-'));
    let verdict = if overall.should_execute {
        "PROCEED".green().bold()
    } else {
        "DO NOT EXECUTE".red().bold()
    };
    let _ = writeln!(out, "Overall:        {verdict}");
    let _ = writeln!(out, "Severity:       {}", severity(overall.severity));
    let _ = writeln!(out, "Probability:    {}", probability(overall.probability));
    let _ = writeln!(out, "Recommendation: {}", overall.recommendation);

    let effort = &assessment.effort;
    let _ = writeln!(
        out,
        "Effort:         {} ({} story points, {}-{} hours)",
        effort_name(effort.category),
        effort.story_points,
        effort.hour_range.min,
        effort.hour_range.max
    );
    let _ = writeln!(
        out,
        "Confidence:     {:.0}% ({} runs)",
        assessment.confidence.score * 100.0,
        assessment.confidence.history_records
    );
    out
}

/// Local failure summary
pub(crate) fn format_analysis(analysis: &FailureAnalysis) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n{}", rule('='));
    let _ = writeln!(out, "{}", "Historical Failure Analysis".cyan().bold());
    let _ = writeln!(out, "{}", rule('='));

    if analysis.is_empty() {
        let _ = writeln!(
            out,
            "{} across {} recorded runs",
            "No failures".green().bold(),
            analysis.total_runs
        );
        return out;
    }

    let _ = writeln!(
        out,
        "Failures: {} of {} runs",
        analysis.failures.to_string().red().bold(),
        analysis.total_runs
    );

    let _ = writeln!(out, "\nBy job:");
    for (job, n) in &analysis.failures_by_job {
        let _ = writeln!(out, "  {job:<28} {n}");
    }

    let _ = writeln!(out, "\nBy category:");
    for (dimension, n) in &analysis.failures_by_dimension {
        let _ = writeln!(out, "  {:<28} {n}", dimension.title());
    }
    if analysis.unclassified > 0 {
        let _ = writeln!(out, "  {:<28} {}", "Unclassified", analysis.unclassified);
    }

    let _ = writeln!(out, "\nMost common reasons:");
    for (reason, n) in &analysis.common_reasons {
        let _ = writeln!(out, "  {n:>3}x {reason}");
    }

    let _ = writeln!(out, "\nRecent failures:");
    for f in &analysis.recent {
        let _ = writeln!(
            out,
            "  {}  {:<24} {}",
            f.date.format("%Y-%m-%d %H:%M"),
            f.job,
            f.reason.red()
        );
    }
    out
}

/// One line per batch entry
pub(crate) fn format_batch(entries: &[BatchEntry]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<28} {:>12} {:>10}  {}",
        "JOB".bold(),
        "PROBABILITY".bold(),
        "SEVERITY".bold(),
        "DECISION".bold()
    );
    for entry in entries {
        match &entry.outcome {
            Ok(prediction) => {
                let overall = &prediction.assessment.overall;
                let decision = if overall.should_execute {
                    "proceed".green()
                } else {
                    "do not execute".red()
                };
                let _ = writeln!(
                    out,
                    "{:<28} {:>12} {:>10}  {decision}",
                    entry.job_name,
                    probability(overall.probability),
                    severity(overall.severity)
                );
            }
            Err(err) => {
                let _ = writeln!(out, "{:<28} {}", entry.job_name, format_error(err));
            }
        }
    }
    out
}

/// Error line naming the failed stage, and the dimension when known
pub(crate) fn format_error(err: &FailcastError) -> String {
    let stage = format!("[{}]", err.stage()).red().bold();
    match err.dimension() {
        Some(d) => format!("{stage} {err} ({})", d.title()),
        None => format!("{stage} {err}"),
    }
}
