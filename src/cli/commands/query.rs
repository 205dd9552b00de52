use colored::Colorize;

use crate::cli::QueryArgs;
use crate::cli::commands::dates::{parse_since, parse_until};
use crate::cli::output;
use crate::config::audit_config::AuditConfig;
use crate::core::errors::Result;
use crate::core::models::audit_event::{AuditEvent, EventStatus, EventType, Severity};
use crate::core::models::audit_query::AuditQuery;
use crate::core::services::query_service::QueryService;

/// Execute the `nuaa-audit query` command.
///
/// Displays matching events, most recent first unless `--asc` is given.
pub fn execute(config: &AuditConfig, args: &QueryArgs) -> Result<()> {
    let query = build_query(args)?;
    let service = QueryService::new(config);

    let events = if args.all {
        service.query_all_logs_matching(&query)
    } else {
        service.query(&query, None)
    };

    if args.json {
        for event in &events {
            println!("{}", serde_json::to_string(event)?);
        }
        return Ok(());
    }

    if events.is_empty() {
        output::header("nuaa-audit query");
        output::warning("No audit events found");
        if has_filters(args) {
            println!("  Try removing filters to see all events.");
        }
        return Ok(());
    }

    output::header(&format!("nuaa-audit query ({} events)", events.len()));
    println!();

    for event in &events {
        print_event(event);
    }

    Ok(())
}

fn build_query(args: &QueryArgs) -> Result<AuditQuery> {
    let mut query = AuditQuery::new().offset(args.offset);

    if let Some(since) = &args.since {
        query = query.since(parse_since(since)?);
    }
    if let Some(until) = &args.until {
        query = query.until(parse_until(until)?);
    }
    if !args.event_types.is_empty() {
        let types = args
            .event_types
            .iter()
            .map(|t| t.parse::<EventType>())
            .collect::<Result<Vec<_>>>()?;
        query = query.event_types(types);
    }
    if !args.severities.is_empty() {
        let severities = args
            .severities
            .iter()
            .map(|s| s.parse::<Severity>())
            .collect::<Result<Vec<_>>>()?;
        query = query.severities(severities);
    }
    if let Some(user) = &args.user {
        query = query.username(user);
    }
    if let Some(pattern) = &args.resource {
        query = query.resource_path(pattern)?;
    }
    if let Some(action) = &args.action {
        query = query.action(action);
    }
    if let Some(status) = &args.status {
        query = query.status(status.parse()?);
    }
    if let Some(limit) = args.limit {
        query = query.limit(limit);
    }
    if args.asc {
        query = query.ascending();
    }

    Ok(query)
}

fn has_filters(args: &QueryArgs) -> bool {
    !args.event_types.is_empty()
        || !args.severities.is_empty()
        || args.user.is_some()
        || args.resource.is_some()
        || args.action.is_some()
        || args.status.is_some()
        || args.since.is_some()
        || args.until.is_some()
}

/// Print a single event as a formatted row.
fn print_event(event: &AuditEvent) {
    let date = event.timestamp.format("%Y-%m-%d %H:%M:%S");
    let user = event.username.as_deref().unwrap_or("—");
    let target = event
        .resource_path
        .as_deref()
        .or(event.action.as_deref())
        .or(event.description.as_deref())
        .unwrap_or("");

    println!(
        "  {} {} {:<8} {:<28} {:<12} {} {}",
        date.to_string().dimmed(),
        "│".dimmed(),
        format_severity(event.severity),
        event.event_type.as_str(),
        user,
        target,
        format_status(event.status),
    );
}

fn format_severity(severity: Severity) -> String {
    let label = severity.as_str();
    match severity {
        Severity::Debug => label.dimmed().to_string(),
        Severity::Info => label.blue().to_string(),
        Severity::Warning => label.yellow().to_string(),
        Severity::Error => label.red().to_string(),
        Severity::Critical => label.red().bold().to_string(),
    }
}

fn format_status(status: EventStatus) -> String {
    match status {
        EventStatus::Success => String::new(),
        EventStatus::Failure => "failure".red().to_string(),
        EventStatus::Error => "error".red().bold().to_string(),
    }
}
