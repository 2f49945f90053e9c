use anyhow::Result;
use colored::Colorize;
use netprobe::{CandidateUrl, ServiceTarget, ServiceValidator, UreqBackend, ValidationReport};
use stackenv::LogSink;

use crate::Context;
use crate::cli::ProbeArgs;
use crate::config::StackConfig;
use crate::ui;

pub fn run(ctx: &Context, args: ProbeArgs) -> Result<()> {
    let config = StackConfig::load(ctx.config.as_deref())?;
    let env = stackenv::detect();

    let target = match config.service(&args.service) {
        Some(target) => target,
        None if !args.urls.is_empty() => ServiceTarget::new(args.service.clone()),
        None => anyhow::bail!(
            "Unknown service '{0}' (add [services.{0}] to the config or pass --url)",
            args.service
        ),
    };
    let candidates = candidates(&target, &args)?;

    let settings = config.probe_settings();
    let mut validator = ServiceValidator::new(
        UreqBackend::new(&settings),
        config.host_map(&env)?,
        settings,
        LogSink::new("netprobe"),
    );

    if !ctx.quiet && !args.json {
        ui::info(&format!("Probing {} from {}", target.name, env.describe()));
    }
    let report = validator.probe(&target, &candidates);

    if args.json {
        ui::json(&report)?;
    } else {
        print_report(&report, ctx.verbose > 0);
    }

    if !report.success {
        anyhow::bail!("{} is not reachable on any candidate URL", report.target);
    }
    Ok(())
}

/// `--url` overrides replace the configured candidates
fn candidates(target: &ServiceTarget, args: &ProbeArgs) -> Result<Vec<CandidateUrl>> {
    let list = if args.urls.is_empty() {
        target.candidates.clone()
    } else {
        args.urls
            .iter()
            .map(|url| CandidateUrl::parse(url))
            .collect::<Result<Vec<_>, _>>()?
    };

    Ok(list
        .into_iter()
        .map(|c| {
            let ignore = c.ignore_redirects || args.ignore_redirects;
            c.ignoring_redirects(ignore)
        })
        .collect())
}

fn print_report(report: &ValidationReport, show_content: bool) {
    ui::header(&format!("Validation: {}", report.target));

    for attempt in &report.attempts {
        println!("  {} {}", ui::check_mark(attempt.succeeded()), attempt.url);

        if attempt.normalized_url != attempt.url {
            ui::dim(&format!("  via {}", attempt.normalized_url));
        }
        if let Some(code) = attempt.status_code {
            ui::dim(&format!("  HTTP {code}"));
        }
        if let Some(title) = &attempt.title {
            ui::dim(&format!("  title: {title}"));
        }
        if attempt.ok && !attempt.is_target_service {
            ui::dim(&format!("  response is not {}", report.target));
        }
        if show_content && !attempt.content_sample.is_empty() {
            ui::dim(&format!("  {}", attempt.content_sample.replace('\n', " ")));
        }
        if let Some(error) = &attempt.error {
            println!("      {}", error.red());
        }
        if let Some(secondary) = &attempt.secondary {
            let state = match (secondary.ok, secondary.markers_found) {
                (true, true) => "ok".green(),
                (true, false) => "reachable, markers missing".yellow(),
                (false, _) => "unreachable".red(),
            };
            println!("    {} {} {state}", "↳".dimmed(), secondary.url);
        }
    }

    println!();
    match report.successful_attempt() {
        Some(attempt) => {
            ui::outcome(true, &format!("{} reachable at {}", report.target, attempt.url));
        }
        None => ui::outcome(false, &format!("{} not reachable", report.target)),
    }
}
