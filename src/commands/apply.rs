use anyhow::{Context as _, Result};
use colored::Colorize;
use deployplan::{AutoConfirm, ConfirmCallback, ExecuteOptions, ExecutionResult, PlanExecutor};
use netprobe::{ServiceValidator, UreqBackend};
use stackenv::LogSink;
use std::path::PathBuf;
use std::time::Duration;

use crate::Context;
use crate::cli::ApplyArgs;
use crate::commands::plan;
use crate::config::StackConfig;
use crate::progress::{DialoguerConfirm, TerminalProgress};
use crate::runner::ShellRunner;
use crate::ui;

pub fn run(ctx: &Context, args: ApplyArgs) -> Result<()> {
    let config = StackConfig::load(ctx.config.as_deref())?;
    let env = stackenv::detect();

    let mut request = plan::resolve_request(&config, &args.plan)?;
    if args.dry_run {
        request.options.dry_run = Some(true);
    }
    if args.continue_on_error {
        request.options.stop_on_error = Some(false);
    }

    let plan = plan::build_plan(&config, &env, &request)?;
    let options = request.execute_options(&ExecuteOptions::default());
    let total = plan.tasks().count();

    if !args.plan.json {
        plan::print_plan(&plan, &env);
    }

    if options.dry_run {
        if !args.plan.json {
            ui::warn("Dry run: tasks are recorded as simulated, nothing is executed");
        }
    } else {
        let mut confirm: Box<dyn ConfirmCallback> = if args.yes {
            Box::new(AutoConfirm)
        } else {
            Box::new(DialoguerConfirm)
        };
        let prompt = format!("Execute {total} tasks for client {}?", plan.client_id);
        if !confirm.confirm(&prompt)? {
            ui::info("Cancelled.");
            return Ok(());
        }
    }

    let settings = config.probe_settings();
    let validator = ServiceValidator::new(
        UreqBackend::new(&settings),
        config.host_map(&env)?,
        settings,
        LogSink::new("netprobe"),
    );
    let workdir = config
        .execution
        .workdir
        .as_deref()
        .map(|dir| PathBuf::from(shellexpand::tilde(dir).as_ref()));
    let runner = ShellRunner::new(validator, config.services())
        .with_timeout(Duration::from_secs(config.execution.timeout_secs))
        .with_workdir(workdir);

    let progress = TerminalProgress::new(total, ctx.quiet || args.plan.json);
    let mut executor = PlanExecutor::new(runner, LogSink::new("executor")).with_progress(progress);
    let result = executor.execute(plan, &options);
    let (_, _, progress) = executor.into_parts();
    progress.finish();

    if let Some(path) = &args.save {
        let json = serde_json::to_string_pretty(&result.plan)?;
        std::fs::write(path, json)
            .with_context(|| format!("Could not write plan to {}", path.display()))?;
        if !args.plan.json {
            ui::dim(&format!("Plan saved to {}", path.display()));
        }
    }

    if args.plan.json {
        ui::json(&result)?;
    } else {
        print_summary(&result, options.dry_run);
    }

    if !result.success {
        anyhow::bail!("{}", result.message);
    }
    Ok(())
}

fn print_summary(result: &ExecutionResult, dry_run: bool) {
    let summary = result.plan.summary();

    println!();
    if result.success && dry_run {
        println!("  {} Dry run complete, nothing was executed", ui::check_mark(true).bold());
    } else if result.success {
        println!("  {} {}", ui::check_mark(true).bold(), result.message);
    } else {
        println!("  {} {}", "⚠".yellow().bold(), result.message);
    }

    if summary.simulated > 0 {
        println!("    • {} tasks simulated", summary.simulated);
    }
    if summary.completed > 0 {
        println!("    • {} tasks completed", summary.completed);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "tasks".red());
    }
    if summary.pending > 0 {
        println!("    • {} tasks not run", summary.pending);
    }
}
