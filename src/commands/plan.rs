use anyhow::{Context as _, Result};
use chrono::Local;
use deployplan::{DeploymentPlan, PlanRequest};
use stackenv::Environment;
use std::io::Read;

use crate::Context;
use crate::cli::PlanArgs;
use crate::config::StackConfig;
use crate::ui;

pub fn run(ctx: &Context, args: PlanArgs) -> Result<()> {
    let config = StackConfig::load(ctx.config.as_deref())?;
    let env = stackenv::detect();

    let request = resolve_request(&config, &args)?;
    let plan = build_plan(&config, &env, &request)?;

    if args.json {
        ui::json(&plan)
    } else {
        print_plan(&plan, &env);
        Ok(())
    }
}

/// Turn command-line inputs (or a request file) into a plan request
pub fn resolve_request(config: &StackConfig, args: &PlanArgs) -> Result<PlanRequest> {
    let mut request = match &args.request {
        Some(path) => {
            let json = if path.as_os_str() == "-" {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .context("Could not read plan request from stdin")?;
                buf
            } else {
                std::fs::read_to_string(path)
                    .with_context(|| format!("Could not read plan request: {}", path.display()))?
            };
            PlanRequest::from_json(&json).context("Invalid plan request JSON")?
        }
        None => {
            let client_id = args
                .client_id
                .clone()
                .or_else(|| config.defaults.client_id.clone())
                .context("No client id given (pass one or set [defaults] client_id)")?;
            let components = if args.components.is_empty() {
                config.defaults.components.clone()
            } else {
                args.components.clone()
            };
            if components.is_empty() {
                anyhow::bail!("No components given (use -c or set [defaults] components)");
            }
            PlanRequest::new(client_id, components)
        }
    };

    if args.no_tdd {
        request.options.tdd_compliance = Some(false);
    }
    if args.no_integration {
        request.options.mcp_integration = Some(false);
    }
    if args.no_web_validation {
        request.options.validate_web_service = Some(false);
    }

    Ok(request)
}

pub fn build_plan(
    config: &StackConfig,
    env: &Environment,
    request: &PlanRequest,
) -> Result<DeploymentPlan> {
    let options = request.plan_options(&config.plan_options());
    let builder = config.plan_builder(env.clone())?;

    builder
        .build(&request.client_id, &request.components, &options)
        .map_err(|e| {
            let hint = e.category().advice();
            anyhow::anyhow!(e).context(format!("Could not build deployment plan ({hint})"))
        })
}

pub fn print_plan(plan: &DeploymentPlan, env: &Environment) {
    ui::header(&plan.name);
    ui::kv("Client", &plan.client_id);
    ui::kv("Components", &plan.components.join(", "));
    ui::kv("Charter", &format!("v{}", plan.charter_version));
    ui::kv("TDD", if plan.tdd_compliance { "yes" } else { "no" });
    ui::kv("Environment", &env.describe());
    ui::kv(
        "Created",
        &plan
            .created_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
    );

    for phase in &plan.phases {
        ui::phase(phase.name, phase.tasks.len());
        if phase.tasks.is_empty() {
            ui::dim("nothing to do");
            continue;
        }
        for task in &phase.tasks {
            ui::task(task);
            ui::dim(&format!("  {}", task.action()));
        }
    }
    println!();
}
