use anyhow::Result;
use colored::Colorize;

use crate::Context;
use crate::config::StackConfig;
use crate::ui;

pub fn run(ctx: &Context, url: &str, json: bool) -> Result<()> {
    let config = StackConfig::load(ctx.config.as_deref())?;
    let env = stackenv::detect();
    let diagnostics = netprobe::diagnose(url, &env, &config.host_map(&env)?)?;

    if json {
        return ui::json(&diagnostics);
    }

    ui::header("Network diagnostics");
    ui::kv("URL", &diagnostics.url);
    ui::kv("Mapped to", &diagnostics.normalized_url);
    ui::kv("Environment", &diagnostics.environment.describe());
    ui::kv(
        "Redirects",
        if diagnostics.ignore_redirects {
            "kept on this host"
        } else {
            "followed"
        },
    );

    let dns = &diagnostics.dns_resolution;
    if dns.success {
        ui::kv("Resolves to", &dns.addresses.join(", ").green().to_string());
    } else {
        ui::kv(
            "Resolves to",
            &dns.error.as_deref().unwrap_or("nothing").red().to_string(),
        );
    }
    println!();
    Ok(())
}
