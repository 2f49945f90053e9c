use anyhow::Result;

use crate::Context;
use crate::ui;

pub fn run(_ctx: &Context, json: bool) -> Result<()> {
    let env = stackenv::detect();
    if json {
        return ui::json(&env);
    }

    ui::header("Environment");
    ui::kv("Kind", &env.kind.to_string());
    ui::kv("Host address", &env.host_address);
    ui::kv("Docker", &env.docker.to_string());
    if let Some(distro) = &env.distro {
        ui::kv("Distribution", distro);
    }
    ui::kv("Windows paths", if env.uses_windows_paths() { "yes" } else { "no" });
    if let Some(loopback) = env.loopback_replacement() {
        ui::kv("localhost ->", loopback);
    }
    println!();
    Ok(())
}
