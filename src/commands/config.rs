use anyhow::Result;

use crate::Context;
use crate::cli::ConfigCommand;
use crate::config::StackConfig;
use crate::ui;

pub fn run(ctx: &Context, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => show(ctx),
        ConfigCommand::Path => path(ctx),
        ConfigCommand::Validate => validate(ctx),
    }
}

fn show(ctx: &Context) -> Result<()> {
    let config = StackConfig::load(ctx.config.as_deref())?;
    print!("{}", config.to_toml()?);
    Ok(())
}

fn path(ctx: &Context) -> Result<()> {
    let path = StackConfig::resolve_path(ctx.config.as_deref())?;
    println!("{}", path.display());
    if !path.exists() && !ctx.quiet {
        ui::dim("(not created yet; built-in defaults apply)");
    }
    Ok(())
}

fn validate(ctx: &Context) -> Result<()> {
    let path = StackConfig::resolve_path(ctx.config.as_deref())?;
    let config = StackConfig::load_from(&path)?;
    config.validate()?;
    ui::outcome(true, &format!("{} is valid", path.display()));
    Ok(())
}
