use anyhow::Result;

use super::{Deployment, check_operations, print_problems, server_order, warn_if_ambiguous};
use crate::Context;
use crate::cli::RolloutArgs;
use crate::reporter::TerminalReporter;
use crate::ui;

pub fn run(ctx: &Context, args: RolloutArgs) -> Result<()> {
    let deployment = Deployment::load(ctx)?;
    let options = args.options();
    warn_if_ambiguous(options);

    let manager = deployment.manager()?;
    let notification = check_operations(&manager);
    let settings = deployment.into_settings(options);

    ui::header("Deployment plan");
    ui::kv("Balancer mode", &manager.mode().to_string());
    ui::kv("Rollout order", &ui::list(&server_order(&settings)?));

    // Plans print regardless of --quiet
    manager.dry_run(&settings, &mut TerminalReporter::new(false));

    if notification.has_errors() {
        println!();
        print_problems(&notification);
        anyhow::bail!("Deployment has {} invalid step(s)", notification.errors().len());
    }
    Ok(())
}
