use anyhow::Result;

use super::{Deployment, check_operations, print_problems};
use crate::Context;
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    let deployment = Deployment::load(ctx)?;
    let manager = deployment.manager()?;

    let notification = check_operations(&manager);
    if notification.has_errors() {
        print_problems(&notification);
        anyhow::bail!(
            "{} has {} invalid step(s)",
            deployment.path.display(),
            notification.errors().len()
        );
    }

    ui::success(&format!(
        "{} is valid: {} server(s), {} local and {} remote sequence(s)",
        deployment.path.display(),
        deployment.config.servers.len(),
        manager.local_sequences().len(),
        manager.remote_sequences().len()
    ));
    Ok(())
}
