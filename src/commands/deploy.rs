use anyhow::{Context as _, Result};
use colored::Colorize;
use dialoguer::Confirm;
use sequencing::{CancellationToken, RunSettings, RunSummary};

use super::{Deployment, check_operations, print_problems, server_order, warn_if_ambiguous};
use crate::Context;
use crate::cli::DeployArgs;
use crate::paths;
use crate::reporter::{RunLog, TerminalReporter};
use crate::ui;

pub fn run(ctx: &Context, args: DeployArgs) -> Result<()> {
    let deployment = Deployment::load(ctx)?;
    let options = args.rollout.options();
    warn_if_ambiguous(options);

    let manager = deployment.manager()?;
    let notification = check_operations(&manager);
    if notification.has_errors() {
        print_problems(&notification);
        anyhow::bail!(
            "Deployment has {} invalid step(s); nothing was executed",
            notification.errors().len()
        );
    }

    let path = deployment.path.clone();
    let settings = deployment.into_settings(options);
    let order = server_order(&settings)?;

    ui::header("Deployment");
    ui::kv("File", &path.display().to_string());
    ui::kv("Load balancer", &describe_balancer(&settings));
    ui::kv("Servers", &ui::list(&order));

    if !args.yes {
        let confirmed = Confirm::new()
            .with_prompt("Start deployment?")
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;
        if !confirmed {
            ui::info("Deployment aborted");
            return Ok(());
        }
    }

    let token = CancellationToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || {
        handler_token.cancel();
        eprintln!("\nCancelling after the current step...");
    })
    .context("Failed to install Ctrl-C handler")?;

    let mut reporter = TerminalReporter::new(ctx.quiet);
    match paths::runs_dir().and_then(|dir| RunLog::create(&dir)) {
        Ok(log) => {
            if ctx.verbose > 0 {
                ui::dim(&format!("Run log: {}", log.path().display()));
            }
            reporter = reporter.with_log(log);
        }
        Err(err) => log::warn!("Run log disabled: {err:#}"),
    }

    let result = manager.execute(&mut reporter, &settings, &token);
    println!();
    if let Some(log_path) = reporter.log_path() {
        ui::dim(&format!("Run log: {}", log_path.display()));
    }

    match result {
        Ok(summary) => {
            print_summary(&summary);
            Ok(())
        }
        Err(err) if err.is_cancelled() || token.is_cancelled() => {
            ui::warn("Deployment cancelled");
            print_offline(&settings);
            Err(err).context("Deployment cancelled")
        }
        Err(err) => {
            ui::error("Deployment failed");
            print_offline(&settings);
            Err(err.into())
        }
    }
}

fn describe_balancer(settings: &RunSettings) -> String {
    match &settings.load_balancer {
        Some(lb) => format!("{} ({})", lb.provider, lb.mode),
        None => "none".to_string(),
    }
}

fn print_summary(summary: &RunSummary) {
    ui::success(&format!(
        "Deployed to {} server(s)",
        summary.deployed.len().to_string().bold()
    ));
    ui::kv("Local sequences", &summary.local_sequences.to_string());
    ui::kv("Deployed", &ui::list(&summary.deployed));
    if !summary.held.is_empty() {
        ui::kv("Held by load balancer", &ui::list(&summary.held));
    }
    if !summary.left_offline.is_empty() {
        ui::kv("Left offline", &ui::list(&summary.left_offline));
        ui::info("Run again with --continue-after-marked-server to finish the rollout.");
    }
}

fn print_offline(settings: &RunSettings) {
    let offline: Vec<String> = settings
        .servers
        .iter()
        .filter(|server| !server.is_online())
        .map(|server| server.name.clone())
        .collect();
    if !offline.is_empty() {
        ui::warn(&format!(
            "Out of rotation in load balancer: {}",
            offline.join(", ")
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use balancer::LoadBalancerConfig;
    use sequencing::ServerTarget;

    #[test]
    fn test_describe_balancer() {
        let settings = RunSettings::new(vec![ServerTarget::new("a")]);
        assert_eq!(describe_balancer(&settings), "none");

        let settings = settings.with_load_balancer(LoadBalancerConfig::new("http").with_mode("round-robin"));
        assert_eq!(describe_balancer(&settings), "http (round-robin)");
    }
}
