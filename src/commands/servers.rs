use anyhow::Result;
use colored::Colorize;
use sequencing::{RunSettings, ServerTarget};
use serde::Serialize;
use std::collections::BTreeMap;

use super::{Deployment, server_order, warn_if_ambiguous};
use crate::Context;
use crate::cli::ServersArgs;
use crate::ui;

#[derive(Debug, Serialize)]
struct ServerRow<'a> {
    order: usize,
    name: &'a str,
    host: &'a str,
    farm: &'a str,
    stop_server: bool,
    tags: &'a BTreeMap<String, String>,
}

impl<'a> ServerRow<'a> {
    fn new(order: usize, server: &'a ServerTarget) -> Self {
        Self {
            order,
            name: &server.name,
            host: server.address(),
            farm: &server.load_balancer_farm,
            stop_server: server.stop_server,
            tags: &server.tags,
        }
    }
}

pub fn run(ctx: &Context, args: ServersArgs) -> Result<()> {
    let deployment = Deployment::load(ctx)?;
    let options = args.rollout.options();
    if !args.json {
        warn_if_ambiguous(options);
    }

    let settings = deployment.into_settings(options);
    let order = server_order(&settings)?;
    let rows = rows(&settings, &order);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        ui::info("No servers selected");
        return Ok(());
    }

    ui::header("Servers");
    for row in &rows {
        let marker = if row.stop_server { "*".yellow().to_string() } else { " ".to_string() };
        println!(
            "  {:>2}. {} {:<20} {} {}",
            row.order,
            marker,
            row.name,
            format!("{:<30}", row.host).dimmed(),
            if row.farm.is_empty() { "-" } else { row.farm }
        );
    }
    ui::dim("* marked stop server");
    Ok(())
}

fn rows<'a>(settings: &'a RunSettings, order: &[String]) -> Vec<ServerRow<'a>> {
    order
        .iter()
        .filter_map(|name| settings.server(name))
        .enumerate()
        .map(|(index, server)| ServerRow::new(index + 1, server))
        .collect()
}
