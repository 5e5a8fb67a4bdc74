use anyhow::Result;
use balancer::Registry;

use crate::ui;

pub fn run() -> Result<()> {
    let registry = Registry::with_builtin();

    ui::header("Load balancer providers");
    for name in registry.providers() {
        println!("  {name}");
    }
    Ok(())
}
