//! `weaver tools`: list the built-in tools a plan may call.

use anyhow::Result;

use weaver_core::sync::SyncConfig;
use weaver_core::tool::ToolRegistry;

pub fn run_tools(sync_config: SyncConfig, verbose: bool) -> Result<()> {
    let registry = ToolRegistry::with_builtin_tools(sync_config);
    let descriptors = registry.descriptors();

    if verbose {
        println!("{}", serde_json::to_string_pretty(&descriptors)?);
        return Ok(());
    }

    let width = descriptors.iter().map(|d| d.name.len()).max().unwrap_or(0);
    for d in &descriptors {
        println!("{:<width$}  {}", d.name, d.description);
    }
    Ok(())
}
