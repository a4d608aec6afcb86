//! Write the build recipe for the current block (brick export)

use super::{current_block, green_check, Session};
use anyhow::Result;

#[derive(Debug, Clone, Default)]
pub struct ExportArgs {
    /// Top-level unit or testbench; detected when absent
    pub top: Option<String>,
}

pub fn run(args: ExportArgs, session: &Session) -> Result<()> {
    let ws = session.workspace()?;
    let block = current_block(&ws)?;
    let recipe = ws.export(&block, args.top.as_deref())?;

    print!("{}", recipe.tree);
    println!("\nBlock order: {}", recipe.block_order.join(" -> "));
    if let Some(top) = &recipe.top {
        println!("Top: {}", top);
    }
    if let Some(bench) = &recipe.bench {
        println!("Bench: {}", bench);
    }
    println!("{} Recipe located at {}", green_check(), recipe.path.display());
    Ok(())
}
