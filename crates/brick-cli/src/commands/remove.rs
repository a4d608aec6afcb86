//! Delete a block's working copy (brick remove)

use super::{green_check, yellow_warning, Session};
use anyhow::{bail, Result};
use brick_package::{BlockRef, Level};

#[derive(Debug, Clone, Default)]
pub struct RemoveArgs {
    pub block: String,
}

pub fn run(args: RemoveArgs, session: &Session) -> Result<()> {
    let mut ws = session.workspace()?;
    let id = ws.find(&args.block)?;
    let block_ref = BlockRef::new(&id, Level::Downloaded);
    if ws.registry.get(&block_ref).is_none() {
        bail!("Block {} has no working copy", args.block);
    }

    if ws.delete(&block_ref)? {
        println!("{} Removed working copy of {}", green_check(), id);
    } else {
        println!("{} Cancelled", yellow_warning());
    }
    Ok(())
}
