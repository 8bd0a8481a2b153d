use std::path::PathBuf;

use anyhow::Context;

use dirsync_jobs::ExecutionContext;

fn main() -> anyhow::Result<()> {
    dirsync_observability::init();

    let path: PathBuf = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: dirsync <jobs.json>")?;

    let context = ExecutionContext::from_env().context("invalid worker pool configuration")?;
    let result = dirsync_cli::run_file(context.clone(), &path);
    context.shutdown();

    println!("{}", result?);
    Ok(())
}
