//! Filesystem commands

use anyhow::{Context, Result};
use fsguard::helpers;
use fsguard::Engine;

use crate::cli::{PathArgs, TransferArgs, WriteArgs};
use crate::output;

pub async fn read(engine: &Engine, args: PathArgs) -> Result<()> {
    let content = helpers::read(engine, &args.path).await?;
    print!("{}", content);
    Ok(())
}

pub async fn write(engine: &Engine, args: WriteArgs) -> Result<()> {
    if args.json {
        let value: serde_json::Value =
            serde_json::from_str(&args.content).context("Content is not valid JSON")?;
        helpers::write_json(engine, &args.path, &value).await?;
    } else if args.append {
        engine
            .append(&args.path, args.content.as_bytes())
            .await
            .with_context(|| format!("Failed to append to {}", args.path))?;
    } else {
        helpers::write(engine, &args.path, args.content.as_bytes()).await?;
    }

    output::success(&format!("Wrote {}", args.path));
    Ok(())
}

pub async fn mkdir(engine: &Engine, args: PathArgs) -> Result<()> {
    helpers::make_dir(engine, &args.path).await?;
    output::success(&format!("Created {}", args.path));
    Ok(())
}

pub async fn remove(engine: &Engine, args: PathArgs) -> Result<()> {
    helpers::remove(engine, &args.path).await?;
    output::success(&format!("Removed {}", args.path));
    Ok(())
}

pub async fn copy(engine: &Engine, args: TransferArgs) -> Result<()> {
    let files = helpers::copy(engine, &args.src, &args.dest)
        .await
        .with_context(|| format!("Failed to copy {} to {}", args.src, args.dest))?;
    output::success(&format!(
        "Copied {} file(s) from {} to {}",
        files, args.src, args.dest
    ));
    Ok(())
}

pub async fn move_path(engine: &Engine, args: TransferArgs) -> Result<()> {
    helpers::move_path(engine, &args.src, &args.dest).await?;
    output::success(&format!("Moved {} to {}", args.src, args.dest));
    Ok(())
}

/// Prints `true` or `false`; exits non-zero when the path is missing
pub async fn exists(engine: &Engine, args: PathArgs) -> Result<bool> {
    let found = helpers::exists(engine, &args.path).await;
    println!("{}", found);
    Ok(found)
}

pub async fn ensure_file(engine: &Engine, args: PathArgs) -> Result<()> {
    helpers::ensure_file(engine, &args.path).await?;
    output::success(&format!("Ensured {}", args.path));
    Ok(())
}
