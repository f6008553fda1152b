use clap::Parser;

use crate::{Offpack, cmd::Execute, coerce::coerce, name::PackageName, seed::split_spec};

/// Collection of CLI tools basically for development use.
#[derive(Clone, Debug, Parser)]
pub enum Tool {
    FetchManifest(FetchManifest),
    FetchPackument(FetchPackument),
}

impl Execute for Tool {
    async fn execute(app: &Offpack, cmd: Self) -> anyhow::Result<()> {
        match cmd {
            Tool::FetchManifest(fetch_manifest) => app.execute(fetch_manifest).await,
            Tool::FetchPackument(fetch_packument) => app.execute(fetch_packument).await,
        }
    }
}

/// Fetch and print the manifest a package spec resolves to.
#[derive(Clone, Debug, Parser)]
pub struct FetchManifest {
    /// Package spec such as `react@18.2.0`.
    #[arg(value_name = "SPEC")]
    spec: String,
}

impl Execute for FetchManifest {
    async fn execute(app: &Offpack, cmd: Self) -> anyhow::Result<()> {
        let (name, range) = split_spec(&cmd.spec);
        let name: PackageName = name.parse()?;
        let manifest = app.registry.manifest(&name, &coerce(range)).await?;
        println!("{}", serde_json::to_string_pretty(&manifest)?);
        Ok(())
    }
}

/// Fetch and print the whole packument of a package.
#[derive(Clone, Debug, Parser)]
pub struct FetchPackument {
    /// Package name such as `react` or `@types/node`.
    #[arg(value_name = "NAME")]
    name: PackageName,
}

impl Execute for FetchPackument {
    async fn execute(app: &Offpack, cmd: Self) -> anyhow::Result<()> {
        let packument = app.registry.packument(&cmd.name).await?;
        println!("{}", serde_json::to_string_pretty(&packument)?);
        Ok(())
    }
}
