//! `a3s-pull view` command - print the manifest a reference resolves to.

use a3s_pull_runtime::{ImageReference, OciRegistry, RegistryClient};
use clap::Args;

#[derive(Args)]
pub struct ViewArgs {
    /// Reference to resolve
    pub reference: String,

    /// Include the manifest descriptor (digest, media type, size)
    #[arg(long)]
    pub descriptor: bool,
}

pub async fn execute(args: ViewArgs) -> Result<(), Box<dyn std::error::Error>> {
    let reference = ImageReference::parse(&args.reference)?;
    let registry = OciRegistry::with_default_auth(&reference);

    let (descriptor, manifest) = registry.resolve(&reference.full_reference()).await?;

    let output = if args.descriptor {
        serde_json::json!({
            "descriptor": descriptor,
            "manifest": manifest,
        })
    } else {
        serde_json::to_value(&manifest)?
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
