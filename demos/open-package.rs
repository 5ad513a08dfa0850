use anyhow::Result;
use datahub::{Config, DataHub};
use std::env;

#[tokio::main]
async fn main() -> Result<()> {
    let args = env::args().collect::<Vec<_>>();

    match args.as_slice() {
        [_, source] => open(source).await,
        _ => panic!(
            "\n\nPlease input [owner/name/version] or a dataset URL (https://datahub.io/core/gdp)\n\n"
        ),
    }
}

async fn open(source: &String) -> Result<()> {
    let hub = DataHub::connect(Config::load()?).await?;
    let package = hub.open(source).await?;

    println!("name: {:?}", package.name());
    for resource in &package.descriptor.resources {
        let urls = package.resource_urls(resource);
        println!(
            "resource: {:?} {}",
            resource.name,
            urls.iter().map(|u| u.as_str()).collect::<Vec<_>>().join(" ")
        );
    }

    Ok(())
}
