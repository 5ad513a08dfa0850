use anyhow::Result;
use datahub::{Config, DataHub};
use std::env;

#[tokio::main]
async fn main() -> Result<()> {
    let args = env::args().collect::<Vec<_>>();

    match args.as_slice() {
        [_, path] => init(path, false).await,
        [_, path, flag] if flag == "-i" => init(path, true).await,
        _ => panic!("\n\nPlease input [path_to_file_or_folder] and optionally [-i] to be asked for metadata\n\n"),
    }
}

async fn init(path: &String, interactive: bool) -> Result<()> {
    let hub = DataHub::connect(Config::load()?).await?;
    let package = hub.init(path, interactive)?;

    let report = hub.validate(&package);
    println!("{}", package.to_json()?);
    println!("{report}");

    Ok(())
}
