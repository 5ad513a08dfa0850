use anyhow::Result;
use datahub::{registry::Findability, Config, DataHub, Package};
use std::env;

#[tokio::main]
async fn main() -> Result<()> {
    let args = env::args().collect::<Vec<_>>();

    match args.as_slice() {
        [_, path, auth_token] => push(path, auth_token, "published").await,
        [_, path, auth_token, findability] => push(path, auth_token, findability).await,
        _ => panic!(
            "\n\nPlease input [path_to_package_folder] and [datahub_jwt(eyJhbG......MHlq0)], optionally [published|unlisted|private]\n\n"
        ),
    }
}

async fn push(path: &String, auth_token: &String, findability: &str) -> Result<()> {
    let findability = findability
        .parse::<Findability>()
        .map_err(anyhow::Error::msg)?;
    let hub = DataHub::connect(Config::load()?.with_token(auth_token.as_str())).await?;

    let package = Package::load(path)?;
    let outcome = hub.push(&package, findability).await?;
    println!("pushed {} ({} files)", outcome.dataset_id, outcome.files_uploaded);

    Ok(())
}
