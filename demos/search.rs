use anyhow::Result;
use datahub::{registry::SearchQuery, Config, DataHub};
use futures::TryStreamExt;
use std::env;

#[tokio::main]
async fn main() -> Result<()> {
    let args = env::args().collect::<Vec<_>>();

    match args.as_slice() {
        [_, keywords] => search(keywords, None).await,
        [_, keywords, owner_id] => search(keywords, Some(owner_id)).await,
        _ => panic!("\n\nPlease input [keywords] and optionally [owner_id]\n\n"),
    }
}

async fn search(keywords: &String, owner_id: Option<&String>) -> Result<()> {
    let hub = DataHub::connect(Config::load()?).await?;

    let mut query = SearchQuery::new(keywords.as_str()).with_page_size(10);
    if let Some(owner_id) = owner_id {
        query = query.with_owner_id(owner_id.as_str());
    }

    let mut results = hub.search(query);
    while let Some(summary) = results.try_next().await? {
        println!(
            "{}\t{}",
            summary.id,
            summary.title.as_deref().unwrap_or(&summary.name)
        );
    }

    Ok(())
}
