use anyhow::Context;
use indexmap::IndexMap;
use tracing::{debug, info};

use crate::registry::RegistryClient;

/// Page size cap of the registry search endpoint.
pub const SEARCH_PAGE_SIZE: usize = 250;

/// Most packages one top-N run will ever request.
pub const SEARCH_MAX_TOTAL: usize = 5250;

/// Page plan for `quantity` results, as `(from, size)` pairs.
///
/// The quantity is clamped to the endpoint's hard cap and split into
/// pages of at most the page size.
pub fn page_plan(quantity: usize) -> Vec<(usize, usize)> {
    let total = quantity.min(SEARCH_MAX_TOTAL);
    let mut plan = Vec::new();
    let mut from = 0;
    while from < total {
        let size = SEARCH_PAGE_SIZE.min(total - from);
        plan.push((from, size));
        from += size;
    }
    plan
}

/// The `quantity` most popular packages, as `name -> concrete version`
/// seeds for a resolve pass.
pub async fn top_seeds(
    registry: &RegistryClient,
    quantity: usize,
) -> anyhow::Result<IndexMap<String, String>> {
    if quantity > SEARCH_MAX_TOTAL {
        info!("clamping requested {quantity} packages to {SEARCH_MAX_TOTAL}");
    }
    let mut seeds = IndexMap::new();
    for (from, size) in page_plan(quantity) {
        let page = registry
            .search(size, from)
            .await
            .context("searching registry for popular packages")?;
        let got = page.objects.len();
        debug!("search page from={from} returned {got} packages");
        for hit in page.objects {
            seeds.insert(
                hit.package.name.to_string(),
                hit.package.version.to_string(),
            );
        }
        if got < size {
            break;
        }
    }
    Ok(seeds)
}
