//! Demo catalog listing.

use anyhow::{Context as _, Result};
use turbo_cart::collab::StaticCatalog;

use super::CatalogArgs;
use crate::context::Context;
use crate::session::DEMO_CATALOG;

/// Run the catalog command.
pub async fn run(args: CatalogArgs, ctx: &Context) -> Result<()> {
    let catalog = StaticCatalog::from_json(DEMO_CATALOG, ctx.config.currency)
        .context("Failed to load demo catalog")?;

    if ctx.output.is_json() {
        let products: Vec<_> = catalog.products().collect();
        ctx.output.json(&products);
        return Ok(());
    }

    ctx.output.header("Catalog");
    let widths = [12, 16, 10, 10];
    ctx.output.table_row(&["ID", "TITLE", "PRICE", "WAS"], &widths);
    for product in catalog.products() {
        let price = product.unit_price.display();
        let was = product
            .compare_at_price
            .map(|m| m.display())
            .unwrap_or_default();
        ctx.output
            .table_row(&[product.id.as_str(), &product.title, &price, &was], &widths);
        if args.long {
            if let Some(savings) = product.savings() {
                ctx.output.kv("save", &savings.display());
            }
        }
    }

    Ok(())
}
