//! Reference cart scenarios.

use std::time::Duration;

use anyhow::{bail, ensure, Context as _, Result};
use serde::Serialize;
use turbo_cart::prelude::*;

use super::DemoArgs;
use crate::context::Context;
use crate::session::{Session, VIEWPORT_WIDTH};

const SCENARIOS: [&str; 5] = [
    "Repeated adds accumulate into one line",
    "Updating to zero empties the cart",
    "Removing a missing product is a no-op",
    "Outside click closes the open cart",
    "Failed confirmation leaves the cart usable",
];

#[derive(Debug, Serialize)]
struct Report {
    scenario: usize,
    title: &'static str,
    passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<String>,
}

/// Run the demo command.
pub async fn run(args: DemoArgs, ctx: &Context) -> Result<()> {
    let selected: Vec<usize> = match args.scenario {
        Some(n) if (1..=SCENARIOS.len()).contains(&n) => vec![n],
        Some(n) => bail!("No scenario {}; choose 1-{}", n, SCENARIOS.len()),
        None => (1..=SCENARIOS.len()).collect(),
    };
    let latency = Duration::from_millis(args.latency_ms);

    let mut reports = Vec::with_capacity(selected.len());
    for (i, n) in selected.iter().copied().enumerate() {
        let title = SCENARIOS[n - 1];
        ctx.output.header(&format!("Scenario {}: {}", n, title));
        ctx.output.step(i + 1, selected.len(), title);

        let session = Session::new(&ctx.config, latency, &ctx.output)?;
        let outcome = match n {
            1 => accumulate(&session, ctx).await,
            2 => update_to_zero(&session).await,
            3 => remove_missing(&session).await,
            4 => outside_click(&session).await,
            _ => failed_confirmation(&session, ctx).await,
        };
        session.print_state();

        match &outcome {
            Ok(()) => ctx.output.success("passed"),
            Err(e) => ctx.output.error(&format!("failed: {:#}", e)),
        }
        reports.push(Report {
            scenario: n,
            title,
            passed: outcome.is_ok(),
            failure: outcome.err().map(|e| format!("{:#}", e)),
        });
    }

    if ctx.output.is_json() {
        ctx.output.json(&reports);
    }

    let failed = reports.iter().filter(|r| !r.passed).count();
    if failed > 0 {
        bail!("{} of {} scenarios failed", failed, reports.len());
    }
    Ok(())
}

async fn accumulate(session: &Session, ctx: &Context) -> Result<()> {
    let shirt = session.product("1").await?;
    let cart = session.cart.clone();

    let first = {
        let shirt = shirt.clone();
        tokio::spawn(async move { cart.add_to_cart(&shirt, 2, VIEWPORT_WIDTH).await })
    };
    let spinner = ctx.output.spinner("Waiting for the cart service…");
    session.settle().await?;
    spinner.finish_and_clear();
    first.await.context("add task panicked")??;

    session.cart.add_to_cart(&shirt, 3, VIEWPORT_WIDTH).await?;

    let items = session.cart.store().items();
    ensure!(items.len() == 1, "expected one line, found {}", items.len());
    ensure!(items[0].quantity == 5, "expected quantity 5, found {}", items[0].quantity);
    let total = session.cart.store().total()?;
    ensure!(total.amount_cents == 2500, "expected total 2500, found {}", total.amount_cents);
    Ok(())
}

async fn update_to_zero(session: &Session) -> Result<()> {
    let tote = session.product("2").await?;
    session.cart.store().add_item(&tote, 1).await?;
    session
        .cart
        .store()
        .update_quantity(&tote.id, 0)
        .await?;
    session.cart.open_cart();

    ensure!(session.cart.store().items().is_empty(), "cart should be empty");
    ensure!(
        session.cart.panel().view() == Some(PanelView::Empty),
        "panel should show the empty state"
    );
    Ok(())
}

async fn remove_missing(session: &Session) -> Result<()> {
    session.cart.store().remove_item(&ProductId::from(99u64)).await;

    ensure!(session.cart.store().items().is_empty(), "cart should stay empty");
    ensure!(!session.cart.store().is_loading(), "nothing should be pending");
    ensure!(session.remote.calls() == 0, "no backend call expected");
    Ok(())
}

async fn outside_click(session: &Session) -> Result<()> {
    let visibility = session.cart.visibility();
    ensure!(visibility.get() == Visibility::Closed, "cart should start closed");

    session.cart.open_cart();
    ensure!(visibility.get() == Visibility::Open, "cart should be open");

    session.click_inside();
    ensure!(visibility.is_open(), "inside click must not close the cart");

    session.click_outside();
    ensure!(visibility.get() == Visibility::Closed, "outside click should close the cart");
    ensure!(
        !session.cart.panel().is_dismiss_active(),
        "outside listener should be released"
    );
    Ok(())
}

async fn failed_confirmation(session: &Session, ctx: &Context) -> Result<()> {
    let beanie = session.product("3").await?;
    session.remote.reject(beanie.id.clone());

    let spinner = ctx.output.spinner("Adding to cart…");
    let added = session.cart.add_to_cart(&beanie, 2, VIEWPORT_WIDTH).await;
    spinner.finish_and_clear();
    added?;

    let line = session.cart.store().item(&beanie.id);
    match ctx.config.failure_policy {
        FailurePolicy::Keep => {
            let line = line.context("line should remain after a failed confirmation")?;
            ensure!(line.quantity == 2, "expected quantity 2, found {}", line.quantity);
        }
        FailurePolicy::Revert => {
            ensure!(line.is_none(), "reverted add should leave no line");
        }
    }
    ensure!(!session.cart.store().is_loading(), "loading should clear");
    ensure!(
        session.log.count("error") == 1,
        "expected one error notice, found {}",
        session.log.count("error")
    );
    Ok(())
}
