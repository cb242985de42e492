//! Feed command handlers for the CLI.

use std::time::Duration;

use affdb_core::LookupOutcome;
use affdb_feed::FeedIndex;

/// Look up one product and print the outcome.
///
/// `NotFound` and `OutOfStock` are normal answers and exit successfully. A
/// fetch failure is printed like any other outcome, then returned as an error
/// so the process exits non-zero.
///
/// # Errors
///
/// Returns an error if the feed could not be refreshed or read.
pub(crate) async fn run_lookup(
    index: &FeedIndex,
    identifier: &str,
    json: bool,
) -> anyhow::Result<()> {
    let outcome = index.lookup(identifier).await;

    if json {
        println!("{}", outcome_json(identifier, &outcome));
    } else {
        print_outcome(identifier, &outcome);
    }

    if matches!(outcome, LookupOutcome::FetchFailed(_)) {
        anyhow::bail!("feed {} unavailable", index.source().feed_id());
    }
    Ok(())
}

/// Download and install the feed now.
///
/// # Errors
///
/// Returns an error if the download, extraction, or install fails.
pub(crate) async fn run_refresh(index: &FeedIndex) -> anyhow::Result<()> {
    index.refresh().await?;
    println!(
        "feed {} installed at {}",
        index.source().feed_id(),
        index.store().path().display()
    );
    Ok(())
}

/// Print where the cached feed lives and whether it is stale.
///
/// # Errors
///
/// Returns an error if the cache file's metadata cannot be read.
pub(crate) async fn run_status(index: &FeedIndex) -> anyhow::Result<()> {
    let status = index.store().status().await?;

    println!("feed:      {}", index.source().feed_id());
    println!("partner:   {}", index.source().partner_name());
    println!("cache:     {}", status.path.display());
    match (status.last_modified, status.age) {
        (Some(modified), Some(age)) => {
            println!("updated:   {}", modified.format("%Y-%m-%d %H:%M:%S UTC"));
            println!("age:       {}", fmt_age(age));
        }
        _ => println!("updated:   never"),
    }
    println!(
        "stale:     {}",
        if status.is_stale { "yes" } else { "no" }
    );
    Ok(())
}

fn print_outcome(identifier: &str, outcome: &LookupOutcome) {
    match outcome {
        LookupOutcome::Found(result) => {
            println!("{} ({})", result.name, result.identifier);
            println!("partner:   {}", result.partner_name);
            if let Some(price) = result.best_offer {
                let currency = result.currency.as_deref().unwrap_or("");
                println!("price:     {price} {currency}");
            }
            println!("link:      {}", result.deep_link);
            if let Some(image) = &result.image_url {
                println!("image:     {image}");
            }
            if !result.description.is_empty() {
                println!();
                println!("{}", result.description);
            }
        }
        LookupOutcome::NotFound => println!("{identifier}: not found in feed"),
        LookupOutcome::OutOfStock => println!("{identifier}: out of stock"),
        LookupOutcome::FetchFailed(reason) => println!("{identifier}: {reason}"),
    }
}

fn outcome_json(identifier: &str, outcome: &LookupOutcome) -> serde_json::Value {
    match outcome {
        LookupOutcome::Found(result) => serde_json::json!({
            "outcome": "found",
            "product": result,
        }),
        LookupOutcome::NotFound => serde_json::json!({
            "outcome": "not_found",
            "identifier": identifier,
        }),
        LookupOutcome::OutOfStock => serde_json::json!({
            "outcome": "out_of_stock",
            "identifier": identifier,
        }),
        LookupOutcome::FetchFailed(reason) => serde_json::json!({
            "outcome": "fetch_failed",
            "identifier": identifier,
            "reason": reason,
        }),
    }
}

/// Format an age as hours and minutes, e.g. `"25h 03m"`.
fn fmt_age(age: Duration) -> String {
    let minutes = age.as_secs() / 60;
    format!("{}h {:02}m", minutes / 60, minutes % 60)
}
