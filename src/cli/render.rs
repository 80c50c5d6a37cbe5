//! Terminal rendering for command output.

use comfy_table::Cell;

use super::ui;
use crate::core::currency::{Currency, CurrencyKind, CurrencyRegistry};
use crate::core::wallet::PortfolioValuation;
use crate::trading::{CacheInfo, RateQuote, RatesListing, TradeReceipt, TradeSide};
use crate::updater::UpdateReport;

fn kind_of(registry: &CurrencyRegistry, code: &str) -> CurrencyKind {
    registry
        .get(code)
        .map(|c| c.kind())
        .unwrap_or(CurrencyKind::Fiat)
}

pub fn print_portfolio(valuation: &PortfolioValuation, registry: &CurrencyRegistry) {
    let anchor = &valuation.anchor;

    if valuation.wallets.is_empty() {
        println!(
            "{}",
            ui::style_text("Portfolio is empty.", ui::StyleType::Subtle)
        );
        return;
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Currency"),
        ui::header_cell("Balance"),
        ui::header_cell(&format!("Rate ({anchor})")),
        ui::header_cell(&format!("Value ({anchor})")),
    ]);

    let mut unpriced = Vec::new();
    for wallet in &valuation.wallets {
        let kind = kind_of(registry, &wallet.currency_code);
        if wallet.is_unpriced() {
            unpriced.push(wallet.currency_code.clone());
        }
        table.add_row(vec![
            Cell::new(&wallet.currency_code),
            ui::amount_cell(ui::format_amount(wallet.balance, kind)),
            ui::format_optional_cell(wallet.rate, |r| format!("{r:.4}")),
            ui::format_optional_cell(wallet.value, |v| format!("{v:.2}")),
        ]);
    }

    println!("{table}");
    println!(
        "\nTotal Value ({}): {}",
        ui::style_text(anchor, ui::StyleType::TotalLabel),
        ui::style_text(&format!("{:.2}", valuation.total), ui::StyleType::TotalValue)
    );
    if !unpriced.is_empty() {
        println!(
            "{}",
            ui::style_text(
                &format!(
                    "No rate available for {}; excluded from the total. Run `update` to refresh rates.",
                    unpriced.join(", ")
                ),
                ui::StyleType::Subtle
            )
        );
    }
}

pub fn print_trade(receipt: &TradeReceipt, registry: &CurrencyRegistry) {
    let kind = kind_of(registry, &receipt.currency);
    let verb = match receipt.side {
        TradeSide::Buy => "Bought",
        TradeSide::Sell => "Sold",
    };
    println!(
        "{} {} {}. New balance: {} {}",
        verb,
        ui::format_amount(receipt.amount, kind),
        receipt.currency,
        ui::style_text(
            &ui::format_amount(receipt.new_balance, kind),
            ui::StyleType::TotalValue
        ),
        receipt.currency
    );
    match (receipt.rate, receipt.anchor_value) {
        (Some(rate), Some(value)) => println!(
            "Rate: 1 {} = {:.4} {} (trade value {:.2} {})",
            receipt.currency, rate, receipt.anchor, value, receipt.anchor
        ),
        _ => println!(
            "{}",
            ui::style_text(
                &format!("No {} rate cached for {}.", receipt.anchor, receipt.currency),
                ui::StyleType::Subtle
            )
        ),
    }
}

pub fn print_rate_quote(quote: &RateQuote) {
    println!("1 {} = {:.6} {}", quote.from, quote.rate, quote.to);
    if let Some(reverse) = quote.reverse_rate {
        println!("1 {} = {:.6} {}", quote.to, reverse, quote.from);
    }
    match quote.last_refresh {
        Some(ts) => println!(
            "{}",
            ui::style_text(
                &format!("Cache last refreshed {}", ts.format("%Y-%m-%d %H:%M:%S UTC")),
                ui::StyleType::Subtle
            )
        ),
        None => println!(
            "{}",
            ui::style_text("Rate cache has never been refreshed.", ui::StyleType::Subtle)
        ),
    }
}

pub fn print_rates(listing: &RatesListing) {
    match listing.last_refresh {
        Some(ts) => println!("Last refresh: {}", ts.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("Last refresh: never"),
    }

    if listing.pairs.is_empty() {
        println!(
            "{}",
            ui::style_text(
                "No cached rates. Run `update` to fetch them.",
                ui::StyleType::Subtle
            )
        );
        return;
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Pair"),
        ui::header_cell("Rate"),
        ui::header_cell("Source"),
        ui::header_cell("Updated"),
    ]);
    for (key, entry) in &listing.pairs {
        table.add_row(vec![
            Cell::new(key),
            ui::amount_cell(format!("{:.6}", entry.rate)),
            Cell::new(&entry.source),
            Cell::new(entry.updated_at.format("%Y-%m-%d %H:%M:%S").to_string()),
        ]);
    }
    println!("{table}");

    if !listing.is_fresh {
        println!(
            "{}",
            ui::style_text(
                "Warning: rates may be outdated. Run `update` to refresh them.",
                ui::StyleType::Error
            )
        );
    }
}

pub fn print_update_report(report: &UpdateReport) {
    if report.success {
        println!(
            "{}",
            ui::style_text(
                &format!("Updated {} rates.", report.updated_pairs.len()),
                ui::StyleType::TotalValue
            )
        );
    } else {
        println!(
            "Updated {} rates with {} provider error(s):",
            report.updated_pairs.len(),
            report.errors.len()
        );
        for error in &report.errors {
            println!("  {}", ui::style_text(error, ui::StyleType::Error));
        }
    }
}

pub fn print_cache_info(info: &CacheInfo) {
    match info.last_refresh {
        Some(ts) => println!("Last refresh: {}", ts.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("Last refresh: never"),
    }
    println!("Cached pairs: {}", info.pairs_count);
    let status = if info.is_fresh {
        ui::style_text("fresh", ui::StyleType::TotalValue)
    } else {
        ui::style_text("stale", ui::StyleType::Error)
    };
    println!("Status: {status} (TTL {}s)", info.ttl_seconds);
}

pub fn print_currencies(registry: &CurrencyRegistry) {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Code"),
        ui::header_cell("Name"),
        ui::header_cell("Type"),
        ui::header_cell("Details"),
    ]);
    for currency in registry.all() {
        let (kind, details) = match currency {
            Currency::Fiat {
                issuing_country, ..
            } => ("Fiat", format!("Issuing: {issuing_country}")),
            Currency::Crypto {
                algorithm,
                market_cap_usd,
                ..
            } => (
                "Crypto",
                format!("Algo: {algorithm}, MCAP: {market_cap_usd:.2e} USD"),
            ),
        };
        table.add_row(vec![
            Cell::new(currency.code()),
            Cell::new(currency.name()),
            Cell::new(kind),
            Cell::new(details),
        ]);
    }
    println!("{table}");
}
