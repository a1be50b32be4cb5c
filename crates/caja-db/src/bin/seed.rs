//! # Seed Data Generator
//!
//! Populates a local database with a demo catalog so the till can work
//! before the first pull.
//!
//! ## Usage
//! ```bash
//! # Default tenant/company into ./caja_dev.db
//! cargo run -p caja-db --bin seed
//!
//! # Specify database path and company
//! cargo run -p caja-db --bin seed -- --db ./data/caja.db --company "Caja Demo"
//! ```
//!
//! ## Generated Data
//! - Item groups and items across a few categories, priced in `Retail`
//! - Bins in `Stores - CD` with stock derived from the item index
//! - Three customers (one disabled), cash and card payment modes
//! - A USD → NIO exchange rate dated today

use std::env;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use caja_core::{
    CatalogItem, Customer, ItemGroup, PaymentModeAccount, PaymentModeKind, DEFAULT_TENANT_ID,
};
use caja_db::{CurrencyExchange, Database, DbConfig, DbResult, ItemPrice};

const PRICE_LIST: &str = "Retail";
const WAREHOUSE: &str = "Stores - CD";

/// (group, items) for the demo catalog.
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "Beverages",
        &[
            "Coca-Cola",
            "Pepsi",
            "Sprite",
            "Fanta",
            "Agua Fuente Pura",
            "Jugo de Naranja",
            "Cafe Presto",
            "Te Helado",
        ],
    ),
    (
        "Snacks",
        &[
            "Tortillitas",
            "Platanitos",
            "Rosquillas",
            "Galletas Maria",
            "Mani Salado",
            "Chocolate Nestle",
        ],
    ),
    (
        "Grocery",
        &[
            "Arroz 1kg",
            "Frijoles Rojos 1kg",
            "Azucar 1kg",
            "Aceite 1L",
            "Harina 1kg",
            "Sal 500g",
        ],
    ),
    ("Services", &["Delivery", "Gift Wrap"]),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./caja_dev.db");
    let mut company = String::from("Caja Demo");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--company" | "-c" => {
                if i + 1 < args.len() {
                    company = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Caja Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>        Database file path (default: ./caja_dev.db)");
                println!("  -c, --company <NAME>   Company to seed (default: Caja Demo)");
                println!("  -h, --help             Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    info!(db = %db_path, company = %company, "Seeding demo catalog");

    let db = Database::new(DbConfig::new(&db_path)).await?;
    let tenant = DEFAULT_TENANT_ID;

    let existing = db.customers().list_enabled(tenant, &company).await?;
    if !existing.is_empty() {
        warn!(
            customers = existing.len(),
            "Database already seeded, delete the file to regenerate"
        );
        return Ok(());
    }

    let start = std::time::Instant::now();
    let items = seed_catalog(&db, tenant, &company).await?;
    seed_customers(&db, tenant, &company).await?;
    seed_payment_modes(&db, tenant, &company).await?;
    seed_rates(&db, tenant, &company).await?;

    info!(items, elapsed = ?start.elapsed(), "Seed complete");
    Ok(())
}

async fn seed_catalog(db: &Database, tenant: &str, company: &str) -> DbResult<usize> {
    let now = Utc::now();
    let catalog = db.catalog();

    catalog
        .upsert_item_group(
            tenant,
            company,
            &ItemGroup {
                name: "All Item Groups".into(),
                parent: None,
                is_group: true,
            },
            None,
            now,
        )
        .await?;

    let mut seeded = 0;
    for (group_idx, (group, names)) in CATEGORIES.iter().enumerate() {
        catalog
            .upsert_item_group(
                tenant,
                company,
                &ItemGroup {
                    name: group.to_string(),
                    parent: Some("All Item Groups".into()),
                    is_group: false,
                },
                None,
                now,
            )
            .await?;

        for (item_idx, name) in names.iter().enumerate() {
            let seed = group_idx * 100 + item_idx;
            let item = generate_item(group, name, seed);

            catalog.upsert_item(tenant, company, &item, None, now).await?;
            catalog
                .upsert_item_price(
                    tenant,
                    company,
                    &ItemPrice {
                        name: format!("{}-{}", PRICE_LIST, item.item_code),
                        item_code: item.item_code.clone(),
                        price_list: PRICE_LIST.into(),
                        currency: Some("NIO".into()),
                        // C$15.00 - C$94.50 in half-córdoba steps
                        rate: Decimal::new(1500 + ((seed * 37) % 160) as i64 * 50, 2),
                        remote_modified: None,
                    },
                    now,
                )
                .await?;

            if item.is_stock_item {
                let qty = Decimal::from((seed * 13) % 60 + 5);
                catalog
                    .upsert_bin(tenant, company, &item.item_code, WAREHOUSE, qty, Decimal::ZERO, None, now)
                    .await?;
            }
            seeded += 1;
        }
    }

    Ok(seeded)
}

fn generate_item(group: &str, name: &str, seed: usize) -> CatalogItem {
    let prefix: String = group.chars().take(3).collect::<String>().to_uppercase();
    CatalogItem {
        item_code: format!("{}-{:04}", prefix, seed),
        item_name: name.to_string(),
        item_group: Some(group.to_string()),
        stock_uom: "Nos".into(),
        is_stock_item: group != "Services",
        disabled: false,
        allow_negative_stock: false,
    }
}

async fn seed_customers(db: &Database, tenant: &str, company: &str) -> DbResult<()> {
    let now = Utc::now();
    let customers = [
        ("CUST-0001", "Cliente Contado", None, false),
        ("CUST-0002", "Distribuidora Leon", Some("USD"), false),
        ("CUST-0003", "Cliente Inactivo", None, true),
    ];

    for (name, customer_name, currency, disabled) in customers {
        db.customers()
            .upsert(
                tenant,
                company,
                &Customer {
                    name: name.into(),
                    customer_name: customer_name.into(),
                    customer_group: Some("Individual".into()),
                    default_currency: currency.map(String::from),
                    receivable_account: None,
                    receivable_currency: Some("NIO".into()),
                    disabled,
                    remote_modified: None,
                },
                now,
            )
            .await?;
    }
    Ok(())
}

async fn seed_payment_modes(db: &Database, tenant: &str, company: &str) -> DbResult<()> {
    let now = Utc::now();
    let modes = [
        ("Efectivo", PaymentModeKind::Cash, "Caja - CD", "NIO"),
        ("Efectivo USD", PaymentModeKind::Cash, "Caja USD - CD", "USD"),
        ("Tarjeta", PaymentModeKind::Bank, "Banco - CD", "NIO"),
    ];

    for (mode, kind, account, currency) in modes {
        db.payment_modes()
            .upsert(
                tenant,
                company,
                &PaymentModeAccount {
                    mode: mode.into(),
                    kind,
                    account: Some(account.into()),
                    account_currency: Some(currency.into()),
                    enabled: true,
                },
                None,
                now,
            )
            .await?;
    }
    Ok(())
}

async fn seed_rates(db: &Database, tenant: &str, company: &str) -> DbResult<()> {
    let now = Utc::now();
    let today = now.date_naive();
    db.exchange_rates()
        .upsert(
            tenant,
            company,
            &CurrencyExchange {
                name: format!("USD-NIO-{}", today),
                from_currency: "USD".into(),
                to_currency: "NIO".into(),
                exchange_rate: Decimal::new(3662, 2),
                date: today,
                remote_modified: None,
            },
            now,
        )
        .await
}
