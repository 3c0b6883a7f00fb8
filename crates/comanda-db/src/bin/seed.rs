//! # Seed Data Generator
//!
//! Populates the database with a development menu and floor plan.
//!
//! ## Usage
//! ```bash
//! cargo run -p comanda-db --bin seed
//! cargo run -p comanda-db --bin seed -- --db ./data/comanda.db
//! ```

use std::env;

use comanda_core::{Floor, ProductCategory, TableShape};
use comanda_db::repository::product::NewProduct;
use comanda_db::repository::table::NewTable;
use comanda_db::{Database, DbConfig};
use tracing_subscriber::EnvFilter;

/// Development menu: (name, category, price in cents, stock).
const MENU: &[(&str, ProductCategory, i64, i64)] = &[
    ("Ceviche de Camaron", ProductCategory::Soup, 1200, 0),
    ("Ceviche Mixto", ProductCategory::Soup, 1400, 0),
    ("Encebollado", ProductCategory::Soup, 800, 0),
    ("Sopa Marinera", ProductCategory::Soup, 1000, 0),
    ("Arroz Marinero", ProductCategory::Rice, 950, 0),
    ("Arroz con Camaron", ProductCategory::Rice, 900, 0),
    ("Arroz con Concha", ProductCategory::Rice, 900, 0),
    ("Cola 500ml", ProductCategory::Drink, 100, 48),
    ("Agua 600ml", ProductCategory::Drink, 75, 60),
    ("Jugo de Maracuya", ProductCategory::Drink, 150, 24),
    ("Cerveza Nacional", ProductCategory::Drink, 250, 36),
    ("Porcion de Patacones", ProductCategory::Extra, 300, 20),
    ("Porcion de Arroz", ProductCategory::Extra, 150, 30),
    ("Salsa de Ajo", ProductCategory::Extra, 100, 25),
    ("Camarones Apanados", ProductCategory::Other, 1100, 0),
    ("Pescado Frito", ProductCategory::Other, 950, 0),
];

/// Floor plan: (number, floor, capacity, shape, pos_x, pos_y).
const TABLES: &[(i64, Floor, i64, TableShape, i64, i64)] = &[
    (1, Floor::Ground, 4, TableShape::Square, 10, 10),
    (2, Floor::Ground, 4, TableShape::Square, 35, 10),
    (3, Floor::Ground, 2, TableShape::Round, 60, 10),
    (4, Floor::Ground, 6, TableShape::Long, 10, 50),
    (5, Floor::Ground, 4, TableShape::Square, 60, 50),
    (6, Floor::Terrace, 4, TableShape::Square, 15, 20),
    (7, Floor::Terrace, 2, TableShape::Round, 45, 20),
    (8, Floor::Terrace, 8, TableShape::Long, 20, 60),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();
    let mut db_path = String::from("./comanda_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Comanda Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./comanda_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Comanda Seed Data Generator");
    println!("===========================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("Connected, migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("Database already has {existing} products; skipping seed.");
        println!("Delete the database file to regenerate.");
        return Ok(());
    }

    for (name, category, price_cents, stock) in MENU {
        db.products()
            .create(NewProduct {
                name: (*name).to_string(),
                category: *category,
                price_cents: *price_cents,
                stock: *stock,
                image_path: None,
                description: None,
            })
            .await?;
    }
    println!("Seeded {} products", MENU.len());

    for (number, floor, capacity, shape, pos_x, pos_y) in TABLES {
        db.tables()
            .create(NewTable {
                number: *number,
                floor: *floor,
                capacity: *capacity,
                shape: *shape,
                pos_x: *pos_x,
                pos_y: *pos_y,
            })
            .await?;
    }
    println!("Seeded {} tables", TABLES.len());

    println!();
    println!("Done.");
    Ok(())
}
