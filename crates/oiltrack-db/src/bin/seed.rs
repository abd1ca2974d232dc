//! # Seed Data Generator
//!
//! Populates the database with reference data for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./oiltrack.db
//! cargo run -p oiltrack-db --bin seed
//!
//! # Specify database path
//! cargo run -p oiltrack-db --bin seed -- --db ./data/oiltrack.db
//! ```
//!
//! ## Generated Data
//! - Oil types: Diesel, Petrol, Kerosene, Lubricant
//! - Branches with one or two tanks each, tied to the oil types above
//! - Drivers with employee and licence numbers
//!
//! Nothing is written when oil types already exist.

use chrono::{Duration, Utc};
use std::env;

use oiltrack_core::ledger::generate_record_id;
use oiltrack_core::{Branch, Driver, OilTank, OilType, Role};
use oiltrack_db::{Database, DbConfig};

/// (name, color)
const OIL_TYPES: &[(&str, &str)] = &[
    ("Diesel", "#1f77b4"),
    ("Petrol", "#ff7f0e"),
    ("Kerosene", "#2ca02c"),
    ("Lubricant", "#9467bd"),
];

/// (name, address, contact, [(oil type index, capacity, current level)])
const BRANCHES: &[(&str, &str, &str, &[(usize, f64, f64)])] = &[
    (
        "North Depot",
        "12 Canal Road, Lahore",
        "042-1111111",
        &[(0, 20000.0, 8500.0), (1, 10000.0, 4200.0)],
    ),
    ("Harbour Station", "7 Port Avenue, Karachi", "021-2222222", &[(0, 30000.0, 12000.0)]),
    ("Hill Yard", "3 Murree Road, Rawalpindi", "051-3333333", &[(2, 5000.0, 900.0)]),
    (
        "Industrial Park",
        "Plot 44, Faisalabad",
        "041-4444444",
        &[(0, 15000.0, 3000.0), (3, 2000.0, 600.0)],
    ),
];

/// (display name, emp no, licence)
const DRIVERS: &[(&str, &str, &str)] = &[
    ("Imran Khan", "EMP-001", "DL-48213"),
    ("Sara Ahmed", "EMP-002", "DL-55190"),
    ("Bilal Raza", "EMP-003", "DL-60377"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let mut db_path = String::from("oiltrack.db");

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
                println!("Usage: seed [--db PATH]");
                println!();
                println!("Options:");
                println!("  --db, -d PATH    Database path (default: oiltrack.db)");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🛢  OilTrack Seed Data Generator");
    println!("   Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");

    if !db.oil_types().list().await?.is_empty() {
        println!("⚠  Reference data already present, nothing to do");
        return Ok(());
    }

    let now = Utc::now();

    let mut oil_types = Vec::with_capacity(OIL_TYPES.len());
    for (name, color) in OIL_TYPES {
        let oil = OilType {
            id: generate_record_id(),
            name: name.to_string(),
            color: color.to_string(),
            active: true,
            created_at: now,
        };
        db.oil_types().insert(&oil).await?;
        oil_types.push(oil);
    }
    println!("✓ Created {} oil types", oil_types.len());

    for (name, address, contact, tanks) in BRANCHES {
        let oil_tanks = tanks
            .iter()
            .filter_map(|(idx, capacity, level)| {
                oil_types.get(*idx).map(|oil| OilTank {
                    id: generate_record_id(),
                    capacity: *capacity,
                    oil_type_id: oil.id.clone(),
                    oil_type_name: oil.name.clone(),
                    current_level: *level,
                })
            })
            .collect();
        db.branches()
            .insert(&Branch {
                id: generate_record_id(),
                name: name.to_string(),
                address: address.to_string(),
                contact_no: contact.to_string(),
                oil_tanks,
                active: true,
                created_at: now,
            })
            .await?;
    }
    println!("✓ Created {} branches", BRANCHES.len());

    for (name, emp_no, licence) in DRIVERS {
        let email = format!(
            "{}@oiltrack.local",
            name.to_lowercase().replace(' ', ".")
        );
        db.drivers()
            .insert(&Driver {
                uid: generate_record_id(),
                email,
                display_name: Some(name.to_string()),
                role: Role::Driver,
                active: true,
                emp_no: Some(emp_no.to_string()),
                driver_licence_no: Some(licence.to_string()),
                tanker_licence_no: Some(licence.to_string()),
                licence_expiry_date: Some((now + Duration::days(365)).date_naive()),
                created_at: now,
                updated_at: None,
                last_login_at: None,
            })
            .await?;
    }
    println!("✓ Created {} drivers", DRIVERS.len());

    println!();
    println!("✅ Seed complete");
    db.close().await;
    Ok(())
}
