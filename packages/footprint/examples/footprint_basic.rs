//! Measures the memory retained by a small in-memory catalog and prints the report.
//!
//! The scanner logs through `tracing`, so the subscriber installed below also prints a line for
//! the start and end of every scan.
//!
//! Run with: `cargo run --example footprint_basic`.
#![expect(
    clippy::arithmetic_side_effects,
    reason = "this is example code that does not need production-level safety"
)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use footprint::{HumanSize, MemSize, RootSet, impl_mem_size};

struct Product {
    name: String,
    tags: Vec<String>,
    price_cents: u64,
}

impl_mem_size!(Product {
    name,
    tags,
    price_cents
});

struct Catalog {
    by_id: HashMap<u32, Arc<Product>>,
    featured: Vec<Arc<Product>>,
}

impl_mem_size!(Catalog { by_id, featured });

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let mut by_id = HashMap::new();

    for id in 0..1000_u32 {
        let product = Arc::new(Product {
            name: format!("Product {id}"),
            tags: vec!["new".to_string(), format!("batch-{}", id % 10)],
            price_cents: u64::from(id) * 100,
        });

        by_id.insert(id, product);
    }

    let featured = by_id
        .iter()
        .filter(|(id, _)| *id % 100 == 0)
        .map(|(_, product)| Arc::clone(product))
        .collect();

    let catalog = Catalog { by_id, featured };
    let audit_log = Mutex::new(vec![String::from("catalog created"); 50]);

    let mut roots: RootSet<'_, dyn MemSize + Sync> = RootSet::builder().build();
    roots.add("audit_log", &audit_log);
    roots.add("catalog", &catalog);

    let sizes = roots.scan().expect("all types in the catalog follow the MemSize contract");

    println!("=== Memory by type ===");
    sizes.print_to_stdout();

    println!("=== Memory by root ===");
    let mut by_root: Vec<_> = sizes.roots().collect();
    by_root.sort_unstable();

    for (name, bytes) in by_root {
        println!("{name:<10} {}", HumanSize(bytes));
    }

    let catalog_only = roots
        .scan_root("catalog")
        .expect("all types in the catalog follow the MemSize contract");

    println!();
    println!(
        "Catalog alone: {} ({} buffer spans, {} of bitmap)",
        HumanSize(catalog_only.total()),
        catalog_only.buffer_spans(),
        HumanSize(catalog_only.bitmap_bytes())
    );

    let prices: u64 = catalog.by_id.values().map(|p| p.price_cents).sum();
    println!("Sum of prices: {prices}");
}
