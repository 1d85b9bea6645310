use chrono::Utc;
use clap::Parser;
use fake::{
    faker::{lorem::en::Words, name::en::FirstName},
    Fake,
};
use sqlx::sqlite::SqlitePoolOptions;
use uuid::Uuid;

use storefront::{
    domain::{Order, OrderItem, OrderStatus, Product},
    repository::{
        InventoryRepository, OrderRepository, SqliteInventoryRepository, SqliteOrderRepository,
    },
};

#[derive(Parser, Debug)]
#[command(name = "seed")]
#[command(about = "Populates a local database with products and pending orders", long_about = None)]
struct Args {
    /// SQLite connection string
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://storefront.db?mode=rwc")]
    database_url: String,

    /// Number of products to create
    #[arg(long, default_value_t = 12)]
    products: usize,

    /// Number of pending orders to create
    #[arg(long, default_value_t = 5)]
    orders: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    println!("🌱 Starting database seeding...");

    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&args.database_url)
        .await?;

    println!("📋 Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    let inventory_repo = SqliteInventoryRepository::new(db_pool.clone());
    let order_repo = SqliteOrderRepository::new(db_pool.clone());

    println!("📦 Creating products...");
    let mut products = Vec::with_capacity(args.products);
    for _ in 0..args.products {
        let words: Vec<String> = Words(1..3).fake();
        let product = inventory_repo
            .create_product(Product {
                id: Uuid::new_v4().to_string(),
                name: title_case(&words.join(" ")),
                price_cents: (990..49_990).fake::<i64>(),
                stock: (0..40).fake::<i64>(),
            })
            .await?;
        println!("  ✅ {} ({} in stock)", product.name, product.stock);
        products.push(product);
    }

    if products.is_empty() {
        println!("No products created, skipping orders");
        return Ok(());
    }

    println!("🧾 Creating pending orders...");
    for _ in 0..args.orders {
        let line_count = (1..4).fake::<usize>().min(products.len());
        let start = (0..products.len()).fake::<usize>();

        let items: Vec<OrderItem> = (0..line_count)
            .map(|offset| {
                let product = &products[(start + offset) % products.len()];
                OrderItem {
                    product_id: product.id.clone(),
                    quantity: (1..4).fake::<i64>(),
                    unit_price_cents: product.price_cents,
                }
            })
            .collect();
        let total_amount_cents = items
            .iter()
            .map(|item| item.quantity * item.unit_price_cents)
            .sum();

        let now = Utc::now();
        let user: String = FirstName().fake();
        let order = order_repo
            .create(Order {
                id: Uuid::new_v4().to_string(),
                user_id: format!("{}-{}", user.to_lowercase(), &Uuid::new_v4().to_string()[..8]),
                items,
                total_amount_cents,
                status: OrderStatus::Pending,
                payment_id: None,
                created_at: now,
                updated_at: now,
            })
            .await?;
        println!("  ✅ Order {} for {}", order.id, order.user_id);
    }

    println!("🎉 Seeding complete");
    Ok(())
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
