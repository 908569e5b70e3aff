//! Create an admin account, or promote and re-key an existing one.
//!
//! Usage: cargo run --bin seed-admin <EMAIL> <PASSWORD> [NAME]

use bcrypt::{hash, DEFAULT_COST};
use chrono::Utc;
use std::env;
use uuid::Uuid;

use cms_backend::db::{self, models::{Role, User}, DbConfig};
use cms_backend::store::{EntityStore, PgStore};

fn usage() -> ! {
    eprintln!("Usage: cargo run --bin seed-admin <EMAIL> <PASSWORD> [NAME]");
    std::process::exit(1);
}

fn fail(context: &str, e: impl std::fmt::Display) -> ! {
    eprintln!("{context}: {e}");
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let mut args = env::args().skip(1);
    let email = args.next().unwrap_or_else(|| usage()).trim().to_lowercase();
    let password = args.next().unwrap_or_else(|| usage());
    let name = args.next().unwrap_or_else(|| "Admin".to_string());
    if password.len() < 6 {
        fail("Invalid password", "must be at least 6 characters");
    }
    if env::var("DATABASE_URL").is_err() {
        fail("Missing configuration", "DATABASE_URL must be set");
    }

    let password_hash = hash(&password, DEFAULT_COST).unwrap_or_else(|e| fail("Error hashing password", e));

    let pool = db::init_pool(&DbConfig::default())
        .await
        .unwrap_or_else(|e| fail("Database unavailable", e));
    db::run_migrations(&pool)
        .await
        .unwrap_or_else(|e| fail("Migrations failed", e));
    let store = PgStore::new(pool);

    let existing = store
        .find_user_by_email(&email)
        .await
        .unwrap_or_else(|e| fail("User lookup failed", e));

    let now = Utc::now();
    let result = match existing {
        Some(user) => {
            store
                .update_user(&User {
                    password_hash,
                    role: Role::Admin,
                    updated_at: now,
                    ..user
                })
                .await
        }
        None => {
            store
                .insert_user(&User {
                    id: Uuid::new_v4(),
                    name,
                    email,
                    password_hash,
                    role: Role::Admin,
                    created_at: now,
                    updated_at: now,
                })
                .await
        }
    };

    match result {
        Ok(user) => {
            println!("\nAdmin ready");
            println!("Id    : {}", user.id);
            println!("Email : {}", user.email);
            println!("Cost  : {}\n", DEFAULT_COST);
        }
        Err(e) => fail("Error saving admin", e),
    }
}
