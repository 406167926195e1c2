use chrono::Duration;
use places_backend::auth::{issue_access_token, ACCESS_TOKEN_EXPIRY_MINUTES};
use places_backend::config::{AppConfig, DEFAULT_JWT_SECRET};
use std::env;

fn main() {
    dotenvy::dotenv().ok();

    let subject = env::args().nth(1).unwrap_or_else(|| {
        eprintln!("Usage: cargo run --bin issue-token <SUBJECT> [MINUTES]");
        std::process::exit(1);
    });
    let minutes = match env::args().nth(2) {
        Some(raw) => raw.parse::<i64>().unwrap_or_else(|_| {
            eprintln!("MINUTES must be a whole number, got {:?}", raw);
            std::process::exit(1);
        }),
        None => ACCESS_TOKEN_EXPIRY_MINUTES,
    };

    let config = AppConfig::from_env();
    if config.jwt_secret == DEFAULT_JWT_SECRET {
        eprintln!("warning: JWT_SECRET is not set, signing with the development default");
    }

    match issue_access_token(&config.jwt_secret, &subject, "staff", Duration::minutes(minutes)) {
        Ok(token) => {
            println!("\nSubject  : {}", subject);
            println!("Expires  : in {} minutes", minutes);
            println!("Token    : {}\n", token);
            println!("# Send it as:");
            println!("Authorization: Bearer {}", token);
        }
        Err(e) => {
            eprintln!("Error signing token: {}", e);
            std::process::exit(1);
        }
    }
}
