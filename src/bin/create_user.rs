use std::io::{self, Write};

use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use leadstore_api::auth::JwtService;

#[derive(Parser, Debug)]
#[command(name = "create_user", about = "Create a Leadstore user account")]
struct Args {
    /// Email address for the account (case insensitive).
    #[arg(long)]
    email: String,

    /// Role to assign (`user` or `admin`).
    #[arg(long, default_value = "user")]
    role: String,

    /// Initial credit balance.
    #[arg(long, default_value_t = 0)]
    credits: i32,

    /// Also mint an access token for the new account (requires
    /// LEADSTORE_JWT_SECRET).
    #[arg(long)]
    issue_token: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();
    let email = args.email.trim().to_lowercase();

    if !email.contains('@') {
        writeln!(io::stderr(), "error: email must contain '@'")?;
        std::process::exit(1);
    }

    let role = match args.role.trim().to_lowercase().as_str() {
        "admin" => "admin",
        "user" => "user",
        other => {
            writeln!(
                io::stderr(),
                "error: unsupported role '{other}'. Use 'user' or 'admin'."
            )?;
            std::process::exit(1);
        }
    };

    if args.credits < 0 {
        writeln!(io::stderr(), "error: credits must not be negative")?;
        std::process::exit(1);
    }

    let database_url = std::env::var("DATABASE_URL")?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    let existing =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE lower(email) = lower($1)")
            .bind(&email)
            .fetch_one(&pool)
            .await?;

    if existing > 0 {
        writeln!(
            io::stderr(),
            "error: a user with email '{email}' already exists."
        )?;
        std::process::exit(1);
    }

    let user_id: i32 = sqlx::query_scalar(
        "INSERT INTO users (email, role, credits) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(&email)
    .bind(role)
    .bind(args.credits)
    .fetch_one(&pool)
    .await?;

    println!("Created {role} user '{email}' with id {user_id} and {} credits", args.credits);

    if args.issue_token {
        let jwt = JwtService::from_env()
            .map_err(|err| io::Error::other(format!("jwt config failed: {err}")))?;
        let signed = jwt
            .issue_access_token(user_id, &email, role)
            .map_err(|err| io::Error::other(format!("token issuance failed: {err}")))?;
        println!("Access token (expires {}):", signed.expires_at);
        println!("{}", signed.token);
    }

    Ok(())
}
