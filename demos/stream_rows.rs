//! Stream a query through a server-side cursor and print rows as JSON lines
//!
//! ```bash
//! export db_host=localhost db_name=analytics db_user=reporter db_password=secret db_port=5432
//! RUST_LOG=pg_session=debug cargo run --example stream_rows -- "SELECT * FROM events"
//! ```

use futures::TryStreamExt;
use pg_session::{Session, SessionConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pg_session=info")),
        )
        .init();

    let query = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "SELECT n FROM generate_series(1, 10) AS n".to_string());

    let config = SessionConfig::builder()
        .cursor_name("stream_rows")
        .fetch_size(500)
        .build();
    let mut session = Session::connect(config).await?;

    let mut count = 0u64;
    {
        let mut rows = session.iterate(&query).await?;
        while let Some(row) = rows.try_next().await? {
            println!("{}", row.to_json());
            count += 1;
        }
    }
    tracing::info!(rows = count, "done");

    session.close().await;
    Ok(())
}
