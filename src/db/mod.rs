use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use thiserror::Error;
use tokio_postgres::NoTls;

pub mod bill;

/// Rejections from the bill store, rendered verbatim to the user.
/// Exactly these two kinds exist - there is no structured status code
/// beyond them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Erreur 404")]
    NotFound,
    #[error("Erreur 500")]
    Internal,
}

pub struct PostgresStore {
    pub pool: Pool,
}

impl PostgresStore {
    pub async fn new(conn_str: &str) -> Result<Self, anyhow::Error> {
        let cfg: tokio_postgres::Config = conn_str.parse()?;
        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let pool = Pool::builder(Manager::from_config(cfg, NoTls, mgr_config))
            .max_size(16)
            .build()?;

        Ok(Self { pool })
    }

    pub async fn init(&self) -> Result<(), anyhow::Error> {
        let qry = r#"
            CREATE TABLE IF NOT EXISTS bills (
                id UUID PRIMARY KEY,
                email TEXT NOT NULL,
                expense_type TEXT NOT NULL,
                name TEXT NOT NULL,
                amount DOUBLE PRECISION NOT NULL,
                vat TEXT NOT NULL,
                pct INTEGER NOT NULL,
                bill_date TEXT NOT NULL,
                commentary TEXT,
                file_name TEXT NOT NULL,
                file_url TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TIMESTAMPTZ DEFAULT (NOW() AT TIME ZONE 'UTC')
            )
        "#;
        self.pool.get().await?.execute(qry, &[]).await?;
        Ok(())
    }
}
