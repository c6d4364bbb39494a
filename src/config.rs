use std::net::SocketAddr;

use crate::error::AppError;
use crate::store::supabase::SupabaseConfig;

#[derive(Clone, Debug)]
pub enum StoreBackend {
    Supabase(SupabaseConfig),
    Sqlite { database_url: String, user_id: String },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub backend: StoreBackend,
    pub bind_addr: SocketAddr,
    pub realtime_poll_secs: u64,
}

impl AppConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, so tests need not touch
    /// the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend_name = var("STORE_BACKEND").unwrap_or_else(|| {
            if var("SUPABASE_URL").is_some() {
                "supabase".to_string()
            } else {
                "sqlite".to_string()
            }
        });

        let backend = match backend_name.as_str() {
            "supabase" => {
                let url = var("SUPABASE_URL")
                    .ok_or_else(|| AppError::Config("SUPABASE_URL is not set".to_string()))?;
                let anon_key = var("SUPABASE_ANON_KEY")
                    .ok_or_else(|| AppError::Config("SUPABASE_ANON_KEY is not set".to_string()))?;
                StoreBackend::Supabase(SupabaseConfig {
                    url,
                    anon_key,
                    access_token: var("SUPABASE_ACCESS_TOKEN"),
                })
            }
            "sqlite" => StoreBackend::Sqlite {
                database_url: var("DATABASE_URL")
                    .unwrap_or_else(|| "sqlite://studydash.db".to_string()),
                // An explicitly empty LOCAL_USER_ID means "signed out".
                user_id: lookup("LOCAL_USER_ID").unwrap_or_else(|| "local-user".to_string()),
            },
            other => {
                return Err(AppError::Config(format!("unknown STORE_BACKEND: {}", other)));
            }
        };

        let bind_addr = var("BIND_ADDR")
            .unwrap_or_else(|| "127.0.0.1:3000".to_string())
            .parse()
            .map_err(|e| AppError::Config(format!("invalid BIND_ADDR: {}", e)))?;

        let realtime_poll_secs = var("REALTIME_POLL_SECS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        Ok(Self {
            backend,
            bind_addr,
            realtime_poll_secs,
        })
    }
}
