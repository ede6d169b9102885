use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::{env, fmt, path::PathBuf, str::FromStr};

const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
const DEFAULT_RESEND_API_BASE: &str = "https://api.resend.com";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments; resolved once at startup
/// and handed to each component.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub max_upload_bytes: usize,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub email: EmailConfig,
}

#[derive(Clone)]
pub enum StorageConfig {
    Local {
        dir: PathBuf,
        public_base_url: String,
    },
    S3 {
        bucket: String,
        region: String,
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
        endpoint: Option<String>,
    },
}

#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub session_ttl_hours: i64,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub transport: EmailTransportConfig,
    /// Raw sender value as configured; validated by the email service.
    pub from: Option<String>,
    /// Base URL of the web app, used to build password-setup links.
    pub app_base_url: String,
}

#[derive(Clone)]
pub enum EmailTransportConfig {
    Resend { api_key: String, api_base: String },
    File { dir: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackend {
    Local,
    S3,
}

/// What the binary should do once configuration is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    Serve,
    Migrate,
    BootstrapAdmin(String),
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Sales PDF management API")]
pub struct Args {
    /// Host to bind to (overrides SALES_PDF_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides SALES_PDF_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides SALES_PDF_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Object storage backend (overrides SALES_PDF_STORAGE)
    #[arg(long, value_enum)]
    pub storage: Option<StorageBackend>,

    /// Directory for the local storage backend (overrides SALES_PDF_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Maximum accepted request body in bytes (overrides SALES_PDF_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,

    /// Create an ADMIN account for this email, send its setup email and exit
    #[arg(long, value_name = "EMAIL")]
    pub bootstrap_admin: Option<String>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and the run mode.
    pub fn from_env_and_args() -> Result<(Self, RunMode)> {
        let args = Args::parse();
        Self::resolve(args, |name| env::var(name).ok())
    }

    /// Merge CLI args over values produced by `lookup` (normally the process
    /// environment). Empty values count as unset.
    pub fn resolve<F>(args: Args, lookup: F) -> Result<(Self, RunMode)>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        // --- Server ---
        let host = args
            .host
            .or_else(|| var("SALES_PDF_HOST"))
            .unwrap_or_else(|| "0.0.0.0".into());
        let port = match args.port {
            Some(port) => port,
            None => parse_var(&var, "SALES_PDF_PORT", 3000)?,
        };
        let database_url = args
            .database_url
            .or_else(|| var("SALES_PDF_DATABASE_URL"))
            .unwrap_or_else(|| "sqlite://./data/sales_pdf.db".into());
        let max_upload_bytes = match args.max_upload_bytes {
            Some(limit) => limit,
            None => parse_var(&var, "SALES_PDF_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
        };

        // --- Object storage ---
        let backend = match args.storage {
            Some(backend) => backend,
            None => match var("SALES_PDF_STORAGE") {
                Some(raw) => <StorageBackend as ValueEnum>::from_str(&raw, true)
                    .map_err(|e| anyhow::anyhow!(e))
                    .with_context(|| format!("parsing SALES_PDF_STORAGE value `{}`", raw))?,
                None if var("AWS_BUCKET_NAME").is_some() => StorageBackend::S3,
                None => StorageBackend::Local,
            },
        };
        let storage = match backend {
            StorageBackend::Local => StorageConfig::Local {
                dir: args
                    .storage_dir
                    .or_else(|| var("SALES_PDF_STORAGE_DIR"))
                    .unwrap_or_else(|| "./data/objects".into())
                    .into(),
                public_base_url: var("SALES_PDF_PUBLIC_BASE_URL")
                    .unwrap_or_else(|| format!("http://localhost:{}/files", port))
                    .trim_end_matches('/')
                    .to_string(),
            },
            StorageBackend::S3 => {
                let Some(bucket) = var("AWS_BUCKET_NAME") else {
                    bail!("AWS_BUCKET_NAME is required for the s3 storage backend");
                };
                let access_key_id = var("AWS_ACCESS_KEY_ID");
                let secret_access_key = var("AWS_SECRET_ACCESS_KEY");
                if access_key_id.is_some() != secret_access_key.is_some() {
                    bail!("AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY must be set together");
                }
                StorageConfig::S3 {
                    bucket,
                    region: var("AWS_REGION").unwrap_or_else(|| "us-east-1".into()),
                    access_key_id,
                    secret_access_key,
                    endpoint: var("AWS_ENDPOINT_URL"),
                }
            }
        };

        // --- Auth ---
        let Some(jwt_secret) = var("SALES_PDF_JWT_SECRET") else {
            bail!("SALES_PDF_JWT_SECRET is not set");
        };
        let auth = AuthConfig {
            jwt_secret,
            session_ttl_hours: parse_var(&var, "SALES_PDF_SESSION_TTL_HOURS", 24)?,
        };

        // --- Email ---
        let transport = match var("RESEND_API_KEY") {
            Some(api_key) => EmailTransportConfig::Resend {
                api_key,
                api_base: var("RESEND_API_BASE")
                    .unwrap_or_else(|| DEFAULT_RESEND_API_BASE.into())
                    .trim_end_matches('/')
                    .to_string(),
            },
            None => EmailTransportConfig::File {
                dir: var("SALES_PDF_EMAIL_DIR")
                    .unwrap_or_else(|| "./data/emails".into())
                    .into(),
            },
        };
        let email = EmailConfig {
            transport,
            from: var("EMAIL_FROM").or_else(|| var("SENDGRID_FROM_EMAIL")),
            app_base_url: var("SALES_PDF_APP_BASE_URL")
                .unwrap_or_else(|| "http://localhost:3000".into())
                .trim_end_matches('/')
                .to_string(),
        };

        let mode = if args.migrate {
            RunMode::Migrate
        } else if let Some(email) = args.bootstrap_admin {
            RunMode::BootstrapAdmin(email)
        } else {
            RunMode::Serve
        };

        let cfg = Self {
            host,
            port,
            database_url,
            max_upload_bytes,
            storage,
            auth,
            email,
        };

        Ok((cfg, mode))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<F, T>(var: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(name) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        None => Ok(default),
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageConfig::Local {
                dir,
                public_base_url,
            } => f
                .debug_struct("Local")
                .field("dir", dir)
                .field("public_base_url", public_base_url)
                .finish(),
            StorageConfig::S3 {
                bucket,
                region,
                access_key_id,
                endpoint,
                ..
            } => f
                .debug_struct("S3")
                .field("bucket", bucket)
                .field("region", region)
                .field("explicit_credentials", &access_key_id.is_some())
                .field("endpoint", endpoint)
                .finish_non_exhaustive(),
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("session_ttl_hours", &self.session_ttl_hours)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for EmailTransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmailTransportConfig::Resend { api_base, .. } => f
                .debug_struct("Resend")
                .field("api_base", api_base)
                .finish_non_exhaustive(),
            EmailTransportConfig::File { dir } => {
                f.debug_struct("File").field("dir", dir).finish()
            }
        }
    }
}
