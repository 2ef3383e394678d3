use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use infoblox_resources::{
    ProviderContext, SharedContext,
    config::{self, ProviderConfig},
    db::{self, Db, state_repo},
    infoblox::client::WapiClient,
    lifecycle,
    resources::ResourceKind,
};
use serde_json::Value;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, rename_all = "kebab-case")]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,
    /// Path to the SQLite state database
    #[arg(long, value_name = "PATH", env = "INFOBLOX_STATE_DB", default_value = "infoblox-state.db")]
    state_db: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
#[command(rename_all = "kebab-case")]
struct ConnectionArgs {
    /// Grid master host name or address
    #[arg(long, value_name = "HOST", env = "INFOBLOX_SERVER")]
    server: String,
    /// WAPI port
    #[arg(long, value_name = "PORT", env = "INFOBLOX_PORT", default_value_t = config::DEFAULT_PORT)]
    port: u16,
    /// WAPI version, e.g. 2.7
    #[arg(long, value_name = "VERSION", env = "INFOBLOX_WAPI_VERSION", default_value = config::DEFAULT_WAPI_VERSION)]
    wapi_version: String,
    #[arg(long, value_name = "USER", env = "INFOBLOX_USERNAME")]
    username: String,
    #[arg(long, value_name = "PASSWORD", env = "INFOBLOX_PASSWORD", hide_env_values = true)]
    password: String,
    /// Accept self-signed appliance certificates
    #[arg(long, env = "INFOBLOX_NO_SSL_VERIFY")]
    no_ssl_verify: bool,
    /// HTTP request timeout in seconds
    #[arg(long, value_name = "SECONDS", env = "INFOBLOX_REQUEST_TIMEOUT", default_value_t = 60)]
    request_timeout: u64,
    /// Cloud management platform type recorded on objects
    #[arg(long, value_name = "TYPE", env = "INFOBLOX_CMP_TYPE", default_value = config::DEFAULT_CMP_TYPE)]
    cmp_type: String,
    #[arg(long, value_name = "VIEW", env = "INFOBLOX_NETWORK_VIEW", default_value = config::DEFAULT_NETWORK_VIEW)]
    default_network_view: String,
    #[arg(long, value_name = "VIEW", env = "INFOBLOX_DNS_VIEW", default_value = config::DEFAULT_DNS_VIEW)]
    default_dns_view: String,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Command {
    /// Create or update a resource
    Apply {
        /// State address, e.g. a_record.web
        #[arg(long)]
        address: String,
        /// Resource type (a_record, aaaa_record, ptr_record, ipv4_association, ipv6_association)
        #[arg(long = "type", value_name = "TYPE")]
        kind: ResourceKind,
        #[command(flatten)]
        attributes: AttributesArgs,
    },
    /// Re-read resources from the appliance (all of them when no address is given)
    Refresh {
        #[arg(long)]
        address: Option<String>,
    },
    /// Destroy a resource
    Destroy {
        #[arg(long)]
        address: String,
        #[command(flatten)]
        attributes: AttributesArgs,
    },
    /// List managed resources
    List,
}

#[derive(Args, Debug)]
struct AttributesArgs {
    /// Resource attributes as a JSON object
    #[arg(long, value_name = "JSON", conflicts_with = "file")]
    json: Option<String>,
    /// File holding the resource attributes as a JSON object
    #[arg(long, value_name = "PATH")]
    file: Option<PathBuf>,
}

impl AttributesArgs {
    fn load(&self) -> Result<Option<Value>> {
        let text = match (&self.json, &self.file) {
            (Some(json), _) => json.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?,
            (None, None) => return Ok(None),
        };
        let value: Value = serde_json::from_str(&text).context("attributes are not valid JSON")?;
        if !value.is_object() {
            bail!("attributes must be a JSON object");
        }
        Ok(Some(value))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = build_provider_config(&cli.connection)?;
    let ctx = init_context(&config)?;
    let db = init_state(&cli.state_db).await?;

    match cli.command {
        Command::Apply {
            address,
            kind,
            attributes,
        } => {
            let Some(planned) = attributes.load()? else {
                bail!("apply needs --json or --file");
            };
            let (action, applied) = lifecycle::apply(&ctx, &db, &address, kind, planned)
                .await
                .with_context(|| format!("failed to apply {address}"))?;
            info!(%address, reference = %applied.id, ?action, "done");
            println!("{}", serde_json::to_string_pretty(&applied.state)?);
        }
        Command::Refresh { address } => {
            let addresses = match address {
                Some(address) => vec![address],
                None => state_repo::list(&db)
                    .await?
                    .into_iter()
                    .map(|stored| stored.address)
                    .collect(),
            };
            for address in addresses {
                match lifecycle::refresh(&ctx, &db, &address)
                    .await
                    .with_context(|| format!("failed to refresh {address}"))?
                {
                    Some(_) => println!("{address}: present"),
                    None => println!("{address}: gone, removed from state"),
                }
            }
        }
        Command::Destroy {
            address,
            attributes,
        } => {
            let planned = attributes.load()?;
            let destroyed = lifecycle::destroy(&ctx, &db, &address, planned)
                .await
                .with_context(|| format!("failed to destroy {address}"))?;
            if !destroyed {
                println!("{address}: not managed");
            }
        }
        Command::List => {
            for stored in state_repo::list(&db).await? {
                println!(
                    "{}\t{}\t{}\t{}",
                    stored.address,
                    stored.resource_type,
                    stored.reference,
                    stored.updated_at.to_rfc3339()
                );
            }
        }
    }

    Ok(())
}

fn build_provider_config(args: &ConnectionArgs) -> Result<ProviderConfig> {
    let mut config = ProviderConfig::new(&args.server, &args.username, &args.password);
    config.port = args.port;
    config.wapi_version = args.wapi_version.clone();
    config.ssl_verify = !args.no_ssl_verify;
    config.http_request_timeout = Duration::from_secs(args.request_timeout);
    config.cmp_type = args.cmp_type.clone();
    config.default_network_view = args.default_network_view.clone();
    config.default_dns_view = args.default_dns_view.clone();
    config.validate().context("invalid connection settings")?;
    Ok(config)
}

fn init_context(config: &ProviderConfig) -> Result<SharedContext> {
    let client = WapiClient::new(config).context("failed to build WAPI client")?;
    info!(url = %config.wapi_base_url(), "using WAPI");
    Ok(Arc::new(ProviderContext::new(config, Arc::new(client))))
}

async fn init_state(path: &std::path::Path) -> Result<Db> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create state directory {}", parent.display()))?;
    }
    db::init_db(path)
        .await
        .with_context(|| format!("failed to open state database {}", path.display()))
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,sqlx=warn".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}
