//! PAdES signer CLI
//!
//! Signs PDFs through the remote signature service with a local PKCS#12 key, and
//! inspects certificates and signature policies.

use std::path::PathBuf;
use std::time::SystemTime;

use clap::{Parser, Subcommand};
use miette::{Context, IntoDiagnostic, Result};
use zeroize::Zeroizing;

use pades_signer::{
    adapters::text_visual_representation,
    infra::config::{API_KEY_ENV, PFX_PASSWORD_ENV},
    services::decode_certificate,
    CertificateIdentity, CertificateInspector, ConfigManager, KeyStoreReader, NationalId,
    RemoteServiceConfig, RemoteSigningClient, SessionOptions, SignaturePolicyRegistry,
    SigningSession,
};

#[derive(Parser)]
#[command(name = "pades-signer")]
#[command(about = "Client-side PAdES/CAdES signing with PKCS#12 keys")]
#[command(long_about = "
PAdES Signer - signs PDFs through a remote preparation service

EXAMPLES:
    # Sign a PDF with the default policy
    pades-signer sign contract.pdf --pfx signer.pfx

    # Sign with an ICP-Brasil policy and a visible appearance
    pades-signer sign contract.pdf --pfx signer.pfx --policy pades-icpbr-adr-basica --visible

    # Visible text appearance on a new last page
    pades-signer sign contract.pdf --pfx signer.pfx --signature-text \"Signed by {{name}}\"

    # Show who a certificate or key-store belongs to
    pades-signer inspect --pfx signer.pfx

ENVIRONMENT VARIABLES:
    PADES_API_KEY       API key for the signature service (required for sign)
    PADES_PFX_PASSWORD  PKCS#12 password
    RUST_LOG            Logging level (debug, info, warn, error)
")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the per-user location)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign a PDF through the remote service
    Sign {
        #[arg(value_name = "PDF")]
        input_file: PathBuf,

        /// PKCS#12 key-store holding the signing key
        #[arg(long, value_name = "PFX")]
        pfx: PathBuf,

        /// Output path (defaults to <input>.signed.pdf)
        #[arg(short, long, value_name = "OUTPUT_FILE")]
        output: Option<PathBuf>,

        /// Signature policy id (overrides config)
        #[arg(short, long)]
        policy: Option<String>,

        /// Request a visible signature appearance
        #[arg(long)]
        visible: bool,

        /// Do not ship intermediate certificates
        #[arg(long)]
        no_chain: bool,

        /// Text of a visible appearance ({{name}} and {{date}} are filled in by the service)
        #[arg(long, value_name = "TEXT")]
        signature_text: Option<String>,

        /// Font size of the appearance text
        #[arg(long, default_value_t = 10, requires = "signature_text")]
        font_size: u32,

        /// Security context id registered with the service
        #[arg(long, value_name = "ID")]
        security_context: Option<String>,

        /// Value the service hands back unchanged
        #[arg(long, value_name = "VALUE")]
        callback_argument: Option<String>,

        /// Service base URL (overrides config)
        #[arg(long, value_name = "URL")]
        url: Option<String>,
    },

    /// Show the identity in a certificate or key-store
    Inspect {
        /// Certificate file, DER or PEM
        #[arg(long, value_name = "CERT", conflicts_with = "pfx", required_unless_present = "pfx")]
        cert: Option<PathBuf>,

        /// PKCS#12 key-store
        #[arg(long, value_name = "PFX")]
        pfx: Option<PathBuf>,
    },

    /// List the available signature policies
    Policies,

    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a default configuration file if none exists
    Init,
    /// Print the active configuration
    Show,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new().into_diagnostic()?,
    };

    match cli.command {
        Commands::Sign {
            input_file,
            pfx,
            output,
            policy,
            visible,
            no_chain,
            signature_text,
            font_size,
            security_context,
            callback_argument,
            url,
        } => handle_sign_command(
            &manager,
            SignArgs {
                input_file,
                pfx,
                output,
                policy,
                visible,
                no_chain,
                signature_text,
                font_size,
                security_context,
                callback_argument,
                url,
            },
        ),
        Commands::Inspect { cert, pfx } => handle_inspect_command(cert, pfx),
        Commands::Policies => {
            handle_policies_command();
            Ok(())
        }
        Commands::Config(command) => handle_config_command(&manager, command),
    }
}

struct SignArgs {
    input_file: PathBuf,
    pfx: PathBuf,
    output: Option<PathBuf>,
    policy: Option<String>,
    visible: bool,
    no_chain: bool,
    signature_text: Option<String>,
    font_size: u32,
    security_context: Option<String>,
    callback_argument: Option<String>,
    url: Option<String>,
}

fn handle_sign_command(manager: &ConfigManager, args: SignArgs) -> Result<()> {
    let config = manager
        .load_or_create_default()
        .into_diagnostic()
        .wrap_err("Failed to load configuration")?;

    let api_key = secret(API_KEY_ENV)?;
    let password = secret(PFX_PASSWORD_ENV)?;

    let mut service = RemoteServiceConfig::new(
        args.url.unwrap_or(config.service.base_url),
        api_key,
    )
    .with_timeout(config.service.timeout_seconds);
    if !config.service.verify_tls {
        service = service.with_insecure_tls();
    }
    let client = RemoteSigningClient::new(service).into_diagnostic()?;

    let document = std::fs::read(&args.input_file)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to read {}", args.input_file.display()))?;
    let pfx_bytes = Zeroizing::new(
        std::fs::read(&args.pfx)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to read {}", args.pfx.display()))?,
    );

    let visual_representation = args
        .signature_text
        .as_deref()
        .map(|text| text_visual_representation(text, args.font_size));
    let options = SessionOptions {
        policy_id: args.policy.unwrap_or(config.default_policy),
        visible: (args.visible || config.visible_signature || visual_representation.is_some())
            .then_some(true),
        embed_chain: config.embed_chain && !args.no_chain,
        visual_representation,
        security_context_id: args.security_context,
        callback_argument: args.callback_argument.map(serde_json::Value::String),
    };
    let mut session = SigningSession::new(
        &client,
        &client,
        &SignaturePolicyRegistry::shared(),
        options,
    )
    .into_diagnostic()?;

    // The document is uploaded before the key-store is opened, so the decrypted
    // key only lives for the local signing step.
    session.prepare(&document).into_diagnostic()?;
    session.fetch_params().into_diagnostic()?;
    KeyStoreReader::with_bundle(&pfx_bytes, &password, |bundle| {
        session.sign_locally(bundle).map(|_| ())
    })
    .into_diagnostic()?;
    session.inject().into_diagnostic()?;
    let signed = session.finalize().into_diagnostic()?;

    let output_path = args
        .output
        .unwrap_or_else(|| args.input_file.with_extension("signed.pdf"));
    std::fs::write(&output_path, &signed)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to write {}", output_path.display()))?;

    println!("✅ Document signed successfully!");
    println!("  Output: {}", output_path.display());
    println!("  Policy: {}", session.policy().name);
    if let Some(signer) = session.signer() {
        println!("  Signer: {}", signer.subject);
    }
    Ok(())
}

fn handle_inspect_command(cert: Option<PathBuf>, pfx: Option<PathBuf>) -> Result<()> {
    let identity = match (cert, pfx) {
        (Some(path), _) => {
            let input = std::fs::read(&path)
                .into_diagnostic()
                .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
            let der = decode_certificate(&input).into_diagnostic()?;
            CertificateInspector::inspect(&der).into_diagnostic()?
        }
        (None, Some(path)) => {
            let password = secret(PFX_PASSWORD_ENV)?;
            let bundle = KeyStoreReader::open_file(&path, &password).into_diagnostic()?;
            println!("📦 Key-store: {} chain certificate(s)", bundle.chain().len());
            CertificateInspector::inspect(bundle.leaf_certificate().as_der())
                .into_diagnostic()?
        }
        (None, None) => miette::bail!("Either --cert or --pfx is required"),
    };
    print_identity(&identity);
    Ok(())
}

fn print_identity(identity: &CertificateIdentity) {
    let now = SystemTime::now();
    println!("📜 Certificate:");
    println!("  Subject: {}", identity.subject);
    println!("  Issuer: {}", identity.issuer);
    println!("  Serial: {}", identity.serial_number_hex);
    match &identity.national_id {
        Some(NationalId::Natural(digits)) => println!("  National ID (person): {digits}"),
        Some(NationalId::Organization(digits)) => {
            println!("  National ID (organization): {digits}");
        }
        None => {}
    }
    if identity.is_currently_valid(now) {
        println!("  Days until expiry: {}", identity.days_until_expiry(now));
    } else {
        println!("  ⚠️  Not valid at the current time");
    }
}

fn handle_policies_command() {
    let registry = SignaturePolicyRegistry::standard();
    println!("📋 Signature policies:");
    for policy in registry.iter() {
        let oid = policy
            .oid
            .map_or_else(|| "-".to_string(), |oid| oid.to_string());
        println!(
            "  {:<28} {:<6} {:<24} timestamp={} certified={}",
            policy.id,
            policy.kind.to_string(),
            oid,
            policy.requires_timestamp,
            policy.is_jurisdiction_certified
        );
    }
}

fn handle_config_command(manager: &ConfigManager, command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Init => {
            manager.load_or_create_default().into_diagnostic()?;
            println!("Configuration: {}", manager.config_path().display());
        }
        ConfigCommands::Show => {
            let config = manager.load().into_diagnostic()?;
            let rendered = toml::to_string_pretty(&config).into_diagnostic()?;
            println!("# {}", manager.config_path().display());
            print!("{rendered}");
        }
    }
    Ok(())
}

fn secret(name: &str) -> Result<Zeroizing<String>> {
    pades_signer::infra::config::secret_from_env(name).into_diagnostic()
}
