//! Prelaunch CLI - terminal tools for the pre-registration landing page.
//!
//! # Usage
//!
//! ```bash
//! # Pre-register an email against a running server
//! prelaunch-cli register -e user@example.com --agree
//!
//! # Generate an ENV_ENCRYPTION_KEY
//! prelaunch-cli keygen
//!
//! # Encrypt a store credential for the environment
//! ENV_ENCRYPTION_KEY=... prelaunch-cli encrypt "$SUPABASE_SERVICE_ROLE_KEY"
//! ```
//!
//! # Commands
//!
//! - `register` - Submit the pre-registration form from the terminal
//! - `keygen` - Print a fresh AES-256 key as hex
//! - `encrypt` / `decrypt` - Convert values to and from the `iv:tag:ciphertext` form

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use prelaunch_core::submission::DEFAULT_SOURCE;

mod commands;

#[derive(Parser)]
#[command(name = "prelaunch-cli")]
#[command(author, version, about = "Pre-registration landing page tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pre-register an email with a running server
    Register {
        /// Email address to register
        #[arg(short, long)]
        email: String,

        /// Source tag stored with the registration
        #[arg(short, long, default_value = DEFAULT_SOURCE)]
        source: String,

        /// Agree to the privacy policy (required)
        #[arg(long)]
        agree: bool,

        /// Server base URL
        #[arg(long, default_value = "http://localhost:3000")]
        base_url: String,

        /// Stay until the button reverts to idle
        #[arg(long)]
        wait: bool,
    },
    /// Generate a new encryption key
    Keygen,
    /// Encrypt a value with `ENV_ENCRYPTION_KEY`
    Encrypt {
        /// Plain text to encrypt
        plaintext: String,
    },
    /// Decrypt a value with `ENV_ENCRYPTION_KEY`
    Decrypt {
        /// Value in `iv:tag:ciphertext` form
        value: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Register {
            email,
            source,
            agree,
            base_url,
            wait,
        } => {
            let options = commands::register::RegisterOptions {
                email,
                source,
                consent: agree,
                base_url,
                wait,
            };
            commands::register::run(options).await?;
        }
        Commands::Keygen => commands::secrets::keygen(),
        Commands::Encrypt { plaintext } => commands::secrets::encrypt(&plaintext)?,
        Commands::Decrypt { value } => commands::secrets::decrypt(&value)?,
    }
    Ok(())
}
