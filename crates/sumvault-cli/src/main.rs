//! Sumvault CLI - wallet-encrypted chat summaries
//!
//! Usage:
//!   sumvault address   - Show (and optionally verify) the wallet address
//!   sumvault encrypt   - Encrypt text into an envelope
//!   sumvault decrypt   - Decrypt an envelope
//!   sumvault summary   - Manage stored summaries

mod config;

use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use sumvault_crypto::signer::recover_address;
use sumvault_crypto::{key_derivation_message, CryptoError, SummaryCrypto, WalletSigner};
use sumvault_store::contract::to_contract_bytes;
use sumvault_store::{
    generate_session_id, ConversationStats, SqliteSummaryStore, SummaryRecord, SummaryStore,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sumvault")]
#[command(author = "HeyBattle1")]
#[command(version)]
#[command(about = "Chat summaries encrypted under a wallet signature", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: config::CliConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the wallet address
    Address {
        /// Sign the key-derivation message and check it recovers to this address
        #[arg(long)]
        verify: bool,
    },

    /// Encrypt text and print the envelope
    Encrypt(TextInput),

    /// Decrypt an envelope and print the plaintext
    Decrypt {
        /// Envelope string
        #[arg(long, conflicts_with = "file")]
        envelope: Option<String>,

        /// Read the envelope from a file
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Manage stored summaries
    Summary {
        #[command(subcommand)]
        action: SummaryAction,
    },
}

/// Plaintext from a flag, a file, or stdin
#[derive(Args)]
struct TextInput {
    /// Text to encrypt
    #[arg(long, conflicts_with = "file")]
    text: Option<String>,

    /// Read text from a file
    #[arg(long)]
    file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum SummaryAction {
    /// Encrypt and store a summary
    Save {
        /// Title shown in listings (stored unencrypted)
        #[arg(long)]
        title: String,

        #[command(flatten)]
        input: TextInput,

        /// Topic label (stored unencrypted)
        #[arg(long)]
        topic: Option<String>,

        /// Chat session id (generated if omitted)
        #[arg(long)]
        session: Option<String>,

        /// Number of messages in the summarized conversation
        #[arg(long, default_value_t = 0)]
        messages: u32,

        /// Conversation length in minutes
        #[arg(long, default_value_t = 0)]
        duration_minutes: i64,

        /// RFC 3339 timestamps of the conversation's messages; sets the
        /// message count and duration
        #[arg(
            long,
            value_delimiter = ',',
            conflicts_with_all = ["messages", "duration_minutes"]
        )]
        message_times: Vec<DateTime<Utc>>,
    },

    /// List stored summaries for this wallet
    List,

    /// Decrypt and print a stored summary
    Show {
        /// Summary id
        id: String,
    },

    /// Delete a stored summary
    Delete {
        /// Summary id
        id: String,
    },

    /// Delete every stored summary for this wallet
    Clear,

    /// Print a stored envelope without decrypting it
    Export {
        /// Summary id
        id: String,

        /// Encode as 0x-hex bytes for the summary contract
        #[arg(long, conflicts_with = "json")]
        contract_bytes: bool,

        /// Print the whole record (metadata and envelope) as JSON
        #[arg(long)]
        json: bool,
    },

    /// Record that a summary was written to the summary contract
    MarkOnchain {
        /// Summary id
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so envelopes on stdout stay pipeable
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let signer = cli.config.signer()?;
    let crypto = SummaryCrypto::new(signer.clone());

    match cli.command {
        Commands::Address { verify } => {
            let address = owner(&crypto)?;
            println!("{address}");
            if verify {
                verify_address(signer.as_ref(), &address).await?;
                println!("✅ Signature recovers to {address}");
            }
        }

        Commands::Encrypt(input) => {
            let plaintext = read_text(input)?;
            println!("{}", crypto.encrypt(&plaintext).await?);
        }

        Commands::Decrypt { envelope, file } => {
            let envelope = match (envelope, file) {
                (Some(envelope), _) => envelope,
                (None, file) => read_source(file)?,
            };
            println!("{}", crypto.decrypt(envelope.trim()).await?);
        }

        Commands::Summary { action } => {
            let store = SqliteSummaryStore::open(cli.config.db_path()?)
                .context("Failed to open summary database")?;
            run_summary(action, &crypto, &store).await?;
        }
    }

    Ok(())
}

async fn run_summary(
    action: SummaryAction,
    crypto: &SummaryCrypto,
    store: &dyn SummaryStore,
) -> anyhow::Result<()> {
    let owner = owner(crypto)?;

    match action {
        SummaryAction::Save {
            title,
            input,
            topic,
            session,
            messages,
            duration_minutes,
            message_times,
        } => {
            let plaintext = read_text(input)?;
            if plaintext.trim().is_empty() {
                bail!("Refusing to save an empty summary");
            }

            let stats = conversation_stats(messages, duration_minutes, &message_times);
            let envelope = crypto.encrypt(&plaintext).await?;
            let mut record = SummaryRecord::new(owner.as_str(), envelope)
                .with_title(title)
                .with_session(session.unwrap_or_else(generate_session_id))
                .with_stats(stats);
            if let Some(topic) = topic {
                record = record.with_topic(topic);
            }

            store.save(&record)?;
            println!("✅ Saved {}", record.id);
        }

        SummaryAction::List => {
            let records = store.list(&owner)?;
            if records.is_empty() {
                println!("No summaries stored for {owner}");
            }
            for record in records {
                println!(
                    "{}  {}  {}{}",
                    record.id,
                    record.created_at.format("%Y-%m-%d %H:%M"),
                    record.title.as_deref().unwrap_or("(untitled)"),
                    if record.contract_stored { "  [on-chain]" } else { "" },
                );
            }
        }

        SummaryAction::Show { id } => {
            let record = store.get(&owner, &id)?;
            let plaintext = crypto.decrypt(&record.envelope).await?;
            if let Some(title) = &record.title {
                println!("# {title}");
            }
            println!(
                "{} messages, {} minutes, session {}",
                record.conversation_length,
                record.duration_minutes.unwrap_or(0),
                record.session_id.as_deref().unwrap_or("-"),
            );
            println!();
            println!("{plaintext}");
        }

        SummaryAction::Delete { id } => {
            store.delete(&owner, &id)?;
            println!("✅ Deleted {id}");
        }

        SummaryAction::Clear => {
            let deleted = store.clear(&owner)?;
            println!("✅ Deleted {deleted} summaries");
        }

        SummaryAction::Export {
            id,
            contract_bytes,
            json,
        } => {
            let record = store.get(&owner, &id)?;
            if contract_bytes {
                println!("{}", to_contract_bytes(&record.envelope));
            } else if json {
                println!("{}", record.to_json()?);
            } else {
                println!("{}", record.envelope);
            }
        }

        SummaryAction::MarkOnchain { id } => {
            store.mark_contract_stored(&owner, &id)?;
            println!("✅ Marked {id} as stored on-chain");
        }
    }

    Ok(())
}

/// Message timestamps win over the explicit count and duration
fn conversation_stats(
    messages: u32,
    duration_minutes: i64,
    message_times: &[DateTime<Utc>],
) -> ConversationStats {
    if message_times.is_empty() {
        ConversationStats {
            message_count: messages,
            duration_minutes,
        }
    } else {
        ConversationStats::from_timestamps(message_times)
    }
}

fn owner(crypto: &SummaryCrypto) -> anyhow::Result<String> {
    Ok(crypto.address().ok_or(CryptoError::WalletNotConnected)?)
}

async fn verify_address(signer: &dyn WalletSigner, address: &str) -> anyhow::Result<()> {
    let message = key_derivation_message(address);
    let signature = signer
        .sign_message(&message)
        .await
        .map_err(|e| CryptoError::SignatureRejected(e.to_string()))?;
    let recovered = recover_address(&message, &signature)?;
    if recovered != address {
        bail!("Signature recovers to {recovered}, expected {address}");
    }
    Ok(())
}

fn read_text(input: TextInput) -> anyhow::Result<String> {
    match input.text {
        Some(text) => Ok(text),
        None => read_source(input.file),
    }
}

/// Read a file, or stdin when no file is given
fn read_source(file: Option<PathBuf>) -> anyhow::Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn save_stats(args: &[&str]) -> ConversationStats {
        let base = ["sumvault", "summary", "save", "--title", "t", "--text", "x"];
        let cli = Cli::try_parse_from(base.iter().chain(args)).unwrap();
        match cli.command {
            Commands::Summary {
                action:
                    SummaryAction::Save {
                        messages,
                        duration_minutes,
                        message_times,
                        ..
                    },
            } => conversation_stats(messages, duration_minutes, &message_times),
            _ => panic!("expected summary save"),
        }
    }

    #[test]
    fn test_stats_from_flags() {
        let stats = save_stats(&["--messages", "14", "--duration-minutes", "9"]);
        assert_eq!(stats.message_count, 14);
        assert_eq!(stats.duration_minutes, 9);
    }

    #[test]
    fn test_stats_from_message_times() {
        let stats = save_stats(&[
            "--message-times",
            "2025-01-01T12:00:00Z,2025-01-01T12:01:00Z,2025-01-01T12:04:40Z",
        ]);
        assert_eq!(stats.message_count, 3);
        // 4m40s rounds to 5
        assert_eq!(stats.duration_minutes, 5);
    }

    #[test]
    fn test_message_times_conflict_with_counts() {
        let result = Cli::try_parse_from([
            "sumvault",
            "summary",
            "save",
            "--title",
            "t",
            "--messages",
            "3",
            "--message-times",
            "2025-01-01T12:00:00Z",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_export_modes_conflict() {
        let result = Cli::try_parse_from([
            "sumvault",
            "summary",
            "export",
            "summary_x",
            "--json",
            "--contract-bytes",
        ]);
        assert!(result.is_err());
    }
}
