//! Back Office CLI
//!
//! Command-line interface for the marketplace back office API.

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;

use backoffice_client::BackofficeClient;
use backoffice_types::{
    ApiKeyId, CreatePaymentRequest, PaymentId, PaymentPatch, PaymentQuery, PaymentStatus, Role,
    UserId,
};

#[derive(Parser)]
#[command(name = "backoffice")]
#[command(author, version, about = "Marketplace back office CLI client", long_about = None)]
struct Cli {
    /// Base URL of the back office API
    #[arg(
        long,
        env = "BACKOFFICE_API_URL",
        default_value = "http://localhost:3000"
    )]
    api_url: String,

    /// API key for authentication
    #[arg(long, env = "BACKOFFICE_API_KEY")]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Payment lifecycle operations
    Payment {
        #[command(subcommand)]
        action: PaymentCommands,
    },
    /// Financial reports
    Report {
        #[command(subcommand)]
        action: ReportCommands,
    },
    /// API key management
    Key {
        #[command(subcommand)]
        action: KeyCommands,
    },
    /// Bootstrap the first administrator key
    Bootstrap {
        /// Name for the new API key
        #[arg(long, default_value = "bootstrap-key")]
        name: String,
    },
    /// Check API health
    Health,
}

/// Date and ownership filters shared by listing and reports.
#[derive(clap::Args)]
struct FilterArgs {
    /// Created at or after (RFC 3339 or YYYY-MM-DD)
    #[arg(long)]
    from: Option<String>,
    /// Created at or before (RFC 3339 or YYYY-MM-DD)
    #[arg(long)]
    to: Option<String>,
    /// Payer (admins only)
    #[arg(long, value_parser = parse_user_id)]
    user: Option<UserId>,
    /// Administrator who settled the payment
    #[arg(long, value_parser = parse_user_id)]
    processed_by: Option<UserId>,
}

impl FilterArgs {
    fn into_query(self) -> PaymentQuery {
        PaymentQuery {
            from: self.from,
            to: self.to,
            user_id: self.user,
            processed_by_id: self.processed_by,
            ..Default::default()
        }
    }
}

#[derive(Subcommand)]
enum PaymentCommands {
    /// Create a pending payment
    Create {
        /// Amount in minor units (cents)
        #[arg(long)]
        amount: i64,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        method: Option<String>,
        /// Payer (admins only; defaults to the caller)
        #[arg(long, value_parser = parse_user_id)]
        user: Option<UserId>,
    },
    /// Get payment details
    Get {
        /// Payment ID (UUID)
        #[arg(value_parser = parse_payment_id)]
        id: PaymentId,
    },
    /// List payments, newest first
    List {
        /// PENDING, PAID or CANCELLED
        #[arg(long, value_parser = parse_status)]
        status: Option<PaymentStatus>,
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        per_page: Option<u32>,
    },
    /// Update amount, description, method or status
    Update {
        #[arg(value_parser = parse_payment_id)]
        id: PaymentId,
        #[arg(long)]
        amount: Option<i64>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        method: Option<String>,
        #[arg(long, value_parser = parse_status)]
        status: Option<PaymentStatus>,
    },
    /// Cancel a payment (also allowed once paid)
    Cancel {
        #[arg(value_parser = parse_payment_id)]
        id: PaymentId,
    },
    /// Mark a pending payment as paid
    MarkPaid {
        #[arg(value_parser = parse_payment_id)]
        id: PaymentId,
        #[arg(long)]
        method: Option<String>,
    },
    /// Delete an unpaid payment
    Delete {
        #[arg(value_parser = parse_payment_id)]
        id: PaymentId,
    },
}

#[derive(Subcommand)]
enum ReportCommands {
    /// Report over visible payments, with the ten most recent
    Payments {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// System-wide report (admins only)
    Admin {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Issue a new API key
    Create {
        /// Name for the new key
        #[arg(long)]
        name: String,
        /// ADMIN, AGENCY or SUPPLIER
        #[arg(long, value_parser = parse_role)]
        role: Role,
        /// Attach to an existing user instead of creating one
        #[arg(long, value_parser = parse_user_id)]
        user: Option<UserId>,
    },
    /// List all API keys
    List,
    /// Delete (deactivate) an API key
    Delete {
        /// API key ID (UUID)
        #[arg(long, value_parser = parse_key_id)]
        id: ApiKeyId,
    },
}

fn parse_payment_id(s: &str) -> Result<PaymentId, String> {
    s.parse().map_err(|_| format!("Invalid payment ID: {}", s))
}

fn parse_user_id(s: &str) -> Result<UserId, String> {
    s.parse().map_err(|_| format!("Invalid user ID: {}", s))
}

fn parse_key_id(s: &str) -> Result<ApiKeyId, String> {
    s.parse().map_err(|_| format!("Invalid API key ID: {}", s))
}

fn parse_status(s: &str) -> Result<PaymentStatus, String> {
    s.to_ascii_uppercase().parse()
}

fn parse_role(s: &str) -> Result<Role, String> {
    s.parse()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut client = BackofficeClient::new(&cli.api_url);
    if let Some(key) = cli.api_key {
        client = client.with_api_key(key);
    }

    match cli.command {
        Commands::Health => {
            let healthy = client.health().await?;
            if healthy {
                println!("✓ API is healthy");
            } else {
                println!("✗ API is not healthy");
                std::process::exit(1);
            }
        }

        Commands::Payment { action } => match action {
            PaymentCommands::Create {
                amount,
                description,
                method,
                user,
            } => {
                let req = CreatePaymentRequest {
                    amount,
                    description,
                    payment_method: method,
                    user_id: user,
                };
                print_json(&client.create_payment(&req).await?)?;
            }
            PaymentCommands::Get { id } => {
                print_json(&client.get_payment(id).await?)?;
            }
            PaymentCommands::List {
                status,
                filter,
                page,
                per_page,
            } => {
                let query = PaymentQuery {
                    status,
                    page,
                    per_page,
                    ..filter.into_query()
                };
                print_json(&client.list_payments(&query).await?)?;
            }
            PaymentCommands::Update {
                id,
                amount,
                description,
                method,
                status,
            } => {
                let patch = PaymentPatch {
                    amount,
                    description,
                    payment_method: method,
                    status,
                };
                print_json(&client.update_payment(id, &patch).await?)?;
            }
            PaymentCommands::Cancel { id } => {
                let patch = PaymentPatch {
                    status: Some(PaymentStatus::Cancelled),
                    ..Default::default()
                };
                print_json(&client.update_payment(id, &patch).await?)?;
            }
            PaymentCommands::MarkPaid { id, method } => {
                print_json(&client.mark_paid(id, method).await?)?;
            }
            PaymentCommands::Delete { id } => {
                client.delete_payment(id).await?;
                println!("✓ Payment deleted");
            }
        },

        Commands::Report { action } => match action {
            ReportCommands::Payments { filter } => {
                let report = client
                    .payment_financial_report(&filter.into_query())
                    .await?;
                print_json(&report)?;
            }
            ReportCommands::Admin { from, to } => {
                let report = client
                    .admin_financial_report(from.as_deref(), to.as_deref())
                    .await?;
                print_json(&report)?;
            }
        },

        Commands::Key { action } => match action {
            KeyCommands::Create { name, role, user } => {
                let created = client.create_api_key(&name, role, user).await?;
                println!("{}", created.api_key);
                eprintln!("user: {} ({})", created.user_id, created.role);
            }
            KeyCommands::List => {
                print_json(&client.list_api_keys().await?)?;
            }
            KeyCommands::Delete { id } => {
                client.delete_api_key(id).await?;
                println!("✓ API key deleted");
            }
        },

        Commands::Bootstrap { name } => {
            let created = client.bootstrap(&name).await?;
            println!("{}", created.api_key);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_status_parsing_is_case_insensitive() {
        assert_eq!(parse_status("paid"), Ok(PaymentStatus::Paid));
        assert!(parse_status("refunded").is_err());
    }

    #[test]
    fn test_list_flags_build_query() {
        let cli = Cli::try_parse_from([
            "backoffice",
            "payment",
            "list",
            "--status",
            "pending",
            "--from",
            "2024-05-01",
            "--page",
            "2",
        ])
        .unwrap();

        let Commands::Payment {
            action:
                PaymentCommands::List {
                    status,
                    filter,
                    page,
                    ..
                },
        } = cli.command
        else {
            panic!("expected payment list");
        };
        assert_eq!(status, Some(PaymentStatus::Pending));
        assert_eq!(page, Some(2));
        assert_eq!(filter.into_query().from.as_deref(), Some("2024-05-01"));
    }
}
