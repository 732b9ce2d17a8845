use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::http::Request;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;

use access_gate::authz::{Bindings, Identity, Permission, PermissionGate, Role, SqliteRoleStore, DEFAULT_IDENTITY_HEADER};
use access_gate::db;
use access_gate::events::{init_audit_bus, verify_chain};

#[derive(Parser, Debug)]
#[command(author, version, about = "access-gate store administration", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply pending migrations
    Migrate,
    /// Assign (or reassign) the role of an identity
    AssignRole { identity: String, role: String },
    /// Remove the role assignment of an identity
    UnassignRole { identity: String },
    /// Bind a permission to a role
    Grant { role: String, permission: String },
    /// Remove a permission from a role
    Revoke { role: String, permission: String },
    /// Merge a JSON bindings file into the store
    Import { file: PathBuf },
    /// Print the store contents as a JSON bindings document
    Export,
    /// Evaluate the gate for an identity and permission without serving traffic
    Check { identity: String, permission: String },
    /// Verify the audit log hash chain
    AuditVerify,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Try to load env from CWD; fall back to the crate-local `.env`.
    if dotenv().is_err() {
        let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    let pool = db::init(&database_url).await?;
    let store = SqliteRoleStore::new(pool.clone());

    match cli.command {
        Commands::Migrate => {
            // db::init already ran them
            println!("Migrations applied");
        }
        Commands::AssignRole { identity, role } => {
            let identity = Identity::parse(&identity).context("identity must not be empty")?;
            match store.assign_role(&identity, &Role::from(role.as_str())).await? {
                Some(previous) => println!("{identity}: {previous} -> {role}"),
                None => println!("{identity}: {role}"),
            }
        }
        Commands::UnassignRole { identity } => {
            let identity = Identity::parse(&identity).context("identity must not be empty")?;
            match store.unassign_role(&identity).await? {
                Some(previous) => println!("{identity}: {previous} removed"),
                None => println!("{identity} had no role"),
            }
        }
        Commands::Grant { role, permission } => {
            let added = store.grant(&Role::from(role.as_str()), &Permission::from(permission.as_str())).await?;
            if added {
                println!("granted {permission} to {role}");
            } else {
                println!("{role} already has {permission}");
            }
        }
        Commands::Revoke { role, permission } => {
            let removed = store.revoke(&Role::from(role.as_str()), &Permission::from(permission.as_str())).await?;
            if removed {
                println!("revoked {permission} from {role}");
            } else {
                println!("{role} did not have {permission}");
            }
        }
        Commands::Import { file } => {
            let bindings = Bindings::from_json_file(&file)?;
            store.import(&bindings).await?;
            println!(
                "imported {} identities and {} roles from {}",
                bindings.users.len(),
                bindings.roles.len(),
                file.display()
            );
        }
        Commands::Export => {
            let bindings = store.snapshot().await?;
            println!("{}", serde_json::to_string_pretty(&bindings)?);
        }
        Commands::Check { identity, permission } => {
            let (bus, mut rx) = init_audit_bus();
            let gate = PermissionGate::new(permission.as_str(), Arc::new(store), bus);

            let (parts, _) = Request::builder()
                .uri("/check")
                .header(DEFAULT_IDENTITY_HEADER, identity.as_str())
                .body(())?
                .into_parts();

            let outcome = gate.handle(&parts).await;
            let event = rx.try_recv().context("gate produced no decision record")?;

            println!(
                "identity={} role={} permission={} decision={}",
                identity,
                event.role.as_ref().map(Role::as_str).unwrap_or("-"),
                permission,
                event.decision.as_str()
            );
            if let Err(err) = outcome {
                println!("response: {} {}", err.status(), err.public_message());
            }
        }
        Commands::AuditVerify => {
            let verification = verify_chain(&pool).await?;
            match verification.broken_at {
                None => println!("audit chain intact ({} records)", verification.checked),
                Some(seq) => anyhow::bail!(
                    "audit chain broken at seq {} after {} valid records",
                    seq,
                    verification.checked
                ),
            }
        }
    }

    Ok(())
}
