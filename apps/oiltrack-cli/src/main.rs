//! # oiltrack: Operator CLI
//!
//! One service call per invocation. Results are printed as JSON; exports are
//! written to files.

mod args;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use oiltrack_core::export::DateRange;
use oiltrack_core::validation::SupplyForm;
use oiltrack_core::{NewBranch, NewDriver, NewLoadSession, NewOilType, Role};
use oiltrack_db::CascadeReport;
use oiltrack_ledger::{LedgerContext, LedgerResult, OilTrackConfig, StaticIdentity};

use args::{BranchCmd, Cli, Commands, DriverCmd, OilTypeCmd};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    if let Commands::InitConfig = cli.command {
        OilTrackConfig::default().save(cli.config.clone())?;
        println!("Config written");
        return Ok(());
    }

    let config = OilTrackConfig::load(cli.config.clone()).context("loading config")?;
    let mut ctx = LedgerContext::from_config(config)
        .await
        .context("opening ledger")?;

    if let Some(uid) = cli.user.as_deref() {
        let role = acting_role(&ctx, uid).await.context("looking up --user")?;
        ctx = ctx.with_identity(Arc::new(StaticIdentity::new(uid, role)));
    }

    run(&ctx, cli.command).await?;
    ctx.db().close().await;
    Ok(())
}

/// Directory role of `uid`; unknown users act as plain users.
async fn acting_role(ctx: &LedgerContext, uid: &str) -> LedgerResult<Role> {
    match ctx.reference().get_driver(uid).await {
        Ok(user) => Ok(user.role),
        Err(e) if e.is_not_found() => Ok(Role::User),
        Err(e) => Err(e),
    }
}

/// Logs go to stderr so JSON on stdout stays parseable.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,oiltrack=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(ctx: &LedgerContext, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Load {
            oil_type,
            liters,
            meter,
            location,
        } => {
            let oil = ctx.reference().get_oil_type(&oil_type).await?;
            let session = ctx
                .ledger()
                .create_load_session(NewLoadSession {
                    oil_type_id: oil.id,
                    oil_type_name: oil.name,
                    total_loaded_liters: liters,
                    load_location_id: location,
                    load_meter_reading: meter,
                    ..Default::default()
                })
                .await?;
            print_json(&session)?;
        }
        Commands::Supply {
            session,
            branch,
            oil_type,
            liters,
            order,
            start_meter,
            end_meter,
        } => {
            let branch = ctx.reference().get_branch(&branch).await?;
            let oil = ctx.reference().get_oil_type(&oil_type).await?;
            let start_meter = match start_meter {
                Some(m) => Some(m),
                None => ctx.deliveries().suggested_start_meter().await?,
            };
            let receipt = ctx
                .deliveries()
                .submit_supply_form(SupplyForm {
                    load_session_id: session,
                    delivery_order_id: order,
                    branch_id: branch.id,
                    branch_name: branch.name,
                    oil_type_id: oil.id,
                    oil_type_name: oil.name,
                    oil_supplied_liters: Some(liters),
                    start_meter_reading: start_meter,
                    end_meter_reading: end_meter,
                    ..Default::default()
                })
                .await?;
            if receipt.newly_completed {
                info!(load_session_id = %receipt.delivery.load_session_id, "Load session completed");
            }
            print_json(&receipt.delivery)?;
        }
        Commands::Sessions { active } => {
            let sessions = if active {
                ctx.ledger().active_sessions().await?
            } else {
                ctx.ledger().all_sessions().await?
            };
            print_json(&sessions)?;
        }
        Commands::Balance { session } => print_json(&ctx.ledger().session_balance(&session).await?)?,
        Commands::Reconcile => print_json(&ctx.ledger().reconcile_all().await?)?,
        Commands::ExportCsv { out } => {
            let export = ctx.reporting().export_csv().await?;
            write_file(&out, &export.filename, export.content.as_bytes()).await?;
        }
        Commands::ExportPhotos { start, end, out } => {
            let archive = ctx
                .reporting()
                .export_photos(DateRange::new(start, end)?)
                .await?;
            write_file(&out, &archive.filename, &archive.bytes).await?;
        }
        Commands::PhotoStats { start, end } => print_json(
            &ctx.reporting()
                .photo_statistics(DateRange::new(start, end)?)
                .await?,
        )?,
        Commands::Purge {
            collection,
            start,
            end,
        } => {
            let deleted = ctx
                .maintenance()
                .delete_records_by_date_range(&collection, start, end)
                .await?;
            print_json(&serde_json::json!({ "collection": collection, "deleted": deleted }))?;
        }
        Commands::PurgePhotos { start, end } => {
            let deleted = ctx
                .maintenance()
                .delete_photos_in_date_range(DateRange::new(start, end)?)
                .await?;
            print_json(&serde_json::json!({ "deleted": deleted }))?;
        }
        Commands::Usage => print_json(&ctx.maintenance().usage().await?)?,
        Commands::Summary => print_json(&ctx.reporting().dashboard_summary().await?)?,
        Commands::Daily { date } => {
            let totals = match date {
                Some(day) => ctx.reporting().daily_totals_on(day).await?,
                None => ctx.reporting().daily_totals().await?,
            };
            print_json(&totals)?;
        }
        Commands::OilTypes { action } => match action {
            OilTypeCmd::List => print_json(&ctx.reference().list_oil_types().await?)?,
            OilTypeCmd::Add { name, color } => print_json(
                &ctx.reference()
                    .create_oil_type(NewOilType { name, color })
                    .await?,
            )?,
            OilTypeCmd::Delete { id } => print_json(&cascade_json(
                ctx.reference().delete_oil_type(&id).await?,
            ))?,
        },
        Commands::Branches { action } => match action {
            BranchCmd::List => print_json(&ctx.reference().list_branches().await?)?,
            BranchCmd::Add {
                name,
                address,
                contact,
            } => print_json(
                &ctx.reference()
                    .create_branch(NewBranch {
                        name,
                        address,
                        contact_no: contact,
                        oil_tanks: vec![],
                    })
                    .await?,
            )?,
            BranchCmd::Delete { id } => print_json(&cascade_json(
                ctx.reference().delete_branch(&id).await?,
            ))?,
        },
        Commands::Drivers { action } => match action {
            DriverCmd::List => print_json(&ctx.reference().list_drivers().await?)?,
            DriverCmd::Add {
                email,
                uid,
                name,
                licence,
                tanker_licence,
            } => print_json(
                &ctx.reference()
                    .register_driver(NewDriver {
                        uid,
                        email,
                        display_name: name,
                        driver_licence_no: licence,
                        tanker_licence_no: tanker_licence,
                        ..Default::default()
                    })
                    .await?,
            )?,
            DriverCmd::Delete { uid } => {
                ctx.reference().delete_driver(&uid).await?;
                print_json(&serde_json::json!({ "deleted": uid }))?;
            }
        },
        Commands::InitConfig => {}
    }
    Ok(())
}

fn cascade_json(report: CascadeReport) -> serde_json::Value {
    serde_json::json!({
        "loadSessions": report.load_sessions,
        "transactions": report.transactions,
        "deliveries": report.deliveries,
    })
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(name);
    tokio::fs::write(&path, bytes)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    println!("{}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use oiltrack_db::{Database, DbConfig};
    use oiltrack_ledger::MemoryPhotoStore;

    async fn ctx() -> LedgerContext {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        LedgerContext::new(db, Arc::new(MemoryPhotoStore::new()), OilTrackConfig::default())
    }

    #[tokio::test]
    async fn test_acting_role_from_directory() {
        let ctx = ctx().await;
        let driver = ctx
            .reference()
            .register_driver(NewDriver {
                email: "ali@example.com".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(acting_role(&ctx, &driver.uid).await.unwrap(), Role::Driver);
        assert_eq!(acting_role(&ctx, "walk-in").await.unwrap(), Role::User);
    }

    #[tokio::test]
    async fn test_acting_role_surfaces_store_failures() {
        let ctx = ctx().await;
        ctx.db().close().await;

        let err = acting_role(&ctx, "walk-in").await.unwrap_err();
        assert!(!err.is_not_found());
    }
}
