//! Command dispatch

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use colored::Colorize;
use tracing::{info, warn};

use crate::app::options::CliArgs;
use crate::app::state::AppState;
use crate::artifacts::{export_installations, ExportFormat, LocalArtifact};
use crate::audit::{AuditContext, AuditEntry, Auditor, EventCategory};
use crate::bulk::{BulkAction, BulkRunner};
use crate::errors::FleetError;
use crate::http::PanelClient;
use crate::models::{Installation, PluginFilter};
use crate::storage::session::Session;
use crate::upload::{upload_all, SecondaryStore};

pub const USAGE: &str = "\
Usage: wpfleet <command> [--key=value ...]

Session:
  login --host=<panel> --user=<user> --password=<secret> [--port=2083]
  logout
  status

Sites and plugins:
  sites
  plugins --insid=<id> [--active] [--inactive] [--updates]
  plugin-update --insid=<id> [--slug=<plugin>]
  plugin-activate | plugin-deactivate | plugin-install --insid=<id> --slug=<plugin>
  upgrade --insid=<id>

Backups:
  backup --insid=<id>
  backups
  backup-download --file=<name>
  backup-delete --file=<name>
  upload [--file=<name>]

Fleet:
  bulk --actions=update_plugins,upgrade_core,create_backup [--sites=<id>,...] [--upload]
  artifacts
  archive --prefix=<name> [--files=<name>,...]
  export --format=csv|json|md
  audit [--category=<category>] [--limit=20]

Global:
  --data-dir=<path>   data root (default ~/.wpfleet, or $WPFLEET_HOME)
  version
";

/// Run one command
pub async fn run(state: &AppState, args: &CliArgs) -> Result<(), FleetError> {
    let command = args.command.as_deref().unwrap_or("help");
    info!("Running command {}", command);

    match command {
        "login" => login(state, args).await,
        "logout" => logout(state).await,
        "status" => status(state),
        "sites" => sites(state).await,
        "plugins" => plugins(state, args).await,
        "plugin-update" => {
            let insid = args.require("insid")?;
            state.client.update_plugins(insid, args.get("slug")).await?;
            done(&match args.get("slug") {
                Some(slug) => format!("Updated {slug} on {insid}"),
                None => format!("Updated all plugins on {insid}"),
            });
            Ok(())
        }
        "plugin-activate" => {
            let (insid, slug) = (args.require("insid")?, args.require("slug")?);
            state.client.activate_plugin(insid, slug).await?;
            done(&format!("Activated {slug} on {insid}"));
            Ok(())
        }
        "plugin-deactivate" => {
            let (insid, slug) = (args.require("insid")?, args.require("slug")?);
            state.client.deactivate_plugin(insid, slug).await?;
            done(&format!("Deactivated {slug} on {insid}"));
            Ok(())
        }
        "plugin-install" => {
            let (insid, slug) = (args.require("insid")?, args.require("slug")?);
            state.client.install_plugin(insid, slug).await?;
            done(&format!("Installed {slug} on {insid}"));
            Ok(())
        }
        "upgrade" => {
            let insid = args.require("insid")?;
            state.client.upgrade_core(insid).await?;
            done(&format!("WordPress core upgraded on {insid}"));
            Ok(())
        }
        "backup" => {
            let insid = args.require("insid")?;
            state.client.create_backup(insid).await?;
            done(&format!("Backup started for {insid}"));
            Ok(())
        }
        "backups" => backups(state).await,
        "backup-download" => {
            let filename = args.require("file")?;
            let bytes = state.client.download_backup(filename).await?;
            let path = state.artifacts.save_backup(filename, &bytes).await?;
            done(&format!("Saved {}", path.display()));
            Ok(())
        }
        "backup-delete" => {
            let filename = args.require("file")?;
            state.client.delete_backup(filename).await?;
            done(&format!("Deleted {filename}"));
            Ok(())
        }
        "upload" => upload(state, args).await,
        "bulk" => bulk(state, args).await,
        "artifacts" => artifacts(state).await,
        "archive" => archive(state, args).await,
        "export" => export(state, args).await,
        "audit" => audit(state, args),
        "help" => {
            print!("{USAGE}");
            Ok(())
        }
        other => Err(FleetError::ValidationError(format!(
            "Unknown command: {other} (see `wpfleet help`)"
        ))),
    }
}

fn done(message: &str) {
    println!("{} {}", "✓".green(), message);
}

// =============================== SESSION ================================== //

async fn login(state: &AppState, args: &CliArgs) -> Result<(), FleetError> {
    let host = args.require("host")?;
    let user = args.require("user")?;
    let password = args.require("password")?.to_string();
    let port = args.parse_or("port", state.settings.panel.default_port)?;

    let session = Arc::new(Session::new(host, port, user, password));
    let auditor = Auditor::new(state.audit_log.clone(), AuditContext::for_session(&session));
    let client = PanelClient::new(
        state.settings.panel.clone(),
        Some(session.clone()),
        auditor.clone(),
    )?;

    let result = match client.probe().await {
        Ok(()) => session.save(&state.layout.session_file()).await,
        Err(e) => Err(e),
    };
    auditor.record(
        AuditEntry::new(EventCategory::Authentication, "LOGIN")
            .result(&result)
            .detail("host", host)
            .detail("port", port),
    );
    result?;

    done(&format!("Logged in to {host}:{port} as {user}"));
    Ok(())
}

async fn logout(state: &AppState) -> Result<(), FleetError> {
    let Some(session) = &state.session else {
        println!("{}", "Not logged in".yellow());
        return Ok(());
    };

    let result = Session::clear(&state.layout.session_file()).await;
    state.auditor.record(
        AuditEntry::new(EventCategory::Authentication, "LOGOUT")
            .result(&result)
            .detail("host", session.host.as_str()),
    );
    result?;

    done("Logged out");
    Ok(())
}

fn status(state: &AppState) -> Result<(), FleetError> {
    println!("{:<12} {}", "Data root:".bold(), state.layout.base_dir.display());
    match &state.session {
        Some(session) => {
            println!(
                "{:<12} {}@{}:{}",
                "Session:".bold(),
                session.user,
                session.host,
                session.port
            );
            println!("{:<12} {}", "Session id:".bold(), session.session_id);
            println!(
                "{:<12} {}",
                "Since:".bold(),
                session.created_at.format("%Y-%m-%d %H:%M UTC")
            );
        }
        None => println!("{:<12} {}", "Session:".bold(), "not logged in".yellow()),
    }
    if state.settings.panel.accept_invalid_certs {
        println!("{}", "TLS certificate validation is disabled".yellow());
    }
    Ok(())
}

// =============================== SITES ================================== //

async fn sites(state: &AppState) -> Result<(), FleetError> {
    let installations = state.client.list_installations().await?;
    if installations.is_empty() {
        println!("{}", "No WordPress installations found".yellow());
        return Ok(());
    }

    println!("{} WordPress installations", installations.len().to_string().bold());
    for site in &installations {
        println!(
            "  {:<12} {:<40} {:<8} {}",
            site.insid.cyan(),
            site.display_name,
            site.version,
            site.full_url().dimmed()
        );
    }
    Ok(())
}

async fn plugins(state: &AppState, args: &CliArgs) -> Result<(), FleetError> {
    let insid = args.require("insid")?;
    let filter = match (args.flag("active"), args.flag("inactive")) {
        (true, false) => PluginFilter {
            show_inactive: false,
            ..Default::default()
        },
        (false, true) => PluginFilter {
            show_active: false,
            ..Default::default()
        },
        _ => PluginFilter::default(),
    };
    let filter = PluginFilter {
        updates_only: args.flag("updates"),
        ..filter
    };

    let plugins = state.client.list_plugins(insid).await?;
    let shown = filter.apply(&plugins);
    println!("{} of {} plugins", shown.len(), plugins.len());

    for plugin in shown {
        let status = if plugin.active {
            "active".green()
        } else {
            "inactive".dimmed()
        };
        let update = match (plugin.new_version.as_str(), plugin.update_available) {
            ("", true) => "update available".yellow().to_string(),
            (v, true) => format!("-> {v}").yellow().to_string(),
            _ => String::new(),
        };
        println!(
            "  {:<32} {:<10} {:<9} {} {}",
            plugin.name,
            plugin.version,
            status,
            plugin.slug.dimmed(),
            update
        );
    }
    Ok(())
}

// =============================== BACKUPS ================================== //

async fn backups(state: &AppState) -> Result<(), FleetError> {
    let remote = state.client.list_backups().await?;
    println!("{} backups on the panel", remote.len().to_string().bold());
    for record in remote.values() {
        let size = record
            .size
            .map(|s| format!("{:.1} MB", s as f64 / (1024.0 * 1024.0)))
            .unwrap_or_default();
        let created = record
            .created_at
            .and_then(|t| chrono::DateTime::<Utc>::from_timestamp(t, 0))
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "  {:<48} {:<10} {:>10} {}",
            record.filename,
            record.insid.as_deref().unwrap_or("-"),
            size,
            created
        );
    }

    println!();
    print_artifacts("Local backups", &state.artifacts.backups().await?);
    Ok(())
}

async fn upload(state: &AppState, args: &CliArgs) -> Result<(), FleetError> {
    let store = state.secondary_store()?;

    let artifact = match args.get("file") {
        Some(name) => state
            .artifacts
            .backups()
            .await?
            .into_iter()
            .find(|a| a.name == name)
            .ok_or_else(|| FleetError::NotFound(format!("No local backup named {name}")))?,
        None => state
            .artifacts
            .latest_backup()
            .await?
            .ok_or_else(|| FleetError::NotFound("No local backups".into()))?,
    };

    if store.upload(&artifact.path, &artifact.name).await {
        done(&format!("Uploaded {}", artifact.name));
        Ok(())
    } else {
        Err(FleetError::Internal(format!(
            "Upload of {} failed, see the log",
            artifact.name
        )))
    }
}

// =============================== FLEET ================================== //

async fn bulk(state: &AppState, args: &CliArgs) -> Result<(), FleetError> {
    let actions = args
        .list("actions")
        .iter()
        .map(|a| a.parse())
        .collect::<Result<BTreeSet<BulkAction>, _>>()?;
    // Fail on store configuration before touching any site
    let store = if args.flag("upload") {
        Some(state.secondary_store()?)
    } else {
        None
    };

    let sites = select_sites(state.client.list_installations().await?, &args.list("sites"));
    let runner = BulkRunner::new(state.client.clone(), state.auditor.clone());
    let result = runner
        .run(&sites, &actions, |done, total, site| {
            println!("[{done}/{total}] {}", site.display_name.bold());
        })
        .await?;

    for line in &result.successes {
        println!("  {} {}", "✓".green(), line);
    }
    for line in &result.errors {
        println!("  {} {}", "✗".red(), line);
    }
    println!(
        "{} succeeded, {} failed across {} sites",
        result.successes.len().to_string().green(),
        result.errors.len().to_string().red(),
        result.total_sites
    );
    if result.high_failure_rate() {
        println!("{}", "More than half of the operations failed".red().bold());
    }

    if let Some(store) = store {
        let backups = state.artifacts.backups().await?;
        let uploaded = upload_all(&store, &backups).await;
        done(&format!("Uploaded {uploaded} of {} backup files", backups.len()));
    }
    Ok(())
}

/// Keep the installations named in `wanted`, in panel order; all when empty
fn select_sites(installations: Vec<Installation>, wanted: &[String]) -> Vec<Installation> {
    if wanted.is_empty() {
        return installations;
    }
    for id in wanted {
        if !installations.iter().any(|i| &i.insid == id) {
            warn!("Unknown installation {}, skipping", id);
        }
    }
    installations
        .into_iter()
        .filter(|i| wanted.contains(&i.insid))
        .collect()
}

async fn artifacts(state: &AppState) -> Result<(), FleetError> {
    print_artifacts("Backups", &state.artifacts.backups().await?);
    print_artifacts("Archives", &state.artifacts.archives().await?);
    print_artifacts("Exports", &state.artifacts.exports().await?);
    Ok(())
}

fn print_artifacts(title: &str, artifacts: &[LocalArtifact]) {
    println!("{} ({})", title.bold(), artifacts.len());
    for artifact in artifacts {
        let modified = artifact
            .modified
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "  {:<48} {:>8.1} MB  {}",
            artifact.name,
            artifact.size_mb(),
            modified
        );
    }
}

async fn archive(state: &AppState, args: &CliArgs) -> Result<(), FleetError> {
    let prefix = args.require("prefix")?;
    let wanted = args.list("files");
    let backups = state.artifacts.backups().await?;

    let files: Vec<PathBuf> = if wanted.is_empty() {
        backups.into_iter().map(|a| a.path).collect()
    } else {
        wanted
            .iter()
            .map(|name| {
                backups
                    .iter()
                    .find(|a| &a.name == name)
                    .map(|a| a.path.clone())
                    .ok_or_else(|| FleetError::NotFound(format!("No local backup named {name}")))
            })
            .collect::<Result<_, _>>()?
    };

    let path = state.artifacts.create_archive(prefix, &files).await?;
    done(&format!("Archived {} files into {}", files.len(), path.display()));
    Ok(())
}

async fn export(state: &AppState, args: &CliArgs) -> Result<(), FleetError> {
    let format: ExportFormat = args.parse_or("format", ExportFormat::Csv)?;
    let installations = state.client.list_installations().await?;
    let path = export_installations(
        &installations,
        format,
        &state.layout.exports_dir(),
        &state.auditor,
    )
    .await?;
    done(&format!(
        "Exported {} installations to {}",
        installations.len(),
        path.display()
    ));
    Ok(())
}

fn audit(state: &AppState, args: &CliArgs) -> Result<(), FleetError> {
    let limit = args.parse_or("limit", 20usize)?;
    let path = match args.get("category") {
        Some(category) => state
            .audit_log
            .category_file(category.parse().map_err(FleetError::ValidationError)?),
        None => state.audit_log.main_file(Utc::now().date_naive()),
    };

    let events = state.audit_log.tail(&path, limit)?;
    if events.is_empty() {
        println!("{}", "No audit events".yellow());
        return Ok(());
    }

    for event in events {
        let risk = format!("{:?}", event.risk).to_uppercase();
        let risk = match risk.as_str() {
            "HIGH" => risk.red().bold(),
            "MEDIUM" => risk.yellow(),
            _ => risk.normal(),
        };
        println!(
            "{} {:<17} {:<22} {:<8} {:<7} {} {}",
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            event.category.to_string(),
            event.action,
            format!("{:?}", event.outcome).to_uppercase(),
            risk,
            event.actor.dimmed(),
            event.insid.as_deref().unwrap_or("")
        );
    }
    Ok(())
}
