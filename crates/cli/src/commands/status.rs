//! Agent status CLI command

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{color_status, format_epoch, OutputFormat};

/// Row for the component health table
#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    component: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Detail")]
    detail: String,
    #[tabled(rename = "Checked")]
    checked: String,
}

/// Show agent health and readiness
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health: crate::client::HealthSummary = client.get_allow_unavailable("healthz").await?;
    let readiness: crate::client::ReadinessSummary =
        client.get_allow_unavailable("readyz").await?;

    match format {
        OutputFormat::Json => {
            let combined = serde_json::json!({
                "health": health,
                "readiness": readiness,
            });
            println!("{}", serde_json::to_string_pretty(&combined)?);
        }
        OutputFormat::Table => {
            println!("{}", "Watchdog Status".bold());
            println!("{}", "=".repeat(50));
            println!("Overall:    {}", color_status(&health.status));
            println!(
                "Ready:      {}",
                if readiness.ready {
                    "yes".green().to_string()
                } else {
                    "no".red().to_string()
                }
            );
            if let Some(reason) = &readiness.reason {
                println!("Reason:     {}", reason);
            }
            println!();

            if health.components.is_empty() {
                return Ok(());
            }

            let mut names: Vec<_> = health.components.keys().cloned().collect();
            names.sort();

            let rows: Vec<ComponentRow> = names
                .iter()
                .map(|name| {
                    let component = &health.components[name];
                    ComponentRow {
                        component: name.clone(),
                        status: color_status(&component.status),
                        detail: component.detail.clone().unwrap_or_default(),
                        checked: format_epoch(component.checked_at),
                    }
                })
                .collect();

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
        }
    }

    Ok(())
}
