//! Alert state CLI commands

use std::io::{self, BufRead, Write};

use anyhow::Result;
use tabled::Tabled;

use crate::client::{AlertStateList, ApiClient};
use crate::output::{
    color_cooldown, format_timestamp, print_info, print_success, print_warning, OutputFormat,
};

/// Row for the alert state table
#[derive(Tabled)]
struct StateRow {
    #[tabled(rename = "Anomaly Type")]
    anomaly_type: String,
    #[tabled(rename = "Last Alert")]
    last_alert: String,
    #[tabled(rename = "Count")]
    count: String,
    #[tabled(rename = "In Cooldown")]
    in_cooldown: String,
}

/// List recorded alert state
pub async fn list_state(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let result: AlertStateList = client.get("api/v1/alerts/state").await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&result)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            if result.states.is_empty() {
                print_info("No alert state recorded");
                return Ok(());
            }

            let rows: Vec<StateRow> = result
                .states
                .iter()
                .map(|s| StateRow {
                    anomaly_type: s.anomaly_type.clone(),
                    last_alert: format_timestamp(&s.last_alert_time),
                    count: s.alert_count.to_string(),
                    in_cooldown: color_cooldown(s.in_cooldown),
                })
                .collect();

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
            println!("\nTotal: {} alert types", result.states.len());
        }
    }

    Ok(())
}

/// Clear all recorded alert state
pub async fn clear_state(client: &ApiClient, yes: bool, format: OutputFormat) -> Result<()> {
    if !yes && !confirm_clear()? {
        print_info("Aborted");
        return Ok(());
    }

    client.delete("api/v1/alerts/state").await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "cleared": true }));
        }
        OutputFormat::Table => {
            print_success("Alert state cleared; the next pass re-alerts active anomalies");
        }
    }

    Ok(())
}

fn confirm_clear() -> Result<bool> {
    print_warning("This clears every cooldown, so active anomalies alert again next pass.");
    print!("Continue? [y/N] ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;

    Ok(matches!(
        answer.trim().to_lowercase().as_str(),
        "y" | "yes"
    ))
}
