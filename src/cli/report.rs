//! Result reporting: render an `Outcome` (or a failure) for the caller.
//!
//! JSON goes to stdout and is the machine contract. Text is for humans.

use crate::core::outcome::Outcome;
use crate::error::ReconcileError;
use anyhow::{Context, Result};
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Table};
use serde_json::json;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Text,
}

/// Print the outcome, or the failure record, and pass the error through.
pub fn emit(format: OutputFormat, result: Result<Outcome>) -> Result<()> {
    match result {
        Ok(outcome) => {
            println!("{}", render(format, &outcome)?);
            Ok(())
        }
        Err(e) => {
            emit_failure(format, &e)?;
            Err(e)
        }
    }
}

/// JSON mode prints the failure record on stdout; text mode leaves it to stderr.
pub fn emit_failure(format: OutputFormat, err: &anyhow::Error) -> Result<()> {
    if format == OutputFormat::Json {
        println!(
            "{}",
            serde_json::to_string_pretty(&failure_json(err)).context("serialize failure")?
        );
    }
    Ok(())
}

/// Remote rejections carry their HTTP status in `status`; `message` stays verbatim.
pub fn failure_json(err: &anyhow::Error) -> serde_json::Value {
    let mut value = json!({
        "changed": false,
        "failed": true,
        "message": format!("{:#}", err),
    });
    let status = err
        .downcast_ref::<ReconcileError>()
        .and_then(ReconcileError::remote_status);
    if let (Some(status), Some(obj)) = (status, value.as_object_mut()) {
        obj.insert("status".into(), json!(status));
    }
    value
}

pub fn render(format: OutputFormat, outcome: &Outcome) -> Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(outcome).context("serialize outcome"),
        OutputFormat::Text => Ok(render_text(outcome)),
    }
}

fn render_text(outcome: &Outcome) -> String {
    let Some(records) = &outcome.secrets else {
        let mut out = format!("{}: {}", if outcome.changed { "changed" } else { "ok" }, outcome.message);
        if !outcome.actions.is_empty() {
            let actions: Vec<String> = outcome.actions.iter().map(ToString::to_string).collect();
            out.push_str(&format!("\n  actions: {}", actions.join(", ")));
        }
        return out;
    };

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        Cell::new("Device").add_attribute(Attribute::Bold),
        Cell::new("Name").add_attribute(Attribute::Bold),
        Cell::new("Role").add_attribute(Attribute::Bold),
        Cell::new("Secret").add_attribute(Attribute::Bold),
    ]);
    for record in records {
        table.add_row(vec![
            record.device.clone(),
            record.name.clone(),
            record.secret_role.clone(),
            record.password.clone(),
        ]);
    }
    format!("{}\n\n{}", table, outcome.message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::outcome::{Action, SecretRecord, SecretStep};

    fn created() -> Outcome {
        Outcome::converged(
            "ops",
            true,
            SecretStep {
                action: Action::SecretCreated,
                acknowledged: true,
            },
            "Secret created for device router1 and role ops".into(),
        )
    }

    #[test]
    fn test_json_outcome_omits_secrets_for_present() {
        let out = render(OutputFormat::Json, &created()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["changed"], true);
        assert_eq!(value["secret_role"], "ops");
        assert_eq!(value["actions"], json!(["role-created", "secret-created"]));
        assert!(value.get("secrets").is_none());
    }

    #[test]
    fn test_text_outcome_lists_actions() {
        let out = render(OutputFormat::Text, &created()).unwrap();
        assert!(out.starts_with("changed: Secret created"));
        assert!(out.contains("role-created, secret-created"));
    }

    #[test]
    fn test_text_listing_is_a_table() {
        let outcome = Outcome::listing(
            Some("ops"),
            vec![SecretRecord {
                secret_role: "ops".into(),
                password: "s3cr3t".into(),
                name: "admin-pw".into(),
                device: "router1".into(),
            }],
        );
        let out = render(OutputFormat::Text, &outcome).unwrap();
        assert!(out.contains("router1"));
        assert!(out.contains("s3cr3t"));
        assert!(out.ends_with("1 secret matched"));
    }

    #[test]
    fn test_failure_record_shape() {
        let err = anyhow::anyhow!("secret not found: device=router1 name=x role=ops");
        let value = failure_json(&err);
        assert_eq!(value["changed"], false);
        assert_eq!(value["failed"], true);
        assert_eq!(value["message"], "secret not found: device=router1 name=x role=ops");
    }

    #[test]
    fn test_failure_record_keeps_remote_detail_verbatim() {
        let detail = r#"{"name":["secret role with this name already exists."]}"#;
        let err = anyhow::Error::from(ReconcileError::from(crate::remote::RemoteError::Rejected {
            status: 400,
            detail: detail.into(),
        }));
        let value = failure_json(&err);
        assert_eq!(value["message"], detail);
        assert_eq!(value["status"], 400);
    }

    #[test]
    fn test_failure_record_without_status() {
        let value = failure_json(&anyhow::anyhow!("no API token configured"));
        assert!(value.get("status").is_none());
    }
}
