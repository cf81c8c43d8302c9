//! Dry-run preview of present/absent.

use crate::cli::report::{self, OutputFormat};
use crate::cli::secret::{read_payload, AbsentArgs, PresentArgs};
use crate::cli::CliContext;
use crate::core::converge::{Plan, PlannedStep, Reconciler};
use crate::core::intent::{self, Intent, Request};
use anyhow::{bail, Context, Result};
use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum PlanCommand {
    /// Preview a present run
    Present(PresentArgs),
    /// Preview an absent run
    Absent(AbsentArgs),
}

pub fn run(ctx: &CliContext, cmd: PlanCommand) -> Result<()> {
    let result = match cmd {
        PlanCommand::Present(args) => plan_present(ctx, args),
        PlanCommand::Absent(args) => plan_absent(ctx, args),
    };
    match result {
        Ok(plan) => print_plan(ctx.format, &plan),
        Err(e) => {
            report::emit_failure(ctx.format, &e)?;
            Err(e)
        }
    }
}

fn plan_present(ctx: &CliContext, args: PresentArgs) -> Result<Plan> {
    let payload = read_payload(&args.payload, ctx.non_interactive)?;
    let Request::Present(req) = intent::resolve(Intent::Present, args.key.attributes(payload))? else {
        bail!("present intent resolved to a different request")
    };
    let client = ctx.connect()?;
    Ok(Reconciler::new(&client)
        .with_duplicate_match(ctx.config.policy.duplicate_match)
        .plan_present(&req)?)
}

fn plan_absent(ctx: &CliContext, args: AbsentArgs) -> Result<Plan> {
    let Request::Absent(req) = intent::resolve(Intent::Absent, args.key.attributes(None))? else {
        bail!("absent intent resolved to a different request")
    };
    let client = ctx.connect()?;
    Ok(Reconciler::new(&client)
        .with_duplicate_match(ctx.config.policy.duplicate_match)
        .plan_absent(&req)?)
}

fn print_plan(format: OutputFormat, plan: &Plan) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let mut value = serde_json::to_value(plan).context("serialize plan")?;
            if let Some(obj) = value.as_object_mut() {
                obj.insert("dry_run".into(), serde_json::Value::Bool(true));
            }
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => println!("{}", render_text(plan)),
    }
    Ok(())
}

fn render_text(plan: &Plan) -> String {
    let mut lines = vec![format!(
        "Plan: {} device={} name={} role={}",
        plan.intent,
        plan.device.as_deref().unwrap_or("-"),
        plan.name.as_deref().unwrap_or("-"),
        plan.role
    )];
    if plan.create_role {
        lines.push(format!("  create-role: {}", plan.role));
    }
    let step = match plan.step {
        PlannedStep::CreateSecret => "create-secret",
        PlannedStep::UpdateSecret => "update-secret",
        PlannedStep::DeleteSecret => "delete-secret",
    };
    match plan.secret_id {
        Some(id) => lines.push(format!("  {}: id {}", step, id)),
        None => lines.push(format!("  {}", step)),
    }
    lines.push("No changes made (dry-run).".into());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_plan_for_new_role() {
        let plan = Plan {
            intent: Intent::Present,
            role: "ops".into(),
            create_role: true,
            step: PlannedStep::CreateSecret,
            device: Some("router1".into()),
            name: Some("admin-pw".into()),
            secret_id: None,
        };
        let text = render_text(&plan);
        assert!(text.starts_with("Plan: present device=router1 name=admin-pw role=ops"));
        assert!(text.contains("create-role: ops"));
        assert!(text.contains("  create-secret\n"));
        assert!(text.ends_with("No changes made (dry-run)."));
    }

    #[test]
    fn test_text_plan_names_target_secret() {
        let plan = Plan {
            intent: Intent::Absent,
            role: "ops".into(),
            create_role: false,
            step: PlannedStep::DeleteSecret,
            device: Some("router1".into()),
            name: Some("admin-pw".into()),
            secret_id: Some(7),
        };
        let text = render_text(&plan);
        assert!(!text.contains("create-role"));
        assert!(text.contains("delete-secret: id 7"));
    }
}
