//! present / absent / show handlers.

use crate::cli::report;
use crate::cli::CliContext;
use crate::constants;
use crate::core::audit_log::AuditContext;
use crate::core::converge::Reconciler;
use crate::core::intent::{self, Attributes, Intent, Request};
use crate::core::outcome::Outcome;
use anyhow::{bail, Context, Result};
use clap::Args;
use dialoguer::Password;
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use std::fmt;
use std::io::Read;
use zeroize::Zeroizing;

/// The composite key of a secret.
#[derive(Args, Debug, Clone, Default)]
pub struct KeyArgs {
    /// Device name
    #[arg(long)]
    pub device: Option<String>,
    /// Secret name
    #[arg(long)]
    pub name: Option<String>,
    /// Secret role name
    #[arg(long)]
    pub role: Option<String>,
}

impl KeyArgs {
    pub fn attributes(&self, secret: Option<Zeroizing<String>>) -> Attributes {
        Attributes {
            device: self.device.clone(),
            name: self.name.clone(),
            secret,
            role: self.role.clone(),
        }
    }

    fn audit_context(&self, intent: Intent) -> AuditContext {
        AuditContext {
            intent,
            device: self.device.clone(),
            name: self.name.clone(),
            role: self.role.clone().unwrap_or_default(),
        }
    }
}

/// Where the payload comes from. At most one source may be given.
#[derive(Args, Clone, Default)]
pub struct PayloadArgs {
    /// Secret payload
    #[arg(long, env = "NETBOX_SECRET_VALUE", hide_env_values = true)]
    pub secret: Option<String>,
    /// Read the payload from stdin
    #[arg(long)]
    pub from_stdin: bool,
    /// Prompt for the payload (hidden input)
    #[arg(long)]
    pub prompt: bool,
    /// Generate an alphanumeric payload of this length
    #[arg(long, value_name = "LEN")]
    pub generate: Option<usize>,
}

impl fmt::Debug for PayloadArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadArgs")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("from_stdin", &self.from_stdin)
            .field("prompt", &self.prompt)
            .field("generate", &self.generate)
            .finish()
    }
}

#[derive(Args, Debug)]
pub struct PresentArgs {
    #[command(flatten)]
    pub key: KeyArgs,
    #[command(flatten)]
    pub payload: PayloadArgs,
}

#[derive(Args, Debug)]
pub struct AbsentArgs {
    #[command(flatten)]
    pub key: KeyArgs,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    #[command(flatten)]
    pub key: KeyArgs,
}

pub fn run_present(ctx: &CliContext, args: PresentArgs) -> Result<()> {
    let audit = args.key.audit_context(Intent::Present);
    let result = read_payload(&args.payload, ctx.non_interactive)
        .and_then(|payload| reconcile(ctx, Intent::Present, args.key.attributes(payload)));
    ctx.audit(&audit, &result);
    report::emit(ctx.format, result)
}

pub fn run_absent(ctx: &CliContext, args: AbsentArgs) -> Result<()> {
    let audit = args.key.audit_context(Intent::Absent);
    let result = reconcile(ctx, Intent::Absent, args.key.attributes(None));
    ctx.audit(&audit, &result);
    report::emit(ctx.format, result)
}

pub fn run_show(ctx: &CliContext, args: ShowArgs) -> Result<()> {
    let result = reconcile(ctx, Intent::Show, args.key.attributes(None));
    report::emit(ctx.format, result)
}

/// Resolve before connecting so a missing field never costs a remote call.
fn reconcile(ctx: &CliContext, intent: Intent, attrs: Attributes) -> Result<Outcome> {
    let request: Request = intent::resolve(intent, attrs)?;
    let client = ctx.connect()?;
    let outcome = Reconciler::new(&client)
        .with_duplicate_match(ctx.config.policy.duplicate_match)
        .reconcile(&request)?;
    tracing::info!(intent = %intent, changed = outcome.changed, "reconciled");
    Ok(outcome)
}

/// Read the payload from whichever single source was selected.
pub fn read_payload(args: &PayloadArgs, non_interactive: bool) -> Result<Option<Zeroizing<String>>> {
    let sources = [
        args.secret.is_some(),
        args.from_stdin,
        args.prompt,
        args.generate.is_some(),
    ];
    if sources.iter().filter(|s| **s).count() > 1 {
        bail!("--secret, --from-stdin, --prompt and --generate are mutually exclusive");
    }

    let payload = if let Some(secret) = &args.secret {
        Zeroizing::new(secret.clone())
    } else if args.from_stdin {
        let mut buf = Zeroizing::new(String::new());
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("read secret from stdin")?;
        Zeroizing::new(buf.trim_end_matches(['\r', '\n']).to_string())
    } else if args.prompt {
        if non_interactive {
            bail!("--prompt cannot be used with --non-interactive (use --from-stdin or --secret)");
        }
        Zeroizing::new(
            Password::new()
                .with_prompt("Secret")
                .allow_empty_password(false)
                .interact()
                .context("read secret from prompt")?,
        )
    } else if let Some(length) = args.generate {
        if length == 0 {
            bail!("--generate length must be at least 1");
        }
        generate_secret(length)
    } else {
        return Ok(None);
    };

    if payload.len() > constants::MAX_SECRET_SIZE {
        bail!(
            "secret exceeds maximum size ({} bytes, max {} bytes)",
            payload.len(),
            constants::MAX_SECRET_SIZE
        );
    }
    Ok(Some(payload))
}

fn generate_secret(length: usize) -> Zeroizing<String> {
    Zeroizing::new(
        OsRng
            .sample_iter(&Alphanumeric)
            .take(length)
            .map(char::from)
            .collect(),
    )
}
