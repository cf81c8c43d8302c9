//! Diagnostics for configuration and NetBox connectivity.

use crate::cli::CliContext;
use crate::remote::netbox::NetboxClient;
use anyhow::Result;
use std::fs;

#[derive(Default)]
struct Tally {
    ok: u32,
    warn: u32,
    fail: u32,
}

impl Tally {
    fn pass(&mut self, msg: impl AsRef<str>) {
        println!("  [PASS] {}", msg.as_ref());
        self.ok += 1;
    }

    fn warn(&mut self, msg: impl AsRef<str>) {
        println!("  [WARN] {}", msg.as_ref());
        self.warn += 1;
    }

    fn fail(&mut self, msg: impl AsRef<str>) {
        println!("  [FAIL] {}", msg.as_ref());
        self.fail += 1;
    }
}

pub fn run(ctx: &CliContext) -> Result<()> {
    let mut tally = Tally::default();

    println!("Doctor: {}", ctx.paths);

    match &ctx.config_load_warning {
        Some(w) => tally.fail(format!("config unreadable: {}", w)),
        None if ctx.config_path.is_file() => {
            tally.pass(format!("config parsed: {}", ctx.config_path.display()))
        }
        None => tally.warn(format!(
            "no config file at {} (using flags/env/defaults)",
            ctx.config_path.display()
        )),
    }

    let opts = match ctx.connect_options() {
        Ok(opts) => {
            tally.pass(format!("URL configured: {}", opts.url));
            tally.pass("API token configured");
            Some(opts)
        }
        Err(e) => {
            tally.fail(format!("{:#}", e));
            None
        }
    };

    if let Some(mut opts) = opts {
        let private_key = opts.private_key.take();

        match &private_key {
            Some(path) => match fs::File::open(path) {
                Ok(_) => tally.pass(format!("private key readable: {}", path.display())),
                Err(e) => tally.fail(format!("private key unreadable: {}: {}", path.display(), e)),
            },
            None => tally.warn("no private key configured (secret payloads cannot be read or written)"),
        }

        match NetboxClient::connect(&opts).and_then(|client| client.status().map_err(Into::into)) {
            Ok(version) => tally.pass(format!("API reachable (NetBox {})", version)),
            Err(e) => tally.fail(format!("API unreachable: {}", e)),
        }

        if private_key.is_some() {
            opts.private_key = private_key;
            match NetboxClient::connect(&opts) {
                Ok(client) if client.has_session_key() => tally.pass("session key obtained"),
                Ok(_) => tally.fail("no session key returned"),
                Err(e) => tally.fail(format!("session key: {}", e)),
            }
        }
    }

    println!();
    println!(
        "Summary: {} passed, {} warnings, {} failures",
        tally.ok, tally.warn, tally.fail
    );

    if tally.fail > 0 {
        std::process::exit(1);
    }
    Ok(())
}
