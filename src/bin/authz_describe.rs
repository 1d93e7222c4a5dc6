//!
//! authz-describe
//! --------------
//! Loads an authorization snapshot and prints the fully expanded description of a
//! user or role as JSON, including any warnings found while walking its roles.

use std::env;

use anyhow::{anyhow, Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use authz_state::config::AuthzConfig;
use authz_state::{init_global_update_lock, AuthzManagerExternalState, LocalExternalState, RoleName, UserName};

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [--config <file>] [--snapshot <file>] --user <name@db> [--raw]\n  {program} [--config <file>] [--snapshot <file>] --role <name@db>\n  {program} [--config <file>] [--snapshot <file>] --list-dbs\n\nOptions:\n  --raw        print the stored privilege document instead of the expanded description\n  --list-dbs   print every database and whether any user documents exist\n\nEnvironment:\n  AUTHZ_SNAPSHOT, AUTHZ_SCHEMA_VERSION, AUTHZ_LOCK_NAME, AUTHZ_WRITE_W override the config file."
    );
}

fn split_name(s: &str) -> Result<(String, String)> {
    match s.rsplit_once('@') {
        Some((name, db)) if !name.is_empty() && !db.is_empty() => Ok((name.to_string(), db.to_string())),
        _ => Err(anyhow!("expected <name>@<db>, got '{}'", s)),
    }
}

enum Target {
    User(UserName),
    Role(RoleName),
    ListDbs,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let mut args: Vec<String> = env::args().collect();
    let program = args.remove(0);
    let mut config_path: Option<String> = None;
    let mut snapshot: Option<String> = None;
    let mut target: Option<Target> = None;
    let mut raw = false;
    let mut i = 0;
    while i < args.len() {
        let needs_value = |flag: &str| -> Result<String> {
            args.get(i + 1).cloned().ok_or_else(|| anyhow!("{} requires a value", flag))
        };
        match args[i].as_str() {
            "--config" => { config_path = Some(needs_value("--config")?); i += 2; }
            "--snapshot" => { snapshot = Some(needs_value("--snapshot")?); i += 2; }
            "--user" => {
                let (u, db) = split_name(&needs_value("--user")?)?;
                target = Some(Target::User(UserName::new(u, db)));
                i += 2;
            }
            "--role" => {
                let (r, db) = split_name(&needs_value("--role")?)?;
                target = Some(Target::Role(RoleName::new(r, db)));
                i += 2;
            }
            "--list-dbs" => { target = Some(Target::ListDbs); i += 1; }
            "--raw" => { raw = true; i += 1; }
            "-h" | "--help" => { print_usage(&program); return Ok(()); }
            other => {
                eprintln!("unknown argument: {}", other);
                print_usage(&program);
                std::process::exit(2);
            }
        }
    }
    let Some(target) = target else {
        print_usage(&program);
        std::process::exit(2);
    };

    let mut config = match &config_path {
        Some(p) => AuthzConfig::from_file(p)?,
        None => AuthzConfig::default(),
    };
    config.apply_env(|k| env::var(k).ok())?;
    if let Some(s) = snapshot {
        config.snapshot_path = Some(s.into());
    }
    info!(
        target: "authz::admin",
        "authz-describe starting: snapshot={:?}, default_schema_version={}",
        config.snapshot_path, config.default_schema_version
    );

    let lock = init_global_update_lock(&config.lock_name);
    let state = LocalExternalState::new(config).context("opening authorization state")?.with_lock(lock);
    state.initialize()?;

    let out = match target {
        Target::User(user) if raw => {
            let version = state.active_schema_version()?;
            state.get_privilege_document(&user, version)?
        }
        Target::User(user) => state.get_user_description(&user)?.to_document(),
        Target::Role(role) => state.get_role_description(&role)?.to_document(),
        Target::ListDbs => serde_json::json!({
            "databases": state.get_all_database_names()?,
            "hasPrivilegeDocuments": state.has_any_privilege_documents()?,
        }),
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
