//! armadactl enables operators to manage the Armada control plane.
//!
//! Exit codes: 0 on success, 2 on invalid arguments (clap and filter
//! parsing), 1 on any runtime failure.

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use reqwest::Method;

#[derive(Parser)]
#[command(name = "armadactl", about = "Manage the Armada control plane", version)]
struct Cli {
    /// Control plane endpoint.
    #[arg(long, env = "ARMADA_ENDPOINT", default_value = "http://127.0.0.1:17600")]
    endpoint: String,
    /// Bearer token used to authenticate.
    #[arg(long, env = "ARMADA_TOKEN", hide_env_values = true)]
    token: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Enroll a backend controller.
    AddController {
        /// Controller path, `<owner>/<name>`.
        path: String,
        #[arg(long)]
        uuid: String,
        /// API address, `host:port`; repeatable.
        #[arg(long = "address", required = true)]
        addresses: Vec<String>,
        /// File holding the controller CA certificate (PEM).
        #[arg(long)]
        ca_cert_file: Option<String>,
        #[arg(long, default_value = "admin")]
        admin_user: String,
        #[arg(long)]
        admin_password: String,
        #[arg(long)]
        cloud: String,
        #[arg(long, default_value = "")]
        region: String,
        #[arg(long, default_value = "")]
        provider_type: String,
    },
    /// Remove a controller and its catalog references.
    RemoveController { path: String },
    /// Mark a controller deprecated (or active again with --active).
    SetControllerDeprecated {
        path: String,
        #[arg(long)]
        active: bool,
    },
    /// List enrolled controllers.
    ListControllers,
    /// Show one controller.
    ControllerInfo { path: String },
    /// List hosting locations, optionally filtered by key=value pairs.
    Locations { filters: Vec<String> },
    /// Show the status of a model.
    ModelStatus { uuid: String },
    /// Import an existing model from a controller.
    ImportModel {
        /// Owning controller path.
        controller: String,
        /// Model path, `<owner>/<name>`.
        path: String,
        #[arg(long)]
        uuid: String,
        #[arg(long)]
        credential: String,
        #[arg(long)]
        cloud: String,
        #[arg(long, default_value = "")]
        region: String,
    },
    /// Re-point a migrated model at its new controller.
    UpdateMigratedModel {
        /// Model path, `<owner>/<name>`.
        model: String,
        target_controller: String,
    },
    /// Bulk-load credentials from a YAML file.
    ImportCloudCredentials { file: String },
    /// Allow a user to read the audit log.
    GrantAuditLogAccess { user: String },
    /// Withdraw a user's audit log access.
    RevokeAuditLogAccess { user: String },
    /// List audit events.
    ListAuditEvents {
        #[arg(long)]
        after: Option<String>,
        #[arg(long)]
        before: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Add a relationship tuple.
    Relate {
        subject: String,
        relation: String,
        target: String,
    },
    /// Remove a relationship tuple.
    Unrelate {
        subject: String,
        relation: String,
        target: String,
    },
    /// Check whether a subject holds a relation to a target.
    CheckRelation {
        subject: String,
        relation: String,
        target: String,
        #[arg(long)]
        trace: bool,
    },
}

struct Client {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

impl Client {
    fn new(endpoint: String, token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            token,
        }
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let url = format!("{}{}", self.endpoint.trim_end_matches('/'), path);
        let mut request = self
            .http
            .request(method, &url)
            .bearer_auth(&self.token);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.with_context(|| format!("call {url}"))?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let json: serde_json::Value =
            serde_json::from_str(&text).unwrap_or(serde_json::Value::Null);
        if !status.is_success() {
            let message = json
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or(&text);
            bail!("{status}: {message}");
        }
        Ok(json)
    }
}

/// Split `<owner>/<name>`.
fn split_path(path: &str) -> Result<(String, String)> {
    match path.split_once('/') {
        Some((user, name)) if !user.is_empty() && !name.is_empty() => {
            Ok((user.to_string(), name.to_string()))
        }
        _ => Err(anyhow!("expected \"<owner>/<name>\", got {path:?}")),
    }
}

/// Split a path argument; malformed syntax is an argument error, so it
/// exits 2 like any other bad argument rather than a runtime failure.
fn split_path_arg(path: &str) -> (String, String) {
    match split_path(path) {
        Ok(parts) => parts,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(2);
        }
    }
}

/// Parse `key=value` location filters.
fn parse_filters(filters: &[String]) -> Result<Vec<(String, String)>> {
    filters
        .iter()
        .map(|raw| {
            raw.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| anyhow!("expected \"key=value\", got {raw:?}"))
        })
        .collect()
}

fn print_yaml(value: &serde_json::Value) -> Result<()> {
    if value.is_null() {
        return Ok(());
    }
    print!("{}", serde_yaml::to_string(value)?);
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let client = Client::new(cli.endpoint, cli.token);
    match cli.command {
        Command::AddController {
            path,
            uuid,
            addresses,
            ca_cert_file,
            admin_user,
            admin_password,
            cloud,
            region,
            provider_type,
        } => {
            let ca_cert = match ca_cert_file {
                Some(file) => std::fs::read_to_string(&file)
                    .with_context(|| format!("read CA certificate {file}"))?,
                None => String::new(),
            };
            split_path_arg(&path);
            client
                .call(
                    Method::POST,
                    "/v1/controllers",
                    Some(serde_json::json!({
                        "path": path,
                        "uuid": uuid,
                        "addresses": addresses,
                        "ca_cert": ca_cert,
                        "admin_user": admin_user,
                        "admin_password": admin_password,
                        "cloud": cloud,
                        "region": region,
                        "provider_type": provider_type,
                    })),
                )
                .await?;
            Ok(())
        }
        Command::RemoveController { path } => {
            let (user, name) = split_path_arg(&path);
            client
                .call(Method::DELETE, &format!("/v1/controllers/{user}/{name}"), None)
                .await?;
            Ok(())
        }
        Command::SetControllerDeprecated { path, active } => {
            let (user, name) = split_path_arg(&path);
            client
                .call(
                    Method::POST,
                    &format!("/v1/controllers/{user}/{name}/deprecated"),
                    Some(serde_json::json!({"deprecated": !active})),
                )
                .await?;
            Ok(())
        }
        Command::ListControllers => {
            let value = client.call(Method::GET, "/v1/controllers", None).await?;
            print_yaml(&value)
        }
        Command::ControllerInfo { path } => {
            let (user, name) = split_path_arg(&path);
            let value = client
                .call(Method::GET, &format!("/v1/controllers/{user}/{name}"), None)
                .await?;
            print_yaml(&value)
        }
        Command::Locations { filters } => {
            let filters = match parse_filters(&filters) {
                Ok(filters) => filters,
                Err(err) => {
                    // Filter syntax is an argument error, not a runtime one.
                    eprintln!("error: {err}");
                    std::process::exit(2);
                }
            };
            let mut path = "/v1/locations".to_string();
            for (i, (key, value)) in filters.iter().enumerate() {
                let sep = if i == 0 { '?' } else { '&' };
                path.push_str(&format!("{sep}{key}={value}"));
            }
            let value = client.call(Method::GET, &path, None).await?;
            let locations = value
                .get("locations")
                .and_then(|l| l.as_array())
                .cloned()
                .unwrap_or_default();
            if locations.is_empty() {
                return Ok(());
            }
            println!("{:<12} {:<12}", "CLOUD", "REGION");
            for location in locations {
                println!(
                    "{:<12} {:<12}",
                    location["cloud"].as_str().unwrap_or(""),
                    location["region"].as_str().unwrap_or("")
                );
            }
            Ok(())
        }
        Command::ModelStatus { uuid } => {
            let value = client
                .call(Method::GET, &format!("/v1/models/{uuid}/status"), None)
                .await?;
            print_yaml(&value)
        }
        Command::ImportModel {
            controller,
            path,
            uuid,
            credential,
            cloud,
            region,
        } => {
            client
                .call(
                    Method::POST,
                    "/v1/models/import",
                    Some(serde_json::json!({
                        "controller": controller,
                        "path": path,
                        "uuid": uuid,
                        "credential": credential,
                        "cloud": cloud,
                        "region": region,
                    })),
                )
                .await?;
            Ok(())
        }
        Command::UpdateMigratedModel {
            model,
            target_controller,
        } => {
            let (user, name) = split_path_arg(&model);
            client
                .call(
                    Method::POST,
                    &format!("/v1/models/{user}/{name}/migrate"),
                    Some(serde_json::json!({"target_controller": target_controller})),
                )
                .await?;
            Ok(())
        }
        Command::ImportCloudCredentials { file } => {
            let contents = std::fs::read_to_string(&file)
                .with_context(|| format!("read credentials {file}"))?;
            let body: serde_json::Value =
                serde_yaml::from_str(&contents).with_context(|| "parse credentials yaml")?;
            let value = client
                .call(Method::POST, "/v1/credentials/import", Some(body))
                .await?;
            print_yaml(&value)
        }
        Command::GrantAuditLogAccess { user } => {
            client
                .call(
                    Method::POST,
                    "/v1/audit-access/grant",
                    Some(serde_json::json!({"user": user})),
                )
                .await?;
            Ok(())
        }
        Command::RevokeAuditLogAccess { user } => {
            client
                .call(
                    Method::POST,
                    "/v1/audit-access/revoke",
                    Some(serde_json::json!({"user": user})),
                )
                .await?;
            Ok(())
        }
        Command::ListAuditEvents {
            after,
            before,
            limit,
        } => {
            let mut params = Vec::new();
            if let Some(after) = after {
                params.push(format!("after={after}"));
            }
            if let Some(before) = before {
                params.push(format!("before={before}"));
            }
            if let Some(limit) = limit {
                params.push(format!("limit={limit}"));
            }
            let mut path = "/v1/audit-events".to_string();
            if !params.is_empty() {
                path.push('?');
                path.push_str(&params.join("&"));
            }
            let value = client.call(Method::GET, &path, None).await?;
            print_yaml(&value)
        }
        Command::Relate {
            subject,
            relation,
            target,
        } => {
            client
                .call(
                    Method::POST,
                    "/v1/relations",
                    Some(serde_json::json!({"tuples": [
                        {"subject": subject, "relation": relation, "target": target},
                    ]})),
                )
                .await?;
            Ok(())
        }
        Command::Unrelate {
            subject,
            relation,
            target,
        } => {
            client
                .call(
                    Method::DELETE,
                    "/v1/relations",
                    Some(serde_json::json!({"tuples": [
                        {"subject": subject, "relation": relation, "target": target},
                    ]})),
                )
                .await?;
            Ok(())
        }
        Command::CheckRelation {
            subject,
            relation,
            target,
            trace,
        } => {
            let value = client
                .call(
                    Method::POST,
                    "/v1/relations/check",
                    Some(serde_json::json!({
                        "tuple": {"subject": subject, "relation": relation, "target": target},
                        "trace": trace,
                    })),
                )
                .await?;
            print_yaml(&value)
        }
    }
}

#[tokio::main]
async fn main() {
    // Clap reports argument errors with exit code 2 on its own.
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
