use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use flow_policy_autopilot_inference::handler::{handler_reference, render_handler, HANDLER_FILE};
use flow_policy_autopilot_inference::{
    merge_into_role, AwsContext, EnvironmentScope, InferenceEngine, InferenceError,
    InferenceSettings, PolicyDocument, DEFAULT_PARTITION, DEFAULT_ROLE_LOGICAL_ID,
};
use log::{debug, info};
use serde_json::Value;

/// Infers least-privilege execution-role policies from serverless integration flows
#[derive(Parser, Debug)]
#[command(name = "flow-policy-autopilot", version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the policy statements a flow needs as JSON on stdout
    GeneratePolicy {
        #[command(flatten)]
        inference: InferenceArgs,

        /// Wrap the statements in a complete IAM policy document
        #[arg(long)]
        standalone: bool,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Merge the inferred statements into the execution role of a JSON template
    MergePolicy {
        #[command(flatten)]
        inference: InferenceArgs,

        /// Infrastructure template (JSON) owning the execution role
        #[arg(long)]
        template: PathBuf,

        /// Logical id of the execution role resource
        #[arg(long, default_value = DEFAULT_ROLE_LOGICAL_ID)]
        role: String,

        /// Where to write the merged template (defaults to rewriting --template)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Render the function entry point for a flow
    GenerateHandler {
        /// Flow name; the entry point loads `<flow-name>.json`
        #[arg(long)]
        flow_name: String,

        /// Directory to write the entry point into (prints to stdout when omitted)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct InferenceArgs {
    /// Flow document (JSON array of nodes)
    #[arg(long)]
    flow: PathBuf,

    /// Function environment variable as KEY=VALUE (repeatable, overrides --env-file)
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    env: Vec<(String, String)>,

    /// JSON object of the function's environment variables
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Region the function is deployed to (required unless inference is disabled)
    #[arg(long, env = "AWS_REGION")]
    region: Option<String>,

    /// Account the function is deployed to (required unless inference is disabled)
    #[arg(long, env = "AWS_ACCOUNT_ID")]
    account: Option<String>,

    /// Partition of the target account
    #[arg(long, default_value = DEFAULT_PARTITION)]
    partition: String,

    /// Toggle policy inference; when false nothing is generated
    #[arg(
        long,
        env = "FLOW_POLICY_INFER_IAM_POLICIES",
        default_value_t = true,
        action = ArgAction::Set
    )]
    infer_iam_policies: bool,
}

impl InferenceArgs {
    fn settings(&self) -> InferenceSettings {
        InferenceSettings {
            infer_iam_policies: self.infer_iam_policies,
        }
    }

    fn scope(&self) -> Result<EnvironmentScope> {
        let mut variables = match &self.env_file {
            Some(path) => read_env_file(path)?,
            None => BTreeMap::new(),
        };
        variables.extend(self.env.iter().cloned());
        debug!("Environment scope has {} variables", variables.len());
        Ok(EnvironmentScope::new(variables))
    }

    fn aws_context(&self) -> flow_policy_autopilot_inference::Result<AwsContext> {
        let region = self.region.as_deref().ok_or_else(|| {
            InferenceError::invalid_context("no region given (--region or AWS_REGION)")
        })?;
        let account = self.account.as_deref().ok_or_else(|| {
            InferenceError::invalid_context("no account given (--account or AWS_ACCOUNT_ID)")
        })?;
        AwsContext::new(&self.partition, region, account)
    }

    /// Run inference, or `None` when it is turned off
    fn infer(&self) -> Result<Option<PolicyDocument>> {
        if !self.settings().infer_iam_policies {
            info!("Policy inference is disabled, nothing to generate");
            return Ok(None);
        }

        let aws = self.aws_context().context("Invalid deployment target")?;
        let flow = fs::read(&self.flow)
            .with_context(|| format!("Failed to read flow file {}", self.flow.display()))?;
        let scope = self.scope()?;

        let document = InferenceEngine::new(aws)
            .infer_from_bytes(&flow, &scope)
            .with_context(|| format!("Failed to infer policy for {}", self.flow.display()))?;
        Ok(Some(document))
    }
}

fn parse_env_pair(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

fn read_env_file(path: &Path) -> Result<BTreeMap<String, String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read env file {}", path.display()))?;
    let parsed: Value = serde_json::from_str(&content)
        .with_context(|| format!("Env file {} is not valid JSON", path.display()))?;
    let Value::Object(entries) = parsed else {
        bail!("Env file {} must contain a JSON object", path.display());
    };

    entries
        .into_iter()
        .map(|(key, value)| match value {
            Value::String(text) => Ok((key, text)),
            Value::Number(_) | Value::Bool(_) => Ok((key, value.to_string())),
            other => bail!(
                "Env file {}: variable '{}' must be a string, got {}",
                path.display(),
                key,
                other
            ),
        })
        .collect()
}

fn to_json(value: &impl serde::Serialize, pretty: bool) -> Result<String> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    rendered.context("Failed to serialize JSON output")
}

fn generate_policy(inference: &InferenceArgs, standalone: bool, pretty: bool) -> Result<()> {
    let Some(document) = inference.infer()? else {
        return Ok(());
    };

    let output = if standalone {
        to_json(&document.into_iam_policy(), pretty)?
    } else {
        to_json(&document, pretty)?
    };
    println!("{}", output);
    Ok(())
}

fn merge_policy(
    inference: &InferenceArgs,
    template_path: &Path,
    role: &str,
    output: Option<&Path>,
) -> Result<()> {
    let Some(document) = inference.infer()? else {
        return Ok(());
    };

    let content = fs::read_to_string(template_path)
        .with_context(|| format!("Failed to read template {}", template_path.display()))?;
    let mut template: Value = serde_json::from_str(&content)
        .with_context(|| format!("Template {} is not valid JSON", template_path.display()))?;

    let outcome = merge_into_role(&mut template, role, &document)
        .with_context(|| format!("Failed to merge policy into {}", template_path.display()))?;

    let destination = output.unwrap_or(template_path);
    if !outcome.changed() && destination == template_path {
        info!("Template {} already up to date", template_path.display());
        return Ok(());
    }

    let rendered = to_json(&template, true)?;
    fs::write(destination, format!("{}\n", rendered))
        .with_context(|| format!("Failed to write template {}", destination.display()))?;
    info!("Wrote {}", destination.display());
    Ok(())
}

fn generate_handler(flow_name: &str, output_dir: Option<&Path>) -> Result<()> {
    let source = render_handler(flow_name);
    match output_dir {
        Some(dir) => {
            let path = dir.join(HANDLER_FILE);
            fs::write(&path, source)
                .with_context(|| format!("Failed to write entry point {}", path.display()))?;
            info!(
                "Wrote {} (handler reference: {})",
                path.display(),
                handler_reference()
            );
        }
        None => print!("{}", source),
    }
    Ok(())
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::GeneratePolicy {
            inference,
            standalone,
            pretty,
        } => generate_policy(&inference, standalone, pretty),
        Commands::MergePolicy {
            inference,
            template,
            role,
            output,
        } => merge_policy(&inference, &template, &role, output.as_deref()),
        Commands::GenerateHandler {
            flow_name,
            output_dir,
        } => generate_handler(&flow_name, output_dir.as_deref()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
