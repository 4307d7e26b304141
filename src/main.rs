//! OtpFlow CLI Entry Point
//!
//! Interactive terminal host that drives a verification flow against the
//! mock authentication service.
//!
//! # Usage
//!
//! ```bash
//! # Log in (any 6-digit code is accepted)
//! otpflow login
//!
//! # Password reset with a fixed code and a slow service
//! otpflow reset --code 424242 --latency 1500
//!
//! # Custom flow definition
//! otpflow --flow flows/short-reset.yaml
//! ```

use std::env;
use std::error::Error;
use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use log::{debug, error, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};

use otpflow::execution::{Completion, Invocation, Resolution, StepWorkflow};
use otpflow::flows::{
    auth_actions, login_flow, password_reset_flow, session_token, session_user, OTP_LENGTH,
};
use otpflow::input::{Edit, SegmentedCodeInput};
use otpflow::service::mock::DEFAULT_LATENCY;
use otpflow::service::{AuthService, MockAuthService};
use otpflow::workflow::{load_definition, ContextUpdate, WorkflowContext, WorkflowDefinition};
use otpflow::{APP_NAME, VERSION};

/// Completion future of the invocation currently in flight.
type PendingCompletion = Pin<Box<dyn Future<Output = Completion> + Send>>;

/// Built-in flow selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlowKind {
    Login,
    Reset,
}

/// Command-line configuration parsed from arguments.
#[derive(Debug)]
struct Config {
    flow: FlowKind,
    flow_path: Option<PathBuf>,
    latency: Duration,
    accepted_code: Option<String>,
    verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            flow: FlowKind::Login,
            flow_path: None,
            latency: DEFAULT_LATENCY,
            accepted_code: None,
            verbose: false,
        }
    }
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| match record.level() {
            log::Level::Warn | log::Level::Error => {
                writeln!(buf, "[{}] {}", record.level(), record.args())
            }
            _ => writeln!(buf, "{}", record.args()),
        })
        .init();
}

fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME.bold(), VERSION);
    println!("Stepped Verification Workflow Engine");
    println!();
}

fn print_usage() {
    println!("Usage: otpflow [OPTIONS] [login|reset]");
    println!();
    println!("Arguments:");
    println!("  [login|reset]       Built-in flow to run (default: login)");
    println!();
    println!("Options:");
    println!("  --flow FILE         Load the flow from a YAML definition instead");
    println!(
        "  --latency MS        Simulated service latency (default: {})",
        DEFAULT_LATENCY.as_millis()
    );
    println!("  --code CODE         Only accept this code (default: any {OTP_LENGTH}-digit code)");
    println!("  --verbose           Enable debug logging");
    println!("  --help              Show this help message");
    println!("  --version           Show version information");
    println!();
    print_commands();
}

fn print_commands() {
    println!("Commands while running:");
    println!("  :back               Return to the previous step");
    println!("  :resend             Request a new code");
    println!("  :restart            Start over from the first step");
    println!("  :cancel             Abandon the flow");
    println!("  :timeline           Show recorded transitions");
    println!("  :quit               Exit");
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut positional_seen = false;
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--flow" => {
                i += 1;
                let path = args.get(i).ok_or("--flow requires a path argument")?;
                config.flow_path = Some(PathBuf::from(path));
            }
            "--latency" => {
                i += 1;
                let value = args.get(i).ok_or("--latency requires a number argument")?;
                let millis: u64 = value
                    .parse()
                    .map_err(|_| format!("Invalid latency value: {}", value))?;
                config.latency = Duration::from_millis(millis);
            }
            "--code" => {
                i += 1;
                let code = args.get(i).ok_or("--code requires a code argument")?;
                config.accepted_code = Some(code.clone());
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            name if !positional_seen => {
                config.flow = match name {
                    "login" => FlowKind::Login,
                    "reset" | "password-reset" => FlowKind::Reset,
                    other => return Err(format!("Unknown flow: {}", other)),
                };
                positional_seen = true;
            }
            other => return Err(format!("Unexpected argument: {}", other)),
        }
        i += 1;
    }

    Ok(config)
}

/// Builds the selected flow, or loads it from YAML.
fn build_flow(
    config: &Config,
    service: Arc<dyn AuthService>,
) -> Result<WorkflowDefinition, Box<dyn Error>> {
    if let Some(path) = &config.flow_path {
        let registry = auth_actions(service);
        return load_definition(path, &registry).map_err(|e| {
            error!("Failed to load flow: {}", e);
            format!("Could not load flow from '{}': {}", path.display(), e).into()
        });
    }

    Ok(match config.flow {
        FlowKind::Login => login_flow(service),
        FlowKind::Reset => password_reset_flow(service),
    })
}

/// Field values typed so far for the active step.
#[derive(Debug, Default)]
struct Form {
    step: Option<usize>,
    values: ContextUpdate,
    next_field: usize,
}

impl Form {
    /// Starts a fresh form if the workflow moved to another step.
    fn sync(&mut self, workflow: &StepWorkflow) -> bool {
        if self.step == workflow.current_index() {
            return false;
        }
        *self = Self {
            step: workflow.current_index(),
            ..Self::default()
        };
        true
    }

    fn clear(&mut self) {
        self.values.clear();
        self.next_field = 0;
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Control {
    Continue,
    Quit,
}

fn announce_step(workflow: &StepWorkflow) {
    let (Some(index), Some(step)) = (workflow.current_index(), workflow.current_step()) else {
        return;
    };

    println!();
    println!(
        "{} {}",
        format!("[{}/{}]", index + 1, workflow.definition().len()).dimmed(),
        step.id.bold()
    );
    if let Some(countdown) = workflow.countdown() {
        println!(
            "  Code expires in {}s. Type :resend for a new one.",
            countdown.remaining()
        );
    }
}

fn show_prompt(workflow: &StepWorkflow, form: &Form) {
    let Some(step) = workflow.current_step() else {
        return;
    };
    if step.terminal || workflow.is_pending() {
        return;
    }
    if workflow.is_expired() {
        println!("{}", "Code expired. Type :resend for a new one.".yellow());
        return;
    }

    let label = match (&step.code_input, step.fields.get(form.next_field)) {
        (Some(config), _) => format!("{} ({} characters)", config.field, config.length),
        (None, Some(field)) => field.clone(),
        (None, None) => "press enter to continue".to_string(),
    };
    print!("{} ", format!("{label}>").cyan());
    // A failed flush only delays the prompt.
    let _ = std::io::stdout().flush();
}

fn report(resolution: &Resolution) {
    match resolution {
        Resolution::Advanced { step } => println!("{} Continue with '{}'", "✓".green(), step),
        Resolution::Completed { step } => println!("{} Reached '{}'", "✓".green(), step),
        Resolution::Failed(err) => println!("{} {}", "✗".red(), err),
        Resolution::Resent => println!("{} New code sent, countdown restarted", "↻".green()),
        Resolution::Discarded => debug!("Ignored a stale response"),
    }
}

fn start(pending: &mut Option<PendingCompletion>, invocation: Invocation) {
    println!("{}", "Working...".dimmed());
    *pending = Some(Box::pin(invocation.run()));
}

fn submit(
    workflow: &mut StepWorkflow,
    input: ContextUpdate,
    pending: &mut Option<PendingCompletion>,
) {
    match workflow.submit_step(input) {
        Ok(invocation) => start(pending, invocation),
        Err(e) => println!("{} {}", "✗".red(), e),
    }
}

/// Replaces the whole code with `text`. A rejected line leaves the cells as they were.
fn replace_code(code: &mut SegmentedCodeInput, text: &str) -> Edit {
    let mut typed = SegmentedCodeInput::with_class(code.len(), code.class());
    let edit = typed.paste(text);
    if edit.is_accepted() {
        *code = typed;
    }
    edit
}

/// Routes a line of text into the active step.
fn enter_text(
    workflow: &mut StepWorkflow,
    form: &mut Form,
    pending: &mut Option<PendingCompletion>,
    text: &str,
) {
    if workflow.is_pending() {
        println!("{}", "Still working, please wait.".dimmed());
        return;
    }
    let Some(step) = workflow.current_step() else {
        return;
    };
    let has_code = step.code_input.is_some();
    let fields = step.fields.clone();

    if has_code {
        if let Some(code) = workflow.code_input_mut() {
            if replace_code(code, text) == Edit::Rejected {
                println!("{} Code contains characters that are not accepted", "✗".red());
                return;
            }
        }
        submit(workflow, ContextUpdate::new(), pending);
        return;
    }

    if let Some(field) = fields.get(form.next_field) {
        form.values.insert(field.clone(), text.into());
        form.next_field += 1;
    }
    if form.next_field >= fields.len() {
        let input = std::mem::take(&mut form.values);
        form.next_field = 0;
        submit(workflow, input, pending);
    }
}

fn handle_line(
    workflow: &mut StepWorkflow,
    form: &mut Form,
    pending: &mut Option<PendingCompletion>,
    line: &str,
) -> Control {
    match line {
        ":quit" | ":q" => return Control::Quit,
        ":help" => print_commands(),
        ":back" => {
            if let Err(e) = workflow.go_back() {
                println!("{} {}", "✗".red(), e);
            }
        }
        ":cancel" => match workflow.cancel() {
            Ok(()) => println!("{}", "Cancelled.".yellow()),
            Err(e) => println!("{} {}", "✗".red(), e),
        },
        ":resend" => match workflow.resend() {
            Ok(invocation) => start(pending, invocation),
            Err(e) => println!("{} {}", "✗".red(), e),
        },
        ":restart" => match workflow.restart() {
            Ok(()) => form.clear(),
            Err(e) => println!("{} {}", "✗".red(), e),
        },
        ":timeline" => println!("{}", workflow.timeline().report()),
        command if command.starts_with(':') => {
            println!("Unknown command: {}", command);
            print_commands();
        }
        text => enter_text(workflow, form, pending, text),
    }
    Control::Continue
}

async fn wait_for(pending: &mut Option<PendingCompletion>) -> Completion {
    match pending {
        Some(future) => future.await,
        None => std::future::pending().await,
    }
}

/// Runs the workflow until it finishes, is cancelled, or input ends.
async fn drive(workflow: &mut StepWorkflow) -> Result<(), Box<dyn Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.tick().await;

    let mut pending: Option<PendingCompletion> = None;
    let mut form = Form::default();
    form.sync(workflow);

    announce_step(workflow);
    show_prompt(workflow, &form);

    while !workflow.is_finished() {
        let redraw = tokio::select! {
            completion = wait_for(&mut pending) => {
                pending = None;
                let resolution = workflow.complete(completion);
                report(&resolution);
                if matches!(resolution, Resolution::Failed(_)) {
                    form.clear();
                }
                true
            }
            _ = ticker.tick() => {
                let expired = workflow.tick();
                if expired {
                    println!();
                }
                expired
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("Input closed");
                    break;
                };
                if handle_line(workflow, &mut form, &mut pending, line.trim()) == Control::Quit {
                    break;
                }
                true
            }
        };

        if !redraw {
            continue;
        }
        if form.sync(workflow) {
            announce_step(workflow);
        }
        show_prompt(workflow, &form);
    }

    Ok(())
}

fn print_outcome(outcome: &WorkflowContext) {
    println!();
    println!("{}", "Flow complete".green().bold());
    if let Some(user) = session_user(outcome) {
        println!("  Signed in as {} ({})", user.username.bold(), user.role);
    }
    if let Some(token) = session_token(outcome) {
        println!("  Session token: {}", token);
    }
    println!(
        "  Fields collected: {}",
        outcome.keys().collect::<Vec<_>>().join(", ")
    );
}

/// Main application entry point.
async fn run() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = env::args().collect();

    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    setup_logging(config.verbose);
    print_banner();

    if let Some(code) = &config.accepted_code {
        if code.chars().count() != OTP_LENGTH || !code.chars().all(|c| c.is_ascii_digit()) {
            warn!("--code '{}' is not a {}-digit code; no code will verify", code, OTP_LENGTH);
        }
    }

    let service = Arc::new(
        MockAuthService::new()
            .with_latency(config.latency)
            .with_accepted_code(config.accepted_code.clone()),
    );

    let definition = build_flow(&config, service)?;
    info!(
        "Flow '{}': {}",
        definition.name,
        definition.step_ids().join(" -> ")
    );

    let mut workflow = StepWorkflow::new(definition)?;
    println!("Running '{}'. Type :help for commands.", workflow.name());

    drive(&mut workflow).await?;

    match workflow.take_outcome() {
        Some(outcome) => print_outcome(&outcome),
        None if workflow.is_cancelled() => println!("Flow cancelled."),
        None => println!("Flow not finished."),
    }

    if config.verbose {
        println!("{}", workflow.timeline().report());
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("otpflow")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_defaults() {
        let config = parse_arguments(&args(&[])).unwrap();
        assert_eq!(config.flow, FlowKind::Login);
        assert_eq!(config.latency, DEFAULT_LATENCY);
        assert!(config.flow_path.is_none());
    }

    #[test]
    fn test_parse_reset_with_options() {
        let config =
            parse_arguments(&args(&["reset", "--code", "424242", "--latency", "10"])).unwrap();
        assert_eq!(config.flow, FlowKind::Reset);
        assert_eq!(config.accepted_code.as_deref(), Some("424242"));
        assert_eq!(config.latency, Duration::from_millis(10));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_arguments(&args(&["--latency", "fast"])).is_err());
        assert!(parse_arguments(&args(&["--flow"])).is_err());
        assert!(parse_arguments(&args(&["signup"])).is_err());
        assert!(parse_arguments(&args(&["login", "reset"])).is_err());
        assert!(parse_arguments(&args(&["--bogus"])).is_err());
    }

    #[test]
    fn test_rejected_code_line_keeps_cells() {
        let mut code = SegmentedCodeInput::new(OTP_LENGTH);
        code.paste("123456");

        assert_eq!(replace_code(&mut code, "12a"), Edit::Rejected);
        assert_eq!(code.value(), "123456");

        assert!(replace_code(&mut code, "98").is_accepted());
        assert_eq!(code.value(), "98");
        assert!(!code.is_complete());
    }

    #[test]
    fn test_text_fills_fields_then_submits() {
        let service = Arc::new(MockAuthService::new().with_latency(Duration::ZERO));
        let mut workflow = StepWorkflow::new(login_flow(service)).unwrap();
        let mut form = Form::default();
        let mut pending = None;
        form.sync(&workflow);

        enter_text(&mut workflow, &mut form, &mut pending, "alice");
        assert!(pending.is_none());
        assert_eq!(form.next_field, 1);

        enter_text(&mut workflow, &mut form, &mut pending, "x");
        assert!(pending.is_some());
        assert!(workflow.is_pending());
    }
}
