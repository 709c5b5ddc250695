use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{exit, Command};

use clap::{Parser, Subcommand, ValueEnum};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const LAMBDA_PACKAGE: &str = "registration_lambda";
const DIST_DIR: &str = "infra/dist";

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the registration pipeline workspace",
    long_about = "Builds, checks and packages the registration Lambda functions.\n\
                  Zip artifacts land in infra/dist for the deployment templates."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run CI checks
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
    /// Run the end-to-end flow tests against in-memory services
    FlowTest,
    /// Build and package Lambda artifacts
    ServerlessPackage {
        /// Compilation target triple for Lambda binaries
        #[arg(long, default_value = "x86_64-unknown-linux-gnu")]
        target: String,
        /// Build profile used for binaries
        #[arg(value_enum, long, default_value_t = BuildProfile::Release)]
        profile: BuildProfile,
        /// Package a single function instead of all of them
        #[arg(value_enum, long)]
        function: Option<LambdaFunction>,
    },
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting, clippy, and tests
    Check,
    /// Build every Lambda binary for the host
    Build,
    /// Run check + build
    All,
}

#[derive(Clone, Copy, ValueEnum)]
enum BuildProfile {
    Debug,
    Release,
}

impl BuildProfile {
    fn dir_name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }

    fn as_cargo_flag(self) -> Option<&'static str> {
        match self {
            Self::Debug => None,
            Self::Release => Some("--release"),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LambdaFunction {
    Api,
    Generator,
    PostConfirmation,
    Runtime,
}

impl LambdaFunction {
    const ALL: [LambdaFunction; 4] = [
        Self::Api,
        Self::Generator,
        Self::PostConfirmation,
        Self::Runtime,
    ];

    fn bin_name(self) -> &'static str {
        match self {
            Self::Api => "api_lambda",
            Self::Generator => "generator_lambda",
            Self::PostConfirmation => "post_confirmation_lambda",
            Self::Runtime => "registration_runtime",
        }
    }

    fn zip_name(self) -> &'static str {
        match self {
            Self::Api => "api.zip",
            Self::Generator => "generator.zip",
            Self::PostConfirmation => "post_confirmation.zip",
            Self::Runtime => "runtime.zip",
        }
    }
}

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn run_cargo(args: &[&str]) -> Result<(), String> {
    eprintln!("+ cargo {}", args.join(" "));
    let status = Command::new("cargo")
        .args(args)
        .status()
        .map_err(|error| format!("failed to execute cargo: {error}"))?;
    if status.success() {
        Ok(())
    } else {
        Err(format!(
            "cargo {} exited with {}",
            args.first().copied().unwrap_or_default(),
            status.code().unwrap_or(1)
        ))
    }
}

fn package_serverless_lambdas(
    target: &str,
    profile: BuildProfile,
    function: Option<LambdaFunction>,
) -> Result<(), String> {
    ensure_rust_target_installed(target)?;
    ensure_c_linker_available(target)?;

    let functions: Vec<LambdaFunction> = match function {
        Some(function) => vec![function],
        None => LambdaFunction::ALL.to_vec(),
    };

    step("Build Lambda binaries");
    let mut cargo_args = vec!["build", "-p", LAMBDA_PACKAGE, "--target", target];
    for function in &functions {
        cargo_args.push("--bin");
        cargo_args.push(function.bin_name());
    }
    if let Some(flag) = profile.as_cargo_flag() {
        cargo_args.push(flag);
    }
    run_cargo(&cargo_args)?;

    step("Package Lambda zip artifacts");
    let target_dir = Path::new("target").join(target).join(profile.dir_name());
    let dist_dir = Path::new(DIST_DIR);
    fs::create_dir_all(dist_dir)
        .map_err(|error| format!("failed to create {}: {error}", dist_dir.display()))?;

    let mut packaged: Vec<PathBuf> = Vec::with_capacity(functions.len());
    for function in functions {
        let zip_path = dist_dir.join(function.zip_name());
        package_lambda_zip(
            &target_dir.join(binary_name(function.bin_name(), target)),
            &zip_path,
        )?;
        packaged.push(zip_path);
    }

    eprintln!("\nPackaged artifacts:");
    for path in packaged {
        eprintln!("- {}", path.display());
    }
    Ok(())
}

fn ensure_rust_target_installed(target: &str) -> Result<(), String> {
    let output = match Command::new("rustup")
        .args(["target", "list", "--installed"])
        .output()
    {
        Ok(value) => value,
        Err(error) => {
            eprintln!(
                "warning: failed to run `rustup target list --installed` ({error}); continuing without target preflight"
            );
            return Ok(());
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "failed to list installed rust targets; run `rustup target list --installed` manually. details: {}",
            stderr.trim()
        ));
    }

    let installed = String::from_utf8_lossy(&output.stdout);
    if installed.lines().any(|line| line.trim() == target) {
        Ok(())
    } else {
        Err(format!(
            "required rust target `{target}` is not installed. install it with `rustup target add {target}` and re-run `cargo run -p xtask -- serverless-package`"
        ))
    }
}

/// Cross-compiling to linux-gnu from Windows needs a Linux C linker for the
/// TLS stack of the AWS SDK.
fn ensure_c_linker_available(target: &str) -> Result<(), String> {
    if !cfg!(windows) || !target.ends_with("unknown-linux-gnu") {
        return Ok(());
    }

    let env_override_keys = [
        format!("CC_{}", target.replace('-', "_")),
        format!("CC_{target}"),
        "TARGET_CC".to_string(),
        "CC".to_string(),
    ];
    let configured = env_override_keys
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .any(|value| !value.trim().is_empty() && tool_works(value.trim()));

    let canonical = "x86_64-linux-gnu-gcc";
    if configured || tool_works(canonical) {
        return Ok(());
    }

    Err(format!(
        "missing C cross-linker for target `{target}`. install `{canonical}` (or set CC_x86_64_unknown_linux_gnu) before running `cargo run -p xtask -- serverless-package`."
    ))
}

fn tool_works(program: &str) -> bool {
    let mut parts = program.split_whitespace();
    let Some(bin) = parts.next() else {
        return false;
    };
    let args: Vec<&str> = parts.collect();

    Command::new(bin)
        .args(&args)
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

fn binary_name(bin_name: &str, target: &str) -> String {
    if target.contains("windows") {
        format!("{bin_name}.exe")
    } else {
        bin_name.to_string()
    }
}

/// The provided.al2023 runtime executes an entry named `bootstrap`.
fn package_lambda_zip(binary_path: &Path, zip_path: &Path) -> Result<(), String> {
    let binary = fs::read(binary_path).map_err(|error| {
        format!(
            "expected lambda binary at '{}': {error}",
            binary_path.display()
        )
    })?;
    let file = fs::File::create(zip_path)
        .map_err(|error| format!("failed to create {}: {error}", zip_path.display()))?;

    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o755);
    zip.start_file("bootstrap", options)
        .map_err(|error| format!("failed to start bootstrap entry: {error}"))?;
    zip.write_all(&binary)
        .map_err(|error| format!("failed to write bootstrap entry: {error}"))?;
    zip.finish()
        .map_err(|error| format!("failed to finish {}: {error}", zip_path.display()))?;
    Ok(())
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_check() -> Result<(), String> {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"])?;

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ])?;

    step("Test registration_core");
    run_cargo(&["test", "-p", "registration_core"])?;

    step("Test registration_lambda");
    run_cargo(&["test", "-p", LAMBDA_PACKAGE])
}

fn ci_build() -> Result<(), String> {
    step("Build Lambda binaries");
    run_cargo(&["build", "-p", LAMBDA_PACKAGE, "--bins"])
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Ci { job } => match job {
            CiJob::Check => ci_check(),
            CiJob::Build => ci_build(),
            CiJob::All => ci_check().and_then(|()| ci_build()),
        }
        .map(|()| eprintln!("\nCI job passed.")),
        Commands::FlowTest => run_cargo(&[
            "test",
            "-p",
            LAMBDA_PACKAGE,
            "--test",
            "integration_registration_flow_tests",
        ]),
        Commands::ServerlessPackage {
            target,
            profile,
            function,
        } => package_serverless_lambdas(&target, profile, function),
    };

    if let Err(message) = result {
        eprintln!("error: {message}");
        exit(1);
    }
}
