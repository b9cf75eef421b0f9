mod cli;
mod report;

use shrinkray::{
    config,
    job::{ChannelObserver, JobController, JobResult, TranscodeRequest},
    planner::TranscodePlan,
};
use shrinkray_av::{
    probe_duration, resolve_tool,
    tools::{self, FFPROBE},
};
use shrinkray_common::{Codec, Container, TargetSize};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use report::{format_megabytes, EventPrinter};
use std::path::Path;
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "shrinkray=trace,shrinkray_av=trace,shrinkray_common=trace".to_string()
        } else {
            "shrinkray=info,shrinkray_av=info,shrinkray_common=info".to_string()
        }
    });

    // Logs go to stderr so `--json` output on stdout stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Compress {
            input,
            size,
            codec,
            container,
            json,
        } => compress(&input, &size, codec, container, json, cli.config.as_deref()),
        Commands::Plan {
            input,
            size,
            container,
            json,
        } => plan(&input, &size, container, json, cli.config.as_deref()),
        Commands::Probe { file, json } => probe_file(&file, json, cli.config.as_deref()),
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("shrinkray {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn compress(
    input: &Path,
    size: &str,
    codec: Option<Codec>,
    container: Option<Container>,
    json: bool,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let request = TranscodeRequest::from_user_input(
        Some(input.to_path_buf()),
        size,
        codec.unwrap_or(config.encode.codec),
        container.unwrap_or(config.encode.container),
    )?;

    if !json {
        match std::fs::metadata(input) {
            Ok(meta) => println!("Original file size: {}", format_megabytes(meta.len())),
            Err(_) => println!("Original file size: N/A"),
        }
    }

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(async {
        let controller = JobController::new(config);
        let (observer, mut events) = ChannelObserver::new();
        let handle = controller.start(request, Arc::new(observer))?;

        let cancel = handle.cancel_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling job");
                cancel.cancel();
            }
        });

        // The channel closes when the job task drops its observer.
        let mut printer = EventPrinter::new(std::io::stdout(), json);
        while let Some(event) = events.recv().await {
            printer.print(&event)?;
        }

        anyhow::Ok(handle.join().await)
    })?;

    match result {
        JobResult::Succeeded { .. } => Ok(()),
        JobResult::Failed { error } => {
            Err(anyhow::Error::new(error)).with_context(|| format!("Failed to compress {:?}", input))
        }
        JobResult::Cancelled => anyhow::bail!("Compression of {:?} was cancelled", input),
    }
}

fn plan(
    input: &Path,
    size: &str,
    container: Option<Container>,
    json: bool,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    if !input.is_file() {
        anyhow::bail!("Input file does not exist or is not a file: {:?}", input);
    }
    let target: TargetSize = size.parse()?;
    let container = container.unwrap_or(config.encode.container);

    let ffprobe = resolve_tool(FFPROBE, config.tools.ffprobe_path.as_deref())?;
    let rt = tokio::runtime::Runtime::new()?;
    let duration = rt.block_on(probe_duration(&ffprobe, input))?;

    let plan = TranscodePlan::build(
        input,
        target.bytes(),
        container,
        duration,
        config.encode.margin,
        &config.encode.output_suffix,
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        println!("File: {}", input.display());
        println!("Duration: {:.2}s", plan.duration_secs);
        println!("Target: {}", target);
        println!("Bitrate: {} bit/s ({:.1} kbit/s)", plan.bitrate, plan.bitrate as f64 / 1000.0);
        println!(
            "Estimated video size: {}",
            format_megabytes(plan.estimated_video_bytes())
        );
        println!("Output: {}", plan.output.display());
    }

    Ok(())
}

fn probe_file(file: &Path, json: bool, config_path: Option<&Path>) -> Result<()> {
    if !file.is_file() {
        anyhow::bail!("File does not exist or is not a file: {:?}", file);
    }
    let config = config::load_config_or_default(config_path)?;

    let size = std::fs::metadata(file)?.len();
    let ffprobe = resolve_tool(FFPROBE, config.tools.ffprobe_path.as_deref())?;
    let rt = tokio::runtime::Runtime::new()?;
    let duration = rt.block_on(probe_duration(&ffprobe, file))?;

    if json {
        let info = serde_json::json!({
            "file": file,
            "duration_secs": duration,
            "size_bytes": size,
        });
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        let secs = duration.max(0.0) as u64;
        let mins = secs / 60;
        let hours = mins / 60;
        println!("File: {}", file.display());
        println!("Size: {} ({} bytes)", format_megabytes(size), size);
        println!(
            "Duration: {:02}:{:02}:{:02} ({:.3}s)",
            hours,
            mins % 60,
            secs % 60,
            duration
        );
    }

    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    println!("Checking external tools...\n");

    let tools = tools::check_tools(
        config.tools.ffmpeg_path.as_deref(),
        config.tools.ffprobe_path.as_deref(),
    );
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
        Ok(())
    } else {
        anyhow::bail!("ffmpeg and ffprobe are both required; install the missing tool or set its path in [tools]")
    }
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    let encode = &config.encode;
    println!("  Codec: {} ({})", encode.codec.label(), encode.codec);
    println!(
        "    Supported: {}",
        Codec::ALL.map(|c| c.encoder_name()).join(", ")
    );
    println!("  Container: {}", encode.container);
    println!(
        "    Supported: {}",
        Container::ALL.map(|c| c.extension()).join(", ")
    );
    println!("  Preset: {}", encode.preset);
    println!("  Margin: {}", encode.margin);
    println!("  Output suffix: {}", encode.output_suffix);
    match encode.timeout() {
        Some(t) => println!("  Encode timeout: {}s", t.as_secs()),
        None => println!("  Encode timeout: none"),
    }
    for (name, configured) in [
        ("ffmpeg", &config.tools.ffmpeg_path),
        ("ffprobe", &config.tools.ffprobe_path),
    ] {
        match configured {
            Some(p) => println!("  {}: {}", name, p.display()),
            None => println!("  {}: from PATH", name),
        }
    }

    Ok(())
}
