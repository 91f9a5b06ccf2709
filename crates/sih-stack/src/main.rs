//! `sih-synth`: assemble, render and upload from the command line

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use sih_graph::DeployEnvironment;
use sih_stack::{DirectoryObjectStore, ImageHandlerStack, ImageUpload, RenderSummary, StackConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn config_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("config")
            .long("config")
            .short('c')
            .env("SIH_CONFIG")
            .default_value("sih.toml")
            .value_parser(value_parser!(PathBuf))
            .help("Stack configuration file; defaults apply when it does not exist"),
    )
    .arg(
        Arg::new("api-body")
            .long("api-body")
            .value_parser(value_parser!(PathBuf))
            .help("JSON route definition attached to the REST API"),
    )
}

fn cli() -> Command {
    Command::new("sih-synth")
        .version(sih_stack::VERSION)
        .about("Serverless image handler template synthesis")
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines on stderr"),
        )
        .subcommand(
            config_args(Command::new("synth").about("Assemble and print the template"))
                .arg(
                    Arg::new("out")
                        .long("out")
                        .short('o')
                        .value_parser(value_parser!(PathBuf))
                        .help("Write the template here instead of stdout"),
                )
                .arg(
                    Arg::new("compact")
                        .long("compact")
                        .action(ArgAction::SetTrue)
                        .help("Single-line JSON"),
                ),
        )
        .subcommand(
            config_args(
                Command::new("render")
                    .about("List the resources and outputs a deployment would create"),
            )
            .arg(
                Arg::new("region")
                    .long("region")
                    .required(true)
                    .help("Deployment region"),
            )
            .arg(
                Arg::new("param")
                    .long("param")
                    .short('p')
                    .action(ArgAction::Append)
                    .help("Parameter value as NAME=VALUE; repeatable"),
            )
            .arg(
                Arg::new("json")
                    .long("json")
                    .action(ArgAction::SetTrue)
                    .help("Output as JSON"),
            ),
        )
        .subcommand(
            Command::new("upload")
                .about("Decode a base64 image and store it under a local directory")
                .arg(
                    Arg::new("root")
                        .long("root")
                        .default_value(".")
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory standing in for object storage"),
                )
                .arg(Arg::new("bucket").long("bucket").required(true))
                .arg(Arg::new("key").long("key").required(true))
                .arg(
                    Arg::new("file")
                        .long("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("File holding the base64 image or data URL"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_stack(args: &ArgMatches) -> Result<ImageHandlerStack> {
    let path = args
        .get_one::<PathBuf>("config")
        .context("no configuration path")?;
    let mut config = StackConfig::load(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    if let Some(api_body) = args.get_one::<PathBuf>("api-body") {
        config.api_definition = Some(api_body.clone());
    }
    ImageHandlerStack::from_config(&config).context("failed to prepare the stack")
}

fn synth(args: &ArgMatches) -> Result<()> {
    let template = load_stack(args)?
        .assemble()
        .context("failed to assemble the template")?;
    let rendered = if args.get_flag("compact") {
        serde_json::to_string(&template.to_json())?
    } else {
        template.to_string_pretty()?
    };
    match args.get_one::<PathBuf>("out") {
        Some(out) => std::fs::write(out, rendered)
            .with_context(|| format!("failed to write {}", out.display()))?,
        None => println!("{rendered}"),
    }
    eprintln!("fingerprint: {}", template.fingerprint());
    Ok(())
}

fn render(args: &ArgMatches) -> Result<()> {
    let stack = load_stack(args)?;
    let region = args
        .get_one::<String>("region")
        .context("no region given")?;
    let mut env = DeployEnvironment::new().with_region(region);
    for raw in args.get_many::<String>("param").into_iter().flatten() {
        let Some((name, value)) = raw.split_once('=') else {
            bail!("parameter {raw:?} is not NAME=VALUE");
        };
        env = env.with_parameter(name, value);
    }

    let summary = stack
        .render(&env)
        .with_context(|| format!("failed to render for {region}"))?;
    let RenderSummary { resources, outputs } = &summary;
    if args.get_flag("json") {
        let report = serde_json::json!({
            "region": region,
            "resources": resources,
            "outputs": outputs,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Resources ({}):", resources.len());
        for id in resources {
            println!("  {id}");
        }
        println!("Outputs ({}):", outputs.len());
        for id in outputs {
            println!("  {id}");
        }
    }
    Ok(())
}

async fn upload(args: &ArgMatches) -> Result<()> {
    let root = args.get_one::<PathBuf>("root").context("no root given")?;
    let bucket = args.get_one::<String>("bucket").context("no bucket given")?;
    let key = args.get_one::<String>("key").context("no key given")?;
    let file = args.get_one::<PathBuf>("file").context("no file given")?;

    let image = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    ImageUpload::new(DirectoryObjectStore::new(root.clone()))
        .upload_to_bucket(image.trim(), key, bucket)
        .await
        .context("upload failed")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    match matches.subcommand() {
        Some(("synth", args)) => synth(args),
        Some(("render", args)) => render(args),
        Some(("upload", args)) => upload(args).await,
        _ => {
            cli().print_help()?;
            Ok(())
        }
    }
}
