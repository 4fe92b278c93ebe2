use anyhow::Context;
use clap::{Arg, Command};
use common::config::Settings;
use std::process;

fn config_arg() -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .value_name("FILE")
        .default_value("config/pipeline.toml")
        .help("Sets a custom config file")
}

fn cli() -> Command {
    Command::new("sales-pipeline")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Runs the raw, silver and gold sales data jobs")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("raw-to-silver")
                .about("Clean the newest raw drop into a new silver partition")
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("silver-to-gold")
                .about("Rebuild the gold fact and dimension tables from the latest silver partition")
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("run-all")
                .about("Run raw-to-silver followed by silver-to-gold")
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("load-plan")
                .about("Print the warehouse TRUNCATE/COPY statements for the gold tables")
                .arg(config_arg()),
        )
}

async fn run(command: &str, config_path: &str) -> anyhow::Result<()> {
    let settings = Settings::new(config_path)
        .with_context(|| format!("failed to load config from {}", config_path))?;
    sales_pipeline::init_tracing(&settings.logging);

    match command {
        "raw-to-silver" => sales_pipeline::run_raw_to_silver(&settings).await?,
        "silver-to-gold" => sales_pipeline::run_silver_to_gold(&settings).await?,
        "run-all" => {
            let report = sales_pipeline::run_all(&settings).await?;
            println!(
                "Pipeline complete: {} silver rows, gold rebuilt from {}",
                report.silver.written_rows(),
                report.gold.partition_prefix
            );
        }
        "load-plan" => sales_pipeline::print_load_plan(&settings)?,
        other => anyhow::bail!("unknown command {}", other),
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();

    let Some((command, sub_matches)) = matches.subcommand() else {
        println!("No subcommand specified. Use --help for usage information.");
        process::exit(1);
    };
    let config_path = sub_matches
        .get_one::<String>("config")
        .map(|s| s.as_str())
        .unwrap_or("config/pipeline.toml");

    if let Err(e) = run(command, config_path).await {
        eprintln!("{} failed: {:#}", command, e);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn config_defaults_per_subcommand() {
        let matches = cli().try_get_matches_from(["sales-pipeline", "run-all"]).unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "run-all");
        assert_eq!(sub.get_one::<String>("config").unwrap(), "config/pipeline.toml");

        let matches = cli()
            .try_get_matches_from(["sales-pipeline", "load-plan", "-c", "prod.toml"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        assert_eq!(sub.get_one::<String>("config").unwrap(), "prod.toml");
    }
}
