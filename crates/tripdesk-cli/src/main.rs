// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod runtime;

use anyhow::{Context, Result, anyhow, bail};
use config::Config;
use runtime::{Command, ListArgs};
use std::env;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tripdesk_app::{Session, SortField, TripId};

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `tripdesk --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;
    init_logging(&config)?;

    let db_path = if options.demo {
        PathBuf::from(":memory:")
    } else {
        config.db_path()?
    };
    if options.print_db_path {
        println!("{}", db_path.display());
        return Ok(());
    }

    let gateway = runtime::open_gateway(&config, &db_path, options.demo)?;
    let mut session = Session::new(gateway);
    if options.check_only {
        return runtime::start(&mut session);
    }

    let stdin = io::stdin();
    let stdout = io::stdout();
    runtime::execute(
        &mut session,
        &options.command,
        config.header_policy(),
        &mut stdin.lock(),
        &mut stdout.lock(),
    )
}

fn init_logging(config: &Config) -> Result<()> {
    let filter = match env::var("TRIPDESK_LOG") {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(&directives)
            .with_context(|| format!("TRIPDESK_LOG={directives:?} is not a valid log filter"))?,
        _ => EnvFilter::try_new(config.log_level())?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|error| anyhow!("initialize logging: {error}"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_db_path: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
    command: Command,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_db_path: false,
        demo: false,
        print_example: false,
        check_only: false,
        show_help: false,
        command: Command::default(),
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-path" => {
                options.print_db_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown if unknown.starts_with('-') => {
                bail!("unknown argument {unknown:?}; run with --help to see supported options");
            }
            name => {
                let rest: Vec<String> = iter.map(|arg| arg.as_ref().to_owned()).collect();
                options.command = parse_command(name, rest)?;
                break;
            }
        }
    }

    Ok(options)
}

fn parse_command(name: &str, args: Vec<String>) -> Result<Command> {
    match name {
        "list" => parse_list_args(args).map(Command::List),
        "import" => {
            let [path] = <[String; 1]>::try_from(args).map_err(|args| {
                anyhow!(
                    "import takes exactly one CSV file, got {}; run `tripdesk import <file.csv>`",
                    args.len()
                )
            })?;
            Ok(Command::Import(PathBuf::from(path)))
        }
        "show" => {
            let [raw] = <[String; 1]>::try_from(args)
                .map_err(|_| anyhow!("show takes one trip id; run `tripdesk show <trip-id>`"))?;
            Ok(Command::Show(parse_trip_id(&raw)?))
        }
        "delete" => {
            let mut trip_ids = Vec::new();
            let mut assume_yes = false;
            for arg in args {
                match arg.as_str() {
                    "--yes" | "-y" => assume_yes = true,
                    raw => trip_ids.push(parse_trip_id(raw)?),
                }
            }
            if trip_ids.is_empty() {
                bail!("delete needs at least one trip id; run `tripdesk delete <trip-id>...`");
            }
            Ok(Command::Delete {
                trip_ids,
                assume_yes,
            })
        }
        "update" => {
            let mut args = args.into_iter();
            let (Some(raw_id), Some(category)) = (args.next(), args.next()) else {
                bail!("update needs a trip id and a category; run `tripdesk update <trip-id> <category> [notes]`");
            };
            let notes = args.next().unwrap_or_default();
            if let Some(extra) = args.next() {
                bail!("unexpected argument {extra:?} after update notes; quote notes that contain spaces");
            }
            Ok(Command::Update {
                trip_id: parse_trip_id(&raw_id)?,
                category,
                notes,
            })
        }
        other => bail!(
            "unknown command {other:?}; expected one of: list, import, show, delete, update"
        ),
    }
}

fn parse_list_args(args: Vec<String>) -> Result<ListArgs> {
    let mut list = ListArgs::default();
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        let mut value_for = |flag: &str| {
            iter.next()
                .ok_or_else(|| anyhow!("{flag} requires a value"))
        };
        match arg.as_str() {
            "--search" => list.search = Some(value_for("--search")?),
            "--project" => list.project = Some(value_for("--project")?),
            "--status" => list.status = Some(value_for("--status")?),
            "--sort" => {
                let raw = value_for("--sort")?;
                let field = SortField::parse(&raw).ok_or_else(|| {
                    let keys: Vec<&str> = SortField::ALL.iter().map(|field| field.as_str()).collect();
                    anyhow!("unknown sort field {raw:?}; use one of: {}", keys.join(", "))
                })?;
                list.sort = Some(field);
            }
            "--desc" => list.descending = true,
            unknown => {
                bail!("unknown list option {unknown:?}; run with --help to see supported options")
            }
        }
    }
    Ok(list)
}

fn parse_trip_id(raw: &str) -> Result<TripId> {
    let value: i64 = raw
        .parse()
        .with_context(|| format!("invalid trip id {raw:?}; use the number from the ID column"))?;
    if value <= 0 {
        bail!("invalid trip id {raw:?}; trip ids are positive");
    }
    Ok(TripId::new(value))
}

fn print_help() {
    println!("tripdesk [options] [command]");
    println!();
    println!("Options:");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-path             Print resolved database path");
    println!("  --print-example-config   Print a v1 config template");
    println!("  --demo                   Run against seeded demo data (in-memory)");
    println!("  --check                  Validate config, backend sign-in, and trip loading");
    println!("  --help                   Show this help");
    println!();
    println!("Commands:");
    println!("  list [--search S] [--project P] [--status S] [--sort FIELD] [--desc]");
    println!("                           Show the trip table (default command)");
    println!("  import <file.csv>        Upload trips from a CSV file");
    println!("  show <trip-id>           Show one trip and its updates");
    println!("  delete <trip-id>... [--yes]");
    println!("                           Delete trips after confirmation");
    println!("  update <trip-id> <category> [notes]");
    println!("                           Post a status update for a trip");
    println!();
    println!("Sort fields: trip, delivery_date, plate, driver, project, status, last_update");
}

#[cfg(test)]
mod tests {
    use super::{CliOptions, parse_cli_args};
    use crate::runtime::{Command, ListArgs};
    use anyhow::Result;
    use std::path::PathBuf;
    use tripdesk_app::{SortField, TripId};

    fn default_options_path() -> PathBuf {
        PathBuf::from("/tmp/tripdesk-config.toml")
    }

    #[test]
    fn parse_cli_args_defaults_to_provided_config_path() -> Result<()> {
        let options = parse_cli_args(Vec::<String>::new(), default_options_path())?;
        assert_eq!(
            options,
            CliOptions {
                config_path: default_options_path(),
                print_config_path: false,
                print_db_path: false,
                demo: false,
                print_example: false,
                check_only: false,
                show_help: false,
                command: Command::List(ListArgs::default()),
            }
        );
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_config_path_override() -> Result<()> {
        let options = parse_cli_args(
            vec!["--config", "/custom/config.toml"],
            default_options_path(),
        )?;
        assert_eq!(options.config_path, PathBuf::from("/custom/config.toml"));
        Ok(())
    }

    #[test]
    fn parse_cli_args_errors_for_missing_config_value() {
        let error = parse_cli_args(vec!["--config"], default_options_path())
            .expect_err("missing config value should fail");
        assert!(error.to_string().contains("--config requires a file path"));
    }

    #[test]
    fn parse_cli_args_errors_for_unknown_argument() {
        let error = parse_cli_args(vec!["--wat"], default_options_path())
            .expect_err("unknown arg should fail");
        let message = error.to_string();
        assert!(message.contains("unknown argument"));
        assert!(message.contains("--help"));
    }

    #[test]
    fn parse_cli_args_sets_print_and_check_flags() -> Result<()> {
        let options = parse_cli_args(
            vec!["--print-config-path", "--print-example-config", "--check"],
            default_options_path(),
        )?;
        assert!(options.print_config_path);
        assert!(!options.print_db_path);
        assert!(!options.demo);
        assert!(options.print_example);
        assert!(options.check_only);
        assert!(!options.show_help);
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_help_flag_for_long_and_short_variants() -> Result<()> {
        let long = parse_cli_args(vec!["--help"], default_options_path())?;
        assert!(long.show_help);

        let short = parse_cli_args(vec!["-h"], default_options_path())?;
        assert!(short.show_help);
        Ok(())
    }

    #[test]
    fn list_command_collects_filters_and_sort() -> Result<()> {
        let options = parse_cli_args(
            vec![
                "--demo", "list", "--search", "lima", "--project", "Norte", "--status",
                "en ruta", "--sort", "plate", "--desc",
            ],
            default_options_path(),
        )?;
        assert!(options.demo);
        assert_eq!(
            options.command,
            Command::List(ListArgs {
                search: Some("lima".to_owned()),
                project: Some("Norte".to_owned()),
                status: Some("en ruta".to_owned()),
                sort: Some(SortField::PlateNumber),
                descending: true,
            })
        );
        Ok(())
    }

    #[test]
    fn list_rejects_unknown_sort_field() {
        let error = parse_cli_args(vec!["list", "--sort", "weight"], default_options_path())
            .expect_err("unknown sort field should fail");
        let message = error.to_string();
        assert!(message.contains("unknown sort field"));
        assert!(message.contains("delivery_date"));
    }

    #[test]
    fn import_requires_exactly_one_file() -> Result<()> {
        let options = parse_cli_args(vec!["import", "trips.csv"], default_options_path())?;
        assert_eq!(options.command, Command::Import(PathBuf::from("trips.csv")));

        let error = parse_cli_args(vec!["import", "a.csv", "b.csv"], default_options_path())
            .expect_err("two files should fail");
        assert!(error.to_string().contains("exactly one CSV file, got 2"));

        assert!(parse_cli_args(vec!["import"], default_options_path()).is_err());
        Ok(())
    }

    #[test]
    fn delete_collects_ids_and_yes_flag() -> Result<()> {
        let options = parse_cli_args(vec!["delete", "3", "--yes", "7"], default_options_path())?;
        assert_eq!(
            options.command,
            Command::Delete {
                trip_ids: vec![TripId::new(3), TripId::new(7)],
                assume_yes: true,
            }
        );

        let error = parse_cli_args(vec!["delete"], default_options_path())
            .expect_err("delete without ids should fail");
        assert!(error.to_string().contains("at least one trip id"));
        Ok(())
    }

    #[test]
    fn trip_ids_must_be_positive_numbers() {
        let error = parse_cli_args(vec!["show", "abc"], default_options_path())
            .expect_err("non-numeric id should fail");
        assert!(error.to_string().contains("invalid trip id"));

        let error = parse_cli_args(vec!["show", "0"], default_options_path())
            .expect_err("zero id should fail");
        assert!(error.to_string().contains("positive"));
    }

    #[test]
    fn update_takes_optional_notes() -> Result<()> {
        let options = parse_cli_args(vec!["update", "4", "en ruta"], default_options_path())?;
        assert_eq!(
            options.command,
            Command::Update {
                trip_id: TripId::new(4),
                category: "en ruta".to_owned(),
                notes: String::new(),
            }
        );

        let options = parse_cli_args(
            vec!["update", "4", "entregado", "firmado por cliente"],
            default_options_path(),
        )?;
        assert!(matches!(options.command, Command::Update { ref notes, .. } if notes == "firmado por cliente"));
        Ok(())
    }

    #[test]
    fn unknown_command_lists_the_valid_ones() {
        let error = parse_cli_args(vec!["export"], default_options_path())
            .expect_err("unknown command should fail");
        let message = error.to_string();
        assert!(message.contains("unknown command \"export\""));
        assert!(message.contains("list, import, show, delete, update"));
    }
}
