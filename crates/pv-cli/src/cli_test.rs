use super::*;
use clap::CommandFactory;

#[test]
fn verify_cli_args() {
    // Validates the entire command tree: short flag conflicts,
    // duplicate args, and other clap definition errors.
    Cli::command().debug_assert();
}

#[test]
fn test_install_defaults() {
    let cli = Cli::try_parse_from(["pv", "install"]).unwrap();
    match cli.command {
        Commands::Install(args) => {
            assert!(!args.dry_run);
            assert_eq!(args.output, OutputFormat::Text);
        }
        other => panic!("unexpected command: {:?}", other),
    }
    assert_eq!(cli.global.project_dir, ".");
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from([
        "pv",
        "install",
        "--dry-run",
        "--output",
        "json",
        "--target",
        "staging",
        "--schema-file",
        "schema.yml",
    ])
    .unwrap();
    assert_eq!(cli.global.target.as_deref(), Some("staging"));
    assert_eq!(cli.global.schema_file.as_deref(), Some("schema.yml"));
    match cli.command {
        Commands::Install(args) => {
            assert!(args.dry_run);
            assert_eq!(args.output, OutputFormat::Json);
        }
        other => panic!("unexpected command: {:?}", other),
    }
}

#[test]
fn test_plan_kind_filter() {
    let cli = Cli::try_parse_from(["pv", "plan", "--kind", "policy"]).unwrap();
    match cli.command {
        Commands::Plan(args) => {
            assert_eq!(args.kind, Some(KindFilter::Policy));
            assert_eq!(
                StatementKind::from(KindFilter::Policy),
                StatementKind::RlsPolicy
            );
        }
        other => panic!("unexpected command: {:?}", other),
    }
}

#[test]
fn test_unknown_kind_rejected() {
    assert!(Cli::try_parse_from(["pv", "plan", "--kind", "view"]).is_err());
}
