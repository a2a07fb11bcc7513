use super::Library;
use clap::Parser;
use repokeeper::tooling::cli::{Cli, CliContext, Commands};

#[test]
fn parse_valid_command_matrix() {
    let cases: Vec<Vec<&str>> = vec![
        vec!["repokeeper", "serve"],
        vec!["repokeeper", "--root", "/srv/music", "scan"],
        vec!["repokeeper", "scan", "--format", "json"],
        vec!["repokeeper", "update", "--dry-run"],
        vec!["repokeeper", "update", "--format", "json"],
        vec!["repokeeper", "status"],
        vec![
            "repokeeper",
            "--log-level",
            "debug",
            "--log-format",
            "json",
            "--log-output",
            "file",
            "--log-file",
            "/tmp/repokeeper.log",
            "serve",
        ],
    ];

    for args in cases {
        let parsed = Cli::try_parse_from(args.clone());
        assert!(parsed.is_ok(), "expected valid parse for args: {args:?}");
    }
}

#[test]
fn parse_rejects_unknown_subcommand() {
    assert!(Cli::try_parse_from(["repokeeper", "normalize"]).is_err());
    assert!(Cli::try_parse_from(["repokeeper"]).is_err());
}

#[test]
fn log_flags_override_config() {
    let cli = Cli::try_parse_from(["repokeeper", "--log-level", "trace", "status"]).unwrap();
    let logging = cli.logging_config(&Default::default());
    assert_eq!(logging.level, "trace");
    assert_eq!(logging.output, "stderr");
}

#[test]
fn update_then_status_round_trip() {
    let library = Library::new();
    library.album("Artist/Album", &["01.flac"]);
    let context = CliContext::from_config(library.config()).unwrap();

    let status = context
        .execute(&Commands::Status {
            format: "json".to_string(),
        })
        .unwrap();
    let status: serde_json::Value = serde_json::from_str(&status).unwrap();
    assert_eq!(status["saved"], false);

    let dry = context
        .execute(&Commands::Update {
            format: "json".to_string(),
            dry_run: true,
        })
        .unwrap();
    assert_eq!(dry.trim(), "[]");
    assert!(!library.snapshot.exists());

    context
        .execute(&Commands::Update {
            format: "text".to_string(),
            dry_run: false,
        })
        .unwrap();
    assert!(library.snapshot.exists());

    let status = context
        .execute(&Commands::Status {
            format: "json".to_string(),
        })
        .unwrap();
    let status: serde_json::Value = serde_json::from_str(&status).unwrap();
    assert_eq!(status["saved"], true);
    assert_eq!(status["album_entries"], 1);
    assert_eq!(status["tracked_directories"], 3);

    let scan = context
        .execute(&Commands::Scan {
            format: "json".to_string(),
        })
        .unwrap();
    let rows: Vec<serde_json::Value> = serde_json::from_str(&scan).unwrap();
    assert_eq!(rows.len(), 1);

    assert!(context
        .execute(&Commands::Scan {
            format: "yaml".to_string(),
        })
        .is_err());
}
