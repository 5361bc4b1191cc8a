//! Integration tests for config loading and substitution

use viewdeploy_core::{Config, Environment, SchemaSubstitution};

#[test]
fn substitute_from_layered_files() {
    let dir = tempfile::tempdir().unwrap();
    let main = dir.path().join("viewdeploy.toml");
    let secrets = dir.path().join("passwords.toml");

    std::fs::write(
        &main,
        r#"
[environments.prod]
host = "db.internal"
port = 3306
username = "deployer"
reporting = "reporting_live"
warehouse = "warehouse_live"
events = "events_live"
"#,
    )
    .unwrap();
    std::fs::write(&secrets, "[environments.prod]\npassword = \"s3cret\"\n").unwrap();

    let config = Config::from_files(&[main, secrets]).unwrap();
    let prod = config.environment(Environment::Prod).unwrap();
    assert_eq!(prod.password.as_deref(), Some("s3cret"));
    assert_eq!(prod.username.as_deref(), Some("deployer"));

    let sub = SchemaSubstitution::for_environment(&config, Environment::Prod).unwrap();
    let sql = "CREATE OR REPLACE VIEW [reporting].sales AS\nSELECT * FROM [warehouse].orders o JOIN [events].clicks c ON c.order_id = o.id";

    assert_eq!(
        sub.apply(sql),
        "CREATE OR REPLACE VIEW reporting_live.sales AS\nSELECT * FROM warehouse_live.orders o JOIN events_live.clicks c ON c.order_id = o.id"
    );
}

#[test]
fn missing_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = Config::from_file(&dir.path().join("nope.toml"));
    assert!(result.is_err());
}
