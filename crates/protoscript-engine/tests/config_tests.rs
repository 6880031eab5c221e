//! Options file tests

use protoscript_engine::{CompilerOptions, ConfigError, OptLevel};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_load_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("protoscript.toml");
    fs::write(
        &path,
        r#"
[compiler]
opt_level = "basic"
module_name = "demo"
"#,
    )
    .unwrap();

    let options = CompilerOptions::from_file(&path).unwrap();
    assert_eq!(options.opt_level, OptLevel::Basic);
    assert_eq!(options.module_name, "demo");
    assert!(options.emit_prelude);
    assert_eq!(options.file_name, None);
}

#[test]
fn test_save_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("protoscript.toml");
    let options = CompilerOptions {
        file_name: Some("app.ps".to_string()),
        emit_prelude: false,
        ..CompilerOptions::default().with_opt_level(OptLevel::None).with_module_name("app")
    };
    options.to_file(&path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("[compiler]"));
    assert!(text.contains("opt_level = \"none\""));
    assert_eq!(CompilerOptions::from_file(&path).unwrap(), options);
}

#[test]
fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    let err = CompilerOptions::from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::IoError(_)));
}

#[test]
fn test_invalid_module_name_in_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("protoscript.toml");
    fs::write(&path, "[compiler]\nmodule_name = \"bad name\"\n").unwrap();
    let err = CompilerOptions::from_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError(_)));
}
