use ferrous_intercept::{DiError, InterceptionOptions, FOLD_CONSTANTS_ENV};
use serial_test::serial;

struct EnvGuard;

impl EnvGuard {
    fn set(value: &str) -> Self {
        std::env::set_var(FOLD_CONSTANTS_ENV, value);
        EnvGuard
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        std::env::remove_var(FOLD_CONSTANTS_ENV);
    }
}

#[test]
#[serial]
fn missing_variable_keeps_defaults() {
    std::env::remove_var(FOLD_CONSTANTS_ENV);
    assert_eq!(InterceptionOptions::from_env().unwrap(), InterceptionOptions::default());
}

#[test]
#[serial]
fn variable_disables_folding() {
    let _env = EnvGuard::set("false");
    assert!(!InterceptionOptions::from_env().unwrap().fold_constant_proxies);
}

#[test]
#[serial]
fn numeric_flags_are_accepted() {
    let _env = EnvGuard::set("1");
    assert!(InterceptionOptions::from_env().unwrap().fold_constant_proxies);
}

#[test]
#[serial]
fn garbage_is_a_configuration_error() {
    let _env = EnvGuard::set("sometimes");
    match InterceptionOptions::from_env() {
        Err(DiError::Configuration(msg)) => {
            assert!(msg.contains(FOLD_CONSTANTS_ENV));
            assert!(msg.contains("sometimes"));
        }
        other => panic!("expected configuration error, got {:?}", other),
    }
}
