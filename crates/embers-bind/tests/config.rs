use std::{
    collections::HashMap,
    path::PathBuf,
};

use embers_bind::{
    config::{
        DISABLE_CACHE_VAR,
        DUMP_DIR_VAR,
        THREAD_GROUP_SIZE_VAR,
    },
    CallOptions,
};
use pretty_assertions::assert_eq;

fn options(vars: &[(&str, &str)]) -> CallOptions {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();
    CallOptions::from_vars(|name| vars.get(name).cloned())
}

#[test]
fn defaults_without_variables() {
    assert_eq!(options(&[]), CallOptions::default());
    assert!(CallOptions::default().cache_enabled);
    assert_eq!(CallOptions::default().thread_group_size, 32);
    assert_eq!(CallOptions::default().dump_dir, None);
}

#[test]
fn variables_override_defaults() {
    let options = options(&[
        (DISABLE_CACHE_VAR, "1"),
        (DUMP_DIR_VAR, "/tmp/kernels"),
        (THREAD_GROUP_SIZE_VAR, " 64 "),
    ]);

    assert_eq!(
        options,
        CallOptions {
            cache_enabled: false,
            dump_dir: Some(PathBuf::from("/tmp/kernels")),
            thread_group_size: 64,
        }
    );
}

#[test]
fn cache_flag_values() {
    for value in ["1", "true", "yes", "on"] {
        assert!(!options(&[(DISABLE_CACHE_VAR, value)]).cache_enabled, "{value}");
    }
    for value in ["0", "false", "off", ""] {
        assert!(options(&[(DISABLE_CACHE_VAR, value)]).cache_enabled, "{value}");
    }
}

#[test]
fn invalid_values_are_ignored() {
    let options = options(&[(THREAD_GROUP_SIZE_VAR, "lots"), (DUMP_DIR_VAR, "")]);
    assert_eq!(options, CallOptions::default());

    let zero = self::options(&[(THREAD_GROUP_SIZE_VAR, "0")]);
    assert_eq!(zero.thread_group_size, 32);
}

#[test]
fn builders() {
    let options = CallOptions::default()
        .with_dump_dir("kernels")
        .without_cache();
    assert_eq!(options.dump_dir, Some(PathBuf::from("kernels")));
    assert!(!options.cache_enabled);
}
