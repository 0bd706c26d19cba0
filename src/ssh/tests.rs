//! Unit tests for remote shell argument building and classification.

use std::net::{IpAddr, Ipv4Addr};

use rstest::rstest;

use super::{HostKeyPolicy, RemoteShell, SshConfig, SshError};
use crate::test_support::{ScriptedRunner, command_string};

fn base_config() -> SshConfig {
    SshConfig {
        ssh_bin: String::from("ssh"),
        sshpass_bin: String::from("sshpass"),
        port: 22,
        connect_timeout_secs: 30,
        known_hosts_file: None,
        accept_unknown_host_keys: false,
    }
}

fn host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))
}

fn shell_with(config: SshConfig, runner: ScriptedRunner) -> RemoteShell<ScriptedRunner> {
    RemoteShell::new(config, runner).expect("config should validate")
}

#[test]
fn target_uses_the_configured_port() {
    let config = SshConfig {
        port: 2222,
        ..base_config()
    };
    let shell = shell_with(config, ScriptedRunner::new());

    let target = shell.target(host(), "cirros");

    assert_eq!(target.port, 2222);
    assert_eq!(target.user, "cirros");
}

#[test]
fn execute_wraps_ssh_in_sshpass_with_env_password() {
    let runner = ScriptedRunner::new();
    runner.push_success();
    let shell = shell_with(base_config(), runner.clone());
    let target = shell.target(host(), "cirros");

    shell
        .execute(&target, "secret", "true", None)
        .expect("execute should succeed");

    let invocations = runner.invocations();
    let invocation = invocations
        .first()
        .expect("expected a single invocation to exist");
    assert_eq!(invocation.program, "sshpass");
    assert_eq!(
        invocation.args.first().map(|arg| arg.to_string_lossy().into_owned()),
        Some(String::from("-e"))
    );
    assert_eq!(
        invocation.envs,
        vec![(String::from("SSHPASS"), String::from("secret"))]
    );

    let rendered = command_string(invocation);
    assert!(
        rendered.contains("ConnectTimeout=30"),
        "expected bounded connect timeout, got: {rendered}"
    );
    assert!(
        rendered.contains("NumberOfPasswordPrompts=1"),
        "expected a single password prompt, got: {rendered}"
    );
    assert!(
        rendered.ends_with("cirros@10.0.0.5 true"),
        "expected target and command last, got: {rendered}"
    );
}

#[rstest]
#[case::system(base_config(), "StrictHostKeyChecking=yes", None)]
#[case::pinned(
    SshConfig {
        known_hosts_file: Some(String::from("/etc/volia/known_hosts")),
        ..base_config()
    },
    "StrictHostKeyChecking=yes",
    Some("UserKnownHostsFile=/etc/volia/known_hosts")
)]
#[case::accept_any(
    SshConfig {
        accept_unknown_host_keys: true,
        ..base_config()
    },
    "StrictHostKeyChecking=no",
    Some("UserKnownHostsFile=/dev/null")
)]
fn host_key_policy_maps_to_ssh_options(
    #[case] config: SshConfig,
    #[case] expected_checking: &str,
    #[case] expected_known_hosts: Option<&str>,
) {
    let runner = ScriptedRunner::new();
    runner.push_success();
    let shell = shell_with(config, runner.clone());
    let target = shell.target(host(), "cirros");

    shell
        .execute(&target, "secret", "true", None)
        .expect("execute should succeed");

    let invocations = runner.invocations();
    let rendered = command_string(
        invocations
            .first()
            .expect("expected a single invocation to exist"),
    );
    assert!(
        rendered.contains(expected_checking),
        "expected '{expected_checking}', got: {rendered}"
    );
    match expected_known_hosts {
        Some(fragment) => assert!(
            rendered.contains(fragment),
            "expected '{fragment}', got: {rendered}"
        ),
        None => assert!(
            !rendered.contains("UserKnownHostsFile"),
            "expected the default known-hosts files, got: {rendered}"
        ),
    }
}

#[test]
fn host_key_policy_derivation() {
    assert_eq!(base_config().host_key_policy(), HostKeyPolicy::System);
    assert!(matches!(
        SshConfig {
            known_hosts_file: Some(String::from("/tmp/hosts")),
            ..base_config()
        }
        .host_key_policy(),
        HostKeyPolicy::Pinned(_)
    ));
    assert_eq!(
        SshConfig {
            accept_unknown_host_keys: true,
            ..base_config()
        }
        .host_key_policy(),
        HostKeyPolicy::AcceptAny
    );
}

#[test]
fn validate_rejects_conflicting_host_key_settings() {
    let config = SshConfig {
        known_hosts_file: Some(String::from("/tmp/hosts")),
        accept_unknown_host_keys: true,
        ..base_config()
    };
    assert_eq!(config.validate(), Err(SshError::ConflictingHostKeyPolicy));
}

#[rstest]
#[case(SshConfig { ssh_bin: String::from("  "), ..base_config() }, "ssh_bin")]
#[case(SshConfig { sshpass_bin: String::new(), ..base_config() }, "sshpass_bin")]
#[case(SshConfig { connect_timeout_secs: 0, ..base_config() }, "connect_timeout_secs")]
fn validate_rejects_missing_values(#[case] config: SshConfig, #[case] field: &str) {
    let err = config.validate().expect_err("config should be rejected");
    assert!(
        matches!(err, SshError::InvalidConfig { field: ref name } if name == field),
        "expected InvalidConfig for {field}, got {err:?}"
    );
}

#[test]
fn execute_classifies_the_ssh_client_failure_code() {
    let runner = ScriptedRunner::new();
    runner.push_output(Some(255), "", "Connection refused");
    let shell = shell_with(base_config(), runner);
    let target = shell.target(host(), "cirros");

    let result = shell.execute(&target, "secret", "true", None);

    assert!(
        matches!(
            result,
            Err(SshError::Connection { ref host, .. }) if host == "10.0.0.5"
        ),
        "expected Connection, got {result:?}"
    );
}

#[test]
fn execute_requires_an_exit_code() {
    let runner = ScriptedRunner::new();
    runner.push_missing_exit_code();
    let shell = shell_with(base_config(), runner);
    let target = shell.target(host(), "cirros");

    let result = shell.execute(&target, "secret", "true", None);

    assert!(
        matches!(result, Err(SshError::MissingExitCode { .. })),
        "expected MissingExitCode, got {result:?}"
    );
}

#[test]
fn execute_passes_remote_exit_codes_through() {
    let runner = ScriptedRunner::new();
    runner.push_output(Some(7), "out", "err");
    let shell = shell_with(base_config(), runner);
    let target = shell.target(host(), "cirros");

    let output = shell
        .execute(&target, "secret", "true", None)
        .expect("non-255 codes are not session failures");

    assert_eq!(output.exit_code, 7);
    assert_eq!(output.stdout, "out");
    assert_eq!(output.stderr, "err");
}

#[test]
fn execute_forwards_the_stdin_payload() {
    let runner = ScriptedRunner::new();
    runner.push_success();
    let shell = shell_with(base_config(), runner.clone());
    let target = shell.target(host(), "cirros");

    shell
        .execute(&target, "secret", "true", Some("secret\n"))
        .expect("execute should succeed");

    let invocations = runner.invocations();
    let invocation = invocations
        .first()
        .expect("expected a single invocation to exist");
    assert_eq!(invocation.stdin.as_deref(), Some("secret\n"));
}
