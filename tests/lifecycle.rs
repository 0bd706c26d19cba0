//! End-to-end lifecycle scenario over the in-memory control planes.
//!
//! Mirrors the helper's intended usage: create a named volume, resolve it
//! by name, attach it to a server, format it over SSH, detach, and delete.

use volia::test_support::{CloudCall, FakeCloud, ScriptedRunner};
use volia::{
    AddressRecord, CreateVolumeRequest, FormatRequest, HelperError, NetworkAddresses, RemoteLogin,
    RemoteShell, ServerRecord, SshConfig, VolumeHelper,
};

fn seed_instance(cloud: &FakeCloud) {
    cloud.seed_server(
        ServerRecord {
            id: String::from("srv-1"),
            name: String::from("inst-1"),
        },
        vec![NetworkAddresses {
            network: String::from("private"),
            addresses: vec![AddressRecord {
                addr: String::from("10.0.0.5"),
                version: 4,
            }],
        }],
    );
}

fn ssh_config() -> SshConfig {
    SshConfig {
        ssh_bin: String::from("ssh"),
        sshpass_bin: String::from("sshpass"),
        port: 22,
        connect_timeout_secs: 30,
        known_hosts_file: None,
        accept_unknown_host_keys: true,
    }
}

#[tokio::test]
async fn full_volume_lifecycle() {
    let cloud = FakeCloud::new();
    seed_instance(&cloud);
    let helper = VolumeHelper::new(cloud.storage(), cloud.compute());

    // Create and resolve by name.
    let volume_id = helper
        .create(&CreateVolumeRequest::new(1).display_name("vol-a"))
        .await
        .expect("create should succeed");
    let looked_up = helper.lookup("vol-a").await.expect("lookup should succeed");
    assert_eq!(volume_id, looked_up);

    // Attach routes through the compute plane with the resolved ids.
    helper
        .attach("vol-a", "inst-1", "/dev/vdb")
        .await
        .expect("attach should succeed");
    assert!(cloud.calls().contains(&CloudCall::AttachVolume {
        server_id: String::from("srv-1"),
        volume_id: volume_id.clone(),
        device: String::from("/dev/vdb"),
    }));

    // Format over one scripted SSH session.
    let runner = ScriptedRunner::new();
    runner.push_success();
    let shell = RemoteShell::new(ssh_config(), runner.clone()).expect("config should validate");
    let outcome = helper
        .format_volume(
            &shell,
            &FormatRequest::new("vol-a", RemoteLogin::new("cirros", "cubswin:)")),
        )
        .await
        .expect("format should succeed");
    assert_eq!(outcome.device, "/dev/vdb");
    assert_eq!(runner.invocations().len(), 1);

    // Detach uses the attachment's recorded server id.
    helper.detach("vol-a").await.expect("detach should succeed");
    assert!(cloud.calls().contains(&CloudCall::DetachVolume {
        server_id: String::from("srv-1"),
        volume_id: volume_id.clone(),
    }));

    // Delete goes to the storage plane with the resolved id.
    helper.delete("vol-a").await.expect("delete should succeed");
    assert!(
        cloud
            .calls()
            .contains(&CloudCall::DeleteVolume(volume_id.clone()))
    );

    // The name no longer resolves.
    let gone = helper.lookup("vol-a").await;
    assert!(
        matches!(gone, Err(HelperError::VolumeNotFound { .. })),
        "expected VolumeNotFound after delete, got {gone:?}"
    );
}

#[tokio::test]
async fn ghost_references_never_resolve() {
    let cloud = FakeCloud::new();
    let helper = VolumeHelper::new(cloud.storage(), cloud.compute());

    let result = helper.lookup("ghost").await;

    assert!(
        matches!(
            result,
            Err(HelperError::VolumeNotFound { ref reference }) if reference == "ghost"
        ),
        "expected VolumeNotFound, got {result:?}"
    );
}
