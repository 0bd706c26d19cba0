//! Unit tests for resolution and lifecycle orchestration.

use rstest::rstest;

use super::{HelperError, VolumeHelper};
use crate::api::{
    AddressRecord, ApiError, AttachmentRecord, CreateVolumeRequest, NetworkAddresses, ServerRecord,
    VolumeRecord,
};
use crate::test_support::{CloudCall, FakeBlockStorage, FakeCloud, FakeCompute};

fn volume(id: &str, name: Option<&str>) -> VolumeRecord {
    VolumeRecord {
        id: id.to_owned(),
        display_name: name.map(str::to_owned),
        status: String::from("available"),
        size_gb: 1,
        attachments: Vec::new(),
    }
}

fn server(id: &str, name: &str) -> ServerRecord {
    ServerRecord {
        id: id.to_owned(),
        name: name.to_owned(),
    }
}

fn network(label: &str, entries: &[(&str, u8)]) -> NetworkAddresses {
    NetworkAddresses {
        network: label.to_owned(),
        addresses: entries
            .iter()
            .map(|(addr, version)| AddressRecord {
                addr: (*addr).to_owned(),
                version: *version,
            })
            .collect(),
    }
}

fn helper(cloud: &FakeCloud) -> VolumeHelper<FakeBlockStorage, FakeCompute> {
    VolumeHelper::new(cloud.storage(), cloud.compute())
}

#[rstest]
#[case("")]
#[case("   ")]
#[tokio::test]
async fn blank_references_fail_before_any_remote_call(#[case] reference: &str) {
    let cloud = FakeCloud::new();
    let subject = helper(&cloud);

    let lookup = subject.lookup(reference).await;
    let delete = subject.delete(reference).await;
    let attach = subject.attach(reference, "inst-1", "/dev/vdb").await;
    let detach = subject.detach(reference).await;

    for result in [lookup.map(|_| ()), delete, attach.map(|_| ()), detach] {
        assert!(
            matches!(result, Err(HelperError::InvalidReference(_))),
            "expected InvalidReference, got {result:?}"
        );
    }
    assert!(
        cloud.calls().is_empty(),
        "no remote call may precede validation, got {:?}",
        cloud.calls()
    );
}

#[tokio::test]
async fn id_match_skips_the_name_search() {
    let cloud = FakeCloud::new();
    cloud.seed_volume(volume("vol-1", Some("cache")));
    let subject = helper(&cloud);

    let resolved = subject.resolve_volume("vol-1").await.expect("id should hit");

    assert_eq!(resolved.id, "vol-1");
    assert_eq!(cloud.calls(), vec![CloudCall::VolumeById(String::from("vol-1"))]);
}

#[tokio::test]
async fn name_fallback_runs_only_after_id_absence() {
    let cloud = FakeCloud::new();
    cloud.seed_volume(volume("vol-1", Some("cache")));
    let subject = helper(&cloud);

    let resolved = subject
        .resolve_volume("cache")
        .await
        .expect("name should match");

    assert_eq!(resolved.id, "vol-1");
    assert_eq!(
        cloud.calls(),
        vec![
            CloudCall::VolumeById(String::from("cache")),
            CloudCall::VolumesByName(String::from("cache")),
        ]
    );
}

#[tokio::test]
async fn transient_failure_does_not_widen_to_name_search() {
    let cloud = FakeCloud::new();
    cloud.seed_volume(volume("vol-1", Some("cache")));
    cloud.fail_next_volume_lookup(ApiError::Transport {
        message: String::from("timed out"),
    });
    let subject = helper(&cloud);

    let result = subject.resolve_volume("cache").await;

    assert!(
        matches!(result, Err(HelperError::Api(ApiError::Transport { .. }))),
        "expected the transport error to propagate, got {result:?}"
    );
    assert_eq!(cloud.calls(), vec![CloudCall::VolumeById(String::from("cache"))]);
}

#[tokio::test]
async fn resolving_ghost_reports_not_found() {
    let cloud = FakeCloud::new();
    let subject = helper(&cloud);

    let result = subject.resolve_volume("ghost").await;

    assert!(
        matches!(
            result,
            Err(HelperError::VolumeNotFound { ref reference }) if reference == "ghost"
        ),
        "expected VolumeNotFound, got {result:?}"
    );
}

#[tokio::test]
async fn first_name_match_wins() {
    let cloud = FakeCloud::new();
    cloud.seed_volume(volume("vol-1", Some("dup")));
    cloud.seed_volume(volume("vol-2", Some("dup")));
    let subject = helper(&cloud);

    let resolved = subject.resolve_volume("dup").await.expect("name should match");

    assert_eq!(resolved.id, "vol-1");
}

#[tokio::test]
async fn create_then_lookup_round_trips_the_id() {
    let cloud = FakeCloud::new();
    let subject = helper(&cloud);

    let request = CreateVolumeRequest::new(1).display_name("vol-a");
    let created = subject.create(&request).await.expect("create should succeed");
    let looked_up = subject.lookup("vol-a").await.expect("lookup should succeed");

    assert_eq!(created, looked_up);
}

#[tokio::test]
async fn attach_routes_through_the_compute_plane() {
    let cloud = FakeCloud::new();
    cloud.seed_volume(volume("vol-1", Some("vol-a")));
    cloud.seed_server(server("srv-1", "inst-1"), Vec::new());
    let subject = helper(&cloud);

    let attachment = subject
        .attach("vol-a", "inst-1", "/dev/vdb")
        .await
        .expect("attach should succeed");

    assert_eq!(attachment.server_id, "srv-1");
    assert!(cloud.calls().contains(&CloudCall::AttachVolume {
        server_id: String::from("srv-1"),
        volume_id: String::from("vol-1"),
        device: String::from("/dev/vdb"),
    }));
}

#[tokio::test]
async fn detach_uses_the_recorded_server_id() {
    let cloud = FakeCloud::new();
    let mut attached = volume("vol-1", Some("vol-a"));
    attached.attachments.push(AttachmentRecord {
        server_id: String::from("srv-1"),
        device: String::from("/dev/vdb"),
    });
    cloud.seed_volume(attached);
    let subject = helper(&cloud);

    subject.detach("vol-a").await.expect("detach should succeed");

    assert!(cloud.calls().contains(&CloudCall::DetachVolume {
        server_id: String::from("srv-1"),
        volume_id: String::from("vol-1"),
    }));
}

#[tokio::test]
async fn detach_without_attachment_fails_and_issues_no_call() {
    let cloud = FakeCloud::new();
    cloud.seed_volume(volume("vol-1", Some("vol-a")));
    let subject = helper(&cloud);

    let result = subject.detach("vol-a").await;

    assert!(
        matches!(
            result,
            Err(HelperError::NotAttached { ref volume_id }) if volume_id == "vol-1"
        ),
        "expected NotAttached, got {result:?}"
    );
    assert!(
        !cloud
            .calls()
            .iter()
            .any(|call| matches!(call, CloudCall::DetachVolume { .. })),
        "no detach call may be issued for an unattached volume"
    );
}

#[tokio::test]
async fn attachment_reads_the_first_record() {
    let cloud = FakeCloud::new();
    let mut multi = volume("vol-1", None);
    multi.attachments.push(AttachmentRecord {
        server_id: String::from("srv-1"),
        device: String::from("/dev/vdb"),
    });
    multi.attachments.push(AttachmentRecord {
        server_id: String::from("srv-2"),
        device: String::from("/dev/vdc"),
    });
    cloud.seed_volume(multi);
    let subject = helper(&cloud);

    let attachment = subject
        .attachment("vol-1")
        .await
        .expect("attachment should resolve");

    assert_eq!(attachment.server_id, "srv-1");
    assert_eq!(attachment.device, "/dev/vdb");
}

#[tokio::test]
async fn resolve_server_falls_back_to_exact_name() {
    let cloud = FakeCloud::new();
    cloud.seed_server(server("srv-1", "inst-1"), Vec::new());
    let subject = helper(&cloud);

    let resolved = subject
        .resolve_server("inst-1")
        .await
        .expect("name should match");

    assert_eq!(resolved.id, "srv-1");
    assert_eq!(
        cloud.calls(),
        vec![
            CloudCall::ServerById(String::from("inst-1")),
            CloudCall::ServersByName(String::from("inst-1")),
        ]
    );
}

#[tokio::test]
async fn server_ip_prefers_ipv4_within_the_first_network() {
    let cloud = FakeCloud::new();
    cloud.seed_server(
        server("srv-1", "inst-1"),
        vec![network(
            "private",
            &[("fd00::5", 6), ("10.0.0.5", 4), ("10.0.0.6", 4)],
        )],
    );
    let subject = helper(&cloud);

    let ip = subject.server_ip("srv-1").await.expect("address expected");

    assert_eq!(ip.to_string(), "10.0.0.5");
}

#[tokio::test]
async fn server_ip_falls_back_to_the_first_address_of_any_version() {
    let cloud = FakeCloud::new();
    cloud.seed_server(
        server("srv-1", "inst-1"),
        vec![network("private", &[("fd00::5", 6)])],
    );
    let subject = helper(&cloud);

    let ip = subject.server_ip("srv-1").await.expect("address expected");

    assert_eq!(ip.to_string(), "fd00::5");
}

#[tokio::test]
async fn server_ip_only_consults_the_first_network() {
    let cloud = FakeCloud::new();
    cloud.seed_server(
        server("srv-1", "inst-1"),
        vec![
            network("empty", &[]),
            network("public", &[("192.0.2.9", 4)]),
        ],
    );
    let subject = helper(&cloud);

    let result = subject.server_ip("srv-1").await;

    assert!(
        matches!(result, Err(HelperError::NoIpAddress { .. })),
        "first-network policy must not scan later networks, got {result:?}"
    );
}
