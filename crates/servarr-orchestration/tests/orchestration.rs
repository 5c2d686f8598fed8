//! End-to-end orchestration tests against mock service APIs

use serde_json::json;
use servarr_config::{
    InstanceKind, MediaManagement, QbittorrentPreferences, ResolvedConfig, ResolvedInstance,
    ResolvedQbittorrent,
};
use servarr_orchestration::{Orchestrator, Selector, ServiceId, StepStatus};
use servarr_transport::RetryPolicy;
use std::collections::BTreeMap;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
    }
}

fn instance(name: &str, kind: InstanceKind, url: &str) -> ResolvedInstance {
    ResolvedInstance {
        name: name.to_string(),
        kind,
        url: url.to_string(),
        app_path: format!("/{}", name),
        api_key: format!("{}-key", name),
        root_folder: Some(format!("/home/alice/media/{}", name)),
        category: Some("tv-hd".to_string()),
        libraries: Vec::new(),
    }
}

fn config_with(qbit_url: &str, instances: Vec<ResolvedInstance>) -> ResolvedConfig {
    let mut map = BTreeMap::new();
    for inst in instances {
        map.insert(inst.name.clone(), inst);
    }
    ResolvedConfig {
        base_url: "https://alice.lw902.usbx.me".to_string(),
        host: "alice.lw902.usbx.me".to_string(),
        home_dir: "/home/alice".to_string(),
        qbittorrent: ResolvedQbittorrent {
            url: qbit_url.to_string(),
            app_path: "/qbittorrent".to_string(),
            username: "alice".to_string(),
            password: "hunter2".to_string(),
            default_save_path: "/home/alice/downloads/qbittorrent".to_string(),
            preferences: QbittorrentPreferences::default(),
            categories: BTreeMap::new(),
        },
        instances: map,
        media_management: MediaManagement::default(),
        tags: BTreeMap::new(),
    }
}

/// Torrent-client mocks for a fully-converged instance, minus categories
async fn mount_qbit(server: &MockServer, categories: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/api/v2/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Ok."))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/app/preferences"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "save_path": "/home/alice/downloads/qbittorrent",
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/torrents/categories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(categories))
        .mount(server)
        .await;
}

#[tokio::test]
async fn second_run_against_converged_state_performs_no_mutations() {
    let server = MockServer::start().await;
    let mut config = config_with(&server.uri(), vec![]);
    config
        .qbittorrent
        .categories
        .insert("tv-hd".to_string(), "/home/alice/downloads/tv-hd".to_string());

    // First run: the category is missing and gets created
    mount_qbit(&server, json!({})).await;
    Mock::given(method("POST"))
        .and(path("/api/v2/torrents/createCategory"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let selector = Selector::from_ids([ServiceId::Qbittorrent]);
    let orchestrator = Orchestrator::new(&config).retry_policy(fast_retry());
    let report = orchestrator.run(&selector).await.unwrap();

    let step = report.step(ServiceId::Qbittorrent).unwrap();
    assert_eq!(step.status, StepStatus::Ok);
    assert_eq!(
        step.changes,
        vec!["Created category: tv-hd (path: /home/alice/downloads/tv-hd)"]
    );
    server.verify().await;

    // Second run: remote state matches, reads only
    server.reset().await;
    mount_qbit(
        &server,
        json!({"tv-hd": {"name": "tv-hd", "savePath": "/home/alice/downloads/tv-hd"}}),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/api/v2/torrents/createCategory"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let report = orchestrator.run(&selector).await.unwrap();
    let step = report.step(ServiceId::Qbittorrent).unwrap();
    assert_eq!(step.status, StepStatus::Ok);
    assert!(step.changes.is_empty());
    server.verify().await;
}

#[tokio::test]
async fn dry_run_records_changes_without_mutating() {
    let server = MockServer::start().await;
    let mut config = config_with(&server.uri(), vec![]);
    config
        .qbittorrent
        .categories
        .insert("tv-hd".to_string(), "/home/alice/downloads/tv-hd".to_string());

    mount_qbit(&server, json!({})).await;
    Mock::given(method("POST"))
        .and(path("/api/v2/torrents/createCategory"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let report = Orchestrator::new(&config)
        .dry_run(true)
        .retry_policy(fast_retry())
        .run(&Selector::from_ids([ServiceId::Qbittorrent]))
        .await
        .unwrap();

    let step = report.step(ServiceId::Qbittorrent).unwrap();
    assert_eq!(step.status, StepStatus::Ok);
    assert_eq!(
        step.changes,
        vec!["Created category: tv-hd (path: /home/alice/downloads/tv-hd)"]
    );
    server.verify().await;
}

#[tokio::test]
async fn arr_instance_converges_root_folder_and_download_client() {
    let server = MockServer::start().await;
    let config = config_with(
        "http://127.0.0.1:1",
        vec![instance("sonarr", InstanceKind::Sonarr, &server.uri())],
    );

    Mock::given(method("GET"))
        .and(path("/api/v3/system/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "4.0"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/rootfolder"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v3/rootfolder"))
        .and(body_partial_json(json!({"path": "/home/alice/media/sonarr"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/downloadclient"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v3/downloadclient"))
        .and(body_partial_json(json!({"implementation": "QBittorrent"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1})))
        .expect(1)
        .mount(&server)
        .await;
    // Media management already matches the defaults
    Mock::given(method("GET"))
        .and(path("/api/v3/config/mediamanagement"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hardlinksCopy": false,
            "enableMediaInfo": false,
            "downloadPropersAndRepacks": "doNotPrefer",
        })))
        .mount(&server)
        .await;

    let report = Orchestrator::new(&config)
        .retry_policy(fast_retry())
        .run(&Selector::from_ids([ServiceId::Sonarr]))
        .await
        .unwrap();

    let step = report.step(ServiceId::Sonarr).unwrap();
    assert_eq!(step.status, StepStatus::Ok);
    assert_eq!(
        step.changes,
        vec![
            "Added root folder: /home/alice/media/sonarr",
            "Added qBittorrent download client",
        ]
    );
    server.verify().await;
}

#[tokio::test]
async fn failure_is_isolated_to_the_failing_instance() {
    let qbit = MockServer::start().await;
    let sonarr = MockServer::start().await;
    let prowlarr = MockServer::start().await;

    let config = config_with(
        &qbit.uri(),
        vec![
            instance("sonarr", InstanceKind::Sonarr, &sonarr.uri()),
            instance("prowlarr", InstanceKind::Prowlarr, &prowlarr.uri()),
        ],
    );

    mount_qbit(&qbit, json!({})).await;

    // The indexer answers its probe but every read past it breaks
    Mock::given(method("GET"))
        .and(path("/api/v3/system/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "4.0"})))
        .mount(&sonarr)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/rootfolder"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database locked"))
        .expect(3)
        .mount(&sonarr)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/system/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "1.0"})))
        .mount(&prowlarr)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/applications"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&prowlarr)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/applications"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1})))
        .expect(1)
        .mount(&prowlarr)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/command"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 9})))
        .expect(1)
        .mount(&prowlarr)
        .await;

    let report = Orchestrator::new(&config)
        .retry_policy(fast_retry())
        .run(&Selector::all())
        .await
        .unwrap();

    assert_eq!(
        report.step(ServiceId::Qbittorrent).unwrap().status,
        StepStatus::Ok
    );
    assert_eq!(report.step(ServiceId::Sonarr).unwrap().status, StepStatus::Failed);
    // The aggregator still ran and registered the (reachable) indexer
    assert_eq!(
        report.step(ServiceId::Prowlarr).unwrap().status,
        StepStatus::Ok
    );

    assert_eq!(report.retry_services(), vec![ServiceId::Sonarr]);
    assert_eq!(report.exit_code(), 1);
    assert!(report.render().contains("Re-run with: --services sonarr"));

    sonarr.verify().await;
    prowlarr.verify().await;
}

#[tokio::test]
async fn unreachable_instance_is_skipped_and_left_unresolved_downstream() {
    let prowlarr = MockServer::start().await;
    let config = config_with(
        "http://127.0.0.1:1",
        vec![
            instance("sonarr", InstanceKind::Sonarr, "http://127.0.0.1:1"),
            instance("prowlarr", InstanceKind::Prowlarr, &prowlarr.uri()),
        ],
    );

    Mock::given(method("GET"))
        .and(path("/api/v1/system/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "1.0"})))
        .mount(&prowlarr)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/applications"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&prowlarr)
        .await;
    // Nothing resolvable to register, so no mutation and no sync command
    Mock::given(method("POST"))
        .and(path("/api/v1/applications"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&prowlarr)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/command"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&prowlarr)
        .await;

    let report = Orchestrator::new(&config)
        .retry_policy(fast_retry())
        .run(&Selector::from_ids([ServiceId::Sonarr, ServiceId::Prowlarr]))
        .await
        .unwrap();

    let sonarr_step = report.step(ServiceId::Sonarr).unwrap();
    assert_eq!(sonarr_step.status, StepStatus::Skipped);
    assert!(sonarr_step.cause.as_deref().unwrap().starts_with("unreachable"));

    let prowlarr_step = report.step(ServiceId::Prowlarr).unwrap();
    assert_eq!(prowlarr_step.status, StepStatus::Ok);
    assert_eq!(
        prowlarr_step.changes,
        vec!["Left application for sonarr unresolved: target unreachable"]
    );

    // Skipped steps do not fail the run but do land in the retry set
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.retry_services(), vec![ServiceId::Sonarr]);

    prowlarr.verify().await;
}

#[tokio::test]
async fn jellyfin_creates_missing_libraries_and_refreshes_once() {
    let server = MockServer::start().await;
    let mut jellyfin = instance("jellyfin", InstanceKind::Jellyfin, &server.uri());
    jellyfin.libraries = vec![
        servarr_config::LibraryConfig {
            name: "TV Shows".to_string(),
            collection_type: "tvshows".to_string(),
            path: "media/all/tv".to_string(),
        },
        servarr_config::LibraryConfig {
            name: "Movies".to_string(),
            collection_type: "movies".to_string(),
            path: "media/all/movies".to_string(),
        },
    ];
    let config = config_with("http://127.0.0.1:1", vec![jellyfin]);

    Mock::given(method("GET"))
        .and(path("/System/Info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Version": "10.9"})))
        .mount(&server)
        .await;
    // One library already exists, one is missing
    Mock::given(method("GET"))
        .and(path("/Library/VirtualFolders"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"Name": "TV Shows"}])),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/Library/VirtualFolders"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/Library/Refresh"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let report = Orchestrator::new(&config)
        .retry_policy(fast_retry())
        .run(&Selector::from_ids([ServiceId::Jellyfin]))
        .await
        .unwrap();

    let step = report.step(ServiceId::Jellyfin).unwrap();
    assert_eq!(step.status, StepStatus::Ok);
    assert_eq!(
        step.changes,
        vec![
            "Created library: Movies (/home/alice/media/all/movies)",
            "Triggered library refresh",
        ]
    );
    server.verify().await;
}

#[tokio::test]
async fn request_manager_registers_indexer_with_resolved_profiles() {
    let jellyseerr = MockServer::start().await;
    let sonarr = MockServer::start().await;

    let config = config_with(
        "http://127.0.0.1:1",
        vec![
            instance("sonarr", InstanceKind::Sonarr, &sonarr.uri()),
            instance("jellyseerr", InstanceKind::Jellyseerr, &jellyseerr.uri()),
        ],
    );

    Mock::given(method("GET"))
        .and(path("/api/v1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "2.0"})))
        .mount(&jellyseerr)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/settings/sonarr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&jellyseerr)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/settings/radarr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&jellyseerr)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/settings/sonarr"))
        .and(body_partial_json(json!({
            "name": "Sonarr",
            "baseUrl": "/sonarr",
            "activeProfileId": 7,
            "activeProfileName": "WEB-1080p",
            "activeLanguageProfileId": 2,
            "is4k": false,
            "isDefault": true,
            "enableSeasonFolders": true,
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1})))
        .expect(1)
        .mount(&jellyseerr)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v3/qualityprofile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 4, "name": "Any"},
            {"id": 7, "name": "WEB-1080p"},
        ])))
        .mount(&sonarr)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/languageprofile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 2, "name": "English"},
        ])))
        .mount(&sonarr)
        .await;

    let report = Orchestrator::new(&config)
        .retry_policy(fast_retry())
        .run(&Selector::from_ids([ServiceId::Jellyseerr]))
        .await
        .unwrap();

    let step = report.step(ServiceId::Jellyseerr).unwrap();
    assert_eq!(step.status, StepStatus::Ok);
    assert_eq!(step.changes, vec!["Registered server: Sonarr"]);
    jellyseerr.verify().await;
}

#[tokio::test]
async fn request_manager_registers_4k_server_without_default_flag() {
    let jellyseerr = MockServer::start().await;
    let sonarr2 = MockServer::start().await;

    let config = config_with(
        "http://127.0.0.1:1",
        vec![
            instance("sonarr2", InstanceKind::Sonarr, &sonarr2.uri()),
            instance("jellyseerr", InstanceKind::Jellyseerr, &jellyseerr.uri()),
        ],
    );

    Mock::given(method("GET"))
        .and(path("/api/v1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "2.0"})))
        .mount(&jellyseerr)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/settings/sonarr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&jellyseerr)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/settings/radarr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&jellyseerr)
        .await;
    // The 4K instance serves 4K requests but is not a default server
    Mock::given(method("POST"))
        .and(path("/api/v1/settings/sonarr"))
        .and(body_partial_json(json!({
            "name": "Sonarr 4K",
            "baseUrl": "/sonarr2",
            "activeProfileName": "WEB-2160p",
            "is4k": true,
            "isDefault": false,
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1})))
        .expect(1)
        .mount(&jellyseerr)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v3/qualityprofile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 4, "name": "Any"},
            {"id": 9, "name": "WEB-2160p"},
        ])))
        .mount(&sonarr2)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/languageprofile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 2, "name": "English"},
        ])))
        .mount(&sonarr2)
        .await;

    let report = Orchestrator::new(&config)
        .retry_policy(fast_retry())
        .run(&Selector::from_ids([ServiceId::Jellyseerr]))
        .await
        .unwrap();

    let step = report.step(ServiceId::Jellyseerr).unwrap();
    assert_eq!(step.status, StepStatus::Ok);
    assert_eq!(step.changes, vec!["Registered server: Sonarr 4K"]);
    jellyseerr.verify().await;
}

#[tokio::test]
async fn selective_rerun_reproduces_the_full_run_step() {
    let qbit = MockServer::start().await;
    let sonarr = MockServer::start().await;

    let config = config_with(
        &qbit.uri(),
        vec![instance("sonarr", InstanceKind::Sonarr, &sonarr.uri())],
    );

    mount_qbit(&qbit, json!({})).await;

    // The indexer stays broken across both runs
    Mock::given(method("GET"))
        .and(path("/api/v3/system/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "4.0"})))
        .mount(&sonarr)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/rootfolder"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database locked"))
        .mount(&sonarr)
        .await;

    let orchestrator = Orchestrator::new(&config).retry_policy(fast_retry());

    let full = orchestrator.run(&Selector::all()).await.unwrap();
    assert_eq!(full.retry_services(), vec![ServiceId::Sonarr]);

    // Re-running with only the failed service yields the same step result
    let rerun = orchestrator
        .run(&Selector::from_ids([ServiceId::Sonarr]))
        .await
        .unwrap();

    assert_eq!(rerun.steps().len(), 1);
    assert_eq!(
        rerun.step(ServiceId::Sonarr),
        full.step(ServiceId::Sonarr)
    );
}

#[tokio::test]
async fn connectivity_check_reports_per_service_outcomes() {
    let qbit = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Ok."))
        .mount(&qbit)
        .await;

    let config = config_with(
        &qbit.uri(),
        vec![instance("sonarr", InstanceKind::Sonarr, "http://127.0.0.1:1")],
    );

    let outcomes = Orchestrator::new(&config)
        .retry_policy(fast_retry())
        .check_connectivity(&Selector::all())
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 2);
    let qbit_outcome = outcomes
        .iter()
        .find(|(id, _)| *id == ServiceId::Qbittorrent)
        .unwrap();
    assert!(qbit_outcome.1.is_none());
    let sonarr_outcome = outcomes
        .iter()
        .find(|(id, _)| *id == ServiceId::Sonarr)
        .unwrap();
    assert!(sonarr_outcome.1.is_some());
}
