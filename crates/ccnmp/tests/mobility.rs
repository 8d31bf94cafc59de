// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end mobility scenarios over a shared in-memory face.

use ccnmp::face::{Face, MemoryFace};
use ccnmp::protocol::{redirect_name, register_name, remove_name, Command, CommandInterest};
use ccnmp::{Ack, Data, HomeAgent, HomeAgentConfig, Interest, MobileNode, MobileNodeConfig, Name};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tokio::sync::oneshot;

fn n(uri: &str) -> Name {
    Name::parse(uri).unwrap()
}

fn at(offset_ms: u64) -> SystemTime {
    SystemTime::now() + Duration::from_millis(offset_ms)
}

/// Express `name` and wait for the first answer.
async fn fetch(face: &MemoryFace, name: Name, wait: Duration) -> Option<Data> {
    let (tx, rx) = oneshot::channel();
    let tx = Mutex::new(Some(tx));
    face.express_interest(
        Interest::new(name),
        Arc::new(move |data: Data, _: &Interest| {
            if let Some(tx) = tx.lock().unwrap().take() {
                let _ = tx.send(data);
            }
        }),
    )
    .await
    .unwrap();
    tokio::time::timeout(wait, rx).await.ok()?.ok()
}

async fn command(face: &MemoryFace, name: Name) -> Option<Ack> {
    let data = fetch(face, name, Duration::from_millis(300)).await?;
    Ack::from_payload(data.payload())
}

async fn wait_until<F: Fn() -> bool>(what: &str, check: F) {
    for _ in 0..400 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {}", what);
}

async fn start_agent(face: &MemoryFace) -> HomeAgent {
    let config = HomeAgentConfig {
        open_timeout_ms: 500,
        ..Default::default()
    };
    let agent = HomeAgent::new(Arc::new(face.clone()), &config).unwrap();
    agent.start().await.unwrap();
    agent
}

fn files() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("file1"), b"first file").unwrap();
    std::fs::write(dir.path().join("file2"), b"second file").unwrap();
    dir
}

fn redirect_targets(face: &MemoryFace) -> Vec<Name> {
    face.expressed()
        .into_iter()
        .filter_map(|i| CommandInterest::parse(i.name()).ok().flatten())
        .filter(|c| c.command == Command::Redirect)
        .map(|c| c.remote().clone())
        .collect()
}

#[tokio::test]
async fn test_register_is_idempotent() {
    let face = MemoryFace::new();
    let agent = start_agent(&face).await;

    assert_eq!(
        command(&face, register_name(&n("/a"), true, at(0))).await,
        Some(Ack::Success)
    );
    assert_eq!(command(&face, redirect_name(&n("/a"), &n("/r"), at(1))).await, Some(Ack::Success));

    // duplicate: silently ignored, first policy kept
    assert_eq!(command(&face, register_name(&n("/a"), false, at(2))).await, None);

    let entry = agent.registry().entry(&n("/a")).unwrap();
    assert_eq!(agent.registry().len(), 1);
    assert!(entry.forward_asap);
    assert_eq!(entry.remote_name, Some(n("/r")));
}

#[tokio::test]
async fn test_interests_for_unregistered_namespace_are_not_kept() {
    let face = MemoryFace::new();
    let agent = start_agent(&face).await;

    let answer = fetch(&face, n("/nobody/file"), Duration::from_millis(50)).await;

    assert!(answer.is_none());
    assert!(agent.registry().is_empty());
    assert_eq!(agent.relay_stats().started, 0);
}

#[tokio::test]
async fn test_redirect_flushes_every_buffered_interest() {
    let face = MemoryFace::new();
    let agent = start_agent(&face).await;
    assert_eq!(command(&face, register_name(&n("/a"), false, at(0))).await, Some(Ack::Success));

    let mut waiting = Vec::new();
    for i in 0..3 {
        let face = face.clone();
        waiting.push(tokio::spawn(async move {
            fetch(&face, n(&format!("/a/file{}", i)), Duration::from_secs(5)).await
        }));
    }
    wait_until("buffering", || agent.registry().pending_count(&n("/a")) == 3).await;

    for i in 0..3 {
        face.publish(Data::new(
            n(&format!("/b/file{}/v1", i)),
            format!("content {}", i).into_bytes(),
        ));
    }
    assert_eq!(command(&face, redirect_name(&n("/a"), &n("/b"), at(1))).await, Some(Ack::Success));

    for (i, handle) in waiting.into_iter().enumerate() {
        let data = handle.await.unwrap().expect("relayed content");
        assert!(n(&format!("/a/file{}", i)).is_prefix_of(data.name()));
        assert_eq!(data.payload(), format!("content {}", i).as_bytes());
    }

    let mut relayed: Vec<Name> = face
        .expressed()
        .into_iter()
        .map(|i| i.name().clone())
        .filter(|name| n("/b").is_prefix_of(name))
        .collect();
    relayed.sort();
    assert_eq!(relayed, vec![n("/b/file0"), n("/b/file1"), n("/b/file2")]);
    assert_eq!(agent.registry().pending_count(&n("/a")), 0);
    assert_eq!(agent.relay_stats().completed, 3);
}

#[tokio::test]
async fn test_remove_then_redirect_fails() {
    let face = MemoryFace::new();
    let agent = start_agent(&face).await;

    assert_eq!(command(&face, register_name(&n("/a"), false, at(0))).await, Some(Ack::Success));
    assert_eq!(command(&face, remove_name(&n("/a"), at(1))).await, Some(Ack::Success));
    assert_eq!(command(&face, redirect_name(&n("/a"), &n("/b"), at(2))).await, Some(Ack::Failure));
    assert_eq!(command(&face, remove_name(&n("/a"), at(3))).await, Some(Ack::Failure));

    assert!(!agent.registry().contains(&n("/a")));
    assert_eq!(agent.relay_stats().started, 0);
}

#[tokio::test]
async fn test_mobile_node_content_follows_it() {
    let face = MemoryFace::new();
    let agent = start_agent(&face).await;
    let dir = files();

    let mut config = MobileNodeConfig::new(dir.path(), "/a");
    config.refresh_rate_secs = 3600;
    let node = MobileNode::new(Arc::new(face.clone()), &config).unwrap();
    node.start().await.unwrap();
    wait_until("initial redirect", || agent.registry().remote_name(&n("/a")) == Some(n("/a"))).await;

    // at home the node answers directly
    let data = fetch(&face, n("/a/file1"), Duration::from_secs(2)).await.unwrap();
    assert_eq!(data.payload(), b"first file");
    assert_eq!(agent.relay_stats().started, 0);

    node.move_to(n("/b")).await.unwrap();
    wait_until("redirect to /b", || agent.registry().remote_name(&n("/a")) == Some(n("/b"))).await;

    // away from home: buffered until the next redirect
    let client = tokio::spawn({
        let face = face.clone();
        async move { fetch(&face, n("/a/file2"), Duration::from_secs(5)).await }
    });
    wait_until("buffering", || agent.registry().pending_count(&n("/a")) == 1).await;

    node.move_to(n("/c")).await.unwrap();
    let data = client.await.unwrap().expect("relayed content");

    assert!(n("/a/file2").is_prefix_of(data.name()));
    assert_eq!(data.payload(), b"second file");
    assert!(face.expressed().iter().any(|i| i.name() == &n("/c/file2")));
    assert_eq!(redirect_targets(&face).last(), Some(&n("/c")));
    assert_eq!(agent.relay_stats().completed, 1);

    // the old location no longer answers
    assert!(!face.has_filter(&n("/b")));
    assert!(fetch(&face, n("/b/file1"), Duration::from_millis(50)).await.is_none());

    node.shutdown().await.unwrap();
    agent.stop().await.unwrap();
}

#[tokio::test]
async fn test_forward_asap_relays_without_waiting() {
    let face = MemoryFace::new();
    let agent = start_agent(&face).await;
    let dir = files();

    let mut config = MobileNodeConfig::new(dir.path(), "/a");
    config.foreign_namespace = Some("/b".into());
    config.forward_asap = true;
    config.refresh_rate_secs = 3600;
    let node = MobileNode::new(Arc::new(face.clone()), &config).unwrap();
    node.start().await.unwrap();
    wait_until("initial redirect", || agent.registry().remote_name(&n("/a")) == Some(n("/b"))).await;

    let data = fetch(&face, n("/a/file1"), Duration::from_secs(2)).await.unwrap();

    assert_eq!(data.payload(), b"first file");
    assert_eq!(agent.registry().pending_count(&n("/a")), 0);
    wait_until("relay bookkeeping", || agent.relay_stats().completed == 1).await;
    assert!(agent.in_flight().is_empty());
}

#[tokio::test]
async fn test_mobile_node_without_agent_stops() {
    let face = MemoryFace::new();
    let dir = files();

    let mut config = MobileNodeConfig::new(dir.path(), "/a");
    config.register_timeout_ms = 50;
    let node = MobileNode::new(Arc::new(face.clone()), &config).unwrap();

    assert!(node.start().await.is_err());
    assert_eq!(node.phase().await, ccnmp::Phase::Stopped);
    assert!(!face.has_filter(&n("/a")));
}

#[tokio::test]
async fn test_mobile_node_restart_registers_again() {
    let face = MemoryFace::new();
    let agent = start_agent(&face).await;
    let dir = files();

    let mut config = MobileNodeConfig::new(dir.path(), "/a");
    config.register_timeout_ms = 500;
    config.refresh_rate_secs = 3600;

    let first = MobileNode::new(Arc::new(face.clone()), &config).unwrap();
    first.start().await.unwrap();
    first.shutdown().await.unwrap();
    assert!(!agent.registry().contains(&n("/a")));

    let second = MobileNode::new(Arc::new(face.clone()), &config).unwrap();
    second.start().await.unwrap();
    assert_eq!(second.phase().await, ccnmp::Phase::Running);
    assert!(agent.registry().contains(&n("/a")));
}
