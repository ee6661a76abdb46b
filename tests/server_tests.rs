//! Server Tests
//!
//! Loopback tests for the polling server engine.

mod common;

use std::io::{Read, Write};
use std::net::{IpAddr, Ipv4Addr, Shutdown, TcpListener};
use std::time::{Duration, Instant};

use common::{accept_one, assert_silent, loopback_config, poll_until, raw_peer, read_reply, SOON};
use corvid::protocol::{encode, write_packet};
use corvid::{
    handler_fn, observer_fn, ChannelHandler, CorvidError, Event, Origin, Packet, Server,
    ServerConfig, Service, Status,
};

fn channel_server() -> (Server, crossbeam::channel::Receiver<corvid::Request>) {
    let (tx, rx) = crossbeam::channel::unbounded();
    let server = Server::try_new(loopback_config(), ChannelHandler::new(tx)).unwrap();
    (server, rx)
}

fn echo_server() -> Server {
    Server::try_new(
        loopback_config(),
        handler_fn(|request, reply| {
            let packet = request.packet;
            let answer = Packet::new(packet.service, Status::Acknowledge, packet.into_fields());
            reply.send(&answer).unwrap();
        }),
    )
    .unwrap()
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn test_poll_without_sessions_is_prompt() {
    let (mut server, rx) = channel_server();

    let start = Instant::now();
    let activity = server.poll();

    assert!(activity.is_idle());
    assert!(start.elapsed() < Duration::from_millis(100));
    assert_eq!(server.session_count(), 0);
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_bind_failure_leaves_server_inactive() {
    let taken = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();
    let config = ServerConfig::builder()
        .bind_addr(IpAddr::V4(Ipv4Addr::LOCALHOST))
        .port(port)
        .build();

    let mut server = Server::new(config.clone(), handler_fn(|_, _| {}));
    assert!(!server.is_active());
    assert!(server.local_addr().is_none());
    assert!(server.poll().is_idle());

    match Server::try_new(config, handler_fn(|_, _| {})) {
        Err(CorvidError::Bind { .. }) => {}
        Err(e) => panic!("Expected Bind error, got {}", e),
        Ok(_) => panic!("Expected Bind error"),
    }
}

#[test]
fn test_default_config_binds_any_address_on_9001() {
    let config = ServerConfig::default();

    assert_eq!(config.port, 9001);
    assert!(config.bind_addr.is_unspecified());
}

#[test]
fn test_accept_takes_a_whole_poll() {
    let (mut server, rx) = channel_server();
    let addr = server.local_addr().unwrap();

    let mut peer = raw_peer(addr);
    write_packet(&mut peer, &Packet::empty(Service::Ping, Status::Query)).unwrap();

    let mut accept_activity = None;
    assert!(poll_until(SOON, || {
        let activity = server.poll();
        let accepted = activity.accepted.is_some();
        if accepted {
            accept_activity = Some(activity);
        }
        accepted
    }));

    let activity = accept_activity.unwrap();
    assert_eq!(activity.dispatched, 0);
    assert_eq!(server.session_count(), 1);

    assert!(poll_until(SOON, || server.poll().dispatched == 1));
    assert_eq!(rx.try_recv().unwrap().packet, Packet::empty(Service::Ping, Status::Query));
}

#[test]
fn test_sessions_in_arrival_order() {
    let (mut server, _rx) = channel_server();
    let addr = server.local_addr().unwrap();

    let _a = raw_peer(addr);
    let first = accept_one(&mut server);
    let _b = raw_peer(addr);
    let second = accept_one(&mut server);

    assert!(first < second);
    let ids: Vec<_> = server.sessions().map(|s| s.id()).collect();
    assert_eq!(ids, vec![first, second]);
    assert!(server.sessions().all(|s| s.is_connected()));

    let times: Vec<_> = server.sessions().map(|s| s.accepted_at()).collect();
    assert!(times[0] <= times[1]);
}

#[test]
fn test_stop_is_idempotent_and_closes_sessions() {
    let (mut server, _rx) = channel_server();
    let mut peer = raw_peer(server.local_addr().unwrap());
    let session = accept_one(&mut server);

    server.stop();
    server.stop();

    assert!(!server.is_active());
    assert_eq!(server.session_count(), 0);
    assert!(server.poll().is_idle());
    assert!(matches!(
        server.send(session, &Packet::empty(Service::Ping, Status::Query)),
        Err(CorvidError::Inactive)
    ));

    let mut buf = [0u8; 1];
    assert_eq!(peer.read(&mut buf).unwrap(), 0);
}

// =============================================================================
// Dispatch
// =============================================================================

#[test]
fn test_handler_replies_through_responder() {
    let mut server = echo_server();
    let mut peer = raw_peer(server.local_addr().unwrap());
    accept_one(&mut server);

    let request = Packet::new(Service::Get, Status::Query, ["color"]);
    write_packet(&mut peer, &request).unwrap();
    assert!(poll_until(SOON, || server.poll().dispatched == 1));

    let reply = read_reply(&mut peer);
    assert_eq!(reply.service, Service::Get);
    assert_eq!(reply.status, Status::Acknowledge);
    assert_eq!(reply.fields(), &["color"]);
}

#[test]
fn test_request_carries_origin() {
    let (mut server, rx) = channel_server();
    let mut peer = raw_peer(server.local_addr().unwrap());
    let session = accept_one(&mut server);

    write_packet(&mut peer, &Packet::new(Service::Set, Status::Query, ["k", "v"])).unwrap();
    assert!(poll_until(SOON, || server.poll().dispatched == 1));

    let request = rx.try_recv().unwrap();
    assert_eq!(request.origin, Origin::Session(session));
    assert_eq!(request.peer, peer.local_addr().unwrap());
    assert_eq!(request.packet.fields(), &["k", "v"]);
}

#[test]
fn test_several_frames_in_one_poll() {
    let (mut server, rx) = channel_server();
    let mut peer = raw_peer(server.local_addr().unwrap());
    accept_one(&mut server);

    let mut burst = Vec::new();
    for key in ["a", "b", "c"] {
        burst.extend_from_slice(&encode(&Packet::new(Service::Get, Status::Query, [key])).unwrap());
    }
    peer.write_all(&burst).unwrap();

    let mut dispatched = 0;
    assert!(poll_until(SOON, || {
        dispatched += server.poll().dispatched;
        dispatched == 3
    }));

    let keys: Vec<String> = rx.try_iter().map(|r| r.packet.fields()[0].clone()).collect();
    assert_eq!(keys, vec!["a", "b", "c"]);
}

#[test]
fn test_send_to_session() {
    let (mut server, _rx) = channel_server();
    let mut peer = raw_peer(server.local_addr().unwrap());
    let session = accept_one(&mut server);

    let notice = Packet::new(Service::Default, Status::Sync, ["tick"]);
    server.send(session, &notice).unwrap();

    assert_eq!(read_reply(&mut peer), notice);
}

#[test]
fn test_send_to_unknown_session() {
    let (mut server, _rx) = channel_server();
    let _peer = raw_peer(server.local_addr().unwrap());
    let session = accept_one(&mut server);

    let missing = corvid::SessionId(session.0 + 100);
    assert!(matches!(
        server.send(missing, &Packet::empty(Service::Ping, Status::Query)),
        Err(CorvidError::UnknownSession(id)) if id == missing
    ));
}

// =============================================================================
// Rejection
// =============================================================================

#[test]
fn test_bad_preamble_gets_default_negative() {
    let (mut server, rx) = channel_server();
    let mut peer = raw_peer(server.local_addr().unwrap());
    accept_one(&mut server);

    peer.write_all(&[0x02, 0x13, 0x37, 0x01, 0x05, 0x00, 0x01]).unwrap();
    assert!(poll_until(SOON, || server.poll().rejected == 1));

    assert_eq!(read_reply(&mut peer), Packet::negative(Service::Default));
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_stalled_payload_rejected_after_deadline() {
    let (mut server, rx) = channel_server();
    let mut peer = raw_peer(server.local_addr().unwrap());
    accept_one(&mut server);

    // Get/Query header declaring 50 payload bytes that never come
    peer.write_all(&[0x01, 0x13, 0x37, 0x02, 0x05, 0x00, 0x32]).unwrap();

    let start = Instant::now();
    assert!(poll_until(Duration::from_secs(10), || server.poll().rejected == 1));
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_millis(2400), "rejected after {:?}", elapsed);
    assert_eq!(read_reply(&mut peer), Packet::negative(Service::Get));
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_half_closed_peer_gets_negative_before_reap() {
    let (mut server, rx) = channel_server();
    let mut peer = raw_peer(server.local_addr().unwrap());
    accept_one(&mut server);

    // Get/Query header declaring 50 payload bytes, then no more writes
    peer.write_all(&[0x01, 0x13, 0x37, 0x02, 0x05, 0x00, 0x32]).unwrap();
    peer.shutdown(Shutdown::Write).unwrap();

    let start = Instant::now();
    let (mut rejected, mut reaped) = (0, 0);
    assert!(poll_until(SOON, || {
        let activity = server.poll();
        rejected += activity.rejected;
        reaped += activity.reaped;
        reaped == 1
    }));

    assert_eq!(rejected, 1);
    assert!(start.elapsed() < Duration::from_millis(2400));
    assert_eq!(read_reply(&mut peer), Packet::negative(Service::Get));
    assert_eq!(server.session_count(), 0);
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_observer_sees_rejections() {
    let (events_tx, events_rx) = crossbeam::channel::unbounded();
    let mut server = echo_server().with_observer(observer_fn(move |event| {
        let label = match event {
            Event::Accepted { .. } => "accepted".to_string(),
            Event::Rejected { service, .. } => format!("rejected {:?}", service),
            Event::Disconnected { .. } => "disconnected".to_string(),
            Event::SendFailed { .. } => "send failed".to_string(),
        };
        events_tx.send(label).unwrap();
    }));

    let mut peer = raw_peer(server.local_addr().unwrap());
    accept_one(&mut server);
    peer.write_all(&[0xEE; 7]).unwrap();
    assert!(poll_until(SOON, || server.poll().rejected == 1));

    let events: Vec<String> = events_rx.try_iter().collect();
    assert_eq!(events, vec!["accepted", "rejected Default"]);
}

#[test]
fn test_partial_header_waits_for_next_poll() {
    let (mut server, rx) = channel_server();
    let mut peer = raw_peer(server.local_addr().unwrap());
    accept_one(&mut server);

    let frame = encode(&Packet::new(Service::Get, Status::Query, ["late"])).unwrap();
    peer.write_all(&frame[..4]).unwrap();
    std::thread::sleep(Duration::from_millis(50));

    let activity = server.poll();
    assert_eq!((activity.dispatched, activity.rejected), (0, 0));
    assert_silent(&mut peer, Duration::from_millis(50));

    peer.write_all(&frame[4..]).unwrap();
    assert!(poll_until(SOON, || server.poll().dispatched == 1));
    assert_eq!(rx.try_recv().unwrap().packet.fields(), &["late"]);
}

// =============================================================================
// Reaping
// =============================================================================

#[test]
fn test_reaps_every_stale_session_in_one_poll() {
    let (mut server, _rx) = channel_server();
    let addr = server.local_addr().unwrap();

    let a = raw_peer(addr);
    accept_one(&mut server);
    let b = raw_peer(addr);
    accept_one(&mut server);
    let _c = raw_peer(addr);
    let survivor = accept_one(&mut server);

    drop(a);
    drop(b);
    std::thread::sleep(Duration::from_millis(100));

    let activity = server.poll();
    assert_eq!(activity.reaped, 2);
    assert_eq!(server.session_count(), 1);
    assert_eq!(server.sessions().next().unwrap().id(), survivor);
}

#[test]
fn test_surviving_sessions_still_served_after_reap() {
    let mut server = echo_server();
    let addr = server.local_addr().unwrap();

    let gone = raw_peer(addr);
    accept_one(&mut server);
    let mut alive = raw_peer(addr);
    accept_one(&mut server);

    drop(gone);
    write_packet(&mut alive, &Packet::new(Service::Delete, Status::Query, ["x"])).unwrap();
    std::thread::sleep(Duration::from_millis(100));

    let activity = server.poll();
    assert_eq!(activity.reaped, 1);
    assert_eq!(activity.dispatched, 1);
    assert_eq!(read_reply(&mut alive).status, Status::Acknowledge);
}
