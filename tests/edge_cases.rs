//! Hostile-input behavior: garbage bytes, unknown packet kinds and
//! duplicate or stale command packets must never take a session down.

mod common;

use bytes::Bytes;
use common::{drain, host, host_with_config, join, join_with_config, pump, TestPeer};
use lockstep_protocol::{
    Colour, CommandPacket, Frame, LocalHub, RawCommand, SessionConfig, SessionEvent, Transport,
    UserId,
};

fn cmd(byte: u8) -> RawCommand {
    RawCommand {
        tag: 1,
        payload: Bytes::copy_from_slice(&[byte]),
    }
}

fn started_pair(hub: &LocalHub) -> Vec<TestPeer> {
    let a = host(hub, 1);
    let mut peers = vec![a];
    peers.push(join(hub, 2, Colour::BLUE, 1));
    pump(&mut peers);
    peers[0].session.mark_ready().unwrap();
    peers[1].session.mark_ready().unwrap();
    pump(&mut peers);
    for peer in peers.iter_mut() {
        drain(peer);
    }
    peers
}

#[test]
fn unknown_packet_type_is_ignored() {
    let hub = LocalHub::new();
    let mut peers = started_pair(&hub);

    let future_frame = Frame::new(4242, Bytes::from_static(b"from a newer build"));
    peers[1]
        .endpoint
        .send(UserId(1), future_frame.to_bytes())
        .unwrap();
    pump(&mut peers);
    assert!(drain(&mut peers[0]).is_empty());

    // The connection is still healthy afterwards.
    peers[1].session.send_chat("still here").unwrap();
    pump(&mut peers);
    assert_eq!(
        drain(&mut peers[0]),
        vec![SessionEvent::Chat {
            from: UserId(2),
            text: "still here".to_string(),
        }]
    );
}

#[test]
fn garbage_bytes_are_dropped_without_killing_the_stream() {
    let hub = LocalHub::new();
    let mut peers = started_pair(&hub);

    // Too short to hold a header.
    peers[1]
        .endpoint
        .send(UserId(1), Bytes::from_static(&[0x01]))
        .unwrap();
    // Valid header promising more payload than is present.
    peers[1]
        .endpoint
        .send(UserId(1), Bytes::from_static(&[3, 0, 10, 0, 0, 0, 0xAA]))
        .unwrap();
    // Payload bytes beyond the declared length.
    let mut padded = Frame::new(3, Bytes::from_static(b"hi")).to_bytes().to_vec();
    padded.push(0x00);
    peers[1]
        .endpoint
        .send(UserId(1), Bytes::from(padded))
        .unwrap();
    pump(&mut peers);
    assert!(drain(&mut peers[0]).is_empty());

    peers[1].session.send_chat("survived").unwrap();
    pump(&mut peers);
    assert_eq!(
        drain(&mut peers[0]),
        vec![SessionEvent::Chat {
            from: UserId(2),
            text: "survived".to_string(),
        }]
    );
}

#[test]
fn duplicate_command_packet_keeps_the_first_submission() {
    let hub = LocalHub::new();
    let mut peers = started_pair(&hub);

    let first = CommandPacket {
        turn: 0,
        commands: vec![cmd(0xB1)],
    };
    let second = CommandPacket {
        turn: 0,
        commands: vec![cmd(0xB2)],
    };
    peers[1]
        .endpoint
        .send(UserId(1), first.into_frame().to_bytes())
        .unwrap();
    peers[1]
        .endpoint
        .send(UserId(1), second.into_frame().to_bytes())
        .unwrap();
    pump(&mut peers);

    peers[0].session.submit_commands(Vec::new()).unwrap();
    assert_eq!(
        drain(&mut peers[0]),
        vec![SessionEvent::TurnReady {
            turn: 0,
            commands: vec![cmd(0xB1)],
        }]
    );
}

#[test]
fn stale_command_packet_is_ignored_after_the_turn_closed() {
    let hub = LocalHub::new();
    let mut peers = started_pair(&hub);

    peers[0].session.submit_commands(Vec::new()).unwrap();
    peers[1].session.submit_commands(Vec::new()).unwrap();
    pump(&mut peers);
    for peer in peers.iter_mut() {
        drain(peer);
    }
    assert_eq!(peers[0].session.current_turn().unwrap(), 1);

    // A replay of turn 0 arrives after the barrier already passed.
    let stale = CommandPacket {
        turn: 0,
        commands: vec![cmd(0xFF)],
    };
    peers[1]
        .endpoint
        .send(UserId(1), stale.into_frame().to_bytes())
        .unwrap();
    pump(&mut peers);
    assert!(drain(&mut peers[0]).is_empty());

    // Lockstep continues on turn 1 as if nothing happened.
    peers[0].session.submit_commands(Vec::new()).unwrap();
    peers[1].session.submit_commands(Vec::new()).unwrap();
    pump(&mut peers);
    assert_eq!(
        drain(&mut peers[0]),
        vec![SessionEvent::TurnReady {
            turn: 1,
            commands: vec![],
        }]
    );
}

#[test]
fn pending_overflow_aborts_the_session_exactly_once() {
    let hub = LocalHub::new();
    let config = SessionConfig {
        turn_window: 2,
        pending_turn_limit: 2,
        ..common::config()
    };
    let a = host_with_config(&hub, 1, config.clone());
    let mut peers = vec![a];
    peers.push(join_with_config(&hub, 2, Colour::BLUE, 1, config));
    pump(&mut peers);
    peers[0].session.mark_ready().unwrap();
    peers[1].session.mark_ready().unwrap();
    pump(&mut peers);
    for peer in peers.iter_mut() {
        drain(peer);
    }

    // Three distinct far-ahead turns exceed the two-turn buffer: a fatal
    // desynchronization surfaced as a single Aborted event.
    for turn in 10..13u32 {
        let packet = CommandPacket {
            turn,
            commands: vec![],
        };
        peers[1]
            .endpoint
            .send(UserId(1), packet.into_frame().to_bytes())
            .unwrap();
    }
    pump(&mut peers);
    let events = drain(&mut peers[0]);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], SessionEvent::Aborted { .. }));

    // After the abort the engine consumes nothing: another oversized burst
    // produces no second abort, and local submissions deliver no turns.
    for turn in 20..24u32 {
        let packet = CommandPacket {
            turn,
            commands: vec![],
        };
        peers[1]
            .endpoint
            .send(UserId(1), packet.into_frame().to_bytes())
            .unwrap();
    }
    pump(&mut peers);
    peers[0].session.submit_commands(Vec::new()).unwrap();
    pump(&mut peers);
    assert!(drain(&mut peers[0]).is_empty());
}

#[test]
fn command_from_far_ahead_peer_is_buffered_until_reachable() {
    let hub = LocalHub::new();
    let mut peers = started_pair(&hub);

    // Turn 5 is far beyond the default window of 2; nothing fires until the
    // slow peer works its way there.
    let ahead = CommandPacket {
        turn: 5,
        commands: vec![cmd(0x55)],
    };
    peers[1]
        .endpoint
        .send(UserId(1), ahead.into_frame().to_bytes())
        .unwrap();
    pump(&mut peers);
    assert!(drain(&mut peers[0]).is_empty());

    for turn in 0..5u32 {
        peers[0].session.submit_commands(Vec::new()).unwrap();
        peers[1].session.submit_commands(Vec::new()).unwrap();
        pump(&mut peers);
        assert_eq!(
            drain(&mut peers[0]),
            vec![SessionEvent::TurnReady {
                turn,
                commands: vec![],
            }]
        );
    }

    // At turn 5 the buffered set finally counts.
    peers[0].session.submit_commands(Vec::new()).unwrap();
    assert_eq!(
        drain(&mut peers[0]),
        vec![SessionEvent::TurnReady {
            turn: 5,
            commands: vec![cmd(0x55)],
        }]
    );
}
