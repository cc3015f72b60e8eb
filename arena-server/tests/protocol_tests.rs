//! Wire codec tests over in-memory streams

use arena_core::snapshot::{ClientPacket, ServerPacket};
use arena_server::protocol::{self, ProtocolError, MAX_FRAME_LEN};
use tokio::io::AsyncWriteExt;

// ============================================================================
// Framing
// ============================================================================

#[tokio::test]
async fn frames_survive_a_stream_split_into_pieces() {
    let (mut client, mut server) = tokio::io::duplex(8);
    let packets = vec![
        ClientPacket::Join { name: "rose".into() },
        ClientPacket::Input {
            movement: [0.5, -1.0],
            attack: true,
            defend: false,
        },
        ClientPacket::Respawn,
    ];

    let sent = packets.clone();
    let writer = tokio::spawn(async move {
        for packet in &sent {
            let frame = protocol::encode(packet).unwrap();
            protocol::write_frame(&mut client, &frame).await.unwrap();
        }
    });

    let mut received = Vec::new();
    while let Some(payload) = protocol::read_frame(&mut server).await.unwrap() {
        received.push(protocol::decode::<ClientPacket>(&payload).unwrap());
    }
    writer.await.unwrap();
    assert_eq!(received, packets);
}

#[tokio::test]
async fn clean_eof_between_frames_is_not_an_error() {
    let (client, mut server) = tokio::io::duplex(64);
    drop(client);
    assert!(protocol::read_frame(&mut server).await.unwrap().is_none());
}

#[tokio::test]
async fn eof_inside_a_frame_is_an_error() {
    let (mut client, mut server) = tokio::io::duplex(64);
    client.write_all(&10u32.to_le_bytes()).await.unwrap();
    client.write_all(&[1, 2, 3]).await.unwrap();
    drop(client);
    let err = protocol::read_frame(&mut server).await.unwrap_err();
    assert!(matches!(err, ProtocolError::Io(_)));
}

#[tokio::test]
async fn oversized_length_prefix_is_rejected_before_reading() {
    let (mut client, mut server) = tokio::io::duplex(64);
    client
        .write_all(&((MAX_FRAME_LEN as u32) + 1).to_le_bytes())
        .await
        .unwrap();
    let err = protocol::read_frame(&mut server).await.unwrap_err();
    assert!(matches!(err, ProtocolError::FrameTooLarge { .. }));
    assert!(!err.is_recoverable());
}

// ============================================================================
// Payloads
// ============================================================================

#[tokio::test]
async fn malformed_payload_is_recoverable() {
    let (mut client, mut server) = tokio::io::duplex(64);
    client.write_all(&3u32.to_le_bytes()).await.unwrap();
    client.write_all(&[0xee, 0xee, 0xee]).await.unwrap();
    let good = protocol::encode(&ClientPacket::Respawn).unwrap();
    client.write_all(&good).await.unwrap();
    drop(client);

    let bad = protocol::read_frame(&mut server).await.unwrap().unwrap();
    let err = protocol::decode::<ClientPacket>(&bad).unwrap_err();
    assert!(err.is_recoverable());

    // The stream stays aligned on the next frame
    let next = protocol::read_frame(&mut server).await.unwrap().unwrap();
    assert_eq!(protocol::decode::<ClientPacket>(&next).unwrap(), ClientPacket::Respawn);
}

#[test]
fn server_died_packet_decodes() {
    let frame = protocol::encode(&ServerPacket::Died {
        killer: Some("Hornet".into()),
    })
    .unwrap();
    let packet: ServerPacket = protocol::decode(&frame[4..]).unwrap();
    assert_eq!(
        packet,
        ServerPacket::Died {
            killer: Some("Hornet".into())
        }
    );
}
