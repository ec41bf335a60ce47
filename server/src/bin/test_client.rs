use bincode::{deserialize, serialize};
use shared::{HeroId, Packet, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{timeout, Instant};

// Scripted participant: connects, picks a hero, readies up and prints
// whatever the server sends for a while.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let server_addr = args
        .next()
        .unwrap_or_else(|| "127.0.0.1:8080".to_string())
        .parse::<SocketAddr>()?;
    let hero = HeroId(args.next().unwrap_or_else(|| "mage".to_string()));

    // Create local socket
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("Client socket bound to {}", socket.local_addr()?);

    let connect_packet = Packet::Connect {
        client_version: PROTOCOL_VERSION,
        display_name: "test-client".to_string(),
    };
    println!("Sending connection request to {}", server_addr);
    socket.send_to(&serialize(&connect_packet)?, server_addr).await?;

    let mut buf = [0u8; 2048];
    let mut picked = false;
    let deadline = Instant::now() + Duration::from_secs(90);

    while Instant::now() < deadline {
        let (len, _) = match timeout(Duration::from_secs(5), socket.recv_from(&mut buf)).await {
            Ok(result) => result?,
            Err(_) => {
                println!("No packets for 5 seconds, giving up");
                break;
            }
        };

        let packet = match deserialize::<Packet>(&buf[0..len]) {
            Ok(packet) => packet,
            Err(e) => {
                println!("Failed to deserialize packet: {}", e);
                continue;
            }
        };

        match packet {
            Packet::Connected { participant_id } => {
                println!("Connection accepted as {}", participant_id);
            }
            Packet::Disconnected { reason } => {
                println!("Server refused connection: {}", reason);
                return Ok(());
            }
            Packet::SelectionPhaseStarted { duration, .. } if !picked => {
                println!("Selection open for {:.0}s, picking {}", duration, hero);
                let submit = Packet::HeroSelectionSubmit {
                    hero_id: hero.clone(),
                };
                socket.send_to(&serialize(&submit)?, server_addr).await?;
                let ready = Packet::ReadySubmit { is_ready: true };
                socket.send_to(&serialize(&ready)?, server_addr).await?;
                picked = true;
            }
            Packet::HeroStates { tick, heroes } => {
                if tick % 30 == 0 {
                    for h in heroes {
                        println!(
                            "  {} {} hp={:.0}/{:.0} mana={:.0}/{:.0}",
                            h.participant_id, h.hero_id, h.health, h.max_health, h.mana, h.max_mana
                        );
                    }
                }
            }
            other => println!("Received: {:?}", other),
        }
    }

    println!("Sending disconnect");
    socket.send_to(&serialize(&Packet::Disconnect)?, server_addr).await?;
    println!("Test client finished");

    Ok(())
}
