use std::net::SocketAddr;
use std::sync::OnceLock;
use std::thread;

use rand::rngs::StdRng;
use rand::SeedableRng;

use step_out_group_signatures::signing::ServerKeyPair;
use step_out_group_signatures::{GroupManager, RemoteClient, SchemeParameters, Server, ServerConfig};

pub const MAX_SIGNERS: usize = 4;

fn key_pair() -> ServerKeyPair {
    static KEY: OnceLock<ServerKeyPair> = OnceLock::new();
    KEY.get_or_init(|| ServerKeyPair::generate(1024).unwrap()).clone()
}

pub fn small_config() -> ServerConfig {
    ServerConfig {
        scheme: SchemeParameters {
            alpha: 3,
            beta: 2,
            eta: 4,
            gamma: 4,
            n: MAX_SIGNERS,
            zeta: 12,
        },
        coefficient_bits: 32,
        rsa_key_bits: 1024,
    }
}

/// Starts a group manager on an ephemeral loopback port.
pub fn spawn_server(seed: u64) -> SocketAddr {
    let mut rng = StdRng::seed_from_u64(seed);
    let manager = GroupManager::with_key_pair(&small_config(), key_pair(), &mut rng).unwrap();
    let server = Server::bind("127.0.0.1:0", manager).unwrap();
    let addr = server.local_addr().unwrap();
    thread::spawn(move || server.run());
    addr
}

pub fn member(addr: SocketAddr) -> (RemoteClient, usize) {
    let mut client = RemoteClient::connect(addr).unwrap();
    let index = client.register().unwrap();
    (client, index)
}
