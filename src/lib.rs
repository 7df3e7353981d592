pub mod client;
pub mod codec;
pub mod errors;
pub mod exponent;
pub mod group;
pub mod hash;
pub mod mpi;
pub mod params;
pub mod pending;
pub mod polynomial;
pub mod prime;
pub mod protocol;
pub mod randutil;
pub mod remote;
pub mod server;
pub mod session;
pub mod signing;
pub mod transport;
pub mod types;

pub use client::{Authorship, ClientManager};
pub use errors::{Error, Result};
pub use params::{SchemeParameters, ServerConfig};
pub use remote::RemoteClient;
pub use server::GroupManager;
pub use session::{Command, Server};
