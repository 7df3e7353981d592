//! Command sessions between members and the group manager.
//!
//! A session is a sequence of commands on one connection. Each command is a
//! frame carrying its wire name followed by the exchange listed on
//! [`Command`]. Every server reply is a `Result<T, String>`; after an error
//! reply the server closes the session.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info, info_span, warn};

use crate::errors::{Error, ProtocolError, Result};
use crate::polynomial::Polynomial;
use crate::server::GroupManager;
use crate::transport::Connection;
use crate::types::{
    CheckProcedureInput, CloseSignatureInput, FinalizeSignatureOutput, InitializeSignatureInput,
    JoinSignatureInput, PublishProcedureInput, SignProcedureInput, UserPublicKey,
};

pub type SharedManager = Arc<Mutex<GroupManager>>;

/// Commands a member can issue. Exchanges use `C` for client frames and `S`
/// for server replies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    /// S public parameters, C `x(t)`, S `P(t)` and `Q(t)`, C public key, S user index.
    Register,
    /// C initialize input, S signature index.
    InitializeSignature,
    /// C signature index, S `t`, C `x(t)`, S ack.
    JoinSignature,
    /// C close input, S ack.
    CloseSignature,
    /// C signature index, S `(t, g^r, r·S(t))`, C Theta' element, S ack.
    FinalizeSignature,
    /// C sign input, S `(Delta, C, Sigma)`.
    Sign,
    /// C published values, S ack.
    Publish,
    /// C user index and `t`, S public key and published values if any.
    Check,
    /// C signature index, S signature.
    GetSignature,
    /// S verification material.
    Verify,
    Quit,
}

impl Command {
    pub const ALL: [Command; 11] = [
        Command::Register,
        Command::InitializeSignature,
        Command::JoinSignature,
        Command::CloseSignature,
        Command::FinalizeSignature,
        Command::Sign,
        Command::Publish,
        Command::Check,
        Command::GetSignature,
        Command::Verify,
        Command::Quit,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Command::Register => "register",
            Command::InitializeSignature => "initialize-signature",
            Command::JoinSignature => "join-signature",
            Command::CloseSignature => "close-signature",
            Command::FinalizeSignature => "finalize-signature",
            Command::Sign => "sign",
            Command::Publish => "publish",
            Command::Check => "check",
            Command::GetSignature => "get-signature",
            Command::Verify => "verify",
            Command::Quit => "quit",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Command {
    type Err = ProtocolError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Command::ALL
            .into_iter()
            .find(|command| command.name() == s)
            .ok_or_else(|| ProtocolError::UnknownCommand(s.to_owned()))
    }
}

/// Takes the guard even after another session panicked while holding it.
/// Manager operations validate their input before mutating state.
fn lock(manager: &SharedManager) -> MutexGuard<'_, GroupManager> {
    manager.lock().unwrap_or_else(|poisoned| {
        warn!("recovering group manager state after a panicked session");
        poisoned.into_inner()
    })
}

/// Server side of one connection.
pub struct Session<S> {
    conn: Connection<S>,
    manager: SharedManager,
}

impl<S: Read + Write> Session<S> {
    pub fn new(stream: S, manager: SharedManager) -> Self {
        Self {
            conn: Connection::new(stream),
            manager,
        }
    }

    /// Serves commands until the peer quits or hangs up, or a command fails.
    pub fn run(mut self) -> Result<()> {
        loop {
            let name: String = match self.conn.recv() {
                Ok(name) => name,
                Err(Error::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    debug!("peer hung up");
                    return Ok(());
                }
                Err(e) => return Err(e),
            };
            let command = match name.parse::<Command>() {
                Ok(command) => command,
                Err(e) => return self.respond::<()>(Err(e.into())),
            };
            if command == Command::Quit {
                debug!("peer quit");
                return Ok(());
            }
            debug!(%command, "command started");
            self.dispatch(command)?;
            debug!(%command, "command finished");
        }
    }

    fn dispatch(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Register => {
                let parameters = lock(&self.manager).public_parameters();
                self.respond(Ok(parameters))?;
                let x: Polynomial = self.receive()?;
                let polynomials = self.with_manager(|m| m.calculate_pq_polynomials(&x));
                self.respond(polynomials)?;
                let public_key: UserPublicKey = self.receive()?;
                let index = self.with_manager(|m| m.register_new_user(public_key));
                self.respond(index)?;
            }
            Command::InitializeSignature => {
                let input: InitializeSignatureInput = self.receive()?;
                let index = self.with_manager(|m| m.initialize_signature(input));
                self.respond(index)?;
            }
            Command::JoinSignature => {
                let signature_index: usize = self.receive()?;
                let t = self.with_manager(|m| m.get_t_from_pending_signature(signature_index));
                self.respond(t)?;
                let input: JoinSignatureInput = self.receive()?;
                let joined = self.with_manager(|m| m.join_signature(signature_index, input));
                self.respond(joined)?;
            }
            Command::CloseSignature => {
                let input: CloseSignatureInput = self.receive()?;
                let closed = self.with_manager(|m| m.close_signature(input));
                self.respond(closed)?;
            }
            Command::FinalizeSignature => {
                let signature_index: usize = self.receive()?;
                let input =
                    self.with_manager(|m| m.create_finalize_signature_input(signature_index));
                self.respond(input)?;
                let output: FinalizeSignatureOutput = self.receive()?;
                let finalized = self
                    .with_manager(|m| m.finalize_signature(signature_index, output))
                    .map(drop);
                self.respond(finalized)?;
            }
            Command::Sign => {
                let input: SignProcedureInput = self.receive()?;
                let output = self.with_manager(|m| m.sign(&input));
                self.respond(output)?;
            }
            Command::Publish => {
                let input: PublishProcedureInput = self.receive()?;
                let published = self.with_manager(|m| m.publish(input));
                self.respond(published)?;
            }
            Command::Check => {
                let input: CheckProcedureInput = self.receive()?;
                let output = self.with_manager(|m| m.check(&input));
                self.respond(output)?;
            }
            Command::GetSignature => {
                let signature_index: usize = self.receive()?;
                let signature = self.with_manager(|m| m.get_signature(signature_index));
                self.respond(signature)?;
            }
            Command::Verify => {
                let material = lock(&self.manager).verification_material();
                self.respond(Ok(material))?;
            }
            Command::Quit => {}
        }
        Ok(())
    }

    fn with_manager<T>(&self, f: impl FnOnce(&mut GroupManager) -> Result<T>) -> Result<T> {
        f(&mut lock(&self.manager))
    }

    /// Reads the next request value. A malformed one is refused like any
    /// other failed request.
    fn receive<T: DeserializeOwned>(&mut self) -> Result<T> {
        let request = self.conn.recv();
        if let Err(e @ Error::Codec(_)) = &request {
            self.refuse(e);
        }
        request
    }

    /// Sends the outcome to the peer and hands it back to the caller.
    fn respond<T: Serialize>(&mut self, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.conn.send(&Ok::<&T, String>(&value))?;
                Ok(value)
            }
            Err(e) => {
                if !matches!(e, Error::Io(_)) {
                    self.refuse(&e);
                }
                Err(e)
            }
        }
    }

    fn refuse(&mut self, e: &Error) {
        if let Err(send_error) = self.conn.send(&Err::<(), String>(e.to_string())) {
            debug!(%send_error, "error reply not delivered");
        }
    }
}

/// Group manager listening for members, one thread per connection.
pub struct Server {
    listener: TcpListener,
    manager: SharedManager,
}

impl Server {
    pub fn bind<A: ToSocketAddrs>(addr: A, manager: GroupManager) -> Result<Self> {
        let listener = TcpListener::bind(addr)?;
        Ok(Self {
            listener,
            manager: Arc::new(Mutex::new(manager)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn manager(&self) -> SharedManager {
        Arc::clone(&self.manager)
    }

    /// Accepts connections until the listener fails.
    pub fn run(self) -> Result<()> {
        info!(addr = %self.local_addr()?, "group manager listening");
        for stream in self.listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    continue;
                }
            };
            let manager = Arc::clone(&self.manager);
            thread::spawn(move || serve_connection(stream, manager));
        }
        Ok(())
    }
}

fn serve_connection(stream: TcpStream, manager: SharedManager) {
    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "unknown".to_owned());
    let span = info_span!("session", %peer);
    let _enter = span.enter();
    info!("connection accepted");
    match Session::new(stream, manager).run() {
        Ok(()) => info!("session closed"),
        Err(Error::Io(e)) => warn!(error = %e, "connection lost"),
        Err(e) => error!(error = %e, "session ended"),
    }
}

/// Reads one server reply, turning an error reply into [`Error::Remote`].
pub(crate) fn read_reply<T: DeserializeOwned, S: Read + Write>(
    conn: &mut Connection<S>,
) -> Result<T> {
    conn.recv::<std::result::Result<T, String>>()?
        .map_err(Error::Remote)
}
