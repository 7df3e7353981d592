//! Member side of a session: drives each [`Command`] exchange against the
//! group manager and feeds the replies into a [`ClientManager`].

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::client::{Authorship, ClientManager};
use crate::errors::Result;
use crate::mpi::BigInteger;
use crate::session::{read_reply, Command};
use crate::transport::Connection;
use crate::types::{
    CheckProcedureOutput, FinalizeSignatureInput, PQPolynomials, PublicParameters,
    PublishProcedureInput, SignProcedureOutput, Signature, VerificationMaterial,
};

pub struct RemoteClient<S = TcpStream> {
    conn: Connection<S>,
    manager: ClientManager,
}

impl RemoteClient<TcpStream> {
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        Ok(Self::new(stream, ClientManager::new()))
    }
}

impl<S: Read + Write> RemoteClient<S> {
    pub fn new(stream: S, manager: ClientManager) -> Self {
        Self {
            conn: Connection::new(stream),
            manager,
        }
    }

    pub fn manager(&self) -> &ClientManager {
        &self.manager
    }

    pub fn into_manager(self) -> ClientManager {
        self.manager
    }

    fn start(&mut self, command: Command) -> Result<()> {
        debug!(%command, "sending command");
        self.conn.send(&command.name().to_owned())
    }

    fn request<Req: Serialize, Resp: DeserializeOwned>(&mut self, request: &Req) -> Result<Resp> {
        self.conn.send(request)?;
        read_reply(&mut self.conn)
    }

    /// Obtains a key pair and a user index from the group manager.
    pub fn register(&mut self) -> Result<usize> {
        self.start(Command::Register)?;
        let parameters: PublicParameters = read_reply(&mut self.conn)?;
        self.manager.set_public_parameters(parameters)?;
        let x = self.manager.initialize_user_keys()?;
        let polynomials: PQPolynomials = self.request(&x)?;
        let public_key = self.manager.create_keys(polynomials)?;
        let user_index: usize = self.request(&public_key)?;
        self.manager.set_user_index(user_index);
        info!(user_index, "registered");
        Ok(user_index)
    }

    /// Opens a collective signature over `message`; returns its index.
    pub fn initialize_signature(&mut self, message: &str) -> Result<usize> {
        let input = self.manager.create_initialize_signature_input(message)?;
        self.start(Command::InitializeSignature)?;
        self.request(&input)
    }

    pub fn join_signature(&mut self, signature_index: usize) -> Result<()> {
        self.start(Command::JoinSignature)?;
        let t: BigInteger = self.request(&signature_index)?;
        let input = self.manager.create_join_signature_input(&t)?;
        self.request(&input)
    }

    pub fn close_signature(&mut self, signature_index: usize) -> Result<()> {
        let input = self.manager.create_close_signature_input(signature_index)?;
        self.start(Command::CloseSignature)?;
        self.request(&input)
    }

    pub fn finalize_signature(&mut self, signature_index: usize) -> Result<()> {
        self.start(Command::FinalizeSignature)?;
        let input: FinalizeSignatureInput = self.request(&signature_index)?;
        let output = self.manager.create_finalize_signature_output(&input)?;
        self.request(&output)
    }

    /// Signs `message` as the only member of the signer set.
    pub fn sign(&mut self, message: &str) -> Result<Signature> {
        let input = self.manager.create_sign_procedure_input(message)?;
        self.start(Command::Sign)?;
        let output: SignProcedureOutput = self.request(&input)?;
        self.manager.create_signature(&input, output)
    }

    /// Steps out of `signature` by publishing this member's values for its `t`.
    pub fn publish(&mut self, signature: &Signature) -> Result<()> {
        let input = self.manager.create_publish_procedure_input(signature)?;
        self.publish_values(&input)
    }

    pub fn publish_values(&mut self, input: &PublishProcedureInput) -> Result<()> {
        self.start(Command::Publish)?;
        self.request(input)
    }

    pub fn fetch_published(&mut self, user_index: usize, signature: &Signature) -> Result<CheckProcedureOutput> {
        let input = self.manager.create_check_procedure_input(user_index, signature);
        self.start(Command::Check)?;
        self.request(&input)
    }

    /// `None` when the member has published nothing for the signature's `t`.
    pub fn check(&mut self, user_index: usize, signature: &Signature) -> Result<Option<Authorship>> {
        if self.manager.group().is_err() {
            self.fetch_verification_material()?;
        }
        match self.fetch_published(user_index, signature)? {
            Some((public_key, published)) => self
                .manager
                .check_user(&public_key, &published, signature)
                .map(Some),
            None => Ok(None),
        }
    }

    pub fn get_signature(&mut self, signature_index: usize) -> Result<Signature> {
        self.start(Command::GetSignature)?;
        self.request(&signature_index)
    }

    pub fn fetch_verification_material(&mut self) -> Result<()> {
        self.start(Command::Verify)?;
        let material: VerificationMaterial = read_reply(&mut self.conn)?;
        self.manager.set_verification_material(material)
    }

    pub fn verify(&mut self, message: &str, signature: &Signature) -> Result<bool> {
        self.fetch_verification_material()?;
        self.manager.verify_signature(message, signature)
    }

    pub fn quit(mut self) -> Result<()> {
        self.start(Command::Quit)
    }
}
