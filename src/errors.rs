//! Error types shared by the arithmetic layer, the protocol managers and the
//! session layer.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("math error: {0}")]
    Math(#[from] MathError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
    #[error("rsa error: {0}")]
    Crypto(#[from] rsa::Error),
    #[error("invalid mac key: {0}")]
    MacKey(#[from] hmac::digest::InvalidLength),
    /// The server answered a request with an error and closed the session.
    #[error("server refused request: {0}")]
    Remote(String),
}

/// Invalid scheme constants. Fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("gamma must be at least 1")]
    ZeroGamma,
    #[error("the maximal number of signers (n) must be at least 1")]
    ZeroSigners,
    #[error("deg P(t) = {p} must be lower than deg S(t) = {s}")]
    PNotBelowS { p: usize, s: usize },
    #[error("deg L(t, x(t)) = {l_exp} must not be lower than deg S(t) = {s}")]
    LExpBelowS { l_exp: usize, s: usize },
    #[error("{real} real OPE values cannot interpolate a polynomial of degree {l_exp}")]
    NotEnoughOpeValues { real: usize, l_exp: usize },
    #[error("coefficient size of {0} bits is too small")]
    CoefficientBits(u64),
    #[error("scheme constants are too large to derive polynomial degrees")]
    DegreeOverflow,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    #[error("no signature with index {0}")]
    UnknownSignature(usize),
    #[error("no user with index {0}")]
    UnknownUser(usize),
    #[error("user {user} did not initialize signature {signature}")]
    NotInitiator { user: usize, signature: usize },
    #[error("signature {0} is already closed")]
    SignatureClosed(usize),
    #[error("signature {0} is still open")]
    SignatureNotClosed(usize),
    #[error("signature {0} is waiting for finalize contributions")]
    SignatureIncomplete(usize),
    #[error("user {user} did not join signature {signature}")]
    NotASigner { user: usize, signature: usize },
    #[error("signature {0} has no signers")]
    NoSigners(usize),
    #[error("{count} signers exceed the maximum of {max}")]
    TooManySigners { count: usize, max: usize },
    #[error("user {0} has not published values for this signature")]
    NotPublished(usize),
    #[error("this client is not registered")]
    NotRegistered,
    #[error("group parameters have not been received")]
    MissingGroupParameters,
    #[error("dummy private key has not been received")]
    MissingDummyKey,
    #[error("group parameters are not a safe-prime group")]
    InvalidGroupParameters,
    #[error("{what} has degree {actual}, expected {expected}")]
    UnexpectedDegree {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("element is not invertible modulo the given modulus")]
    NotInvertible,
    #[error("interpolation points are not pairwise distinct")]
    DuplicateEvaluationPoint,
    #[error("exponent modulus is not prime")]
    NonPrimeExponentModulus,
    #[error("output degree {actual} does not fit, expected {expected}")]
    DegreeMismatch { expected: usize, actual: usize },
    #[error("interpolation needs at least one point")]
    EmptyInterpolation,
    #[error("a polynomial needs at least one coefficient")]
    NoCoefficients,
    #[error("{args} arguments but {values} values")]
    LengthMismatch { args: usize, values: usize },
    #[error("modulus must be positive")]
    ZeroModulus,
    #[error("`{0}` is not a hexadecimal integer")]
    MalformedInteger(String),
}
