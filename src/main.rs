use std::fs;
use std::io::{self, BufRead, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use tracing::{info, span, Level};
use tracing_subscriber::EnvFilter;

use step_out_group_signatures::codec::{load_signature, save_signature};
use step_out_group_signatures::params::{DEFAULT_COEFFICIENTS_NBITS, DEFAULT_RSA_KEY_NBITS};
use step_out_group_signatures::{
    Authorship, Command, Error, GroupManager, RemoteClient, Result, SchemeParameters, Server,
    ServerConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Runs the group manager.
    Serve {
        #[arg(short, long, default_value = "127.0.0.1:7777")]
        addr: String,
        #[command(flatten)]
        scheme: SchemeArgs,
        /// Bit size of q and of the random coefficients.
        #[arg(long, default_value_t = DEFAULT_COEFFICIENTS_NBITS)]
        coefficient_bits: u64,
        #[arg(long, default_value_t = DEFAULT_RSA_KEY_NBITS)]
        rsa_key_bits: usize,
    },
    /// Connects to a group manager and reads commands from stdin.
    Client {
        #[arg(short, long, default_value = "127.0.0.1:7777")]
        addr: String,
    },
}

#[derive(Args, Debug)]
struct SchemeArgs {
    /// Degree of the a_i(t) polynomials.
    #[arg(long, default_value_t = 12)]
    alpha: usize,
    /// Degree of x(t).
    #[arg(long, default_value_t = 10)]
    beta: usize,
    /// Number of fake OPE values.
    #[arg(long, default_value_t = 300)]
    eta: usize,
    /// Degree of m(t) and S(t).
    #[arg(long, default_value_t = 17)]
    gamma: usize,
    /// Maximal number of signers.
    #[arg(short, long, default_value_t = 20)]
    n: usize,
    /// Number of real OPE values minus one.
    #[arg(long, default_value_t = 300)]
    zeta: usize,
}

impl From<SchemeArgs> for SchemeParameters {
    fn from(args: SchemeArgs) -> Self {
        SchemeParameters {
            alpha: args.alpha,
            beta: args.beta,
            eta: args.eta,
            gamma: args.gamma,
            n: args.n,
            zeta: args.zeta,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .compact()
        .init();

    match cli.mode {
        Mode::Serve {
            addr,
            scheme,
            coefficient_bits,
            rsa_key_bits,
        } => {
            let span = span!(Level::INFO, "server");
            let _enter = span.entered();
            let config = ServerConfig {
                scheme: scheme.into(),
                coefficient_bits,
                rsa_key_bits,
            };
            info!(?config, "generating group parameters and keys");
            let manager = GroupManager::new(&config)?;
            Server::bind(addr.as_str(), manager)?.run()
        }
        Mode::Client { addr } => run_client(&addr),
    }
}

fn run_client(addr: &str) -> Result<()> {
    let mut client = RemoteClient::connect(addr)?;
    let stdin = io::stdin();
    prompt(&client)?;
    for line in stdin.lock().lines() {
        let line = line?;
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((name, args)) = words.split_first() else {
            prompt(&client)?;
            continue;
        };
        let command = match name.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                eprintln!("{e}");
                prompt(&client)?;
                continue;
            }
        };
        if command == Command::Quit {
            return client.quit();
        }
        match execute(&mut client, command, args) {
            Ok(()) => {}
            // the server closes the session after refusing a request
            Err(Error::Remote(reason)) => {
                eprintln!("server refused {command}: {reason}");
                let stream = TcpStream::connect(addr)?;
                client = RemoteClient::new(stream, client.into_manager());
            }
            Err(e) => eprintln!("{command} failed: {e}"),
        }
        prompt(&client)?;
    }
    client.quit()
}

fn prompt(client: &RemoteClient) -> Result<()> {
    print!("[user {}]> ", client.manager().user_index_label());
    io::stdout().flush()?;
    Ok(())
}

fn arg<'a>(args: &[&'a str], position: usize, what: &str) -> Result<&'a str> {
    args.get(position).copied().ok_or_else(|| {
        Error::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("missing argument: {what}"),
        ))
    })
}

fn index_arg(args: &[&str], position: usize, what: &str) -> Result<usize> {
    let raw = arg(args, position, what)?;
    raw.parse().map_err(|_| {
        Error::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{what} `{raw}` is not a number"),
        ))
    })
}

fn read_message(path: &str) -> Result<String> {
    Ok(fs::read_to_string(path)?)
}

fn execute(client: &mut RemoteClient, command: Command, args: &[&str]) -> Result<()> {
    match command {
        Command::Register if client.manager().is_registered() => {
            println!(
                "Already registered as user {}.",
                client.manager().user_index_label()
            );
        }
        Command::Register => {
            let index = client.register()?;
            println!("Registered as user {index}.");
        }
        Command::InitializeSignature => {
            let message = read_message(arg(args, 0, "message file")?)?;
            let index = client.initialize_signature(&message)?;
            println!("Assigned signature number is {index}.");
        }
        Command::JoinSignature => {
            client.join_signature(index_arg(args, 0, "signature index")?)?;
            println!("Joined.");
        }
        Command::CloseSignature => {
            client.close_signature(index_arg(args, 0, "signature index")?)?;
            println!("Closed.");
        }
        Command::FinalizeSignature => {
            client.finalize_signature(index_arg(args, 0, "signature index")?)?;
            println!("Contribution sent.");
        }
        Command::Sign => {
            let path = arg(args, 0, "message file")?;
            let signature = client.sign(&read_message(path)?)?;
            let out = signature_path(path);
            save_signature(&out, &signature)?;
            println!("Signature written to {}.", out.display());
        }
        Command::Publish => {
            let signature = load_signature(Path::new(arg(args, 0, "signature file")?))?;
            client.publish(&signature)?;
            println!("Published.");
        }
        Command::Check => {
            let signature = load_signature(Path::new(arg(args, 0, "signature file")?))?;
            let user = index_arg(args, 1, "user index")?;
            match client.check(user, &signature)? {
                Some(Authorship::Signer) => println!("User {user} is an author of the signature."),
                Some(Authorship::NotSigner) => {
                    println!("User {user} is not an author of the signature.")
                }
                Some(Authorship::Cheater) => {
                    println!("User {user} published values that do not match the signature.")
                }
                None => println!("User {user} has not published values for this signature."),
            }
        }
        Command::GetSignature => {
            let index = index_arg(args, 0, "signature index")?;
            let out = PathBuf::from(arg(args, 1, "signature file")?);
            let signature = client.get_signature(index)?;
            save_signature(&out, &signature)?;
            println!("Signature written to {}.", out.display());
        }
        Command::Verify => {
            let message = read_message(arg(args, 0, "message file")?)?;
            let signature = load_signature(Path::new(arg(args, 1, "signature file")?))?;
            if client.verify(&message, &signature)? {
                println!("Signature is valid.");
            } else {
                println!("Signature is not valid.");
            }
        }
        Command::Quit => {}
    }
    Ok(())
}

fn signature_path(message_path: &str) -> PathBuf {
    PathBuf::from(format!("{message_path}.sig"))
}
