//! TideKV CLI Client
//!
//! Command-line interface for interacting with TideKV. Without a subcommand
//! it opens an interactive prompt.

use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::net::TcpStream;
use std::process;

use clap::{Parser, Subcommand};
use tidekv::protocol::{read_response, write_command, Command, Response, Status};

/// TideKV CLI
#[derive(Parser, Debug)]
#[command(name = "tidekv-cli")]
#[command(about = "CLI for the TideKV key-value store")]
#[command(version)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:3223")]
    address: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },
}

impl From<Commands> for Command {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Get { key } => Command::Get { key },
            Commands::Set { key, value } => Command::Set { key, value },
            Commands::Del { key } => Command::Del { key },
        }
    }
}

struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Client {
    fn connect(address: &str) -> tidekv::Result<Self> {
        let stream = TcpStream::connect(address)?;
        stream.set_nodelay(true)?;
        Ok(Self {
            reader: BufReader::new(stream.try_clone()?),
            writer: BufWriter::new(stream),
        })
    }

    fn send(&mut self, command: &Command) -> tidekv::Result<Response> {
        write_command(&mut self.writer, command)?;
        read_response(&mut self.reader)
    }

    /// Send a raw query line; the server validates it
    fn send_line(&mut self, line: &str) -> tidekv::Result<Response> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        read_response(&mut self.reader)
    }
}

fn main() {
    let args = Args::parse();

    let mut client = match Client::connect(&args.address) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("can't connect to {}: {}", args.address, e);
            process::exit(1);
        }
    };

    let result = match args.command {
        Some(command) => client.send(&command.into()).map(|response| {
            print_response(&response);
            if response.status != Status::Ok {
                process::exit(2);
            }
        }),
        None => interactive(&mut client),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        process::exit(1);
    }
}

fn interactive(client: &mut Client) -> tidekv::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut line = String::new();

    loop {
        write!(stdout, "[TIDEKV] > ")?;
        stdout.flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }

        let query = line.trim_end_matches(['\r', '\n']);
        if query.is_empty() {
            continue;
        }
        if query == "exit" {
            return Ok(());
        }

        let response = client.send_line(query)?;
        print_response(&response);
    }
}

fn print_response(response: &Response) {
    match (response.status, &response.payload) {
        (Status::Ok, Some(value)) => println!("{}", value),
        (Status::Ok, None) => println!("ok"),
        (Status::NotFound, _) => println!("(not found)"),
        (Status::Error, message) => println!("error: {}", message.as_deref().unwrap_or("unknown")),
    }
}
