use clap::error::ErrorKind;
use clap::{ArgGroup, CommandFactory, Parser};
use std::process::ExitCode;
use std::time::Duration;
use udp_perf::config::{DEFAULT_HOST, DEFAULT_PACKET_SIZE, DEFAULT_PORT};
use udp_perf::{Client, Config, Error, Server};

#[derive(Parser)]
#[command(name = "udp-perf")]
#[command(about = "UDP one-way delay, jitter and throughput measurement", long_about = None)]
#[command(version)]
#[command(group(ArgGroup::new("role").required(true).args(["client", "server"])))]
struct Cli {
    /// Run as the transmitter
    #[arg(long)]
    client: bool,

    /// Run as the receiver
    #[arg(long)]
    server: bool,

    /// Server address to send to (client)
    #[arg(long, value_name = "HOST", default_value = DEFAULT_HOST)]
    host: String,

    /// Port for both the datagrams and the control connection
    #[arg(long, value_name = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Packet size in bytes, including 42 bytes of header overhead (client)
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_PACKET_SIZE)]
    pktsize: usize,

    /// Stop after this many seconds, 0 for unlimited (server)
    #[arg(long = "max-time", value_name = "SECS", default_value_t = 0)]
    max_time: u64,

    /// Stop after this many packets, 0 for unlimited (server)
    #[arg(long = "max-pkts", value_name = "NUM", default_value_t = 0)]
    max_pkts: u64,

    /// Stop after this many bytes, 0 for unlimited (server)
    #[arg(long = "max-bytes", value_name = "BYTES", default_value_t = 0)]
    max_bytes: u64,

    /// Print a human-readable report with bandwidth (server)
    #[arg(long)]
    verbose: bool,

    /// Print the report as JSON (server)
    #[arg(long, conflicts_with = "verbose")]
    json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(1),
            };
            e.print()?;
            return Ok(code);
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if cli.client {
        let config = Config::client(cli.host, cli.port).with_packet_size(cli.pktsize);

        let client = match Client::new(config) {
            Ok(client) => client,
            Err(e @ Error::Config(_)) => {
                eprintln!("{}", e);
                eprintln!("{}", Cli::command().render_usage());
                return Ok(ExitCode::from(1));
            }
            Err(e) => return Err(e.into()),
        };
        client.run().await?;
    } else {
        let config = Config::server(cli.port)
            .with_max_time(Duration::from_secs(cli.max_time))
            .with_max_packets(cli.max_pkts)
            .with_max_bytes(cli.max_bytes)
            .with_verbose(cli.verbose)
            .with_json(cli.json);
        let (verbose, json) = (config.verbose, config.json);

        let report = Server::bind(config).await?.run().await?;

        if json {
            println!("{}", report.to_json()?);
        } else if verbose {
            println!("{}", report.verbose());
        } else {
            println!("{}", report.concise());
        }
    }

    Ok(ExitCode::SUCCESS)
}
