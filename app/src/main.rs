use std::{process, time::Duration};

use clap::Parser;
use testlab_vxi11::{
    client::portmapper::PortMapperClient, find_ports, Client, ClientConfig, Error,
};

/// A utility for remote control of test and measurement equipment
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log debug messages
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Give up on a call after this many milliseconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    action: Action,
}

#[derive(clap::Subcommand, Debug)]
enum Action {
    /// Show VXI-11 ports for given host
    Showports {
        host: String,

        /// List every mapping the portmapper knows about
        #[arg(long)]
        all: bool,
    },
    /// Create a link to a device and destroy it again
    Test {
        host: String,

        /// Device name
        #[arg(long, default_value = "inst0")]
        device: String,

        #[arg(long, default_value_t = 1887)]
        client_id: i32,

        /// Lock the device while creating the link
        #[arg(long)]
        lock: bool,

        /// Milliseconds to wait for a lock held by another link
        #[arg(long, default_value_t = 0)]
        lock_timeout: u32,
    },
}

async fn show_ports(host: &str, all: bool, config: &ClientConfig) -> Result<(), Error> {
    let ports = find_ports(host, config).await?;
    println!("{}", ports);

    if all {
        let mut portmap =
            PortMapperClient::connect_tcp((host, config.portmapper_port), config).await?;
        for mapping in portmap.dump().await? {
            println!(
                "prog {:#08x} vers {} prot {} port {}",
                mapping.prog, mapping.vers, mapping.prot, mapping.port
            );
        }
        portmap.close().await?;
    }
    Ok(())
}

async fn link_test(
    client: &Client,
    device: &str,
    client_id: i32,
    lock: bool,
    lock_timeout: u32,
) -> Result<(), Error> {
    let link = client
        .create_link(device, client_id, lock, lock_timeout)
        .await?;
    log::info!(
        "Link ID: {}, abortPort: {}, maxRecv: {}",
        link.lid(),
        link.abort_port(),
        link.max_recv_size()
    );
    link.destroy().await
}

#[async_std::main]
async fn main() {
    let args = Args::parse();
    femme::with_level(if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    });

    let mut config = ClientConfig::default();
    if let Some(ms) = args.timeout {
        config = config.io_timeout(Duration::from_millis(ms));
    }

    let res = match args.action {
        Action::Showports { host, all } => show_ports(&host, all, &config).await,
        Action::Test {
            host,
            device,
            client_id,
            lock,
            lock_timeout,
        } => match Client::connect(&host, &config).await {
            Ok(client) => {
                log::info!("Client created for {}", client.peer());
                let res = link_test(&client, &device, client_id, lock, lock_timeout).await;
                // Close even if the link test failed, first error wins
                res.and(client.close().await)
            }
            Err(err) => Err(err),
        },
    };

    if let Err(err) = res {
        log::error!("{}", err);
        process::exit(1);
    }
}
