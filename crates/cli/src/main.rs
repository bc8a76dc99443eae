use std::io;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use satip::stream::Stream;
use satip::tuner::lnb::Lnb;
use satip::tuner::sim::SimTuner;
use satip::{RtspServer, ServerConfig, Streams};

#[derive(Parser)]
#[command(
    name = "satip-server",
    about = "SAT>IP server exposing DVB tuners over RTSP/RTP"
)]
struct Args {
    /// Bind address (host:port)
    #[arg(long, short, default_value = "0.0.0.0:554")]
    bind: String,

    /// Public host advertised in SDP and RTP-Info URLs
    #[arg(long)]
    public_host: Option<String>,

    /// RTSP session timeout in seconds
    #[arg(long, default_value_t = 60)]
    session_timeout: u64,

    /// Number of simulated DVB-S2 tuners to expose
    #[arg(long, default_value_t = 2)]
    tuners: u32,
}

fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let session_timeout = Duration::from_secs(args.session_timeout);
    let streams = Streams::new(
        (0..args.tuners)
            .map(|id| {
                Arc::new(Stream::new(
                    id,
                    Box::new(SimTuner::dvbs2(&format!("sim{id}")).with_dvr_packets(100_000)),
                    Lnb::default(),
                    session_timeout,
                    None,
                ))
            })
            .collect(),
    );

    let config = ServerConfig {
        public_host: args.public_host,
    };
    let mut server = RtspServer::with_config(&args.bind, streams, config);

    if let Err(e) = server.start() {
        eprintln!("Failed to start server: {}", e);
        return;
    }

    println!("SAT>IP server on {} — press Enter to stop", args.bind);
    let mut input = String::new();
    io::stdin().read_line(&mut input).unwrap();

    server.stop();
}
