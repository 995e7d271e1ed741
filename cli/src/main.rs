// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, missing_debug_implementations)]

use argh::FromArgs;
use config::{ConfigError, PartialConfig, Settings, Upstream};
use hopper::{Forwarder, Server, Synthesizer, UdpTransport};
use owo_colors::OwoColorize;
use std::{
    fmt::Display,
    net::{Ipv4Addr, SocketAddr},
    path::PathBuf,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;

#[derive(Clone, Debug, FromArgs)]
/// Forward DNS questions one by one to an upstream resolver
struct HopperArgs {
    /// upstream resolver as host:port
    #[argh(option, short = 'r')]
    resolver: Option<String>,
    /// answer every question locally with this IPv4 address
    #[argh(option, short = 's')]
    stub: Option<Ipv4Addr>,
    /// address to listen to (default 127.0.0.1:2053)
    #[argh(option, short = 'l')]
    listen: Option<SocketAddr>,
    /// milliseconds to wait for each upstream answer (default 5000)
    #[argh(option, short = 't')]
    timeout: Option<u64>,
    /// number of worker threads (default: one per core)
    #[argh(option)]
    threads: Option<usize>,
    /// TOML configuration file, command line options take precedence
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,
    /// log filter, RUST_LOG takes precedence (default info)
    #[argh(option)]
    log_level: Option<String>,
}

impl From<HopperArgs> for PartialConfig {
    fn from(args: HopperArgs) -> Self {
        PartialConfig {
            resolver: args.resolver,
            stub: args.stub,
            listen: args.listen,
            timeout: args.timeout,
            threads: args.threads,
            log_level: args.log_level,
        }
    }
}

fn main() {
    let args: HopperArgs = argh::from_env();
    let settings = match load(args) {
        Ok(settings) => settings,
        Err(e) => fatal("invalid configuration", e),
    };
    init_tracing(&settings.log_level);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(settings.threads)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => fatal("could not start the runtime", e),
    };
    runtime.block_on(run(settings))
}

fn load(args: HopperArgs) -> Result<Settings, ConfigError> {
    let file = match &args.config {
        Some(path) => PartialConfig::from_file(path)?,
        None => PartialConfig::default(),
    };
    Settings::try_from(file.merge(args.into()))
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(settings: Settings) {
    let server = match Server::default().bind(settings.listen).await {
        Ok(server) => server,
        Err(e) => fatal(
            "could not bind to the specified interface or port",
            e,
        ),
    };
    match settings.upstream {
        Upstream::Resolver(resolver) => {
            let transport = match UdpTransport::resolve(&resolver).await {
                Ok(transport) => transport,
                Err(source) => fatal(
                    "invalid configuration",
                    ConfigError::Resolve { resolver, source },
                ),
            };
            info!(
                upstream = %transport.upstream(),
                timeout = ?settings.timeout,
                threads = settings.threads,
                "forwarding"
            );
            server
                .serve(Forwarder::new(transport).timeout(settings.timeout))
                .await
        }
        Upstream::Stub(addr) => {
            info!(%addr, threads = settings.threads, "answering locally");
            server.serve(Synthesizer::new(addr)).await
        }
    }
}

fn fatal(context: &str, e: impl Display) -> ! {
    eprintln!("{}: {}.\n\n{}", "ERROR".red(), context, e);
    std::process::exit(1)
}
