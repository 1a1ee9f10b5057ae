use std::io;

use pfas_calc_mcp::config::{ServerConfig, Transport};
use pfas_calc_mcp::{logger, CalcServer};

fn main() -> io::Result<()> {
    let config = ServerConfig::from_env()
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
    logger::init(config.log_level).map_err(io::Error::other)?;

    log::info!(
        "pfas-calcd starting: transport={:?} default_scenario={} access_gate={}",
        config.transport,
        config.default_scenario,
        config.access_key.is_some()
    );
    let transport = config.transport;
    let addr = config.http_addr.clone();
    let server = CalcServer::with_config(config).map_err(io::Error::other)?;
    match transport {
        Transport::Stdio => server.serve_stdio(),
        Transport::Http => server.serve_http(&addr),
    }
}
