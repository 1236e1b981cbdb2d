use clap::Parser;
use graphspace_http::serve;
use graphspace_http::server::DEFAULT_BIND_ADDR;

#[derive(Parser)]
#[command(name = "graphspace", version, about = "Multi-workspace knowledge graph server")]
struct Cli {
    /// Root directory holding one subdirectory per workspace.
    #[arg(long, env = "GRAPHSPACE_DATA_DIR", default_value = "./data")]
    data_dir: String,
    #[arg(long, env = "GRAPHSPACE_BIND_ADDR")]
    bind_addr: Option<String>,
    /// Replaces the port of the bind address.
    #[arg(long, env = "GRAPHSPACE_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let bind_addr = resolve_bind_addr(cli.bind_addr.as_deref(), cli.port)
        .map_err(|msg| std::io::Error::new(std::io::ErrorKind::InvalidInput, msg))?;

    std::env::set_var("GRAPHSPACE_DATA_DIR", &cli.data_dir);
    std::env::set_var("GRAPHSPACE_BIND_ADDR", &bind_addr);
    serve().await
}

fn resolve_bind_addr(bind_addr: Option<&str>, port: Option<u16>) -> Result<String, String> {
    let base = bind_addr.unwrap_or(DEFAULT_BIND_ADDR);
    let Some(port) = port else {
        return Ok(base.to_string());
    };
    match base.rsplit_once(':') {
        Some((host, _)) if !host.is_empty() => Ok(format!("{host}:{port}")),
        _ => Err(format!("--bind-addr {base:?} must be host:port")),
    }
}
