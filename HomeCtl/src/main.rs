use std::env;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use hcconfig::{Config, get_config};
use hccontrol::{
    ActionInvoker, DeviceDescriptionProvider, DiscoveryPipeline, HttpXmlDescriptionProvider,
    resolve_concurrently,
};
use hcupnp::ssdp::{SsdpClient, UdpSsdpTransport};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
usage: homectl [--target ST] [--mx N] [--config DIR] [--sequential]
       homectl [--config DIR] invoke <location> <service-type> <action> [Name=Value...]";

#[derive(Debug, Default)]
struct Options {
    target: Option<String>,
    mx: Option<u32>,
    config_dir: Option<String>,
    sequential: bool,
    invoke: Option<Vec<String>>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Options> {
    let mut options = Options::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--target" => {
                options.target = Some(args.next().context("--target needs a value")?);
            }
            "--mx" => {
                let value = args.next().context("--mx needs a value")?;
                options.mx = Some(value.parse().with_context(|| format!("invalid MX '{}'", value))?);
            }
            "--config" => {
                options.config_dir = Some(args.next().context("--config needs a value")?);
            }
            "--sequential" => options.sequential = true,
            "invoke" => {
                options.invoke = Some(args.by_ref().collect());
            }
            "-h" | "--help" => bail!("{}", USAGE),
            other => bail!("unknown argument '{}'\n{}", other, USAGE),
        }
    }

    Ok(options)
}

fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}

fn main() -> Result<()> {
    let options = parse_args(env::args().skip(1))?;

    let config = match &options.config_dir {
        Some(dir) => Arc::new(
            Config::load_config(dir).with_context(|| format!("loading configuration from {}", dir))?,
        ),
        None => get_config(),
    };

    init_logging(&config.get_log_level()?);
    info!("🏠 HomeCtl control point starting (config in {})", config.config_dir());

    let provider: Arc<dyn DeviceDescriptionProvider> =
        Arc::new(HttpXmlDescriptionProvider::with_timeout(config.get_http_timeout()?));

    match &options.invoke {
        Some(invoke_args) => invoke(&config, provider.as_ref(), invoke_args),
        None => discover(&config, provider, &options),
    }
}

fn discover(
    config: &Config,
    provider: Arc<dyn DeviceDescriptionProvider>,
    options: &Options,
) -> Result<()> {
    let transport = UdpSsdpTransport::new(config.get_receive_timeout()?)
        .context("opening the SSDP socket")?;
    let mut client = SsdpClient::new(transport);
    if let Some(window) = config.get_discovery_window()? {
        client = client.with_window(window);
    }

    let target = match &options.target {
        Some(target) => target.clone(),
        None => config.get_search_target()?,
    };
    let mx = match options.mx {
        Some(mx) => mx,
        None => u32::try_from(config.get_discovery_mx()?).unwrap_or(u32::MAX),
    };

    let pipeline = DiscoveryPipeline::new(client, provider)
        .with_search_target(target)
        .with_mx(mx);
    let session = pipeline.discover_all().context("sending M-SEARCH")?;

    let mut found = 0usize;
    if options.sequential {
        for pending in session {
            let location = pending.location().to_string();
            match pending.resolve() {
                Ok(device) => {
                    found += 1;
                    print!("{}", device.describe());
                }
                Err(e) => warn!("❌ Failed to resolve {}: {}", location, e),
            }
        }
    } else {
        let workers = usize::try_from(config.get_resolver_workers()?).unwrap_or(1);
        resolve_concurrently(session, workers, |resolved| {
            if let Ok(device) = resolved.result {
                found += 1;
                print!("{}", device.describe());
            }
        });
    }

    info!("🏁 {} device(s) resolved", found);
    Ok(())
}

fn invoke(config: &Config, provider: &dyn DeviceDescriptionProvider, args: &[String]) -> Result<()> {
    let [location, service_type, action_name, rest @ ..] = args else {
        bail!("invoke needs <location> <service-type> <action>\n{}", USAGE);
    };

    let arguments = rest
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| anyhow!("argument '{}' is not Name=Value", pair))
        })
        .collect::<Result<Vec<_>>>()?;

    let device = provider
        .resolve_device(location)
        .with_context(|| format!("resolving {}", location))?;
    let service = device
        .find_service(service_type)
        .with_context(|| format!("{} has no service {}", device, service_type))?;
    let action = service
        .action(action_name)
        .with_context(|| format!("{} has no action {}", service_type, action_name))?;

    let invoker = ActionInvoker::with_timeout(config.get_http_timeout()?);
    let output = invoker
        .invoke(action, arguments)
        .with_context(|| format!("invoking {}", action_name))?;

    let mut names: Vec<_> = output.keys().collect();
    names.sort();
    for name in names {
        println!("{} = {}", name, output[name]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn discovery_flags() {
        let options = parse_args(args(&["--target", "upnp:rootdevice", "--mx", "3", "--sequential"])).unwrap();
        assert_eq!(options.target.as_deref(), Some("upnp:rootdevice"));
        assert_eq!(options.mx, Some(3));
        assert!(options.sequential);
        assert!(options.invoke.is_none());
    }

    #[test]
    fn invoke_takes_the_rest() {
        let options = parse_args(args(&[
            "--config",
            "/tmp/hc",
            "invoke",
            "http://10.0.0.5:1900/desc.xml",
            "urn:schemas-upnp-org:service:SwitchPower:1",
            "SetTarget",
            "NewTargetValue=1",
        ]))
        .unwrap();
        assert_eq!(options.config_dir.as_deref(), Some("/tmp/hc"));
        assert_eq!(options.invoke.map(|a| a.len()), Some(4));
    }

    #[test]
    fn rejects_unknown_flags() {
        assert!(parse_args(args(&["--bogus"])).is_err());
        assert!(parse_args(args(&["--mx", "many"])).is_err());
    }
}
