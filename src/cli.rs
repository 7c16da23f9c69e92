use anyhow::Result;

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum CliCommand {
    Devices,
    Discover {
        network_scan: bool,
        network: Option<String>,
    },
    DiscoverIp {
        addresses: String,
    },
    Status,
    Control {
        device: String,
        action: String,
    },
    Rename {
        device: String,
        name: Option<String>,
    },
    Forget {
        device: Option<String>,
        all: bool,
    },
    Validate {
        range: String,
    },
    Detect,
    Monitor,
    Help,
    Version,
}

pub(crate) fn version_text() -> String {
    format!("plughub {}", env!("CARGO_PKG_VERSION"))
}

pub(crate) fn usage_text() -> String {
    format!(
        "{version}
PlugHub — Smart Plug Discovery & Control CLI

Usage:
  plughub [devices]
  plughub discover [--network-scan] [--network <CIDR>]
  plughub discover-ip <ADDRESSES>
  plughub status
  plughub control --device <UDN> --action <NAME>
  plughub rename --device <UDN> [--name <NAME>]
  plughub forget (--device <UDN> | --all)
  plughub validate <RANGE>
  plughub detect
  plughub monitor
  plughub --help
  plughub --version

Options:
      --network-scan      Discover: also sweep the local subnet
      --network <CIDR>    Scan a specific range instead of auto-detecting
      --device <UDN>      Target device identity
      --action <NAME>     Device action: on, off, toggle, get_state, get_friendly_name
      --name <NAME>       New display name (omit to clear the override)
      --all               Forget: remove every device
  -h, --help              Show this help text
  -V, --version           Show version",
        version = version_text()
    )
}

pub(crate) fn parse_cli_args<I, S>(args: I) -> Result<CliCommand>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut iter = args.into_iter();
    let _program_name = iter.next();

    let mut command: Option<String> = None;
    let mut positional: Option<String> = None;
    let mut network_scan = false;
    let mut all = false;
    let mut network: Option<String> = None;
    let mut device: Option<String> = None;
    let mut action: Option<String> = None;
    let mut name: Option<String> = None;

    while let Some(arg) = iter.next() {
        let arg = arg.as_ref();
        match arg {
            "-h" | "--help" => return Ok(CliCommand::Help),
            "-V" | "--version" => return Ok(CliCommand::Version),
            "devices" | "discover" | "discover-ip" | "status" | "control" | "rename"
            | "forget" | "validate" | "detect" | "monitor" => {
                if command.as_deref().is_some_and(|existing| existing != arg) {
                    return Err(anyhow::anyhow!(
                        "Multiple commands provided. Use only one command.\n\n{}",
                        usage_text()
                    ));
                }
                command = Some(arg.to_string());
            }
            "--network-scan" => network_scan = true,
            "--all" => all = true,
            "--network" => network = Some(flag_value(&mut iter, "--network")?),
            "--device" => device = Some(flag_value(&mut iter, "--device")?),
            "--action" => action = Some(flag_value(&mut iter, "--action")?),
            "--name" => name = Some(flag_value(&mut iter, "--name")?),
            _ if arg.starts_with("--network=") => {
                network = Some(inline_value(arg, "--network")?);
            }
            _ if arg.starts_with("--device=") => {
                device = Some(inline_value(arg, "--device")?);
            }
            _ if arg.starts_with("--action=") => {
                action = Some(inline_value(arg, "--action")?);
            }
            _ if arg.starts_with("--name=") => {
                name = Some(inline_value(arg, "--name")?);
            }
            _ if arg.starts_with('-') => {
                return Err(anyhow::anyhow!(
                    "Unknown argument: {arg}\n\n{}",
                    usage_text()
                ));
            }
            _ => {
                if positional.is_some() {
                    return Err(anyhow::anyhow!(
                        "Unexpected argument: {arg}\n\n{}",
                        usage_text()
                    ));
                }
                positional = Some(arg.to_string());
            }
        }
    }

    match command.as_deref().unwrap_or("devices") {
        "devices" => Ok(CliCommand::Devices),
        "discover" => Ok(CliCommand::Discover {
            network_scan,
            network,
        }),
        "discover-ip" => {
            let addresses = positional.ok_or_else(|| {
                anyhow::anyhow!(
                    "discover-ip requires one or more addresses.\n\n{}",
                    usage_text()
                )
            })?;
            Ok(CliCommand::DiscoverIp { addresses })
        }
        "status" => Ok(CliCommand::Status),
        "control" => {
            let device = device.ok_or_else(|| {
                anyhow::anyhow!("control requires --device <UDN>.\n\n{}", usage_text())
            })?;
            let action = action.ok_or_else(|| {
                anyhow::anyhow!("control requires --action <NAME>.\n\n{}", usage_text())
            })?;
            Ok(CliCommand::Control { device, action })
        }
        "rename" => {
            let device = device.ok_or_else(|| {
                anyhow::anyhow!("rename requires --device <UDN>.\n\n{}", usage_text())
            })?;
            Ok(CliCommand::Rename { device, name })
        }
        "forget" => {
            if device.is_none() && !all {
                return Err(anyhow::anyhow!(
                    "forget requires --device <UDN> or --all.\n\n{}",
                    usage_text()
                ));
            }
            Ok(CliCommand::Forget { device, all })
        }
        "validate" => {
            let range = positional.ok_or_else(|| {
                anyhow::anyhow!("validate requires a network range.\n\n{}", usage_text())
            })?;
            Ok(CliCommand::Validate { range })
        }
        "detect" => Ok(CliCommand::Detect),
        "monitor" => Ok(CliCommand::Monitor),
        _ => unreachable!(),
    }
}

fn flag_value<I, S>(iter: &mut I, flag: &str) -> Result<String>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    iter.next()
        .map(|v| v.as_ref().to_string())
        .ok_or_else(|| anyhow::anyhow!("Missing value for {}.\n\n{}", flag, usage_text()))
}

fn inline_value(arg: &str, flag: &str) -> Result<String> {
    let value = arg.split_once('=').map(|(_, v)| v).unwrap_or_default();
    if value.is_empty() {
        return Err(anyhow::anyhow!(
            "Missing value for {}.\n\n{}",
            flag,
            usage_text()
        ));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_help_flag() {
        let parsed = parse_cli_args(["plughub", "--help"]).expect("help args should parse");
        assert_eq!(parsed, CliCommand::Help);
    }

    #[test]
    fn parse_version_flag() {
        let parsed = parse_cli_args(["plughub", "-V"]).expect("version args should parse");
        assert_eq!(parsed, CliCommand::Version);
    }

    #[test]
    fn parse_default_devices_command() {
        let parsed = parse_cli_args(["plughub"]).expect("default args should parse");
        assert_eq!(parsed, CliCommand::Devices);
    }

    #[test]
    fn parse_discover_with_network_scan() {
        let args = ["plughub", "discover", "--network-scan", "--network", "10.0.0.0/24"];
        let parsed = parse_cli_args(args).expect("discover args should parse");
        assert_eq!(
            parsed,
            CliCommand::Discover {
                network_scan: true,
                network: Some("10.0.0.0/24".to_string())
            }
        );
    }

    #[test]
    fn parse_discover_ip_requires_addresses() {
        let err = parse_cli_args(["plughub", "discover-ip"])
            .expect_err("discover-ip without addresses should fail");
        assert!(err.to_string().contains("requires one or more addresses"));

        let parsed = parse_cli_args(["plughub", "discover-ip", "192.168.1.169,192.168.1.170"])
            .expect("discover-ip with addresses should parse");
        assert_eq!(
            parsed,
            CliCommand::DiscoverIp {
                addresses: "192.168.1.169,192.168.1.170".to_string()
            }
        );
    }

    #[test]
    fn parse_control_requires_device_and_action() {
        let err = parse_cli_args(["plughub", "control", "--device", "uuid:a"])
            .expect_err("control without action should fail");
        assert!(err.to_string().contains("requires --action"));

        let parsed = parse_cli_args([
            "plughub", "control", "--device", "uuid:a", "--action", "toggle",
        ])
        .expect("control args should parse");
        assert_eq!(
            parsed,
            CliCommand::Control {
                device: "uuid:a".to_string(),
                action: "toggle".to_string()
            }
        );
    }

    #[test]
    fn parse_rename_allows_missing_name() {
        let parsed = parse_cli_args(["plughub", "rename", "--device=uuid:a"])
            .expect("rename without name should parse");
        assert_eq!(
            parsed,
            CliCommand::Rename {
                device: "uuid:a".to_string(),
                name: None
            }
        );
    }

    #[test]
    fn parse_forget_requires_target() {
        let err =
            parse_cli_args(["plughub", "forget"]).expect_err("forget without target should fail");
        assert!(err.to_string().contains("--device <UDN> or --all"));

        let parsed =
            parse_cli_args(["plughub", "forget", "--all"]).expect("forget --all should parse");
        assert_eq!(
            parsed,
            CliCommand::Forget {
                device: None,
                all: true
            }
        );
    }

    #[test]
    fn parse_validate_takes_positional_range() {
        let parsed = parse_cli_args(["plughub", "validate", "192.168.1.0/24"])
            .expect("validate args should parse");
        assert_eq!(
            parsed,
            CliCommand::Validate {
                range: "192.168.1.0/24".to_string()
            }
        );
    }

    #[test]
    fn parse_unknown_argument_errors() {
        let err = parse_cli_args(["plughub", "--unknown"]).expect_err("unknown flag should fail");
        assert!(err.to_string().contains("Unknown argument"));
    }
}
