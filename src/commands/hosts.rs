use crate::cli::{HostsArgs, OutputFormat};
use crate::commands::{Inputs, load};
use crate::{Context, ui};
use anyhow::Result;
use colored::Colorize;
use inventory::{GroupValue, NetworkSpec, ResolvedModel};
use serde::Serialize;

/// One row of the host listing
#[derive(Debug, Serialize)]
struct HostRow<'a> {
    hostname: &'a str,
    fqdn: &'a str,
    #[serde(rename = "box")]
    box_image: &'a str,
    memory: u32,
    cpus: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    ip: Option<&'a str>,
    #[serde(skip_serializing_if = "no_groups")]
    groups: &'a [String],
}

fn no_groups(groups: &&[String]) -> bool {
    groups.is_empty()
}

fn rows<'a>(model: &'a ResolvedModel<'_>) -> Vec<HostRow<'a>> {
    model
        .hosts
        .iter()
        .map(|host| HostRow {
            hostname: host.hostname(),
            fqdn: &host.fqdn,
            box_image: host.box_image(),
            memory: host.memory(),
            cpus: host.cpus(),
            ip: host.spec.networks.iter().find_map(NetworkSpec::ip),
            groups: &host.spec.groups,
        })
        .collect()
}

/// List resolved hosts and groups
pub fn run(ctx: &Context, args: &HostsArgs) -> Result<()> {
    let Inputs {
        inventory,
        group_vars,
        mut diags,
    } = load(ctx);
    let model = inventory::build(&inventory, &group_vars, &mut diags);
    let rows = rows(&model);

    match args.format {
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&rows)?),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Text => print_text(&rows, &model),
    }
    Ok(())
}

fn print_text(rows: &[HostRow<'_>], model: &ResolvedModel<'_>) {
    ui::header("Hosts");
    if rows.is_empty() {
        ui::info("No hosts declared");
        return;
    }

    for row in rows {
        let details = format!(
            "{} · {} · {}",
            row.box_image,
            ui::format_memory(row.memory),
            ui::count(row.cpus as usize, "cpu")
        );
        println!("  {} {}", row.fqdn.bold(), details.dimmed());
        if let Some(ip) = row.ip {
            ui::kv("ip", ip);
        }
    }

    if model.groups.is_empty() {
        return;
    }
    ui::section("Groups");
    for (name, value) in model.groups.iter() {
        match value {
            GroupValue::Members(members) => ui::kv(name, &members.join(", ")),
            GroupValue::External(_) => ui::kv(name, "(from group variables)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inventory::{Diagnostics, GroupVars};

    #[test]
    fn test_rows_resolve_defaults_and_address() {
        let inventory = inventory::loader::parse(
            "- globals:\n    domain: lab.test\n- hostname: web\n  groups: [app]\n  networks:\n    - private_network: { ip: 10.0.0.5 }\n- hostname: db\n  memory: 4096\n",
            &mut Diagnostics::new(),
        )
        .unwrap();
        let model = inventory::build(&inventory, &GroupVars::new(), &mut Diagnostics::new());

        let rows = rows(&model);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].fqdn, "web.lab.test");
        assert_eq!(rows[0].ip, Some("10.0.0.5"));
        assert_eq!(rows[0].memory, inventory::DEFAULT_MEMORY);
        assert_eq!(rows[1].memory, 4096);
        assert_eq!(rows[1].ip, None);

        let json = serde_json::to_string(&rows[1]).unwrap();
        assert_eq!(
            json,
            r#"{"hostname":"db","fqdn":"db.lab.test","box":"centos/7","memory":4096,"cpus":1}"#
        );
    }
}
