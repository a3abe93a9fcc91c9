//! Published-port handling for compose text.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_yaml::Value as YamlValue;

static PORTS_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<indent>\s*)(?:-\s+)?ports:\s*(?:#.*)?$").expect("ports key pattern is valid")
});

static SHORT_SYNTAX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^(?P<lead>\s*-\s*["']?)(?P<ip>[0-9.]+:|\[[^\]]+\]:)?(?P<host>\d+)(?P<rest>:\d+[^"'\s#]*)(?P<trail>["']?\s*(?:#.*)?)$"#,
    )
    .expect("short port pattern is valid")
});

static LONG_SYNTAX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?P<lead>\s*(?:-\s+)?published:\s*["']?)(?P<host>\d+)(?P<trail>.*)$"#)
        .expect("published port pattern is valid")
});

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn remapped(host: &str, mapping: &BTreeMap<u16, u16>) -> Option<u16> {
    let declared: u16 = host.parse().ok()?;
    mapping.get(&declared).copied().filter(|assigned| *assigned != declared)
}

/// Rewrites host-side published ports inside `ports:` lists.
///
/// Short syntax (`"H:C"`, `"IP:H:C"`, optionally with `/proto`) and the long
/// syntax `published:` key are rewritten when `mapping` sends the host port
/// elsewhere. Container-only entries and every line outside a `ports:` list are
/// left as they are.
#[must_use]
pub fn rewrite_published_ports(text: &str, mapping: &BTreeMap<u16, u16>) -> String {
    if mapping.iter().all(|(declared, assigned)| declared == assigned) {
        return text.to_string();
    }

    let mut output = String::with_capacity(text.len());
    let mut ports_indent: Option<usize> = None;

    for raw in text.split_inclusive('\n') {
        let line = raw.trim_end_matches(['\n', '\r']);
        let newline = &raw[line.len()..];

        if let Some(indent) = ports_indent
            && !line.trim().is_empty()
        {
            let trimmed = line.trim_start();
            let current = indent_of(line);
            let inside = current > indent || (current == indent && trimmed.starts_with('-'));
            if !inside {
                ports_indent = None;
            }
        }

        if let Some(captures) = PORTS_KEY.captures(line) {
            ports_indent = Some(captures["indent"].len());
            output.push_str(raw);
            continue;
        }

        if ports_indent.is_some() {
            if let Some(c) = SHORT_SYNTAX.captures(line)
                && let Some(assigned) = remapped(&c["host"], mapping)
            {
                tracing::debug!("Rewriting published port {} -> {}", &c["host"], assigned);
                output.push_str(&c["lead"]);
                output.push_str(c.name("ip").map_or("", |m| m.as_str()));
                output.push_str(&assigned.to_string());
                output.push_str(&c["rest"]);
                output.push_str(&c["trail"]);
                output.push_str(newline);
                continue;
            }
            if let Some(c) = LONG_SYNTAX.captures(line)
                && let Some(assigned) = remapped(&c["host"], mapping)
            {
                tracing::debug!("Rewriting published port {} -> {}", &c["host"], assigned);
                output.push_str(&c["lead"]);
                output.push_str(&assigned.to_string());
                output.push_str(&c["trail"]);
                output.push_str(newline);
                continue;
            }
        }

        output.push_str(raw);
    }

    output
}

fn host_port(entry: &YamlValue) -> Option<u16> {
    match entry {
        YamlValue::String(spec) => {
            let spec = spec.split('/').next().unwrap_or(spec);
            let parts: Vec<&str> = spec.rsplitn(3, ':').collect();
            // rsplitn yields container, host, ip; a single part is container-only
            if parts.len() < 2 {
                return None;
            }
            parts[1].trim().parse().ok()
        }
        YamlValue::Mapping(map) => match map.get("published")? {
            YamlValue::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
            YamlValue::String(s) => s.trim().parse().ok(),
            _ => None,
        },
        _ => None,
    }
}

/// Collects the host ports published by every service of a compose document.
///
/// # Errors
///
/// Returns the YAML parse error when `text` is not valid YAML.
pub fn published_ports(text: &str) -> Result<Vec<u16>, serde_yaml::Error> {
    let document: YamlValue = serde_yaml::from_str(text)?;
    let mut ports = Vec::new();

    let Some(services) = document.get("services").and_then(YamlValue::as_mapping) else {
        return Ok(ports);
    };

    for service in services.values() {
        match service.get("ports") {
            Some(YamlValue::Sequence(entries)) => {
                ports.extend(entries.iter().filter_map(host_port));
            }
            Some(entry @ YamlValue::Mapping(_)) => ports.extend(host_port(entry)),
            _ => {}
        }
    }

    Ok(ports)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(pairs: &[(u16, u16)]) -> BTreeMap<u16, u16> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_short_syntax_rewritten() {
        let block = "  browser:\n    ports:\n      - \"3000:3000\"\n      - \"59000:59000/tcp\"\n";
        let rewritten = rewrite_published_ports(block, &mapping(&[(3000, 45000), (59000, 59000)]));
        assert_eq!(
            rewritten,
            "  browser:\n    ports:\n      - \"45000:3000\"\n      - \"59000:59000/tcp\"\n"
        );
    }

    #[test]
    fn test_ip_bound_and_protocol_entries() {
        let block = "    ports:\n      - 127.0.0.1:8080:80/udp # admin\n      - '[::1]:8080:80'\n";
        let rewritten = rewrite_published_ports(block, &mapping(&[(8080, 45001)]));
        assert!(rewritten.contains("- 127.0.0.1:45001:80/udp # admin\n"));
        assert!(rewritten.contains("- '[::1]:45001:80'\n"));
    }

    #[test]
    fn test_long_syntax_rewritten() {
        let block = "    ports:\n      - target: 80\n        published: \"8080\"\n        protocol: tcp\n";
        let rewritten = rewrite_published_ports(block, &mapping(&[(8080, 45000)]));
        assert!(rewritten.contains("        published: \"45000\"\n"));
        assert!(rewritten.contains("      - target: 80\n"));
    }

    #[test]
    fn test_container_only_entries_untouched() {
        let block = "    ports:\n      - \"3000\"\n      - 3000\n";
        assert_eq!(rewrite_published_ports(block, &mapping(&[(3000, 45000)])), block);
    }

    #[test]
    fn test_lines_outside_ports_untouched() {
        let block = "    environment:\n      - \"3000:3000\"\n    ports:\n      - \"3000:3000\"\n    expose:\n      - \"3000:3000\"\n";
        let rewritten = rewrite_published_ports(block, &mapping(&[(3000, 45000)]));
        assert_eq!(rewritten.matches("45000").count(), 1);
        assert!(rewritten.contains("    ports:\n      - \"45000:3000\"\n    expose:\n      - \"3000:3000\"\n"));
    }

    #[test]
    fn test_published_ports_collected() {
        let compose = "\
services:
  web:
    ports:
      - \"3000:3000\"
      - 127.0.0.1:4000:80/tcp
      - \"9229\"
  db:
    ports:
      - target: 5432
        published: 15432
volumes:
  data: {}
";
        assert_eq!(published_ports(compose).unwrap(), vec![3000, 4000, 15432]);
    }

    #[test]
    fn test_published_ports_without_services() {
        assert!(published_ports("volumes:\n  data: {}\n").unwrap().is_empty());
        assert!(published_ports("services: [").is_err());
    }
}
