// ── Rule payloads ──
//
// A payload is everything on a filter line after `<table> filter <n>`. The
// engine never looks inside; it only renders and parses through
// `RulePayload`.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

use super::table::FilterTable;

/// Failure to read a filter line back into a payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot parse filter arguments `{args}`: {reason}")]
pub struct RuleParseError {
    pub args: String,
    pub reason: String,
}

impl RuleParseError {
    fn new(args: &str, reason: impl Into<String>) -> Self {
        Self {
            args: args.to_owned(),
            reason: reason.into(),
        }
    }
}

/// A resource-family rule record that can be written to a filter table.
pub trait RulePayload:
    Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Whether rules of this family may be written to `table`.
    fn supports(table: FilterTable) -> bool;

    /// Render the arguments that follow `<table> filter <n>`.
    fn to_device_args(&self) -> String;

    /// Parse the arguments that follow `<table> filter <n>` in `show config`.
    fn from_device_args(args: &str) -> Result<Self, RuleParseError>;

    /// Reject payloads the router would refuse.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Filter action keyword.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum FilterAction {
    Pass,
    PassLog,
    PassNolog,
    Reject,
    RejectLog,
    RejectNolog,
    Restrict,
    RestrictLog,
}

impl FilterAction {
    /// `restrict` actions exist only for IP filters.
    pub const fn is_restrict(self) -> bool {
        matches!(self, Self::Restrict | Self::RestrictLog)
    }
}

const ANY: &str = "*";

fn any() -> String {
    ANY.to_owned()
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool {
    !*value
}

// ── IPv4 / IPv6 ─────────────────────────────────────────────────────

const IP_PROTOCOLS: &[&str] = &[
    "tcp", "udp", "icmp", "icmp6", "ip", "gre", "esp", "ah", "tcpfin", "tcprst", "tcpsyn", "*",
];

/// Static IP filter rule, shared by the IPv4 and IPv6 tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpRule {
    pub action: FilterAction,
    #[serde(default = "any")]
    pub source: String,
    #[serde(default = "any")]
    pub destination: String,
    #[serde(default = "any")]
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_port: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub established: bool,
}

impl IpRule {
    pub fn new(action: FilterAction, protocol: impl Into<String>) -> Self {
        Self {
            action,
            source: any(),
            destination: any(),
            protocol: protocol.into(),
            source_port: None,
            destination_port: None,
            established: false,
        }
    }

    fn is_tcp(&self) -> bool {
        self.protocol.eq_ignore_ascii_case("tcp")
    }
}

impl RulePayload for IpRule {
    fn supports(table: FilterTable) -> bool {
        matches!(table, FilterTable::Ip | FilterTable::Ipv6)
    }

    fn to_device_args(&self) -> String {
        let mut parts = vec![
            self.action.to_string(),
            self.source.clone(),
            self.destination.clone(),
            self.protocol.clone(),
        ];
        match (&self.source_port, &self.destination_port) {
            (Some(sport), Some(dport)) => {
                parts.push(sport.clone());
                parts.push(dport.clone());
            }
            (Some(sport), None) => parts.push(sport.clone()),
            // A destination port needs a source-port placeholder.
            (None, Some(dport)) => {
                parts.push(any());
                parts.push(dport.clone());
            }
            (None, None) => {}
        }
        if self.established && self.is_tcp() {
            parts.push("established".to_owned());
        }
        parts.join(" ")
    }

    fn from_device_args(args: &str) -> Result<Self, RuleParseError> {
        let tokens: Vec<&str> = args.split_whitespace().collect();
        let [action, source, destination, protocol, rest @ ..] = tokens.as_slice() else {
            return Err(RuleParseError::new(
                args,
                "expected `action source destination protocol`",
            ));
        };
        let action = action
            .parse::<FilterAction>()
            .map_err(|_| RuleParseError::new(args, format!("unknown action `{action}`")))?;

        let established = rest.contains(&"established");
        let ports: Vec<&str> = rest
            .iter()
            .copied()
            .filter(|t| *t != "established")
            .collect();
        if ports.len() > 2 {
            return Err(RuleParseError::new(args, "too many port arguments"));
        }
        let destination_port = ports.get(1).map(|p| (*p).to_owned());
        let source_port = ports
            .first()
            .filter(|p| !(**p == ANY && destination_port.is_some()))
            .map(|p| (*p).to_owned());

        Ok(Self {
            action,
            source: (*source).to_owned(),
            destination: (*destination).to_owned(),
            protocol: (*protocol).to_owned(),
            source_port,
            destination_port,
            established,
        })
    }

    fn validate(&self) -> Result<(), String> {
        let protocol = self.protocol.to_lowercase();
        if !IP_PROTOCOLS.contains(&protocol.as_str()) && protocol.parse::<u8>().is_err() {
            return Err(format!("unsupported protocol `{}`", self.protocol));
        }
        if self.established && !self.is_tcp() {
            return Err("`established` is only valid with protocol tcp".into());
        }
        for value in [&self.source, &self.destination] {
            if value.is_empty() || value.contains(char::is_whitespace) {
                return Err(format!("invalid address `{value}`"));
            }
        }
        Ok(())
    }
}

// ── Ethernet ────────────────────────────────────────────────────────

/// MAC-based Ethernet filter rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacRule {
    pub action: FilterAction,
    #[serde(default = "any")]
    pub source_mac: String,
    #[serde(default = "any")]
    pub destination_mac: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ether_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan_id: Option<u16>,
}

impl MacRule {
    pub fn new(action: FilterAction) -> Self {
        Self {
            action,
            source_mac: any(),
            destination_mac: any(),
            ether_type: None,
            vlan_id: None,
        }
    }
}

fn is_mac(value: &str) -> bool {
    if value == ANY {
        return true;
    }
    let octets: Vec<&str> = value.split(':').collect();
    octets.len() == 6
        && octets
            .iter()
            .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()))
}

fn is_ether_type(value: &str) -> bool {
    value == ANY
        || value
            .strip_prefix("0x")
            .is_some_and(|hex| hex.len() == 4 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

impl RulePayload for MacRule {
    fn supports(table: FilterTable) -> bool {
        table == FilterTable::Ethernet
    }

    fn to_device_args(&self) -> String {
        let mut parts = vec![
            self.action.to_string(),
            self.source_mac.clone(),
            self.destination_mac.clone(),
        ];
        if let Some(ether_type) = &self.ether_type {
            parts.push(ether_type.clone());
        }
        if let Some(vlan) = self.vlan_id {
            parts.push(format!("vlan {vlan}"));
        }
        parts.join(" ")
    }

    fn from_device_args(args: &str) -> Result<Self, RuleParseError> {
        let tokens: Vec<&str> = args.split_whitespace().collect();
        let [action, source_mac, destination_mac, rest @ ..] = tokens.as_slice() else {
            return Err(RuleParseError::new(
                args,
                "expected `action source_mac destination_mac`",
            ));
        };
        let action = action
            .parse::<FilterAction>()
            .map_err(|_| RuleParseError::new(args, format!("unknown action `{action}`")))?;

        let mut rule = Self {
            action,
            source_mac: (*source_mac).to_owned(),
            destination_mac: (*destination_mac).to_owned(),
            ether_type: None,
            vlan_id: None,
        };
        let mut rest = rest.iter();
        while let Some(token) = rest.next() {
            if *token == "vlan" {
                let id = rest
                    .next()
                    .and_then(|v| v.parse::<u16>().ok())
                    .ok_or_else(|| RuleParseError::new(args, "`vlan` without a numeric id"))?;
                rule.vlan_id = Some(id);
            } else if is_ether_type(token) {
                rule.ether_type = Some((*token).to_owned());
            } else {
                return Err(RuleParseError::new(
                    args,
                    format!("unexpected token `{token}`"),
                ));
            }
        }
        Ok(rule)
    }

    fn validate(&self) -> Result<(), String> {
        if self.action.is_restrict() {
            return Err(format!(
                "action `{}` is not valid for ethernet filters",
                self.action
            ));
        }
        for mac in [&self.source_mac, &self.destination_mac] {
            if !is_mac(mac) {
                return Err(format!("invalid MAC address `{mac}`"));
            }
        }
        if let Some(ether_type) = &self.ether_type {
            if !is_ether_type(ether_type) {
                return Err(format!("invalid ether type `{ether_type}`"));
            }
        }
        if let Some(vlan) = self.vlan_id {
            if !(1..=4094).contains(&vlan) {
                return Err(format!("VLAN id {vlan} is outside 1..=4094"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ip_rule_renders_port_placeholder() {
        let mut rule = IpRule::new(FilterAction::Pass, "tcp");
        rule.destination = "192.168.1.0/24".into();
        rule.destination_port = Some("443".into());
        rule.established = true;
        assert_eq!(
            rule.to_device_args(),
            "pass * 192.168.1.0/24 tcp * 443 established"
        );
    }

    #[test]
    fn ip_rule_parses_show_config_line() {
        let rule = IpRule::from_device_args("reject 10.0.0.0/8 * udp * 53").unwrap();
        assert_eq!(rule.action, FilterAction::Reject);
        assert_eq!(rule.source, "10.0.0.0/8");
        assert_eq!(rule.source_port, None);
        assert_eq!(rule.destination_port.as_deref(), Some("53"));
        assert!(!rule.established);
    }

    #[test]
    fn ip_rule_reads_back_what_it_writes() {
        let mut rule = IpRule::new(FilterAction::RestrictLog, "tcp");
        rule.source_port = Some("1024-65535".into());
        rule.destination_port = Some("22".into());
        let parsed = IpRule::from_device_args(&rule.to_device_args()).unwrap();
        assert_eq!(parsed, rule);
    }

    #[test]
    fn ip_rule_rejects_established_on_udp() {
        let mut rule = IpRule::new(FilterAction::Pass, "udp");
        rule.established = true;
        assert!(rule.validate().is_err());
    }

    #[test]
    fn ip_rule_rejects_short_lines() {
        assert!(IpRule::from_device_args("pass * *").is_err());
        assert!(IpRule::from_device_args("allow * * tcp").is_err());
    }

    #[test]
    fn mac_rule_round_trip_with_vlan() {
        let mut rule = MacRule::new(FilterAction::RejectNolog);
        rule.source_mac = "00:11:22:33:44:55".into();
        rule.ether_type = Some("0x0806".into());
        rule.vlan_id = Some(10);
        let args = rule.to_device_args();
        assert_eq!(args, "reject-nolog 00:11:22:33:44:55 * 0x0806 vlan 10");
        assert_eq!(MacRule::from_device_args(&args).unwrap(), rule);
    }

    #[test]
    fn mac_rule_validation() {
        let mut rule = MacRule::new(FilterAction::Restrict);
        assert!(rule.validate().is_err());
        rule.action = FilterAction::Pass;
        rule.destination_mac = "not-a-mac".into();
        assert!(rule.validate().is_err());
        rule.destination_mac = "aa:bb:cc:dd:ee:ff".into();
        assert!(rule.validate().is_ok());
    }

    #[test]
    fn payload_families() {
        assert!(IpRule::supports(FilterTable::Ipv6));
        assert!(!IpRule::supports(FilterTable::Ethernet));
        assert!(MacRule::supports(FilterTable::Ethernet));
    }
}
