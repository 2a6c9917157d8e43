use lb_protocol::{Protocol, RequestedPort};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A backend-port record as stored: `name#port#protocol#target_port`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRecord {
    pub name: String,
    pub port: u16,
    pub protocol: Protocol,
    pub target_port: u16,
}

impl PortRecord {
    pub fn encode(&self) -> String {
        format!(
            "{}#{}#{}#{}",
            self.name, self.port, self.protocol, self.target_port
        )
    }

    /// Parses a stored record. Returns `None` on any malformed input; the
    /// caller is responsible for removing the offending member from the
    /// store (§4.A: "malformed records are dropped on read *and* removed
    /// from the store as garbage").
    pub fn decode(raw: &str) -> Option<Self> {
        let parts: Vec<&str> = raw.split('#').collect();
        if parts.len() != 4 {
            return None;
        }
        let port: u16 = parts[1].parse().ok()?;
        let target_port: u16 = parts[3].parse().ok()?;
        let protocol = Protocol::from_str(parts[2]).ok()?;
        Some(PortRecord {
            name: parts[0].to_string(),
            port,
            protocol,
            target_port,
        })
    }
}

impl From<&RequestedPort> for PortRecord {
    fn from(p: &RequestedPort) -> Self {
        PortRecord {
            name: p.name_or_port(),
            port: p.port,
            protocol: p.protocol,
            target_port: p.target_port,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_well_formed_record() {
        let r = PortRecord {
            name: "http".into(),
            port: 80,
            protocol: Protocol::Tcp,
            target_port: 8080,
        };
        let encoded = r.encode();
        assert_eq!(encoded, "http#80#TCP#8080");
        assert_eq!(PortRecord::decode(&encoded), Some(r));
    }

    #[test]
    fn rejects_records_with_wrong_field_count() {
        assert_eq!(PortRecord::decode("http#80#TCP"), None);
        assert_eq!(PortRecord::decode("http#80#TCP#8080#extra"), None);
    }

    #[test]
    fn rejects_records_with_non_numeric_ports() {
        assert_eq!(PortRecord::decode("http#notaport#TCP#8080"), None);
    }

    #[test]
    fn rejects_records_with_unknown_protocol() {
        assert_eq!(PortRecord::decode("http#80#SCTP#8080"), None);
    }
}
