use crate::error::ControllerError;
use lb_protocol::RequestedPort;
use std::collections::HashSet;

/// Pure port-collision resolver (§4.B).
///
/// Deduplicates `requested` by port number, first occurrence wins, then
/// assigns each remaining record the lowest port `>= its requested port`
/// that is not in `in_use`, growing `in_use` as it goes. Output order
/// matches the deduplicated input order; `name`/`protocol`/`target_port`
/// are carried through unchanged, only `port` may be bumped.
pub fn resolve(
    in_use: &HashSet<u16>,
    requested: &[RequestedPort],
) -> Result<Vec<RequestedPort>, ControllerError> {
    let mut taken = in_use.clone();
    let mut seen_ports = HashSet::new();
    let mut out = Vec::with_capacity(requested.len());

    for record in requested {
        if !seen_ports.insert(record.port) {
            continue;
        }

        let mut port = record.port;
        while taken.contains(&port) {
            port = port
                .checked_add(1)
                .ok_or(ControllerError::PortExhausted {
                    requested: record.port,
                })?;
        }
        taken.insert(port);

        out.push(RequestedPort {
            name: record.name.clone(),
            port,
            protocol: record.protocol,
            target_port: record.target_port,
        });
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lb_protocol::Protocol;

    fn port(p: u16) -> RequestedPort {
        RequestedPort {
            name: None,
            port: p,
            protocol: Protocol::Tcp,
            target_port: p,
        }
    }

    /// **Objective**: resolver scenario S1 from the spec's testable-properties section.
    /// **Scenario**: empty `in_use`, two fresh ports requested.
    /// **Assertion**: both ports pass through unmodified.
    #[test]
    fn s1_fresh_lb_passes_through_unmodified() {
        let in_use = HashSet::new();
        let requested = vec![port(80), port(443)];
        let out = resolve(&in_use, &requested).unwrap();
        assert_eq!(out.iter().map(|p| p.port).collect::<Vec<_>>(), vec![80, 443]);
    }

    /// **Objective**: resolver scenario S2.
    /// **Scenario**: `in_use = {80, 443}`, requested `[80, 5000]`.
    /// **Assertion**: 80 collides and bumps to 81; 5000 is free and passes through.
    #[test]
    fn s2_collision_bumps_to_next_free_port() {
        let in_use: HashSet<u16> = [80, 443].into_iter().collect();
        let requested = vec![port(80), port(5000)];
        let out = resolve(&in_use, &requested).unwrap();
        assert_eq!(out.iter().map(|p| p.port).collect::<Vec<_>>(), vec![81, 5000]);
    }

    #[test]
    fn dedupes_requested_ports_first_wins() {
        let in_use = HashSet::new();
        let mut a = port(80);
        a.name = Some("a".into());
        let mut b = port(80);
        b.name = Some("b".into());
        let out = resolve(&in_use, &[a, b]).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name.as_deref(), Some("a"));
    }

    /// Invariant 3: every output port is >= its input counterpart, and
    /// outputs are pairwise unique.
    #[test]
    fn output_ports_never_decrease_and_are_unique() {
        let in_use: HashSet<u16> = [100].into_iter().collect();
        let requested = vec![port(100), port(100), port(101)];
        let out = resolve(&in_use, &requested).unwrap();
        // second `100` entry is deduped away before bumping is considered
        assert_eq!(out.len(), 2);
        let mut seen = HashSet::new();
        for p in &out {
            assert!(seen.insert(p.port), "duplicate output port {}", p.port);
        }
    }

    #[test]
    fn idempotent_on_stable_in_use() {
        let in_use: HashSet<u16> = [80, 81, 443].into_iter().collect();
        let requested = vec![port(80)];
        let first = resolve(&in_use, &requested).unwrap();
        let second = resolve(&in_use, &requested).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn bumping_past_65535_is_port_exhausted() {
        let in_use: HashSet<u16> = [65535].into_iter().collect();
        let requested = vec![port(65535)];
        let err = resolve(&in_use, &requested).unwrap_err();
        assert!(matches!(err, ControllerError::PortExhausted { requested: 65535 }));
    }
}
