use sha2::{Digest, Sha256};
use siftcore::{Fingerprint, NodeSpec, ParamValue};

/// Derive the content fingerprint for a node's effective inputs.
///
/// The canonical byte stream covers, in order: the type identifier, the
/// parameter map sorted by key, and the (input port, upstream fingerprint)
/// pairs sorted by port name. Every value carries a type tag and strings are
/// length-prefixed, so `1`, `1.0` and `"1"` canonicalize differently and no
/// two distinct inputs share an encoding.
///
/// A source node (no bound inputs) fingerprints over type and parameters
/// only, plus the workflow seed when one is set, so changing the seed
/// invalidates every seed-sensitive chain from its roots down.
pub fn fingerprint_node(
    node: &NodeSpec,
    upstream: &[(String, Fingerprint)],
    seed: Option<i64>,
) -> Fingerprint {
    let mut buf = Vec::with_capacity(256);

    buf.extend_from_slice(b"type:");
    write_str(&mut buf, &node.node_type);

    if upstream.is_empty() {
        if let Some(seed) = seed {
            buf.extend_from_slice(b"seed:");
            buf.extend_from_slice(seed.to_string().as_bytes());
            buf.push(b';');
        }
    }

    buf.extend_from_slice(b"params:");
    // BTreeMap iterates in key order already.
    for (key, value) in &node.params {
        write_str(&mut buf, key);
        buf.push(b'=');
        write_value(&mut buf, value);
    }

    let mut ports: Vec<&(String, Fingerprint)> = upstream.iter().collect();
    ports.sort_by(|a, b| a.0.cmp(&b.0));
    buf.extend_from_slice(b"inputs:");
    for (port, fp) in ports {
        write_str(&mut buf, port);
        buf.push(b'=');
        buf.extend_from_slice(fp.as_bytes());
        buf.push(b';');
    }

    digest(&buf)
}

/// Derive the cache key for one output port of a fingerprinted node.
///
/// Cache entries are stored per port so multi-output nodes round-trip
/// without bundling; the node fingerprint itself is what flows downstream.
pub fn port_fingerprint(node_fp: &Fingerprint, port: &str) -> Fingerprint {
    let mut buf = Vec::with_capacity(48);
    buf.extend_from_slice(node_fp.as_bytes());
    buf.extend_from_slice(b"/port:");
    buf.extend_from_slice(port.as_bytes());
    digest(&buf)
}

fn digest(bytes: &[u8]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Fingerprint::from_bytes(hasher.finalize().into())
}

fn write_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(s.len().to_string().as_bytes());
    buf.push(b':');
    buf.extend_from_slice(s.as_bytes());
}

fn write_value(buf: &mut Vec<u8>, value: &ParamValue) {
    match value {
        ParamValue::Null => buf.extend_from_slice(b"n;"),
        ParamValue::Bool(b) => {
            buf.extend_from_slice(if *b { b"b:1;" } else { b"b:0;" });
        }
        ParamValue::Int(n) => {
            buf.extend_from_slice(b"i:");
            buf.extend_from_slice(n.to_string().as_bytes());
            buf.push(b';');
        }
        ParamValue::Float(n) => {
            // Shortest round-trip formatting; bitwise-equal floats encode
            // identically on every platform.
            buf.extend_from_slice(b"f:");
            buf.extend_from_slice(format!("{n}").as_bytes());
            buf.push(b';');
        }
        ParamValue::Str(s) => {
            buf.extend_from_slice(b"s:");
            write_str(buf, s);
            buf.push(b';');
        }
        ParamValue::List(items) => {
            buf.extend_from_slice(b"l:");
            buf.extend_from_slice(items.len().to_string().as_bytes());
            buf.push(b'[');
            for item in items {
                write_value(buf, item);
            }
            buf.extend_from_slice(b"];");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(params: &[(&str, ParamValue)]) -> NodeSpec {
        let mut node = NodeSpec::new("src", "source.range").with_outputs(&["table"]);
        for (key, value) in params {
            node = node.with_param(*key, value.clone());
        }
        node
    }

    #[test]
    fn identical_inputs_identical_fingerprint() {
        let node = source(&[("count", ParamValue::Int(5))]);
        let a = fingerprint_node(&node, &[], None);
        let b = fingerprint_node(&node, &[], None);
        assert_eq!(a, b);
    }

    #[test]
    fn param_change_changes_fingerprint() {
        let a = fingerprint_node(&source(&[("seed", ParamValue::Int(1))]), &[], None);
        let b = fingerprint_node(&source(&[("seed", ParamValue::Int(2))]), &[], None);
        assert_ne!(a, b);
    }

    #[test]
    fn type_tags_distinguish_scalar_kinds() {
        let int = fingerprint_node(&source(&[("v", ParamValue::Int(1))]), &[], None);
        let float = fingerprint_node(&source(&[("v", ParamValue::Float(1.0))]), &[], None);
        let string = fingerprint_node(
            &source(&[("v", ParamValue::Str("1".to_string()))]),
            &[],
            None,
        );
        assert_ne!(int, float);
        assert_ne!(int, string);
        assert_ne!(float, string);
    }

    #[test]
    fn type_identifier_participates() {
        let a = fingerprint_node(&NodeSpec::new("n", "source.range"), &[], None);
        let b = fingerprint_node(&NodeSpec::new("n", "source.random"), &[], None);
        assert_ne!(a, b);
    }

    #[test]
    fn node_id_does_not_participate() {
        let a = fingerprint_node(&NodeSpec::new("left", "source.range"), &[], None);
        let b = fingerprint_node(&NodeSpec::new("right", "source.range"), &[], None);
        assert_eq!(a, b);
    }

    #[test]
    fn upstream_fingerprint_participates() {
        let node = NodeSpec::new("t", "transform.scale").with_inputs(&["table"]);
        let up_a = fingerprint_node(&source(&[("count", ParamValue::Int(1))]), &[], None);
        let up_b = fingerprint_node(&source(&[("count", ParamValue::Int(2))]), &[], None);

        let a = fingerprint_node(&node, &[("table".to_string(), up_a)], None);
        let b = fingerprint_node(&node, &[("table".to_string(), up_b)], None);
        assert_ne!(a, b);
    }

    #[test]
    fn upstream_pair_order_is_canonical() {
        let node = NodeSpec::new("m", "merge").with_inputs(&["left", "right"]);
        let up = fingerprint_node(&source(&[]), &[], None);
        let other = fingerprint_node(&source(&[("x", ParamValue::Int(9))]), &[], None);

        let forward = vec![("left".to_string(), up), ("right".to_string(), other)];
        let reversed = vec![("right".to_string(), other), ("left".to_string(), up)];
        assert_eq!(
            fingerprint_node(&node, &forward, None),
            fingerprint_node(&node, &reversed, None)
        );
    }

    #[test]
    fn seed_only_touches_source_nodes() {
        let src = source(&[]);
        assert_ne!(
            fingerprint_node(&src, &[], None),
            fingerprint_node(&src, &[], Some(42))
        );

        let downstream = NodeSpec::new("t", "transform.scale").with_inputs(&["table"]);
        let up = fingerprint_node(&src, &[], Some(42));
        let pairs = vec![("table".to_string(), up)];
        assert_eq!(
            fingerprint_node(&downstream, &pairs, None),
            fingerprint_node(&downstream, &pairs, Some(42))
        );
    }

    #[test]
    fn list_nesting_is_unambiguous() {
        let nested = source(&[(
            "v",
            ParamValue::List(vec![
                ParamValue::List(vec![ParamValue::Int(1)]),
                ParamValue::Int(2),
            ]),
        )]);
        let flat = source(&[(
            "v",
            ParamValue::List(vec![
                ParamValue::Int(1),
                ParamValue::Int(2),
            ]),
        )]);
        assert_ne!(
            fingerprint_node(&nested, &[], None),
            fingerprint_node(&flat, &[], None)
        );
    }

    #[test]
    fn port_fingerprints_differ_per_port() {
        let fp = fingerprint_node(&source(&[]), &[], None);
        assert_ne!(port_fingerprint(&fp, "table"), port_fingerprint(&fp, "meta"));
        assert_eq!(port_fingerprint(&fp, "table"), port_fingerprint(&fp, "table"));
    }
}
