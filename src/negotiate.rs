//! Header value negotiation.
//!
//! Intersects a client preference list (`Accept: text/html,
//! application/json;q=0.5`) with a server capability list, honoring
//! q-weights on both sides and `*`/`type/*` wildcards.

/// One alternative out of a comma-separated list.
#[derive(Debug)]
struct Alternative {
    value: String,
    q: f32,
}

fn parse_list(list: &str) -> Vec<Alternative> {
    list.split(',')
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(|item| {
            let mut value = Vec::new();
            let mut q = 1.0;

            for part in item.split(';') {
                let part = part.trim();
                if let Some(weight) = part.strip_prefix("q=") {
                    q = weight.parse().unwrap_or(0.0);
                } else {
                    value.push(part);
                }
            }

            Alternative {
                value: value.join(";"),
                q,
            }
        })
        .collect()
}

/// Whether two alternatives are compatible, honoring wildcards.
fn matches(a: &str, b: &str) -> bool {
    if a == "*" || b == "*" || a.eq_ignore_ascii_case(b) {
        return true;
    }

    // type/subtype wildcards, e.g. "text/*" vs "text/html".
    match (a.split_once('/'), b.split_once('/')) {
        (Some((at, asub)), Some((bt, bsub))) => {
            at.eq_ignore_ascii_case(bt) && (asub == "*" || bsub == "*")
        }
        _ => false,
    }
}

/// Of two compatible alternatives, the one without wildcards.
fn more_specific<'a>(a: &'a str, b: &'a str) -> &'a str {
    if a.contains('*') {
        b
    } else {
        a
    }
}

/// Negotiate a value from a client preference list and a server
/// capability list.
///
/// An absent (empty) client list accepts anything, yielding the server's
/// most preferred alternative. Returns an empty string when nothing
/// acceptable remains, which callers treat as failed negotiation.
pub fn negotiate(client: &str, server: &str) -> String {
    let theirs = if client.trim().is_empty() {
        vec![Alternative {
            value: "*".to_string(),
            q: 1.0,
        }]
    } else {
        parse_list(client)
    };
    let ours = parse_list(server);

    let mut best: Option<(f32, String)> = None;

    for o in &ours {
        for t in &theirs {
            if !matches(&t.value, &o.value) {
                continue;
            }

            let q = t.q * o.q;
            let better = match &best {
                Some((bq, _)) => q > *bq,
                None => q > 0.0,
            };
            if better {
                best = Some((q, more_specific(&o.value, &t.value).to_string()));
            }
        }
    }

    best.map(|(_, v)| v).unwrap_or_default()
}
