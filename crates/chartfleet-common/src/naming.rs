//! Release name derivation for per-cluster components
//!
//! Names are `<prefix>-<cluster-id>` with the cluster ID lower-cased and
//! reduced to DNS-label characters. Over-long names fall back to the last
//! segment of the cluster ID (`BCS-K8S-40021` contributes `40021`), then to
//! truncation. The fallback is deterministic but not collision-checked.

use crate::DEFAULT_RELEASE_NAME_MAX_LEN;

/// Derives release names bounded to `max_len` characters
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReleaseNamer {
    max_len: usize,
}

impl Default for ReleaseNamer {
    fn default() -> Self {
        Self {
            max_len: DEFAULT_RELEASE_NAME_MAX_LEN,
        }
    }
}

impl ReleaseNamer {
    /// A namer with a custom length bound
    pub fn with_max_len(max_len: usize) -> Self {
        Self { max_len }
    }

    /// The length bound
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Release name for `prefix` on `cluster_id`
    pub fn name(&self, prefix: &str, cluster_id: &str) -> String {
        let prefix = sanitize(prefix);
        let cluster = sanitize(cluster_id);

        let full = join(&prefix, &cluster);
        if full.len() <= self.max_len {
            return full;
        }

        let token = cluster
            .rsplit('-')
            .find(|segment| !segment.is_empty())
            .unwrap_or_default();
        let short = join(&prefix, token);
        if short.len() <= self.max_len {
            return short;
        }

        truncate(&short, self.max_len)
    }
}

/// Release name with the default bound
pub fn release_name(prefix: &str, cluster_id: &str) -> String {
    ReleaseNamer::default().name(prefix, cluster_id)
}

fn sanitize(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

fn join(prefix: &str, token: &str) -> String {
    match (prefix.is_empty(), token.is_empty()) {
        (true, _) => token.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{}-{}", prefix, token),
    }
}

// Input is ASCII after sanitize, so byte slicing is char-safe
fn truncate(name: &str, max_len: usize) -> String {
    let cut = &name[..name.len().min(max_len)];
    cut.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_cases_cluster_id() {
        assert_eq!(
            release_name("bcs-clusternet-agent", "BCS-K8S-99999"),
            "bcs-clusternet-agent-bcs-k8s-99999"
        );
    }

    #[test]
    fn same_inputs_give_same_name() {
        let namer = ReleaseNamer::default();
        let a = namer.name("bcs-clusternet-estimator-agent", "BCS-K8S-40021");
        let b = namer.name("bcs-clusternet-estimator-agent", "BCS-K8S-40021");
        assert_eq!(a, b);
    }

    #[test]
    fn long_names_fall_back_to_last_cluster_segment() {
        // 40-char prefix + full id is 54 characters
        let prefix = "bcs-clusternet-estimator-agent-long-name";
        let name = release_name(prefix, "BCS-K8S-40021");
        assert_eq!(name, format!("{}-40021", prefix));
        assert!(name.len() <= DEFAULT_RELEASE_NAME_MAX_LEN);
    }

    #[test]
    fn very_long_prefix_is_truncated_without_trailing_dash() {
        let namer = ReleaseNamer::with_max_len(12);
        let name = namer.name("abcdefghij-k", "BCS-K8S-1");
        assert!(name.len() <= 12);
        assert!(!name.ends_with('-'));
        assert_eq!(name, "abcdefghij-k");
    }

    #[test]
    fn invalid_characters_become_dashes() {
        assert_eq!(release_name("agent", "Cluster_01.prod"), "agent-cluster-01-prod");
    }

    #[test]
    fn bound_holds_for_many_inputs() {
        let namer = ReleaseNamer::default();
        let (x47, y80, z64) = ("x".repeat(47), "y".repeat(80), "Z".repeat(64));
        let prefixes = ["a", "bcs-clusternet-agent", x47.as_str(), y80.as_str()];
        let clusters = ["BCS-K8S-1", "BCS-K8S-99999", z64.as_str(), "", "---"];
        for prefix in prefixes {
            for cluster in clusters {
                let name = namer.name(prefix, cluster);
                assert!(
                    name.len() <= namer.max_len(),
                    "{prefix}/{cluster} -> {name}"
                );
                assert!(name
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
                assert_eq!(name, namer.name(prefix, cluster));
            }
        }
    }
}
