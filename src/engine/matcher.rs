use super::traits::DomainMatcher;
use rustc_hash::FxHashSet;

/// In-memory matcher over a deduplicated set of normalized domain rules.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HashedMatcher {
    domains: FxHashSet<Box<str>>,
}

impl HashedMatcher {
    pub fn new(domains: FxHashSet<Box<str>>) -> Self {
        Self { domains }
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.domains.contains(domain)
    }

    /// Rules in sorted order.
    pub fn sorted(&self) -> Vec<String> {
        let mut list: Vec<String> = self.domains.iter().map(|d| d.to_string()).collect();
        list.sort();
        list
    }
}

impl DomainMatcher for HashedMatcher {
    fn check<'a>(&'a self, host: &str) -> Option<&'a str> {
        // Walk label boundaries: "a.b.example.com" -> "b.example.com" -> "example.com" -> "com".
        // Only whole labels are ever stripped, so "notexample.com" never reaches "example.com".
        let mut part = host;
        loop {
            if let Some(rule) = self.domains.get(part) {
                return Some(rule.as_ref());
            }

            match part.find('.') {
                Some(idx) => {
                    part = &part[idx + 1..];
                    if part.is_empty() {
                        break;
                    }
                }
                None => break,
            }
        }

        None
    }
}

/// The raw rule predicate: `host == rule` or `host` ends with `"." + rule`.
pub fn host_matches(host: &str, rule: &str) -> bool {
    host == rule
        || (host.len() > rule.len()
            && host.ends_with(rule)
            && host.as_bytes()[host.len() - rule.len() - 1] == b'.')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(domains: &[&str]) -> HashedMatcher {
        HashedMatcher::new(domains.iter().map(|d| Box::from(*d)).collect())
    }

    #[test]
    fn test_matcher_logic() {
        let matcher = matcher(&["example.com", "sub.ad.com"]);

        // Exact match
        assert_eq!(matcher.check("example.com"), Some("example.com"));

        // Suffix match (subdomain of blocked)
        assert_eq!(matcher.check("sub.example.com"), Some("example.com"));
        assert_eq!(matcher.check("a.b.example.com"), Some("example.com"));

        assert_eq!(matcher.check("sub.ad.com"), Some("sub.ad.com"));
        assert_eq!(matcher.check("deep.sub.ad.com"), Some("sub.ad.com"));

        // Parent of a rule is not blocked
        assert_eq!(matcher.check("ad.com"), None);

        // Unblocked
        assert_eq!(matcher.check("google.com"), None);
    }

    #[test]
    fn test_label_boundary() {
        let matcher = matcher(&["example.com"]);
        assert_eq!(matcher.check("notexample.com"), None);
        assert_eq!(matcher.check("www.notexample.com"), None);
        assert_eq!(matcher.check("example.com.evil.net"), None);
    }

    #[test]
    fn test_matcher_agrees_with_predicate() {
        let rules = ["example.com", "ads.net", "a.b.c", "com.example"];
        let hosts = [
            "example.com",
            "www.example.com",
            "notexample.com",
            "xads.net",
            "ads.net",
            "x.a.b.c",
            "b.c",
            "example.com.example",
            "com",
            ".example.com",
        ];
        let m = matcher(&rules);
        for host in hosts {
            let expected = rules.iter().any(|r| host_matches(host, r));
            assert_eq!(m.check(host).is_some(), expected, "host {host}");
        }
    }

    #[test]
    fn test_predicate() {
        assert!(host_matches("example.com", "example.com"));
        assert!(host_matches("sub.example.com", "example.com"));
        assert!(!host_matches("notexample.com", "example.com"));
        assert!(!host_matches("com", "example.com"));
    }

    #[test]
    fn test_empty_matcher_blocks_nothing() {
        let m = HashedMatcher::default();
        assert!(m.is_empty());
        assert_eq!(m.check("example.com"), None);
    }
}
