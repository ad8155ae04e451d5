/// A named preset of request headers passed to the streaming client for every
/// manifest and segment request of one attach attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionMethod {
    pub id: &'static str,
    pub name: &'static str,
    pub headers: &'static [(&'static str, &'static str)],
}

impl ConnectionMethod {
    pub fn user_agent(&self) -> Option<&'static str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("user-agent"))
            .map(|(_, v)| *v)
    }

    /// Headers other than User-Agent, in table order.
    pub fn extra_headers(&self) -> impl Iterator<Item = &(&'static str, &'static str)> {
        self.headers
            .iter()
            .filter(|(k, _)| !k.eq_ignore_ascii_case("user-agent"))
    }
}

pub const CONNECTION_METHODS: &[ConnectionMethod] = &[
    ConnectionMethod {
        id: "default",
        name: "Default",
        headers: &[],
    },
    ConnectionMethod {
        id: "browser",
        name: "Desktop browser",
        headers: &[
            (
                "User-Agent",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36",
            ),
            ("Accept", "*/*"),
            ("Accept-Language", "en-US,en;q=0.9"),
            ("Origin", "https://www.google.com"),
            ("Referer", "https://www.google.com/"),
        ],
    },
    ConnectionMethod {
        id: "mobile",
        name: "Mobile Safari",
        headers: &[
            (
                "User-Agent",
                "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1",
            ),
            ("Accept", "*/*"),
        ],
    },
    ConnectionMethod {
        id: "vlc",
        name: "VLC",
        headers: &[("User-Agent", "VLC/3.0.16 LibVLC/3.0.16")],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let mut ids: Vec<_> = CONNECTION_METHODS.iter().map(|m| m.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), CONNECTION_METHODS.len());
    }

    #[test]
    fn user_agent_split_from_other_headers() {
        let browser = CONNECTION_METHODS[1];
        assert!(browser.user_agent().unwrap().starts_with("Mozilla/5.0 (Windows"));
        let extra: Vec<_> = browser.extra_headers().map(|(k, _)| *k).collect();
        assert_eq!(extra, vec!["Accept", "Accept-Language", "Origin", "Referer"]);
    }

    #[test]
    fn default_method_sends_nothing() {
        let default = CONNECTION_METHODS[0];
        assert!(default.user_agent().is_none());
        assert_eq!(default.extra_headers().count(), 0);
    }
}
