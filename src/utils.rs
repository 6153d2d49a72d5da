use crate::peer::types::IceServer;
use webrtc::ice_transport::ice_server::RTCIceServer;

const ICE_SCHEMES: [&str; 4] = ["turn:", "turns:", "stun:", "stuns:"];

// Adds a scheme to an ICE server URL that lacks one.
// Bare hosts are treated as relays: other candidate types are discarded anyway.
pub fn add_ice_url_scheme(url: &str) -> String {
    let trimmed = url.trim();
    if ICE_SCHEMES.iter().any(|scheme| trimmed.starts_with(scheme)) {
        trimmed.to_string()
    } else {
        format!("turn:{trimmed}")
    }
}

/// Converts the service-supplied descriptors into the webrtc configuration shape
pub fn to_rtc_ice_servers(servers: &[IceServer]) -> Vec<RTCIceServer> {
    servers
        .iter()
        .map(|server| RTCIceServer {
            urls: server
                .urls
                .to_vec()
                .iter()
                .map(|url| add_ice_url_scheme(url))
                .collect(),
            username: server.username.clone().unwrap_or_default(),
            credential: server.credential.clone().unwrap_or_default(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::types::IceUrls;

    #[test]
    fn keeps_existing_scheme() {
        assert_eq!(add_ice_url_scheme("turns:relay:443"), "turns:relay:443");
        assert_eq!(add_ice_url_scheme("stun:stun.l.google.com:19302"), "stun:stun.l.google.com:19302");
    }

    #[test]
    fn defaults_to_turn() {
        assert_eq!(add_ice_url_scheme(" relay.example:3478 "), "turn:relay.example:3478");
    }

    #[test]
    fn converts_servers_with_credentials() {
        let servers = vec![IceServer {
            urls: IceUrls::Many(vec!["relay:3478".into(), "turn:relay:80".into()]),
            username: Some("user".into()),
            credential: None,
        }];
        let rtc = to_rtc_ice_servers(&servers);
        assert_eq!(rtc.len(), 1);
        assert_eq!(rtc[0].urls, vec!["turn:relay:3478", "turn:relay:80"]);
        assert_eq!(rtc[0].username, "user");
        assert_eq!(rtc[0].credential, "");
    }
}
