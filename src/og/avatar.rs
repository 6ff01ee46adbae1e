use std::net::IpAddr;

use image::imageops::FilterType;
use image::RgbaImage;
use url::{Host, Url};

use crate::fetch::fetch_bytes;

/// Upper bound on a downloaded avatar.
pub const AVATAR_MAX_BYTES: usize = 5 * 1024 * 1024;

/// Downloads and decodes an avatar. Every failure degrades to `None`:
/// the card is then rendered without an avatar.
///
/// Avatar URLs come from the query string, so unless `allow_private` is
/// set only hosts that resolve to public addresses are contacted.
pub async fn fetch_avatar(
    client: &reqwest::Client,
    url: &str,
    allow_private: bool,
) -> Option<RgbaImage> {
    let parsed = match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => parsed,
        _ => {
            log::warn!("Ignoring avatar with unsupported url {url}");
            return None;
        }
    };
    if !allow_private && !is_public_host(&parsed).await {
        log::warn!("Ignoring avatar on a non-public host {url}");
        return None;
    }

    let bytes = match fetch_bytes(client, url, AVATAR_MAX_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("Error fetching avatar {url}: {e}");
            return None;
        }
    };

    match image::load_from_memory(&bytes) {
        Ok(decoded) => Some(decoded.to_rgba8()),
        Err(e) => {
            log::warn!("Error decoding avatar {url}: {e}");
            None
        }
    }
}

async fn is_public_host(url: &Url) -> bool {
    match url.host() {
        Some(Host::Ipv4(ip)) => is_public_ip(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => is_public_ip(IpAddr::V6(ip)),
        Some(Host::Domain(domain)) => {
            let domain = domain.trim_end_matches('.').to_ascii_lowercase();
            if domain == "localhost" || domain.ends_with(".localhost") {
                return false;
            }
            let port = url.port_or_known_default().unwrap_or(443);
            let is_public = match tokio::net::lookup_host((domain.as_str(), port)).await {
                Ok(mut addrs) => addrs.all(|addr| is_public_ip(addr.ip())),
                Err(e) => {
                    log::debug!("Cannot resolve avatar host {domain}: {e}");
                    false
                }
            };
            is_public
        }
        None => false,
    }
}

/// Rejects loopback, private, link-local, shared (CGNAT) and
/// unspecified addresses.
pub(crate) fn is_public_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ip) => {
            let [a, b, ..] = ip.octets();
            !(ip.is_loopback()
                || ip.is_private()
                || ip.is_link_local()
                || ip.is_unspecified()
                || ip.is_broadcast()
                || (a == 100 && (b & 0xc0) == 64))
        }
        IpAddr::V6(ip) => {
            if let Some(v4) = ip.to_ipv4_mapped() {
                return is_public_ip(IpAddr::V4(v4));
            }
            let first = ip.segments()[0];
            !(ip.is_loopback()
                || ip.is_unspecified()
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80)
        }
    }
}

/// Square crop of the avatar at the requested diameter.
pub fn fit(avatar: &RgbaImage, diameter: u32) -> RgbaImage {
    if avatar.width() == diameter && avatar.height() == diameter {
        return avatar.clone();
    }
    image::DynamicImage::ImageRgba8(avatar.clone())
        .resize_to_fill(diameter, diameter, FilterType::Lanczos3)
        .to_rgba8()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use rstest::rstest;
    use std::io::Cursor;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let red = Rgba([200, 10, 10, 255]);
        let image = RgbaImage::from_pixel(width, height, red);
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(image)
            .write_to(&mut out, image::ImageOutputFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn decodes_remote_avatar() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png(4, 2)))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/a.png", server.uri());
        let avatar = fetch_avatar(&client, &url, true).await.unwrap();
        assert_eq!(avatar.dimensions(), (4, 2));
        assert_eq!(fit(&avatar, 8).dimensions(), (8, 8));
    }

    #[tokio::test]
    async fn failures_mean_no_avatar() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"not an image".to_vec()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gone.png"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        for url in [
            format!("{}/broken.png", server.uri()),
            format!("{}/gone.png", server.uri()),
            "data:image/png;base64,AAAA".to_string(),
            "not a url".to_string(),
        ] {
            assert!(fetch_avatar(&client, &url, true).await.is_none(), "{url}");
        }
    }

    #[tokio::test]
    async fn local_hosts_are_not_contacted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png(4, 4)))
            .expect(0)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let port = server.address().port();
        for url in [
            format!("{}/a.png", server.uri()),
            format!("http://localhost:{port}/a.png"),
            format!("http://[::1]:{port}/a.png"),
        ] {
            let avatar = fetch_avatar(&client, &url, false).await;
            assert!(avatar.is_none(), "{url}");
        }
    }

    #[rstest]
    #[case("127.0.0.1", false)]
    #[case("10.1.2.3", false)]
    #[case("172.16.0.9", false)]
    #[case("192.168.1.1", false)]
    #[case("169.254.169.254", false)]
    #[case("100.64.0.1", false)]
    #[case("0.0.0.0", false)]
    #[case("::1", false)]
    #[case("fd00::1", false)]
    #[case("fe80::1", false)]
    #[case("::ffff:127.0.0.1", false)]
    #[case("93.184.216.34", true)]
    #[case("100.128.0.1", true)]
    #[case("2606:4700::1111", true)]
    fn classifies_addresses(#[case] ip: &str, #[case] public: bool) {
        assert_eq!(is_public_ip(ip.parse().unwrap()), public);
    }
}
