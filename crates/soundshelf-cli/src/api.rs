//! Catalog REST client.

use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use soundshelf_player::PlayRecorder;
use soundshelf_types::{
    AccessToken, AuthTokens, Genre, Mood, Page, TrackDetail, TrackSummary, User,
};
use ureq::Body;
use ureq::http::Response;

use crate::auth::AuthApi;
use crate::query::TrackQuery;

/// Non-success HTTP status from the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiError {
    pub status: u16,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "API error: {}", self.status)
    }
}

impl std::error::Error for ApiError {}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    username: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

/// Client for the catalog API rooted at `base_url` (e.g. `http://localhost:8000/api`).
#[derive(Clone)]
pub struct CatalogClient {
    base_url: String,
    agent: ureq::Agent,
}

impl CatalogClient {
    pub fn new(base_url: &str) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_connect(Some(Duration::from_secs(10)))
            .timeout_recv_response(Some(Duration::from_secs(30)))
            .build()
            .into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str, bearer: Option<&str>) -> Result<T> {
        let mut req = self.agent.get(&self.url(path));
        if let Some(token) = bearer {
            req = req.header("Authorization", &format!("Bearer {token}"));
        }
        let resp = req.call().with_context(|| format!("request {path}"))?;
        read_json(check_status(resp, path)?, path)
    }

    fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let resp = self
            .agent
            .post(&self.url(path))
            .send_json(body)
            .with_context(|| format!("request {path}"))?;
        read_json(check_status(resp, path)?, path)
    }

    pub fn tracks(&self, query: &TrackQuery) -> Result<Page<TrackSummary>> {
        self.get_json(&format!("/tracks/{}", query.to_query_string()), None)
    }

    pub fn track(&self, id: &str) -> Result<TrackDetail> {
        self.get_json(&track_path(id, ""), None)
    }

    pub fn similar(&self, id: &str) -> Result<Vec<TrackSummary>> {
        self.get_json(&track_path(id, "similar/"), None)
    }

    pub fn genres(&self) -> Result<Vec<Genre>> {
        self.get_json("/tracks/genres/", None)
    }

    pub fn moods(&self) -> Result<Vec<Mood>> {
        self.get_json("/tracks/moods/", None)
    }

    pub fn featured(&self) -> Result<Vec<TrackSummary>> {
        self.get_json("/tracks/featured/", None)
    }

    pub fn popular(&self) -> Result<Vec<TrackSummary>> {
        self.get_json("/tracks/popular/", None)
    }

    /// Bump the track's play counter.
    pub fn record_play(&self, id: &str) -> Result<()> {
        let path = track_path(id, "play/");
        let resp = self
            .agent
            .post(&self.url(&path))
            .send_empty()
            .with_context(|| format!("request {path}"))?;
        check_status(resp, &path)?;
        Ok(())
    }

    /// Download the audio file into `dest` (a directory or file path; default: the
    /// current directory). Returns the written path.
    pub fn download(&self, id: &str, dest: Option<&Path>) -> Result<PathBuf> {
        let path = track_path(id, "download/");
        let resp = self
            .agent
            .get(&self.url(&path))
            .call()
            .with_context(|| format!("request {path}"))?;
        let resp = check_status(resp, &path)?;

        let file_name = resp
            .headers()
            .get("Content-Disposition")
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition)
            .unwrap_or_else(|| format!("{id}.mp3"));
        let target = match dest {
            Some(dest) if dest.is_dir() => dest.join(&file_name),
            Some(dest) => dest.to_path_buf(),
            None => PathBuf::from(&file_name),
        };

        let mut file =
            File::create(&target).with_context(|| format!("create {}", target.display()))?;
        let mut body = resp.into_body().into_reader();
        let bytes = match io::copy(&mut body, &mut file) {
            Ok(bytes) => bytes,
            Err(e) => {
                drop(file);
                if let Err(rm) = std::fs::remove_file(&target) {
                    tracing::warn!(path = %target.display(), "remove partial download: {rm}");
                }
                return Err(e).with_context(|| format!("write {}", target.display()));
            }
        };
        tracing::info!(track_id = %id, bytes, path = %target.display(), "download complete");
        Ok(target)
    }
}

impl AuthApi for CatalogClient {
    fn login(&self, username: &str, password: &str) -> Result<AuthTokens> {
        self.post_json("/auth/login/", &LoginRequest { username, password })
    }

    fn register(&self, username: &str, email: &str, password: &str) -> Result<AuthTokens> {
        self.post_json(
            "/auth/register/",
            &RegisterRequest {
                username,
                email,
                password,
            },
        )
    }

    fn refresh(&self, refresh: &str) -> Result<AccessToken> {
        self.post_json("/auth/refresh/", &RefreshRequest { refresh })
    }

    fn me(&self, access: &str) -> Result<User> {
        self.get_json("/auth/me/", Some(access))
    }
}

impl PlayRecorder for CatalogClient {
    fn record_play(&self, track_id: &str) -> Result<()> {
        CatalogClient::record_play(self, track_id)
    }
}

fn track_path(id: &str, action: &str) -> String {
    format!("/tracks/{}/{action}", urlencoding::encode(id))
}

fn check_status(resp: Response<Body>, label: &str) -> Result<Response<Body>> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    tracing::debug!(status = status.as_u16(), path = label, "request rejected");
    Err(ApiError {
        status: status.as_u16(),
    }
    .into())
}

fn read_json<T: DeserializeOwned>(mut resp: Response<Body>, label: &str) -> Result<T> {
    let body = resp
        .body_mut()
        .read_to_string()
        .with_context(|| format!("read {label} response body"))?;
    serde_json::from_str(&body).with_context(|| format!("decode {label} response"))
}

/// `filename` from a `Content-Disposition` header, reduced to its last path component.
fn filename_from_disposition(header: &str) -> Option<String> {
    let raw = header
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))?
        .trim_matches('"');
    let name = raw.rsplit(['/', '\\']).next()?.trim();
    (!name.is_empty() && name != "." && name != "..").then(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Answer one HTTP request; the join handle yields the raw request.
    fn serve_once(status: &'static str, body: &'static str) -> (String, thread::JoinHandle<String>) {
        serve_raw(format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        ))
    }

    /// Like [`serve_once`] but replies with `response` verbatim.
    fn serve_raw(response: String) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}/api", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut request = String::new();
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if let Some(v) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                    content_length = v.trim().parse().unwrap();
                }
                request.push_str(&line);
                if line == "\r\n" || line.is_empty() {
                    break;
                }
            }
            let mut payload = vec![0u8; content_length];
            reader.read_exact(&mut payload).unwrap();
            request.push_str(&String::from_utf8(payload).unwrap());

            let mut stream = stream;
            stream.write_all(response.as_bytes()).unwrap();
            request
        });
        (base, handle)
    }

    #[test]
    fn genres_decode_from_json() {
        let (base, server) = serve_once(
            "200 OK",
            r#"[{"id":1,"name":"Ambient","slug":"ambient"}]"#,
        );
        let client = CatalogClient::new(&base);
        let genres = client.genres().unwrap();
        let request = server.join().unwrap();

        assert!(request.starts_with("GET /api/tracks/genres/ HTTP/1.1"));
        assert_eq!(genres.len(), 1);
        assert_eq!(genres[0].slug, "ambient");
        assert_eq!(genres[0].track_count, 0);
    }

    #[test]
    fn error_status_becomes_api_error() {
        let (base, server) = serve_once("404 Not Found", "");
        let client = CatalogClient::new(&base);
        let err = client.track("nope").unwrap_err();
        server.join().unwrap();

        assert_eq!(err.downcast_ref::<ApiError>(), Some(&ApiError { status: 404 }));
        assert_eq!(err.to_string(), "API error: 404");
    }

    #[test]
    fn me_sends_bearer_token() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"id":3,"username":"ada","email":"a@x.io"}"#,
        );
        let client = CatalogClient::new(&base);
        let user = client.me("tok123").unwrap();
        let request = server.join().unwrap();

        assert_eq!(user.username, "ada");
        assert!(request.starts_with("GET /api/auth/me/ HTTP/1.1"));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer tok123"));
    }

    #[test]
    fn login_posts_credentials_as_json() {
        let (base, server) = serve_once("200 OK", r#"{"access":"a","refresh":"r"}"#);
        let client = CatalogClient::new(&base);
        let tokens = client.login("ada", "pw").unwrap();
        let request = server.join().unwrap();

        assert_eq!(tokens.access, "a");
        assert_eq!(tokens.refresh, "r");
        assert!(request.starts_with("POST /api/auth/login/ HTTP/1.1"));
        let (_, body) = request.split_once("\r\n\r\n").unwrap();
        let sent: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(sent["username"], "ada");
        assert_eq!(sent["password"], "pw");
    }

    #[test]
    fn record_play_posts_to_play_endpoint() {
        let (base, server) = serve_once("200 OK", r#"{"status":"ok"}"#);
        let client = CatalogClient::new(&format!("{base}/"));
        client.record_play("t 1").unwrap();
        let request = server.join().unwrap();
        assert!(request.starts_with("POST /api/tracks/t%201/play/ HTTP/1.1"));
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("soundshelf-api-{}-{name}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn audio_response(disposition: Option<&str>, body: &str) -> String {
        let disposition = disposition
            .map(|d| format!("Content-Disposition: {d}\r\n"))
            .unwrap_or_default();
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: audio/mpeg\r\n{disposition}Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    #[test]
    fn download_into_directory_uses_served_filename() {
        let dir = temp_dir("named");
        let (base, server) = serve_raw(audio_response(
            Some(r#"attachment; filename="Night_Bus.mp3""#),
            "ID3 audio",
        ));
        let client = CatalogClient::new(&base);

        let path = client.download("t1", Some(&dir)).unwrap();
        let request = server.join().unwrap();

        assert!(request.starts_with("GET /api/tracks/t1/download/ HTTP/1.1"));
        assert_eq!(path, dir.join("Night_Bus.mp3"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "ID3 audio");
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn download_falls_back_to_id_name() {
        let dir = temp_dir("fallback");
        let (base, server) = serve_raw(audio_response(None, "abc"));
        let client = CatalogClient::new(&base);

        let path = client.download("t2", Some(&dir)).unwrap();
        server.join().unwrap();

        assert_eq!(path, dir.join("t2.mp3"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "abc");
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn download_to_file_path_ignores_served_filename() {
        let dir = temp_dir("file");
        let target = dir.join("mine.mp3");
        let (base, server) = serve_raw(audio_response(
            Some(r#"attachment; filename="Night_Bus.mp3""#),
            "xyz",
        ));
        let client = CatalogClient::new(&base);

        let path = client.download("t3", Some(&target)).unwrap();
        server.join().unwrap();

        assert_eq!(path, target);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "xyz");
        assert!(!dir.join("Night_Bus.mp3").exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn truncated_download_leaves_no_file() {
        let dir = temp_dir("truncated");
        let response = "HTTP/1.1 200 OK\r\nContent-Type: audio/mpeg\r\nContent-Length: 4096\r\nConnection: close\r\n\r\nshort".to_string();
        let (base, server) = serve_raw(response);
        let client = CatalogClient::new(&base);

        let result = client.download("t4", Some(&dir));
        server.join().unwrap();

        assert!(result.is_err());
        assert!(!dir.join("t4.mp3").exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn track_path_encodes_id() {
        assert_eq!(track_path("abc", ""), "/tracks/abc/");
        assert_eq!(track_path("a/b", "similar/"), "/tracks/a%2Fb/similar/");
    }

    #[test]
    fn filename_from_disposition_strips_paths() {
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="Morning_Drive.mp3""#),
            Some("Morning_Drive.mp3".to_string())
        );
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="../../etc/passwd""#),
            Some("passwd".to_string())
        );
        assert_eq!(filename_from_disposition("attachment"), None);
        assert_eq!(filename_from_disposition(r#"attachment; filename="..""#), None);
    }
}
