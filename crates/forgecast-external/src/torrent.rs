//! Thin [`TorrentClient`]: authors `.torrent` metainfo with a hand-rolled
//! bencode encoder and SHA-1 piece hashing, and forwards seeding operations
//! to a qBittorrent-Web-API-compatible client (spec section 4.4 — protocol
//! depth is intentionally shallow).

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use forgecast_domain::{PipelineError, PipelineResult};
use forgecast_resilience::ServiceRegistry;
use sha1::{Digest, Sha1};
use tokio::fs;

use crate::http_support::{classify_status, network_error};
use crate::model::{TorrentAuthorRequest, TorrentStatus};
use crate::traits::TorrentClient;

const SERVICE: &str = "torrent_client";

/// Piece-length table (spec section 4.6): the largest bracket whose upper
/// bound the content size falls under wins.
const PIECE_LENGTH_TABLE: &[(u64, u32)] = &[
    (50 * 1024 * 1024, 256 * 1024),
    (150 * 1024 * 1024, 512 * 1024),
    (350 * 1024 * 1024, 1024 * 1024),
    (512 * 1024 * 1024, 2 * 1024 * 1024),
    (1024 * 1024 * 1024, 4 * 1024 * 1024),
    (2 * 1024 * 1024 * 1024, 8 * 1024 * 1024),
];
const MAX_PIECE_LENGTH: u32 = 16 * 1024 * 1024;

fn piece_length_for(size_bytes: u64) -> u32 {
    PIECE_LENGTH_TABLE
        .iter()
        .find(|(bound, _)| size_bytes <= *bound)
        .map_or(MAX_PIECE_LENGTH, |(_, length)| *length)
}

/// Authors torrents locally and drives a qBittorrent-Web-API-compatible
/// seeding client over HTTP.
pub struct LocalTorrentClient {
    http: reqwest::Client,
    webui_base_url: String,
    registry: Arc<ServiceRegistry>,
}

impl LocalTorrentClient {
    /// Construct a client pointed at a qBittorrent WebUI base URL (already
    /// authenticated, e.g. via a `reqwest::Client` built with a cookie jar).
    #[must_use]
    pub const fn new(http: reqwest::Client, webui_base_url: String, registry: Arc<ServiceRegistry>) -> Self {
        Self {
            http,
            webui_base_url,
            registry,
        }
    }
}

#[async_trait]
impl TorrentClient for LocalTorrentClient {
    async fn create_torrent(&self, request: &TorrentAuthorRequest) -> PipelineResult<Vec<u8>> {
        let content = fs::read(&request.root_path).await.map_err(|source| PipelineError::InternalInvariant {
            detail: format!("failed to read '{}' for torrent authoring: {source}", request.root_path),
        })?;

        let piece_length = request.piece_length.unwrap_or_else(|| piece_length_for(content.len() as u64));
        let pieces = hash_pieces(&content, piece_length);
        let name = request.root_path.rsplit('/').next().unwrap_or(&request.root_path).to_string();

        let mut info = BTreeMap::new();
        info.insert("name".to_string(), Bencode::Bytes(name.into_bytes()));
        info.insert("piece length".to_string(), Bencode::Int(i64::from(piece_length)));
        info.insert("pieces".to_string(), Bencode::Bytes(pieces));
        info.insert("length".to_string(), Bencode::Int(i64::try_from(content.len()).unwrap_or(i64::MAX)));
        info.insert("private".to_string(), Bencode::Int(i64::from(request.private)));
        if let Some(source) = &request.source {
            info.insert("source".to_string(), Bencode::Bytes(source.clone().into_bytes()));
        }

        let mut top = BTreeMap::new();
        if let Some(announce) = request.trackers.first() {
            top.insert("announce".to_string(), Bencode::Bytes(announce.clone().into_bytes()));
        }
        if request.trackers.len() > 1 {
            let tiers = request
                .trackers
                .iter()
                .map(|tracker| Bencode::List(vec![Bencode::Bytes(tracker.clone().into_bytes())]))
                .collect();
            top.insert("announce-list".to_string(), Bencode::List(tiers));
        }
        if let Some(comment) = &request.comment {
            top.insert("comment".to_string(), Bencode::Bytes(comment.clone().into_bytes()));
        }
        top.insert("created by".to_string(), Bencode::Bytes(b"forgecast".to_vec()));
        top.insert("info".to_string(), Bencode::Dict(info));

        Ok(Bencode::Dict(top).encode())
    }

    async fn add_torrent(&self, torrent_bytes: &[u8], category: Option<&str>) -> PipelineResult<()> {
        let part = reqwest::multipart::Part::bytes(torrent_bytes.to_vec()).file_name("upload.torrent");
        let mut form = reqwest::multipart::Form::new().part("torrents", part);
        if let Some(category) = category {
            form = form.text("category", category.to_string());
        }

        let breaker = self.registry.breaker(SERVICE);
        breaker.before_call()?;
        let response = self
            .http
            .post(format!("{}/api/v2/torrents/add", self.webui_base_url))
            .multipart(form)
            .send()
            .await;
        let response = match response {
            Ok(response) => response,
            Err(source) => {
                breaker.record_failure();
                return Err(network_error("add_torrent", &source));
            }
        };
        if !response.status().is_success() {
            breaker.record_failure();
            return Err(classify_status(SERVICE, "add_torrent", response.status().as_u16()));
        }
        breaker.record_success();
        Ok(())
    }

    async fn get_status(&self, info_hash: &str) -> PipelineResult<TorrentStatus> {
        let breaker = self.registry.breaker(SERVICE);
        breaker.before_call()?;
        let response = self
            .http
            .get(format!("{}/api/v2/torrents/info", self.webui_base_url))
            .query(&[("hashes", info_hash)])
            .send()
            .await;
        let response = match response {
            Ok(response) => response,
            Err(source) => {
                breaker.record_failure();
                return Err(network_error("get_status", &source));
            }
        };
        if !response.status().is_success() {
            breaker.record_failure();
            return Err(classify_status(SERVICE, "get_status", response.status().as_u16()));
        }
        let entries = response
            .json::<Vec<QbitTorrentInfo>>()
            .await
            .map_err(|source| network_error("get_status", &source))?;
        breaker.record_success();

        entries
            .into_iter()
            .next()
            .map(|entry| TorrentStatus {
                info_hash: info_hash.to_string(),
                seeding: entry.state == "uploading" || entry.state == "stalledUP",
                ratio: Some(entry.ratio),
            })
            .ok_or_else(|| PipelineError::ExternalUnavailable { service: SERVICE })
    }
}

#[derive(serde::Deserialize)]
struct QbitTorrentInfo {
    state: String,
    ratio: f64,
}

fn hash_pieces(content: &[u8], piece_length: u32) -> Vec<u8> {
    let piece_length = usize::try_from(piece_length).unwrap_or(usize::MAX);
    let mut pieces = Vec::with_capacity((content.len() / piece_length.max(1) + 1) * 20);
    for chunk in content.chunks(piece_length.max(1)) {
        let mut hasher = Sha1::new();
        hasher.update(chunk);
        pieces.extend_from_slice(&hasher.finalize());
    }
    pieces
}

/// Minimal bencode value tree, just deep enough to author `.torrent` files.
enum Bencode {
    Bytes(Vec<u8>),
    Int(i64),
    List(Vec<Bencode>),
    Dict(BTreeMap<String, Bencode>),
}

impl Bencode {
    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Self::Bytes(bytes) => {
                out.extend_from_slice(bytes.len().to_string().as_bytes());
                out.push(b':');
                out.extend_from_slice(bytes);
            }
            Self::Int(value) => {
                out.push(b'i');
                out.extend_from_slice(value.to_string().as_bytes());
                out.push(b'e');
            }
            Self::List(items) => {
                out.push(b'l');
                for item in items {
                    item.encode_into(out);
                }
                out.push(b'e');
            }
            Self::Dict(entries) => {
                out.push(b'd');
                // `BTreeMap` iterates in key order, which bencode requires.
                for (key, value) in entries {
                    Self::Bytes(key.clone().into_bytes()).encode_into(out);
                    value.encode_into(out);
                }
                out.push(b'e');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn piece_length_grows_with_content_size() {
        assert_eq!(piece_length_for(10 * 1024 * 1024), 256 * 1024);
        assert_eq!(piece_length_for(700 * 1024 * 1024), 2 * 1024 * 1024);
        assert_eq!(piece_length_for(5 * 1024 * 1024 * 1024), MAX_PIECE_LENGTH);
    }

    #[test]
    fn hash_pieces_produces_twenty_bytes_per_chunk() {
        let content = vec![0u8; 50];
        let pieces = hash_pieces(&content, 20);
        assert_eq!(pieces.len(), 20 * 3);
    }

    #[test]
    fn bencode_dict_keys_are_emitted_in_sorted_order() {
        let mut dict = BTreeMap::new();
        dict.insert("zebra".to_string(), Bencode::Int(1));
        dict.insert("apple".to_string(), Bencode::Int(2));
        let encoded = Bencode::Dict(dict).encode();
        let text = String::from_utf8_lossy(&encoded);
        assert!(text.find("apple").unwrap() < text.find("zebra").unwrap());
    }

    #[test]
    fn bencode_string_roundtrips_length_prefix() {
        let encoded = Bencode::Bytes(b"abc".to_vec()).encode();
        assert_eq!(encoded, b"3:abc");
    }
}
