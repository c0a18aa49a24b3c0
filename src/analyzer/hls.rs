//! HLS source variant
//!
//! Drives the playlist collaborator and feeds each new segment through
//! the media feed. Segments already analyzed in a previous refresh are
//! skipped; between refreshes the source sleeps for the playlist's
//! target duration. An end-list playlist terminates the stream cleanly
//! once the queued segments drain.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use crate::error::ConnectionError;

use super::feed::{MediaFeed, PlaylistFeed, Segment};
use super::{RawUnit, UnitSource};

/// Segment URIs remembered for refresh deduplication
const SEEN_CAPACITY: usize = 64;

/// HLS stream source
pub struct HlsSource<P, F> {
    url: String,
    playlist: P,
    media: F,
    pending: VecDeque<Segment>,
    seen: HashSet<String>,
    seen_order: VecDeque<String>,
    segment_open: bool,
    ended: bool,
    refresh_wait: Duration,
}

impl<P: PlaylistFeed, F: MediaFeed> HlsSource<P, F> {
    /// Create a source for a playlist URL
    pub fn new(url: impl Into<String>, playlist: P, media: F) -> Self {
        Self {
            url: url.into(),
            playlist,
            media,
            pending: VecDeque::new(),
            seen: HashSet::new(),
            seen_order: VecDeque::new(),
            segment_open: false,
            ended: false,
            refresh_wait: Duration::from_secs(1),
        }
    }

    async fn refresh(&mut self) -> Result<(), ConnectionError> {
        let playlist = self.playlist.refresh().await?;

        self.ended = playlist.end_list;
        if let Some(target) = playlist.target_duration {
            self.refresh_wait = target;
        }

        let mut queued = 0;
        for segment in playlist.segments {
            if self.seen.contains(&segment.uri) {
                continue;
            }
            self.mark_seen(segment.uri.clone());
            self.pending.push_back(segment);
            queued += 1;
        }

        tracing::debug!(
            url = %self.url,
            queued,
            ended = self.ended,
            "playlist refreshed"
        );
        Ok(())
    }

    fn mark_seen(&mut self, uri: String) {
        self.seen.insert(uri.clone());
        self.seen_order.push_back(uri);
        while self.seen_order.len() > SEEN_CAPACITY {
            if let Some(old) = self.seen_order.pop_front() {
                self.seen.remove(&old);
            }
        }
    }
}

impl<P: PlaylistFeed, F: MediaFeed> UnitSource for HlsSource<P, F> {
    fn url(&self) -> &str {
        &self.url
    }

    async fn connect(&mut self) -> Result<(), ConnectionError> {
        let path = self.url.split(['?', '#']).next().unwrap_or(&self.url);
        if !path.ends_with(".m3u8") {
            return Err(ConnectionError::UnsupportedUrl(self.url.clone()));
        }
        self.refresh().await
    }

    async fn next_unit(&mut self) -> Result<Option<RawUnit>, ConnectionError> {
        loop {
            if self.segment_open {
                match self.media.next().await? {
                    Some(unit) => return Ok(Some(unit)),
                    None => {
                        self.media.close().await;
                        self.segment_open = false;
                    }
                }
            }

            if let Some(segment) = self.pending.pop_front() {
                tracing::debug!(url = %self.url, segment = %segment.uri, "opening segment");
                self.media.open(&segment.uri).await?;
                self.segment_open = true;
                continue;
            }

            if self.ended {
                tracing::info!(url = %self.url, "playlist ended");
                return Ok(None);
            }

            tokio::time::sleep(self.refresh_wait).await;
            self.refresh().await?;
        }
    }

    async fn close(&mut self) {
        if self.segment_open {
            self.media.close().await;
            self.segment_open = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::feed::testing::{ScriptedMediaFeed, ScriptedPlaylistFeed};
    use super::super::feed::Playlist;
    use super::super::DataUnit;
    use super::*;
    use bytes::Bytes;
    use std::collections::HashMap;

    fn unit(marker: u8) -> RawUnit {
        RawUnit::Data(DataUnit {
            payload: Bytes::copy_from_slice(&[marker]),
            timestamp_ms: None,
        })
    }

    fn marker(unit: &RawUnit) -> u8 {
        match unit {
            RawUnit::Data(d) => d.payload[0],
            _ => panic!("expected data unit"),
        }
    }

    fn segment(uri: &str) -> Segment {
        Segment {
            uri: uri.to_string(),
            duration: Some(2.0),
        }
    }

    fn media_for(segments: Vec<(&str, Vec<RawUnit>)>) -> ScriptedMediaFeed {
        let scripts: HashMap<String, VecDeque<RawUnit>> = segments
            .into_iter()
            .map(|(uri, units)| (uri.to_string(), units.into()))
            .collect();
        ScriptedMediaFeed::for_urls(scripts)
    }

    #[tokio::test]
    async fn test_segments_in_playlist_order() {
        let playlists = ScriptedPlaylistFeed {
            refreshes: vec![Playlist {
                segments: vec![segment("seg1.ts"), segment("seg2.ts")],
                end_list: true,
                target_duration: Some(Duration::from_millis(1)),
            }]
            .into(),
        };
        let media = media_for(vec![
            ("seg1.ts", vec![unit(1), unit(2)]),
            ("seg2.ts", vec![unit(3)]),
        ]);

        let mut source = HlsSource::new("https://cdn/live/index.m3u8", playlists, media);
        source.connect().await.unwrap();

        let mut seen = Vec::new();
        while let Some(u) = source.next_unit().await.unwrap() {
            seen.push(marker(&u));
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_refresh_skips_seen_segments() {
        // Second refresh repeats seg1 (live playlists overlap) and adds
        // seg2; only seg2 may be analyzed again.
        let playlists = ScriptedPlaylistFeed {
            refreshes: vec![
                Playlist {
                    segments: vec![segment("seg1.ts")],
                    end_list: false,
                    target_duration: Some(Duration::from_millis(1)),
                },
                Playlist {
                    segments: vec![segment("seg1.ts"), segment("seg2.ts")],
                    end_list: true,
                    target_duration: Some(Duration::from_millis(1)),
                },
            ]
            .into(),
        };
        let media = media_for(vec![
            ("seg1.ts", vec![unit(1)]),
            ("seg2.ts", vec![unit(2)]),
        ]);

        let mut source = HlsSource::new("https://cdn/live/index.m3u8", playlists, media);
        source.connect().await.unwrap();

        let mut seen = Vec::new();
        while let Some(u) = source.next_unit().await.unwrap() {
            seen.push(marker(&u));
        }
        assert_eq!(seen, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_rejects_non_playlist_url() {
        let playlists = ScriptedPlaylistFeed {
            refreshes: VecDeque::new(),
        };
        let media = media_for(vec![]);
        let mut source = HlsSource::new("https://cdn/live/stream.flv", playlists, media);

        let err = source.connect().await.unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_playlist_fetch_failure_is_transient() {
        let playlists = ScriptedPlaylistFeed {
            refreshes: VecDeque::new(), // refresh() errors immediately
        };
        let media = media_for(vec![]);
        let mut source = HlsSource::new("https://cdn/live/index.m3u8", playlists, media);

        let err = source.connect().await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_empty_ended_playlist() {
        let playlists = ScriptedPlaylistFeed {
            refreshes: vec![Playlist {
                segments: vec![],
                end_list: true,
                target_duration: None,
            }]
            .into(),
        };
        let media = media_for(vec![]);
        let mut source = HlsSource::new("https://cdn/live/index.m3u8", playlists, media);

        source.connect().await.unwrap();
        assert!(source.next_unit().await.unwrap().is_none());
    }

    #[test]
    fn test_seen_set_is_bounded() {
        let playlists = ScriptedPlaylistFeed {
            refreshes: VecDeque::new(),
        };
        let media = media_for(vec![]);
        let mut source = HlsSource::new("https://cdn/live/index.m3u8", playlists, media);

        for i in 0..(SEEN_CAPACITY * 2) {
            source.mark_seen(format!("seg{}.ts", i));
        }
        assert_eq!(source.seen.len(), SEEN_CAPACITY);
        assert_eq!(source.seen_order.len(), SEEN_CAPACITY);
        assert!(!source.seen.contains("seg0.ts"));
        assert!(source.seen.contains(&format!("seg{}.ts", SEEN_CAPACITY * 2 - 1)));
    }
}
