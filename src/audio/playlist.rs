use std::ops::Index;

use crate::engine::AudioSource;

/// Ordered, fixed-length list of prepared sources. Index `i` corresponds to
/// request `i` of the batch it was prepared from.
#[derive(Debug, Default)]
pub struct Playlist {
    items: Vec<AudioSource>,
}

impl Playlist {
    pub fn new(items: Vec<AudioSource>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AudioSource> {
        self.items.iter()
    }

    pub fn available_count(&self) -> usize {
        self.items.iter().filter(|s| s.is_available()).count()
    }
}

impl Index<usize> for Playlist {
    type Output = AudioSource;

    fn index(&self, index: usize) -> &AudioSource {
        &self.items[index]
    }
}

/// Free every locally created clip file in the playlist.
///
/// Safe to call any number of times; externally supplied files are left
/// alone. Returns how many files this call deleted.
pub fn release(playlist: &Playlist) -> usize {
    let freed = playlist
        .iter()
        .filter_map(|source| match source {
            AudioSource::RemoteClip(clip) => Some(clip.release()),
            _ => None,
        })
        .filter(|&deleted| deleted)
        .count();

    if freed > 0 {
        tracing::debug!("Released {} clip file(s)", freed);
    }
    freed
}
