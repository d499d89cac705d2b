/// Declared kind of a media payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

/// Raw media bytes plus their declared kind.
///
/// Immutable; owned by the caller for the duration of one pipeline
/// invocation.
#[derive(Clone, Debug)]
pub struct MediaBlob {
    bytes: Vec<u8>,
    kind: MediaKind,
}

impl MediaBlob {
    pub fn new(bytes: Vec<u8>, kind: MediaKind) -> Self {
        Self { bytes, kind }
    }

    pub fn image(bytes: Vec<u8>) -> Self {
        Self::new(bytes, MediaKind::Image)
    }

    pub fn video(bytes: Vec<u8>) -> Self {
        Self::new(bytes, MediaKind::Video)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_set_kind() {
        assert_eq!(MediaBlob::image(vec![1]).kind(), MediaKind::Image);
        assert_eq!(MediaBlob::video(vec![1]).kind(), MediaKind::Video);
    }

    #[test]
    fn test_bytes_are_preserved() {
        let blob = MediaBlob::video(vec![9, 8, 7]);
        assert_eq!(blob.bytes(), &[9, 8, 7]);
    }
}
