use crate::VisionError;

/// Number of leading box-geometry channels (cx, cy, w, h).
pub const BOX_CHANNELS: usize = 4;

/// Borrowed view over a `[1, channels, elements]` detector output.
///
/// Layout is channel-major: the value for channel `c` at anchor `a` lives at
/// `a + elements * c`.
#[derive(Debug, Clone, Copy)]
pub struct OutputTensor<'a> {
    data: &'a [f32],
    channels: usize,
    elements: usize,
}

impl<'a> OutputTensor<'a> {
    pub fn new(data: &'a [f32], channels: usize, elements: usize) -> Result<Self, VisionError> {
        if channels <= BOX_CHANNELS {
            return Err(VisionError::TooFewChannels(channels));
        }
        if channels.checked_mul(elements) != Some(data.len()) {
            return Err(VisionError::TensorShape { len: data.len(), channels, elements });
        }
        Ok(Self { data, channels, elements })
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Number of anchors.
    pub fn elements(&self) -> usize {
        self.elements
    }

    pub fn num_classes(&self) -> usize {
        self.channels - BOX_CHANNELS
    }

    #[inline]
    pub fn at(&self, channel: usize, anchor: usize) -> f32 {
        self.data[anchor + self.elements * channel]
    }

    /// `(cx, cy, w, h)` for one anchor.
    pub fn box_at(&self, anchor: usize) -> (f32, f32, f32, f32) {
        (
            self.at(0, anchor),
            self.at(1, anchor),
            self.at(2, anchor),
            self.at(3, anchor),
        )
    }

    /// Highest class score at `anchor` and its class index. The first maximum wins ties.
    pub fn best_class(&self, anchor: usize) -> (usize, f32) {
        let mut best_c = 0usize;
        let mut best_p = f32::NEG_INFINITY;
        for c in 0..self.num_classes() {
            let p = self.at(BOX_CHANNELS + c, anchor);
            if p > best_p {
                best_p = p;
                best_c = c;
            }
        }
        (best_c, best_p)
    }
}

/// Little-endian `f32` dump, as written by most tensor debugging tools.
pub fn f32_from_le_bytes(bytes: &[u8]) -> anyhow::Result<Vec<f32>> {
    anyhow::ensure!(
        bytes.len() % 4 == 0,
        "tensor dump length {} is not a multiple of 4",
        bytes.len()
    );
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_length() {
        let data = vec![0.0; 11];
        assert!(matches!(
            OutputTensor::new(&data, 6, 2),
            Err(VisionError::TensorShape { len: 11, channels: 6, elements: 2 })
        ));
    }

    #[test]
    fn rejects_box_only_tensor() {
        let data = vec![0.0; 8];
        assert!(matches!(OutputTensor::new(&data, 4, 2), Err(VisionError::TooFewChannels(4))));
    }

    #[test]
    fn channel_major_indexing() {
        // 6 channels x 3 anchors, value = channel * 10 + anchor
        let data: Vec<f32> =
            (0..6).flat_map(|c| (0..3).map(move |a| (c * 10 + a) as f32)).collect();
        let t = OutputTensor::new(&data, 6, 3).unwrap();
        assert_eq!(t.at(4, 2), 42.0);
        assert_eq!(t.box_at(1), (1.0, 11.0, 21.0, 31.0));
        assert_eq!(t.num_classes(), 2);
    }

    #[test]
    fn first_maximum_wins() {
        // 7 channels (3 classes) x 1 anchor, classes 1 and 2 tie
        let data = [0.5, 0.5, 0.1, 0.1, 0.2, 0.8, 0.8];
        let t = OutputTensor::new(&data, 7, 1).unwrap();
        assert_eq!(t.best_class(0), (1, 0.8));
    }

    #[test]
    fn le_dump() {
        let mut bytes = Vec::new();
        for v in [1.5f32, -2.0, 0.25] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        assert_eq!(f32_from_le_bytes(&bytes).unwrap(), vec![1.5, -2.0, 0.25]);
        assert!(f32_from_le_bytes(&bytes[..5]).is_err());
    }
}
